use super::{finish, rebuild_inserting, DonorPool, Mutator};
use crate::builder::ProgramBuilder;
use crate::generator::generate_code;
use crate::program::Program;
use jsf_core::MutationConfig;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Inserts freshly generated code at a random position
pub struct CodeGenMutator {
    config: MutationConfig,
}

impl CodeGenMutator {
    pub fn new(config: MutationConfig) -> Self {
        Self { config }
    }
}

impl Mutator for CodeGenMutator {
    fn name(&self) -> &'static str {
        "CodeGenMutator"
    }

    fn mutate(
        &self,
        program: &Program,
        _donors: &dyn DonorPool,
        b: &mut ProgramBuilder,
        rng: &mut ChaCha8Rng,
    ) -> Option<Program> {
        if program.len() >= self.config.max_program_size {
            return None;
        }
        let at = rng.gen_range(0..=program.len());
        let budget = self
            .config
            .codegen_budget
            .min(self.config.max_program_size - program.len());
        let depth = self.config.max_generation_depth;

        let mut emitted = 0;
        let result = rebuild_inserting(program, b, at, |b| {
            emitted = generate_code(b, rng, budget, depth);
            Ok(())
        });
        match result {
            Ok(()) if emitted > 0 => Some(finish(b, program, self.name())),
            Ok(()) => {
                b.reset();
                None
            }
            Err(e) => {
                trace!(error = %e, at, "code generation rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate_program;
    use crate::mutation::NoDonors;
    use crate::validation::validate_program;
    use rand::SeedableRng;

    #[test]
    fn test_codegen_grows_program() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut b = ProgramBuilder::new();
        let host = generate_program(&mut b, &mut rng, 10, 2);
        let mutator = CodeGenMutator::new(MutationConfig::default());

        let mut produced = 0;
        for _ in 0..16 {
            if let Some(child) = mutator.mutate(&host, &NoDonors, &mut b, &mut rng) {
                assert!(validate_program(&child).is_ok());
                assert!(child.len() > host.len());
                assert_eq!(child.parent(), Some(host.id()));
                produced += 1;
            }
        }
        assert!(produced > 0);
    }

    #[test]
    fn test_codegen_respects_size_limit() {
        let mut b = ProgramBuilder::new();
        b.load_null().unwrap();
        b.load_null().unwrap();
        let host = b.finalize();

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mutator = CodeGenMutator::new(MutationConfig {
            max_program_size: 2,
            ..MutationConfig::default()
        });
        assert!(mutator.mutate(&host, &NoDonors, &mut b, &mut rng).is_none());
    }
}
