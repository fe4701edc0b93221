use super::{finish, rebuild, DonorPool, Mutator};
use crate::builder::ProgramBuilder;
use crate::program::Program;
use jsf_core::MutationConfig;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use tracing::trace;

/// Appends a whole donor program to the host. The donor's variables are
/// renumbered after the host's, so the two halves share no values.
pub struct CombineMutator {
    config: MutationConfig,
}

impl CombineMutator {
    pub fn new(config: MutationConfig) -> Self {
        Self { config }
    }
}

impl Mutator for CombineMutator {
    fn name(&self) -> &'static str {
        "CombineMutator"
    }

    fn mutate(
        &self,
        program: &Program,
        donors: &dyn DonorPool,
        b: &mut ProgramBuilder,
        rng: &mut ChaCha8Rng,
    ) -> Option<Program> {
        let donor = donors.random_donor(rng)?;
        if donor.is_empty() || program.len() + donor.len() > self.config.max_program_size {
            return None;
        }

        let result = rebuild(program, b, program.len(), |b, _, _| {
            let mut map = HashMap::new();
            for inst in donor.iter() {
                b.adopt(inst, &mut map)?;
            }
            Ok(())
        });
        match result {
            Ok(()) => Some(finish(b, program, self.name())),
            Err(e) => {
                trace!(error = %e, donor = %donor.id(), "combine rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::NoDonors;
    use crate::operation::FunctionKind;
    use crate::validation::validate_program;
    use rand::SeedableRng;
    use std::sync::Arc;

    #[test]
    fn test_combine_appends_donor() {
        let mut b = ProgramBuilder::new();
        let x = b.load_int(1).unwrap();
        b.type_of_value(x).unwrap();
        let host = b.finalize();

        b.build_function(FunctionKind::Arrow, Default::default(), |b, _| {
            b.load_string("donor")?;
            Ok(())
        })
        .unwrap();
        let donor = Arc::new(b.finalize());

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let child = CombineMutator::new(MutationConfig::default())
            .mutate(&host, &vec![donor.clone()], &mut b, &mut rng)
            .unwrap();
        assert!(validate_program(&child).is_ok());
        assert_eq!(child.len(), host.len() + donor.len());
        assert_eq!(&child.code()[..host.len()], host.code());
        assert_eq!(child.code()[host.len()].op, donor.code()[0].op);
        assert_eq!(child.num_variables(), host.num_variables() + donor.num_variables());
    }

    #[test]
    fn test_combine_needs_donor_and_room() {
        let mut b = ProgramBuilder::new();
        b.load_null().unwrap();
        let host = b.finalize();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mutator = CombineMutator::new(MutationConfig::default());
        assert!(mutator.mutate(&host, &NoDonors, &mut b, &mut rng).is_none());

        let tight = CombineMutator::new(MutationConfig {
            max_program_size: 1,
            ..MutationConfig::default()
        });
        let donors = vec![Arc::new(host.clone())];
        assert!(tight.mutate(&host, &donors, &mut b, &mut rng).is_none());
    }
}
