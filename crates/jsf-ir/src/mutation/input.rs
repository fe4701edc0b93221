use super::{emit_mapped, finish, map_inputs, missing_target, rebuild, DonorPool, Mutator};
use crate::builder::ProgramBuilder;
use crate::instruction::Variable;
use crate::program::Program;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Rewires one input of one instruction to another visible variable whose
/// inferred type is compatible with the one it replaces.
#[derive(Debug, Default)]
pub struct InputMutator;

impl InputMutator {
    pub fn new() -> Self {
        Self
    }
}

impl Mutator for InputMutator {
    fn name(&self) -> &'static str {
        "InputMutator"
    }

    fn mutate(
        &self,
        program: &Program,
        _donors: &dyn DonorPool,
        b: &mut ProgramBuilder,
        rng: &mut ChaCha8Rng,
    ) -> Option<Program> {
        let candidates: Vec<usize> = program
            .iter()
            .filter(|inst| !inst.inputs.is_empty())
            .map(|inst| inst.index)
            .collect();
        let target = *candidates.choose(rng)?;
        let slot = rng.gen_range(0..program.get(target)?.inputs.len());

        let mut changed = false;
        let result = rebuild(program, b, target, |b, original, map| {
            let inst = original.ok_or_else(missing_target)?;
            let mut inputs = map_inputs(inst, map, b.len())?;
            let current = inputs[slot];
            let wanted = b.type_of(current);
            let replacements: Vec<Variable> = b
                .visible_variables()
                .into_iter()
                .filter(|v| *v != current && b.type_of(*v).may_be(wanted))
                .collect();
            if let Some(v) = replacements.choose(rng) {
                inputs[slot] = *v;
                changed = true;
            }
            emit_mapped(b, inst, inst.op.clone(), &inputs, map)
        });

        match result {
            Ok(()) if changed => Some(finish(b, program, self.name())),
            Ok(()) => {
                b.reset();
                None
            }
            Err(e) => {
                trace!(error = %e, target, slot, "input mutation rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::NoDonors;
    use crate::operation::BinaryOperator;
    use crate::typing::infer_types;
    use crate::validation::validate_program;
    use rand::SeedableRng;

    #[test]
    fn test_rewires_to_compatible_variable() {
        let mut b = ProgramBuilder::new();
        let x = b.load_int(1).unwrap();
        let y = b.load_int(2).unwrap();
        let z = b.load_int(3).unwrap();
        b.binary(x, BinaryOperator::Add, y).unwrap();
        b.binary(y, BinaryOperator::Mul, z).unwrap();
        let program = b.finalize();

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mutator = InputMutator::new();
        for _ in 0..16 {
            let child = mutator.mutate(&program, &NoDonors, &mut b, &mut rng).unwrap();
            assert!(validate_program(&child).is_ok());
            assert_eq!(child.len(), program.len());
            assert_ne!(child.code(), program.code());
            let types = infer_types(&child);
            for inst in child.iter() {
                for input in &inst.inputs {
                    assert!(types[input.index()].may_be(crate::typing::ValueType::INTEGER));
                }
            }
        }
    }

    #[test]
    fn test_no_alternative_returns_none() {
        let mut b = ProgramBuilder::new();
        let x = b.load_int(1).unwrap();
        b.type_of_value(x).unwrap();
        let program = b.finalize();

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(InputMutator::new()
            .mutate(&program, &NoDonors, &mut b, &mut rng)
            .is_none());
    }

    #[test]
    fn test_program_without_inputs() {
        let mut b = ProgramBuilder::new();
        b.load_null().unwrap();
        let program = b.finalize();

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(InputMutator::new()
            .mutate(&program, &NoDonors, &mut b, &mut rng)
            .is_none());
    }
}
