//! Mutation operators for IR programs.
//!
//! A mutator never edits a program in place. It replays the host program
//! through a [`ProgramBuilder`], applying its edit on the way, so every
//! instruction of the result passes the builder's context and visibility
//! checks. When the edit cannot be applied the mutator returns `None`.

mod codegen;
mod combine;
mod input;
mod operation;
mod splice;

pub use codegen::CodeGenMutator;
pub use combine::CombineMutator;
pub use input::InputMutator;
pub use operation::OperationMutator;
pub use splice::{splice_into, SpliceMutator};

use crate::analyzer::ContextAnalyzer;
use crate::builder::ProgramBuilder;
use crate::context::Context;
use crate::instruction::{Instruction, Variable};
use crate::operation::Operation;
use crate::program::Program;
use jsf_core::{Error, MutationConfig, Result};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Source of second programs for splicing and combining
pub trait DonorPool {
    fn random_donor(&self, rng: &mut ChaCha8Rng) -> Option<Arc<Program>>;
}

impl DonorPool for Vec<Arc<Program>> {
    fn random_donor(&self, rng: &mut ChaCha8Rng) -> Option<Arc<Program>> {
        self.choose(rng).cloned()
    }
}

/// A pool without programs
pub struct NoDonors;

impl DonorPool for NoDonors {
    fn random_donor(&self, _rng: &mut ChaCha8Rng) -> Option<Arc<Program>> {
        None
    }
}

pub trait Mutator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Derive a new program from `program`, or `None` if this mutator has
    /// no opportunity to change it.
    fn mutate(
        &self,
        program: &Program,
        donors: &dyn DonorPool,
        b: &mut ProgramBuilder,
        rng: &mut ChaCha8Rng,
    ) -> Option<Program>;
}

/// The standard mutator set with the weights configured for each
pub fn default_mutators(config: &MutationConfig) -> Vec<(Box<dyn Mutator>, u32)> {
    vec![
        (
            Box::new(OperationMutator::new()) as Box<dyn Mutator>,
            config.operation_weight,
        ),
        (Box::new(InputMutator::new()), config.input_weight),
        (Box::new(SpliceMutator::new(config.clone())), config.splice_weight),
        (Box::new(CombineMutator::new(config.clone())), config.combine_weight),
        (Box::new(CodeGenMutator::new(config.clone())), config.codegen_weight),
    ]
}

/// Replay `program` into `b`, calling `at_target` instead of copying the
/// instruction at `target`. A `target` equal to the program length runs the
/// hook after the last instruction.
///
/// The hook receives the original instruction (if any) and the variable map
/// and is responsible for mapping any outputs it replaces. On failure the
/// builder is reset.
pub(crate) fn rebuild(
    program: &Program,
    b: &mut ProgramBuilder,
    target: usize,
    at_target: impl FnOnce(
        &mut ProgramBuilder,
        Option<&Instruction>,
        &mut HashMap<Variable, Variable>,
    ) -> Result<()>,
) -> Result<()> {
    b.reset();
    let result = replay(program, b, target, at_target);
    if result.is_err() {
        b.reset();
    }
    result
}

fn replay(
    program: &Program,
    b: &mut ProgramBuilder,
    target: usize,
    at_target: impl FnOnce(
        &mut ProgramBuilder,
        Option<&Instruction>,
        &mut HashMap<Variable, Variable>,
    ) -> Result<()>,
) -> Result<()> {
    let mut map = HashMap::new();
    let mut hook = Some(at_target);
    for inst in program.iter() {
        if inst.index == target {
            if let Some(hook) = hook.take() {
                hook(b, Some(inst), &mut map)?;
                continue;
            }
        }
        b.adopt(inst, &mut map)?;
    }
    if let Some(hook) = hook.take() {
        hook(b, None, &mut map)?;
    }
    Ok(())
}

/// Replay `program` and insert whatever `insert` emits before position `at`
pub(crate) fn rebuild_inserting(
    program: &Program,
    b: &mut ProgramBuilder,
    at: usize,
    insert: impl FnOnce(&mut ProgramBuilder) -> Result<()>,
) -> Result<()> {
    rebuild(program, b, at, |b, original, map| {
        insert(b)?;
        match original {
            Some(inst) => b.adopt(inst, map),
            None => Ok(()),
        }
    })
}

/// Translate the inputs of `inst` through `map`
pub(crate) fn map_inputs(
    inst: &Instruction,
    map: &HashMap<Variable, Variable>,
    position: usize,
) -> Result<Vec<Variable>> {
    inst.inputs
        .iter()
        .map(|v| {
            map.get(v).copied().ok_or(Error::UndefinedVariable {
                variable: v.number(),
                position,
            })
        })
        .collect()
}

/// Emit `op` in place of `original`, mapping the original outputs to the new ones
pub(crate) fn emit_mapped(
    b: &mut ProgramBuilder,
    original: &Instruction,
    op: Operation,
    inputs: &[Variable],
    map: &mut HashMap<Variable, Variable>,
) -> Result<()> {
    let emitted = b.emit(op, inputs)?;
    let pairs: Vec<(Variable, Variable)> =
        original.all_outputs().zip(emitted.all_outputs()).collect();
    map.extend(pairs);
    Ok(())
}

pub(crate) fn missing_target() -> Error {
    Error::InvalidState("mutation target is out of range".to_string())
}

/// Finalize the builder as a child of `host`
pub(crate) fn finish(b: &mut ProgramBuilder, host: &Program, mutator: &str) -> Program {
    b.set_parent(host.id());
    for comment in host.comments() {
        b.add_comment(comment.clone());
    }
    b.add_comment(format!("mutated by {}", mutator));
    b.finalize()
}

/// Active context before each position `0..=len`
pub(crate) fn contexts_at(program: &Program) -> Vec<Context> {
    let mut analyzer = ContextAnalyzer::new();
    let mut contexts = Vec::with_capacity(program.len() + 1);
    for inst in program.iter() {
        contexts.push(analyzer.context());
        // Programs are valid, so analysis cannot fail; stop early if it does.
        if analyzer.analyze(inst).is_err() {
            break;
        }
    }
    contexts.push(analyzer.context());
    contexts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate_program;
    use crate::validation::validate_program;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn corpus(rng: &mut ChaCha8Rng, b: &mut ProgramBuilder) -> Vec<Arc<Program>> {
        (0..4)
            .map(|_| Arc::new(generate_program(b, rng, 25, 2)))
            .collect()
    }

    #[test]
    fn test_rebuild_is_identity_without_edits() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut b = ProgramBuilder::new();
        let program = generate_program(&mut b, &mut rng, 30, 3);
        rebuild(&program, &mut b, program.len(), |_, _, _| Ok(())).unwrap();
        let copy = b.finalize();
        assert_eq!(copy.code(), program.code());
    }

    #[test]
    fn test_contexts_at() {
        let mut b = ProgramBuilder::new();
        b.build_function(crate::operation::FunctionKind::Plain, Default::default(), |b, _| {
            b.load_null()?;
            Ok(())
        })
        .unwrap();
        let program = b.finalize();
        let contexts = contexts_at(&program);
        assert_eq!(contexts.len(), 4);
        assert_eq!(contexts[0], Context::SCRIPT);
        assert_eq!(contexts[1], Context::SCRIPT | Context::SUBROUTINE);
        assert_eq!(contexts[3], Context::SCRIPT);
    }

    #[test]
    fn test_default_mutators_have_unique_names() {
        let mutators = default_mutators(&MutationConfig::default());
        let mut names: Vec<&str> = mutators.iter().map(|(m, _)| m.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 32,
            ..ProptestConfig::default()
        })]

        #[test]
        fn prop_mutation_closure(seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut b = ProgramBuilder::new();
            let donors = corpus(&mut rng, &mut b);
            let host = generate_program(&mut b, &mut rng, 30, 3);

            for (mutator, _) in default_mutators(&MutationConfig::default()) {
                for _ in 0..4 {
                    if let Some(child) = mutator.mutate(&host, &donors, &mut b, &mut rng) {
                        prop_assert!(
                            validate_program(&child).is_ok(),
                            "{} produced an invalid program",
                            mutator.name()
                        );
                        prop_assert_eq!(child.parent(), Some(host.id()));
                    }
                }
            }
        }
    }
}
