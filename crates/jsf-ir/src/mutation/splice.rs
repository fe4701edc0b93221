use super::{contexts_at, finish, rebuild_inserting, DonorPool, Mutator};
use crate::analyzer::slice_requirements;
use crate::builder::ProgramBuilder;
use crate::context::Context;
use crate::environment::Environment;
use crate::instruction::{Instruction, Variable};
use crate::program::Program;
use crate::typing::{infer_types, ValueType};
use jsf_core::{Error, MutationConfig, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;
use tracing::trace;

/// Copies a balanced slice of a donor program (or of the host itself) into
/// the host at a position whose context admits the slice.
pub struct SpliceMutator {
    config: MutationConfig,
}

impl SpliceMutator {
    pub fn new(config: MutationConfig) -> Self {
        Self { config }
    }
}

impl Mutator for SpliceMutator {
    fn name(&self) -> &'static str {
        "SpliceMutator"
    }

    fn mutate(
        &self,
        program: &Program,
        donors: &dyn DonorPool,
        b: &mut ProgramBuilder,
        rng: &mut ChaCha8Rng,
    ) -> Option<Program> {
        let pooled: Option<Arc<Program>> = donors.random_donor(rng);
        let donor: &Program = pooled.as_deref().unwrap_or(program);

        let range = choose_slice(donor, self.config.max_splice_length, rng)?;
        if program.len() + range.len() > self.config.max_program_size {
            return None;
        }
        let (required, incompatible) = slice_requirements(&donor.code()[range.clone()]).ok()?;
        let positions: Vec<usize> = contexts_at(program)
            .into_iter()
            .enumerate()
            .filter(|(_, context)| context.permits(required, incompatible))
            .map(|(position, _)| position)
            .collect();
        let at = *positions.choose(rng)?;

        match splice_into(program, at, donor, range.clone(), b, rng) {
            Ok(child) => Some(child),
            Err(e) => {
                trace!(error = %e, at, slice = ?range, "splice rejected");
                None
            }
        }
    }
}

/// Insert `donor[range]` into `host` before position `at`.
///
/// Fails if the slice is not balanced, if the context at `at` does not admit
/// it, or if a variable the slice uses but does not define cannot be bound
/// to something visible at the insertion point.
pub fn splice_into(
    host: &Program,
    at: usize,
    donor: &Program,
    range: Range<usize>,
    b: &mut ProgramBuilder,
    rng: &mut ChaCha8Rng,
) -> Result<Program> {
    let slice = donor.code().get(range.clone()).ok_or_else(|| {
        Error::InvalidState(format!(
            "slice {:?} is out of bounds for a program of {} instructions",
            range,
            donor.len()
        ))
    })?;
    let (required, incompatible) = slice_requirements(slice)?;
    let donor_types = infer_types(donor);
    let free = free_variables(slice);

    rebuild_inserting(host, b, at, |b| {
        let active = b.context();
        if !active.permits(required, incompatible) {
            return Err(Error::InvalidContext {
                operation: "splice".to_string(),
                active: active.to_string(),
                required: required.to_string(),
                incompatible: incompatible.to_string(),
            });
        }

        let mut map = HashMap::new();
        for v in free {
            let wanted = donor_types
                .get(v.index())
                .copied()
                .unwrap_or(ValueType::ANYTHING);
            let bound = bind_free_variable(b, wanted, rng)?;
            map.insert(v, bound);
        }
        for inst in slice {
            b.adopt(inst, &mut map)?;
        }
        Ok(())
    })?;
    Ok(finish(b, host, "SpliceMutator"))
}

/// A random balanced slice of `donor`: one statement plus up to
/// `max_statements - 1` following siblings.
fn choose_slice(
    donor: &Program,
    max_statements: usize,
    rng: &mut ChaCha8Rng,
) -> Option<Range<usize>> {
    let starts: Vec<usize> = donor
        .iter()
        .filter(|inst| !inst.is_block_end() && !inst.op.is_block_middle())
        .map(|inst| inst.index)
        .collect();
    let start = *starts.choose(rng)?;
    let mut end = donor.find_block_end(start)?;

    let statements = rng.gen_range(1..=max_statements.max(1));
    for _ in 1..statements {
        match donor.get(end + 1) {
            Some(next) if !next.is_block_end() && !next.op.is_block_middle() => {
                end = donor.find_block_end(end + 1)?;
            }
            _ => break,
        }
    }
    Some(start..end + 1)
}

/// Variables used by `slice` before (or without) being defined in it
fn free_variables(slice: &[Instruction]) -> Vec<Variable> {
    let mut defined = HashSet::new();
    let mut seen = HashSet::new();
    let mut free = Vec::new();
    for inst in slice {
        for input in &inst.inputs {
            if !defined.contains(input) && seen.insert(*input) {
                free.push(*input);
            }
        }
        defined.extend(inst.all_outputs());
    }
    free
}

/// Pick a visible variable of a compatible type, or load a fresh value of
/// that type when values can be created here, or fall back to any visible
/// variable.
fn bind_free_variable(
    b: &mut ProgramBuilder,
    wanted: ValueType,
    rng: &mut ChaCha8Rng,
) -> Result<Variable> {
    if let Some(v) = b.random_variable_of_type(rng, wanted) {
        return Ok(v);
    }
    if b.context().contains(Context::SCRIPT) {
        return load_value_of_type(b, wanted, rng);
    }
    b.random_variable(rng).ok_or_else(|| {
        Error::InvalidState(format!(
            "no visible variable to bind a free {:?} input",
            wanted
        ))
    })
}

fn load_value_of_type(
    b: &mut ProgramBuilder,
    wanted: ValueType,
    rng: &mut ChaCha8Rng,
) -> Result<Variable> {
    if wanted.may_be(ValueType::INTEGER) {
        b.load_int(Environment::random_int(rng))
    } else if wanted.may_be(ValueType::FLOAT) {
        b.load_float(Environment::random_float(rng))
    } else if wanted.may_be(ValueType::STRING) {
        b.load_string(Environment::random_string(rng))
    } else if wanted.may_be(ValueType::BOOLEAN) {
        b.load_bool(rng.gen_bool(0.5))
    } else if wanted.may_be(ValueType::FUNCTION) {
        b.load_builtin(Environment::random_builtin(rng))
    } else if wanted.may_be(ValueType::OBJECT) {
        b.create_object(&[])
    } else if wanted.may_be(ValueType::NULL) {
        b.load_null()
    } else {
        b.load_undefined()
    }
}
