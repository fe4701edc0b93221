//! Validation for IR programs.
//!
//! Replays a complete program through the same analyzers the builder uses
//! and checks every structural invariant. Programs coming from the builder
//! always pass; this exists for decoded programs and for tests.

use crate::analyzer::{ContextAnalyzer, ScopeAnalyzer};
use crate::instruction::Instruction;
use crate::program::Program;
use jsf_core::{Error, Result};

/// Validate that a program is well-formed
pub fn validate_program(program: &Program) -> Result<()> {
    validate_instructions(program.code())
}

pub fn validate_instructions(code: &[Instruction]) -> Result<()> {
    let mut contexts = ContextAnalyzer::new();
    let mut scopes = ScopeAnalyzer::new();
    let mut next_variable: u32 = 0;

    for (position, inst) in code.iter().enumerate() {
        if inst.index != position {
            return Err(Error::MalformedProgram(format!(
                "instruction at position {} carries index {}",
                position, inst.index
            )));
        }
        validate_arity(inst)?;

        for v in inst.all_outputs() {
            if v.number() != next_variable {
                return Err(Error::MalformedProgram(format!(
                    "instruction {} defines {} but v{} was expected",
                    position, v, next_variable
                )));
            }
            next_variable += 1;
        }

        if inst.is_block_end() {
            contexts.check_closer(&inst.op)?;
        }
        let active = contexts.context();
        if !inst.op.is_legal_in(active) {
            return Err(Error::InvalidContext {
                operation: inst.op.name().to_string(),
                active: active.to_string(),
                required: inst.op.required_context().to_string(),
                incompatible: inst.op.incompatible_context().to_string(),
            });
        }
        scopes.analyze(inst)?;
        contexts.analyze(inst)?;
    }

    if contexts.depth() != 0 {
        return Err(Error::MalformedProgram(format!(
            "{} block(s) left open at end of program",
            contexts.depth()
        )));
    }
    Ok(())
}

fn validate_arity(inst: &Instruction) -> Result<()> {
    let counts = [
        (inst.inputs.len(), inst.op.num_inputs(), "inputs"),
        (inst.outputs.len(), inst.op.num_outputs(), "outputs"),
        (inst.inner_outputs.len(), inst.op.num_inner_outputs(), "inner outputs"),
    ];
    for (actual, expected, what) in counts {
        if actual != expected {
            return Err(Error::InvalidArity {
                operation: format!("{} ({})", inst.op.name(), what),
                expected,
                actual,
            });
        }
    }
    Ok(())
}
