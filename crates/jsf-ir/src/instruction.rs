//! Variables and instructions.

use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An SSA-like value identifier. Variables are numbered in definition order,
/// starting at zero for every program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable(pub u32);

impl Variable {
    pub fn number(&self) -> u32 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A single instruction of a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: Operation,
    pub inputs: Vec<Variable>,
    /// Variables visible after this instruction in the surrounding scope
    pub outputs: Vec<Variable>,
    /// Variables visible only inside the block this instruction opens
    pub inner_outputs: Vec<Variable>,
    /// Position within the owning program
    pub index: usize,
}

impl Instruction {
    pub fn new(op: Operation, index: usize) -> Self {
        Self {
            op,
            inputs: Vec::new(),
            outputs: Vec::new(),
            inner_outputs: Vec::new(),
            index,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<Variable>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<Variable>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_inner_outputs(mut self, inner_outputs: Vec<Variable>) -> Self {
        self.inner_outputs = inner_outputs;
        self
    }

    pub fn output(&self) -> Option<Variable> {
        self.outputs.first().copied()
    }

    /// Outputs followed by inner outputs, in allocation order
    pub fn all_outputs(&self) -> impl Iterator<Item = Variable> + '_ {
        self.outputs.iter().chain(self.inner_outputs.iter()).copied()
    }

    pub fn is_block_start(&self) -> bool {
        self.op.is_block_start()
    }

    pub fn is_block_end(&self) -> bool {
        self.op.is_block_end()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.outputs.is_empty() {
            let outs: Vec<String> = self.outputs.iter().map(|v| v.to_string()).collect();
            write!(f, "{} <- ", outs.join(", "))?;
        }
        write!(f, "{}", self.op)?;
        if !self.inputs.is_empty() {
            let ins: Vec<String> = self.inputs.iter().map(|v| v.to_string()).collect();
            write!(f, " {}", ins.join(", "))?;
        }
        if !self.inner_outputs.is_empty() {
            let inner: Vec<String> = self.inner_outputs.iter().map(|v| v.to_string()).collect();
            write!(f, " -> {}", inner.join(", "))?;
        }
        Ok(())
    }
}
