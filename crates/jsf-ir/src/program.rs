//! Finalized programs.

use crate::instruction::{Instruction, Variable};
use jsf_core::ProgramId;

/// An immutable sequence of instructions plus provenance.
///
/// Programs are produced by [`crate::ProgramBuilder::finalize`] or by decoding
/// a validated [`crate::EncodedProgram`]; there is no way to edit one in
/// place.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    id: ProgramId,
    parent: Option<ProgramId>,
    code: Vec<Instruction>,
    comments: Vec<String>,
}

impl Program {
    pub(crate) fn from_parts(
        code: Vec<Instruction>,
        parent: Option<ProgramId>,
        comments: Vec<String>,
    ) -> Self {
        Self {
            id: ProgramId::new(),
            parent,
            code,
            comments,
        }
    }

    pub(crate) fn with_id(mut self, id: ProgramId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// The program this one was derived from, if any
    pub fn parent(&self) -> Option<ProgramId> {
        self.parent
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.code.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.code.iter()
    }

    /// Number of variables defined by the program
    pub fn num_variables(&self) -> usize {
        self.code
            .iter()
            .flat_map(|inst| inst.all_outputs())
            .map(|v| v.index() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Index of the instruction that defines `variable`
    pub fn definition_of(&self, variable: Variable) -> Option<usize> {
        self.code
            .iter()
            .position(|inst| inst.all_outputs().any(|v| v == variable))
    }

    /// Index of the last instruction belonging to the statement that starts at
    /// `start`.
    ///
    /// For a block opener this is its final closer (middle operations such as
    /// `BeginElse` are skipped); for any other instruction it is `start`
    /// itself. Returns `None` if `start` is a closer or the block never closes.
    pub fn find_block_end(&self, start: usize) -> Option<usize> {
        let mut depth: usize = 0;
        for (i, inst) in self.code.iter().enumerate().skip(start) {
            if inst.is_block_end() {
                depth = depth.checked_sub(1)?;
            }
            if inst.is_block_start() {
                depth += 1;
            }
            if depth == 0 {
                return Some(i);
            }
        }
        None
    }

    /// Nesting depth before each instruction executes
    pub fn depths(&self) -> Vec<usize> {
        let mut depth: usize = 0;
        self.code
            .iter()
            .map(|inst| {
                if inst.is_block_end() {
                    depth = depth.saturating_sub(1);
                }
                let here = depth;
                if inst.is_block_start() {
                    depth += 1;
                }
                here
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.code.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ProgramBuilder;

    fn sample() -> Program {
        let mut b = ProgramBuilder::new();
        let cond = b.load_bool(true).unwrap();
        b.build_if_else(
            cond,
            |b| {
                b.load_int(1)?;
                Ok(())
            },
            |b| {
                b.load_int(2)?;
                Ok(())
            },
        )
        .unwrap();
        b.load_null().unwrap();
        b.finalize()
    }

    #[test]
    fn test_structural_queries() {
        let program = sample();
        // LoadBoolean, BeginIf, LoadInteger, BeginElse, LoadInteger, EndIf, LoadNull
        assert_eq!(program.len(), 7);
        assert_eq!(program.num_variables(), 4);
        assert_eq!(program.definition_of(Variable(3)), Some(6));
        assert!(program.parent().is_none());
    }

    #[test]
    fn test_find_block_end_skips_middle_operations() {
        let program = sample();
        assert_eq!(program.find_block_end(0), Some(0));
        assert_eq!(program.find_block_end(1), Some(5));
        assert_eq!(program.find_block_end(3), None);
        assert_eq!(program.find_block_end(6), Some(6));
    }

    #[test]
    fn test_depths() {
        let program = sample();
        assert_eq!(program.depths(), vec![0, 0, 1, 0, 1, 0, 0]);
    }
}
