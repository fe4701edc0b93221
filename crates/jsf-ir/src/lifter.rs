//! Lifting programs to text.

use crate::program::Program;
use std::fmt::Write;

/// Turns a finalized program into the text handed to the target.
///
/// Implementations must be total over valid programs.
pub trait Lifter: Send + Sync {
    fn lift(&self, program: &Program) -> String;
}

/// Prints the IR itself, one instruction per line, indented by block depth.
#[derive(Debug, Clone)]
pub struct TextLifter {
    indent: usize,
    with_comments: bool,
}

impl TextLifter {
    pub fn new() -> Self {
        Self {
            indent: 4,
            with_comments: true,
        }
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn without_comments(mut self) -> Self {
        self.with_comments = false;
        self
    }
}

impl Default for TextLifter {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifter for TextLifter {
    fn lift(&self, program: &Program) -> String {
        let mut out = String::new();
        if self.with_comments {
            for comment in program.comments() {
                let _ = writeln!(out, "// {}", comment);
            }
        }
        for (inst, depth) in program.iter().zip(program.depths()) {
            let _ = writeln!(out, "{:width$}{}", "", inst, width = depth * self.indent);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ProgramBuilder;
    use crate::operation::{BinaryOperator, FunctionKind, Parameters};

    #[test]
    fn test_lift_indents_blocks() {
        let mut b = ProgramBuilder::new();
        b.build_function(FunctionKind::Plain, Parameters::new(1), |b, params| {
            let one = b.load_int(1)?;
            let sum = b.binary(params[0], BinaryOperator::Add, one)?;
            b.do_return(sum)
        })
        .unwrap();
        b.add_comment("example");
        let program = b.finalize();

        let text = TextLifter::new().with_indent(2).lift(&program);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), program.len() + 1);
        assert_eq!(lines[0], "// example");
        assert!(lines[1].starts_with("v0 <- BeginFunction"));
        assert!(lines[2].starts_with("  v2 <- LoadInteger"));
        assert!(lines[4].starts_with("  Return"));
        assert!(lines[5].starts_with("EndFunction"));
    }

    #[test]
    fn test_lift_empty_program() {
        let mut b = ProgramBuilder::new();
        let program = b.finalize();
        assert_eq!(TextLifter::new().without_comments().lift(&program), "");
    }
}
