//! Analyzers that replay instructions in program order.
//!
//! The builder drives these live while emitting, and the validator replays
//! them over finished programs. Both go through the same code so they can
//! never disagree about what is legal where.

use crate::context::Context;
use crate::instruction::{Instruction, Variable};
use crate::operation::{BlockKind, Operation};
use jsf_core::{Error, Result};

#[derive(Debug, Clone, Copy)]
struct Frame {
    context: Context,
    block: Option<BlockKind>,
}

/// Tracks the stack of active contexts.
#[derive(Debug, Clone)]
pub struct ContextAnalyzer {
    frames: Vec<Frame>,
}

impl ContextAnalyzer {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame {
                context: Context::SCRIPT,
                block: None,
            }],
        }
    }

    /// Context active at the current position
    pub fn context(&self) -> Context {
        self.top().context
    }

    /// Number of open blocks
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Kind of the innermost open block, `None` at the top level
    pub fn open_block(&self) -> Option<BlockKind> {
        self.top().block
    }

    pub fn analyze(&mut self, instruction: &Instruction) -> Result<()> {
        self.analyze_operation(&instruction.op)
    }

    pub fn analyze_operation(&mut self, op: &Operation) -> Result<()> {
        if op.is_block_end() {
            self.check_closer(op)?;
            self.frames.pop();
        }
        if op.is_block_start() {
            let carried = self.context().intersection(op.inherited_context());
            let context = op.context_opened() | carried;
            self.frames.push(Frame {
                context,
                block: op.block_kind(),
            });
        }
        Ok(())
    }

    /// Fails if `op` is a closer that does not match the innermost open block
    pub fn check_closer(&self, op: &Operation) -> Result<()> {
        match self.open_block() {
            None => Err(Error::MalformedProgram(format!(
                "{} without a matching block opener",
                op.name()
            ))),
            Some(kind) if Some(kind) != op.block_kind() => Err(Error::MalformedProgram(format!(
                "{} cannot close a {:?} block",
                op.name(),
                kind
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Drop every frame above `depth`
    pub(crate) fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth + 1);
    }

    fn top(&self) -> &Frame {
        // The initial frame is never popped: closers at depth 0 are rejected.
        &self.frames[self.frames.len() - 1]
    }
}

impl Default for ContextAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks which variables are visible at the current position.
#[derive(Debug, Clone)]
pub struct ScopeAnalyzer {
    scopes: Vec<Vec<Variable>>,
    visible: Vec<bool>,
}

impl ScopeAnalyzer {
    pub fn new() -> Self {
        Self {
            scopes: vec![Vec::new()],
            visible: Vec::new(),
        }
    }

    pub fn is_visible(&self, variable: Variable) -> bool {
        self.visible.get(variable.index()).copied().unwrap_or(false)
    }

    /// Visible variables, innermost scope last
    pub fn visible_variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.scopes.iter().flatten().copied()
    }

    /// Variables bound in the innermost scope
    pub fn innermost_scope(&self) -> &[Variable] {
        &self.scopes[self.scopes.len() - 1]
    }

    pub fn num_visible(&self) -> usize {
        self.scopes.iter().map(|s| s.len()).sum()
    }

    pub fn check_inputs(&self, inputs: &[Variable], position: usize) -> Result<()> {
        match inputs.iter().find(|v| !self.is_visible(**v)) {
            Some(v) => Err(Error::UndefinedVariable {
                variable: v.number(),
                position,
            }),
            None => Ok(()),
        }
    }

    pub fn analyze(&mut self, instruction: &Instruction) -> Result<()> {
        self.check_inputs(&instruction.inputs, instruction.index)?;

        if instruction.is_block_end() {
            if self.scopes.len() == 1 {
                return Err(Error::MalformedProgram(format!(
                    "{} closes a scope that was never opened",
                    instruction.op.name()
                )));
            }
            if let Some(scope) = self.scopes.pop() {
                for v in scope {
                    self.visible[v.index()] = false;
                }
            }
        }

        for v in instruction.outputs.iter().copied() {
            self.define(v);
        }

        if instruction.is_block_start() {
            self.scopes.push(Vec::new());
            for v in instruction.inner_outputs.iter().copied() {
                self.define(v);
            }
        }
        Ok(())
    }

    fn define(&mut self, variable: Variable) {
        if self.visible.len() <= variable.index() {
            self.visible.resize(variable.index() + 1, false);
        }
        self.visible[variable.index()] = true;
        let last = self.scopes.len() - 1;
        self.scopes[last].push(variable);
    }

    /// Forget every scope above `depth` and every variable numbered at or
    /// above `next_variable`.
    pub(crate) fn rollback(&mut self, depth: usize, next_variable: u32) {
        self.scopes.truncate(depth + 1);
        for scope in &mut self.scopes {
            scope.retain(|v| v.number() < next_variable);
        }
        self.visible.truncate(next_variable as usize);
    }
}

impl Default for ScopeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

struct SliceFrame {
    provided: Context,
    /// Flags that reach this frame from the insertion point
    inherited: Context,
    block: Option<BlockKind>,
}

/// Context requirements a slice of instructions imposes on its insertion point.
///
/// Returns `(required, incompatible)`: the slice is legal wherever the active
/// context contains `required` and is disjoint from `incompatible`. Flags
/// satisfied by blocks opened inside the slice do not leak out. Fails with
/// [`Error::MalformedProgram`] if the slice is not block-balanced.
pub fn slice_requirements(slice: &[Instruction]) -> Result<(Context, Context)> {
    let mut required = Context::EMPTY;
    let mut incompatible = Context::EMPTY;
    let mut frames = vec![SliceFrame {
        provided: Context::EMPTY,
        inherited: Context::ALL,
        block: None,
    }];

    for inst in slice {
        let op = &inst.op;
        if op.is_block_end() {
            if frames.len() == 1 {
                return Err(Error::MalformedProgram(format!(
                    "slice contains {} without its opener",
                    op.name()
                )));
            }
            let closed = frames.pop().and_then(|f| f.block);
            if closed != op.block_kind() {
                return Err(Error::MalformedProgram(format!(
                    "slice contains mismatched closer {}",
                    op.name()
                )));
            }
        }

        let top = &frames[frames.len() - 1];
        let missing = op.required_context().difference(top.provided);
        let clash = op.incompatible_context().intersects(top.provided);
        if clash || !top.inherited.contains(missing) {
            return Err(Error::InvalidContext {
                operation: op.name().to_string(),
                active: top.provided.to_string(),
                required: op.required_context().to_string(),
                incompatible: op.incompatible_context().to_string(),
            });
        }
        required |= missing;
        incompatible |= op.incompatible_context().intersection(top.inherited);

        if op.is_block_start() {
            let carried = op.inherited_context();
            let provided = op.context_opened() | top.provided.intersection(carried);
            let inherited = top.inherited.intersection(carried);
            frames.push(SliceFrame {
                provided,
                inherited,
                block: op.block_kind(),
            });
        }
    }

    if frames.len() != 1 {
        return Err(Error::MalformedProgram(format!(
            "slice leaves {} block(s) open",
            frames.len() - 1
        )));
    }
    Ok((required, incompatible))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{FunctionKind, Parameters};

    fn inst(op: Operation, index: usize) -> Instruction {
        Instruction::new(op, index)
    }

    fn function(kind: FunctionKind) -> Operation {
        Operation::BeginFunction {
            kind,
            parameters: Parameters::new(0),
        }
    }

    #[test]
    fn test_top_level_context() {
        let analyzer = ContextAnalyzer::new();
        assert_eq!(analyzer.context(), Context::SCRIPT);
        assert_eq!(analyzer.depth(), 0);
        assert!(analyzer.open_block().is_none());
    }

    #[test]
    fn test_loop_context_does_not_leak_into_functions() {
        let mut a = ContextAnalyzer::new();
        a.analyze_operation(&function(FunctionKind::Plain)).unwrap();
        assert_eq!(a.context(), Context::SCRIPT | Context::SUBROUTINE);

        a.analyze_operation(&Operation::BeginDoWhileLoopBody).unwrap();
        assert_eq!(a.context(), Context::SCRIPT | Context::SUBROUTINE | Context::LOOP);

        a.analyze_operation(&function(FunctionKind::Plain)).unwrap();
        assert_eq!(a.context(), Context::SCRIPT | Context::SUBROUTINE);

        a.analyze_operation(&Operation::EndFunction { kind: FunctionKind::Plain }).unwrap();
        assert_eq!(a.context(), Context::SCRIPT | Context::SUBROUTINE | Context::LOOP);

        a.analyze_operation(&Operation::BeginDoWhileLoopHeader).unwrap();
        assert_eq!(a.context(), Context::SCRIPT | Context::SUBROUTINE);
        a.analyze_operation(&Operation::EndDoWhileLoop).unwrap();
        a.analyze_operation(&Operation::EndFunction { kind: FunctionKind::Plain }).unwrap();
        assert_eq!(a.context(), Context::SCRIPT);
        assert_eq!(a.depth(), 0);
    }

    #[test]
    fn test_object_literal_and_class_contexts() {
        let mut a = ContextAnalyzer::new();
        a.analyze_operation(&Operation::BeginObjectLiteral).unwrap();
        assert_eq!(a.context(), Context::OBJECT_LITERAL);
        a.analyze_operation(&Operation::BeginObjectLiteralGetter { name: "x".to_string() })
            .unwrap();
        assert_eq!(
            a.context(),
            Context::SCRIPT | Context::SUBROUTINE | Context::METHOD
        );
        a.analyze_operation(&Operation::EndObjectLiteralGetter).unwrap();
        a.analyze_operation(&Operation::EndObjectLiteral).unwrap();

        a.analyze_operation(&Operation::BeginClassDefinition { has_superclass: false })
            .unwrap();
        assert_eq!(a.context(), Context::CLASS_DEFINITION);
        a.analyze_operation(&Operation::BeginClassConstructor {
            parameters: Parameters::new(1),
        })
        .unwrap();
        assert!(a.context().contains(Context::CLASS_METHOD | Context::METHOD));
        assert!(!a.context().contains(Context::CLASS_DEFINITION));
    }

    #[test]
    fn test_strictness_survives_function_boundaries() {
        let mut a = ContextAnalyzer::new();
        a.analyze_operation(&Operation::BeginClassDefinition { has_superclass: true })
            .unwrap();
        a.analyze_operation(&Operation::BeginClassConstructor {
            parameters: Parameters::new(0),
        })
        .unwrap();
        assert!(a.context().contains(Context::STRICT | Context::SUPER_CALL));

        a.analyze_operation(&function(FunctionKind::Arrow)).unwrap();
        assert!(a.context().contains(Context::STRICT));
        assert!(!a.context().contains(Context::SUPER_CALL));
        assert!(!Operation::BeginWith.is_legal_in(a.context()));
    }

    #[test]
    fn test_slice_with_inside_function_forbids_strict_insertion() {
        let slice = vec![
            inst(function(FunctionKind::Plain), 0),
            inst(Operation::BeginWith, 1),
            inst(Operation::EndWith, 2),
            inst(Operation::EndFunction { kind: FunctionKind::Plain }, 3),
        ];
        let (required, incompatible) = slice_requirements(&slice).unwrap();
        assert_eq!(required, Context::SCRIPT);
        assert_eq!(incompatible, Context::STRICT);

        let slice = vec![
            inst(function(FunctionKind::Plain), 0),
            inst(Operation::CallSuperConstructor { arguments: 0 }, 1),
            inst(Operation::EndFunction { kind: FunctionKind::Plain }, 2),
        ];
        assert!(matches!(
            slice_requirements(&slice),
            Err(Error::InvalidContext { .. })
        ));
    }

    #[test]
    fn test_with_and_code_string_contexts() {
        let mut a = ContextAnalyzer::new();
        a.analyze_operation(&Operation::BeginWhileLoopHeader).unwrap();
        a.analyze_operation(&Operation::BeginWhileLoopBody).unwrap();
        a.analyze_operation(&Operation::BeginWith).unwrap();
        assert_eq!(a.context(), Context::SCRIPT | Context::LOOP | Context::WITH);
        a.analyze_operation(&Operation::BeginCodeString).unwrap();
        assert_eq!(a.context(), Context::SCRIPT);
    }

    #[test]
    fn test_unmatched_closer_is_malformed() {
        let mut a = ContextAnalyzer::new();
        let err = a.analyze_operation(&Operation::EndIf).unwrap_err();
        assert!(matches!(err, Error::MalformedProgram(_)));
        // The analyzer did not silently proceed.
        assert_eq!(a.depth(), 0);
        assert_eq!(a.context(), Context::SCRIPT);
    }

    #[test]
    fn test_mismatched_closer_is_malformed() {
        let mut a = ContextAnalyzer::new();
        a.analyze_operation(&Operation::BeginIf { inverted: false }).unwrap();
        assert!(a.analyze_operation(&Operation::EndWith).is_err());
        assert!(a
            .analyze_operation(&Operation::EndFunction { kind: FunctionKind::Plain })
            .is_err());
        assert_eq!(a.depth(), 1);
    }

    #[test]
    fn test_scope_visibility() {
        let mut s = ScopeAnalyzer::new();
        let f = inst(
            Operation::BeginFunction {
                kind: FunctionKind::Plain,
                parameters: Parameters::new(1),
            },
            0,
        )
        .with_outputs(vec![Variable(0)])
        .with_inner_outputs(vec![Variable(1)]);
        s.analyze(&f).unwrap();
        assert!(s.is_visible(Variable(0)));
        assert!(s.is_visible(Variable(1)));

        let load = inst(Operation::LoadNull, 1).with_outputs(vec![Variable(2)]);
        s.analyze(&load).unwrap();
        assert_eq!(s.innermost_scope(), &[Variable(1), Variable(2)]);

        s.analyze(&inst(Operation::EndFunction { kind: FunctionKind::Plain }, 2))
            .unwrap();
        assert!(s.is_visible(Variable(0)));
        assert!(!s.is_visible(Variable(1)));
        assert!(!s.is_visible(Variable(2)));

        let use_param = inst(Operation::TypeOf, 3)
            .with_inputs(vec![Variable(1)])
            .with_outputs(vec![Variable(3)]);
        let err = s.analyze(&use_param).unwrap_err();
        assert!(matches!(
            err,
            Error::UndefinedVariable {
                variable: 1,
                position: 3
            }
        ));
    }

    #[test]
    fn test_scope_rollback() {
        let mut s = ScopeAnalyzer::new();
        s.analyze(&inst(Operation::LoadNull, 0).with_outputs(vec![Variable(0)]))
            .unwrap();
        s.analyze(&inst(Operation::BeginBlockStatement, 1)).unwrap();
        s.analyze(&inst(Operation::LoadNull, 2).with_outputs(vec![Variable(1)]))
            .unwrap();
        s.rollback(0, 1);
        assert!(s.is_visible(Variable(0)));
        assert!(!s.is_visible(Variable(1)));
        assert_eq!(s.num_visible(), 1);
    }

    #[test]
    fn test_slice_requirements() {
        let slice = vec![
            inst(Operation::BeginForOfLoop, 0),
            inst(Operation::Break, 1),
            inst(Operation::Return, 2),
            inst(Operation::EndForOfLoop, 3),
        ];
        let (required, incompatible) = slice_requirements(&slice).unwrap();
        assert_eq!(required, Context::SCRIPT | Context::SUBROUTINE);
        assert_eq!(incompatible, Context::EMPTY);

        let slice = vec![
            inst(function(FunctionKind::Generator), 0),
            inst(Operation::Yield, 1),
            inst(Operation::EndFunction { kind: FunctionKind::Generator }, 2),
        ];
        let (required, _) = slice_requirements(&slice).unwrap();
        assert_eq!(required, Context::SCRIPT);
    }

    #[test]
    fn test_slice_requirements_rejects_unbalanced_slices() {
        let slice = vec![inst(Operation::LoadNull, 0), inst(Operation::EndIf, 1)];
        assert!(matches!(
            slice_requirements(&slice),
            Err(Error::MalformedProgram(_))
        ));

        let slice = vec![inst(Operation::BeginBlockStatement, 0)];
        assert!(matches!(
            slice_requirements(&slice),
            Err(Error::MalformedProgram(_))
        ));
    }
}
