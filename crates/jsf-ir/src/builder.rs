//! Structured, context-checked program construction.
//!
//! [`ProgramBuilder`] is the only way to assemble a [`Program`]. Every
//! instruction goes through [`ProgramBuilder::emit`], which rejects
//! operations that are illegal in the current context, inputs that are not
//! visible, and closers that do not match the innermost open block. The
//! `build_*` helpers emit matching opener/closer pairs around a body closure
//! and roll the builder back to the state before the opener if the body
//! fails.

use crate::analyzer::{ContextAnalyzer, ScopeAnalyzer};
use crate::context::Context;
use crate::instruction::{Instruction, Variable};
use crate::operation::{
    BinaryOperator, Comparator, FunctionKind, Operation, Parameters, UnaryOperator,
};
use crate::program::Program;
use crate::typing::{TypeState, ValueType};
use jsf_core::{Error, ProgramId, Result};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    code_len: usize,
    next_variable: u32,
    depth: usize,
}

pub struct ProgramBuilder {
    code: Vec<Instruction>,
    next_variable: u32,
    contexts: ContextAnalyzer,
    scopes: ScopeAnalyzer,
    types: TypeState,
    /// Closers may only close blocks opened above this depth
    block_floor: usize,
    parent: Option<ProgramId>,
    comments: Vec<String>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            next_variable: 0,
            contexts: ContextAnalyzer::new(),
            scopes: ScopeAnalyzer::new(),
            types: TypeState::new(),
            block_floor: 0,
            parent: None,
            comments: Vec::new(),
        }
    }

    /// Discard everything built so far
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn context(&self) -> Context {
        self.contexts.context()
    }

    /// Number of currently open blocks
    pub fn depth(&self) -> usize {
        self.contexts.depth()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    pub fn set_parent(&mut self, parent: ProgramId) {
        self.parent = Some(parent);
    }

    pub fn add_comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }

    pub fn is_visible(&self, variable: Variable) -> bool {
        self.scopes.is_visible(variable)
    }

    pub fn type_of(&self, variable: Variable) -> ValueType {
        self.types.type_of(variable)
    }

    pub fn visible_variables(&self) -> Vec<Variable> {
        self.scopes.visible_variables().collect()
    }

    /// A uniformly chosen visible variable, `None` if nothing is visible
    pub fn random_variable(&self, rng: &mut ChaCha8Rng) -> Option<Variable> {
        self.visible_variables().choose(rng).copied()
    }

    /// A visible variable that may hold a value of type `wanted`
    pub fn random_variable_of_type(
        &self,
        rng: &mut ChaCha8Rng,
        wanted: ValueType,
    ) -> Option<Variable> {
        let candidates: Vec<Variable> = self
            .scopes
            .visible_variables()
            .filter(|v| self.types.type_of(*v).may_be(wanted))
            .collect();
        candidates.choose(rng).copied()
    }

    /// `n` visible variables drawn with replacement, `None` if nothing is visible
    pub fn random_variables(&self, rng: &mut ChaCha8Rng, n: usize) -> Option<Vec<Variable>> {
        let visible = self.visible_variables();
        if visible.is_empty() && n > 0 {
            return None;
        }
        Some((0..n).filter_map(|_| visible.choose(rng).copied()).collect())
    }

    /// Append one instruction.
    ///
    /// Fails without touching the program if the input count is wrong, the
    /// operation is a closer that does not match the innermost block owned by
    /// the caller, the operation is not legal in the current context, or an
    /// input is not visible.
    pub fn emit(&mut self, op: Operation, inputs: &[Variable]) -> Result<&Instruction> {
        if inputs.len() != op.num_inputs() {
            return Err(Error::InvalidArity {
                operation: op.name().to_string(),
                expected: op.num_inputs(),
                actual: inputs.len(),
            });
        }
        if op.is_block_end() {
            if self.contexts.depth() <= self.block_floor {
                return Err(Error::MalformedProgram(format!(
                    "{} has no open block to close",
                    op.name()
                )));
            }
            self.contexts.check_closer(&op)?;
        }
        let active = self.contexts.context();
        if !op.is_legal_in(active) {
            return Err(Error::InvalidContext {
                operation: op.name().to_string(),
                active: active.to_string(),
                required: op.required_context().to_string(),
                incompatible: op.incompatible_context().to_string(),
            });
        }
        let index = self.code.len();
        self.scopes.check_inputs(inputs, index)?;

        let outputs = self.allocate(op.num_outputs());
        let inner_outputs = self.allocate(op.num_inner_outputs());
        let instruction = Instruction::new(op, index)
            .with_inputs(inputs.to_vec())
            .with_outputs(outputs)
            .with_inner_outputs(inner_outputs);

        self.contexts.analyze(&instruction)?;
        self.scopes.analyze(&instruction)?;
        self.types.record(&instruction);
        self.code.push(instruction);
        Ok(&self.code[index])
    }

    /// Re-emit an instruction taken from another program, translating its
    /// variables through `map`. New outputs are added to `map`.
    pub fn adopt(
        &mut self,
        instruction: &Instruction,
        map: &mut HashMap<Variable, Variable>,
    ) -> Result<()> {
        let position = self.code.len();
        let inputs = instruction
            .inputs
            .iter()
            .map(|v| {
                map.get(v).copied().ok_or(Error::UndefinedVariable {
                    variable: v.number(),
                    position,
                })
            })
            .collect::<Result<Vec<Variable>>>()?;
        let emitted = self.emit(instruction.op.clone(), &inputs)?;
        let pairs: Vec<(Variable, Variable)> = instruction
            .all_outputs()
            .zip(emitted.all_outputs())
            .collect();
        map.extend(pairs);
        Ok(())
    }

    /// Produce the finished program and reset the builder.
    ///
    /// # Panics
    ///
    /// Panics if blocks are still open. The structured helpers always close
    /// what they open, so this indicates a bug in the caller.
    pub fn finalize(&mut self) -> Program {
        assert_eq!(
            self.contexts.depth(),
            0,
            "finalize called with {} open block(s)",
            self.contexts.depth()
        );
        let code = std::mem::take(&mut self.code);
        let parent = self.parent.take();
        let comments = std::mem::take(&mut self.comments);
        self.reset();
        Program::from_parts(code, parent, comments)
    }

    fn allocate(&mut self, n: usize) -> Vec<Variable> {
        let vars = (self.next_variable..self.next_variable + n as u32)
            .map(Variable)
            .collect();
        self.next_variable += n as u32;
        vars
    }

    fn emit_value(&mut self, op: Operation, inputs: &[Variable]) -> Result<Variable> {
        let name = op.name();
        self.emit(op, inputs)?
            .output()
            .ok_or_else(|| Error::InvalidState(format!("{} has no output", name)))
    }

    fn emit_inner(&mut self, op: Operation, inputs: &[Variable]) -> Result<Vec<Variable>> {
        Ok(self.emit(op, inputs)?.inner_outputs.clone())
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            code_len: self.code.len(),
            next_variable: self.next_variable,
            depth: self.contexts.depth(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.code.truncate(checkpoint.code_len);
        self.next_variable = checkpoint.next_variable;
        self.contexts.truncate(checkpoint.depth);
        self.scopes.rollback(checkpoint.depth, checkpoint.next_variable);
        // Reassignments may have widened older variables; replay to undo that.
        self.types = TypeState::new();
        for inst in &self.code {
            self.types.record(inst);
        }
    }

    /// Run `build`, restoring the builder if it fails
    fn scoped<T>(&mut self, build: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let checkpoint = self.checkpoint();
        let floor = self.block_floor;
        let result = build(self);
        self.block_floor = floor;
        if result.is_err() {
            self.rollback(checkpoint);
        }
        result
    }

    /// Run a block body. The body may not close the block it runs in and
    /// must close every block it opens.
    fn body<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let floor = self.block_floor;
        let depth = self.contexts.depth();
        self.block_floor = depth;
        let result = body(self);
        self.block_floor = floor;
        let value = result?;
        if self.contexts.depth() != depth {
            return Err(Error::MalformedProgram(format!(
                "block body left {} block(s) open",
                self.contexts.depth() - depth
            )));
        }
        Ok(value)
    }

    // Structured helpers

    pub fn build_function(
        &mut self,
        kind: FunctionKind,
        parameters: Parameters,
        body: impl FnOnce(&mut Self, &[Variable]) -> Result<()>,
    ) -> Result<Variable> {
        self.scoped(|b| {
            let (function, params) = {
                let inst = b.emit(Operation::BeginFunction { kind, parameters }, &[])?;
                (inst.outputs[0], inst.inner_outputs.clone())
            };
            b.body(|b| body(b, &params))?;
            b.emit(Operation::EndFunction { kind }, &[])?;
            Ok(function)
        })
    }

    pub fn build_if(
        &mut self,
        condition: Variable,
        body: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            b.emit(Operation::BeginIf { inverted: false }, &[condition])?;
            b.body(body)?;
            b.emit(Operation::EndIf, &[])?;
            Ok(())
        })
    }

    pub fn build_if_else(
        &mut self,
        condition: Variable,
        then_body: impl FnOnce(&mut Self) -> Result<()>,
        else_body: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            b.emit(Operation::BeginIf { inverted: false }, &[condition])?;
            b.body(then_body)?;
            b.emit(Operation::BeginElse, &[])?;
            b.body(else_body)?;
            b.emit(Operation::EndIf, &[])?;
            Ok(())
        })
    }

    /// `header` computes the loop condition, `body` runs while it holds
    pub fn build_while_loop(
        &mut self,
        header: impl FnOnce(&mut Self) -> Result<Variable>,
        body: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            b.emit(Operation::BeginWhileLoopHeader, &[])?;
            let condition = b.body(header)?;
            b.emit(Operation::BeginWhileLoopBody, &[condition])?;
            b.body(body)?;
            b.emit(Operation::EndWhileLoop, &[])?;
            Ok(())
        })
    }

    pub fn build_do_while_loop(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<()>,
        header: impl FnOnce(&mut Self) -> Result<Variable>,
    ) -> Result<()> {
        self.scoped(|b| {
            b.emit(Operation::BeginDoWhileLoopBody, &[])?;
            b.body(body)?;
            b.emit(Operation::BeginDoWhileLoopHeader, &[])?;
            let condition = b.body(header)?;
            b.emit(Operation::EndDoWhileLoop, &[condition])?;
            Ok(())
        })
    }

    /// `for (i = start; i <comparator> end; i = i <op> step)`
    #[allow(clippy::too_many_arguments)]
    pub fn build_for_loop(
        &mut self,
        start: Variable,
        comparator: Comparator,
        end: Variable,
        op: BinaryOperator,
        step: Variable,
        body: impl FnOnce(&mut Self, Variable) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            let inner = b.emit_inner(Operation::BeginForLoop { comparator, op }, &[start, end, step])?;
            b.body(|b| body(b, inner[0]))?;
            b.emit(Operation::EndForLoop, &[])?;
            Ok(())
        })
    }

    pub fn build_for_in_loop(
        &mut self,
        object: Variable,
        body: impl FnOnce(&mut Self, Variable) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            let inner = b.emit_inner(Operation::BeginForInLoop, &[object])?;
            b.body(|b| body(b, inner[0]))?;
            b.emit(Operation::EndForInLoop, &[])?;
            Ok(())
        })
    }

    pub fn build_for_of_loop(
        &mut self,
        iterable: Variable,
        body: impl FnOnce(&mut Self, Variable) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            let inner = b.emit_inner(Operation::BeginForOfLoop, &[iterable])?;
            b.body(|b| body(b, inner[0]))?;
            b.emit(Operation::EndForOfLoop, &[])?;
            Ok(())
        })
    }

    pub fn build_try_catch(
        &mut self,
        try_body: impl FnOnce(&mut Self) -> Result<()>,
        catch_body: impl FnOnce(&mut Self, Variable) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            b.emit(Operation::BeginTry, &[])?;
            b.body(try_body)?;
            b.catch_part(catch_body)?;
            b.emit(Operation::EndTryCatchFinally, &[])?;
            Ok(())
        })
    }

    pub fn build_try_finally(
        &mut self,
        try_body: impl FnOnce(&mut Self) -> Result<()>,
        finally_body: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            b.emit(Operation::BeginTry, &[])?;
            b.body(try_body)?;
            b.emit(Operation::BeginFinally, &[])?;
            b.body(finally_body)?;
            b.emit(Operation::EndTryCatchFinally, &[])?;
            Ok(())
        })
    }

    pub fn build_try_catch_finally(
        &mut self,
        try_body: impl FnOnce(&mut Self) -> Result<()>,
        catch_body: impl FnOnce(&mut Self, Variable) -> Result<()>,
        finally_body: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            b.emit(Operation::BeginTry, &[])?;
            b.body(try_body)?;
            b.catch_part(catch_body)?;
            b.emit(Operation::BeginFinally, &[])?;
            b.body(finally_body)?;
            b.emit(Operation::EndTryCatchFinally, &[])?;
            Ok(())
        })
    }

    fn catch_part(&mut self, catch_body: impl FnOnce(&mut Self, Variable) -> Result<()>) -> Result<()> {
        let inner = self.emit_inner(Operation::BeginCatch, &[])?;
        self.body(|b| catch_body(b, inner[0]))
    }

    pub fn build_with(
        &mut self,
        object: Variable,
        body: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            b.emit(Operation::BeginWith, &[object])?;
            b.body(body)?;
            b.emit(Operation::EndWith, &[])?;
            Ok(())
        })
    }

    pub fn build_block_statement(&mut self, body: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.scoped(|b| {
            b.emit(Operation::BeginBlockStatement, &[])?;
            b.body(body)?;
            b.emit(Operation::EndBlockStatement, &[])?;
            Ok(())
        })
    }

    /// Build `{ ... }`; the body runs in object literal context and adds members
    pub fn build_object_literal(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<Variable> {
        self.scoped(|b| {
            b.emit(Operation::BeginObjectLiteral, &[])?;
            b.body(body)?;
            b.emit_value(Operation::EndObjectLiteral, &[])
        })
    }

    pub fn object_literal_add_property(&mut self, name: impl Into<String>, value: Variable) -> Result<()> {
        self.emit(Operation::ObjectLiteralAddProperty { name: name.into() }, &[value])?;
        Ok(())
    }

    pub fn object_literal_add_element(&mut self, index: i64, value: Variable) -> Result<()> {
        self.emit(Operation::ObjectLiteralAddElement { index }, &[value])?;
        Ok(())
    }

    pub fn object_literal_copy_properties(&mut self, source: Variable) -> Result<()> {
        self.emit(Operation::ObjectLiteralCopyProperties, &[source])?;
        Ok(())
    }

    /// Body receives `this` and the parameters
    pub fn build_object_literal_method(
        &mut self,
        name: impl Into<String>,
        parameters: Parameters,
        body: impl FnOnce(&mut Self, Variable, &[Variable]) -> Result<()>,
    ) -> Result<()> {
        let name = name.into();
        self.scoped(|b| {
            let inner = b.emit_inner(Operation::BeginObjectLiteralMethod { name, parameters }, &[])?;
            b.body(|b| body(b, inner[0], &inner[1..]))?;
            b.emit(Operation::EndObjectLiteralMethod, &[])?;
            Ok(())
        })
    }

    pub fn build_object_literal_getter(
        &mut self,
        name: impl Into<String>,
        body: impl FnOnce(&mut Self, Variable) -> Result<()>,
    ) -> Result<()> {
        let name = name.into();
        self.scoped(|b| {
            let inner = b.emit_inner(Operation::BeginObjectLiteralGetter { name }, &[])?;
            b.body(|b| body(b, inner[0]))?;
            b.emit(Operation::EndObjectLiteralGetter, &[])?;
            Ok(())
        })
    }

    /// Body receives `this` and the assigned value
    pub fn build_object_literal_setter(
        &mut self,
        name: impl Into<String>,
        body: impl FnOnce(&mut Self, Variable, Variable) -> Result<()>,
    ) -> Result<()> {
        let name = name.into();
        self.scoped(|b| {
            let inner = b.emit_inner(Operation::BeginObjectLiteralSetter { name }, &[])?;
            b.body(|b| body(b, inner[0], inner[1]))?;
            b.emit(Operation::EndObjectLiteralSetter, &[])?;
            Ok(())
        })
    }

    /// Build a class. The class variable is visible inside the body, which
    /// runs in class definition context and adds members.
    pub fn build_class_definition(
        &mut self,
        superclass: Option<Variable>,
        body: impl FnOnce(&mut Self, Variable) -> Result<()>,
    ) -> Result<Variable> {
        self.scoped(|b| {
            let inputs: Vec<Variable> = superclass.into_iter().collect();
            let class = b.emit_value(
                Operation::BeginClassDefinition {
                    has_superclass: superclass.is_some(),
                },
                &inputs,
            )?;
            b.body(|b| body(b, class))?;
            b.emit(Operation::EndClassDefinition, &[])?;
            Ok(class)
        })
    }

    pub fn class_add_property(
        &mut self,
        name: impl Into<String>,
        value: Option<Variable>,
        is_static: bool,
    ) -> Result<()> {
        let inputs: Vec<Variable> = value.into_iter().collect();
        self.emit(
            Operation::ClassAddProperty {
                name: name.into(),
                has_value: value.is_some(),
                is_static,
            },
            &inputs,
        )?;
        Ok(())
    }

    pub fn build_class_constructor(
        &mut self,
        parameters: Parameters,
        body: impl FnOnce(&mut Self, Variable, &[Variable]) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            let inner = b.emit_inner(Operation::BeginClassConstructor { parameters }, &[])?;
            b.body(|b| body(b, inner[0], &inner[1..]))?;
            b.emit(Operation::EndClassConstructor, &[])?;
            Ok(())
        })
    }

    pub fn build_class_method(
        &mut self,
        name: impl Into<String>,
        parameters: Parameters,
        is_static: bool,
        body: impl FnOnce(&mut Self, Variable, &[Variable]) -> Result<()>,
    ) -> Result<()> {
        let name = name.into();
        self.scoped(|b| {
            let inner = b.emit_inner(
                Operation::BeginClassMethod {
                    name,
                    parameters,
                    is_static,
                },
                &[],
            )?;
            b.body(|b| body(b, inner[0], &inner[1..]))?;
            b.emit(Operation::EndClassMethod, &[])?;
            Ok(())
        })
    }

    pub fn build_class_getter(
        &mut self,
        name: impl Into<String>,
        is_static: bool,
        body: impl FnOnce(&mut Self, Variable) -> Result<()>,
    ) -> Result<()> {
        let name = name.into();
        self.scoped(|b| {
            let inner = b.emit_inner(Operation::BeginClassGetter { name, is_static }, &[])?;
            b.body(|b| body(b, inner[0]))?;
            b.emit(Operation::EndClassGetter, &[])?;
            Ok(())
        })
    }

    pub fn build_class_setter(
        &mut self,
        name: impl Into<String>,
        is_static: bool,
        body: impl FnOnce(&mut Self, Variable, Variable) -> Result<()>,
    ) -> Result<()> {
        let name = name.into();
        self.scoped(|b| {
            let inner = b.emit_inner(Operation::BeginClassSetter { name, is_static }, &[])?;
            b.body(|b| body(b, inner[0], inner[1]))?;
            b.emit(Operation::EndClassSetter, &[])?;
            Ok(())
        })
    }

    pub fn build_class_static_initializer(
        &mut self,
        body: impl FnOnce(&mut Self, Variable) -> Result<()>,
    ) -> Result<()> {
        self.scoped(|b| {
            let inner = b.emit_inner(Operation::BeginClassStaticInitializer, &[])?;
            b.body(|b| body(b, inner[0]))?;
            b.emit(Operation::EndClassStaticInitializer, &[])?;
            Ok(())
        })
    }

    /// Build a string holding code; the body runs in a fresh script context
    pub fn build_code_string(&mut self, body: impl FnOnce(&mut Self) -> Result<()>) -> Result<Variable> {
        self.scoped(|b| {
            let string = b.emit_value(Operation::BeginCodeString, &[])?;
            b.body(body)?;
            b.emit(Operation::EndCodeString, &[])?;
            Ok(string)
        })
    }

    // Plain instructions

    pub fn load_int(&mut self, value: i64) -> Result<Variable> {
        self.emit_value(Operation::LoadInteger { value }, &[])
    }

    pub fn load_float(&mut self, value: f64) -> Result<Variable> {
        self.emit_value(Operation::LoadFloat { value }, &[])
    }

    pub fn load_string(&mut self, value: impl Into<String>) -> Result<Variable> {
        self.emit_value(Operation::LoadString { value: value.into() }, &[])
    }

    pub fn load_bool(&mut self, value: bool) -> Result<Variable> {
        self.emit_value(Operation::LoadBoolean { value }, &[])
    }

    pub fn load_undefined(&mut self) -> Result<Variable> {
        self.emit_value(Operation::LoadUndefined, &[])
    }

    pub fn load_null(&mut self) -> Result<Variable> {
        self.emit_value(Operation::LoadNull, &[])
    }

    pub fn load_this(&mut self) -> Result<Variable> {
        self.emit_value(Operation::LoadThis, &[])
    }

    pub fn load_arguments(&mut self) -> Result<Variable> {
        self.emit_value(Operation::LoadArguments, &[])
    }

    pub fn load_regexp(&mut self, pattern: impl Into<String>, flags: impl Into<String>) -> Result<Variable> {
        self.emit_value(
            Operation::LoadRegExp {
                pattern: pattern.into(),
                flags: flags.into(),
            },
            &[],
        )
    }

    pub fn load_builtin(&mut self, name: impl Into<String>) -> Result<Variable> {
        self.emit_value(Operation::LoadBuiltin { name: name.into() }, &[])
    }

    pub fn load_named_variable(&mut self, name: impl Into<String>) -> Result<Variable> {
        self.emit_value(Operation::LoadNamedVariable { name: name.into() }, &[])
    }

    pub fn store_named_variable(&mut self, name: impl Into<String>, value: Variable) -> Result<()> {
        self.emit(Operation::StoreNamedVariable { name: name.into() }, &[value])?;
        Ok(())
    }

    pub fn create_object(&mut self, properties: &[(String, Variable)]) -> Result<Variable> {
        let property_names = properties.iter().map(|(n, _)| n.clone()).collect();
        let values: Vec<Variable> = properties.iter().map(|(_, v)| *v).collect();
        self.emit_value(Operation::CreateObject { property_names }, &values)
    }

    pub fn create_array(&mut self, elements: &[Variable]) -> Result<Variable> {
        self.emit_value(
            Operation::CreateArray {
                size: elements.len(),
            },
            elements,
        )
    }

    pub fn unary(&mut self, op: UnaryOperator, input: Variable) -> Result<Variable> {
        self.emit_value(Operation::UnaryOperation { op }, &[input])
    }

    pub fn binary(&mut self, lhs: Variable, op: BinaryOperator, rhs: Variable) -> Result<Variable> {
        self.emit_value(Operation::BinaryOperation { op }, &[lhs, rhs])
    }

    /// `target <op>= value`
    pub fn update(&mut self, target: Variable, op: BinaryOperator, value: Variable) -> Result<()> {
        self.emit(Operation::Update { op }, &[target, value])?;
        Ok(())
    }

    pub fn compare(&mut self, lhs: Variable, op: Comparator, rhs: Variable) -> Result<Variable> {
        self.emit_value(Operation::Compare { op }, &[lhs, rhs])
    }

    pub fn type_of_value(&mut self, value: Variable) -> Result<Variable> {
        self.emit_value(Operation::TypeOf, &[value])
    }

    pub fn instance_of(&mut self, value: Variable, constructor: Variable) -> Result<Variable> {
        self.emit_value(Operation::InstanceOf, &[value, constructor])
    }

    pub fn is_in(&mut self, property: Variable, object: Variable) -> Result<Variable> {
        self.emit_value(Operation::In, &[property, object])
    }

    pub fn dup(&mut self, value: Variable) -> Result<Variable> {
        self.emit_value(Operation::Dup, &[value])
    }

    pub fn reassign(&mut self, target: Variable, value: Variable) -> Result<()> {
        self.emit(Operation::Reassign, &[target, value])?;
        Ok(())
    }

    pub fn get_property(&mut self, object: Variable, name: impl Into<String>) -> Result<Variable> {
        self.emit_value(Operation::GetProperty { name: name.into() }, &[object])
    }

    pub fn set_property(&mut self, object: Variable, name: impl Into<String>, value: Variable) -> Result<()> {
        self.emit(Operation::SetProperty { name: name.into() }, &[object, value])?;
        Ok(())
    }

    pub fn delete_property(&mut self, object: Variable, name: impl Into<String>) -> Result<Variable> {
        self.emit_value(Operation::DeleteProperty { name: name.into() }, &[object])
    }

    pub fn get_element(&mut self, object: Variable, index: i64) -> Result<Variable> {
        self.emit_value(Operation::GetElement { index }, &[object])
    }

    pub fn set_element(&mut self, object: Variable, index: i64, value: Variable) -> Result<()> {
        self.emit(Operation::SetElement { index }, &[object, value])?;
        Ok(())
    }

    pub fn get_computed_property(&mut self, object: Variable, property: Variable) -> Result<Variable> {
        self.emit_value(Operation::GetComputedProperty, &[object, property])
    }

    pub fn set_computed_property(
        &mut self,
        object: Variable,
        property: Variable,
        value: Variable,
    ) -> Result<()> {
        self.emit(Operation::SetComputedProperty, &[object, property, value])?;
        Ok(())
    }

    pub fn call_function(&mut self, function: Variable, arguments: &[Variable]) -> Result<Variable> {
        let mut inputs = vec![function];
        inputs.extend_from_slice(arguments);
        self.emit_value(
            Operation::CallFunction {
                arguments: arguments.len(),
            },
            &inputs,
        )
    }

    pub fn call_method(
        &mut self,
        object: Variable,
        name: impl Into<String>,
        arguments: &[Variable],
    ) -> Result<Variable> {
        let mut inputs = vec![object];
        inputs.extend_from_slice(arguments);
        self.emit_value(
            Operation::CallMethod {
                name: name.into(),
                arguments: arguments.len(),
            },
            &inputs,
        )
    }

    pub fn construct(&mut self, constructor: Variable, arguments: &[Variable]) -> Result<Variable> {
        let mut inputs = vec![constructor];
        inputs.extend_from_slice(arguments);
        self.emit_value(
            Operation::Construct {
                arguments: arguments.len(),
            },
            &inputs,
        )
    }

    pub fn call_super_constructor(&mut self, arguments: &[Variable]) -> Result<()> {
        self.emit(
            Operation::CallSuperConstructor {
                arguments: arguments.len(),
            },
            arguments,
        )?;
        Ok(())
    }

    pub fn do_return(&mut self, value: Variable) -> Result<()> {
        self.emit(Operation::Return, &[value])?;
        Ok(())
    }

    pub fn yield_value(&mut self, value: Variable) -> Result<Variable> {
        self.emit_value(Operation::Yield, &[value])
    }

    pub fn await_value(&mut self, value: Variable) -> Result<Variable> {
        self.emit_value(Operation::Await, &[value])
    }

    pub fn do_break(&mut self) -> Result<()> {
        self.emit(Operation::Break, &[])?;
        Ok(())
    }

    pub fn do_continue(&mut self) -> Result<()> {
        self.emit(Operation::Continue, &[])?;
        Ok(())
    }

    pub fn throw_exception(&mut self, value: Variable) -> Result<()> {
        self.emit(Operation::ThrowException, &[value])?;
        Ok(())
    }
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}
