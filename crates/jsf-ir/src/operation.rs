//! Operation set of the IR.
//!
//! Every instruction kind is one variant of [`Operation`]. All structural
//! facts about an operation (arity, context requirements, block pairing) are
//! answered here by exhaustive matches, so adding a variant forces every
//! table to be updated.

use crate::context::Context;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Minus,
    Plus,
    LogicalNot,
    BitwiseNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOperator {
    pub const ALL: [UnaryOperator; 8] = [
        UnaryOperator::Minus,
        UnaryOperator::Plus,
        UnaryOperator::LogicalNot,
        UnaryOperator::BitwiseNot,
        UnaryOperator::PreInc,
        UnaryOperator::PreDec,
        UnaryOperator::PostInc,
        UnaryOperator::PostDec,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::LogicalNot => "!",
            UnaryOperator::BitwiseNot => "~",
            UnaryOperator::PreInc => "++x",
            UnaryOperator::PreDec => "--x",
            UnaryOperator::PostInc => "x++",
            UnaryOperator::PostDec => "x--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    BitAnd,
    BitOr,
    Xor,
    LShift,
    RShift,
    UnRShift,
    LogicalAnd,
    LogicalOr,
    NullishCoalesce,
}

impl BinaryOperator {
    pub const ALL: [BinaryOperator; 15] = [
        BinaryOperator::Add,
        BinaryOperator::Sub,
        BinaryOperator::Mul,
        BinaryOperator::Div,
        BinaryOperator::Mod,
        BinaryOperator::Exp,
        BinaryOperator::BitAnd,
        BinaryOperator::BitOr,
        BinaryOperator::Xor,
        BinaryOperator::LShift,
        BinaryOperator::RShift,
        BinaryOperator::UnRShift,
        BinaryOperator::LogicalAnd,
        BinaryOperator::LogicalOr,
        BinaryOperator::NullishCoalesce,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Exp => "**",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::Xor => "^",
            BinaryOperator::LShift => "<<",
            BinaryOperator::RShift => ">>",
            BinaryOperator::UnRShift => ">>>",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::LogicalOr => "||",
            BinaryOperator::NullishCoalesce => "??",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Equal,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Comparator {
    pub const ALL: [Comparator; 8] = [
        Comparator::Equal,
        Comparator::StrictEqual,
        Comparator::NotEqual,
        Comparator::StrictNotEqual,
        Comparator::LessThan,
        Comparator::LessThanOrEqual,
        Comparator::GreaterThan,
        Comparator::GreaterThanOrEqual,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Comparator::Equal => "==",
            Comparator::StrictEqual => "===",
            Comparator::NotEqual => "!=",
            Comparator::StrictNotEqual => "!==",
            Comparator::LessThan => "<",
            Comparator::LessThanOrEqual => "<=",
            Comparator::GreaterThan => ">",
            Comparator::GreaterThanOrEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    Plain,
    Arrow,
    Generator,
    Async,
    AsyncArrow,
    AsyncGenerator,
}

impl FunctionKind {
    pub const ALL: [FunctionKind; 6] = [
        FunctionKind::Plain,
        FunctionKind::Arrow,
        FunctionKind::Generator,
        FunctionKind::Async,
        FunctionKind::AsyncArrow,
        FunctionKind::AsyncGenerator,
    ];

    pub fn is_async(&self) -> bool {
        matches!(
            self,
            FunctionKind::Async | FunctionKind::AsyncArrow | FunctionKind::AsyncGenerator
        )
    }

    pub fn is_generator(&self) -> bool {
        matches!(self, FunctionKind::Generator | FunctionKind::AsyncGenerator)
    }

    fn context(&self) -> Context {
        let mut ctx = Context::SCRIPT | Context::SUBROUTINE;
        if self.is_async() {
            ctx |= Context::ASYNC_FUNCTION;
        }
        if self.is_generator() {
            ctx |= Context::GENERATOR_FUNCTION;
        }
        ctx
    }
}

/// Formal parameter list of a function or method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameters {
    pub count: usize,
    /// The last parameter is a rest parameter
    pub has_rest: bool,
}

impl Parameters {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            has_rest: false,
        }
    }
}

/// Identifies which opener/closer operations belong to the same block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    Function(FunctionKind),
    If,
    WhileLoop,
    DoWhileLoop,
    ForLoop,
    ForInLoop,
    ForOfLoop,
    TryCatch,
    With,
    BlockStatement,
    ObjectLiteral,
    ObjectLiteralMethod,
    ObjectLiteralGetter,
    ObjectLiteralSetter,
    ClassDefinition,
    ClassConstructor,
    ClassMethod,
    ClassGetter,
    ClassSetter,
    ClassStaticInitializer,
    CodeString,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    // Values
    LoadInteger { value: i64 },
    LoadFloat { value: f64 },
    LoadString { value: String },
    LoadBoolean { value: bool },
    LoadUndefined,
    LoadNull,
    LoadThis,
    LoadArguments,
    LoadRegExp { pattern: String, flags: String },
    LoadBuiltin { name: String },
    LoadNamedVariable { name: String },
    StoreNamedVariable { name: String },
    CreateObject { property_names: Vec<String> },
    CreateArray { size: usize },

    // Operators
    UnaryOperation { op: UnaryOperator },
    BinaryOperation { op: BinaryOperator },
    Update { op: BinaryOperator },
    Compare { op: Comparator },
    TypeOf,
    InstanceOf,
    In,
    Dup,
    Reassign,

    // Properties
    GetProperty { name: String },
    SetProperty { name: String },
    DeleteProperty { name: String },
    GetElement { index: i64 },
    SetElement { index: i64 },
    GetComputedProperty,
    SetComputedProperty,

    // Calls
    CallFunction { arguments: usize },
    CallMethod { name: String, arguments: usize },
    Construct { arguments: usize },
    CallSuperConstructor { arguments: usize },

    // Scope exits
    Return,
    Yield,
    Await,
    Break,
    Continue,
    ThrowException,

    // Functions
    BeginFunction { kind: FunctionKind, parameters: Parameters },
    EndFunction { kind: FunctionKind },

    // Conditionals
    BeginIf { inverted: bool },
    BeginElse,
    EndIf,

    // Loops
    BeginWhileLoopHeader,
    BeginWhileLoopBody,
    EndWhileLoop,
    BeginDoWhileLoopBody,
    BeginDoWhileLoopHeader,
    EndDoWhileLoop,
    BeginForLoop { comparator: Comparator, op: BinaryOperator },
    EndForLoop,
    BeginForInLoop,
    EndForInLoop,
    BeginForOfLoop,
    EndForOfLoop,

    // Exceptions
    BeginTry,
    BeginCatch,
    BeginFinally,
    EndTryCatchFinally,

    // Plain blocks
    BeginWith,
    EndWith,
    BeginBlockStatement,
    EndBlockStatement,

    // Object literals
    BeginObjectLiteral,
    ObjectLiteralAddProperty { name: String },
    ObjectLiteralAddElement { index: i64 },
    ObjectLiteralCopyProperties,
    BeginObjectLiteralMethod { name: String, parameters: Parameters },
    EndObjectLiteralMethod,
    BeginObjectLiteralGetter { name: String },
    EndObjectLiteralGetter,
    BeginObjectLiteralSetter { name: String },
    EndObjectLiteralSetter,
    EndObjectLiteral,

    // Classes
    BeginClassDefinition { has_superclass: bool },
    ClassAddProperty { name: String, has_value: bool, is_static: bool },
    BeginClassConstructor { parameters: Parameters },
    EndClassConstructor,
    BeginClassMethod { name: String, parameters: Parameters, is_static: bool },
    EndClassMethod,
    BeginClassGetter { name: String, is_static: bool },
    EndClassGetter,
    BeginClassSetter { name: String, is_static: bool },
    EndClassSetter,
    BeginClassStaticInitializer,
    EndClassStaticInitializer,
    EndClassDefinition,

    // Code strings
    BeginCodeString,
    EndCodeString,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        use Operation::*;
        match self {
            LoadInteger { .. } => "LoadInteger",
            LoadFloat { .. } => "LoadFloat",
            LoadString { .. } => "LoadString",
            LoadBoolean { .. } => "LoadBoolean",
            LoadUndefined => "LoadUndefined",
            LoadNull => "LoadNull",
            LoadThis => "LoadThis",
            LoadArguments => "LoadArguments",
            LoadRegExp { .. } => "LoadRegExp",
            LoadBuiltin { .. } => "LoadBuiltin",
            LoadNamedVariable { .. } => "LoadNamedVariable",
            StoreNamedVariable { .. } => "StoreNamedVariable",
            CreateObject { .. } => "CreateObject",
            CreateArray { .. } => "CreateArray",
            UnaryOperation { .. } => "UnaryOperation",
            BinaryOperation { .. } => "BinaryOperation",
            Update { .. } => "Update",
            Compare { .. } => "Compare",
            TypeOf => "TypeOf",
            InstanceOf => "InstanceOf",
            In => "In",
            Dup => "Dup",
            Reassign => "Reassign",
            GetProperty { .. } => "GetProperty",
            SetProperty { .. } => "SetProperty",
            DeleteProperty { .. } => "DeleteProperty",
            GetElement { .. } => "GetElement",
            SetElement { .. } => "SetElement",
            GetComputedProperty => "GetComputedProperty",
            SetComputedProperty => "SetComputedProperty",
            CallFunction { .. } => "CallFunction",
            CallMethod { .. } => "CallMethod",
            Construct { .. } => "Construct",
            CallSuperConstructor { .. } => "CallSuperConstructor",
            Return => "Return",
            Yield => "Yield",
            Await => "Await",
            Break => "Break",
            Continue => "Continue",
            ThrowException => "ThrowException",
            BeginFunction { .. } => "BeginFunction",
            EndFunction { .. } => "EndFunction",
            BeginIf { .. } => "BeginIf",
            BeginElse => "BeginElse",
            EndIf => "EndIf",
            BeginWhileLoopHeader => "BeginWhileLoopHeader",
            BeginWhileLoopBody => "BeginWhileLoopBody",
            EndWhileLoop => "EndWhileLoop",
            BeginDoWhileLoopBody => "BeginDoWhileLoopBody",
            BeginDoWhileLoopHeader => "BeginDoWhileLoopHeader",
            EndDoWhileLoop => "EndDoWhileLoop",
            BeginForLoop { .. } => "BeginForLoop",
            EndForLoop => "EndForLoop",
            BeginForInLoop => "BeginForInLoop",
            EndForInLoop => "EndForInLoop",
            BeginForOfLoop => "BeginForOfLoop",
            EndForOfLoop => "EndForOfLoop",
            BeginTry => "BeginTry",
            BeginCatch => "BeginCatch",
            BeginFinally => "BeginFinally",
            EndTryCatchFinally => "EndTryCatchFinally",
            BeginWith => "BeginWith",
            EndWith => "EndWith",
            BeginBlockStatement => "BeginBlockStatement",
            EndBlockStatement => "EndBlockStatement",
            BeginObjectLiteral => "BeginObjectLiteral",
            ObjectLiteralAddProperty { .. } => "ObjectLiteralAddProperty",
            ObjectLiteralAddElement { .. } => "ObjectLiteralAddElement",
            ObjectLiteralCopyProperties => "ObjectLiteralCopyProperties",
            BeginObjectLiteralMethod { .. } => "BeginObjectLiteralMethod",
            EndObjectLiteralMethod => "EndObjectLiteralMethod",
            BeginObjectLiteralGetter { .. } => "BeginObjectLiteralGetter",
            EndObjectLiteralGetter => "EndObjectLiteralGetter",
            BeginObjectLiteralSetter { .. } => "BeginObjectLiteralSetter",
            EndObjectLiteralSetter => "EndObjectLiteralSetter",
            EndObjectLiteral => "EndObjectLiteral",
            BeginClassDefinition { .. } => "BeginClassDefinition",
            ClassAddProperty { .. } => "ClassAddProperty",
            BeginClassConstructor { .. } => "BeginClassConstructor",
            EndClassConstructor => "EndClassConstructor",
            BeginClassMethod { .. } => "BeginClassMethod",
            EndClassMethod => "EndClassMethod",
            BeginClassGetter { .. } => "BeginClassGetter",
            EndClassGetter => "EndClassGetter",
            BeginClassSetter { .. } => "BeginClassSetter",
            EndClassSetter => "EndClassSetter",
            BeginClassStaticInitializer => "BeginClassStaticInitializer",
            EndClassStaticInitializer => "EndClassStaticInitializer",
            EndClassDefinition => "EndClassDefinition",
            BeginCodeString => "BeginCodeString",
            EndCodeString => "EndCodeString",
        }
    }

    /// Number of input variables this operation consumes
    pub fn num_inputs(&self) -> usize {
        use Operation::*;
        match self {
            LoadInteger { .. } | LoadFloat { .. } | LoadString { .. } | LoadBoolean { .. }
            | LoadUndefined | LoadNull | LoadThis | LoadArguments | LoadRegExp { .. }
            | LoadBuiltin { .. } | LoadNamedVariable { .. } => 0,
            StoreNamedVariable { .. } => 1,
            CreateObject { property_names } => property_names.len(),
            CreateArray { size } => *size,

            UnaryOperation { .. } | TypeOf | Dup => 1,
            BinaryOperation { .. } | Update { .. } | Compare { .. } | InstanceOf | In
            | Reassign => 2,

            GetProperty { .. } | DeleteProperty { .. } | GetElement { .. } => 1,
            SetProperty { .. } | SetElement { .. } | GetComputedProperty => 2,
            SetComputedProperty => 3,

            CallFunction { arguments } | CallMethod { arguments, .. } | Construct { arguments } => {
                1 + arguments
            }
            CallSuperConstructor { arguments } => *arguments,

            Return | Yield | Await | ThrowException => 1,
            Break | Continue => 0,

            BeginFunction { .. } | EndFunction { .. } => 0,
            BeginIf { .. } => 1,
            BeginElse | EndIf => 0,
            BeginWhileLoopHeader | EndWhileLoop => 0,
            BeginWhileLoopBody => 1,
            BeginDoWhileLoopBody | BeginDoWhileLoopHeader => 0,
            EndDoWhileLoop => 1,
            BeginForLoop { .. } => 3,
            BeginForInLoop | BeginForOfLoop => 1,
            EndForLoop | EndForInLoop | EndForOfLoop => 0,
            BeginTry | BeginCatch | BeginFinally | EndTryCatchFinally => 0,
            BeginWith => 1,
            EndWith | BeginBlockStatement | EndBlockStatement => 0,

            BeginObjectLiteral | EndObjectLiteral => 0,
            ObjectLiteralAddProperty { .. } | ObjectLiteralAddElement { .. }
            | ObjectLiteralCopyProperties => 1,
            BeginObjectLiteralMethod { .. } | EndObjectLiteralMethod
            | BeginObjectLiteralGetter { .. } | EndObjectLiteralGetter
            | BeginObjectLiteralSetter { .. } | EndObjectLiteralSetter => 0,

            BeginClassDefinition { has_superclass } => usize::from(*has_superclass),
            ClassAddProperty { has_value, .. } => usize::from(*has_value),
            BeginClassConstructor { .. } | EndClassConstructor | BeginClassMethod { .. }
            | EndClassMethod | BeginClassGetter { .. } | EndClassGetter
            | BeginClassSetter { .. } | EndClassSetter | BeginClassStaticInitializer
            | EndClassStaticInitializer | EndClassDefinition => 0,

            BeginCodeString | EndCodeString => 0,
        }
    }

    /// Number of variables defined in the surrounding scope
    pub fn num_outputs(&self) -> usize {
        use Operation::*;
        match self {
            LoadInteger { .. } | LoadFloat { .. } | LoadString { .. } | LoadBoolean { .. }
            | LoadUndefined | LoadNull | LoadThis | LoadArguments | LoadRegExp { .. }
            | LoadBuiltin { .. } | LoadNamedVariable { .. } | CreateObject { .. }
            | CreateArray { .. } => 1,
            UnaryOperation { .. } | BinaryOperation { .. } | Compare { .. } | TypeOf
            | InstanceOf | In | Dup => 1,
            GetProperty { .. } | DeleteProperty { .. } | GetElement { .. }
            | GetComputedProperty => 1,
            CallFunction { .. } | CallMethod { .. } | Construct { .. } => 1,
            Yield | Await => 1,
            BeginFunction { .. } | EndObjectLiteral | BeginClassDefinition { .. }
            | BeginCodeString => 1,
            _ => 0,
        }
    }

    /// Number of variables bound inside the block this operation opens
    pub fn num_inner_outputs(&self) -> usize {
        use Operation::*;
        match self {
            BeginFunction { parameters, .. } => parameters.count,
            BeginForLoop { .. } | BeginForInLoop | BeginForOfLoop | BeginCatch => 1,
            BeginObjectLiteralMethod { parameters, .. } => 1 + parameters.count,
            BeginObjectLiteralGetter { .. } => 1,
            BeginObjectLiteralSetter { .. } => 2,
            BeginClassConstructor { parameters } => 1 + parameters.count,
            BeginClassMethod { parameters, .. } => 1 + parameters.count,
            BeginClassGetter { .. } | BeginClassStaticInitializer => 1,
            BeginClassSetter { .. } => 2,
            _ => 0,
        }
    }

    /// Flags that must all be active for this operation to be legal.
    ///
    /// Closers and middle operations (`BeginElse`, `BeginCatch`, ...) carry no
    /// requirement of their own: their legality is the structural match with
    /// the currently open block.
    pub fn required_context(&self) -> Context {
        use Operation::*;
        if self.is_block_end() {
            return Context::EMPTY;
        }
        match self {
            LoadArguments | Return => Context::SCRIPT | Context::SUBROUTINE,
            Yield => Context::SCRIPT | Context::GENERATOR_FUNCTION,
            Await => Context::SCRIPT | Context::ASYNC_FUNCTION,
            Break | Continue => Context::SCRIPT | Context::LOOP,
            CallSuperConstructor { .. } => Context::SCRIPT | Context::SUPER_CALL,

            ObjectLiteralAddProperty { .. } | ObjectLiteralAddElement { .. }
            | ObjectLiteralCopyProperties | BeginObjectLiteralMethod { .. }
            | BeginObjectLiteralGetter { .. } | BeginObjectLiteralSetter { .. } => {
                Context::OBJECT_LITERAL
            }

            ClassAddProperty { .. } | BeginClassConstructor { .. } | BeginClassMethod { .. }
            | BeginClassGetter { .. } | BeginClassSetter { .. }
            | BeginClassStaticInitializer => Context::CLASS_DEFINITION,

            _ => Context::SCRIPT,
        }
    }

    /// Flags that must not be active for this operation to be legal
    pub fn incompatible_context(&self) -> Context {
        match self {
            Operation::BeginWith => Context::STRICT,
            _ => Context::EMPTY,
        }
    }

    pub fn is_legal_in(&self, context: Context) -> bool {
        context.permits(self.required_context(), self.incompatible_context())
    }

    /// Flags entered by the block this operation opens
    pub fn context_opened(&self) -> Context {
        use Operation::*;
        match self {
            BeginFunction { kind, .. } => kind.context(),
            BeginWhileLoopBody | BeginDoWhileLoopBody | BeginForLoop { .. } | BeginForInLoop
            | BeginForOfLoop => Context::LOOP,
            BeginWith => Context::WITH,
            BeginObjectLiteral => Context::OBJECT_LITERAL,
            BeginObjectLiteralMethod { .. } | BeginObjectLiteralGetter { .. }
            | BeginObjectLiteralSetter { .. } => {
                Context::SCRIPT | Context::SUBROUTINE | Context::METHOD
            }
            BeginClassDefinition { has_superclass: true } => {
                Context::CLASS_DEFINITION | Context::SUPER_CALL
            }
            BeginClassDefinition { has_superclass: false } => Context::CLASS_DEFINITION,
            BeginClassConstructor { .. } | BeginClassMethod { .. } | BeginClassGetter { .. }
            | BeginClassSetter { .. } | BeginClassStaticInitializer => {
                Context::SCRIPT
                    | Context::SUBROUTINE
                    | Context::METHOD
                    | Context::CLASS_METHOD
                    | Context::STRICT
            }
            BeginCodeString => Context::SCRIPT,
            _ => Context::EMPTY,
        }
    }

    /// Whether the opened block inherits the surrounding context
    pub fn propagates_surrounding_context(&self) -> bool {
        use Operation::*;
        matches!(
            self,
            BeginIf { .. }
                | BeginElse
                | BeginWhileLoopHeader
                | BeginWhileLoopBody
                | BeginDoWhileLoopBody
                | BeginDoWhileLoopHeader
                | BeginForLoop { .. }
                | BeginForInLoop
                | BeginForOfLoop
                | BeginTry
                | BeginCatch
                | BeginFinally
                | BeginWith
                | BeginBlockStatement
        )
    }

    /// Flags of the surrounding context that carry over into the opened block.
    ///
    /// Strictness survives every boundary. A constructor keeps `SUPER_CALL`
    /// from its class definition; nothing else does.
    pub fn inherited_context(&self) -> Context {
        if self.propagates_surrounding_context() {
            return Context::ALL;
        }
        match self {
            Operation::BeginClassConstructor { .. } => Context::STRICT | Context::SUPER_CALL,
            _ => Context::STRICT,
        }
    }

    /// Block this operation opens, continues or closes
    pub fn block_kind(&self) -> Option<BlockKind> {
        use Operation::*;
        let kind = match self {
            BeginFunction { kind, .. } | EndFunction { kind } => BlockKind::Function(*kind),
            BeginIf { .. } | BeginElse | EndIf => BlockKind::If,
            BeginWhileLoopHeader | BeginWhileLoopBody | EndWhileLoop => BlockKind::WhileLoop,
            BeginDoWhileLoopBody | BeginDoWhileLoopHeader | EndDoWhileLoop => {
                BlockKind::DoWhileLoop
            }
            BeginForLoop { .. } | EndForLoop => BlockKind::ForLoop,
            BeginForInLoop | EndForInLoop => BlockKind::ForInLoop,
            BeginForOfLoop | EndForOfLoop => BlockKind::ForOfLoop,
            BeginTry | BeginCatch | BeginFinally | EndTryCatchFinally => BlockKind::TryCatch,
            BeginWith | EndWith => BlockKind::With,
            BeginBlockStatement | EndBlockStatement => BlockKind::BlockStatement,
            BeginObjectLiteral | EndObjectLiteral => BlockKind::ObjectLiteral,
            BeginObjectLiteralMethod { .. } | EndObjectLiteralMethod => {
                BlockKind::ObjectLiteralMethod
            }
            BeginObjectLiteralGetter { .. } | EndObjectLiteralGetter => {
                BlockKind::ObjectLiteralGetter
            }
            BeginObjectLiteralSetter { .. } | EndObjectLiteralSetter => {
                BlockKind::ObjectLiteralSetter
            }
            BeginClassDefinition { .. } | EndClassDefinition => BlockKind::ClassDefinition,
            BeginClassConstructor { .. } | EndClassConstructor => BlockKind::ClassConstructor,
            BeginClassMethod { .. } | EndClassMethod => BlockKind::ClassMethod,
            BeginClassGetter { .. } | EndClassGetter => BlockKind::ClassGetter,
            BeginClassSetter { .. } | EndClassSetter => BlockKind::ClassSetter,
            BeginClassStaticInitializer | EndClassStaticInitializer => {
                BlockKind::ClassStaticInitializer
            }
            BeginCodeString | EndCodeString => BlockKind::CodeString,
            _ => return None,
        };
        Some(kind)
    }

    /// Opens a block. Middle operations both close and open.
    pub fn is_block_start(&self) -> bool {
        use Operation::*;
        matches!(
            self,
            BeginFunction { .. }
                | BeginIf { .. }
                | BeginElse
                | BeginWhileLoopHeader
                | BeginWhileLoopBody
                | BeginDoWhileLoopBody
                | BeginDoWhileLoopHeader
                | BeginForLoop { .. }
                | BeginForInLoop
                | BeginForOfLoop
                | BeginTry
                | BeginCatch
                | BeginFinally
                | BeginWith
                | BeginBlockStatement
                | BeginObjectLiteral
                | BeginObjectLiteralMethod { .. }
                | BeginObjectLiteralGetter { .. }
                | BeginObjectLiteralSetter { .. }
                | BeginClassDefinition { .. }
                | BeginClassConstructor { .. }
                | BeginClassMethod { .. }
                | BeginClassGetter { .. }
                | BeginClassSetter { .. }
                | BeginClassStaticInitializer
                | BeginCodeString
        )
    }

    pub fn is_block_end(&self) -> bool {
        use Operation::*;
        matches!(
            self,
            EndFunction { .. }
                | BeginElse
                | EndIf
                | BeginWhileLoopBody
                | EndWhileLoop
                | BeginDoWhileLoopHeader
                | EndDoWhileLoop
                | EndForLoop
                | EndForInLoop
                | EndForOfLoop
                | BeginCatch
                | BeginFinally
                | EndTryCatchFinally
                | EndWith
                | EndBlockStatement
                | EndObjectLiteralMethod
                | EndObjectLiteralGetter
                | EndObjectLiteralSetter
                | EndObjectLiteral
                | EndClassConstructor
                | EndClassMethod
                | EndClassGetter
                | EndClassSetter
                | EndClassStaticInitializer
                | EndClassDefinition
                | EndCodeString
        )
    }

    /// A closer that also opens the next part of the same block
    pub fn is_block_middle(&self) -> bool {
        self.is_block_start() && self.is_block_end()
    }

    pub fn is_block_operation(&self) -> bool {
        self.is_block_start() || self.is_block_end()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operation::*;
        write!(f, "{}", self.name())?;
        match self {
            LoadInteger { value } => write!(f, " {}", value),
            LoadFloat { value } => write!(f, " {:?}", value),
            LoadString { value } => write!(f, " {:?}", value),
            LoadBoolean { value } => write!(f, " {}", value),
            LoadRegExp { pattern, flags } => write!(f, " /{}/{}", pattern, flags),
            LoadBuiltin { name } | LoadNamedVariable { name } | StoreNamedVariable { name }
            | GetProperty { name } | SetProperty { name } | DeleteProperty { name }
            | ObjectLiteralAddProperty { name } | BeginObjectLiteralGetter { name }
            | BeginObjectLiteralSetter { name } => write!(f, " '{}'", name),
            CreateObject { property_names } => write!(f, " [{}]", property_names.join(", ")),
            UnaryOperation { op } => write!(f, " '{}'", op.token()),
            BinaryOperation { op } | Update { op } => write!(f, " '{}'", op.token()),
            Compare { op } => write!(f, " '{}'", op.token()),
            GetElement { index } | SetElement { index } | ObjectLiteralAddElement { index } => {
                write!(f, " {}", index)
            }
            CallMethod { name, .. } => write!(f, " '{}'", name),
            BeginFunction { kind, parameters } => {
                write!(f, " {:?} ({} params{})", kind, parameters.count, rest(parameters))
            }
            EndFunction { kind } => write!(f, " {:?}", kind),
            BeginIf { inverted: true } => write!(f, " inverted"),
            BeginForLoop { comparator, op } => {
                write!(f, " '{}' '{}'", comparator.token(), op.token())
            }
            BeginObjectLiteralMethod { name, parameters } => {
                write!(f, " '{}' ({} params{})", name, parameters.count, rest(parameters))
            }
            BeginClassDefinition { has_superclass: true } => write!(f, " extends"),
            ClassAddProperty { name, is_static, .. } | BeginClassGetter { name, is_static }
            | BeginClassSetter { name, is_static } => {
                write!(f, "{} '{}'", if *is_static { " static" } else { "" }, name)
            }
            BeginClassConstructor { parameters } => {
                write!(f, " ({} params{})", parameters.count, rest(parameters))
            }
            BeginClassMethod { name, parameters, is_static } => write!(
                f,
                "{} '{}' ({} params{})",
                if *is_static { " static" } else { "" },
                name,
                parameters.count,
                rest(parameters)
            ),
            _ => Ok(()),
        }
    }
}

fn rest(parameters: &Parameters) -> &'static str {
    if parameters.has_rest {
        ", rest"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert_eq!(Operation::LoadInteger { value: 1 }.num_inputs(), 0);
        assert_eq!(Operation::LoadInteger { value: 1 }.num_outputs(), 1);
        assert_eq!(Operation::CallFunction { arguments: 3 }.num_inputs(), 4);
        assert_eq!(Operation::SetComputedProperty.num_outputs(), 0);
        assert_eq!(Operation::BeginClassDefinition { has_superclass: true }.num_inputs(), 1);

        let func = Operation::BeginFunction {
            kind: FunctionKind::Plain,
            parameters: Parameters::new(3),
        };
        assert_eq!(func.num_outputs(), 1);
        assert_eq!(func.num_inner_outputs(), 3);

        let method = Operation::BeginClassMethod {
            name: "m".to_string(),
            parameters: Parameters::new(2),
            is_static: false,
        };
        assert_eq!(method.num_inner_outputs(), 3);
    }

    #[test]
    fn test_block_structure() {
        assert!(Operation::BeginIf { inverted: false }.is_block_start());
        assert!(!Operation::BeginIf { inverted: false }.is_block_end());
        assert!(Operation::BeginElse.is_block_middle());
        assert!(Operation::BeginCatch.is_block_middle());
        assert!(Operation::EndIf.is_block_end());
        assert!(!Operation::LoadNull.is_block_operation());

        assert_eq!(Operation::BeginElse.block_kind(), Operation::EndIf.block_kind());
        assert_ne!(Operation::EndIf.block_kind(), Operation::EndWith.block_kind());
        assert_eq!(
            Operation::BeginFunction { kind: FunctionKind::Async, parameters: Parameters::new(0) }
                .block_kind(),
            Operation::EndFunction { kind: FunctionKind::Async }.block_kind()
        );
        assert_ne!(
            Operation::BeginFunction { kind: FunctionKind::Async, parameters: Parameters::new(0) }
                .block_kind(),
            Operation::EndFunction { kind: FunctionKind::Plain }.block_kind()
        );
    }

    #[test]
    fn test_block_start_and_end_tables_agree_with_block_kind() {
        let ops = [
            Operation::BeginWhileLoopHeader,
            Operation::BeginWhileLoopBody,
            Operation::EndWhileLoop,
            Operation::BeginDoWhileLoopBody,
            Operation::BeginDoWhileLoopHeader,
            Operation::EndDoWhileLoop,
            Operation::BeginTry,
            Operation::BeginFinally,
            Operation::EndTryCatchFinally,
            Operation::BeginObjectLiteral,
            Operation::EndObjectLiteral,
            Operation::BeginCodeString,
            Operation::EndCodeString,
            Operation::BeginClassStaticInitializer,
            Operation::EndClassStaticInitializer,
        ];
        for op in ops {
            assert!(op.is_block_operation(), "{} should be a block operation", op);
            assert!(op.block_kind().is_some(), "{} should have a block kind", op);
        }
        assert!(Operation::Return.block_kind().is_none());
    }

    #[test]
    fn test_context_requirements() {
        let script = Context::SCRIPT;
        assert!(Operation::LoadNull.is_legal_in(script));
        assert!(!Operation::Return.is_legal_in(script));
        assert!(Operation::Return.is_legal_in(script | Context::SUBROUTINE));
        assert!(!Operation::Break.is_legal_in(script | Context::SUBROUTINE));
        assert!(!Operation::LoadNull.is_legal_in(Context::OBJECT_LITERAL));
        assert!(Operation::ObjectLiteralCopyProperties.is_legal_in(Context::OBJECT_LITERAL));
        assert!(!Operation::BeginWith.is_legal_in(script | Context::STRICT));
        let super_call = Operation::CallSuperConstructor { arguments: 0 };
        assert!(!super_call.is_legal_in(script | Context::CLASS_METHOD));
        assert!(super_call.is_legal_in(script | Context::SUPER_CALL));
        assert!(Operation::EndIf.is_legal_in(Context::EMPTY));
    }

    #[test]
    fn test_opened_contexts() {
        let generator = Operation::BeginFunction {
            kind: FunctionKind::AsyncGenerator,
            parameters: Parameters::new(0),
        };
        assert_eq!(
            generator.context_opened(),
            Context::SCRIPT
                | Context::SUBROUTINE
                | Context::ASYNC_FUNCTION
                | Context::GENERATOR_FUNCTION
        );
        assert!(!generator.propagates_surrounding_context());
        assert_eq!(Operation::BeginForOfLoop.context_opened(), Context::LOOP);
        assert!(Operation::BeginForOfLoop.propagates_surrounding_context());
        assert_eq!(Operation::BeginCodeString.context_opened(), Context::SCRIPT);
        assert_eq!(generator.inherited_context(), Context::STRICT);
        assert_eq!(Operation::BeginForOfLoop.inherited_context(), Context::ALL);
        assert!(Operation::BeginClassDefinition { has_superclass: true }
            .context_opened()
            .contains(Context::SUPER_CALL));
        assert!(!Operation::BeginClassDefinition { has_superclass: false }
            .context_opened()
            .contains(Context::SUPER_CALL));
    }

    #[test]
    fn test_display() {
        assert_eq!(Operation::LoadInteger { value: 42 }.to_string(), "LoadInteger 42");
        assert_eq!(
            Operation::BinaryOperation { op: BinaryOperator::Add }.to_string(),
            "BinaryOperation '+'"
        );
        assert_eq!(
            Operation::GetProperty { name: "length".to_string() }.to_string(),
            "GetProperty 'length'"
        );
    }
}
