//! Lightweight static type inference for variables.
//!
//! Types are sets of possible runtime kinds. Inference is deliberately
//! coarse: it only has to be good enough to steer random variable selection
//! toward plausible inputs.

use crate::instruction::{Instruction, Variable};
use crate::operation::{BinaryOperator, Operation, UnaryOperator};
use crate::program::Program;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ValueType(u16);

impl ValueType {
    pub const NOTHING: ValueType = ValueType(0);
    pub const UNDEFINED: ValueType = ValueType(1 << 0);
    pub const NULL: ValueType = ValueType(1 << 1);
    pub const INTEGER: ValueType = ValueType(1 << 2);
    pub const FLOAT: ValueType = ValueType(1 << 3);
    pub const BOOLEAN: ValueType = ValueType(1 << 4);
    pub const STRING: ValueType = ValueType(1 << 5);
    pub const OBJECT: ValueType = ValueType(1 << 6);
    pub const FUNCTION: ValueType = ValueType(1 << 7);

    pub const NUMBER: ValueType = ValueType(Self::INTEGER.0 | Self::FLOAT.0);
    pub const PRIMITIVE: ValueType = ValueType(
        Self::UNDEFINED.0 | Self::NULL.0 | Self::NUMBER.0 | Self::BOOLEAN.0 | Self::STRING.0,
    );
    pub const ANYTHING: ValueType = ValueType(Self::PRIMITIVE.0 | Self::OBJECT.0 | Self::FUNCTION.0);

    const NAMES: [(ValueType, &'static str); 8] = [
        (ValueType::UNDEFINED, "undefined"),
        (ValueType::NULL, "null"),
        (ValueType::INTEGER, "integer"),
        (ValueType::FLOAT, "float"),
        (ValueType::BOOLEAN, "boolean"),
        (ValueType::STRING, "string"),
        (ValueType::OBJECT, "object"),
        (ValueType::FUNCTION, "function"),
    ];

    pub const fn union(self, other: ValueType) -> ValueType {
        ValueType(self.0 | other.0)
    }

    /// The value may be of (one of) the kinds in `other`
    pub const fn may_be(self, other: ValueType) -> bool {
        self.0 & other.0 != 0
    }

    /// The value is certainly of one of the kinds in `other`
    pub const fn is(self, other: ValueType) -> bool {
        self.0 != 0 && self.0 & !other.0 == 0
    }
}

impl BitOr for ValueType {
    type Output = ValueType;

    fn bitor(self, rhs: ValueType) -> ValueType {
        self.union(rhs)
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == ValueType::ANYTHING {
            return write!(f, ".anything");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(t, _)| self.may_be(*t))
            .map(|(_, n)| *n)
            .collect();
        write!(f, ".{}", names.join("|"))
    }
}

/// Type of the regular output of `op` given the types of its inputs
pub fn output_type(op: &Operation, inputs: &[ValueType]) -> ValueType {
    use Operation::*;
    let input_union = || {
        inputs
            .iter()
            .fold(ValueType::NOTHING, |acc, t| acc | *t)
    };
    match op {
        LoadInteger { .. } => ValueType::INTEGER,
        LoadFloat { .. } => ValueType::FLOAT,
        LoadString { .. } | TypeOf | BeginCodeString => ValueType::STRING,
        LoadBoolean { .. } => ValueType::BOOLEAN,
        LoadUndefined => ValueType::UNDEFINED,
        LoadNull => ValueType::NULL,
        LoadThis | LoadArguments | LoadRegExp { .. } | CreateObject { .. } | CreateArray { .. }
        | EndObjectLiteral | Construct { .. } => ValueType::OBJECT,
        LoadBuiltin { .. } => ValueType::OBJECT | ValueType::FUNCTION,
        UnaryOperation { op } => match op {
            UnaryOperator::LogicalNot => ValueType::BOOLEAN,
            _ => ValueType::NUMBER,
        },
        BinaryOperation { op } => match op {
            BinaryOperator::Add => ValueType::NUMBER | ValueType::STRING,
            BinaryOperator::LogicalAnd
            | BinaryOperator::LogicalOr
            | BinaryOperator::NullishCoalesce => input_union(),
            _ => ValueType::NUMBER,
        },
        Compare { .. } | InstanceOf | In | DeleteProperty { .. } => ValueType::BOOLEAN,
        Dup => input_union(),
        BeginFunction { .. } | BeginClassDefinition { .. } => ValueType::FUNCTION,
        _ => ValueType::ANYTHING,
    }
}

/// Types of the inner outputs of a block opener
pub fn inner_output_types(op: &Operation) -> Vec<ValueType> {
    use Operation::*;
    let n = op.num_inner_outputs();
    match op {
        BeginForLoop { .. } => vec![ValueType::NUMBER],
        BeginForInLoop => vec![ValueType::STRING],
        BeginObjectLiteralMethod { .. } | BeginObjectLiteralGetter { .. }
        | BeginObjectLiteralSetter { .. } | BeginClassConstructor { .. }
        | BeginClassMethod { is_static: false, .. } | BeginClassGetter { is_static: false, .. }
        | BeginClassSetter { is_static: false, .. } => {
            let mut types = vec![ValueType::OBJECT];
            types.resize(n, ValueType::ANYTHING);
            types
        }
        BeginClassMethod { is_static: true, .. } | BeginClassGetter { is_static: true, .. }
        | BeginClassSetter { is_static: true, .. } | BeginClassStaticInitializer => {
            let mut types = vec![ValueType::FUNCTION];
            types.resize(n, ValueType::ANYTHING);
            types
        }
        _ => vec![ValueType::ANYTHING; n],
    }
}

/// Per-variable types accumulated while replaying instructions
#[derive(Debug, Clone, Default)]
pub struct TypeState {
    types: Vec<ValueType>,
}

impl TypeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_of(&self, variable: Variable) -> ValueType {
        self.types
            .get(variable.index())
            .copied()
            .unwrap_or(ValueType::ANYTHING)
    }

    pub fn record(&mut self, instruction: &Instruction) {
        let inputs: Vec<ValueType> = instruction.inputs.iter().map(|v| self.type_of(*v)).collect();

        match &instruction.op {
            // Reassignment widens the target's type instead of defining a value.
            Operation::Reassign => {
                if let [target, value] = instruction.inputs.as_slice() {
                    let widened = self.type_of(*target) | self.type_of(*value);
                    self.set(*target, widened);
                }
            }
            Operation::Update { .. } => {
                if let Some(target) = instruction.inputs.first() {
                    let widened = self.type_of(*target) | ValueType::NUMBER | ValueType::STRING;
                    self.set(*target, widened);
                }
            }
            _ => {}
        }

        let out = output_type(&instruction.op, &inputs);
        for v in instruction.outputs.iter().copied() {
            self.set(v, out);
        }
        let inner = inner_output_types(&instruction.op);
        for (v, t) in instruction.inner_outputs.iter().copied().zip(inner) {
            self.set(v, t);
        }
    }

    pub(crate) fn truncate(&mut self, num_variables: usize) {
        self.types.truncate(num_variables);
    }

    fn set(&mut self, variable: Variable, t: ValueType) {
        if self.types.len() <= variable.index() {
            self.types.resize(variable.index() + 1, ValueType::ANYTHING);
        }
        self.types[variable.index()] = t;
    }
}

/// Final inferred type of every variable in `program`
pub fn infer_types(program: &Program) -> Vec<ValueType> {
    let mut state = TypeState::new();
    for inst in program.iter() {
        state.record(inst);
    }
    (0..program.num_variables() as u32)
        .map(|n| state.type_of(Variable(n)))
        .collect()
}
