use super::{emit_mapped, finish, map_inputs, missing_target, rebuild, DonorPool, Mutator};
use crate::builder::ProgramBuilder;
use crate::environment::Environment;
use crate::instruction::Variable;
use crate::operation::{BinaryOperator, Comparator, Operation, UnaryOperator};
use crate::program::Program;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Changes one instruction in place. Either swaps it for an operation of
/// another kind with the same inputs and outputs, or replaces its parameters:
/// literal values, operators, property and method names, and the argument
/// count of calls.
#[derive(Debug, Default)]
pub struct OperationMutator;

type Make = fn(&mut ChaCha8Rng) -> Operation;

/// No inputs, one output
const LITERALS: &[(&str, Make)] = &[
    ("LoadInteger", |rng| Operation::LoadInteger {
        value: Environment::random_int(rng),
    }),
    ("LoadFloat", |rng| Operation::LoadFloat {
        value: Environment::random_float(rng),
    }),
    ("LoadString", |rng| Operation::LoadString {
        value: Environment::random_string(rng),
    }),
    ("LoadBoolean", |rng| Operation::LoadBoolean { value: rng.gen() }),
    ("LoadUndefined", |_| Operation::LoadUndefined),
    ("LoadNull", |_| Operation::LoadNull),
    ("LoadRegExp", |rng| {
        let (pattern, flags) = Environment::random_regexp(rng);
        Operation::LoadRegExp { pattern, flags }
    }),
    ("LoadBuiltin", |rng| Operation::LoadBuiltin {
        name: Environment::random_builtin(rng),
    }),
];

/// One input, one output
const UNARY_VALUES: &[(&str, Make)] = &[
    ("UnaryOperation", |rng| Operation::UnaryOperation {
        op: pick(&UnaryOperator::ALL, rng),
    }),
    ("TypeOf", |_| Operation::TypeOf),
    ("Dup", |_| Operation::Dup),
    ("GetProperty", |rng| Operation::GetProperty {
        name: Environment::random_property(rng),
    }),
    ("DeleteProperty", |rng| Operation::DeleteProperty {
        name: Environment::random_property(rng),
    }),
    ("GetElement", |rng| Operation::GetElement {
        index: Environment::random_element_index(rng),
    }),
];

/// Two inputs, one output
const BINARY_VALUES: &[(&str, Make)] = &[
    ("BinaryOperation", |rng| Operation::BinaryOperation {
        op: pick(&BinaryOperator::ALL, rng),
    }),
    ("Compare", |rng| Operation::Compare {
        op: pick(&Comparator::ALL, rng),
    }),
    ("InstanceOf", |_| Operation::InstanceOf),
    ("In", |_| Operation::In),
    ("GetComputedProperty", |_| Operation::GetComputedProperty),
];

/// Two inputs, no output
const STORES: &[(&str, Make)] = &[
    ("SetProperty", |rng| Operation::SetProperty {
        name: Environment::random_property(rng),
    }),
    ("SetElement", |rng| Operation::SetElement {
        index: Environment::random_element_index(rng),
    }),
    ("Update", |rng| Operation::Update {
        op: pick(&BinaryOperator::ALL, rng),
    }),
    ("Reassign", |_| Operation::Reassign),
];

const FAMILIES: [&[(&str, Make)]; 4] = [LITERALS, UNARY_VALUES, BINARY_VALUES, STORES];

fn family_of(op: &Operation) -> Option<&'static [(&'static str, Make)]> {
    FAMILIES
        .into_iter()
        .find(|family| family.iter().any(|(name, _)| *name == op.name()))
}

fn is_call(op: &Operation) -> bool {
    matches!(
        op,
        Operation::CallFunction { .. } | Operation::Construct { .. } | Operation::CallMethod { .. }
    )
}

impl OperationMutator {
    pub fn new() -> Self {
        Self
    }

    fn mutated(
        &self,
        op: Operation,
        mut inputs: Vec<Variable>,
        b: &ProgramBuilder,
        rng: &mut ChaCha8Rng,
    ) -> (Operation, Vec<Variable>) {
        if !has_parameters(&op) || rng.gen_bool(0.5) {
            if let Some(swapped) = substitute(&op, b, rng) {
                return (swapped, inputs);
            }
        }
        let op = tweaked(op, &mut inputs, b, rng);
        (op, inputs)
    }
}

/// An operation of another kind taking the same inputs and producing the
/// same outputs, legal at the builder's current position.
fn substitute(op: &Operation, b: &ProgramBuilder, rng: &mut ChaCha8Rng) -> Option<Operation> {
    use Operation::*;

    let candidates: Vec<Operation> = match op {
        CallFunction { arguments } | Construct { arguments } | CallMethod { arguments, .. } => {
            let arguments = *arguments;
            vec![
                CallFunction { arguments },
                Construct { arguments },
                CallMethod {
                    name: Environment::random_method(rng),
                    arguments,
                },
            ]
        }
        _ => {
            let family = family_of(op)?;
            let (_, make) = family
                .iter()
                .filter(|(name, _)| *name != op.name())
                .collect::<Vec<_>>()
                .choose(rng)
                .copied()?;
            vec![make(rng)]
        }
    };
    let legal: Vec<Operation> = candidates
        .into_iter()
        .filter(|c| c.name() != op.name() && c.is_legal_in(b.context()))
        .collect();
    legal.choose(rng).cloned()
}

/// `op` with fresh parameters, same kind
fn tweaked(
    op: Operation,
    inputs: &mut Vec<Variable>,
    b: &ProgramBuilder,
    rng: &mut ChaCha8Rng,
) -> Operation {
    use Operation::*;

    match op {
        LoadInteger { value } => LoadInteger {
            value: if rng.gen_bool(0.5) {
                value.wrapping_add(rng.gen_range(-16..=16))
            } else {
                Environment::random_int(rng)
            },
        },
        LoadFloat { value } => LoadFloat {
            value: if rng.gen_bool(0.5) {
                value * rng.gen_range(-2.0..2.0)
            } else {
                Environment::random_float(rng)
            },
        },
        LoadString { .. } => LoadString {
            value: Environment::random_string(rng),
        },
        LoadBoolean { value } => LoadBoolean { value: !value },
        LoadUndefined => LoadNull,
        LoadNull => LoadUndefined,
        LoadRegExp { .. } => {
            let (pattern, flags) = Environment::random_regexp(rng);
            LoadRegExp { pattern, flags }
        }
        LoadBuiltin { .. } => LoadBuiltin {
            name: Environment::random_builtin(rng),
        },
        UnaryOperation { op } => UnaryOperation {
            op: another(&UnaryOperator::ALL, op, rng),
        },
        BinaryOperation { op } => BinaryOperation {
            op: another(&BinaryOperator::ALL, op, rng),
        },
        Update { op } => Update {
            op: another(&BinaryOperator::ALL, op, rng),
        },
        Compare { op } => Compare {
            op: another(&Comparator::ALL, op, rng),
        },
        GetProperty { .. } => GetProperty {
            name: Environment::random_property(rng),
        },
        SetProperty { .. } => SetProperty {
            name: Environment::random_property(rng),
        },
        DeleteProperty { .. } => DeleteProperty {
            name: Environment::random_property(rng),
        },
        GetElement { .. } => GetElement {
            index: Environment::random_element_index(rng),
        },
        SetElement { .. } => SetElement {
            index: Environment::random_element_index(rng),
        },
        ObjectLiteralAddProperty { .. } => ObjectLiteralAddProperty {
            name: Environment::random_property(rng),
        },
        ObjectLiteralAddElement { .. } => ObjectLiteralAddElement {
            index: Environment::random_element_index(rng),
        },
        BeginIf { inverted } => BeginIf { inverted: !inverted },
        BeginForLoop { comparator, op } => {
            if rng.gen_bool(0.5) {
                BeginForLoop {
                    comparator: another(&Comparator::ALL, comparator, rng),
                    op,
                }
            } else {
                BeginForLoop {
                    comparator,
                    op: another(&BinaryOperator::ALL, op, rng),
                }
            }
        }
        CallMethod { name, arguments } => {
            if rng.gen_bool(0.5) {
                CallMethod {
                    name: Environment::random_method(rng),
                    arguments,
                }
            } else {
                let arguments = resize_arguments(inputs, 1, b, rng);
                CallMethod { name, arguments }
            }
        }
        CallFunction { .. } => CallFunction {
            arguments: resize_arguments(inputs, 1, b, rng),
        },
        Construct { .. } => Construct {
            arguments: resize_arguments(inputs, 1, b, rng),
        },
        CreateArray { .. } => CreateArray {
            size: resize_arguments(inputs, 0, b, rng),
        },
        other => other,
    }
}

fn is_mutable(op: &Operation) -> bool {
    has_parameters(op) || is_call(op) || family_of(op).is_some()
}

fn has_parameters(op: &Operation) -> bool {
    use Operation::*;
    matches!(
        op,
        LoadInteger { .. }
            | LoadFloat { .. }
            | LoadString { .. }
            | LoadBoolean { .. }
            | LoadUndefined
            | LoadNull
            | LoadRegExp { .. }
            | LoadBuiltin { .. }
            | UnaryOperation { .. }
            | BinaryOperation { .. }
            | Update { .. }
            | Compare { .. }
            | GetProperty { .. }
            | SetProperty { .. }
            | DeleteProperty { .. }
            | GetElement { .. }
            | SetElement { .. }
            | ObjectLiteralAddProperty { .. }
            | ObjectLiteralAddElement { .. }
            | BeginIf { .. }
            | BeginForLoop { .. }
            | CallMethod { .. }
            | CallFunction { .. }
            | Construct { .. }
            | CreateArray { .. }
    )
}

fn pick<T: Copy>(all: &[T], rng: &mut ChaCha8Rng) -> T {
    all[rng.gen_range(0..all.len())]
}

/// A value from `all` other than `current`
fn another<T: Copy + PartialEq>(all: &[T], current: T, rng: &mut ChaCha8Rng) -> T {
    let others: Vec<T> = all.iter().copied().filter(|v| *v != current).collect();
    others.choose(rng).copied().unwrap_or(current)
}

/// Drop the last argument or append a visible variable, returning the new
/// argument count. The first `fixed` inputs are never touched.
fn resize_arguments(
    inputs: &mut Vec<Variable>,
    fixed: usize,
    b: &ProgramBuilder,
    rng: &mut ChaCha8Rng,
) -> usize {
    if inputs.len() > fixed && rng.gen_bool(0.5) {
        inputs.pop();
    } else if let Some(v) = b.random_variable(rng) {
        inputs.push(v);
    }
    inputs.len().saturating_sub(fixed)
}

impl Mutator for OperationMutator {
    fn name(&self) -> &'static str {
        "OperationMutator"
    }

    fn mutate(
        &self,
        program: &Program,
        _donors: &dyn DonorPool,
        b: &mut ProgramBuilder,
        rng: &mut ChaCha8Rng,
    ) -> Option<Program> {
        let candidates: Vec<usize> = program
            .iter()
            .filter(|inst| is_mutable(&inst.op))
            .map(|inst| inst.index)
            .collect();
        let target = *candidates.choose(rng)?;

        let mut changed = false;
        let result = rebuild(program, b, target, |b, original, map| {
            let inst = original.ok_or_else(missing_target)?;
            let inputs = map_inputs(inst, map, b.len())?;
            let original_inputs = inputs.clone();
            let (op, inputs) = self.mutated(inst.op.clone(), inputs, b, rng);
            changed = op != inst.op || inputs != original_inputs;
            emit_mapped(b, inst, op, &inputs, map)
        });

        match result {
            Ok(()) if changed => Some(finish(b, program, self.name())),
            Ok(()) => {
                b.reset();
                None
            }
            Err(e) => {
                trace!(error = %e, target, "operation mutation rejected");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::NoDonors;
    use crate::operation::FunctionKind;
    use crate::validation::validate_program;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_replaces_boolean_literal() {
        let mut b = ProgramBuilder::new();
        b.load_bool(true).unwrap();
        let program = b.finalize();

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let child = OperationMutator::new()
            .mutate(&program, &NoDonors, &mut b, &mut rng)
            .unwrap();
        let op = &child.code()[0].op;
        assert_ne!(*op, Operation::LoadBoolean { value: true });
        assert_eq!((op.num_inputs(), op.num_outputs()), (0, 1));
        assert_eq!(child.parent(), Some(program.id()));
    }

    #[test]
    fn test_swaps_operation_kind() {
        let mut b = ProgramBuilder::new();
        let x = b.load_int(1).unwrap();
        b.type_of_value(x).unwrap();
        let program = b.finalize();

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mutator = OperationMutator::new();
        let mut literal_kinds = HashSet::new();
        let mut unary_kinds = HashSet::new();
        for _ in 0..64 {
            let Some(child) = mutator.mutate(&program, &NoDonors, &mut b, &mut rng) else {
                continue;
            };
            assert!(validate_program(&child).is_ok());
            assert_eq!(child.len(), program.len());
            literal_kinds.insert(child.code()[0].op.name());
            let second = &child.code()[1];
            assert_eq!(second.inputs, vec![Variable(0)]);
            assert_eq!(second.outputs.len(), 1);
            unary_kinds.insert(second.op.name());
        }
        assert!(literal_kinds.iter().any(|name| *name != "LoadInteger"));
        assert!(unary_kinds.iter().any(|name| *name != "TypeOf"));
    }

    #[test]
    fn test_call_becomes_construct_or_method_call() {
        let mut b = ProgramBuilder::new();
        let f = b
            .build_function(FunctionKind::Plain, Default::default(), |_, _| Ok(()))
            .unwrap();
        let arg = b.load_int(1).unwrap();
        b.call_function(f, &[arg]).unwrap();
        let program = b.finalize();
        let call_inputs = program.code().last().unwrap().inputs.clone();

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mutator = OperationMutator::new();
        let mut swapped = false;
        for _ in 0..64 {
            let Some(child) = mutator.mutate(&program, &NoDonors, &mut b, &mut rng) else {
                continue;
            };
            let call = child.code().last().unwrap();
            if matches!(call.op, Operation::Construct { .. } | Operation::CallMethod { .. }) {
                assert_eq!(call.inputs, call_inputs);
                assert!(validate_program(&child).is_ok());
                swapped = true;
            }
        }
        assert!(swapped);
    }

    #[test]
    fn test_changes_operator() {
        let mut b = ProgramBuilder::new();
        let x = b.load_int(1).unwrap();
        let y = b.load_int(2).unwrap();
        b.binary(x, BinaryOperator::Add, y).unwrap();
        let program = b.finalize();

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mutator = OperationMutator::new();
        let mut produced = 0;
        for _ in 0..32 {
            if let Some(child) = mutator.mutate(&program, &NoDonors, &mut b, &mut rng) {
                assert!(validate_program(&child).is_ok());
                assert_eq!(child.len(), program.len());
                assert_ne!(child.code(), program.code());
                produced += 1;
            }
        }
        assert!(produced > 0);
    }

    #[test]
    fn test_call_arity_stays_consistent() {
        let mut b = ProgramBuilder::new();
        let f = b
            .build_function(FunctionKind::Plain, Default::default(), |_, _| Ok(()))
            .unwrap();
        let arg = b.load_int(1).unwrap();
        b.call_function(f, &[arg]).unwrap();
        let program = b.finalize();

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mutator = OperationMutator::new();
        for _ in 0..16 {
            if let Some(child) = mutator.mutate(&program, &NoDonors, &mut b, &mut rng) {
                let call = child.code().last().unwrap();
                match &call.op {
                    Operation::CallFunction { arguments }
                    | Operation::Construct { arguments }
                    | Operation::CallMethod { arguments, .. } => {
                        assert_eq!(call.inputs.len(), arguments + 1);
                    }
                    other => panic!("call replaced by {}", other),
                }
                assert!(validate_program(&child).is_ok());
            }
        }
    }

    #[test]
    fn test_nothing_to_mutate() {
        let mut b = ProgramBuilder::new();
        b.build_block_statement(|_| Ok(())).unwrap();
        let program = b.finalize();

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(OperationMutator::new()
            .mutate(&program, &NoDonors, &mut b, &mut rng)
            .is_none());
    }
}
