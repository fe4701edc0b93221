//! Random code generation.
//!
//! A weighted table of small generators, each emitting a handful of
//! instructions through the builder. Only generators whose context
//! requirements hold at the current position are eligible, so generation
//! never has to backtrack on context errors in the common case. Block
//! generators recurse into [`fill`] for their bodies.

use crate::builder::ProgramBuilder;
use crate::context::Context;
use crate::environment::Environment;
use crate::instruction::Variable;
use crate::operation::{BinaryOperator, Comparator, FunctionKind, Parameters, UnaryOperator};
use crate::program::Program;
use crate::typing::ValueType;
use jsf_core::{Error, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Instructions emitted into a freshly generated block body
const BODY_BUDGET: usize = 4;

/// Randomness and limits for one generation pass
pub struct Generation<'a> {
    pub rng: &'a mut ChaCha8Rng,
    max_depth: usize,
}

impl<'a> Generation<'a> {
    pub fn new(rng: &'a mut ChaCha8Rng, max_depth: usize) -> Self {
        Self { rng, max_depth }
    }

    /// Independent generator for a sibling block body
    fn split(&mut self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.rng.gen())
    }
}

type GenerateFn = fn(&mut ProgramBuilder, &mut Generation<'_>) -> Result<()>;

pub struct CodeGenerator {
    pub name: &'static str,
    pub weight: u32,
    pub required: Context,
    pub incompatible: Context,
    /// Draws on existing variables and is skipped when none are visible
    pub needs_inputs: bool,
    /// Opens a block and is skipped at the nesting limit
    pub nests: bool,
    generate: GenerateFn,
}

impl CodeGenerator {
    const fn new(name: &'static str, weight: u32, required: Context, generate: GenerateFn) -> Self {
        Self {
            name,
            weight,
            required,
            incompatible: Context::EMPTY,
            needs_inputs: false,
            nests: false,
            generate,
        }
    }

    const fn with_inputs(mut self) -> Self {
        self.needs_inputs = true;
        self
    }

    const fn nesting(mut self) -> Self {
        self.nests = true;
        self
    }

    const fn forbidding(mut self, incompatible: Context) -> Self {
        self.incompatible = incompatible;
        self
    }

    fn is_applicable(&self, b: &ProgramBuilder, g: &Generation<'_>) -> bool {
        b.context().permits(self.required, self.incompatible)
            && (!self.needs_inputs || !b.visible_variables().is_empty())
            && (!self.nests || b.depth() < g.max_depth)
    }
}

const SCRIPT: Context = Context::SCRIPT;
const SUBROUTINE: Context = Context::SCRIPT.union(Context::SUBROUTINE);
const LOOP: Context = Context::SCRIPT.union(Context::LOOP);
const GENERATOR: Context = Context::SCRIPT.union(Context::GENERATOR_FUNCTION);
const ASYNC: Context = Context::SCRIPT.union(Context::ASYNC_FUNCTION);
const OBJECT_LITERAL: Context = Context::OBJECT_LITERAL;
const CLASS: Context = Context::CLASS_DEFINITION;

pub static GENERATORS: &[CodeGenerator] = &[
    // Values
    CodeGenerator::new("IntegerGenerator", 8, SCRIPT, integer),
    CodeGenerator::new("FloatGenerator", 4, SCRIPT, float),
    CodeGenerator::new("StringGenerator", 5, SCRIPT, string),
    CodeGenerator::new("BooleanGenerator", 2, SCRIPT, boolean),
    CodeGenerator::new("NullishGenerator", 1, SCRIPT, nullish),
    CodeGenerator::new("RegExpGenerator", 2, SCRIPT, regexp),
    CodeGenerator::new("BuiltinGenerator", 6, SCRIPT, builtin),
    CodeGenerator::new("ArrayGenerator", 4, SCRIPT, array).with_inputs(),
    CodeGenerator::new("ObjectGenerator", 3, SCRIPT, object).with_inputs(),
    CodeGenerator::new("NamedVariableGenerator", 1, SCRIPT, named_variable).with_inputs(),
    CodeGenerator::new("ThisGenerator", 1, SCRIPT, this),
    CodeGenerator::new("ArgumentsGenerator", 1, SUBROUTINE, arguments),
    // Operators
    CodeGenerator::new("UnaryOperationGenerator", 4, SCRIPT, unary).with_inputs(),
    CodeGenerator::new("BinaryOperationGenerator", 6, SCRIPT, binary).with_inputs(),
    CodeGenerator::new("UpdateGenerator", 3, SCRIPT, update).with_inputs(),
    CodeGenerator::new("CompareGenerator", 4, SCRIPT, compare).with_inputs(),
    CodeGenerator::new("TypeTestGenerator", 2, SCRIPT, type_test).with_inputs(),
    CodeGenerator::new("ReassignGenerator", 2, SCRIPT, reassign).with_inputs(),
    // Properties
    CodeGenerator::new("PropertyRetrievalGenerator", 5, SCRIPT, get_property).with_inputs(),
    CodeGenerator::new("PropertyAssignmentGenerator", 5, SCRIPT, set_property).with_inputs(),
    CodeGenerator::new("PropertyRemovalGenerator", 1, SCRIPT, delete_property).with_inputs(),
    CodeGenerator::new("ElementGenerator", 4, SCRIPT, element).with_inputs(),
    CodeGenerator::new("ComputedPropertyGenerator", 3, SCRIPT, computed_property).with_inputs(),
    // Calls
    CodeGenerator::new("FunctionCallGenerator", 6, SCRIPT, call_function).with_inputs(),
    CodeGenerator::new("MethodCallGenerator", 8, SCRIPT, call_method).with_inputs(),
    CodeGenerator::new("ConstructorCallGenerator", 4, SCRIPT, construct).with_inputs(),
    // Scope exits
    CodeGenerator::new("ReturnGenerator", 3, SUBROUTINE, do_return).with_inputs(),
    CodeGenerator::new("YieldGenerator", 3, GENERATOR, yield_value).with_inputs(),
    CodeGenerator::new("AwaitGenerator", 3, ASYNC, await_value).with_inputs(),
    CodeGenerator::new("BreakGenerator", 1, LOOP, do_break),
    CodeGenerator::new("ContinueGenerator", 1, LOOP, do_continue),
    CodeGenerator::new("ThrowGenerator", 1, SCRIPT, throw).with_inputs(),
    // Blocks
    CodeGenerator::new("FunctionGenerator", 5, SCRIPT, function).nesting(),
    CodeGenerator::new("IfElseGenerator", 4, SCRIPT, if_else).with_inputs().nesting(),
    CodeGenerator::new("WhileLoopGenerator", 2, SCRIPT, while_loop).nesting(),
    CodeGenerator::new("DoWhileLoopGenerator", 2, SCRIPT, do_while_loop).nesting(),
    CodeGenerator::new("ForLoopGenerator", 3, SCRIPT, for_loop).nesting(),
    CodeGenerator::new("ForInLoopGenerator", 2, SCRIPT, for_in_loop).with_inputs().nesting(),
    CodeGenerator::new("ForOfLoopGenerator", 2, SCRIPT, for_of_loop).with_inputs().nesting(),
    CodeGenerator::new("TryCatchGenerator", 3, SCRIPT, try_catch).nesting(),
    CodeGenerator::new("WithStatementGenerator", 1, SCRIPT, with_statement)
        .with_inputs()
        .nesting()
        .forbidding(Context::STRICT),
    CodeGenerator::new("BlockStatementGenerator", 1, SCRIPT, block_statement).nesting(),
    CodeGenerator::new("ObjectLiteralGenerator", 4, SCRIPT, object_literal).nesting(),
    CodeGenerator::new("ClassGenerator", 3, SCRIPT, class_definition).nesting(),
    CodeGenerator::new("CodeStringGenerator", 1, SCRIPT, code_string).nesting(),
    // Object literal members
    CodeGenerator::new("ObjectLiteralPropertyGenerator", 6, OBJECT_LITERAL, literal_property)
        .with_inputs(),
    CodeGenerator::new("ObjectLiteralElementGenerator", 3, OBJECT_LITERAL, literal_element)
        .with_inputs(),
    CodeGenerator::new("ObjectLiteralSpreadGenerator", 1, OBJECT_LITERAL, literal_spread)
        .with_inputs(),
    CodeGenerator::new("ObjectLiteralMethodGenerator", 3, OBJECT_LITERAL, literal_method)
        .nesting(),
    CodeGenerator::new("ObjectLiteralAccessorGenerator", 2, OBJECT_LITERAL, literal_accessor)
        .nesting(),
    // Class members
    CodeGenerator::new("ClassPropertyGenerator", 4, CLASS, class_property),
    CodeGenerator::new("ClassMethodGenerator", 4, CLASS, class_method).nesting(),
    CodeGenerator::new("ClassAccessorGenerator", 2, CLASS, class_accessor).nesting(),
    CodeGenerator::new("ClassStaticInitializerGenerator", 1, CLASS, class_static_initializer)
        .nesting(),
];

/// Emit roughly `budget` instructions at the current position.
///
/// Returns the number of instructions actually emitted. Blocks are nested at
/// most `max_depth` levels below the current depth.
pub fn generate_code(
    b: &mut ProgramBuilder,
    rng: &mut ChaCha8Rng,
    budget: usize,
    max_depth: usize,
) -> usize {
    let start = b.len();
    let max_depth = b.depth() + max_depth;
    let mut g = Generation::new(rng, max_depth);
    fill(b, &mut g, budget);
    b.len() - start
}

/// Generate a complete program of about `size` instructions
pub fn generate_program(
    b: &mut ProgramBuilder,
    rng: &mut ChaCha8Rng,
    size: usize,
    max_depth: usize,
) -> Program {
    b.reset();
    let mut g = Generation::new(rng, max_depth);
    // A few values first so that generators with inputs become eligible.
    for seed in [integer, string, builtin] {
        if let Err(e) = seed(b, &mut g) {
            trace!(error = %e, "seed value generation failed");
        }
    }
    fill(b, &mut g, size.saturating_sub(b.len()));
    b.finalize()
}

/// Run eligible generators until `budget` instructions have been emitted
fn fill(b: &mut ProgramBuilder, g: &mut Generation<'_>, budget: usize) {
    let start = b.len();
    let max_attempts = budget * 4 + 4;
    for _ in 0..max_attempts {
        if b.len() >= start + budget {
            break;
        }
        let candidates: Vec<&CodeGenerator> =
            GENERATORS.iter().filter(|c| c.is_applicable(b, g)).collect();
        let dist = match WeightedIndex::new(candidates.iter().map(|c| c.weight)) {
            Ok(dist) => dist,
            Err(_) => break,
        };
        let generator = candidates[dist.sample(g.rng)];
        if let Err(e) = (generator.generate)(b, g) {
            trace!(generator = generator.name, error = %e, "generator failed");
        }
    }
}

fn no_variables() -> Error {
    Error::InvalidState("no visible variables".to_string())
}

fn any_var(b: &ProgramBuilder, g: &mut Generation<'_>) -> Result<Variable> {
    b.random_variable(g.rng).ok_or_else(no_variables)
}

/// A variable that may have type `wanted`, or any variable if there is none
fn typed_var(b: &ProgramBuilder, g: &mut Generation<'_>, wanted: ValueType) -> Result<Variable> {
    match b.random_variable_of_type(g.rng, wanted) {
        Some(v) => Ok(v),
        None => any_var(b, g),
    }
}

fn some_vars(b: &ProgramBuilder, g: &mut Generation<'_>, max: usize) -> Vec<Variable> {
    let n = g.rng.gen_range(0..=max);
    b.random_variables(g.rng, n).unwrap_or_default()
}

fn random_parameters(g: &mut Generation<'_>) -> Parameters {
    let count = g.rng.gen_range(0..4);
    Parameters {
        count,
        has_rest: count > 0 && g.rng.gen_bool(0.1),
    }
}

fn integer(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    b.load_int(Environment::random_int(g.rng))?;
    Ok(())
}

fn float(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    b.load_float(Environment::random_float(g.rng))?;
    Ok(())
}

fn string(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    b.load_string(Environment::random_string(g.rng))?;
    Ok(())
}

fn boolean(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    b.load_bool(g.rng.gen())?;
    Ok(())
}

fn nullish(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    if g.rng.gen() {
        b.load_null()?;
    } else {
        b.load_undefined()?;
    }
    Ok(())
}

fn regexp(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let (pattern, flags) = Environment::random_regexp(g.rng);
    b.load_regexp(pattern, flags)?;
    Ok(())
}

fn builtin(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    b.load_builtin(Environment::random_builtin(g.rng))?;
    Ok(())
}

fn array(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let elements = some_vars(b, g, 5);
    b.create_array(&elements)?;
    Ok(())
}

fn object(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let values = some_vars(b, g, 4);
    let mut properties: Vec<(String, Variable)> = Vec::new();
    for v in values {
        let name = Environment::random_property(g.rng);
        if properties.iter().all(|(n, _)| *n != name) {
            properties.push((name, v));
        }
    }
    b.create_object(&properties)?;
    Ok(())
}

fn named_variable(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let name = ["a", "b", "c"].choose(g.rng).copied().unwrap_or("a");
    if g.rng.gen() {
        let v = any_var(b, g)?;
        b.store_named_variable(name, v)
    } else {
        b.load_named_variable(name)?;
        Ok(())
    }
}

fn this(b: &mut ProgramBuilder, _g: &mut Generation<'_>) -> Result<()> {
    b.load_this()?;
    Ok(())
}

fn arguments(b: &mut ProgramBuilder, _g: &mut Generation<'_>) -> Result<()> {
    b.load_arguments()?;
    Ok(())
}

fn unary(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let op = *UnaryOperator::ALL.choose(g.rng).unwrap_or(&UnaryOperator::Minus);
    let v = typed_var(b, g, ValueType::NUMBER)?;
    b.unary(op, v)?;
    Ok(())
}

fn binary(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let op = *BinaryOperator::ALL.choose(g.rng).unwrap_or(&BinaryOperator::Add);
    let lhs = typed_var(b, g, ValueType::PRIMITIVE)?;
    let rhs = typed_var(b, g, ValueType::PRIMITIVE)?;
    b.binary(lhs, op, rhs)?;
    Ok(())
}

fn update(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let op = *BinaryOperator::ALL.choose(g.rng).unwrap_or(&BinaryOperator::Add);
    let target = typed_var(b, g, ValueType::NUMBER)?;
    let value = typed_var(b, g, ValueType::NUMBER)?;
    b.update(target, op, value)
}

fn compare(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let op = *Comparator::ALL.choose(g.rng).unwrap_or(&Comparator::Equal);
    let lhs = any_var(b, g)?;
    let rhs = any_var(b, g)?;
    b.compare(lhs, op, rhs)?;
    Ok(())
}

fn type_test(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let v = any_var(b, g)?;
    match g.rng.gen_range(0..3) {
        0 => b.type_of_value(v)?,
        1 => {
            let constructor = typed_var(b, g, ValueType::FUNCTION)?;
            b.instance_of(v, constructor)?
        }
        _ => {
            let object = typed_var(b, g, ValueType::OBJECT)?;
            b.is_in(v, object)?
        }
    };
    Ok(())
}

fn reassign(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let target = any_var(b, g)?;
    let value = any_var(b, g)?;
    if target == value {
        b.dup(value)?;
        return Ok(());
    }
    b.reassign(target, value)
}

fn get_property(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let object = typed_var(b, g, ValueType::OBJECT | ValueType::FUNCTION)?;
    b.get_property(object, Environment::random_property(g.rng))?;
    Ok(())
}

fn set_property(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let object = typed_var(b, g, ValueType::OBJECT | ValueType::FUNCTION)?;
    let value = any_var(b, g)?;
    b.set_property(object, Environment::random_property(g.rng), value)
}

fn delete_property(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let object = typed_var(b, g, ValueType::OBJECT)?;
    b.delete_property(object, Environment::random_property(g.rng))?;
    Ok(())
}

fn element(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let object = typed_var(b, g, ValueType::OBJECT)?;
    let index = Environment::random_element_index(g.rng);
    if g.rng.gen() {
        b.get_element(object, index)?;
        Ok(())
    } else {
        let value = any_var(b, g)?;
        b.set_element(object, index, value)
    }
}

fn computed_property(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let object = typed_var(b, g, ValueType::OBJECT)?;
    let property = typed_var(b, g, ValueType::STRING | ValueType::INTEGER)?;
    if g.rng.gen() {
        b.get_computed_property(object, property)?;
        Ok(())
    } else {
        let value = any_var(b, g)?;
        b.set_computed_property(object, property, value)
    }
}

fn call_function(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let function = typed_var(b, g, ValueType::FUNCTION)?;
    let args = some_vars(b, g, 3);
    b.call_function(function, &args)?;
    Ok(())
}

fn call_method(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let object = any_var(b, g)?;
    let args = some_vars(b, g, 3);
    b.call_method(object, Environment::random_method(g.rng), &args)?;
    Ok(())
}

fn construct(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let constructor = typed_var(b, g, ValueType::FUNCTION)?;
    let args = some_vars(b, g, 3);
    b.construct(constructor, &args)?;
    Ok(())
}

fn do_return(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let v = any_var(b, g)?;
    b.do_return(v)
}

fn yield_value(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let v = any_var(b, g)?;
    b.yield_value(v)?;
    Ok(())
}

fn await_value(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let v = any_var(b, g)?;
    b.await_value(v)?;
    Ok(())
}

fn do_break(b: &mut ProgramBuilder, _g: &mut Generation<'_>) -> Result<()> {
    b.do_break()
}

fn do_continue(b: &mut ProgramBuilder, _g: &mut Generation<'_>) -> Result<()> {
    b.do_continue()
}

fn throw(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let v = any_var(b, g)?;
    b.throw_exception(v)
}

fn function(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let kind = *FunctionKind::ALL.choose(g.rng).unwrap_or(&FunctionKind::Plain);
    let parameters = random_parameters(g);
    let f = b.build_function(kind, parameters, |b, _| {
        fill(b, g, BODY_BUDGET);
        if let Some(v) = b.random_variable(g.rng) {
            b.do_return(v)?;
        }
        Ok(())
    })?;
    if g.rng.gen_bool(0.6) {
        let args = b.random_variables(g.rng, parameters.count).unwrap_or_default();
        b.call_function(f, &args)?;
    }
    Ok(())
}

fn if_else(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let condition = typed_var(b, g, ValueType::BOOLEAN)?;
    if g.rng.gen() {
        return b.build_if(condition, |b| {
            fill(b, g, BODY_BUDGET);
            Ok(())
        });
    }
    let mut else_rng = g.split();
    let mut else_g = Generation::new(&mut else_rng, g.max_depth);
    b.build_if_else(
        condition,
        |b| {
            fill(b, g, BODY_BUDGET);
            Ok(())
        },
        |b| {
            fill(b, &mut else_g, BODY_BUDGET);
            Ok(())
        },
    )
}

/// Counter and bound for a loop that terminates on its own
fn loop_bounds(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<(Variable, Variable)> {
    let counter = b.load_int(0)?;
    let limit = b.load_int(g.rng.gen_range(1..10))?;
    Ok((counter, limit))
}

fn while_loop(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let (counter, limit) = loop_bounds(b, g)?;
    b.build_while_loop(
        |b| b.compare(counter, Comparator::LessThan, limit),
        |b| {
            let one = b.load_int(1)?;
            b.update(counter, BinaryOperator::Add, one)?;
            fill(b, g, BODY_BUDGET);
            Ok(())
        },
    )
}

fn do_while_loop(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let (counter, limit) = loop_bounds(b, g)?;
    b.build_do_while_loop(
        |b| {
            let one = b.load_int(1)?;
            b.update(counter, BinaryOperator::Add, one)?;
            fill(b, g, BODY_BUDGET);
            Ok(())
        },
        |b| b.compare(counter, Comparator::LessThan, limit),
    )
}

fn for_loop(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let (start, end) = loop_bounds(b, g)?;
    let step = b.load_int(1)?;
    b.build_for_loop(
        start,
        Comparator::LessThan,
        end,
        BinaryOperator::Add,
        step,
        |b, _| {
            fill(b, g, BODY_BUDGET);
            Ok(())
        },
    )
}

fn for_in_loop(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let object = typed_var(b, g, ValueType::OBJECT)?;
    b.build_for_in_loop(object, |b, _| {
        fill(b, g, BODY_BUDGET);
        Ok(())
    })
}

fn for_of_loop(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let iterable = typed_var(b, g, ValueType::OBJECT | ValueType::STRING)?;
    b.build_for_of_loop(iterable, |b, _| {
        fill(b, g, BODY_BUDGET);
        Ok(())
    })
}

fn try_catch(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let mut catch_rng = g.split();
    let mut catch_g = Generation::new(&mut catch_rng, g.max_depth);
    let with_finally = g.rng.gen_bool(0.3);
    let try_body = |b: &mut ProgramBuilder| {
        fill(b, g, BODY_BUDGET);
        Ok(())
    };
    let catch_body = |b: &mut ProgramBuilder, _| {
        fill(b, &mut catch_g, BODY_BUDGET);
        Ok(())
    };
    if with_finally {
        b.build_try_catch_finally(try_body, catch_body, |b| {
            b.load_undefined()?;
            Ok(())
        })
    } else {
        b.build_try_catch(try_body, catch_body)
    }
}

fn with_statement(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let object = typed_var(b, g, ValueType::OBJECT)?;
    b.build_with(object, |b| {
        fill(b, g, BODY_BUDGET);
        Ok(())
    })
}

fn block_statement(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    b.build_block_statement(|b| {
        fill(b, g, BODY_BUDGET);
        Ok(())
    })
}

fn object_literal(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let members = g.rng.gen_range(1..5);
    b.build_object_literal(|b| {
        fill(b, g, members);
        Ok(())
    })?;
    Ok(())
}

fn class_definition(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let superclass = if g.rng.gen_bool(0.3) {
        b.random_variable_of_type(g.rng, ValueType::FUNCTION)
    } else {
        None
    };
    let members = g.rng.gen_range(1..4);
    let class = b.build_class_definition(superclass, |b, _| {
        if g.rng.gen_bool(0.7) {
            let parameters = Parameters::new(g.rng.gen_range(0..3));
            b.build_class_constructor(parameters, |b, this, params| {
                if superclass.is_some() {
                    b.call_super_constructor(&[])?;
                }
                for param in params {
                    b.set_property(this, Environment::random_property(g.rng), *param)?;
                }
                fill(b, g, 2);
                Ok(())
            })?;
        }
        fill(b, g, members);
        Ok(())
    })?;
    if g.rng.gen_bool(0.6) {
        let args = some_vars(b, g, 2);
        b.construct(class, &args)?;
    }
    Ok(())
}

fn code_string(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let code = b.build_code_string(|b| {
        fill(b, g, BODY_BUDGET);
        Ok(())
    })?;
    let eval = b.load_builtin("eval")?;
    b.call_function(eval, &[code])?;
    Ok(())
}

fn literal_property(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let v = any_var(b, g)?;
    b.object_literal_add_property(Environment::random_property(g.rng), v)
}

fn literal_element(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let v = any_var(b, g)?;
    b.object_literal_add_element(Environment::random_element_index(g.rng), v)
}

fn literal_spread(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let v = typed_var(b, g, ValueType::OBJECT)?;
    b.object_literal_copy_properties(v)
}

fn literal_method(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let name = Environment::random_method(g.rng);
    let parameters = random_parameters(g);
    b.build_object_literal_method(name, parameters, |b, this, _| {
        fill(b, g, BODY_BUDGET);
        b.do_return(this)
    })
}

fn literal_accessor(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let name = Environment::random_property(g.rng);
    if g.rng.gen() {
        b.build_object_literal_getter(name, |b, _| {
            fill(b, g, BODY_BUDGET);
            let v = any_var(b, g)?;
            b.do_return(v)
        })
    } else {
        b.build_object_literal_setter(name, |b, this, value| {
            b.set_property(this, "_value", value)?;
            fill(b, g, BODY_BUDGET);
            Ok(())
        })
    }
}

fn class_property(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let name = Environment::random_property(g.rng);
    let value = if g.rng.gen() { b.random_variable(g.rng) } else { None };
    let is_static = g.rng.gen_bool(0.3);
    b.class_add_property(name, value, is_static)
}

fn class_method(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let name = Environment::random_method(g.rng);
    let parameters = random_parameters(g);
    let is_static = g.rng.gen_bool(0.3);
    b.build_class_method(name, parameters, is_static, |b, _, _| {
        fill(b, g, BODY_BUDGET);
        if let Some(v) = b.random_variable(g.rng) {
            b.do_return(v)?;
        }
        Ok(())
    })
}

fn class_accessor(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    let name = Environment::random_property(g.rng);
    let is_static = g.rng.gen_bool(0.3);
    if g.rng.gen() {
        b.build_class_getter(name, is_static, |b, this| {
            fill(b, g, BODY_BUDGET);
            b.do_return(this)
        })
    } else {
        b.build_class_setter(name, is_static, |b, this, value| {
            b.set_property(this, "_value", value)?;
            fill(b, g, BODY_BUDGET);
            Ok(())
        })
    }
}

fn class_static_initializer(b: &mut ProgramBuilder, g: &mut Generation<'_>) -> Result<()> {
    b.build_class_static_initializer(|b, _| {
        fill(b, g, BODY_BUDGET);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_program;

    #[test]
    fn test_generator_names_are_unique() {
        let mut names: Vec<&str> = GENERATORS.iter().map(|g| g.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
        assert!(GENERATORS.iter().all(|g| g.weight > 0));
    }

    #[test]
    fn test_every_context_has_generators() {
        for ctx in [SCRIPT, OBJECT_LITERAL, CLASS] {
            assert!(GENERATORS
                .iter()
                .any(|g| ctx.permits(g.required, g.incompatible) && !g.needs_inputs));
        }
    }

    #[test]
    fn test_generate_program_is_deterministic() {
        let mut b = ProgramBuilder::new();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let first = generate_program(&mut b, &mut rng, 30, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let second = generate_program(&mut b, &mut rng, 30, 3);
        assert_eq!(first.code(), second.code());
        assert!(first.len() >= 3);
    }

    #[test]
    fn test_generated_programs_validate() {
        let mut b = ProgramBuilder::new();
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let program = generate_program(&mut b, &mut rng, 40, 3);
            if let Err(e) = validate_program(&program) {
                panic!("seed {} produced an invalid program: {}", seed, e);
            }
        }
    }

    #[test]
    fn test_generate_code_respects_position() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut b = ProgramBuilder::new();
        b.load_int(1).unwrap();
        b.build_object_literal(|b| {
            let n = generate_code(b, &mut rng, 4, 1);
            assert!(b.code()[2..].iter().all(|i| i.index >= 2));
            assert!(n <= b.len());
            Ok(())
        })
        .unwrap();
        assert!(validate_program(&b.finalize()).is_ok());
    }
}
