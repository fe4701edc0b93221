//! Intermediate representation for generated JavaScript test cases.
//!
//! Programs are flat instruction sequences with explicit block structure.
//! They are only ever assembled through [`ProgramBuilder`], which tracks the
//! active [`Context`] and variable visibility so that every finalized program
//! is balanced, uses only visible variables, and contains only operations
//! legal where they appear. Mutators derive new programs by replaying old
//! ones through a builder.

pub mod analyzer;
pub mod builder;
pub mod codec;
pub mod context;
pub mod environment;
pub mod generator;
pub mod instruction;
pub mod lifter;
pub mod mutation;
pub mod operation;
pub mod program;
pub mod typing;
pub mod validation;

pub use analyzer::{slice_requirements, ContextAnalyzer, ScopeAnalyzer};
pub use builder::ProgramBuilder;
pub use codec::EncodedProgram;
pub use context::Context;
pub use environment::Environment;
pub use generator::{generate_code, generate_program, CodeGenerator, GENERATORS};
pub use instruction::{Instruction, Variable};
pub use lifter::{Lifter, TextLifter};
pub use mutation::{
    default_mutators, splice_into, CodeGenMutator, CombineMutator, DonorPool, InputMutator,
    Mutator, NoDonors, OperationMutator, SpliceMutator,
};
pub use operation::{
    BinaryOperator, BlockKind, Comparator, FunctionKind, Operation, Parameters, UnaryOperator,
};
pub use program::Program;
pub use typing::{infer_types, ValueType};
pub use validation::{validate_instructions, validate_program};
