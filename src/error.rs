//! Error types shared across the crate, grouped by the boundary they are raised at
//! rather than collapsed into one crate-wide enum.

use thiserror::Error;

/// Errors raised while constructing or validating a [`crate::data::Dataset`].
#[derive(Error, Debug, PartialEq)]
pub enum DataError {
    #[error("column {var} has {got} observations, expected {expected}")]
    RowWidthMismatch {
        var: usize,
        got: usize,
        expected: usize,
    },
    #[error("column {var} is not dense in [0, arity): missing state {missing}")]
    NonDenseColumn { var: usize, missing: usize },
    #[error("{n} variables exceed the capacity of the chosen index width ({capacity})")]
    TooManyVariables { n: usize, capacity: usize },
    #[error("{m} observations exceed the capacity of the chosen index width ({capacity})")]
    TooManyObservations { m: usize, capacity: usize },
    #[error("column {var} spans {arity} states, which exceeds the per-variable capacity ({capacity})")]
    ArityOverflow { var: usize, arity: usize, capacity: usize },
    #[error("variable name list has {got} entries, expected {expected}")]
    NameCountMismatch { got: usize, expected: usize },
}

/// Errors raised by the CI oracle.
#[derive(Error, Debug, PartialEq)]
pub enum CiError {
    #[error("conditioning set implies {df} degrees of freedom, which does not fit in a u32")]
    DegreesOfFreedomOverflow { df: u64 },
    #[error("variable index {index} out of range for {n} variables")]
    VariableOutOfRange { index: usize, n: usize },
}

/// Errors raised by the learning drivers and the distributed coordinator.
#[derive(Error, Debug)]
pub enum StructureLearningError {
    #[error(transparent)]
    Ci(#[from] CiError),
    #[error(transparent)]
    Orient(#[from] OrientError),
    #[error("{0} is not implemented for this configuration")]
    Unimplemented(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Errors raised by the graph orienter.
#[derive(Error, Debug, PartialEq)]
pub enum OrientError {
    #[error("arc ({0}, {1}) already exists")]
    ArcAlreadyExists(usize, usize),
    #[error("arc ({0}, {1}) is not present")]
    ArcNotPresent(usize, usize),
    #[error("vertex index {index} out of range for {n} vertices")]
    VertexOutOfRange { index: usize, n: usize },
    #[error("self-loop requested for vertex {0}")]
    SelfLoop(usize),
}

/// Top-level error composed in the CLI binary.
#[derive(Error, Debug)]
pub enum LearnError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Ci(#[from] CiError),
    #[error(transparent)]
    StructureLearning(#[from] StructureLearningError),
    #[error(transparent)]
    Orient(#[from] OrientError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("format error: {0}")]
    Format(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
