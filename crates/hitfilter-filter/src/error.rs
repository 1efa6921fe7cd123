//! Filter errors.

use hitfilter_dsl::{DataType, EntityKind, RegistryError, RuleError};
use hitfilter_graph::EngineError;
use thiserror::Error;

/// Why `Filter::add` refused a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rule defines an unknown object accessor: {0}")]
    UnknownAccessor(String),

    #[error("rule defines an invalid operator. Seen: {seen}. Expected, one of: [{}].", .expected.join(", "))]
    InvalidOperator { seen: String, expected: Vec<String> },

    #[error("rule contains an invalid value type. Expected: {}, found: {found}", .expected.label())]
    InvalidValueType {
        expected: DataType,
        found: &'static str,
    },

    #[error("rule contains a non-finite number")]
    NonFiniteValue,

    #[error("rule contains an empty collection value")]
    EmptyCollection,

    #[error("operator {operator} expects {expected}")]
    InvalidValueShape {
        operator: String,
        expected: &'static str,
    },
}

/// Why a filter could not be turned into a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Object type {0} is not supported!")]
    UnsupportedEntity(EntityKind),

    #[error("{0}: wrong values: expected a Set")]
    ExpectedSet(String),

    #[error("{0}: wrong values: expected two values (lower, upper)")]
    ExpectedRange(String),

    #[error("{0}: wrong values: expected a single value")]
    ExpectedScalar(String),

    #[error("rule defines an unknown object accessor: {0}")]
    UnknownAccessor(String),

    #[error("rule defines an unknown operator: {0}")]
    UnknownOperator(String),
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Unable to filter data: {0}")]
    Execution(String),
}

impl From<EngineError> for FilterError {
    fn from(e: EngineError) -> Self {
        FilterError::Execution(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;
