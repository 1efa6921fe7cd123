//! Hitfilter rule language
//!
//! Typed building blocks shared by the graph, filter and storage crates:
//!
//! - `value`: the closed set of values rules compare against
//! - `operator`: operator symbols and their display phrases
//! - `accessor`: the registry mapping visible field names to typed attributes
//! - `rule`: one constraint (accessor + operator + value)
//! - `migration`: load-time rewrites for filters saved by older releases
//! - `query` / `parser`: the structural query AST and its constraint grammar

pub mod accessor;
pub mod entity;
pub mod migration;
pub mod operator;
pub mod parser;
pub mod query;
pub mod rule;
pub mod value;

pub use accessor::{AccessorEntry, AccessorRegistry, RegistryError, RegistryOptions};
pub use entity::{EdgeKind, EntityKind};
pub use operator::{Operator, OperatorShape, OperatorVocabulary};
pub use parser::{parse_constraint, QueryParseError};
pub use query::{CompareOp, EdgeDecl, Expr, GraphQuery, Literal, Operand, SetFn, VertexDecl};
pub use rule::{Rule, RuleError};
pub use value::{DataType, Value, ValueParseError, ValueSet};
