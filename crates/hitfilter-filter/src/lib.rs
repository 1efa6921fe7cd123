//! Filter compilation and result projection.
//!
//! - `system`: explicit configuration and the filter/rule factories
//! - `filter`: rule validation, the cached compiled query, execution
//! - `compile`: filter → structural query
//! - `project`: match tuples → pruned document
//! - `summary`: per-document outcome of batch runs

pub mod compile;
pub mod error;
pub mod filter;
pub mod project;
pub mod summary;
pub mod system;

pub use compile::QueryCompiler;
pub use error::{CompileError, FilterError, Result, ValidationError};
pub use filter::{Filter, DEFAULT_DESCRIPTION, EMPTY_FILTER_TEXT};
pub use project::{project_document, project_feature_table};
pub use summary::{FilterResultAtom, FilterResultSummary};
pub use system::{FilterDefinition, FilterSystem, FilterSystemConfig};
