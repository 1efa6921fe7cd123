//! Filter persistence.
//!
//! Filters are stored as versioned JSON documents (`FilterIo`). Loading goes
//! through the load-time migration in `persistence` and then through the
//! same validation as interactively built filters.

pub mod error;
pub mod persistence;

pub use error::{Result, SerializerError};
pub use persistence::{
    load_definition_with, load_filter, load_filter_with, save_filter, save_filter_with,
    FilterIo, FilterSerializer, JsonFilterSerializer, RuleIo,
};
