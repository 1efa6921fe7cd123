//! Load-time rewrites for filters persisted by older releases.
//!
//! Two kinds of debt live here and nowhere else:
//!
//! - accessor visible names that were renamed after filters had been saved
//!   with the old name, and
//! - three HSP percentage accessors whose values used to be stored as
//!   integers and are now doubles.
//!
//! New accessors must not be added to these tables.

use crate::value::Value;

/// Current version of the persisted filter format.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessorRename {
    pub legacy: &'static str,
    pub current: &'static str,
}

pub const ACCESSOR_RENAMES: &[AccessorRename] = &[
    AccessorRename {
        legacy: "Feature type",
        current: "Feature: type",
    },
    AccessorRename {
        legacy: "Qualifier name",
        current: "Feature: Qualifier name",
    },
    AccessorRename {
        legacy: "Qualifier value",
        current: "Feature: Qualifier value",
    },
    AccessorRename {
        legacy: "Query Coverage",
        current: "HSP/Local Query Coverage",
    },
    AccessorRename {
        legacy: "Hit Coverage",
        current: "HSP/Local Hit Coverage",
    },
];

/// Internal attribute names whose values were persisted as integers.
pub const LEGACY_INTEGER_ATTRIBUTES: &[&str] = &["identity", "positive", "gaps"];

/// Returns the current visible name for a possibly-legacy one.
pub fn canonical_accessor_name(name: &str) -> &str {
    ACCESSOR_RENAMES
        .iter()
        .find(|r| r.legacy == name)
        .map(|r| r.current)
        .unwrap_or(name)
}

/// Promotes an integer scalar to a double for the legacy percentage
/// attributes. Anything else is returned unchanged.
pub fn promote_legacy_integer(attribute: &str, value: Value) -> Value {
    match value {
        Value::Long(v) if LEGACY_INTEGER_ATTRIBUTES.contains(&attribute) => Value::Double(v as f64),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renames_and_passthrough() {
        assert_eq!(canonical_accessor_name("Feature type"), "Feature: type");
        assert_eq!(canonical_accessor_name("Hit Coverage"), "HSP/Local Hit Coverage");
        assert_eq!(canonical_accessor_name("Hit Accession"), "Hit Accession");
    }

    #[test]
    fn test_promotion_is_scalar_only_and_scoped() {
        assert_eq!(promote_legacy_integer("identity", Value::Long(90)), Value::Double(90.0));
        assert_eq!(promote_legacy_integer("alignLen", Value::Long(90)), Value::Long(90));
        let list = Value::List(vec![Value::Long(1), Value::Long(2)]);
        assert_eq!(promote_legacy_integer("gaps", list.clone()), list);
    }
}
