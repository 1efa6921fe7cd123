//! Persisted filter documents.
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "name": "kinases",
//!   "description": "PDB kinase hits",
//!   "exclusive": true,
//!   "rules": [
//!     { "accessor": "Hit Accession", "operator": "==", "value": { "str": "1FQY-A" } }
//!   ]
//! }
//! ```
//!
//! Accessor names are a stable external contract. Documents written by older
//! releases may use retired accessor names, operator phrases instead of
//! symbols, or integer percentages; loading rewrites all of these before the
//! rules are validated. Documents without `format_version` predate versioning
//! and are read as version 0.

use crate::error::{Result, SerializerError};
use hitfilter_dsl::migration::{canonical_accessor_name, CURRENT_FORMAT_VERSION};
use hitfilter_dsl::{Rule, Value};
use hitfilter_filter::{Filter, FilterDefinition, FilterSystem};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleIo {
    pub accessor: String,
    pub operator: String,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterIo {
    #[serde(default)]
    pub format_version: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_exclusive")]
    pub exclusive: bool,
    #[serde(default)]
    pub rules: Vec<RuleIo>,
}

fn default_exclusive() -> bool {
    true
}

impl FilterIo {
    pub fn from_definition(definition: &FilterDefinition) -> Self {
        Self {
            format_version: CURRENT_FORMAT_VERSION,
            name: definition.name.clone(),
            description: definition.description.clone(),
            exclusive: definition.exclusive,
            rules: definition
                .rules
                .iter()
                .map(|r| RuleIo {
                    accessor: r.accessor().to_string(),
                    operator: r.operator().to_string(),
                    value: Some(r.value().clone()),
                })
                .collect(),
        }
    }

    pub fn from_filter(filter: &Filter) -> Self {
        Self::from_definition(&filter.definition())
    }

    /// Migrates the persisted form to current names and symbols.
    ///
    /// Rules are not validated against the registry here; that happens when
    /// the definition becomes a filter.
    pub fn into_definition(self, system: &FilterSystem) -> Result<FilterDefinition> {
        if self.format_version > CURRENT_FORMAT_VERSION {
            return Err(SerializerError::UnsupportedVersion {
                found: self.format_version,
                supported: CURRENT_FORMAT_VERSION,
            });
        }
        let rules = self
            .rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| migrate_rule(system, index, rule))
            .collect::<Result<Vec<_>>>()?;
        Ok(FilterDefinition {
            name: self.name,
            description: self.description,
            exclusive: self.exclusive,
            rules,
        })
    }
}

fn migrate_rule(system: &FilterSystem, index: usize, rule: RuleIo) -> Result<Rule> {
    let invalid = |reason: String| SerializerError::InvalidRule { index, reason };
    let value = rule
        .value
        .ok_or_else(|| invalid(format!("{}: missing value", rule.accessor)))?;

    let accessor = canonical_accessor_name(&rule.accessor);
    if accessor != rule.accessor {
        tracing::info!(from = %rule.accessor, to = %accessor, "migrated legacy accessor name");
    }
    let operator = system
        .vocabulary()
        .resolve(&rule.operator)
        .map(|op| op.symbol())
        .unwrap_or(rule.operator.as_str());

    Rule::new(accessor, operator, value).map_err(|e| invalid(e.to_string()))
}

// =============================================================================
// Serializers
// =============================================================================

/// Encodes persisted filters to and from bytes.
pub trait FilterSerializer {
    fn serialize(&self, filter: &FilterIo) -> Result<Vec<u8>>;
    fn deserialize(&self, bytes: &[u8]) -> Result<FilterIo>;
}

#[derive(Debug, Clone, Copy)]
pub struct JsonFilterSerializer {
    pub pretty: bool,
}

impl Default for JsonFilterSerializer {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl FilterSerializer for JsonFilterSerializer {
    fn serialize(&self, filter: &FilterIo) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(filter)?
        } else {
            serde_json::to_vec(filter)?
        };
        Ok(bytes)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<FilterIo> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// =============================================================================
// Files
// =============================================================================

/// Writes `filter` to `path` through a temporary sibling file, so a failed
/// write never leaves a truncated document behind.
pub fn save_filter_with(serializer: &dyn FilterSerializer, filter: &Filter, path: &Path) -> Result<()> {
    let bytes = serializer.serialize(&FilterIo::from_filter(filter))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SerializerError::io(parent, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|e| SerializerError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| SerializerError::io(path, e))?;
    tracing::debug!(filter = %filter.name(), path = %path.display(), "saved filter");
    Ok(())
}

pub fn load_definition_with(
    serializer: &dyn FilterSerializer,
    system: &FilterSystem,
    path: &Path,
) -> Result<FilterDefinition> {
    let bytes = fs::read(path).map_err(|e| SerializerError::io(path, e))?;
    serializer.deserialize(&bytes)?.into_definition(system)
}

pub fn load_filter_with(
    serializer: &dyn FilterSerializer,
    system: &FilterSystem,
    path: &Path,
) -> Result<Filter> {
    let definition = load_definition_with(serializer, system, path)?;
    let filter = system.create_filter_from(&definition)?;
    tracing::debug!(filter = %filter.name(), rules = filter.len(), "loaded filter");
    Ok(filter)
}

pub fn save_filter(filter: &Filter, path: &Path) -> Result<()> {
    save_filter_with(&JsonFilterSerializer::default(), filter, path)
}

pub fn load_filter(system: &FilterSystem, path: &Path) -> Result<Filter> {
    load_filter_with(&JsonFilterSerializer::default(), system, path)
}
