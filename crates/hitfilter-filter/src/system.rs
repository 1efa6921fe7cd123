//! Filter system: the explicit configuration that builds filters and rules.
//!
//! Everything a filter needs at run time (the accessor registry and the query
//! engine) is owned here and handed out as `Arc`s, so several filters can
//! share one registry across threads while each filter stays single-owner.

use crate::error::{FilterError, Result, ValidationError};
use crate::filter::Filter;
use hitfilter_dsl::migration::canonical_accessor_name;
use hitfilter_dsl::{AccessorEntry, AccessorRegistry, OperatorVocabulary, RegistryOptions, Rule, Value};
use hitfilter_graph::{BacktrackingEngine, QueryEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Serde-loadable configuration of a [`FilterSystem`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSystemConfig {
    /// Which default accessor groups to register.
    pub registry: RegistryOptions,
    /// Registered after the defaults; a name already present is replaced.
    pub extra_accessors: Vec<AccessorEntry>,
}

/// Storage-neutral description of a filter, as loaded from or saved to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDefinition {
    pub name: String,
    pub description: Option<String>,
    pub exclusive: bool,
    pub rules: Vec<Rule>,
}

impl FilterDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            exclusive: true,
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterSystem {
    registry: Arc<AccessorRegistry>,
    engine: Arc<dyn QueryEngine>,
    vocabulary: OperatorVocabulary,
}

impl Default for FilterSystem {
    fn default() -> Self {
        Self::with_registry(AccessorRegistry::with_defaults())
    }
}

impl FilterSystem {
    pub fn new(config: &FilterSystemConfig) -> Result<Self> {
        let mut registry = AccessorRegistry::with_options(config.registry);
        for entry in &config.extra_accessors {
            let name = entry.visible_name.clone();
            if registry.register(entry.clone())?.is_some() {
                tracing::info!(accessor = %name, "replaced default accessor");
            }
        }
        tracing::debug!(accessors = registry.len(), "filter system ready");
        Ok(Self::with_registry(registry))
    }

    pub fn with_registry(registry: AccessorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            engine: Arc::new(BacktrackingEngine::new()),
            vocabulary: OperatorVocabulary::standard(),
        }
    }

    /// Replaces the query engine used by filters created from now on.
    pub fn with_engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn registry(&self) -> &AccessorRegistry {
        &self.registry
    }

    pub fn vocabulary(&self) -> &OperatorVocabulary {
        &self.vocabulary
    }

    pub fn accessor_entry(&self, visible_name: &str) -> Option<&AccessorEntry> {
        self.registry.lookup(visible_name)
    }

    pub fn accessor_visible_names(&self) -> Vec<&str> {
        self.registry.visible_names()
    }

    // =========================================================================
    // Factories
    // =========================================================================

    pub fn create_filter(&self, name: impl Into<String>) -> Result<Filter> {
        Filter::new(name, Arc::clone(&self.registry), Arc::clone(&self.engine))
    }

    /// Rebuilds a filter from its definition. Every rule goes through the
    /// same validation as [`Filter::add`]; the first invalid rule aborts.
    pub fn create_filter_from(&self, definition: &FilterDefinition) -> Result<Filter> {
        let mut filter = self.create_filter(definition.name.clone())?;
        if let Some(description) = &definition.description {
            filter.set_description(description.clone());
        }
        filter.set_exclusive(definition.exclusive);
        for rule in &definition.rules {
            filter.add(rule.clone())?;
        }
        Ok(filter)
    }

    pub fn create_rule(
        &self,
        accessor: impl Into<String>,
        operator: impl Into<String>,
        value: Value,
    ) -> Result<Rule> {
        Ok(Rule::new(accessor, operator, value)?)
    }

    /// Builds a rule from user text (`"HSP alignment length"`, `"[]"`,
    /// `"50;150"`). Legacy accessor names are accepted.
    pub fn rule_from_text(&self, accessor: &str, operator: &str, text: &str) -> Result<Rule> {
        let entry = self
            .registry
            .lookup(canonical_accessor_name(accessor.trim()))
            .ok_or_else(|| ValidationError::UnknownAccessor(accessor.to_string()))?;
        Rule::from_text(entry, operator.trim(), text.trim()).map_err(FilterError::from)
    }
}
