//! Filters: named, AND/OR-combined rule sets.
//!
//! ```text
//!            add/remove                compile              execute
//! (new) ─────────────► RulesAdded ───────────► Compiled ─────────────► Compiled
//!                          ▲                       │
//!                          └──── add/remove ───────┘
//! ```
//!
//! A filter owns its rules and a cached compiled query. The query is schema
//! only, so it is reused across documents until the rule set (or the AND/OR
//! mode) changes. The document graph is rebuilt on every execution.

use crate::compile::QueryCompiler;
use crate::error::{FilterError, Result, ValidationError};
use crate::project::{project_document, project_feature_table};
use crate::system::FilterDefinition;
use hitfilter_dsl::migration::{canonical_accessor_name, promote_legacy_integer};
use hitfilter_dsl::{
    AccessorEntry, AccessorRegistry, GraphQuery, Operator, OperatorShape, OperatorVocabulary,
    Rule, Value,
};
use hitfilter_graph::{DocumentGraph, FeatureTable, QueryEngine, SrOutput};
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_DESCRIPTION: &str = "no description";

/// Rendering of a filter without rules.
pub const EMPTY_FILTER_TEXT: &str = "empty";

#[derive(Debug, Clone)]
pub struct Filter {
    name: String,
    description: String,
    exclusive: bool,
    rules: Vec<Rule>,
    registry: Arc<AccessorRegistry>,
    engine: Arc<dyn QueryEngine>,
    compiled: Option<Arc<GraphQuery>>,
    compiled_features: Option<Arc<GraphQuery>>,
}

impl Filter {
    /// Empty, exclusive (AND) filter.
    pub fn new(
        name: impl Into<String>,
        registry: Arc<AccessorRegistry>,
        engine: Arc<dyn QueryEngine>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FilterError::Config("filter name must not be empty".to_string()));
        }
        Ok(Self {
            name,
            description: DEFAULT_DESCRIPTION.to_string(),
            exclusive: true,
            rules: Vec::new(),
            registry,
            engine,
            compiled: None,
            compiled_features: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FilterError::Config("filter name must not be empty".to_string()));
        }
        self.name = name;
        Ok(())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// An empty description resets to the default.
    pub fn set_description(&mut self, description: impl Into<String>) {
        let description = description.into();
        self.description = if description.trim().is_empty() {
            DEFAULT_DESCRIPTION.to_string()
        } else {
            description
        };
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn set_exclusive(&mut self, exclusive: bool) {
        if self.exclusive != exclusive {
            self.exclusive = exclusive;
            self.invalidate();
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn registry(&self) -> &AccessorRegistry {
        &self.registry
    }

    /// Snapshot for persistence. A default description is not carried.
    pub fn definition(&self) -> FilterDefinition {
        FilterDefinition {
            name: self.name.clone(),
            description: (self.description != DEFAULT_DESCRIPTION).then(|| self.description.clone()),
            exclusive: self.exclusive,
            rules: self.rules.clone(),
        }
    }

    // =========================================================================
    // Rule management
    // =========================================================================

    /// Validates `rule` and appends it. On error the filter is unchanged.
    ///
    /// Legacy accessor names and operator phrases are rewritten to their
    /// current symbols; legacy integer percentages are promoted to doubles.
    pub fn add(&mut self, rule: Rule) -> Result<()> {
        let rule = validate(&self.registry, rule)?;
        self.rules.push(rule);
        self.invalidate();
        Ok(())
    }

    /// Removes the first rule equal to `rule`.
    ///
    /// `rule` is normalized the way `add` stores rules (current accessor
    /// name, operator symbol, promoted legacy values) before comparing.
    pub fn remove(&mut self, rule: &Rule) -> bool {
        let target = normalize(&self.registry, rule.clone())
            .map(|(normalized, _, _)| normalized)
            .unwrap_or_else(|_| rule.clone());
        let Some(pos) = self.rules.iter().position(|r| *r == target) else {
            return false;
        };
        self.rules.remove(pos);
        self.invalidate();
        true
    }

    pub fn clear(&mut self) {
        self.rules.clear();
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.compiled = None;
        self.compiled_features = None;
    }

    // =========================================================================
    // Compilation & execution
    // =========================================================================

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Compiles the rule set against the full-document layout (cached).
    pub fn compile(&mut self) -> Result<Arc<GraphQuery>> {
        if let Some(query) = &self.compiled {
            return Ok(Arc::clone(query));
        }
        let started = Instant::now();
        let query = Arc::new(QueryCompiler::new(&self.registry).compile(self.exclusive, &self.rules)?);
        tracing::debug!(
            filter = %self.name,
            rules = self.rules.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "compiled filter"
        );
        self.compiled = Some(Arc::clone(&query));
        Ok(query)
    }

    /// Compiles the rule set against the standalone feature-table layout.
    pub fn compile_feature_table(&mut self) -> Result<Arc<GraphQuery>> {
        if let Some(query) = &self.compiled_features {
            return Ok(Arc::clone(query));
        }
        let query = Arc::new(
            QueryCompiler::new(&self.registry).compile_feature_table(self.exclusive, &self.rules)?,
        );
        self.compiled_features = Some(Arc::clone(&query));
        Ok(query)
    }

    /// Runs the filter on `document` and returns the pruned copy, or `None`
    /// when nothing matched or the filter has no rules. `document` is never
    /// modified.
    pub fn execute(&mut self, document: &SrOutput) -> Result<Option<SrOutput>> {
        if self.rules.is_empty() {
            return Ok(None);
        }
        let query = self.compile()?;

        let started = Instant::now();
        let graph = DocumentGraph::build(document);
        let built = started.elapsed();

        let result = self.engine.execute(&graph, &query)?;
        let matched = started.elapsed();

        let projected = project_document(&graph, &result)?;
        tracing::debug!(
            filter = %self.name,
            nodes = graph.node_count(),
            tuples = result.len(),
            graph_us = built.as_micros() as u64,
            query_us = (matched - built).as_micros() as u64,
            total_us = started.elapsed().as_micros() as u64,
            "executed filter"
        );
        if result.truncated {
            tracing::warn!(filter = %self.name, tuples = result.len(), "query engine truncated the match set");
        }
        Ok(projected)
    }

    /// Runs the filter on a standalone feature table.
    pub fn execute_features(&mut self, table: &FeatureTable) -> Result<Option<FeatureTable>> {
        if self.rules.is_empty() {
            return Ok(None);
        }
        let query = self.compile_feature_table()?;
        let graph = DocumentGraph::from_feature_table(table);
        let result = self.engine.execute(&graph, &query)?;
        project_feature_table(&graph, &result)
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    fn joiner(&self, html: bool) -> &'static str {
        match (html, self.exclusive) {
            (false, true) => " and ",
            (false, false) => " or ",
            (true, true) => " <br><i>and</i> ",
            (true, false) => " <br><i>or</i> ",
        }
    }

    pub fn txt_string(&self) -> String {
        if self.rules.is_empty() {
            return EMPTY_FILTER_TEXT.to_string();
        }
        self.rules
            .iter()
            .map(Rule::txt_string)
            .collect::<Vec<_>>()
            .join(self.joiner(false))
    }

    pub fn html_string(&self) -> String {
        if self.rules.is_empty() {
            return EMPTY_FILTER_TEXT.to_string();
        }
        let body = self
            .rules
            .iter()
            .map(Rule::html_string)
            .collect::<Vec<_>>()
            .join(self.joiner(true));
        format!("<html><body>{body}</body></html>")
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate(registry: &AccessorRegistry, rule: Rule) -> Result<Rule> {
    let (rule, entry, op) = normalize(registry, rule)?;
    check_value(entry, op, rule.value())?;
    Ok(rule)
}

/// Rewrites `rule` into its stored form: current accessor name, operator
/// symbol, promoted legacy values.
fn normalize(registry: &AccessorRegistry, mut rule: Rule) -> Result<(Rule, &AccessorEntry, Operator)> {
    let canonical = canonical_accessor_name(rule.accessor()).to_string();
    let entry = registry
        .lookup(&canonical)
        .ok_or_else(|| ValidationError::UnknownAccessor(rule.accessor().to_string()))?;
    if canonical != rule.accessor() {
        tracing::debug!(from = %rule.accessor(), to = %canonical, "renamed legacy accessor");
        rule.set_accessor(canonical)?;
    }

    let op = OperatorVocabulary::standard()
        .resolve(rule.operator())
        .filter(|op| entry.allows(*op))
        .ok_or_else(|| ValidationError::InvalidOperator {
            seen: rule.operator().to_string(),
            expected: entry.operator_symbols().into_iter().map(String::from).collect(),
        })?;
    if rule.operator() != op.symbol() {
        rule.set_operator(op.symbol())?;
    }

    let promoted = promote_legacy_integer(&entry.attribute, rule.value().clone());
    if &promoted != rule.value() {
        rule.set_value(promoted);
    }
    Ok((rule, entry, op))
}

fn check_value(entry: &AccessorEntry, op: Operator, value: &Value) -> std::result::Result<(), ValidationError> {
    let shape_error = |expected: &'static str| ValidationError::InvalidValueShape {
        operator: op.symbol().to_string(),
        expected,
    };
    let type_error = |found: &Value| ValidationError::InvalidValueType {
        expected: entry.data_type,
        found: found.type_label(),
    };
    match value.elements() {
        None => {
            if op.shape() != OperatorShape::Scalar {
                return Err(shape_error("a collection of values"));
            }
            if !entry.data_type.accepts(value) {
                return Err(type_error(value));
            }
        }
        Some(items) => {
            if items.is_empty() {
                return Err(ValidationError::EmptyCollection);
            }
            match op.shape() {
                OperatorShape::Scalar => return Err(shape_error("a single value")),
                OperatorShape::Range if items.len() != 2 => {
                    return Err(shape_error("exactly two values"))
                }
                _ => {}
            }
            if let Some(bad) = items.iter().find(|v| !entry.data_type.accepts(v)) {
                return Err(type_error(bad));
            }
        }
    }
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue);
    }
    Ok(())
}
