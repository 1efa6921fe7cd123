//! Query execution.
//!
//! `QueryEngine` is the seam between filters and pattern matching: it takes a
//! document graph and a `GraphQuery` and returns every variable binding that
//! satisfies the declarations and the constraint.
//!
//! `BacktrackingEngine` is the in-process implementation. It orders variables
//! so that each one (after the first) is reachable through a declared edge from
//! an already-bound variable, draws candidates from that edge, and prunes
//! partial bindings as soon as the constraint is decided false.

use crate::attribute::{Attribute, Entity};
use crate::graph::{DocumentGraph, NodeId};
use hitfilter_dsl::query::{CompareOp, Expr, GraphQuery, Operand, SetFn};
use hitfilter_dsl::{EdgeKind, EntityKind, Value};
use regex::Regex;
use roaring::RoaringBitmap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("variable `{0}` is declared more than once")]
    DuplicateVariable(String),

    #[error("variable `{0}` is not declared")]
    UndeclaredVariable(String),

    #[error("edge `{edge}` ({kind}) connects {parent_kind} to {child_kind}, but `{parent}` is {found_parent} and `{child}` is {found_child}")]
    EdgeKindMismatch {
        edge: String,
        kind: EdgeKind,
        parent_kind: EntityKind,
        child_kind: EntityKind,
        parent: String,
        child: String,
        found_parent: EntityKind,
        found_child: EntityKind,
    },

    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("set function {0} needs a numeric operand list")]
    SetLiteralMismatch(&'static str),
}

/// Variable bindings returned by a query, one map per match tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub selected_vars: Vec<String>,
    pub rows: Vec<BTreeMap<String, NodeId>>,
    pub truncated: bool,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

pub trait QueryEngine: Send + Sync + fmt::Debug {
    fn execute(&self, graph: &DocumentGraph<'_>, query: &GraphQuery) -> Result<QueryResult, EngineError>;
}

#[derive(Debug, Clone, Default)]
pub struct BacktrackingEngine {
    /// Stop after this many rows (`truncated` is set on the result).
    pub max_rows: Option<usize>,
}

impl BacktrackingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_rows(max_rows: usize) -> Self {
        Self {
            max_rows: Some(max_rows),
        }
    }
}

impl QueryEngine for BacktrackingEngine {
    fn execute(&self, graph: &DocumentGraph<'_>, query: &GraphQuery) -> Result<QueryResult, EngineError> {
        let prepared = PreparedQuery::prepare(query)?;
        Ok(prepared.run(graph, self.max_rows))
    }
}

// =============================================================================
// Preparation
// =============================================================================

#[derive(Debug)]
struct PreparedEdge {
    kind: EdgeKind,
    parent: usize,
    child: usize,
}

#[derive(Debug)]
struct PreparedOperand {
    var: usize,
    kind: EntityKind,
    /// `None` when the name is unknown for `kind`; compares as null.
    attribute: Option<Attribute>,
}

#[derive(Debug)]
enum PreparedExpr {
    And(Vec<PreparedExpr>),
    Or(Vec<PreparedExpr>),
    Compare {
        operand: PreparedOperand,
        op: CompareOp,
        rhs: Value,
        pattern: Option<Regex>,
    },
    InSet {
        operand: PreparedOperand,
        negated: bool,
        values: Vec<Value>,
    },
}

#[derive(Debug)]
struct PreparedQuery {
    vars: Vec<String>,
    kinds: Vec<EntityKind>,
    edges: Vec<PreparedEdge>,
    /// Binding order and, per position, the edge that supplies candidates.
    order: Vec<(usize, Option<usize>)>,
    expr: Option<PreparedExpr>,
    returned: Vec<usize>,
    distinct: bool,
}

impl PreparedQuery {
    fn prepare(query: &GraphQuery) -> Result<Self, EngineError> {
        let mut index: BTreeMap<&str, usize> = BTreeMap::new();
        let mut vars = Vec::new();
        let mut kinds = Vec::new();
        for decl in query.vertices() {
            if index.insert(decl.var.as_str(), vars.len()).is_some() {
                return Err(EngineError::DuplicateVariable(decl.var.clone()));
            }
            vars.push(decl.var.clone());
            kinds.push(decl.kind);
        }
        let var_index = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| EngineError::UndeclaredVariable(name.to_string()))
        };

        let mut edges = Vec::with_capacity(query.edges().len());
        for decl in query.edges() {
            let parent = var_index(&decl.parent)?;
            let child = var_index(&decl.child)?;
            let (parent_kind, child_kind) = decl.kind.endpoints();
            if kinds[parent] != parent_kind || kinds[child] != child_kind {
                return Err(EngineError::EdgeKindMismatch {
                    edge: decl.name.clone(),
                    kind: decl.kind,
                    parent_kind,
                    child_kind,
                    parent: decl.parent.clone(),
                    child: decl.child.clone(),
                    found_parent: kinds[parent],
                    found_child: kinds[child],
                });
            }
            edges.push(PreparedEdge {
                kind: decl.kind,
                parent,
                child,
            });
        }

        let expr = query
            .constraint()
            .map(|e| prepare_expr(e, &var_index, &kinds))
            .transpose()?;

        let returned = query
            .return_vars()
            .into_iter()
            .map(var_index)
            .collect::<Result<Vec<_>, _>>()?;

        let order = binding_order(vars.len(), &edges);

        Ok(Self {
            vars,
            kinds,
            edges,
            order,
            expr,
            returned,
            distinct: query.is_distinct(),
        })
    }

    fn run(&self, graph: &DocumentGraph<'_>, max_rows: Option<usize>) -> QueryResult {
        let mut result = QueryResult {
            selected_vars: self.returned.iter().map(|&v| self.vars[v].clone()).collect(),
            ..QueryResult::default()
        };
        if self.vars.is_empty() || graph.is_empty() {
            return result;
        }

        let candidates: Vec<RoaringBitmap> =
            self.kinds.iter().map(|&k| graph.nodes_of_kind(k)).collect();
        let mut assigned: Vec<Option<NodeId>> = vec![None; self.vars.len()];
        let mut seen: BTreeSet<Vec<NodeId>> = BTreeSet::new();
        let mut search = Search {
            query: self,
            graph,
            candidates: &candidates,
            max_rows,
            seen: &mut seen,
            out: &mut result,
        };
        search.assign(0, &mut assigned);
        result
    }
}

/// Variables in an order where each one after a root is connected by an edge
/// to an earlier one. Unconnected variables start new roots in declaration
/// order.
fn binding_order(var_count: usize, edges: &[PreparedEdge]) -> Vec<(usize, Option<usize>)> {
    let mut placed = vec![false; var_count];
    let mut order = Vec::with_capacity(var_count);
    while order.len() < var_count {
        let next = edges.iter().enumerate().find_map(|(i, e)| {
            match (placed[e.parent], placed[e.child]) {
                (true, false) => Some((e.child, Some(i))),
                (false, true) => Some((e.parent, Some(i))),
                _ => None,
            }
        });
        let (var, via) = match next {
            Some(found) => found,
            None => match placed.iter().position(|p| !p) {
                Some(root) => (root, None),
                None => break,
            },
        };
        placed[var] = true;
        order.push((var, via));
    }
    order
}

fn prepare_expr<F>(expr: &Expr, var_index: &F, kinds: &[EntityKind]) -> Result<PreparedExpr, EngineError>
where
    F: Fn(&str) -> Result<usize, EngineError>,
{
    Ok(match expr {
        Expr::And(parts) => PreparedExpr::And(
            parts
                .iter()
                .map(|p| prepare_expr(p, var_index, kinds))
                .collect::<Result<_, _>>()?,
        ),
        Expr::Or(parts) => PreparedExpr::Or(
            parts
                .iter()
                .map(|p| prepare_expr(p, var_index, kinds))
                .collect::<Result<_, _>>()?,
        ),
        Expr::Compare { lhs, op, rhs } => {
            let operand = prepare_operand(lhs, var_index, kinds)?;
            let rhs = rhs.to_value();
            let pattern = match (op, &rhs) {
                (CompareOp::Matches | CompareOp::NotMatches, Value::Str(p)) => {
                    Some(Regex::new(p).map_err(|e| EngineError::InvalidPattern {
                        pattern: p.clone(),
                        message: e.to_string(),
                    })?)
                }
                _ => None,
            };
            PreparedExpr::Compare {
                operand,
                op: *op,
                rhs,
                pattern,
            }
        }
        Expr::InSet {
            func,
            operand,
            values,
        } => {
            let values: Vec<Value> = values.iter().map(|l| l.to_value()).collect();
            if matches!(func, SetFn::LongInSet | SetFn::LongNotInSet)
                && values.iter().any(|v| v.as_f64().is_none())
            {
                return Err(EngineError::SetLiteralMismatch(func.name()));
            }
            PreparedExpr::InSet {
                operand: prepare_operand(operand, var_index, kinds)?,
                negated: func.is_negated(),
                values,
            }
        }
    })
}

fn prepare_operand<F>(
    operand: &Operand,
    var_index: &F,
    kinds: &[EntityKind],
) -> Result<PreparedOperand, EngineError>
where
    F: Fn(&str) -> Result<usize, EngineError>,
{
    let var = var_index(operand.var())?;
    let kind = kinds[var];
    let attribute = Attribute::lookup(kind, operand.name());
    if attribute.is_none() {
        tracing::warn!(
            var = %operand.var(),
            entity = %kind,
            attribute = %operand.name(),
            "unknown attribute; comparisons against it are false"
        );
    }
    Ok(PreparedOperand {
        var,
        kind,
        attribute,
    })
}

// =============================================================================
// Search
// =============================================================================

struct Search<'q, 'g, 'a> {
    query: &'q PreparedQuery,
    graph: &'g DocumentGraph<'a>,
    candidates: &'q [RoaringBitmap],
    max_rows: Option<usize>,
    seen: &'q mut BTreeSet<Vec<NodeId>>,
    out: &'q mut QueryResult,
}

impl Search<'_, '_, '_> {
    fn assign(&mut self, idx: usize, assigned: &mut [Option<NodeId>]) {
        if self.out.truncated {
            return;
        }
        if idx == self.query.order.len() {
            self.emit(assigned);
            return;
        }

        let (var, via) = self.query.order[idx];
        for node in self.candidates_for(var, via, assigned) {
            assigned[var] = Some(node);
            if self.edges_hold(assigned) && self.partial_check(assigned) != Some(false) {
                self.assign(idx + 1, assigned);
            }
            assigned[var] = None;
            if self.out.truncated {
                return;
            }
        }
    }

    fn candidates_for(&self, var: usize, via: Option<usize>, assigned: &[Option<NodeId>]) -> Vec<NodeId> {
        let allowed = &self.candidates[var];
        let Some(edge_idx) = via else {
            return allowed.iter().collect();
        };
        let edge = &self.query.edges[edge_idx];
        if edge.child == var {
            match assigned[edge.parent] {
                Some(parent) => self
                    .graph
                    .children(parent, edge.kind)
                    .filter(|n| allowed.contains(*n))
                    .collect(),
                None => Vec::new(),
            }
        } else {
            assigned[edge.child]
                .and_then(|child| self.graph.parent(child, edge.kind))
                .filter(|n| allowed.contains(*n))
                .into_iter()
                .collect()
        }
    }

    /// Every declared edge whose endpoints are both bound must exist.
    fn edges_hold(&self, assigned: &[Option<NodeId>]) -> bool {
        self.query.edges.iter().all(|e| match (assigned[e.parent], assigned[e.child]) {
            (Some(p), Some(c)) => self.graph.has_edge(p, c, e.kind),
            _ => true,
        })
    }

    /// `Some(false)` once the constraint can no longer hold.
    fn partial_check(&self, assigned: &[Option<NodeId>]) -> Option<bool> {
        match &self.query.expr {
            Some(expr) => self.eval(expr, assigned),
            None => Some(true),
        }
    }

    fn eval(&self, expr: &PreparedExpr, assigned: &[Option<NodeId>]) -> Option<bool> {
        match expr {
            PreparedExpr::And(parts) => {
                let mut all = true;
                for p in parts {
                    match self.eval(p, assigned) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => all = false,
                    }
                }
                all.then_some(true)
            }
            PreparedExpr::Or(parts) => {
                let mut none = true;
                for p in parts {
                    match self.eval(p, assigned) {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => none = false,
                    }
                }
                none.then_some(false)
            }
            PreparedExpr::Compare {
                operand,
                op,
                rhs,
                pattern,
            } => {
                let node = assigned[operand.var]?;
                let value = self.resolve(operand, node);
                Some(match value {
                    Some(v) => compare(&v, *op, rhs, pattern.as_ref()),
                    None => false,
                })
            }
            PreparedExpr::InSet {
                operand,
                negated,
                values,
            } => {
                let node = assigned[operand.var]?;
                Some(match self.resolve(operand, node) {
                    Some(v) => values.iter().any(|x| values_equal(&v, x)) != *negated,
                    None => false,
                })
            }
        }
    }

    fn resolve(&self, operand: &PreparedOperand, node: NodeId) -> Option<Value> {
        let attribute = operand.attribute?;
        let entity: Entity<'_> = self.graph.entity(node)?;
        if entity.kind() != operand.kind {
            return None;
        }
        attribute.extract(entity)
    }

    fn emit(&mut self, assigned: &[Option<NodeId>]) {
        if self.partial_check(assigned) != Some(true) {
            return;
        }
        let mut key = Vec::with_capacity(self.query.returned.len());
        let mut row = BTreeMap::new();
        for &v in &self.query.returned {
            let Some(node) = assigned[v] else {
                return;
            };
            key.push(node);
            row.insert(self.query.vars[v].clone(), node);
        }
        if self.query.distinct && !self.seen.insert(key) {
            return;
        }
        self.out.rows.push(row);
        if let Some(max) = self.max_rows {
            if self.out.rows.len() >= max {
                self.out.truncated = true;
            }
        }
    }
}

// =============================================================================
// Comparisons
// =============================================================================

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Long(x), Value::Long(y)) => x == y,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Compares an attribute value against a literal. Mismatched types are false.
fn compare(value: &Value, op: CompareOp, rhs: &Value, pattern: Option<&Regex>) -> bool {
    use std::cmp::Ordering;

    if let CompareOp::Matches | CompareOp::NotMatches = op {
        let (Some(text), Some(re)) = (value_text(value), pattern) else {
            return false;
        };
        return re.is_match(&text) == (op == CompareOp::Matches);
    }

    let ordering = match (value, rhs) {
        (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Matches | CompareOp::NotMatches => false,
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Str(s) => Some(s.clone()),
        Value::Char(c) => Some(c.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_comparison_crosses_long_and_double() {
        assert!(compare(&Value::Long(5), CompareOp::Lt, &Value::Double(5.5), None));
        assert!(compare(&Value::Double(5.0), CompareOp::Eq, &Value::Long(5), None));
        assert!(!compare(&Value::Str("5".into()), CompareOp::Eq, &Value::Long(5), None));
    }

    #[test]
    fn test_pattern_matches_anywhere() {
        let re = Regex::new("(?i)(pathogen)").unwrap();
        let v = Value::Str("likely Pathogenic".into());
        assert!(compare(&v, CompareOp::Matches, &Value::Str(String::new()), Some(&re)));
        assert!(!compare(&v, CompareOp::NotMatches, &Value::Str(String::new()), Some(&re)));
    }

    #[test]
    fn test_binding_order_follows_edges() {
        let edges = vec![
            PreparedEdge {
                kind: EdgeKind::ContainsHit,
                parent: 1,
                child: 2,
            },
            PreparedEdge {
                kind: EdgeKind::ContainsIteration,
                parent: 0,
                child: 1,
            },
        ];
        let order = binding_order(3, &edges);
        assert_eq!(order, vec![(0, None), (1, Some(1)), (2, Some(0))]);
    }
}
