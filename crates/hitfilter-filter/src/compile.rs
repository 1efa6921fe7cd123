//! Filter → structural query.
//!
//! Variables are fixed per entity level so query text stays stable across
//! compilations:
//!
//! | var | full document | feature table |
//! |-----|---------------|---------------|
//! | v1  | Output        | FeatureTable  |
//! | v2  | Iteration     | Feature       |
//! | v3  | Hit           | Qualifier     |
//! | v4  | HSP           |               |
//! | v5  | Feature       |               |
//! | v6  | Qualifier     |               |
//!
//! Feature and Qualifier variables (and the edges reaching them) are declared
//! only when some rule targets them.

use crate::error::CompileError;
use hitfilter_dsl::query::{CompareOp, Expr, GraphQuery, Literal, Operand, SetFn};
use hitfilter_dsl::value::CASE_INSENSITIVE_PREFIX;
use hitfilter_dsl::{
    AccessorEntry, AccessorRegistry, EdgeKind, EntityKind, Operator, OperatorShape, Rule, Value,
};

pub const VAR_OUTPUT: &str = "v1";
pub const VAR_ITERATION: &str = "v2";
pub const VAR_HIT: &str = "v3";
pub const VAR_HSP: &str = "v4";
pub const VAR_FEATURE: &str = "v5";
pub const VAR_QUALIFIER: &str = "v6";

pub const VAR_TABLE: &str = "v1";
pub const VAR_TABLE_FEATURE: &str = "v2";
pub const VAR_TABLE_QUALIFIER: &str = "v3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Document,
    FeatureTable,
}

impl Layout {
    fn var_for(self, kind: EntityKind) -> Result<&'static str, CompileError> {
        match (self, kind) {
            (Layout::Document, EntityKind::Hit) => Ok(VAR_HIT),
            (Layout::Document, EntityKind::Hsp) => Ok(VAR_HSP),
            (Layout::Document, EntityKind::Feature) => Ok(VAR_FEATURE),
            (Layout::Document, EntityKind::Qualifier) => Ok(VAR_QUALIFIER),
            (Layout::FeatureTable, EntityKind::Feature) => Ok(VAR_TABLE_FEATURE),
            (Layout::FeatureTable, EntityKind::Qualifier) => Ok(VAR_TABLE_QUALIFIER),
            _ => Err(CompileError::UnsupportedEntity(kind)),
        }
    }
}

pub struct QueryCompiler<'r> {
    registry: &'r AccessorRegistry,
}

impl<'r> QueryCompiler<'r> {
    pub fn new(registry: &'r AccessorRegistry) -> Self {
        Self { registry }
    }

    /// Query over a full search-result document.
    pub fn compile(&self, exclusive: bool, rules: &[Rule]) -> Result<GraphQuery, CompileError> {
        let entries = self.entries(rules, Layout::Document)?;
        let needs_qualifiers = entries.iter().any(|e| e.entity == EntityKind::Qualifier);
        let needs_features =
            needs_qualifiers || entries.iter().any(|e| e.entity == EntityKind::Feature);

        let mut query = GraphQuery::new();
        query
            .declare_vertex(VAR_OUTPUT, EntityKind::Output)
            .declare_vertex(VAR_ITERATION, EntityKind::Iteration)
            .declare_vertex(VAR_HIT, EntityKind::Hit)
            .declare_vertex(VAR_HSP, EntityKind::Hsp);
        if needs_features {
            query.declare_vertex(VAR_FEATURE, EntityKind::Feature);
        }
        if needs_qualifiers {
            query.declare_vertex(VAR_QUALIFIER, EntityKind::Qualifier);
        }

        query
            .declare_edge("e1", EdgeKind::ContainsIteration, VAR_OUTPUT, VAR_ITERATION)
            .declare_edge("e2", EdgeKind::ContainsHit, VAR_ITERATION, VAR_HIT)
            .declare_edge("e3", EdgeKind::ContainsHsp, VAR_HIT, VAR_HSP);
        if needs_features {
            query.declare_edge("e4", EdgeKind::ContainsFeature, VAR_HSP, VAR_FEATURE);
        }
        if needs_qualifiers {
            query.declare_edge("e5", EdgeKind::ContainsQualifier, VAR_FEATURE, VAR_QUALIFIER);
        }

        let mut returned = vec![VAR_OUTPUT, VAR_ITERATION, VAR_HIT, VAR_HSP];
        if needs_features {
            returned.push(VAR_FEATURE);
        }
        if needs_qualifiers {
            returned.push(VAR_QUALIFIER);
        }

        self.finish(query, returned, exclusive, rules, &entries, Layout::Document)
    }

    /// Query over a standalone feature table. Only feature and qualifier
    /// accessors are routable.
    pub fn compile_feature_table(
        &self,
        exclusive: bool,
        rules: &[Rule],
    ) -> Result<GraphQuery, CompileError> {
        let entries = self.entries(rules, Layout::FeatureTable)?;
        let needs_qualifiers = entries.iter().any(|e| e.entity == EntityKind::Qualifier);

        let mut query = GraphQuery::new();
        query
            .declare_vertex(VAR_TABLE, EntityKind::FeatureTable)
            .declare_vertex(VAR_TABLE_FEATURE, EntityKind::Feature)
            .declare_edge("e1", EdgeKind::HasFeature, VAR_TABLE, VAR_TABLE_FEATURE);
        let mut returned = vec![VAR_TABLE, VAR_TABLE_FEATURE];
        if needs_qualifiers {
            query
                .declare_vertex(VAR_TABLE_QUALIFIER, EntityKind::Qualifier)
                .declare_edge(
                    "e2",
                    EdgeKind::ContainsQualifier,
                    VAR_TABLE_FEATURE,
                    VAR_TABLE_QUALIFIER,
                );
            returned.push(VAR_TABLE_QUALIFIER);
        }

        self.finish(query, returned, exclusive, rules, &entries, Layout::FeatureTable)
    }

    fn entries(&self, rules: &[Rule], layout: Layout) -> Result<Vec<&'r AccessorEntry>, CompileError> {
        rules
            .iter()
            .map(|rule| {
                let entry = self
                    .registry
                    .lookup(rule.accessor())
                    .ok_or_else(|| CompileError::UnknownAccessor(rule.accessor().to_string()))?;
                layout.var_for(entry.entity)?;
                Ok(entry)
            })
            .collect()
    }

    fn finish(
        &self,
        mut query: GraphQuery,
        returned: Vec<&str>,
        exclusive: bool,
        rules: &[Rule],
        entries: &[&AccessorEntry],
        layout: Layout,
    ) -> Result<GraphQuery, CompileError> {
        let fragments = rules
            .iter()
            .zip(entries)
            .map(|(rule, entry)| fragment(rule, entry, layout.var_for(entry.entity)?))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(expr) = Expr::join(fragments, exclusive) {
            query.constrain(expr);
        }
        query.set_return_vars(returned).set_distinct(false);
        Ok(query)
    }
}

fn fragment(rule: &Rule, entry: &AccessorEntry, var: &str) -> Result<Expr, CompileError> {
    let operand = if entry.is_function {
        Operand::Call {
            function: entry.attribute.clone(),
            var: var.to_string(),
        }
    } else {
        Operand::Field {
            var: var.to_string(),
            attribute: entry.attribute.clone(),
        }
    };
    let op = Operator::from_symbol(rule.operator())
        .ok_or_else(|| CompileError::UnknownOperator(rule.operator().to_string()))?;
    let name = || entry.visible_name.clone();

    match op.shape() {
        OperatorShape::Scalar => {
            let mut rhs =
                Literal::from_value(rule.value()).ok_or_else(|| CompileError::ExpectedScalar(name()))?;
            if !entry.case_sensitive {
                rhs = case_insensitive(op, rhs);
            }
            Ok(Expr::Compare {
                lhs: operand,
                op: compare_op(op).ok_or_else(|| CompileError::UnknownOperator(op.to_string()))?,
                rhs,
            })
        }
        OperatorShape::Range => {
            let (lower, upper) = match rule.value().elements() {
                Some([lo, hi]) => (
                    Literal::from_value(lo).ok_or_else(|| CompileError::ExpectedRange(name()))?,
                    Literal::from_value(hi).ok_or_else(|| CompileError::ExpectedRange(name()))?,
                ),
                _ => return Err(CompileError::ExpectedRange(name())),
            };
            let (lo_op, hi_op) = if op == Operator::RangeInclusive {
                (CompareOp::Ge, CompareOp::Le)
            } else {
                (CompareOp::Gt, CompareOp::Lt)
            };
            Ok(Expr::And(vec![
                Expr::Compare {
                    lhs: operand.clone(),
                    op: lo_op,
                    rhs: lower,
                },
                Expr::Compare {
                    lhs: operand,
                    op: hi_op,
                    rhs: upper,
                },
            ]))
        }
        OperatorShape::Set => {
            let Value::Set(set) = rule.value() else {
                return Err(CompileError::ExpectedSet(name()));
            };
            let values = set
                .iter()
                .map(|v| Literal::from_value(v).ok_or_else(|| CompileError::ExpectedSet(name())))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::InSet {
                func: set_fn(op).ok_or_else(|| CompileError::UnknownOperator(op.to_string()))?,
                operand,
                values,
            })
        }
    }
}

fn compare_op(op: Operator) -> Option<CompareOp> {
    Some(match op {
        Operator::Eq => CompareOp::Eq,
        Operator::Ne => CompareOp::Ne,
        Operator::Lt => CompareOp::Lt,
        Operator::Gt => CompareOp::Gt,
        Operator::Le => CompareOp::Le,
        Operator::Ge => CompareOp::Ge,
        Operator::Matches => CompareOp::Matches,
        Operator::NotMatches => CompareOp::NotMatches,
        _ => return None,
    })
}

fn set_fn(op: Operator) -> Option<SetFn> {
    Some(match op {
        Operator::StrInSet => SetFn::StrInSet,
        Operator::StrNotInSet => SetFn::StrNotInSet,
        Operator::LongInSet => SetFn::LongInSet,
        Operator::LongNotInSet => SetFn::LongNotInSet,
        _ => return None,
    })
}

/// Patterns on case-insensitive accessors get the `(?i)` wrapper.
fn case_insensitive(op: Operator, rhs: Literal) -> Literal {
    match (op, rhs) {
        (Operator::Matches | Operator::NotMatches, Literal::Str(p))
            if !p.starts_with(CASE_INSENSITIVE_PREFIX) =>
        {
            match Value::case_insensitive_pattern(&p) {
                Value::Str(wrapped) => Literal::Str(wrapped),
                _ => Literal::Str(p),
            }
        }
        (_, rhs) => rhs,
    }
}
