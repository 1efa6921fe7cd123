//! Structural query AST.
//!
//! A `GraphQuery` declares typed vertex variables, typed containment edges
//! between them, one boolean constraint over variable attributes, and the
//! variables each match tuple returns. It holds no reference to a graph, so a
//! compiled query can be cached and run against any number of documents.
//!
//! The textual form (see the `Display` impls) is what `hitfilter compile`
//! prints; constraints can be parsed back with [`crate::parser::parse_constraint`].

use crate::entity::{EdgeKind, EntityKind};
use crate::parser::{parse_constraint, QueryParseError};
use crate::value::Value;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexDecl {
    pub var: String,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDecl {
    pub name: String,
    pub kind: EdgeKind,
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Char(char),
    Long(i64),
    Double(f64),
    Bool(bool),
}

impl Literal {
    /// Scalar values only.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(Literal::Str(s.clone())),
            Value::Char(c) => Some(Literal::Char(*c)),
            Value::Long(v) => Some(Literal::Long(*v)),
            Value::Double(v) => Some(Literal::Double(*v)),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::List(_) | Value::Set(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Char(c) => Value::Char(*c),
            Literal::Long(v) => Value::Long(*v),
            Literal::Double(v) => Value::Double(*v),
            Literal::Bool(b) => Value::Bool(*b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// `var.attribute`
    Field { var: String, attribute: String },
    /// `function(var)`
    Call { function: String, var: String },
}

impl Operand {
    pub fn var(&self) -> &str {
        match self {
            Operand::Field { var, .. } | Operand::Call { var, .. } => var,
        }
    }

    /// Attribute or function name.
    pub fn name(&self) -> &str {
        match self {
            Operand::Field { attribute, .. } => attribute,
            Operand::Call { function, .. } => function,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    /// Regex found anywhere in the attribute.
    Matches,
    NotMatches,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
            CompareOp::Matches => "::=",
            CompareOp::NotMatches => "!:",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetFn {
    StrInSet,
    StrNotInSet,
    LongInSet,
    LongNotInSet,
}

impl SetFn {
    pub const ALL: [SetFn; 4] = [
        SetFn::StrInSet,
        SetFn::StrNotInSet,
        SetFn::LongInSet,
        SetFn::LongNotInSet,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SetFn::StrInSet => "strInSet",
            SetFn::StrNotInSet => "strNotInSet",
            SetFn::LongInSet => "longInSet",
            SetFn::LongNotInSet => "longNotInSet",
        }
    }

    pub fn is_negated(self) -> bool {
        matches!(self, SetFn::StrNotInSet | SetFn::LongNotInSet)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare {
        lhs: Operand,
        op: CompareOp,
        rhs: Literal,
    },
    InSet {
        func: SetFn,
        operand: Operand,
        values: Vec<Literal>,
    },
}

impl Expr {
    /// Joins `parts` with AND (`conjunction`) or OR. A single part is returned
    /// as-is; no parts yields `None`.
    pub fn join(mut parts: Vec<Expr>, conjunction: bool) -> Option<Expr> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ if conjunction => Some(Expr::And(parts)),
            _ => Some(Expr::Or(parts)),
        }
    }

    /// Variables the expression mentions.
    pub fn vars(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::And(parts) | Expr::Or(parts) => {
                for p in parts {
                    p.collect_vars(out);
                }
            }
            Expr::Compare { lhs, .. } => {
                out.insert(lhs.var());
            }
            Expr::InSet { operand, .. } => {
                out.insert(operand.var());
            }
        }
    }
}

// =============================================================================
// Query
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphQuery {
    vertices: Vec<VertexDecl>,
    edges: Vec<EdgeDecl>,
    constraint: Option<Expr>,
    return_vars: Vec<String>,
    distinct: bool,
}

impl GraphQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_vertex(&mut self, var: impl Into<String>, kind: EntityKind) -> &mut Self {
        self.vertices.push(VertexDecl {
            var: var.into(),
            kind,
        });
        self
    }

    pub fn declare_edge(
        &mut self,
        name: impl Into<String>,
        kind: EdgeKind,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> &mut Self {
        self.edges.push(EdgeDecl {
            name: name.into(),
            kind,
            parent: parent.into(),
            child: child.into(),
        });
        self
    }

    pub fn constrain(&mut self, expr: Expr) -> &mut Self {
        self.constraint = Some(expr);
        self
    }

    /// Parses `text` with the constraint grammar and installs it.
    pub fn constrain_text(&mut self, text: &str) -> Result<&mut Self, QueryParseError> {
        let expr = parse_constraint(text)?;
        Ok(self.constrain(expr))
    }

    pub fn set_return_vars<I, S>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.return_vars = vars.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    pub fn vertices(&self) -> &[VertexDecl] {
        &self.vertices
    }

    pub fn edges(&self) -> &[EdgeDecl] {
        &self.edges
    }

    pub fn constraint(&self) -> Option<&Expr> {
        self.constraint.as_ref()
    }

    /// Declared return variables; every vertex when none were set.
    pub fn return_vars(&self) -> Vec<&str> {
        if self.return_vars.is_empty() {
            self.vertices.iter().map(|v| v.var.as_str()).collect()
        } else {
            self.return_vars.iter().map(String::as_str).collect()
        }
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn vertex(&self, var: &str) -> Option<&VertexDecl> {
        self.vertices.iter().find(|v| v.var == var)
    }
}

// =============================================================================
// Text rendering
// =============================================================================

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str, quote: char) -> fmt::Result {
    for c in s.chars() {
        if c == quote || c == '\\' {
            write!(f, "\\")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => {
                f.write_str("\"")?;
                write_escaped(f, s, '"')?;
                f.write_str("\"")
            }
            Literal::Char(c) => {
                f.write_str("'")?;
                write_escaped(f, &c.to_string(), '\'')?;
                f.write_str("'")
            }
            Literal::Long(v) => write!(f, "{v}"),
            // Debug keeps a fractional part so the literal reads back as a double.
            Literal::Double(v) => write!(f, "{v:?}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field { var, attribute } => write!(f, "{var}.{attribute}"),
            Operand::Call { function, var } => write!(f, "{function}({var})"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::And(parts) | Expr::Or(parts) => {
                let sep = if matches!(self, Expr::And(_)) {
                    " and "
                } else {
                    " or "
                };
                f.write_str("(")?;
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{p}")?;
                }
                f.write_str(")")
            }
            Expr::Compare { lhs, op, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
            Expr::InSet {
                func,
                operand,
                values,
            } => {
                write!(f, "{}({operand}, {{", func.name())?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("})")
            }
        }
    }
}

impl fmt::Display for GraphQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for v in &self.vertices {
            writeln!(f, "{} in \"{}\"", v.var, v.kind.type_name())?;
        }
        for e in &self.edges {
            writeln!(
                f,
                "{}: {} -> {} in \"{}\"",
                e.name,
                e.parent,
                e.child,
                e.kind.type_name()
            )?;
        }
        if let Some(c) = &self.constraint {
            writeln!(f, "where {c}")?;
        }
        let distinct = if self.distinct { "distinct " } else { "" };
        write!(f, "return {distinct}{}", self.return_vars().join(", "))
    }
}
