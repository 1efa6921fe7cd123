//! A single constraint: accessor + operator + value.
//!
//! Rules are plain value objects. They are checked against a registry only
//! when added to a filter, so a rule can name an accessor or operator that
//! later turns out to be invalid.

use crate::accessor::AccessorEntry;
use crate::operator::{Operator, OperatorVocabulary};
use crate::value::{Value, ValueParseError};
use std::cell::OnceCell;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("rule accessor must not be empty")]
    MissingAccessor,

    #[error("rule operator must not be empty")]
    MissingOperator,

    #[error("{accessor}: {source}")]
    InvalidValue {
        accessor: String,
        #[source]
        source: ValueParseError,
    },
}

#[derive(Clone)]
pub struct Rule {
    accessor: String,
    operator: String,
    value: Value,
    txt: OnceCell<String>,
    html: OnceCell<String>,
}

impl Rule {
    pub fn new(
        accessor: impl Into<String>,
        operator: impl Into<String>,
        value: Value,
    ) -> Result<Self, RuleError> {
        let accessor = accessor.into();
        let operator = operator.into();
        if accessor.trim().is_empty() {
            return Err(RuleError::MissingAccessor);
        }
        if operator.trim().is_empty() {
            return Err(RuleError::MissingOperator);
        }
        Ok(Self {
            accessor,
            operator,
            value,
            txt: OnceCell::new(),
            html: OnceCell::new(),
        })
    }

    /// Builds a rule from user text, typing the value by `entry`.
    ///
    /// `operator` may be a symbol or a phrase. Range operators get a two-value
    /// list, set operators a set, everything else a scalar. An operator that
    /// does not resolve keeps the raw text and yields a scalar value; it is
    /// rejected later when the rule is added to a filter.
    pub fn from_text(entry: &AccessorEntry, operator: &str, text: &str) -> Result<Self, RuleError> {
        let invalid = |source| RuleError::InvalidValue {
            accessor: entry.visible_name.clone(),
            source,
        };
        let (symbol, value) = match OperatorVocabulary::standard().resolve(operator) {
            Some(op) => (op.symbol().to_string(), entry.value_for(op, text).map_err(invalid)?),
            None => (operator.to_string(), entry.parse_value(text).map_err(invalid)?),
        };
        Self::new(entry.visible_name.clone(), symbol, value)
    }

    pub fn accessor(&self) -> &str {
        &self.accessor
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set_accessor(&mut self, accessor: impl Into<String>) -> Result<(), RuleError> {
        let accessor = accessor.into();
        if accessor.trim().is_empty() {
            return Err(RuleError::MissingAccessor);
        }
        self.accessor = accessor;
        self.invalidate();
        Ok(())
    }

    pub fn set_operator(&mut self, operator: impl Into<String>) -> Result<(), RuleError> {
        let operator = operator.into();
        if operator.trim().is_empty() {
            return Err(RuleError::MissingOperator);
        }
        self.operator = operator;
        self.invalidate();
        Ok(())
    }

    pub fn set_value(&mut self, value: Value) {
        self.value = value;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.txt = OnceCell::new();
        self.html = OnceCell::new();
    }

    fn phrase(&self) -> &str {
        Operator::from_symbol(&self.operator)
            .map(Operator::phrase)
            .unwrap_or(self.operator.as_str())
    }

    /// `accessor phrase value`, e.g. `Hit Accession is equal to 1FQY-A`.
    pub fn txt_string(&self) -> &str {
        self.txt.get_or_init(|| {
            format!(
                "{} {} {}",
                self.accessor,
                self.phrase(),
                self.value.display_text()
            )
        })
    }

    pub fn html_string(&self) -> &str {
        self.html.get_or_init(|| {
            format!(
                "<b>{}</b> <i>{}</i> '{}'",
                self.accessor,
                self.phrase(),
                self.value.display_text()
            )
        })
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.accessor == other.accessor
            && self.operator == other.operator
            && self.value == other.value
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("accessor", &self.accessor)
            .field("operator", &self.operator)
            .field("value", &self.value)
            .finish()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.txt_string())
    }
}
