//! Operator symbols and their human-readable phrases.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Matches,
    NotMatches,
    RangeInclusive,
    RangeExclusive,
    StrInSet,
    StrNotInSet,
    LongInSet,
    LongNotInSet,
}

/// What shape of value an operator expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorShape {
    Scalar,
    /// Ordered pair `(lower, upper)`.
    Range,
    Set,
}

/// Legal operators for numeric and date accessors.
pub const NUMBER_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Lt,
    Operator::Gt,
    Operator::Le,
    Operator::Ge,
    Operator::RangeInclusive,
    Operator::RangeExclusive,
    Operator::LongInSet,
    Operator::LongNotInSet,
];

/// Legal operators for string accessors.
pub const STRING_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Matches,
    Operator::NotMatches,
    Operator::StrInSet,
    Operator::StrNotInSet,
];

/// Symbol older filters used for `::=`.
const LEGACY_MATCHES_SYMBOL: &str = "::";

impl Operator {
    pub const ALL: [Operator; 14] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Gt,
        Operator::Le,
        Operator::Ge,
        Operator::Matches,
        Operator::NotMatches,
        Operator::RangeInclusive,
        Operator::RangeExclusive,
        Operator::StrInSet,
        Operator::StrNotInSet,
        Operator::LongInSet,
        Operator::LongNotInSet,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Matches => "::=",
            Operator::NotMatches => "!:",
            Operator::RangeInclusive => "[]",
            Operator::RangeExclusive => "][",
            Operator::StrInSet => "strInSet",
            Operator::StrNotInSet => "strNotInSet",
            Operator::LongInSet => "longInSet",
            Operator::LongNotInSet => "longNotInSet",
        }
    }

    pub fn phrase(self) -> &'static str {
        match self {
            Operator::Eq => "is equal to",
            Operator::Ne => "is not equal to",
            Operator::Lt => "is less than",
            Operator::Gt => "is greater than",
            Operator::Le => "is less than or equal to",
            Operator::Ge => "is greater than or equal to",
            Operator::Matches => "contains",
            Operator::NotMatches => "does not contain",
            Operator::RangeInclusive => "is in the range (inclusive)",
            Operator::RangeExclusive => "is in the range (exclusive)",
            Operator::StrInSet => "is one of",
            Operator::StrNotInSet => "is not one of",
            Operator::LongInSet => "is one of the numbers",
            Operator::LongNotInSet => "is not one of the numbers",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        if symbol == LEGACY_MATCHES_SYMBOL {
            return Some(Operator::Matches);
        }
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    pub fn shape(self) -> OperatorShape {
        match self {
            Operator::RangeInclusive | Operator::RangeExclusive => OperatorShape::Range,
            Operator::StrInSet
            | Operator::StrNotInSet
            | Operator::LongInSet
            | Operator::LongNotInSet => OperatorShape::Set,
            _ => OperatorShape::Scalar,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.symbol().to_string()
    }
}

impl TryFrom<String> for Operator {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OperatorVocabulary::standard()
            .resolve(&value)
            .ok_or_else(|| format!("unknown operator `{value}`"))
    }
}

// =============================================================================
// Vocabulary
// =============================================================================

/// Bidirectional symbol ↔ phrase mapping.
///
/// Persisted filters may store either form; [`OperatorVocabulary::resolve`]
/// accepts both.
#[derive(Debug, Clone)]
pub struct OperatorVocabulary {
    by_symbol: BTreeMap<String, Operator>,
    by_phrase: BTreeMap<String, Operator>,
}

impl OperatorVocabulary {
    pub fn standard() -> Self {
        let mut by_symbol = BTreeMap::new();
        let mut by_phrase = BTreeMap::new();
        for op in Operator::ALL {
            by_symbol.insert(op.symbol().to_string(), op);
            by_phrase.insert(op.phrase().to_string(), op);
        }
        by_symbol.insert(LEGACY_MATCHES_SYMBOL.to_string(), Operator::Matches);
        Self {
            by_symbol,
            by_phrase,
        }
    }

    pub fn phrase_of(&self, symbol: &str) -> Option<&'static str> {
        self.by_symbol.get(symbol).map(|op| op.phrase())
    }

    pub fn symbol_of(&self, phrase: &str) -> Option<&'static str> {
        self.by_phrase.get(phrase).map(|op| op.symbol())
    }

    /// Resolves a symbol or a phrase.
    pub fn resolve(&self, text: &str) -> Option<Operator> {
        self.by_symbol
            .get(text)
            .or_else(|| self.by_phrase.get(text))
            .copied()
    }
}

impl Default for OperatorVocabulary {
    fn default() -> Self {
        Self::standard()
    }
}
