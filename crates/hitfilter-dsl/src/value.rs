//! Rule values.
//!
//! `Value` is the closed set of runtime values a rule can carry and an
//! attribute can resolve to. Collections hold scalars only; a `Set` keeps
//! insertion order and drops duplicates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Marker wrapped around case-insensitive regex patterns.
pub const CASE_INSENSITIVE_PREFIX: &str = "(?i)(";
const CASE_INSENSITIVE_SUFFIX: &str = ")";

/// Separator used when a single text field carries several values (`15;53`).
pub const DEFAULT_VALUE_SEPARATOR: &str = ";";

/// Date values are entered as `yyyyMMdd` and stored as that integer.
pub const DATE_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Str(String),
    Bool(bool),
    Char(char),
    Long(i64),
    Double(f64),
    List(Vec<Value>),
    Set(ValueSet),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Wraps `pattern` so the regex engine matches it case-insensitively.
    pub fn case_insensitive_pattern(pattern: &str) -> Self {
        Value::Str(format!(
            "{CASE_INSENSITIVE_PREFIX}{pattern}{CASE_INSENSITIVE_SUFFIX}"
        ))
    }

    pub fn set<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::Set(items.into_iter().collect())
    }

    /// False for a NaN or infinite `Double`, directly or inside a collection.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Double(v) => v.is_finite(),
            Value::List(items) => items.iter().all(Value::is_finite),
            Value::Set(set) => set.as_slice().iter().all(Value::is_finite),
            _ => true,
        }
    }

    /// Elements of a `List`/`Set`; `None` for scalars.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            Value::Set(set) => Some(set.as_slice()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Str(_) => "String",
            Value::Bool(_) => "Boolean",
            Value::Char(_) => "Character",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::List(_) => "List",
            Value::Set(_) => "Set",
        }
    }

    /// Text shown to users: case-insensitivity wrappers are removed.
    pub fn display_text(&self) -> String {
        match self {
            Value::Str(s) => strip_case_marker(s).to_string(),
            Value::List(items) => join_display(items),
            Value::Set(set) => join_display(set.as_slice()),
            other => other.to_string(),
        }
    }
}

fn join_display(items: &[Value]) -> String {
    items
        .iter()
        .map(Value::display_text)
        .collect::<Vec<_>>()
        .join(DEFAULT_VALUE_SEPARATOR)
}

/// Removes the `(?i)(...)` wrapper added by [`Value::case_insensitive_pattern`].
pub fn strip_case_marker(text: &str) -> &str {
    text.strip_prefix(CASE_INSENSITIVE_PREFIX)
        .and_then(|rest| rest.strip_suffix(CASE_INSENSITIVE_SUFFIX))
        .unwrap_or(text)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::List(items) => write!(f, "{}", join_plain(items)),
            Value::Set(set) => write!(f, "{}", join_plain(set.as_slice())),
        }
    }
}

fn join_plain(items: &[Value]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(DEFAULT_VALUE_SEPARATOR)
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

// Integral values widen to i64, floats to f64.
macro_rules! widen_long {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Long(i64::from(v))
            }
        })*
    };
}
widen_long!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

// =============================================================================
// Sets
// =============================================================================

/// Insertion-ordered set of values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Value>", into = "Vec<Value>")]
pub struct ValueSet(Vec<Value>);

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an equal value was already present.
    pub fn insert(&mut self, value: Value) -> bool {
        if self.0.contains(&value) {
            return false;
        }
        self.0.push(value);
        true
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.contains(value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }
}

impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.0.iter().all(|v| other.contains(v))
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

impl From<Vec<Value>> for ValueSet {
    fn from(values: Vec<Value>) -> Self {
        values.into_iter().collect()
    }
}

impl From<ValueSet> for Vec<Value> {
    fn from(set: ValueSet) -> Self {
        set.0
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Semantic types
// =============================================================================

/// Semantic type an accessor declares for its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Boolean,
    Character,
    Double,
    Long,
    /// `yyyyMMdd` dates stored as `Long`.
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueParseError {
    #[error("`{text}` is not a valid {expected:?} value")]
    Invalid { text: String, expected: DataType },

    #[error("`{0}` is not a valid date (expected yyyyMMdd)")]
    InvalidDate(String),

    #[error("empty value")]
    Empty,
}

impl DataType {
    /// Whether a scalar `value` has this semantic type. Collections never match.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (DataType::String, Value::Str(_))
                | (DataType::Boolean, Value::Bool(_))
                | (DataType::Character, Value::Char(_))
                | (DataType::Double, Value::Double(_))
                | (DataType::Long, Value::Long(_))
                | (DataType::Date, Value::Long(_))
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            DataType::String => "String",
            DataType::Boolean => "Boolean",
            DataType::Character => "Character",
            DataType::Double => "Double",
            DataType::Long => "Long",
            DataType::Date => "Date",
        }
    }

    /// Converts user text into a typed scalar.
    pub fn parse(self, text: &str) -> Result<Value, ValueParseError> {
        let invalid = || ValueParseError::Invalid {
            text: text.to_string(),
            expected: self,
        };
        match self {
            DataType::String => Ok(Value::Str(text.to_string())),
            DataType::Boolean => {
                let t = text.trim();
                if t.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if t.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(invalid())
                }
            }
            DataType::Character => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    (None, _) => Err(ValueParseError::Empty),
                    _ => Err(invalid()),
                }
            }
            DataType::Double => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::Double)
                .ok_or_else(invalid),
            DataType::Long => text
                .trim()
                .parse::<i64>()
                .map(Value::Long)
                .map_err(|_| invalid()),
            DataType::Date => parse_date(text.trim()).map(Value::Long),
        }
    }

    /// Splits `text` on `separator` and converts every token.
    ///
    /// Returns `Ok(None)` when the separator does not occur, so callers can
    /// fall back to a scalar.
    pub fn parse_list(self, text: &str, separator: &str) -> Result<Option<Vec<Value>>, ValueParseError> {
        if separator.is_empty() || !text.contains(separator) {
            return Ok(None);
        }
        text.split(separator)
            .map(|token| self.parse(token))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

fn parse_date(text: &str) -> Result<i64, ValueParseError> {
    let invalid = || ValueParseError::InvalidDate(text.to_string());
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|_| invalid())?;
    text.parse::<i64>().map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_drops_duplicates_and_keeps_order() {
        let set: ValueSet = vec![Value::str("b"), Value::str("a"), Value::str("b")].into();
        assert_eq!(set.as_slice(), &[Value::str("b"), Value::str("a")]);
    }

    #[test]
    fn test_case_marker_is_stripped_for_display() {
        let v = Value::case_insensitive_pattern("pathogen");
        assert_eq!(v.as_str(), Some("(?i)(pathogen)"));
        assert_eq!(v.display_text(), "pathogen");
        assert_eq!(strip_case_marker("plain"), "plain");
    }

    #[test]
    fn test_date_parsing_validates_calendar() {
        assert_eq!(DataType::Date.parse("19990805").unwrap(), Value::Long(19990805));
        assert!(DataType::Date.parse("19991305").is_err());
        assert!(DataType::Date.parse("1999085").is_err());
    }

    #[test]
    fn test_boolean_and_char_parsing() {
        assert_eq!(DataType::Boolean.parse("TRUE").unwrap(), Value::Bool(true));
        assert!(DataType::Boolean.parse("yes").is_err());
        assert_eq!(DataType::Character.parse("x").unwrap(), Value::Char('x'));
        assert!(DataType::Character.parse("xy").is_err());
    }

    #[test]
    fn test_double_parsing_rejects_non_finite() {
        assert_eq!(DataType::Double.parse(" 1e-30 ").unwrap(), Value::Double(1e-30));
        for text in ["inf", "-inf", "infinity", "NaN", "1e400"] {
            assert!(
                matches!(DataType::Double.parse(text), Err(ValueParseError::Invalid { .. })),
                "{text}"
            );
        }
        assert!(DataType::Double.parse_list("1.5;nan", ";").is_err());
        assert!(!Value::List(vec![Value::Double(1.0), Value::Double(f64::NAN)]).is_finite());
        assert!(Value::Long(i64::MAX).is_finite());
    }

    #[test]
    fn test_parse_list_requires_separator() {
        assert_eq!(DataType::Long.parse_list("42", ";").unwrap(), None);
        assert_eq!(
            DataType::Long.parse_list("15;53", ";").unwrap(),
            Some(vec![Value::Long(15), Value::Long(53)])
        );
        assert!(DataType::Long.parse_list("15;x", ";").is_err());
    }
}
