//! Accessor registry.
//!
//! An accessor is the user-facing name of one attribute of one document
//! entity ("Hit Accession" → `accession` on a Hit). Visible names are stored in
//! persisted filters, so the strings registered by
//! [`AccessorRegistry::with_options`] are a stable external contract.

use crate::entity::EntityKind;
use crate::operator::{Operator, OperatorShape, NUMBER_OPERATORS, STRING_OPERATORS};
use crate::value::{DataType, Value, ValueParseError, ValueSet, DEFAULT_VALUE_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const RANGE_HELP: &str = "To specify a range, enter two values (lower value first) \
separated by a semicolon. Example: 15;53.";

pub const DATE_HELP: &str =
    "Date format is YYYYmmdd. Example: to set 'Aug 5, 1999', enter: 19990805.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("accessor visible name must not be blank")]
    BlankName,

    #[error("accessor `{0}` declares no operators")]
    NoOperators(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessorEntry {
    pub visible_name: String,
    /// Attribute (or function) name on the owning entity.
    pub attribute: String,
    pub entity: EntityKind,
    pub data_type: DataType,
    pub operators: Vec<Operator>,
    /// Rendered as `attribute(var)` instead of `var.attribute`.
    #[serde(default)]
    pub is_function: bool,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

impl AccessorEntry {
    pub fn new(
        visible_name: impl Into<String>,
        attribute: impl Into<String>,
        entity: EntityKind,
        data_type: DataType,
        operators: &[Operator],
    ) -> Self {
        Self {
            visible_name: visible_name.into(),
            attribute: attribute.into(),
            entity,
            data_type,
            operators: operators.to_vec(),
            is_function: false,
            help: None,
            case_sensitive: true,
        }
    }

    pub fn function(mut self) -> Self {
        self.is_function = true;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    pub fn allows(&self, op: Operator) -> bool {
        self.operators.contains(&op)
    }

    pub fn operator_symbols(&self) -> Vec<&'static str> {
        self.operators.iter().map(|op| op.symbol()).collect()
    }

    pub fn parse_value(&self, text: &str) -> Result<Value, ValueParseError> {
        self.data_type.parse(text)
    }

    /// Splits `text` on `separator`; `Ok(None)` if it holds a single value.
    pub fn parse_values(
        &self,
        text: &str,
        separator: &str,
    ) -> Result<Option<Vec<Value>>, ValueParseError> {
        self.data_type.parse_list(text, separator)
    }

    /// Builds the value a rule with operator `op` needs from user text.
    ///
    /// Ranges become a two-element `List`, set operators a `Set`, everything
    /// else a scalar.
    pub fn value_for(&self, op: Operator, text: &str) -> Result<Value, ValueParseError> {
        match op.shape() {
            OperatorShape::Scalar => self.parse_value(text),
            OperatorShape::Range => Ok(Value::List(self.split_or_single(text)?)),
            OperatorShape::Set => Ok(Value::Set(
                self.split_or_single(text)?.into_iter().collect::<ValueSet>(),
            )),
        }
    }

    fn split_or_single(&self, text: &str) -> Result<Vec<Value>, ValueParseError> {
        match self.parse_values(text, DEFAULT_VALUE_SEPARATOR)? {
            Some(items) => Ok(items),
            None => Ok(vec![self.parse_value(text)?]),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Which default accessor groups to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    pub include_features: bool,
    pub include_sequence_info: bool,
    pub include_sequences: bool,
    pub include_data_numbering: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            include_features: true,
            include_sequence_info: true,
            include_sequences: true,
            include_data_numbering: true,
        }
    }
}

/// Visible name → accessor. Names iterate in sorted order.
#[derive(Debug, Clone, Default)]
pub struct AccessorRegistry {
    entries: BTreeMap<String, AccessorEntry>,
}

impl AccessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every default accessor group.
    pub fn with_defaults() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    pub fn with_options(options: RegistryOptions) -> Self {
        let mut registry = Self::new();
        for entry in default_entries(options) {
            registry.entries.insert(entry.visible_name.clone(), entry);
        }
        registry
    }

    /// Adds `entry`, replacing any entry with the same visible name.
    pub fn register(&mut self, entry: AccessorEntry) -> Result<Option<AccessorEntry>, RegistryError> {
        if entry.visible_name.trim().is_empty() {
            return Err(RegistryError::BlankName);
        }
        if entry.operators.is_empty() {
            return Err(RegistryError::NoOperators(entry.visible_name));
        }
        Ok(self.entries.insert(entry.visible_name.clone(), entry))
    }

    pub fn lookup(&self, visible_name: &str) -> Option<&AccessorEntry> {
        self.entries.get(visible_name)
    }

    pub fn visible_names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &AccessorEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn default_entries(options: RegistryOptions) -> Vec<AccessorEntry> {
    use DataType::{Date, Double, Long, String as Text};
    use EntityKind::{Feature, Hit, Hsp, Qualifier};

    let num = NUMBER_OPERATORS;
    let text = STRING_OPERATORS;
    let mut out = vec![
        AccessorEntry::new("Hit Accession", "accession", Hit, Text, text),
        AccessorEntry::new("Hit definition", "definition", Hit, Text, text),
    ];

    if options.include_data_numbering {
        out.extend([
            AccessorEntry::new("Number of HSPs", "countHsp", Hit, Long, num)
                .function()
                .with_help(RANGE_HELP),
            AccessorEntry::new("Hit identifier", "id", Hit, Text, text),
            AccessorEntry::new("Hit Length", "length", Hit, Long, num).with_help(RANGE_HELP),
            AccessorEntry::new("Hit rank", "numi", Hit, Long, num).with_help(RANGE_HELP),
            AccessorEntry::new("Hit/Global Query Coverage", "qgCover", Hit, Double, num)
                .with_help(RANGE_HELP),
            AccessorEntry::new("Hit/Global Hit Coverage", "hgCover", Hit, Double, num)
                .with_help(RANGE_HELP),
        ]);
    }

    out.extend([
        AccessorEntry::new("HSP rank", "nums", Hsp, Long, num).with_help(RANGE_HELP),
        AccessorEntry::new("HSP/Local Query Coverage", "qCover", Hsp, Double, num)
            .with_help(RANGE_HELP),
        AccessorEntry::new("HSP/Local Hit Coverage", "hCover", Hsp, Double, num)
            .with_help(RANGE_HELP),
        AccessorEntry::new("HSP bit score", "bitScore", Hsp, Double, num).with_help(RANGE_HELP),
        AccessorEntry::new("HSP score", "score", Hsp, Double, num).with_help(RANGE_HELP),
        AccessorEntry::new("HSP E-Value", "evalue", Hsp, Double, num).with_help(RANGE_HELP),
        AccessorEntry::new("HSP % of identities", "identity", Hsp, Double, num)
            .with_help(RANGE_HELP),
        AccessorEntry::new("HSP % of positives", "positive", Hsp, Double, num)
            .with_help(RANGE_HELP),
        AccessorEntry::new("HSP % of gaps", "gaps", Hsp, Double, num).with_help(RANGE_HELP),
        AccessorEntry::new("HSP alignment length", "alignLen", Hsp, Long, num)
            .with_help(RANGE_HELP),
    ]);

    if options.include_sequences {
        out.extend([
            AccessorEntry::new("HSP query from", "qFrom", Hsp, Long, num).with_help(RANGE_HELP),
            AccessorEntry::new("HSP query to", "qTo", Hsp, Long, num).with_help(RANGE_HELP),
            AccessorEntry::new("HSP query frame", "qFrame", Hsp, Long, num),
            AccessorEntry::new("HSP query gaps", "qGaps", Hsp, Long, num).with_help(RANGE_HELP),
            AccessorEntry::new("Query sequence", "qSequence", Hsp, Text, text),
            AccessorEntry::new("HSP hit from", "hFrom", Hsp, Long, num).with_help(RANGE_HELP),
            AccessorEntry::new("HSP hit to", "hTo", Hsp, Long, num).with_help(RANGE_HELP),
            AccessorEntry::new("HSP hit frame", "hFrame", Hsp, Long, num),
            AccessorEntry::new("HSP hit gaps", "hGaps", Hsp, Long, num).with_help(RANGE_HELP),
            AccessorEntry::new("Hit sequence", "hSequence", Hsp, Text, text),
        ]);
    }

    if options.include_features {
        out.extend([
            AccessorEntry::new("Feature: type", "key", Feature, Text, text),
            AccessorEntry::new("Feature: Qualifier name", "qualName", Qualifier, Text, text),
            AccessorEntry::new("Feature: Qualifier value", "qualValue", Qualifier, Text, text),
        ]);
    }

    if options.include_sequence_info {
        out.extend([
            AccessorEntry::new("SeqInfo: Molecular type", "siType", Hit, Text, text),
            AccessorEntry::new("SeqInfo: Topology", "siTopo", Hit, Text, text),
            AccessorEntry::new("SeqInfo: Division", "siDiv", Hit, Text, text),
            AccessorEntry::new("SeqInfo: Organism", "siOrg", Hit, Text, text),
            AccessorEntry::new("SeqInfo: Taxonomy", "siTax", Hit, Text, text),
            AccessorEntry::new("SeqInfo: Creation date", "siCDate", Hit, Date, num)
                .with_help(DATE_HELP),
            AccessorEntry::new("SeqInfo: Update date", "siUDate", Hit, Date, num)
                .with_help(DATE_HELP),
        ]);
    }

    out
}
