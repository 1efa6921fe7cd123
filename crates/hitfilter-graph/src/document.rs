//! In-memory search-result document.
//!
//! `SrOutput → SrIteration → SrHit → SrHsp → FeatureTable → Feature → Qualifier`.
//! Loading these from BLAST XML is somebody else's job; the types derive serde
//! so tools can exchange them as JSON.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrOutput {
    pub blast_type: String,
    pub blast_version: Option<String>,
    pub parameters: Option<SearchParameters>,
    pub request_info: Option<RequestInfo>,
    pub iterations: Vec<SrIteration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParameters {
    pub matrix: Option<String>,
    pub expect: Option<f64>,
    pub gap_open: Option<i32>,
    pub gap_extend: Option<i32>,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestInfo {
    pub program: Option<String>,
    pub database: Option<String>,
    pub query_id: Option<String>,
    pub query_def: Option<String>,
    pub query_length: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrIteration {
    pub iter_num: i32,
    pub query_id: Option<String>,
    pub query_def: Option<String>,
    pub query_len: Option<u32>,
    pub message: Option<String>,
    pub statistics: Option<SearchStatistics>,
    pub hits: Vec<SrHit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchStatistics {
    pub db_num: Option<u64>,
    pub db_len: Option<u64>,
    pub eff_space: Option<f64>,
    pub kappa: Option<f64>,
    pub lambda: Option<f64>,
    pub entropy: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrHit {
    pub hit_num: i32,
    pub id: String,
    pub accession: String,
    pub definition: String,
    pub length: Option<u32>,
    pub query_global_coverage: Option<f32>,
    pub hit_global_coverage: Option<f32>,
    pub sequence_info: Option<SequenceInfo>,
    pub hsps: Vec<SrHsp>,
}

impl SrHit {
    /// Copy of the hit without its HSP list.
    pub fn without_hsps(&self) -> Self {
        Self {
            hit_num: self.hit_num,
            id: self.id.clone(),
            accession: self.accession.clone(),
            definition: self.definition.clone(),
            length: self.length,
            query_global_coverage: self.query_global_coverage,
            hit_global_coverage: self.hit_global_coverage,
            sequence_info: self.sequence_info.clone(),
            hsps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceInfo {
    pub mol_type: Option<String>,
    pub topology: Option<String>,
    pub division: Option<String>,
    pub organism: Option<String>,
    pub taxonomy: Option<String>,
    /// `yyyyMMdd`
    pub creation_date: Option<u32>,
    pub update_date: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrHsp {
    pub hsp_num: i32,
    pub scores: Option<HspScores>,
    pub query: Option<HspSequence>,
    pub hit: Option<HspSequence>,
    pub midline: Option<String>,
    pub features: Option<FeatureTable>,
}

impl SrHsp {
    /// Copy of the HSP without its feature table.
    pub fn without_features(&self) -> Self {
        Self {
            hsp_num: self.hsp_num,
            scores: self.scores.clone(),
            query: self.query.clone(),
            hit: self.hit.clone(),
            midline: self.midline.clone(),
            features: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HspScores {
    pub bit_score: f64,
    pub score: f64,
    pub evalue: f64,
    /// Percentages.
    pub identity: Option<f64>,
    pub positive: Option<f64>,
    pub gaps: Option<f64>,
    pub align_len: u32,
    pub query_coverage: Option<f32>,
    pub hit_coverage: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HspSequence {
    pub from: u32,
    pub to: u32,
    pub frame: i32,
    pub gaps: u32,
    pub sequence: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureTable {
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub key: String,
    pub from: Option<u32>,
    pub to: Option<u32>,
    pub qualifiers: Vec<Qualifier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Qualifier {
    pub name: String,
    pub value: String,
}

impl Qualifier {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
