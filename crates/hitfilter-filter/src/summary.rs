//! Batch filtering summaries.

use hitfilter_graph::SrOutput;
use serde::{Deserialize, Serialize};

/// Outcome of one filter run over one document (one query).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResultAtom {
    /// Position of the document in the batch.
    pub order: usize,
    pub query_name: String,
    /// Identifier of the first retained hit, if any.
    pub first_hit: Option<String>,
    pub hit_count: usize,
    pub hsp_count: usize,
}

impl FilterResultAtom {
    pub fn from_result(order: usize, query_name: impl Into<String>, filtered: Option<&SrOutput>) -> Self {
        let hits = || filtered.into_iter().flat_map(|o| &o.iterations).flat_map(|it| &it.hits);
        let first_hit = hits().next().map(|hit| {
            if hit.accession.is_empty() {
                hit.id.clone()
            } else {
                hit.accession.clone()
            }
        });
        Self {
            order,
            query_name: query_name.into(),
            first_hit,
            hit_count: hits().count(),
            hsp_count: hits().map(|hit| hit.hsps.len()).sum(),
        }
    }

    pub fn matched(&self) -> bool {
        self.hit_count > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResultSummary {
    pub job_name: String,
    pub filter_name: String,
    pub results: Vec<FilterResultAtom>,
}

impl FilterResultSummary {
    pub fn new(job_name: impl Into<String>, filter_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            filter_name: filter_name.into(),
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, order: usize, query_name: impl Into<String>, filtered: Option<&SrOutput>) {
        self.results
            .push(FilterResultAtom::from_result(order, query_name, filtered));
    }

    pub fn matched_queries(&self) -> usize {
        self.results.iter().filter(|a| a.matched()).count()
    }

    pub fn total_hits(&self) -> usize {
        self.results.iter().map(|a| a.hit_count).sum()
    }

    pub fn total_hsps(&self) -> usize {
        self.results.iter().map(|a| a.hsp_count).sum()
    }
}
