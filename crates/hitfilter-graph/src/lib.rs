//! Search-result documents as typed containment graphs.
//!
//! - `document`: the Output → Iteration → Hit → HSP → Feature → Qualifier tree
//! - `attribute`: typed attribute extraction per entity kind
//! - `graph`: one node per entity, one typed edge per containment
//! - `exec`: the `QueryEngine` seam and the in-process backtracking engine

pub mod attribute;
pub mod document;
pub mod exec;
pub mod graph;

pub use attribute::{resolve, Attribute, Entity};
pub use document::{
    Feature, FeatureTable, HspScores, HspSequence, Qualifier, RequestInfo, SearchParameters,
    SearchStatistics, SequenceInfo, SrHit, SrHsp, SrIteration, SrOutput,
};
pub use exec::{BacktrackingEngine, EngineError, QueryEngine, QueryResult};
pub use graph::{DocumentGraph, Edge, Node, NodeId};
