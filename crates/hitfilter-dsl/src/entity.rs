//! Entity and containment-edge type tags.
//!
//! A search-result document is a fixed containment hierarchy:
//!
//! ```text
//! Output → Iteration → Hit → HSP → Feature → Qualifier
//! FeatureTable → Feature → Qualifier            (standalone tables)
//! ```
//!
//! The tags below name those levels in accessors, query declarations and
//! graph nodes. Their `type_name` strings are what query text uses.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Output,
    Iteration,
    Hit,
    Hsp,
    FeatureTable,
    Feature,
    Qualifier,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Output,
        EntityKind::Iteration,
        EntityKind::Hit,
        EntityKind::Hsp,
        EntityKind::FeatureTable,
        EntityKind::Feature,
        EntityKind::Qualifier,
    ];

    /// Vertex type name used in query declarations.
    pub fn type_name(self) -> &'static str {
        match self {
            EntityKind::Output => "SROutput",
            EntityKind::Iteration => "SRIteration",
            EntityKind::Hit => "SRHit",
            EntityKind::Hsp => "SRHSP",
            EntityKind::FeatureTable => "FeatureTable",
            EntityKind::Feature => "Feature",
            EntityKind::Qualifier => "Qualifier",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A typed parent→child containment relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    ContainsIteration,
    ContainsHit,
    ContainsHsp,
    ContainsFeature,
    HasFeature,
    ContainsQualifier,
}

impl EdgeKind {
    pub fn type_name(self) -> &'static str {
        match self {
            EdgeKind::ContainsIteration => "containsIteration",
            EdgeKind::ContainsHit => "containsHit",
            EdgeKind::ContainsHsp => "containsHsp",
            EdgeKind::ContainsFeature => "containsFeat",
            EdgeKind::HasFeature => "hasFeat",
            EdgeKind::ContainsQualifier => "containsQualifier",
        }
    }

    /// `(parent, child)` entity kinds this edge connects.
    pub fn endpoints(self) -> (EntityKind, EntityKind) {
        match self {
            EdgeKind::ContainsIteration => (EntityKind::Output, EntityKind::Iteration),
            EdgeKind::ContainsHit => (EntityKind::Iteration, EntityKind::Hit),
            EdgeKind::ContainsHsp => (EntityKind::Hit, EntityKind::Hsp),
            EdgeKind::ContainsFeature => (EntityKind::Hsp, EntityKind::Feature),
            EdgeKind::HasFeature => (EntityKind::FeatureTable, EntityKind::Feature),
            EdgeKind::ContainsQualifier => (EntityKind::Feature, EntityKind::Qualifier),
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
