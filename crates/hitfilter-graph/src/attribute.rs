//! Attribute resolution.
//!
//! Every accessor's internal name maps to one `Attribute` variant with a typed
//! extraction function. Extraction walks nested optional sub-objects (HSP →
//! scores → bit score) and yields `None` as soon as a step is missing.
//! Narrow numbers are widened to `i64`/`f64`.

use crate::document::{
    Feature, FeatureTable, Qualifier, SrHit, SrHsp, SrIteration, SrOutput,
};
use hitfilter_dsl::{EntityKind, Value};

/// Borrowed view of one document entity.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Output(&'a SrOutput),
    Iteration(&'a SrIteration),
    Hit(&'a SrHit),
    Hsp(&'a SrHsp),
    FeatureTable(&'a FeatureTable),
    Feature(&'a Feature),
    Qualifier(&'a Qualifier),
}

impl<'a> Entity<'a> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Output(_) => EntityKind::Output,
            Entity::Iteration(_) => EntityKind::Iteration,
            Entity::Hit(_) => EntityKind::Hit,
            Entity::Hsp(_) => EntityKind::Hsp,
            Entity::FeatureTable(_) => EntityKind::FeatureTable,
            Entity::Feature(_) => EntityKind::Feature,
            Entity::Qualifier(_) => EntityKind::Qualifier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitAttribute {
    Accession,
    CountHsp,
    Definition,
    Id,
    Length,
    Rank,
    QueryGlobalCoverage,
    HitGlobalCoverage,
    MolType,
    Topology,
    Division,
    Organism,
    Taxonomy,
    CreationDate,
    UpdateDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HspAttribute {
    Rank,
    QueryCoverage,
    HitCoverage,
    BitScore,
    Score,
    Evalue,
    Identity,
    Positive,
    Gaps,
    AlignLen,
    QueryFrom,
    QueryTo,
    QueryFrame,
    QueryGaps,
    QuerySequence,
    HitFrom,
    HitTo,
    HitFrame,
    HitGaps,
    HitSequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureAttribute {
    Key,
    From,
    To,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualifierAttribute {
    Name,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Hit(HitAttribute),
    Hsp(HspAttribute),
    Feature(FeatureAttribute),
    Qualifier(QualifierAttribute),
}

impl Attribute {
    /// Looks up the attribute `name` on entities of `kind`.
    pub fn lookup(kind: EntityKind, name: &str) -> Option<Self> {
        use HitAttribute as H;
        use HspAttribute as S;
        let attr = match kind {
            EntityKind::Hit => Attribute::Hit(match name {
                "accession" => H::Accession,
                "countHsp" => H::CountHsp,
                "definition" => H::Definition,
                "id" => H::Id,
                "length" => H::Length,
                "numi" => H::Rank,
                "qgCover" => H::QueryGlobalCoverage,
                "hgCover" => H::HitGlobalCoverage,
                "siType" => H::MolType,
                "siTopo" => H::Topology,
                "siDiv" => H::Division,
                "siOrg" => H::Organism,
                "siTax" => H::Taxonomy,
                "siCDate" => H::CreationDate,
                "siUDate" => H::UpdateDate,
                _ => return None,
            }),
            EntityKind::Hsp => Attribute::Hsp(match name {
                "nums" => S::Rank,
                "qCover" => S::QueryCoverage,
                "hCover" => S::HitCoverage,
                "bitScore" => S::BitScore,
                "score" => S::Score,
                "evalue" => S::Evalue,
                "identity" => S::Identity,
                "positive" => S::Positive,
                "gaps" => S::Gaps,
                "alignLen" => S::AlignLen,
                "qFrom" => S::QueryFrom,
                "qTo" => S::QueryTo,
                "qFrame" => S::QueryFrame,
                "qGaps" => S::QueryGaps,
                "qSequence" => S::QuerySequence,
                "hFrom" => S::HitFrom,
                "hTo" => S::HitTo,
                "hFrame" => S::HitFrame,
                "hGaps" => S::HitGaps,
                "hSequence" => S::HitSequence,
                _ => return None,
            }),
            EntityKind::Feature => Attribute::Feature(match name {
                "key" => FeatureAttribute::Key,
                "from" => FeatureAttribute::From,
                "to" => FeatureAttribute::To,
                _ => return None,
            }),
            EntityKind::Qualifier => Attribute::Qualifier(match name {
                "qualName" => QualifierAttribute::Name,
                "qualValue" => QualifierAttribute::Value,
                _ => return None,
            }),
            EntityKind::Output | EntityKind::Iteration | EntityKind::FeatureTable => return None,
        };
        Some(attr)
    }

    pub fn kind(self) -> EntityKind {
        match self {
            Attribute::Hit(_) => EntityKind::Hit,
            Attribute::Hsp(_) => EntityKind::Hsp,
            Attribute::Feature(_) => EntityKind::Feature,
            Attribute::Qualifier(_) => EntityKind::Qualifier,
        }
    }

    /// Reads this attribute from `entity`. `None` when the entity has the wrong
    /// kind or the value (or an intermediate object) is absent.
    pub fn extract(self, entity: Entity<'_>) -> Option<Value> {
        match (self, entity) {
            (Attribute::Hit(a), Entity::Hit(hit)) => hit_value(a, hit),
            (Attribute::Hsp(a), Entity::Hsp(hsp)) => hsp_value(a, hsp),
            (Attribute::Feature(a), Entity::Feature(f)) => match a {
                FeatureAttribute::Key => Some(Value::from(f.key.as_str())),
                FeatureAttribute::From => f.from.map(Value::from),
                FeatureAttribute::To => f.to.map(Value::from),
            },
            (Attribute::Qualifier(a), Entity::Qualifier(q)) => match a {
                QualifierAttribute::Name => Some(Value::from(q.name.as_str())),
                QualifierAttribute::Value => Some(Value::from(q.value.as_str())),
            },
            _ => None,
        }
    }
}

fn hit_value(a: HitAttribute, hit: &SrHit) -> Option<Value> {
    use HitAttribute as H;
    let info = || hit.sequence_info.as_ref();
    match a {
        H::Accession => Some(Value::from(hit.accession.as_str())),
        H::CountHsp => i64::try_from(hit.hsps.len()).ok().map(Value::Long),
        H::Definition => Some(Value::from(hit.definition.as_str())),
        H::Id => Some(Value::from(hit.id.as_str())),
        H::Length => hit.length.map(Value::from),
        H::Rank => Some(Value::from(hit.hit_num)),
        H::QueryGlobalCoverage => hit.query_global_coverage.map(Value::from),
        H::HitGlobalCoverage => hit.hit_global_coverage.map(Value::from),
        H::MolType => info()?.mol_type.clone().map(Value::Str),
        H::Topology => info()?.topology.clone().map(Value::Str),
        H::Division => info()?.division.clone().map(Value::Str),
        H::Organism => info()?.organism.clone().map(Value::Str),
        H::Taxonomy => info()?.taxonomy.clone().map(Value::Str),
        H::CreationDate => info()?.creation_date.map(Value::from),
        H::UpdateDate => info()?.update_date.map(Value::from),
    }
}

fn hsp_value(a: HspAttribute, hsp: &SrHsp) -> Option<Value> {
    use HspAttribute as S;
    let scores = || hsp.scores.as_ref();
    let query = || hsp.query.as_ref();
    let hit = || hsp.hit.as_ref();
    match a {
        S::Rank => Some(Value::from(hsp.hsp_num)),
        S::QueryCoverage => scores()?.query_coverage.map(Value::from),
        S::HitCoverage => scores()?.hit_coverage.map(Value::from),
        S::BitScore => Some(Value::from(scores()?.bit_score)),
        S::Score => Some(Value::from(scores()?.score)),
        S::Evalue => Some(Value::from(scores()?.evalue)),
        S::Identity => scores()?.identity.map(Value::from),
        S::Positive => scores()?.positive.map(Value::from),
        S::Gaps => scores()?.gaps.map(Value::from),
        S::AlignLen => Some(Value::from(scores()?.align_len)),
        S::QueryFrom => Some(Value::from(query()?.from)),
        S::QueryTo => Some(Value::from(query()?.to)),
        S::QueryFrame => Some(Value::from(query()?.frame)),
        S::QueryGaps => Some(Value::from(query()?.gaps)),
        S::QuerySequence => Some(Value::from(query()?.sequence.as_str())),
        S::HitFrom => Some(Value::from(hit()?.from)),
        S::HitTo => Some(Value::from(hit()?.to)),
        S::HitFrame => Some(Value::from(hit()?.frame)),
        S::HitGaps => Some(Value::from(hit()?.gaps)),
        S::HitSequence => Some(Value::from(hit()?.sequence.as_str())),
    }
}

/// Resolves attribute `name` of an entity of `kind`.
///
/// Unknown names and kind mismatches are logged and resolve to `None`; they
/// never abort a query.
pub fn resolve(kind: EntityKind, name: &str, entity: Entity<'_>) -> Option<Value> {
    let Some(attr) = Attribute::lookup(kind, name) else {
        tracing::warn!(entity = %kind, attribute = %name, "unknown attribute");
        return None;
    };
    if entity.kind() != kind {
        tracing::warn!(
            expected = %kind,
            found = %entity.kind(),
            attribute = %name,
            "attribute resolved against an entity of the wrong kind"
        );
        return None;
    }
    attr.extract(entity)
}
