//! Match tuples → filtered document.
//!
//! Copies are keyed by the source node's id, so every source entity is copied
//! once no matter how many tuples reach it. Arrival order is arbitrary; the
//! rebuilt tree is re-sorted by the source numbering at the end.

use crate::compile::{
    VAR_HIT, VAR_HSP, VAR_ITERATION, VAR_OUTPUT, VAR_TABLE_FEATURE, VAR_TABLE_QUALIFIER,
};
use crate::error::{FilterError, Result};
use ahash::{AHashMap, AHashSet};
use hitfilter_dsl::EntityKind;
use hitfilter_graph::{
    DocumentGraph, Entity, Feature, FeatureTable, NodeId, Qualifier, QueryResult, SrIteration,
    SrOutput,
};
use std::collections::BTreeMap;

type Row = BTreeMap<String, NodeId>;

fn bound<'a>(graph: &DocumentGraph<'a>, row: &Row, var: &str) -> Result<(NodeId, Entity<'a>)> {
    let node = *row
        .get(var)
        .ok_or_else(|| FilterError::Execution(format!("match tuple does not bind `{var}`")))?;
    let entity = graph
        .entity(node)
        .ok_or_else(|| FilterError::Execution(format!("`{var}` is bound to unknown node {node}")))?;
    Ok((node, entity))
}

fn wrong_kind(var: &str, expected: EntityKind, found: EntityKind) -> FilterError {
    FilterError::Execution(format!("`{var}` is bound to a {found} node, expected {expected}"))
}

fn copy_output(src: &SrOutput) -> SrOutput {
    SrOutput {
        blast_type: src.blast_type.clone(),
        blast_version: src.blast_version.clone(),
        parameters: src.parameters.clone(),
        request_info: src.request_info.clone(),
        iterations: Vec::new(),
    }
}

fn copy_iteration(src: &SrIteration) -> SrIteration {
    SrIteration {
        iter_num: src.iter_num,
        query_id: src.query_id.clone(),
        query_def: src.query_def.clone(),
        query_len: src.query_len,
        message: src.message.clone(),
        statistics: src.statistics.clone(),
        hits: Vec::new(),
    }
}

/// Rebuilds the pruned document. `None` when there are no tuples.
pub fn project_document(graph: &DocumentGraph<'_>, result: &QueryResult) -> Result<Option<SrOutput>> {
    if result.rows.is_empty() {
        return Ok(None);
    }

    let mut output: Option<(NodeId, SrOutput)> = None;
    let mut iterations: AHashMap<NodeId, usize> = AHashMap::new();
    let mut hits: AHashMap<NodeId, (usize, usize)> = AHashMap::new();
    let mut hsps: AHashSet<NodeId> = AHashSet::new();

    for row in &result.rows {
        let (out_node, out) = bound(graph, row, VAR_OUTPUT)?;
        let Entity::Output(out) = out else {
            return Err(wrong_kind(VAR_OUTPUT, EntityKind::Output, out.kind()));
        };
        let (root_node, copy) = output.get_or_insert_with(|| (out_node, copy_output(out)));
        if *root_node != out_node {
            return Err(FilterError::Execution(
                "match tuples span more than one output".to_string(),
            ));
        }

        let (it_node, it) = bound(graph, row, VAR_ITERATION)?;
        let Entity::Iteration(it) = it else {
            return Err(wrong_kind(VAR_ITERATION, EntityKind::Iteration, it.kind()));
        };
        let it_idx = *iterations.entry(it_node).or_insert_with(|| {
            copy.iterations.push(copy_iteration(it));
            copy.iterations.len() - 1
        });

        let (hit_node, hit) = bound(graph, row, VAR_HIT)?;
        let Entity::Hit(hit) = hit else {
            return Err(wrong_kind(VAR_HIT, EntityKind::Hit, hit.kind()));
        };
        let (hit_it, hit_idx) = *hits.entry(hit_node).or_insert_with(|| {
            let list = &mut copy.iterations[it_idx].hits;
            list.push(hit.without_hsps());
            (it_idx, list.len() - 1)
        });

        let (hsp_node, hsp) = bound(graph, row, VAR_HSP)?;
        let Entity::Hsp(hsp) = hsp else {
            return Err(wrong_kind(VAR_HSP, EntityKind::Hsp, hsp.kind()));
        };
        if hsps.insert(hsp_node) {
            copy.iterations[hit_it].hits[hit_idx]
                .hsps
                .push(hsp.without_features());
        }
    }

    let Some((_, mut out)) = output else {
        return Ok(None);
    };
    out.iterations.sort_by_key(|it| it.iter_num);
    for it in &mut out.iterations {
        it.hits.sort_by_key(|h| h.hit_num);
        for hit in &mut it.hits {
            hit.hsps.sort_by_key(|h| h.hsp_num);
        }
    }
    Ok(Some(out))
}

/// Rebuilds a pruned feature table. Features keep their original order; when
/// the query bound qualifiers, each feature keeps only its matching ones.
pub fn project_feature_table(
    graph: &DocumentGraph<'_>,
    result: &QueryResult,
) -> Result<Option<FeatureTable>> {
    if result.rows.is_empty() {
        return Ok(None);
    }
    let with_qualifiers = result
        .selected_vars
        .iter()
        .any(|v| v == VAR_TABLE_QUALIFIER);

    let mut features: BTreeMap<NodeId, (Feature, BTreeMap<NodeId, Qualifier>)> = BTreeMap::new();
    for row in &result.rows {
        let (f_node, f) = bound(graph, row, VAR_TABLE_FEATURE)?;
        let Entity::Feature(f) = f else {
            return Err(wrong_kind(VAR_TABLE_FEATURE, EntityKind::Feature, f.kind()));
        };
        let (_, quals) = features.entry(f_node).or_insert_with(|| {
            let mut copy = f.clone();
            if with_qualifiers {
                copy.qualifiers.clear();
            }
            (copy, BTreeMap::new())
        });
        if with_qualifiers {
            let (q_node, q) = bound(graph, row, VAR_TABLE_QUALIFIER)?;
            let Entity::Qualifier(q) = q else {
                return Err(wrong_kind(VAR_TABLE_QUALIFIER, EntityKind::Qualifier, q.kind()));
            };
            quals.entry(q_node).or_insert_with(|| q.clone());
        }
    }

    Ok(Some(FeatureTable {
        features: features
            .into_values()
            .map(|(mut f, quals)| {
                f.qualifiers.extend(quals.into_values());
                f
            })
            .collect(),
    }))
}
