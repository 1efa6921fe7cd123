//! Document graph.
//!
//! One node per document entity, one typed edge per parent→child
//! containment. Nodes borrow the entity they wrap; a node's `NodeId` is its
//! arena index and doubles as the wrapped entity's identity (every entity is
//! visited exactly once per build).
//!
//! Per-kind node sets are roaring bitmaps so the engine can intersect
//! candidate sets cheaply.

use crate::attribute::Entity;
use crate::document::{FeatureTable, SrOutput};
use ahash::AHashMap;
use hitfilter_dsl::{EdgeKind, EntityKind};
use roaring::RoaringBitmap;

pub type NodeId = u32;

#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    pub kind: EntityKind,
    pub entity: Entity<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub kind: EdgeKind,
    pub parent: NodeId,
    pub child: NodeId,
}

#[derive(Debug, Default)]
pub struct DocumentGraph<'a> {
    nodes: Vec<Node<'a>>,
    edges: Vec<Edge>,
    /// Outgoing edge indices per node.
    children: Vec<Vec<usize>>,
    /// Incoming edge index per node (containment is a tree).
    parent: Vec<Option<usize>>,
    by_kind: AHashMap<EntityKind, RoaringBitmap>,
}

impl<'a> DocumentGraph<'a> {
    /// Builds the graph of a full search-result document.
    ///
    /// An output without iterations yields an empty graph.
    pub fn build(output: &'a SrOutput) -> Self {
        let mut g = Self::default();
        if output.iterations.is_empty() {
            return g;
        }
        let root = g.add_node(Entity::Output(output));
        for iteration in &output.iterations {
            let it = g.add_child(root, EdgeKind::ContainsIteration, Entity::Iteration(iteration));
            for hit in &iteration.hits {
                let h = g.add_child(it, EdgeKind::ContainsHit, Entity::Hit(hit));
                for hsp in &hit.hsps {
                    let s = g.add_child(h, EdgeKind::ContainsHsp, Entity::Hsp(hsp));
                    if let Some(table) = &hsp.features {
                        g.add_features(s, EdgeKind::ContainsFeature, table);
                    }
                }
            }
        }
        g
    }

    /// Builds the graph of a standalone feature table, rooted at the table.
    pub fn from_feature_table(table: &'a FeatureTable) -> Self {
        let mut g = Self::default();
        if table.features.is_empty() {
            return g;
        }
        let root = g.add_node(Entity::FeatureTable(table));
        g.add_features(root, EdgeKind::HasFeature, table);
        g
    }

    fn add_features(&mut self, parent: NodeId, edge: EdgeKind, table: &'a FeatureTable) {
        for feature in &table.features {
            let f = self.add_child(parent, edge, Entity::Feature(feature));
            for qualifier in &feature.qualifiers {
                self.add_child(f, EdgeKind::ContainsQualifier, Entity::Qualifier(qualifier));
            }
        }
    }

    fn add_node(&mut self, entity: Entity<'a>) -> NodeId {
        let id = self.nodes.len() as NodeId;
        let kind = entity.kind();
        self.nodes.push(Node { kind, entity });
        self.children.push(Vec::new());
        self.parent.push(None);
        self.by_kind.entry(kind).or_default().insert(id);
        id
    }

    fn add_child(&mut self, parent: NodeId, kind: EdgeKind, entity: Entity<'a>) -> NodeId {
        let child = self.add_node(entity);
        let edge = self.edges.len();
        self.edges.push(Edge {
            kind,
            parent,
            child,
        });
        self.children[parent as usize].push(edge);
        self.parent[child as usize] = Some(edge);
        child
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<'a>> {
        self.nodes.get(id as usize)
    }

    pub fn entity(&self, id: NodeId) -> Option<Entity<'a>> {
        self.node(id).map(|n| n.entity)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// All nodes of `kind`.
    pub fn nodes_of_kind(&self, kind: EntityKind) -> RoaringBitmap {
        self.by_kind.get(&kind).cloned().unwrap_or_default()
    }

    /// Children of `id` reached through edges of `kind`, in document order.
    pub fn children(&self, id: NodeId, kind: EdgeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.children
            .get(id as usize)
            .into_iter()
            .flatten()
            .map(move |&e| self.edges[e])
            .filter(move |e| e.kind == kind)
            .map(|e| e.child)
    }

    /// Parent of `id` if the connecting edge has `kind`.
    pub fn parent(&self, id: NodeId, kind: EdgeKind) -> Option<NodeId> {
        let edge = self.edges[(*self.parent.get(id as usize)?)?];
        (edge.kind == kind).then_some(edge.parent)
    }

    pub fn has_edge(&self, parent: NodeId, child: NodeId, kind: EdgeKind) -> bool {
        self.parent(child, kind) == Some(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Feature, Qualifier, SrHit, SrHsp, SrIteration};

    fn doc() -> SrOutput {
        SrOutput {
            blast_type: "blastp".into(),
            iterations: vec![SrIteration {
                iter_num: 1,
                hits: vec![SrHit {
                    hit_num: 1,
                    hsps: vec![
                        SrHsp {
                            hsp_num: 1,
                            features: Some(FeatureTable {
                                features: vec![Feature {
                                    key: "source".into(),
                                    qualifiers: vec![
                                        Qualifier::new("organism", "human"),
                                        Qualifier::new("db_xref", "taxon:9606"),
                                    ],
                                    ..Feature::default()
                                }],
                            }),
                            ..SrHsp::default()
                        },
                        SrHsp {
                            hsp_num: 2,
                            ..SrHsp::default()
                        },
                    ],
                    ..SrHit::default()
                }],
                ..SrIteration::default()
            }],
            ..SrOutput::default()
        }
    }

    #[test]
    fn test_one_node_per_entity_one_edge_per_containment() {
        let d = doc();
        let g = DocumentGraph::build(&d);
        // output, iteration, hit, 2 hsps, feature, 2 qualifiers
        assert_eq!(g.node_count(), 8);
        assert_eq!(g.edge_count(), 7);
        assert_eq!(g.nodes_of_kind(EntityKind::Hsp).len(), 2);
        assert_eq!(g.nodes_of_kind(EntityKind::Qualifier).len(), 2);
    }

    #[test]
    fn test_children_and_parent_follow_edge_kinds() {
        let d = doc();
        let g = DocumentGraph::build(&d);
        let hit = g.nodes_of_kind(EntityKind::Hit).min().unwrap();
        let hsps: Vec<_> = g.children(hit, EdgeKind::ContainsHsp).collect();
        assert_eq!(hsps.len(), 2);
        assert_eq!(g.children(hit, EdgeKind::ContainsHit).count(), 0);
        assert_eq!(g.parent(hsps[0], EdgeKind::ContainsHsp), Some(hit));
        assert_eq!(g.parent(hsps[0], EdgeKind::ContainsHit), None);
        assert!(g.has_edge(hit, hsps[1], EdgeKind::ContainsHsp));
    }

    #[test]
    fn test_empty_inputs_build_empty_graphs() {
        let empty = SrOutput::default();
        assert!(DocumentGraph::build(&empty).is_empty());
        let table = FeatureTable::default();
        assert!(DocumentGraph::from_feature_table(&table).is_empty());
    }

    #[test]
    fn test_feature_table_is_its_own_root() {
        let d = doc();
        let table = d.iterations[0].hits[0].hsps[0].features.as_ref().unwrap();
        let g = DocumentGraph::from_feature_table(table);
        assert_eq!(g.node_count(), 4);
        let root = g.nodes_of_kind(EntityKind::FeatureTable).min().unwrap();
        assert_eq!(g.children(root, EdgeKind::HasFeature).count(), 1);
    }
}
