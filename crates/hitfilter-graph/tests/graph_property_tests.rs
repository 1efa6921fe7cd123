use hitfilter_dsl::{EdgeKind, EntityKind};
use hitfilter_graph::{
    DocumentGraph, Entity, Feature, FeatureTable, Qualifier, SrHit, SrHsp, SrIteration, SrOutput,
};
use proptest::prelude::*;

/// Qualifier count per feature, per HSP, per hit, per iteration.
type Shape = Vec<Vec<Vec<Vec<usize>>>>;

fn shape() -> impl Strategy<Value = Shape> {
    let features = proptest::collection::vec(0usize..3, 0..3);
    let hsps = proptest::collection::vec(features, 0..4);
    let hits = proptest::collection::vec(hsps, 0..4);
    proptest::collection::vec(hits, 1..3)
}

fn build(shape: &Shape) -> SrOutput {
    SrOutput {
        iterations: shape
            .iter()
            .enumerate()
            .map(|(i, hits)| SrIteration {
                iter_num: i as i32 + 1,
                hits: hits
                    .iter()
                    .enumerate()
                    .map(|(h, hsps)| SrHit {
                        hit_num: h as i32 + 1,
                        hsps: hsps
                            .iter()
                            .enumerate()
                            .map(|(s, features)| SrHsp {
                                hsp_num: s as i32 + 1,
                                features: (!features.is_empty()).then(|| FeatureTable {
                                    features: features
                                        .iter()
                                        .map(|&q| Feature {
                                            key: "misc".to_string(),
                                            qualifiers: (0..q)
                                                .map(|n| Qualifier::new(format!("q{n}"), "x"))
                                                .collect(),
                                            ..Feature::default()
                                        })
                                        .collect(),
                                }),
                                ..SrHsp::default()
                            })
                            .collect(),
                        ..SrHit::default()
                    })
                    .collect(),
                ..SrIteration::default()
            })
            .collect(),
        ..SrOutput::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn one_node_per_entity_and_one_edge_per_containment(shape in shape()) {
        let doc = build(&shape);
        let graph = DocumentGraph::build(&doc);

        let hits: usize = shape.iter().map(Vec::len).sum();
        let hsps: usize = shape.iter().flatten().map(Vec::len).sum();
        let features: usize = shape.iter().flatten().flatten().map(Vec::len).sum();
        let qualifiers: usize = shape.iter().flatten().flatten().flatten().sum();
        let entities = 1 + shape.len() + hits + hsps + features + qualifiers;

        prop_assert_eq!(graph.node_count(), entities);
        prop_assert_eq!(graph.edge_count(), entities - 1);
        prop_assert_eq!(graph.nodes_of_kind(EntityKind::Hsp).len() as usize, hsps);
        prop_assert_eq!(graph.nodes_of_kind(EntityKind::Qualifier).len() as usize, qualifiers);
        // Feature tables are not nodes in the document graph.
        prop_assert!(graph.nodes_of_kind(EntityKind::FeatureTable).is_empty());
    }

    #[test]
    fn every_hsp_hangs_off_its_own_hit(shape in shape()) {
        let doc = build(&shape);
        let graph = DocumentGraph::build(&doc);
        for hsp_node in graph.nodes_of_kind(EntityKind::Hsp) {
            let hit_node = graph.parent(hsp_node, EdgeKind::ContainsHsp);
            prop_assert!(hit_node.is_some_and(|h| graph.has_edge(h, hsp_node, EdgeKind::ContainsHsp)));
            let (Some(Entity::Hsp(hsp)), Some(Entity::Hit(hit))) =
                (graph.entity(hsp_node), hit_node.and_then(|n| graph.entity(n)))
            else {
                return Err(TestCaseError::fail("unexpected node kinds"));
            };
            prop_assert!(hit.hsps.iter().any(|h| std::ptr::eq(h, hsp)));
        }
    }
}
