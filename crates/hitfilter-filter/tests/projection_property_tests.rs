use hitfilter_dsl::Value;
use hitfilter_filter::FilterSystem;
use hitfilter_graph::{
    Feature, FeatureTable, HspScores, Qualifier, SrHit, SrHsp, SrIteration, SrOutput,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// (alignLen, has "Variant" feature) per HSP, per hit, per iteration.
type Shape = Vec<Vec<Vec<(u32, bool)>>>;

fn shape() -> impl Strategy<Value = Shape> {
    let hsp = (1u32..300, any::<bool>());
    let hit = proptest::collection::vec(hsp, 1..6);
    let iteration = proptest::collection::vec(hit, 0..8);
    proptest::collection::vec(iteration, 1..3)
}

/// Builds a document whose entities are stored in reverse numbering order,
/// so ordering in the output has to come from re-sorting.
fn build(shape: &Shape) -> SrOutput {
    let iterations = shape
        .iter()
        .enumerate()
        .rev()
        .map(|(i, hits)| SrIteration {
            iter_num: i as i32 + 1,
            hits: hits
                .iter()
                .enumerate()
                .rev()
                .map(|(h, hsps)| SrHit {
                    hit_num: h as i32 + 1,
                    accession: format!("IT{i}-HIT{h}"),
                    hsps: hsps
                        .iter()
                        .enumerate()
                        .rev()
                        .map(|(s, &(align_len, variant))| SrHsp {
                            hsp_num: s as i32 + 1,
                            scores: Some(HspScores {
                                align_len,
                                ..HspScores::default()
                            }),
                            features: variant.then(|| FeatureTable {
                                features: vec![Feature {
                                    key: "Variant".to_string(),
                                    qualifiers: vec![
                                        Qualifier::new("Clinical", "benign"),
                                        Qualifier::new("Clinical", "pathogenic"),
                                    ],
                                    ..Feature::default()
                                }],
                            }),
                            ..SrHsp::default()
                        })
                        .collect(),
                    ..SrHit::default()
                })
                .collect(),
            ..SrIteration::default()
        })
        .collect();
    SrOutput {
        iterations,
        ..SrOutput::default()
    }
}

fn is_sorted<T: PartialOrd>(items: &[T]) -> bool {
    items.windows(2).all(|w| w[0] <= w[1])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn filtered_document_is_in_source_numbering_order(shape in shape(), threshold in 1i64..300) {
        let system = FilterSystem::default();
        let mut filter = system.create_filter("order").unwrap();
        filter
            .add(system.create_rule("HSP alignment length", ">=", Value::Long(threshold)).unwrap())
            .unwrap();

        let doc = build(&shape);
        let expected: usize = shape
            .iter()
            .flatten()
            .flatten()
            .filter(|(len, _)| i64::from(*len) >= threshold)
            .count();

        match filter.execute(&doc).unwrap() {
            None => prop_assert_eq!(expected, 0),
            Some(out) => {
                let iters: Vec<i32> = out.iterations.iter().map(|it| it.iter_num).collect();
                prop_assert!(is_sorted(&iters));
                let mut hsp_total = 0;
                for it in &out.iterations {
                    let hits: Vec<i32> = it.hits.iter().map(|h| h.hit_num).collect();
                    prop_assert!(is_sorted(&hits));
                    for hit in &it.hits {
                        let hsps: Vec<i32> = hit.hsps.iter().map(|h| h.hsp_num).collect();
                        prop_assert!(is_sorted(&hsps));
                        hsp_total += hsps.len();
                    }
                }
                prop_assert_eq!(hsp_total, expected);
            }
        }
    }

    #[test]
    fn qualifier_fan_out_never_duplicates_hits_or_hsps(shape in shape()) {
        let system = FilterSystem::default();
        let mut filter = system.create_filter("dedup").unwrap();
        filter
            .add(system.create_rule("Feature: Qualifier name", "==", Value::str("Clinical")).unwrap())
            .unwrap();

        let doc = build(&shape);
        let expected_hsps: usize = shape.iter().flatten().flatten().filter(|(_, v)| *v).count();

        let Some(out) = filter.execute(&doc).unwrap() else {
            prop_assert_eq!(expected_hsps, 0);
            return Ok(());
        };
        let mut seen = BTreeSet::new();
        let mut hsp_total = 0;
        for hit in out.iterations.iter().flat_map(|it| &it.hits) {
            prop_assert!(seen.insert(hit.accession.clone()), "duplicate hit {}", hit.accession);
            let nums: BTreeSet<i32> = hit.hsps.iter().map(|h| h.hsp_num).collect();
            prop_assert_eq!(nums.len(), hit.hsps.len());
            hsp_total += hit.hsps.len();
        }
        prop_assert_eq!(hsp_total, expected_hsps);
    }
}
