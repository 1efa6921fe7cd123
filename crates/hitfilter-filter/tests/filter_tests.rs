use hitfilter_dsl::{
    parse_constraint, AccessorEntry, DataType, EntityKind, Operator, Value,
};
use hitfilter_filter::{
    CompileError, FilterError, FilterSystem, FilterSystemConfig, ValidationError,
};
use hitfilter_graph::{
    Feature, FeatureTable, HspScores, Qualifier, SrHit, SrHsp, SrIteration, SrOutput,
};
use std::sync::Arc;

// =============================================================================
// Fixtures
// =============================================================================

fn hsp(num: i32, align_len: u32, identity: f64, features: Vec<Feature>) -> SrHsp {
    SrHsp {
        hsp_num: num,
        scores: Some(HspScores {
            align_len,
            identity: Some(identity),
            bit_score: 50.0,
            evalue: 1e-10,
            ..HspScores::default()
        }),
        features: (!features.is_empty()).then(|| FeatureTable { features }),
        ..SrHsp::default()
    }
}

fn feature(key: &str, qualifiers: &[(&str, &str)]) -> Feature {
    Feature {
        key: key.to_string(),
        qualifiers: qualifiers
            .iter()
            .map(|(n, v)| Qualifier::new(*n, *v))
            .collect(),
        ..Feature::default()
    }
}

fn hit(num: i32, accession: &str, hsps: Vec<SrHsp>) -> SrHit {
    SrHit {
        hit_num: num,
        accession: accession.to_string(),
        id: format!("pdb|{accession}"),
        hsps,
        ..SrHit::default()
    }
}

fn document() -> SrOutput {
    SrOutput {
        blast_type: "blastp".to_string(),
        blast_version: Some("BLASTP 2.2.18".to_string()),
        iterations: vec![SrIteration {
            iter_num: 1,
            query_def: Some("kinase".to_string()),
            hits: vec![
                hit(
                    1,
                    "1FQY-A",
                    vec![hsp(1, 120, 90.0, vec![]), hsp(2, 30, 40.0, vec![])],
                ),
                hit(
                    2,
                    "1YMG-A",
                    vec![hsp(
                        1,
                        80,
                        75.0,
                        vec![
                            feature("source", &[("organism", "Homo sapiens")]),
                            feature(
                                "Variant",
                                &[
                                    ("Consequence", "missense_variant"),
                                    ("Clinical", "likely pathogenic"),
                                ],
                            ),
                        ],
                    )],
                ),
                hit(3, "2B4C-A", vec![hsp(1, 200, 60.0, vec![])]),
            ],
            ..SrIteration::default()
        }],
        ..SrOutput::default()
    }
}

fn accessions(doc: &SrOutput) -> Vec<&str> {
    doc.iterations
        .iter()
        .flat_map(|it| &it.hits)
        .map(|h| h.accession.as_str())
        .collect()
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_add_rejects_unknown_accessor() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    let rule = system.create_rule("Hit colour", "==", Value::str("red")).unwrap();
    let err = filter.add(rule).unwrap_err();
    assert!(matches!(
        err,
        FilterError::Validation(ValidationError::UnknownAccessor(ref n)) if n == "Hit colour"
    ));
    assert!(filter.is_empty());
}

#[test]
fn test_add_rejects_illegal_operator_and_lists_expected() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    let rule = system
        .create_rule("Hit Accession", "[]", Value::List(vec![Value::str("a"), Value::str("b")]))
        .unwrap();
    let err = filter.add(rule).unwrap_err();
    let msg = err.to_string();
    assert!(msg.starts_with("rule defines an invalid operator. Seen: []."), "{msg}");
    assert!(msg.contains("strInSet"), "{msg}");
    assert!(filter.is_empty());
}

#[test]
fn test_add_rejects_wrong_value_type() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    let rule = system
        .create_rule("HSP alignment length", ">=", Value::str("fifty"))
        .unwrap();
    assert!(matches!(
        filter.add(rule).unwrap_err(),
        FilterError::Validation(ValidationError::InvalidValueType {
            expected: DataType::Long,
            found: "String"
        })
    ));

    let mixed = system
        .create_rule(
            "HSP alignment length",
            "longInSet",
            Value::set([Value::Long(1), Value::str("2")]),
        )
        .unwrap();
    assert!(filter.add(mixed).is_err());
    assert!(filter.is_empty());
}

#[test]
fn test_add_rejects_bad_value_shapes() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();

    let empty = system
        .create_rule("Hit Accession", "strInSet", Value::set(Vec::<Value>::new()))
        .unwrap();
    assert!(matches!(
        filter.add(empty).unwrap_err(),
        FilterError::Validation(ValidationError::EmptyCollection)
    ));

    let triple = system
        .create_rule(
            "HSP alignment length",
            "[]",
            Value::List(vec![Value::Long(1), Value::Long(2), Value::Long(3)]),
        )
        .unwrap();
    assert!(matches!(
        filter.add(triple).unwrap_err(),
        FilterError::Validation(ValidationError::InvalidValueShape { .. })
    ));

    let scalar_range = system
        .create_rule("HSP alignment length", "[]", Value::Long(5))
        .unwrap();
    assert!(filter.add(scalar_range).is_err());
    assert!(filter.is_empty());
}

#[test]
fn test_legacy_names_phrases_and_integers_are_migrated() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("legacy").unwrap();
    filter
        .add(system.create_rule("Feature type", "is equal to", Value::str("Variant")).unwrap())
        .unwrap();
    filter
        .add(system.create_rule("HSP % of identities", ">=", Value::Long(80)).unwrap())
        .unwrap();

    let rules = filter.rules();
    assert_eq!(rules[0].accessor(), "Feature: type");
    assert_eq!(rules[0].operator(), "==");
    assert_eq!(rules[1].value(), &Value::Double(80.0));
}

#[test]
fn test_non_finite_numbers_are_rejected() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();

    for text in ["inf", "-inf", "NaN"] {
        assert!(
            matches!(
                system.rule_from_text("HSP bit score", "<", text),
                Err(FilterError::Rule(_))
            ),
            "{text}"
        );
    }

    let scalar = system
        .create_rule("HSP bit score", "<", Value::Double(f64::INFINITY))
        .unwrap();
    assert!(matches!(
        filter.add(scalar).unwrap_err(),
        FilterError::Validation(ValidationError::NonFiniteValue)
    ));
    let range = system
        .create_rule(
            "HSP bit score",
            "[]",
            Value::List(vec![Value::Double(1.0), Value::Double(f64::NAN)]),
        )
        .unwrap();
    assert!(matches!(
        filter.add(range).unwrap_err(),
        FilterError::Validation(ValidationError::NonFiniteValue)
    ));
    assert!(filter.is_empty());

    filter
        .add(system.rule_from_text("HSP bit score", "<", "1e300").unwrap())
        .unwrap();
    let text = filter.compile().unwrap().constraint().unwrap().to_string();
    assert_eq!(parse_constraint(&text).unwrap().to_string(), text);
}

#[test]
fn test_remove_matches_rules_stored_in_migrated_form() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("legacy").unwrap();
    let renamed = system
        .create_rule("Feature type", "==", Value::str("Variant"))
        .unwrap();
    let phrased = system
        .create_rule("Hit Accession", "is equal to", Value::str("1FQY-A"))
        .unwrap();
    let promoted = system
        .create_rule("HSP % of identities", ">=", Value::Long(80))
        .unwrap();
    filter.add(renamed.clone()).unwrap();
    filter.add(phrased.clone()).unwrap();
    filter.add(promoted.clone()).unwrap();

    filter.compile().unwrap();
    assert!(filter.remove(&renamed));
    assert!(!filter.is_compiled());
    assert_eq!(filter.len(), 2);

    assert!(filter.remove(&phrased));
    assert!(filter.remove(&promoted));
    assert!(filter.is_empty());
    assert!(!filter.remove(&phrased));
}

#[test]
fn test_integer_is_not_promoted_for_other_double_accessors() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    let rule = system.create_rule("HSP bit score", ">=", Value::Long(40)).unwrap();
    assert!(filter.add(rule).is_err());
}

// =============================================================================
// Compilation
// =============================================================================

#[test]
fn test_compile_is_cached_and_invalidated() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    let rule = system
        .create_rule("Hit Accession", "==", Value::str("1FQY-A"))
        .unwrap();
    filter.add(rule.clone()).unwrap();

    let first = filter.compile().unwrap();
    let second = filter.compile().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(filter.is_compiled());

    filter
        .add(system.create_rule("HSP alignment length", ">", Value::Long(10)).unwrap())
        .unwrap();
    assert!(!filter.is_compiled());
    let third = filter.compile().unwrap();
    assert_ne!(*first, *third);

    assert!(filter.remove(&rule));
    assert!(!filter.is_compiled());
    assert!(!filter.remove(&rule));

    filter.compile().unwrap();
    filter.set_exclusive(false);
    assert!(!filter.is_compiled());

    filter.compile().unwrap();
    filter.clear();
    assert!(filter.is_empty());
    assert!(!filter.is_compiled());
    assert!(filter.execute(&document()).unwrap().is_none());
}

#[test]
fn test_compiled_constraint_text() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    filter
        .add(system.create_rule("Hit Accession", "==", Value::str("1FQY-A")).unwrap())
        .unwrap();
    filter
        .add(system.rule_from_text("HSP alignment length", "[]", "50;150").unwrap())
        .unwrap();
    filter
        .add(
            system
                .rule_from_text("Hit definition", "strInSet", "kinase;\"quoted\"")
                .unwrap(),
        )
        .unwrap();
    filter
        .add(system.create_rule("Number of HSPs", ">=", Value::Long(2)).unwrap())
        .unwrap();

    let query = filter.compile().unwrap();
    let expr = query.constraint().unwrap();
    assert_eq!(
        expr.to_string(),
        r#"(v3.accession == "1FQY-A" and (v4.alignLen >= 50 and v4.alignLen <= 150) and strInSet(v3.definition, {"kinase", "\"quoted\""}) and countHsp(v3) >= 2)"#
    );
    assert_eq!(&parse_constraint(&expr.to_string()).unwrap(), expr);
    assert_eq!(query.return_vars(), vec!["v1", "v2", "v3", "v4"]);
    assert!(!query.is_distinct());
}

#[test]
fn test_feature_variables_are_declared_only_when_needed() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    filter
        .add(system.create_rule("Hit Accession", "==", Value::str("1FQY-A")).unwrap())
        .unwrap();
    assert_eq!(filter.compile().unwrap().vertices().len(), 4);

    filter
        .add(system.create_rule("Feature: type", "==", Value::str("Variant")).unwrap())
        .unwrap();
    let query = filter.compile().unwrap();
    assert_eq!(query.vertices().len(), 5);
    assert_eq!(query.edges().len(), 4);

    filter
        .add(
            system
                .create_rule("Feature: Qualifier name", "==", Value::str("Clinical"))
                .unwrap(),
        )
        .unwrap();
    let query = filter.compile().unwrap();
    assert_eq!(query.vertices().len(), 6);
    assert_eq!(query.return_vars(), vec!["v1", "v2", "v3", "v4", "v5", "v6"]);
}

#[test]
fn test_set_operator_with_list_value_fails_at_compile() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    let rule = system
        .create_rule(
            "Hit Accession",
            "strInSet",
            Value::List(vec![Value::str("1FQY-A")]),
        )
        .unwrap();
    filter.add(rule).unwrap();
    let err = filter.compile().unwrap_err();
    assert!(matches!(err, FilterError::Compile(CompileError::ExpectedSet(_))));
    assert_eq!(err.to_string(), "Hit Accession: wrong values: expected a Set");
}

#[test]
fn test_unroutable_entity_is_a_compile_error() {
    let entry = AccessorEntry::new(
        "Query definition",
        "queryDef",
        EntityKind::Iteration,
        DataType::String,
        &[Operator::Eq],
    );
    let system = FilterSystem::new(&FilterSystemConfig {
        extra_accessors: vec![entry],
        ..FilterSystemConfig::default()
    })
    .unwrap();
    let mut filter = system.create_filter("f").unwrap();
    filter
        .add(system.create_rule("Query definition", "==", Value::str("kinase")).unwrap())
        .unwrap();
    let err = filter.execute(&document()).unwrap_err();
    assert_eq!(err.to_string(), "Object type SRIteration is not supported!");
}

#[test]
fn test_case_insensitive_accessor_wraps_patterns() {
    let entry = AccessorEntry::new(
        "Organism (any case)",
        "siOrg",
        EntityKind::Hit,
        DataType::String,
        &[Operator::Matches, Operator::Eq],
    )
    .case_insensitive();
    let system = FilterSystem::new(&FilterSystemConfig {
        extra_accessors: vec![entry],
        ..FilterSystemConfig::default()
    })
    .unwrap();
    let mut filter = system.create_filter("f").unwrap();
    filter
        .add(system.create_rule("Organism (any case)", "::=", Value::str("sapiens")).unwrap())
        .unwrap();
    let query = filter.compile().unwrap();
    assert_eq!(
        query.constraint().unwrap().to_string(),
        r#"v3.siOrg ::= "(?i)(sapiens)""#
    );
}

// =============================================================================
// Execution
// =============================================================================

#[test]
fn test_empty_filter_returns_none() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("empty").unwrap();
    assert!(filter.execute(&document()).unwrap().is_none());
}

#[test]
fn test_execute_prunes_without_touching_input() {
    let system = FilterSystem::default();
    let doc = document();
    let before = doc.clone();
    let mut filter = system.create_filter("f").unwrap();
    filter
        .add(system.create_rule("HSP alignment length", ">=", Value::Long(80)).unwrap())
        .unwrap();

    let out = filter.execute(&doc).unwrap().unwrap();
    assert_eq!(doc, before);
    assert_eq!(out.blast_version.as_deref(), Some("BLASTP 2.2.18"));
    assert_eq!(out.iterations.len(), 1);
    assert_eq!(out.iterations[0].query_def.as_deref(), Some("kinase"));
    assert_eq!(accessions(&out), vec!["1FQY-A", "1YMG-A", "2B4C-A"]);
    // hit 1 keeps only HSP 1; retained HSPs carry no features
    assert_eq!(out.iterations[0].hits[0].hsps.len(), 1);
    assert!(out.iterations[0].hits[1].hsps[0].features.is_none());
}

#[test]
fn test_or_filter_unions_branches() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    filter.set_exclusive(false);
    filter
        .add(system.create_rule("Hit Accession", "==", Value::str("2B4C-A")).unwrap())
        .unwrap();
    filter
        .add(system.create_rule("HSP % of identities", ">", Value::Double(85.0)).unwrap())
        .unwrap();
    let out = filter.execute(&document()).unwrap().unwrap();
    assert_eq!(accessions(&out), vec!["1FQY-A", "2B4C-A"]);
}

#[test]
fn test_qualifier_rules_dedup_hsps() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    filter
        .add(system.create_rule("Feature: type", "==", Value::str("Variant")).unwrap())
        .unwrap();
    filter
        .add(
            system
                .create_rule("Feature: Qualifier value", "::=", Value::str("pathogenic"))
                .unwrap(),
        )
        .unwrap();
    let out = filter.execute(&document()).unwrap().unwrap();
    assert_eq!(accessions(&out), vec!["1YMG-A"]);
    assert_eq!(out.iterations[0].hits[0].hsps.len(), 1);
}

#[test]
fn test_no_match_returns_none() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    filter
        .add(system.create_rule("Hit Accession", "==", Value::str("9ZZZ-Z")).unwrap())
        .unwrap();
    assert!(filter.execute(&document()).unwrap().is_none());
    assert!(filter.execute(&SrOutput::default()).unwrap().is_none());
}

#[test]
fn test_execute_features_keeps_matching_qualifiers() {
    let system = FilterSystem::default();
    let doc = document();
    let table = doc.iterations[0].hits[1].hsps[0].features.clone().unwrap();

    let mut filter = system.create_filter("f").unwrap();
    filter
        .add(system.create_rule("Feature: type", "==", Value::str("Variant")).unwrap())
        .unwrap();
    let out = filter.execute_features(&table).unwrap().unwrap();
    assert_eq!(out.features.len(), 1);
    assert_eq!(out.features[0].qualifiers.len(), 2);

    filter
        .add(
            system
                .create_rule("Feature: Qualifier name", "==", Value::str("Clinical"))
                .unwrap(),
        )
        .unwrap();
    let out = filter.execute_features(&table).unwrap().unwrap();
    assert_eq!(
        out.features[0].qualifiers,
        vec![Qualifier::new("Clinical", "likely pathogenic")]
    );

    let mut hit_filter = system.create_filter("hits").unwrap();
    hit_filter
        .add(system.create_rule("Hit Accession", "==", Value::str("1YMG-A")).unwrap())
        .unwrap();
    assert!(matches!(
        hit_filter.execute_features(&table).unwrap_err(),
        FilterError::Compile(CompileError::UnsupportedEntity(EntityKind::Hit))
    ));
}

// =============================================================================
// Rendering & definitions
// =============================================================================

#[test]
fn test_renderings() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    assert_eq!(filter.txt_string(), "empty");
    assert_eq!(filter.html_string(), "empty");

    filter
        .add(system.create_rule("Hit Accession", "==", Value::str("1FQY-A")).unwrap())
        .unwrap();
    filter
        .add(system.rule_from_text("HSP alignment length", "[]", "50;150").unwrap())
        .unwrap();
    assert_eq!(
        filter.txt_string(),
        "Hit Accession is equal to 1FQY-A and HSP alignment length is in the range (inclusive) 50;150"
    );

    filter.set_exclusive(false);
    assert_eq!(
        filter.html_string(),
        "<html><body><b>Hit Accession</b> <i>is equal to</i> '1FQY-A' <br><i>or</i> \
         <b>HSP alignment length</b> <i>is in the range (inclusive)</i> '50;150'</body></html>"
    );
}

#[test]
fn test_definition_recreates_equivalent_filter() {
    let system = FilterSystem::default();
    let mut filter = system.create_filter("f").unwrap();
    filter.set_description("kinases only");
    filter.set_exclusive(false);
    filter
        .add(system.create_rule("Hit Accession", "==", Value::str("1FQY-A")).unwrap())
        .unwrap();

    let definition = filter.definition();
    assert_eq!(definition.description.as_deref(), Some("kinases only"));
    let mut copy = system.create_filter_from(&definition).unwrap();
    assert_eq!(copy.rules(), filter.rules());
    assert!(!copy.is_exclusive());
    assert_eq!(
        copy.execute(&document()).unwrap(),
        filter.execute(&document()).unwrap()
    );
}
