use crate::rules::{Condition, MemoryRepository, Operator, Rule, RuleSet};
use crate::{CalculationResult, OrderRecord, Property, Value, calculate_all, calculate_verbose_with, parse_notes};
use crate::{Options, Outcome};

fn style_is(style: &str) -> Condition {
    Condition::new("Select Door Style", Operator::Contains, vec![Value::from(style)])
}

/// The `testdoors` fixture: length and width for the "Test" style only.
fn test_doors() -> RuleSet {
    RuleSet::empty()
        .with_rule(Property::Length, Rule::new(vec![style_is("Test")], "10 + parseFloat(SomeDimension)"))
        .with_rule(Property::Width, Rule::new(vec![style_is("Test")], "5"))
}

fn repo() -> MemoryRepository {
    MemoryRepository::new().with("testdoors", test_doors())
}

#[test]
fn calculates_length_and_width_from_matching_rules() {
    let order = OrderRecord::new().with("Select Door Style", "Test").with("SomeDimension", "2");
    let result = calculate_all(&order, &repo());

    assert_eq!(result.length, 12.0);
    assert_eq!(result.width, 5.0);
    assert_eq!(result.thickness, 0.0);
    assert_eq!(result.boring_placement, 0.0);
    assert_eq!(result.bore_depth, 0.0);
    assert_eq!(result.bore_box_height, 0.0);
}

#[test]
fn falls_back_to_defaults_when_no_rule_matches() {
    let order = OrderRecord::new().with("Select Door Style", "Other");
    let result = calculate_all(&order, &repo());
    assert_eq!(result, CalculationResult::defaults());
}

#[test]
fn unconditional_width_applies_to_any_order_in_the_rule_set() {
    let set = RuleSet::empty()
        .with_rule(Property::Length, Rule::new(vec![style_is("Test")], "10 + parseFloat(SomeDimension)"))
        .with_rule(Property::Width, Rule::always("5"));
    let repo = MemoryRepository::new().with("testdoors", set);

    let order = OrderRecord::new().with("Select Door Style", "Test").with("SomeDimension", "2");
    let result = calculate_all(&order, &repo);
    assert_eq!((result.length, result.width, result.thickness), (12.0, 5.0, 0.0));
}

#[test]
fn missing_rule_set_yields_all_defaults() {
    let order = OrderRecord::new().with("Select Door Style", "Nonexistent");
    let result = calculate_all(&order, &MemoryRepository::new());
    assert_eq!(result, CalculationResult::defaults());
    for (_, value) in result.iter() {
        assert_eq!(value, 0.0);
    }
}

#[test]
fn last_matching_rule_wins() {
    let set = RuleSet::empty()
        .with_rule(Property::Thickness, Rule::always("1"))
        .with_rule(Property::Thickness, Rule::new(vec![style_is("Test")], "2"))
        .with_rule(Property::Thickness, Rule::new(vec![style_is("Nope")], "3"));
    let repo = MemoryRepository::new().with("testdoors", set);

    let order = OrderRecord::new().with("Select Door Style", "Test");
    let res = calculate_verbose_with(&order, &repo, &Options::default());

    assert_eq!(res.result.thickness, 2.0);
    let trace = &res.details.traces[2];
    assert_eq!(trace.considered, 3);
    assert_eq!(trace.matched, vec![0, 1]);
    assert_eq!(trace.selected, Some(1));
    assert_eq!(trace.formula.as_deref(), Some("2"));
}

#[test]
fn one_broken_formula_does_not_spoil_the_rest() {
    let set = RuleSet::empty()
        .with_rule(Property::Length, Rule::always("(1 +"))
        .with_rule(Property::Width, Rule::always("fetch(url)"))
        .with_rule(Property::Thickness, Rule::always("missing / 2"))
        .with_rule(Property::BoringPlacement, Rule::always("1 / 0"))
        .with_rule(Property::BoreDepth, Rule::always("0.5"))
        .with_rule(Property::BoreBoxHeight, Rule::always("[Select Door Height] / 2"));
    let repo = MemoryRepository::new().with("testdoors", set);

    let order = OrderRecord::new().with("Select Door Style", "Test").with("Select Door Height", 94.0);
    let res = calculate_verbose_with(&order, &repo, &Options::default());

    let result = res.result;
    assert_eq!((result.length, result.width), (0.0, 0.0));
    assert!(result.thickness.is_nan());
    assert_eq!(result.boring_placement, f64::INFINITY);
    assert_eq!((result.bore_depth, result.bore_box_height), (0.5, 47.0));

    assert!(matches!(res.details.traces[0].outcome, Outcome::Failed(_)));
    assert!(matches!(res.details.traces[1].outcome, Outcome::Failed(ref msg) if msg.contains("fetch")));
    assert!(matches!(res.details.traces[2].outcome, Outcome::NonFinite(v) if v.is_nan()));
    assert_eq!(res.details.traces[3].outcome, Outcome::NonFinite(f64::INFINITY));
}

#[test]
fn numeric_conditions_drive_selection() {
    let tall = Condition::new("select_door_height", Operator::Gte, vec![Value::from(90.0)]);
    let set = RuleSet::empty()
        .with_rule(Property::BoreBoxHeight, Rule::always("2"))
        .with_rule(Property::BoreBoxHeight, Rule::new(vec![tall], "3"));
    let repo = MemoryRepository::new().with("provencedoors", set);

    let tall_order = parse_notes("Select Door Style: Provence\nSelect Door Height: 7 ft 10 in 5/8 in").unwrap();
    assert_eq!(calculate_all(&tall_order, &repo).bore_box_height, 3.0);

    let short_order = parse_notes("Select Door Style: Provence\nSelect Door Height: 6 ft 8 in").unwrap();
    assert_eq!(calculate_all(&short_order, &repo).bore_box_height, 2.0);
}

#[test]
fn parsed_notes_flow_into_the_override_rule_set() {
    let notes = "
1 x Hinged Door - OC - Door - https://rustica.com/provence-interior-door/
Select Door Style: Provence
Metal Framed Hinged Door?: Yes
Select Width of a Single Door (not the door way opening): 2 ft 5 in 3/4 in
Select Door Height: 7 ft 10 in 5/8 in
";
    let hinged = RuleSet::empty()
        .with_rule(Property::Width, Rule::always("select_width_of_a_single_door_not_the_door_way_opening - 1.5"))
        .with_rule(Property::Length, Rule::always("select_door_height - 1.5"));
    let repo = MemoryRepository::new()
        .with("hingedmetaldoors", hinged)
        .with("provencedoors", RuleSet::empty().with_rule(Property::Width, Rule::always("999")));

    let order = parse_notes(notes).unwrap();
    assert_eq!(order.get("metal_framed_hinged_door"), Some(&Value::Bool(true)));

    let res = calculate_verbose_with(&order, &repo, &Options::default());
    assert_eq!(res.details.rule_set_key, "hingedmetaldoors");
    assert_eq!(res.result.width, 28.25);
    assert_eq!(res.result.length, 93.125);
}

#[test]
fn concurrent_calculations_share_a_repository() {
    let repo = std::sync::Arc::new(repo());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let repo = std::sync::Arc::clone(&repo);
            std::thread::spawn(move || {
                let order =
                    OrderRecord::new().with("Select Door Style", "Test").with("SomeDimension", (i as f64).to_string());
                calculate_all(&order, repo.as_ref()).length
            })
        })
        .collect();

    let lengths: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(lengths, vec![10.0, 11.0, 12.0, 13.0]);
}

#[test]
fn rule_documents_on_disk_drive_the_calculation() {
    use crate::rules::{DirectoryRepository, LoadStrategy};

    let tmp = tempfile::tempdir().unwrap();
    let doc = r#"{
        "length": [
            { "conditions": [{ "variable": "Select Door Style", "operator": "contains", "values": ["Test"] }],
              "formula": "10 + parseFloat(SomeDimension)" }
        ],
        "width": [
            { "conditions": [{ "variable": "Select Door Style", "operator": "contains", "values": ["Test"] }],
              "formula": "5" }
        ]
    }"#;
    std::fs::write(tmp.path().join("testdoors.json"), doc).unwrap();

    let order = OrderRecord::new().with("Select Door Style", "Test").with("SomeDimension", "2");
    for strategy in [LoadStrategy::Eager, LoadStrategy::Lazy] {
        let repo = DirectoryRepository::open(tmp.path(), strategy).unwrap();
        let result = calculate_all(&order, &repo);
        assert_eq!((result.length, result.width, result.thickness), (12.0, 5.0, 0.0));
    }

    std::fs::write(tmp.path().join("testdoors.json"), r#"{ "width": [{ "formula": "7" }] }"#).unwrap();
    let repo = DirectoryRepository::open(tmp.path(), LoadStrategy::Eager).unwrap();
    assert_eq!(calculate_all(&order, &repo).width, 7.0);
    assert_eq!(calculate_all(&order, &repo).length, 0.0);
}

#[test]
fn unknown_variable_yields_nan_not_the_default() {
    let set = RuleSet::empty().with_rule(Property::Length, Rule::always("missing + 1"));
    let repo = MemoryRepository::new().with("testdoors", set);
    let order = OrderRecord::new().with("Select Door Style", "Test");

    let standalone = crate::evaluate_formula("missing + 1", &order).unwrap();
    assert!(standalone.is_nan());
    assert!(calculate_all(&order, &repo).length.is_nan());
}
