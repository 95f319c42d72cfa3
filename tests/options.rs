use std::cell::RefCell;
use std::rc::Rc;

use indoc::indoc;
use serde_json::json;
use tagforge::{
    BudgetBreach, BudgetReport, DuplicateKeyPolicy, Error, Loader, Options, Registry, UnknownTagPolicy, Value,
};

fn load_with(options: Options, yaml: &str) -> Result<Value, Error> {
    Loader::with_options(Registry::new(), options).load(yaml)
}

fn to_json(value: &Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

#[test]
fn duplicate_key_policies() {
    let yaml = "{a: 1, b: 2, a: 3}";

    let first = load_with(tagforge::options! { duplicate_keys: DuplicateKeyPolicy::FirstWins }, yaml).unwrap();
    assert_eq!(to_json(&first), json!({"a": 1, "b": 2}));

    let last = load_with(tagforge::options! { duplicate_keys: DuplicateKeyPolicy::LastWins }, yaml).unwrap();
    assert_eq!(to_json(&last), json!({"a": 3, "b": 2}));
    let keys: Vec<_> = last.as_map().unwrap().keys().map(|k| k.as_str().unwrap().to_owned()).collect();
    assert_eq!(keys, ["a", "b"]);
}

#[test]
fn skipped_duplicate_still_defines_its_anchors() {
    let yaml = indoc! {"
        a: 1
        a: &later [x]
        b: *later
    "};
    let doc = load_with(tagforge::options! { duplicate_keys: DuplicateKeyPolicy::FirstWins }, yaml).unwrap();
    assert_eq!(to_json(&doc), json!({"a": 1, "b": ["x"]}));
}

#[test]
fn merge_keys() {
    let yaml = indoc! {"
        base1: &B1 {a: 1, b: 2}
        base2: &B2
          <<: {c: 3}
          d: 4
        target:
          <<: [*B1, *B2]
          b: 20
          e: 5
    "};
    let doc = load_with(Options::default(), yaml).unwrap();
    assert_eq!(
        to_json(&doc.get("target").unwrap()),
        json!({"a": 1, "b": 20, "c": 3, "d": 4, "e": 5})
    );
}

#[test]
fn earlier_merge_sources_take_precedence() {
    let yaml = indoc! {"
        one: &one {k: 1}
        two: &two {k: 2, j: 2}
        target:
          <<: [*one, *two]
    "};
    let doc = load_with(Options::default(), yaml).unwrap();
    assert_eq!(to_json(&doc.get("target").unwrap()), json!({"k": 1, "j": 2}));
}

#[test]
fn merge_of_a_scalar_is_rejected() {
    let err = load_with(Options::default(), "a: {<<: 1}").unwrap_err();
    assert!(err.to_string().contains("merge"), "{err}");
}

#[test]
fn merge_keys_can_be_disabled() {
    let doc = load_with(tagforge::options! { merge_keys: false }, "{<<: {a: 1}}").unwrap();
    assert_eq!(to_json(&doc), json!({"<<": {"a": 1}}));
}

#[test]
fn unknown_tag_wrap_gives_the_plain_view() {
    let yaml = indoc! {"
        trainer: !Trainer
          optimizer: !Adam {lr: 0.01}
          epochs: 3
    "};
    let doc = load_with(tagforge::options! { unknown_tags: UnknownTagPolicy::Wrap }, yaml).unwrap();
    assert_eq!(
        to_json(&doc),
        json!({
            "trainer": {
                "!Trainer": {
                    "optimizer": {"!Adam": {"lr": 0.01}},
                    "epochs": 3
                }
            }
        })
    );
}

#[test]
fn unknown_tag_null_drops_the_node() {
    let doc = load_with(tagforge::options! { unknown_tags: UnknownTagPolicy::Null }, "[!Gone {a: 1}, 2]").unwrap();
    assert_eq!(to_json(&doc), json!([null, 2]));
}

#[test]
fn load_all_documents() {
    let yaml = indoc! {"
        name: first
        ---
        name: second
        ---
    "};
    let loader = Loader::new(Registry::new());
    let docs = loader.load_all(yaml).unwrap();
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[1].get("name"), Some(Value::from("second")));
    assert!(docs[2].is_null());
    assert!(loader.load("").unwrap().is_null());
}

#[test]
fn budget_breach_stops_composition() {
    let options = tagforge::options! {
        budget: Some(tagforge::budget! { max_nodes: 3 }),
    };
    match load_with(options, "[1, 2, 3, 4]") {
        Err(Error::Budget { breach, .. }) => assert_eq!(breach, BudgetBreach::Nodes { nodes: 4 }),
        other => panic!("expected a budget breach, got {other:?}"),
    }
}

#[test]
fn alias_bombs_are_capped() {
    let yaml = indoc! {"
        a: &a [x, x]
        b: &b [*a, *a, *a]
        c: &c [*b, *b, *b]
    "};
    let options = tagforge::options! {
        budget: Some(tagforge::budget! { max_aliases: 4 }),
    };
    assert!(matches!(
        load_with(options, yaml),
        Err(Error::Budget {
            breach: BudgetBreach::Aliases { .. },
            ..
        })
    ));
}

#[test]
fn budget_report_is_delivered() {
    let reports: Rc<RefCell<Vec<BudgetReport>>> = Rc::default();
    let sink = reports.clone();
    let options = Options::default().with_budget_report(move |report| sink.borrow_mut().push(report));
    load_with(options, "{a: [1, 2], b: &x 3, c: *x}").unwrap();

    let reports = reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].aliases, 1);
    assert_eq!(reports[0].anchors, 1);
    assert_eq!(reports[0].max_depth, 2);
}

#[test]
fn scalar_resolution_knobs() {
    let yaml = "[yes, 0755]";
    assert_eq!(
        to_json(&load_with(Options::default(), yaml).unwrap()),
        json!(["yes", 755])
    );
    let legacy = tagforge::options! {
        yaml11_booleans: true,
        legacy_octal_numbers: true,
    };
    assert_eq!(to_json(&load_with(legacy, yaml).unwrap()), json!([true, 493]));
}

#[test]
fn depth_limit() {
    let deep = format!("{}1{}", "[".repeat(20), "]".repeat(20));
    let err = load_with(tagforge::options! { max_depth: 10 }, &deep).unwrap_err();
    assert!(matches!(err, Error::RecursionLimit { depth: 10, .. }));
    assert!(load_with(Options::default(), &deep).is_ok());
}

#[test]
fn options_deserialize_from_json() {
    let options: Options = serde_json::from_value(json!({
        "budget": null,
        "duplicate_keys": "LastWins",
        "unknown_tags": "Wrap",
        "merge_keys": false,
        "legacy_octal_numbers": false,
        "yaml11_booleans": true,
        "max_depth": 64
    }))
    .unwrap();
    assert!(options.budget.is_none());
    assert_eq!(options.duplicate_keys, DuplicateKeyPolicy::LastWins);
    assert_eq!(options.unknown_tags, UnknownTagPolicy::Wrap);
    assert!(options.yaml11_booleans);
}

#[test]
fn constructed_objects_do_not_serialize() {
    #[derive(Debug, PartialEq)]
    struct Opaque;

    let value = Value::seq(vec![Value::object(Opaque)]);
    let err = serde_json::to_value(&value).unwrap_err();
    assert!(err.to_string().contains("Opaque"));
}
