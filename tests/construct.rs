use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indoc::indoc;
use tagforge::{
    ArgError, Args, BoxError, Construct, Constructor, Error, FromNode, Loader, Materializer, Node, Registry, Value,
    compose_str,
};

#[derive(Debug, PartialEq)]
struct Adam {
    lr: f64,
    betas: Vec<f64>,
}

impl Construct for Adam {
    fn construct(mut args: Args) -> Result<Self, BoxError> {
        let lr = args.param::<f64>(0, "lr")?;
        let betas = args.take::<Vec<f64>>("betas")?.unwrap_or_else(|| vec![0.9, 0.999]);
        args.deny_unknown()?;
        Ok(Adam { lr, betas })
    }
}

#[derive(Debug, PartialEq)]
struct Dice {
    count: u32,
    sides: u32,
}

impl FromNode for Dice {
    fn from_node(node: &Node, _: &mut Materializer<'_>) -> Result<Self, BoxError> {
        let text = node.as_str().ok_or("expected a scalar like 3d6")?;
        let (count, sides) = text.split_once('d').ok_or("missing `d`")?;
        Ok(Dice {
            count: count.parse()?,
            sides: sides.parse()?,
        })
    }
}

#[derive(Debug, PartialEq)]
struct Trainer {
    optimizer: Value,
    epochs: i64,
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register("!Adam", Constructor::of::<Adam>());
    registry.register("!Dice", Constructor::of_node::<Dice>());
    registry.register(
        "!Trainer",
        Constructor::new(|mut args: Args| {
            let optimizer = args.param::<Value>(0, "optimizer")?;
            let epochs = args.param::<i64>(1, "epochs")?;
            Ok(Value::object(Trainer { optimizer, epochs }))
        }),
    );
    registry
}

#[test]
fn default_constructor_receives_keyword_arguments() {
    let doc = Loader::new(registry()).load("!Adam {lr: 0.01, betas: [0.8, 0.9]}").unwrap();
    let adam = doc.downcast::<Adam>().unwrap();
    assert_eq!(
        *adam,
        Adam {
            lr: 0.01,
            betas: vec![0.8, 0.9]
        }
    );
}

#[test]
fn scalar_body_is_a_single_positional_argument() {
    let doc = Loader::new(registry()).load("!Adam 0.5").unwrap();
    assert_eq!(doc.downcast::<Adam>().unwrap().lr, 0.5);
}

#[test]
fn custom_hook_reads_the_raw_node() {
    let doc = Loader::new(registry()).load("!Dice 10d6").unwrap();
    assert_eq!(*doc.downcast::<Dice>().unwrap(), Dice { count: 10, sides: 6 });
}

#[test]
fn nested_tags_are_built_before_their_parent() {
    let yaml = indoc! {"
        trainer: !Trainer
          optimizer: !Adam {lr: 0.1}
          epochs: 3
    "};
    let doc = Loader::new(registry()).load(yaml).unwrap();
    let trainer = doc.get("trainer").unwrap().downcast::<Trainer>().unwrap();
    assert_eq!(trainer.epochs, 3);
    let adam = trainer.optimizer.downcast::<Adam>().unwrap();
    assert_eq!(adam.lr, 0.1);
    assert_eq!(adam.betas, [0.9, 0.999]);
}

#[test]
fn construct_equals_direct_call_on_resolved_arguments() {
    let bodies = ["[0.3]", "{lr: 0.3}", "{args: [0.3], kwargs: {betas: [0.5]}}", "0.3"];
    let loader = Loader::new(registry());
    for body in bodies {
        let built = loader.load(&format!("!Adam {body}")).unwrap();
        let plain = loader.load(body).unwrap();
        let args = tagforge::resolve_args("!Adam", plain).unwrap();
        let direct = Adam::construct(args).unwrap();
        assert_eq!(*built.downcast::<Adam>().unwrap(), direct, "body {body}");
    }
}

#[test]
fn constructor_errors_keep_their_source() {
    let err = Loader::new(registry()).load("opt: !Adam {lr: 0.1, momentum: 0.9}").unwrap_err();
    match &err {
        Error::Construction { tag, cause, path, .. } => {
            assert_eq!(tag, "!Adam");
            assert_eq!(path, "$.opt");
            assert!(cause.downcast_ref::<ArgError>().is_some());
        }
        other => panic!("expected construction error, got {other:?}"),
    }
    let source = std::error::Error::source(&err).unwrap();
    assert!(source.to_string().contains("momentum"));
}

#[test]
fn surplus_positional_arguments_are_rejected() {
    let loader = Loader::new(registry());
    let err = loader.load("!Adam [0.1, 0.2, 0.3]").unwrap_err();
    match &err {
        Error::Construction { tag, cause, .. } => {
            assert_eq!(tag, "!Adam");
            assert!(cause.to_string().contains("3 were given"), "{cause}");
        }
        other => panic!("expected construction error, got {other:?}"),
    }
    assert!(loader.load("!Adam [0.1]").is_ok());
}

#[test]
fn errors_inside_nested_constructors_name_the_nested_tag() {
    let yaml = indoc! {"
        trainer: !Trainer
          optimizer: !Adam {lr: fast}
          epochs: 3
    "};
    let err = Loader::new(registry()).load(yaml).unwrap_err();
    assert_eq!(err.tag(), Some("!Adam"));
    assert_eq!(err.path(), Some("$.trainer<!Trainer>.optimizer"));
    assert_eq!(err.location().unwrap().line(), 2);
}

#[test]
fn hook_can_delegate_to_the_materializer() {
    let mut registry = registry();
    registry.register(
        "!Twice",
        Constructor::custom(|node, m| {
            let value = m.materialize(node)?;
            Ok(Value::seq(vec![value.clone(), value]))
        }),
    );
    let doc = Loader::new(registry).load("!Twice {die: !Dice 2d4}").unwrap();
    let first = doc.at(0).unwrap();
    assert!(first.ptr_eq(&doc.at(1).unwrap()));
    let die = first.get("die").unwrap();
    assert_eq!(*die.downcast::<Dice>().unwrap(), Dice { count: 2, sides: 4 });
}

#[test]
fn loading_a_composed_tree_twice_gives_equal_values() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let mut registry = Registry::new();
    registry.register(
        "!Point",
        Constructor::new(move |args: Args| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Value::seq(args.positional))
        }),
    );
    let node = compose_str("{a: &p !Point [1, 2], b: *p}").unwrap();
    let loader = Loader::new(registry);

    let first = loader.load_node(&node).unwrap();
    let second = loader.load_node(&node).unwrap();
    assert_eq!(first, second);
    assert!(!first.get("a").unwrap().ptr_eq(&second.get("a").unwrap()));
    // The alias reuses the anchored result: one call per load.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn non_specific_tag_keeps_plain_data() {
    let loader = Loader::new(Registry::new());
    let doc = loader.load("a: ! 42\nb: ! [1, 2]\nc: ! {k: v}").unwrap();
    assert_eq!(doc.get("a"), Some(Value::from("42")));
    assert_eq!(doc.get("b").unwrap().at(1), Some(Value::Int(2)));
    assert_eq!(doc.get("c").unwrap().get("k"), Some(Value::from("v")));
}

#[test]
fn timestamps_load_as_text() {
    let loader = Loader::new(Registry::new());
    let doc = loader.load("when: !!timestamp 2001-12-14 21:59:43.10 -5").unwrap();
    assert_eq!(doc.get("when"), Some(Value::from("2001-12-14 21:59:43.10 -5")));
    let err = loader.load("when: !!timestamp soon").unwrap_err();
    assert!(matches!(err, Error::InvalidScalar { expected: "timestamp", .. }), "{err:?}");
    assert_eq!(err.path(), Some("$.when"));
}
