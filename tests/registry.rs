use std::io;
use std::sync::{Arc, Mutex};

use indoc::indoc;
use tagforge::{Args, Constructor, Error, Loader, Member, Namespace, Overwrite, Registry, Value};
use tracing_subscriber::filter::LevelFilter;

fn eye() -> Constructor {
    Constructor::new(|mut args: Args| {
        let n: i64 = args.param(0, "n")?;
        let rows = (0..n)
            .map(|i| Value::seq((0..n).map(|j| Value::Int(i64::from(i == j)))))
            .collect::<Vec<_>>();
        Ok(Value::seq(rows))
    })
}

fn label(text: &'static str) -> Constructor {
    Constructor::new(move |_| Ok(Value::from(text)))
}

fn numpy() -> Namespace {
    Namespace::new()
        .with("eye", eye())
        .with_namespace("linalg", Namespace::new().with("inv", label("inv")))
        .with("_private", label("private"))
}

#[test]
fn prefix_resolves_like_an_exact_registration() {
    let yaml = "m: !np.eye 3";

    let mut by_prefix = Registry::new();
    by_prefix.register_prefix("!np", numpy());
    let mut by_tag = Registry::new();
    by_tag.register("!np.eye", eye());

    let a = Loader::new(by_prefix).load(yaml).unwrap();
    let b = Loader::new(by_tag).load(yaml).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.get("m").unwrap().at(1).unwrap().at(1), Some(Value::Int(1)));
}

#[test]
fn nested_namespace_members_resolve() {
    let mut registry = Registry::new();
    registry.register_prefix("!np.", numpy());
    let doc = Loader::new(registry).load("!np.linalg.inv").unwrap();
    assert_eq!(doc, Value::from("inv"));
}

#[test]
fn exact_registration_wins_over_prefix() {
    let mut registry = Registry::new();
    registry.register_prefix("!np", numpy());
    registry.register("!np.eye", label("exact"));
    let doc = Loader::new(registry).load("!np.eye 2").unwrap();
    assert_eq!(doc, Value::from("exact"));
}

#[test]
fn longest_segment_prefix_wins() {
    let mut registry = Registry::new();
    registry.register_prefix("!a", Namespace::new().with_namespace("b", Namespace::new().with("c", label("short"))));
    registry.register_prefix("!a.b", Namespace::new().with("c", label("long")));
    registry.register_prefix("!ab", Namespace::new().with("c", label("other")));
    assert_eq!(Loader::new(registry.clone()).load("!a.b.c").unwrap(), Value::from("long"));
    assert_eq!(Loader::new(registry).load("!ab.c").unwrap(), Value::from("other"));
}

#[test]
fn bare_prefix_is_not_a_tag() {
    let mut registry = Registry::new();
    registry.register_prefix("!Foo", Namespace::new().with("bar", label("member")));
    let err = Loader::new(registry.clone()).load("!Foo").unwrap_err();
    assert!(matches!(err, Error::UnknownTag { ref tag, .. } if tag == "!Foo"));

    registry.register("!Foo", label("exact"));
    assert_eq!(Loader::new(registry).load("!Foo").unwrap(), Value::from("exact"));
}

#[test]
fn prefix_does_not_match_inside_a_segment() {
    let mut registry = Registry::new();
    registry.register_prefix("!FooBar", Namespace::new().with("x", label("x")));
    assert!(!registry.contains("!Foo.x"));
    assert!(!registry.contains("!FooBarx"));
    assert!(registry.contains("!FooBar.x"));
}

#[test]
fn reregistering_a_tag_replaces_it() {
    let mut registry = Registry::new();
    assert!(registry.register("!Thing", label("first")).is_none());
    assert!(registry.register("!Thing", label("second")).is_some());
    assert_eq!(Loader::new(registry).load("!Thing").unwrap(), Value::from("second"));
}

#[test]
fn builtins_can_be_overridden() {
    let mut registry = Registry::new();
    registry.register("!!str", label("shadowed"));
    let doc = Loader::new(registry).load("!!str 42").unwrap();
    assert_eq!(doc, Value::from("shadowed"));
}

#[test]
fn namespace_scan_registers_public_members() {
    let mut registry = Registry::empty();
    let count = registry.register_namespace("!np", &numpy(), Overwrite::Keep);
    assert_eq!(count, 2);
    assert_eq!(registry.tags(), ["!np.eye", "!np.linalg.inv"]);
    assert!(!registry.contains("!np._private"));
}

#[test]
fn namespace_scan_collision_policy() {
    let mut keep = Registry::empty();
    keep.register("!np.eye", label("existing"));
    assert_eq!(keep.register_namespace("!np", &numpy(), Overwrite::Keep), 1);
    assert_eq!(Loader::new(keep).load("!np.eye").unwrap(), Value::from("existing"));

    let mut replace = Registry::empty();
    replace.register("!np.eye", label("existing"));
    assert_eq!(replace.register_namespace("!np", &numpy(), Overwrite::Replace), 2);
    let doc = Loader::new(replace).load("!np.eye 1").unwrap();
    assert_eq!(doc, Value::seq(vec![Value::seq(vec![Value::Int(1)])]));
}

#[test]
fn namespace_scan_with_caller_filter() {
    let mut registry = Registry::empty();
    let top_level_only = |_: &str, member: &Member| matches!(member, Member::Constructor(_));
    let count = registry.register_namespace_with("!np", &numpy(), Overwrite::Keep, top_level_only);
    assert_eq!(count, 2);
    assert_eq!(registry.tags(), ["!np._private", "!np.eye"]);
    assert!(!registry.contains("!np.linalg.inv"));
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Warnings logged while `f` runs.
fn warnings(f: impl FnOnce()) -> String {
    let sink = Captured::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = sink.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn overrides_and_collisions_are_warned_about() {
    let mut registry = Registry::empty();
    let quiet = warnings(|| {
        registry.register("!np.eye", label("first"));
    });
    assert!(quiet.is_empty(), "{quiet}");

    let replaced = warnings(|| {
        assert!(registry.register("!np.eye", label("second")).is_some());
    });
    assert!(replaced.contains("replacing registered constructor"), "{replaced}");
    assert!(replaced.contains("!np.eye"), "{replaced}");

    let shadowing_prefix = warnings(|| {
        registry.register_prefix("!np.eye", Namespace::new());
    });
    assert!(shadowing_prefix.contains("also a registered exact tag"), "{shadowing_prefix}");

    let shadowing_tag = warnings(|| {
        registry.register_prefix("!np", numpy());
        registry.register("!np", label("bare"));
    });
    assert!(shadowing_tag.contains("also a registered prefix"), "{shadowing_tag}");

    let doc = Loader::new(registry).load("a: !np.eye\nb: !np\n").unwrap();
    assert_eq!(doc.get("a"), Some(Value::from("second")));
    assert_eq!(doc.get("b"), Some(Value::from("bare")));
}

#[test]
fn custom_separator() {
    let mut registry = Registry::new().with_separator(':');
    registry.register_prefix("!np", numpy());
    let yaml = indoc! {"
        a: !np:linalg:inv
        b: !np:eye 1
    "};
    let doc = Loader::new(registry).load(yaml).unwrap();
    assert_eq!(doc.get("a"), Some(Value::from("inv")));
}

#[test]
fn named_registration_uses_default_tag_name() {
    let mut registry = Registry::empty();
    registry.register_named("Optimizer", label("opt"));
    assert_eq!(registry.tags(), ["!Optimizer"]);
}

#[test]
fn registry_is_shared_across_threads() {
    let mut registry = Registry::new();
    registry.register_prefix("!np", numpy());
    let registry = std::sync::Arc::new(registry);
    let handles: Vec<_> = (1..=4)
        .map(|n| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                let loader = Loader::new((*registry).clone());
                let doc = loader.load(&format!("!np.eye {n}")).unwrap();
                doc.as_seq().unwrap().len()
            })
        })
        .collect();
    let sizes: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(sizes, [1, 2, 3, 4]);
}
