//! Graph materializer: turns a composed [`Node`] tree into a [`Value`] tree.
//!
//! Traversal is depth-first and post-order: the children of a tagged node are built
//! before its constructor runs. Anchors are recorded in two phases. The name is
//! reserved when the anchored node is entered and bound to the finished value when it
//! is left, so an alias met in between is a cycle and fails instead of recursing.
//! An alias to a bound anchor yields the stored value itself: composites and objects
//! are shared handles, never copies.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::error::Error;
use crate::node::{Node, NodeKind, Scalar};
use crate::options::{DuplicateKeyPolicy, Options};
use crate::parse_scalars::{resolve_plain, Resolved, ScalarRules};
use crate::path::{PathSegment, PathStack};
use crate::registry::Registry;
use crate::value::{Mapping, Value};

enum Slot {
    /// The anchored node is still being built. Holds the ticket of the reservation.
    Reserved(u64),
    Bound(Value),
}

/// Builds values from nodes for one document.
///
/// The anchor table lives for one top-level call: every [`Materializer::materialize`]
/// or [`Materializer::construct`] that is not nested in another starts with an empty
/// table. Custom construction hooks receive the materializer and use
/// [`Materializer::materialize`] for the parts of their body they want built the
/// regular way.
pub struct Materializer<'r> {
    registry: &'r Registry,
    options: &'r Options,
    rules: ScalarRules,
    anchors: AHashMap<String, Slot>,
    tickets: u64,
    path: PathStack,
    depth: usize,
}

impl<'r> Materializer<'r> {
    pub fn new(registry: &'r Registry, options: &'r Options) -> Self {
        Materializer {
            registry,
            options,
            rules: options.scalar_rules(),
            anchors: AHashMap::new(),
            tickets: 0,
            path: PathStack::default(),
            depth: 0,
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn options(&self) -> &'r Options {
        self.options
    }

    /// Path of the node being built, `$.trainer<!Adam>.betas`.
    pub fn path(&self) -> String {
        self.path.render()
    }

    /// Build the value of `node`.
    ///
    /// Errors carry the location and path of the innermost node that failed.
    pub fn materialize(&mut self, node: &Node) -> Result<Value, Error> {
        self.begin();
        if self.depth >= self.options.max_depth {
            return Err(Error::RecursionLimit {
                depth: self.options.max_depth,
                location: node.location,
                path: self.path.render(),
            });
        }
        self.depth += 1;
        let result = self.materialize_kind(node);
        self.depth -= 1;
        result.map_err(|err| err.with_context(node.location, || self.path.render()))
    }

    /// Run the constructor registered for `tag` on `body`, as if the document held
    /// `tag body` at the current position.
    pub fn construct(&mut self, tag: &str, body: &Node) -> Result<Value, Error> {
        self.begin();
        crate::dispatch::construct(self, tag, body).map_err(|err| err.with_context(body.location, || self.path.render()))
    }

    fn begin(&mut self) {
        if self.depth == 0 {
            self.anchors.clear();
            self.tickets = 0;
        }
    }

    pub(crate) fn scalar_rules(&self) -> ScalarRules {
        self.rules
    }

    pub(crate) fn enter(&mut self, segment: PathSegment) {
        self.path.push(segment);
    }

    pub(crate) fn leave(&mut self) {
        self.path.pop();
    }

    /// Materialize `node` with `segment` appended to the path.
    pub(crate) fn child(&mut self, segment: PathSegment, node: &Node) -> Result<Value, Error> {
        self.enter(segment);
        let result = self.materialize(node);
        self.leave();
        result
    }

    fn materialize_kind(&mut self, node: &Node) -> Result<Value, Error> {
        match &node.kind {
            NodeKind::Scalar(scalar) => self.materialize_scalar(scalar),
            NodeKind::Sequence(items) => {
                let mut values = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    values.push(self.child(PathSegment::Index(idx), item)?);
                }
                Ok(Value::seq(values))
            }
            NodeKind::Mapping(entries) => self.materialize_mapping(entries),
            NodeKind::Tagged { tag, body } => crate::dispatch::construct(self, tag, body),
            NodeKind::Anchor { name, body } => {
                let ticket = self.reserve(name);
                match self.materialize(body) {
                    Ok(value) => {
                        self.bind(name, ticket, &value);
                        Ok(value)
                    }
                    Err(err) => {
                        self.release(name, ticket);
                        Err(err)
                    }
                }
            }
            NodeKind::Alias { name } => match self.anchors.get(name.as_str()) {
                Some(Slot::Bound(value)) => Ok(value.clone()),
                Some(Slot::Reserved(_)) => Err(Error::CyclicReference {
                    name: name.clone(),
                    location: node.location,
                    path: String::new(),
                }),
                None => Err(Error::UndefinedAlias {
                    name: name.clone(),
                    location: node.location,
                    path: String::new(),
                }),
            },
        }
    }

    fn reserve(&mut self, name: &str) -> u64 {
        self.tickets += 1;
        self.anchors.insert(name.to_owned(), Slot::Reserved(self.tickets));
        self.tickets
    }

    /// Bind only if the reservation is still ours: an anchor of the same name defined
    /// inside the body replaced it and stays the current definition.
    fn bind(&mut self, name: &str, ticket: u64, value: &Value) {
        if let Some(slot) = self.anchors.get_mut(name) {
            if matches!(slot, Slot::Reserved(t) if *t == ticket) {
                *slot = Slot::Bound(value.clone());
            }
        }
    }

    /// Drop a reservation whose body failed, so a later alias is undefined rather
    /// than cyclic.
    fn release(&mut self, name: &str, ticket: u64) {
        if matches!(self.anchors.get(name), Some(Slot::Reserved(t)) if *t == ticket) {
            self.anchors.remove(name);
        }
    }

    fn materialize_scalar(&self, scalar: &Scalar) -> Result<Value, Error> {
        if !scalar.is_plain() {
            return Ok(Value::String(scalar.value.clone()));
        }
        match resolve_plain(&scalar.value, self.rules) {
            Ok(Resolved::Null) => Ok(Value::Null),
            Ok(Resolved::Bool(b)) => Ok(Value::Bool(b)),
            Ok(Resolved::Int(i)) => Ok(Value::Int(i)),
            Ok(Resolved::Float(f)) => Ok(Value::Float(f)),
            Ok(Resolved::Str) => Ok(Value::String(scalar.value.clone())),
            Err(()) => Err(Error::invalid_scalar(&scalar.value, "64-bit integer")),
        }
    }

    /// Entries are built in document order. Explicit keys are checked for duplicates
    /// as they arrive; `<<` sources are collected separately (earlier sources win) and
    /// come first in the result, with explicit keys overriding them in place.
    fn materialize_mapping(&mut self, entries: &[(Node, Node)]) -> Result<Value, Error> {
        let policy = self.options.duplicate_keys;
        let mut explicit = Mapping::new();
        let mut explicit_index = KeyIndex::default();
        let mut merged = Mapping::new();
        let mut merged_index = KeyIndex::default();

        for (key_node, value_node) in entries {
            if self.options.merge_keys && key_node.is_merge_key() {
                let source = self.child(PathSegment::Key("<<".to_owned()), value_node)?;
                merge_into(&mut merged, &mut merged_index, &source)
                    .map_err(|err| err.with_location(value_node.location))?;
                continue;
            }

            let key = self.materialize(key_node)?;
            let label = key_label(&key);
            let fingerprint = KeyFingerprint::of(&key);
            let existing = explicit_index.find(&fingerprint, &explicit, &key);
            if existing.is_some() && policy == DuplicateKeyPolicy::Error {
                return Err(Error::DuplicateKey {
                    key: label,
                    location: key_node.location,
                    path: String::new(),
                });
            }

            // A skipped value is still built: anchors inside it stay visible to later aliases.
            let value = self.child(PathSegment::Key(label), value_node)?;
            match existing {
                None => {
                    explicit_index.insert(fingerprint, explicit.len());
                    explicit.push_unique(key, value);
                }
                Some(idx) if policy == DuplicateKeyPolicy::LastWins => {
                    if let Some(slot) = explicit.value_at_mut(idx) {
                        *slot = value;
                    }
                }
                Some(_) => {}
            }
        }

        if merged.is_empty() {
            return Ok(Value::map(explicit));
        }
        for (key, value) in explicit {
            let fingerprint = KeyFingerprint::of(&key);
            match merged_index.find(&fingerprint, &merged, &key) {
                Some(idx) => {
                    if let Some(slot) = merged.value_at_mut(idx) {
                        *slot = value;
                    }
                }
                None => {
                    merged_index.insert(fingerprint, merged.len());
                    merged.push_unique(key, value);
                }
            }
        }
        Ok(Value::map(merged))
    }
}

fn merge_into(merged: &mut Mapping, index: &mut KeyIndex, source: &Value) -> Result<(), Error> {
    match source {
        Value::Map(map) => {
            for (key, value) in map.borrow().iter() {
                let fingerprint = KeyFingerprint::of(key);
                if index.find(&fingerprint, merged, key).is_none() {
                    index.insert(fingerprint, merged.len());
                    merged.push_unique(key.clone(), value.clone());
                }
            }
            Ok(())
        }
        Value::Seq(items) => {
            for item in items.borrow().iter() {
                if !matches!(item, Value::Map(_)) {
                    return Err(merge_error(item));
                }
                merge_into(merged, index, item)?;
            }
            Ok(())
        }
        other => Err(merge_error(other)),
    }
}

fn merge_error(found: &Value) -> Error {
    Error::msg(format!(
        "merge key `<<` expects a mapping or a sequence of mappings, found {}",
        found.kind()
    ))
}

/// Short rendering of a mapping key for paths and error messages.
pub(crate) fn key_label(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        other => format!("{other:?}"),
    }
}

/// Hashable summary of a key. Equal values have equal fingerprints; candidates
/// sharing a fingerprint are confirmed with `Value` equality.
#[derive(PartialEq, Eq, Hash)]
enum KeyFingerprint {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    Binary(Vec<u8>),
    Sequence(Vec<KeyFingerprint>),
    Mapping(Vec<(KeyFingerprint, KeyFingerprint)>),
    Set(Vec<KeyFingerprint>),
    Object(&'static str),
}

impl KeyFingerprint {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => KeyFingerprint::Null,
            Value::Bool(b) => KeyFingerprint::Bool(*b),
            Value::Int(i) => KeyFingerprint::Int(*i),
            // 0.0 == -0.0
            Value::Float(f) => KeyFingerprint::Float(if *f == 0.0 { 0 } else { f.to_bits() }),
            Value::String(s) => KeyFingerprint::Str(s.clone()),
            Value::Binary(bytes) => KeyFingerprint::Binary(bytes.clone()),
            Value::Seq(items) => KeyFingerprint::Sequence(items.borrow().iter().map(Self::of).collect()),
            Value::Set(items) => KeyFingerprint::Set(items.borrow().iter().map(Self::of).collect()),
            Value::Map(map) => {
                KeyFingerprint::Mapping(map.borrow().iter().map(|(k, v)| (Self::of(k), Self::of(v))).collect())
            }
            Value::Object(obj) => KeyFingerprint::Object(obj.type_name()),
        }
    }
}

/// Index from key fingerprints to entry positions of one [`Mapping`].
#[derive(Default)]
struct KeyIndex {
    buckets: AHashMap<KeyFingerprint, SmallVec<[usize; 1]>>,
}

impl KeyIndex {
    fn find(&self, fingerprint: &KeyFingerprint, mapping: &Mapping, key: &Value) -> Option<usize> {
        self.buckets
            .get(fingerprint)?
            .iter()
            .copied()
            .find(|&idx| mapping.key_at(idx) == Some(key))
    }

    fn insert(&mut self, fingerprint: KeyFingerprint, idx: usize) {
        self.buckets.entry(fingerprint).or_default().push(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(node: &Node) -> Result<Value, Error> {
        let registry = Registry::new();
        let options = Options::default();
        Materializer::new(&registry, &options).materialize(node)
    }

    #[test]
    fn plain_scalars_are_typed_quoted_are_strings() {
        assert_eq!(build(&Node::plain("42")).unwrap(), Value::Int(42));
        assert_eq!(build(&Node::quoted("42")).unwrap(), Value::from("42"));
        assert_eq!(build(&Node::empty()).unwrap(), Value::Null);
    }

    #[test]
    fn alias_shares_anchor_value() {
        let doc = Node::sequence([
            Node::anchor("x", Node::sequence([Node::plain("1")])),
            Node::alias("x"),
        ]);
        let value = build(&doc).unwrap();
        assert!(value.at(0).unwrap().ptr_eq(&value.at(1).unwrap()));
    }

    #[test]
    fn alias_inside_its_anchor_is_a_cycle() {
        let doc = Node::anchor("x", Node::sequence([Node::alias("x")]));
        match build(&doc) {
            Err(Error::CyclicReference { name, path, .. }) => {
                assert_eq!(name, "x");
                assert_eq!(path, "$[0]");
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn undefined_alias() {
        let err = build(&Node::alias("nope")).unwrap_err();
        assert!(matches!(err, Error::UndefinedAlias { ref name, .. } if name == "nope"));
    }

    #[test]
    fn inner_redefinition_stays_current() {
        let doc = Node::sequence([
            Node::anchor("a", Node::sequence([Node::anchor("a", Node::plain("1"))])),
            Node::alias("a"),
        ]);
        let value = build(&doc).unwrap();
        assert_eq!(value.at(1), Some(Value::Int(1)));
    }

    #[test]
    fn anchors_do_not_outlive_a_top_level_call() {
        let registry = Registry::new();
        let options = Options::default();
        let mut m = Materializer::new(&registry, &options);
        assert_eq!(m.materialize(&Node::anchor("x", Node::plain("1"))).unwrap(), Value::Int(1));
        let err = m.materialize(&Node::alias("x")).unwrap_err();
        assert!(matches!(err, Error::UndefinedAlias { ref name, .. } if name == "x"), "{err:?}");
    }

    #[test]
    fn failed_anchor_is_released() {
        let registry = Registry::new();
        let options = Options::default();
        let mut m = Materializer::new(&registry, &options);
        // Nested below depth 0 so the table survives between the two calls.
        m.depth = 1;
        let failing = Node::anchor("x", Node::tagged("!Nope", Node::plain("2")));
        assert!(matches!(m.materialize(&failing), Err(Error::UnknownTag { .. })));
        let err = m.materialize(&Node::alias("x")).unwrap_err();
        assert!(matches!(err, Error::UndefinedAlias { .. }), "{err:?}");
    }

    #[test]
    fn depth_limit() {
        let mut node = Node::plain("1");
        for _ in 0..10 {
            node = Node::sequence([node]);
        }
        let registry = Registry::new();
        let options = crate::options! { max_depth: 5 };
        let err = Materializer::new(&registry, &options).materialize(&node).unwrap_err();
        assert!(matches!(err, Error::RecursionLimit { depth: 5, .. }));
    }

    #[test]
    fn fingerprint_treats_signed_zero_as_equal() {
        assert!(KeyFingerprint::of(&Value::Float(0.0)) == KeyFingerprint::of(&Value::Float(-0.0)));
        assert!(KeyFingerprint::of(&Value::Int(1)) != KeyFingerprint::of(&Value::Float(1.0)));
    }
}
