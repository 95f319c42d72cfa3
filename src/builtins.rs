//! Constructors for the YAML core tags, registered by [`Registry::new`].
//!
//! Untagged scalars never reach these: the materializer types plain scalars itself.
//! They handle explicit tags such as `!!str 42`, `!!binary ...` or `!!omap [...]`.

use crate::base64::decode_base64_yaml;
use crate::error::{BoxError, Error};
use crate::materialize::{key_label, Materializer};
use crate::node::{Node, NodeKind};
use crate::parse_scalars::{is_null, is_timestamp, parse_bool, parse_float, parse_int};
use crate::path::PathSegment;
use crate::registry::{Constructor, Registry};
use crate::tags::{
    TAG_BINARY, TAG_BOOL, TAG_FLOAT, TAG_INT, TAG_MAP, TAG_NULL, TAG_OMAP, TAG_PAIRS, TAG_SEQ, TAG_SET, TAG_STR,
    TAG_TIMESTAMP,
};
use crate::value::{Mapping, Value};

pub(crate) fn register_builtins(registry: &mut Registry) {
    registry.register(TAG_NULL, Constructor::custom(null));
    registry.register(TAG_BOOL, Constructor::custom(boolean));
    registry.register(TAG_INT, Constructor::custom(int));
    registry.register(TAG_FLOAT, Constructor::custom(float));
    registry.register(TAG_STR, Constructor::custom(string));
    registry.register(TAG_BINARY, Constructor::custom(binary));
    registry.register(TAG_SEQ, Constructor::custom(seq));
    registry.register(TAG_MAP, Constructor::custom(map));
    registry.register(TAG_OMAP, Constructor::custom(omap));
    registry.register(TAG_SET, Constructor::custom(set));
    registry.register(TAG_PAIRS, Constructor::custom(pairs));
    registry.register(TAG_TIMESTAMP, Constructor::custom(timestamp));
}

fn describe(node: &Node) -> &'static str {
    match node.kind {
        NodeKind::Scalar(_) => "scalar",
        NodeKind::Sequence(_) => "sequence",
        NodeKind::Mapping(_) => "mapping",
        NodeKind::Tagged { .. } => "tagged node",
        NodeKind::Anchor { .. } => "anchored node",
        NodeKind::Alias { .. } => "alias",
    }
}

fn expected(tag: &str, what: &str, node: &Node) -> Error {
    Error::invalid_arguments(tag, format!("expected {what}, found {}", describe(node)))
}

fn scalar<'n>(tag: &str, node: &'n Node) -> Result<&'n str, Error> {
    node.as_str().ok_or_else(|| expected(tag, "a scalar", node))
}

fn null(node: &Node, _: &mut Materializer<'_>) -> Result<Value, BoxError> {
    let text = scalar(TAG_NULL, node)?;
    if is_null(text) {
        Ok(Value::Null)
    } else {
        Err(Error::invalid_scalar(text, "null").into())
    }
}

fn boolean(node: &Node, m: &mut Materializer<'_>) -> Result<Value, BoxError> {
    let text = scalar(TAG_BOOL, node)?;
    parse_bool(text, m.scalar_rules().yaml11_booleans)
        .map(Value::Bool)
        .ok_or_else(|| Error::invalid_scalar(text, "bool").into())
}

fn int(node: &Node, m: &mut Materializer<'_>) -> Result<Value, BoxError> {
    let text = scalar(TAG_INT, node)?;
    parse_int(text, m.scalar_rules().legacy_octal)
        .map(Value::Int)
        .ok_or_else(|| Error::invalid_scalar(text, "64-bit integer").into())
}

fn float(node: &Node, _: &mut Materializer<'_>) -> Result<Value, BoxError> {
    let text = scalar(TAG_FLOAT, node)?;
    parse_float(text)
        .map(Value::Float)
        .ok_or_else(|| Error::invalid_scalar(text, "float").into())
}

fn string(node: &Node, _: &mut Materializer<'_>) -> Result<Value, BoxError> {
    Ok(Value::String(scalar(TAG_STR, node)?.to_owned()))
}

/// Checked for the timestamp grammar and kept as written; [`Value`] has no date type.
fn timestamp(node: &Node, _: &mut Materializer<'_>) -> Result<Value, BoxError> {
    let text = scalar(TAG_TIMESTAMP, node)?;
    if is_timestamp(text) {
        Ok(Value::String(text.trim().to_owned()))
    } else {
        Err(Error::invalid_scalar(text, "timestamp").into())
    }
}

fn binary(node: &Node, _: &mut Materializer<'_>) -> Result<Value, BoxError> {
    let text = scalar(TAG_BINARY, node)?;
    Ok(Value::Binary(decode_base64_yaml(text)?))
}

fn seq(node: &Node, m: &mut Materializer<'_>) -> Result<Value, BoxError> {
    if node.as_sequence().is_none() {
        return Err(expected(TAG_SEQ, "a sequence", node).into());
    }
    Ok(m.materialize(node)?)
}

fn map(node: &Node, m: &mut Materializer<'_>) -> Result<Value, BoxError> {
    if node.as_mapping().is_none() {
        return Err(expected(TAG_MAP, "a mapping", node).into());
    }
    Ok(m.materialize(node)?)
}

/// Items of `!!omap`/`!!pairs`: a sequence of single-entry mappings.
fn single_pairs(tag: &str, node: &Node, m: &mut Materializer<'_>) -> Result<Vec<(Value, Value)>, Error> {
    let items = node.as_sequence().ok_or_else(|| expected(tag, "a sequence", node))?;
    let mut pairs = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let Some([(key, value)]) = item.as_mapping() else {
            return Err(expected(tag, "single-entry mappings as items", item).with_location(item.location));
        };
        m.enter(PathSegment::Index(idx));
        let key = m.materialize(key);
        let pair = key.and_then(|key| {
            let label = key_label(&key);
            m.child(PathSegment::Key(label), value).map(|value| (key, value))
        });
        m.leave();
        pairs.push(pair?);
    }
    Ok(pairs)
}

fn omap(node: &Node, m: &mut Materializer<'_>) -> Result<Value, BoxError> {
    let mut mapping = Mapping::new();
    for (key, value) in single_pairs(TAG_OMAP, node, m)? {
        if mapping.get_value(&key).is_some() {
            return Err(duplicate(&key).into());
        }
        mapping.push_unique(key, value);
    }
    Ok(Value::map(mapping))
}

fn pairs(node: &Node, m: &mut Materializer<'_>) -> Result<Value, BoxError> {
    let pairs = single_pairs(TAG_PAIRS, node, m)?;
    Ok(Value::seq(pairs.into_iter().map(|(k, v)| Value::seq(vec![k, v]))))
}

/// `!!set` is a mapping whose values are all null: `{a, b}` or `? a`.
fn set(node: &Node, m: &mut Materializer<'_>) -> Result<Value, BoxError> {
    let entries = node.as_mapping().ok_or_else(|| expected(TAG_SET, "a mapping", node))?;
    let mut members: Vec<Value> = Vec::with_capacity(entries.len());
    for (key_node, value_node) in entries {
        let key = m.materialize(key_node)?;
        if !m.materialize(value_node)?.is_null() {
            return Err(Error::invalid_arguments(TAG_SET, format!("member `{}` has a value", key_label(&key)))
                .with_location(value_node.location)
                .into());
        }
        if members.contains(&key) {
            return Err(duplicate(&key).with_location(key_node.location).into());
        }
        members.push(key);
    }
    Ok(Value::set(members))
}

fn duplicate(key: &Value) -> Error {
    Error::DuplicateKey {
        key: key_label(key),
        location: crate::location::Location::UNKNOWN,
        path: String::new(),
    }
}
