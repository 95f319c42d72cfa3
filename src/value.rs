//! Materialized values.
//!
//! Composite values (`Seq`, `Map`, `Set`) and constructed objects are reference
//! counted: cloning a [`Value`] clones the handle, not the data. This is what makes
//! an alias yield the very instance its anchor produced.

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Shared, mutable handle used for composite values.
pub type Shared<T> = Rc<RefCell<T>>;

fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// A materialized node: plain data or an object returned by a constructor.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Seq(Shared<Vec<Value>>),
    Map(Shared<Mapping>),
    Set(Shared<Vec<Value>>),
    Object(Object),
}

impl Value {
    pub fn seq(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Seq(shared(items.into_iter().collect()))
    }

    pub fn map(mapping: Mapping) -> Self {
        Value::Map(shared(mapping))
    }

    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(shared(items.into_iter().collect()))
    }

    /// Wrap a constructed object.
    pub fn object<T: Any + fmt::Debug + PartialEq>(value: T) -> Self {
        Value::Object(Object::new(value))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "mapping",
            Value::Set(_) => "set",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and integers widened to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<Ref<'_, Vec<Value>>> {
        match self {
            Value::Seq(items) => Some(items.borrow()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<Ref<'_, Mapping>> {
        match self {
            Value::Map(map) => Some(map.borrow()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Shared handle to a constructed object of type `T`.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        self.as_object().and_then(Object::downcast::<T>)
    }

    /// Look up a string key in a mapping value. The returned value shares identity
    /// with the stored one.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.as_map().and_then(|m| m.get(key).cloned())
    }

    /// Item `index` of a sequence value.
    pub fn at(&self, index: usize) -> Option<Value> {
        self.as_seq().and_then(|s| s.get(index).cloned())
    }

    /// True when both values are handles to the same instance.
    ///
    /// Scalars are immutable and have no identity; they never compare as identical.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Seq(a), Value::Seq(b)) | (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality. Objects compare with their own `PartialEq`.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) | (Value::Set(a), Value::Set(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x:?})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Binary(bytes) => write!(f, "Binary({} bytes)", bytes.len()),
            Value::Seq(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Set(items) => {
                f.write_str("Set")?;
                f.debug_set().entries(items.borrow().iter()).finish()
            }
            Value::Map(map) => fmt::Debug::fmt(&*map.borrow(), f),
            Value::Object(obj) => fmt::Debug::fmt(obj, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(shared(items))
    }
}

impl From<Mapping> for Value {
    fn from(mapping: Mapping) -> Self {
        Value::map(mapping)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::String(s) => serializer.serialize_str(s),
            Value::Binary(bytes) => serializer.serialize_bytes(bytes),
            Value::Seq(items) | Value::Set(items) => {
                let items = items.borrow();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let map = map.borrow();
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Object(obj) => Err(S::Error::custom(format!(
                "cannot serialize constructed object of type {}",
                obj.type_name()
            ))),
        }
    }
}

/// Insertion-ordered mapping. Keys are arbitrary values; the materializer keeps them unique.
#[derive(Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(Value, Value)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace. A replaced entry keeps its position; the old value is returned.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Append without checking for an equal key. Used by the materializer, which
    /// has already established uniqueness.
    pub(crate) fn push_unique(&mut self, key: Value, value: Value) {
        self.entries.push((key, value));
    }

    pub(crate) fn key_at(&self, index: usize) -> Option<&Value> {
        self.entries.get(index).map(|(k, _)| k)
    }

    pub(crate) fn value_at_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.entries.get_mut(index).map(|(_, v)| v)
    }

    /// Value stored under a string key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Value stored under an arbitrary key.
    pub fn get_value(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl IntoIterator for Mapping {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = Mapping::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

/// A value produced by a user constructor.
///
/// Holds an `Rc<dyn Any>` plus type-erased `Debug` and `PartialEq` so that trees
/// containing objects can still be printed and compared.
#[derive(Clone)]
pub struct Object {
    inner: Rc<dyn Any>,
    type_name: &'static str,
    eq: fn(&dyn Any, &dyn Any) -> bool,
    debug: fn(&dyn Any, &mut fmt::Formatter<'_>) -> fmt::Result,
}

fn eq_as<T: Any + PartialEq>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn debug_as<T: Any + fmt::Debug>(value: &dyn Any, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value.downcast_ref::<T>() {
        Some(value) => fmt::Debug::fmt(value, f),
        None => f.write_str("<object>"),
    }
}

impl Object {
    pub fn new<T: Any + fmt::Debug + PartialEq>(value: T) -> Self {
        Self::from_rc(Rc::new(value))
    }

    /// Wrap an existing handle; the object shares identity with `rc`.
    pub fn from_rc<T: Any + fmt::Debug + PartialEq>(rc: Rc<T>) -> Self {
        Object {
            inner: rc,
            type_name: std::any::type_name::<T>(),
            eq: eq_as::<T>,
            debug: debug_as::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.eq)(self.inner.as_ref(), other.inner.as_ref())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.debug)(self.inner.as_ref(), f)
    }
}
