//! Argument shaping: turns the materialized body of a tagged node into call arguments.
//!
//! | body                                  | positional      | keyword        |
//! |---------------------------------------|-----------------|----------------|
//! | absent, `null` or `''`                | `[]`            | `{}`           |
//! | sequence                              | the items       | `{}`           |
//! | mapping with only `args` and/or `kwargs` | `args`       | `kwargs`       |
//! | any other mapping                     | `[]`            | the mapping    |
//! | scalar or other value                 | `[body]`        | `{}`           |
//!
//! `args`/`kwargs` next to any other key is rejected as ambiguous.

use std::fmt;

use crate::error::Error;
use crate::location::Location;
use crate::value::{Mapping, Value};

const ARGS: &str = "args";
const KWARGS: &str = "kwargs";

/// Positional and keyword arguments handed to a default constructor.
#[derive(Clone, Debug, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    /// Keyword arguments in document order. Names are unique.
    pub keyword: Vec<(String, Value)>,
    /// Number of leading positionals claimed by [`Args::param`].
    consumed: usize,
}

impl PartialEq for Args {
    fn eq(&self, other: &Self) -> bool {
        self.positional == other.positional && self.keyword == other.keyword
    }
}

/// A constructor received arguments it cannot use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgError(pub String);

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ArgError {}

/// Conversion from a materialized value into a constructor parameter.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ArgError>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ArgError> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ArgError> {
        value
            .as_i64()
            .ok_or_else(|| ArgError(format!("expected int, found {}", value.kind())))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ArgError> {
        value
            .as_f64()
            .ok_or_else(|| ArgError(format!("expected float, found {}", value.kind())))
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ArgError> {
        value
            .as_bool()
            .ok_or_else(|| ArgError(format!("expected bool, found {}", value.kind())))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ArgError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(ArgError(format!("expected string, found {}", other.kind()))),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ArgError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ArgError> {
        match value.as_seq() {
            Some(items) => items.iter().cloned().map(T::from_value).collect(),
            None => Err(ArgError(format!("expected sequence, found {}", value.kind()))),
        }
    }
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(positional: Vec<Value>, keyword: Vec<(String, Value)>) -> Self {
        Args {
            positional,
            keyword,
            consumed: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Keyword argument by name.
    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.keyword.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Remove and convert the keyword argument `name`; `Ok(None)` if absent.
    pub fn take<T: FromValue>(&mut self, name: &str) -> Result<Option<T>, ArgError> {
        match self.keyword.iter().position(|(k, _)| k == name) {
            Some(idx) => {
                let (_, value) = self.keyword.remove(idx);
                T::from_value(value)
                    .map(Some)
                    .map_err(|e| ArgError(format!("argument `{name}`: {e}")))
            }
            None => Ok(None),
        }
    }

    /// Parameter that may be passed by position `index` or by keyword `name`.
    ///
    /// Positional arguments are consumed front to back, so callers extract
    /// parameters in declaration order with increasing `index`.
    pub fn param<T: FromValue>(&mut self, index: usize, name: &str) -> Result<T, ArgError> {
        self.consumed = self.consumed.max(index + 1);
        if let Some(value) = self.take::<T>(name)? {
            if self.positional.len() > index {
                return Err(ArgError(format!("argument `{name}` given by position and by keyword")));
            }
            return Ok(value);
        }
        match self.positional.get(index) {
            Some(value) => T::from_value(value.clone()).map_err(|e| ArgError(format!("argument `{name}`: {e}"))),
            None => Err(ArgError(format!("missing argument `{name}`"))),
        }
    }

    /// Fail when keyword arguments remain that no parameter consumed, or when
    /// more positionals were given than [`Args::param`] asked for.
    pub fn deny_unknown(&self) -> Result<(), ArgError> {
        if let Some((name, _)) = self.keyword.first() {
            return Err(ArgError(format!("unexpected keyword argument `{name}`")));
        }
        if self.positional.len() > self.consumed {
            return Err(ArgError(format!(
                "takes {} positional argument(s) but {} were given",
                self.consumed,
                self.positional.len()
            )));
        }
        Ok(())
    }
}

fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn keyword_from(tag: &str, mapping: &Mapping) -> Result<Vec<(String, Value)>, Error> {
    mapping
        .iter()
        .map(|(k, v)| match k {
            Value::String(name) => Ok((name.clone(), v.clone())),
            other => Err(Error::invalid_arguments(
                tag,
                format!("keyword names must be strings, found {} {other:?}", other.kind()),
            )),
        })
        .collect()
}

/// Shape the materialized `body` of a node tagged `tag` into [`Args`].
///
/// ```rust
/// use tagforge::{resolve_args, Value};
///
/// let body = Value::seq(vec![Value::Int(1), Value::Int(2)]);
/// let args = resolve_args("!Foo", body).unwrap();
/// assert_eq!(args.positional, [Value::Int(1), Value::Int(2)]);
/// assert!(args.keyword.is_empty());
/// ```
pub fn resolve_args(tag: &str, body: Value) -> Result<Args, Error> {
    if is_empty_body(&body) {
        return Ok(Args::new());
    }
    match body {
        Value::Seq(items) => {
            let positional = items.borrow().clone();
            Ok(Args::from_parts(positional, Vec::new()))
        }
        Value::Map(mapping) => {
            let mapping = mapping.borrow();
            shape_mapping(tag, &mapping)
        }
        other => Ok(Args::from_parts(vec![other], Vec::new())),
    }
}

fn shape_mapping(tag: &str, mapping: &Mapping) -> Result<Args, Error> {
    let reserved = mapping.contains_key(ARGS) || mapping.contains_key(KWARGS);
    if !reserved {
        return Ok(Args::from_parts(Vec::new(), keyword_from(tag, mapping)?));
    }
    let others: Vec<String> = mapping
        .keys()
        .filter(|k| !matches!(k.as_str(), Some(ARGS) | Some(KWARGS)))
        .map(|k| match k.as_str() {
            Some(s) => s.to_owned(),
            None => format!("{k:?}"),
        })
        .collect();
    if !others.is_empty() {
        return Err(Error::AmbiguousArguments {
            tag: tag.to_owned(),
            keys: others,
            location: Location::UNKNOWN,
            path: String::new(),
        });
    }
    let positional = match mapping.get(ARGS) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Seq(items)) => items.borrow().clone(),
        Some(other) => {
            return Err(Error::invalid_arguments(
                tag,
                format!("`args` must be a sequence, found {}", other.kind()),
            ));
        }
    };
    let keyword = match mapping.get(KWARGS) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Map(kw)) => keyword_from(tag, &kw.borrow())?,
        Some(other) => {
            return Err(Error::invalid_arguments(
                tag,
                format!("`kwargs` must be a mapping, found {}", other.kind()),
            ));
        }
    };
    Ok(Args::from_parts(positional, keyword))
}
