//! Defines error and its location
use std::fmt;

use saphyr_parser::ScanError;

use crate::budget::BudgetBreach;
use crate::location::{location_from_marker, Location};

/// Error type returned by user constructors.
///
/// Anything that implements `std::error::Error + Send + Sync` converts into it with `?`,
/// including plain strings (`"bad value".into()`).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while composing or materializing a document.
///
/// Every variant is fatal for the whole `load` call: no partial tree is returned.
/// Node-related variants carry the source [`Location`] and the path of the node
/// within the document (`$.trainer.optimizer[0]`), so the offending node can be found.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Free-form error with optional source location (parser errors land here).
    Message { msg: String, location: Location },
    /// The tag matches neither an exact registration nor a registered prefix.
    UnknownTag {
        tag: String,
        location: Location,
        path: String,
    },
    /// A mapping body mixes the reserved `args`/`kwargs` keys with other keys.
    AmbiguousArguments {
        tag: String,
        keys: Vec<String>,
        location: Location,
        path: String,
    },
    /// The body has a recognizable shape but cannot become call arguments
    /// (`args` is not a sequence, a keyword is not a string, ...).
    InvalidArguments {
        tag: String,
        msg: String,
        location: Location,
        path: String,
    },
    /// A user constructor failed. The original error is kept as [`std::error::Error::source`].
    Construction {
        tag: String,
        cause: BoxError,
        location: Location,
        path: String,
    },
    /// Alias references an anchor that has not been defined earlier in the document.
    UndefinedAlias {
        name: String,
        location: Location,
        path: String,
    },
    /// Alias references an anchor whose node is still being materialized.
    CyclicReference {
        name: String,
        location: Location,
        path: String,
    },
    /// Two keys of one mapping are equal after materialization.
    DuplicateKey {
        key: String,
        location: Location,
        path: String,
    },
    /// A scalar cannot be converted to the type its tag demands (`!!int abc`).
    InvalidScalar {
        value: String,
        expected: &'static str,
        location: Location,
        path: String,
    },
    /// Materialization went deeper than [`crate::Options::max_depth`].
    RecursionLimit {
        depth: usize,
        location: Location,
        path: String,
    },
    /// A YAML budget limit was exceeded while composing.
    Budget {
        breach: BudgetBreach,
        location: Location,
    },
    /// A single document was requested but the stream holds more.
    MultipleDocuments { location: Location },
}

impl Error {
    /// Construct a `Message` error with no known location.
    pub(crate) fn msg<S: Into<String>>(s: S) -> Self {
        Error::Message {
            msg: s.into(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn unknown_tag(tag: &str) -> Self {
        Error::UnknownTag {
            tag: tag.to_owned(),
            location: Location::UNKNOWN,
            path: String::new(),
        }
    }

    pub(crate) fn invalid_arguments<S: Into<String>>(tag: &str, msg: S) -> Self {
        Error::InvalidArguments {
            tag: tag.to_owned(),
            msg: msg.into(),
            location: Location::UNKNOWN,
            path: String::new(),
        }
    }

    pub(crate) fn construction(tag: &str, cause: BoxError) -> Self {
        Error::Construction {
            tag: tag.to_owned(),
            cause,
            location: Location::UNKNOWN,
            path: String::new(),
        }
    }

    pub(crate) fn invalid_scalar(value: &str, expected: &'static str) -> Self {
        Error::InvalidScalar {
            value: value.to_owned(),
            expected,
            location: Location::UNKNOWN,
            path: String::new(),
        }
    }

    fn parts_mut(&mut self) -> (&mut Location, Option<&mut String>) {
        match self {
            Error::UnknownTag { location, path, .. }
            | Error::AmbiguousArguments { location, path, .. }
            | Error::InvalidArguments { location, path, .. }
            | Error::Construction { location, path, .. }
            | Error::UndefinedAlias { location, path, .. }
            | Error::CyclicReference { location, path, .. }
            | Error::DuplicateKey { location, path, .. }
            | Error::InvalidScalar { location, path, .. }
            | Error::RecursionLimit { location, path, .. } => (location, Some(path)),
            Error::Message { location, .. }
            | Error::Budget { location, .. }
            | Error::MultipleDocuments { location } => (location, None),
        }
    }

    /// Attach/override a concrete location to this error and return it.
    pub(crate) fn with_location(mut self, set_location: Location) -> Self {
        *self.parts_mut().0 = set_location;
        self
    }

    /// Fill in location and path, keeping whatever a deeper node already recorded.
    ///
    /// Called by:
    /// - The materializer when an error leaves the node it belongs to.
    pub(crate) fn with_context(mut self, set_location: Location, set_path: impl FnOnce() -> String) -> Self {
        let (location, path) = self.parts_mut();
        if !location.is_known() {
            *location = set_location;
        }
        if let Some(path) = path {
            if path.is_empty() {
                *path = set_path();
            }
        }
        self
    }

    /// If the error has a known location, return it.
    pub fn location(&self) -> Option<Location> {
        let location = match self {
            Error::Message { location, .. }
            | Error::UnknownTag { location, .. }
            | Error::AmbiguousArguments { location, .. }
            | Error::InvalidArguments { location, .. }
            | Error::Construction { location, .. }
            | Error::UndefinedAlias { location, .. }
            | Error::CyclicReference { location, .. }
            | Error::DuplicateKey { location, .. }
            | Error::InvalidScalar { location, .. }
            | Error::RecursionLimit { location, .. }
            | Error::Budget { location, .. }
            | Error::MultipleDocuments { location } => location,
        };
        location.is_known().then_some(*location)
    }

    /// Path of the failing node within the document (`$.a.b[0]`), if known.
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::UnknownTag { path, .. }
            | Error::AmbiguousArguments { path, .. }
            | Error::InvalidArguments { path, .. }
            | Error::Construction { path, .. }
            | Error::UndefinedAlias { path, .. }
            | Error::CyclicReference { path, .. }
            | Error::DuplicateKey { path, .. }
            | Error::InvalidScalar { path, .. }
            | Error::RecursionLimit { path, .. } => (!path.is_empty()).then_some(path.as_str()),
            _ => None,
        }
    }

    /// The tag whose constructor failed or could not be found, if this error is about a tag.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Error::UnknownTag { tag, .. }
            | Error::AmbiguousArguments { tag, .. }
            | Error::InvalidArguments { tag, .. }
            | Error::Construction { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Map a `saphyr_parser::ScanError` into our error type with location.
    ///
    /// The parser rejects aliases to anchors it has not seen yet; those are reported
    /// as [`Error::UndefinedAlias`], with the alias name recovered from `input`.
    pub(crate) fn from_scan_error(err: ScanError, input: &str) -> Self {
        let mark = err.marker();
        let location = location_from_marker(mark);
        if err.info().contains("unknown anchor") {
            let name = mark
                .byte_offset()
                .and_then(|offset| input.get(offset..))
                .map(crate::compose::alias_name_at)
                .unwrap_or_default();
            return Error::UndefinedAlias {
                name,
                location,
                path: String::new(),
            };
        }
        Error::Message {
            msg: err.info().to_owned(),
            location,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Message { msg, location } => fmt_with_context(f, msg, location, ""),
            Error::UnknownTag { tag, location, path } => fmt_with_context(
                f,
                &format!("no constructor registered for tag `{tag}`"),
                location,
                path,
            ),
            Error::AmbiguousArguments {
                tag,
                keys,
                location,
                path,
            } => fmt_with_context(
                f,
                &format!(
                    "ambiguous arguments for `{tag}`: `args`/`kwargs` mixed with other keys ({})",
                    keys.join(", ")
                ),
                location,
                path,
            ),
            Error::InvalidArguments {
                tag,
                msg,
                location,
                path,
            } => fmt_with_context(f, &format!("invalid arguments for `{tag}`: {msg}"), location, path),
            Error::Construction {
                tag,
                cause,
                location,
                path,
            } => fmt_with_context(f, &format!("constructor for `{tag}` failed: {cause}"), location, path),
            Error::UndefinedAlias { name, location, path } => fmt_with_context(
                f,
                &format!("alias `*{name}` references an undefined anchor"),
                location,
                path,
            ),
            Error::CyclicReference { name, location, path } => fmt_with_context(
                f,
                &format!("alias `*{name}` refers to its own enclosing anchor"),
                location,
                path,
            ),
            Error::DuplicateKey { key, location, path } => {
                fmt_with_context(f, &format!("duplicate mapping key: {key}"), location, path)
            }
            Error::InvalidScalar {
                value,
                expected,
                location,
                path,
            } => fmt_with_context(f, &format!("invalid {expected}: `{value}`"), location, path),
            Error::RecursionLimit { depth, location, path } => fmt_with_context(
                f,
                &format!("nesting depth limit of {depth} exceeded"),
                location,
                path,
            ),
            Error::Budget { breach, location } => {
                fmt_with_context(f, &format!("YAML budget breached: {breach:?}"), location, "")
            }
            Error::MultipleDocuments { location } => fmt_with_context(
                f,
                "expected a single YAML document, found more",
                location,
                "",
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Construction { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

/// Print a message optionally suffixed with the node path and "at line X, column Y".
fn fmt_with_context(f: &mut fmt::Formatter<'_>, msg: &str, location: &Location, path: &str) -> fmt::Result {
    write!(f, "{msg}")?;
    if !path.is_empty() {
        write!(f, " (at {path})")?;
    }
    if location.is_known() {
        write!(f, " at line {}, column {}", location.line, location.column)?;
    }
    Ok(())
}

/// Convert a budget breach report into a user-facing error.
pub(crate) fn budget_error(breach: BudgetBreach) -> Error {
    Error::Budget {
        breach,
        location: Location::UNKNOWN,
    }
}
