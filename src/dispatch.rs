//! Constructor dispatch for tagged nodes.

use tracing::trace;

use crate::args::resolve_args;
use crate::error::{BoxError, Error};
use crate::materialize::Materializer;
use crate::node::Node;
use crate::options::UnknownTagPolicy;
use crate::path::PathSegment;
use crate::registry::Constructor;
use crate::value::{Mapping, Value};

/// Build the value of the tagged node `tag body`.
///
/// A custom hook gets the raw `body` and its result is returned as is. A default
/// constructor gets the materialized body shaped into arguments. While either runs,
/// the path carries a `<tag>` segment so failures inside the body name the constructor.
pub(crate) fn construct(m: &mut Materializer<'_>, tag: &str, body: &Node) -> Result<Value, Error> {
    let registry = m.registry();
    let Some((ctor, resolution)) = registry.lookup(tag) else {
        return unknown_tag(m, tag, body);
    };
    trace!(tag = %tag, prefix = resolution.prefix(), custom = ctor.is_custom(), "constructing tagged node");

    match ctor {
        Constructor::Custom(hook) => {
            m.enter(PathSegment::Tag(tag.to_owned()));
            let result = hook(body, m);
            m.leave();
            result.map_err(|cause| into_error(tag, cause))
        }
        Constructor::Default(f) => {
            let body = m.child(PathSegment::Tag(tag.to_owned()), body)?;
            let args = resolve_args(tag, body)?;
            f(args).map_err(|cause| into_error(tag, cause))
        }
    }
}

/// Errors of this crate that bubble out of user code (a hook materializing a nested
/// node with an unknown tag, say) pass through unchanged; anything else is a
/// construction failure of `tag`.
fn into_error(tag: &str, cause: BoxError) -> Error {
    match cause.downcast::<Error>() {
        Ok(err) => *err,
        Err(cause) => Error::construction(tag, cause),
    }
}

fn unknown_tag(m: &mut Materializer<'_>, tag: &str, body: &Node) -> Result<Value, Error> {
    let policy = m.options().unknown_tags;
    if policy == UnknownTagPolicy::Error {
        return Err(Error::unknown_tag(tag));
    }
    trace!(tag = %tag, policy = ?policy, "no constructor for tag");
    // The body is built in every case so that anchors inside it are defined.
    let body = m.child(PathSegment::Tag(tag.to_owned()), body)?;
    match policy {
        UnknownTagPolicy::Wrap => {
            let mut wrapped = Mapping::new();
            wrapped.push_unique(Value::from(tag), body);
            Ok(Value::map(wrapped))
        }
        _ => Ok(Value::Null),
    }
}
