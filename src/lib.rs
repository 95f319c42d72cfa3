//! Builds object graphs from tagged YAML.
//!
//! Tags name constructors in a [`Registry`]. Loading composes the YAML text into a
//! [`Node`] tree and materializes it depth-first: plain data becomes [`Value`]s, a
//! tagged node has its body built first and then handed to its constructor, and an
//! alias yields the same instance its anchor produced.
//!
//! ```rust
//! use tagforge::{Args, Constructor, Loader, Registry, Value};
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     "!Sum",
//!     Constructor::new(|args: Args| {
//!         let total: i64 = args.positional.iter().filter_map(Value::as_i64).sum();
//!         Ok(Value::Int(total))
//!     }),
//! );
//! let value = Loader::new(registry).load("total: !Sum [1, 2, 3]").unwrap();
//! assert_eq!(value.get("total"), Some(Value::Int(6)));
//! ```
pub use args::{resolve_args, ArgError, Args, FromValue};
pub use budget::{Budget, BudgetBreach, BudgetReport};
pub use compose::{compose_all, compose_str};
pub use error::{BoxError, Error};
pub use loader::Loader;
pub use location::Location;
pub use materialize::Materializer;
pub use node::{Node, NodeKind, Scalar, ScalarStyle};
pub use options::{BudgetReportCallback, DuplicateKeyPolicy, Options, UnknownTagPolicy};
pub use registry::{
    Construct, Constructor, CustomFn, DefaultFn, FromNode, Member, Namespace, Overwrite, Registry, DEFAULT_SEPARATOR,
};
pub use tags::{default_tag_name, normalize_tag};
pub use value::{Mapping, Object, Shared, Value};

mod args;
mod base64;
pub mod budget;
mod builtins;
mod compose;
mod dispatch;
mod error;
mod loader;
mod location;
mod macros;
mod materialize;
mod node;
mod options;
mod parse_scalars;
mod path;
mod registry;
pub mod tags;
mod value;
