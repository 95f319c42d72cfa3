use tracing::debug;

use crate::compose::compose;
use crate::error::Error;
use crate::materialize::Materializer;
use crate::node::Node;
use crate::options::Options;
use crate::registry::Registry;
use crate::value::Value;

/// Loads YAML text into values, running registered constructors on tagged nodes.
///
/// Every document is materialized with a fresh anchor table. Aliases within a
/// document yield the same instance as their anchor.
///
/// ```rust
/// use indoc::indoc;
/// use tagforge::{Loader, Registry};
///
/// let yaml = indoc! {"
///     defaults: &defaults [1, 2, 3]
///     copy: *defaults
/// "};
/// let doc = Loader::new(Registry::new()).load(yaml).unwrap();
/// assert!(doc.get("defaults").unwrap().ptr_eq(&doc.get("copy").unwrap()));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Loader {
    registry: Registry,
    options: Options,
}

impl Loader {
    pub fn new(registry: Registry) -> Self {
        Self::with_options(registry, Options::default())
    }

    pub fn with_options(registry: Registry, options: Options) -> Self {
        Loader { registry, options }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registry access for registrations after the loader was created.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Load a single document. Empty input is `null`; a stream with more than one
    /// document is [`Error::MultipleDocuments`].
    pub fn load(&self, input: &str) -> Result<Value, Error> {
        match compose(input, &self.options, true)?.first() {
            Some(document) => self.load_node(document),
            None => Ok(Value::Null),
        }
    }

    /// Load every document of the stream.
    ///
    /// Anchors do not cross document boundaries.
    pub fn load_all(&self, input: &str) -> Result<Vec<Value>, Error> {
        let documents = compose(input, &self.options, false)?;
        let mut values = Vec::with_capacity(documents.len());
        for document in &documents {
            values.push(self.load_node(document)?);
        }
        Ok(values)
    }

    /// Materialize an already composed (or hand-built) node tree.
    ///
    /// Loading the same tree twice gives equal, but not identical, values.
    pub fn load_node(&self, node: &Node) -> Result<Value, Error> {
        let mut materializer = Materializer::new(&self.registry, &self.options);
        let value = materializer.materialize(node)?;
        debug!(kind = value.kind(), "materialized document");
        Ok(value)
    }
}
