//! Tag registry: exact tags and tag prefixes mapped to constructors.
//!
//! A tag is resolved in three steps:
//!
//! 1. exact lookup;
//! 2. otherwise the separator positions of the tag are walked right to left and the
//!    first `tag[..i]` registered as a prefix is taken. That is the longest prefix
//!    ending on a segment boundary, so `!Foo` never matches prefix `!FooBar` and
//!    `!FooBar.x` never matches prefix `!Foo`. The remainder `tag[i + 1..]` is looked
//!    up as a path inside the prefix's [`Namespace`];
//! 3. nothing found: [`Error::UnknownTag`].
//!
//! Registering a tag that already has a constructor replaces it. This is how callers
//! override built-ins or earlier registrations; the previous entry is returned and the
//! override is logged at warn level. So is an exact tag that is also a registered prefix.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::args::Args;
use crate::error::{BoxError, Error};
use crate::materialize::Materializer;
use crate::node::Node;
use crate::tags::{default_tag_name, normalize_tag};
use crate::value::Value;

/// Default path separator for prefix tags: `!np.eye`.
pub const DEFAULT_SEPARATOR: char = '.';

/// Signature of a default constructor: receives the shaped call arguments.
pub type DefaultFn = dyn Fn(Args) -> Result<Value, BoxError> + Send + Sync;

/// Signature of a custom construction hook: receives the raw, not yet materialized
/// body and the materializer, which it may use to build parts of the body itself.
pub type CustomFn = dyn Fn(&Node, &mut Materializer<'_>) -> Result<Value, BoxError> + Send + Sync;

/// A callable registered for a tag.
///
/// The variant is the construction capability and is fixed when the constructor is
/// created. The dispatcher never probes a target to decide how to call it.
#[derive(Clone)]
pub enum Constructor {
    /// The body is materialized and shaped into [`Args`] first.
    Default(Arc<DefaultFn>),
    /// The hook receives the raw body node and builds the value on its own.
    Custom(Arc<CustomFn>),
}

impl Constructor {
    /// Default constructor from a closure over [`Args`].
    ///
    /// ```rust
    /// use tagforge::{Constructor, Loader, Registry, Value};
    ///
    /// let mut registry = Registry::new();
    /// registry.register("!Sum", Constructor::new(|args| {
    ///     let mut total = 0;
    ///     for value in &args.positional {
    ///         total += value.as_i64().ok_or("!Sum takes integers")?;
    ///     }
    ///     Ok(Value::Int(total))
    /// }));
    /// let doc = Loader::new(registry).load("!Sum [1, 2, 3]").unwrap();
    /// assert_eq!(doc, Value::Int(6));
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Args) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Constructor::Default(Arc::new(f))
    }

    /// Custom hook from a closure over the raw node.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Node, &mut Materializer<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Constructor::Custom(Arc::new(f))
    }

    /// Default constructor for a type implementing [`Construct`]. The result is
    /// wrapped as [`Value::Object`].
    pub fn of<T: Construct>() -> Self {
        Constructor::new(|args| T::construct(args).map(Value::object))
    }

    /// Custom hook for a type implementing [`FromNode`].
    pub fn of_node<T: FromNode>() -> Self {
        Constructor::custom(|node, materializer| T::from_node(node, materializer).map(Value::object))
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Constructor::Custom(_))
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constructor::Default(_) => f.write_str("Constructor::Default"),
            Constructor::Custom(_) => f.write_str("Constructor::Custom"),
        }
    }
}

/// A type built from shaped call arguments.
///
/// ```rust
/// use tagforge::{Args, BoxError, Construct, Constructor, Loader, Registry};
///
/// #[derive(Debug, PartialEq)]
/// struct Adam {
///     lr: f64,
///     betas: Vec<f64>,
/// }
///
/// impl Construct for Adam {
///     fn construct(mut args: Args) -> Result<Self, BoxError> {
///         let lr = args.param(0, "lr")?;
///         let betas = args.take("betas")?.unwrap_or_else(|| vec![0.9, 0.999]);
///         args.deny_unknown()?;
///         Ok(Adam { lr, betas })
///     }
/// }
///
/// let mut registry = Registry::new();
/// registry.register("!Adam", Constructor::of::<Adam>());
/// let doc = Loader::new(registry).load("!Adam {lr: 0.01}").unwrap();
/// assert_eq!(doc.downcast::<Adam>().unwrap().betas, [0.9, 0.999]);
/// ```
pub trait Construct: Any + fmt::Debug + PartialEq + Sized {
    fn construct(args: Args) -> Result<Self, BoxError>;
}

/// A type with its own construction hook: it reads the raw body node.
///
/// ```rust
/// use tagforge::{BoxError, Constructor, FromNode, Loader, Materializer, Node, Registry};
///
/// #[derive(Debug, PartialEq)]
/// struct Dice {
///     count: u32,
///     sides: u32,
/// }
///
/// impl FromNode for Dice {
///     fn from_node(node: &Node, _: &mut Materializer<'_>) -> Result<Self, BoxError> {
///         let text = node.as_str().ok_or("!Dice expects a scalar like 3d6")?;
///         let (count, sides) = text.split_once('d').ok_or("missing `d`")?;
///         Ok(Dice { count: count.parse()?, sides: sides.parse()? })
///     }
/// }
///
/// let mut registry = Registry::new();
/// registry.register("!Dice", Constructor::of_node::<Dice>());
/// let doc = Loader::new(registry).load("!Dice 10d6").unwrap();
/// assert_eq!(*doc.downcast::<Dice>().unwrap(), Dice { count: 10, sides: 6 });
/// ```
pub trait FromNode: Any + fmt::Debug + PartialEq + Sized {
    fn from_node(node: &Node, materializer: &mut Materializer<'_>) -> Result<Self, BoxError>;
}

/// Entry of a [`Namespace`].
#[derive(Clone, Debug)]
pub enum Member {
    Constructor(Constructor),
    Namespace(Namespace),
}

impl From<Constructor> for Member {
    fn from(ctor: Constructor) -> Self {
        Member::Constructor(ctor)
    }
}

impl From<Namespace> for Member {
    fn from(ns: Namespace) -> Self {
        Member::Namespace(ns)
    }
}

/// Named constructors and nested namespaces, the target of a prefix registration.
///
/// Names iterate in sorted order. Names starting with `_` are private: path lookup
/// reaches them, namespace scanning skips them.
#[derive(Clone, Debug, Default)]
pub struct Namespace {
    members: BTreeMap<String, Member>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Namespace::insert`].
    pub fn with(mut self, name: impl Into<String>, ctor: Constructor) -> Self {
        self.insert(name, ctor);
        self
    }

    /// Builder form of [`Namespace::insert_namespace`].
    pub fn with_namespace(mut self, name: impl Into<String>, ns: Namespace) -> Self {
        self.insert_namespace(name, ns);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, ctor: Constructor) -> Option<Member> {
        self.members.insert(name.into(), Member::Constructor(ctor))
    }

    pub fn insert_namespace(&mut self, name: impl Into<String>, ns: Namespace) -> Option<Member> {
        self.members.insert(name.into(), Member::Namespace(ns))
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Resolve a `sep`-separated path (`linalg.inv`) to a constructor.
    pub fn lookup(&self, path: &str, sep: char) -> Option<&Constructor> {
        let mut current = self;
        let mut segments = path.split(sep).peekable();
        while let Some(segment) = segments.next() {
            match (current.members.get(segment)?, segments.peek().is_some()) {
                (Member::Namespace(ns), true) => current = ns,
                (Member::Constructor(ctor), false) => return Some(ctor),
                _ => return None,
            }
        }
        None
    }
}

/// How [`Registry::register_namespace`] treats tags that are already registered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Overwrite {
    /// The existing registration stays; the scanned member is skipped.
    #[default]
    Keep,
    /// The scanned member replaces the existing registration.
    Replace,
}

/// How a tag was matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Resolution<'a> {
    Exact,
    Prefix(&'a str),
}

impl<'a> Resolution<'a> {
    /// The registered prefix the tag was resolved through.
    pub(crate) fn prefix(&self) -> Option<&'a str> {
        match self {
            Resolution::Exact => None,
            Resolution::Prefix(prefix) => Some(*prefix),
        }
    }
}

/// Exact tags and prefixes mapped to constructors.
///
/// `Registry::new()` is the default registry: it holds the built-in constructors for
/// the YAML core tags (`!!int`, `!!omap`, `!!set`, ...). `Registry::empty()` holds
/// nothing. A registry is configured first and then shared read-only by loaders; it is
/// `Clone + Send + Sync`, so independent loads may run on several threads.
///
/// ```rust
/// use tagforge::{Constructor, Namespace, Registry, Value};
///
/// let eye = Constructor::new(|_| Ok(Value::from("eye")));
/// let mut registry = Registry::new();
/// registry.register_prefix("!np", Namespace::new().with("eye", eye));
/// assert!(registry.resolve("!np.eye").is_ok());
/// assert!(registry.resolve("!npx.eye").is_err());
/// ```
#[derive(Clone)]
pub struct Registry {
    exact: AHashMap<String, Constructor>,
    prefixes: AHashMap<String, Namespace>,
    separator: char,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry with the built-in core tag constructors.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        crate::builtins::register_builtins(&mut registry);
        registry
    }

    /// Registry without any constructors.
    pub fn empty() -> Self {
        Registry {
            exact: AHashMap::new(),
            prefixes: AHashMap::new(),
            separator: DEFAULT_SEPARATOR,
        }
    }

    /// Use `sep` instead of `.` between prefix and member names.
    pub fn with_separator(mut self, sep: char) -> Self {
        self.separator = sep;
        self
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Register `ctor` for the exact tag `tag`, returning the constructor it replaces.
    ///
    /// Canonical core schema tags (`tag:yaml.org,2002:str`) are stored in their `!!` form.
    pub fn register(&mut self, tag: impl Into<String>, ctor: Constructor) -> Option<Constructor> {
        let tag = normalize_tag(&tag.into());
        if self.prefixes.contains_key(&tag) {
            warn!(tag = %tag, "exact tag is also a registered prefix");
        }
        let previous = self.exact.insert(tag.clone(), ctor);
        if previous.is_some() {
            warn!(tag = %tag, "replacing registered constructor");
        }
        previous
    }

    /// Register `ctor` under the tag derived from `name` (`"Foo"` becomes `!Foo`).
    pub fn register_named(&mut self, name: &str, ctor: Constructor) -> Option<Constructor> {
        self.register(default_tag_name(name), ctor)
    }

    /// Register `ns` for every tag of the form `prefix + sep + path`.
    ///
    /// Trailing separators of `prefix` are ignored: `!np.` and `!np` are the same prefix.
    pub fn register_prefix(&mut self, prefix: &str, ns: Namespace) -> Option<Namespace> {
        let prefix = prefix.trim_end_matches(self.separator).to_owned();
        if self.exact.contains_key(&prefix) {
            warn!(prefix = %prefix, "prefix is also a registered exact tag");
        }
        let previous = self.prefixes.insert(prefix.clone(), ns);
        if previous.is_some() {
            warn!(prefix = %prefix, "replacing registered namespace");
        }
        previous
    }

    /// Register the public members of `ns` as exact tags `prefix + sep + name`.
    ///
    /// Nested namespaces contribute dotted tags (`!np.linalg.inv`). Members are visited
    /// in sorted name order; a tag that is already registered is kept or replaced
    /// according to `overwrite`. Returns the number of tags registered.
    ///
    /// Names starting with `_` are private and skipped; see
    /// [`Registry::register_namespace_with`] for other selections.
    pub fn register_namespace(&mut self, prefix: &str, ns: &Namespace, overwrite: Overwrite) -> usize {
        self.register_namespace_with(prefix, ns, overwrite, is_public)
    }

    /// [`Registry::register_namespace`] with a caller-chosen member filter.
    ///
    /// `filter` sees every member name and member, nested namespaces included. A
    /// rejected namespace is not descended into.
    ///
    /// ```rust
    /// use tagforge::{Constructor, Member, Namespace, Overwrite, Registry, Value};
    ///
    /// let unit = Constructor::new(|_| Ok(Value::Null));
    /// let ns = Namespace::new()
    ///     .with("Meter", unit.clone())
    ///     .with("helper", unit)
    ///     .with_namespace("Imperial", Namespace::new());
    /// let mut registry = Registry::empty();
    /// let classes = |name: &str, member: &Member| {
    ///     matches!(member, Member::Constructor(_)) && name.starts_with(char::is_uppercase)
    /// };
    /// assert_eq!(registry.register_namespace_with("!units", &ns, Overwrite::Keep, classes), 1);
    /// assert_eq!(registry.tags(), ["!units.Meter"]);
    /// ```
    pub fn register_namespace_with<F>(
        &mut self,
        prefix: &str,
        ns: &Namespace,
        overwrite: Overwrite,
        filter: F,
    ) -> usize
    where
        F: Fn(&str, &Member) -> bool,
    {
        let prefix = prefix.trim_end_matches(self.separator).to_owned();
        self.scan_namespace(&prefix, ns, overwrite, &filter)
    }

    fn scan_namespace(
        &mut self,
        prefix: &str,
        ns: &Namespace,
        overwrite: Overwrite,
        filter: &dyn Fn(&str, &Member) -> bool,
    ) -> usize {
        let mut count = 0;
        for (name, member) in ns.iter() {
            if !filter(name, member) {
                continue;
            }
            let tag = format!("{prefix}{}{name}", self.separator);
            match member {
                Member::Namespace(inner) => count += self.scan_namespace(&tag, inner, overwrite, filter),
                Member::Constructor(ctor) => {
                    if overwrite == Overwrite::Keep && self.exact.contains_key(&tag) {
                        debug!(tag = %tag, "keeping registered constructor, namespace member skipped");
                        continue;
                    }
                    self.register(tag, ctor.clone());
                    count += 1;
                }
            }
        }
        count
    }

    /// Bulk registration from a discovery step: constructors become exact tags,
    /// namespaces become prefixes.
    ///
    /// ```rust
    /// use tagforge::{Constructor, Member, Namespace, Registry, Value};
    ///
    /// let unit = Constructor::new(|_| Ok(Value::Null));
    /// let entries: Vec<(&str, Member)> = vec![
    ///     ("!Unit", unit.clone().into()),
    ///     ("!units", Namespace::new().with("meter", unit).into()),
    /// ];
    /// let mut registry = Registry::empty();
    /// registry.register_all(entries);
    /// assert!(registry.resolve("!Unit").is_ok());
    /// assert!(registry.resolve("!units.meter").is_ok());
    /// ```
    pub fn register_all<K, M, I>(&mut self, entries: I)
    where
        K: Into<String>,
        M: Into<Member>,
        I: IntoIterator<Item = (K, M)>,
    {
        for (tag, member) in entries {
            let tag = tag.into();
            match member.into() {
                Member::Constructor(ctor) => {
                    self.register(tag, ctor);
                }
                Member::Namespace(ns) => {
                    self.register_prefix(&tag, ns);
                }
            }
        }
    }

    /// Constructor for `tag`, or [`Error::UnknownTag`].
    pub fn resolve(&self, tag: &str) -> Result<&Constructor, Error> {
        self.lookup(tag)
            .map(|(ctor, _)| ctor)
            .ok_or_else(|| Error::unknown_tag(tag))
    }

    pub(crate) fn lookup<'s, 't>(&'s self, tag: &'t str) -> Option<(&'s Constructor, Resolution<'t>)> {
        if let Some(ctor) = self.exact.get(tag) {
            return Some((ctor, Resolution::Exact));
        }
        let sep = self.separator;
        let (split, ns) = tag
            .rmatch_indices(sep)
            .find_map(|(i, _)| self.prefixes.get(&tag[..i]).map(|ns| (i, ns)))?;
        let prefix = &tag[..split];
        ns.lookup(&tag[split + sep.len_utf8()..], sep)
            .map(|ctor| (ctor, Resolution::Prefix(prefix)))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.lookup(tag).is_some()
    }

    /// Exact tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.exact.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Registered prefixes, sorted.
    pub fn prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.prefixes.keys().map(String::as_str).collect();
        prefixes.sort_unstable();
        prefixes
    }
}

fn is_public(name: &str, _: &Member) -> bool {
    !name.starts_with('_')
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("tags", &self.tags())
            .field("prefixes", &self.prefixes())
            .field("separator", &self.separator)
            .finish()
    }
}
