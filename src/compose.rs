//! Composer: builds [`Node`] trees from the YAML event stream of `saphyr_parser::Parser`.
//!
//! Responsibilities
//! - Enforce the [`Budget`] on every raw parser event before any node is built.
//! - Turn scalars, sequences and mappings into nodes, wrapping them in `Tagged` and
//!   `Anchor` nodes when the event carries a tag or an anchor.
//! - Track source locations for diagnostics.
//! - Split the stream into documents.
//!
//! Anchors and aliases
//! - The parser identifies anchors by numeric id and has already checked that every
//!   alias refers to an anchor defined before it.
//! - Alias names are read from the source text at the alias position. Anchors are
//!   composed under a placeholder derived from their id and renamed when the document
//!   ends, using the names the aliases revealed. An anchor that no alias refers to
//!   keeps its placeholder (`&<id>`).
//! - Nothing is expanded here: the materializer resolves aliases to shared values.

use ahash::AHashMap;
use saphyr_parser::{Event, Parser, Span, StrInput};
use tracing::trace;

use crate::budget::{Budget, BudgetEnforcer};
use crate::error::{budget_error, Error};
use crate::location::{location_from_span, Location};
use crate::node::{Node, NodeKind, Scalar};
use crate::options::{BudgetReportCallback, Options};
use crate::tags::{tag_to_string, NON_SPECIFIC_TAG, TAG_STR};

/// Parse a single YAML document into its node tree, without constructing anything.
///
/// Empty input yields the empty scalar. More than one document is
/// [`Error::MultipleDocuments`].
///
/// ```rust
/// let node = tagforge::compose_str("!Foo [1, 2]").unwrap();
/// assert_eq!(node.tag(), Some("!Foo"));
/// ```
pub fn compose_str(input: &str) -> Result<Node, Error> {
    let documents = compose(input, &Options::default(), true)?;
    Ok(documents.into_iter().next().unwrap_or_else(Node::empty))
}

/// Parse every document of a YAML stream into node trees.
pub fn compose_all(input: &str) -> Result<Vec<Node>, Error> {
    compose(input, &Options::default(), false)
}

/// Compose the stream under `options.budget`. With `single`, a second document is an error.
pub(crate) fn compose(input: &str, options: &Options, single: bool) -> Result<Vec<Node>, Error> {
    let mut composer = Composer::new(input, options.budget.clone(), single);
    let result = composer.run();
    if let (Some(cb), Some(budget)) = (&options.budget_report, &composer.budget) {
        report(cb, budget);
    }
    result
}

fn report(cb: &BudgetReportCallback, budget: &BudgetEnforcer) {
    let mut callback = cb.borrow_mut();
    (*callback)(budget.report().clone());
}

/// Name of an alias written at the start of `text` (`*base, ...` yields `base`).
pub(crate) fn alias_name_at(text: &str) -> String {
    text.strip_prefix('*')
        .unwrap_or(text)
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, ',' | '[' | ']' | '{' | '}'))
        .collect()
}

fn placeholder(anchor_id: usize) -> String {
    format!("&{anchor_id}")
}

fn placeholder_id(name: &str) -> Option<usize> {
    name.strip_prefix('&')?.parse().ok()
}

/// Properties of a node whose content is still being read.
struct Props {
    anchor_id: usize,
    tag: Option<String>,
    location: Location,
}

enum Frame {
    Sequence {
        props: Props,
        items: Vec<Node>,
    },
    Mapping {
        props: Props,
        entries: Vec<(Node, Node)>,
        key: Option<Node>,
    },
}

struct Composer<'a> {
    input: &'a str,
    /// Underlying streaming parser that produces raw events from the input.
    parser: Parser<'a, StrInput<'a>>,
    budget: Option<BudgetEnforcer>,
    single: bool,
    /// Open collections, innermost last.
    stack: Vec<Frame>,
    /// Root of the current document, once complete.
    root: Option<Node>,
    /// Anchor id -> name, learned from aliases of the current document.
    names: AHashMap<usize, String>,
    documents: Vec<Node>,
}

impl<'a> Composer<'a> {
    fn new(input: &'a str, budget: Option<Budget>, single: bool) -> Self {
        Composer {
            input,
            parser: Parser::new_from_str(input),
            budget: budget.map(BudgetEnforcer::new),
            single,
            stack: Vec::new(),
            root: None,
            names: AHashMap::new(),
            documents: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<Vec<Node>, Error> {
        while let Some(item) = self.parser.next() {
            let (event, span) = item.map_err(|err| Error::from_scan_error(err, self.input))?;
            let location = location_from_span(&span);

            if let Some(budget) = self.budget.as_mut() {
                budget
                    .observe(&event)
                    .map_err(|breach| budget_error(breach).with_location(location))?;
            }
            self.event(event, &span, location)?;
        }
        trace!(documents = self.documents.len(), "composed YAML stream");
        Ok(std::mem::take(&mut self.documents))
    }

    fn event(&mut self, event: Event<'a>, span: &Span, location: Location) -> Result<(), Error> {
        match event {
            Event::StreamStart | Event::StreamEnd | Event::Nothing => {}
            Event::DocumentStart(_explicit) => {
                if self.single && !self.documents.is_empty() {
                    return Err(Error::MultipleDocuments { location });
                }
                self.stack.clear();
                self.root = None;
                self.names.clear();
            }
            Event::DocumentEnd => {
                let mut root = self.root.take().unwrap_or_else(|| Node::empty().with_location(location));
                rename_anchors(&mut root, &self.names);
                self.documents.push(root);
            }
            Event::Scalar(value, style, anchor_id, tag) => {
                let scalar = Scalar {
                    value: value.into_owned(),
                    style: style.into(),
                };
                let props = Props {
                    anchor_id,
                    tag: tag.map(|t| tag_to_string(&t)),
                    location,
                };
                self.attach(finish(NodeKind::Scalar(scalar), props));
            }
            Event::SequenceStart(anchor_id, tag) => self.stack.push(Frame::Sequence {
                props: Props {
                    anchor_id,
                    tag: tag.map(|t| tag_to_string(&t)),
                    location,
                },
                items: Vec::new(),
            }),
            Event::MappingStart(anchor_id, tag) => self.stack.push(Frame::Mapping {
                props: Props {
                    anchor_id,
                    tag: tag.map(|t| tag_to_string(&t)),
                    location,
                },
                entries: Vec::new(),
                key: None,
            }),
            Event::SequenceEnd | Event::MappingEnd => {
                let node = match self.stack.pop() {
                    Some(Frame::Sequence { props, items }) => finish(NodeKind::Sequence(items), props),
                    Some(Frame::Mapping { props, entries, .. }) => finish(NodeKind::Mapping(entries), props),
                    None => return Err(Error::msg("unbalanced collection end").with_location(location)),
                };
                self.attach(node);
            }
            Event::Alias(anchor_id) => {
                let name = span
                    .start
                    .byte_offset()
                    .and_then(|offset| self.input.get(offset..))
                    .map(alias_name_at)
                    .filter(|name| !name.is_empty());
                let name = match name {
                    Some(name) => {
                        self.names.insert(anchor_id, name.clone());
                        name
                    }
                    None => placeholder(anchor_id),
                };
                self.attach(Node::alias(name).with_location(location));
            }
        }
        Ok(())
    }

    /// Hand a completed node to the innermost open collection, or make it the root.
    fn attach(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping { entries, key, .. }) => match key.take() {
                Some(k) => entries.push((k, node)),
                None => *key = Some(node),
            },
            None => self.root = Some(node),
        }
    }
}

/// Wrap content in its tag, then its anchor: the anchor names the constructed value.
fn finish(kind: NodeKind, props: Props) -> Node {
    // `!` only forbids implicit typing: a scalar is a string, a collection keeps its kind.
    let tag = match props.tag {
        Some(tag) if tag == NON_SPECIFIC_TAG => matches!(kind, NodeKind::Scalar(_)).then(|| TAG_STR.to_owned()),
        other => other,
    };
    let mut node = Node::new(kind).with_location(props.location);
    if let Some(tag) = tag {
        node = Node::tagged(tag, node).with_location(props.location);
    }
    if props.anchor_id != 0 {
        node = Node::anchor(placeholder(props.anchor_id), node).with_location(props.location);
    }
    node
}

fn rename_anchors(root: &mut Node, names: &AHashMap<usize, String>) {
    if names.is_empty() {
        return;
    }
    let mut pending: Vec<&mut Node> = vec![root];
    while let Some(node) = pending.pop() {
        match &mut node.kind {
            NodeKind::Anchor { name, body } => {
                if let Some(real) = placeholder_id(name).and_then(|id| names.get(&id)) {
                    *name = real.clone();
                }
                pending.push(body.as_mut());
            }
            NodeKind::Tagged { body, .. } => pending.push(body.as_mut()),
            NodeKind::Sequence(items) => pending.extend(items.iter_mut()),
            NodeKind::Mapping(entries) => {
                for (key, value) in entries.iter_mut() {
                    pending.push(key);
                    pending.push(value);
                }
            }
            NodeKind::Scalar(_) | NodeKind::Alias { .. } => {}
        }
    }
}
