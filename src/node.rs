//! The composed document: a tree of scalars, collections, tags, anchors and aliases.
//!
//! Nodes are what the composer produces from YAML text and what custom construction
//! hooks receive. They can also be built by hand, which is how tests and callers
//! that already hold a parsed tree feed the materializer directly.

use crate::location::Location;

/// How a scalar was written. Only plain scalars take part in implicit typing:
/// `42` is an integer, `'42'` is a string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarStyle {
    Plain,
    Quoted,
    /// Literal (`|`) or folded (`>`) block scalar.
    Block,
}

impl From<saphyr_parser::ScalarStyle> for ScalarStyle {
    fn from(style: saphyr_parser::ScalarStyle) -> Self {
        use saphyr_parser::ScalarStyle as S;
        match style {
            S::Plain => ScalarStyle::Plain,
            S::SingleQuoted | S::DoubleQuoted => ScalarStyle::Quoted,
            S::Literal | S::Folded => ScalarStyle::Block,
            #[allow(unreachable_patterns)]
            _ => ScalarStyle::Plain,
        }
    }
}

/// Raw scalar text plus the style it was written in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Scalar {
    pub value: String,
    pub style: ScalarStyle,
}

impl Scalar {
    pub fn is_plain(&self) -> bool {
        self.style == ScalarStyle::Plain
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Scalar(Scalar),
    Sequence(Vec<Node>),
    /// Key/value pairs in document order. Keys may repeat here; uniqueness is
    /// checked after materialization.
    Mapping(Vec<(Node, Node)>),
    Tagged {
        tag: String,
        body: Box<Node>,
    },
    Anchor {
        name: String,
        body: Box<Node>,
    },
    Alias {
        name: String,
    },
}

/// One node of a composed document.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub location: Location,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            location: Location::UNKNOWN,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Plain scalar, typed implicitly (`"42"` becomes an integer).
    pub fn plain(value: impl Into<String>) -> Self {
        Node::new(NodeKind::Scalar(Scalar {
            value: value.into(),
            style: ScalarStyle::Plain,
        }))
    }

    /// Quoted scalar, always a string.
    pub fn quoted(value: impl Into<String>) -> Self {
        Node::new(NodeKind::Scalar(Scalar {
            value: value.into(),
            style: ScalarStyle::Quoted,
        }))
    }

    /// The empty plain scalar: `null`, and "no arguments" as a tagged body.
    pub fn empty() -> Self {
        Node::plain("")
    }

    pub fn sequence(items: impl IntoIterator<Item = Node>) -> Self {
        Node::new(NodeKind::Sequence(items.into_iter().collect()))
    }

    pub fn mapping(entries: impl IntoIterator<Item = (Node, Node)>) -> Self {
        Node::new(NodeKind::Mapping(entries.into_iter().collect()))
    }

    pub fn tagged(tag: impl Into<String>, body: Node) -> Self {
        Node::new(NodeKind::Tagged {
            tag: tag.into(),
            body: Box::new(body),
        })
    }

    pub fn anchor(name: impl Into<String>, body: Node) -> Self {
        Node::new(NodeKind::Anchor {
            name: name.into(),
            body: Box::new(body),
        })
    }

    pub fn alias(name: impl Into<String>) -> Self {
        Node::new(NodeKind::Alias { name: name.into() })
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Raw text of a scalar node, without any typing.
    ///
    /// This is what custom construction hooks usually want for compact
    /// notations such as `!Dice 10d6`.
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().map(|s| s.value.as_str())
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[(Node, Node)]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Tag directly attached to this node (looking through an anchor), if any.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Tagged { tag, .. } => Some(tag),
            NodeKind::Anchor { body, .. } => body.tag(),
            _ => None,
        }
    }

    /// True for the untagged plain scalar `<<`, the YAML merge key.
    pub(crate) fn is_merge_key(&self) -> bool {
        matches!(&self.kind, NodeKind::Scalar(s) if s.is_plain() && s.value == "<<")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_visible_through_anchor() {
        let node = Node::anchor("x", Node::tagged("!Foo", Node::empty()));
        assert_eq!(node.tag(), Some("!Foo"));
        assert_eq!(Node::plain("1").tag(), None);
    }

    #[test]
    fn merge_key_requires_plain_style() {
        assert!(Node::plain("<<").is_merge_key());
        assert!(!Node::quoted("<<").is_merge_key());
    }
}
