//! Tracks where in the document the materializer currently is, for error messages.

use smallvec::SmallVec;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum PathSegment {
    /// Mapping key, rendered from its scalar text.
    Key(String),
    /// Sequence index.
    Index(usize),
    /// Body of a tagged node (`<!Foo>`), so failures inside arguments name their constructor.
    Tag(String),
}

/// Stack of segments from the document root to the node being materialized.
#[derive(Clone, Debug, Default)]
pub(crate) struct PathStack {
    segments: SmallVec<[PathSegment; 16]>,
}

impl PathStack {
    pub(crate) fn push(&mut self, seg: PathSegment) {
        self.segments.push(seg);
    }

    pub(crate) fn pop(&mut self) {
        self.segments.pop();
    }

    /// Render as `$.key[0]<!Tag>.field`; the root alone is `$`.
    pub(crate) fn render(&self) -> String {
        let mut out = String::from("$");
        for seg in &self.segments {
            match seg {
                PathSegment::Key(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                PathSegment::Index(idx) => {
                    out.push('[');
                    out.push_str(&idx.to_string());
                    out.push(']');
                }
                PathSegment::Tag(tag) => {
                    out.push('<');
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_mixed_segments() {
        let mut path = PathStack::default();
        assert_eq!(path.render(), "$");
        path.push(PathSegment::Key("trainer".into()));
        path.push(PathSegment::Tag("!Adam".into()));
        path.push(PathSegment::Key("betas".into()));
        path.push(PathSegment::Index(1));
        assert_eq!(path.render(), "$.trainer<!Adam>.betas[1]");
        path.pop();
        assert_eq!(path.render(), "$.trainer<!Adam>.betas");
    }
}
