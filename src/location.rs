//! Source location utilities.

use std::fmt;

use saphyr_parser::{Marker, Span as ParserSpan};

/// Row/column location within the source YAML document (1-indexed, character-based).
///
/// Every [`crate::Node`] produced by the composer carries one, and every
/// node-related [`crate::Error`] reports the location of the node that failed.
/// Nodes built by hand use [`Location::UNKNOWN`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Location {
    /// 1-indexed row number in the input stream.
    pub(crate) line: u32,
    /// 1-indexed column number in the input stream.
    pub(crate) column: u32,
}

impl Location {
    /// Sentinel value meaning "location unknown".
    pub const UNKNOWN: Self = Self { line: 0, column: 0 };

    /// Create a new location record.
    ///
    /// Arguments:
    /// - `line`: 1-indexed line.
    /// - `column`: 1-indexed column.
    pub const fn new(line: usize, column: usize) -> Self {
        // Error reporting only; documents with more than 4G lines are not a concern.
        Self {
            line: line as u32,
            column: column as u32,
        }
    }

    /// serde_yaml-compatible line information.
    #[inline]
    pub fn line(&self) -> u64 {
        self.line as u64
    }

    /// serde_yaml-compatible column information.
    #[inline]
    pub fn column(&self) -> u64 {
        self.column as u64
    }

    #[inline]
    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Convert a `saphyr_parser::Span` to a 1-indexed [`Location`].
///
/// Called by:
/// - The composer for each raw parser event.
pub(crate) fn location_from_span(span: &ParserSpan) -> Location {
    location_from_marker(&span.start)
}

/// Convert a single parser marker (as carried by scan errors) to a [`Location`].
pub(crate) fn location_from_marker(marker: &Marker) -> Location {
    Location::new(marker.line(), marker.col() + 1)
}
