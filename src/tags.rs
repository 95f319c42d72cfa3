//! Tag spelling: normalization of parser tags and the core schema tag names.

use saphyr_parser::Tag;

/// Handle the parser expands `!!` into.
pub(crate) const CORE_SCHEMA_HANDLE: &str = "tag:yaml.org,2002:";

/// The non-specific tag `!`: the node is a string or a plain collection.
pub const NON_SPECIFIC_TAG: &str = "!";

pub const TAG_NULL: &str = "!!null";
pub const TAG_BOOL: &str = "!!bool";
pub const TAG_INT: &str = "!!int";
pub const TAG_FLOAT: &str = "!!float";
pub const TAG_STR: &str = "!!str";
pub const TAG_BINARY: &str = "!!binary";
pub const TAG_SEQ: &str = "!!seq";
pub const TAG_MAP: &str = "!!map";
pub const TAG_OMAP: &str = "!!omap";
pub const TAG_SET: &str = "!!set";
pub const TAG_PAIRS: &str = "!!pairs";
pub const TAG_TIMESTAMP: &str = "!!timestamp";

/// Tags of the default constructor set, in registration order.
pub const CORE_TAGS: &[&str] = &[
    TAG_NULL, TAG_BOOL, TAG_INT, TAG_FLOAT, TAG_STR, TAG_BINARY, TAG_SEQ, TAG_MAP, TAG_OMAP, TAG_SET, TAG_PAIRS,
    TAG_TIMESTAMP,
];

/// Render a parser tag the way it is registered.
///
/// - `!Foo` stays `!Foo` (primary handle);
/// - `!!int` and `!<tag:yaml.org,2002:int>` both become `!!int`;
/// - anything else is the handle followed by the suffix.
pub(crate) fn tag_to_string(tag: &Tag) -> String {
    if tag.handle == CORE_SCHEMA_HANDLE {
        format!("!!{}", tag.suffix)
    } else if tag.handle.is_empty() {
        normalize_tag(&tag.suffix)
    } else {
        format!("{}{}", tag.handle, tag.suffix)
    }
}

/// Normalize a tag given as text: canonical core schema URIs become their `!!` shorthand.
pub fn normalize_tag(tag: &str) -> String {
    match tag.strip_prefix(CORE_SCHEMA_HANDLE) {
        Some(suffix) => format!("!!{suffix}"),
        None => tag.to_owned(),
    }
}

/// The tag under which a named callable is registered when no tag is given: `!` + name.
///
/// ```rust
/// assert_eq!(tagforge::default_tag_name("Optimizer"), "!Optimizer");
/// ```
pub fn default_tag_name(name: &str) -> String {
    format!("!{name}")
}
