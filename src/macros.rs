//! Public macros for constructing option structs without relying on struct literal syntax.
//!
//! Call sites stay valid when the crate adds fields to these structs.

/// Construct [`crate::Options`] from `Default` and a list of field assignments.
///
/// Example:
///
/// ```rust
/// use tagforge::{DuplicateKeyPolicy, UnknownTagPolicy};
///
/// let options = tagforge::options! {
///     duplicate_keys: DuplicateKeyPolicy::LastWins,
///     unknown_tags: UnknownTagPolicy::Wrap,
/// };
/// assert!(options.merge_keys);
/// ```
#[macro_export]
macro_rules! options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::Options::default();
        $(
            opt.$field = $value;
        )*
        opt
    }};
}

/// Construct [`crate::Budget`] from `Default` and a list of field assignments.
///
/// ```rust
/// let budget = tagforge::budget! {
///     max_aliases: 10,
///     max_depth: 32,
/// };
/// assert_eq!(budget.max_anchors, tagforge::Budget::default().max_anchors);
/// ```
#[macro_export]
macro_rules! budget {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut budget = $crate::Budget::default();
        $(
            budget.$field = $value;
        )*
        budget
    }};
}
