//! Streaming YAML budget checker.
//!
//! The composer feeds every raw parser event through a [`BudgetEnforcer`] before
//! building nodes from it, so pathological inputs are rejected before any
//! constructor runs.

use std::collections::HashSet;

use saphyr_parser::Event;
use serde::{Deserialize, Serialize};

/// Budgets for composing one YAML stream.
///
/// The defaults are permissive for typical configuration files while stopping
/// obvious resource-amplifying inputs.
///
/// ```rust
/// let options = tagforge::options! {
///     budget: Some(tagforge::budget! {
///         max_depth: 64,
///     }),
/// };
/// let loader = tagforge::Loader::with_options(tagforge::Registry::new(), options);
/// assert!(loader.load("[[[[1]]]]").is_ok());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum total parser events (counting every event).
    ///
    /// Default: 1,000,000
    pub max_events: usize,
    /// Maximum number of alias (`*ref`) events allowed.
    ///
    /// Default: 50,000
    pub max_aliases: usize,
    /// Maximal total number of anchors (distinct `&anchor` definitions).
    ///
    /// Default: 50,000
    pub max_anchors: usize,
    /// Maximum structural nesting depth (sequences + mappings).
    ///
    /// Default: 2,000
    pub max_depth: usize,
    /// Maximum number of YAML documents in the stream.
    ///
    /// Default: 1,024
    pub max_documents: usize,
    /// Maximum number of nodes (SequenceStart/MappingStart/Scalar).
    ///
    /// Default: 250,000
    pub max_nodes: usize,
    /// Maximum total bytes of scalar contents.
    ///
    /// Default: 67,108,864 (64 MiB)
    pub max_total_scalar_bytes: usize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_events: 1_000_000,
            max_aliases: 50_000,
            max_anchors: 50_000,
            max_depth: 2_000,
            max_documents: 1_024,
            max_nodes: 250_000,
            max_total_scalar_bytes: 64 * 1024 * 1024,
        }
    }
}

/// What tripped the budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BudgetBreach {
    /// The total number of parser events exceeded [`Budget::max_events`].
    Events { events: usize },
    /// The number of alias events exceeded [`Budget::max_aliases`].
    Aliases { aliases: usize },
    /// The number of distinct anchors exceeded [`Budget::max_anchors`].
    Anchors { anchors: usize },
    /// The structural nesting depth exceeded [`Budget::max_depth`].
    Depth { depth: usize },
    /// The number of YAML documents exceeded [`Budget::max_documents`].
    Documents { documents: usize },
    /// The number of nodes exceeded [`Budget::max_nodes`].
    Nodes { nodes: usize },
    /// The cumulative size of scalar contents exceeded [`Budget::max_total_scalar_bytes`].
    ScalarBytes { total_scalar_bytes: usize },
    /// A closing event was encountered without a matching opening event.
    Unbalanced,
}

/// Counters collected so far.
#[derive(Clone, Debug, Default)]
pub struct BudgetReport {
    pub events: usize,
    pub aliases: usize,
    pub anchors: usize,
    pub documents: usize,
    pub nodes: usize,
    pub max_depth: usize,
    pub total_scalar_bytes: usize,
}

/// Stateful helper that enforces a [`Budget`] while consuming a stream of [`Event`]s.
#[derive(Debug)]
pub(crate) struct BudgetEnforcer {
    budget: Budget,
    report: BudgetReport,
    depth: usize,
    defined_anchors: HashSet<usize>,
}

impl BudgetEnforcer {
    pub(crate) fn new(budget: Budget) -> Self {
        Self {
            budget,
            report: BudgetReport::default(),
            depth: 0,
            defined_anchors: HashSet::with_capacity(64),
        }
    }

    /// Observe a parser [`Event`], updating the internal counters.
    ///
    /// Returns `Err(BudgetBreach)` as soon as a limit is exceeded.
    pub(crate) fn observe(&mut self, ev: &Event) -> Result<(), BudgetBreach> {
        self.report.events += 1;
        if self.report.events > self.budget.max_events {
            return Err(BudgetBreach::Events {
                events: self.report.events,
            });
        }

        match ev {
            Event::StreamStart | Event::StreamEnd | Event::DocumentEnd | Event::Nothing => {}
            Event::DocumentStart(_explicit) => {
                self.report.documents += 1;
                if self.report.documents > self.budget.max_documents {
                    return Err(BudgetBreach::Documents {
                        documents: self.report.documents,
                    });
                }
            }
            Event::Alias(_anchor_id) => {
                self.report.aliases += 1;
                if self.report.aliases > self.budget.max_aliases {
                    return Err(BudgetBreach::Aliases {
                        aliases: self.report.aliases,
                    });
                }
            }
            Event::Scalar(value, _style, anchor_id, _tag) => {
                self.bump_nodes()?;
                self.report.total_scalar_bytes = self.report.total_scalar_bytes.saturating_add(value.len());
                if self.report.total_scalar_bytes > self.budget.max_total_scalar_bytes {
                    return Err(BudgetBreach::ScalarBytes {
                        total_scalar_bytes: self.report.total_scalar_bytes,
                    });
                }
                self.record_anchor(*anchor_id)?;
            }
            Event::SequenceStart(anchor_id, _tag) | Event::MappingStart(anchor_id, _tag) => {
                self.bump_nodes()?;
                self.depth = self.depth.saturating_add(1);
                self.report.max_depth = self.report.max_depth.max(self.depth);
                if self.report.max_depth > self.budget.max_depth {
                    return Err(BudgetBreach::Depth {
                        depth: self.report.max_depth,
                    });
                }
                self.record_anchor(*anchor_id)?;
            }
            Event::SequenceEnd | Event::MappingEnd => {
                self.depth = self.depth.checked_sub(1).ok_or(BudgetBreach::Unbalanced)?;
            }
        }

        Ok(())
    }

    fn bump_nodes(&mut self) -> Result<(), BudgetBreach> {
        self.report.nodes += 1;
        if self.report.nodes > self.budget.max_nodes {
            return Err(BudgetBreach::Nodes {
                nodes: self.report.nodes,
            });
        }
        Ok(())
    }

    fn record_anchor(&mut self, anchor_id: usize) -> Result<(), BudgetBreach> {
        if anchor_id != 0 && self.defined_anchors.insert(anchor_id) {
            let count = self.defined_anchors.len();
            if count > self.budget.max_anchors {
                self.report.anchors = count;
                return Err(BudgetBreach::Anchors { anchors: count });
            }
        }
        self.report.anchors = self.defined_anchors.len();
        Ok(())
    }

    pub(crate) fn report(&self) -> &BudgetReport {
        &self.report
    }
}
