use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::budget::{Budget, BudgetReport};
use crate::parse_scalars::ScalarRules;

/// Duplicate key handling policy for mappings.
///
/// Keys are compared after materialization, so `1` and `!!int "1"` collide while
/// `1` and `"1"` do not.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateKeyPolicy {
    /// Error out on encountering a duplicate key.
    #[default]
    Error,
    /// First key wins: later duplicate pairs are skipped.
    FirstWins,
    /// Last key wins: a later pair replaces the value but keeps the original position.
    LastWins,
}

/// What to do with a tag that has no registered constructor.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownTagPolicy {
    /// Fail the load with [`crate::Error::UnknownTag`].
    #[default]
    Error,
    /// Keep the data: the node becomes a one-entry mapping `{tag: body}`.
    Wrap,
    /// Replace the node with `null`.
    Null,
}

pub type BudgetReportCallback = Rc<RefCell<dyn FnMut(BudgetReport) + 'static>>;

/// Loader configuration.
///
/// ```rust
/// use tagforge::{DuplicateKeyPolicy, Loader, Registry, Value};
///
/// let options = tagforge::options! {
///     duplicate_keys: DuplicateKeyPolicy::LastWins,
/// };
/// let loader = Loader::with_options(Registry::new(), options);
/// let doc = loader.load("{a: 1, a: 2}").unwrap();
/// assert_eq!(doc.get("a"), Some(Value::Int(2)));
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct Options {
    /// Optional YAML budget enforced while composing (counts raw parser events).
    pub budget: Option<Budget>,
    /// Invoked with the final budget report, both on success and when the budget was breached.
    #[serde(skip)]
    pub budget_report: Option<BudgetReportCallback>,
    /// Policy for duplicate keys.
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Policy for tags no constructor is registered for.
    pub unknown_tags: UnknownTagPolicy,
    /// Honor the YAML merge key `<<`. Default: true.
    pub merge_keys: bool,
    /// Treat integers with a leading `0` as octal (YAML 1.1). Default: false.
    pub legacy_octal_numbers: bool,
    /// Accept YAML 1.1 booleans (`yes`, `no`, `on`, `off`, ...) in untagged plain scalars.
    /// Default: false, only `true` and `false` are booleans.
    pub yaml11_booleans: bool,
    /// Maximum nesting depth of the materializer, counting tagged nodes and
    /// alias hops. Default: 512.
    pub max_depth: usize,
}

impl Options {
    /// Registers a budget-report callback. Any closure can be used, including ones that
    /// capture state from the surrounding scope.
    ///
    /// ```rust
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    ///
    /// use tagforge::{BudgetReport, Loader, Options, Registry};
    ///
    /// let nodes = Rc::new(Cell::new(0));
    /// let seen = nodes.clone();
    /// let options = Options::default().with_budget_report(move |report: BudgetReport| {
    ///     seen.set(report.nodes);
    /// });
    /// Loader::with_options(Registry::new(), options).load("[1, 2]").unwrap();
    /// assert_eq!(nodes.get(), 3);
    /// ```
    pub fn with_budget_report<F>(mut self, cb: F) -> Self
    where
        F: FnMut(BudgetReport) + 'static,
    {
        self.budget_report = Some(Rc::new(RefCell::new(cb)));
        self
    }

    pub(crate) fn scalar_rules(&self) -> ScalarRules {
        ScalarRules {
            legacy_octal: self.legacy_octal_numbers,
            yaml11_booleans: self.yaml11_booleans,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            budget: Some(Budget::default()),
            budget_report: None,
            duplicate_keys: DuplicateKeyPolicy::Error,
            unknown_tags: UnknownTagPolicy::Error,
            merge_keys: true,
            legacy_octal_numbers: false,
            yaml11_booleans: false,
            max_depth: 512,
        }
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("budget", &self.budget)
            .field("budget_report", &if self.budget_report.is_some() { "set" } else { "none" })
            .field("duplicate_keys", &self.duplicate_keys)
            .field("unknown_tags", &self.unknown_tags)
            .field("merge_keys", &self.merge_keys)
            .field("legacy_octal_numbers", &self.legacy_octal_numbers)
            .field("yaml11_booleans", &self.yaml11_booleans)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
