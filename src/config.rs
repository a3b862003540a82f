//! Configuration for duplicate row filtering.
//!
//! [`DedupConfig`] is a plain, immutable data value handed to
//! [`DuplicateRowFilter::new`](crate::DuplicateRowFilter::new). It is serde-serializable
//! so a surrounding tool can persist it as JSON.
//!
//! # Example
//!
//! ```
//! use rowdedup::config::{DedupConfig, TieBreak};
//!
//! let cfg = DedupConfig {
//!     tie_break: TieBreak::Maximum("updated_at".into()),
//!     retain_order: true,
//!     ..DedupConfig::new(["customer_id", "email"])
//! };
//! assert!(cfg.validate().is_ok());
//! ```

use crate::error::{DedupError, Result};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default name of the classification label column.
pub const DEFAULT_CLASSIFICATION_COLUMN: &str = "duplicate-type-classifier";
/// Default name of the reference row identifier column.
pub const DEFAULT_REFERENCE_COLUMN: &str = "duplicate-row-identifier";
/// Default number of records sorted in memory before a run is spilled.
pub const DEFAULT_ROWS_PER_RUN: usize = 100_000;

/// Which member of a duplicate group becomes the representative.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TieBreak {
    /// First row in input order. Also covers "no preference".
    #[default]
    First,
    /// Last row in input order.
    Last,
    /// First row holding the minimum of the named column.
    Minimum(String),
    /// First row holding the maximum of the named column.
    Maximum(String),
}

impl TieBreak {
    /// Reference column consulted by this policy, if any.
    #[must_use]
    pub fn reference_column(&self) -> Option<&str> {
        match self {
            Self::Minimum(c) | Self::Maximum(c) => Some(c),
            Self::First | Self::Last => None,
        }
    }

    #[must_use]
    pub const fn is_last(&self) -> bool {
        matches!(self, Self::Last)
    }
}

/// Full configuration of one duplicate filtering run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Columns whose values identify a group (1..N, ordered, no repeats).
    pub group_columns: Vec<String>,
    /// Drop non-representative rows instead of annotating all rows.
    pub remove_duplicates: bool,
    pub tie_break: TieBreak,
    pub add_classification_column: bool,
    pub classification_column_name: String,
    pub add_reference_column: bool,
    pub reference_column_name: String,
    /// Restore the original row order in the output.
    pub retain_order: bool,
    /// Sort fully in memory; otherwise runs of `rows_per_run` records spill to disk.
    pub in_memory_sort: bool,
    /// Sort missing key cells last instead of failing on them.
    pub skip_missing_in_sort_keys: bool,
    pub rows_per_run: usize,
    /// Directory for spill files; the system temp directory when unset.
    pub spill_dir: Option<PathBuf>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            group_columns: Vec::new(),
            remove_duplicates: true,
            tie_break: TieBreak::First,
            add_classification_column: true,
            classification_column_name: DEFAULT_CLASSIFICATION_COLUMN.to_string(),
            add_reference_column: false,
            reference_column_name: DEFAULT_REFERENCE_COLUMN.to_string(),
            retain_order: true,
            in_memory_sort: false,
            skip_missing_in_sort_keys: false,
            rows_per_run: DEFAULT_ROWS_PER_RUN,
            spill_dir: None,
        }
    }
}

impl DedupConfig {
    /// Default configuration grouping on `columns`.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON. Absent fields take their defaults.
    ///
    /// # Errors
    /// Returns [`DedupError::Configuration`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DedupError::config(format!("parse config: {e}")))
    }

    /// # Errors
    /// Returns [`DedupError::Configuration`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DedupError::config(format!("serialize config: {e}")))
    }

    /// Annotation output enabled: rows are kept and labelled.
    #[must_use]
    pub const fn annotates(&self) -> bool {
        !self.remove_duplicates
    }

    /// The synthetic order column is needed to restore order or to sort for LAST.
    #[must_use]
    pub const fn needs_order_tag(&self) -> bool {
        self.retain_order || self.tie_break.is_last()
    }

    /// Schema-independent checks.
    ///
    /// # Errors
    /// Returns [`DedupError::Configuration`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.group_columns.is_empty() {
            return Err(DedupError::config("no group columns selected"));
        }
        for (i, c) in self.group_columns.iter().enumerate() {
            if self.group_columns[..i].contains(c) {
                return Err(DedupError::config(format!("group column '{c}' selected twice")));
            }
        }
        if let Some(reference) = self.tie_break.reference_column() {
            if reference.is_empty() {
                return Err(DedupError::config(
                    "tie-break policy requires a reference column",
                ));
            }
            if self.group_columns.iter().any(|c| c == reference) {
                return Err(DedupError::config(format!(
                    "reference column '{reference}' is also a group column"
                )));
            }
        }
        if self.annotates() {
            if !self.add_classification_column && !self.add_reference_column {
                return Err(DedupError::config(
                    "keeping duplicates requires a classification or reference column",
                ));
            }
            if self.add_classification_column && self.classification_column_name.is_empty() {
                return Err(DedupError::config("classification column name is empty"));
            }
            if self.add_reference_column && self.reference_column_name.is_empty() {
                return Err(DedupError::config("reference column name is empty"));
            }
            if self.add_classification_column
                && self.add_reference_column
                && self.classification_column_name == self.reference_column_name
            {
                return Err(DedupError::config(
                    "classification and reference columns must have different names",
                ));
            }
        }
        if !self.in_memory_sort && self.rows_per_run == 0 {
            return Err(DedupError::config("rows per run must be positive"));
        }
        Ok(())
    }

    /// Checks against the input schema; returns the resolved column indices.
    ///
    /// # Errors
    /// Returns [`DedupError::Configuration`] if a named column is absent.
    pub(crate) fn resolve(&self, schema: &Schema) -> Result<ResolvedColumns> {
        let group = self
            .group_columns
            .iter()
            .map(|c| schema.require(c))
            .collect::<Result<Vec<_>>>()?;
        let reference = self
            .tie_break
            .reference_column()
            .map(|c| schema.require(c))
            .transpose()?;
        Ok(ResolvedColumns { group, reference })
    }
}

/// Column indices of the group and tie-break columns in the input schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedColumns {
    pub group: Vec<usize>,
    pub reference: Option<usize>,
}
