//! The duplicate row filter: sequencing of tag, sort, classify, and restore.
//!
//! ```text
//! source ─▶ [OrderTagger] ─▶ GroupSorter ─▶ GroupClassifier ─▶ [OrderRestorer] ─▶ sink
//! ```
//!
//! The order tag is added only when input order must be restored, or when the LAST
//! tie-break needs it as a sort key. In the latter case without `retain_order`, the tag
//! is dropped again without a second sort.

use crate::classify::{GroupClassifier, GroupCounts, OutputMode};
use crate::config::DedupConfig;
use crate::error::Result;
use crate::progress::ExecutionContext;
use crate::restore::OrderRestorer;
use crate::schema::{Column, Schema};
use crate::sort::{GroupSorter, MissingPolicy, SortMemory};
use crate::table::{RowIter, Table, TableBuilder, TableSink, TableSource};
use crate::tagger::{OrderTagger, tag_schema};
use crate::value::DataType;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Summary of one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    pub input_rows: u64,
    pub output_rows: u64,
    pub groups: u64,
    pub unique: u64,
    pub chosen: u64,
    pub duplicate: u64,
}

impl DedupReport {
    fn new(counts: GroupCounts, output_rows: u64) -> Self {
        Self {
            input_rows: counts.rows,
            output_rows,
            groups: counts.groups,
            unique: counts.unique,
            chosen: counts.chosen,
            duplicate: counts.duplicate,
        }
    }
}

/// Share of overall progress given to each stage. Sorting dominates.
#[derive(Clone, Copy, Debug, PartialEq)]
struct StageWeights {
    sort: f64,
    classify: f64,
    restore: f64,
}

impl StageWeights {
    const fn for_config(config: &DedupConfig) -> Self {
        if config.retain_order {
            Self {
                sort: 0.4,
                classify: 0.2,
                restore: 0.4,
            }
        } else {
            Self {
                sort: 0.6,
                classify: 0.4,
                restore: 0.0,
            }
        }
    }
}

/// Detects duplicate groups and removes or annotates them.
#[derive(Clone, Debug)]
pub struct DuplicateRowFilter {
    config: DedupConfig,
}

impl DuplicateRowFilter {
    /// Validate `config` and build the filter. This is the single validation point for
    /// schema-independent rules.
    ///
    /// # Errors
    /// Returns [`DedupError::Configuration`](crate::DedupError::Configuration) for invalid settings.
    pub fn new(config: DedupConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &DedupConfig {
        &self.config
    }

    #[must_use]
    pub const fn output_mode(&self) -> OutputMode {
        if self.config.remove_duplicates {
            OutputMode::Remove
        } else {
            OutputMode::Annotate {
                classification: self.config.add_classification_column,
                reference: self.config.add_reference_column,
            }
        }
    }

    fn sort_memory(&self) -> SortMemory {
        if self.config.in_memory_sort {
            SortMemory::InMemory
        } else {
            SortMemory::External {
                rows_per_run: self.config.rows_per_run,
                spill_dir: self.config.spill_dir.clone(),
            }
        }
    }

    /// Output schema for `input`: unchanged in remove mode, otherwise the input columns
    /// followed by the classification and then the reference column.
    ///
    /// # Errors
    /// Returns a configuration error if a configured column is absent from `input`, or an
    /// annotation column name clashes with an input column.
    pub fn output_schema(&self, input: &Schema) -> Result<Schema> {
        self.config.resolve(input)?;
        let mut schema = input.clone();
        if let OutputMode::Annotate {
            classification,
            reference,
        } = self.output_mode()
        {
            if classification {
                schema = schema.appended(Column::new(
                    self.config.classification_column_name.clone(),
                    DataType::Str,
                ))?;
            }
            if reference {
                schema = schema.appended(Column::new(
                    self.config.reference_column_name.clone(),
                    DataType::Str,
                ))?;
            }
        }
        Ok(schema)
    }

    /// Run the filter from `source` into `sink`.
    ///
    /// Configuration is checked against the source schema before any row is read. On
    /// failure or cancellation the sink is dropped unfinished.
    ///
    /// # Errors
    /// Configuration errors, malformed input, cancellation, and I/O failures of the
    /// source, sink, or spill files.
    pub fn execute<T, S>(
        &self,
        source: &T,
        mut sink: S,
        ctx: &ExecutionContext,
    ) -> Result<(S::Output, DedupReport)>
    where
        T: TableSource + ?Sized,
        S: TableSink,
    {
        let config = &self.config;
        let input_schema = source.schema();
        let resolved = config.resolve(input_schema)?;
        let output_schema = self.output_schema(input_schema)?;
        ctx.check("prepare")?;
        sink.start(&output_schema)?;

        let expected = source.row_count();
        if expected == Some(0) {
            debug!("empty input, skipping all stages");
            return Ok((sink.finish()?, DedupReport::default()));
        }

        let weights = StageWeights::for_config(config);
        let memory = self.sort_memory();
        let rows = source.rows()?;
        let (sort_schema, tag) = if config.needs_order_tag() {
            let (schema, tag) = tag_schema(input_schema)?;
            (schema, Some(tag))
        } else {
            (input_schema.clone(), None)
        };
        let rows: RowIter<'_> = if tag.is_some() {
            Box::new(OrderTagger::new(rows))
        } else {
            rows
        };

        debug!(
            group_columns = ?config.group_columns,
            tie_break = ?config.tie_break,
            tagged = tag.is_some(),
            "sorting by group key"
        );
        let sorter = GroupSorter::new(
            &sort_schema,
            &resolved.group,
            &config.tie_break,
            resolved.reference,
            tag,
            MissingPolicy::from_skip_missing(config.skip_missing_in_sort_keys),
            memory.clone(),
        )?;
        let mut sort_mon = ctx.stage("sort", 0.0, weights.sort, expected);
        let sorted = sorter.sort(rows, &mut sort_mon)?;
        sort_mon.finish();

        let classify_mon = ctx.stage("classify", weights.sort, weights.classify, expected);
        let classifier =
            GroupClassifier::new(sorted, resolved.group.clone(), self.output_mode(), classify_mon);
        let counts = classifier.counts();

        let output: RowIter<'_> = match tag {
            Some(tag_column) => {
                let restorer =
                    OrderRestorer::new(&sort_schema, tag_column, config.retain_order, memory)?;
                // Restore intake runs interleaved with classification, which owns
                // intermediate progress; this stage only reports completion.
                let mut restore_mon = ctx.stage(
                    "restore",
                    weights.sort + weights.classify,
                    weights.restore,
                    None,
                );
                let out = restorer.apply(classifier, &mut restore_mon)?;
                if config.retain_order {
                    restore_mon.finish();
                }
                out
            }
            None => Box::new(classifier),
        };

        let mut written = 0u64;
        for record in output {
            sink.push(record?)?;
            written += 1;
        }
        ctx.check("write")?;
        let table = sink.finish()?;

        let report = DedupReport::new(counts.get(), written);
        info!(
            input_rows = report.input_rows,
            output_rows = report.output_rows,
            groups = report.groups,
            duplicates = report.duplicate,
            "duplicate row filter finished"
        );
        Ok((table, report))
    }

    /// Run over an in-memory table without progress or cancellation.
    ///
    /// # Errors
    /// See [`DuplicateRowFilter::execute`].
    pub fn run(&self, table: &Table) -> Result<Table> {
        self.run_with(table, &ExecutionContext::new()).map(|(t, _)| t)
    }

    /// Run over an in-memory table with an explicit execution context.
    ///
    /// # Errors
    /// See [`DuplicateRowFilter::execute`].
    pub fn run_with(&self, table: &Table, ctx: &ExecutionContext) -> Result<(Table, DedupReport)> {
        self.execute(table, TableBuilder::new(), ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TieBreak;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("k", DataType::Int),
            Column::new("v", DataType::Str),
        ])
        .unwrap()
    }

    #[test]
    fn annotation_columns_follow_input_in_fixed_order() -> Result<()> {
        let f = DuplicateRowFilter::new(DedupConfig {
            remove_duplicates: false,
            add_classification_column: true,
            add_reference_column: true,
            ..DedupConfig::new(["k"])
        })?;
        let out = f.output_schema(&schema())?;
        let names: Vec<_> = out.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            ["k", "v", "duplicate-type-classifier", "duplicate-row-identifier"]
        );
        Ok(())
    }

    #[test]
    fn annotation_name_clash_is_configuration_error() {
        let f = DuplicateRowFilter::new(DedupConfig {
            remove_duplicates: false,
            classification_column_name: "v".into(),
            ..DedupConfig::new(["k"])
        })
        .unwrap();
        assert!(f.output_schema(&schema()).unwrap_err().to_string().contains("'v'"));
    }

    #[test]
    fn remove_mode_keeps_schema() -> Result<()> {
        let f = DuplicateRowFilter::new(DedupConfig {
            tie_break: TieBreak::Minimum("v".into()),
            ..DedupConfig::new(["k"])
        })?;
        assert_eq!(f.output_schema(&schema())?, schema());
        Ok(())
    }

    #[test]
    fn weights_cover_full_range() {
        for retain in [true, false] {
            let cfg = DedupConfig {
                retain_order: retain,
                ..DedupConfig::new(["k"])
            };
            let w = StageWeights::for_config(&cfg);
            assert!((w.sort + w.classify + w.restore - 1.0).abs() < 1e-9);
            assert!(w.sort >= w.classify);
        }
    }
}
