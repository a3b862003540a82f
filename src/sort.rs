//! Stable multi-key sorting with optional spill-to-disk, and the group sort built on it.
//!
//! [`ExternalSorter`] is the only place in the crate that materializes rows. It runs in
//! one of two [`SortMemory`] modes:
//! - **In memory** - all rows are buffered and sorted with a stable parallel sort.
//! - **External** - rows are sorted in runs of `rows_per_run`, each run is spilled to an
//!   anonymous temp file (postcard-encoded, length-prefixed), and the runs are k-way
//!   merged. Ties between runs resolve to the earlier run, so the merge is stable too.
//!
//! Every key cell is validated as it is read: a missing cell under
//! [`MissingPolicy::Fail`], or a cell whose type differs from its column's type, aborts
//! the sort with [`DedupError::MalformedInput`]. After validation, comparison cannot fail.
//!
//! [`GroupSorter`] derives the key list for duplicate grouping from the configuration:
//! group columns ascending, then the tie-break column (MIN ascending / MAX descending),
//! or the order tag descending for LAST.

use crate::config::TieBreak;
use crate::error::{DedupError, Result};
use crate::progress::StageMonitor;
use crate::record::Record;
use crate::schema::{Column, Schema};
use crate::value::Cell;
use rayon::slice::ParallelSliceMut;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    #[inline]
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            Self::Ascending => ord,
            Self::Descending => ord.reverse(),
        }
    }
}

/// One sort key: a column index and its direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub column: usize,
    pub direction: SortDirection,
}

impl SortKey {
    #[must_use]
    pub const fn asc(column: usize) -> Self {
        Self {
            column,
            direction: SortDirection::Ascending,
        }
    }

    #[must_use]
    pub const fn desc(column: usize) -> Self {
        Self {
            column,
            direction: SortDirection::Descending,
        }
    }
}

/// What to do with missing cells in sort key columns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingPolicy {
    /// A missing key cell is malformed input.
    #[default]
    Fail,
    /// Missing cells sort after every present value, in either direction.
    SortLast,
}

impl MissingPolicy {
    #[must_use]
    pub const fn from_skip_missing(skip: bool) -> Self {
        if skip { Self::SortLast } else { Self::Fail }
    }
}

/// Memory policy of the sort.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortMemory {
    InMemory,
    External {
        rows_per_run: usize,
        spill_dir: Option<PathBuf>,
    },
}

/// Resolved key list plus the declared column of every key.
#[derive(Clone, Debug)]
pub struct SortSpec {
    keys: Vec<SortKey>,
    columns: Vec<Column>,
    missing: MissingPolicy,
}

impl SortSpec {
    /// # Errors
    /// Returns [`DedupError::Configuration`] if a key refers to a column outside `schema`.
    pub fn new(keys: Vec<SortKey>, missing: MissingPolicy, schema: &Schema) -> Result<Self> {
        let columns = keys
            .iter()
            .map(|k| {
                schema.column(k.column).cloned().ok_or_else(|| {
                    DedupError::config(format!("sort key column #{} out of range", k.column))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            keys,
            columns,
            missing,
        })
    }

    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Check that every key cell of `record` can take part in comparison.
    fn validate(&self, record: &Record, stage: &'static str) -> Result<()> {
        for (key, column) in self.keys.iter().zip(&self.columns) {
            match record.cell(key.column).data_type() {
                None if self.missing == MissingPolicy::Fail => {
                    return Err(DedupError::malformed(
                        stage,
                        record.id(),
                        format!("missing value in sort key column '{}'", column.name),
                    ));
                }
                Some(t) if t != column.data_type => {
                    return Err(DedupError::malformed(
                        stage,
                        record.id(),
                        format!(
                            "{t} value in {} column '{}' cannot be compared",
                            column.data_type, column.name
                        ),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Lexicographic comparison over all keys. Inputs must have passed validation.
    #[must_use]
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.keys {
            let ord = compare_cells(a.cell(key.column), b.cell(key.column), key.direction);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

#[inline]
fn compare_cells(a: &Cell, b: &Cell, direction: SortDirection) -> Ordering {
    match (a.is_missing(), b.is_missing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => direction.apply(a.cmp(b)),
    }
}

/// Stable sort over a record stream.
#[derive(Clone, Debug)]
pub struct ExternalSorter {
    spec: Arc<SortSpec>,
    memory: SortMemory,
}

impl ExternalSorter {
    #[must_use]
    pub fn new(spec: SortSpec, memory: SortMemory) -> Self {
        Self {
            spec: Arc::new(spec),
            memory,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &SortSpec {
        &self.spec
    }

    /// Consume `input` completely and return the rows in sorted order.
    ///
    /// The monitor is ticked once per input row.
    ///
    /// # Errors
    /// Propagates input errors, key validation failures, cancellation, and spill I/O errors.
    pub fn sort<I>(&self, input: I, monitor: &mut StageMonitor) -> Result<SortedRows>
    where
        I: Iterator<Item = Result<Record>>,
    {
        let stage = monitor.name();
        let run_limit = match &self.memory {
            SortMemory::InMemory => None,
            SortMemory::External { rows_per_run, .. } => Some((*rows_per_run).max(1)),
        };
        let mut buf: Vec<Record> = Vec::new();
        let mut runs = spill::RunSet::default();

        for item in input {
            let record = item?;
            self.spec.validate(&record, stage)?;
            monitor.tick()?;
            buf.push(record);
            if let Some(limit) = run_limit
                && buf.len() >= limit
                && spill::ENABLED
            {
                self.sort_buffer(&mut buf);
                runs.spill(std::mem::take(&mut buf), self.spill_dir())?;
                debug!(stage, run = runs.len(), rows = limit, "spilled sorted run");
            }
        }
        monitor.checkpoint()?;
        if run_limit.is_some() && !spill::ENABLED {
            tracing::warn!(stage, "spilling disabled at build time; sorted in memory");
        }

        if runs.is_empty() {
            self.sort_buffer(&mut buf);
            debug!(stage, rows = buf.len(), "sorted in memory");
            return Ok(SortedRows::memory(buf));
        }
        if !buf.is_empty() {
            self.sort_buffer(&mut buf);
            runs.spill(buf, self.spill_dir())?;
        }
        debug!(stage, runs = runs.len(), "merging spilled runs");
        runs.merge(Arc::clone(&self.spec))
    }

    fn sort_buffer(&self, buf: &mut [Record]) {
        let spec = &self.spec;
        buf.par_sort_by(|a, b| spec.compare(a, b));
    }

    fn spill_dir(&self) -> Option<&std::path::Path> {
        match &self.memory {
            SortMemory::External { spill_dir, .. } => spill_dir.as_deref(),
            SortMemory::InMemory => None,
        }
    }
}

/// Sorted output of [`ExternalSorter::sort`].
pub struct SortedRows {
    inner: SortedInner,
}

enum SortedInner {
    Memory(std::vec::IntoIter<Record>),
    #[cfg(feature = "spilling")]
    Merge(spill::MergeIter),
}

impl SortedRows {
    fn memory(rows: Vec<Record>) -> Self {
        Self {
            inner: SortedInner::Memory(rows.into_iter()),
        }
    }

    /// `true` when the rows came from spilled runs.
    #[must_use]
    pub const fn spilled(&self) -> bool {
        match self.inner {
            SortedInner::Memory(_) => false,
            #[cfg(feature = "spilling")]
            SortedInner::Merge(_) => true,
        }
    }
}

impl Iterator for SortedRows {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            SortedInner::Memory(it) => it.next().map(Ok),
            #[cfg(feature = "spilling")]
            SortedInner::Merge(it) => it.next(),
        }
    }
}

#[cfg(feature = "spilling")]
mod spill {
    use super::{SortSpec, SortedInner, SortedRows};
    use crate::error::Result;
    use crate::record::Record;
    use std::cmp::Ordering;
    use std::collections::BinaryHeap;
    use std::fs::File;
    use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
    use std::path::Path;
    use std::sync::Arc;

    pub(super) const ENABLED: bool = true;

    /// A sorted run on disk: `len` frames of `u32 LE length + postcard bytes`.
    struct Run {
        file: File,
        len: usize,
    }

    #[derive(Default)]
    pub(super) struct RunSet {
        runs: Vec<Run>,
    }

    impl RunSet {
        pub(super) fn len(&self) -> usize {
            self.runs.len()
        }

        pub(super) fn is_empty(&self) -> bool {
            self.runs.is_empty()
        }

        pub(super) fn spill(&mut self, rows: Vec<Record>, dir: Option<&Path>) -> Result<()> {
            let file = match dir {
                Some(d) => tempfile::tempfile_in(d)?,
                None => tempfile::tempfile()?,
            };
            let mut w = BufWriter::new(file);
            for r in &rows {
                let bytes = postcard::to_allocvec(r)?;
                let len = u32::try_from(bytes.len()).map_err(|_| {
                    crate::error::DedupError::Spill(format!("row '{}' too large to spill", r.id()))
                })?;
                w.write_all(&len.to_le_bytes())?;
                w.write_all(&bytes)?;
            }
            let mut file = w.into_inner().map_err(|e| e.into_error())?;
            file.seek(SeekFrom::Start(0))?;
            self.runs.push(Run {
                file,
                len: rows.len(),
            });
            Ok(())
        }

        pub(super) fn merge(self, spec: Arc<SortSpec>) -> Result<SortedRows> {
            let mut readers = Vec::with_capacity(self.runs.len());
            let mut heap = BinaryHeap::with_capacity(self.runs.len());
            for (idx, run) in self.runs.into_iter().enumerate() {
                let mut reader = RunReader {
                    inner: BufReader::new(run.file),
                    remaining: run.len,
                    scratch: Vec::new(),
                };
                if let Some(record) = reader.read_next()? {
                    heap.push(MergeHead {
                        record,
                        run: idx,
                        spec: Arc::clone(&spec),
                    });
                }
                readers.push(reader);
            }
            Ok(SortedRows {
                inner: SortedInner::Merge(MergeIter { heap, readers }),
            })
        }
    }

    struct RunReader {
        inner: BufReader<File>,
        remaining: usize,
        scratch: Vec<u8>,
    }

    impl RunReader {
        fn read_next(&mut self) -> Result<Option<Record>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            let mut len = [0u8; 4];
            self.inner.read_exact(&mut len)?;
            self.scratch.resize(u32::from_le_bytes(len) as usize, 0);
            self.inner.read_exact(&mut self.scratch)?;
            self.remaining -= 1;
            Ok(Some(postcard::from_bytes(&self.scratch)?))
        }
    }

    /// Heap entry ordered so that `BinaryHeap` (a max-heap) pops the smallest record,
    /// earliest run first on ties.
    struct MergeHead {
        record: Record,
        run: usize,
        spec: Arc<SortSpec>,
    }

    impl PartialEq for MergeHead {
        fn eq(&self, other: &Self) -> bool {
            self.cmp(other) == Ordering::Equal
        }
    }

    impl Eq for MergeHead {}

    impl PartialOrd for MergeHead {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for MergeHead {
        fn cmp(&self, other: &Self) -> Ordering {
            self.spec
                .compare(&other.record, &self.record)
                .then_with(|| other.run.cmp(&self.run))
        }
    }

    pub(crate) struct MergeIter {
        heap: BinaryHeap<MergeHead>,
        readers: Vec<RunReader>,
    }

    impl Iterator for MergeIter {
        type Item = Result<Record>;

        fn next(&mut self) -> Option<Self::Item> {
            let head = self.heap.pop()?;
            match self.readers[head.run].read_next() {
                Ok(Some(record)) => self.heap.push(MergeHead {
                    record,
                    run: head.run,
                    spec: Arc::clone(&head.spec),
                }),
                Ok(None) => {}
                Err(e) => {
                    self.heap.clear();
                    return Some(Err(e));
                }
            }
            Some(Ok(head.record))
        }
    }
}

#[cfg(not(feature = "spilling"))]
mod spill {
    use super::{SortSpec, SortedRows};
    use crate::error::{DedupError, Result};
    use crate::record::Record;
    use std::path::Path;
    use std::sync::Arc;

    pub(super) const ENABLED: bool = false;

    fn disabled() -> DedupError {
        DedupError::Spill("spilling feature disabled".to_string())
    }

    #[derive(Default)]
    pub(super) struct RunSet;

    impl RunSet {
        pub(super) fn len(&self) -> usize {
            0
        }

        pub(super) fn is_empty(&self) -> bool {
            true
        }

        pub(super) fn spill(&mut self, _rows: Vec<Record>, _dir: Option<&Path>) -> Result<()> {
            Err(disabled())
        }

        pub(super) fn merge(self, _spec: Arc<SortSpec>) -> Result<SortedRows> {
            Err(disabled())
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ExecutionContext;
    use crate::value::DataType;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("k", DataType::Int),
            Column::new("v", DataType::Float),
        ])
        .unwrap()
    }

    fn rec(id: &str, k: impl Into<Cell>, v: impl Into<Cell>) -> Record {
        Record::new(id, vec![k.into(), v.into()])
    }

    fn run(sorter: &ExternalSorter, rows: Vec<Record>) -> Result<Vec<String>> {
        let mut mon = ExecutionContext::new().stage("sort", 0.0, 1.0, None);
        sorter
            .sort(rows.into_iter().map(Ok), &mut mon)?
            .map(|r| r.map(|r| r.id().to_string()))
            .collect()
    }

    fn sorter(keys: Vec<SortKey>, missing: MissingPolicy, memory: SortMemory) -> ExternalSorter {
        ExternalSorter::new(SortSpec::new(keys, missing, &schema()).unwrap(), memory)
    }

    #[test]
    fn stable_on_equal_keys() -> Result<()> {
        let s = sorter(vec![SortKey::asc(0)], MissingPolicy::Fail, SortMemory::InMemory);
        let ids = run(
            &s,
            vec![rec("a", 2, 0.0), rec("b", 1, 0.0), rec("c", 2, 0.0), rec("d", 1, 0.0)],
        )?;
        assert_eq!(ids, ["b", "d", "a", "c"]);
        Ok(())
    }

    #[test]
    fn missing_sorts_last_in_both_directions() -> Result<()> {
        let rows = || {
            vec![
                rec("m", 1, None::<f64>),
                rec("lo", 1, 1.0),
                rec("hi", 1, 9.0),
            ]
        };
        let asc = sorter(
            vec![SortKey::asc(0), SortKey::asc(1)],
            MissingPolicy::SortLast,
            SortMemory::InMemory,
        );
        assert_eq!(run(&asc, rows())?, ["lo", "hi", "m"]);
        let desc = sorter(
            vec![SortKey::asc(0), SortKey::desc(1)],
            MissingPolicy::SortLast,
            SortMemory::InMemory,
        );
        assert_eq!(run(&desc, rows())?, ["hi", "lo", "m"]);
        Ok(())
    }

    #[test]
    fn missing_key_fails_under_strict_policy() {
        let s = sorter(vec![SortKey::asc(0)], MissingPolicy::Fail, SortMemory::InMemory);
        let err = run(&s, vec![rec("ok", 1, 0.0), rec("bad", None::<i64>, 0.0)]).unwrap_err();
        assert!(matches!(err, DedupError::MalformedInput { ref row_id, stage: "sort", .. } if row_id == "bad"));
    }

    #[test]
    fn mistyped_key_is_malformed() {
        let s = sorter(vec![SortKey::asc(0)], MissingPolicy::SortLast, SortMemory::InMemory);
        let err = run(&s, vec![rec("x", "one", 0.0)]).unwrap_err();
        assert!(err.to_string().contains("cannot be compared"));
    }

    #[cfg(feature = "spilling")]
    #[test]
    fn external_merge_matches_in_memory_and_stays_stable() -> Result<()> {
        let rows: Vec<Record> = (0..257)
            .map(|i| rec(&format!("r{i}"), i64::from(i % 7), f64::from(i % 3)))
            .collect();
        let keys = vec![SortKey::asc(0), SortKey::desc(1)];
        let mem = sorter(keys.clone(), MissingPolicy::Fail, SortMemory::InMemory);
        let ext = sorter(
            keys,
            MissingPolicy::Fail,
            SortMemory::External {
                rows_per_run: 10,
                spill_dir: None,
            },
        );
        assert_eq!(run(&mem, rows.clone())?, run(&ext, rows)?);
        Ok(())
    }

    #[cfg(feature = "spilling")]
    #[test]
    fn spilled_runs_round_trip_every_cell_type() -> Result<()> {
        let schema = Schema::new(vec![
            Column::new("k", DataType::Int),
            Column::new("s", DataType::Str),
            Column::new("f", DataType::Float),
            Column::new("b", DataType::Bool),
        ])?;
        let rows: Vec<Record> = (0..9i64)
            .map(|i| {
                Record::new(
                    format!("r{i}"),
                    vec![
                        Cell::Int(i % 3),
                        Cell::from(format!("s{i}")),
                        if i == 4 { Cell::Missing } else { Cell::float(i as f64 / 2.0) },
                        Cell::Bool(i % 2 == 0),
                    ],
                )
            })
            .collect();
        let spec = SortSpec::new(vec![SortKey::asc(0)], MissingPolicy::Fail, &schema)?;
        let ext = ExternalSorter::new(
            spec,
            SortMemory::External {
                rows_per_run: 2,
                spill_dir: None,
            },
        );
        let mut mon = ExecutionContext::new().stage("sort", 0.0, 1.0, None);
        let sorted = ext.sort(rows.clone().into_iter().map(Ok), &mut mon)?;
        assert!(sorted.spilled());
        let out = sorted.collect::<Result<Vec<_>>>()?;

        let mut expected = rows;
        expected.sort_by_key(|r| r.cell(0).clone());
        assert_eq!(out, expected);
        Ok(())
    }

    #[test]
    fn group_sort_keys_follow_tie_break() {
        use TieBreak::*;
        assert_eq!(GroupSorter::sort_keys(&[0], &First, None, Some(3)), vec![SortKey::asc(0)]);
        assert_eq!(
            GroupSorter::sort_keys(&[0], &Last, None, Some(3)),
            vec![SortKey::asc(0), SortKey::desc(3)]
        );
        assert_eq!(
            GroupSorter::sort_keys(&[0, 2], &Minimum("v".into()), Some(1), Some(3)),
            vec![SortKey::asc(0), SortKey::asc(2), SortKey::asc(1)]
        );
        assert_eq!(
            GroupSorter::sort_keys(&[0], &Maximum("v".into()), Some(1), None),
            vec![SortKey::asc(0), SortKey::desc(1)]
        );
    }
}
