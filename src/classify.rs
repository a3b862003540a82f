//! Single-pass duplicate classification over a group-sorted stream.
//!
//! The input must be sorted so that equal group keys are adjacent and the desired
//! representative of every group comes first (see [`GroupSorter`](crate::sort::GroupSorter)).
//! [`GroupClassifier`] then needs to remember only the current group's key and, until
//! it is emitted, its representative record.
//!
//! # Output modes
//! - [`OutputMode::Remove`] - one unmodified record per group (the representative).
//! - [`OutputMode::Annotate`] - every record, with a classification label and/or the
//!   representative's row id appended.
//!
//! # Example
//!
//! ```
//! use rowdedup::classify::{Classification, GroupClassifier, OutputMode};
//! use rowdedup::progress::ExecutionContext;
//! use rowdedup::{Cell, Record};
//!
//! let sorted = vec![
//!     Record::new("r1", vec![Cell::Int(1)]),
//!     Record::new("r2", vec![Cell::Int(1)]),
//!     Record::new("r3", vec![Cell::Int(2)]),
//! ];
//! let mode = OutputMode::Annotate { classification: true, reference: true };
//! let monitor = ExecutionContext::new().stage("classify", 0.0, 1.0, None);
//! let out = GroupClassifier::new(sorted.into_iter().map(Ok), vec![0], mode, monitor)
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//! assert_eq!(out[1].cell(1), &Cell::from(Classification::Duplicate.label()));
//! assert_eq!(out[1].cell(2), &Cell::from("r1"));
//! ```

use crate::error::{DedupError, Result};
use crate::progress::StageMonitor;
use crate::record::Record;
use crate::value::Cell;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

const STAGE: &str = "classify";

/// Role of a record within its duplicate group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// Only member of its group.
    Unique,
    /// Representative of a group of two or more.
    Chosen,
    /// Non-representative member; references the chosen row.
    Duplicate,
}

impl Classification {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::Chosen => "chosen",
            Self::Duplicate => "duplicate",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "unique" => Some(Self::Unique),
            "chosen" => Some(Self::Chosen),
            "duplicate" => Some(Self::Duplicate),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How classified groups are written out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Remove,
    /// Append the label column, then the reference column, for each enabled flag.
    Annotate { classification: bool, reference: bool },
}

/// Tallies of one classification pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCounts {
    pub rows: u64,
    pub groups: u64,
    pub unique: u64,
    pub chosen: u64,
    pub duplicate: u64,
}

/// Shared view of the counts, filled in when the classifier reaches end of stream.
#[derive(Clone, Debug, Default)]
pub struct CountsHandle(Arc<Mutex<GroupCounts>>);

impl CountsHandle {
    #[must_use]
    pub fn get(&self) -> GroupCounts {
        self.0.lock().map(|c| *c).unwrap_or_default()
    }

    fn publish(&self, counts: GroupCounts) {
        if let Ok(mut c) = self.0.lock() {
            *c = counts;
        }
    }
}

/// The group currently being accumulated.
struct OpenGroup {
    key: Vec<Cell>,
    representative_id: String,
    /// The representative while it has not been emitted yet.
    representative: Option<Record>,
    size: u64,
}

enum State {
    AwaitingFirst,
    InGroup(OpenGroup),
    Flushed,
}

/// Streaming classifier; an `Iterator` over classified (or reduced) records.
pub struct GroupClassifier<I> {
    input: I,
    group_columns: Vec<usize>,
    mode: OutputMode,
    state: State,
    ready: VecDeque<Record>,
    monitor: StageMonitor,
    counts: GroupCounts,
    handle: CountsHandle,
}

impl<I> GroupClassifier<I>
where
    I: Iterator<Item = Result<Record>>,
{
    pub fn new(input: I, group_columns: Vec<usize>, mode: OutputMode, monitor: StageMonitor) -> Self {
        Self {
            input,
            group_columns,
            mode,
            state: State::AwaitingFirst,
            ready: VecDeque::with_capacity(2),
            monitor,
            counts: GroupCounts::default(),
            handle: CountsHandle::default(),
        }
    }

    /// Handle to the final counts; valid once the iterator is exhausted.
    #[must_use]
    pub fn counts(&self) -> CountsHandle {
        self.handle.clone()
    }

    fn open(&self, record: Record) -> OpenGroup {
        OpenGroup {
            key: self
                .group_columns
                .iter()
                .map(|&c| record.cell(c).clone())
                .collect(),
            representative_id: record.id().to_string(),
            representative: Some(record),
            size: 1,
        }
    }

    fn same_group(&self, group: &OpenGroup, record: &Record) -> Result<bool> {
        for (key, &col) in group.key.iter().zip(&self.group_columns) {
            let cell = record.cell(col);
            if let (Some(a), Some(b)) = (key.data_type(), cell.data_type())
                && a != b
            {
                return Err(DedupError::malformed(
                    STAGE,
                    record.id(),
                    format!("cannot compare {b} group key with {a} group key"),
                ));
            }
            if key != cell {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn annotate(&self, record: Record, class: Classification, reference: Option<&str>) -> Record {
        match self.mode {
            OutputMode::Remove => record,
            OutputMode::Annotate {
                classification,
                reference: with_reference,
            } => {
                let mut out = record;
                if classification {
                    out = out.appended(Cell::from(class.label()));
                }
                if with_reference {
                    out = out.appended(reference.map_or(Cell::Missing, Cell::from));
                }
                out
            }
        }
    }

    fn accept(&mut self, record: Record) -> Result<()> {
        self.counts.rows += 1;
        match std::mem::replace(&mut self.state, State::AwaitingFirst) {
            State::AwaitingFirst => {
                self.state = State::InGroup(self.open(record));
            }
            State::InGroup(mut group) => {
                let same = match self.same_group(&group, &record) {
                    Ok(same) => same,
                    Err(e) => {
                        self.state = State::Flushed;
                        return Err(e);
                    }
                };
                if same {
                    group.size += 1;
                    self.counts.duplicate += 1;
                    if matches!(self.mode, OutputMode::Annotate { .. }) {
                        if let Some(rep) = group.representative.take() {
                            let chosen = self.annotate(rep, Classification::Chosen, None);
                            self.ready.push_back(chosen);
                        }
                        let dup = self.annotate(
                            record,
                            Classification::Duplicate,
                            Some(&group.representative_id),
                        );
                        self.ready.push_back(dup);
                    }
                    self.state = State::InGroup(group);
                } else {
                    self.close(group);
                    self.state = State::InGroup(self.open(record));
                }
            }
            State::Flushed => self.state = State::Flushed,
        }
        Ok(())
    }

    /// Group boundary: emit the representative if it is still buffered.
    fn close(&mut self, group: OpenGroup) {
        self.counts.groups += 1;
        if group.size == 1 {
            self.counts.unique += 1;
        } else {
            self.counts.chosen += 1;
        }
        if let Some(rep) = group.representative {
            // Still buffered: a singleton, or any group in remove mode.
            let out = self.annotate(rep, Classification::Unique, None);
            self.ready.push_back(out);
        }
    }

    fn finish(&mut self) {
        if let State::InGroup(group) = std::mem::replace(&mut self.state, State::Flushed) {
            self.close(group);
        }
        self.monitor.finish();
        self.handle.publish(self.counts);
        debug!(
            rows = self.counts.rows,
            groups = self.counts.groups,
            duplicates = self.counts.duplicate,
            "classification finished"
        );
    }

    fn fail(&mut self, e: DedupError) -> Option<Result<Record>> {
        self.state = State::Flushed;
        self.ready.clear();
        Some(Err(e))
    }
}

impl<I> Iterator for GroupClassifier<I>
where
    I: Iterator<Item = Result<Record>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(r) = self.ready.pop_front() {
                return Some(Ok(r));
            }
            if matches!(self.state, State::Flushed) {
                return None;
            }
            match self.input.next() {
                Some(Ok(record)) => {
                    if let Err(e) = self.monitor.tick() {
                        return self.fail(e);
                    }
                    if let Err(e) = self.accept(record) {
                        return self.fail(e);
                    }
                }
                Some(Err(e)) => return self.fail(e),
                None => self.finish(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{CHECK_INTERVAL, CancellationToken, ExecutionContext};

    fn rec(id: &str, k: impl Into<Cell>) -> Record {
        Record::new(id, vec![k.into()])
    }

    fn classify(rows: Vec<Record>, mode: OutputMode) -> (Result<Vec<Record>>, GroupCounts) {
        let mon = ExecutionContext::new().stage(STAGE, 0.0, 1.0, None);
        let c = GroupClassifier::new(rows.into_iter().map(Ok), vec![0], mode, mon);
        let handle = c.counts();
        let out = c.collect::<Result<Vec<_>>>();
        (out, handle.get())
    }

    const BOTH: OutputMode = OutputMode::Annotate {
        classification: true,
        reference: true,
    };

    fn labels(out: &[Record]) -> Vec<(String, String, String)> {
        out.iter()
            .map(|r| (r.id().to_string(), r.cell(1).to_string(), r.cell(2).to_string()))
            .collect()
    }

    #[test]
    fn annotates_chosen_duplicate_unique() {
        let (out, counts) = classify(vec![rec("r1", 1), rec("r2", 1), rec("r3", 2)], BOTH);
        assert_eq!(
            labels(&out.unwrap()),
            vec![
                ("r1".into(), "chosen".into(), String::new()),
                ("r2".into(), "duplicate".into(), "r1".into()),
                ("r3".into(), "unique".into(), String::new()),
            ]
        );
        assert_eq!(
            counts,
            GroupCounts {
                rows: 3,
                groups: 2,
                unique: 1,
                chosen: 1,
                duplicate: 1
            }
        );
    }

    #[test]
    fn remove_mode_keeps_representatives_unmodified() {
        let rows = vec![rec("a", 1), rec("b", 1), rec("c", 1), rec("d", 2), rec("e", 3), rec("f", 3)];
        let (out, counts) = classify(rows, OutputMode::Remove);
        let out = out.unwrap();
        assert_eq!(out.iter().map(Record::id).collect::<Vec<_>>(), ["a", "d", "e"]);
        assert!(out.iter().all(|r| r.len() == 1));
        assert_eq!(counts.groups, 3);
        assert_eq!(counts.duplicate, 3);
    }

    #[test]
    fn reference_only_annotation() {
        let mode = OutputMode::Annotate {
            classification: false,
            reference: true,
        };
        let (out, _) = classify(vec![rec("x", 5), rec("y", 5)], mode);
        let out = out.unwrap();
        assert_eq!(out[0].cells(), &[Cell::Int(5), Cell::Missing]);
        assert_eq!(out[1].cells(), &[Cell::Int(5), Cell::from("x")]);
    }

    #[test]
    fn missing_keys_form_their_own_group() {
        let rows = vec![rec("a", 1), rec("m1", None::<i64>), rec("m2", None::<i64>)];
        let (out, _) = classify(rows, BOTH);
        let l = labels(&out.unwrap());
        assert_eq!(l[0].1, "unique");
        assert_eq!(l[1].1, "chosen");
        assert_eq!((l[2].1.as_str(), l[2].2.as_str()), ("duplicate", "m1"));
    }

    #[test]
    fn empty_stream_emits_nothing() {
        let (out, counts) = classify(vec![], BOTH);
        assert!(out.unwrap().is_empty());
        assert_eq!(counts, GroupCounts::default());
    }

    #[test]
    fn incomparable_keys_are_malformed() {
        let (out, _) = classify(vec![rec("a", 1), rec("b", "one")], BOTH);
        let err = out.unwrap_err();
        assert!(matches!(err, DedupError::MalformedInput { stage: STAGE, ref row_id, .. } if row_id == "b"));
    }

    #[test]
    fn stops_on_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ExecutionContext::new().with_cancellation(token);
        let rows = (0..2 * CHECK_INTERVAL).map(|i| Ok(rec(&format!("r{i}"), 1)));
        let c = GroupClassifier::new(rows, vec![0], BOTH, ctx.stage(STAGE, 0.0, 1.0, None));
        let err = c.collect::<Result<Vec<_>>>().unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn every_duplicate_references_an_emitted_chosen_row() {
        let rows: Vec<Record> = (0..100).map(|i| rec(&format!("r{i}"), (i / 7) % 5)).collect();
        let mut sorted = rows;
        sorted.sort_by_key(|r| r.cell(0).clone());
        let (out, counts) = classify(sorted, BOTH);
        let out = out.unwrap();
        assert_eq!(out.len(), 100);
        let chosen: Vec<_> = out
            .iter()
            .filter(|r| r.cell(1) == &Cell::from("chosen"))
            .map(|r| (r.id().to_string(), r.cell(0).clone()))
            .collect();
        assert_eq!(chosen.len() as u64, counts.chosen);
        for d in out.iter().filter(|r| r.cell(1) == &Cell::from("duplicate")) {
            let target = d.cell(2).as_str().unwrap();
            assert!(chosen.iter().any(|(id, k)| id == target && k == d.cell(0)));
        }
    }
}
