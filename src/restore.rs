//! Restoring input order after the group sort, and removing the order column.

use crate::error::Result;
use crate::progress::StageMonitor;
use crate::record::Record;
use crate::schema::Schema;
use crate::sort::{ExternalSorter, MissingPolicy, SortKey, SortMemory, SortSpec};
use crate::table::RowIter;
use tracing::debug;

/// Removes one column from every record of a stream.
pub struct DropColumn<I> {
    inner: I,
    column: usize,
}

impl<I> DropColumn<I> {
    pub const fn new(inner: I, column: usize) -> Self {
        Self { inner, column }
    }
}

impl<I> Iterator for DropColumn<I>
where
    I: Iterator<Item = Result<Record>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let column = self.column;
        self.inner.next().map(|r| r.map(|r| r.without(column)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Re-sorts by the order tag (when asked to) and drops the tag column.
#[derive(Clone, Debug)]
pub struct OrderRestorer {
    tag_column: usize,
    restore: bool,
    sorter: ExternalSorter,
}

impl OrderRestorer {
    /// `schema` is the schema of the stream entering the restorer (tag column included).
    ///
    /// # Errors
    /// Returns a configuration error if `tag_column` is outside `schema`.
    pub fn new(schema: &Schema, tag_column: usize, restore: bool, memory: SortMemory) -> Result<Self> {
        let spec = SortSpec::new(vec![SortKey::asc(tag_column)], MissingPolicy::Fail, schema)?;
        Ok(Self {
            tag_column,
            restore,
            sorter: ExternalSorter::new(spec, memory),
        })
    }

    /// Without restoration the stream passes through lazily, only losing the tag column.
    ///
    /// # Errors
    /// Propagates failures of the re-sort, including cancellation.
    pub fn apply<'a, I>(&self, input: I, monitor: &mut StageMonitor) -> Result<RowIter<'a>>
    where
        I: Iterator<Item = Result<Record>> + 'a,
    {
        if !self.restore {
            return Ok(Box::new(DropColumn::new(input, self.tag_column)));
        }
        let sorted = self.sorter.sort(input, monitor)?;
        debug!(spilled = sorted.spilled(), "restored input order");
        Ok(Box::new(DropColumn::new(sorted, self.tag_column)))
    }
}
