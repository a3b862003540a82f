//! Table abstraction: row sources, row sinks, and an in-memory table.
//!
//! The filter never mutates its input. It reads a [`TableSource`] forward-only and
//! writes the result incrementally into a [`TableSink`]; the sink only yields an
//! output when [`TableSink::finish`] is reached, so a failed run leaves nothing behind.

use crate::error::{DedupError, Result};
use crate::record::Record;
use crate::schema::Schema;

/// Boxed forward-only row stream.
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Record>> + 'a>;

/// A readable, row-iterable table.
pub trait TableSource {
    fn schema(&self) -> &Schema;

    /// Total row count, if known. Used for progress estimation only.
    fn row_count(&self) -> Option<u64>;

    /// Open a fresh forward-only pass over the rows.
    ///
    /// # Errors
    /// Returns an error if the underlying storage cannot be read.
    fn rows(&self) -> Result<RowIter<'_>>;
}

/// An incrementally written output table.
pub trait TableSink {
    type Output;

    /// Called exactly once, before the first row, with the output schema.
    ///
    /// # Errors
    /// Returns an error if the sink cannot be prepared (e.g. file creation fails).
    fn start(&mut self, schema: &Schema) -> Result<()>;

    /// Append one row.
    ///
    /// # Errors
    /// Returns an error if the row cannot be written.
    fn push(&mut self, record: Record) -> Result<()>;

    /// Seal the table and return it.
    ///
    /// # Errors
    /// Returns an error if flushing or persisting fails.
    fn finish(self) -> Result<Self::Output>;
}

/// A fully materialized table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Record>,
}

impl Table {
    /// Build a table, checking every row's width against the schema.
    ///
    /// # Errors
    /// Returns [`DedupError::MalformedInput`] for the first row of the wrong width.
    pub fn new(schema: Schema, rows: Vec<Record>) -> Result<Self> {
        if let Some(bad) = rows.iter().find(|r| r.len() != schema.len()) {
            return Err(DedupError::malformed(
                "table",
                bad.id(),
                format!("row has {} cells, schema has {} columns", bad.len(), schema.len()),
            ));
        }
        Ok(Self { schema, rows })
    }

    #[must_use]
    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row identifiers in table order.
    #[must_use]
    pub fn row_ids(&self) -> Vec<&str> {
        self.rows.iter().map(Record::id).collect()
    }

    /// Cell of column `name` for every row, in table order.
    #[must_use]
    pub fn column_values(&self, name: &str) -> Option<Vec<&crate::value::Cell>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(|r| r.cell(idx)).collect())
    }

    pub fn into_parts(self) -> (Schema, Vec<Record>) {
        (self.schema, self.rows)
    }
}

impl TableSource for Table {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count(&self) -> Option<u64> {
        Some(self.rows.len() as u64)
    }

    fn rows(&self) -> Result<RowIter<'_>> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }
}

/// [`TableSink`] that collects rows into a [`Table`].
#[derive(Debug, Default)]
pub struct TableBuilder {
    schema: Option<Schema>,
    rows: Vec<Record>,
}

impl TableBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableSink for TableBuilder {
    type Output = Table;

    fn start(&mut self, schema: &Schema) -> Result<()> {
        self.schema = Some(schema.clone());
        Ok(())
    }

    fn push(&mut self, record: Record) -> Result<()> {
        self.rows.push(record);
        Ok(())
    }

    fn finish(self) -> Result<Table> {
        let schema = self.schema.unwrap_or_default();
        Table::new(schema, self.rows)
    }
}
