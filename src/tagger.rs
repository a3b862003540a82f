//! Synthetic order column used to restore input order after a sort.

use crate::error::Result;
use crate::record::Record;
use crate::schema::{Column, Schema};
use crate::value::{Cell, DataType};

/// Base name of the order column; made unique against the input schema.
pub const ORDER_TAG_BASE_NAME: &str = "__dedup_order";

/// `schema` plus a fresh order column; returns the new schema and the column index.
///
/// # Errors
/// Never in practice: the chosen name is unique by construction.
pub fn tag_schema(schema: &Schema) -> Result<(Schema, usize)> {
    let name = schema.unique_name(ORDER_TAG_BASE_NAME);
    let tagged = schema.appended(Column::new(name, DataType::Int))?;
    Ok((tagged, schema.len()))
}

/// Appends a strictly increasing `i64` to every record, starting at `i64::MIN`.
pub struct OrderTagger<I> {
    inner: I,
    next: i64,
}

impl<I> OrderTagger<I>
where
    I: Iterator<Item = Result<Record>>,
{
    pub const fn new(inner: I) -> Self {
        Self {
            inner,
            next: i64::MIN,
        }
    }
}

impl<I> Iterator for OrderTagger<I>
where
    I: Iterator<Item = Result<Record>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.inner.next()? {
            Ok(r) => r,
            Err(e) => return Some(Err(e)),
        };
        let tag = self.next;
        self.next = self.next.wrapping_add(1);
        Some(Ok(record.appended(Cell::Int(tag))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_increase_from_min_without_reordering() -> Result<()> {
        let rows = ["a", "b", "c"].map(|id| Ok(Record::new(id, vec![Cell::Int(0)])));
        let out = OrderTagger::new(rows.into_iter()).collect::<Result<Vec<_>>>()?;
        let ids: Vec<_> = out.iter().map(Record::id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(out[0].cell(1), &Cell::Int(i64::MIN));
        assert_eq!(out[2].cell(1), &Cell::Int(i64::MIN + 2));
        Ok(())
    }

    #[test]
    fn tag_column_gets_unused_name() -> Result<()> {
        let schema = Schema::new(vec![Column::new(ORDER_TAG_BASE_NAME, DataType::Str)])?;
        let (tagged, idx) = tag_schema(&schema)?;
        assert_eq!(idx, 1);
        assert_ne!(tagged.columns()[1].name, ORDER_TAG_BASE_NAME);
        Ok(())
    }
}
