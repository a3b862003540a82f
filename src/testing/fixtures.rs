//! Pre-built tables for common deduplication scenarios.

use crate::error::Result;
use crate::record::Record;
use crate::schema::{Column, Schema};
use crate::table::Table;
use crate::value::{Cell, DataType};

/// Build a table from `(name, type)` column pairs and `(row id, cells)` rows.
///
/// # Errors
/// Returns an error if column names repeat or a row has the wrong width.
///
/// # Example
///
/// ```
/// use rowdedup::testing::table_from_rows;
/// use rowdedup::{Cell, DataType};
///
/// let t = table_from_rows(
///     &[("k", DataType::Int)],
///     [("a", vec![Cell::Int(1)]), ("b", vec![Cell::Int(1)])],
/// )
/// .unwrap();
/// assert_eq!(t.row_ids(), ["a", "b"]);
/// ```
pub fn table_from_rows<'a, I>(columns: &[(&str, DataType)], rows: I) -> Result<Table>
where
    I: IntoIterator<Item = (&'a str, Vec<Cell>)>,
{
    let schema = Schema::new(
        columns
            .iter()
            .map(|(name, data_type)| Column::new(*name, *data_type))
            .collect(),
    )?;
    let rows = rows
        .into_iter()
        .map(|(id, cells)| Record::new(id, cells))
        .collect();
    Table::new(schema, rows)
}

fn fixture<'a, I>(columns: &[(&str, DataType)], rows: I) -> Table
where
    I: IntoIterator<Item = (&'a str, Vec<Cell>)>,
{
    table_from_rows(columns, rows).unwrap_or_else(|e| panic!("invalid fixture: {e}"))
}

/// `k` = 1, 1, 2 with ids `r1`, `r2`, `r3`, and a payload column `v`.
#[must_use]
pub fn scenario_table() -> Table {
    fixture(
        &[("k", DataType::Int), ("v", DataType::Str)],
        [
            ("r1", vec![Cell::Int(1), Cell::from("a")]),
            ("r2", vec![Cell::Int(1), Cell::from("b")]),
            ("r3", vec![Cell::Int(2), Cell::from("c")]),
        ],
    )
}

/// Like [`scenario_table`] but `r2` has no value in the group column `k`.
#[must_use]
pub fn missing_key_table() -> Table {
    fixture(
        &[("k", DataType::Int), ("v", DataType::Str)],
        [
            ("r1", vec![Cell::Int(1), Cell::from("a")]),
            ("r2", vec![Cell::Missing, Cell::from("b")]),
            ("r3", vec![Cell::Int(2), Cell::from("c")]),
        ],
    )
}

/// Customers keyed by `email`, with a `score` for MIN/MAX selection.
///
/// | id | email   | score   |
/// |----|---------|---------|
/// | c1 | a@x     | 3.0     |
/// | c2 | b@x     | 1.0     |
/// | c3 | a@x     | missing |
/// | c4 | a@x     | 1.5     |
/// | c5 | b@x     | 1.0     |
/// | c6 | c@x     | 7.0     |
/// | c7 | a@x     | 9.5     |
#[must_use]
pub fn scored_table() -> Table {
    fixture(
        &[("email", DataType::Str), ("score", DataType::Float)],
        [
            ("c1", vec![Cell::from("a@x"), Cell::float(3.0)]),
            ("c2", vec![Cell::from("b@x"), Cell::float(1.0)]),
            ("c3", vec![Cell::from("a@x"), Cell::Missing]),
            ("c4", vec![Cell::from("a@x"), Cell::float(1.5)]),
            ("c5", vec![Cell::from("b@x"), Cell::float(1.0)]),
            ("c6", vec![Cell::from("c@x"), Cell::float(7.0)]),
            ("c7", vec![Cell::from("a@x"), Cell::float(9.5)]),
        ],
    )
}

/// `rows` rows over `groups` distinct keys, scattered so that group members are far
/// apart in input order. Columns: `k` (Int), `bucket` (Str), `seq` (Int).
///
/// Ids are `g0`, `g1`, ... in input order; `seq` repeats the row number.
#[must_use]
pub fn generated_table(rows: usize, groups: usize) -> Table {
    let groups = groups.max(1) as i64;
    let ids: Vec<String> = (0..rows).map(|i| format!("g{i}")).collect();
    fixture(
        &[
            ("k", DataType::Int),
            ("bucket", DataType::Str),
            ("seq", DataType::Int),
        ],
        ids.iter().enumerate().map(|(i, id)| {
            let i = i as i64;
            let k = (i * 7919 + 13) % groups;
            let bucket = if k % 3 == 0 { "even" } else { "odd" };
            (
                id.as_str(),
                vec![Cell::Int(k), Cell::from(bucket), Cell::Int(i)],
            )
        }),
    )
}
