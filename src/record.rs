//! Records: a row identifier plus an ordered sequence of cells.

use crate::value::Cell;
use serde::{Deserialize, Serialize};

/// One row of a table.
///
/// Records read from a source are never mutated; structural changes produce a new
/// record via [`Record::appended`] or [`Record::without`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    id: String,
    cells: Vec<Cell>,
}

impl Record {
    pub fn new(id: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            id: id.into(),
            cells,
        }
    }

    /// Unique row identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at `index`; out-of-range indices read as missing.
    #[must_use]
    pub fn cell(&self, index: usize) -> &Cell {
        self.cells.get(index).unwrap_or(&Cell::Missing)
    }

    /// New record with `cell` appended.
    #[must_use]
    pub fn appended(self, cell: Cell) -> Self {
        let Self { id, mut cells } = self;
        cells.push(cell);
        Self { id, cells }
    }

    /// New record without the cell at `index`.
    #[must_use]
    pub fn without(self, index: usize) -> Self {
        let Self { id, mut cells } = self;
        if index < cells.len() {
            cells.remove(index);
        }
        Self { id, cells }
    }

    pub fn into_parts(self) -> (String, Vec<Cell>) {
        (self.id, self.cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_transforms_keep_identity() {
        let r = Record::new("r1", vec![Cell::Int(1), Cell::from("a")]);
        let r = r.appended(Cell::Int(99));
        assert_eq!(r.id(), "r1");
        assert_eq!(r.cell(2), &Cell::Int(99));
        let r = r.without(0);
        assert_eq!(r.cells(), &[Cell::from("a"), Cell::Int(99)]);
        assert_eq!(r.cell(10), &Cell::Missing);
    }
}
