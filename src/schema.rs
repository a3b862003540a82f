//! Table schemas: an ordered list of named, typed columns.

use crate::error::{DedupError, Result};
use crate::value::DataType;
use serde::{Deserialize, Serialize};

/// A named, typed column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of columns. Column names are unique.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Build a schema, rejecting duplicate column names.
    ///
    /// # Errors
    /// Returns [`DedupError::Configuration`] if two columns share a name.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        for (i, c) in columns.iter().enumerate() {
            if columns[..i].iter().any(|o| o.name == c.name) {
                return Err(DedupError::config(format!(
                    "duplicate column name '{}'",
                    c.name
                )));
            }
        }
        Ok(Self { columns })
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Like [`Schema::index_of`], but a missing column is a configuration error.
    ///
    /// # Errors
    /// Returns [`DedupError::Configuration`] if `name` is not in the schema.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| DedupError::config(format!("column '{name}' not found in input table")))
    }

    /// Copy of this schema with `column` appended at the end.
    ///
    /// # Errors
    /// Returns [`DedupError::Configuration`] if the name is already taken.
    pub fn appended(&self, column: Column) -> Result<Self> {
        if self.index_of(&column.name).is_some() {
            return Err(DedupError::config(format!(
                "column '{}' already exists in input table",
                column.name
            )));
        }
        let mut columns = self.columns.clone();
        columns.push(column);
        Ok(Self { columns })
    }

    /// Copy of this schema without the column at `index`.
    #[must_use]
    pub fn without(&self, index: usize) -> Self {
        let mut columns = self.columns.clone();
        if index < columns.len() {
            columns.remove(index);
        }
        Self { columns }
    }

    /// A column name derived from `base` that no column of this schema uses.
    #[must_use]
    pub fn unique_name(&self, base: &str) -> String {
        if self.index_of(base).is_none() {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{base} (#{i})"))
            .find(|n| self.index_of(n).is_none())
            .unwrap_or_else(|| base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("k", DataType::Int),
            Column::new("v", DataType::Str),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Schema::new(vec![
            Column::new("a", DataType::Int),
            Column::new("a", DataType::Str),
        ])
        .unwrap_err();
        assert!(matches!(err, DedupError::Configuration(_)));
    }

    #[test]
    fn unique_name_avoids_collisions() {
        let s = schema().appended(Column::new("k (#1)", DataType::Int)).unwrap();
        assert_eq!(s.unique_name("tag"), "tag");
        assert_eq!(s.unique_name("k"), "k (#2)");
    }

    #[test]
    fn append_and_drop() {
        let s = schema().appended(Column::new("x", DataType::Bool)).unwrap();
        assert_eq!(s.index_of("x"), Some(2));
        assert_eq!(s.without(2), schema());
        assert!(schema().appended(Column::new("k", DataType::Int)).is_err());
        assert!(schema().require("nope").is_err());
    }
}
