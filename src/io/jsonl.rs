//! JSON Lines tables.
//!
//! Each row is one JSON object keyed by column name, plus an `"id"` member holding the
//! row id. Missing cells are `null`. Reading needs the schema up front; JSONL carries
//! no column types.

use crate::error::{DedupError, Result as DedupResult};
use crate::io::compression::{auto_detect_reader, auto_detect_writer};
use crate::record::Record;
use crate::schema::Schema;
use crate::table::{Table, TableSink};
use crate::value::{Cell, DataType};
use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Number, Value};
use std::fs::{File, create_dir_all};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Object member holding the row id.
pub const ID_FIELD: &str = "id";

fn cell_to_json(cell: &Cell) -> Value {
    match cell {
        Cell::Missing => Value::Null,
        Cell::Bool(b) => Value::Bool(*b),
        Cell::Int(i) => Value::from(*i),
        Cell::Float(f) => Number::from_f64(f.0).map_or(Value::Null, Value::Number),
        Cell::Str(s) => Value::String(s.clone()),
    }
}

fn json_to_cell(value: &Value, data_type: DataType) -> Option<Cell> {
    match (value, data_type) {
        (Value::Null, _) => Some(Cell::Missing),
        (Value::Bool(b), DataType::Bool) => Some(Cell::Bool(*b)),
        (Value::Number(n), DataType::Int) => n.as_i64().map(Cell::Int),
        (Value::Number(n), DataType::Float) => n.as_f64().map(Cell::float),
        (Value::String(s), DataType::Str) => Some(Cell::from(s.as_str())),
        _ => None,
    }
}

fn to_object(schema: &Schema, record: &Record) -> Map<String, Value> {
    let mut obj = Map::with_capacity(schema.len() + 1);
    obj.insert(ID_FIELD.to_string(), Value::String(record.id().to_string()));
    for (i, column) in schema.columns().iter().enumerate() {
        obj.insert(column.name.clone(), cell_to_json(record.cell(i)));
    }
    obj
}

/// Read a JSONL file into a [`Table`] with the given schema.
///
/// Absent members are missing cells; rows without an `"id"` get `Row<n>`. Blank lines
/// are skipped.
///
/// # Errors
/// Returns an error if the file cannot be read, a line is not a JSON object, or a value
/// does not match its column type.
pub fn read_jsonl_table(path: impl AsRef<Path>, schema: &Schema) -> Result<Table> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = auto_detect_reader(f, path)
        .with_context(|| format!("setup decompression for {}", path.display()))?;
    let mut rows = Vec::new();
    for (i, line) in BufReader::new(rdr).lines().enumerate() {
        let line = line.with_context(|| format!("read line {} in {}", i + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let obj: Map<String, Value> = serde_json::from_str(&line)
            .with_context(|| format!("parse JSONL line {} in {}", i + 1, path.display()))?;
        let id = match obj.get(ID_FIELD) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => format!("Row{}", rows.len()),
        };
        let mut cells = Vec::with_capacity(schema.len());
        for column in schema.columns() {
            let value = obj.get(&column.name).unwrap_or(&Value::Null);
            let cell = json_to_cell(value, column.data_type).ok_or_else(|| {
                anyhow!(
                    "line {}: {} is not a valid {} for column '{}'",
                    i + 1,
                    value,
                    column.data_type,
                    column.name
                )
            })?;
            cells.push(cell);
        }
        rows.push(Record::new(id, cells));
    }
    Ok(Table::new(schema.clone(), rows)?)
}

/// Write `table` as JSONL, creating parent directories. Returns the number of rows.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_jsonl_table(path: impl AsRef<Path>, table: &Table) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = auto_detect_writer(f, path)
        .with_context(|| format!("setup compression for {}", path.display()))?;
    for record in table.records() {
        serde_json::to_writer(&mut w, &to_object(table.schema(), record))
            .with_context(|| format!("serialize row '{}'", record.id()))?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(table.len())
}

/// [`TableSink`] streaming rows to a JSONL file as they arrive.
///
/// Unlike [`CsvSink`](crate::io::csv::CsvSink) this writes straight to the target path,
/// so an aborted run leaves a truncated file behind.
pub struct JsonlSink {
    path: PathBuf,
    schema: Option<Schema>,
    writer: Option<Box<dyn Write>>,
    rows: u64,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            schema: None,
            writer: None,
            rows: 0,
        }
    }
}

fn not_started() -> DedupError {
    DedupError::Io(io::Error::other("JSONL sink used before start"))
}

impl TableSink for JsonlSink {
    type Output = u64;

    fn start(&mut self, schema: &Schema) -> DedupResult<()> {
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent)?;
        }
        let f = File::create(&self.path)?;
        let w = auto_detect_writer(f, &self.path).map_err(|e| io::Error::other(format!("{e:#}")))?;
        self.writer = Some(w);
        self.schema = Some(schema.clone());
        Ok(())
    }

    fn push(&mut self, record: Record) -> DedupResult<()> {
        let (Some(schema), Some(w)) = (self.schema.as_ref(), self.writer.as_mut()) else {
            return Err(not_started());
        };
        serde_json::to_writer(&mut *w, &to_object(schema, &record)).map_err(io::Error::from)?;
        w.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    fn finish(mut self) -> DedupResult<u64> {
        let mut w = self.writer.take().ok_or_else(not_started)?;
        w.flush()?;
        Ok(self.rows)
    }
}
