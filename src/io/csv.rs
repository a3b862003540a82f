//! CSV tables: a streaming [`TableSource`] and an all-or-nothing [`TableSink`].
//!
//! - [`CsvTable::open`] scans the file once to infer column types and count rows, then
//!   streams rows on every [`TableSource::rows`] call without holding them in memory.
//! - [`CsvSink`] writes into a temp file next to the target and renames it into place
//!   on [`TableSink::finish`]; a failed run leaves no output file.
//!
//! # Type inference
//! Empty fields are missing cells. A column whose present values all parse as `i64`
//! is `Int`, else as `f64` is `Float`, else as `true`/`false` is `Bool`, else `Str`.

use crate::error::{DedupError, Result as DedupResult};
use crate::io::compression::{auto_detect_reader, auto_detect_writer};
use crate::record::Record;
use crate::schema::{Column, Schema};
use crate::table::{RowIter, Table, TableSink, TableSource};
use crate::value::{Cell, DataType};
use anyhow::{Context, Result, bail};
use std::fs::{File, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Default header of the row id column on write.
pub const DEFAULT_ID_COLUMN: &str = "row_id";

/// Options shared by CSV reading and writing.
#[derive(Clone, Debug)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Column holding row ids. On read, `None` generates `Row0`, `Row1`, ...
    pub id_column: Option<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            id_column: None,
        }
    }
}

/// Per-column type candidates narrowed while scanning.
#[derive(Clone, Copy)]
struct TypeGuess {
    int: bool,
    float: bool,
    boolean: bool,
}

impl TypeGuess {
    const fn new() -> Self {
        Self {
            int: true,
            float: true,
            boolean: true,
        }
    }

    fn observe(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        self.int &= raw.parse::<i64>().is_ok();
        self.float &= raw.parse::<f64>().is_ok();
        self.boolean &= matches!(raw, "true" | "false");
    }

    const fn resolve(self) -> DataType {
        if self.int {
            DataType::Int
        } else if self.float {
            DataType::Float
        } else if self.boolean {
            DataType::Bool
        } else {
            DataType::Str
        }
    }
}

fn parse_cell(raw: &str, data_type: DataType) -> Option<Cell> {
    if raw.is_empty() {
        return Some(Cell::Missing);
    }
    match data_type {
        DataType::Int => raw.parse().ok().map(Cell::Int),
        DataType::Float => raw.parse::<f64>().ok().map(Cell::float),
        DataType::Bool => raw.parse().ok().map(Cell::Bool),
        DataType::Str => Some(Cell::from(raw)),
    }
}

/// A CSV file with a header row, read lazily.
#[derive(Clone, Debug)]
pub struct CsvTable {
    path: PathBuf,
    options: CsvOptions,
    schema: Schema,
    /// Position of the id column in the file, if any.
    id_index: Option<usize>,
    /// File positions of the data columns, in schema order.
    data_indices: Vec<usize>,
    total_rows: u64,
}

impl CsvTable {
    /// Scan `path` to infer the schema and count data rows.
    ///
    /// **Compression**: gzip and zstd files are detected by extension or magic bytes.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read as CSV, or the id column is absent.
    pub fn open(path: impl AsRef<Path>, options: CsvOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut rdr = csv_reader(&path, &options)?;
        let headers = rdr
            .headers()
            .with_context(|| format!("read CSV header of {}", path.display()))?
            .clone();
        let id_index = match &options.id_column {
            Some(name) => match headers.iter().position(|h| h == name) {
                Some(i) => Some(i),
                None => bail!("id column '{}' not found in {}", name, path.display()),
            },
            None => None,
        };
        let data_indices: Vec<usize> = (0..headers.len()).filter(|i| Some(*i) != id_index).collect();

        let mut guesses = vec![TypeGuess::new(); data_indices.len()];
        let mut total_rows: u64 = 0;
        for (i, rec) in rdr.records().enumerate() {
            let rec = rec.with_context(|| format!("parse CSV record #{}", i + 1))?;
            for (g, &col) in guesses.iter_mut().zip(&data_indices) {
                g.observe(rec.get(col).unwrap_or(""));
            }
            total_rows += 1;
        }

        let columns = data_indices
            .iter()
            .zip(&guesses)
            .map(|(&col, g)| Column::new(&headers[col], g.resolve()))
            .collect();
        let schema = Schema::new(columns)?;
        Ok(Self {
            path,
            options,
            schema,
            id_index,
            data_indices,
            total_rows,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn to_record(&self, index: u64, rec: &csv::StringRecord) -> DedupResult<Record> {
        let id = match self.id_index {
            Some(i) => rec.get(i).unwrap_or("").to_string(),
            None => format!("Row{index}"),
        };
        let mut cells = Vec::with_capacity(self.data_indices.len());
        for (&col, column) in self.data_indices.iter().zip(self.schema.columns()) {
            let raw = rec.get(col).unwrap_or("");
            let cell = parse_cell(raw, column.data_type).ok_or_else(|| {
                DedupError::malformed(
                    "read",
                    id.clone(),
                    format!("'{raw}' is not a valid {} for column '{}'", column.data_type, column.name),
                )
            })?;
            cells.push(cell);
        }
        Ok(Record::new(id, cells))
    }
}

fn csv_reader(path: &Path, options: &CsvOptions) -> Result<csv::Reader<Box<dyn io::Read>>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = auto_detect_reader(f, path)
        .with_context(|| format!("setup decompression for {}", path.display()))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .from_reader(rdr))
}

impl TableSource for CsvTable {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count(&self) -> Option<u64> {
        Some(self.total_rows)
    }

    fn rows(&self) -> DedupResult<RowIter<'_>> {
        let rdr = csv_reader(&self.path, &self.options).map_err(|e| io::Error::other(format!("{e:#}")))?;
        let iter = rdr.into_records().enumerate().map(move |(i, rec)| {
            let rec = rec.map_err(io::Error::from)?;
            self.to_record(i as u64, &rec)
        });
        Ok(Box::new(iter))
    }
}

/// Read a whole CSV file into an in-memory [`Table`].
///
/// # Errors
/// See [`CsvTable::open`]; also fails if a row does not match the inferred schema.
pub fn read_csv_table(path: impl AsRef<Path>, options: CsvOptions) -> Result<Table> {
    let source = CsvTable::open(path, options)?;
    let rows = source.rows()?.collect::<DedupResult<Vec<_>>>()?;
    Ok(Table::new(source.schema().clone(), rows)?)
}

/// [`TableSink`] writing CSV with the row id as first column.
///
/// Rows go to a temp file in the target directory; [`TableSink::finish`] renames it to
/// the target path. Dropping the sink unfinished deletes the temp file.
pub struct CsvSink {
    path: PathBuf,
    options: CsvOptions,
    tmp: Option<NamedTempFile>,
    writer: Option<csv::Writer<Box<dyn Write>>>,
    rows: u64,
}

impl CsvSink {
    pub fn new(path: impl AsRef<Path>, options: CsvOptions) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options,
            tmp: None,
            writer: None,
            rows: 0,
        }
    }

    fn open(&mut self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
                parent.to_path_buf()
            }
            _ => PathBuf::from("."),
        };
        let tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;
        let file = tmp.reopen().context("reopen temp file")?;
        let w = auto_detect_writer(file, &self.path)
            .with_context(|| format!("setup compression for {}", self.path.display()))?;
        self.writer = Some(
            csv::WriterBuilder::new()
                .delimiter(self.options.delimiter)
                .from_writer(w),
        );
        self.tmp = Some(tmp);
        Ok(())
    }
}

fn not_started() -> DedupError {
    DedupError::Io(io::Error::other("CSV sink used before start"))
}

impl TableSink for CsvSink {
    /// Number of data rows written.
    type Output = u64;

    fn start(&mut self, schema: &Schema) -> DedupResult<()> {
        self.open().map_err(|e| io::Error::other(format!("{e:#}")))?;
        let id_header = self.options.id_column.as_deref().unwrap_or(DEFAULT_ID_COLUMN);
        let w = self.writer.as_mut().ok_or_else(not_started)?;
        let header = std::iter::once(id_header).chain(schema.columns().iter().map(|c| c.name.as_str()));
        w.write_record(header).map_err(io::Error::from)?;
        Ok(())
    }

    fn push(&mut self, record: Record) -> DedupResult<()> {
        let w = self.writer.as_mut().ok_or_else(not_started)?;
        let fields = std::iter::once(record.id().to_string())
            .chain(record.cells().iter().map(ToString::to_string));
        w.write_record(fields).map_err(io::Error::from)?;
        self.rows += 1;
        Ok(())
    }

    fn finish(mut self) -> DedupResult<u64> {
        let w = self.writer.take().ok_or_else(not_started)?;
        let mut inner = w.into_inner().map_err(|e| io::Error::other(e.to_string()))?;
        inner.flush()?;
        drop(inner);
        let tmp = self.tmp.take().ok_or_else(not_started)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(self.rows)
    }
}
