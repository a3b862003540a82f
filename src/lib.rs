//! # rowdedup
//!
//! **Sort-based duplicate row detection** for tabular data. Rows that agree on a set of
//! group columns form a group; one row per group is chosen as representative, and the
//! others are either removed or annotated as duplicates of it.
//!
//! ## Key Features
//!
//! - **Bounded memory** - grouping is done by sorting, with an external merge sort that
//!   spills runs to temp files
//! - **Tie-breaking** - keep the first, last, minimum, or maximum row of each group
//! - **Two output modes** - drop duplicates, or keep every row and append a
//!   classification label and/or the representative's row id
//! - **Order retention** - optionally restore input order after grouping
//! - **Cooperative cancellation and progress** - via [`ExecutionContext`]
//! - **I/O integrations** - CSV and JSON Lines, with gzip/zstd (optional via feature flags)
//!
//! ## Quick Start
//!
//! ```
//! use rowdedup::*;
//!
//! # fn main() -> rowdedup::Result<()> {
//! let schema = Schema::new(vec![Column::new("email", DataType::Str)])?;
//! let input = Table::new(schema, vec![
//!     Record::new("r1", vec![Cell::from("a@x")]),
//!     Record::new("r2", vec![Cell::from("a@x")]),
//!     Record::new("r3", vec![Cell::from("b@x")]),
//! ])?;
//!
//! let filter = DuplicateRowFilter::new(DedupConfig::new(["email"]))?;
//! let output = filter.run(&input)?;
//! assert_eq!(output.row_ids(), ["r1", "r3"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Pipeline
//!
//! [`DuplicateRowFilter::execute`] streams rows from a [`TableSource`] through four
//! stages into a [`TableSink`]:
//! - [`tagger`] - append a row sequence number, when order must be recovered later
//! - [`sort`] - sort by group key, then by tie-break key
//! - [`classify`] - one pass over the sorted stream, holding only the current group's
//!   representative
//! - [`restore`] - sort back by sequence number and drop it
//!
//! ### Annotations
//!
//! In annotate mode each output row carries a [`Classification`]: `unique` (group of
//! one), `chosen` (the representative), or `duplicate`. The reference column holds the
//! chosen row's id on duplicates and is empty otherwise.
//!
//! ## I/O Operations
//!
//! ### CSV (feature: `io-csv`)
//! ```ignore
//! use rowdedup::*;
//! use rowdedup::io::csv::{CsvOptions, CsvSink, CsvTable};
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = CsvTable::open("customers.csv.gz", CsvOptions::default())?;
//! let filter = DuplicateRowFilter::new(DedupConfig::new(["email"]))?;
//! let sink = CsvSink::new("deduped.csv", CsvOptions::default());
//! let (_rows, report) = filter.execute(&source, sink, &ExecutionContext::new())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `io-csv` | CSV table source and sink |
//! | `io-jsonl` | JSON Lines reading and writing |
//! | `compression-gzip` | Transparent gzip for table files |
//! | `compression-zstd` | Transparent zstd for table files |
//! | `spilling` | External sort with runs spilled to temp files |
//!
//! All features are enabled by default.
//!
//! ## Logging
//!
//! Stages log through [`tracing`]; install a subscriber to see them.

pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod io;
pub mod progress;
pub mod record;
pub mod restore;
pub mod schema;
pub mod sort;
pub mod table;
pub mod tagger;
pub mod testing;
pub mod value;

// General re-exports
pub use classify::Classification;
pub use config::{DedupConfig, TieBreak};
pub use error::{DedupError, Result};
pub use filter::{DedupReport, DuplicateRowFilter};
pub use progress::{CancellationToken, ExecutionContext};
pub use record::Record;
pub use schema::{Column, Schema};
pub use table::{Table, TableBuilder, TableSink, TableSource};
pub use value::{Cell, DataType};

// Gated re-exports
#[cfg(feature = "io-csv")]
pub use io::csv::{CsvOptions, CsvSink, CsvTable, read_csv_table};

#[cfg(feature = "io-jsonl")]
pub use io::jsonl::{JsonlSink, read_jsonl_table, write_jsonl_table};
