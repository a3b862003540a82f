//! File-backed table sources and sinks.

pub mod compression;

#[cfg(feature = "io-jsonl")]
pub mod jsonl;

#[cfg(feature = "io-csv")]
pub mod csv;
