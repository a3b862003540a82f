//! Testing utilities for duplicate row filtering.
//!
//! - **Fixtures**: small hand-written tables for the classic scenarios, plus a
//!   deterministic generator for larger inputs
//! - **Assertions**: the properties every filter output must satisfy, checked against
//!   the input and the configuration that produced it
//!
//! # Quick Start
//!
//! ```
//! use rowdedup::testing::*;
//! use rowdedup::{DedupConfig, DuplicateRowFilter};
//!
//! # fn main() -> rowdedup::Result<()> {
//! let input = scenario_table();
//! let config = DedupConfig::new(["k"]);
//! let output = DuplicateRowFilter::new(config.clone())?.run(&input)?;
//!
//! assert_row_ids(&output, &["r1", "r3"]);
//! assert_dedup_invariants(&input, &output, &config);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
