//! Progress reporting and cooperative cancellation.
//!
//! An [`ExecutionContext`] is created by the caller and handed to
//! [`DuplicateRowFilter::execute`](crate::DuplicateRowFilter::execute). Each pipeline
//! stage asks it for a [`StageMonitor`] owning a slice of the overall progress range;
//! the monitor checks for cancellation and reports progress every
//! [`CHECK_INTERVAL`] rows.
//!
//! # Example
//!
//! ```
//! use rowdedup::progress::{CancellationToken, ExecutionContext};
//!
//! let token = CancellationToken::new();
//! let ctx = ExecutionContext::new()
//!     .with_cancellation(token.clone())
//!     .with_progress(|fraction, message| eprintln!("{:5.1}% {message}", fraction * 100.0));
//! token.cancel();
//! assert!(ctx.is_cancelled());
//! ```

use crate::error::{DedupError, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Rows processed between two cancellation checks.
pub const CHECK_INTERVAL: u64 = 1024;

type ProgressFn = dyn Fn(f64, &str) + Send + Sync;

/// Shared flag a caller flips to request a clean abort.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Cancellation and progress plumbing for one execution.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    token: CancellationToken,
    progress: Option<Arc<ProgressFn>>,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("cancelled", &self.token.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl ExecutionContext {
    /// Context with no listener and a token nobody else holds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Install a listener receiving `(fraction in [0, 1], message)`.
    #[must_use]
    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, &str) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail with [`DedupError::Cancelled`] if cancellation was requested.
    ///
    /// # Errors
    /// Returns [`DedupError::Cancelled`] tagged with `stage`.
    pub fn check(&self, stage: &'static str) -> Result<()> {
        if self.token.is_cancelled() {
            Err(DedupError::Cancelled { stage })
        } else {
            Ok(())
        }
    }

    pub(crate) fn report(&self, fraction: f64, message: &str) {
        if let Some(f) = &self.progress {
            f(fraction.clamp(0.0, 1.0), message);
        }
    }

    /// Monitor for a stage covering `[offset, offset + weight)` of overall progress.
    ///
    /// `expected_rows` is only used to scale progress; `None` reports the stage
    /// as complete only when it finishes.
    #[must_use]
    pub fn stage(
        &self,
        name: &'static str,
        offset: f64,
        weight: f64,
        expected_rows: Option<u64>,
    ) -> StageMonitor {
        StageMonitor {
            ctx: self.clone(),
            name,
            offset,
            weight,
            expected_rows,
            seen: 0,
        }
    }
}

/// Per-stage row counter that checks cancellation at a bounded row interval.
#[derive(Debug)]
pub struct StageMonitor {
    ctx: ExecutionContext,
    name: &'static str,
    offset: f64,
    weight: f64,
    expected_rows: Option<u64>,
    seen: u64,
}

impl StageMonitor {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn rows_seen(&self) -> u64 {
        self.seen
    }

    /// Count one row; every [`CHECK_INTERVAL`] rows check cancellation and report.
    ///
    /// # Errors
    /// Returns [`DedupError::Cancelled`] once cancellation has been requested.
    pub fn tick(&mut self) -> Result<()> {
        self.seen += 1;
        if self.seen.is_multiple_of(CHECK_INTERVAL) {
            self.checkpoint()?;
            self.report_progress();
        }
        Ok(())
    }

    /// Unconditional cancellation check.
    ///
    /// # Errors
    /// Returns [`DedupError::Cancelled`] once cancellation has been requested.
    pub fn checkpoint(&self) -> Result<()> {
        self.ctx.check(self.name)
    }

    /// Report this stage as fully done.
    pub fn finish(&self) {
        self.ctx
            .report(self.offset + self.weight, &format!("{}: {} rows", self.name, self.seen));
    }

    #[allow(clippy::cast_precision_loss)]
    fn report_progress(&self) {
        let Some(total) = self.expected_rows.filter(|t| *t > 0) else {
            return;
        };
        let local = (self.seen as f64 / total as f64).min(1.0);
        self.ctx.report(
            self.offset + local * self.weight,
            &format!("{}: row {} of {}", self.name, self.seen, total),
        );
    }
}
