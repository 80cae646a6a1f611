//! Batch coordination across quarters.
//!
//! Quarters are discovered by listing the folders under the extracted-data
//! prefix and run concurrently on a dedicated pool sized by
//! [`PipelineConfig::quarter_workers`]. Each worker builds its own
//! [`QuarterProcessor`] (and with it its own indices), so nothing mutable is
//! shared between quarters. A panic in one worker is caught at this boundary
//! and recorded as that quarter's failure.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, panic_message};
use crate::io::cloud::StorageClient;
use crate::quarter::{QuarterOutcome, QuarterProcessor};
use crate::report::BatchReport;
use crate::runner::ExecMode;
use regex::Regex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::LazyLock;
use std::time::Instant;

/// Quarter identifiers are single key segments, e.g. `2016q4`.
static QUARTER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid quarter id regex"));

/// Check that `quarter` can be used as a key segment.
///
/// # Errors
/// Returns [`PipelineError::Config`] for empty identifiers or ones containing
/// separators or other unexpected characters.
pub fn validate_quarter_id(quarter: &str) -> Result<()> {
    if QUARTER_ID.is_match(quarter) {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "invalid quarter identifier {quarter:?}"
        )))
    }
}

#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    storage: StorageClient,
    config: PipelineConfig,
}

impl BatchCoordinator {
    #[must_use]
    pub const fn new(storage: StorageClient, config: PipelineConfig) -> Self {
        Self { storage, config }
    }

    /// Fail fast if the bucket cannot be reached at all.
    ///
    /// # Errors
    /// Returns [`PipelineError::Environment`] if the bucket is missing or
    /// storage is unreachable.
    pub fn check_environment(&self) -> Result<()> {
        match self.storage.bucket_exists() {
            Ok(true) => Ok(()),
            Ok(false) => Err(PipelineError::Environment(format!(
                "bucket {} does not exist",
                self.storage.bucket()
            ))),
            Err(e) => Err(PipelineError::Environment(format!(
                "cannot reach bucket {}: {e}",
                self.storage.bucket()
            ))),
        }
    }

    /// Names of the quarter folders under the extracted-data prefix, sorted.
    ///
    /// # Errors
    /// Returns [`PipelineError::Environment`] if the listing fails.
    pub fn discover_quarters(&self) -> Result<Vec<String>> {
        let prefix = &self.config.extract_prefix;
        let folders = self
            .storage
            .list_prefixes(prefix)
            .map_err(|e| PipelineError::Environment(format!("cannot list {prefix}: {e}")))?;

        let mut quarters = Vec::with_capacity(folders.len());
        for folder in folders {
            let name = folder
                .strip_prefix(prefix.as_str())
                .unwrap_or(&folder)
                .trim_end_matches('/');
            match validate_quarter_id(name) {
                Ok(()) => quarters.push(name.to_string()),
                Err(e) => log::warn!("ignoring folder {folder}: {e}"),
            }
        }
        Ok(quarters)
    }

    /// Process every discoverable quarter.
    ///
    /// # Errors
    /// Only environment errors are returned; every per-quarter problem is
    /// recorded in the report instead.
    pub fn run_all(&self) -> Result<BatchReport> {
        self.check_environment()?;
        let quarters = self.discover_quarters()?;
        if quarters.is_empty() {
            log::warn!(
                "no quarter folders found under {}",
                self.config.extract_prefix
            );
            return Ok(BatchReport::default());
        }
        log::info!(
            "found {} quarters; processing with {} workers",
            quarters.len(),
            self.config.quarter_workers
        );
        Ok(self.run_quarters(&quarters))
    }

    /// Process one named quarter.
    ///
    /// # Errors
    /// Returns an error if the identifier is invalid or the environment check fails.
    pub fn run_one(&self, quarter: &str) -> Result<QuarterOutcome> {
        validate_quarter_id(quarter)?;
        self.check_environment()?;
        Ok(self.isolated(quarter))
    }

    /// Process the given quarters concurrently and summarize the outcomes.
    #[must_use]
    pub fn run_quarters(&self, quarters: &[String]) -> BatchReport {
        let started = Instant::now();
        let mode = ExecMode::Parallel {
            threads: Some(self.config.quarter_workers),
        };
        let outcomes = mode.map_collect("quarter", quarters, |quarter| self.isolated(quarter));
        let report = BatchReport::from_outcomes(outcomes, started.elapsed());
        log::info!(
            "{} of {} quarters succeeded ({} skipped, {} failed)",
            report.succeeded,
            report.attempted,
            report.skipped,
            report.failed
        );
        report
    }

    fn isolated(&self, quarter: &str) -> QuarterOutcome {
        let processor = QuarterProcessor::new(self.storage.clone(), self.config.clone());
        catch_unwind(AssertUnwindSafe(|| processor.process(quarter))).unwrap_or_else(|payload| {
            let err = PipelineError::QuarterPanicked {
                quarter: quarter.to_string(),
                message: panic_message(payload.as_ref()),
            };
            log::error!("{err}");
            QuarterOutcome::Failed {
                quarter: quarter.to_string(),
                state: None,
                error: err.to_string(),
            }
        })
    }
}
