//! Batch summaries.
//!
//! A [`BatchReport`] is the user-visible result of a run: how many quarters
//! were attempted, done, skipped and failed, plus each quarter's outcome
//! (including how many submissions it dropped). It can be printed or saved as
//! JSON.

use crate::quarter::QuarterOutcome;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Submissions dropped across all completed quarters.
    pub failed_rows: usize,
    pub elapsed_ms: u64,
    pub outcomes: Vec<QuarterOutcome>,
}

impl BatchReport {
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<QuarterOutcome>, elapsed: Duration) -> Self {
        let count = |pred: fn(&QuarterOutcome) -> bool| outcomes.iter().filter(|o| pred(o)).count();
        let failed_rows = outcomes
            .iter()
            .map(|o| match o {
                QuarterOutcome::Done(stats) => stats.failed_rows,
                _ => 0,
            })
            .sum();
        Self {
            attempted: outcomes.len(),
            succeeded: count(QuarterOutcome::is_done),
            skipped: count(QuarterOutcome::is_skipped),
            failed: count(QuarterOutcome::is_failed),
            failed_rows,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            outcomes,
        }
    }

    /// Quarters that completed, in report order.
    pub fn succeeded_quarters(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_done())
            .map(QuarterOutcome::quarter)
    }

    #[must_use]
    pub fn outcome(&self, quarter: &str) -> Option<&QuarterOutcome> {
        self.outcomes.iter().find(|o| o.quarter() == quarter)
    }

    /// True when at least one quarter was attempted and every attempt failed.
    #[must_use]
    pub const fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }

    /// Log the summary, one line per quarter.
    pub fn print(&self) {
        log::info!(
            "batch finished in {:.3}s: {} attempted, {} succeeded, {} skipped, {} failed, {} submissions dropped",
            Duration::from_millis(self.elapsed_ms).as_secs_f64(),
            self.attempted,
            self.succeeded,
            self.skipped,
            self.failed,
            self.failed_rows
        );
        for outcome in &self.outcomes {
            match outcome {
                QuarterOutcome::Done(s) => log::info!(
                    "  {}: done, {}/{} submissions, {} line items, {} bytes -> {}",
                    s.quarter,
                    s.documents,
                    s.submissions,
                    s.line_items,
                    s.bytes,
                    s.artifact_key
                ),
                QuarterOutcome::Skipped { quarter, reason } => {
                    log::warn!("  {quarter}: skipped ({reason})");
                }
                QuarterOutcome::Failed { quarter, error, .. } => {
                    log::error!("  {quarter}: failed ({error})");
                }
            }
        }
    }

    /// # Errors
    /// Returns an error if the report cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize batch report")
    }

    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
