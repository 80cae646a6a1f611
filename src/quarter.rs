//! Quarter processing: load four tables, transform every submission, upload
//! one JSON array.
//!
//! A quarter moves through
//! `Discovered → Loading → (LoadFailed | Loaded) → Transforming → Aggregated →
//! Uploading → (UploadFailed | Done)`. A load failure skips the quarter, an
//! upload failure fails it; neither is raised past [`QuarterProcessor::process`].

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::io::cloud::StorageClient;
use crate::io::tsv::{Table, read_table};
use crate::model::{FinancialDocument, columns};
use crate::transform::QuarterTables;
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fmt;
use std::time::Instant;

/// A source table and the columns read from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTable {
    pub file: &'static str,
    pub columns: &'static [&'static str],
}

pub const SUBMISSIONS: SourceTable = SourceTable {
    file: "sub.txt",
    columns: &[
        columns::ACCESSION,
        columns::NAME,
        columns::COUNTRY,
        columns::CITY,
        columns::FISCAL_YEAR,
        columns::FISCAL_PERIOD,
    ],
};

pub const NUMERIC_FACTS: SourceTable = SourceTable {
    file: "num.txt",
    columns: &[columns::ACCESSION, columns::TAG, columns::VALUE, columns::UNIT],
};

pub const PRESENTATION: SourceTable = SourceTable {
    file: "pre.txt",
    columns: &[columns::ACCESSION, columns::TAG, columns::STATEMENT],
};

pub const TAGS: SourceTable = SourceTable {
    file: "tag.txt",
    columns: &[columns::TAG, columns::LABEL],
};

/// The four tables every quarter must provide.
pub const SOURCE_TABLES: [SourceTable; 4] = [SUBMISSIONS, NUMERIC_FACTS, PRESENTATION, TAGS];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarterState {
    Discovered,
    Loading,
    LoadFailed,
    Loaded,
    Transforming,
    Aggregated,
    Uploading,
    UploadFailed,
    Done,
}

impl fmt::Display for QuarterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discovered => "discovered",
            Self::Loading => "loading",
            Self::LoadFailed => "load_failed",
            Self::Loaded => "loaded",
            Self::Transforming => "transforming",
            Self::Aggregated => "aggregated",
            Self::Uploading => "uploading",
            Self::UploadFailed => "upload_failed",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Counters for a quarter that reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterStats {
    pub quarter: String,
    pub artifact_key: String,
    pub submissions: usize,
    pub documents: usize,
    pub failed_rows: usize,
    pub line_items: usize,
    pub bytes: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuarterOutcome {
    Done(QuarterStats),
    Skipped {
        quarter: String,
        reason: String,
    },
    Failed {
        quarter: String,
        /// State the quarter was in when it failed; `None` if its worker panicked.
        state: Option<QuarterState>,
        error: String,
    },
}

impl QuarterOutcome {
    #[must_use]
    pub fn quarter(&self) -> &str {
        match self {
            Self::Done(stats) => &stats.quarter,
            Self::Skipped { quarter, .. } | Self::Failed { quarter, .. } => quarter,
        }
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Tracks and logs a quarter's progress through its states.
struct Progress<'a> {
    quarter: &'a str,
    state: QuarterState,
}

impl Progress<'_> {
    fn advance(&mut self, next: QuarterState) {
        log::debug!("{}: {} -> {next}", self.quarter, self.state);
        self.state = next;
    }
}

/// Runs one quarter end to end against an injected storage client.
#[derive(Debug, Clone)]
pub struct QuarterProcessor {
    storage: StorageClient,
    config: PipelineConfig,
}

impl QuarterProcessor {
    #[must_use]
    pub const fn new(storage: StorageClient, config: PipelineConfig) -> Self {
        Self { storage, config }
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process `quarter`. Re-running overwrites the previous artifact.
    #[must_use]
    pub fn process(&self, quarter: &str) -> QuarterOutcome {
        let mut progress = Progress {
            quarter,
            state: QuarterState::Discovered,
        };
        log::info!("processing quarter {quarter}");

        match self.run(&mut progress) {
            Ok(stats) => {
                log::info!(
                    "quarter {quarter} done: {} documents ({} submissions failed) -> {}",
                    stats.documents,
                    stats.failed_rows,
                    stats.artifact_key
                );
                QuarterOutcome::Done(stats)
            }
            Err(e) if e.is_skip() => {
                progress.advance(QuarterState::LoadFailed);
                log::warn!("skipping quarter {quarter}: {e}");
                QuarterOutcome::Skipped {
                    quarter: quarter.to_string(),
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                let failed_in = progress.state;
                if failed_in == QuarterState::Uploading {
                    progress.advance(QuarterState::UploadFailed);
                }
                log::error!("quarter {quarter} failed while {failed_in}: {e}");
                QuarterOutcome::Failed {
                    quarter: quarter.to_string(),
                    state: Some(failed_in),
                    error: e.to_string(),
                }
            }
        }
    }

    fn run(&self, progress: &mut Progress<'_>) -> Result<QuarterStats> {
        let started = Instant::now();
        let quarter = progress.quarter;

        progress.advance(QuarterState::Loading);
        let tables = self.load(quarter)?;
        progress.advance(QuarterState::Loaded);

        progress.advance(QuarterState::Transforming);
        let (documents, failed_rows) = self.transform_all(&tables);
        progress.advance(QuarterState::Aggregated);
        if failed_rows > 0 {
            log::warn!(
                "{quarter}: {failed_rows} of {} submissions failed to transform",
                tables.submissions.len()
            );
        }

        let body = render_documents(quarter, &documents)?;
        let bytes = body.len();
        let artifact_key = self.config.artifact_key(quarter);

        progress.advance(QuarterState::Uploading);
        self.storage
            .put(&artifact_key, body)
            .map_err(|e| PipelineError::sink_unavailable(&artifact_key, &e))?;
        progress.advance(QuarterState::Done);

        Ok(QuarterStats {
            quarter: quarter.to_string(),
            artifact_key,
            submissions: tables.submissions.len(),
            documents: documents.len(),
            failed_rows,
            line_items: documents.iter().map(|d| d.data.len()).sum(),
            bytes,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Fetch and index the quarter's four tables.
    ///
    /// # Errors
    /// - [`PipelineError::NoSourceFiles`] if the quarter prefix is empty
    /// - [`PipelineError::SourceUnavailable`] if a table cannot be fetched
    /// - [`PipelineError::EmptySource`] if a table has no data rows
    pub fn load(&self, quarter: &str) -> Result<QuarterTables> {
        let prefix = self.config.quarter_prefix(quarter);
        let files = self
            .storage
            .list(&prefix)
            .map_err(|e| PipelineError::source_unavailable(&prefix, &e))?;
        if files.is_empty() {
            return Err(PipelineError::NoSourceFiles { prefix });
        }
        log::debug!(
            "{quarter}: {:?}",
            files.iter().map(|f| f.key.as_str()).collect::<Vec<_>>()
        );

        let load = |source: SourceTable| -> Result<Table> {
            let key = format!("{prefix}{}", source.file);
            let table = read_table(&self.storage, &key)?;
            if table.is_empty() {
                return Err(PipelineError::EmptySource { key });
            }
            warn_missing_columns(&key, &table, source.columns);
            Ok(table)
        };
        let ((sub, num), (pre, tag)) = rayon::join(
            || rayon::join(|| load(SUBMISSIONS), || load(NUMERIC_FACTS)),
            || rayon::join(|| load(PRESENTATION), || load(TAGS)),
        );
        Ok(QuarterTables::from_tables(&sub?, &num?, &pre?, &tag?))
    }

    /// Transform every submission; returns the documents and the failure count.
    #[must_use]
    pub fn transform_all(&self, tables: &QuarterTables) -> (Vec<FinancialDocument>, usize) {
        let results = self
            .config
            .row_mode
            .map_collect("rows", &tables.submissions, |sub| {
                tables.transform_or_skip(sub)
            });
        let total = results.len();
        let documents: Vec<FinancialDocument> = results.into_iter().flatten().collect();
        let failed = total - documents.len();
        (documents, failed)
    }
}

fn warn_missing_columns(key: &str, table: &Table, expected: &[&str]) {
    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|c| !table.has_column(c))
        .collect();
    if !missing.is_empty() {
        log::warn!("{key} is missing columns {missing:?}");
    }
}

/// Serialize documents as a JSON array indented by four spaces.
///
/// # Errors
/// Returns [`PipelineError::Serialization`] if a document cannot be serialized.
pub fn render_documents(quarter: &str, documents: &[FinancialDocument]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    documents
        .serialize(&mut ser)
        .map_err(|source| PipelineError::Serialization {
            quarter: quarter.to_string(),
            source,
        })?;
    Ok(buf)
}
