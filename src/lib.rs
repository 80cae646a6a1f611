//! # edgarflow
//!
//! Converts SEC EDGAR quarterly financial-statement datasets into one JSON
//! document per filing.
//!
//! Each quarter ships four tab-separated tables: submissions (`sub.txt`),
//! numeric facts (`num.txt`), presentation (`pre.txt`) and tag definitions
//! (`tag.txt`). The pipeline joins them on the accession number and writes a
//! single JSON array per quarter, where every element looks like
//!
//! ```json
//! { "symbol": "ACME CORP", "name": "ACME CORP", "country": "US", "city": "BOSTON",
//!   "year": 2016, "quarter": "Q4",
//!   "data": { "bs": [ { "concept": "Assets", "label": "Total Assets", "value": 5000, "unit": "USD" } ],
//!             "cf": [], "ic": [] } }
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use edgarflow::*;
//! use edgarflow::io::cloud::FakeObjectIO;
//! use edgarflow::testing::{sample_quarter, test_client, test_config};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let storage = Arc::new(FakeObjectIO::new());
//! let config = test_config();
//! sample_quarter("2016q4").seed(storage.as_ref(), &config.bucket, &config.extract_prefix)?;
//!
//! let coordinator = BatchCoordinator::new(test_client(storage.clone(), &config), config);
//! let report = coordinator.run_all()?;
//! assert_eq!(report.succeeded, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure isolation
//!
//! - A submission that cannot be transformed is dropped and logged; its
//!   siblings are unaffected.
//! - A quarter with a missing or empty table is skipped; a quarter whose
//!   artifact cannot be written is failed. Other quarters continue either way.
//! - Only an unreachable bucket or invalid configuration stops a batch, and it
//!   does so before any quarter starts.
//!
//! ## Concurrency
//!
//! Quarters run concurrently on a dedicated rayon pool
//! ([`PipelineConfig::quarter_workers`]); submissions within a quarter are
//! fanned out according to [`PipelineConfig::row_mode`]. Row workers share
//! only read-only indices and results are gathered after the parallel map, so
//! no locking is involved.
//!
//! ## Module Overview
//!
//! - [`io::tsv`] - table reader
//! - [`io::cloud`] - object storage trait, fake and filesystem backends, retry/timeout
//! - [`coerce`] - tolerant integer coercion
//! - [`model`] - source records and output documents
//! - [`transform`] - per-submission join
//! - [`quarter`] - one quarter end to end
//! - [`batch`] - discovery and parallel scheduling of quarters
//! - [`extract`] - unpacking raw quarterly archives (feature `extract`)

pub mod batch;
pub mod coerce;
pub mod config;
pub mod error;
#[cfg_attr(docsrs, doc(cfg(feature = "extract")))]
#[cfg(feature = "extract")]
pub mod extract;
pub mod io;
pub mod model;
pub mod quarter;
pub mod report;
pub mod runner;
pub mod testing;
pub mod transform;

pub use batch::{BatchCoordinator, validate_quarter_id};
pub use coerce::coerce_int;
pub use config::{PipelineConfig, StorageConfig};
pub use error::PipelineError;
pub use io::cloud::{LocalObjectIO, ObjectIO, StorageClient};
pub use io::tsv::{Table, read_table, read_tsv};
pub use model::{FinancialDocument, LineItem, StatementType, Statements, Submission};
pub use quarter::{QuarterOutcome, QuarterProcessor, QuarterState, QuarterStats};
pub use report::BatchReport;
pub use runner::ExecMode;
pub use transform::{PresentationIndex, QuarterTables, TagIndex, transform};
