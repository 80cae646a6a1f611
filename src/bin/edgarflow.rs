//! `edgarflow` command-line entry point.
//!
//! Usage:
//!   edgarflow --bucket my-bucket --root /data run
//!   edgarflow quarter 2016q4
//!   edgarflow extract
//!
//! Every flag can also come from the environment (or a `.env` file), e.g.
//! `S3_BUCKET_NAME` and `EDGAR_STORAGE_ROOT`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use edgarflow::config::{
    DEFAULT_EXTRACT_PREFIX, DEFAULT_JSON_PREFIX, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS,
    DEFAULT_ZIP_PREFIX,
};
use edgarflow::{
    BatchCoordinator, BatchReport, ExecMode, LocalObjectIO, PipelineConfig, QuarterOutcome,
    StorageClient,
};

/// Convert SEC EDGAR quarterly datasets into per-quarter JSON documents
#[derive(Parser, Debug)]
#[command(name = "edgarflow", version)]
struct Cli {
    /// Bucket holding the raw, extracted and JSON data
    #[arg(long, env = "S3_BUCKET_NAME")]
    bucket: String,

    /// Directory whose subdirectories are buckets
    #[arg(long, env = "EDGAR_STORAGE_ROOT")]
    root: PathBuf,

    #[arg(long, env = "EDGAR_ZIP_PREFIX", default_value = DEFAULT_ZIP_PREFIX)]
    zip_prefix: String,

    #[arg(long, env = "EDGAR_EXTRACT_PREFIX", default_value = DEFAULT_EXTRACT_PREFIX)]
    extract_prefix: String,

    #[arg(long, env = "EDGAR_JSON_PREFIX", default_value = DEFAULT_JSON_PREFIX)]
    json_prefix: String,

    /// Quarters processed at once (default: number of CPUs)
    #[arg(long, env = "EDGAR_QUARTER_WORKERS")]
    quarter_workers: Option<usize>,

    /// Row pool size per quarter; 0 processes submissions sequentially
    #[arg(long, env = "EDGAR_ROW_WORKERS")]
    row_workers: Option<usize>,

    /// Deadline for a single storage call, in seconds
    #[arg(long, env = "EDGAR_STORAGE_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Attempts per storage call
    #[arg(long, env = "EDGAR_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Also write the run summary as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every quarter found under the extract prefix
    Run,
    /// Process a single quarter
    Quarter {
        /// Quarter identifier, e.g. 2016q4
        id: String,
    },
    /// Unpack raw ZIP archives into the extract prefix
    #[cfg(feature = "extract")]
    Extract,
}

impl Cli {
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::new(self.bucket.clone());
        config.storage.root.clone_from(&self.root);
        config.zip_prefix.clone_from(&self.zip_prefix);
        config.extract_prefix.clone_from(&self.extract_prefix);
        config.json_prefix.clone_from(&self.json_prefix);
        if let Some(n) = self.quarter_workers {
            config.quarter_workers = n;
        }
        if let Some(n) = self.row_workers {
            config.row_mode = ExecMode::from_threads(n);
        }
        config.storage.timeout_secs = self.timeout_secs;
        config.storage.max_retries = self.max_retries;
        Ok(config.validate()?)
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = cli.config()?;
    let io = LocalObjectIO::open(&config.storage.root)
        .with_context(|| format!("open storage root {}", config.storage.root.display()))?;
    let storage = StorageClient::new(Arc::new(io), config.bucket.clone(), &config.storage);
    log::info!(
        "bucket {} at {}, {} quarter workers, rows {:?}",
        config.bucket,
        config.storage.root.display(),
        config.quarter_workers,
        config.row_mode
    );

    match &cli.command {
        Command::Run => {
            let report = BatchCoordinator::new(storage, config).run_all()?;
            finish(&report, cli.report.as_deref())
        }
        Command::Quarter { id } => {
            let outcome = BatchCoordinator::new(storage, config).run_one(id)?;
            let report = BatchReport::from_outcomes(vec![outcome], std::time::Duration::ZERO);
            finish(&report, cli.report.as_deref())
        }
        #[cfg(feature = "extract")]
        Command::Extract => {
            let report = edgarflow::extract::extract_all(&storage, &config)
                .context("list raw archives")?;
            log::info!(
                "extracted {} files from {} archives ({} failed)",
                report.extracted_files,
                report.archives,
                report.failed.len()
            );
            if let Some(path) = &cli.report {
                let json = serde_json::to_string_pretty(&report)?;
                std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
            }
            let all_failed = report.archives > 0 && report.failed.len() == report.archives;
            Ok(if all_failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

fn finish(report: &BatchReport, path: Option<&std::path::Path>) -> Result<ExitCode> {
    report.print();
    if let Some(path) = path {
        report.save_to_file(path)?;
        log::info!("report written to {}", path.display());
    }
    if report.all_failed() {
        let first = report.outcomes.iter().find_map(|o| match o {
            QuarterOutcome::Failed { error, .. } => Some(error.as_str()),
            _ => None,
        });
        log::error!("every quarter failed; first error: {}", first.unwrap_or("unknown"));
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
