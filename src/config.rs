//! Pipeline configuration.
//!
//! Values come from the environment (see [`PipelineConfig::from_env`]) and can
//! be overridden field by field by the caller. Loading fails fast on a missing
//! bucket or storage root, before any quarter is touched.

use crate::error::PipelineError;
use crate::io::cloud::CloudConfig;
use crate::io::cloud::helpers::{validate_bucket_name, validate_key_path};
use crate::runner::ExecMode;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_ZIP_PREFIX: &str = "sec_raw_zips/";
pub const DEFAULT_EXTRACT_PREFIX: &str = "sec_extracted_tsv/";
pub const DEFAULT_JSON_PREFIX: &str = "sec_json_data/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Settings for the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Root directory for the filesystem backend.
    pub root: PathBuf,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl CloudConfig for StorageConfig {
    fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub bucket: String,
    /// Raw quarterly archives, `<quarter>.zip`.
    pub zip_prefix: String,
    /// Extracted tables, `<quarter>/{sub,num,pre,tag}.txt`.
    pub extract_prefix: String,
    /// Output artifacts, `<quarter>.json`.
    pub json_prefix: String,
    /// Quarters processed at once.
    pub quarter_workers: usize,
    /// How submissions within one quarter are fanned out.
    pub row_mode: ExecMode,
    pub storage: StorageConfig,
}

impl PipelineConfig {
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            zip_prefix: DEFAULT_ZIP_PREFIX.to_string(),
            extract_prefix: DEFAULT_EXTRACT_PREFIX.to_string(),
            json_prefix: DEFAULT_JSON_PREFIX.to_string(),
            quarter_workers: num_cpus::get().max(1),
            row_mode: ExecMode::default(),
            storage: StorageConfig::default(),
        }
    }

    /// Build from environment variables.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `S3_BUCKET_NAME` | bucket (required) |
    /// | `EDGAR_STORAGE_ROOT` | filesystem storage root (required) |
    /// | `EDGAR_ZIP_PREFIX`, `EDGAR_EXTRACT_PREFIX`, `EDGAR_JSON_PREFIX` | key prefixes |
    /// | `EDGAR_QUARTER_WORKERS` | concurrent quarters (default: CPU count) |
    /// | `EDGAR_ROW_WORKERS` | row pool size, `0` for sequential (default: shared pool) |
    /// | `EDGAR_STORAGE_TIMEOUT_SECS` | per storage call deadline (default 60) |
    /// | `EDGAR_MAX_RETRIES` | attempts per storage call (default 3) |
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] for a missing required variable or an
    /// unparsable number, or if the result fails [`PipelineConfig::validate`].
    pub fn from_env() -> Result<Self, PipelineError> {
        let bucket = required("S3_BUCKET_NAME")?;
        let mut config = Self::new(bucket);
        config.storage.root = PathBuf::from(required("EDGAR_STORAGE_ROOT")?);

        if let Some(v) = optional("EDGAR_ZIP_PREFIX") {
            config.zip_prefix = v;
        }
        if let Some(v) = optional("EDGAR_EXTRACT_PREFIX") {
            config.extract_prefix = v;
        }
        if let Some(v) = optional("EDGAR_JSON_PREFIX") {
            config.json_prefix = v;
        }
        if let Some(n) = parsed::<usize>("EDGAR_QUARTER_WORKERS")? {
            config.quarter_workers = n;
        }
        if let Some(n) = parsed::<usize>("EDGAR_ROW_WORKERS")? {
            config.row_mode = ExecMode::from_threads(n);
        }
        if let Some(n) = parsed::<u64>("EDGAR_STORAGE_TIMEOUT_SECS")? {
            config.storage.timeout_secs = n;
        }
        if let Some(n) = parsed::<u32>("EDGAR_MAX_RETRIES")? {
            config.storage.max_retries = n;
        }

        config.validate()
    }

    /// Normalize prefixes to end in `/` and check names and counts.
    ///
    /// # Errors
    /// Returns [`PipelineError::Config`] describing the first invalid setting.
    pub fn validate(mut self) -> Result<Self, PipelineError> {
        validate_bucket_name(&self.bucket)
            .map_err(|e| PipelineError::Config(format!("bucket {:?}: {}", self.bucket, e.message)))?;
        for prefix in [
            &mut self.zip_prefix,
            &mut self.extract_prefix,
            &mut self.json_prefix,
        ] {
            validate_key_path(prefix)
                .map_err(|e| PipelineError::Config(format!("prefix {prefix:?}: {}", e.message)))?;
            if !prefix.ends_with('/') {
                prefix.push('/');
            }
        }
        if self.quarter_workers == 0 {
            return Err(PipelineError::Config(
                "quarter workers must be at least 1".into(),
            ));
        }
        if self.storage.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "storage timeout must be at least 1 second".into(),
            ));
        }
        Ok(self)
    }

    /// Prefix holding one quarter's extracted tables.
    #[must_use]
    pub fn quarter_prefix(&self, quarter: &str) -> String {
        format!("{}{quarter}/", self.extract_prefix)
    }

    /// Key of one quarter's JSON artifact.
    #[must_use]
    pub fn artifact_key(&self, quarter: &str) -> String {
        format!("{}{quarter}.json", self.json_prefix)
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(name: &str) -> Result<String, PipelineError> {
    optional(name).ok_or_else(|| PipelineError::Config(format!("{name} is not set")))
}

fn parsed<T: FromStr>(name: &str) -> Result<Option<T>, PipelineError>
where
    T::Err: std::fmt::Display,
{
    optional(name)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| PipelineError::Config(format!("{name}={v:?}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_normalizes_prefixes() {
        let mut config = PipelineConfig::new("bucket");
        config.extract_prefix = "tsv".into();
        let config = config.validate().unwrap();
        assert_eq!(config.extract_prefix, "tsv/");
        assert_eq!(config.quarter_prefix("2016q4"), "tsv/2016q4/");
        assert_eq!(config.artifact_key("2016q4"), "sec_json_data/2016q4.json");
    }

    #[test]
    fn validate_rejects_bad_settings() {
        assert!(PipelineConfig::new("").validate().is_err());
        assert!(PipelineConfig::new("has space").validate().is_err());

        let mut config = PipelineConfig::new("bucket");
        config.json_prefix = "/abs/".into();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::new("bucket");
        config.quarter_workers = 0;
        assert!(config.validate().is_err());
    }
}
