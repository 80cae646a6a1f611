//! Unpack raw quarterly archives into per-quarter table prefixes.
//!
//! Every `<quarter>.zip` under [`PipelineConfig::zip_prefix`] is read into
//! memory and each file entry is written to
//! `{extract_prefix}<quarter>/<entry>`, which is where the quarter processor
//! looks for its tables. An archive that cannot be fetched or opened is
//! logged and counted; the remaining archives still run.

use crate::config::PipelineConfig;
use crate::io::cloud::{CloudIOError, StorageClient};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use thiserror::Error;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cannot fetch {key}: {source}")]
    Fetch { key: String, source: CloudIOError },

    #[error("cannot open archive {key}: {source}")]
    Archive {
        key: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot read entry {entry} of {key}: {source}")]
    Entry {
        key: String,
        entry: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot upload {key}: {source}")]
    Upload { key: String, source: CloudIOError },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractReport {
    pub archives: usize,
    pub extracted_files: usize,
    pub quarters: Vec<String>,
    pub failed: Vec<String>,
}

/// Quarter name for an archive key: the file name without `.zip`.
#[must_use]
pub fn quarter_from_archive(key: &str) -> Option<&str> {
    let file = key.rsplit('/').next()?;
    let stem = file
        .strip_suffix(".zip")
        .or_else(|| file.strip_suffix(".ZIP"))?;
    (!stem.is_empty()).then_some(stem)
}

/// Extract one archive; returns the number of files written.
///
/// # Errors
/// Returns an [`ExtractError`] for the first fetch, decode or upload failure.
pub fn extract_archive(
    storage: &StorageClient,
    config: &PipelineConfig,
    key: &str,
    quarter: &str,
) -> Result<usize, ExtractError> {
    let bytes = storage.get(key).map_err(|source| ExtractError::Fetch {
        key: key.to_string(),
        source,
    })?;
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|source| ExtractError::Archive {
        key: key.to_string(),
        source,
    })?;

    let prefix = config.quarter_prefix(quarter);
    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|source| ExtractError::Archive {
            key: key.to_string(),
            source,
        })?;
        if entry.is_dir() {
            continue;
        }
        // Entries are flattened to their file name; EDGAR archives have no folders.
        let Some(name) = entry.enclosed_name().and_then(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
        }) else {
            log::warn!("{key}: skipping entry with unsafe name {:?}", entry.name());
            continue;
        };

        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
        entry
            .read_to_end(&mut data)
            .map_err(|source| ExtractError::Entry {
                key: key.to_string(),
                entry: name.clone(),
                source,
            })?;

        let target = format!("{prefix}{name}");
        storage
            .put(&target, data)
            .map_err(|source| ExtractError::Upload {
                key: target.clone(),
                source,
            })?;
        log::debug!("uploaded {target}");
        written += 1;
    }
    Ok(written)
}

/// Extract every archive under the configured ZIP prefix.
///
/// # Errors
/// Returns an error only if the archive listing itself fails.
pub fn extract_all(
    storage: &StorageClient,
    config: &PipelineConfig,
) -> Result<ExtractReport, CloudIOError> {
    let archives: Vec<(String, String)> = storage
        .list(&config.zip_prefix)?
        .into_iter()
        .filter_map(|obj| {
            let quarter = quarter_from_archive(&obj.key)?.to_string();
            Some((obj.key, quarter))
        })
        .collect();

    let mut report = ExtractReport {
        archives: archives.len(),
        ..ExtractReport::default()
    };
    if archives.is_empty() {
        log::warn!("no ZIP archives found under {}", config.zip_prefix);
        return Ok(report);
    }

    for (key, quarter) in archives {
        match extract_archive(storage, config, &key, &quarter) {
            Ok(n) => {
                log::info!("extracted {n} files from {key} into {}", config.quarter_prefix(&quarter));
                report.extracted_files += n;
                report.quarters.push(quarter);
            }
            Err(e) => {
                log::error!("{e}");
                report.failed.push(key);
            }
        }
    }
    Ok(report)
}
