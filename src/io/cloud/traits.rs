//! Core traits for object storage.
//!
//! The storage collaborator is reached only through [`ObjectIO`]. All operations
//! are blocking; implementations backed by async SDKs are expected to drive
//! their own runtime internally.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;

// ============================================================================
// Core Error Type
// ============================================================================

/// Generic error type for storage operations
#[derive(Debug, Clone)]
pub struct CloudIOError {
    pub message: String,
    pub kind: ErrorKind,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NotFound,
    InvalidInput,
    Network,
    Timeout,
    ServiceUnavailable,
    RateLimited,
    InternalError,
    Other,
}

impl ErrorKind {
    /// Whether an operation failing with this kind may succeed if attempted again.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::ServiceUnavailable | Self::RateLimited
        )
    }
}

impl fmt::Display for CloudIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl Error for CloudIOError {}

impl CloudIOError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl From<std::io::Error> for CloudIOError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        let kind = match err.kind() {
            Io::NotFound => ErrorKind::NotFound,
            Io::PermissionDenied => ErrorKind::Authorization,
            Io::TimedOut => ErrorKind::Timeout,
            Io::Interrupted | Io::WouldBlock => ErrorKind::ServiceUnavailable,
            Io::InvalidInput | Io::InvalidData => ErrorKind::InvalidInput,
            _ => ErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

pub type CloudResult<T> = Result<T, CloudIOError>;

// ============================================================================
// Configuration Trait
// ============================================================================

/// Trait for storage service configuration
pub trait CloudConfig: Send + Sync {
    /// Returns the timeout in seconds for a single storage call
    fn timeout_secs(&self) -> u64 {
        60
    }

    /// Returns the maximum number of attempts for a storage call
    fn max_retries(&self) -> u32 {
        3
    }
}

// ============================================================================
// ObjectIO - Object Storage
// ============================================================================

/// Metadata for an object in storage
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<i64>, // Unix timestamp
}

/// Trait for object storage operations
pub trait ObjectIO: Send + Sync {
    /// Upload data to object storage, replacing any existing object under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist, permissions are not enough, or the upload fails
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()>;

    /// Download data from object storage
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist, permissions are not enough, or the download fails
    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>>;

    /// List objects with a prefix, sorted by key
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist, permissions are not enough, or the listing fails
    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> CloudResult<Vec<ObjectMetadata>>;

    /// Check if an object exists
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist, permissions are not enough, or the check fails
    fn object_exists(&self, bucket: &str, key: &str) -> CloudResult<bool>;

    /// Check if a bucket exists and is reachable
    ///
    /// # Errors
    ///
    /// Returns an error if the storage service itself cannot be reached
    fn bucket_exists(&self, bucket: &str) -> CloudResult<bool>;

    /// List the distinct "folders" directly beneath `prefix`.
    ///
    /// Mirrors a delimiter listing: for every key `prefix + "a/b/c"` the folder
    /// `prefix + "a/"` is reported once. Keys sitting directly under `prefix`
    /// are not folders and are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying listing fails
    fn list_prefixes(&self, bucket: &str, prefix: &str) -> CloudResult<Vec<String>> {
        let folders: BTreeSet<String> = self
            .list_objects(bucket, Some(prefix))?
            .into_iter()
            .filter_map(|obj| {
                let rest = obj.key.strip_prefix(prefix)?;
                let (folder, _) = rest.split_once('/')?;
                (!folder.is_empty()).then(|| format!("{prefix}{folder}/"))
            })
            .collect();
        Ok(folders.into_iter().collect())
    }
}
