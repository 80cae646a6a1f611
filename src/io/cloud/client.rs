//! Bucket-scoped storage handle passed explicitly to every pipeline component.

use crate::io::cloud::helpers::{
    RetryConfig, run_with_timeout_and_retry, run_write_with_timeout_and_retry,
};
use crate::io::cloud::traits::{CloudConfig, CloudResult, ObjectIO, ObjectMetadata};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// An [`ObjectIO`] bound to one bucket, with retry and a per-call deadline.
///
/// Cloning is cheap; each quarter worker gets its own clone rather than
/// reaching for a process-wide handle.
#[derive(Clone)]
pub struct StorageClient {
    io: Arc<dyn ObjectIO>,
    bucket: String,
    retry: RetryConfig,
    timeout: Duration,
}

impl fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageClient")
            .field("bucket", &self.bucket)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl StorageClient {
    pub fn new(io: Arc<dyn ObjectIO>, bucket: impl Into<String>, config: &dyn CloudConfig) -> Self {
        Self {
            io,
            bucket: bucket.into(),
            retry: RetryConfig::from_config(config),
            timeout: Duration::from_secs(config.timeout_secs().max(1)),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// # Errors
    ///
    /// Returns an error if the object cannot be fetched within the retry budget
    pub fn get(&self, key: &str) -> CloudResult<Vec<u8>> {
        let (io, bucket, key) = (Arc::clone(&self.io), self.bucket.clone(), key.to_string());
        run_with_timeout_and_retry(&self.retry, self.timeout, move || {
            io.get_object(&bucket, &key)
        })
    }

    /// # Errors
    ///
    /// Returns an error if the object cannot be written within the retry budget.
    /// A write that times out is not attempted again.
    pub fn put(&self, key: &str, data: Vec<u8>) -> CloudResult<()> {
        let (io, bucket, key) = (Arc::clone(&self.io), self.bucket.clone(), key.to_string());
        let data: Arc<[u8]> = data.into();
        run_write_with_timeout_and_retry(&self.retry, self.timeout, move || {
            io.put_object(&bucket, &key, &data)
        })
    }

    /// # Errors
    ///
    /// Returns an error if the listing fails within the retry budget
    pub fn list(&self, prefix: &str) -> CloudResult<Vec<ObjectMetadata>> {
        let (io, bucket, prefix) = (Arc::clone(&self.io), self.bucket.clone(), prefix.to_string());
        run_with_timeout_and_retry(&self.retry, self.timeout, move || {
            io.list_objects(&bucket, Some(&prefix))
        })
    }

    /// # Errors
    ///
    /// Returns an error if the listing fails within the retry budget
    pub fn list_prefixes(&self, prefix: &str) -> CloudResult<Vec<String>> {
        let (io, bucket, prefix) = (Arc::clone(&self.io), self.bucket.clone(), prefix.to_string());
        run_with_timeout_and_retry(&self.retry, self.timeout, move || {
            io.list_prefixes(&bucket, &prefix)
        })
    }

    /// # Errors
    ///
    /// Returns an error if the storage service cannot be reached
    pub fn bucket_exists(&self) -> CloudResult<bool> {
        let (io, bucket) = (Arc::clone(&self.io), self.bucket.clone());
        run_with_timeout_and_retry(&self.retry, self.timeout, move || {
            io.bucket_exists(&bucket)
        })
    }
}
