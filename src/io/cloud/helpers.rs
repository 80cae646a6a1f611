//! Generic helpers wrapped around every storage call.
//!
//! - [`retry_with_backoff`] - Retry transient failures with exponential backoff
//! - [`with_timeout`] - Bound a blocking call by a deadline
//! - [`run_with_timeout_and_retry`] - Both, with the deadline applied per attempt
//! - [`run_write_with_timeout_and_retry`] - The same for writes, which are never
//!   retried after a timeout
//! - [`validate_bucket_name`] / [`validate_key_path`] - Cheap input checks

use crate::io::cloud::traits::{CloudConfig, CloudIOError, CloudResult, ErrorKind};
use std::panic;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

// ============================================================================
// Retry Helper
// ============================================================================

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Derive retry settings from a storage configuration.
    #[must_use]
    pub fn from_config(config: &dyn CloudConfig) -> Self {
        Self {
            max_attempts: config.max_retries().max(1),
            ..Self::default()
        }
    }
}

/// Whether a failed read may be attempted again.
#[must_use]
pub const fn is_retryable(err: &CloudIOError) -> bool {
    err.kind.is_transient()
}

/// Whether a failed write may be attempted again.
///
/// A timed-out write is still running on its detached thread, so starting a
/// second one would race it on the same key.
#[must_use]
pub fn is_retryable_write(err: &CloudIOError) -> bool {
    err.kind.is_transient() && err.kind != ErrorKind::Timeout
}

/// Retry a function with exponential backoff
///
/// Only failures whose [`ErrorKind::is_transient`] is true are retried; anything
/// else is returned on first occurrence.
///
/// # Errors
///
/// Returns an error if:
/// - The operation fails with a non-retryable error kind
/// - The maximum number of retry attempts is exceeded
pub fn retry_with_backoff<F, T>(config: &RetryConfig, operation: F) -> CloudResult<T>
where
    F: FnMut() -> CloudResult<T>,
{
    retry_with_backoff_if(config, is_retryable, operation)
}

/// Like [`retry_with_backoff`], retrying only failures accepted by `retryable`.
///
/// # Errors
///
/// Returns the first error `retryable` rejects, or the last error once the
/// attempts are used up
pub fn retry_with_backoff_if<F, T>(
    config: &RetryConfig,
    retryable: fn(&CloudIOError) -> bool,
    mut operation: F,
) -> CloudResult<T>
where
    F: FnMut() -> CloudResult<T>,
{
    let mut attempt = 0;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        attempt += 1;
        match operation() {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !retryable(&err) || attempt >= config.max_attempts {
                    return Err(err);
                }

                log::debug!("attempt {attempt} failed ({err}); retrying in {delay_ms}ms");
                thread::sleep(Duration::from_millis(delay_ms));

                // Saturating to avoid overflow on long retry chains
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let next = (delay_ms as f64 * config.backoff_multiplier.max(1.0)) as u64;
                delay_ms = next.max(delay_ms).min(config.max_delay_ms);
            }
        }
    }
}

// ============================================================================
// Timeout Helper
// ============================================================================

/// Execute an operation with a timeout
///
/// The operation runs on a helper thread; if no result arrives within `timeout`
/// the caller gets an [`ErrorKind::Timeout`] error. Blocking calls cannot be
/// interrupted, so a timed-out operation keeps running detached and its result
/// is discarded. A timed-out read holds its buffer until that thread finishes.
///
/// A panic on the helper thread is resumed on the calling thread.
///
/// # Errors
///
/// Returns an error if:
/// - The operation itself returns an error
/// - The operation exceeds the specified timeout duration
/// - The helper thread cannot be spawned
pub fn with_timeout<F, T>(timeout: Duration, operation: F) -> CloudResult<T>
where
    F: FnOnce() -> CloudResult<T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    let handle = thread::Builder::new()
        .name("storage-call".into())
        .spawn(move || {
            // Receiver may be gone after a timeout
            let _ = tx.send(operation());
        })
        .map_err(|e| {
            CloudIOError::new(ErrorKind::InternalError, "failed to spawn storage thread")
                .with_source(e.to_string())
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CloudIOError::new(
            ErrorKind::Timeout,
            format!("Operation exceeded timeout of {timeout:?}"),
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => match handle.join() {
            Err(payload) => panic::resume_unwind(payload),
            Ok(()) => Err(CloudIOError::new(
                ErrorKind::InternalError,
                "storage thread terminated without a result",
            )),
        },
    }
}

/// Execute a storage read with a per-attempt timeout and retry on transient failures.
///
/// A timed-out attempt counts as a transient failure and is retried.
///
/// # Errors
///
/// Returns an error if the operation times out or fails after all retry attempts
pub fn run_with_timeout_and_retry<F, T>(
    retry_config: &RetryConfig,
    timeout: Duration,
    operation: F,
) -> CloudResult<T>
where
    F: Fn() -> CloudResult<T> + Clone + Send + 'static,
    T: Send + 'static,
{
    retry_with_backoff(retry_config, || with_timeout(timeout, operation.clone()))
}

/// Execute a storage write with a per-attempt timeout.
///
/// Transient failures are retried, but a timeout is returned at once (see
/// [`is_retryable_write`]).
///
/// # Errors
///
/// Returns an error if the write times out or fails after all retry attempts
pub fn run_write_with_timeout_and_retry<F>(
    retry_config: &RetryConfig,
    timeout: Duration,
    operation: F,
) -> CloudResult<()>
where
    F: Fn() -> CloudResult<()> + Clone + Send + 'static,
{
    retry_with_backoff_if(retry_config, is_retryable_write, || {
        with_timeout(timeout, operation.clone())
    })
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate a bucket name according to common cloud provider rules
///
/// # Errors
///
/// Returns an error if:
/// - The name is empty
/// - The name exceeds 255 characters
/// - The name contains characters other than alphanumerics, hyphens, underscores and periods
pub fn validate_bucket_name(name: &str) -> CloudResult<()> {
    if name.is_empty() {
        return Err(CloudIOError::new(
            ErrorKind::InvalidInput,
            "Bucket name cannot be empty",
        ));
    }

    if name.len() > 255 {
        return Err(CloudIOError::new(
            ErrorKind::InvalidInput,
            "Bucket name too long (max 255 characters)",
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(CloudIOError::new(
            ErrorKind::InvalidInput,
            "Bucket name contains invalid characters",
        ));
    }

    Ok(())
}

/// Validate a key path (for object storage prefixes and keys)
///
/// # Errors
///
/// Returns an error if:
/// - The key path is empty
/// - The key path starts with a forward slash
pub fn validate_key_path(path: &str) -> CloudResult<()> {
    if path.is_empty() {
        return Err(CloudIOError::new(
            ErrorKind::InvalidInput,
            "Key path cannot be empty",
        ));
    }

    if path.starts_with('/') {
        return Err(CloudIOError::new(
            ErrorKind::InvalidInput,
            "Key path cannot start with '/'",
        ));
    }

    Ok(())
}
