//! Fake implementations for testing.
//!
//! These implementations use in-memory data structures to simulate object storage,
//! making them ideal for unit testing without external dependencies.

use crate::io::cloud::traits::{CloudIOError, CloudResult, ErrorKind, ObjectIO, ObjectMetadata};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// Type aliases for complex nested types
type BucketStorage = Arc<Mutex<HashMap<String, HashMap<String, Vec<u8>>>>>;
type FailureRules = Arc<Mutex<Vec<FailureRule>>>;

/// Which storage calls an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Read,
    Write,
    List,
    Any,
}

#[derive(Debug, Clone)]
struct FailureRule {
    fragment: String,
    on: FailOn,
    kind: ErrorKind,
}

// ============================================================================
// FakeObjectIO
// ============================================================================

#[derive(Clone)]
pub struct FakeObjectIO {
    storage: BucketStorage,
    failures: FailureRules,
}

impl FakeObjectIO {
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates an empty bucket so that listings against it succeed.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the storage is poisoned.
    pub fn create_bucket(&self, bucket: &str) {
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .entry(bucket.to_string())
            .or_default();
    }

    /// Makes every matching call against a key (or listing prefix) containing
    /// `fragment` fail with `kind`. Existence checks count as reads and match
    /// against the key, or the bucket name for [`ObjectIO::bucket_exists`].
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the failure rules is poisoned.
    pub fn fail_on(&self, fragment: &str, on: FailOn, kind: ErrorKind) {
        self.failures
            .lock()
            .expect("failures mutex poisoned")
            .push(FailureRule {
                fragment: fragment.to_string(),
                on,
                kind,
            });
    }

    /// Removes all injected failures.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the failure rules is poisoned.
    pub fn clear_failures(&self) {
        self.failures
            .lock()
            .expect("failures mutex poisoned")
            .clear();
    }

    /// Number of objects currently stored in `bucket`.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the storage is poisoned.
    #[must_use]
    pub fn object_count(&self, bucket: &str) -> usize {
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .get(bucket)
            .map_or(0, HashMap::len)
    }

    fn check(&self, key: &str, op: FailOn) -> CloudResult<()> {
        let failures = self.failures.lock().expect("failures mutex poisoned");
        let hit = failures
            .iter()
            .find(|r| (r.on == op || r.on == FailOn::Any) && key.contains(&r.fragment));
        match hit {
            Some(rule) => Err(CloudIOError::new(
                rule.kind,
                format!("injected {op:?} failure for {key}"),
            )),
            None => Ok(()),
        }
    }
}

impl Default for FakeObjectIO {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectIO for FakeObjectIO {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()> {
        self.check(key, FailOn::Write)?;
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>> {
        self.check(key, FailOn::Read)?;
        let storage = self.storage.lock().expect("storage mutex poisoned");
        storage
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| {
                CloudIOError::new(
                    ErrorKind::NotFound,
                    format!("Object {bucket}/{key} not found"),
                )
            })
    }

    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> CloudResult<Vec<ObjectMetadata>> {
        self.check(prefix.unwrap_or_default(), FailOn::List)?;
        let storage = self.storage.lock().expect("storage mutex poisoned");
        let bucket_map = storage.get(bucket).ok_or_else(|| {
            CloudIOError::new(ErrorKind::NotFound, format!("Bucket {bucket} not found"))
        })?;

        let mut objects: Vec<ObjectMetadata> = bucket_map
            .iter()
            .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
            .map(|(key, data)| ObjectMetadata {
                key: key.clone(),
                size: data.len() as u64,
                last_modified: Some(0),
            })
            .collect();

        drop(storage);
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn object_exists(&self, bucket: &str, key: &str) -> CloudResult<bool> {
        self.check(key, FailOn::Read)?;
        let storage = self.storage.lock().expect("storage mutex poisoned");
        Ok(storage.get(bucket).is_some_and(|b| b.contains_key(key)))
    }

    fn bucket_exists(&self, bucket: &str) -> CloudResult<bool> {
        self.check(bucket, FailOn::Read)?;
        let storage = self.storage.lock().expect("storage mutex poisoned");
        Ok(storage.contains_key(bucket))
    }
}
