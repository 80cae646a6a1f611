//! Filesystem-backed object storage.
//!
//! A bucket is a directory under a configured root, and an object key is a
//! `/`-separated path relative to that directory. Useful for running the
//! pipeline against a locally mirrored copy of the dataset.

use crate::io::cloud::traits::{CloudIOError, CloudResult, ErrorKind, ObjectIO, ObjectMetadata};
use glob::{Pattern, glob};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Clone)]
pub struct LocalObjectIO {
    root: PathBuf,
}

impl LocalObjectIO {
    /// Opens storage rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` does not exist or is not a directory
    pub fn open(root: impl Into<PathBuf>) -> CloudResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CloudIOError::new(
                ErrorKind::NotFound,
                format!("storage root {} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> CloudResult<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(CloudIOError::new(
                ErrorKind::InvalidInput,
                format!("invalid bucket name {bucket:?}"),
            ));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> CloudResult<PathBuf> {
        let rel = Path::new(key);
        let escapes = key.is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(CloudIOError::new(
                ErrorKind::InvalidInput,
                format!("invalid object key {key:?}"),
            ));
        }
        Ok(self.bucket_dir(bucket)?.join(rel))
    }
}

fn key_for(bucket_dir: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(bucket_dir).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

impl ObjectIO for LocalObjectIO {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()> {
        let path = self.object_path(bucket, key)?;
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| {
            CloudIOError::from(e).with_source(format!("mkdir -p {}", parent.display()))
        })?;
        // Each write stages into its own sibling file, then renames into place.
        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(parent)
            .map_err(|e| {
                CloudIOError::from(e).with_source(format!("stage in {}", parent.display()))
            })?;
        tmp.write_all(data)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| {
                CloudIOError::from(e).with_source(format!("write {}", tmp.path().display()))
            })?;
        tmp.persist(&path).map_err(|e| {
            CloudIOError::from(e.error).with_source(format!("rename into {}", path.display()))
        })?;
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).map_err(|e| {
            let err = CloudIOError::from(e);
            if err.kind == ErrorKind::NotFound {
                CloudIOError::new(ErrorKind::NotFound, format!("Object {bucket}/{key} not found"))
            } else {
                err.with_source(format!("read {}", path.display()))
            }
        })
    }

    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> CloudResult<Vec<ObjectMetadata>> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Err(CloudIOError::new(
                ErrorKind::NotFound,
                format!("Bucket {bucket} not found"),
            ));
        }

        let pattern = format!("{}/**/*", Pattern::escape(&dir.to_string_lossy()));
        let paths = glob(&pattern).map_err(|e| {
            CloudIOError::new(ErrorKind::InternalError, format!("invalid glob pattern: {e}"))
        })?;

        let mut objects = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| CloudIOError::from(e.into_error()))?;
            if !path.is_file() || path.to_string_lossy().ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            let Some(key) = key_for(&dir, &path) else {
                continue;
            };
            if prefix.is_some_and(|p| !key.starts_with(p)) {
                continue;
            }
            let meta = fs::metadata(&path)?;
            let last_modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .and_then(|d| i64::try_from(d.as_secs()).ok());
            objects.push(ObjectMetadata {
                key,
                size: meta.len(),
                last_modified,
            });
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn object_exists(&self, bucket: &str, key: &str) -> CloudResult<bool> {
        Ok(self.object_path(bucket, key)?.is_file())
    }

    fn bucket_exists(&self, bucket: &str) -> CloudResult<bool> {
        Ok(self.bucket_dir(bucket)?.is_dir())
    }
}
