// Storage backends and the bucket-scoped client.

use anyhow::Result;
use edgarflow::io::cloud::helpers::RetryConfig;
use edgarflow::io::cloud::*;
use edgarflow::StorageConfig;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        backoff_multiplier: 2.0,
    }
}

// ============================================================================
// LocalObjectIO
// ============================================================================

#[test]
fn local_put_get_list() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::create_dir(dir.path().join("bucket"))?;
    let storage = LocalObjectIO::open(dir.path())?;

    storage.put_object("bucket", "sec_extracted_tsv/2016q4/sub.txt", b"adsh\n")?;
    storage.put_object("bucket", "sec_extracted_tsv/2016q4/num.txt", b"adsh\n")?;
    storage.put_object("bucket", "sec_json_data/2016q4.json", b"[]")?;

    assert_eq!(storage.get_object("bucket", "sec_json_data/2016q4.json")?, b"[]");
    assert!(storage.object_exists("bucket", "sec_extracted_tsv/2016q4/sub.txt")?);
    assert!(!storage.object_exists("bucket", "sec_extracted_tsv/2016q4/pre.txt")?);

    let keys: Vec<String> = storage
        .list_objects("bucket", Some("sec_extracted_tsv/"))?
        .into_iter()
        .map(|o| o.key)
        .collect();
    assert_eq!(
        keys,
        [
            "sec_extracted_tsv/2016q4/num.txt",
            "sec_extracted_tsv/2016q4/sub.txt"
        ]
    );
    assert_eq!(
        storage.list_prefixes("bucket", "sec_extracted_tsv/")?,
        ["sec_extracted_tsv/2016q4/"]
    );
    Ok(())
}

#[test]
fn local_put_overwrites() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::create_dir(dir.path().join("bucket"))?;
    let storage = LocalObjectIO::open(dir.path())?;

    storage.put_object("bucket", "out.json", b"first")?;
    storage.put_object("bucket", "out.json", b"second")?;
    assert_eq!(storage.get_object("bucket", "out.json")?, b"second");
    assert_eq!(storage.list_objects("bucket", None)?.len(), 1);
    Ok(())
}

#[test]
fn local_concurrent_puts_publish_a_whole_payload() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::create_dir(dir.path().join("bucket"))?;
    let storage = LocalObjectIO::open(dir.path())?;

    let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![b'a' + i; 64 * 1024]).collect();
    thread::scope(|s| {
        let writers: Vec<_> = payloads
            .iter()
            .map(|payload| {
                let storage = &storage;
                s.spawn(move || storage.put_object("bucket", "sec_json_data/2016q4.json", payload))
            })
            .collect();
        for writer in writers {
            assert!(writer.join().is_ok_and(|r| r.is_ok()));
        }
    });

    let stored = storage.get_object("bucket", "sec_json_data/2016q4.json")?;
    assert!(payloads.contains(&stored), "artifact is a mix of writes");
    let keys: Vec<String> = storage
        .list_objects("bucket", None)?
        .into_iter()
        .map(|o| o.key)
        .collect();
    assert_eq!(keys, ["sec_json_data/2016q4.json"]);
    Ok(())
}

#[test]
fn local_missing_object_and_bucket() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let storage = LocalObjectIO::open(dir.path())?;

    assert!(!storage.bucket_exists("bucket")?);
    let err = storage.list_objects("bucket", None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    let err = storage.get_object("bucket", "nope.txt").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    Ok(())
}

#[test]
fn local_rejects_escaping_keys() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::create_dir(dir.path().join("bucket"))?;
    let storage = LocalObjectIO::open(dir.path())?;

    for key in ["../outside.txt", "/etc/passwd", "a/../../b", ""] {
        let err = storage.put_object("bucket", key, b"x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput, "{key}");
    }
    let err = storage.put_object("../bucket", "a.txt", b"x").unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
    Ok(())
}

#[test]
fn local_open_requires_a_directory() {
    let err = LocalObjectIO::open("/definitely/not/a/real/root").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

// ============================================================================
// FakeObjectIO
// ============================================================================

#[test]
fn fake_injected_failures_match_by_fragment() -> Result<()> {
    let storage = FakeObjectIO::new();
    storage.put_object("bucket", "a/sub.txt", b"1")?;
    storage.put_object("bucket", "a/num.txt", b"2")?;
    storage.fail_on("sub.txt", FailOn::Read, ErrorKind::Network);

    assert_eq!(storage.get_object("bucket", "a/sub.txt").unwrap_err().kind, ErrorKind::Network);
    assert_eq!(storage.get_object("bucket", "a/num.txt")?, b"2");
    storage.put_object("bucket", "a/sub.txt", b"3")?;

    storage.clear_failures();
    assert_eq!(storage.get_object("bucket", "a/sub.txt")?, b"3");
    assert_eq!(storage.object_count("bucket"), 2);
    Ok(())
}

// ============================================================================
// StorageClient
// ============================================================================

/// Fails the first `failures` reads with a transient error; writes to keys
/// starting with `slow/` take seconds.
struct Flaky {
    inner: FakeObjectIO,
    failures: usize,
    calls: AtomicUsize,
    puts: AtomicUsize,
}

impl ObjectIO for Flaky {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if key.starts_with("slow/") {
            thread::sleep(Duration::from_secs(2));
        }
        self.inner.put_object(bucket, key, data)
    }

    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(CloudIOError::new(ErrorKind::ServiceUnavailable, "try later"));
        }
        self.inner.get_object(bucket, key)
    }

    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> CloudResult<Vec<ObjectMetadata>> {
        self.inner.list_objects(bucket, prefix)
    }

    fn object_exists(&self, bucket: &str, key: &str) -> CloudResult<bool> {
        self.inner.object_exists(bucket, key)
    }

    fn bucket_exists(&self, bucket: &str) -> CloudResult<bool> {
        if self.inner.bucket_exists(bucket)? {
            return Ok(true);
        }
        thread::sleep(Duration::from_secs(5));
        Ok(false)
    }
}

fn flaky(failures: usize) -> Result<Arc<Flaky>> {
    let inner = FakeObjectIO::new();
    inner.put_object("bucket", "key.txt", b"payload")?;
    Ok(Arc::new(Flaky {
        inner,
        failures,
        calls: AtomicUsize::new(0),
        puts: AtomicUsize::new(0),
    }))
}

#[test]
fn client_retries_transient_errors() -> Result<()> {
    let io = flaky(2)?;
    let client = StorageClient::new(io.clone(), "bucket", &StorageConfig::default())
        .with_retry(fast_retry(3));

    assert_eq!(client.get("key.txt")?, b"payload");
    assert_eq!(io.calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn client_gives_up_after_max_attempts() -> Result<()> {
    let io = flaky(5)?;
    let client = StorageClient::new(io.clone(), "bucket", &StorageConfig::default())
        .with_retry(fast_retry(2));

    let err = client.get("key.txt").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    assert_eq!(io.calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn client_does_not_retry_permanent_errors() -> Result<()> {
    let storage = Arc::new(FakeObjectIO::new());
    storage.create_bucket("bucket");
    let client = StorageClient::new(storage, "bucket", &StorageConfig::default())
        .with_retry(fast_retry(5));

    let started = Instant::now();
    let err = client.get("missing.txt").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(started.elapsed() < Duration::from_secs(1));
    Ok(())
}

#[test]
fn client_bounds_slow_calls() -> Result<()> {
    let io = flaky(0)?;
    let client = StorageClient::new(io, "other-bucket", &StorageConfig::default())
        .with_retry(fast_retry(1))
        .with_timeout(Duration::from_millis(50));

    let started = Instant::now();
    let err = client.bucket_exists().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(2));
    Ok(())
}

#[test]
fn client_does_not_repeat_a_timed_out_write() -> Result<()> {
    let io = flaky(0)?;
    let client = StorageClient::new(io.clone(), "bucket", &StorageConfig::default())
        .with_retry(fast_retry(3))
        .with_timeout(Duration::from_millis(50));

    let err = client.put("slow/2016q4.json", b"[]".to_vec()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(io.puts.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn fake_existence_checks_honor_injected_failures() -> Result<()> {
    let storage = Arc::new(FakeObjectIO::new());
    storage.put_object("bucket", "a/sub.txt", b"1")?;
    storage.fail_on("bucket", FailOn::Any, ErrorKind::Authentication);

    assert_eq!(
        storage.bucket_exists("bucket").unwrap_err().kind,
        ErrorKind::Authentication
    );
    let client = StorageClient::new(storage.clone(), "bucket", &StorageConfig::default())
        .with_retry(fast_retry(1));
    assert_eq!(client.bucket_exists().unwrap_err().kind, ErrorKind::Authentication);

    storage.fail_on("sub.txt", FailOn::Read, ErrorKind::Authorization);
    assert_eq!(
        storage.object_exists("bucket", "a/sub.txt").unwrap_err().kind,
        ErrorKind::Authorization
    );
    Ok(())
}

#[test]
fn client_is_scoped_to_its_bucket() -> Result<()> {
    let storage = Arc::new(FakeObjectIO::new());
    let client = StorageClient::new(storage.clone(), "bucket", &StorageConfig::default());

    client.put("sec_json_data/2016q4.json", b"[]".to_vec())?;
    assert_eq!(client.bucket(), "bucket");
    assert!(client.bucket_exists()?);
    assert_eq!(storage.get_object("bucket", "sec_json_data/2016q4.json")?, b"[]");
    assert_eq!(client.list("sec_json_data/")?.len(), 1);
    Ok(())
}
