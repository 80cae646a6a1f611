use anyhow::Result;
use edgarflow::io::cloud::{
    CloudResult, ErrorKind, FailOn, FakeObjectIO, ObjectIO, ObjectMetadata,
};
use edgarflow::testing::{TEST_BUCKET, sample_quarter, test_client, test_config};
use edgarflow::{BatchCoordinator, BatchReport, PipelineError, QuarterOutcome};
use std::sync::Arc;

fn coordinator(storage: Arc<dyn ObjectIO>) -> BatchCoordinator {
    let config = test_config();
    BatchCoordinator::new(test_client(storage, &config), config)
}

fn seeded(quarters: &[&str]) -> Result<Arc<FakeObjectIO>> {
    let storage = Arc::new(FakeObjectIO::new());
    storage.create_bucket(TEST_BUCKET);
    for q in quarters {
        sample_quarter(q).seed(storage.as_ref(), TEST_BUCKET, "sec_extracted_tsv/")?;
    }
    Ok(storage)
}

/// Delegates to a [`FakeObjectIO`] but panics on reads of keys containing `poison`.
struct PanickingIO {
    inner: FakeObjectIO,
    poison: &'static str,
}

impl ObjectIO for PanickingIO {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()> {
        self.inner.put_object(bucket, key, data)
    }

    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>> {
        assert!(!key.contains(self.poison), "poisoned read of {key}");
        self.inner.get_object(bucket, key)
    }

    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> CloudResult<Vec<ObjectMetadata>> {
        self.inner.list_objects(bucket, prefix)
    }

    fn object_exists(&self, bucket: &str, key: &str) -> CloudResult<bool> {
        self.inner.object_exists(bucket, key)
    }

    fn bucket_exists(&self, bucket: &str) -> CloudResult<bool> {
        self.inner.bucket_exists(bucket)
    }
}

#[test]
fn discovers_quarters_in_order() -> Result<()> {
    let storage = seeded(&["2016q1", "2015q4", "2015q3"])?;
    storage.put_object(TEST_BUCKET, "sec_extracted_tsv/not a quarter/sub.txt", b"adsh\n")?;
    storage.put_object(TEST_BUCKET, "sec_extracted_tsv/readme.txt", b"loose file")?;

    let quarters = coordinator(storage).discover_quarters()?;
    assert_eq!(quarters, ["2015q3", "2015q4", "2016q1"]);
    Ok(())
}

#[test]
fn runs_every_quarter() -> Result<()> {
    let storage = seeded(&["2015q1", "2015q2", "2015q3"])?;
    let report = coordinator(storage.clone()).run_all()?;

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);
    let done: Vec<&str> = report.succeeded_quarters().collect();
    assert_eq!(done, ["2015q1", "2015q2", "2015q3"]);
    for q in done {
        assert!(storage.object_exists(TEST_BUCKET, &format!("sec_json_data/{q}.json"))?);
    }
    Ok(())
}

#[test]
fn failed_quarter_does_not_stop_the_others() -> Result<()> {
    let storage = seeded(&["2015Q1", "2015Q2"])?;
    storage.fail_on("sec_json_data/2015Q1", FailOn::Write, ErrorKind::Authorization);

    let report = coordinator(storage.clone()).run_all()?;
    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert!(!report.all_failed());
    assert!(matches!(report.outcome("2015Q1"), Some(QuarterOutcome::Failed { .. })));
    assert!(report.outcome("2015Q2").is_some_and(QuarterOutcome::is_done));
    assert!(storage.object_exists(TEST_BUCKET, "sec_json_data/2015Q2.json")?);
    Ok(())
}

#[test]
fn skipped_quarter_does_not_stop_the_others() -> Result<()> {
    let storage = seeded(&["2015Q2"])?;
    sample_quarter("2015Q1")
        .without("sub.txt")
        .seed(storage.as_ref(), TEST_BUCKET, "sec_extracted_tsv/")?;

    let report = coordinator(storage).run_all()?;
    assert_eq!(report.skipped, 1);
    assert_eq!(report.succeeded, 1);
    assert!(report.outcome("2015Q1").is_some_and(QuarterOutcome::is_skipped));
    Ok(())
}

#[test]
fn panicking_storage_is_contained_to_its_quarter() -> Result<()> {
    let inner = FakeObjectIO::new();
    inner.create_bucket(TEST_BUCKET);
    for q in ["2015Q1", "2015Q2"] {
        sample_quarter(q).seed(&inner, TEST_BUCKET, "sec_extracted_tsv/")?;
    }
    let storage = Arc::new(PanickingIO {
        inner: inner.clone(),
        poison: "2015Q1",
    });

    let report = coordinator(storage).run_all()?;
    assert_eq!(report.attempted, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
    match report.outcome("2015Q1") {
        Some(QuarterOutcome::Failed {
            quarter,
            state: None,
            error,
        }) => {
            assert_eq!(quarter, "2015Q1");
            assert!(error.contains("panicked"), "{error}");
            assert!(error.contains("poisoned read"), "{error}");
        }
        other => panic!("expected a panicked quarter, got {other:?}"),
    }
    assert!(report.outcome("2015Q2").is_some_and(QuarterOutcome::is_done));
    assert!(inner.object_exists(TEST_BUCKET, "sec_json_data/2015Q2.json")?);
    Ok(())
}

#[test]
fn all_failed_is_reported() -> Result<()> {
    let storage = seeded(&["2015Q1", "2015Q2"])?;
    storage.fail_on("sec_json_data/", FailOn::Write, ErrorKind::Authorization);
    let report = coordinator(storage).run_all()?;
    assert_eq!(report.failed, 2);
    assert!(report.all_failed());
    Ok(())
}

#[test]
fn no_quarters_yields_an_empty_report() -> Result<()> {
    let storage = seeded(&[])?;
    let report = coordinator(storage).run_all()?;
    assert_eq!(report, BatchReport::default());
    assert!(!report.all_failed());
    Ok(())
}

#[test]
fn missing_bucket_is_an_environment_error() {
    let storage = Arc::new(FakeObjectIO::new());
    let err = coordinator(storage).run_all().unwrap_err();
    assert!(matches!(err, PipelineError::Environment(_)), "{err}");
}

#[test]
fn unreachable_bucket_is_an_environment_error() -> Result<()> {
    let storage = seeded(&["2016q4"])?;
    storage.fail_on(TEST_BUCKET, FailOn::Any, ErrorKind::Authentication);

    let err = coordinator(storage.clone()).run_all().unwrap_err();
    assert!(matches!(err, PipelineError::Environment(_)), "{err}");
    storage.clear_failures();
    assert!(!storage.object_exists(TEST_BUCKET, "sec_json_data/2016q4.json")?);
    Ok(())
}

#[test]
fn run_one_processes_a_named_quarter() -> Result<()> {
    let storage = seeded(&["2016q4"])?;
    let coordinator = coordinator(storage);

    assert!(coordinator.run_one("2016q4")?.is_done());
    assert!(coordinator.run_one("2017q1")?.is_skipped());
    assert!(matches!(
        coordinator.run_one("../2016q4"),
        Err(PipelineError::Config(_))
    ));
    Ok(())
}

#[test]
fn report_round_trips_through_json() -> Result<()> {
    let storage = seeded(&["2016q4"])?;
    let report = coordinator(storage).run_all()?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("report.json");
    report.save_to_file(&path)?;
    let loaded: BatchReport = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(loaded, report);

    let value: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    assert_eq!(value["outcomes"][0]["status"], "done");
    Ok(())
}
