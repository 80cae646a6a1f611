//! Fixtures for tests: build a quarter's four tables and seed them into storage.
//!
//! ```
//! use edgarflow::io::cloud::*;
//! use edgarflow::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let storage = FakeObjectIO::new();
//! QuarterFixture::new("2016q4")
//!     .submission("X1", "ACME CORP", "US", "BOSTON", "2016", "Q4")
//!     .fact("X1", "Revenues", "100", "USD")
//!     .presentation("X1", "Revenues", "IC")
//!     .tag("Revenues", "Total Revenue")
//!     .seed(&storage, TEST_BUCKET, "sec_extracted_tsv/")?;
//!
//! assert!(storage.object_exists(TEST_BUCKET, "sec_extracted_tsv/2016q4/num.txt")?);
//! # Ok(())
//! # }
//! ```

use crate::config::PipelineConfig;
use crate::io::cloud::helpers::RetryConfig;
use crate::io::cloud::{ObjectIO, StorageClient};
use crate::quarter::{NUMERIC_FACTS, PRESENTATION, SUBMISSIONS, TAGS};
use anyhow::{Context, Result, anyhow};
use csv::{QuoteStyle, WriterBuilder};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_BUCKET: &str = "edgar-test";

const SUB_HEADERS: [&str; 8] = ["adsh", "cik", "name", "countryba", "cityba", "form", "fy", "fp"];
const NUM_HEADERS: [&str; 7] = ["adsh", "tag", "version", "ddate", "qtrs", "uom", "value"];
const PRE_HEADERS: [&str; 7] = ["adsh", "report", "line", "stmt", "tag", "version", "plabel"];
const TAG_HEADERS: [&str; 4] = ["tag", "version", "custom", "tlabel"];

/// Builder for one quarter's `sub.txt`, `num.txt`, `pre.txt` and `tag.txt`.
#[derive(Debug, Clone, Default)]
pub struct QuarterFixture {
    quarter: String,
    sub: Vec<Vec<String>>,
    num: Vec<Vec<String>>,
    pre: Vec<Vec<String>>,
    tag: Vec<Vec<String>>,
    omit: Vec<&'static str>,
    empty: Vec<&'static str>,
}

fn row<const N: usize>(fields: [&str; N]) -> Vec<String> {
    fields.iter().map(|s| (*s).to_string()).collect()
}

impl QuarterFixture {
    #[must_use]
    pub fn new(quarter: &str) -> Self {
        Self {
            quarter: quarter.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn quarter(&self) -> &str {
        &self.quarter
    }

    #[must_use]
    pub fn submission(
        mut self,
        adsh: &str,
        name: &str,
        country: &str,
        city: &str,
        fy: &str,
        fp: &str,
    ) -> Self {
        let cik = (self.sub.len() + 1000).to_string();
        self.sub
            .push(row([adsh, cik.as_str(), name, country, city, "10-Q", fy, fp]));
        self
    }

    #[must_use]
    pub fn fact(mut self, adsh: &str, tag: &str, value: &str, uom: &str) -> Self {
        self.num
            .push(row([adsh, tag, "us-gaap/2016", "20161231", "1", uom, value]));
        self
    }

    #[must_use]
    pub fn presentation(mut self, adsh: &str, tag: &str, stmt: &str) -> Self {
        let line = (self.pre.len() + 1).to_string();
        self.pre
            .push(row([adsh, "2", line.as_str(), stmt, tag, "us-gaap/2016", tag]));
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: &str, label: &str) -> Self {
        self.tag.push(row([tag, "us-gaap/2016", "0", label]));
        self
    }

    /// Do not write `file` (e.g. `"pre.txt"`) at all.
    #[must_use]
    pub fn without(mut self, file: &'static str) -> Self {
        self.omit.push(file);
        self
    }

    /// Write `file` with its header row only.
    #[must_use]
    pub fn header_only(mut self, file: &'static str) -> Self {
        self.empty.push(file);
        self
    }

    /// The four tables as `(file name, TSV bytes)`.
    ///
    /// # Errors
    /// Returns an error if a table cannot be encoded.
    pub fn tables(&self) -> Result<Vec<(&'static str, Vec<u8>)>> {
        let sources: [(&'static str, &[&str], &Vec<Vec<String>>); 4] = [
            (SUBMISSIONS.file, &SUB_HEADERS, &self.sub),
            (NUMERIC_FACTS.file, &NUM_HEADERS, &self.num),
            (PRESENTATION.file, &PRE_HEADERS, &self.pre),
            (TAGS.file, &TAG_HEADERS, &self.tag),
        ];
        sources
            .into_iter()
            .filter(|(file, _, _)| !self.omit.contains(file))
            .map(|(file, headers, rows)| {
                let rows: &[Vec<String>] = if self.empty.contains(&file) { &[] } else { rows };
                let bytes = encode_tsv(headers, rows).with_context(|| format!("encode {file}"))?;
                Ok::<_, anyhow::Error>((file, bytes))
            })
            .collect()
    }

    /// Write the tables under `{extract_prefix}{quarter}/`.
    ///
    /// # Errors
    /// Returns an error if encoding or any upload fails.
    pub fn seed(&self, storage: &dyn ObjectIO, bucket: &str, extract_prefix: &str) -> Result<()> {
        for (file, bytes) in self.tables()? {
            let key = format!("{extract_prefix}{}/{file}", self.quarter);
            storage
                .put_object(bucket, &key, &bytes)
                .with_context(|| format!("seed {key}"))?;
        }
        Ok(())
    }
}

/// Encode rows as tab-separated text with a header row.
///
/// # Errors
/// Returns an error if the writer fails.
pub fn encode_tsv(headers: &[&str], rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .flexible(true)
        .from_writer(Vec::new());
    wtr.write_record(headers)?;
    for (i, r) in rows.iter().enumerate() {
        wtr.write_record(r)
            .with_context(|| format!("write TSV row #{}", i + 1))?;
    }
    wtr.into_inner()
        .map_err(|e| anyhow!("flush TSV writer: {}", e.error()))
}

/// Two filers with a mix of statements, an unclassified tag, an unlabeled
/// tag, and a blank value.
#[must_use]
pub fn sample_quarter(quarter: &str) -> QuarterFixture {
    QuarterFixture::new(quarter)
        .submission("0000001-16-000001", "ACME CORP", "US", "BOSTON", "2016", "q4")
        .submission("0000002-16-000002", "GLOBEX INC", "CA", "TORONTO", "2016.0", "FY")
        .fact("0000001-16-000001", "Assets", "5000", "USD")
        .fact("0000001-16-000001", "Revenues", "1200.75", "USD")
        .fact("0000001-16-000001", "NetCashProvidedByOperatingActivities", "300", "USD")
        .fact("0000001-16-000001", "StockholdersEquity", "900", "USD")
        .fact("0000001-16-000001", "CustomUnlabeled", "7", "shares")
        .fact("0000002-16-000002", "Assets", "", "CAD")
        .fact("0000002-16-000002", "Revenues", "-40", "CAD")
        .presentation("0000001-16-000001", "Assets", "BS")
        .presentation("0000001-16-000001", "Revenues", "IC")
        .presentation("0000001-16-000001", "NetCashProvidedByOperatingActivities", "CF")
        .presentation("0000001-16-000001", "StockholdersEquity", "EQ")
        .presentation("0000001-16-000001", "CustomUnlabeled", "BS")
        .presentation("0000002-16-000002", "Assets", "BS")
        .presentation("0000002-16-000002", "Revenues", "IC")
        .tag("Assets", "Total Assets")
        .tag("Revenues", "Total Revenue")
        .tag("NetCashProvidedByOperatingActivities", "Operating Cash Flow")
        .tag("StockholdersEquity", "Stockholders' Equity")
}

/// A [`PipelineConfig`] for [`TEST_BUCKET`] with small worker counts.
#[must_use]
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::new(TEST_BUCKET);
    config.quarter_workers = 2;
    config.storage.timeout_secs = 10;
    config
}

/// A [`StorageClient`] over `storage` that retries quickly.
#[must_use]
pub fn test_client(storage: Arc<dyn ObjectIO>, config: &PipelineConfig) -> StorageClient {
    StorageClient::new(storage, config.bucket.clone(), &config.storage)
        .with_retry(RetryConfig {
            max_attempts: config.storage.max_retries.max(1),
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        })
        .with_timeout(Duration::from_secs(config.storage.timeout_secs))
}
