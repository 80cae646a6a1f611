//! Submission-to-document transformation.
//!
//! A quarter's four tables are joined on the accession number. The join is
//! driven by two lookup structures with different scopes:
//!
//! - [`TagIndex`]: tag → label, shared by every submission in the quarter.
//! - [`PresentationIndex`]: tag → statement, built per accession, because the
//!   same tag can sit on different statements in different filings.
//!
//! Numeric facts and presentation rows are grouped by accession once per
//! quarter ([`AccessionIndex`]), so transforming one submission costs only as
//! much as that submission's own facts.

use crate::coerce::coerce_int;
use crate::error::{PipelineError, panic_message};
use crate::io::tsv::Table;
use crate::model::{
    FinancialDocument, LineItem, NumericFact, PresentationEntry, StatementType, Statements,
    Submission, TagLabel, UNKNOWN, collect_rows,
};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Tag → label lookup; global for a quarter.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    labels: HashMap<String, String>,
}

impl TagIndex {
    /// Later entries for the same tag replace earlier ones.
    pub fn from_labels(labels: impl IntoIterator<Item = TagLabel>) -> Self {
        Self {
            labels: labels.into_iter().map(|t| (t.tag, t.label)).collect(),
        }
    }

    #[must_use]
    pub fn from_table(table: &Table) -> Self {
        Self::from_labels(collect_rows(table, TagLabel::from_row))
    }

    /// The label for `tag`, or the tag itself when it has none.
    #[must_use]
    pub fn label<'a>(&'a self, tag: &'a str) -> &'a str {
        self.labels.get(tag).map_or(tag, String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Rows grouped by accession number, preserving row order within each group.
#[derive(Debug, Clone)]
pub struct AccessionIndex<T> {
    groups: HashMap<String, Vec<T>>,
}

impl<T> Default for AccessionIndex<T> {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }
}

impl<T> AccessionIndex<T> {
    pub fn build(rows: impl IntoIterator<Item = T>, accession: impl Fn(&T) -> &str) -> Self {
        let mut groups: HashMap<String, Vec<T>> = HashMap::new();
        for row in rows {
            let key = accession(&row);
            match groups.get_mut(key) {
                Some(group) => group.push(row),
                None => {
                    let key = key.to_string();
                    groups.insert(key, vec![row]);
                }
            }
        }
        Self { groups }
    }

    /// Rows for `accession`; empty when it has none.
    #[must_use]
    pub fn get(&self, accession: &str) -> &[T] {
        self.groups.get(accession).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct accessions.
    #[must_use]
    pub fn accessions(&self) -> usize {
        self.groups.len()
    }
}

/// Tag → statement lookup for a single accession.
#[derive(Debug, Clone, Default)]
pub struct PresentationIndex<'a> {
    statements: HashMap<&'a str, &'a StatementType>,
}

impl<'a> PresentationIndex<'a> {
    /// Build from one accession's presentation rows. When a tag appears more
    /// than once, the last row wins.
    #[must_use]
    pub fn for_accession(entries: &'a [PresentationEntry]) -> Self {
        Self {
            statements: entries
                .iter()
                .map(|e| (e.tag.as_str(), &e.statement))
                .collect(),
        }
    }

    #[must_use]
    pub fn statement(&self, tag: &str) -> Option<&'a StatementType> {
        self.statements.get(tag).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Transform one submission into a [`FinancialDocument`].
///
/// `facts` should already be limited to the submission's accession; any fact
/// from another accession is ignored. Facts with no tag, facts whose tag has
/// no presentation entry, and facts whose statement is not a balance sheet,
/// cash flow or income statement are dropped.
///
/// # Errors
/// Returns [`PipelineError::RowTransformFailure`] if the submission has no
/// accession number.
pub fn transform(
    submission: &Submission,
    facts: &[NumericFact],
    presentation: &PresentationIndex<'_>,
    tags: &TagIndex,
) -> Result<FinancialDocument, PipelineError> {
    let failure = |reason: &str| PipelineError::RowTransformFailure {
        name: submission.display_name().to_string(),
        reason: reason.to_string(),
    };

    let accession = submission
        .accession
        .as_deref()
        .ok_or_else(|| failure("missing accession number"))?;

    let mut data = Statements::default();
    for fact in facts.iter().filter(|f| f.accession == accession) {
        let Some(tag) = fact.tag.as_deref() else {
            continue;
        };
        let Some(bucket) = presentation
            .statement(tag)
            .and_then(|stmt| data.bucket_mut(stmt))
        else {
            continue;
        };
        bucket.push(LineItem {
            concept: tag.to_string(),
            label: tags.label(tag).to_string(),
            value: coerce_int(fact.value.as_deref(), 0),
            unit: fact.unit.clone().unwrap_or_default(),
        });
    }

    let name = submission.name.as_deref().unwrap_or(UNKNOWN);
    Ok(FinancialDocument {
        symbol: name.to_string(),
        name: name.to_string(),
        country: submission.country.as_deref().unwrap_or(UNKNOWN).to_string(),
        city: submission.city.as_deref().unwrap_or(UNKNOWN).to_string(),
        year: coerce_int(submission.fiscal_year.as_deref(), 0),
        quarter: submission
            .fiscal_period
            .as_deref()
            .map_or_else(|| UNKNOWN.to_string(), str::to_uppercase),
        data,
    })
}

/// A quarter's tables, parsed and indexed for the per-submission join.
///
/// Read-only once built, so it can be shared by concurrent row workers.
#[derive(Debug, Clone, Default)]
pub struct QuarterTables {
    pub submissions: Vec<Submission>,
    pub facts: AccessionIndex<NumericFact>,
    pub presentation: AccessionIndex<PresentationEntry>,
    pub tags: TagIndex,
}

impl QuarterTables {
    #[must_use]
    pub fn from_tables(sub: &Table, num: &Table, pre: &Table, tag: &Table) -> Self {
        let submissions: Vec<Submission> = sub.rows().map(|row| Submission::from_row(&row)).collect();
        let facts = AccessionIndex::build(collect_rows(num, NumericFact::from_row), |f| {
            f.accession.as_str()
        });
        let presentation = AccessionIndex::build(collect_rows(pre, PresentationEntry::from_row), |p| {
            p.accession.as_str()
        });
        let tags = TagIndex::from_table(tag);
        log::debug!(
            "indexed {} submissions, facts for {} accessions, presentation for {} accessions, {} tag labels",
            submissions.len(),
            facts.accessions(),
            presentation.accessions(),
            tags.len()
        );
        Self {
            submissions,
            facts,
            presentation,
            tags,
        }
    }

    /// Transform one submission against these tables.
    ///
    /// # Errors
    /// Returns [`PipelineError::RowTransformFailure`] when [`transform`] fails
    /// or panics.
    pub fn transform(&self, submission: &Submission) -> Result<FinancialDocument, PipelineError> {
        let run = || {
            let accession = submission.accession.as_deref().unwrap_or_default();
            let presentation = PresentationIndex::for_accession(self.presentation.get(accession));
            transform(
                submission,
                self.facts.get(accession),
                &presentation,
                &self.tags,
            )
        };
        catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|payload| {
            Err(PipelineError::RowTransformFailure {
                name: submission.display_name().to_string(),
                reason: format!("panicked: {}", panic_message(payload.as_ref())),
            })
        })
    }

    /// Like [`QuarterTables::transform`], but logs a failure and yields `None`.
    #[must_use]
    pub fn transform_or_skip(&self, submission: &Submission) -> Option<FinancialDocument> {
        self.transform(submission)
            .inspect_err(|e| log::warn!("{e}"))
            .ok()
    }
}
