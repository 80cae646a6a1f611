//! Source records and the JSON document shape produced per submission.
//!
//! Source records are read from [`Table`] rows with all fields still textual;
//! only the transformer decides what a field means.

use crate::io::tsv::{Row, Table};
use serde::{Deserialize, Serialize};

/// Column names in the EDGAR financial statement tables.
pub mod columns {
    pub const ACCESSION: &str = "adsh";
    pub const NAME: &str = "name";
    pub const COUNTRY: &str = "countryba";
    pub const CITY: &str = "cityba";
    pub const FISCAL_YEAR: &str = "fy";
    pub const FISCAL_PERIOD: &str = "fp";
    pub const TAG: &str = "tag";
    pub const VALUE: &str = "value";
    pub const UNIT: &str = "uom";
    pub const STATEMENT: &str = "stmt";
    pub const LABEL: &str = "tlabel";
}

/// One filer's reporting record for a quarter (`sub.txt`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub accession: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub fiscal_year: Option<String>,
    pub fiscal_period: Option<String>,
}

impl Submission {
    #[must_use]
    pub fn from_row(row: &Row<'_>) -> Self {
        let text = |c: &str| row.non_blank(c).map(str::to_string);
        Self {
            accession: text(columns::ACCESSION),
            name: text(columns::NAME),
            country: text(columns::COUNTRY),
            city: text(columns::CITY),
            fiscal_year: text(columns::FISCAL_YEAR),
            fiscal_period: text(columns::FISCAL_PERIOD),
        }
    }

    /// Name used when reporting on this submission.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.accession.as_deref())
            .unwrap_or(UNKNOWN)
    }
}

/// One reported numeric value (`num.txt`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumericFact {
    pub accession: String,
    pub tag: Option<String>,
    pub value: Option<String>,
    pub unit: Option<String>,
}

impl NumericFact {
    /// Returns `None` for rows that carry no accession; such rows belong to no submission.
    #[must_use]
    pub fn from_row(row: &Row<'_>) -> Option<Self> {
        Some(Self {
            accession: row.non_blank(columns::ACCESSION)?.to_string(),
            tag: row.non_blank(columns::TAG).map(str::to_string),
            value: row.get(columns::VALUE).map(str::to_string),
            unit: row.non_blank(columns::UNIT).map(str::to_string),
        })
    }
}

/// The statement a tag is presented on within one filing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatementType {
    BalanceSheet,
    CashFlow,
    IncomeStatement,
    /// Equity, comprehensive income, cover page, unclassified, ...
    Other(String),
}

impl StatementType {
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code.trim() {
            "BS" => Self::BalanceSheet,
            "CF" => Self::CashFlow,
            "IC" => Self::IncomeStatement,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::BalanceSheet => "BS",
            Self::CashFlow => "CF",
            Self::IncomeStatement => "IC",
            Self::Other(code) => code,
        }
    }
}

/// Classifies an `(accession, tag)` pair onto a statement (`pre.txt`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationEntry {
    pub accession: String,
    pub tag: String,
    pub statement: StatementType,
}

impl PresentationEntry {
    /// Returns `None` for rows missing the accession, tag or statement code.
    #[must_use]
    pub fn from_row(row: &Row<'_>) -> Option<Self> {
        Some(Self {
            accession: row.non_blank(columns::ACCESSION)?.to_string(),
            tag: row.non_blank(columns::TAG)?.to_string(),
            statement: StatementType::parse(row.non_blank(columns::STATEMENT)?),
        })
    }
}

/// Human-readable label for a tag (`tag.txt`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLabel {
    pub tag: String,
    pub label: String,
}

impl TagLabel {
    #[must_use]
    pub fn from_row(row: &Row<'_>) -> Option<Self> {
        Some(Self {
            tag: row.non_blank(columns::TAG)?.to_string(),
            label: row.non_blank(columns::LABEL)?.to_string(),
        })
    }
}

/// Parse every row of `table` with `f`, dropping rows it rejects.
pub(crate) fn collect_rows<T>(table: &Table, f: impl Fn(&Row<'_>) -> Option<T>) -> Vec<T> {
    table.rows().filter_map(|row| f(&row)).collect()
}

pub(crate) const UNKNOWN: &str = "Unknown";

// ============================================================================
// Output documents
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub concept: String,
    pub label: String,
    pub value: i64,
    pub unit: String,
}

/// Line items bucketed by statement, in the order facts were encountered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statements {
    pub bs: Vec<LineItem>,
    pub cf: Vec<LineItem>,
    pub ic: Vec<LineItem>,
}

impl Statements {
    /// The bucket for `statement`, or `None` for statements that are not emitted.
    pub fn bucket_mut(&mut self, statement: &StatementType) -> Option<&mut Vec<LineItem>> {
        match statement {
            StatementType::BalanceSheet => Some(&mut self.bs),
            StatementType::CashFlow => Some(&mut self.cf),
            StatementType::IncomeStatement => Some(&mut self.ic),
            StatementType::Other(_) => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bs.len() + self.cf.len() + self.ic.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One submission rendered as a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialDocument {
    pub symbol: String,
    pub name: String,
    pub country: String,
    pub city: String,
    pub year: i64,
    pub quarter: String,
    pub data: Statements,
}
