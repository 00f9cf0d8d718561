use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::schema::tube_type;

// ── Tube types ──────────────────────────────────────────────────────────────

/// Elementary sample-container category. Closed set.
///
/// Variant order matches the lexical order of the codes, so sorting by
/// `TubeType` and sorting by its code agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TubeType {
    #[serde(rename = "ACD")]
    Acd,
    #[serde(rename = "Blue")]
    Blue,
    #[serde(rename = "Lav")]
    Lav,
    #[serde(rename = "SST")]
    Sst,
}

impl TubeType {
    pub const ALL: [TubeType; 4] = [TubeType::Acd, TubeType::Blue, TubeType::Lav, TubeType::Sst];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Acd => tube_type::ACD,
            Self::Blue => tube_type::BLUE,
            Self::Lav => tube_type::LAV,
            Self::Sst => tube_type::SST,
        }
    }
}

impl fmt::Display for TubeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TubeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            tube_type::ACD => Ok(Self::Acd),
            tube_type::BLUE => Ok(Self::Blue),
            tube_type::LAV => Ok(Self::Lav),
            tube_type::SST => Ok(Self::Sst),
            other => Err(format!("Unknown tube type: '{other}'")),
        }
    }
}

// ── Year-month ──────────────────────────────────────────────────────────────

/// Calendar month key. Always the first day of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// Parse the compact `YYYYMM` form used by inbound reports.
    /// Float-formatted tokens (`202501.0`) are accepted.
    pub fn from_compact(token: &str) -> Option<Self> {
        let n = parse_integral(token)?;
        if !(100_000..=999_999).contains(&n) {
            return None;
        }
        Self::new((n / 100) as i32, (n % 100) as u32)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

// ── Cell value helpers ──────────────────────────────────────────────────────

/// Parse an integer that may be written as a float string ("1.00" -> 1).
/// Fractional values are rejected.
pub(crate) fn parse_integral(token: &str) -> Option<i64> {
    let v = parse_number(token)?;
    if v.fract() != 0.0 || v.abs() > i64::MAX as f64 {
        return None;
    }
    Some(v as i64)
}

/// Parse a finite number. Empty and non-numeric cells yield `None`.
pub(crate) fn parse_number(token: &str) -> Option<f64> {
    let t = token.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ── Rows ────────────────────────────────────────────────────────────────────

/// Which upload a file is, decided by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Outbound,
    Inbound,
}

impl ReportKind {
    /// `out_*.csv` is outbound, `in_*.csv` is inbound. Case-sensitive,
    /// outbound is tested first.
    pub fn from_filename(filename: &str) -> Option<Self> {
        if !filename.ends_with(".csv") {
            return None;
        }
        if filename.contains("out_") {
            Some(Self::Outbound)
        } else if filename.contains("in_") {
            Some(Self::Inbound)
        } else {
            None
        }
    }

    pub fn metric_name(&self) -> &'static str {
        match self {
            Self::Outbound => crate::schema::reconciled::TUBES_SENT,
            Self::Inbound => crate::schema::reconciled::SAMPLES_RETURNED,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outbound => write!(f, "outbound"),
            Self::Inbound => write!(f, "inbound"),
        }
    }
}

/// Common shape produced by both parsers.
///
/// `metric_value` is tubes sent for outbound rows and samples returned
/// for inbound rows.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub location: String,
    pub location_id: Option<i64>,
    pub territory: Option<String>,
    pub year_month: YearMonth,
    pub tube_type: TubeType,
    pub metric_value: f64,
}

/// Join key shared by both sides of the reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    pub year_month: YearMonth,
    pub location: String,
    pub tube_type: TubeType,
}

impl NormalizedRow {
    pub fn key(&self) -> RowKey {
        RowKey {
            year_month: self.year_month,
            location: self.location.clone(),
            tube_type: self.tube_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRow {
    pub location_id: Option<i64>,
    pub location: String,
    pub territory: Option<String>,
    pub year_month: YearMonth,
    pub tube_type: TubeType,
    pub tubes_sent: f64,
    pub samples_returned: f64,
    pub remaining: f64,
}

impl ReconciledRow {
    /// More came back than was sent. The value is left negative.
    pub fn is_over_returned(&self) -> bool {
        self.remaining < 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub location_id: Option<i64>,
    pub location: String,
    pub territory: Option<String>,
    pub total_remaining: f64,
}

/// Network-wide totals for one tube type in one month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTotal {
    pub year_month: YearMonth,
    pub tube_type: TubeType,
    pub tubes_sent: f64,
    pub samples_returned: f64,
}
