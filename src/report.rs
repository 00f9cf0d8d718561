use std::collections::BTreeMap;
use std::fmt;

use crate::model::{NormalizedRow, ReportKind};

/// Why a record was left out of a parser's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    /// Outbound column whose month indicator is not 1-12.
    UnknownMonth,
    /// Inbound year-month not in `YYYYMM` form.
    UnparseableYearMonth,
    MissingLocation,
    /// Kit count of zero (after coercion) or below.
    ZeroCount,
    /// Kit description not in the catalog.
    UnknownKit,
    /// Inbound tube type outside the fixed set.
    UnknownTubeType,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMonth => write!(f, "unknown_month"),
            Self::UnparseableYearMonth => write!(f, "unparseable_year_month"),
            Self::MissingLocation => write!(f, "missing_location"),
            Self::ZeroCount => write!(f, "zero_count"),
            Self::UnknownKit => write!(f, "unknown_kit"),
            Self::UnknownTubeType => write!(f, "unknown_tube_type"),
        }
    }
}

/// Outcome of one source record (an inbound row, or one outbound cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Kept,
    /// Kept, but its non-numeric or negative count was replaced by 0.
    Zeroed,
    Dropped(DropReason),
}

/// Tally of per-record outcomes for one parsed file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub records_seen: usize,
    pub kept: usize,
    pub zeroed: usize,
    pub dropped: BTreeMap<DropReason, usize>,
    /// Some lines were wider than the first row; the extra cells were
    /// never seen as records.
    pub ragged_lines_truncated: bool,
}

impl ParseReport {
    pub fn record(&mut self, outcome: RowOutcome) {
        self.records_seen += 1;
        match outcome {
            RowOutcome::Kept => self.kept += 1,
            RowOutcome::Zeroed => {
                self.kept += 1;
                self.zeroed += 1;
            }
            RowOutcome::Dropped(reason) => *self.dropped.entry(reason).or_insert(0) += 1,
        }
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }

    pub fn dropped_for(&self, reason: DropReason) -> usize {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    /// Flat `name -> count` view, used for Python dicts and log fields.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        out.insert("records_seen".to_string(), self.records_seen);
        out.insert("kept".to_string(), self.kept);
        out.insert("zeroed".to_string(), self.zeroed);
        out.insert(
            "ragged_lines_truncated".to_string(),
            usize::from(self.ragged_lines_truncated),
        );
        for (reason, n) in &self.dropped {
            out.insert(format!("dropped_{reason}"), *n);
        }
        out
    }
}

/// A successfully parsed upload: normalized rows plus the leniency tally.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReport {
    pub kind: ReportKind,
    pub rows: Vec<NormalizedRow>,
    pub report: ParseReport,
}

impl ParsedReport {
    pub(crate) fn log_summary(&self) {
        tracing::info!(
            kind = %self.kind,
            rows = self.rows.len(),
            records_seen = self.report.records_seen,
            kept = self.report.kept,
            zeroed = self.report.zeroed,
            dropped = self.report.dropped_total(),
            ragged_lines_truncated = self.report.ragged_lines_truncated,
            "Parsed report"
        );
    }
}
