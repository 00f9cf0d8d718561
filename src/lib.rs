//! Lab-kit report reconciliation.
//!
//! Parses monthly outbound (kits shipped) and inbound (tubes returned)
//! CSV reports into a common normalized shape, joins them on
//! (location, year_month, tube_type) and rolls the result up into
//! per-location remaining stock.
//!
//! The Python extension module `_core` is built with the `python` feature.

pub mod aggregation;
pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod inbound;
pub mod logging;
pub mod model;
pub mod outbound;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod table;

#[cfg(feature = "python")]
mod python;

pub use aggregation::{aggregate, monthly_breakdown, ranked_summary, top_n};
pub use catalog::KitCatalog;
pub use config::{ParseContext, ReconcileConfig};
pub use error::ReportError;
pub use inbound::parse_inbound;
pub use model::{AggregateRow, MonthlyTotal, NormalizedRow, ReconciledRow, ReportKind, TubeType, YearMonth};
pub use outbound::parse_outbound;
pub use reconcile::{reconcile, reconcile_uploads, ReconcileOutcome};
pub use report::{DropReason, ParseReport, ParsedReport};

/// Parse an uploaded report, choosing the parser from the file name
/// (`*out_*.csv` or `*in_*.csv`).
pub fn parse_report(
    bytes: &[u8],
    filename: &str,
    ctx: &ParseContext,
) -> Result<ParsedReport, ReportError> {
    let _span = tracing::info_span!("parse_report", filename).entered();
    match ReportKind::from_filename(filename) {
        Some(ReportKind::Outbound) => parse_outbound(bytes, ctx),
        Some(ReportKind::Inbound) => parse_inbound(bytes, ctx),
        None => Err(ReportError::UnsupportedFileName(filename.to_string())),
    }
}
