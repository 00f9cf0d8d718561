//! Outbound (kits shipped) report parser.
//!
//! Layout: row 0 holds a month indicator per data column, row 1 holds the
//! header labels, data starts at row 2. The first four columns are the
//! identity fields and carry no month.
//!
//! Parsing runs in three steps:
//! 1. [`classify_columns`] assigns a [`ColumnRole`] to every column from
//!    the two header rows, before any value is read.
//! 2. Each data cell of a kit column is turned into tubes by [`decompose`].
//! 3. Tubes are summed per (year_month, location, tube_type).

use std::collections::BTreeMap;

use tracing::debug;

use crate::catalog::KitCatalog;
use crate::config::{ColumnSynonyms, ParseContext};
use crate::error::ReportError;
use crate::model::{parse_integral, parse_number, NormalizedRow, ReportKind, RowKey, TubeType, YearMonth};
use crate::report::{DropReason, ParseReport, ParsedReport, RowOutcome};
use crate::schema::outbound;
use crate::table::RawTable;

/// Columns before this index are reserved for identity fields.
pub const IDENTITY_WIDTH: usize = 4;
const MONTH_ROW: usize = 0;
const LABEL_ROW: usize = 1;
const FIRST_DATA_ROW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdentityField {
    OrderId,
    Location,
    Territory,
    SalesRep,
}

impl IdentityField {
    pub const ALL: [IdentityField; 4] = [Self::OrderId, Self::Location, Self::Territory, Self::SalesRep];

    pub fn canonical(&self) -> &'static str {
        match self {
            Self::OrderId => outbound::ORDER_ID,
            Self::Location => outbound::LOCATION,
            Self::Territory => outbound::TERRITORY,
            Self::SalesRep => outbound::SALES_REP,
        }
    }

    fn from_canonical(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.canonical() == name)
    }
}

/// What a column of the outbound table holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRole {
    Identity(IdentityField),
    /// Kit counts for one kit description in one month.
    KitMonth { kit: String, month: u32 },
    /// Stray or unlabeled column. Values beyond the identity block are
    /// dropped as `UnknownMonth`.
    Unknown { label: String },
}

/// Classify every column of the table from the two header rows.
pub fn classify_columns(table: &RawTable, synonyms: &ColumnSynonyms) -> Vec<ColumnRole> {
    // Pass 1: month indicators
    let months: Vec<Option<u32>> = (0..table.width())
        .map(|c| {
            parse_integral(table.cell(MONTH_ROW, c))
                .filter(|m| (1..=12).contains(m))
                .map(|m| m as u32)
        })
        .collect();

    // Pass 2: labels, combined with the month of the same column
    let mut seen_identity = Vec::new();
    months
        .into_iter()
        .enumerate()
        .map(|(c, month)| {
            let label = table.cell(LABEL_ROW, c).to_string();
            let identity = synonyms
                .resolve(&label)
                .and_then(IdentityField::from_canonical)
                .filter(|f| !seen_identity.contains(f));
            if let Some(field) = identity {
                seen_identity.push(field);
                return ColumnRole::Identity(field);
            }
            match month {
                Some(month) if c >= IDENTITY_WIDTH && !label.is_empty() => {
                    ColumnRole::KitMonth { kit: label, month }
                }
                _ => {
                    if c >= IDENTITY_WIDTH && !label.is_empty() {
                        debug!(column = c, label = %label, "Outbound column has no month; its values will be dropped");
                    }
                    ColumnRole::Unknown { label }
                }
            }
        })
        .collect()
}

/// Tubes of each type contained in `count` kits of `kit`.
/// Unknown kits contain nothing.
pub fn decompose(kit: &str, count: f64, catalog: &KitCatalog) -> Vec<(TubeType, f64)> {
    catalog
        .lookup(kit)
        .map(|tubes| {
            tubes
                .iter()
                .map(|(tube, qty)| (*tube, count * f64::from(*qty)))
                .filter(|(_, n)| *n > 0.0)
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_outbound(bytes: &[u8], ctx: &ParseContext) -> Result<ParsedReport, ReportError> {
    let table = RawTable::from_csv_bytes(bytes)?;
    parse_outbound_table(&table, ctx)
}

#[derive(Debug, Default)]
struct SentAccum {
    location_id: Option<i64>,
    territory: Option<String>,
    tubes_sent: f64,
}

pub fn parse_outbound_table(table: &RawTable, ctx: &ParseContext) -> Result<ParsedReport, ReportError> {
    if table.height() < FIRST_DATA_ROW {
        return Err(ReportError::MalformedInput(format!(
            "outbound report needs a month row and a header row, found {} row(s)",
            table.height()
        )));
    }

    let roles = classify_columns(table, &ctx.outbound_columns);
    let identity_col = |field: IdentityField| {
        roles
            .iter()
            .position(|r| *r == ColumnRole::Identity(field))
            .ok_or_else(|| ReportError::MissingRequiredColumn(field.canonical().to_string()))
    };
    let order_col = identity_col(IdentityField::OrderId)?;
    let location_col = identity_col(IdentityField::Location)?;
    let territory_col = identity_col(IdentityField::Territory)?;
    identity_col(IdentityField::SalesRep)?;

    if !roles.iter().any(|r| matches!(r, ColumnRole::KitMonth { .. })) {
        return Err(ReportError::NoKitColumnsFound);
    }

    let mut report = ParseReport {
        ragged_lines_truncated: table.was_truncated(),
        ..Default::default()
    };
    let mut sent: BTreeMap<RowKey, SentAccum> = BTreeMap::new();

    for r in FIRST_DATA_ROW..table.height() {
        if table.is_blank_row(r) {
            continue;
        }
        let location = table.cell(r, location_col);
        if location.is_empty() {
            report.record(RowOutcome::Dropped(DropReason::MissingLocation));
            continue;
        }
        let location_id = parse_integral(table.cell(r, order_col));
        let territory = Some(table.cell(r, territory_col))
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        for (c, role) in roles.iter().enumerate() {
            let raw = table.cell(r, c);
            if raw.is_empty() {
                continue;
            }
            let (kit, month) = match role {
                ColumnRole::KitMonth { kit, month } => (kit, *month),
                ColumnRole::Unknown { .. } if c >= IDENTITY_WIDTH => {
                    report.record(RowOutcome::Dropped(DropReason::UnknownMonth));
                    continue;
                }
                _ => continue,
            };

            let count = parse_number(raw).unwrap_or(0.0);
            if count <= 0.0 {
                report.record(RowOutcome::Dropped(DropReason::ZeroCount));
                continue;
            }
            let Some(year_month) = YearMonth::new(ctx.year, month) else {
                report.record(RowOutcome::Dropped(DropReason::UnknownMonth));
                continue;
            };
            let tubes = decompose(kit, count, &ctx.catalog);
            if tubes.is_empty() {
                report.record(RowOutcome::Dropped(DropReason::UnknownKit));
                continue;
            }
            report.record(RowOutcome::Kept);

            for (tube_type, n) in tubes {
                let key = RowKey {
                    year_month,
                    location: location.to_string(),
                    tube_type,
                };
                let acc = sent.entry(key).or_default();
                acc.tubes_sent += n;
                if acc.location_id.is_none() {
                    acc.location_id = location_id;
                }
                if acc.territory.is_none() {
                    acc.territory = territory.clone();
                }
            }
        }
    }

    let rows = sent
        .into_iter()
        .filter(|(_, acc)| acc.tubes_sent > 0.0)
        .map(|(key, acc)| NormalizedRow {
            location: key.location,
            location_id: acc.location_id,
            territory: acc.territory,
            year_month: key.year_month,
            tube_type: key.tube_type,
            metric_value: acc.tubes_sent,
        })
        .collect();

    let parsed = ParsedReport {
        kind: ReportKind::Outbound,
        rows,
        report,
    };
    parsed.log_summary();
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const HEADER: [&str; 4] = ["Host Code", "Organization Name", "Territory Name", "Sales Rep Full Name"];

    fn ctx() -> ParseContext {
        ParseContext::new(Arc::new(KitCatalog::builtin()), 2025)
    }

    fn table(months: &[&str], kits: &[&str], data: &[&[&str]]) -> RawTable {
        let mut row0 = vec!["", "", "", ""];
        row0.extend_from_slice(months);
        let mut row1 = HEADER.to_vec();
        row1.extend_from_slice(kits);
        let mut rows = vec![row0, row1];
        rows.extend(data.iter().map(|r| r.to_vec()));
        RawTable::from_rows(rows)
    }

    fn sent(rows: &[NormalizedRow], location: &str, month: u32, tube: TubeType) -> Option<f64> {
        rows.iter()
            .find(|r| r.location == location && r.year_month.month() == month && r.tube_type == tube)
            .map(|r| r.metric_value)
    }

    #[test]
    fn classifies_identity_kit_and_unknown_columns() {
        let t = table(
            &["1.00", "", "2"],
            &["MNT Kit Only (2 ACD)", "Stray", "MNT Kit Only (2 ACD)"],
            &[],
        );
        let roles = classify_columns(&t, &ColumnSynonyms::outbound_defaults());
        assert_eq!(roles[0], ColumnRole::Identity(IdentityField::OrderId));
        assert_eq!(roles[3], ColumnRole::Identity(IdentityField::SalesRep));
        assert_eq!(
            roles[4],
            ColumnRole::KitMonth { kit: "MNT Kit Only (2 ACD)".into(), month: 1 }
        );
        assert_eq!(roles[5], ColumnRole::Unknown { label: "Stray".into() });
        assert_eq!(
            roles[6],
            ColumnRole::KitMonth { kit: "MNT Kit Only (2 ACD)".into(), month: 2 }
        );
    }

    #[test]
    fn month_indicator_out_of_range_is_unknown() {
        let t = table(&["13", "0", "1.5"], &["A", "B", "C"], &[]);
        let roles = classify_columns(&t, &ColumnSynonyms::outbound_defaults());
        assert!(roles[4..].iter().all(|r| matches!(r, ColumnRole::Unknown { .. })));
    }

    #[test]
    fn decompose_multiplies_per_kit_quantities() {
        let catalog = KitCatalog::builtin();
        let mut tubes = decompose("MNT & Telomere Kit (2 ACD, 1 Blue Sodium Citrate)", 3.0, &catalog);
        tubes.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(tubes, vec![(TubeType::Acd, 6.0), (TubeType::Blue, 3.0)]);
        assert!(decompose("Mystery Kit", 3.0, &catalog).is_empty());
    }

    #[test]
    fn single_kit_column() {
        let t = table(&["1.00"], &["MNT Kit Only (2 ACD)"], &[&["O1", "Loc A", "Terr1", "Rep1", "5"]]);
        let parsed = parse_outbound_table(&t, &ctx()).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        let row = &parsed.rows[0];
        assert_eq!(row.location, "Loc A");
        assert_eq!(row.year_month, YearMonth::new(2025, 1).unwrap());
        assert_eq!(row.tube_type, TubeType::Acd);
        assert_eq!(row.metric_value, 10.0);
        assert_eq!(row.territory.as_deref(), Some("Terr1"));
        assert_eq!(row.location_id, None);
    }

    #[test]
    fn sums_kits_mapping_to_same_tube_type() {
        let t = table(
            &["3", "3", "3"],
            &["MNT Kit Only (2 ACD)", "Tube - ACD (8.5 mL) Yellow Tops", "MTHFR Kit (1 Blue Sodium Citrate)"],
            &[&["101", "Loc A", "T", "R", "2", "3", "4"]],
        );
        let parsed = parse_outbound_table(&t, &ctx()).unwrap();
        assert_eq!(sent(&parsed.rows, "Loc A", 3, TubeType::Acd), Some(7.0));
        assert_eq!(sent(&parsed.rows, "Loc A", 3, TubeType::Blue), Some(4.0));
        assert_eq!(sent(&parsed.rows, "Loc A", 3, TubeType::Lav), None);
        assert_eq!(parsed.rows[0].location_id, Some(101));
    }

    #[test]
    fn wide_multi_month_input() {
        let t = table(
            &["1", "2"],
            &["MNT Kit Only (2 ACD)", "MNT Kit Only (2 ACD)"],
            &[&["O1", "Loc A", "T", "R", "1", "4"], &["O2", "Loc B", "T", "R", "", "2"]],
        );
        let parsed = parse_outbound_table(&t, &ctx()).unwrap();
        assert_eq!(parsed.rows.len(), 3);
        assert_eq!(sent(&parsed.rows, "Loc A", 1, TubeType::Acd), Some(2.0));
        assert_eq!(sent(&parsed.rows, "Loc A", 2, TubeType::Acd), Some(8.0));
        assert_eq!(sent(&parsed.rows, "Loc B", 2, TubeType::Acd), Some(4.0));
        // sorted by month first
        assert_eq!(parsed.rows[0].year_month.month(), 1);
    }

    #[test]
    fn lenient_cells_are_dropped_and_counted() {
        let t = table(
            &["1", "1", "", "1"],
            &["MNT Kit Only (2 ACD)", "Mystery Kit", "Stray", "Tube - SST (7.5 mL) Tiger Top"],
            &[
                &["O1", "Loc A", "T", "R", "n/a", "4", "9", "-2"],
                &["O2", "", "T", "R", "1", "", "", ""],
                &["O3", "Loc C", "T", "R", "1", "", "", ""],
            ],
        );
        let parsed = parse_outbound_table(&t, &ctx()).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].location, "Loc C");

        let report = &parsed.report;
        assert_eq!(report.dropped_for(DropReason::ZeroCount), 2);
        assert_eq!(report.dropped_for(DropReason::UnknownKit), 1);
        assert_eq!(report.dropped_for(DropReason::UnknownMonth), 1);
        assert_eq!(report.dropped_for(DropReason::MissingLocation), 1);
        assert_eq!(report.kept, 1);
    }

    #[test]
    fn unknown_kit_column_is_not_an_error() {
        let t = table(&["1"], &["Mystery Kit"], &[&["O1", "Loc A", "T", "R", "5"]]);
        let parsed = parse_outbound_table(&t, &ctx()).unwrap();
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn file_level_errors() {
        let one_row = RawTable::from_rows(vec![vec!["", "", "", "", "1"]]);
        assert!(matches!(
            parse_outbound_table(&one_row, &ctx()),
            Err(ReportError::MalformedInput(_))
        ));

        let mut rows = vec![vec!["", "", "", "", "1"], vec!["Host Code", "Organization Name", "Region", "Sales Rep Full Name", "MNT Kit O"]];
        rows.push(vec!["O1", "Loc", "T", "R", "1"]);
        match parse_outbound_table(&RawTable::from_rows(rows), &ctx()) {
            Err(ReportError::MissingRequiredColumn(col)) => assert_eq!(col, "Territory"),
            other => panic!("expected missing Territory, got {other:?}"),
        }

        let no_months = table(&["", ""], &["MNT Kit O", "MNT Kit Only (2 ACD)"], &[]);
        assert!(matches!(
            parse_outbound_table(&no_months, &ctx()),
            Err(ReportError::NoKitColumnsFound)
        ));
    }
}
