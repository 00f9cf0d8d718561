//! Inbound (tubes returned) report parser.
//!
//! Single header row, one observation per data row. Tube types are
//! already elementary, so no catalog lookup is needed.

use std::collections::BTreeMap;

use crate::config::{ColumnSynonyms, ParseContext};
use crate::error::ReportError;
use crate::model::{parse_integral, parse_number, NormalizedRow, ReportKind, TubeType, YearMonth};
use crate::report::{DropReason, ParseReport, ParsedReport, RowOutcome};
use crate::schema::inbound;
use crate::table::RawTable;

const HEADER_ROW: usize = 0;

/// Group key: (year_month, location, tube_type, location_id, territory).
type ReturnKey = (YearMonth, String, TubeType, Option<i64>, Option<String>);

/// Resolved column positions of the canonical inbound fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InboundColumns {
    year_month: usize,
    location_id: usize,
    territory: usize,
    location: usize,
    tube_type: usize,
    count: usize,
}

impl InboundColumns {
    fn resolve(table: &RawTable, synonyms: &ColumnSynonyms) -> Result<Self, ReportError> {
        let mut found: BTreeMap<&str, usize> = BTreeMap::new();
        for (c, header) in table.row(HEADER_ROW).iter().enumerate() {
            if let Some(canonical) = synonyms.resolve(header) {
                found.entry(canonical).or_insert(c);
            }
        }
        let require = |name: &str| {
            found
                .get(name)
                .copied()
                .ok_or_else(|| ReportError::MissingRequiredColumn(name.to_string()))
        };
        Ok(Self {
            year_month: require(inbound::YEAR_MONTH)?,
            location_id: require(inbound::LOCATION_ID)?,
            territory: require(inbound::TERRITORY)?,
            location: require(inbound::LOCATION)?,
            tube_type: require(inbound::TUBE_TYPE)?,
            count: require(inbound::COUNT)?,
        })
    }
}

pub fn parse_inbound(bytes: &[u8], ctx: &ParseContext) -> Result<ParsedReport, ReportError> {
    let table = RawTable::from_csv_bytes(bytes)?;
    parse_inbound_table(&table, ctx)
}

pub fn parse_inbound_table(table: &RawTable, ctx: &ParseContext) -> Result<ParsedReport, ReportError> {
    if table.height() <= HEADER_ROW {
        return Err(ReportError::MalformedInput(
            "inbound report has no header row".to_string(),
        ));
    }
    let cols = InboundColumns::resolve(table, &ctx.inbound_columns)?;

    let mut report = ParseReport {
        ragged_lines_truncated: table.was_truncated(),
        ..Default::default()
    };
    let mut returned: BTreeMap<ReturnKey, f64> = BTreeMap::new();

    for r in HEADER_ROW + 1..table.height() {
        if table.is_blank_row(r) {
            continue;
        }
        let Some(year_month) = YearMonth::from_compact(table.cell(r, cols.year_month)) else {
            report.record(RowOutcome::Dropped(DropReason::UnparseableYearMonth));
            continue;
        };
        let Ok(tube_type) = table.cell(r, cols.tube_type).parse::<TubeType>() else {
            report.record(RowOutcome::Dropped(DropReason::UnknownTubeType));
            continue;
        };
        let location = table.cell(r, cols.location);
        if location.is_empty() {
            report.record(RowOutcome::Dropped(DropReason::MissingLocation));
            continue;
        }

        let count = match parse_number(table.cell(r, cols.count)) {
            Some(n) if n >= 0.0 => {
                report.record(RowOutcome::Kept);
                n
            }
            _ => {
                report.record(RowOutcome::Zeroed);
                0.0
            }
        };

        let territory = Some(table.cell(r, cols.territory))
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let key = (
            year_month,
            location.to_string(),
            tube_type,
            parse_integral(table.cell(r, cols.location_id)),
            territory,
        );
        *returned.entry(key).or_insert(0.0) += count;
    }

    let rows = returned
        .into_iter()
        .map(
            |((year_month, location, tube_type, location_id, territory), samples)| NormalizedRow {
                location,
                location_id,
                territory,
                year_month,
                tube_type,
                metric_value: samples,
            },
        )
        .collect();

    let parsed = ParsedReport {
        kind: ReportKind::Inbound,
        rows,
        report,
    };
    parsed.log_summary();
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: [&str; 6] = ["LID", "Location", "Territory", "YearMonth", "color", "Num"];

    fn table(data: &[&[&str]]) -> RawTable {
        let mut rows = vec![HEADER.to_vec()];
        rows.extend(data.iter().map(|r| r.to_vec()));
        RawTable::from_rows(rows)
    }

    #[test]
    fn single_observation() {
        let t = table(&[&["7", "Loc A", "Terr1", "202501", "ACD", "3"]]);
        let parsed = parse_inbound_table(&t, &ParseContext::default()).unwrap();
        assert_eq!(
            parsed.rows,
            vec![NormalizedRow {
                location: "Loc A".into(),
                location_id: Some(7),
                territory: Some("Terr1".into()),
                year_month: YearMonth::new(2025, 1).unwrap(),
                tube_type: TubeType::Acd,
                metric_value: 3.0,
            }]
        );
    }

    #[test]
    fn groups_and_sums_returns() {
        let t = table(&[
            &["7", "Loc A", "Terr1", "202501", "ACD", "3"],
            &["7", "Loc A", "Terr1", "202501", "ACD", "2"],
            &["7", "Loc A", "Terr1", "202502", "ACD", "1"],
            &["7", "Loc A", "Terr1", "202501", "SST", "4"],
        ]);
        let parsed = parse_inbound_table(&t, &ParseContext::default()).unwrap();
        assert_eq!(parsed.rows.len(), 3);
        assert_eq!(parsed.rows[0].metric_value, 5.0);
        assert_eq!(parsed.rows[1].tube_type, TubeType::Sst);
        assert_eq!(parsed.rows[2].year_month.month(), 2);
    }

    #[test]
    fn lenient_rows() {
        let t = table(&[
            &["7", "Loc A", "T", "2025-01", "ACD", "3"],
            &["7", "Loc A", "T", "202501", "Purple", "3"],
            &["7", "Loc A", "T", "202501", "Blue", "lots"],
            &["7", "Loc A", "T", "202501", "Lav", "-1"],
            &["", "", "", "", "", ""],
        ]);
        let parsed = parse_inbound_table(&t, &ParseContext::default()).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert!(parsed.rows.iter().all(|r| r.metric_value == 0.0));
        assert_eq!(parsed.report.dropped_for(DropReason::UnparseableYearMonth), 1);
        assert_eq!(parsed.report.dropped_for(DropReason::UnknownTubeType), 1);
        assert_eq!(parsed.report.zeroed, 2);
        assert_eq!(parsed.report.records_seen, 4);
    }

    #[test]
    fn canonical_and_synonym_headers() {
        let t = RawTable::from_rows(vec![
            vec![" Location ID ", "Organization Name", "Territory Name", "Year_Month", "Tube Type", "Count"],
            vec!["12", "Clinic", "West", "202403", "Lav", "6"],
        ]);
        let parsed = parse_inbound_table(&t, &ParseContext::default()).unwrap();
        assert_eq!(parsed.rows[0].location_id, Some(12));
        assert_eq!(parsed.rows[0].territory.as_deref(), Some("West"));
        assert_eq!(parsed.rows[0].metric_value, 6.0);
    }

    #[test]
    fn missing_required_columns() {
        let t = RawTable::from_rows(vec![vec!["LID", "Location", "Territory", "color", "Num"]]);
        match parse_inbound_table(&t, &ParseContext::default()) {
            Err(ReportError::MissingRequiredColumn(col)) => assert_eq!(col, inbound::YEAR_MONTH),
            other => panic!("expected missing YearMonth, got {other:?}"),
        }

        let t = RawTable::from_rows(vec![vec!["Location", "Territory", "YearMonth", "color", "Num"]]);
        match parse_inbound_table(&t, &ParseContext::default()) {
            Err(ReportError::MissingRequiredColumn(col)) => assert_eq!(col, inbound::LOCATION_ID),
            other => panic!("expected missing Location_ID, got {other:?}"),
        }

        assert!(matches!(
            parse_inbound_table(&RawTable::default(), &ParseContext::default()),
            Err(ReportError::MalformedInput(_))
        ));
    }
}
