//! Table export: typed rows -> Polars DataFrames -> CSV bytes.
//!
//! `year_month` is rendered as `YYYY-MM` in every frame. Column order
//! follows the field order of the row types.

use polars::prelude::*;

use crate::error::ReportError;
use crate::model::{AggregateRow, MonthlyTotal, NormalizedRow, ReconciledRow, ReportKind};
use crate::schema::{aggregate, reconciled};

pub fn normalized_frame(rows: &[NormalizedRow], kind: ReportKind) -> Result<DataFrame, ReportError> {
    let df = DataFrame::new(vec![
        Column::new(
            reconciled::LOCATION_ID.into(),
            rows.iter().map(|r| r.location_id).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::LOCATION.into(),
            rows.iter().map(|r| r.location.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::TERRITORY.into(),
            rows.iter().map(|r| r.territory.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::YEAR_MONTH.into(),
            rows.iter().map(|r| r.year_month.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::TUBE_TYPE.into(),
            rows.iter().map(|r| r.tube_type.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            kind.metric_name().into(),
            rows.iter().map(|r| r.metric_value).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

pub fn reconciled_frame(rows: &[ReconciledRow]) -> Result<DataFrame, ReportError> {
    let df = DataFrame::new(vec![
        Column::new(
            reconciled::LOCATION_ID.into(),
            rows.iter().map(|r| r.location_id).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::LOCATION.into(),
            rows.iter().map(|r| r.location.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::TERRITORY.into(),
            rows.iter().map(|r| r.territory.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::YEAR_MONTH.into(),
            rows.iter().map(|r| r.year_month.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::TUBE_TYPE.into(),
            rows.iter().map(|r| r.tube_type.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::TUBES_SENT.into(),
            rows.iter().map(|r| r.tubes_sent).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::SAMPLES_RETURNED.into(),
            rows.iter().map(|r| r.samples_returned).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::REMAINING.into(),
            rows.iter().map(|r| r.remaining).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

pub fn aggregate_frame(rows: &[AggregateRow]) -> Result<DataFrame, ReportError> {
    let df = DataFrame::new(vec![
        Column::new(
            reconciled::LOCATION_ID.into(),
            rows.iter().map(|r| r.location_id).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::LOCATION.into(),
            rows.iter().map(|r| r.location.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::TERRITORY.into(),
            rows.iter().map(|r| r.territory.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            aggregate::TOTAL_REMAINING.into(),
            rows.iter().map(|r| r.total_remaining).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

pub fn monthly_frame(rows: &[MonthlyTotal]) -> Result<DataFrame, ReportError> {
    let df = DataFrame::new(vec![
        Column::new(
            reconciled::YEAR_MONTH.into(),
            rows.iter().map(|r| r.year_month.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::TUBE_TYPE.into(),
            rows.iter().map(|r| r.tube_type.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::TUBES_SENT.into(),
            rows.iter().map(|r| r.tubes_sent).collect::<Vec<_>>(),
        ),
        Column::new(
            reconciled::SAMPLES_RETURNED.into(),
            rows.iter().map(|r| r.samples_returned).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

/// Serialize a frame as UTF-8 CSV with a header row.
pub fn write_csv(df: &mut DataFrame) -> Result<Vec<u8>, ReportError> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf).include_header(true).finish(df)?;
    Ok(buf)
}
