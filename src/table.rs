use std::io::Cursor;

use polars::prelude::*;

use crate::error::ReportError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// An uploaded CSV as trimmed string cells, no header interpretation.
///
/// Row 0 is the first physical line of the file. Missing and null cells
/// read as the empty string. The table is as wide as row 0; cells past
/// that width on later lines are cut off and `was_truncated` reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    rows: Vec<Vec<String>>,
    width: usize,
    truncated: bool,
}

impl RawTable {
    /// Read CSV bytes with every column as String dtype.
    /// Ragged lines are tolerated and invalid UTF-8 is replaced lossily.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self, ReportError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::default());
        }

        let (df, truncated) = match Self::read(bytes, false) {
            Ok(df) => (df, false),
            Err(err) => {
                tracing::debug!(error = %err, "Strict CSV read failed, retrying with ragged lines truncated");
                (Self::read(bytes, true)?, true)
            }
        };
        if truncated {
            tracing::warn!("Cells beyond the first row's width were ignored");
        }

        // Trim whitespace from every cell
        let names: Vec<String> = df
            .get_column_names_str()
            .iter()
            .map(|c| c.to_string())
            .collect();
        let trimmed: Vec<Expr> = names
            .iter()
            .map(|n| col(n.as_str()).str().strip_chars(lit(" \t\r\n")))
            .collect();
        let df = df.lazy().with_columns(trimmed).collect()?;

        let mut table = Self::from_frame(&df)?;
        table.truncated = truncated;
        Ok(table)
    }

    fn read(bytes: &[u8], truncate_ragged_lines: bool) -> PolarsResult<DataFrame> {
        CsvReadOptions::default()
            .with_has_header(false)
            .with_infer_schema_length(Some(0)) // all columns as String
            .with_parse_options(
                CsvParseOptions::default()
                    .with_encoding(CsvEncoding::LossyUtf8)
                    .with_truncate_ragged_lines(truncate_ragged_lines),
            )
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()
    }

    fn from_frame(df: &DataFrame) -> Result<Self, ReportError> {
        let columns = df
            .get_columns()
            .iter()
            .map(|c| c.str())
            .collect::<PolarsResult<Vec<_>>>()?;

        let rows = (0..df.height())
            .map(|i| {
                columns
                    .iter()
                    .map(|ca| ca.get(i).unwrap_or("").to_string())
                    .collect()
            })
            .collect();

        Ok(Self {
            rows,
            width: columns.len(),
            truncated: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_rows(rows: Vec<Vec<&str>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(|c| c.trim().to_string()).collect())
            .collect();
        Self {
            rows,
            width,
            truncated: false,
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn row(&self, row: usize) -> &[String] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_blank_row(&self, row: usize) -> bool {
        self.row(row).iter().all(|c| c.is_empty())
    }

    /// True if some line had more cells than row 0 and was cut to fit.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_without_header_and_trims() {
        let table = RawTable::from_csv_bytes(b"a , b,c\n 1,2 , 3\n").unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.width(), 3);
        assert_eq!(table.cell(0, 0), "a");
        assert_eq!(table.cell(1, 1), "2");
        assert_eq!(table.cell(5, 5), "");
    }

    #[test]
    fn empty_bytes_yield_empty_table() {
        assert_eq!(RawTable::from_csv_bytes(b"").unwrap().height(), 0);
        assert_eq!(RawTable::from_csv_bytes(b" \n\n").unwrap().height(), 0);
    }

    #[test]
    fn strips_byte_order_mark() {
        let table = RawTable::from_csv_bytes(b"\xEF\xBB\xBFLID,Num\n7,3\n").unwrap();
        assert_eq!(table.cell(0, 0), "LID");
    }

    #[test]
    fn blank_cells_read_as_empty() {
        let table = RawTable::from_csv_bytes(b",,x\n1,,2\n").unwrap();
        assert_eq!(table.cell(0, 0), "");
        assert_eq!(table.cell(1, 1), "");
        assert!(!table.is_blank_row(1));
        assert!(!table.was_truncated());
    }

    #[test]
    fn wide_lines_are_cut_to_first_row() {
        let table = RawTable::from_csv_bytes(b"a,b\n1,2,3\n").unwrap();
        assert_eq!(table.width(), 2);
        assert_eq!(table.cell(1, 1), "2");
        assert!(table.was_truncated());
    }
}
