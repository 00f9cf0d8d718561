use std::collections::BTreeMap;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyModule};
use pyo3_polars::PyDataFrame;

use crate::aggregation;
use crate::config::{ParseContext, ReconcileConfig};
use crate::error::ReportError;
use crate::export;
use crate::logging::{LogConfig, LogLevel};
use crate::model::{AggregateRow, ReconciledRow, ReportKind};
use crate::reconcile::reconcile_uploads;
use crate::report::ParsedReport;
use crate::schema;

/// Upload session: keeps the latest outbound and inbound report.
#[pyclass]
pub struct KitReconciler {
    config: ReconcileConfig,
    ctx: ParseContext,
    outbound: Option<ParsedReport>,
    inbound: Option<ParsedReport>,
}

impl KitReconciler {
    fn slot(&mut self, kind: ReportKind) -> &mut Option<ParsedReport> {
        match kind {
            ReportKind::Outbound => &mut self.outbound,
            ReportKind::Inbound => &mut self.inbound,
        }
    }

    /// `None` until both sides are loaded.
    fn reconciled_rows(&self) -> Option<Vec<ReconciledRow>> {
        reconcile_uploads(
            self.outbound.as_ref().map(|p| p.rows.as_slice()),
            self.inbound.as_ref().map(|p| p.rows.as_slice()),
        )
        .into_rows()
    }

    fn ranked(&self, exclude_marker: Option<&str>, top_n: Option<usize>) -> Option<Vec<AggregateRow>> {
        let rows = self.reconciled_rows()?;
        let marker = exclude_marker.unwrap_or(&self.config.exclude_marker);
        let n = top_n.unwrap_or_else(|| self.config.effective_top_n());
        Some(aggregation::top_n(&aggregation::aggregate(&rows, marker), n))
    }
}

#[pymethods]
impl KitReconciler {
    /// Optionally configured from a TOML document (year, exclude_marker,
    /// top_n, column synonyms, kit table).
    #[new]
    #[pyo3(signature = (config_toml=None))]
    fn new(config_toml: Option<&str>) -> PyResult<Self> {
        let config = match config_toml {
            Some(s) => ReconcileConfig::from_toml(s)?,
            None => ReconcileConfig::default(),
        };
        let ctx = config.parse_context()?;
        Ok(Self {
            config,
            ctx,
            outbound: None,
            inbound: None,
        })
    }

    #[getter]
    fn year(&self) -> i32 {
        self.ctx.year
    }

    // ── Uploads ─────────────────────────────────────────────────────────────

    /// Parse an uploaded `out_*.csv` / `in_*.csv` and keep it for its side.
    ///
    /// Returns the normalized rows. A failed parse clears the stored data
    /// for that side only and raises.
    fn load_report(&mut self, data: &[u8], filename: &str) -> PyResult<PyDataFrame> {
        let kind = ReportKind::from_filename(filename)
            .ok_or_else(|| ReportError::UnsupportedFileName(filename.to_string()))?;

        match crate::parse_report(data, filename, &self.ctx) {
            Ok(parsed) => {
                let df = export::normalized_frame(&parsed.rows, kind)?;
                *self.slot(kind) = Some(parsed);
                Ok(PyDataFrame(df))
            }
            Err(err) => {
                tracing::warn!(%kind, filename, error = %err, "Upload rejected");
                *self.slot(kind) = None;
                Err(err.into())
            }
        }
    }

    fn clear(&mut self) {
        self.outbound = None;
        self.inbound = None;
    }

    /// Leniency tally of the last successful upload for `kind`
    /// ("outbound" or "inbound").
    fn parse_report_counts(&self, kind: &str) -> PyResult<Option<BTreeMap<String, usize>>> {
        let parsed = match kind {
            "outbound" => &self.outbound,
            "inbound" => &self.inbound,
            other => return Err(PyValueError::new_err(format!("Unknown report kind: {other}"))),
        };
        Ok(parsed.as_ref().map(|p| p.report.counts()))
    }

    // ── Views ───────────────────────────────────────────────────────────────

    fn reconciled(&self) -> PyResult<Option<PyDataFrame>> {
        match self.reconciled_rows() {
            Some(rows) => Ok(Some(PyDataFrame(export::reconciled_frame(&rows)?))),
            None => Ok(None),
        }
    }

    #[pyo3(signature = (exclude_marker=None, top_n=None))]
    fn aggregate(&self, exclude_marker: Option<&str>, top_n: Option<usize>) -> PyResult<Option<PyDataFrame>> {
        match self.ranked(exclude_marker, top_n) {
            Some(rows) => Ok(Some(PyDataFrame(export::aggregate_frame(&rows)?))),
            None => Ok(None),
        }
    }

    fn monthly_breakdown(&self) -> PyResult<Option<PyDataFrame>> {
        match self.reconciled_rows() {
            Some(rows) => {
                let monthly = aggregation::monthly_breakdown(&rows);
                Ok(Some(PyDataFrame(export::monthly_frame(&monthly)?)))
            }
            None => Ok(None),
        }
    }

    // ── CSV downloads ───────────────────────────────────────────────────────

    fn reconciled_csv<'py>(&self, py: Python<'py>) -> PyResult<Option<Bound<'py, PyBytes>>> {
        let Some(rows) = self.reconciled_rows() else {
            return Ok(None);
        };
        let mut df = export::reconciled_frame(&rows)?;
        let buf = export::write_csv(&mut df)?;
        Ok(Some(PyBytes::new(py, &buf)))
    }

    #[pyo3(signature = (exclude_marker=None, top_n=None))]
    fn aggregate_csv<'py>(
        &self,
        py: Python<'py>,
        exclude_marker: Option<&str>,
        top_n: Option<usize>,
    ) -> PyResult<Option<Bound<'py, PyBytes>>> {
        let Some(rows) = self.ranked(exclude_marker, top_n) else {
            return Ok(None);
        };
        let mut df = export::aggregate_frame(&rows)?;
        let buf = export::write_csv(&mut df)?;
        Ok(Some(PyBytes::new(py, &buf)))
    }
}

/// Route `tracing` output to stderr. Returns False if logging was already set up.
#[pyfunction]
#[pyo3(signature = (level="info", json=false))]
fn init_logging(level: &str, json: bool) -> PyResult<bool> {
    let level: LogLevel = level.parse().map_err(PyValueError::new_err)?;
    Ok(LogConfig {
        level,
        structured: json,
    }
    .init())
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Outbound
    let outbound = PyModule::new(m.py(), "outbound")?;
    outbound.add("ORDER_ID", schema::outbound::ORDER_ID)?;
    outbound.add("LOCATION", schema::outbound::LOCATION)?;
    outbound.add("TERRITORY", schema::outbound::TERRITORY)?;
    outbound.add("SALES_REP", schema::outbound::SALES_REP)?;
    m.add_submodule(&outbound)?;

    // Inbound
    let inbound = PyModule::new(m.py(), "inbound")?;
    inbound.add("LOCATION_ID", schema::inbound::LOCATION_ID)?;
    inbound.add("LOCATION", schema::inbound::LOCATION)?;
    inbound.add("TERRITORY", schema::inbound::TERRITORY)?;
    inbound.add("YEAR_MONTH", schema::inbound::YEAR_MONTH)?;
    inbound.add("TUBE_TYPE", schema::inbound::TUBE_TYPE)?;
    inbound.add("COUNT", schema::inbound::COUNT)?;
    m.add_submodule(&inbound)?;

    // Reconciled
    let reconciled = PyModule::new(m.py(), "reconciled")?;
    reconciled.add("LOCATION_ID", schema::reconciled::LOCATION_ID)?;
    reconciled.add("LOCATION", schema::reconciled::LOCATION)?;
    reconciled.add("TERRITORY", schema::reconciled::TERRITORY)?;
    reconciled.add("YEAR_MONTH", schema::reconciled::YEAR_MONTH)?;
    reconciled.add("TUBE_TYPE", schema::reconciled::TUBE_TYPE)?;
    reconciled.add("TUBES_SENT", schema::reconciled::TUBES_SENT)?;
    reconciled.add("SAMPLES_RETURNED", schema::reconciled::SAMPLES_RETURNED)?;
    reconciled.add("REMAINING", schema::reconciled::REMAINING)?;
    m.add_submodule(&reconciled)?;

    // Aggregate
    let aggregate = PyModule::new(m.py(), "aggregate")?;
    aggregate.add("TOTAL_REMAINING", schema::aggregate::TOTAL_REMAINING)?;
    m.add_submodule(&aggregate)?;

    // Tube types
    let tube_type = PyModule::new(m.py(), "tube_type")?;
    tube_type.add("ACD", schema::tube_type::ACD)?;
    tube_type.add("BLUE", schema::tube_type::BLUE)?;
    tube_type.add("LAV", schema::tube_type::LAV)?;
    tube_type.add("SST", schema::tube_type::SST)?;
    m.add_submodule(&tube_type)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<KitReconciler>()?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    add_schema_exports(m)?;
    Ok(())
}
