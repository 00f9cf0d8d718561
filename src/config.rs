use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Datelike;
use serde::Deserialize;

use crate::catalog::KitCatalog;
use crate::error::ReportError;
use crate::schema::{inbound, outbound};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Run configuration, usually read from a `kit-reconcile.toml`.
///
/// ```toml
/// year = 2025
/// exclude_marker = "DTC"
/// top_n = 10
///
/// [inbound.columns]
/// Location_ID = ["Clinic Number"]
///
/// [kits."Starter Kit"]
/// ACD = 2
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    /// Processing year for outbound month indicators. Current year if unset.
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default = "default_exclude_marker")]
    pub exclude_marker: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub outbound: SideConfig,
    #[serde(default)]
    pub inbound: SideConfig,
    /// Replaces the builtin kit catalog when present.
    #[serde(default)]
    pub kits: Option<BTreeMap<String, BTreeMap<String, u32>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SideConfig {
    /// Canonical column -> extra accepted header spellings.
    #[serde(default)]
    pub columns: BTreeMap<String, Vec<String>>,
}

fn default_exclude_marker() -> String {
    "DTC".to_string()
}

fn default_top_n() -> usize {
    10
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            year: None,
            exclude_marker: default_exclude_marker(),
            top_n: default_top_n(),
            outbound: SideConfig::default(),
            inbound: SideConfig::default(),
            kits: None,
        }
    }
}

impl ReconcileConfig {
    pub fn from_toml(s: &str) -> Result<Self, ReportError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        check_canonical("outbound", &self.outbound.columns, &outbound::IDENTITY)?;
        check_canonical("inbound", &self.inbound.columns, &inbound::REQUIRED)?;
        if let Some(year) = self.year {
            if !(1900..=9999).contains(&year) {
                return Err(ReportError::Config(format!("year out of range: {year}")));
            }
        }
        Ok(())
    }

    /// Top-N is never smaller than one.
    pub fn effective_top_n(&self) -> usize {
        self.top_n.max(1)
    }

    pub fn processing_year(&self) -> i32 {
        self.year.unwrap_or_else(|| chrono::Local::now().year())
    }

    /// Build the shared, read-only parsing context.
    pub fn parse_context(&self) -> Result<ParseContext, ReportError> {
        self.validate()?;
        let catalog = match &self.kits {
            Some(entries) => KitCatalog::from_entries(entries.clone())?,
            None => KitCatalog::builtin(),
        };

        let mut outbound_columns = ColumnSynonyms::outbound_defaults();
        outbound_columns.extend(&self.outbound.columns);
        let mut inbound_columns = ColumnSynonyms::inbound_defaults();
        inbound_columns.extend(&self.inbound.columns);

        Ok(ParseContext {
            catalog: Arc::new(catalog),
            outbound_columns: Arc::new(outbound_columns),
            inbound_columns: Arc::new(inbound_columns),
            year: self.processing_year(),
        })
    }
}

fn check_canonical(
    side: &str,
    columns: &BTreeMap<String, Vec<String>>,
    allowed: &[&str],
) -> Result<(), ReportError> {
    for canonical in columns.keys() {
        if !allowed.contains(&canonical.as_str()) {
            return Err(ReportError::Config(format!(
                "{side}.columns: '{canonical}' is not a canonical column (expected one of {})",
                allowed.join(", ")
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Column synonyms
// ---------------------------------------------------------------------------

/// Header spelling -> canonical column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSynonyms {
    aliases: BTreeMap<String, String>,
}

impl ColumnSynonyms {
    pub fn new(canonical: &[&str]) -> Self {
        let aliases = canonical
            .iter()
            .map(|c| (c.to_string(), c.to_string()))
            .collect();
        Self { aliases }
    }

    pub fn outbound_defaults() -> Self {
        let mut s = Self::new(&outbound::IDENTITY);
        s.add(outbound::ORDER_ID, &["Host Code"]);
        s.add(outbound::LOCATION, &["Organization Name"]);
        s.add(outbound::TERRITORY, &["Territory Name", "Location_Code"]);
        s.add(outbound::SALES_REP, &["Sales Rep Full Name"]);
        s
    }

    pub fn inbound_defaults() -> Self {
        let mut s = Self::new(&inbound::REQUIRED);
        s.add(inbound::LOCATION_ID, &["LID", "Location ID", "LocationID"]);
        s.add(inbound::LOCATION, &["Organization Name", "Location Name"]);
        s.add(inbound::TERRITORY, &["Territory Name", "Location_Code"]);
        s.add(inbound::YEAR_MONTH, &["Year_Month", "YYYYMM"]);
        s.add(inbound::TUBE_TYPE, &["color", "Color", "Tube Type"]);
        s.add(inbound::COUNT, &["Num", "Samples", "Samples Returned"]);
        s
    }

    pub fn add(&mut self, canonical: &str, spellings: &[&str]) {
        for spelling in spellings {
            self.aliases
                .insert(spelling.trim().to_string(), canonical.to_string());
        }
    }

    pub fn extend(&mut self, extra: &BTreeMap<String, Vec<String>>) {
        for (canonical, spellings) in extra {
            for spelling in spellings {
                self.aliases
                    .insert(spelling.trim().to_string(), canonical.clone());
            }
        }
    }

    /// Canonical name for a raw header, if recognized.
    pub fn resolve(&self, header: &str) -> Option<&str> {
        self.aliases.get(header.trim()).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Parse context
// ---------------------------------------------------------------------------

/// Everything a parser needs besides the file itself. Cheap to clone;
/// never mutated after construction.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub catalog: Arc<KitCatalog>,
    pub outbound_columns: Arc<ColumnSynonyms>,
    pub inbound_columns: Arc<ColumnSynonyms>,
    /// Year applied to outbound month indicators.
    pub year: i32,
}

impl ParseContext {
    pub fn new(catalog: Arc<KitCatalog>, year: i32) -> Self {
        Self {
            catalog,
            outbound_columns: Arc::new(ColumnSynonyms::outbound_defaults()),
            inbound_columns: Arc::new(ColumnSynonyms::inbound_defaults()),
            year,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::new(Arc::new(KitCatalog::builtin()), chrono::Local::now().year())
    }
}
