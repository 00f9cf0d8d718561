use std::collections::BTreeMap;

use crate::error::ReportError;
use crate::model::TubeType;

/// Kit description -> tubes contained in one kit.
///
/// Built once and shared read-only (`Arc<KitCatalog>`) by both parsers.
/// Lookups are exact string matches on the description.
#[derive(Debug, Clone, PartialEq)]
pub struct KitCatalog {
    kits: BTreeMap<String, BTreeMap<TubeType, u32>>,
}

const BUILTIN: &[(&str, &[(TubeType, u32)])] = &[
    ("MNT & Telomere Kit (2 ACD 1 Blue Sodium Citrate)", &[(TubeType::Acd, 2), (TubeType::Blue, 1)]),
    ("MNT & Telomere Kit (2 ACD, 1 Blue Sodium Citrate)", &[(TubeType::Acd, 2), (TubeType::Blue, 1)]),
    ("MNT Kit Only (2 ACD)", &[(TubeType::Acd, 2)]),
    ("MTHFR Kit (1 Blue Sodium Citrate)", &[(TubeType::Blue, 1)]),
    ("Telomere Kit (1 Blue Sodium Citrate)", &[(TubeType::Blue, 1)]),
    ("Tube - ACD (8.5 mL) Yellow Tops", &[(TubeType::Acd, 1)]),
    ("Tube - Lt. Blue (3mL) Telo/MTHFR-Sodium Citrate", &[(TubeType::Blue, 1)]),
    ("Tube - SST (7.5 mL) Tiger Top", &[(TubeType::Sst, 1)]),
    // Truncated spellings seen in exported reports
    ("MNT & Tel. 1 Blue Sor", &[(TubeType::Acd, 2), (TubeType::Blue, 1)]),
    ("MNT Kit O", &[(TubeType::Acd, 2)]),
    ("Tube - ACD Tube", &[(TubeType::Acd, 1)]),
    ("Tube - Lt. LTtube", &[(TubeType::Blue, 1)]),
    ("-SST MNT Kit Only (2 ACD)", &[(TubeType::Sst, 1), (TubeType::Acd, 2)]),
];

impl KitCatalog {
    /// The kit table shipped with the crate.
    pub fn builtin() -> Self {
        let kits = BUILTIN
            .iter()
            .map(|(desc, tubes)| (desc.to_string(), tubes.iter().copied().collect()))
            .collect();
        Self { kits }
    }

    /// Build a catalog from `description -> {tube code -> qty}` entries.
    ///
    /// Every tube code must be in the closed tube-type set and every
    /// quantity must be positive.
    pub fn from_entries(
        entries: BTreeMap<String, BTreeMap<String, u32>>,
    ) -> Result<Self, ReportError> {
        let mut kits = BTreeMap::new();
        for (desc, tubes) in entries {
            if tubes.is_empty() {
                return Err(ReportError::Config(format!("Kit '{desc}' contains no tubes")));
            }
            let mut parsed = BTreeMap::new();
            for (code, qty) in tubes {
                let tube: TubeType = code
                    .parse()
                    .map_err(|e: String| ReportError::Config(format!("Kit '{desc}': {e}")))?;
                if qty == 0 {
                    return Err(ReportError::Config(format!(
                        "Kit '{desc}': quantity for {tube} must be positive"
                    )));
                }
                parsed.insert(tube, qty);
            }
            kits.insert(desc.trim().to_string(), parsed);
        }
        Ok(Self { kits })
    }

    /// Parse a catalog from TOML, one table per kit:
    ///
    /// ```toml
    /// ["MNT Kit Only (2 ACD)"]
    /// ACD = 2
    /// ```
    pub fn from_toml(s: &str) -> Result<Self, ReportError> {
        let entries: BTreeMap<String, BTreeMap<String, u32>> = toml::from_str(s)?;
        Self::from_entries(entries)
    }

    pub fn lookup(&self, description: &str) -> Option<&BTreeMap<TubeType, u32>> {
        self.kits.get(description)
    }

    pub fn contains(&self, description: &str) -> bool {
        self.kits.contains_key(description)
    }

    pub fn len(&self) -> usize {
        self.kits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kits.is_empty()
    }
}

impl Default for KitCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
