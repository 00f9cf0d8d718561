//! Outer join of outbound and inbound rows on (location, year_month, tube_type).

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::model::{NormalizedRow, ReconciledRow, RowKey};

#[derive(Debug, Default)]
struct JoinedKey {
    tubes_sent: f64,
    samples_returned: f64,
}

/// Identity seen for one location on each side, across all months.
#[derive(Debug, Default)]
struct LocationIdentity {
    outbound_id: Option<i64>,
    outbound_territory: Option<String>,
    inbound_id: Option<i64>,
    inbound_territory: Option<String>,
}

fn keep_first<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

/// Full outer join of the two normalized sides.
///
/// One output row per distinct key on either side. A side without a row
/// for a key contributes 0. Location id and territory are resolved once
/// per location over all months, inbound winning over outbound, so every
/// row of a location carries the same identity. `remaining` is `tubes_sent - samples_returned`
/// and is not clamped. Output is sorted by (year_month, location,
/// tube_type).
pub fn reconcile(outbound: &[NormalizedRow], inbound: &[NormalizedRow]) -> Vec<ReconciledRow> {
    let mut joined: BTreeMap<RowKey, JoinedKey> = BTreeMap::new();
    let mut identities: BTreeMap<String, LocationIdentity> = BTreeMap::new();

    for row in outbound {
        joined.entry(row.key()).or_default().tubes_sent += row.metric_value;
        let identity = identities.entry(row.location.clone()).or_default();
        keep_first(&mut identity.outbound_id, &row.location_id);
        keep_first(&mut identity.outbound_territory, &row.territory);
    }
    for row in inbound {
        joined.entry(row.key()).or_default().samples_returned += row.metric_value;
        let identity = identities.entry(row.location.clone()).or_default();
        keep_first(&mut identity.inbound_id, &row.location_id);
        keep_first(&mut identity.inbound_territory, &row.territory);
    }

    let rows: Vec<ReconciledRow> = joined
        .into_iter()
        .map(|(key, j)| {
            let (location_id, territory) = match identities.get(&key.location) {
                Some(id) => (
                    id.inbound_id.or(id.outbound_id),
                    id.inbound_territory.clone().or_else(|| id.outbound_territory.clone()),
                ),
                None => (None, None),
            };
            ReconciledRow {
                location_id,
                location: key.location,
                territory,
                year_month: key.year_month,
                tube_type: key.tube_type,
                tubes_sent: j.tubes_sent,
                samples_returned: j.samples_returned,
                remaining: j.tubes_sent - j.samples_returned,
            }
        })
        .collect();

    let over_returned = rows.iter().filter(|r| r.is_over_returned()).count();
    if over_returned > 0 {
        warn!(over_returned, "Rows with more samples returned than tubes sent");
    }
    info!(
        outbound = outbound.len(),
        inbound = inbound.len(),
        reconciled = rows.len(),
        "Reconciled reports"
    );
    rows
}

/// Result of reconciling whatever has been uploaded so far.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Ready(Vec<ReconciledRow>),
    /// One or both sides have not been uploaded (or failed to parse).
    InsufficientData {
        outbound_missing: bool,
        inbound_missing: bool,
    },
}

impl ReconcileOutcome {
    pub fn rows(&self) -> Option<&[ReconciledRow]> {
        match self {
            Self::Ready(rows) => Some(rows),
            Self::InsufficientData { .. } => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<ReconciledRow>> {
        match self {
            Self::Ready(rows) => Some(rows),
            Self::InsufficientData { .. } => None,
        }
    }
}

pub fn reconcile_uploads(
    outbound: Option<&[NormalizedRow]>,
    inbound: Option<&[NormalizedRow]>,
) -> ReconcileOutcome {
    match (outbound, inbound) {
        (Some(o), Some(i)) => ReconcileOutcome::Ready(reconcile(o, i)),
        (o, i) => ReconcileOutcome::InsufficientData {
            outbound_missing: o.is_none(),
            inbound_missing: i.is_none(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TubeType, YearMonth};

    fn row(location: &str, month: u32, tube: TubeType, value: f64) -> NormalizedRow {
        NormalizedRow {
            location: location.into(),
            location_id: None,
            territory: None,
            year_month: YearMonth::new(2025, month).unwrap(),
            tube_type: tube,
            metric_value: value,
        }
    }

    fn with_identity(mut r: NormalizedRow, id: Option<i64>, territory: Option<&str>) -> NormalizedRow {
        r.location_id = id;
        r.territory = territory.map(String::from);
        r
    }

    #[test]
    fn matched_key_computes_remaining() {
        let out = vec![row("Loc A", 1, TubeType::Acd, 10.0)];
        let inb = vec![with_identity(row("Loc A", 1, TubeType::Acd, 3.0), Some(7), Some("Terr1"))];
        let rows = reconcile(&out, &inb);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tubes_sent, 10.0);
        assert_eq!(rows[0].samples_returned, 3.0);
        assert_eq!(rows[0].remaining, 7.0);
        assert_eq!(rows[0].location_id, Some(7));
        assert_eq!(rows[0].territory.as_deref(), Some("Terr1"));
    }

    #[test]
    fn unmatched_keys_are_zero_filled() {
        let out = vec![row("Loc A", 1, TubeType::Acd, 4.0)];
        let inb = vec![row("Loc B", 1, TubeType::Blue, 2.0)];
        let rows = reconcile(&out, &inb);
        assert_eq!(rows.len(), 2);

        let a = rows.iter().find(|r| r.location == "Loc A").unwrap();
        assert_eq!((a.tubes_sent, a.samples_returned, a.remaining), (4.0, 0.0, 4.0));
        let b = rows.iter().find(|r| r.location == "Loc B").unwrap();
        assert_eq!((b.tubes_sent, b.samples_returned, b.remaining), (0.0, 2.0, -2.0));
        assert!(b.is_over_returned());
    }

    #[test]
    fn identity_falls_back_to_outbound() {
        let out = vec![with_identity(row("Loc A", 1, TubeType::Acd, 4.0), Some(101), Some("East"))];
        let inb = vec![row("Loc A", 1, TubeType::Acd, 1.0)];
        let rows = reconcile(&out, &inb);
        assert_eq!(rows[0].location_id, Some(101));
        assert_eq!(rows[0].territory.as_deref(), Some("East"));
    }

    #[test]
    fn identity_is_shared_across_months_of_a_location() {
        let out = vec![
            with_identity(row("Loc A", 1, TubeType::Acd, 10.0), Some(101), Some("East")),
            with_identity(row("Loc A", 2, TubeType::Acd, 10.0), Some(101), Some("East")),
        ];
        let inb = vec![with_identity(row("Loc A", 1, TubeType::Acd, 3.0), Some(7), Some("Terr1"))];
        let rows = reconcile(&out, &inb);
        assert_eq!(rows.len(), 2);
        for r in &rows {
            assert_eq!(r.location_id, Some(7));
            assert_eq!(r.territory.as_deref(), Some("Terr1"));
        }
    }

    #[test]
    fn one_row_per_key_even_with_duplicates() {
        let out = vec![row("Loc A", 1, TubeType::Acd, 4.0), row("Loc A", 1, TubeType::Acd, 6.0)];
        let inb = vec![
            with_identity(row("Loc A", 1, TubeType::Acd, 1.0), Some(7), Some("T1")),
            with_identity(row("Loc A", 1, TubeType::Acd, 2.0), Some(8), Some("T2")),
        ];
        let rows = reconcile(&out, &inb);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tubes_sent, 10.0);
        assert_eq!(rows[0].samples_returned, 3.0);
        assert_eq!(rows[0].location_id, Some(7));
    }

    #[test]
    fn sorted_by_month_location_tube() {
        let out = vec![
            row("Loc B", 2, TubeType::Acd, 1.0),
            row("Loc A", 2, TubeType::Sst, 1.0),
            row("Loc A", 2, TubeType::Blue, 1.0),
            row("Loc Z", 1, TubeType::Lav, 1.0),
        ];
        let rows = reconcile(&out, &[]);
        let order: Vec<(u32, &str, TubeType)> = rows
            .iter()
            .map(|r| (r.year_month.month(), r.location.as_str(), r.tube_type))
            .collect();
        assert_eq!(
            order,
            vec![
                (1, "Loc Z", TubeType::Lav),
                (2, "Loc A", TubeType::Blue),
                (2, "Loc A", TubeType::Sst),
                (2, "Loc B", TubeType::Acd),
            ]
        );
    }

    #[test]
    fn missing_side_is_insufficient_data() {
        let out = vec![row("Loc A", 1, TubeType::Acd, 1.0)];
        assert_eq!(
            reconcile_uploads(Some(out.as_slice()), None),
            ReconcileOutcome::InsufficientData { outbound_missing: false, inbound_missing: true }
        );
        assert!(reconcile_uploads(None, None).rows().is_none());
        assert_eq!(reconcile_uploads(Some(&[][..]), Some(&[][..])), ReconcileOutcome::Ready(vec![]));
    }
}
