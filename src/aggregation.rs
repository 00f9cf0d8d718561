use std::collections::BTreeMap;

use crate::config::ReconcileConfig;
use crate::model::{AggregateRow, MonthlyTotal, ReconciledRow, TubeType, YearMonth};

/// Group key: (location_id, location, territory).
type LocationKey = (Option<i64>, String, Option<String>);

/// Case-insensitive substring match of `marker` against location or
/// territory. An empty marker excludes nothing.
pub fn is_excluded(row: &ReconciledRow, marker: &str) -> bool {
    let marker = marker.trim().to_lowercase();
    if marker.is_empty() {
        return false;
    }
    row.location.to_lowercase().contains(&marker)
        || row
            .territory
            .as_deref()
            .is_some_and(|t| t.to_lowercase().contains(&marker))
}

/// Per-location remaining stock summed over every month, largest first.
///
/// Rows whose location or territory contains `exclude_marker` are left
/// out. Ties keep (location_id, location, territory) order.
pub fn aggregate(rows: &[ReconciledRow], exclude_marker: &str) -> Vec<AggregateRow> {
    let mut totals: BTreeMap<LocationKey, f64> = BTreeMap::new();
    let mut excluded = 0usize;

    for row in rows {
        if is_excluded(row, exclude_marker) {
            excluded += 1;
            continue;
        }
        let key = (row.location_id, row.location.clone(), row.territory.clone());
        *totals.entry(key).or_insert(0.0) += row.remaining;
    }

    let mut out: Vec<AggregateRow> = totals
        .into_iter()
        .map(|((location_id, location, territory), total)| AggregateRow {
            location_id,
            location,
            territory,
            total_remaining: total,
        })
        .collect();
    out.sort_by(|a, b| b.total_remaining.total_cmp(&a.total_remaining));

    tracing::debug!(
        marker = exclude_marker,
        excluded,
        locations = out.len(),
        "Aggregated remaining stock"
    );
    out
}

/// First `n` entries of an already ranked summary. `n` below 1 is treated as 1.
pub fn top_n(ranked: &[AggregateRow], n: usize) -> Vec<AggregateRow> {
    ranked.iter().take(n.max(1)).cloned().collect()
}

/// `aggregate` followed by `top_n`, both parameterized from config.
pub fn ranked_summary(rows: &[ReconciledRow], config: &ReconcileConfig) -> Vec<AggregateRow> {
    top_n(&aggregate(rows, &config.exclude_marker), config.effective_top_n())
}

/// Network-wide sent vs returned per month and tube type.
///
/// Every tube type appears for every month present in `rows`, zero-filled.
/// Sorted by month, then tube type.
pub fn monthly_breakdown(rows: &[ReconciledRow]) -> Vec<MonthlyTotal> {
    let mut totals: BTreeMap<(YearMonth, TubeType), (f64, f64)> = BTreeMap::new();

    for row in rows {
        for tube in TubeType::ALL {
            totals.entry((row.year_month, tube)).or_insert((0.0, 0.0));
        }
        let entry = totals
            .entry((row.year_month, row.tube_type))
            .or_insert((0.0, 0.0));
        entry.0 += row.tubes_sent;
        entry.1 += row.samples_returned;
    }

    totals
        .into_iter()
        .map(|((year_month, tube_type), (sent, returned))| MonthlyTotal {
            year_month,
            tube_type,
            tubes_sent: sent,
            samples_returned: returned,
        })
        .collect()
}
