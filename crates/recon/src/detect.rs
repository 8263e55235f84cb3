use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::Thresholds;
use crate::model::{MultiDayFinding, NormalizedRecord, SourceFindings, SourceTable};

/// Run every intra-source check over one table.
pub fn detect_all(table: &SourceTable, thresholds: &Thresholds) -> SourceFindings {
    let findings = SourceFindings {
        duplicates: duplicate_codes(table),
        negatives: negative_quantities(table),
        outliers: percentile_outliers(table, thresholds.outlier_percentile),
        type_outliers: type_outliers(table, thresholds.type_mean_ratio),
        same_day: same_day_duplicates(table),
        multi_day: codes_on_multiple_days(table),
    };
    log::debug!(
        "{}: {} duplicate, {} negative, {} outlier, {} type outlier, {} same-day, {} multi-day row(s)",
        table.label,
        findings.duplicates.len(),
        findings.negatives.len(),
        findings.outliers.len(),
        findings.type_outliers.len(),
        findings.same_day.len(),
        findings.multi_day.rows.len(),
    );
    findings
}

/// Keep rows whose key occurs at least twice. Every member of a group is kept.
fn repeated_by<K, F>(table: &SourceTable, key: F) -> Vec<NormalizedRecord>
where
    K: std::hash::Hash + Eq,
    F: Fn(&NormalizedRecord) -> K,
{
    let mut counts: HashMap<K, usize> = HashMap::new();
    for rec in &table.records {
        *counts.entry(key(rec)).or_insert(0) += 1;
    }
    table
        .records
        .iter()
        .filter(|rec| counts.get(&key(rec)).copied().unwrap_or(0) > 1)
        .cloned()
        .collect()
}

pub fn duplicate_codes(table: &SourceTable) -> Vec<NormalizedRecord> {
    repeated_by(table, |rec| rec.code.clone())
}

pub fn negative_quantities(table: &SourceTable) -> Vec<NormalizedRecord> {
    table
        .records
        .iter()
        .filter(|rec| rec.quantity.is_some_and(|q| q < 0.0))
        .cloned()
        .collect()
}

/// Linear-interpolated percentile of `values` (`p` in [0, 1]).
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Rows whose quantity is strictly above the table's `p` percentile.
pub fn percentile_outliers(table: &SourceTable, p: f64) -> Vec<NormalizedRecord> {
    let values: Vec<f64> = table.records.iter().filter_map(|r| r.quantity).collect();
    let Some(cutoff) = percentile(&values, p) else {
        return Vec::new();
    };
    table
        .records
        .iter()
        .filter(|rec| rec.quantity.is_some_and(|q| q > cutoff))
        .cloned()
        .collect()
}

/// Rows whose quantity exceeds `ratio` times the mean of their fuel type.
pub fn type_outliers(table: &SourceTable, ratio: f64) -> Vec<NormalizedRecord> {
    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for rec in &table.records {
        if let (Some(fuel), Some(q)) = (rec.fuel_type.as_deref(), rec.quantity) {
            let entry = sums.entry(fuel).or_insert((0.0, 0));
            entry.0 += q;
            entry.1 += 1;
        }
    }

    table
        .records
        .iter()
        .filter(|rec| {
            let (Some(fuel), Some(q)) = (rec.fuel_type.as_deref(), rec.quantity) else {
                return false;
            };
            match sums.get(fuel) {
                Some(&(sum, n)) if n > 0 => q > ratio * (sum / n as f64),
                _ => false,
            }
        })
        .cloned()
        .collect()
}

/// Rows sharing (calendar day, code, quantity) with another row.
pub fn same_day_duplicates(table: &SourceTable) -> Vec<NormalizedRecord> {
    repeated_by(table, |rec| {
        // -0.0 and 0.0 are the same quantity
        let qty = rec.quantity.map(|q| if q == 0.0 { 0u64 } else { q.to_bits() });
        (rec.date_fmt(), rec.code.clone(), qty)
    })
}

/// Codes seen on more than one distinct calendar day. Rows without a usable
/// date do not contribute a day.
pub fn codes_on_multiple_days(table: &SourceTable) -> MultiDayFinding {
    let mut days: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    let mut order: Vec<&str> = Vec::new();

    for rec in &table.records {
        let Some(dt) = rec.date.parsed() else {
            continue;
        };
        let day = dt.format("%d/%m/%Y").to_string();
        let list = days.entry(rec.code.as_str()).or_insert_with(|| {
            order.push(rec.code.as_str());
            Vec::new()
        });
        if !list.contains(&day) {
            list.push(day);
        }
    }

    let flagged: HashSet<&str> = days
        .iter()
        .filter(|(_, d)| d.len() > 1)
        .map(|(code, _)| *code)
        .collect();

    let rows = table
        .records
        .iter()
        .filter(|rec| flagged.contains(rec.code.as_str()))
        .cloned()
        .collect();

    let dates_by_code = order
        .into_iter()
        .filter(|code| flagged.contains(code))
        .map(|code| (code.to_string(), days[code].clone()))
        .collect();

    MultiDayFinding { rows, dates_by_code }
}

/// Comma-joined list for reports.
pub fn join_dates(dates: &[String]) -> String {
    dates.join(", ")
}
