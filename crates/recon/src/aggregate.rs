use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::config::FuelBucket;
use crate::model::{Divergences, NormalizedRecord, SourceFindings, SourceTable};

/// Sector name used for rows without one.
pub const NO_SECTOR: &str = "(sem setor)";

/// Metric stems that get a source letter appended. Fuel bucket names share
/// that namespace, so config validation reserves these.
pub const PER_SOURCE_METRICS: [&str; 9] = [
    "Total Registros",
    "Litros Totais",
    "Duplicadas",
    "Negativos",
    "Outliers",
    "Outliers por tipo",
    "Repetidas",
    "Nota dias diferentes",
    "Só em",
];

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Count(usize),
    Total(f64),
}

impl Metric {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Count(n) => *n as f64,
            Self::Total(v) => *v,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Total(v) => write!(f, "{v:.2}"),
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => serializer.serialize_u64(*n as u64),
            Self::Total(v) => serializer.serialize_f64(*v),
        }
    }
}

/// Flat metric list, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    entries: Vec<(String, Metric)>,
}

impl Summary {
    pub fn push(&mut self, name: impl Into<String>, metric: Metric) {
        self.entries.push((name.into(), metric));
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, m)| *m)
    }

    pub fn count(&self, name: &str) -> Option<usize> {
        match self.get(name)? {
            Metric::Count(n) => Some(n),
            Metric::Total(_) => None,
        }
    }

    pub fn total(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Metric::Total(v) => Some(v),
            Metric::Count(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Metric)> {
        self.entries.iter().map(|(n, m)| (n.as_str(), *m))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, metric) in &self.entries {
            map.serialize_entry(name, metric)?;
        }
        map.end()
    }
}

/// Sum of quantities; absent counts as zero.
pub fn total_quantity(records: &[NormalizedRecord]) -> f64 {
    records.iter().filter_map(|r| r.quantity).sum()
}

/// Sum of quantities for rows whose fuel type falls in `bucket`.
/// Rows without a fuel type never match.
pub fn bucket_total(records: &[NormalizedRecord], bucket: &FuelBucket) -> f64 {
    records
        .iter()
        .filter(|r| r.fuel_type.as_deref().is_some_and(|t| bucket.matches(t)))
        .filter_map(|r| r.quantity)
        .sum()
}

fn push_source(summary: &mut Summary, side: &str, table: &SourceTable, buckets: &[FuelBucket]) {
    summary.push(format!("Total Registros {side}"), Metric::Count(table.len()));
    summary.push(
        format!("Litros Totais {side}"),
        Metric::Total(total_quantity(&table.records)),
    );
    for bucket in buckets {
        summary.push(
            format!("{} {side}", bucket.name),
            Metric::Total(bucket_total(&table.records, bucket)),
        );
    }
}

fn push_findings(summary: &mut Summary, side: &str, findings: &SourceFindings) {
    let counts = [
        ("Duplicadas", findings.duplicates.len()),
        ("Negativos", findings.negatives.len()),
        ("Outliers", findings.outliers.len()),
        ("Outliers por tipo", findings.type_outliers.len()),
        ("Repetidas", findings.same_day.len()),
        ("Nota dias diferentes", findings.multi_day.rows.len()),
    ];
    for (name, n) in counts {
        summary.push(format!("{name} {side}"), Metric::Count(n));
    }
}

pub fn build_summary(
    a: &SourceTable,
    b: &SourceTable,
    findings_a: &SourceFindings,
    findings_b: &SourceFindings,
    divergences: &Divergences,
    buckets: &[FuelBucket],
) -> Summary {
    let mut summary = Summary::default();
    push_source(&mut summary, "A", a, buckets);
    push_source(&mut summary, "B", b, buckets);
    push_findings(&mut summary, "A", findings_a);
    push_findings(&mut summary, "B", findings_b);
    summary.push("Só em A", Metric::Count(divergences.only_in_a.len()));
    summary.push("Só em B", Metric::Count(divergences.only_in_b.len()));
    summary.push("Sem litragem", Metric::Count(divergences.unquantified.len()));
    summary.push("Datas divergentes", Metric::Count(divergences.date_divergent.len()));
    summary.push("Tipos divergentes", Metric::Count(divergences.type_divergent.len()));
    summary.push("Valores divergentes", Metric::Count(divergences.value_divergent.len()));
    summary
}

// ---------------------------------------------------------------------------
// Per-sector consumption
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorConsumption {
    pub sector: String,
    pub records: usize,
    pub total: f64,
    /// One entry per configured bucket, in config order.
    pub buckets: Vec<(String, f64)>,
}

pub fn sector_consumption(table: &SourceTable, buckets: &[FuelBucket]) -> Vec<SectorConsumption> {
    let mut groups: BTreeMap<&str, Vec<NormalizedRecord>> = BTreeMap::new();
    for rec in &table.records {
        let sector = rec.sector.as_deref().unwrap_or(NO_SECTOR);
        groups.entry(sector).or_default().push(rec.clone());
    }

    groups
        .into_iter()
        .map(|(sector, records)| SectorConsumption {
            sector: sector.to_string(),
            records: records.len(),
            total: total_quantity(&records),
            buckets: buckets
                .iter()
                .map(|b| (b.name.clone(), bucket_total(&records, b)))
                .collect(),
        })
        .collect()
}
