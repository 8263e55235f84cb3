use chrono::NaiveDateTime;
use serde::Serialize;

use crate::aggregate::{SectorConsumption, Summary};
use crate::normalize::ColumnBinding;
use crate::reconcile::SectorFilter;
use crate::value::{RawTable, Scalar};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// The two materialized source tables plus the optional sector filter.
#[derive(Debug, Clone)]
pub struct ReconInput {
    pub a: RawTable,
    pub b: RawTable,
    pub sector: SectorFilter,
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

/// Parsed state of a date cell.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum DateValue {
    Absent,
    /// The cell had content that no supported format accepts.
    Invalid(String),
    Parsed(NaiveDateTime),
}

impl DateValue {
    pub fn parsed(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Parsed(dt) => Some(*dt),
            _ => None,
        }
    }
}

/// Absent equals absent; invalid equals nothing, not even another invalid.
impl PartialEq for DateValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Absent, Self::Absent) => true,
            (Self::Parsed(a), Self::Parsed(b)) => a == b,
            _ => false,
        }
    }
}

/// One source row mapped onto the five canonical fields.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedRecord {
    /// Zero-based position in the raw table.
    pub row: usize,
    pub code: String,
    pub date: DateValue,
    pub fuel_type: Option<String>,
    pub quantity: Option<f64>,
    pub sector: Option<String>,
    /// Source columns not bound to any canonical field, in header order.
    pub extra: Vec<(String, Scalar)>,
}

impl NormalizedRecord {
    /// `dd/mm/yyyy`, or the invalid-date token.
    pub fn date_fmt(&self) -> String {
        crate::coerce::format_date(&self.date)
    }
}

/// One normalized source, in input row order.
#[derive(Debug, Clone, Serialize)]
pub struct SourceTable {
    pub label: String,
    pub binding: ColumnBinding,
    pub records: Vec<NormalizedRecord>,
}

impl SourceTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn extra_columns(&self) -> Vec<String> {
        self.records
            .first()
            .map(|r| r.extra.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Outer-join pairing sharing one code. At least one side is present.
#[derive(Debug, Clone, Serialize)]
pub struct MergedRow {
    pub code: String,
    pub a: Option<NormalizedRecord>,
    pub b: Option<NormalizedRecord>,
}

impl MergedRow {
    pub fn quantity_a(&self) -> Option<f64> {
        self.a.as_ref().and_then(|r| r.quantity)
    }

    pub fn quantity_b(&self) -> Option<f64> {
        self.b.as_ref().and_then(|r| r.quantity)
    }

    pub fn date_a(&self) -> DateValue {
        self.a.as_ref().map(|r| r.date.clone()).unwrap_or(DateValue::Absent)
    }

    pub fn date_b(&self) -> DateValue {
        self.b.as_ref().map(|r| r.date.clone()).unwrap_or(DateValue::Absent)
    }

    pub fn fuel_type_a(&self) -> Option<&str> {
        self.a.as_ref().and_then(|r| r.fuel_type.as_deref())
    }

    pub fn fuel_type_b(&self) -> Option<&str> {
        self.b.as_ref().and_then(|r| r.fuel_type.as_deref())
    }

    /// Sector of whichever side carries one, A first.
    pub fn sector(&self) -> Option<&str> {
        self.a
            .as_ref()
            .and_then(|r| r.sector.as_deref())
            .or_else(|| self.b.as_ref().and_then(|r| r.sector.as_deref()))
    }
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Codes seen on more than one calendar day, with the distinct dates per code.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MultiDayFinding {
    pub rows: Vec<NormalizedRecord>,
    pub dates_by_code: Vec<(String, Vec<String>)>,
}

impl MultiDayFinding {
    pub fn dates_for(&self, code: &str) -> Option<&[String]> {
        self.dates_by_code
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, d)| d.as_slice())
    }
}

/// Intra-source anomaly finding sets for one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceFindings {
    pub duplicates: Vec<NormalizedRecord>,
    pub negatives: Vec<NormalizedRecord>,
    pub outliers: Vec<NormalizedRecord>,
    pub type_outliers: Vec<NormalizedRecord>,
    pub same_day: Vec<NormalizedRecord>,
    pub multi_day: MultiDayFinding,
}

/// Cross-source finding sets over the outer join.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Divergences {
    /// One entry per A row with a quantity whose code has no quantified B row.
    pub only_in_a: Vec<MergedRow>,
    pub only_in_b: Vec<MergedRow>,
    /// Joined rows pairing no two quantities that are not a presence finding.
    pub unquantified: Vec<MergedRow>,
    /// Size of the both-quantities-present subset.
    pub common: usize,
    pub date_divergent: Vec<MergedRow>,
    pub type_divergent: Vec<MergedRow>,
    pub value_divergent: Vec<MergedRow>,
}

impl Divergences {
    /// Any presence, date, type or value disagreement.
    pub fn has_any(&self) -> bool {
        !(self.only_in_a.is_empty()
            && self.only_in_b.is_empty()
            && self.date_divergent.is_empty()
            && self.type_divergent.is_empty()
            && self.value_divergent.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: Summary,
    pub source_a: SourceTable,
    pub source_b: SourceTable,
    pub merged: Vec<MergedRow>,
    pub findings_a: SourceFindings,
    pub findings_b: SourceFindings,
    pub divergences: Divergences,
    pub consumption_a: Vec<SectorConsumption>,
    pub consumption_b: Vec<SectorConsumption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub label_a: String,
    pub label_b: String,
    pub sector: SectorFilter,
    pub engine_version: String,
    pub run_at: String,
}
