use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::Thresholds;
use crate::error::ReconError;
use crate::model::{Divergences, MergedRow, SourceTable};

// ---------------------------------------------------------------------------
// Sector filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorFilter {
    #[default]
    All,
    Only(String),
}

impl SectorFilter {
    /// Empty, `Todos` and `all` (any case) mean no filter.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::All,
            Some(v) if v.eq_ignore_ascii_case("todos") || v.eq_ignore_ascii_case("all") => Self::All,
            Some(v) => Self::Only(v.to_string()),
        }
    }

    pub fn accepts(&self, sector: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => sector.is_some_and(|s| s.to_uppercase() == wanted.to_uppercase()),
        }
    }
}

impl std::fmt::Display for SectorFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "Todos"),
            Self::Only(s) => write!(f, "{s}"),
        }
    }
}

/// Keep rows of the requested sector. A table without a sector column is left alone.
pub fn apply_sector_filter(table: &mut SourceTable, filter: &SectorFilter) {
    if *filter == SectorFilter::All {
        return;
    }
    if table.binding.sector.is_none() {
        log::warn!("{}: no sector column, ignoring sector filter '{filter}'", table.label);
        return;
    }
    let before = table.records.len();
    table.records.retain(|rec| filter.accepts(rec.sector.as_deref()));
    log::debug!("{}: sector '{filter}' kept {} of {before} row(s)", table.label, table.records.len());
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Strict mode: fail on the first code that occurs more than once.
pub fn check_unique_keys(table: &SourceTable) -> Result<(), ReconError> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for rec in &table.records {
        *counts.entry(rec.code.as_str()).or_insert(0) += 1;
    }
    match counts.into_iter().find(|(_, n)| *n > 1) {
        Some((code, count)) => Err(ReconError::DuplicateKey {
            source: table.label.clone(),
            code: code.to_string(),
            count,
        }),
        None => Ok(()),
    }
}

/// Full outer join on code. Keys come out in lexicographic order; a key present
/// on both sides yields the A×B cross product in input order.
pub fn outer_join(a: &SourceTable, b: &SourceTable) -> Vec<MergedRow> {
    let mut groups: BTreeMap<&str, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for (i, rec) in a.records.iter().enumerate() {
        groups.entry(rec.code.as_str()).or_default().0.push(i);
    }
    for (i, rec) in b.records.iter().enumerate() {
        groups.entry(rec.code.as_str()).or_default().1.push(i);
    }

    let mut merged = Vec::new();
    for (code, (left, right)) in groups {
        match (left.is_empty(), right.is_empty()) {
            (false, true) => merged.extend(left.iter().map(|&i| MergedRow {
                code: code.to_string(),
                a: Some(a.records[i].clone()),
                b: None,
            })),
            (true, false) => merged.extend(right.iter().map(|&j| MergedRow {
                code: code.to_string(),
                a: None,
                b: Some(b.records[j].clone()),
            })),
            _ => {
                for &i in &left {
                    for &j in &right {
                        merged.push(MergedRow {
                            code: code.to_string(),
                            a: Some(a.records[i].clone()),
                            b: Some(b.records[j].clone()),
                        });
                    }
                }
            }
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// `|a - b| <= atol + rtol * |b|`
pub fn is_close(a: f64, b: f64, rtol: f64, atol: f64) -> bool {
    (a - b).abs() <= atol + rtol * b.abs()
}

/// Absent on either side never matches.
pub fn quantities_match(a: Option<f64>, b: Option<f64>, thresholds: &Thresholds) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => is_close(a, b, thresholds.value_rtol, thresholds.value_atol),
        _ => false,
    }
}

fn types_diverge(row: &MergedRow) -> bool {
    let (a, b) = (row.fuel_type_a(), row.fuel_type_b());
    a != b && (a.is_some() || b.is_some())
}

/// Split the joined rows into presence and date/type/value finding sets.
///
/// Presence is decided per source row: an A row with a quantity is "only in A"
/// when no B row of its code has one, and it is reported once however many
/// partners the cross product gave it (symmetrically for B). Joined rows that
/// pair no two quantities and are not such a finding land in `unquantified`.
pub fn reconcile(merged: &[MergedRow], thresholds: &Thresholds) -> Divergences {
    let quantified_a: BTreeSet<&str> = merged
        .iter()
        .filter(|row| row.quantity_a().is_some())
        .map(|row| row.code.as_str())
        .collect();
    let quantified_b: BTreeSet<&str> = merged
        .iter()
        .filter(|row| row.quantity_b().is_some())
        .map(|row| row.code.as_str())
        .collect();
    let mut reported_a = BTreeSet::new();
    let mut reported_b = BTreeSet::new();

    let mut out = Divergences::default();

    for row in merged {
        match (row.quantity_a(), row.quantity_b()) {
            (Some(_), Some(_)) => {
                out.common += 1;
                if row.date_a() != row.date_b() {
                    out.date_divergent.push(row.clone());
                }
                if types_diverge(row) {
                    out.type_divergent.push(row.clone());
                }
                if !quantities_match(row.quantity_a(), row.quantity_b(), thresholds) {
                    out.value_divergent.push(row.clone());
                }
            }
            (Some(_), None) if !quantified_b.contains(row.code.as_str()) => {
                match &row.a {
                    Some(a) if reported_a.insert(a.row) => out.only_in_a.push(row.clone()),
                    _ => out.unquantified.push(row.clone()),
                }
            }
            (None, Some(_)) if !quantified_a.contains(row.code.as_str()) => {
                match &row.b {
                    Some(b) if reported_b.insert(b.row) => out.only_in_b.push(row.clone()),
                    _ => out.unquantified.push(row.clone()),
                }
            }
            _ => out.unquantified.push(row.clone()),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateValue, NormalizedRecord};
    use crate::normalize::ColumnBinding;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn day(d: u32) -> DateValue {
        DateValue::Parsed(NaiveDate::from_ymd_opt(2024, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
    }

    fn rec(code: &str, qty: Option<f64>, fuel: Option<&str>, date: DateValue) -> NormalizedRecord {
        NormalizedRecord {
            row: 0,
            code: code.into(),
            date,
            fuel_type: fuel.map(str::to_string),
            quantity: qty,
            sector: None,
            extra: vec![],
        }
    }

    fn table(label: &str, mut records: Vec<NormalizedRecord>) -> SourceTable {
        for (i, r) in records.iter_mut().enumerate() {
            r.row = i;
        }
        SourceTable {
            label: label.into(),
            binding: ColumnBinding { sector: Some(4), ..Default::default() },
            records,
        }
    }

    #[test]
    fn sector_filter_parse() {
        assert_eq!(SectorFilter::parse(None), SectorFilter::All);
        assert_eq!(SectorFilter::parse(Some("Todos")), SectorFilter::All);
        assert_eq!(SectorFilter::parse(Some("ALL")), SectorFilter::All);
        assert_eq!(SectorFilter::parse(Some(" Saúde ")), SectorFilter::Only("Saúde".into()));
    }

    #[test]
    fn sector_filter_case_insensitive() {
        let f = SectorFilter::Only("saúde".into());
        assert!(f.accepts(Some("SAÚDE")));
        assert!(!f.accepts(Some("OBRAS")));
        assert!(!f.accepts(None));
        assert!(SectorFilter::All.accepts(None));
    }

    #[test]
    fn sector_filter_without_column_is_noop() {
        let mut t = table("A", vec![rec("0001", Some(1.0), None, DateValue::Absent)]);
        t.binding.sector = None;
        apply_sector_filter(&mut t, &SectorFilter::Only("OBRAS".into()));
        assert_eq!(t.len(), 1);

        let mut t = table("A", vec![rec("0001", Some(1.0), None, DateValue::Absent)]);
        apply_sector_filter(&mut t, &SectorFilter::Only("OBRAS".into()));
        assert!(t.is_empty());
    }

    #[test]
    fn join_orders_keys_and_crosses_duplicates() {
        let a = table(
            "A",
            vec![
                rec("0003", Some(1.0), None, DateValue::Absent),
                rec("0001", Some(2.0), None, DateValue::Absent),
                rec("0001", Some(3.0), None, DateValue::Absent),
            ],
        );
        let b = table(
            "B",
            vec![
                rec("0001", Some(2.0), None, DateValue::Absent),
                rec("0001", Some(9.0), None, DateValue::Absent),
                rec("0002", Some(5.0), None, DateValue::Absent),
            ],
        );
        let merged = outer_join(&a, &b);
        let codes: Vec<_> = merged.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["0001", "0001", "0001", "0001", "0002", "0003"]);
        let pairs: Vec<_> = merged[..4].iter().map(|r| (r.quantity_a(), r.quantity_b())).collect();
        assert_eq!(
            pairs,
            vec![
                (Some(2.0), Some(2.0)),
                (Some(2.0), Some(9.0)),
                (Some(3.0), Some(2.0)),
                (Some(3.0), Some(9.0)),
            ]
        );
        assert!(merged[4].a.is_none());
        assert!(merged[5].b.is_none());
    }

    #[test]
    fn strict_keys_rejects_duplicates() {
        let a = table(
            "POSTO",
            vec![
                rec("0001", Some(1.0), None, DateValue::Absent),
                rec("0001", Some(1.0), None, DateValue::Absent),
            ],
        );
        let err = check_unique_keys(&a).unwrap_err();
        assert!(matches!(err, ReconError::DuplicateKey { ref code, count: 2, .. } if code == "0001"));
        assert!(check_unique_keys(&table("B", vec![rec("0001", None, None, DateValue::Absent)])).is_ok());
    }

    #[test]
    fn closeness() {
        assert!(is_close(50.0, 50.0, 1e-5, 1e-8));
        assert!(is_close(100.0, 100.0005, 1e-5, 1e-8));
        assert!(!is_close(100.0, 100.01, 1e-5, 1e-8));
        let t = Thresholds::default();
        assert!(!quantities_match(None, Some(1.0), &t));
        assert!(!quantities_match(Some(1.0), None, &t));
        assert!(!quantities_match(None, None, &t));
    }

    #[test]
    fn type_divergence_scenario() {
        let a = table("A", vec![rec("0007", Some(50.0), Some("GASOLINA"), day(5))]);
        let b = table("B", vec![rec("0007", Some(50.0), Some("DIESEL"), day(5))]);
        let d = reconcile(&outer_join(&a, &b), &Thresholds::default());
        assert!(d.only_in_a.is_empty() && d.only_in_b.is_empty());
        assert!(d.date_divergent.is_empty());
        assert_eq!(d.type_divergent.len(), 1);
        assert!(d.value_divergent.is_empty());
        assert_eq!(d.common, 1);
    }

    #[test]
    fn blank_types_do_not_diverge() {
        let a = table("A", vec![rec("0001", Some(1.0), None, day(1))]);
        let b = table("B", vec![rec("0001", Some(1.0), None, day(1))]);
        let d = reconcile(&outer_join(&a, &b), &Thresholds::default());
        assert!(d.type_divergent.is_empty());
    }

    #[test]
    fn only_in_a_is_excluded_from_common_checks() {
        let a = table("A", vec![rec("0042", Some(30.0), Some("DIESEL"), day(2))]);
        let b = table("B", vec![rec("0001", Some(10.0), None, day(1))]);
        let d = reconcile(&outer_join(&a, &b), &Thresholds::default());
        assert_eq!(d.only_in_a.len(), 1);
        assert_eq!(d.only_in_a[0].code, "0042");
        assert_eq!(d.only_in_b.len(), 1);
        assert_eq!(d.common, 0);
        assert!(d.date_divergent.is_empty() && d.type_divergent.is_empty() && d.value_divergent.is_empty());
    }

    #[test]
    fn date_asymmetry() {
        let a = table(
            "A",
            vec![
                rec("0001", Some(1.0), None, DateValue::Absent),
                rec("0002", Some(1.0), None, DateValue::Invalid("x".into())),
                rec("0003", Some(1.0), None, day(3)),
            ],
        );
        let b = table(
            "B",
            vec![
                rec("0001", Some(1.0), None, DateValue::Absent),
                rec("0002", Some(1.0), None, DateValue::Invalid("x".into())),
                rec("0003", Some(1.0), None, day(4)),
            ],
        );
        let d = reconcile(&outer_join(&a, &b), &Thresholds::default());
        let codes: Vec<_> = d.date_divergent.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["0002", "0003"]);
    }

    #[test]
    fn missing_quantity_on_a_partner_counts_as_only_in_a() {
        let a = table("A", vec![rec("0001", Some(5.0), None, DateValue::Absent)]);
        let b = table("B", vec![rec("0001", None, None, DateValue::Absent)]);
        let d = reconcile(&outer_join(&a, &b), &Thresholds::default());
        assert_eq!(d.only_in_a.len(), 1);
        assert_eq!(d.common, 0);

        let b = table("B", vec![rec("0002", None, None, DateValue::Absent)]);
        let a = table("A", vec![rec("0002", None, None, DateValue::Absent)]);
        let d = reconcile(&outer_join(&a, &b), &Thresholds::default());
        assert_eq!(d.unquantified.len(), 1);
        assert!(d.only_in_a.is_empty() && d.only_in_b.is_empty());
    }

    #[test]
    fn quantified_partner_elsewhere_in_b_is_not_only_in_a() {
        let a = table("A", vec![rec("0001", Some(5.0), None, day(1))]);
        let b = table(
            "B",
            vec![
                rec("0001", Some(5.0), None, day(1)),
                rec("0001", None, None, day(1)),
            ],
        );
        let merged = outer_join(&a, &b);
        assert_eq!(merged.len(), 2);
        let d = reconcile(&merged, &Thresholds::default());
        assert!(d.only_in_a.is_empty());
        assert_eq!(d.common, 1);
        assert_eq!(d.unquantified.len(), 1);
        assert_eq!(d.unquantified[0].quantity_b(), None);
    }

    #[test]
    fn a_row_with_several_empty_partners_is_reported_once() {
        let a = table("A", vec![rec("0001", Some(5.0), None, day(1))]);
        let b = table(
            "B",
            vec![rec("0001", None, None, day(1)), rec("0001", None, None, day(2))],
        );
        let d = reconcile(&outer_join(&a, &b), &Thresholds::default());
        assert_eq!(d.only_in_a.len(), 1);
        assert_eq!(d.unquantified.len(), 1);
        assert!(d.only_in_b.is_empty());
    }

    proptest! {
        #[test]
        fn only_in_a_matches_unpartnered_a_rows(
            a_rows in proptest::collection::vec((0u8..4, proptest::option::of(1u8..50)), 0..12),
            b_rows in proptest::collection::vec((0u8..4, proptest::option::of(1u8..50)), 0..12),
        ) {
            let build = |label: &str, rows: &[(u8, Option<u8>)]| {
                table(
                    label,
                    rows.iter()
                        .map(|&(c, q)| rec(&format!("{c:04}"), q.map(f64::from), None, DateValue::Absent))
                        .collect(),
                )
            };
            let a = build("A", &a_rows);
            let b = build("B", &b_rows);
            let d = reconcile(&outer_join(&a, &b), &Thresholds::default());

            let has_qty = |t: &SourceTable, code: &str| {
                t.records.iter().any(|r| r.code == code && r.quantity.is_some())
            };
            let expected_a = a.records.iter().filter(|r| r.quantity.is_some() && !has_qty(&b, &r.code)).count();
            let expected_b = b.records.iter().filter(|r| r.quantity.is_some() && !has_qty(&a, &r.code)).count();
            prop_assert_eq!(d.only_in_a.len(), expected_a);
            prop_assert_eq!(d.only_in_b.len(), expected_b);
        }
    }
}
