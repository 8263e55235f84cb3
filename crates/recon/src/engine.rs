use std::collections::BTreeSet;

use crate::aggregate::{build_summary, sector_consumption};
use crate::coerce::normalize_table;
use crate::config::{ColumnSynonyms, ReconConfig};
use crate::detect::detect_all;
use crate::error::ReconError;
use crate::model::{ReconInput, ReconMeta, ReconResult, SourceTable};
use crate::normalize::{bind_columns, guess_column, CanonicalField};
use crate::reconcile::{apply_sector_filter, check_unique_keys, outer_join, reconcile, SectorFilter};
use crate::value::RawTable;

/// Run the full audit over two materialized tables.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    let label_a = config.sources.a.label.as_str();
    let label_b = config.sources.b.label.as_str();

    let source_a = prepare(label_a, &input.a, config, &input.sector);
    let source_b = prepare(label_b, &input.b, config, &input.sector);

    if config.strict_keys {
        check_unique_keys(&source_a)?;
        check_unique_keys(&source_b)?;
    }

    let findings_a = detect_all(&source_a, &config.thresholds);
    let findings_b = detect_all(&source_b, &config.thresholds);

    let merged = outer_join(&source_a, &source_b);
    let divergences = reconcile(&merged, &config.thresholds);
    log::debug!(
        "joined {} row(s): {} only in {label_a}, {} only in {label_b}, {} common",
        merged.len(),
        divergences.only_in_a.len(),
        divergences.only_in_b.len(),
        divergences.common,
    );

    let summary = build_summary(
        &source_a,
        &source_b,
        &findings_a,
        &findings_b,
        &divergences,
        &config.fuel_buckets,
    );
    let consumption_a = sector_consumption(&source_a, &config.fuel_buckets);
    let consumption_b = sector_consumption(&source_b, &config.fuel_buckets);

    log::info!(
        "audit '{}' done: {} + {} row(s), divergences: {}",
        config.name,
        source_a.len(),
        source_b.len(),
        divergences.has_any(),
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            label_a: label_a.to_string(),
            label_b: label_b.to_string(),
            sector: input.sector.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        source_a,
        source_b,
        merged,
        findings_a,
        findings_b,
        divergences,
        consumption_a,
        consumption_b,
    })
}

fn prepare(label: &str, raw: &RawTable, config: &ReconConfig, sector: &SectorFilter) -> SourceTable {
    let binding = bind_columns(label, raw, &config.columns);
    if binding.unbound_fields().contains(&CanonicalField::Code) {
        log::warn!("{label}: no code column, every row joins under the empty code");
    }
    let mut table = normalize_table(label, raw, &binding, config);
    apply_sector_filter(&mut table, sector);
    table
}

/// Sorted distinct sector names across both tables.
pub fn list_sectors(a: &RawTable, b: &RawTable, synonyms: &ColumnSynonyms) -> Vec<String> {
    let mut sectors = BTreeSet::new();
    for table in [a, b] {
        let Some(col) = guess_column(&table.columns, CanonicalField::Sector.synonyms(synonyms)) else {
            continue;
        };
        for row in 0..table.len() {
            if let Some(text) = table.cell(row, col).as_text() {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    sectors.insert(trimmed.to_string());
                }
            }
        }
    }
    sectors.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Scalar;

    fn table(columns: &[&str], rows: Vec<Vec<Scalar>>) -> RawTable {
        let mut t = RawTable::new(columns.iter().map(|c| c.to_string()).collect());
        for r in rows {
            t.push_row(r);
        }
        t
    }

    fn text(s: &str) -> Scalar {
        Scalar::Text(s.into())
    }

    fn num(n: f64) -> Scalar {
        Scalar::Number(n)
    }

    fn input(a: RawTable, b: RawTable) -> ReconInput {
        ReconInput { a, b, sector: SectorFilter::All }
    }

    #[test]
    fn type_divergence_end_to_end() {
        let a = table(
            &["Data", "Numero_Nota", "Tipo_Combustivel", "Litragem"],
            vec![vec![text("2024-01-05"), num(7.0), text("GASOLINA"), num(50.0)]],
        );
        let b = table(
            &["data", "nota", "tipo", "litros"],
            vec![vec![text("2024-01-05"), text("7"), text("DIESEL"), num(50.0)]],
        );
        let result = run(&ReconConfig::default(), &input(a, b)).unwrap();
        assert_eq!(result.merged.len(), 1);
        assert_eq!(result.merged[0].code, "0007");
        assert_eq!(result.summary.count("Só em A"), Some(0));
        assert_eq!(result.summary.count("Só em B"), Some(0));
        assert_eq!(result.summary.count("Datas divergentes"), Some(0));
        assert_eq!(result.summary.count("Tipos divergentes"), Some(1));
        assert_eq!(result.summary.count("Valores divergentes"), Some(0));
        assert_eq!(result.summary.total("Gasolina A"), Some(50.0));
        assert_eq!(result.summary.total("Diesel B"), Some(50.0));
        assert_eq!(result.meta.label_a, "POSTO");
    }

    #[test]
    fn strict_mode_fails_on_duplicate_code() {
        let a = table(&["nota", "litragem"], vec![vec![num(1.0), num(1.0)], vec![num(1.0), num(2.0)]]);
        let b = table(&["nota", "litragem"], vec![vec![num(1.0), num(1.0)]]);
        let config = ReconConfig { strict_keys: true, ..Default::default() };
        let err = run(&config, &input(a.clone(), b.clone())).unwrap_err();
        assert!(matches!(err, ReconError::DuplicateKey { ref source, .. } if source == "POSTO"));

        let result = run(&ReconConfig::default(), &input(a, b)).unwrap();
        assert_eq!(result.merged.len(), 2);
        assert_eq!(result.summary.count("Duplicadas A"), Some(2));
    }

    #[test]
    fn sector_filter_applies_per_table() {
        let a = table(
            &["nota", "litragem", "setor"],
            vec![vec![num(1.0), num(10.0), text("SAUDE")], vec![num(2.0), num(5.0), text("OBRAS")]],
        );
        let b = table(&["nota", "litragem"], vec![vec![num(1.0), num(10.0)], vec![num(2.0), num(5.0)]]);
        let mut inp = input(a, b);
        inp.sector = SectorFilter::parse(Some("saude"));
        let result = run(&ReconConfig::default(), &inp).unwrap();
        assert_eq!(result.source_a.len(), 1);
        // B has no sector column: filter ignored
        assert_eq!(result.source_b.len(), 2);
        assert_eq!(result.divergences.only_in_b.len(), 1);
        assert_eq!(result.divergences.only_in_b[0].code, "0002");
    }

    #[test]
    fn tables_without_columns_degrade() {
        let a = table(&["x"], vec![vec![text("a")]]);
        let b = table(&["y"], vec![]);
        let result = run(&ReconConfig::default(), &input(a, b)).unwrap();
        assert_eq!(result.source_a.records[0].code, "");
        assert_eq!(result.summary.count("Sem litragem"), Some(1));
        assert!(result.divergences.only_in_a.is_empty());
        assert_eq!(result.summary.total("Litros Totais A"), Some(0.0));
    }

    #[test]
    fn sectors_are_sorted_and_distinct() {
        let a = table(&["Setor"], vec![vec![text("OBRAS")], vec![text(" SAUDE ")], vec![Scalar::Absent]]);
        let b = table(&["secretaria"], vec![vec![text("EDUCACAO")], vec![text("OBRAS")]]);
        let sectors = list_sectors(&a, &b, &ColumnSynonyms::default());
        assert_eq!(sectors, vec!["EDUCACAO", "OBRAS", "SAUDE"]);
    }

    #[test]
    fn listed_sector_selects_padded_cells() {
        let a = table(&["nota", "litragem", "setor"], vec![vec![num(1.0), num(10.0), text("SAUDE ")]]);
        let b = table(&["nota", "litragem", "setor"], vec![vec![num(1.0), num(10.0), text(" SAUDE")]]);
        let sectors = list_sectors(&a, &b, &ColumnSynonyms::default());
        assert_eq!(sectors, vec!["SAUDE"]);

        let mut inp = input(a, b);
        inp.sector = SectorFilter::parse(Some(&sectors[0]));
        let result = run(&ReconConfig::default(), &inp).unwrap();
        assert_eq!(result.source_a.len(), 1);
        assert_eq!(result.source_b.len(), 1);
        assert_eq!(result.source_a.records[0].sector.as_deref(), Some("SAUDE"));
        assert_eq!(result.divergences.common, 1);
    }

    #[test]
    fn missing_code_does_not_join_code_zero() {
        let a = table(
            &["nota", "litragem", "tipo"],
            vec![vec![Scalar::Absent, num(10.0), text("DIESEL")]],
        );
        let b = table(&["nota", "litragem", "tipo"], vec![vec![text("0000"), num(55.0), text("GASOLINA")]]);
        let result = run(&ReconConfig::default(), &input(a, b)).unwrap();
        assert_eq!(result.merged.len(), 2);
        assert_eq!(result.divergences.common, 0);
        assert_eq!(result.summary.count("Só em A"), Some(1));
        assert_eq!(result.summary.count("Só em B"), Some(1));
        assert_eq!(result.summary.count("Tipos divergentes"), Some(0));
        assert_eq!(result.summary.count("Valores divergentes"), Some(0));
        assert_eq!(result.divergences.only_in_a[0].code, "");
    }
}
