//! `fuelaudit run --details`: per-finding console listings.

use std::fmt::Write;

use fuelaudit_recon::model::{MergedRow, NormalizedRecord, ReconResult};
use fuelaudit_recon::value::format_number;

fn qty(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_else(|| "-".into())
}

fn sector(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

fn date_of(rec: Option<&NormalizedRecord>) -> String {
    rec.map(|r| r.date_fmt()).unwrap_or_else(|| "-".into())
}

fn heading(out: &mut String, tag: &str, title: &str, count: usize) {
    let _ = writeln!(out, "\n[{tag}] {title} ({count}):");
}

fn list_records(out: &mut String, tag: &str, title: &str, rows: &[NormalizedRecord]) {
    if rows.is_empty() {
        return;
    }
    heading(out, tag, title, rows.len());
    for r in rows {
        let _ = writeln!(
            out,
            "  - Data: {} | Nota: {} | Tipo: {} | Litragem: {} (Setor: {})",
            r.date_fmt(),
            r.code,
            r.fuel_type.as_deref().unwrap_or("-"),
            qty(r.quantity),
            sector(r.sector.as_deref()),
        );
    }
}

fn list_merged<F>(out: &mut String, tag: &str, title: &str, rows: &[MergedRow], line: F)
where
    F: Fn(&MergedRow) -> String,
{
    if rows.is_empty() {
        return;
    }
    heading(out, tag, title, rows.len());
    for row in rows {
        let _ = writeln!(out, "  - {}", line(row));
    }
}

/// Console listing of every non-empty finding set.
pub fn render_details(result: &ReconResult) -> String {
    let (la, lb) = (result.meta.label_a.as_str(), result.meta.label_b.as_str());
    let d = &result.divergences;
    let mut out = String::from("--- ANÁLISE DE DIVERGÊNCIAS ---\n");

    for (label, findings) in [(la, &result.findings_a), (lb, &result.findings_b)] {
        list_records(&mut out, "AVISO", &format!("Notas duplicadas em {label}"), &findings.duplicates);
        list_records(&mut out, "AVISO", &format!("Litragens negativas em {label}"), &findings.negatives);
        list_records(&mut out, "AVISO", &format!("Litragens acima do percentil em {label}"), &findings.outliers);
        list_records(
            &mut out,
            "AVISO",
            &format!("Litragens acima da média do tipo em {label}"),
            &findings.type_outliers,
        );
        list_records(&mut out, "AVISO", &format!("Repetidas no mesmo dia em {label}"), &findings.same_day);

        let multi = &findings.multi_day;
        if !multi.dates_by_code.is_empty() {
            heading(&mut out, "AVISO", &format!("Notas em dias diferentes em {label}"), multi.dates_by_code.len());
            for (code, dates) in &multi.dates_by_code {
                let _ = writeln!(out, "  - Nota: {code} | Datas: {}", dates.join(", "));
            }
        }
    }

    list_merged(&mut out, "AVISO", &format!("Notas apenas em {la}"), &d.only_in_a, |row| {
        format!(
            "Data: {} | Nota: {} | Litragem: {}",
            date_of(row.a.as_ref()),
            row.code,
            qty(row.quantity_a())
        )
    });
    list_merged(&mut out, "AVISO", &format!("Notas apenas em {lb}"), &d.only_in_b, |row| {
        format!(
            "Data: {} | Nota: {} | Litragem: {} (Setor: {})",
            date_of(row.b.as_ref()),
            row.code,
            qty(row.quantity_b()),
            sector(row.sector())
        )
    });
    list_merged(&mut out, "ERRO", "Datas divergentes", &d.date_divergent, |row| {
        format!(
            "Nota: {} (Setor: {}) | {la}: {} vs {lb}: {}",
            row.code,
            sector(row.sector()),
            date_of(row.a.as_ref()),
            date_of(row.b.as_ref())
        )
    });
    list_merged(&mut out, "ERRO", "Tipos de combustível divergentes", &d.type_divergent, |row| {
        format!(
            "Data: {} | Nota: {} (Setor: {}) | {la}: {} vs {lb}: {}",
            date_of(row.a.as_ref()),
            row.code,
            sector(row.sector()),
            row.fuel_type_a().unwrap_or("-"),
            row.fuel_type_b().unwrap_or("-")
        )
    });
    list_merged(&mut out, "ERRO", "Litragens divergentes", &d.value_divergent, |row| {
        format!(
            "Data: {} | Nota: {} (Setor: {}) | {la}: {}L vs {lb}: {}L",
            date_of(row.a.as_ref()),
            row.code,
            sector(row.sector()),
            qty(row.quantity_a()),
            qty(row.quantity_b())
        )
    });

    out.push_str("\n--- ANÁLISE CONCLUÍDA ---\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuelaudit_recon::{run, RawTable, ReconConfig, Scalar, SectorFilter};
    use fuelaudit_recon::model::ReconInput;

    fn table(rows: &[(&str, f64, &str)]) -> RawTable {
        let mut t = RawTable::new(vec!["data".into(), "nota".into(), "litragem".into(), "tipo".into()]);
        for (code, q, fuel) in rows {
            t.push_row(vec![
                Scalar::Text("2024-01-05".into()),
                Scalar::Text(code.to_string()),
                Scalar::Number(*q),
                Scalar::Text(fuel.to_string()),
            ]);
        }
        t
    }

    #[test]
    fn lists_only_non_empty_sets() {
        let input = ReconInput {
            a: table(&[("7", 50.0, "GASOLINA"), ("42", 30.0, "DIESEL")]),
            b: table(&[("7", 50.0, "DIESEL")]),
            sector: SectorFilter::All,
        };
        let result = run(&ReconConfig::default(), &input).unwrap();
        let text = render_details(&result);

        assert!(text.contains("[AVISO] Notas apenas em POSTO (1):"));
        assert!(text.contains("  - Data: 05/01/2024 | Nota: 0042 | Litragem: 30"));
        assert!(text.contains("[ERRO] Tipos de combustível divergentes (1):"));
        assert!(text.contains("POSTO: GASOLINA vs PMM: DIESEL"));
        assert!(!text.contains("Datas divergentes"));
        assert!(!text.contains("Notas apenas em PMM"));
        assert!(text.ends_with("--- ANÁLISE CONCLUÍDA ---\n"));
    }
}
