//! Flattening of a [`ReconResult`] into named tables for the export writers.

use serde::Serialize;

use crate::detect::join_dates;
use crate::model::{MergedRow, NormalizedRecord, ReconResult, SourceTable};
use crate::normalize::CanonicalField;
use crate::value::Scalar;

/// Fixed leading columns of `consumo_setor`; bucket names follow, uppercased.
pub const CONSUMPTION_COLUMNS: [&str; 4] = ["FONTE", "SETOR", "REGISTROS", "TOTAL"];

/// One named, rectangular result table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
}

impl ResultTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

fn opt_text(value: Option<&str>) -> Scalar {
    value.map_or(Scalar::Absent, |s| Scalar::Text(s.to_string()))
}

fn opt_number(value: Option<f64>) -> Scalar {
    value.map_or(Scalar::Absent, Scalar::Number)
}

fn canonical_headers() -> Vec<String> {
    CanonicalField::ALL.iter().map(|f| f.header().to_string()).collect()
}

fn canonical_cells(rec: &NormalizedRecord) -> Vec<Scalar> {
    vec![
        Scalar::Text(rec.date_fmt()),
        Scalar::Text(rec.code.clone()),
        opt_text(rec.fuel_type.as_deref()),
        opt_number(rec.quantity),
        opt_text(rec.sector.as_deref()),
    ]
}

/// Canonical columns first, then the source's unbound columns.
fn record_table(name: &str, source: &SourceTable, records: &[NormalizedRecord]) -> ResultTable {
    let mut columns = canonical_headers();
    columns.extend(source.extra_columns());
    let rows = records
        .iter()
        .map(|rec| {
            let mut cells = canonical_cells(rec);
            cells.extend(rec.extra.iter().map(|(_, v)| v.clone()));
            cells
        })
        .collect();
    ResultTable { name: name.to_string(), columns, rows }
}

fn merged_table(name: &str, label_a: &str, label_b: &str, rows: &[MergedRow]) -> ResultTable {
    let mut columns = vec![CanonicalField::Code.header().to_string()];
    for label in [label_a, label_b] {
        for field in [
            CanonicalField::Date,
            CanonicalField::FuelType,
            CanonicalField::Quantity,
            CanonicalField::Sector,
        ] {
            columns.push(format!("{}_{label}", field.header()));
        }
    }

    let side = |rec: Option<&NormalizedRecord>| -> Vec<Scalar> {
        match rec {
            Some(r) => vec![
                Scalar::Text(r.date_fmt()),
                opt_text(r.fuel_type.as_deref()),
                opt_number(r.quantity),
                opt_text(r.sector.as_deref()),
            ],
            None => vec![Scalar::Absent; 4],
        }
    };

    let rows = rows
        .iter()
        .map(|row| {
            let mut cells = vec![Scalar::Text(row.code.clone())];
            cells.extend(side(row.a.as_ref()));
            cells.extend(side(row.b.as_ref()));
            cells
        })
        .collect();
    ResultTable { name: name.to_string(), columns, rows }
}

impl ReconResult {
    /// Every named result table, in export order. Empty tables are included.
    pub fn tables(&self) -> Vec<ResultTable> {
        let (la, lb) = (self.meta.label_a.as_str(), self.meta.label_b.as_str());
        let (a, b) = (&self.source_a, &self.source_b);
        let (fa, fb) = (&self.findings_a, &self.findings_b);
        let d = &self.divergences;

        let mut tables = vec![
            record_table(la, a, &a.records),
            record_table(lb, b, &b.records),
            merged_table("Comparacao", la, lb, &self.merged),
            record_table("duplicadas_a", a, &fa.duplicates),
            record_table("duplicadas_b", b, &fb.duplicates),
            record_table("negativos_a", a, &fa.negatives),
            record_table("negativos_b", b, &fb.negatives),
            record_table("outliers_a", a, &fa.outliers),
            record_table("outliers_b", b, &fb.outliers),
            record_table("outliers_tipo_a", a, &fa.type_outliers),
            record_table("outliers_tipo_b", b, &fb.type_outliers),
            record_table("rep_mesmo_dia_a", a, &fa.same_day),
            record_table("rep_mesmo_dia_b", b, &fb.same_day),
        ];

        for (name, source, findings) in [("nota_diff_a", a, fa), ("nota_diff_b", b, fb)] {
            let mut table = record_table(name, source, &findings.multi_day.rows);
            table.columns.push("DATAS".into());
            for (row, rec) in table.rows.iter_mut().zip(&findings.multi_day.rows) {
                let dates = findings.multi_day.dates_for(&rec.code).unwrap_or(&[]);
                row.push(Scalar::Text(join_dates(dates)));
            }
            tables.push(table);
        }

        tables.push(merged_table("notas_apenas_em_a", la, lb, &d.only_in_a));
        tables.push(merged_table("notas_apenas_em_b", la, lb, &d.only_in_b));
        tables.push(merged_table("datas_divergentes", la, lb, &d.date_divergent));
        tables.push(merged_table("tipos_divergentes", la, lb, &d.type_divergent));
        tables.push(merged_table("valores_divergentes", la, lb, &d.value_divergent));
        tables.push(self.consumption_table());
        tables
    }

    fn consumption_table(&self) -> ResultTable {
        let bucket_names: Vec<String> = self
            .consumption_a
            .iter()
            .chain(&self.consumption_b)
            .next()
            .map(|c| c.buckets.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default();

        let mut columns: Vec<String> = CONSUMPTION_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.extend(bucket_names.iter().map(|n| n.to_uppercase()));

        let mut rows = Vec::new();
        for (label, entries) in [
            (&self.meta.label_a, &self.consumption_a),
            (&self.meta.label_b, &self.consumption_b),
        ] {
            for entry in entries {
                let mut cells = vec![
                    Scalar::Text(label.clone()),
                    Scalar::Text(entry.sector.clone()),
                    Scalar::Number(entry.records as f64),
                    Scalar::Number(entry.total),
                ];
                cells.extend(entry.buckets.iter().map(|(_, v)| Scalar::Number(*v)));
                rows.push(cells);
            }
        }
        ResultTable { name: "consumo_setor".into(), columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ReconConfig;
    use crate::model::ReconInput;
    use crate::reconcile::SectorFilter;
    use crate::value::{RawTable, Scalar};

    fn raw(rows: &[(&str, &str, &str, f64)]) -> RawTable {
        let mut t = RawTable::new(vec!["data".into(), "nota".into(), "tipo".into(), "litragem".into(), "placa".into()]);
        for (date, code, fuel, qty) in rows {
            t.push_row(vec![
                Scalar::Text(date.to_string()),
                Scalar::Text(code.to_string()),
                Scalar::Text(fuel.to_string()),
                Scalar::Number(*qty),
                Scalar::Text("ABC1234".into()),
            ]);
        }
        t
    }

    fn result() -> crate::model::ReconResult {
        let a = raw(&[
            ("2024-01-05", "1", "GASOLINA", 10.0),
            ("2024-01-06", "1", "GASOLINA", 10.0),
            ("2024-01-05", "3", "DIESEL", -5.0),
        ]);
        let b = raw(&[("2024-01-05", "1", "GASOLINA", 10.0), ("2024-01-07", "2", "DIESEL", 7.0)]);
        let input = ReconInput { a, b, sector: SectorFilter::All };
        crate::run(&ReconConfig::default(), &input).unwrap()
    }

    #[test]
    fn table_order_is_fixed() {
        let names: Vec<String> = result().tables().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "POSTO", "PMM", "Comparacao", "duplicadas_a", "duplicadas_b", "negativos_a",
                "negativos_b", "outliers_a", "outliers_b", "outliers_tipo_a", "outliers_tipo_b",
                "rep_mesmo_dia_a", "rep_mesmo_dia_b", "nota_diff_a", "nota_diff_b",
                "notas_apenas_em_a", "notas_apenas_em_b", "datas_divergentes",
                "tipos_divergentes", "valores_divergentes", "consumo_setor",
            ]
        );
    }

    #[test]
    fn source_table_keeps_extra_columns() {
        let tables = result().tables();
        let posto = &tables[0];
        assert_eq!(posto.columns, vec!["DATA", "NOTA", "TIPO", "VALOR", "SETOR", "placa"]);
        assert_eq!(posto.rows[0][0], Scalar::Text("05/01/2024".into()));
        assert_eq!(posto.rows[0][1], Scalar::Text("0001".into()));
        assert_eq!(posto.rows[0][5], Scalar::Text("ABC1234".into()));
    }

    #[test]
    fn comparison_has_side_suffixes() {
        let tables = result().tables();
        let cmp = &tables[2];
        assert_eq!(cmp.columns[0], "NOTA");
        assert!(cmp.column("VALOR_POSTO").is_some());
        assert!(cmp.column("VALOR_PMM").is_some());
        // 0001 x2 on A, x1 on B; 0002 only B; 0003 only A
        assert_eq!(cmp.len(), 4);
    }

    #[test]
    fn multi_day_table_lists_dates() {
        let tables = result().tables();
        let diff = tables.iter().find(|t| t.name == "nota_diff_a").unwrap();
        let col = diff.column("DATAS").unwrap();
        assert_eq!(diff.len(), 2);
        assert_eq!(diff.rows[0][col], Scalar::Text("05/01/2024, 06/01/2024".into()));
    }

    #[test]
    fn consumption_table_covers_both_sources() {
        let tables = result().tables();
        let t = tables.last().unwrap();
        assert_eq!(t.columns, vec!["FONTE", "SETOR", "REGISTROS", "TOTAL", "GASOLINA", "DIESEL"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows[0][0], Scalar::Text("POSTO".into()));
        assert_eq!(t.rows[0][3], Scalar::Number(15.0));
    }
}
