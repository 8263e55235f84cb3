// Excel source loading and result workbook export

use std::collections::HashSet;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use fuelaudit_recon::coerce::serial_to_datetime;
use fuelaudit_recon::{Metric, ReconResult, ResultTable, Scalar, RawTable};

/// Excel's hard limit on sheet name length.
pub const MAX_SHEET_NAME: usize = 31;

/// Name of the summary sheet.
pub const SUMMARY_SHEET: &str = "Resumo";

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Import one sheet of an Excel file (xlsx, xlsm, xls, xlsb, ods).
///
/// `sheet = None` reads the first sheet. The first row is the header.
pub fn import(path: &Path, sheet: Option<&str>) -> Result<RawTable, String> {
    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let sheet_name = match sheet {
        Some(name) => sheet_names
            .iter()
            .find(|s| s.as_str() == name)
            .cloned()
            .ok_or_else(|| format!("sheet '{}' not found (available: {})", name, sheet_names.join(", ")))?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| "Excel file contains no sheets".to_string())?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Err(format!("sheet '{}' is empty", sheet_name));
    };
    let columns = header
        .iter()
        .enumerate()
        .map(|(i, cell)| crate::csv::header_name(&header_text(cell), i))
        .collect();

    let mut table = RawTable::new(columns);
    for row in rows {
        let cells: Vec<Scalar> = row.iter().map(cell_to_scalar).collect();
        if cells.iter().all(Scalar::is_absent) {
            continue;
        }
        table.push_row(cells);
    }

    log::debug!("{}: sheet '{}' has {} data row(s)", path.display(), sheet_name, table.len());
    Ok(table)
}

fn header_text(cell: &Data) -> String {
    match cell_to_scalar(cell) {
        Scalar::Absent => String::new(),
        other => other.to_string(),
    }
}

fn cell_to_scalar(cell: &Data) -> Scalar {
    match cell {
        Data::Empty => Scalar::Absent,
        Data::String(s) if s.trim().is_empty() => Scalar::Absent,
        Data::String(s) => Scalar::Text(s.clone()),
        Data::Float(n) => Scalar::Number(*n),
        Data::Int(n) => Scalar::Number(*n as f64),
        Data::Bool(b) => Scalar::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => Scalar::Text(format!("#{:?}", e)),
        // 1900 date system assumed, as for serial numbers in text sources
        Data::DateTime(dt) => serial_to_datetime(dt.as_f64())
            .map(Scalar::Date)
            .unwrap_or(Scalar::Number(dt.as_f64())),
        Data::DateTimeIso(s) => Scalar::Text(s.clone()),
        Data::DurationIso(s) => Scalar::Text(s.clone()),
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ExportResult {
    /// Sheet names as written, in workbook order.
    pub sheets: Vec<String>,
    pub cells_exported: usize,
}

/// Excel-safe sheet name: forbidden characters replaced, cut to 31 chars.
pub fn sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim_matches('\'');
    let name: String = trimmed.chars().take(MAX_SHEET_NAME).collect();
    if name.is_empty() {
        "Sheet".to_string()
    } else {
        name
    }
}

/// Make `name` unique among `taken` (case-insensitive, as Excel compares),
/// appending `~N` inside the length limit.
fn unique_sheet_name(name: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = name.clone();
    let mut n = 2;
    while taken.contains(&candidate.to_lowercase()) {
        let suffix = format!("~{n}");
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        candidate = format!("{}{}", name.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }
    taken.insert(candidate.to_lowercase());
    candidate
}

/// Write the summary plus every result table to an XLSX workbook.
///
/// The two source sheets and `Comparacao` are always written; other tables only
/// when they have rows.
pub fn export(result: &ReconResult, path: &Path) -> Result<ExportResult, String> {
    let mut out = ExportResult::default();
    let mut taken = HashSet::new();
    let mut workbook = Workbook::new();

    let header_format = Format::new().set_bold();
    let total_format = Format::new().set_num_format("0.00");

    let name = unique_sheet_name(sheet_name(SUMMARY_SHEET), &mut taken);
    let worksheet = workbook
        .add_worksheet()
        .set_name(&name)
        .map_err(|e| format!("Failed to create sheet '{}': {}", name, e))?;
    write_summary(worksheet, result, &header_format, &total_format)
        .map_err(|e| format!("Failed to write summary: {}", e))?;
    out.cells_exported += (result.summary.len() + 1) * 2;
    out.sheets.push(name);

    for (idx, table) in result.tables().iter().enumerate() {
        if idx >= 3 && table.is_empty() {
            continue;
        }
        let name = unique_sheet_name(sheet_name(&table.name), &mut taken);
        let worksheet = workbook
            .add_worksheet()
            .set_name(&name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", name, e))?;
        out.cells_exported += write_table(worksheet, table, &header_format)
            .map_err(|e| format!("Failed to write sheet '{}': {}", name, e))?;
        out.sheets.push(name);
    }

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))?;

    log::info!("wrote {} sheet(s) to {}", out.sheets.len(), path.display());
    Ok(out)
}

fn write_summary(
    worksheet: &mut Worksheet,
    result: &ReconResult,
    header_format: &Format,
    total_format: &Format,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    worksheet.write_string_with_format(0, 0, "Métrica", header_format)?;
    worksheet.write_string_with_format(0, 1, "Valor", header_format)?;
    for (i, (name, metric)) in result.summary.iter().enumerate() {
        let row = (i + 1) as u32;
        worksheet.write_string(row, 0, name)?;
        match metric {
            Metric::Count(n) => worksheet.write_number(row, 1, n as f64)?,
            Metric::Total(v) => worksheet.write_number_with_format(row, 1, v, total_format)?,
        };
    }
    worksheet.set_column_width(0, 28)?;
    Ok(())
}

/// Header row plus data rows. Absent cells are left blank. Returns cells written.
fn write_table(
    worksheet: &mut Worksheet,
    table: &ResultTable,
    header_format: &Format,
) -> Result<usize, rust_xlsxwriter::XlsxError> {
    let mut cells = 0;
    for (col, name) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, header_format)?;
        cells += 1;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let row32 = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            let col16 = c as u16;
            match value {
                Scalar::Absent => continue,
                Scalar::Number(n) => worksheet.write_number(row32, col16, *n)?,
                other => worksheet.write_string(row32, col16, other.to_string())?,
            };
            cells += 1;
        }
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_name_truncates_and_cleans() {
        assert_eq!(sheet_name("Comparacao"), "Comparacao");
        assert_eq!(sheet_name("a/b:c"), "a_b_c");
        let long = "x".repeat(40);
        assert_eq!(sheet_name(&long).chars().count(), MAX_SHEET_NAME);
        assert_eq!(sheet_name(""), "Sheet");
    }

    #[test]
    fn test_unique_sheet_name_after_truncation() {
        let mut taken = HashSet::new();
        let base = "Posto de Abastecimento Central Norte";
        let first = unique_sheet_name(sheet_name(base), &mut taken);
        let second = unique_sheet_name(sheet_name(&format!("{base} 2")), &mut taken);
        assert_eq!(first.chars().count(), 31);
        assert_ne!(first, second);
        assert!(second.ends_with("~2"));
        assert_eq!(second.chars().count(), 31);
    }

    #[test]
    fn test_unique_is_case_insensitive() {
        let mut taken = HashSet::new();
        assert_eq!(unique_sheet_name("Resumo".into(), &mut taken), "Resumo");
        assert_eq!(unique_sheet_name("RESUMO".into(), &mut taken), "RESUMO~2");
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_to_scalar(&Data::Empty), Scalar::Absent);
        assert_eq!(cell_to_scalar(&Data::String("  ".into())), Scalar::Absent);
        assert_eq!(cell_to_scalar(&Data::Int(7)), Scalar::Number(7.0));
        assert_eq!(cell_to_scalar(&Data::Float(50.5)), Scalar::Number(50.5));
        assert_eq!(cell_to_scalar(&Data::String("DIESEL".into())), Scalar::Text("DIESEL".into()));
    }
}
