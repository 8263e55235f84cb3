// Source loading and result export

use std::path::Path;

use fuelaudit_recon::{RawTable, ReconError, ReconResult};

pub mod csv;
pub mod report;
pub mod xlsx;

pub use report::{render_report, write_report};

/// Load one source table, dispatching on the file extension.
///
/// Every failure is reported as [`ReconError::SourceUnavailable`] naming `role`.
pub fn load_source(path: &Path, sheet: Option<&str>, role: &str) -> Result<RawTable, ReconError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let loaded = match ext.as_str() {
        "csv" | "txt" => self::csv::import(path),
        "tsv" => self::csv::import_tsv(path),
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => xlsx::import(path, sheet),
        "" => Err("file has no extension".to_string()),
        other => Err(format!("unsupported file type '.{other}'")),
    };

    let table = loaded.map_err(|message| {
        ReconError::source_unavailable(role, format!("{}: {}", path.display(), message))
    })?;
    log::debug!(
        "{role}: loaded {} row(s), {} column(s) from {}",
        table.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

pub fn export_xlsx(result: &ReconResult, path: &Path) -> Result<xlsx::ExportResult, ReconError> {
    xlsx::export(result, path).map_err(ReconError::Export)
}

pub fn export_report(result: &ReconResult, path: &Path) -> Result<(), ReconError> {
    write_report(result, path).map_err(ReconError::Export)
}
