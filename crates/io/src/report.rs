// Paginated plain-text audit report

use std::path::Path;

use chrono::DateTime;

use fuelaudit_recon::{ReconResult, ResultTable, Scalar};

pub const LINES_PER_PAGE: usize = 50;

const PAGE_BREAK: char = '\u{000C}';

const RULE_WIDTH: usize = 72;

/// Human title of a finding table, or `None` for tables the report skips.
fn section_title(name: &str, label_a: &str, label_b: &str) -> Option<String> {
    let (kind, side) = match name.rsplit_once('_') {
        Some((kind, "a")) => (kind, Some(label_a)),
        Some((kind, "b")) => (kind, Some(label_b)),
        _ => (name, None),
    };
    let title = match kind {
        "duplicadas" => "Notas duplicadas",
        "negativos" => "Litragens negativas",
        "outliers" => "Litragens acima do percentil",
        "outliers_tipo" => "Litragens acima da média do tipo",
        "rep_mesmo_dia" => "Lançamentos repetidos no mesmo dia",
        "nota_diff" => "Notas em dias diferentes",
        "notas_apenas_em" => "Notas apenas em",
        "datas_divergentes" => "Datas divergentes",
        "tipos_divergentes" => "Tipos divergentes",
        "valores_divergentes" => "Valores divergentes",
        _ => return None,
    };
    Some(match side {
        Some(label) if kind == "notas_apenas_em" => format!("{title} {label}"),
        Some(label) => format!("{title} - {label}"),
        None => title.to_string(),
    })
}

fn generated_at(run_at: &str) -> String {
    DateTime::parse_from_rfc3339(run_at)
        .map(|dt| dt.format("%d/%m/%Y %H:%M:%S").to_string())
        .unwrap_or_else(|_| run_at.to_string())
}

fn cell_text(value: &Scalar) -> String {
    match value {
        Scalar::Absent => "-".to_string(),
        other => other.to_string(),
    }
}

fn push_table(lines: &mut Vec<String>, title: &str, table: &ResultTable) {
    lines.push(String::new());
    lines.push(format!("{title} ({})", table.len()));
    lines.push("-".repeat(RULE_WIDTH));
    lines.push(table.columns.join(" | "));
    for row in &table.rows {
        lines.push(row.iter().map(cell_text).collect::<Vec<_>>().join(" | "));
    }
}

/// Render the report as text. Pages of [`LINES_PER_PAGE`] lines are separated by a form feed.
pub fn render_report(result: &ReconResult) -> String {
    let meta = &result.meta;
    let mut lines = vec![
        "RELATÓRIO DE AUDITORIA DE ABASTECIMENTOS".to_string(),
        "=".repeat(RULE_WIDTH),
        format!("Gerado em: {}", generated_at(&meta.run_at)),
        format!("Auditoria: {}", meta.config_name),
        format!("Fontes: {} (A) x {} (B)", meta.label_a, meta.label_b),
        format!("Setor: {}", meta.sector),
        format!("Versão do motor: {}", meta.engine_version),
        String::new(),
        "RESUMO".to_string(),
        "-".repeat(RULE_WIDTH),
    ];

    let width = result.summary.iter().map(|(n, _)| n.chars().count()).max().unwrap_or(0);
    for (name, metric) in result.summary.iter() {
        let pad = width - name.chars().count();
        lines.push(format!("{name}{} : {metric}", " ".repeat(pad)));
    }

    for table in result.tables() {
        if table.is_empty() {
            continue;
        }
        if let Some(title) = section_title(&table.name, &meta.label_a, &meta.label_b) {
            push_table(&mut lines, &title, &table);
        }
    }

    paginate(&lines)
}

fn paginate(lines: &[String]) -> String {
    lines
        .chunks(LINES_PER_PAGE)
        .map(|page| {
            let mut text = page.join("\n");
            text.push('\n');
            text
        })
        .collect::<Vec<_>>()
        .join(&PAGE_BREAK.to_string())
}

pub fn write_report(result: &ReconResult, path: &Path) -> Result<(), String> {
    std::fs::write(path, render_report(result))
        .map_err(|e| format!("Failed to write report {}: {}", path.display(), e))?;
    log::info!("wrote report to {}", path.display());
    Ok(())
}
