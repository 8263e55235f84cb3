//! `fuelaudit run | sectors | validate | init-config`: config-driven two-source audit.

use std::path::{Path, PathBuf};

use clap::Args;

use fuelaudit_recon::model::ReconInput;
use fuelaudit_recon::{list_sectors, RawTable, ReconConfig, ReconError, ReconResult, SectorFilter};

use crate::details::render_details;
use crate::exit_codes::{recon_exit_code, EXIT_DIVERGENCES, EXIT_EXPORT_FAILED, EXIT_USAGE};
use crate::CliError;

/// Source selection shared by `run` and `sectors`.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Audit config (TOML). Defaults apply when omitted
    #[arg(long, short = 'c', env = "FUELAUDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Source A file (overrides the config)
    #[arg(long)]
    pub a: Option<PathBuf>,

    /// Source B file (overrides the config)
    #[arg(long)]
    pub b: Option<PathBuf>,

    /// Sheet to read from source A (spreadsheets only; default: first sheet)
    #[arg(long)]
    pub sheet_a: Option<String>,

    /// Sheet to read from source B (spreadsheets only; default: first sheet)
    #[arg(long)]
    pub sheet_b: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Only audit rows of this sector ("Todos" or empty = all)
    #[arg(long)]
    pub sector: Option<String>,

    /// Fail when a code occurs more than once within a source
    #[arg(long)]
    pub strict: bool,

    /// Output JSON to stdout instead of only the human summary
    #[arg(long)]
    pub json: bool,

    /// Write JSON output to file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write every result table to an XLSX workbook
    #[arg(long)]
    pub xlsx: Option<PathBuf>,

    /// Write the paginated text report
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Print every finding to stderr
    #[arg(long)]
    pub details: bool,
}

fn recon_err(err: ReconError) -> CliError {
    let code = recon_exit_code(&err);
    let hint = match &err {
        ReconError::DuplicateKey { .. } => {
            Some("drop --strict (or strict_keys) to join duplicate codes as a cross product".to_string())
        }
        ReconError::SourceUnavailable { .. } => {
            Some("check the file path, or pass --a / --b to point at the sources".to_string())
        }
        _ => None,
    };
    CliError { code, message: err.to_string(), hint }
}

// ---------------------------------------------------------------------------
// Config + sources
// ---------------------------------------------------------------------------

/// Load the config (or defaults) and the directory its relative paths resolve against.
fn load_config(path: Option<&Path>) -> Result<(ReconConfig, PathBuf), CliError> {
    let Some(path) = path else {
        return Ok((ReconConfig::default(), PathBuf::from(".")));
    };
    let text = std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: format!("cannot read config {}: {e}", path.display()),
        hint: Some("create one with `fuelaudit init-config`".into()),
    })?;
    let config = ReconConfig::from_toml(&text).map_err(recon_err)?;
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((config, base))
}

/// Apply CLI overrides to the config's source section. Override paths stay
/// relative to the working directory; config paths resolve against `base`.
fn resolve_sources(config: &mut ReconConfig, base: &Path, args: &SourceArgs) -> (PathBuf, PathBuf) {
    let a = args.a.clone().unwrap_or_else(|| base.join(&config.sources.a.file));
    let b = args.b.clone().unwrap_or_else(|| base.join(&config.sources.b.file));
    if args.sheet_a.is_some() {
        config.sources.a.sheet = args.sheet_a.clone();
    }
    if args.sheet_b.is_some() {
        config.sources.b.sheet = args.sheet_b.clone();
    }
    (a, b)
}

fn load_pair(config: &ReconConfig, a: &Path, b: &Path) -> Result<(RawTable, RawTable), CliError> {
    let table_a = fuelaudit_io::load_source(a, config.sources.a.sheet.as_deref(), &config.sources.a.label)
        .map_err(recon_err)?;
    let table_b = fuelaudit_io::load_source(b, config.sources.b.sheet.as_deref(), &config.sources.b.label)
        .map_err(recon_err)?;
    eprintln!("loaded {}: {} row(s) from {}", config.sources.a.label, table_a.len(), a.display());
    eprintln!("loaded {}: {} row(s) from {}", config.sources.b.label, table_b.len(), b.display());
    Ok((table_a, table_b))
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let (mut config, base) = load_config(args.sources.config.as_deref())?;
    let (path_a, path_b) = resolve_sources(&mut config, &base, &args.sources);
    if args.strict {
        config.strict_keys = true;
    }

    let (a, b) = load_pair(&config, &path_a, &path_b)?;
    let input = ReconInput {
        a,
        b,
        sector: SectorFilter::parse(args.sector.as_deref()),
    };

    let result = fuelaudit_recon::run(&config, &input).map_err(recon_err)?;

    write_outputs(&result, &args)?;
    print_summary(&result);
    if args.details {
        eprint!("{}", render_details(&result));
    }

    if result.divergences.has_any() {
        return Err(CliError {
            code: EXIT_DIVERGENCES,
            message: "divergences found".into(),
            hint: None,
        });
    }
    Ok(())
}

fn write_outputs(result: &ReconResult, args: &RunArgs) -> Result<(), CliError> {
    if args.json || args.output.is_some() {
        let json_str = serde_json::to_string_pretty(result).map_err(|e| CliError {
            code: EXIT_EXPORT_FAILED,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;

        if let Some(ref path) = args.output {
            std::fs::write(path, &json_str).map_err(|e| CliError {
                code: EXIT_EXPORT_FAILED,
                message: format!("cannot write output: {e}"),
                hint: None,
            })?;
            eprintln!("wrote {}", path.display());
        }

        if args.json {
            println!("{json_str}");
        }
    }

    if let Some(ref path) = args.xlsx {
        let exported = fuelaudit_io::export_xlsx(result, path).map_err(recon_err)?;
        eprintln!("wrote {} ({} sheet(s))", path.display(), exported.sheets.len());
    }

    if let Some(ref path) = args.report {
        fuelaudit_io::export_report(result, path).map_err(recon_err)?;
        eprintln!("wrote {}", path.display());
    }

    Ok(())
}

fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    let d = &result.divergences;
    let meta = &result.meta;
    eprintln!(
        "audit '{}' [setor: {}]: {} {} row(s), {} {} row(s), {} joined",
        meta.config_name,
        meta.sector,
        meta.label_a,
        result.source_a.len(),
        meta.label_b,
        result.source_b.len(),
        result.merged.len(),
    );
    eprintln!(
        "divergences: {} only in {}, {} only in {}, {} date, {} type, {} value ({} common)",
        d.only_in_a.len(),
        meta.label_a,
        d.only_in_b.len(),
        meta.label_b,
        d.date_divergent.len(),
        d.type_divergent.len(),
        d.value_divergent.len(),
        d.common,
    );
    if let (Some(ta), Some(tb)) = (s.total("Litros Totais A"), s.total("Litros Totais B")) {
        eprintln!("liters: {} {ta:.2}, {} {tb:.2}", meta.label_a, meta.label_b);
    }
}

// ---------------------------------------------------------------------------
// sectors / validate / init-config
// ---------------------------------------------------------------------------

pub fn cmd_sectors(args: SourceArgs) -> Result<(), CliError> {
    let (mut config, base) = load_config(args.config.as_deref())?;
    let (path_a, path_b) = resolve_sources(&mut config, &base, &args);
    let (a, b) = load_pair(&config, &path_a, &path_b)?;

    let sectors = list_sectors(&a, &b, &config.columns);
    if sectors.is_empty() {
        eprintln!("no sector column found in either source");
    }
    for sector in sectors {
        println!("{sector}");
    }
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, _) = load_config(Some(&config_path))?;
    eprintln!(
        "valid: audit '{}' ({} vs {}), {} fuel bucket(s), code width {}{}",
        config.name,
        config.sources.a.label,
        config.sources.b.label,
        config.fuel_buckets.len(),
        config.code_width,
        if config.strict_keys { ", strict keys" } else { "" },
    );
    Ok(())
}

pub fn cmd_init_config(output: Option<PathBuf>) -> Result<(), CliError> {
    let text = ReconConfig::default().to_toml().map_err(recon_err)?;
    match output {
        Some(path) => {
            if path.exists() {
                return Err(CliError {
                    code: EXIT_USAGE,
                    message: format!("{} already exists", path.display()),
                    hint: Some("remove it first or choose another --output".into()),
                });
            }
            std::fs::write(&path, text).map_err(|e| CliError {
                code: EXIT_EXPORT_FAILED,
                message: format!("cannot write {}: {e}", path.display()),
                hint: None,
            })?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
