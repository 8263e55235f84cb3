// fuelaudit CLI - two-source fuel purchase audit

mod audit;
mod details;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "fuelaudit")]
#[command(about = "Reconcile fuel purchases recorded by a station and by the fleet owner")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the audit over both sources
    #[command(after_help = "\
Examples:
  fuelaudit run --config audit.toml
  fuelaudit run --a POSTO.xlsx --b PMM.xlsx --sector SAUDE
  fuelaudit run -c audit.toml --json > result.json
  fuelaudit run -c audit.toml --xlsx auditoria.xlsx --report relatorio.txt --details

Exit codes: 0 no divergences, 3 divergences found, 4 invalid config,
5 source unavailable, 6 export failed.")]
    Run(audit::RunArgs),

    /// List the distinct sectors found in both sources
    #[command(after_help = "\
Examples:
  fuelaudit sectors --config audit.toml
  fuelaudit sectors --a POSTO.xlsx --b PMM.xlsx")]
    Sectors(audit::SourceArgs),

    /// Validate an audit config without running
    #[command(after_help = "\
Examples:
  fuelaudit validate audit.toml")]
    Validate {
        /// Path to the audit TOML config
        config: PathBuf,
    },

    /// Write the default audit config as TOML
    #[command(after_help = "\
Examples:
  fuelaudit init-config > audit.toml
  fuelaudit init-config --output audit.toml")]
    InitConfig {
        /// Write to this file instead of stdout (refuses to overwrite)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  fuelaudit-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the default `warn` filter.
fn init_logging() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        None => {
            eprintln!("Usage: fuelaudit <command> [options]");
            eprintln!("       fuelaudit --help for more information");
            Err(CliError::args(""))
        }
        Some(Commands::Run(args)) => audit::cmd_run(args),
        Some(Commands::Sectors(args)) => audit::cmd_sectors(args),
        Some(Commands::Validate { config }) => audit::cmd_validate(config),
        Some(Commands::InitConfig { output }) => audit::cmd_init_config(output),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }
}
