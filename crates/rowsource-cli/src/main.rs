mod cli;
mod commands;
mod output;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use rowsource_core::materialize::RenderRegistry;
use std::{io, path::PathBuf, process::ExitCode};
use tracing_subscriber::EnvFilter;

// RUST_LOG wins; otherwise warn, or debug with --verbose.
fn init_tracing(cli: &Cli) {
    let fallback = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.unwrap_or_else(|| PathBuf::from("rowsource.toml"));
    let registry = RenderRegistry::with_builtins();
    let report = rowsource_config::load(&config, &registry)
        .with_context(|| format!("loading report '{}'", config.display()))?;

    let stdout = io::stdout();
    match cli.command {
        Commands::Plan => commands::plan(&report, &mut stdout.lock()),
        Commands::Count(data) => {
            let mut session = commands::load_session(&data.data)?;
            commands::count(&report, &mut session, data.window(), &mut stdout.lock())
        }
        Commands::Run { data, format } => {
            let mut session = commands::load_session(&data.data)?;
            commands::run(&report, &mut session, data.window(), format, stdout.lock())?;
            Ok(())
        }
    }
}
