use clap::{Args, Parser, Subcommand, ValueEnum};
use rowsource_core::query::Window;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "rowsource",
    about = "Plan, count, and stream report data sources",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Report config file (TOML)
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print each source's projection columns and query fingerprint
    Plan,

    /// Print the estimated row count
    Count(DataArgs),

    /// Stream materialized rows to stdout
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

#[derive(Args, Debug)]
pub struct DataArgs {
    /// JSON fixture: an object mapping entity names to arrays of records
    #[arg(long, short = 'd', value_name = "FILE")]
    pub data: PathBuf,

    /// Rows to skip (single-source reports only)
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Maximum rows to return (single-source reports only)
    #[arg(long)]
    pub limit: Option<u64>,
}

impl DataArgs {
    pub const fn window(&self) -> Window {
        Window::new(self.offset, self.limit)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    Json,
    /// Tab-separated text with a header line
    Text,
}
