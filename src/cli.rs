use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::ingest::DEFAULT_MAX_UPLOAD_BYTES;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Deterministic performance reports from marketing CSV exports",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a campaign CSV and emit the performance report
    Report(ReportArgs),
    /// Validate a campaign CSV against the configured column mapping
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Input CSV file ('-' reads from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Column mapping file (YAML) naming the columns that feed each metric
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,
    /// Recommendation rules file (YAML) replacing the built-in rule set
    #[arg(long)]
    pub rules: Option<PathBuf>,
    /// Maximum accepted input size in bytes
    #[arg(long = "max-size", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_size: usize,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Output file for the report (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output format for the report
    #[arg(long, default_value = "json")]
    pub format: ReportFormat,
    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Input CSV file ('-' reads from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Column mapping file (YAML) naming the columns that feed each metric
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,
    /// Maximum accepted input size in bytes
    #[arg(long = "max-size", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_size: usize,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    Json,
    Table,
}

impl Default for ReportFormat {
    fn default() -> Self {
        ReportFormat::Json
    }
}
