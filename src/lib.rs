pub mod cli;
pub mod config;
pub mod data;
pub mod ingest;
pub mod metrics;
pub mod render;
pub mod report;
pub mod rules;

use std::{env, fs, io::Read, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{CheckArgs, Cli, Commands, ReportArgs, ReportFormat},
    config::ReportConfig,
    ingest::{IngestOptions, RawUpload},
    report::{ReportBuilder, RuleReportBuilder},
    rules::RuleSet,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("campaign_report", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Report(args) => handle_report(&args),
        Commands::Check(args) => handle_check(&args),
    }
}

fn handle_report(args: &ReportArgs) -> Result<()> {
    let config = load_config(args.mapping.as_deref())?;
    let rules = match &args.rules {
        Some(path) => {
            RuleSet::load(path).with_context(|| format!("Loading rules from {path:?}"))?
        }
        None => RuleSet::built_in(),
    };
    let options = IngestOptions {
        max_bytes: args.max_size,
        encoding: ingest::resolve_encoding(args.input_encoding.as_deref())?,
    };

    let upload = read_upload(&args.input)?;
    info!(
        "Ingesting '{}' ({} byte(s))",
        upload.filename,
        upload.bytes.len()
    );
    let table = ingest::parse(&upload, &options)?;
    debug!("Columns: {:?}", table.columns());

    let builder = RuleReportBuilder::new(config).with_rules(rules);
    let report = builder.build(&table)?;

    let rendered = match args.format {
        ReportFormat::Json => {
            if args.pretty {
                serde_json::to_string_pretty(&report).context("Serializing report to JSON")?
            } else {
                serde_json::to_string(&report).context("Serializing report to JSON")?
            }
        }
        ReportFormat::Table => render::render_report(&report),
    };
    write_output(args.output.as_deref(), &rendered)?;
    info!(
        "Report with {} metric(s) and {} recommendation(s) for {} data row(s)",
        report.metrics.len(),
        report.recommendations.len(),
        table.row_count()
    );
    Ok(())
}

fn handle_check(args: &CheckArgs) -> Result<()> {
    let config = load_config(args.mapping.as_deref())?;
    let options = IngestOptions {
        max_bytes: args.max_size,
        encoding: ingest::resolve_encoding(args.input_encoding.as_deref())?,
    };

    let upload = read_upload(&args.input)?;
    let table = ingest::parse(&upload, &options)?;
    info!(
        "Parsed {} data row(s) across {} column(s)",
        table.row_count(),
        table.column_count()
    );

    let headers = vec![
        "role".to_string(),
        "column".to_string(),
        "status".to_string(),
    ];
    let mut rows = Vec::new();
    let mut missing = 0usize;
    for (role, column) in config.configured_columns() {
        let status = if table.column_index(column).is_some() {
            "ok"
        } else {
            missing += 1;
            "missing"
        };
        rows.push(vec![role.to_string(), column.to_string(), status.to_string()]);
    }
    render::print_table(&headers, &rows);
    if missing > 0 {
        bail!("{missing} mapped column(s) missing from {:?}", args.input);
    }
    info!("All mapped columns present");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ReportConfig> {
    match path {
        Some(path) => {
            ReportConfig::load(path).with_context(|| format!("Loading mapping from {path:?}"))
        }
        None => Ok(ReportConfig::default()),
    }
}

fn read_upload(path: &Path) -> Result<RawUpload> {
    if is_dash(path) {
        let mut bytes = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading CSV from stdin")?;
        // Stdin has no filename; the synthetic name satisfies the suffix check.
        return Ok(RawUpload::new(bytes, "stdin.csv"));
    }
    let bytes = fs::read(path).with_context(|| format!("Opening input file {path:?}"))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    Ok(RawUpload::new(bytes, filename))
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    let mut text = content.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    match path {
        Some(path) if !is_dash(path) => {
            fs::write(path, &text).with_context(|| format!("Writing report to {path:?}"))?;
            info!("Report written to {path:?}");
        }
        _ => print!("{text}"),
    }
    Ok(())
}

fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}
