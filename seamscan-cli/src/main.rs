use anyhow::{Context, Result};
use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use seamscan::{
    search_file, CliOverrides, EofSentinel, MatchAlgorithm, SearchConfig, SearchError,
    SearchOutput,
};
use std::ffi::OsString;
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "seamscan [OPTIONS] <PATTERN> <FILE>";

/// Find every occurrence of a byte pattern in a file using cooperating workers
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Exact byte pattern to search for
    pattern: OsString,

    /// File to search
    file: PathBuf,

    /// Number of workers (defaults to CPU cores)
    #[arg(short = 'j', long = "workers")]
    workers: Option<NonZeroUsize>,

    /// Matching algorithm: brute-force or kmp
    #[arg(long)]
    algorithm: Option<MatchAlgorithm>,

    /// Treat the file's final byte as a terminator: none or trailing-byte
    #[arg(long = "eof-sentinel")]
    eof_sentinel: Option<EofSentinel>,

    /// Only print the match count
    #[arg(short, long)]
    stats: bool,

    /// Print the full result as JSON
    #[arg(long, conflicts_with = "stats")]
    json: bool,

    /// Path to a config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level")]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn parse_args() -> Result<Option<Cli>> {
    match Cli::try_parse() {
        Ok(cli) => Ok(Some(cli)),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            Ok(None)
        }
        Err(e) => {
            let rendered = e.to_string();
            let reason = rendered
                .lines()
                .next()
                .map(|line| line.trim_start_matches("error: ").to_string())
                .unwrap_or_else(|| "invalid arguments".to_string());
            Err(SearchError::usage(USAGE)).context(reason)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second init only happens under test harnesses
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<()> {
    let Some(cli) = parse_args()? else {
        return Ok(());
    };

    let config = SearchConfig::load_from(cli.config.as_deref())
        .map_err(|e| SearchError::config_error(e.to_string()))?
        .merge_with_cli(CliOverrides {
            worker_count: cli.workers,
            algorithm: cli.algorithm,
            eof_sentinel: cli.eof_sentinel,
            stats_only: cli.stats,
            log_level: cli.log_level,
        });
    init_logging(&config.log_level);
    debug!("Effective configuration: {:?}", config);

    let output = search_file(&config, &cli.file, cli.pattern.as_encoded_bytes())?;
    print_output(&output, &config, cli.json)
}

fn print_output(output: &SearchOutput, config: &SearchConfig, json: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        writeln!(out, "{}", output.to_json()?)?;
    } else if config.stats_only {
        writeln!(
            out,
            "Found {} matches with {} workers",
            output.total_matches(),
            output.worker_count()
        )?;
    } else {
        output
            .write_offsets(&mut out)
            .context("failed to write match offsets")?;
    }
    Ok(())
}
