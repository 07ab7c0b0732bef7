// crates/cm_cli/src/args.rs
//
// Offline CLI argument surface.
// - Inputs come from one local manifest (no scheme://, must exist)
// - Output: --out dir, --render [json|text|charts|html]*
// - --max-year replaces the batch's global cut-off (per-dataset cut-offs still win)
// - --validate-only loads and validates without evaluating

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Render {
    /// Formatted report view (`report_view.json`)
    Json,
    /// Plain-text summary (`summary.txt`)
    Text,
    /// Chart panel data (`charts.json`)
    Charts,
    /// Single-file HTML (`report.html`)
    Html,
}

/// Parsed CLI arguments (raw).
#[derive(Debug, Parser, Clone)]
#[command(
    name = "cm",
    version,
    disable_help_subcommand = true,
    about = "Offline comparative metrics over yearly tables"
)]
pub struct Args {
    /// Manifest JSON describing datasets, joins and the batch.
    #[arg(long)]
    pub manifest: PathBuf,

    /// Output directory (created when missing).
    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    /// Extra renders next to report.json and run_record.json; repeatable.
    #[arg(long, value_enum, num_args = 1..)]
    pub render: Vec<Render>,

    /// Global cut-off year for `latest`.
    #[arg(long, value_parser = parse_year)]
    pub max_year: Option<i32>,

    /// Run timestamp (RFC3339 UTC); defaults to now.
    #[arg(long)]
    pub timestamp: Option<String>,

    /// Load and validate inputs only; write nothing.
    #[arg(long)]
    pub validate_only: bool,

    /// Only warnings and errors on stderr.
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Debug logging (per-metric failures, resolved years).
    #[arg(long)]
    pub verbose: bool,
}

/// Errors surfaced by argument validation. Messages stay short and stable.
#[derive(Debug)]
pub enum CliError {
    NonLocalPath(String),
    NotFound(String),
    BadTimestamp(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NonLocalPath(p) => write!(f, "path must be local file (no scheme): {p}"),
            CliError::NotFound(p) => write!(f, "file not found: {p}"),
            CliError::BadTimestamp(t) => write!(f, "timestamp must be RFC3339 UTC: {t}"),
        }
    }
}
impl std::error::Error for CliError {}

/// Four-digit calendar year.
pub fn parse_year(s: &str) -> Result<i32, String> {
    let s = s.trim();
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("year must be four digits: {s}"));
    }
    s.parse::<i32>().map_err(|_| format!("invalid year: {s}"))
}

/// Entry point used by main.rs
pub fn parse_and_validate() -> Result<Args, CliError> {
    validate(Args::parse())
}

fn validate(mut args: Args) -> Result<Args, CliError> {
    ensure_local_path(&args.out)?;
    ensure_local_exists(&args.manifest, "--manifest")?;
    if let Some(ts) = &args.timestamp {
        args.timestamp = Some(
            cm_io::hasher::normalize_rfc3339_utc_seconds(ts).map_err(|_| CliError::BadTimestamp(ts.clone()))?,
        );
    }
    args.manifest = normalize_path(&args.manifest);
    args.out = normalize_path(&args.out);
    args.render.sort_unstable();
    args.render.dedup();
    Ok(args)
}

#[inline]
fn has_scheme(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    lower.contains("://") || lower.starts_with("http:") || lower.starts_with("https:") || lower.starts_with("file:")
}

#[inline]
fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    if let Some(s) = p.to_str() {
        if has_scheme(s) {
            return Err(CliError::NonLocalPath(s.to_string()));
        }
    }
    Ok(())
}

fn ensure_local_exists(p: &Path, label: &'static str) -> Result<(), CliError> {
    ensure_local_path(p)?;
    let meta = fs::metadata(p).map_err(|_| CliError::NotFound(format!("{label} {}", p.display())))?;
    if !meta.is_file() {
        return Err(CliError::NotFound(format!("{label} {}", p.display())));
    }
    Ok(())
}

/// Best-effort absolute path; falls back to CWD-relative when the path does not exist yet.
fn normalize_path(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(p)
        }
    })
}
