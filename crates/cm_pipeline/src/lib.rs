//! cm_pipeline: report assembly (load → validate → resolve years → evaluate → build report → run record).
//! Evaluation is pure; JSON, schema checks and hashing are delegated to `cm_io`, arithmetic to `cm_algo`.

#![forbid(unsafe_code)]

use std::fmt;
use std::path::Path;

use cm_core::ids::ReportId;
use cm_core::{ComparisonReport, Year};
use cm_io::loader::LoadedContext;
use log::info;
use serde::{Deserialize, Serialize};

pub mod build_report;
pub mod build_run_record;
pub mod evaluate;
pub mod load;
pub mod resolve_years;
pub mod validate;

pub use build_run_record::{RunInputs, RunOutputs, RunRecord};
pub use evaluate::metric_key;

/// Engine identifiers recorded in every run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMeta {
    pub vendor: String,
    pub name: String,
    pub version: String,
    pub build: String,
}

/// Identifiers baked at compile time (`CM_ENGINE_VENDOR`, `CM_ENGINE_BUILD`), with package defaults.
pub fn engine_identifiers() -> EngineMeta {
    EngineMeta {
        vendor: option_env!("CM_ENGINE_VENDOR").unwrap_or("cm").to_string(),
        name: "cm_engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: option_env!("CM_ENGINE_BUILD").unwrap_or("dev").to_string(),
    }
}

/// Inputs already loaded and validated by cm_io, plus run parameters.
#[derive(Debug)]
pub struct PipelineCtx {
    pub loaded: LoadedContext,
    pub engine_meta: EngineMeta,
    /// RFC3339 UTC; normalized to whole seconds in the run record.
    pub timestamp_utc: String,
    /// Replaces the batch's global `as_of.max_year` when set.
    pub max_year: Option<Year>,
}

#[derive(Debug)]
pub struct PipelineOutputs {
    pub report: ComparisonReport,
    pub report_id: ReportId,
    pub run_record: RunRecord,
}

/// Errors that abort a whole batch. Metric failures never end up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    Io(String),
    Schema(String),
    Validate(String),
    Build(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Io(m) => write!(f, "io: {m}"),
            PipelineError::Schema(m) => write!(f, "schema: {m}"),
            PipelineError::Validate(m) => write!(f, "validate: {m}"),
            PipelineError::Build(m) => write!(f, "build: {m}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<cm_io::IoError> for PipelineError {
    fn from(e: cm_io::IoError) -> Self {
        use cm_io::IoError;
        match e {
            IoError::Schema { pointer, msg } => PipelineError::Schema(format!("{pointer}: {msg}")),
            IoError::Json { pointer, msg } => PipelineError::Schema(format!("json {pointer}: {msg}")),
            IoError::Read(m) => PipelineError::Io(format!("read: {m}")),
            IoError::Write(m) => PipelineError::Io(format!("write: {m}")),
            IoError::Path(m) => PipelineError::Io(format!("path: {m}")),
            IoError::Limit(m) => PipelineError::Io(format!("limit: {m}")),
            IoError::Manifest(m) => PipelineError::Validate(format!("manifest: {m}")),
            IoError::Csv(m) => PipelineError::Validate(format!("csv: {m}")),
            IoError::Dataset(m) => PipelineError::Validate(format!("dataset: {m}")),
            IoError::Hash(m) => PipelineError::Build(format!("hash: {m}")),
        }
    }
}

/// Run every stage over a loaded context.
pub fn run_with_ctx(ctx: PipelineCtx) -> Result<PipelineOutputs, PipelineError> {
    let PipelineCtx { loaded, engine_meta, timestamp_utc, max_year } = ctx;
    let LoadedContext { manifest_id, catalog, mut batch, digests } = loaded;

    load::apply_max_year(&mut batch, max_year);

    validate::validate(&catalog, &batch).into_result()?;

    let resolution = resolve_years::resolve_latest(&catalog, &batch);
    let entries = evaluate::evaluate_batch(&catalog, &batch.metrics, &resolution);
    let (report, report_id) = build_report::build_report(&batch.title, entries, resolution.diagnostics())?;

    let run_record = build_run_record::build_run_record(build_run_record::RunRecordInputs {
        timestamp_utc: &timestamp_utc,
        engine: &engine_meta,
        manifest_id: manifest_id.as_deref(),
        digests: &digests,
        as_of: &batch.as_of,
        report: &report,
        report_id: &report_id,
    })?;
    info!("run {}", run_record.id);

    Ok(PipelineOutputs { report, report_id, run_record })
}

/// Load from a manifest path, then run the pipeline.
pub fn run_from_manifest_path(
    path: &Path,
    timestamp_utc: &str,
    max_year: Option<Year>,
) -> Result<PipelineOutputs, PipelineError> {
    let loaded = load::load(path)?;
    run_with_ctx(PipelineCtx {
        loaded,
        engine_meta: engine_identifiers(),
        timestamp_utc: timestamp_utc.to_string(),
        max_year,
    })
}

/// Load and validate only; returns the number of metrics in the batch.
pub fn validate_manifest_path(path: &Path) -> Result<usize, PipelineError> {
    let loaded = load::load(path)?;
    validate::validate(&loaded.catalog, &loaded.batch).into_result()?;
    Ok(loaded.batch.metrics.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_stable_buckets() {
        let e: PipelineError = cm_io::IoError::Schema { pointer: "/metrics/0".into(), msg: "bad".into() }.into();
        assert_eq!(e, PipelineError::Schema("/metrics/0: bad".into()));
        let e: PipelineError = cm_io::IoError::Csv("line 3".into()).into();
        assert!(matches!(e, PipelineError::Validate(_)));
        let e: PipelineError = cm_io::IoError::Path("nope".into()).into();
        assert_eq!(e.to_string(), "io: path: nope");
    }

    #[test]
    fn engine_meta_has_defaults() {
        let m = engine_identifiers();
        assert_eq!(m.name, "cm_engine");
        assert!(!m.version.is_empty());
    }
}
