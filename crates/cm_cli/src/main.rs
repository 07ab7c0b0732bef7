// crates/cm_cli/src/main.rs
//
// `cm`: manifest → pipeline → canonical artifacts → optional renders.
// Exit codes: 0 ok, 2 validation, 3 self-verify, 4 I/O, 5 render.

mod args;

mod exitcodes {
    pub const OK: u8 = 0;
    pub const VALIDATION: u8 = 2;
    pub const SELF_VERIFY: u8 = 3;
    pub const IO: u8 = 4;
    pub const RENDER: u8 = 5;
}

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use args::{parse_and_validate as parse_cli, Args, Render};
use cm_io::{canonical_json, hasher};
use cm_pipeline::{engine_identifiers, load, run_with_ctx, PipelineCtx, PipelineError, PipelineOutputs};
use cm_report::{build_model, render_text, ArtifactIds, ReportError, ReportModel};
use log::{debug, error, info, warn};

/// Central error type for CLI → exit-code mapping.
#[derive(Debug)]
enum MainError {
    /// Schema, manifest, CSV or batch validation failures
    Validation(String),
    /// Written report does not hash to the digest in the run record
    SelfVerify(String),
    /// Read/write/path/limit errors
    Io(String),
    /// Report model or template errors
    Render(String),
}

impl std::fmt::Display for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainError::Validation(m) => write!(f, "validation: {m}"),
            MainError::SelfVerify(m) => write!(f, "self-verify: {m}"),
            MainError::Io(m) => write!(f, "io: {m}"),
            MainError::Render(m) => write!(f, "render: {m}"),
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_cli() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("cm: error: {e}");
            return ExitCode::from(exitcodes::VALIDATION);
        }
    };
    init_logging(&args);

    let res = if args.validate_only { validate_only(&args) } else { run_once(&args) };
    match res {
        Ok(()) => ExitCode::from(exitcodes::OK),
        Err(e) => {
            error!("{e}");
            ExitCode::from(map_error(&e))
        }
    }
}

/// `RUST_LOG` wins; otherwise info, or warn with --quiet, or debug with --verbose.
fn init_logging(args: &Args) {
    let default = if args.quiet {
        "warn"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn map_error(e: &MainError) -> u8 {
    use exitcodes::*;
    match e {
        MainError::Validation(_) => VALIDATION,
        MainError::SelfVerify(_) => SELF_VERIFY,
        MainError::Io(_) => IO,
        MainError::Render(_) => RENDER,
    }
}

fn map_pipeline_err(e: PipelineError) -> MainError {
    match e {
        PipelineError::Schema(m) | PipelineError::Validate(m) => MainError::Validation(m),
        PipelineError::Io(m) => MainError::Io(m),
        PipelineError::Build(m) => MainError::SelfVerify(m),
    }
}

fn map_report_err(e: ReportError) -> MainError {
    MainError::Render(e.to_string())
}

/// Load + schema + structural checks; no evaluation, no artifacts.
fn validate_only(args: &Args) -> Result<(), MainError> {
    let n = cm_pipeline::validate_manifest_path(&args.manifest).map_err(map_pipeline_err)?;
    info!("validate-only: inputs OK ({n} metrics)");
    Ok(())
}

fn run_once(args: &Args) -> Result<(), MainError> {
    let timestamp_utc = match &args.timestamp {
        Some(ts) => ts.clone(),
        None => chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    };

    let loaded = load::load(&args.manifest).map_err(map_pipeline_err)?;
    let ctx = PipelineCtx { loaded, engine_meta: engine_identifiers(), timestamp_utc, max_year: args.max_year };
    let outs = run_with_ctx(ctx).map_err(map_pipeline_err)?;

    write_artifacts(&args.out, &outs)?;
    verify_written_report(&args.out, &outs)?;
    maybe_render_reports(args, &outs)?;

    let d = outs.report.diagnostics();
    if d.failed > 0 {
        warn!("{} of {} metrics unavailable", d.failed, d.evaluated);
    }
    info!("run: {} ({}) written to {}", outs.run_record.id, outs.report_id, args.out.display());
    Ok(())
}

fn write_artifacts(out_dir: &Path, outs: &PipelineOutputs) -> Result<(), MainError> {
    fs::create_dir_all(out_dir).map_err(|e| MainError::Io(format!("mkdir {}: {e}", out_dir.display())))?;

    canonical_json::write_canonical_file(&out_dir.join("report.json"), &outs.report)
        .map_err(|e| MainError::Io(format!("write report.json: {e}")))?;
    canonical_json::write_canonical_file(&out_dir.join("run_record.json"), &outs.run_record)
        .map_err(|e| MainError::Io(format!("write run_record.json: {e}")))?;
    Ok(())
}

/// Re-hash report.json as written and compare with the run record.
fn verify_written_report(out_dir: &Path, outs: &PipelineOutputs) -> Result<(), MainError> {
    let path = out_dir.join("report.json");
    let bytes = fs::read(&path).map_err(|e| MainError::Io(format!("read back {}: {e}", path.display())))?;
    let actual = hasher::sha256_hex(&bytes);
    let expected = &outs.run_record.outputs.report_sha256;
    if &actual != expected {
        return Err(MainError::SelfVerify(format!("report.json hashes to {actual}, run record says {expected}")));
    }
    debug!("self-verify: report.json sha256 {actual}");
    Ok(())
}

fn maybe_render_reports(args: &Args, outs: &PipelineOutputs) -> Result<(), MainError> {
    if args.render.is_empty() {
        return Ok(());
    }

    let engine = &outs.run_record.engine;
    let ids = ArtifactIds::new(&outs.report_id).with_run(
        &outs.run_record.id,
        format!("{}/{} {} ({})", engine.vendor, engine.name, engine.version, engine.build),
    );
    let model = build_model(&outs.report, &ids).map_err(map_report_err)?;

    for r in &args.render {
        match r {
            Render::Json => render_json_report(&model, &args.out)?,
            Render::Text => write_text(&args.out.join("summary.txt"), &render_text(&model))?,
            Render::Charts => render_charts(outs, &args.out)?,
            Render::Html => render_html_report(&model, &args.out)?,
        }
    }
    Ok(())
}

fn write_text(path: &Path, text: &str) -> Result<(), MainError> {
    canonical_json::write_atomic(path, text.as_bytes()).map_err(|e| MainError::Io(format!("write {}: {e}", path.display())))?;
    debug!("wrote {}", path.display());
    Ok(())
}

#[cfg(feature = "report-json")]
fn render_json_report(model: &ReportModel, out_dir: &Path) -> Result<(), MainError> {
    let v = cm_report::render_json::render_report_json(model);
    let text = cm_report::render_json::to_pretty(&v).map_err(map_report_err)?;
    write_text(&out_dir.join("report_view.json"), &text)
}

#[cfg(not(feature = "report-json"))]
fn render_json_report(_model: &ReportModel, _out_dir: &Path) -> Result<(), MainError> {
    Err(MainError::Render("json renderer not enabled (build with feature `report-json`)".into()))
}

#[cfg(feature = "report-json")]
fn render_charts(outs: &PipelineOutputs, out_dir: &Path) -> Result<(), MainError> {
    let charts = cm_report::build_charts(&outs.report);
    if !charts.omitted.is_empty() {
        debug!("charts: {} failed metrics left out", charts.omitted.len());
    }
    let v = cm_report::render_json::render_charts_json(&charts).map_err(map_report_err)?;
    let text = cm_report::render_json::to_pretty(&v).map_err(map_report_err)?;
    write_text(&out_dir.join("charts.json"), &text)
}

#[cfg(not(feature = "report-json"))]
fn render_charts(_outs: &PipelineOutputs, _out_dir: &Path) -> Result<(), MainError> {
    Err(MainError::Render("chart data needs feature `report-json`".into()))
}

#[cfg(feature = "report-html")]
fn render_html_report(model: &ReportModel, out_dir: &Path) -> Result<(), MainError> {
    let html = cm_report::render_html::render_html(model).map_err(map_report_err)?;
    write_text(&out_dir.join("report.html"), &html)
}

#[cfg(not(feature = "report-html"))]
fn render_html_report(_model: &ReportModel, _out_dir: &Path) -> Result<(), MainError> {
    Err(MainError::Render("html renderer not enabled (build with feature `report-html`)".into()))
}
