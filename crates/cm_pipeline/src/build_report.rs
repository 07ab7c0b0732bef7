//! BUILD_REPORT stage: entries → `ComparisonReport` + `RPT:` id.

use std::collections::BTreeSet;

use cm_core::ids::ReportId;
use cm_core::{ComparisonReport, ReportEntry, ResolvedLatest};
use cm_io::hasher;
use log::info;

use crate::PipelineError;

/// Keys must be unique once `latest` is resolved (`2024` and `latest` can collide).
pub fn build_report(
    title: &str,
    entries: Vec<ReportEntry>,
    resolved_latest: Vec<ResolvedLatest>,
) -> Result<(ComparisonReport, ReportId), PipelineError> {
    let mut seen = BTreeSet::new();
    if let Some(dup) = entries.iter().find(|e| !seen.insert(&e.key)) {
        return Err(PipelineError::Validate(format!("two metrics resolve to the same key: {}", dup.key)));
    }

    let report = ComparisonReport::new(title, entries, resolved_latest);
    let id = hasher::report_id(&report)?;
    info!(
        "report {id}: {} evaluated, {} failed",
        report.diagnostics().evaluated,
        report.diagnostics().failed
    );
    Ok((report, id))
}
