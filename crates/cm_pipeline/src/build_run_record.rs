//! BUILD_RUN_RECORD stage.
//!
//! The run record ties a report to everything that produced it: engine
//! identifiers, the normalized timestamp, input digests, the effective cut-off
//! and the report's id and digest. Its id is `RUN:<timestamp>-<hex>` where
//! `<hex>` is the SHA-256 of the canonical record without the id.

use std::collections::BTreeMap;

use cm_core::ids::{ReportId, RunId};
use cm_core::{AsOf, ComparisonReport};
use cm_io::hasher;
use cm_io::loader::InputDigests;
use serde::{Deserialize, Serialize};

use crate::{EngineMeta, PipelineError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInputs {
    /// sha256 of raw input bytes, keyed by manifest path.
    pub files: BTreeMap<String, String>,
    pub batch_sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutputs {
    pub report_id: ReportId,
    pub report_sha256: String,
    pub evaluated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub timestamp_utc: String,
    pub engine: EngineMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_id: Option<String>,
    pub inputs: RunInputs,
    pub as_of: AsOf,
    pub outputs: RunOutputs,
}

pub struct RunRecordInputs<'a> {
    pub timestamp_utc: &'a str,
    pub engine: &'a EngineMeta,
    pub manifest_id: Option<&'a str>,
    pub digests: &'a InputDigests,
    pub as_of: &'a AsOf,
    pub report: &'a ComparisonReport,
    pub report_id: &'a ReportId,
}

pub fn build_run_record(i: RunRecordInputs<'_>) -> Result<RunRecord, PipelineError> {
    let timestamp_utc = hasher::normalize_rfc3339_utc_seconds(i.timestamp_utc)?;
    let inputs = RunInputs { files: i.digests.files.clone(), batch_sha256: i.digests.batch_sha256.clone() };
    let outputs = RunOutputs {
        report_id: i.report_id.clone(),
        report_sha256: i.report_id.as_hex().to_string(),
        evaluated: i.report.diagnostics().evaluated,
        failed: i.report.diagnostics().failed,
    };

    #[derive(Serialize)]
    struct RunNoId<'a> {
        timestamp_utc: &'a str,
        engine: &'a EngineMeta,
        #[serde(skip_serializing_if = "Option::is_none")]
        manifest_id: Option<&'a str>,
        inputs: &'a RunInputs,
        as_of: &'a AsOf,
        outputs: &'a RunOutputs,
    }
    let payload = RunNoId {
        timestamp_utc: &timestamp_utc,
        engine: i.engine,
        manifest_id: i.manifest_id,
        inputs: &inputs,
        as_of: i.as_of,
        outputs: &outputs,
    };
    let id = hasher::run_id(&timestamp_utc, &payload)?;

    Ok(RunRecord {
        id,
        timestamp_utc,
        engine: i.engine.clone(),
        manifest_id: i.manifest_id.map(str::to_string),
        inputs,
        as_of: i.as_of.clone(),
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_identifiers;

    fn record(ts: &str, batch_sha: &str) -> Result<RunRecord, PipelineError> {
        let report = ComparisonReport::new("t", vec![], vec![]);
        let report_id = hasher::report_id(&report).unwrap();
        let digests = InputDigests { files: BTreeMap::new(), batch_sha256: batch_sha.into() };
        build_run_record(RunRecordInputs {
            timestamp_utc: ts,
            engine: &engine_identifiers(),
            manifest_id: Some("quantum"),
            digests: &digests,
            as_of: &AsOf::default(),
            report: &report,
            report_id: &report_id,
        })
    }

    #[test]
    fn run_id_carries_normalized_timestamp() {
        let r = record("2025-08-12T10:00:00.5Z", "aa").unwrap();
        assert_eq!(r.timestamp_utc, "2025-08-12T10:00:00Z");
        assert!(r.id.as_str().starts_with("RUN:2025-08-12T10:00:00Z-"));
        assert_eq!(r.outputs.report_sha256, r.outputs.report_id.as_hex());
    }

    #[test]
    fn run_id_depends_on_inputs() {
        let a = record("2025-08-12T10:00:00Z", "aa").unwrap();
        let b = record("2025-08-12T10:00:00Z", "bb").unwrap();
        assert_ne!(a.id, b.id);
        assert!(matches!(record("yesterday", "aa"), Err(PipelineError::Build(_))));
    }
}
