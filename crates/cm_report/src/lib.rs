//! cm_report: offline presentation of a finished comparison.
//!
//!   • Renderers read the report only; nothing is recomputed here
//!   • Failed metrics print as `n/a (<reason>)` and never reach a chart panel
//!   • Ids in the footer come from the pipeline outputs, checked for shape

use core::fmt;

use cm_core::ids::{ReportId, RunId};
use serde::{Deserialize, Serialize};

pub mod charts;
pub mod format;
pub mod model;
pub mod summary;

#[cfg(feature = "render_json")]
pub mod render_json;

#[cfg(feature = "render_html")]
pub mod render_html;

pub use charts::{build_charts, ChartSet, Panel, PanelKind, Point};
pub use model::{build_model, LatestLine, ReportModel, Row, Section};
pub use summary::render_text;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    Template(String),
    Inconsistent(String),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Template(m) => write!(f, "template: {m}"),
            ReportError::Inconsistent(m) => write!(f, "inconsistent report: {m}"),
        }
    }
}

impl std::error::Error for ReportError {}

/// Footer identifiers, as strings so a renderer can be fed from files on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactIds {
    pub report_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_utc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

impl ArtifactIds {
    pub fn new(report_id: &ReportId) -> Self {
        ArtifactIds { report_id: report_id.to_string(), ..Default::default() }
    }

    pub fn with_run(mut self, run_id: &RunId, engine: impl Into<String>) -> Self {
        self.timestamp_utc = Some(run_id.timestamp_utc().to_string());
        self.run_id = Some(run_id.to_string());
        self.engine = Some(engine.into());
        self
    }

    pub(crate) fn check(&self) -> Result<(), ReportError> {
        self.report_id
            .parse::<ReportId>()
            .map_err(|e| ReportError::Inconsistent(format!("report id {:?}: {e}", self.report_id)))?;
        if let Some(run) = &self.run_id {
            let parsed = run
                .parse::<RunId>()
                .map_err(|e| ReportError::Inconsistent(format!("run id {run:?}: {e}")))?;
            if let Some(ts) = &self.timestamp_utc {
                if parsed.timestamp_utc() != ts {
                    return Err(ReportError::Inconsistent(format!("run id {run} does not carry timestamp {ts}")));
                }
            }
        }
        Ok(())
    }
}

/* ------------------------------------- Tests -------------------------------------- */
