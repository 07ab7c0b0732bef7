//! JSON renderers: the formatted report view and the chart panel set.
//!
//! Key order of the view is fixed by insertion (serde_json `preserve_order`):
//! title → ids → latest → sections → totals → failures.

use serde_json::{Map as JsonMap, Value};

use crate::charts::ChartSet;
use crate::model::{ReportModel, Row, Section};
use crate::ReportError;

pub fn render_report_json(m: &ReportModel) -> Value {
    let mut root = obj();
    root.insert("title".into(), Value::String(m.title.clone()));
    root.insert("ids".into(), ids_json(m));

    let latest = m
        .latest
        .iter()
        .map(|l| {
            let mut o = obj();
            o.insert("dataset".into(), Value::String(l.dataset.clone()));
            o.insert("year".into(), Value::String(l.year.clone()));
            o.insert("cutoff".into(), Value::String(l.cutoff.clone()));
            Value::Object(o)
        })
        .collect();
    root.insert("latest".into(), Value::Array(latest));

    root.insert("sections".into(), Value::Array(m.sections.iter().map(section_json).collect()));

    let mut totals = obj();
    totals.insert("evaluated".into(), Value::from(m.evaluated));
    totals.insert("failed".into(), Value::from(m.failed));
    root.insert("totals".into(), Value::Object(totals));

    root.insert("failures".into(), Value::Array(m.failures.iter().cloned().map(Value::String).collect()));
    Value::Object(root)
}

pub fn render_charts_json(c: &ChartSet) -> Result<Value, ReportError> {
    serde_json::to_value(c).map_err(|e| ReportError::Template(format!("charts: {e}")))
}

/// Pretty text with a trailing newline, for files meant to be read by people.
pub fn to_pretty(v: &Value) -> Result<String, ReportError> {
    let mut s = serde_json::to_string_pretty(v).map_err(|e| ReportError::Template(e.to_string()))?;
    s.push('\n');
    Ok(s)
}

/* ----------------------------------- sections ----------------------------------- */

fn ids_json(m: &ReportModel) -> Value {
    let mut o = obj();
    o.insert("report_id".into(), Value::String(m.ids.report_id.clone()));
    // optional ids are omitted, never null
    if let Some(run) = &m.ids.run_id {
        o.insert("run_id".into(), Value::String(run.clone()));
    }
    if let Some(ts) = &m.ids.timestamp_utc {
        o.insert("timestamp_utc".into(), Value::String(ts.clone()));
    }
    if let Some(engine) = &m.ids.engine {
        o.insert("engine".into(), Value::String(engine.clone()));
    }
    Value::Object(o)
}

fn section_json(s: &Section) -> Value {
    let mut o = obj();
    o.insert("kind".into(), Value::String(s.kind.as_str().into()));
    o.insert("heading".into(), Value::String(s.heading.clone()));
    o.insert("rows".into(), Value::Array(s.rows.iter().map(row_json).collect()));
    Value::Object(o)
}

fn row_json(r: &Row) -> Value {
    let mut o = obj();
    o.insert("key".into(), Value::String(r.key.clone()));
    o.insert("subject".into(), Value::String(r.subject.clone()));
    o.insert("series".into(), Value::String(r.series.clone()));
    o.insert("period".into(), Value::String(r.period.clone()));
    o.insert("value".into(), Value::String(r.value.clone()));
    if let Some(d) = &r.detail {
        o.insert("detail".into(), Value::String(d.clone()));
    }
    o.insert("available".into(), Value::Bool(r.available));
    Value::Object(o)
}

#[inline]
fn obj() -> JsonMap<String, Value> {
    JsonMap::new()
}
