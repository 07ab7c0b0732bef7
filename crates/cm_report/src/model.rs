//! Report model: every string a renderer prints, formatted once.
//!
//! Sections follow a fixed kind order (levels, totals, growth, shares, ratios);
//! rows keep batch order inside a section. Kinds with no entry get no section.

use cm_core::{ComparisonReport, MetricKey, MetricKind, MetricValue, Outcome, ReportEntry, Subject};
use serde::{Deserialize, Serialize};

use crate::{format, ArtifactIds, ReportError};

const SECTION_ORDER: [MetricKind; 9] = [
    MetricKind::AnnualValue,
    MetricKind::CumulativeTotal,
    MetricKind::CombinedTotal,
    MetricKind::YoyGrowthRate,
    MetricKind::Cagr,
    MetricKind::PeriodGrowth,
    MetricKind::ShareOfTotal,
    MetricKind::MixShare,
    MetricKind::LeaderRatio,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    pub title: String,
    pub ids: ArtifactIds,
    pub latest: Vec<LatestLine>,
    pub sections: Vec<Section>,
    pub evaluated: usize,
    pub failed: usize,
    pub failures: Vec<String>,
}

/// How `latest` resolved for one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestLine {
    pub dataset: String,
    pub cutoff: String,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: MetricKind,
    pub heading: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub key: String,
    pub subject: String,
    /// `dataset/column`
    pub series: String,
    pub period: String,
    pub value: String,
    /// Operand values of a ratio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub available: bool,
}

pub fn heading(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::AnnualValue => "Annual values",
        MetricKind::CumulativeTotal => "Running totals",
        MetricKind::CombinedTotal => "Combined totals",
        MetricKind::YoyGrowthRate => "Year-over-year growth",
        MetricKind::Cagr => "Compound annual growth",
        MetricKind::PeriodGrowth => "Growth over period",
        MetricKind::ShareOfTotal => "Share of total",
        MetricKind::MixShare => "Mix share",
        MetricKind::LeaderRatio => "Head-to-head",
    }
}

/// Build the model from a finished report. Counts are re-derived and must
/// agree with the report diagnostics.
pub fn build_model(report: &ComparisonReport, ids: &ArtifactIds) -> Result<ReportModel, ReportError> {
    ids.check()?;

    let d = report.diagnostics();
    let failed = report.failures().count();
    if d.evaluated != report.entries().len() || d.failed != failed || d.failures.len() != failed {
        return Err(ReportError::Inconsistent(format!(
            "diagnostics count {} evaluated / {} failed, entries give {} / {}",
            d.evaluated,
            d.failed,
            report.entries().len(),
            failed
        )));
    }

    let latest = d
        .resolved_latest
        .iter()
        .map(|r| LatestLine {
            dataset: r.dataset.to_string(),
            cutoff: r.cutoff.map_or_else(|| "none".to_string(), |y| y.to_string()),
            year: r.year.map_or_else(|| "none".to_string(), |y| y.to_string()),
        })
        .collect();

    let sections = SECTION_ORDER
        .iter()
        .filter_map(|&kind| {
            let rows: Vec<Row> = report.entries().iter().filter(|e| e.key.kind == kind).map(row).collect();
            (!rows.is_empty()).then(|| Section { kind, heading: heading(kind).to_string(), rows })
        })
        .collect();

    Ok(ReportModel {
        title: report.title().to_string(),
        ids: ids.clone(),
        latest,
        sections,
        evaluated: d.evaluated,
        failed: d.failed,
        failures: d.failures.clone(),
    })
}

/// Subject line and the names of the two sides of a ratio. Two operands on
/// the same entity are told apart by column, then by dataset.
fn sides(key: &MetricKey) -> (String, String, String) {
    match &key.subject {
        Subject::Entity(x) => (x.to_string(), String::new(), x.to_string()),
        Subject::Pair { left, right } if left == right => {
            match [&key.column, &key.dataset].into_iter().find_map(|joined| joined.split_once('|')) {
                Some((l, r)) => (l.to_string(), r.to_string(), format!("{left}: {l} vs {r}")),
                None => (left.to_string(), right.to_string(), key.subject.to_string()),
            }
        }
        Subject::Pair { left, right } => (left.to_string(), right.to_string(), key.subject.to_string()),
    }
}

fn row(e: &ReportEntry) -> Row {
    let key = &e.key;
    let (left, right, subject) = sides(key);
    let rate_operands = key.operand.is_some_and(MetricKind::is_rate);

    let (value, detail, available) = match &e.outcome {
        Outcome::Value(v) => {
            let detail = match v {
                MetricValue::Ratio(r) => Some(format::operands(r, rate_operands)),
                MetricValue::Scalar(_) => None,
            };
            (format::value(key.kind, key.operand, v, (&left, &right)), detail, true)
        }
        Outcome::Unavailable(err) => (format::unavailable(err), None, false),
    };

    Row {
        key: key.to_string(),
        subject,
        series: format!("{}/{}", key.dataset, key.column),
        period: key.period.to_string(),
        value,
        detail,
        available,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cm_core::{Leader, MetricError, Period, RatioValue, ResolvedLatest, YearRef};

    pub(crate) const RPT: &str = "RPT:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn key(kind: MetricKind, entity: &str, column: &str, year: i32) -> MetricKey {
        MetricKey {
            kind,
            operand: None,
            dataset: "patents".into(),
            column: column.into(),
            subject: Subject::Entity(entity.parse().unwrap()),
            period: Period::Year(YearRef::Year(year)),
            variant: None,
        }
    }

    /// Small report touching every rendering path: scalar, rate, ratio, failure.
    pub(crate) fn sample() -> ComparisonReport {
        let ratio_key = MetricKey {
            kind: MetricKind::LeaderRatio,
            operand: Some(MetricKind::AnnualValue),
            subject: Subject::Pair { left: "US".parse().unwrap(), right: "China".parse().unwrap() },
            ..key(MetricKind::LeaderRatio, "US", "Quantum_Computing", 2023)
        };
        let entries = vec![
            ReportEntry {
                key: key(MetricKind::YoyGrowthRate, "US", "Total_Patents", 2014),
                outcome: Outcome::Unavailable(MetricError::MissingDataPoint {
                    entity: "US".parse().unwrap(),
                    column: "Total_Patents".parse().unwrap(),
                    year: Some(2013),
                }),
            },
            ReportEntry {
                key: key(MetricKind::AnnualValue, "US", "Total_Patents", 2023),
                outcome: Outcome::Value(MetricValue::Scalar(530.0)),
            },
            ReportEntry {
                key: key(MetricKind::AnnualValue, "China", "Total_Patents", 2023),
                outcome: Outcome::Value(MetricValue::Scalar(1456.0)),
            },
            ReportEntry {
                key: key(MetricKind::ShareOfTotal, "US", "Total_Patents", 2023),
                outcome: Outcome::Value(MetricValue::Scalar(530.0 / 1986.0)),
            },
            ReportEntry {
                key: ratio_key,
                outcome: Outcome::Value(MetricValue::Ratio(RatioValue {
                    left: 340.0,
                    right: 465.0,
                    ratio: 340.0 / 465.0,
                    leader: Leader::Right,
                    multiple: Some(465.0 / 340.0),
                    gap: 125.0,
                })),
            },
        ];
        let latest = vec![ResolvedLatest { dataset: "patents".parse().unwrap(), cutoff: Some(2023), year: Some(2023) }];
        ComparisonReport::new("Quantum patents", entries, latest)
    }

    #[test]
    fn sections_follow_kind_order() {
        let m = build_model(&sample(), &ArtifactIds { report_id: RPT.into(), ..Default::default() }).unwrap();
        let kinds: Vec<MetricKind> = m.sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![MetricKind::AnnualValue, MetricKind::YoyGrowthRate, MetricKind::ShareOfTotal, MetricKind::LeaderRatio]
        );
        assert_eq!(m.sections[0].rows[1].value, "1,456");
        assert_eq!(m.sections[2].rows[0].value, "26.7%");
        assert_eq!(m.latest[0].year, "2023");
        assert_eq!((m.evaluated, m.failed), (5, 1));
    }

    #[test]
    fn failures_and_ratios_read_plainly() {
        let m = build_model(&sample(), &ArtifactIds { report_id: RPT.into(), ..Default::default() }).unwrap();
        let yoy = &m.sections[1].rows[0];
        assert!(!yoy.available);
        assert!(yoy.value.starts_with("n/a ("), "{}", yoy.value);

        let ratio = &m.sections[3].rows[0];
        assert_eq!(ratio.value, "China leads 1.37x (gap 125)");
        assert_eq!(ratio.detail.as_deref(), Some("340 vs 465"));
        assert_eq!(ratio.subject, "US vs China");
    }

    #[test]
    fn same_entity_ratio_names_its_columns() {
        let key = MetricKey {
            kind: MetricKind::LeaderRatio,
            operand: Some(MetricKind::AnnualValue),
            subject: Subject::Pair { left: "US".parse().unwrap(), right: "US".parse().unwrap() },
            dataset: "funding".into(),
            ..key(MetricKind::LeaderRatio, "US", "Government_Millions|Private_Millions", 2024)
        };
        let entry = ReportEntry {
            key,
            outcome: Outcome::Value(MetricValue::Ratio(RatioValue {
                left: 900.0,
                right: 2600.0,
                ratio: 900.0 / 2600.0,
                leader: Leader::Right,
                multiple: Some(2600.0 / 900.0),
                gap: 1700.0,
            })),
        };
        let r = row(&entry);
        assert_eq!(r.subject, "US: Government_Millions vs Private_Millions");
        assert_eq!(r.value, "Private_Millions leads 2.89x (gap 1,700)");
    }

    #[test]
    fn bad_report_id_is_rejected() {
        let err = build_model(&sample(), &ArtifactIds { report_id: "RPT:nope".into(), ..Default::default() });
        assert!(matches!(err, Err(ReportError::Inconsistent(_))));
    }
}
