//! Chart panel data (`charts.json`) for a plotting front end.
//!
//! Single-target entries sharing (kind, dataset, column) that cover two or more
//! years become one line panel: a line per entity, a point per year. Otherwise
//! entries sharing a period become one panel with one point per entity. Each
//! ratio is a panel of its own with the two operand values. Failed entries
//! never become points; their keys are listed in `omitted` instead.

use std::collections::{BTreeMap, BTreeSet};

use cm_core::{ComparisonReport, MetricKey, MetricKind, MetricValue, Outcome, Period, Subject, Year, YearRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Bars,
    Slices,
    Pair,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub label: String,
    pub value: f64,
}

/// One entity's values over the years of a line panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub label: String,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub id: String,
    pub kind: PanelKind,
    pub metric: MetricKind,
    pub series: String,
    pub period: String,
    /// Values are fractions to be shown as percentages.
    pub percent: bool,
    pub points: Vec<Point>,
    /// Only line panels have lines; their `points` stay empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSet {
    pub title: String,
    pub panels: Vec<Panel>,
    pub omitted: Vec<String>,
}

/// Scalar of a single-target entry with an explicit year.
fn yearly(key: &MetricKey, value: &MetricValue) -> Option<(Year, f64)> {
    match (key.period, value, &key.subject) {
        (Period::Year(YearRef::Year(y)), MetricValue::Scalar(v), Subject::Entity(_)) if v.is_finite() => Some((y, *v)),
        _ => None,
    }
}

pub fn build_charts(report: &ComparisonReport) -> ChartSet {
    // groups seen with two or more distinct years are drawn as lines
    let mut years: BTreeMap<String, BTreeSet<Year>> = BTreeMap::new();
    for e in report.entries() {
        if let Some((y, _)) = e.outcome.value().and_then(|v| yearly(&e.key, v)) {
            years.entry(group(&e.key)).or_default().insert(y);
        }
    }

    let mut panels: Vec<Panel> = Vec::new();
    let mut lines: BTreeMap<usize, Vec<(String, BTreeMap<Year, f64>)>> = BTreeMap::new();
    let mut omitted = Vec::new();

    for e in report.entries() {
        let key = &e.key;
        let value = match &e.outcome {
            Outcome::Value(v) => v,
            Outcome::Unavailable(_) => {
                omitted.push(key.to_string());
                continue;
            }
        };

        let g = group(key);
        if let (Some((y, v)), Some(span)) = (yearly(key, value), years.get(&g).filter(|s| s.len() > 1)) {
            let id = format!("{g} by year");
            let at = match panels.iter().position(|p| p.id == id) {
                Some(i) => i,
                None => {
                    let (first, last) = (span.first().copied().unwrap_or(y), span.last().copied().unwrap_or(y));
                    panels.push(Panel {
                        id,
                        kind: PanelKind::Line,
                        metric: key.kind,
                        series: series(key),
                        period: format!("{first}-{last}"),
                        percent: key.kind.is_rate(),
                        points: Vec::new(),
                        lines: Vec::new(),
                    });
                    panels.len() - 1
                }
            };
            let entity = key.subject.to_string();
            let per_entity = lines.entry(at).or_default();
            match per_entity.iter_mut().find(|(label, _)| *label == entity) {
                Some((_, pts)) => {
                    pts.insert(y, v);
                }
                None => per_entity.push((entity, BTreeMap::from([(y, v)]))),
            }
            continue;
        }

        match (value, &key.subject) {
            (MetricValue::Ratio(r), Subject::Pair { left, right }) if r.left.is_finite() && r.right.is_finite() => {
                panels.push(Panel {
                    id: key.to_string(),
                    kind: PanelKind::Pair,
                    metric: key.kind,
                    series: series(key),
                    period: key.period.to_string(),
                    percent: key.operand.is_some_and(MetricKind::is_rate),
                    points: vec![
                        Point { label: left.to_string(), value: r.left },
                        Point { label: right.to_string(), value: r.right },
                    ],
                    lines: Vec::new(),
                });
            }
            (MetricValue::Scalar(v), Subject::Entity(entity)) if v.is_finite() => {
                let id = format!("{} {} {}{}", key.kind, series(key), key.period, suffix(key));
                let point = Point { label: entity.to_string(), value: *v };
                match panels.iter_mut().find(|p| p.id == id) {
                    Some(p) => p.points.push(point),
                    None => panels.push(Panel {
                        id,
                        kind: panel_kind(key.kind),
                        metric: key.kind,
                        series: series(key),
                        period: key.period.to_string(),
                        percent: key.kind.is_rate(),
                        points: vec![point],
                        lines: Vec::new(),
                    }),
                }
            }
            _ => omitted.push(key.to_string()),
        }
    }

    for (at, per_entity) in lines {
        if let Some(panel) = panels.get_mut(at) {
            panel.lines = per_entity
                .into_iter()
                .map(|(label, pts)| Line {
                    label,
                    points: pts.into_iter().map(|(y, value)| Point { label: y.to_string(), value }).collect(),
                })
                .collect();
        }
    }

    ChartSet { title: report.title().to_string(), panels, omitted }
}

fn panel_kind(kind: MetricKind) -> PanelKind {
    match kind {
        MetricKind::ShareOfTotal | MetricKind::MixShare => PanelKind::Slices,
        MetricKind::LeaderRatio => PanelKind::Pair,
        _ => PanelKind::Bars,
    }
}

fn series(key: &MetricKey) -> String {
    format!("{}/{}", key.dataset, key.column)
}

fn suffix(key: &MetricKey) -> String {
    key.variant.as_ref().map(|v| format!(" ({v})")).unwrap_or_default()
}

/// Kind, series and variant: everything but entity and period.
fn group(key: &MetricKey) -> String {
    format!("{} {}{}", key.kind, series(key), suffix(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample;
    use cm_core::ReportEntry;

    #[test]
    fn entities_share_a_panel() {
        let c = build_charts(&sample());
        let annual = &c.panels[0];
        assert_eq!(annual.id, "annual_value patents/Total_Patents 2023");
        assert_eq!(annual.kind, PanelKind::Bars);
        let labels: Vec<&str> = annual.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["US", "China"]);
        assert_eq!(c.panels.len(), 3);
    }

    #[test]
    fn failed_entries_are_omitted_not_zeroed() {
        let c = build_charts(&sample());
        assert_eq!(c.omitted, vec!["yoy_growth_rate patents/Total_Patents [US] 2014".to_string()]);
        assert!(c.panels.iter().all(|p| p.metric != MetricKind::YoyGrowthRate));
        assert!(c.panels.iter().flat_map(|p| &p.points).all(|p| p.value.is_finite()));
    }

    #[test]
    fn several_years_make_a_line_per_entity() {
        let mut entries = sample().entries().to_vec();
        let us_2023 = entries[1].key.clone();
        for (entity, year, v) in [("US", 2022, 520.0), ("China", 2021, 1200.0), ("China", 2022, 1390.0)] {
            entries.push(ReportEntry {
                key: MetricKey {
                    subject: Subject::Entity(entity.parse().unwrap()),
                    period: Period::Year(YearRef::Year(year)),
                    ..us_2023.clone()
                },
                outcome: Outcome::Value(MetricValue::Scalar(v)),
            });
        }
        let c = build_charts(&ComparisonReport::new("t", entries, vec![]));

        let line = &c.panels[0];
        assert_eq!(line.kind, PanelKind::Line);
        assert_eq!(line.id, "annual_value patents/Total_Patents by year");
        assert_eq!(line.period, "2021-2023");
        assert!(line.points.is_empty());
        let us: Vec<(&str, f64)> = line.lines[0].points.iter().map(|p| (p.label.as_str(), p.value)).collect();
        assert_eq!(line.lines[0].label, "US");
        assert_eq!(us, [("2022", 520.0), ("2023", 530.0)]);
        let china: Vec<&str> = line.lines[1].points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(china, ["2021", "2022", "2023"]);
        assert!(c.panels.iter().all(|p| p.kind != PanelKind::Bars));
    }

    #[test]
    fn ratio_panel_carries_both_operands() {
        let c = build_charts(&sample());
        let pair = c.panels.iter().find(|p| p.kind == PanelKind::Pair).unwrap();
        assert_eq!(pair.points[0], Point { label: "US".into(), value: 340.0 });
        assert_eq!(pair.points[1], Point { label: "China".into(), value: 465.0 });
        assert!(!pair.percent);

        let share = c.panels.iter().find(|p| p.kind == PanelKind::Slices).unwrap();
        assert!(share.percent);
    }
}
