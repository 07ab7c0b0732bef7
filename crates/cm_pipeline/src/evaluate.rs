//! EVALUATE stage: one resolved spec → one report entry.
//!
//! Each spec is evaluated on its own against the immutable catalog, so a
//! failure stays local to its key and the order of specs changes nothing but
//! the order of entries.

use std::collections::BTreeSet;

use cm_core::{
    DatasetCatalog, EntityId, MetricError, MetricKey, MetricSpec, MetricValue, Outcome, Period, ReportEntry, Shape,
    Subject, Target, Year, YearRef,
};
use log::debug;

use crate::resolve_years::Resolution;

/// Report key of a spec, declared (`YearRef`) or resolved (`Year`).
pub fn metric_key<Y: Copy + Into<YearRef>>(spec: &MetricSpec<Y>) -> MetricKey {
    match spec.shape() {
        Shape::Ratio(left, right) => {
            let l = metric_key(left);
            let r = metric_key(right);
            MetricKey {
                kind: spec.kind(),
                operand: Some(l.kind),
                dataset: joined(&l.dataset, &r.dataset),
                column: joined(&l.column, &r.column),
                subject: Subject::Pair { left: lead_entity(l.subject), right: lead_entity(r.subject) },
                period: l.period,
                variant: match (l.variant, r.variant) {
                    (None, None) => None,
                    (a, b) => Some(joined(a.as_deref().unwrap_or("-"), b.as_deref().unwrap_or("-"))),
                },
            }
        }
        Shape::Single(t) => {
            let period = match spec.years() {
                (y, None) => Period::Year((*y).into()),
                (start, Some(end)) => Period::Window { start: (*start).into(), end: (*end).into() },
            };
            let (column, variant) = match spec {
                MetricSpec::ShareOfTotal { entity, peers, .. } => {
                    (t.column.to_string(), Some(format!("of {}", plus(peers.iter().chain([entity])))))
                }
                MetricSpec::MixShare { column, mix, basis, .. } => {
                    (t.column.to_string(), Some(format!("{} of {}", basis.as_str(), plus(mix.iter().chain([column])))))
                }
                MetricSpec::CombinedTotal { column, with, basis, .. } => {
                    (plus(with.iter().chain([column])), Some(basis.as_str().to_string()))
                }
                _ => (t.column.to_string(), None),
            };
            MetricKey {
                kind: spec.kind(),
                operand: None,
                dataset: t.dataset.to_string(),
                column,
                subject: Subject::Entity(t.entity.clone()),
                period,
                variant,
            }
        }
    }
}

/// Sorted, deduplicated members joined with `+`.
fn plus<'a, T: Ord + core::fmt::Display + 'a>(items: impl Iterator<Item = &'a T>) -> String {
    items.collect::<BTreeSet<_>>().into_iter().map(ToString::to_string).collect::<Vec<_>>().join("+")
}

fn joined(a: &str, b: &str) -> String {
    if a == b {
        a.to_string()
    } else {
        format!("{a}|{b}")
    }
}

fn lead_entity(s: Subject) -> EntityId {
    match s {
        Subject::Entity(e) | Subject::Pair { left: e, .. } => e,
    }
}

/// Evaluate one resolved spec.
pub fn evaluate(catalog: &DatasetCatalog, spec: &MetricSpec<Year>) -> Result<MetricValue, MetricError> {
    match spec {
        MetricSpec::LeaderRatio { left, right } => {
            let a = scalar(catalog, left)?;
            let b = scalar(catalog, right)?;
            cm_algo::leader_ratio(a, b).map(MetricValue::Ratio)
        }
        other => scalar(catalog, other).map(MetricValue::Scalar),
    }
}

fn scalar(catalog: &DatasetCatalog, spec: &MetricSpec<Year>) -> Result<f64, MetricError> {
    let t: Target<'_> = match spec.shape() {
        Shape::Single(t) => t,
        // operands that are themselves ratios are rejected by validation
        Shape::Ratio(..) => return Err(MetricError::UndefinedRatio),
    };
    let ds = catalog.get(t.dataset).ok_or_else(|| MetricError::MissingDataPoint {
        entity: t.entity.clone(),
        column: t.column.clone(),
        year: None,
    })?;
    let (entity, column) = (t.entity, t.column);

    match spec {
        MetricSpec::AnnualValue { year, .. } => cm_algo::annual_value(ds, entity, column, *year),
        MetricSpec::CumulativeTotal { upto_year, .. } => {
            cm_algo::cumulative_total_declared(ds, entity, column, *upto_year)
        }
        MetricSpec::CombinedTotal { year, with, basis, .. } => {
            cm_algo::combined_total(ds, entity, column, *year, with, *basis)
        }
        MetricSpec::YoyGrowthRate { year, .. } => cm_algo::yoy_growth_rate(ds, entity, column, *year),
        MetricSpec::Cagr { start_year, end_year, .. } => cm_algo::cagr(ds, entity, column, *start_year, *end_year),
        MetricSpec::PeriodGrowth { start_year, end_year, .. } => {
            cm_algo::period_growth(ds, entity, column, *start_year, *end_year)
        }
        MetricSpec::ShareOfTotal { year, peers, .. } => cm_algo::share_of_total(ds, entity, column, *year, peers),
        MetricSpec::MixShare { year, mix, basis, .. } => cm_algo::mix_share(ds, entity, column, *year, mix, *basis),
        MetricSpec::LeaderRatio { .. } => Err(MetricError::UndefinedRatio),
    }
}

/// Evaluate a declared batch in order. Unresolvable specs keep their declared key.
pub fn evaluate_batch(
    catalog: &DatasetCatalog,
    metrics: &[MetricSpec<YearRef>],
    resolution: &Resolution,
) -> Vec<ReportEntry> {
    metrics
        .iter()
        .map(|declared| {
            let (key, outcome) = match resolution.resolve(declared) {
                Ok(spec) => (metric_key(&spec), Outcome::from(evaluate(catalog, &spec))),
                Err(e) => (metric_key(declared), Outcome::Unavailable(e)),
            };
            if let Some(err) = outcome.error() {
                debug!("{key}: {err}");
            }
            ReportEntry { key, outcome }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_core::{DataPoint, DatasetBuilder, Leader, ValueBasis};

    fn id<T: core::str::FromStr>(s: &str) -> T
    where
        T::Err: core::fmt::Debug,
    {
        s.parse().unwrap()
    }

    fn catalog() -> DatasetCatalog {
        let ds = DatasetBuilder::new(id("funding"))
            .series(id("US"), id("Gov"), vec![DataPoint::new(2014, 100.0), DataPoint::new(2015, 110.0)])
            .series(id("China"), id("Gov"), vec![DataPoint::new(2014, 50.0), DataPoint::new(2015, 80.0)])
            .build()
            .unwrap();
        std::iter::once(ds).collect()
    }

    fn yoy(entity: &str) -> MetricSpec<Year> {
        MetricSpec::YoyGrowthRate { dataset: id("funding"), entity: id(entity), column: id("Gov"), year: 2015 }
    }

    #[test]
    fn growth_ratio_leader_comes_from_data() {
        let spec = MetricSpec::LeaderRatio { left: Box::new(yoy("US")), right: Box::new(yoy("China")) };
        let MetricValue::Ratio(r) = evaluate(&catalog(), &spec).unwrap() else {
            panic!("expected a ratio");
        };
        assert_eq!(r.leader, Leader::Right);
        assert!((r.left - 0.1).abs() < 1e-12);
        assert!((r.right - 0.6).abs() < 1e-12);
    }

    #[test]
    fn ratio_key_names_pair_and_operand() {
        let spec = MetricSpec::LeaderRatio { left: Box::new(yoy("US")), right: Box::new(yoy("China")) };
        let key = metric_key(&spec);
        assert_eq!(key.to_string(), "leader_ratio(yoy_growth_rate) funding/Gov [US vs China] 2015");
    }

    #[test]
    fn mixed_ratio_key_joins_columns() {
        let spec: MetricSpec<Year> = MetricSpec::LeaderRatio {
            left: Box::new(MetricSpec::AnnualValue {
                dataset: id("funding"),
                entity: id("US"),
                column: id("Gov"),
                year: 2015,
            }),
            right: Box::new(MetricSpec::AnnualValue {
                dataset: id("funding"),
                entity: id("US"),
                column: id("Private"),
                year: 2015,
            }),
        };
        let key = metric_key(&spec);
        assert_eq!(key.column, "Gov|Private");
        assert_eq!(key.dataset, "funding");
    }

    #[test]
    fn group_members_and_basis_are_part_of_the_key() {
        let mix = |basis| -> MetricSpec<Year> {
            MetricSpec::MixShare {
                dataset: id("funding"),
                entity: id("US"),
                column: id("Gov"),
                year: 2015,
                mix: vec![id("Private"), id("Gov")],
                basis,
            }
        };
        let annual = metric_key(&mix(ValueBasis::Annual));
        assert_eq!(annual.to_string(), "mix_share funding/Gov [US] 2015 (annual of Gov+Private)");
        assert_ne!(annual, metric_key(&mix(ValueBasis::Cumulative)));

        let share = |peers: Vec<EntityId>| -> MetricSpec<Year> {
            MetricSpec::ShareOfTotal { dataset: id("funding"), entity: id("US"), column: id("Gov"), year: 2015, peers }
        };
        let two = metric_key(&share(vec![id("China")]));
        assert_eq!(two.variant.as_deref(), Some("of China+US"));
        assert_eq!(two, metric_key(&share(vec![id("China"), id("US")])));
        assert_ne!(two, metric_key(&share(vec![id("China"), id("EU")])));
    }

    #[test]
    fn combined_total_key_lists_its_columns() {
        let total = |entity: &str| -> MetricSpec<Year> {
            MetricSpec::CombinedTotal {
                dataset: id("funding"),
                entity: id(entity),
                column: id("Private"),
                year: 2015,
                with: vec![id("Gov")],
                basis: ValueBasis::Annual,
            }
        };
        assert_eq!(metric_key(&total("US")).to_string(), "combined_total funding/Gov+Private [US] 2015 (annual)");
        let ratio = MetricSpec::LeaderRatio { left: Box::new(total("US")), right: Box::new(total("China")) };
        assert_eq!(
            metric_key(&ratio).to_string(),
            "leader_ratio(combined_total) funding/Gov+Private [US vs China] 2015 (annual)"
        );
    }

    #[test]
    fn unknown_entity_is_a_metric_failure() {
        let err = evaluate(&catalog(), &yoy("EU")).unwrap_err();
        assert_eq!(err.code(), "missing_data_point");
    }
}
