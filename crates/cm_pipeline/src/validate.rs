//! crates/cm_pipeline/src/validate.rs
//! Structural validation of a batch before anything is evaluated.
//!
//! Errors here are mistakes in the request (unknown dataset, ratio of ratios,
//! two metrics with the same key) and abort the batch. Missing entities,
//! columns or years are not checked: those are per-metric failures.

use std::collections::BTreeMap;

use cm_core::{BatchSpec, DatasetCatalog, MetricSpec};
use log::warn;

use crate::evaluate::metric_key;
use crate::PipelineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One finding; `metric` is the index in the batch when the issue belongs to one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub metric: Option<usize>,
}

/// pass = no `Error`; issues are in batch order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub pass: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> + '_ {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Warnings are logged; errors become one `PipelineError::Validate`.
    pub fn into_result(self) -> Result<(), PipelineError> {
        for w in self.issues.iter().filter(|i| i.severity == Severity::Warning) {
            warn!("{}: {}", w.code, w.message);
        }
        if self.pass {
            return Ok(());
        }
        let msg: Vec<String> = self
            .errors()
            .map(|i| match i.metric {
                Some(n) => format!("metrics[{n}] {}: {}", i.code, i.message),
                None => format!("{}: {}", i.code, i.message),
            })
            .collect();
        Err(PipelineError::Validate(msg.join("; ")))
    }
}

pub fn validate(catalog: &DatasetCatalog, batch: &BatchSpec) -> ValidationReport {
    let mut issues = Vec::new();

    if batch.metrics.is_empty() {
        issues.push(error("empty_batch", "batch declares no metrics".into(), None));
    }

    for id in batch.as_of.per_dataset.keys().filter(|id| !catalog.contains(id)) {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            code: "unused_cutoff",
            message: format!("as_of.per_dataset names unknown dataset {id}"),
            metric: None,
        });
    }

    let mut keys = BTreeMap::new();
    for (n, spec) in batch.metrics.iter().enumerate() {
        for ds in spec.datasets() {
            if !catalog.contains(ds) {
                issues.push(error("unknown_dataset", format!("dataset {ds} is not loaded"), Some(n)));
            }
        }
        if let MetricSpec::LeaderRatio { left, right } = spec {
            if matches!(**left, MetricSpec::LeaderRatio { .. }) || matches!(**right, MetricSpec::LeaderRatio { .. }) {
                issues.push(error("nested_ratio", "ratio operands cannot be ratios".into(), Some(n)));
            }
        }
        let key = metric_key(spec);
        if let Some(first) = keys.insert(key.clone(), n) {
            issues.push(error("duplicate_key", format!("{key} already produced by metrics[{first}]"), Some(n)));
        }
    }

    ValidationReport { pass: !issues.iter().any(|i| i.severity == Severity::Error), issues }
}

fn error(code: &'static str, message: String, metric: Option<usize>) -> ValidationIssue {
    ValidationIssue { severity: Severity::Error, code, message, metric }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_core::{DataPoint, DatasetBuilder, ValueBasis, YearRef};

    fn id<T: core::str::FromStr>(s: &str) -> T
    where
        T::Err: core::fmt::Debug,
    {
        s.parse().unwrap()
    }

    fn catalog() -> DatasetCatalog {
        let ds = DatasetBuilder::new(id("funding"))
            .series(id("US"), id("Gov"), vec![DataPoint::new(2014, 1.0)])
            .series(id("China"), id("Gov"), vec![DataPoint::new(2014, 2.0)])
            .build()
            .unwrap();
        std::iter::once(ds).collect()
    }

    fn annual(dataset: &str, entity: &str, year: YearRef) -> MetricSpec {
        MetricSpec::AnnualValue { dataset: id(dataset), entity: id(entity), column: id("Gov"), year }
    }

    #[test]
    fn clean_batch_passes() {
        let batch = BatchSpec {
            metrics: vec![
                annual("funding", "US", YearRef::Latest),
                annual("funding", "China", YearRef::Latest),
                MetricSpec::LeaderRatio {
                    left: Box::new(annual("funding", "US", YearRef::Latest)),
                    right: Box::new(annual("funding", "China", YearRef::Latest)),
                },
            ],
            ..BatchSpec::default()
        };
        let r = validate(&catalog(), &batch);
        assert!(r.pass, "{:?}", r.issues);
        assert!(r.into_result().is_ok());
    }

    #[test]
    fn structural_errors_are_collected_in_order() {
        let ratio = MetricSpec::LeaderRatio {
            left: Box::new(annual("funding", "US", YearRef::Year(2014))),
            right: Box::new(annual("funding", "China", YearRef::Year(2014))),
        };
        let batch = BatchSpec {
            metrics: vec![
                annual("patents", "US", YearRef::Latest),
                annual("funding", "US", YearRef::Year(2014)),
                annual("funding", "US", YearRef::Year(2014)),
                MetricSpec::LeaderRatio { left: Box::new(ratio.clone()), right: Box::new(ratio) },
            ],
            ..BatchSpec::default()
        };
        let r = validate(&catalog(), &batch);
        assert!(!r.pass);
        let codes: Vec<_> = r.errors().map(|i| (i.code, i.metric)).collect();
        assert_eq!(
            codes,
            vec![("unknown_dataset", Some(0)), ("duplicate_key", Some(2)), ("nested_ratio", Some(3))]
        );
        assert!(matches!(r.into_result(), Err(PipelineError::Validate(msg)) if msg.contains("metrics[2] duplicate_key")));
    }

    #[test]
    fn mix_shares_on_both_bases_coexist() {
        let mix = |basis| MetricSpec::MixShare {
            dataset: id("funding"),
            entity: id("US"),
            column: id("Gov"),
            year: YearRef::Year(2014),
            mix: vec![id("Private")],
            basis,
        };
        let share = |peers: Vec<cm_core::EntityId>| MetricSpec::ShareOfTotal {
            dataset: id("funding"),
            entity: id("US"),
            column: id("Gov"),
            year: YearRef::Year(2014),
            peers,
        };
        let batch = BatchSpec {
            metrics: vec![
                mix(ValueBasis::Annual),
                mix(ValueBasis::Cumulative),
                share(vec![id("China")]),
                share(vec![]),
            ],
            ..BatchSpec::default()
        };
        let r = validate(&catalog(), &batch);
        assert!(r.pass, "{:?}", r.issues);

        let again = BatchSpec { metrics: vec![mix(ValueBasis::Annual), mix(ValueBasis::Annual)], ..BatchSpec::default() };
        let codes: Vec<_> = validate(&catalog(), &again).errors().map(|i| i.code).collect();
        assert_eq!(codes, vec!["duplicate_key"]);
    }

    #[test]
    fn unknown_cutoff_dataset_is_only_a_warning() {
        let mut batch = BatchSpec { metrics: vec![annual("funding", "US", YearRef::Latest)], ..BatchSpec::default() };
        batch.as_of.per_dataset.insert(id("patents"), 2023);
        let r = validate(&catalog(), &batch);
        assert!(r.pass);
        assert_eq!(r.issues.len(), 1);
        assert_eq!(r.issues[0].severity, Severity::Warning);
    }
}
