// End-to-end runs over fixtures/quantum: manifest → CSV → batch → report → run record.

use std::collections::BTreeMap;
use std::path::PathBuf;

use cm_core::{ComparisonReport, Leader, MetricError, MetricValue, Outcome};
use cm_pipeline::{engine_identifiers, load, run_from_manifest_path, run_with_ctx, PipelineCtx, PipelineError};

const TS: &str = "2025-08-12T10:00:00Z";

fn manifest() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/quantum/manifest.json")
}

fn outcome<'a>(report: &'a ComparisonReport, key: &str) -> &'a Outcome {
    report
        .entries()
        .iter()
        .find(|e| e.key.to_string() == key)
        .map(|e| &e.outcome)
        .unwrap_or_else(|| panic!("no entry {key}"))
}

fn scalar(report: &ComparisonReport, key: &str) -> f64 {
    match outcome(report, key) {
        Outcome::Value(MetricValue::Scalar(v)) => *v,
        other => panic!("{key}: expected a scalar, got {other:?}"),
    }
}

#[test]
fn latest_resolves_once_per_dataset_with_cutoffs() {
    let out = run_from_manifest_path(&manifest(), TS, None).unwrap();
    let r = &out.report;
    assert_eq!(r.latest_for(&"funding".parse().unwrap()).and_then(|l| l.year), Some(2024));
    assert_eq!(r.latest_for(&"patents".parse().unwrap()).and_then(|l| l.year), Some(2023));

    assert_eq!(scalar(r, "annual_value funding/Government_Millions [US] 2024"), 900.0);
    assert_eq!(scalar(r, "annual_value patents/Quantum_Computing [US] 2023"), 340.0);
}

#[test]
fn running_total_matches_declared_cumulative_column() {
    let out = run_from_manifest_path(&manifest(), TS, None).unwrap();
    let summed = scalar(&out.report, "cumulative_total funding/Government_Millions [US] 2024");
    let declared = scalar(&out.report, "cumulative_total funding/Cumulative_Millions [US] 2024");
    assert_eq!(summed, 6020.0);
    assert_eq!(summed, declared);
}

#[test]
fn leaders_are_derived_from_data() {
    let out = run_from_manifest_path(&manifest(), TS, None).unwrap();
    let r = &out.report;

    let Outcome::Value(MetricValue::Ratio(computing)) =
        outcome(r, "leader_ratio(annual_value) patents/Quantum_Computing [US vs China] 2023")
    else {
        panic!("computing ratio missing");
    };
    assert_eq!(computing.leader, Leader::Right);
    assert!((computing.multiple.unwrap() - 465.0 / 340.0).abs() < 1e-12);
    assert_eq!(computing.gap, 125.0);

    let Outcome::Value(MetricValue::Ratio(private)) =
        outcome(r, "leader_ratio(annual_value) funding/Private_Millions [US vs China] 2024")
    else {
        panic!("private ratio missing");
    };
    assert_eq!(private.leader, Leader::Left);
    assert!((private.ratio - 2600.0 / 800.0).abs() < 1e-12);

    let share = scalar(r, "share_of_total patents/Total_Patents [US] 2023 (of China+US)");
    assert!((share - 530.0 / 1986.0).abs() < 1e-12);

    let mix = scalar(r, "mix_share funding/Cumulative_Millions [US] 2024 (cumulative of Cumulative_Millions+Private_Millions)");
    assert!((mix - 6020.0 / (6020.0 + 12700.0)).abs() < 1e-12);
}

#[test]
fn combined_totals_add_government_and_private_money() {
    let out = run_from_manifest_path(&manifest(), TS, None).unwrap();
    let r = &out.report;
    let series = "funding/Cumulative_Millions+Private_Millions";
    assert_eq!(scalar(r, &format!("combined_total {series} [US] 2024 (annual)")), 6020.0 + 2600.0);
    assert_eq!(scalar(r, &format!("combined_total {series} [China] 2024 (annual)")), 17500.0 + 800.0);

    let Outcome::Value(MetricValue::Ratio(overall)) =
        outcome(r, &format!("leader_ratio(combined_total) {series} [US vs China] 2024 (annual)"))
    else {
        panic!("combined ratio missing");
    };
    assert_eq!(overall.leader, Leader::Right);
    assert_eq!(overall.gap, 18300.0 - 8620.0);
    assert!((overall.multiple.unwrap() - 18300.0 / 8620.0).abs() < 1e-12);
}

#[test]
fn one_failure_does_not_stop_the_batch() {
    let out = run_from_manifest_path(&manifest(), TS, None).unwrap();
    let d = out.report.diagnostics();
    assert_eq!(d.evaluated, 30);
    assert_eq!(d.failed, 1);
    assert_eq!(
        outcome(&out.report, "yoy_growth_rate patents/Total_Patents [US] 2014").error(),
        Some(&MetricError::MissingDataPoint {
            entity: "US".parse().unwrap(),
            column: "Total_Patents".parse().unwrap(),
            year: Some(2013),
        })
    );
    assert!(d.failures[0].starts_with("yoy_growth_rate patents/Total_Patents [US] 2014: "));
    assert_eq!(out.run_record.outputs.failed, 1);
}

#[test]
fn evaluation_order_does_not_change_outcomes() {
    let forward = run_from_manifest_path(&manifest(), TS, None).unwrap();

    let mut loaded = load::load(&manifest()).unwrap();
    loaded.batch.metrics.reverse();
    let backward = run_with_ctx(PipelineCtx {
        loaded,
        engine_meta: engine_identifiers(),
        timestamp_utc: TS.into(),
        max_year: None,
    })
    .unwrap();

    let by_key = |r: &ComparisonReport| -> BTreeMap<String, Outcome> {
        r.entries().iter().map(|e| (e.key.to_string(), e.outcome.clone())).collect()
    };
    assert_eq!(by_key(&forward.report), by_key(&backward.report));
    assert_eq!(forward.report.entries()[0].key, backward.report.entries().last().unwrap().key);
}

#[test]
fn ids_are_stable_and_record_inputs() {
    let a = run_from_manifest_path(&manifest(), TS, None).unwrap();
    let b = run_from_manifest_path(&manifest(), TS, None).unwrap();
    assert_eq!(a.report_id, b.report_id);
    assert_eq!(a.run_record.id, b.run_record.id);
    assert_eq!(a.run_record.outputs.report_id, a.report_id);
    assert_eq!(a.run_record.manifest_id.as_deref(), Some("quantum-us-china"));
    assert_eq!(a.run_record.inputs.files.len(), 5);
    assert!(a.run_record.inputs.files.contains_key("patents/china.csv"));
}

#[test]
fn command_line_cutoff_moves_funding_but_not_patents() {
    let out = run_from_manifest_path(&manifest(), TS, Some(2020)).unwrap();
    let r = &out.report;
    assert_eq!(r.latest_for(&"funding".parse().unwrap()).and_then(|l| l.year), Some(2020));
    assert_eq!(r.latest_for(&"patents".parse().unwrap()).and_then(|l| l.year), Some(2023));
    assert_eq!(scalar(r, "annual_value funding/Government_Millions [US] 2020"), 700.0);
    assert_eq!(out.run_record.as_of.max_year, Some(2020));
}

#[test]
fn structural_errors_abort_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let src = manifest();
    let fixtures = src.parent().unwrap();
    for f in ["funding/government.csv", "funding/private.csv", "patents/us.csv", "patents/china.csv", "manifest.json"] {
        let to = dir.path().join(f);
        std::fs::create_dir_all(to.parent().unwrap()).unwrap();
        std::fs::copy(fixtures.join(f), to).unwrap();
    }
    std::fs::write(
        dir.path().join("batch.json"),
        r#"{"metrics": [{"kind": "annual_value", "dataset": "funding_public", "entity": "US",
            "column": "Government_Millions", "year": 2020}]}"#,
    )
    .unwrap();
    let err = run_from_manifest_path(&dir.path().join("manifest.json"), TS, None).unwrap_err();
    assert!(matches!(err, PipelineError::Validate(ref m) if m.contains("unknown_dataset")), "{err}");
}
