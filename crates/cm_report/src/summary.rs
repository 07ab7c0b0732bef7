//! Plain-text summary (`summary.txt`).

use core::fmt::Write as _;

use crate::model::{ReportModel, Row};

pub fn render_text(m: &ReportModel) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_text(&mut out, m);
    out
}

fn write_text(out: &mut String, m: &ReportModel) -> core::fmt::Result {
    writeln!(out, "{}", m.title)?;
    writeln!(out, "{}", "=".repeat(m.title.chars().count()))?;
    writeln!(out, "report  {}", m.ids.report_id)?;
    if let Some(run) = &m.ids.run_id {
        writeln!(out, "run     {run}")?;
    }
    if let Some(engine) = &m.ids.engine {
        writeln!(out, "engine  {engine}")?;
    }

    if !m.latest.is_empty() {
        writeln!(out)?;
        writeln!(out, "Latest year per dataset")?;
        for l in &m.latest {
            writeln!(out, "  {:<12} {} (cut-off {})", l.dataset, l.year, l.cutoff)?;
        }
    }

    for s in &m.sections {
        writeln!(out)?;
        writeln!(out, "{}", s.heading)?;
        let w_subject = width(&s.rows, |r| &r.subject);
        let w_series = width(&s.rows, |r| &r.series);
        let w_period = width(&s.rows, |r| &r.period);
        for r in &s.rows {
            write!(out, "  {:<w_subject$}  {:<w_series$}  {:<w_period$}  {}", r.subject, r.series, r.period, r.value)?;
            match &r.detail {
                Some(d) => writeln!(out, "  [{d}]")?,
                None => writeln!(out)?,
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "{} metrics evaluated, {} unavailable", m.evaluated, m.failed)?;
    for f in &m.failures {
        writeln!(out, "  - {f}")?;
    }
    Ok(())
}

fn width(rows: &[Row], field: impl Fn(&Row) -> &String) -> usize {
    rows.iter().map(|r| field(r).chars().count()).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{build_model, tests::{sample, RPT}};
    use crate::ArtifactIds;

    #[test]
    fn summary_lists_values_and_failures() {
        let m = build_model(&sample(), &ArtifactIds { report_id: RPT.into(), ..Default::default() }).unwrap();
        let text = render_text(&m);

        assert!(text.starts_with("Quantum patents\n===============\n"));
        assert!(text.contains("Latest year per dataset\n  patents      2023 (cut-off 2023)\n"));
        assert!(text.contains("China  patents/Total_Patents  2023  1,456\n"));
        assert!(text.contains("China leads 1.37x (gap 125)  [340 vs 465]"));
        assert!(text.contains("5 metrics evaluated, 1 unavailable"));
        assert!(text.contains("n/a (")); // failed yoy row
        assert!(!text.contains("NaN"));
    }
}
