//! Value formatting shared by every renderer.
//!
//! Rates (growth, shares) are fractions rendered as one-decimal percentages;
//! counts and amounts get thousands separators; ratios read as
//! "<leader> leads <multiple>x". A failed metric is always `n/a (<reason>)`.

use cm_core::{Leader, MetricError, MetricKind, MetricValue, RatioValue};

/// `0.1234` → `12.3%`; sign kept for negative growth.
pub fn percent_1dp(x: f64) -> String {
    if !x.is_finite() {
        return "n/a".to_string();
    }
    // half away from zero at one decimal of the percentage
    let scaled = (x * 1000.0).round() / 10.0;
    if scaled == 0.0 {
        return "0.0%".to_string();
    }
    format!("{scaled:.1}%")
}

/// Percentage points between two fractions, e.g. a gap between growth rates.
pub fn points_1dp(x: f64) -> String {
    if !x.is_finite() {
        return "n/a".to_string();
    }
    format!("{:.1} pp", x * 100.0)
}

pub fn multiple(x: f64) -> String {
    format!("{x:.2}x")
}

/// Thousands separators; integers keep no decimals, others keep two.
pub fn number(x: f64) -> String {
    if !x.is_finite() {
        return "n/a".to_string();
    }
    let neg = x < 0.0;
    let raw = if x.fract() == 0.0 && x.abs() < 1e15 { format!("{:.0}", x.abs()) } else { format!("{:.2}", x.abs()) };
    let (int, frac) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw.as_str(), None),
    };

    let mut out = String::with_capacity(raw.len() + raw.len() / 3 + 1);
    if neg {
        out.push('-');
    }
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(f) = frac {
        out.push('.');
        out.push_str(f);
    }
    out
}

pub fn unavailable(err: &MetricError) -> String {
    format!("n/a ({err})")
}

/// One value of the given kind. `operand` is the operand kind of a ratio.
pub fn value(kind: MetricKind, operand: Option<MetricKind>, v: &MetricValue, names: (&str, &str)) -> String {
    match v {
        MetricValue::Scalar(x) if kind.is_rate() => percent_1dp(*x),
        MetricValue::Scalar(x) => number(*x),
        MetricValue::Ratio(r) => ratio(r, operand.is_some_and(MetricKind::is_rate), names),
    }
}

/// Operand values side by side: `340 vs 465`.
pub fn operands(r: &RatioValue, rate: bool) -> String {
    let f = |x: f64| if rate { percent_1dp(x) } else { number(x) };
    format!("{} vs {}", f(r.left), f(r.right))
}

pub fn ratio(r: &RatioValue, rate: bool, (left, right): (&str, &str)) -> String {
    let gap = if rate { points_1dp(r.gap) } else { number(r.gap) };
    let (leader, other) = match r.leader {
        Leader::Tie => return "tie".to_string(),
        Leader::Left => (left, right),
        Leader::Right => (right, left),
    };
    match r.multiple {
        Some(m) => format!("{leader} leads {} (gap {gap})", multiple(m)),
        None => format!("{leader} leads ({other} is 0)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percents_keep_sign() {
        assert_eq!(percent_1dp(0.1234), "12.3%");
        assert_eq!(percent_1dp(-0.1), "-10.0%");
        assert_eq!(percent_1dp(0.1256), "12.6%");
        assert_eq!(percent_1dp(-0.0001), "0.0%");
        assert_eq!(percent_1dp(f64::NAN), "n/a");
    }

    #[test]
    fn numbers_are_grouped() {
        assert_eq!(number(6020.0), "6,020");
        assert_eq!(number(17500.0), "17,500");
        assert_eq!(number(900.0), "900");
        assert_eq!(number(-1234567.5), "-1,234,567.50");
        assert_eq!(number(65.1), "65.10");
    }

    #[test]
    fn ratios_name_the_leader() {
        let r = RatioValue { left: 340.0, right: 465.0, ratio: 340.0 / 465.0, leader: Leader::Right, multiple: Some(465.0 / 340.0), gap: 125.0 };
        assert_eq!(ratio(&r, false, ("US", "China")), "China leads 1.37x (gap 125)");
        assert_eq!(operands(&r, false), "340 vs 465");

        let g = RatioValue { left: 0.1, right: 0.6, ratio: 1.0 / 6.0, leader: Leader::Right, multiple: Some(6.0), gap: 0.5 };
        assert_eq!(ratio(&g, true, ("US", "China")), "China leads 6.00x (gap 50.0 pp)");

        let z = RatioValue { left: 5.0, right: 0.0, ratio: f64::INFINITY, leader: Leader::Left, multiple: None, gap: 5.0 };
        assert_eq!(ratio(&z, false, ("US", "China")), "US leads (China is 0)");
    }

    #[test]
    fn failures_read_as_not_available() {
        assert_eq!(unavailable(&MetricError::UndefinedRatio), format!("n/a ({})", MetricError::UndefinedRatio));
    }
}
