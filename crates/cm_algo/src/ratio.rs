//! Leader ratio between two already evaluated values.
//!
//! The comparison is symmetric: the leader is whichever side has the larger
//! magnitude, decided from the numbers. Swapping the operands yields the
//! reciprocal ratio, the opposite leader, the same multiple and the same gap.

use core::cmp::Ordering;

use cm_core::{Leader, MetricError, RatioValue};

pub fn leader_ratio(left: f64, right: f64) -> Result<RatioValue, MetricError> {
    if right == 0.0 {
        return Err(MetricError::UndefinedRatio);
    }
    let ratio = left / right;
    let gap = (left - right).abs();
    if !ratio.is_finite() || !gap.is_finite() {
        return Err(MetricError::UndefinedRatio);
    }

    let (l, r) = (left.abs(), right.abs());
    let leader = match l.partial_cmp(&r) {
        Some(Ordering::Greater) => Leader::Left,
        Some(Ordering::Less) => Leader::Right,
        _ => Leader::Tie,
    };
    let (big, small) = if l >= r { (l, r) } else { (r, l) };
    let multiple = if small == 0.0 { None } else { Some(big / small).filter(|m| m.is_finite()) };

    Ok(RatioValue { left, right, ratio, leader, multiple, gap })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leader_comes_from_the_data() {
        let us_ahead = leader_ratio(110.0, 80.0).unwrap();
        assert_eq!(us_ahead.leader, Leader::Left);
        assert!((us_ahead.ratio - 1.375).abs() < 1e-12);
        assert_eq!(us_ahead.gap, 30.0);

        let china_ahead = leader_ratio(0.10, 0.60).unwrap();
        assert_eq!(china_ahead.leader, Leader::Right);
        assert!((china_ahead.multiple.unwrap() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn zero_denominator_and_zero_numerator() {
        assert_eq!(leader_ratio(5.0, 0.0), Err(MetricError::UndefinedRatio));
        let r = leader_ratio(0.0, 5.0).unwrap();
        assert_eq!(r.leader, Leader::Right);
        assert_eq!(r.ratio, 0.0);
        assert_eq!(r.multiple, None);
    }

    #[test]
    fn ties_and_overflow() {
        let t = leader_ratio(-3.0, 3.0).unwrap();
        assert_eq!(t.leader, Leader::Tie);
        assert_eq!(t.multiple, Some(1.0));
        assert_eq!(leader_ratio(f64::MAX, f64::MIN_POSITIVE), Err(MetricError::UndefinedRatio));
    }
}
