//! Discounting metrics over annual cash-flow vectors.
//!
//! Cash-flow vectors are indexed by project year: index 0 is the
//! investment year (undiscounted), index `y` is discounted by `(1 + r)^y`.

use serde::{Deserialize, Serialize};

/// Lower bound of the IRR search bracket.
pub const IRR_LOWER: f64 = -0.99;
/// Upper bound of the IRR search bracket.
pub const IRR_UPPER: f64 = 10.0;
const IRR_TOLERANCE: f64 = 1e-9;
const IRR_MAX_ITERATIONS: usize = 200;

/// Internal rate of return, or the reason none exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Irr {
    Defined { rate: f64 },
    Undefined { reason: String },
}

impl Irr {
    pub fn rate(&self) -> Option<f64> {
        match self {
            Irr::Defined { rate } => Some(*rate),
            Irr::Undefined { .. } => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Irr::Defined { .. })
    }
}

/// Net present value at `rate`.
pub fn npv(cash_flows: &[f64], rate: f64) -> f64 {
    cash_flows
        .iter()
        .enumerate()
        .map(|(y, cf)| cf / (1.0 + rate).powi(y as i32))
        .sum()
}

/// Root of `npv(cash_flows, r) = 0` by bisection over
/// [`IRR_LOWER`, `IRR_UPPER`].
///
/// Returns [`Irr::Undefined`] when the flows never change sign or the NPV
/// does not change sign across the bracket.
pub fn irr(cash_flows: &[f64]) -> Irr {
    let has_positive = cash_flows.iter().any(|cf| *cf > 0.0);
    let has_negative = cash_flows.iter().any(|cf| *cf < 0.0);
    if !has_positive {
        return Irr::Undefined {
            reason: "cash flows are never positive".into(),
        };
    }
    if !has_negative {
        return Irr::Undefined {
            reason: "no investment to recover".into(),
        };
    }

    let mut lo = IRR_LOWER;
    let mut hi = IRR_UPPER;
    let mut f_lo = npv(cash_flows, lo);
    let f_hi = npv(cash_flows, hi);
    if !f_lo.is_finite() || !f_hi.is_finite() || f_lo.signum() == f_hi.signum() {
        return Irr::Undefined {
            reason: format!("NPV does not change sign between {IRR_LOWER} and {IRR_UPPER}"),
        };
    }

    for _ in 0..IRR_MAX_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        let f_mid = npv(cash_flows, mid);
        if f_mid == 0.0 || (hi - lo) < IRR_TOLERANCE {
            return Irr::Defined { rate: mid };
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Irr::Defined {
        rate: 0.5 * (lo + hi),
    }
}

/// Years until cumulative flows turn non-negative, interpolated within the
/// crossing year. `None` if they never do, or if there is no initial
/// investment to pay back.
pub fn payback_years(cash_flows: &[f64]) -> Option<f64> {
    let mut cumulative = *cash_flows.first()?;
    if cumulative >= 0.0 {
        return None;
    }
    for (y, cf) in cash_flows.iter().enumerate().skip(1) {
        let next = cumulative + cf;
        if next >= 0.0 && *cf > 0.0 {
            return Some((y - 1) as f64 + (-cumulative) / cf);
        }
        cumulative = next;
    }
    None
}

/// Payback on flows discounted at `rate`.
pub fn discounted_payback_years(cash_flows: &[f64], rate: f64) -> Option<f64> {
    let discounted: Vec<f64> = cash_flows
        .iter()
        .enumerate()
        .map(|(y, cf)| cf / (1.0 + rate).powi(y as i32))
        .collect();
    payback_years(&discounted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npv_of_single_flow() {
        assert!((npv(&[-100.0, 110.0], 0.1)).abs() < 1e-9);
    }

    #[test]
    fn irr_recovers_known_rate() {
        let flows = [-1000.0, 300.0, 400.0, 500.0];
        let rate = irr(&flows).rate().expect("defined");
        assert!(npv(&flows, rate).abs() < 1e-4);
        assert!((rate - 0.0889633947).abs() < 1e-6);
    }

    #[test]
    fn always_negative_flows_have_no_irr() {
        let out = irr(&[-1000.0, -10.0, -10.0]);
        assert!(!out.is_defined());
    }

    #[test]
    fn payback_interpolates_within_year() {
        let flows = [-1000.0, 400.0, 400.0, 400.0];
        assert_eq!(payback_years(&flows), Some(2.5));
        assert_eq!(payback_years(&[-1000.0, 100.0]), None);
        assert_eq!(payback_years(&[]), None);
    }

    #[test]
    fn no_investment_has_no_payback() {
        assert_eq!(payback_years(&[0.0, 0.0, 0.0]), None);
        assert_eq!(payback_years(&[0.0, 50.0]), None);
        assert_eq!(discounted_payback_years(&[0.0, 50.0], 0.05), None);
    }

    #[test]
    fn discounting_delays_payback() {
        let flows = [-1000.0, 400.0, 400.0, 400.0, 400.0];
        let simple = payback_years(&flows).expect("pays back");
        let discounted = discounted_payback_years(&flows, 0.08).expect("pays back");
        assert!(discounted > simple);
    }
}
