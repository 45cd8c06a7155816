//! Two-sided CUSUM filter.
//!
//! up[i]   = max(0, up[i-1] + r[i])
//! down[i] = min(0, down[i-1] + r[i])
//! Fires when up >= threshold or down <= -threshold.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::CusumError;
use crate::domain::observation::Observation;

/// What to do when the previous close is zero and the return is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroClosePolicy {
    #[default]
    Fail,
    TreatAsZero,
}

impl FromStr for ZeroClosePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(ZeroClosePolicy::Fail),
            "zero" => Ok(ZeroClosePolicy::TreatAsZero),
            other => Err(format!("unknown zero_close policy '{other}' (expected fail or zero)")),
        }
    }
}

impl fmt::Display for ZeroClosePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZeroClosePolicy::Fail => write!(f, "fail"),
            ZeroClosePolicy::TreatAsZero => write!(f, "zero"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CusumConfig {
    /// Fractional return magnitude, e.g. 0.005 for 0.5%.
    pub threshold: f64,
    pub zero_close: ZeroClosePolicy,
}

impl CusumConfig {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            zero_close: ZeroClosePolicy::default(),
        }
    }

    pub fn with_zero_close(mut self, policy: ZeroClosePolicy) -> Self {
        self.zero_close = policy;
        self
    }

    /// Return from `prev` to `curr` (observation `index`) under the zero-close policy.
    ///
    /// A NaN or infinite return is an error: folding it into the filter would
    /// clamp both sums to zero without a trigger.
    pub fn step_return(
        &self,
        prev: &Observation,
        curr: &Observation,
        index: usize,
    ) -> Result<f64, CusumError> {
        let ret = match (curr.simple_return(prev.close), self.zero_close) {
            (Some(ret), _) => ret,
            (None, ZeroClosePolicy::TreatAsZero) => 0.0,
            (None, ZeroClosePolicy::Fail) => return Err(CusumError::ZeroPreviousClose { index }),
        };
        if !ret.is_finite() {
            return Err(CusumError::NonFiniteReturn { index });
        }
        Ok(ret)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CusumFilter {
    up: f64,
    down: f64,
}

impl CusumFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one return into both sums and report whether the filter fired.
    /// Does not reset; the caller decides when a trigger is consumed.
    pub fn update(&mut self, ret: f64, threshold: f64) -> bool {
        self.up = (self.up + ret).max(0.0);
        self.down = (self.down + ret).min(0.0);
        self.up >= threshold || self.down <= -threshold
    }

    pub fn reset(&mut self) {
        self.up = 0.0;
        self.down = 0.0;
    }

    pub fn up(&self) -> f64 {
        self.up
    }

    pub fn down(&self) -> f64 {
        self.down
    }

    /// Any drift left since the last reset.
    pub fn has_residual(&self) -> bool {
        self.up > 0.0 || self.down < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn obs(close: f64) -> Observation {
        Observation {
            open_time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    #[test]
    fn up_side_fires_at_threshold() {
        let mut f = CusumFilter::new();
        assert!(!f.update(0.003, 0.005));
        assert!(f.update(0.002, 0.005));
        assert_relative_eq!(f.up(), 0.005, epsilon = 1e-12);
        assert_eq!(f.down(), 0.0);
    }

    #[test]
    fn down_side_fires_at_negative_threshold() {
        let mut f = CusumFilter::new();
        assert!(!f.update(-0.004, 0.005));
        assert!(f.update(-0.002, 0.005));
        assert_relative_eq!(f.down(), -0.006, epsilon = 1e-12);
        assert_eq!(f.up(), 0.0);
    }

    #[test]
    fn negative_return_only_erodes_up_sum() {
        let mut f = CusumFilter::new();
        f.update(0.004, 0.01);
        f.update(-0.001, 0.01);
        // 0.004 - 0.001 stays positive, not clamped to zero
        assert_relative_eq!(f.up(), 0.003, epsilon = 1e-12);
        assert_relative_eq!(f.down(), -0.001, epsilon = 1e-12);

        f.update(-0.005, 0.01);
        assert_eq!(f.up(), 0.0);
        assert_relative_eq!(f.down(), -0.006, epsilon = 1e-12);
    }

    #[test]
    fn reset_clears_residual() {
        let mut f = CusumFilter::new();
        f.update(0.002, 0.01);
        assert!(f.has_residual());
        f.reset();
        assert!(!f.has_residual());
        assert_eq!(f, CusumFilter::new());
    }

    #[test]
    fn zero_return_leaves_no_residual() {
        let mut f = CusumFilter::new();
        assert!(!f.update(0.0, 0.005));
        assert!(!f.has_residual());
    }

    #[test]
    fn step_return_fails_on_zero_close_by_default() {
        let cfg = CusumConfig::new(0.005);
        let err = cfg.step_return(&obs(0.0), &obs(1.0), 7).unwrap_err();
        assert!(matches!(err, CusumError::ZeroPreviousClose { index: 7 }));
    }

    #[test]
    fn step_return_rejects_non_finite_prices() {
        let cfg = CusumConfig::new(0.005).with_zero_close(ZeroClosePolicy::TreatAsZero);
        for (prev, curr) in [(100.0, f64::NAN), (f64::NAN, 100.0), (100.0, f64::INFINITY)] {
            let err = cfg.step_return(&obs(prev), &obs(curr), 3).unwrap_err();
            assert!(matches!(err, CusumError::NonFiniteReturn { index: 3 }));
        }
    }

    #[test]
    fn step_return_treats_zero_close_as_flat_when_configured() {
        let cfg = CusumConfig::new(0.005).with_zero_close(ZeroClosePolicy::TreatAsZero);
        assert_eq!(cfg.step_return(&obs(0.0), &obs(1.0), 7).unwrap(), 0.0);
        assert_relative_eq!(
            cfg.step_return(&obs(100.0), &obs(101.0), 8).unwrap(),
            0.01,
            epsilon = 1e-12
        );
    }

    #[test]
    fn zero_close_policy_parses() {
        assert_eq!("fail".parse(), Ok(ZeroClosePolicy::Fail));
        assert_eq!(" Zero ".parse(), Ok(ZeroClosePolicy::TreatAsZero));
        assert!("skip".parse::<ZeroClosePolicy>().is_err());
        assert_eq!(ZeroClosePolicy::TreatAsZero.to_string(), "zero");
    }
}
