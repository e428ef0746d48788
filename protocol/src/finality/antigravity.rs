//! # Antigravity Curves
//!
//! The antigravity curve maps "how long has this fork been diverging" to
//! "how much more work than the local chain must it carry". At zero elapsed
//! time the answer is 1 (plain heaviest-chain rule); as the fork ages the
//! requirement climbs smoothly to a ceiling, so deep, long-running reorgs
//! become prohibitively expensive while short honest races are unaffected.
//!
//! ## Curves
//!
//! Both curves start at exactly 1, are non-decreasing, and saturate at the
//! configured ceiling:
//!
//! ```text
//! sinusoidal   R(x) = A · sin((x' + 1.5πP) / P) + A + 1,   x' = min(x, πP)
//! exponential  R(x) = 1 + (C - 1) · (1 - e^-(x/S)²)
//! ```
//!
//! with `A = (C - 1) / 2`. The sinusoid is a half wave from trough to crest,
//! held flat once it reaches the crest at `x = πP`. The exponential variant
//! has the same quadratic onset and approaches the ceiling asymptotically.
//!
//! Elapsed time is clamped at zero: a negative or NaN input is treated as a
//! fork that has not diverged at all.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::config::{ANTIGRAVITY_CEILING, EXPONENTIAL_SCALE_SECS, SINUSOID_PERIOD_SECS};

/// Named curve selection, as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    #[default]
    Sinusoidal,
    Exponential,
}

fn clamp_elapsed(elapsed: f64) -> f64 {
    if elapsed.is_nan() || elapsed < 0.0 {
        0.0
    } else {
        elapsed
    }
}

// ---------------------------------------------------------------------------
// Sinusoidal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinusoidalCurve {
    amplitude: f64,
    period: f64,
}

impl SinusoidalCurve {
    pub fn new(ceiling: f64, period: f64) -> Self {
        Self {
            amplitude: (ceiling - 1.0) / 2.0,
            period,
        }
    }

    /// Elapsed seconds at which the curve reaches its ceiling.
    pub fn peak(&self) -> f64 {
        PI * self.period
    }

    pub fn required_ratio(&self, elapsed: f64) -> f64 {
        let x = clamp_elapsed(elapsed).min(self.peak());
        let phase = (x + 1.5 * PI * self.period) / self.period;
        self.amplitude * phase.sin() + self.amplitude + 1.0
    }
}

impl Default for SinusoidalCurve {
    fn default() -> Self {
        Self::new(ANTIGRAVITY_CEILING, SINUSOID_PERIOD_SECS)
    }
}

// ---------------------------------------------------------------------------
// Exponential
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialCurve {
    ceiling: f64,
    scale: f64,
}

impl ExponentialCurve {
    pub fn new(ceiling: f64, scale: f64) -> Self {
        Self { ceiling, scale }
    }

    pub fn required_ratio(&self, elapsed: f64) -> f64 {
        let x = clamp_elapsed(elapsed) / self.scale;
        1.0 + (self.ceiling - 1.0) * (1.0 - (-(x * x)).exp())
    }
}

impl Default for ExponentialCurve {
    fn default() -> Self {
        Self::new(ANTIGRAVITY_CEILING, EXPONENTIAL_SCALE_SECS)
    }
}

// ---------------------------------------------------------------------------
// AntigravityCurve
// ---------------------------------------------------------------------------

/// One of the supported curves behind a single evaluation interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AntigravityCurve {
    Sinusoidal(SinusoidalCurve),
    Exponential(ExponentialCurve),
}

impl AntigravityCurve {
    pub fn from_params(kind: CurveKind, ceiling: f64, period: f64, scale: f64) -> Self {
        match kind {
            CurveKind::Sinusoidal => Self::Sinusoidal(SinusoidalCurve::new(ceiling, period)),
            CurveKind::Exponential => Self::Exponential(ExponentialCurve::new(ceiling, scale)),
        }
    }

    /// The curve of `kind` with default constants.
    pub fn default_for(kind: CurveKind) -> Self {
        match kind {
            CurveKind::Sinusoidal => Self::Sinusoidal(SinusoidalCurve::default()),
            CurveKind::Exponential => Self::Exponential(ExponentialCurve::default()),
        }
    }

    pub fn kind(&self) -> CurveKind {
        match self {
            Self::Sinusoidal(_) => CurveKind::Sinusoidal,
            Self::Exponential(_) => CurveKind::Exponential,
        }
    }

    /// Minimum TD ratio for a fork that has been diverging for `elapsed`
    /// seconds.
    pub fn required_ratio(&self, elapsed: f64) -> f64 {
        match self {
            Self::Sinusoidal(curve) => curve.required_ratio(elapsed),
            Self::Exponential(curve) => curve.required_ratio(elapsed),
        }
    }
}

impl Default for AntigravityCurve {
    fn default() -> Self {
        Self::default_for(CurveKind::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KINDS: [CurveKind; 2] = [CurveKind::Sinusoidal, CurveKind::Exponential];

    #[test]
    fn starts_at_one() {
        for kind in KINDS {
            let curve = AntigravityCurve::default_for(kind);
            assert!((curve.required_ratio(0.0) - 1.0).abs() < 1e-9, "{kind:?}");
        }
    }

    #[test]
    fn reaches_ceiling_after_seven_hours() {
        for kind in KINDS {
            let curve = AntigravityCurve::default_for(kind);
            assert!((curve.required_ratio(25_132.0) - 31.0).abs() < 1e-6, "{kind:?}");
        }
    }

    #[test]
    fn sinusoid_holds_at_crest() {
        let curve = SinusoidalCurve::default();
        let peak = curve.required_ratio(curve.peak());
        assert!((peak - 31.0).abs() < 1e-9);
        assert_eq!(curve.required_ratio(curve.peak() * 3.0), peak);
    }

    #[test]
    fn negative_and_nan_elapsed_clamp_to_zero() {
        for kind in KINDS {
            let curve = AntigravityCurve::default_for(kind);
            let base = curve.required_ratio(0.0);
            assert_eq!(curve.required_ratio(-600.0), base);
            assert_eq!(curve.required_ratio(f64::NAN), base);
        }
    }

    #[test]
    fn infinite_elapsed_hits_ceiling() {
        for kind in KINDS {
            let curve = AntigravityCurve::default_for(kind);
            assert!((curve.required_ratio(f64::INFINITY) - 31.0).abs() < 1e-9);
        }
    }

    #[test]
    fn short_forks_need_little_extra_work() {
        // One block interval of divergence costs well under a tenth of a percent.
        for kind in KINDS {
            let curve = AntigravityCurve::default_for(kind);
            assert!(curve.required_ratio(10.0) < 1.001, "{kind:?}");
            assert!(curve.required_ratio(10.0) > 1.0, "{kind:?}");
        }
    }

    #[test]
    fn custom_ceiling_is_respected() {
        let curve = AntigravityCurve::from_params(CurveKind::Exponential, 5.0, 1500.0, 600.0);
        assert!((curve.required_ratio(1e6) - 5.0).abs() < 1e-9);
        assert_eq!(curve.kind(), CurveKind::Exponential);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&CurveKind::Exponential).unwrap();
        assert_eq!(json, "\"exponential\"");
    }

    proptest! {
        #[test]
        fn curves_are_monotone(a in 0.0f64..50_000.0, b in 0.0f64..50_000.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            for kind in KINDS {
                let curve = AntigravityCurve::default_for(kind);
                prop_assert!(curve.required_ratio(lo) <= curve.required_ratio(hi) + 1e-12);
            }
        }

        #[test]
        fn curves_are_bounded(x in -1e7f64..1e7) {
            for kind in KINDS {
                let r = AntigravityCurve::default_for(kind).required_ratio(x);
                prop_assert!(r >= 1.0 - 1e-12);
                prop_assert!(r <= 31.0 + 1e-9);
            }
        }
    }
}
