//! Piecewise-linear curves and exponential lag filtering.
//!
//! Every nonlinear empirical relationship in the engine (converter
//! efficiency vs. output current, battery voltage vs. charge state, usable
//! capacity vs. temperature) is a handful of measured points interpolated
//! linearly, with the ends clamped. Governor response, breaker heating and
//! load drift all go through the same first-order exponential lag.

use serde::{Deserialize, Serialize};

/// A piecewise-linear curve over ascending x breakpoints.
///
/// Lookups outside the breakpoint range clamp to the first/last y value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    points: Vec<(f64, f64)>,
}

impl Curve {
    /// Build a curve from `(x, y)` breakpoints. Points are sorted by x;
    /// at least one point is required.
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut points: Vec<(f64, f64)> = points.into_iter().collect();
        assert!(!points.is_empty(), "curve needs at least one point");
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("NaN curve breakpoint"));
        Curve { points }
    }

    /// Constant curve (single breakpoint).
    pub fn constant(y: f64) -> Self {
        Curve::new([(0.0, y)])
    }

    /// Linear interpolation with clamped ends.
    pub fn value(&self, x: f64) -> f64 {
        let pts = &self.points;
        if x <= pts[0].0 {
            return pts[0].1;
        }
        if x >= pts[pts.len() - 1].0 {
            return pts[pts.len() - 1].1;
        }
        for w in pts.windows(2) {
            let (x0, y0) = w[0];
            let (x1, y1) = w[1];
            if x >= x0 && x <= x1 {
                let t = (x - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        // Unreachable for sorted points, but keep the clamp semantics.
        pts[pts.len() - 1].1
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }
}

/// First-order exponential lag: pull `prev` toward `target` with time
/// constant `rate` seconds over a step of `d_t` seconds.
///
/// With `d_t >= rate` the output snaps to the target, so a slow caller can
/// never overshoot.
#[inline]
pub fn filter_in(prev: f64, target: f64, d_t: f64, rate: f64) -> f64 {
    debug_assert!(d_t >= 0.0);
    debug_assert!(rate > 0.0);
    let alpha = (d_t / rate).min(1.0);
    prev + (target - prev) * alpha
}

/// Clamp helper used throughout the physics models.
#[inline]
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    debug_assert!(lo <= hi);
    x.max(lo).min(hi)
}
