//! Piecewise-linear temperature → duty-percent curve.
//!
//! Points are sorted once at construction.  Evaluation clamps to the end
//! points outside the defined range and interpolates linearly inside it.
//! An empty curve (or a NaN input) evaluates to 100 %; running a fan too
//! fast is always preferable to running it too slow.

use serde::{Deserialize, Serialize};

/// Duty returned when the curve cannot produce a meaningful answer.
pub const FAIL_SAFE_PERCENT: f64 = 100.0;

/// A single control point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Temperature in °C.
    pub temp_c: f64,
    /// Fan duty (0-100 %).
    pub percent: f64,
}

impl CurvePoint {
    pub const fn new(temp_c: f64, percent: f64) -> Self {
        Self { temp_c, percent }
    }
}

/// Immutable thermal curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CurvePoint>", into = "Vec<CurvePoint>")]
pub struct ThermalCurve {
    points: Vec<CurvePoint>,
}

impl ThermalCurve {
    pub fn new(mut points: Vec<CurvePoint>) -> Self {
        points.sort_by(|a, b| a.temp_c.total_cmp(&b.temp_c));
        Self { points }
    }

    /// Control points in ascending temperature order.
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Duty percent for `temp_c`.
    pub fn evaluate(&self, temp_c: f64) -> f64 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return FAIL_SAFE_PERCENT;
        };
        if temp_c.is_nan() {
            return FAIL_SAFE_PERCENT;
        }
        if temp_c <= first.temp_c {
            return first.percent;
        }
        if temp_c >= last.temp_c {
            return last.percent;
        }

        for pair in self.points.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if temp_c >= lo.temp_c && temp_c <= hi.temp_c {
                let span = hi.temp_c - lo.temp_c;
                if span == 0.0 {
                    return hi.percent;
                }
                let ratio = (temp_c - lo.temp_c) / span;
                return lo.percent + ratio * (hi.percent - lo.percent);
            }
        }

        FAIL_SAFE_PERCENT
    }
}

impl From<Vec<CurvePoint>> for ThermalCurve {
    fn from(points: Vec<CurvePoint>) -> Self {
        Self::new(points)
    }
}

impl From<ThermalCurve> for Vec<CurvePoint> {
    fn from(curve: ThermalCurve) -> Self {
        curve.points
    }
}
