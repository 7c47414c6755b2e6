// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! Net charge over a window by trapezoidal integration, and the comparison of
//! two traces recorded under different scheduling policies.

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::trace::{SECONDS_PER_HOUR, TraceWindow};

/// Net charge transferred over a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Charge {
    /// Current unit × seconds (mA·s for simulator traces)
    pub native: f64,
    /// Current unit × hours (mAh)
    pub per_hour: f64,
    /// Samples the integral was taken over
    pub samples: usize,
}

impl Charge {
    fn from_native(native: f64, samples: usize) -> Self {
        Self {
            native,
            per_hour: native / SECONDS_PER_HOUR,
            samples,
        }
    }
}

/// Trapezoidal integral of `values` over `time`.
///
/// Intervals with an absent endpoint contribute nothing. Fewer than two
/// samples integrate to zero.
#[must_use]
pub fn trapezoid(time: &[f64], values: &[f64]) -> f64 {
    time.windows(2)
        .zip(values.windows(2))
        .filter(|(_, y)| y[0].is_finite() && y[1].is_finite())
        .map(|(t, y)| 0.5 * (y[0] + y[1]) * (t[1] - t[0]))
        .sum()
}

/// Net charge of `column` over `window`
pub fn integrate_charge(window: &TraceWindow<'_>, column: &str) -> Result<Charge> {
    let values = window.column(column)?;
    let time = window.time();
    let native = trapezoid(time, values);

    debug!(
        source = window.trace().source_name(),
        column,
        samples = window.len(),
        native,
        "integrated charge"
    );
    Ok(Charge::from_native(native, window.len()))
}

/// Charges of two traces over the same nominal window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChargeComparison {
    pub a: Charge,
    pub b: Charge,
    /// `|Qa − Qb| / mean(Qa, Qb) × 100`; `None` when the mean is zero
    pub difference_percent: Option<f64>,
}

impl ChargeComparison {
    #[must_use]
    pub fn new(a: Charge, b: Charge) -> Self {
        let mean = (a.native + b.native) / 2.0;
        let difference_percent =
            (mean != 0.0).then(|| (a.native - b.native).abs() / mean * 100.0);
        Self {
            a,
            b,
            difference_percent,
        }
    }
}

/// Integrate the same column over two windows and compare the results
pub fn compare_charge(
    a: &TraceWindow<'_>,
    b: &TraceWindow<'_>,
    column: &str,
) -> Result<ChargeComparison> {
    Ok(ChargeComparison::new(
        integrate_charge(a, column)?,
        integrate_charge(b, column)?,
    ))
}
