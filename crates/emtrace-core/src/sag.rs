// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! Battery voltage sag (IR drop) during a window.

use serde::Serialize;

use crate::error::Result;
use crate::trace::TraceWindow;

/// Lowest battery voltage seen in a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoltageSag {
    pub min_voltage: f64,
    pub time_s: f64,
    /// Sample index in the full trace
    pub index: usize,
}

/// Minimum of `column` over `window`; `None` when no finite sample exists.
/// Ties resolve to the earliest sample.
pub fn voltage_sag(window: &TraceWindow<'_>, column: &str) -> Result<Option<VoltageSag>> {
    let voltage = window.column(column)?;
    let time = window.time();

    let lowest = voltage
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
            Some((_, b)) if b <= *v => best,
            Some(_) | None => Some((i, *v)),
        });

    Ok(lowest.map(|(i, min_voltage)| VoltageSag {
        min_voltage,
        time_s: time[i],
        index: window.start_index() + i,
    }))
}

/// Sag of two traces over the same nominal window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SagComparison {
    pub a: Option<VoltageSag>,
    pub b: Option<VoltageSag>,
    /// `min_a − min_b`; positive when trace `b` sags deeper
    pub depth_difference: Option<f64>,
}

pub fn compare_sag(
    a: &TraceWindow<'_>,
    b: &TraceWindow<'_>,
    column: &str,
) -> Result<SagComparison> {
    let a = voltage_sag(a, column)?;
    let b = voltage_sag(b, column)?;
    let depth_difference = a.zip(b).map(|(a, b)| a.min_voltage - b.min_voltage);
    Ok(SagComparison {
        a,
        b,
        depth_difference,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Trace;

    fn trace(time: Vec<f64>, voltage: Vec<f64>) -> Trace {
        Trace::from_columns(
            "test",
            "time",
            vec![("time".to_owned(), time), ("v_batt".to_owned(), voltage)],
        )
        .unwrap()
    }

    #[test]
    fn test_finds_earliest_minimum() {
        let trace = trace(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![3.7, 3.52, f64::NAN, 3.52],
        );
        let sag = voltage_sag(&trace.full(), "v_batt").unwrap().unwrap();
        assert!((sag.min_voltage - 3.52).abs() < f64::EPSILON);
        assert_eq!(sag.index, 1);
        assert!((sag.time_s - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_index_is_relative_to_full_trace() {
        let trace = trace(vec![0.0, 1.0, 2.0, 3.0], vec![3.0, 3.7, 3.6, 3.65]);
        let sag = voltage_sag(&trace.since(1.0), "v_batt").unwrap().unwrap();
        assert_eq!(sag.index, 2);
    }

    #[test]
    fn test_all_absent_is_none() {
        let trace = trace(vec![0.0, 1.0], vec![f64::NAN, f64::NAN]);
        assert_eq!(voltage_sag(&trace.full(), "v_batt").unwrap(), None);
    }

    #[test]
    fn test_depth_difference() {
        let a = trace(vec![0.0, 1.0], vec![3.6, 3.55]);
        let b = trace(vec![0.0, 1.0], vec![3.6, 3.45]);
        let cmp = compare_sag(&a.full(), &b.full(), "v_batt").unwrap();
        assert!((cmp.depth_difference.unwrap() - 0.1).abs() < 1e-9);

        let empty = b.window(5.0, 6.0).unwrap();
        let cmp = compare_sag(&a.full(), &empty, "v_batt").unwrap();
        assert_eq!(cmp.depth_difference, None);
    }
}
