// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! Battery lifetime (time to depletion) from the state-of-charge column.
//!
//! Two thresholds are used: the final sample's SOC decides whether the trace
//! ended depleted, and the first sample at or below the lower crossing
//! threshold marks when depletion happened. The last sample near zero SOC is
//! noisy and not a reliable instant on its own.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LifetimeConfig;
use crate::error::{Result, TraceError};
use crate::trace::{SECONDS_PER_DAY, Trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifetimeStatus {
    Alive,
    Depleted,
}

/// First sample at or below the crossing threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepletionCrossing {
    /// Sample index in the full trace
    pub index: usize,
    pub time_s: f64,
    pub soc: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LifetimeReport {
    pub status: LifetimeStatus,
    /// Time to depletion, or the final sample's time when alive (s)
    pub lifetime_s: f64,
    /// SOC of the last sample with a present SOC value
    pub final_soc: f64,
    /// Time of the last sample in the window
    pub final_time_s: f64,
    /// Present only when depleted and a crossing sample exists
    pub crossing: Option<DepletionCrossing>,
}

impl LifetimeReport {
    #[must_use]
    pub fn lifetime_days(&self) -> f64 {
        self.lifetime_s / SECONDS_PER_DAY
    }
}

/// Estimate battery lifetime from `soc_column` of `trace`
pub fn estimate_lifetime(
    trace: &Trace,
    soc_column: &str,
    config: &LifetimeConfig,
) -> Result<LifetimeReport> {
    let window = match config.warmup_s {
        Some(warmup) => trace.since(warmup),
        None => trace.full(),
    };
    let soc = window.column(soc_column)?;
    let time = window.time();
    let offset = window.start_index();

    let empty = || TraceError::Empty {
        context: format!(
            "{}: no '{soc_column}' samples after the {:?} s warm-up",
            trace.source_name(),
            config.warmup_s.unwrap_or(0.0)
        ),
    };
    let final_time_s = *time.last().ok_or_else(empty)?;
    // Absent SOC cells cannot decide the terminal state
    let last = soc.iter().rposition(|s| s.is_finite()).ok_or_else(empty)?;
    let final_soc = soc[last];

    if final_soc > config.depleted_threshold {
        info!(
            source = trace.source_name(),
            final_soc,
            lifetime_days = final_time_s / SECONDS_PER_DAY,
            "battery alive at end of trace"
        );
        return Ok(LifetimeReport {
            status: LifetimeStatus::Alive,
            lifetime_s: final_time_s,
            final_soc,
            final_time_s,
            crossing: None,
        });
    }

    let crossing = soc
        .iter()
        .position(|s| *s <= config.crossing_threshold)
        .map(|i| DepletionCrossing {
            index: offset + i,
            time_s: time[i],
            soc: soc[i],
        });

    let lifetime_s = if let Some(crossing) = crossing {
        crossing.time_s
    } else {
        warn!(
            source = trace.source_name(),
            final_soc,
            crossing_threshold = config.crossing_threshold,
            "depleted trace never crosses the crossing threshold, using final sample time"
        );
        final_time_s
    };

    info!(
        source = trace.source_name(),
        final_soc,
        lifetime_days = lifetime_s / SECONDS_PER_DAY,
        "battery depleted"
    );

    Ok(LifetimeReport {
        status: LifetimeStatus::Depleted,
        lifetime_s,
        final_soc,
        final_time_s,
        crossing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(time: Vec<f64>, soc: Vec<f64>) -> Trace {
        Trace::from_columns(
            "test",
            "time",
            vec![("time".to_owned(), time), ("soc".to_owned(), soc)],
        )
        .unwrap()
    }

    #[test]
    fn test_alive_when_final_soc_above_threshold() {
        let trace = trace(vec![0.0, 20.0, 40.0], vec![0.5, 0.1, 0.02]);
        let report = estimate_lifetime(&trace, "soc", &LifetimeConfig::default()).unwrap();
        assert_eq!(report.status, LifetimeStatus::Alive);
        assert!((report.lifetime_s - 40.0).abs() < f64::EPSILON);
        assert_eq!(report.crossing, None);
    }

    #[test]
    fn test_depleted_uses_first_crossing() {
        let trace = trace(
            vec![0.0, 20.0, 40.0, 60.0, 80.0],
            vec![0.5, 0.1, 0.01, 0.012, 0.005],
        );
        let report = estimate_lifetime(&trace, "soc", &LifetimeConfig::default()).unwrap();
        assert_eq!(report.status, LifetimeStatus::Depleted);
        assert!((report.lifetime_s - 40.0).abs() < f64::EPSILON);
        let crossing = report.crossing.unwrap();
        assert_eq!(crossing.index, 2);
        assert!((report.final_soc - 0.005).abs() < f64::EPSILON);
    }

    #[test]
    fn test_depleted_without_crossing_falls_back_to_final_time() {
        let trace = trace(vec![0.0, 20.0, 40.0], vec![0.5, 0.2, 0.014]);
        let report = estimate_lifetime(&trace, "soc", &LifetimeConfig::default()).unwrap();
        assert_eq!(report.status, LifetimeStatus::Depleted);
        assert_eq!(report.crossing, None);
        assert!((report.lifetime_s - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_warmup_excludes_startup_transient() {
        // A startup dip below the crossing threshold before t = 10 s is ignored
        let trace = trace(vec![0.0, 5.0, 10.0, 20.0, 30.0], vec![0.0, 0.5, 0.4, 0.01, 0.0]);
        let report = estimate_lifetime(&trace, "soc", &LifetimeConfig::default()).unwrap();
        let crossing = report.crossing.unwrap();
        assert_eq!(crossing.index, 3);
        assert!((report.lifetime_s - 20.0).abs() < f64::EPSILON);

        let no_warmup = LifetimeConfig {
            warmup_s: None,
            ..LifetimeConfig::default()
        };
        let report = estimate_lifetime(&trace, "soc", &no_warmup).unwrap();
        assert!(report.lifetime_s.abs() < f64::EPSILON);
    }

    #[test]
    fn test_everything_filtered_is_empty_error() {
        let trace = trace(vec![0.0, 5.0], vec![0.5, 0.4]);
        let err = estimate_lifetime(&trace, "soc", &LifetimeConfig::default()).unwrap_err();
        assert!(matches!(err, TraceError::Empty { .. }));
    }

    #[test]
    fn test_trailing_absent_soc_keeps_final_sample_time() {
        let trace = trace(vec![10.0, 20.0, 30.0], vec![0.5, 0.3, f64::NAN]);
        let report = estimate_lifetime(&trace, "soc", &LifetimeConfig::default()).unwrap();
        assert_eq!(report.status, LifetimeStatus::Alive);
        assert!((report.final_time_s - 30.0).abs() < f64::EPSILON);
        assert!((report.lifetime_s - 30.0).abs() < f64::EPSILON);
        assert!((report.final_soc - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_soc_absent_is_empty_error() {
        let trace = trace(vec![10.0, 20.0], vec![f64::NAN, f64::NAN]);
        let err = estimate_lifetime(&trace, "soc", &LifetimeConfig::default()).unwrap_err();
        assert!(matches!(err, TraceError::Empty { .. }));
    }

    #[test]
    fn test_lifetime_days() {
        let trace = trace(vec![10.0, 172_800.0], vec![0.9, 0.8]);
        let report = estimate_lifetime(&trace, "soc", &LifetimeConfig::default()).unwrap();
        assert!((report.lifetime_days() - 2.0).abs() < f64::EPSILON);
    }
}
