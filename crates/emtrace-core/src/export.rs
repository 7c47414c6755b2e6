// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! CSV export of per-sample derived quantities.
//!
//! Absent values are written as empty cells so downstream plotting tools can
//! tell a missing efficiency from a zero one.

use std::io::Write;

use serde::Serialize;
use tracing::debug;

use crate::derived::{BatteryPhase, Daylight, DerivedSample};
use crate::error::Result;

/// One CSV row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedRecord {
    pub index: usize,
    pub time_s: f64,
    pub load_current: Option<f64>,
    pub load_power: Option<f64>,
    pub pv_output_power: Option<f64>,
    pub pv_input_power: Option<f64>,
    pub battery_power: Option<f64>,
    pub daylight: Option<Daylight>,
    pub battery_phase: Option<BatteryPhase>,
    pub pv_efficiency: Option<f64>,
    pub discharge_efficiency: Option<f64>,
    pub charge_efficiency: Option<f64>,
    pub discarded: bool,
}

impl From<&DerivedSample> for DerivedRecord {
    fn from(sample: &DerivedSample) -> Self {
        let q = sample.quantities.as_ref();
        let efficiencies = [
            sample.pv_efficiency(),
            sample.discharge_efficiency(),
            sample.charge_efficiency(),
        ];
        Self {
            index: sample.index,
            time_s: sample.time_s,
            load_current: q.map(|q| q.load_current),
            load_power: q.map(|q| q.load_power),
            pv_output_power: q.map(|q| q.pv_output_power),
            pv_input_power: q.map(|q| q.pv_input_power),
            battery_power: q.map(|q| q.battery_power),
            daylight: sample.daylight(),
            battery_phase: sample.battery_phase(),
            pv_efficiency: efficiencies[0].value(),
            discharge_efficiency: efficiencies[1].value(),
            charge_efficiency: efficiencies[2].value(),
            discarded: efficiencies.iter().any(|e| e.is_discarded()),
        }
    }
}

/// Write `samples` as CSV with a header row. Returns the number of rows.
pub fn write_derived_csv<W: Write>(samples: &[DerivedSample], writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    for sample in samples {
        csv.serialize(DerivedRecord::from(sample))?;
    }
    csv.flush().map_err(csv::Error::from)?;
    debug!(rows = samples.len(), "exported derived samples");
    Ok(samples.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DerivedConfig;
    use crate::derived::{DerivedQuantities, SampleInputs};

    #[test]
    fn test_absent_values_are_empty_cells() {
        let inputs = SampleInputs {
            bus_current: 2.0,
            pv_current: 0.0,
            pv_voltage: 0.0,
            realized_pv_current: 0.0,
            battery_current: 1.0,
            battery_voltage: 4.0,
        };
        let samples = vec![
            DerivedSample {
                index: 0,
                time_s: 0.0,
                quantities: Some(DerivedQuantities::compute(&inputs, &DerivedConfig::default())),
            },
            DerivedSample {
                index: 1,
                time_s: 1.0,
                quantities: None,
            },
        ];

        let mut out = Vec::new();
        assert_eq!(write_derived_csv(&samples, &mut out).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("index,time_s,load_current"));
        assert!(lines[0].ends_with("charge_efficiency,discarded"));
        assert_eq!(lines[2], "1,1.0,,,,,,,,,,,false");
        // 2 mA at 3.3 V from 1 mA at 4 V is 165 %, outside the accepted range
        assert!(lines[1].contains(",night,discharging,"));
        assert!(lines[1].ends_with(",true"));
    }
}
