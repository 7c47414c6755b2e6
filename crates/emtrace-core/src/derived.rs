// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! Per-sample power flows, converter efficiencies and phase classification.
//!
//! Every input sample yields exactly one [`DerivedSample`], in order. Phase
//! tags are computed here once so that every consumer partitions samples the
//! same way.
//!
//! Sign conventions (simulator units: mA, V, mW):
//! - bus current is positive when the bus draws from the battery and negative
//!   when PV surplus is routed into the battery
//! - battery current and battery power are positive while discharging

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{AnalysisConfig, DerivedConfig, SignalColumns};
use crate::error::Result;
use crate::trace::Trace;

/// Day/night classification from the realized PV current
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Daylight {
    Day,
    Night,
}

/// Direction of energy flow between bus and battery, from the bus current sign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryPhase {
    /// Bus current > 0: PV is insufficient, the battery supplies the bus
    Discharging,
    /// Bus current < 0: PV surplus flows into the battery
    Charging,
    Idle,
}

/// A converter efficiency (%) for one sample.
///
/// `NotApplicable` means the defining phase condition does not hold; it is
/// distinct from a valid efficiency of zero. `Discarded` keeps values outside
/// the accepted range so they can be counted, never aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Efficiency {
    #[default]
    NotApplicable,
    Valid(f64),
    Discarded(f64),
}

impl Efficiency {
    fn classify(raw: f64, config: &DerivedConfig) -> Self {
        if raw.is_finite() && raw >= config.efficiency_min && raw <= config.efficiency_max {
            Self::Valid(raw)
        } else {
            Self::Discarded(raw)
        }
    }

    /// The efficiency when valid, `None` when not applicable or discarded
    #[must_use]
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Valid(v) => Some(v),
            Self::NotApplicable | Self::Discarded(_) => None,
        }
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid(_))
    }

    #[must_use]
    pub fn is_discarded(self) -> bool {
        matches!(self, Self::Discarded(_))
    }

    /// True when the phase condition held, whether or not the value was kept
    #[must_use]
    pub fn is_applicable(self) -> bool {
        !matches!(self, Self::NotApplicable)
    }
}

/// Raw signal values of one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleInputs {
    pub bus_current: f64,
    pub pv_current: f64,
    pub pv_voltage: f64,
    pub realized_pv_current: f64,
    pub battery_current: f64,
    pub battery_voltage: f64,
}

impl SampleInputs {
    /// All inputs present (absent cells load as NaN)
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [
            self.bus_current,
            self.pv_current,
            self.pv_voltage,
            self.realized_pv_current,
            self.battery_current,
            self.battery_voltage,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Quantities computed for a sample whose inputs are all present
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedQuantities {
    /// Bus current plus realized PV current (mA)
    pub load_current: f64,
    /// mW
    pub load_power: f64,
    /// PV converter output onto the bus (mW)
    pub pv_output_power: f64,
    /// PV panel power into the converter (mW)
    pub pv_input_power: f64,
    /// Positive while discharging (mW)
    pub battery_power: f64,
    pub daylight: Daylight,
    pub battery_phase: BatteryPhase,
    pub pv_efficiency: Efficiency,
    pub discharge_efficiency: Efficiency,
    pub charge_efficiency: Efficiency,
}

impl DerivedQuantities {
    #[must_use]
    pub fn compute(inputs: &SampleInputs, config: &DerivedConfig) -> Self {
        let v_bus = config.bus_voltage_v;

        let load_current = inputs.bus_current + inputs.realized_pv_current;
        let load_power = load_current * v_bus;
        let pv_output_power = inputs.realized_pv_current * v_bus;
        let pv_input_power = inputs.pv_current * inputs.pv_voltage;
        let battery_power = inputs.battery_current * inputs.battery_voltage;

        let daylight = if inputs.realized_pv_current < config.night_threshold {
            Daylight::Night
        } else {
            Daylight::Day
        };

        let battery_phase = if inputs.bus_current > 0.0 {
            BatteryPhase::Discharging
        } else if inputs.bus_current < 0.0 {
            BatteryPhase::Charging
        } else {
            BatteryPhase::Idle
        };

        let pv_efficiency = if pv_input_power > 0.0 {
            Efficiency::classify(pv_output_power / pv_input_power * 100.0, config)
        } else {
            Efficiency::NotApplicable
        };

        let discharge_efficiency = if inputs.bus_current > 0.0 && inputs.battery_current > 0.0 {
            Efficiency::classify(
                (inputs.bus_current * v_bus) / battery_power * 100.0,
                config,
            )
        } else {
            Efficiency::NotApplicable
        };

        // Bus power into the converter over power reaching the battery
        let battery_power_magnitude = inputs.battery_current.abs() * inputs.battery_voltage;
        let charge_efficiency =
            if inputs.bus_current < 0.0 && battery_power_magnitude > config.charge_power_floor {
                Efficiency::classify(
                    inputs.bus_current.abs() * v_bus / battery_power_magnitude * 100.0,
                    config,
                )
            } else {
                Efficiency::NotApplicable
            };

        Self {
            load_current,
            load_power,
            pv_output_power,
            pv_input_power,
            battery_power,
            daylight,
            battery_phase,
            pv_efficiency,
            discharge_efficiency,
            charge_efficiency,
        }
    }
}

/// The derived record of one input sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedSample {
    /// Index of the input sample
    pub index: usize,
    pub time_s: f64,
    /// `None` when any required input of this sample is absent
    pub quantities: Option<DerivedQuantities>,
}

impl DerivedSample {
    #[must_use]
    pub fn daylight(&self) -> Option<Daylight> {
        self.quantities.map(|q| q.daylight)
    }

    #[must_use]
    pub fn battery_phase(&self) -> Option<BatteryPhase> {
        self.quantities.map(|q| q.battery_phase)
    }

    #[must_use]
    pub fn pv_efficiency(&self) -> Efficiency {
        self.quantities.map_or_else(Efficiency::default, |q| q.pv_efficiency)
    }

    #[must_use]
    pub fn discharge_efficiency(&self) -> Efficiency {
        self.quantities
            .map_or_else(Efficiency::default, |q| q.discharge_efficiency)
    }

    #[must_use]
    pub fn charge_efficiency(&self) -> Efficiency {
        self.quantities
            .map_or_else(Efficiency::default, |q| q.charge_efficiency)
    }
}

/// Compute the derived record of every sample of `trace`.
///
/// Fails with a missing-column error before producing anything if one of the
/// engine's input columns is absent.
pub fn derive_samples(
    trace: &Trace,
    columns: &SignalColumns,
    config: &DerivedConfig,
) -> Result<Vec<DerivedSample>> {
    trace.require_columns(columns.derived_inputs())?;

    let time = trace.time();
    let bus_current = trace.column(&columns.bus_current)?;
    let pv_current = trace.column(&columns.pv_current)?;
    let pv_voltage = trace.column(&columns.pv_voltage)?;
    let realized_pv_current = trace.column(&columns.realized_pv_current)?;
    let battery_current = trace.column(&columns.battery_current)?;
    let battery_voltage = trace.column(&columns.battery_voltage)?;

    let samples: Vec<DerivedSample> = (0..trace.len())
        .map(|i| {
            let inputs = SampleInputs {
                bus_current: bus_current[i],
                pv_current: pv_current[i],
                pv_voltage: pv_voltage[i],
                realized_pv_current: realized_pv_current[i],
                battery_current: battery_current[i],
                battery_voltage: battery_voltage[i],
            };
            DerivedSample {
                index: i,
                time_s: time[i],
                quantities: inputs
                    .is_complete()
                    .then(|| DerivedQuantities::compute(&inputs, config)),
            }
        })
        .collect();

    let absent = samples.iter().filter(|s| s.quantities.is_none()).count();
    if absent > 0 {
        warn!(
            source = trace.source_name(),
            absent, "samples with absent inputs have no derived quantities"
        );
    }
    info!(
        source = trace.source_name(),
        samples = samples.len(),
        discarded_pv = samples.iter().filter(|s| s.pv_efficiency().is_discarded()).count(),
        discarded_discharge = samples
            .iter()
            .filter(|s| s.discharge_efficiency().is_discarded())
            .count(),
        discarded_charge = samples
            .iter()
            .filter(|s| s.charge_efficiency().is_discarded())
            .count(),
        "derived quantities computed"
    );

    Ok(samples)
}

/// A trace together with its cached derived records
#[derive(Debug, Clone)]
pub struct AnalyzedTrace {
    trace: Trace,
    samples: Vec<DerivedSample>,
}

impl AnalyzedTrace {
    pub fn new(trace: Trace, config: &AnalysisConfig) -> Result<Self> {
        let samples = derive_samples(&trace, &config.columns, &config.derived)?;
        Ok(Self { trace, samples })
    }

    #[must_use]
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    #[must_use]
    pub fn samples(&self) -> &[DerivedSample] {
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TraceError;

    fn inputs() -> SampleInputs {
        SampleInputs {
            bus_current: 0.0,
            pv_current: 0.0,
            pv_voltage: 0.0,
            realized_pv_current: 0.0,
            battery_current: 0.0,
            battery_voltage: 4.0,
        }
    }

    fn config() -> DerivedConfig {
        DerivedConfig::default()
    }

    #[test]
    fn test_power_flows() {
        let q = DerivedQuantities::compute(
            &SampleInputs {
                bus_current: 2.0,
                pv_current: 1.5,
                pv_voltage: 2.0,
                realized_pv_current: 1.0,
                battery_current: 2.0,
                battery_voltage: 4.0,
            },
            &config(),
        );
        assert!((q.load_current - 3.0).abs() < 1e-12);
        assert!((q.load_power - 9.9).abs() < 1e-9);
        assert!((q.pv_output_power - 3.3).abs() < 1e-9);
        assert!((q.pv_input_power - 3.0).abs() < 1e-12);
        assert!((q.battery_power - 8.0).abs() < 1e-12);
        assert_eq!(q.battery_phase, BatteryPhase::Discharging);
        assert_eq!(q.daylight, Daylight::Day);
        // 3.3 / 3.0 > 100%
        assert!(q.pv_efficiency.is_discarded());
        let eff = q.discharge_efficiency.value().unwrap();
        assert!((eff - 82.5).abs() < 1e-9);
        assert_eq!(q.charge_efficiency, Efficiency::NotApplicable);
    }

    #[test]
    fn test_night_boundary_is_strict() {
        let mut sample = inputs();
        sample.realized_pv_current = 1e-3;
        let q = DerivedQuantities::compute(&sample, &config());
        assert_eq!(q.daylight, Daylight::Day);

        sample.realized_pv_current = 0.000_999;
        let q = DerivedQuantities::compute(&sample, &config());
        assert_eq!(q.daylight, Daylight::Night);
    }

    #[test]
    fn test_discharge_requires_battery_supplying() {
        let mut sample = inputs();
        sample.bus_current = 1.0;
        sample.battery_current = 0.0;
        let q = DerivedQuantities::compute(&sample, &config());
        assert_eq!(q.battery_phase, BatteryPhase::Discharging);
        assert_eq!(q.discharge_efficiency, Efficiency::NotApplicable);
    }

    #[test]
    fn test_charge_efficiency() {
        let mut sample = inputs();
        sample.bus_current = -2.0;
        sample.battery_current = -2.0;
        sample.battery_voltage = 4.0;
        let q = DerivedQuantities::compute(&sample, &config());
        assert_eq!(q.battery_phase, BatteryPhase::Charging);
        assert!(q.battery_power < 0.0);
        // 6.6 mW from the bus, 8 mW into the battery
        let eff = q.charge_efficiency.value().unwrap();
        assert!((eff - 82.5).abs() < 1e-9);
        assert_eq!(q.discharge_efficiency, Efficiency::NotApplicable);
    }

    #[test]
    fn test_charge_efficiency_needs_power_above_floor() {
        let mut sample = inputs();
        sample.bus_current = -2.0;
        sample.battery_current = 0.0;
        let q = DerivedQuantities::compute(&sample, &config());
        assert_eq!(q.charge_efficiency, Efficiency::NotApplicable);
    }

    #[test]
    fn test_artifact_above_100_is_discarded_not_clamped() {
        // 137.4% discharge efficiency
        let mut sample = inputs();
        sample.bus_current = 137.4 / 3.3;
        sample.battery_current = 25.0;
        sample.battery_voltage = 4.0;
        let q = DerivedQuantities::compute(&sample, &config());
        match q.discharge_efficiency {
            Efficiency::Discarded(v) => assert!((v - 137.4).abs() < 1e-9),
            other => panic!("expected discarded efficiency, got {other:?}"),
        }
        assert_eq!(q.discharge_efficiency.value(), None);
    }

    #[test]
    fn test_negative_efficiency_is_discarded() {
        // Negative battery voltage flips the ratio sign
        let mut sample = inputs();
        sample.bus_current = 1.0;
        sample.battery_current = 1.0;
        sample.battery_voltage = -4.0;
        let q = DerivedQuantities::compute(&sample, &config());
        assert!(q.discharge_efficiency.is_discarded());
    }

    #[test]
    fn test_zero_efficiency_is_valid() {
        let mut sample = inputs();
        sample.pv_current = 1.0;
        sample.pv_voltage = 2.0;
        sample.realized_pv_current = 0.0;
        let q = DerivedQuantities::compute(&sample, &config());
        assert_eq!(q.pv_efficiency, Efficiency::Valid(0.0));
    }

    fn trace_with(columns: &[(&str, Vec<f64>)]) -> Trace {
        Trace::from_columns(
            "test",
            "time",
            columns
                .iter()
                .map(|(n, v)| ((*n).to_owned(), v.clone()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_column_named() {
        let trace = trace_with(&[
            ("time", vec![0.0]),
            ("i_tot", vec![1.0]),
            ("i_pv", vec![1.0]),
            ("real_i_pv", vec![1.0]),
            ("i_batt", vec![1.0]),
            ("v_batt", vec![4.0]),
        ]);
        let err = derive_samples(&trace, &SignalColumns::default(), &config()).unwrap_err();
        assert!(matches!(err, TraceError::MissingColumn { column } if column == "v_pv"));
    }

    #[test]
    fn test_absent_input_blanks_whole_sample() {
        let trace = trace_with(&[
            ("time", vec![0.0, 1.0]),
            ("i_tot", vec![1.0, 1.0]),
            ("i_pv", vec![1.0, 1.0]),
            ("v_pv", vec![2.0, f64::NAN]),
            ("real_i_pv", vec![0.5, 0.5]),
            ("i_batt", vec![1.0, 1.0]),
            ("v_batt", vec![4.0, 4.0]),
        ]);
        let samples = derive_samples(&trace, &SignalColumns::default(), &config()).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].quantities.is_some());
        assert!(samples[1].quantities.is_none());
        assert_eq!(samples[1].pv_efficiency(), Efficiency::NotApplicable);
        assert_eq!(samples[1].daylight(), None);
        assert!((samples[1].time_s - 1.0).abs() < f64::EPSILON);
    }
}
