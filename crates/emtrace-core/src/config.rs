// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! TOML configuration for an analysis run.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! 3.3 V bus, a 1 µA night threshold, 50 histogram bins and the 1.5% / 1.01%
//! depletion thresholds.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Signal column names in the simulator log
    #[serde(default)]
    pub columns: SignalColumns,

    /// Derived-quantity engine constants
    #[serde(default)]
    pub derived: DerivedConfig,

    /// Lifetime estimation thresholds
    #[serde(default)]
    pub lifetime: LifetimeConfig,

    /// Distribution reporter settings
    #[serde(default)]
    pub distribution: DistributionConfig,
}

/// Names of the columns the pipeline reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalColumns {
    #[serde(default = "default_time_column")]
    pub time: String,

    /// Battery state of charge, a fraction in [0, 1]
    #[serde(default = "default_soc_column")]
    pub soc: String,

    /// Bus current (mA); positive when the bus draws from the battery
    #[serde(default = "default_bus_current_column")]
    pub bus_current: String,

    /// PV panel current at the panel side of the converter (mA)
    #[serde(default = "default_pv_current_column")]
    pub pv_current: String,

    /// PV panel voltage (V)
    #[serde(default = "default_pv_voltage_column")]
    pub pv_voltage: String,

    /// PV current delivered onto the bus (mA)
    #[serde(default = "default_realized_pv_current_column")]
    pub realized_pv_current: String,

    /// Battery current (mA); positive when discharging
    #[serde(default = "default_battery_current_column")]
    pub battery_current: String,

    /// Battery terminal voltage (V)
    #[serde(default = "default_battery_voltage_column")]
    pub battery_voltage: String,
}

/// Constants of the derived-quantity engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedConfig {
    /// Fixed bus reference voltage (V)
    #[serde(default = "default_bus_voltage")]
    pub bus_voltage_v: f64,

    /// Realized PV current strictly below this value marks a night sample (mA)
    #[serde(default = "default_night_threshold")]
    pub night_threshold: f64,

    /// Battery power magnitude that must be exceeded before a charge
    /// efficiency is computed (mW)
    #[serde(default = "default_charge_power_floor")]
    pub charge_power_floor: f64,

    /// Lower bound of the accepted efficiency range (%)
    #[serde(default = "default_efficiency_min")]
    pub efficiency_min: f64,

    /// Upper bound of the accepted efficiency range (%)
    #[serde(default = "default_efficiency_max")]
    pub efficiency_max: f64,
}

/// Lifetime estimator thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeConfig {
    /// Samples before this time are dropped as startup transients (s)
    #[serde(default = "default_warmup")]
    pub warmup_s: Option<f64>,

    /// Final SOC at or below this value classifies the trace as depleted
    #[serde(default = "default_depleted_threshold")]
    pub depleted_threshold: f64,

    /// First SOC at or below this value pinpoints the depletion instant
    #[serde(default = "default_crossing_threshold")]
    pub crossing_threshold: f64,
}

/// Distribution reporter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Histogram bin count
    #[serde(default = "default_bins")]
    pub bins: usize,

    /// Efficiencies below this value count towards the low-efficiency share (%)
    #[serde(default = "default_low_efficiency_threshold")]
    pub low_efficiency_threshold: f64,
}

// Default value functions
fn default_time_column() -> String {
    "time".to_owned()
}

fn default_soc_column() -> String {
    "soc".to_owned()
}

fn default_bus_current_column() -> String {
    "i_tot".to_owned()
}

fn default_pv_current_column() -> String {
    "i_pv".to_owned()
}

fn default_pv_voltage_column() -> String {
    "v_pv".to_owned()
}

fn default_realized_pv_current_column() -> String {
    "real_i_pv".to_owned()
}

fn default_battery_current_column() -> String {
    "i_batt".to_owned()
}

fn default_battery_voltage_column() -> String {
    "v_batt".to_owned()
}

fn default_bus_voltage() -> f64 {
    3.3
}

fn default_night_threshold() -> f64 {
    1e-3
}

fn default_charge_power_floor() -> f64 {
    1e-6
}

fn default_efficiency_min() -> f64 {
    0.0
}

fn default_efficiency_max() -> f64 {
    100.0
}

fn default_warmup() -> Option<f64> {
    Some(10.0)
}

fn default_depleted_threshold() -> f64 {
    0.015
}

fn default_crossing_threshold() -> f64 {
    0.0101
}

fn default_bins() -> usize {
    50
}

fn default_low_efficiency_threshold() -> f64 {
    40.0
}

impl Default for SignalColumns {
    fn default() -> Self {
        Self {
            time: default_time_column(),
            soc: default_soc_column(),
            bus_current: default_bus_current_column(),
            pv_current: default_pv_current_column(),
            pv_voltage: default_pv_voltage_column(),
            realized_pv_current: default_realized_pv_current_column(),
            battery_current: default_battery_current_column(),
            battery_voltage: default_battery_voltage_column(),
        }
    }
}

impl Default for DerivedConfig {
    fn default() -> Self {
        Self {
            bus_voltage_v: default_bus_voltage(),
            night_threshold: default_night_threshold(),
            charge_power_floor: default_charge_power_floor(),
            efficiency_min: default_efficiency_min(),
            efficiency_max: default_efficiency_max(),
        }
    }
}

impl Default for LifetimeConfig {
    fn default() -> Self {
        Self {
            warmup_s: default_warmup(),
            depleted_threshold: default_depleted_threshold(),
            crossing_threshold: default_crossing_threshold(),
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            bins: default_bins(),
            low_efficiency_threshold: default_low_efficiency_threshold(),
        }
    }
}

impl SignalColumns {
    /// Columns the derived-quantity engine needs, in the order they are checked
    #[must_use]
    pub fn derived_inputs(&self) -> [&str; 6] {
        [
            self.bus_current.as_str(),
            self.pv_current.as_str(),
            self.pv_voltage.as_str(),
            self.realized_pv_current.as_str(),
            self.battery_current.as_str(),
            self.battery_voltage.as_str(),
        ]
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let derived = &self.derived;
        if !(derived.bus_voltage_v.is_finite() && derived.bus_voltage_v > 0.0) {
            return Err(TraceError::Config(format!(
                "bus_voltage_v must be positive, got {}",
                derived.bus_voltage_v
            )));
        }
        if derived.night_threshold < 0.0 {
            return Err(TraceError::Config(
                "night_threshold must not be negative".to_owned(),
            ));
        }
        if derived.charge_power_floor < 0.0 {
            return Err(TraceError::Config(
                "charge_power_floor must not be negative".to_owned(),
            ));
        }
        if derived.efficiency_min > derived.efficiency_max {
            return Err(TraceError::Config(format!(
                "efficiency_min ({}) exceeds efficiency_max ({})",
                derived.efficiency_min, derived.efficiency_max
            )));
        }

        let lifetime = &self.lifetime;
        if lifetime.crossing_threshold > lifetime.depleted_threshold {
            return Err(TraceError::Config(format!(
                "crossing_threshold ({}) exceeds depleted_threshold ({})",
                lifetime.crossing_threshold, lifetime.depleted_threshold
            )));
        }

        if self.distribution.bins == 0 {
            return Err(TraceError::Config("bins must be at least 1".to_owned()));
        }

        Ok(())
    }

    /// Example configuration as a TOML string
    #[must_use]
    pub fn example_toml() -> String {
        r#"# emtrace analysis configuration
# Every key is optional; the values below are the defaults.

[columns]
time = "time"
soc = "soc"
bus_current = "i_tot"
pv_current = "i_pv"
pv_voltage = "v_pv"
realized_pv_current = "real_i_pv"
battery_current = "i_batt"
battery_voltage = "v_batt"

[derived]
bus_voltage_v = 3.3
night_threshold = 0.001
charge_power_floor = 0.000001
efficiency_min = 0.0
efficiency_max = 100.0

[lifetime]
warmup_s = 10.0
depleted_threshold = 0.015
crossing_threshold = 0.0101

[distribution]
bins = 50
low_efficiency_threshold = 40.0
"#
        .to_owned()
    }
}
