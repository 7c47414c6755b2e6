// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Analysis pipeline for energy-harvesting simulator traces.
//!
//! A trace is a whitespace-separated time series of battery, bus and PV
//! signals. The pipeline loads it, derives power flows and converter
//! efficiencies per sample, and reduces those to charge totals, a lifetime
//! estimate and efficiency distributions.
//!
//! # Features
//!
//! - **Trace Loader**: header or explicit schema, `%` comment lines, absent cells
//! - **Derived Quantities**: load/PV/battery power, efficiencies, day/night and
//!   charge/discharge phases
//! - **Charge Integrator**: trapezoidal net charge and policy comparison
//! - **Lifetime Estimator**: depletion status and time to depletion
//! - **Distribution Reporter**: per-phase statistics, histograms and duty cycle
//!
//! # Example
//!
//! ```ignore
//! use emtrace_core::{AnalysisConfig, AnalyzedTrace, DistributionReport, TraceLoader};
//!
//! let config = AnalysisConfig::default();
//! let trace = TraceLoader::new().load("sim_a.dat")?;
//! let analyzed = AnalyzedTrace::new(trace, &config)?;
//! let report = DistributionReport::build(analyzed.samples(), &config.distribution);
//! println!("duty cycle: {:.1}%", report.duty_cycle.ratio * 100.0);
//! ```

pub mod config;
pub mod derived;
pub mod distribution;
pub mod error;
pub mod export;
pub mod integrate;
pub mod lifetime;
pub mod sag;
pub mod trace;

// Re-exports for convenience
pub use config::{
    AnalysisConfig, DerivedConfig, DistributionConfig, LifetimeConfig, SignalColumns,
};
pub use derived::{
    AnalyzedTrace, BatteryPhase, Daylight, DerivedQuantities, DerivedSample, Efficiency,
    SampleInputs, derive_samples,
};
pub use distribution::{
    DistributionReport, DutyCycle, EfficiencyDistribution, EfficiencyKind, Histogram,
    PartitionKey, PartitionSummary, Partitioning, SummaryStats, duty_cycle, summarize,
};
pub use error::{Result, TraceError};
pub use export::{DerivedRecord, write_derived_csv};
pub use integrate::{Charge, ChargeComparison, compare_charge, integrate_charge, trapezoid};
pub use lifetime::{DepletionCrossing, LifetimeReport, LifetimeStatus, estimate_lifetime};
pub use sag::{SagComparison, VoltageSag, compare_sag, voltage_sag};
pub use trace::{Trace, TraceLoader, TraceWindow, load_trace};
