// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! Summary statistics and histograms of converter efficiencies.
//!
//! Only valid efficiencies are aggregated. Discarded artifacts are counted per
//! partition and otherwise ignored, so they never shift a mean.

use serde::{Deserialize, Serialize};

use crate::config::DistributionConfig;
use crate::derived::{BatteryPhase, Daylight, DerivedSample, Efficiency};

/// Which converter efficiency to aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyKind {
    Pv,
    Discharge,
    Charge,
}

impl EfficiencyKind {
    pub const ALL: [Self; 3] = [Self::Pv, Self::Discharge, Self::Charge];

    #[must_use]
    pub fn of(self, sample: &DerivedSample) -> Efficiency {
        match self {
            Self::Pv => sample.pv_efficiency(),
            Self::Discharge => sample.discharge_efficiency(),
            Self::Charge => sample.charge_efficiency(),
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Pv => "PV converter",
            Self::Discharge => "Battery converter (discharge)",
            Self::Charge => "Battery converter (charge)",
        }
    }
}

/// How samples are split before aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partitioning {
    /// A single partition holding every sample
    None,
    Daylight,
    BatteryPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKey {
    All,
    Day,
    Night,
    Discharging,
    Charging,
    Idle,
}

impl Partitioning {
    #[must_use]
    pub fn keys(self) -> &'static [PartitionKey] {
        match self {
            Self::None => &[PartitionKey::All],
            Self::Daylight => &[PartitionKey::Day, PartitionKey::Night],
            Self::BatteryPhase => &[
                PartitionKey::Discharging,
                PartitionKey::Charging,
                PartitionKey::Idle,
            ],
        }
    }

    /// Partition of a sample; `None` for samples without derived quantities
    #[must_use]
    pub fn key_of(self, sample: &DerivedSample) -> Option<PartitionKey> {
        match self {
            Self::None => Some(PartitionKey::All),
            Self::Daylight => sample.daylight().map(|d| match d {
                Daylight::Day => PartitionKey::Day,
                Daylight::Night => PartitionKey::Night,
            }),
            Self::BatteryPhase => sample.battery_phase().map(|p| match p {
                BatteryPhase::Discharging => PartitionKey::Discharging,
                BatteryPhase::Charging => PartitionKey::Charging,
                BatteryPhase::Idle => PartitionKey::Idle,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl SummaryStats {
    #[must_use]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (sum, min, max) = values.iter().fold(
            (0.0, f64::INFINITY, f64::NEG_INFINITY),
            |(sum, min, max), v| (sum + v, min.min(*v), max.max(*v)),
        );
        Some(Self {
            count: values.len(),
            mean: sum / values.len() as f64,
            min,
            max,
        })
    }
}

/// Equal-width histogram spanning the observed value range.
///
/// The last bin is closed on both ends so the maximum is counted. A range of
/// zero width is widened by 0.5 on each side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub lower: f64,
    pub upper: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    #[must_use]
    pub fn from_values(values: &[f64], bins: usize) -> Option<Self> {
        let stats = SummaryStats::from_values(values)?;
        if bins == 0 {
            return None;
        }
        let (lower, upper) = if stats.max > stats.min {
            (stats.min, stats.max)
        } else {
            (stats.min - 0.5, stats.max + 0.5)
        };

        let mut counts = vec![0; bins];
        let width = (upper - lower) / bins as f64;
        for v in values {
            counts[bin_index(*v, lower, width, bins)] += 1;
        }
        Some(Self {
            lower,
            upper,
            counts,
        })
    }

    #[must_use]
    pub fn bin_width(&self) -> f64 {
        (self.upper - self.lower) / self.counts.len() as f64
    }

    /// `bins + 1` edges from `lower` to `upper`
    #[must_use]
    pub fn bin_edges(&self) -> Vec<f64> {
        let width = self.bin_width();
        (0..=self.counts.len())
            .map(|i| self.lower + width * i as f64)
            .collect()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bin_index(value: f64, lower: f64, width: f64, bins: usize) -> usize {
    let idx = ((value - lower) / width).floor().max(0.0) as usize;
    idx.min(bins - 1)
}

/// Valid efficiencies below a threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LowEfficiencyShare {
    pub threshold: f64,
    pub count: usize,
    /// Fraction of the partition's valid values, 0 when there are none
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionSummary {
    pub key: PartitionKey,
    /// `None` when the partition holds no valid value
    pub stats: Option<SummaryStats>,
    pub histogram: Option<Histogram>,
    /// Values dropped for lying outside the accepted efficiency range
    pub discarded: usize,
    pub low_efficiency: LowEfficiencyShare,
}

impl PartitionSummary {
    fn build(
        key: PartitionKey,
        values: &[f64],
        discarded: usize,
        config: &DistributionConfig,
    ) -> Self {
        let threshold = config.low_efficiency_threshold;
        let low = values.iter().filter(|v| **v < threshold).count();
        Self {
            key,
            stats: SummaryStats::from_values(values),
            histogram: Histogram::from_values(values, config.bins),
            discarded,
            low_efficiency: LowEfficiencyShare {
                threshold,
                count: low,
                fraction: if values.is_empty() {
                    0.0
                } else {
                    low as f64 / values.len() as f64
                },
            },
        }
    }
}

/// Aggregate one efficiency kind per partition, in the partitioning's key order
#[must_use]
pub fn summarize(
    samples: &[DerivedSample],
    kind: EfficiencyKind,
    partitioning: Partitioning,
    config: &DistributionConfig,
) -> Vec<PartitionSummary> {
    partitioning
        .keys()
        .iter()
        .map(|&key| {
            let mut values = Vec::new();
            let mut discarded = 0;
            for sample in samples
                .iter()
                .filter(|s| partitioning.key_of(s) == Some(key))
            {
                match kind.of(sample) {
                    Efficiency::Valid(v) => values.push(v),
                    Efficiency::Discarded(_) => discarded += 1,
                    Efficiency::NotApplicable => {}
                }
            }
            PartitionSummary::build(key, &values, discarded, config)
        })
        .collect()
}

/// Share of samples in which the battery supplies the bus
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DutyCycle {
    pub discharging: usize,
    pub total: usize,
    pub ratio: f64,
}

#[must_use]
pub fn duty_cycle(samples: &[DerivedSample]) -> DutyCycle {
    let discharging = samples
        .iter()
        .filter(|s| s.battery_phase() == Some(BatteryPhase::Discharging))
        .count();
    let total = samples.len();
    DutyCycle {
        discharging,
        total,
        ratio: if total == 0 {
            0.0
        } else {
            discharging as f64 / total as f64
        },
    }
}

/// Distribution of one efficiency kind under one partitioning
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyDistribution {
    pub kind: EfficiencyKind,
    pub partitioning: Partitioning,
    pub partitions: Vec<PartitionSummary>,
}

/// Everything the reporting layer consumes for one trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    pub distributions: Vec<EfficiencyDistribution>,
    pub duty_cycle: DutyCycle,
}

impl DistributionReport {
    /// Every efficiency kind, both overall and split into day and night
    #[must_use]
    pub fn build(samples: &[DerivedSample], config: &DistributionConfig) -> Self {
        let distributions = EfficiencyKind::ALL
            .iter()
            .flat_map(|&kind| {
                [Partitioning::None, Partitioning::Daylight]
                    .into_iter()
                    .map(move |partitioning| EfficiencyDistribution {
                        kind,
                        partitioning,
                        partitions: summarize(samples, kind, partitioning, config),
                    })
            })
            .collect();
        Self {
            distributions,
            duty_cycle: duty_cycle(samples),
        }
    }

    #[must_use]
    pub fn get(
        &self,
        kind: EfficiencyKind,
        partitioning: Partitioning,
    ) -> Option<&EfficiencyDistribution> {
        self.distributions
            .iter()
            .find(|d| d.kind == kind && d.partitioning == partitioning)
    }
}
