// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! Output formatters for analysis results.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{Attribute, Cell, Color, Table, presets::UTF8_FULL};
use emtrace_core::{
    ChargeComparison, DistributionReport, DutyCycle, EfficiencyDistribution, LifetimeReport,
    LifetimeStatus, PartitionKey, Partitioning, SagComparison,
};
use serde::Serialize;

/// Formatter for pretty tables
pub struct TableFormatter;

/// Formatter for CSV export
pub struct CsvFormatter;

/// Envelope for JSON output
#[derive(Debug, Serialize)]
pub struct JsonReport<'a, T: Serialize> {
    pub generated_at: DateTime<Utc>,
    pub sources: Vec<String>,
    pub report: &'a T,
}

impl<'a, T: Serialize> JsonReport<'a, T> {
    pub fn new(sources: Vec<String>, report: &'a T) -> Self {
        Self {
            generated_at: Utc::now(),
            sources,
            report,
        }
    }

    pub fn to_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report")
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
        .collect()
}

fn opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_owned(), |v| format!("{v:.precision$}"))
}

fn partition_label(key: PartitionKey) -> &'static str {
    match key {
        PartitionKey::All => "All",
        PartitionKey::Day => "Day",
        PartitionKey::Night => "Night",
        PartitionKey::Discharging => "Discharging",
        PartitionKey::Charging => "Charging",
        PartitionKey::Idle => "Idle",
    }
}

impl TableFormatter {
    /// Efficiency statistics, one row per partition
    pub fn format_distributions(distributions: &[&EfficiencyDistribution]) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(header(&[
            "Converter",
            "Phase",
            "Count",
            "Mean\n(%)",
            "Min\n(%)",
            "Max\n(%)",
            "Below\nthreshold",
            "Discarded",
        ]));

        for dist in distributions {
            for part in &dist.partitions {
                let stats = part.stats;
                let low = part.low_efficiency;
                let low_cell = Cell::new(format!(
                    "{} ({:.1}% < {:.0}%)",
                    low.count,
                    low.fraction * 100.0,
                    low.threshold
                ));
                table.add_row(vec![
                    Cell::new(dist.kind.label()),
                    Cell::new(partition_label(part.key)),
                    Cell::new(stats.map_or(0, |s| s.count)),
                    Cell::new(opt(stats.map(|s| s.mean), 2)),
                    Cell::new(opt(stats.map(|s| s.min), 2)),
                    Cell::new(opt(stats.map(|s| s.max), 2)),
                    if low.count > 0 {
                        low_cell.fg(Color::Yellow)
                    } else {
                        low_cell
                    },
                    Cell::new(part.discarded),
                ]);
            }
        }

        let mut output = table.to_string();
        output.push('\n');
        output
    }

    pub fn format_duty_cycle(duty: &DutyCycle) -> String {
        format!(
            "Battery duty cycle: {:.2}% ({} of {} samples discharging)\n",
            duty.ratio * 100.0,
            duty.discharging,
            duty.total
        )
    }

    /// Whole-trace overview
    pub fn format_summary(
        source: &str,
        samples: usize,
        days: f64,
        report: &DistributionReport,
        lifetime: Option<&LifetimeReport>,
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Trace: {source} | {samples} samples | {days:.2} days\n"
        ));
        output.push_str(&Self::format_duty_cycle(&report.duty_cycle));
        if let Some(lifetime) = lifetime {
            output.push_str(&format!("{}\n", Self::lifetime_line(lifetime)));
        }
        output.push('\n');

        let overall: Vec<&EfficiencyDistribution> = report
            .distributions
            .iter()
            .filter(|d| d.partitioning == Partitioning::None)
            .collect();
        output.push_str(&Self::format_distributions(&overall));
        output
    }

    fn lifetime_line(report: &LifetimeReport) -> String {
        match report.status {
            LifetimeStatus::Depleted => format!(
                "Battery depleted after {:.2} days (final SOC {:.4})",
                report.lifetime_days(),
                report.final_soc
            ),
            LifetimeStatus::Alive => format!(
                "Battery alive at end of trace, {:.2} days (final SOC {:.4})",
                report.lifetime_days(),
                report.final_soc
            ),
        }
    }

    /// Net charge and voltage sag of two traces
    pub fn format_comparison(
        names: (&str, &str),
        window: (f64, f64),
        charge: &ChargeComparison,
        sag: &SagComparison,
    ) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(header(&[
            "Trace",
            "Samples",
            "Net charge\n(mAs)",
            "Net charge\n(mAh)",
            "Min v_batt\n(V)",
            "At\n(s)",
        ]));

        for (name, q, s) in [
            (names.0, &charge.a, &sag.a),
            (names.1, &charge.b, &sag.b),
        ] {
            table.add_row(vec![
                Cell::new(name),
                Cell::new(q.samples),
                Cell::new(format!("{:.3}", q.native)),
                Cell::new(format!("{:.6}", q.per_hour)),
                Cell::new(opt(s.map(|s| s.min_voltage), 4)),
                Cell::new(opt(s.map(|s| s.time_s), 1)),
            ]);
        }

        let mut output = table.to_string();
        output.push('\n');
        output.push_str(&format!(
            "Window: {:.1} s - {:.1} s | Difference: {}% | Sag depth difference: {} V\n",
            window.0,
            window.1,
            opt(charge.difference_percent, 2),
            opt(sag.depth_difference, 4)
        ));
        output
    }

    /// One row per trace
    pub fn format_lifetimes(rows: &[(String, LifetimeReport)]) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(header(&[
            "Trace",
            "Status",
            "Lifetime\n(days)",
            "Lifetime\n(s)",
            "Final SOC",
        ]));

        for (name, report) in rows {
            let status = match report.status {
                LifetimeStatus::Depleted => Cell::new("DEPLETED").fg(Color::Red),
                LifetimeStatus::Alive => Cell::new("ALIVE").fg(Color::Green),
            };
            table.add_row(vec![
                Cell::new(name),
                status,
                Cell::new(format!("{:.3}", report.lifetime_days())),
                Cell::new(format!("{:.1}", report.lifetime_s)),
                Cell::new(format!("{:.4}", report.final_soc)),
            ]);
        }

        let mut output = table.to_string();
        output.push('\n');
        output
    }
}

#[derive(Serialize)]
struct HistogramRow<'a> {
    converter: &'a str,
    phase: &'a str,
    bin: usize,
    lower: f64,
    upper: f64,
    count: usize,
}

impl CsvFormatter {
    /// Write every histogram bin as one CSV row
    pub fn write_histograms(distributions: &[&EfficiencyDistribution], path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        for dist in distributions {
            for part in &dist.partitions {
                let Some(hist) = &part.histogram else {
                    continue;
                };
                let edges = hist.bin_edges();
                for (bin, count) in hist.counts.iter().enumerate() {
                    writer.serialize(HistogramRow {
                        converter: dist.kind.label(),
                        phase: partition_label(part.key),
                        bin,
                        lower: edges[bin],
                        upper: edges[bin + 1],
                        count: *count,
                    })?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }
}
