// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! Subcommand handlers.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use emtrace_core::{
    AnalysisConfig, AnalyzedTrace, DistributionReport, EfficiencyDistribution, Partitioning,
    Trace, TraceLoader, compare_charge, compare_sag, estimate_lifetime, summarize,
    write_derived_csv,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::args::{
    Cli, Commands, CompareArgs, EfficiencyArgs, ExportArgs, LifetimeArgs, OutputFormat,
    SummaryArgs,
};
use super::formatters::{CsvFormatter, JsonReport, TableFormatter};

/// Configuration and loader shared by every subcommand
struct Session {
    config: AnalysisConfig,
    loader: TraceLoader,
}

impl Session {
    fn new(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => AnalysisConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => AnalysisConfig::default(),
        };
        debug!(?config, "analysis configuration");

        let mut loader = TraceLoader::new().time_column(&config.columns.time);
        if let Some(columns) = &cli.columns {
            loader = loader.with_columns(columns);
        }
        Ok(Self { config, loader })
    }

    fn load(&self, path: &Path) -> Result<Trace> {
        self.loader
            .load(path)
            .with_context(|| format!("Failed to load trace {}", path.display()))
    }

    fn analyze(&self, path: &Path) -> Result<AnalyzedTrace> {
        let trace = self.load(path)?;
        AnalyzedTrace::new(trace, &self.config)
            .with_context(|| format!("Failed to derive quantities for {}", path.display()))
    }
}

pub fn run(cli: &Cli) -> Result<()> {
    if matches!(cli.command, Commands::ConfigExample) {
        print!("{}", AnalysisConfig::example_toml());
        return Ok(());
    }

    let session = Session::new(cli)?;
    match &cli.command {
        Commands::Summary(args) => summary(&session, args),
        Commands::Efficiency(args) => efficiency(&session, args),
        Commands::Compare(args) => compare(&session, args),
        Commands::Lifetime(args) => lifetime(&session, args),
        Commands::Export(args) => export(&session, args),
        Commands::ConfigExample => Ok(()),
    }
}

fn source_name(path: &Path) -> String {
    path.display().to_string()
}

fn print_json<T: Serialize>(sources: Vec<String>, report: &T) -> Result<()> {
    println!("{}", JsonReport::new(sources, report).to_pretty()?);
    Ok(())
}

#[derive(Serialize)]
struct SummaryReport<'a> {
    samples: usize,
    days: f64,
    distribution: &'a DistributionReport,
    lifetime: Option<emtrace_core::LifetimeReport>,
}

fn summary(session: &Session, args: &SummaryArgs) -> Result<()> {
    let analyzed = session.analyze(&args.trace)?;
    let trace = analyzed.trace();
    let report = DistributionReport::build(analyzed.samples(), &session.config.distribution);

    // A trace without SOC still has a meaningful summary
    let lifetime = if trace.has_column(&session.config.columns.soc) {
        Some(estimate_lifetime(
            trace,
            &session.config.columns.soc,
            &session.config.lifetime,
        )?)
    } else {
        warn!(
            column = session.config.columns.soc.as_str(),
            "no state-of-charge column, skipping lifetime"
        );
        None
    };

    match args.output {
        OutputFormat::Table => print!(
            "{}",
            TableFormatter::format_summary(
                trace.source_name(),
                trace.len(),
                trace.duration_days(),
                &report,
                lifetime.as_ref(),
            )
        ),
        OutputFormat::Json => print_json(
            vec![source_name(&args.trace)],
            &SummaryReport {
                samples: trace.len(),
                days: trace.duration_days(),
                distribution: &report,
                lifetime,
            },
        )?,
    }
    Ok(())
}

fn efficiency(session: &Session, args: &EfficiencyArgs) -> Result<()> {
    let analyzed = session.analyze(&args.trace)?;
    let partitioning = Partitioning::from(args.by);
    let distributions: Vec<EfficiencyDistribution> = args
        .kind
        .kinds()
        .into_iter()
        .map(|kind| EfficiencyDistribution {
            kind,
            partitioning,
            partitions: summarize(
                analyzed.samples(),
                kind,
                partitioning,
                &session.config.distribution,
            ),
        })
        .collect();
    let refs: Vec<&EfficiencyDistribution> = distributions.iter().collect();

    if let Some(path) = &args.histogram_csv {
        CsvFormatter::write_histograms(&refs, path)?;
        info!(path = %path.display(), "wrote histogram bins");
    }

    match args.output {
        OutputFormat::Table => print!("{}", TableFormatter::format_distributions(&refs)),
        OutputFormat::Json => print_json(vec![source_name(&args.trace)], &distributions)?,
    }
    Ok(())
}

#[derive(Serialize)]
struct CompareReport {
    start_s: f64,
    end_s: f64,
    column: String,
    charge: emtrace_core::ChargeComparison,
    sag: emtrace_core::SagComparison,
}

fn compare(session: &Session, args: &CompareArgs) -> Result<()> {
    let a = session.load(&args.a)?;
    let b = session.load(&args.b)?;
    let window_a = a.window(args.start, args.end)?;
    let window_b = b.window(args.start, args.end)?;
    for (path, window) in [(&args.a, &window_a), (&args.b, &window_b)] {
        if window.len() < 2 {
            warn!(
                trace = %path.display(),
                samples = window.len(),
                "window holds fewer than two samples, net charge is zero"
            );
        }
    }

    let column = args
        .column
        .clone()
        .unwrap_or_else(|| session.config.columns.bus_current.clone());
    let charge = compare_charge(&window_a, &window_b, &column)?;
    let sag = compare_sag(&window_a, &window_b, &session.config.columns.battery_voltage)?;

    match args.output {
        OutputFormat::Table => print!(
            "{}",
            TableFormatter::format_comparison(
                (a.source_name(), b.source_name()),
                (args.start, args.end),
                &charge,
                &sag,
            )
        ),
        OutputFormat::Json => print_json(
            vec![source_name(&args.a), source_name(&args.b)],
            &CompareReport {
                start_s: args.start,
                end_s: args.end,
                column,
                charge,
                sag,
            },
        )?,
    }
    Ok(())
}

fn lifetime(session: &Session, args: &LifetimeArgs) -> Result<()> {
    let rows = args
        .traces
        .iter()
        .map(|path| {
            let trace = session.load(path)?;
            let report = estimate_lifetime(
                &trace,
                &session.config.columns.soc,
                &session.config.lifetime,
            )
            .with_context(|| format!("Failed to estimate lifetime for {}", path.display()))?;
            Ok((source_name(path), report))
        })
        .collect::<Result<Vec<_>>>()?;

    match args.output {
        OutputFormat::Table => print!("{}", TableFormatter::format_lifetimes(&rows)),
        OutputFormat::Json => {
            let sources = rows.iter().map(|(name, _)| name.clone()).collect();
            print_json(sources, &rows)?;
        }
    }
    Ok(())
}

fn export(session: &Session, args: &ExportArgs) -> Result<()> {
    let analyzed = session.analyze(&args.trace)?;
    let rows = match &args.out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_derived_csv(analyzed.samples(), BufWriter::new(file))?
        }
        None => write_derived_csv(analyzed.samples(), io::stdout().lock())?,
    };
    info!(rows, "exported derived samples");
    Ok(())
}
