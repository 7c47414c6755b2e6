// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use emtrace_core::{EfficiencyKind, Partitioning};

#[derive(Parser, Debug)]
#[command(name = "emtrace")]
#[command(author, version, about = "Energy-harvesting simulator trace analysis")]
#[command(
    long_about = "Analyze whitespace-separated simulator logs: power flows, converter \
    efficiencies,\nnet charge, battery lifetime and efficiency distributions.\n\
    \nExamples:\n  \
    emtrace summary sim_a.dat                    # Overview of one trace\n  \
    emtrace efficiency sim_a.dat --by phase      # Efficiencies split by charge/discharge\n  \
    emtrace compare sim_a.dat sim_b.dat          # Net charge over the first 120 s\n  \
    emtrace lifetime runs/*.dat --output json    # Time to depletion per trace"
)]
pub struct Cli {
    /// TOML analysis configuration (defaults apply without one)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Comma-separated column names for logs without a header line
    #[arg(
        long,
        global = true,
        value_name = "NAMES",
        value_delimiter = ',',
        long_help = "Explicit column schema, in file order.\n\
          Every '%' line is then treated as a comment.\n\
          \nExample: --columns time,soc,i_tot,i_pv,v_pv,real_i_pv,i_batt,v_batt"
    )]
    pub columns: Option<Vec<String>>,

    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Overview of one trace: size, duty cycle, efficiencies and lifetime
    Summary(SummaryArgs),

    /// Efficiency statistics and histograms per phase
    #[command(
        long_about = "Summary statistics of valid converter efficiencies, partitioned by\n\
        day/night or by battery phase. Values outside the accepted range are\n\
        counted as discarded and never aggregated.\n\
        \nExamples:\n  \
        emtrace efficiency sim_a.dat\n  \
        emtrace efficiency sim_a.dat --kind discharge --by phase\n  \
        emtrace efficiency sim_a.dat --histogram-csv hist.csv"
    )]
    Efficiency(EfficiencyArgs),

    /// Compare net charge and voltage sag of two traces over a time window
    Compare(CompareArgs),

    /// Battery lifetime of one or more traces
    Lifetime(LifetimeArgs),

    /// Write per-sample derived quantities as CSV
    Export(ExportArgs),

    /// Print an example configuration file
    ConfigExample,
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Simulator log to analyze
    pub trace: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct EfficiencyArgs {
    /// Simulator log to analyze
    pub trace: PathBuf,

    /// Efficiency to report
    #[arg(long, value_enum, default_value_t = KindArg::All)]
    pub kind: KindArg,

    /// How samples are partitioned
    #[arg(long, value_enum, default_value_t = PartitionArg::Daylight)]
    pub by: PartitionArg,

    /// Also write histogram bins to this CSV file
    #[arg(long, value_name = "PATH")]
    pub histogram_csv: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// First trace
    pub a: PathBuf,

    /// Second trace
    pub b: PathBuf,

    /// Window start (s)
    #[arg(long, default_value_t = 0.0)]
    pub start: f64,

    /// Window end (s)
    #[arg(long, default_value_t = 120.0)]
    pub end: f64,

    /// Current column to integrate (defaults to the configured bus current)
    #[arg(long, value_name = "NAME")]
    pub column: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct LifetimeArgs {
    /// Simulator logs to analyze
    #[arg(required = true)]
    pub traces: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Simulator log to export
    pub trace: PathBuf,

    /// Destination file (stdout when omitted)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Pv,
    Discharge,
    Charge,
    All,
}

impl KindArg {
    #[must_use]
    pub fn kinds(self) -> Vec<EfficiencyKind> {
        match self {
            Self::Pv => vec![EfficiencyKind::Pv],
            Self::Discharge => vec![EfficiencyKind::Discharge],
            Self::Charge => vec![EfficiencyKind::Charge],
            Self::All => EfficiencyKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PartitionArg {
    None,
    Daylight,
    Phase,
}

impl From<PartitionArg> for Partitioning {
    fn from(arg: PartitionArg) -> Self {
        match arg {
            PartitionArg::None => Self::None,
            PartitionArg::Daylight => Self::Daylight,
            PartitionArg::Phase => Self::BatteryPhase,
        }
    }
}
