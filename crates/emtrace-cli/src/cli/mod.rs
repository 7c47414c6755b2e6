// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! Command-line interface for trace analysis.

pub mod args;
pub mod commands;
pub mod formatters;

pub use args::Cli;
pub use commands::run;
