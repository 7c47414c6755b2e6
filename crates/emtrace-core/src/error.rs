// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! Error types for trace loading and analysis

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed trace {source_name} (line {line}): {reason}")]
    Malformed {
        source_name: String,
        line: usize,
        reason: String,
    },

    #[error("missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("no samples remain: {context}")]
    Empty { context: String },

    #[error("invalid window [{start_s}, {end_s}]: start is after end")]
    InvalidWindow { start_s: f64, end_s: f64 },

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
}

impl TraceError {
    pub(crate) fn malformed(source_name: &str, line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            source_name: source_name.to_owned(),
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(column: &str) -> Self {
        Self::MissingColumn {
            column: column.to_owned(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TraceError>;
