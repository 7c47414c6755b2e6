// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of emtrace.

//! Trace loading and read-only windows over a loaded trace.
//!
//! A simulator log is a whitespace- or tab-delimited table. The header is the
//! first non-blank line that is not a comment; a `%` line counts as the header
//! only when its first name is the time column (`%time soc`). With an explicit
//! column list, every line starting with `%` is a comment. `%` characters in header
//! names (`%time`) are stripped.
//!
//! The loaded [`Trace`] is column-major and immutable. Two cache columns,
//! `day` and `hour`, are appended from the time column at load time.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Result, TraceError};

pub const DEFAULT_TIME_COLUMN: &str = "time";
pub const DAY_COLUMN: &str = "day";
pub const HOUR_COLUMN: &str = "hour";

pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const SECONDS_PER_HOUR: f64 = 3_600.0;

const COMMENT_PREFIX: char = '%';

/// A fully materialized simulator trace
#[derive(Debug, Clone)]
pub struct Trace {
    source_name: String,
    time_column: String,
    names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<f64>>,
}

impl Trace {
    /// Build a trace from named columns.
    ///
    /// Columns must all have the same length and the time column must be
    /// finite and non-decreasing. `day` and `hour` columns are (re)computed.
    pub fn from_columns(
        source_name: &str,
        time_column: &str,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let mut names = Vec::with_capacity(columns.len() + 2);
        let mut data = Vec::with_capacity(columns.len() + 2);
        let mut index = HashMap::with_capacity(columns.len() + 2);

        for (name, values) in columns {
            if index.insert(name.clone(), names.len()).is_some() {
                return Err(TraceError::malformed(
                    source_name,
                    0,
                    format!("duplicate column '{name}'"),
                ));
            }
            names.push(name);
            data.push(values);
        }

        let time_idx = *index
            .get(time_column)
            .ok_or_else(|| TraceError::missing(time_column))?;
        let len = data[time_idx].len();

        if let Some((name, values)) = names
            .iter()
            .zip(&data)
            .find(|(_, values)| values.len() != len)
        {
            return Err(TraceError::malformed(
                source_name,
                0,
                format!(
                    "column '{name}' has {} values, expected {len}",
                    values.len()
                ),
            ));
        }

        let time = &data[time_idx];
        for (i, t) in time.iter().enumerate() {
            if !t.is_finite() {
                return Err(TraceError::malformed(
                    source_name,
                    0,
                    format!("sample {i} has non-finite time"),
                ));
            }
            if i > 0 && *t < time[i - 1] {
                return Err(TraceError::malformed(
                    source_name,
                    0,
                    format!("time decreases at sample {i} ({} -> {t})", time[i - 1]),
                ));
            }
        }

        let days: Vec<f64> = time.iter().map(|t| t / SECONDS_PER_DAY).collect();
        let hours: Vec<f64> = time.iter().map(|t| t / SECONDS_PER_HOUR).collect();

        let mut trace = Self {
            source_name: source_name.to_owned(),
            time_column: time_column.to_owned(),
            names,
            index,
            columns: data,
        };
        trace.set_column(DAY_COLUMN, days);
        trace.set_column(HOUR_COLUMN, hours);
        Ok(trace)
    }

    fn set_column(&mut self, name: &str, values: Vec<f64>) {
        if let Some(&idx) = self.index.get(name) {
            self.columns[idx] = values;
        } else {
            self.index.insert(name.to_owned(), self.names.len());
            self.names.push(name.to_owned());
            self.columns.push(values);
        }
    }

    /// File name or label the trace was loaded from
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.time().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names in schema order, including the computed `day`/`hour`
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Values of a column; absent cells are NaN
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.index
            .get(name)
            .map(|&idx| self.columns[idx].as_slice())
            .ok_or_else(|| TraceError::missing(name))
    }

    /// Check that every named column exists, failing on the first absent one
    pub fn require_columns<'a, I>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match names.into_iter().find(|name| !self.has_column(name)) {
            Some(name) => Err(TraceError::missing(name)),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    #[must_use]
    pub fn time(&self) -> &[f64] {
        &self.columns[self.index[&self.time_column]]
    }

    /// Time of the last sample expressed in days
    #[must_use]
    pub fn duration_days(&self) -> f64 {
        self.time().last().map_or(0.0, |t| t / SECONDS_PER_DAY)
    }

    /// View over every sample
    #[must_use]
    pub fn full(&self) -> TraceWindow<'_> {
        TraceWindow {
            trace: self,
            start: 0,
            end: self.len(),
        }
    }

    /// Samples with `start_s <= time <= end_s`
    pub fn window(&self, start_s: f64, end_s: f64) -> Result<TraceWindow<'_>> {
        if start_s.is_nan() || end_s.is_nan() || start_s > end_s {
            return Err(TraceError::InvalidWindow { start_s, end_s });
        }
        let time = self.time();
        Ok(TraceWindow {
            trace: self,
            start: time.partition_point(|t| *t < start_s),
            end: time.partition_point(|t| *t <= end_s),
        })
    }

    /// Samples with `time >= start_s`
    #[must_use]
    pub fn since(&self, start_s: f64) -> TraceWindow<'_> {
        TraceWindow {
            trace: self,
            start: self.time().partition_point(|t| *t < start_s),
            end: self.len(),
        }
    }
}

/// A contiguous, read-only range of samples of a [`Trace`]
#[derive(Debug, Clone, Copy)]
pub struct TraceWindow<'a> {
    trace: &'a Trace,
    start: usize,
    end: usize,
}

impl<'a> TraceWindow<'a> {
    #[must_use]
    pub fn trace(&self) -> &'a Trace {
        self.trace
    }

    /// Index of the first sample in the underlying trace
    #[must_use]
    pub fn start_index(&self) -> usize {
        self.start
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub fn time(&self) -> &'a [f64] {
        &self.trace.time()[self.start..self.end]
    }

    pub fn column(&self, name: &str) -> Result<&'a [f64]> {
        Ok(&self.trace.column(name)?[self.start..self.end])
    }

    #[must_use]
    pub fn first_time(&self) -> Option<f64> {
        self.time().first().copied()
    }

    #[must_use]
    pub fn last_time(&self) -> Option<f64> {
        self.time().last().copied()
    }

    /// Split at the first sample with `time >= at_s`.
    ///
    /// Both halves contain that boundary sample, so a trapezoidal integral
    /// over the two halves adds up to the integral over the whole window.
    #[must_use]
    pub fn split_at(&self, at_s: f64) -> (TraceWindow<'a>, TraceWindow<'a>) {
        if self.is_empty() {
            return (*self, *self);
        }
        let offset = self.time().partition_point(|t| *t < at_s);
        let boundary = (self.start + offset).min(self.end - 1);
        (
            TraceWindow {
                trace: self.trace,
                start: self.start,
                end: boundary + 1,
            },
            TraceWindow {
                trace: self.trace,
                start: boundary,
                end: self.end,
            },
        )
    }
}

/// Parses simulator logs into [`Trace`]s
#[derive(Debug, Clone)]
pub struct TraceLoader {
    columns: Option<Vec<String>>,
    required: Vec<String>,
    time_column: String,
}

impl Default for TraceLoader {
    fn default() -> Self {
        Self {
            columns: None,
            required: Vec::new(),
            time_column: DEFAULT_TIME_COLUMN.to_owned(),
        }
    }
}

impl TraceLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit schema instead of reading a header line
    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.columns = Some(
            columns
                .into_iter()
                .filter_map(|c| normalize_column_name(c.as_ref()))
                .collect(),
        );
        self
    }

    /// Fail the load if any of these columns is absent from the schema
    #[must_use]
    pub fn require<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.required
            .extend(columns.into_iter().map(|c| c.as_ref().to_owned()));
        self
    }

    #[must_use]
    pub fn time_column(mut self, name: &str) -> Self {
        name.clone_into(&mut self.time_column);
        self
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Trace> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(&path.display().to_string(), &text)
    }

    /// Parse trace text; `source_name` labels errors and log events
    pub fn parse(&self, source_name: &str, text: &str) -> Result<Trace> {
        let mut names = self.columns.clone();
        if let Some(names) = &names {
            self.check_schema(names)?;
        }

        let mut columns: Vec<Vec<f64>> = Vec::new();
        let mut time_idx = 0;
        let mut comments = 0_usize;
        let mut non_numeric = 0_usize;
        let mut last_line = 0;

        for (line_idx, raw) in text.lines().enumerate() {
            let line_no = line_idx + 1;
            last_line = line_no;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if names.is_none() {
                let header = parse_header(line);
                // Comment lines may precede the header. A `%` line is the
                // header only when it starts with the time column name.
                if line.starts_with(COMMENT_PREFIX)
                    && header.first().is_none_or(|first| *first != self.time_column)
                {
                    comments += 1;
                    continue;
                }
                if header.is_empty() {
                    return Err(TraceError::malformed(
                        source_name,
                        line_no,
                        "header line has no column names",
                    ));
                }
                self.check_schema(&header)?;
                names = Some(header);
                continue;
            }
            let Some(schema) = names.as_ref() else {
                continue;
            };

            if columns.is_empty() {
                columns = vec![Vec::new(); schema.len()];
                time_idx = schema
                    .iter()
                    .position(|n| *n == self.time_column)
                    .ok_or_else(|| TraceError::missing(&self.time_column))?;
            }

            if line.starts_with(COMMENT_PREFIX) {
                comments += 1;
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != schema.len() {
                return Err(TraceError::malformed(
                    source_name,
                    line_no,
                    format!(
                        "expected {} columns, found {}",
                        schema.len(),
                        tokens.len()
                    ),
                ));
            }

            for (col, token) in tokens.iter().enumerate() {
                let parsed = token.parse::<f64>();
                if col == time_idx {
                    match parsed {
                        Ok(t) if t.is_finite() => columns[col].push(t),
                        Ok(_) | Err(_) => {
                            return Err(TraceError::malformed(
                                source_name,
                                line_no,
                                format!("non-numeric time value '{token}'"),
                            ));
                        }
                    }
                } else if let Ok(value) = parsed {
                    columns[col].push(value);
                } else {
                    non_numeric += 1;
                    columns[col].push(f64::NAN);
                }
            }

            let time = &columns[time_idx];
            if let [.., prev, cur] = time.as_slice()
                && cur < prev
            {
                return Err(TraceError::malformed(
                    source_name,
                    line_no,
                    format!("time decreases from {prev} to {cur}"),
                ));
            }
        }

        let Some(names) = names else {
            return Err(TraceError::malformed(source_name, last_line, "file is empty"));
        };
        if columns.first().is_none_or(Vec::is_empty) {
            return Err(TraceError::malformed(
                source_name,
                last_line,
                "no data rows after filtering comment lines",
            ));
        }

        debug!(
            source = source_name,
            comments, non_numeric, "skipped comment lines and absent cells"
        );

        let trace = Trace::from_columns(
            source_name,
            &self.time_column,
            names.into_iter().zip(columns).collect(),
        )?;

        info!(
            source = source_name,
            samples = trace.len(),
            columns = trace.column_names().len(),
            days = trace.duration_days(),
            "loaded trace"
        );
        Ok(trace)
    }

    fn check_schema(&self, names: &[String]) -> Result<()> {
        let present = |name: &str| names.iter().any(|n| n == name);
        if !present(&self.time_column) {
            return Err(TraceError::missing(&self.time_column));
        }
        match self.required.iter().find(|name| !present(name)) {
            Some(name) => Err(TraceError::missing(name)),
            None => Ok(()),
        }
    }
}

/// Load a trace whose first line is a header
pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Trace> {
    TraceLoader::new().load(path)
}

fn parse_header(line: &str) -> Vec<String> {
    line.split_whitespace()
        .filter_map(normalize_column_name)
        .collect()
}

fn normalize_column_name(raw: &str) -> Option<String> {
    let name = raw.replace(COMMENT_PREFIX, "");
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "%time soc i_tot\n0 1.0 5\n10 0.9 5\n20 0.8 5\n";

    #[test]
    fn test_header_percent_prefix_is_stripped() {
        let trace = TraceLoader::new().parse("sample", SAMPLE).unwrap();
        assert_eq!(
            trace.column_names(),
            &["time", "soc", "i_tot", "day", "hour"]
        );
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.time(), &[0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_standalone_percent_token_is_dropped() {
        let trace = TraceLoader::new()
            .parse("sample", "% time soc\n0\t0.5\n1\t0.4\n")
            .unwrap();
        assert_eq!(trace.column_names(), &["time", "soc", "day", "hour"]);
    }

    #[test]
    fn test_time_unit_columns() {
        let trace = TraceLoader::new()
            .parse("sample", "time x\n0 1\n43200 1\n86400 1\n")
            .unwrap();
        assert_eq!(trace.column(DAY_COLUMN).unwrap(), &[0.0, 0.5, 1.0]);
        assert_eq!(trace.column(HOUR_COLUMN).unwrap(), &[0.0, 12.0, 24.0]);
        assert!((trace.duration_days() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_explicit_columns_skip_comment_lines() {
        let text = "% simulator v1.2\n%time soc\n0 0.5\n% checkpoint\n1 0.4\n";
        let trace = TraceLoader::new()
            .with_columns(["time", "soc"])
            .parse("sample", text)
            .unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.column("soc").unwrap(), &[0.5, 0.4]);
    }

    #[test]
    fn test_inconsistent_column_count_is_malformed() {
        let err = TraceLoader::new()
            .parse("sample", "time soc\n0 0.5\n1\n")
            .unwrap_err();
        let TraceError::Malformed { line, reason, .. } = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(line, 3);
        assert!(reason.contains("expected 2 columns"));
    }

    #[test]
    fn test_comment_mentioning_time_before_header() {
        let trace = TraceLoader::new()
            .parse("sample", "% run started, time 0
time soc
0 0.5
10 0.4
")
            .unwrap();
        assert_eq!(trace.column_names(), &["time", "soc", "day", "hour"]);
        assert_eq!(trace.time(), &[0.0, 10.0]);
    }

    #[test]
    fn test_non_numeric_time_is_malformed() {
        let err = TraceLoader::new()
            .parse("sample", "time soc\nabc 0.5\n")
            .unwrap_err();
        assert!(matches!(err, TraceError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_decreasing_time_is_malformed() {
        let err = TraceLoader::new()
            .parse("sample", "time soc\n5 0.5\n4 0.5\n")
            .unwrap_err();
        assert!(err.to_string().contains("time decreases"));
    }

    #[test]
    fn test_non_numeric_signal_cell_is_absent() {
        let trace = TraceLoader::new()
            .parse("sample", "time soc\n0 nan\n1 -\n2 0.3\n")
            .unwrap();
        let soc = trace.column("soc").unwrap();
        assert!(soc[0].is_nan());
        assert!(soc[1].is_nan());
        assert!((soc[2] - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_after_comments_is_malformed() {
        let err = TraceLoader::new()
            .with_columns(["time", "soc"])
            .parse("sample", "% only\n% comments\n")
            .unwrap_err();
        assert!(matches!(err, TraceError::Malformed { .. }));

        let err = TraceLoader::new().parse("sample", "").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_missing_time_column() {
        let err = TraceLoader::new()
            .parse("sample", "t soc\n0 1\n")
            .unwrap_err();
        assert!(matches!(err, TraceError::MissingColumn { column } if column == "time"));
    }

    #[test]
    fn test_required_column_checked_at_load() {
        let err = TraceLoader::new()
            .require(["soc", "v_pv"])
            .parse("sample", SAMPLE)
            .unwrap_err();
        assert!(matches!(err, TraceError::MissingColumn { column } if column == "v_pv"));
    }

    #[test]
    fn test_window_is_inclusive() {
        let trace = TraceLoader::new().parse("sample", SAMPLE).unwrap();
        let window = trace.window(10.0, 20.0).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window.start_index(), 1);
        assert_eq!(window.column("soc").unwrap(), &[0.9, 0.8]);

        assert!(trace.window(30.0, 40.0).unwrap().is_empty());
        assert!(matches!(
            trace.window(20.0, 10.0),
            Err(TraceError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn test_since_drops_earlier_samples() {
        let trace = TraceLoader::new().parse("sample", SAMPLE).unwrap();
        let window = trace.since(10.0);
        assert_eq!(window.time(), &[10.0, 20.0]);
    }

    #[test]
    fn test_split_shares_boundary_sample() {
        let trace = TraceLoader::new().parse("sample", SAMPLE).unwrap();
        let (left, right) = trace.full().split_at(10.0);
        assert_eq!(left.time(), &[0.0, 10.0]);
        assert_eq!(right.time(), &[10.0, 20.0]);

        let (left, right) = trace.full().split_at(100.0);
        assert_eq!(left.len(), 3);
        assert_eq!(right.time(), &[20.0]);
    }

    #[test]
    fn test_from_columns_rejects_ragged_input() {
        let err = Trace::from_columns(
            "ragged",
            "time",
            vec![
                ("time".to_owned(), vec![0.0, 1.0]),
                ("soc".to_owned(), vec![1.0]),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("soc"));
    }
}
