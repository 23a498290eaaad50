//! # PLC Cycle Stability Analysis
//!
//! Extracts the measured cycle time from every
//! `cycle complete: actual <N.N> ms` line of a runtime log and checks how
//! many cycles stayed inside the jitter band around the target period.
//!
//! The pattern is matched anywhere in a line, so compact, full and JSON
//! `tracing` output all work.

use std::fmt;
use std::io::BufRead;
use std::sync::LazyLock;

use plc_common::consts::{
    CYCLE_PERIOD_MS_DEFAULT, JITTER_TOLERANCE_PERCENT, STABILITY_REQUIRED_PERCENT,
};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

static CYCLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cycle.*?actual\s+([\d.]+)\s*ms").expect("static regex is valid")
});

/// Analysis failure.
#[derive(Debug, Error)]
pub enum StabilityError {
    #[error("failed to read log: {0}")]
    Io(#[from] std::io::Error),

    #[error("no cycle timing lines found")]
    NoSamples,

    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),
}

/// Pass/fail thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StabilityCriteria {
    /// Target cycle period [ms].
    pub target_ms: f64,
    /// Half-width of the accepted band [% of target].
    pub tolerance_percent: f64,
    /// Share of cycles that must lie in the band [%].
    pub required_percent: f64,
}

impl Default for StabilityCriteria {
    fn default() -> Self {
        Self {
            target_ms: f64::from(CYCLE_PERIOD_MS_DEFAULT),
            tolerance_percent: JITTER_TOLERANCE_PERCENT,
            required_percent: STABILITY_REQUIRED_PERCENT,
        }
    }
}

impl StabilityCriteria {
    pub fn validate(&self) -> Result<(), StabilityError> {
        if !(self.target_ms.is_finite() && self.target_ms > 0.0) {
            return Err(StabilityError::InvalidCriteria(format!(
                "target period {} ms must be > 0",
                self.target_ms
            )));
        }
        if !(self.tolerance_percent.is_finite() && self.tolerance_percent >= 0.0) {
            return Err(StabilityError::InvalidCriteria(format!(
                "tolerance {}% must be >= 0",
                self.tolerance_percent
            )));
        }
        if !(0.0..=100.0).contains(&self.required_percent) {
            return Err(StabilityError::InvalidCriteria(format!(
                "required share {}% out of range [0, 100]",
                self.required_percent
            )));
        }
        Ok(())
    }

    /// Band half-width [ms].
    pub fn tolerance_ms(&self) -> f64 {
        self.target_ms * self.tolerance_percent / 100.0
    }
}

/// Extract the cycle time [ms] from one log line.
pub fn parse_line(line: &str) -> Option<f64> {
    let caps = CYCLE_LINE.captures(line)?;
    let value = caps.get(1)?.as_str();
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            debug!(value, "unparsable cycle time, skipping line");
            None
        }
    }
}

/// Collect every cycle time in `reader`, in log order.
pub fn parse_cycle_times<R: BufRead>(reader: R) -> Result<Vec<f64>, StabilityError> {
    let mut times = Vec::new();
    for line in reader.lines() {
        if let Some(ms) = parse_line(&line?) {
            times.push(ms);
        }
    }
    Ok(times)
}

/// Statistics over a set of cycle times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilityReport {
    pub criteria: StabilityCriteria,
    pub count: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    /// Sample standard deviation; 0 for a single sample.
    pub stddev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Samples inside `[target − tol, target + tol]`.
    pub within_tolerance: usize,
    pub within_percent: f64,
    pub max_deviation_ms: f64,
    pub max_deviation_percent: f64,
    pub passed: bool,
}

impl StabilityReport {
    pub fn analyze(times: &[f64], criteria: StabilityCriteria) -> Result<Self, StabilityError> {
        criteria.validate()?;
        if times.is_empty() {
            return Err(StabilityError::NoSamples);
        }

        let n = times.len();
        let mean = times.iter().sum::<f64>() / n as f64;
        let stddev = if n > 1 {
            let ss: f64 = times.iter().map(|t| (t - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            0.0
        };

        let mut sorted = times.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };

        let target = criteria.target_ms;
        let tol = criteria.tolerance_ms();
        let (lower, upper) = (target - tol, target + tol);
        let within = times.iter().filter(|&&t| t >= lower && t <= upper).count();
        let within_percent = within as f64 / n as f64 * 100.0;
        let max_deviation = times
            .iter()
            .map(|t| (t - target).abs())
            .fold(0.0, f64::max);

        Ok(Self {
            criteria,
            count: n,
            mean_ms: mean,
            median_ms: median,
            stddev_ms: stddev,
            min_ms: sorted[0],
            max_ms: sorted[n - 1],
            within_tolerance: within,
            within_percent,
            max_deviation_ms: max_deviation,
            max_deviation_percent: max_deviation / target * 100.0,
            passed: within_percent >= criteria.required_percent,
        })
    }
}

impl fmt::Display for StabilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.criteria;
        let tol = c.tolerance_ms();
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "Cycle stability report")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Target period:  {:.2} ms", c.target_ms)?;
        writeln!(
            f,
            "Tolerance:      ±{tol:.2} ms ({:.2} - {:.2} ms)",
            c.target_ms - tol,
            c.target_ms + tol
        )?;
        writeln!(f, "Cycles:         {}", self.count)?;
        writeln!(f)?;
        writeln!(f, "  mean    {:.2} ms", self.mean_ms)?;
        writeln!(f, "  median  {:.2} ms", self.median_ms)?;
        writeln!(f, "  stddev  {:.2} ms", self.stddev_ms)?;
        writeln!(f, "  min     {:.2} ms", self.min_ms)?;
        writeln!(f, "  max     {:.2} ms", self.max_ms)?;
        writeln!(f)?;
        writeln!(
            f,
            "Within tolerance: {} ({:.2}%)",
            self.within_tolerance, self.within_percent
        )?;
        writeln!(
            f,
            "Max deviation:    {:.2} ms ({:.2}%)",
            self.max_deviation_ms, self.max_deviation_percent
        )?;
        writeln!(f, "{rule}")?;
        if self.passed {
            write!(
                f,
                "PASS: {:.2}% of cycles within ±{}% (required ≥{}%)",
                self.within_percent, c.tolerance_percent, c.required_percent
            )
        } else {
            write!(
                f,
                "FAIL: only {:.2}% of cycles within ±{}% (required ≥{}%)",
                self.within_percent, c.tolerance_percent, c.required_percent
            )
        }
    }
}
