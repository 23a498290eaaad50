//! Runtime configuration schema and TOML loading.
//!
//! One TOML file describes the cycle timing, logging, debug attach,
//! performance tuning and the cycle graph (blocks + wiring + outputs).
//! Scalar bounds are checked here; graph wiring is checked when the
//! runtime builds the graph.
//!
//! # Usage
//!
//! ```rust,no_run
//! use plc_common::config::{ConfigError, RuntimeConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = RuntimeConfig::load_validated(Path::new("config/runtime.toml"))?;
//!     println!("period: {} ms", config.runtime.cycle_period_ms);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::consts::{
    CYCLE_PERIOD_MS_DEFAULT, CYCLE_PERIOD_MS_MAX, CYCLE_PERIOD_MS_MIN, DEBUG_HOST_DEFAULT,
    DEBUG_PORT_DEFAULT, DEBUG_PORT_MIN, DEBUG_TIMEOUT_S_DEFAULT, MAX_FUNCTION_BLOCKS_DEFAULT,
    MAX_FUNCTION_BLOCKS_LIMIT, RT_PRIORITY_DEFAULT, STATS_INTERVAL_DEFAULT,
    TIMEOUT_THRESHOLD_PERCENT_DEFAULT,
};
use crate::graph::{BlockConfig, OutputConfig};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.to_path_buf())
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Any serde-deserializable struct can be loaded from TOML.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Sections ───────────────────────────────────────────────────────

/// `[runtime]`: cycle timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CycleConfig {
    /// Target cycle period [ms].
    #[serde(default = "default_cycle_period_ms")]
    pub cycle_period_ms: u32,

    /// Timeout threshold [% of period] for per-cycle warnings.
    #[serde(default = "default_timeout_threshold")]
    pub timeout_threshold_percent: u32,

    /// Stop after this many cycles (unbounded when absent).
    #[serde(default)]
    pub max_cycles: Option<u64>,
}

impl CycleConfig {
    /// Target period as a `Duration`.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.cycle_period_ms as u64)
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            cycle_period_ms: CYCLE_PERIOD_MS_DEFAULT,
            timeout_threshold_percent: TIMEOUT_THRESHOLD_PERCENT_DEFAULT,
            max_cycles: None,
        }
    }
}

/// `[logging]`: subscriber setup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level emitted.
    #[serde(default)]
    pub level: LogLevel,

    /// Append log lines to this file instead of stdout.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Emit JSON lines.
    #[serde(default)]
    pub json: bool,
}

/// `[debug]`: debug-attach listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_debug_host")]
    pub host: String,

    #[serde(default = "default_debug_port")]
    pub port: u16,

    /// Idle client timeout [s].
    #[serde(default = "default_debug_timeout")]
    pub timeout_s: u64,
}

impl DebugConfig {
    /// `host:port` listen address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: DEBUG_HOST_DEFAULT.to_string(),
            port: DEBUG_PORT_DEFAULT,
            timeout_s: DEBUG_TIMEOUT_S_DEFAULT,
        }
    }
}

/// `[performance]`: RT tuning and graph size limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerformanceConfig {
    /// CPU core to pin the cycle thread to (no pinning when absent).
    #[serde(default)]
    pub cpu_affinity: Option<usize>,

    /// SCHED_FIFO priority (only applied with the `rt` feature).
    #[serde(default = "default_rt_priority")]
    pub rt_priority: i32,

    /// Maximum number of blocks in the cycle graph.
    #[serde(default = "default_max_function_blocks")]
    pub max_function_blocks: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            cpu_affinity: None,
            rt_priority: RT_PRIORITY_DEFAULT,
            max_function_blocks: MAX_FUNCTION_BLOCKS_DEFAULT,
        }
    }
}

/// `[diagnostics]`: what goes into each cycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsConfig {
    /// Attach a per-block snapshot to every cycle record.
    #[serde(default)]
    pub snapshot_blocks: bool,

    /// Cycles between statistics log lines.
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            snapshot_blocks: false,
            stats_interval: STATS_INTERVAL_DEFAULT,
        }
    }
}

fn default_cycle_period_ms() -> u32 {
    CYCLE_PERIOD_MS_DEFAULT
}
fn default_timeout_threshold() -> u32 {
    TIMEOUT_THRESHOLD_PERCENT_DEFAULT
}
fn default_debug_host() -> String {
    DEBUG_HOST_DEFAULT.to_string()
}
fn default_debug_port() -> u16 {
    DEBUG_PORT_DEFAULT
}
fn default_debug_timeout() -> u64 {
    DEBUG_TIMEOUT_S_DEFAULT
}
fn default_rt_priority() -> i32 {
    RT_PRIORITY_DEFAULT
}
fn default_max_function_blocks() -> usize {
    MAX_FUNCTION_BLOCKS_DEFAULT
}
fn default_stats_interval() -> u64 {
    STATS_INTERVAL_DEFAULT
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete runtime configuration.
///
/// # TOML Example
///
/// ```toml
/// [runtime]
/// cycle_period_ms = 100
///
/// [inputs]
/// setpoint = 60.0
/// temperature = 20.0
///
/// [[blocks]]
/// name = "heater"
/// type = "pid"
/// kp = 2.0
/// ki = 0.5
/// output_min = 0.0
/// output_max = 100.0
/// inputs = { sp = { external = "setpoint" }, pv = { external = "temperature" } }
///
/// [[outputs]]
/// name = "heater_power"
/// block = "heater"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub runtime: CycleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub debug: DebugConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    /// Initial values of the external process-image inputs.
    #[serde(default)]
    pub inputs: BTreeMap<String, f64>,

    /// Blocks in evaluation order.
    #[serde(default)]
    pub blocks: Vec<BlockConfig>,

    /// Named outputs published to the process image.
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

impl RuntimeConfig {
    /// Parse from a TOML string (no validation).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load from file and validate scalar bounds.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `cycle_period_ms` is outside `[10, 1000]`
    /// - `timeout_threshold_percent` is below 100
    /// - `max_cycles` is zero
    /// - the debug listener is enabled with an empty host or a port below 1024
    /// - `max_function_blocks` is zero or above the snapshot capacity
    /// - `stats_interval` is zero
    /// - an initial input value is not finite
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rt = &self.runtime;
        if rt.cycle_period_ms < CYCLE_PERIOD_MS_MIN || rt.cycle_period_ms > CYCLE_PERIOD_MS_MAX {
            return Err(ConfigError::ValidationError(format!(
                "runtime.cycle_period_ms {} out of range [{}, {}]",
                rt.cycle_period_ms, CYCLE_PERIOD_MS_MIN, CYCLE_PERIOD_MS_MAX
            )));
        }
        if rt.timeout_threshold_percent < 100 {
            return Err(ConfigError::ValidationError(format!(
                "runtime.timeout_threshold_percent {} must be >= 100",
                rt.timeout_threshold_percent
            )));
        }
        if rt.max_cycles == Some(0) {
            return Err(ConfigError::ValidationError(
                "runtime.max_cycles must be > 0 when set".to_string(),
            ));
        }

        if self.debug.enabled {
            if self.debug.host.is_empty() {
                return Err(ConfigError::ValidationError(
                    "debug.host cannot be empty".to_string(),
                ));
            }
            if self.debug.port < DEBUG_PORT_MIN {
                return Err(ConfigError::ValidationError(format!(
                    "debug.port {} out of range [{}, 65535]",
                    self.debug.port, DEBUG_PORT_MIN
                )));
            }
        }

        let max_blocks = self.performance.max_function_blocks;
        if max_blocks == 0 || max_blocks > MAX_FUNCTION_BLOCKS_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "performance.max_function_blocks {} out of range [1, {}]",
                max_blocks, MAX_FUNCTION_BLOCKS_LIMIT
            )));
        }

        if self.diagnostics.stats_interval == 0 {
            return Err(ConfigError::ValidationError(
                "diagnostics.stats_interval must be > 0".to_string(),
            ));
        }

        for (name, value) in &self.inputs {
            if !value.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "inputs.{name} is not a finite number"
                )));
            }
        }

        Ok(())
    }
}
