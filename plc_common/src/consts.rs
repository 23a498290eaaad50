//! System-wide constants for the PLC runtime workspace.
//!
//! Single source of truth for numeric limits and defaults.
//! Imported by all crates, no duplication permitted.

/// Default cycle period in milliseconds.
pub const CYCLE_PERIOD_MS_DEFAULT: u32 = 100;

/// Shortest accepted cycle period [ms].
pub const CYCLE_PERIOD_MS_MIN: u32 = 10;

/// Longest accepted cycle period [ms].
pub const CYCLE_PERIOD_MS_MAX: u32 = 1000;

/// A cycle whose measured duration exceeds this share of the period is
/// reported as a timeout [% of period].
pub const TIMEOUT_THRESHOLD_PERCENT_DEFAULT: u32 = 110;

/// Default number of function blocks accepted in one cycle graph.
pub const MAX_FUNCTION_BLOCKS_DEFAULT: usize = 32;

/// Hard upper bound on function blocks (fixed snapshot capacity).
pub const MAX_FUNCTION_BLOCKS_LIMIT: usize = 64;

/// Maximum number of input ports on any block type.
pub const MAX_BLOCK_INPUTS: usize = 2;

/// Largest accepted PID gain (kp, ki, kd).
pub const PID_GAIN_MAX: f64 = 1.0e6;

/// Largest accepted first-order time constant [s].
pub const TIME_CONSTANT_MAX_S: f64 = 1.0e6;

/// Default debug-attach listen address.
pub const DEBUG_HOST_DEFAULT: &str = "127.0.0.1";

/// Default debug-attach port.
pub const DEBUG_PORT_DEFAULT: u16 = 5678;

/// Lowest debug-attach port accepted (no privileged ports).
pub const DEBUG_PORT_MIN: u16 = 1024;

/// Idle debug client timeout [s].
pub const DEBUG_TIMEOUT_S_DEFAULT: u64 = 5;

/// Default SCHED_FIFO priority for the cycle thread.
pub const RT_PRIORITY_DEFAULT: i32 = 80;

/// Cycles between periodic statistics log lines.
pub const STATS_INTERVAL_DEFAULT: u64 = 1000;

/// Jitter band used by stability accounting [% of period].
pub const JITTER_TOLERANCE_PERCENT: f64 = 5.0;

/// Share of cycles that must fall inside the jitter band [%].
pub const STABILITY_REQUIRED_PERCENT: f64 = 95.0;

/// Default runtime configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/runtime.toml";
