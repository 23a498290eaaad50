//! Prelude module for common re-exports.
//!
//! ```rust
//! use plc_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, CycleConfig, DebugConfig, DiagnosticsConfig, LogLevel,
    LoggingConfig, PerformanceConfig, RuntimeConfig,
};

// ─── Graph Declarations ─────────────────────────────────────────────
pub use crate::graph::{BlockConfig, BlockKindConfig, OutputConfig, SourceConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{
    CYCLE_PERIOD_MS_DEFAULT, JITTER_TOLERANCE_PERCENT, MAX_FUNCTION_BLOCKS_LIMIT,
    STABILITY_REQUIRED_PERCENT,
};
