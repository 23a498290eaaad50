//! Error types for blocks, graph construction and the cycle scheduler.
//!
//! Block errors are raised synchronously by constructors, `set_params` and
//! `compute`; the block keeps its previous valid params and state.
//! Graph errors abort startup and always name the offending block/port.

use std::time::Duration;

use plc_common::config::ConfigError;
use thiserror::Error;

use crate::blocks::BlockKind;

/// Input validation failure raised by a function block.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BlockError {
    /// Parameter or input value rejected.
    #[error("invalid parameter {param} = {value}: {reason}")]
    InvalidParameter {
        param: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Clamping range with `min > max`.
    #[error("invalid range: min {min} > max {max}")]
    InvalidRange { min: f64, max: f64 },

    /// Non-positive or non-finite `dt`.
    #[error("invalid cycle time dt = {dt} s (must be finite and > 0)")]
    InvalidCycleTime { dt: f64 },

    /// Port value not supplied.
    #[error("missing input on port {port}")]
    MissingInput { port: &'static str },

    /// Parameter update addressed to a different block type.
    #[error("{update} parameter update sent to {block} block")]
    KindMismatch { block: BlockKind, update: BlockKind },
}

/// Cycle graph construction error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("duplicate block name '{0}'")]
    DuplicateBlock(String),

    #[error("duplicate output name '{0}'")]
    DuplicateOutput(String),

    #[error("block '{block}': unknown input port '{port}' for {kind} block")]
    UnknownPort {
        block: String,
        port: String,
        kind: BlockKind,
    },

    #[error("block '{block}': input port '{port}' is not wired")]
    UnwiredPort { block: String, port: &'static str },

    #[error("block '{block}' port '{port}': unknown source block '{source_block}'")]
    UnknownSource {
        block: String,
        port: String,
        source_block: String,
    },

    #[error(
        "block '{block}' port '{port}': source '{source_block}' is evaluated later (forward reference)"
    )]
    ForwardReference {
        block: String,
        port: String,
        source_block: String,
    },

    #[error("block '{block}' port '{port}': unknown external input '{input}'")]
    UnknownInput {
        block: String,
        port: String,
        input: String,
    },

    #[error("output '{output}': unknown block '{block}'")]
    UnknownOutputBlock { output: String, block: String },

    #[error("output '{output}': loopback target '{input}' is not a declared input")]
    UnknownLoopback { output: String, input: String },

    #[error("graph has {count} blocks, limit is {limit}")]
    TooManyBlocks { count: usize, limit: usize },

    #[error("block '{block}': constant on port '{port}' is not finite")]
    InvalidConstant { block: String, port: String },

    #[error("block '{block}': {source}")]
    Block {
        block: String,
        #[source]
        source: BlockError,
    },
}

/// Scheduler and RT setup errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CycleError {
    /// Period outside the accepted range.
    #[error("invalid cycle period {period:?} (allowed {min:?}..={max:?})")]
    InvalidPeriod {
        period: Duration,
        min: Duration,
        max: Duration,
    },

    /// Graph execution took longer than the period. Non-fatal.
    #[error("cycle overrun: execution {execution:?} > period {period:?}")]
    CycleOverrun {
        execution: Duration,
        period: Duration,
    },

    /// Timing can no longer be measured; the run is aborted.
    #[error("scheduler fatal: {0}")]
    SchedulerFatal(String),

    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// Lifecycle transition not allowed in the current state.
    #[error("invalid scheduler transition: {0}")]
    InvalidTransition(&'static str),

    /// The scheduler is gone.
    #[error("scheduler control channel closed")]
    ChannelClosed,
}

/// Failure while turning a configuration file into a runnable graph.
#[derive(Debug, Clone, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cycle graph: {0}")]
    Graph(#[from] GraphError),
}
