//! Turns a validated [`RuntimeConfig`] into a runnable graph.
//!
//! Loading fails fast: a block with bad parameters or wiring aborts startup
//! with an error naming the block.

use std::path::Path;
use std::time::Duration;

use plc_common::config::RuntimeConfig;
use plc_common::graph::{BlockConfig, BlockKindConfig};

use crate::blocks::{
    Block, BlockParams, FirstOrder, FirstOrderParams, LimitParams, PidParams, RampParams,
};
use crate::cycle::SchedulerOptions;
use crate::error::{GraphError, StartupError};
use crate::graph::{CycleGraph, NodeSpec};
use crate::io::{InputImage, SignalImage};

/// Validated configuration plus the graph built from it.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: RuntimeConfig,
    pub graph: CycleGraph,
    pub inputs: InputImage,
}

impl LoadedConfig {
    /// Load, validate and build from a TOML file.
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let config = RuntimeConfig::load_validated(path)?;
        Ok(Self::from_config(config)?)
    }

    /// Build the graph for an already validated configuration.
    pub fn from_config(config: RuntimeConfig) -> Result<Self, GraphError> {
        let inputs = input_image(&config);
        let nodes = config
            .blocks
            .iter()
            .map(node_spec)
            .collect::<Result<Vec<_>, _>>()?;
        let graph = CycleGraph::build(
            nodes,
            &config.outputs,
            &inputs,
            config.performance.max_function_blocks,
        )?;
        Ok(Self {
            config,
            graph,
            inputs,
        })
    }

    pub fn period(&self) -> Duration {
        self.config.runtime.period()
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            timeout_threshold_percent: self.config.runtime.timeout_threshold_percent,
            max_cycles: self.config.runtime.max_cycles,
            snapshot_blocks: self.config.diagnostics.snapshot_blocks,
        }
    }
}

/// Input image holding the configured initial values.
pub fn input_image(config: &RuntimeConfig) -> InputImage {
    SignalImage::from_pairs(config.inputs.iter().map(|(k, v)| (k.as_str(), *v)))
}

/// Full parameter set declared for a block.
pub fn block_params(kind: &BlockKindConfig) -> BlockParams {
    match *kind {
        BlockKindConfig::Pid {
            kp,
            ki,
            kd,
            output_min,
            output_max,
        } => BlockParams::Pid(PidParams {
            kp,
            ki,
            kd,
            output_min,
            output_max,
        }),
        BlockKindConfig::FirstOrder { time_constant, .. } => {
            BlockParams::FirstOrder(FirstOrderParams { time_constant })
        }
        BlockKindConfig::Ramp {
            rising_rate,
            falling_rate,
        } => BlockParams::Ramp(RampParams {
            rising_rate,
            falling_rate,
        }),
        BlockKindConfig::Limit {
            min_value,
            max_value,
        } => BlockParams::Limit(LimitParams {
            min_value,
            max_value,
        }),
    }
}

/// Construct a block from its declaration.
pub fn build_block(cfg: &BlockConfig) -> Result<Block, GraphError> {
    let named = |source| GraphError::Block {
        block: cfg.name.clone(),
        source,
    };
    match (&cfg.kind, block_params(&cfg.kind)) {
        (BlockKindConfig::FirstOrder { initial_output, .. }, BlockParams::FirstOrder(p)) => {
            FirstOrder::with_initial_output(p, *initial_output)
                .map(Block::FirstOrder)
                .map_err(named)
        }
        (_, params) => Block::from_params(params).map_err(named),
    }
}

fn node_spec(cfg: &BlockConfig) -> Result<NodeSpec, GraphError> {
    Ok(NodeSpec {
        name: cfg.name.clone(),
        block: build_block(cfg)?,
        inputs: cfg.inputs.clone(),
    })
}
