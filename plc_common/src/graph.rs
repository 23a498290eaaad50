//! Cycle graph configuration: block declarations, input wiring, outputs.
//!
//! Blocks are listed in evaluation order. Each input port names its source:
//!
//! ```toml
//! [[blocks]]
//! name = "plant"
//! type = "first_order"
//! time_constant = 5.0
//! inputs = { input = { block = "heater" } }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One block declaration.
///
/// Parsed through [`BlockEntry`] so that unknown keys in a block table are
/// rejected instead of silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BlockEntry", into = "BlockEntry")]
pub struct BlockConfig {
    /// Unique block name, used for wiring and parameter handles.
    pub name: String,

    /// Block type and initial parameters.
    pub kind: BlockKindConfig,

    /// Port name → signal source.
    pub inputs: BTreeMap<String, SourceConfig>,
}

/// Block type tag plus its initial parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKindConfig {
    /// PID controller. Ports: `sp`, `pv`.
    Pid {
        kp: f64,
        ki: f64,
        kd: f64,
        output_min: f64,
        output_max: f64,
    },
    /// First-order low-pass filter. Port: `input`.
    FirstOrder {
        time_constant: f64,
        initial_output: f64,
    },
    /// Rate limiter. Port: `input`.
    Ramp { rising_rate: f64, falling_rate: f64 },
    /// Saturation. Port: `input`.
    Limit { min_value: f64, max_value: f64 },
}

/// On-disk shape of a `[[blocks]]` table: one flat table per type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
enum BlockEntry {
    Pid {
        name: String,
        kp: f64,
        #[serde(default)]
        ki: f64,
        #[serde(default)]
        kd: f64,
        output_min: f64,
        output_max: f64,
        #[serde(default)]
        inputs: BTreeMap<String, SourceConfig>,
    },
    FirstOrder {
        name: String,
        time_constant: f64,
        #[serde(default)]
        initial_output: f64,
        #[serde(default)]
        inputs: BTreeMap<String, SourceConfig>,
    },
    Ramp {
        name: String,
        rising_rate: f64,
        falling_rate: f64,
        #[serde(default)]
        inputs: BTreeMap<String, SourceConfig>,
    },
    Limit {
        name: String,
        min_value: f64,
        max_value: f64,
        #[serde(default)]
        inputs: BTreeMap<String, SourceConfig>,
    },
}

impl From<BlockEntry> for BlockConfig {
    fn from(entry: BlockEntry) -> Self {
        match entry {
            BlockEntry::Pid {
                name,
                kp,
                ki,
                kd,
                output_min,
                output_max,
                inputs,
            } => Self {
                name,
                kind: BlockKindConfig::Pid {
                    kp,
                    ki,
                    kd,
                    output_min,
                    output_max,
                },
                inputs,
            },
            BlockEntry::FirstOrder {
                name,
                time_constant,
                initial_output,
                inputs,
            } => Self {
                name,
                kind: BlockKindConfig::FirstOrder {
                    time_constant,
                    initial_output,
                },
                inputs,
            },
            BlockEntry::Ramp {
                name,
                rising_rate,
                falling_rate,
                inputs,
            } => Self {
                name,
                kind: BlockKindConfig::Ramp {
                    rising_rate,
                    falling_rate,
                },
                inputs,
            },
            BlockEntry::Limit {
                name,
                min_value,
                max_value,
                inputs,
            } => Self {
                name,
                kind: BlockKindConfig::Limit {
                    min_value,
                    max_value,
                },
                inputs,
            },
        }
    }
}

impl From<BlockConfig> for BlockEntry {
    fn from(config: BlockConfig) -> Self {
        let BlockConfig { name, kind, inputs } = config;
        match kind {
            BlockKindConfig::Pid {
                kp,
                ki,
                kd,
                output_min,
                output_max,
            } => Self::Pid {
                name,
                kp,
                ki,
                kd,
                output_min,
                output_max,
                inputs,
            },
            BlockKindConfig::FirstOrder {
                time_constant,
                initial_output,
            } => Self::FirstOrder {
                name,
                time_constant,
                initial_output,
                inputs,
            },
            BlockKindConfig::Ramp {
                rising_rate,
                falling_rate,
            } => Self::Ramp {
                name,
                rising_rate,
                falling_rate,
                inputs,
            },
            BlockKindConfig::Limit {
                min_value,
                max_value,
            } => Self::Limit {
                name,
                min_value,
                max_value,
                inputs,
            },
        }
    }
}

impl BlockKindConfig {
    /// Lowercase type tag as written in TOML.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Pid { .. } => "pid",
            Self::FirstOrder { .. } => "first_order",
            Self::Ramp { .. } => "ramp",
            Self::Limit { .. } => "limit",
        }
    }
}

/// Where an input port reads its value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    /// Named external process-image input.
    External(String),
    /// Output of an earlier block.
    Block(String),
    /// Fixed value.
    Constant(f64),
}

/// Named output published to the process image after every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output name in the process image.
    pub name: String,

    /// Block whose output is published.
    pub block: String,

    /// Also write the value into this external input for the next cycle.
    #[serde(default)]
    pub loopback: Option<String>,
}
