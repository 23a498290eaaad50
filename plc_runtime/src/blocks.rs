//! Function block library.
//!
//! Every block exposes `compute`, `params`/`set_params`, `state` and `reset`
//! through [`FunctionBlock`]. Blocks validate every input and parameter;
//! on error they keep their previous params and state.
//!
//! [`Block`] wraps the concrete types for execution inside a cycle graph.

use std::fmt;

use plc_common::consts::PID_GAIN_MAX;

use crate::error::BlockError;

pub mod first_order;
pub mod limit;
pub mod pid;
pub mod ramp;

pub use first_order::{FirstOrder, FirstOrderParams, FirstOrderState, FirstOrderUpdate};
pub use limit::{Limit, LimitParams, LimitUpdate};
pub use pid::{Pid, PidParams, PidState, PidUpdate};
pub use ramp::{Ramp, RampParams, RampState, RampUpdate};

/// Common block contract.
pub trait FunctionBlock {
    /// Full parameter set.
    type Params: Copy + PartialEq + fmt::Debug;
    /// Partial update; `None` fields keep their value.
    type Update: Copy + Default + fmt::Debug;
    /// Diagnostic copy of internal memory.
    type State: Copy + fmt::Debug;

    const KIND: BlockKind;

    fn params(&self) -> Self::Params;

    /// Merge and validate `update`. On error the previous params stay.
    fn set_params(&mut self, update: Self::Update) -> Result<(), BlockError>;

    fn state(&self) -> Self::State;

    /// Clear internal memory. Params are kept.
    fn reset(&mut self);

    /// Compute with inputs ordered as [`BlockKind::ports`].
    fn compute_ports(&mut self, inputs: &[f64], dt: f64) -> Result<f64, BlockError>;
}

// ─── Block kinds ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Pid,
    FirstOrder,
    Ramp,
    Limit,
}

impl BlockKind {
    /// Input port names in evaluation order.
    pub const fn ports(self) -> &'static [&'static str] {
        match self {
            Self::Pid => &["sp", "pv"],
            Self::FirstOrder | Self::Ramp | Self::Limit => &["input"],
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Pid => "pid",
            Self::FirstOrder => "first_order",
            Self::Ramp => "ramp",
            Self::Limit => "limit",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Validation helpers ─────────────────────────────────────────────

pub(crate) fn check_finite(param: &'static str, value: f64) -> Result<f64, BlockError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BlockError::InvalidParameter {
            param,
            value,
            reason: "must be finite",
        })
    }
}

pub(crate) fn check_dt(dt: f64) -> Result<f64, BlockError> {
    if dt.is_finite() && dt > 0.0 {
        Ok(dt)
    } else {
        Err(BlockError::InvalidCycleTime { dt })
    }
}

pub(crate) fn check_gain(param: &'static str, value: f64) -> Result<f64, BlockError> {
    let value = check_finite(param, value)?;
    if value < 0.0 {
        return Err(BlockError::InvalidParameter {
            param,
            value,
            reason: "must be >= 0",
        });
    }
    if value > PID_GAIN_MAX {
        return Err(BlockError::InvalidParameter {
            param,
            value,
            reason: "must be <= 1e6",
        });
    }
    Ok(value)
}

pub(crate) fn port(inputs: &[f64], index: usize, name: &'static str) -> Result<f64, BlockError> {
    inputs
        .get(index)
        .copied()
        .ok_or(BlockError::MissingInput { port: name })
}

// ─── Type-erased block ──────────────────────────────────────────────

/// Full parameter set of any block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockParams {
    Pid(PidParams),
    FirstOrder(FirstOrderParams),
    Ramp(RampParams),
    Limit(LimitParams),
}

impl BlockParams {
    pub const fn kind(&self) -> BlockKind {
        match self {
            Self::Pid(_) => BlockKind::Pid,
            Self::FirstOrder(_) => BlockKind::FirstOrder,
            Self::Ramp(_) => BlockKind::Ramp,
            Self::Limit(_) => BlockKind::Limit,
        }
    }

    /// Merge `update` over `self` and validate. Used to check staged
    /// updates before they reach the running graph.
    pub fn merged(&self, update: &BlockUpdate) -> Result<Self, BlockError> {
        match (self, update) {
            (Self::Pid(p), BlockUpdate::Pid(u)) => p.merged(u).map(Self::Pid),
            (Self::FirstOrder(p), BlockUpdate::FirstOrder(u)) => {
                p.merged(u).map(Self::FirstOrder)
            }
            (Self::Ramp(p), BlockUpdate::Ramp(u)) => p.merged(u).map(Self::Ramp),
            (Self::Limit(p), BlockUpdate::Limit(u)) => p.merged(u).map(Self::Limit),
            _ => Err(BlockError::KindMismatch {
                block: self.kind(),
                update: update.kind(),
            }),
        }
    }
}

/// Partial parameter update for any block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockUpdate {
    Pid(PidUpdate),
    FirstOrder(FirstOrderUpdate),
    Ramp(RampUpdate),
    Limit(LimitUpdate),
}

impl BlockUpdate {
    pub const fn kind(&self) -> BlockKind {
        match self {
            Self::Pid(_) => BlockKind::Pid,
            Self::FirstOrder(_) => BlockKind::FirstOrder,
            Self::Ramp(_) => BlockKind::Ramp,
            Self::Limit(_) => BlockKind::Limit,
        }
    }
}

impl From<BlockParams> for BlockUpdate {
    fn from(params: BlockParams) -> Self {
        match params {
            BlockParams::Pid(p) => Self::Pid(p.into()),
            BlockParams::FirstOrder(p) => Self::FirstOrder(p.into()),
            BlockParams::Ramp(p) => Self::Ramp(p.into()),
            BlockParams::Limit(p) => Self::Limit(p.into()),
        }
    }
}

/// Internal state of any block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockState {
    Pid(PidState),
    FirstOrder(FirstOrderState),
    Ramp(RampState),
    Limit,
}

/// Any function block.
#[derive(Debug, Clone)]
pub enum Block {
    Pid(Pid),
    FirstOrder(FirstOrder),
    Ramp(Ramp),
    Limit(Limit),
}

impl Block {
    /// Construct from a full parameter set.
    pub fn from_params(params: BlockParams) -> Result<Self, BlockError> {
        Ok(match params {
            BlockParams::Pid(p) => Self::Pid(Pid::new(p)?),
            BlockParams::FirstOrder(p) => Self::FirstOrder(FirstOrder::new(p)?),
            BlockParams::Ramp(p) => Self::Ramp(Ramp::new(p)?),
            BlockParams::Limit(p) => Self::Limit(Limit::new(p)?),
        })
    }

    pub const fn kind(&self) -> BlockKind {
        match self {
            Self::Pid(_) => BlockKind::Pid,
            Self::FirstOrder(_) => BlockKind::FirstOrder,
            Self::Ramp(_) => BlockKind::Ramp,
            Self::Limit(_) => BlockKind::Limit,
        }
    }

    pub fn params(&self) -> BlockParams {
        match self {
            Self::Pid(b) => BlockParams::Pid(b.params()),
            Self::FirstOrder(b) => BlockParams::FirstOrder(b.params()),
            Self::Ramp(b) => BlockParams::Ramp(b.params()),
            Self::Limit(b) => BlockParams::Limit(b.params()),
        }
    }

    pub fn set_params(&mut self, update: BlockUpdate) -> Result<(), BlockError> {
        match (self, update) {
            (Self::Pid(b), BlockUpdate::Pid(u)) => b.set_params(u),
            (Self::FirstOrder(b), BlockUpdate::FirstOrder(u)) => b.set_params(u),
            (Self::Ramp(b), BlockUpdate::Ramp(u)) => b.set_params(u),
            (Self::Limit(b), BlockUpdate::Limit(u)) => b.set_params(u),
            (block, update) => Err(BlockError::KindMismatch {
                block: block.kind(),
                update: update.kind(),
            }),
        }
    }

    pub fn state(&self) -> BlockState {
        match self {
            Self::Pid(b) => BlockState::Pid(b.state()),
            Self::FirstOrder(b) => BlockState::FirstOrder(b.state()),
            Self::Ramp(b) => BlockState::Ramp(b.state()),
            Self::Limit(_) => BlockState::Limit,
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Pid(b) => b.reset(),
            Self::FirstOrder(b) => b.reset(),
            Self::Ramp(b) => b.reset(),
            Self::Limit(b) => b.reset(),
        }
    }

    pub fn compute(&mut self, inputs: &[f64], dt: f64) -> Result<f64, BlockError> {
        match self {
            Self::Pid(b) => b.compute_ports(inputs, dt),
            Self::FirstOrder(b) => b.compute_ports(inputs, dt),
            Self::Ramp(b) => b.compute_ports(inputs, dt),
            Self::Limit(b) => b.compute_ports(inputs, dt),
        }
    }
}

impl From<Pid> for Block {
    fn from(b: Pid) -> Self {
        Self::Pid(b)
    }
}

impl From<FirstOrder> for Block {
    fn from(b: FirstOrder) -> Self {
        Self::FirstOrder(b)
    }
}

impl From<Ramp> for Block {
    fn from(b: Ramp) -> Self {
        Self::Ramp(b)
    }
}

impl From<Limit> for Block {
    fn from(b: Limit) -> Self {
        Self::Limit(b)
    }
}
