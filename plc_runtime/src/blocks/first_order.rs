//! First-order low-pass filter (discrete exponential smoothing).
//!
//! `y[n] = α·x[n] + (1−α)·y[n−1]` with `α = dt / (T + dt)`, recomputed on
//! every call so a varying `dt` stays correct.

use plc_common::consts::TIME_CONSTANT_MAX_S;

use super::{check_dt, check_finite, port, BlockKind, FunctionBlock};
use crate::error::BlockError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirstOrderParams {
    /// Time constant T in seconds, `0 < T <= 1e6`.
    pub time_constant: f64,
}

impl FirstOrderParams {
    pub fn validate(&self) -> Result<(), BlockError> {
        let t = check_finite("time_constant", self.time_constant)?;
        if t <= 0.0 {
            return Err(BlockError::InvalidParameter {
                param: "time_constant",
                value: t,
                reason: "must be > 0",
            });
        }
        if t > TIME_CONSTANT_MAX_S {
            return Err(BlockError::InvalidParameter {
                param: "time_constant",
                value: t,
                reason: "must be <= 1e6",
            });
        }
        Ok(())
    }

    pub fn merged(&self, update: &FirstOrderUpdate) -> Result<Self, BlockError> {
        let next = Self {
            time_constant: update.time_constant.unwrap_or(self.time_constant),
        };
        next.validate()?;
        Ok(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FirstOrderUpdate {
    pub time_constant: Option<f64>,
}

impl From<FirstOrderParams> for FirstOrderUpdate {
    fn from(p: FirstOrderParams) -> Self {
        Self {
            time_constant: Some(p.time_constant),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FirstOrderState {
    pub prev_output: f64,
}

/// First-order lag block.
#[derive(Debug, Clone)]
pub struct FirstOrder {
    params: FirstOrderParams,
    prev_output: f64,
}

impl FirstOrder {
    /// Filter starting at output 0.
    pub fn new(params: FirstOrderParams) -> Result<Self, BlockError> {
        Self::with_initial_output(params, 0.0)
    }

    /// Filter starting at `initial_output`.
    pub fn with_initial_output(
        params: FirstOrderParams,
        initial_output: f64,
    ) -> Result<Self, BlockError> {
        params.validate()?;
        check_finite("initial_output", initial_output)?;
        Ok(Self {
            params,
            prev_output: initial_output,
        })
    }

    pub fn compute(&mut self, input: f64, dt: f64) -> Result<f64, BlockError> {
        check_dt(dt)?;
        check_finite("input", input)?;

        let alpha = dt / (self.params.time_constant + dt);
        let output = alpha * input + (1.0 - alpha) * self.prev_output;
        self.prev_output = output;
        Ok(output)
    }

    /// Change T without touching the filter memory.
    pub fn set_time_constant(&mut self, time_constant: f64) -> Result<(), BlockError> {
        self.set_params(FirstOrderUpdate {
            time_constant: Some(time_constant),
        })
    }

    /// Reset memory to `value`. A non-finite value is rejected and the
    /// memory is left as it was.
    pub fn reset_to(&mut self, value: f64) -> Result<(), BlockError> {
        self.prev_output = check_finite("reset_value", value)?;
        Ok(())
    }
}

impl FunctionBlock for FirstOrder {
    type Params = FirstOrderParams;
    type Update = FirstOrderUpdate;
    type State = FirstOrderState;

    const KIND: BlockKind = BlockKind::FirstOrder;

    fn params(&self) -> FirstOrderParams {
        self.params
    }

    fn set_params(&mut self, update: FirstOrderUpdate) -> Result<(), BlockError> {
        self.params = self.params.merged(&update)?;
        Ok(())
    }

    fn state(&self) -> FirstOrderState {
        FirstOrderState {
            prev_output: self.prev_output,
        }
    }

    fn reset(&mut self) {
        self.prev_output = 0.0;
    }

    fn compute_ports(&mut self, inputs: &[f64], dt: f64) -> Result<f64, BlockError> {
        let input = port(inputs, 0, "input")?;
        self.compute(input, dt)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
