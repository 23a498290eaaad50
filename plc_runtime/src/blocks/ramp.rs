//! Rate limiter: output follows input at no more than a configured slope.
//!
//! The first call after construction latches the output onto the input.

use super::{check_dt, check_finite, port, BlockKind, FunctionBlock};
use crate::error::BlockError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampParams {
    /// Maximum increase in units/s.
    pub rising_rate: f64,
    /// Maximum decrease in units/s.
    pub falling_rate: f64,
}

impl RampParams {
    pub fn validate(&self) -> Result<(), BlockError> {
        for (param, value) in [
            ("rising_rate", self.rising_rate),
            ("falling_rate", self.falling_rate),
        ] {
            if check_finite(param, value)? < 0.0 {
                return Err(BlockError::InvalidParameter {
                    param,
                    value,
                    reason: "must be >= 0",
                });
            }
        }
        Ok(())
    }

    pub fn merged(&self, update: &RampUpdate) -> Result<Self, BlockError> {
        let next = Self {
            rising_rate: update.rising_rate.unwrap_or(self.rising_rate),
            falling_rate: update.falling_rate.unwrap_or(self.falling_rate),
        };
        next.validate()?;
        Ok(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RampUpdate {
    pub rising_rate: Option<f64>,
    pub falling_rate: Option<f64>,
}

impl From<RampParams> for RampUpdate {
    fn from(p: RampParams) -> Self {
        Self {
            rising_rate: Some(p.rising_rate),
            falling_rate: Some(p.falling_rate),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RampState {
    pub output: f64,
    /// False until the first compute or an explicit reset.
    pub initialized: bool,
}

/// Rate-limiter block.
#[derive(Debug, Clone)]
pub struct Ramp {
    params: RampParams,
    output: f64,
    initialized: bool,
}

impl Ramp {
    pub fn new(params: RampParams) -> Result<Self, BlockError> {
        params.validate()?;
        Ok(Self {
            params,
            output: 0.0,
            initialized: false,
        })
    }

    pub fn compute(&mut self, input: f64, dt: f64) -> Result<f64, BlockError> {
        check_dt(dt)?;
        check_finite("input", input)?;

        if !self.initialized {
            self.output = input;
            self.initialized = true;
            return Ok(self.output);
        }

        let error = input - self.output;
        let max_change = if error > 0.0 {
            self.params.rising_rate * dt
        } else {
            self.params.falling_rate * dt
        };

        if error.abs() <= max_change {
            self.output = input;
        } else {
            self.output += max_change.copysign(error);
        }
        Ok(self.output)
    }

    /// Reset output to `value` and mark initialized, so the next call ramps
    /// from `value` instead of latching. A non-finite value is rejected and
    /// the state is left as it was.
    pub fn reset_to(&mut self, value: f64) -> Result<(), BlockError> {
        self.output = check_finite("reset_value", value)?;
        self.initialized = true;
        Ok(())
    }
}

impl FunctionBlock for Ramp {
    type Params = RampParams;
    type Update = RampUpdate;
    type State = RampState;

    const KIND: BlockKind = BlockKind::Ramp;

    fn params(&self) -> RampParams {
        self.params
    }

    fn set_params(&mut self, update: RampUpdate) -> Result<(), BlockError> {
        self.params = self.params.merged(&update)?;
        Ok(())
    }

    fn state(&self) -> RampState {
        RampState {
            output: self.output,
            initialized: self.initialized,
        }
    }

    fn reset(&mut self) {
        self.output = 0.0;
        self.initialized = true;
    }

    fn compute_ports(&mut self, inputs: &[f64], dt: f64) -> Result<f64, BlockError> {
        let input = port(inputs, 0, "input")?;
        self.compute(input, dt)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
