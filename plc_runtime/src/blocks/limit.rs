//! Stateless saturation block.

use super::{check_finite, port, BlockKind, FunctionBlock};
use crate::error::BlockError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitParams {
    pub min_value: f64,
    pub max_value: f64,
}

impl LimitParams {
    pub fn validate(&self) -> Result<(), BlockError> {
        check_finite("min_value", self.min_value)?;
        check_finite("max_value", self.max_value)?;
        if self.min_value > self.max_value {
            return Err(BlockError::InvalidRange {
                min: self.min_value,
                max: self.max_value,
            });
        }
        Ok(())
    }

    pub fn merged(&self, update: &LimitUpdate) -> Result<Self, BlockError> {
        let next = Self {
            min_value: update.min_value.unwrap_or(self.min_value),
            max_value: update.max_value.unwrap_or(self.max_value),
        };
        next.validate()?;
        Ok(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LimitUpdate {
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl From<LimitParams> for LimitUpdate {
    fn from(p: LimitParams) -> Self {
        Self {
            min_value: Some(p.min_value),
            max_value: Some(p.max_value),
        }
    }
}

/// Saturation block.
#[derive(Debug, Clone)]
pub struct Limit {
    params: LimitParams,
}

impl Limit {
    pub fn new(params: LimitParams) -> Result<Self, BlockError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Clamp `input` into `[min_value, max_value]`.
    pub fn compute(&self, input: f64) -> Result<f64, BlockError> {
        check_finite("input", input)?;
        Ok(input.clamp(self.params.min_value, self.params.max_value))
    }
}

impl FunctionBlock for Limit {
    type Params = LimitParams;
    type Update = LimitUpdate;
    type State = ();

    const KIND: BlockKind = BlockKind::Limit;

    fn params(&self) -> LimitParams {
        self.params
    }

    fn set_params(&mut self, update: LimitUpdate) -> Result<(), BlockError> {
        self.params = self.params.merged(&update)?;
        Ok(())
    }

    fn state(&self) {}

    fn reset(&mut self) {}

    fn compute_ports(&mut self, inputs: &[f64], _dt: f64) -> Result<f64, BlockError> {
        let input = port(inputs, 0, "input")?;
        self.compute(input)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
