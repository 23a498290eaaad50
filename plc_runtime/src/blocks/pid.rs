//! PID controller, position form with conditional-integration anti-windup.
//!
//! ```text
//! e  = SP − PV
//! CV = Kp·e + Ki·∫e·dt + Kd·de/dt      clamped to [output_min, output_max]
//! ```
//!
//! Zero Ki disables integral; zero Kd disables derivative.

use super::{check_dt, check_finite, check_gain, port, BlockKind, FunctionBlock};
use crate::error::BlockError;

/// PID tuning and output range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidParams {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain (0 = disabled).
    pub ki: f64,
    /// Derivative gain (0 = disabled).
    pub kd: f64,
    /// Lower output clamp.
    pub output_min: f64,
    /// Upper output clamp.
    pub output_max: f64,
}

impl PidParams {
    /// Check gains and output range.
    pub fn validate(&self) -> Result<(), BlockError> {
        check_gain("kp", self.kp)?;
        check_gain("ki", self.ki)?;
        check_gain("kd", self.kd)?;
        check_finite("output_min", self.output_min)?;
        check_finite("output_max", self.output_max)?;
        if self.output_min > self.output_max {
            return Err(BlockError::InvalidRange {
                min: self.output_min,
                max: self.output_max,
            });
        }
        Ok(())
    }

    /// Merge supplied fields over `self` and validate the result.
    pub fn merged(&self, update: &PidUpdate) -> Result<Self, BlockError> {
        let next = Self {
            kp: update.kp.unwrap_or(self.kp),
            ki: update.ki.unwrap_or(self.ki),
            kd: update.kd.unwrap_or(self.kd),
            output_min: update.output_min.unwrap_or(self.output_min),
            output_max: update.output_max.unwrap_or(self.output_max),
        };
        next.validate()?;
        Ok(next)
    }
}

/// Partial PID parameter update. `None` keeps the current value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidUpdate {
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,
    pub output_min: Option<f64>,
    pub output_max: Option<f64>,
}

impl From<PidParams> for PidUpdate {
    fn from(p: PidParams) -> Self {
        Self {
            kp: Some(p.kp),
            ki: Some(p.ki),
            kd: Some(p.kd),
            output_min: Some(p.output_min),
            output_max: Some(p.output_max),
        }
    }
}

/// Diagnostic copy of the PID memory.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidState {
    /// Accumulated ∫e·dt.
    pub integral: f64,
    /// Error from the previous call (0 before the first call).
    pub prev_error: f64,
}

/// PID function block.
#[derive(Debug, Clone)]
pub struct Pid {
    params: PidParams,
    integral: f64,
    /// `None` until the first call after construction or reset.
    prev_error: Option<f64>,
}

impl Pid {
    /// Build a PID block with validated parameters.
    pub fn new(params: PidParams) -> Result<Self, BlockError> {
        params.validate()?;
        Ok(Self {
            params,
            integral: 0.0,
            prev_error: None,
        })
    }

    /// Compute one control cycle.
    ///
    /// The derivative term is 0 on the first call after construction or
    /// [`reset`](FunctionBlock::reset). When the unclamped output leaves the
    /// output range, this cycle's integral accumulation is discarded.
    ///
    /// # Errors
    /// `InvalidCycleTime` for `dt <= 0`, `InvalidParameter` for non-finite
    /// SP/PV. State is untouched on error.
    pub fn compute(&mut self, sp: f64, pv: f64, dt: f64) -> Result<f64, BlockError> {
        check_dt(dt)?;
        check_finite("sp", sp)?;
        check_finite("pv", pv)?;

        let p = &self.params;
        let error = sp - pv;

        let integral = if p.ki != 0.0 {
            self.integral + error * dt
        } else {
            0.0
        };

        let derivative = match self.prev_error {
            Some(prev) if p.kd != 0.0 => (error - prev) / dt,
            _ => 0.0,
        };

        let raw = p.kp * error + p.ki * integral + p.kd * derivative;
        let output = raw.clamp(p.output_min, p.output_max);

        if p.ki == 0.0 {
            self.integral = 0.0;
        } else if output == raw {
            self.integral = integral;
        }
        self.prev_error = Some(error);

        Ok(output)
    }
}

impl FunctionBlock for Pid {
    type Params = PidParams;
    type Update = PidUpdate;
    type State = PidState;

    const KIND: BlockKind = BlockKind::Pid;

    fn params(&self) -> PidParams {
        self.params
    }

    fn set_params(&mut self, update: PidUpdate) -> Result<(), BlockError> {
        self.params = self.params.merged(&update)?;
        Ok(())
    }

    fn state(&self) -> PidState {
        PidState {
            integral: self.integral,
            prev_error: self.prev_error.unwrap_or(0.0),
        }
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }

    fn compute_ports(&mut self, inputs: &[f64], dt: f64) -> Result<f64, BlockError> {
        let sp = port(inputs, 0, "sp")?;
        let pv = port(inputs, 1, "pv")?;
        self.compute(sp, pv, dt)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
