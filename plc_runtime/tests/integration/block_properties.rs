//! Property tests for the function block library.
//!
//! Verifies:
//! - Limit output always lies in range and is idempotent
//! - FirstOrder never overshoots a constant input
//! - PID integral does not wind up while the output is saturated
//! - Ramp moves by exactly `rate·dt` per cycle
//! - Accepted parameters are returned unchanged by `params()`

use approx::assert_relative_eq;
use proptest::prelude::*;

use plc_runtime::blocks::{
    FirstOrder, FirstOrderParams, FunctionBlock, Limit, LimitParams, Pid, PidParams, PidUpdate,
    Ramp, RampParams,
};
use plc_runtime::error::BlockError;

const DT: f64 = 0.1;

proptest! {
    #[test]
    fn limit_output_in_range_and_idempotent(
        lo in -1.0e3..1.0e3f64,
        span in 0.0..1.0e3f64,
        x in -1.0e4..1.0e4f64,
    ) {
        let limit = Limit::new(LimitParams { min_value: lo, max_value: lo + span }).unwrap();
        let y = limit.compute(x).unwrap();
        prop_assert!(y >= lo && y <= lo + span);
        prop_assert_eq!(limit.compute(y).unwrap(), y);
        if (lo..=lo + span).contains(&x) {
            prop_assert_eq!(y, x);
        }
    }

    #[test]
    fn first_order_never_overshoots(
        start in -100.0..100.0f64,
        target in -100.0..100.0f64,
        tau in 0.01..50.0f64,
        steps in 1usize..200,
    ) {
        let mut lag =
            FirstOrder::with_initial_output(FirstOrderParams { time_constant: tau }, start)
                .unwrap();
        let (lo, hi) = (start.min(target), start.max(target));
        let mut prev = start;
        for _ in 0..steps {
            let y = lag.compute(target, DT).unwrap();
            prop_assert!(y >= lo - 1e-9 && y <= hi + 1e-9);
            // Monotonic approach.
            prop_assert!((target - y).abs() <= (target - prev).abs() + 1e-9);
            prev = y;
        }
    }

    #[test]
    fn pid_does_not_wind_up_while_saturated(
        kp in 1.0..10.0f64,
        ki in 0.1..5.0f64,
        cycles in 1usize..500,
    ) {
        let mut pid = Pid::new(PidParams {
            kp,
            ki,
            kd: 0.0,
            output_min: 0.0,
            output_max: 10.0,
        })
        .unwrap();

        // Error of 100 drives the unclamped output far above the limit.
        for _ in 0..cycles {
            prop_assert_eq!(pid.compute(100.0, 0.0, DT).unwrap(), 10.0);
        }
        prop_assert_eq!(pid.state().integral, 0.0);

        // Setpoint reached: no stored integral keeps the output pinned.
        prop_assert_eq!(pid.compute(0.0, 0.0, DT).unwrap(), 0.0);
    }

    #[test]
    fn pid_output_stays_in_range(
        sp in -1.0e3..1.0e3f64,
        pv in -1.0e3..1.0e3f64,
        kd in 0.0..2.0f64,
    ) {
        let mut pid = Pid::new(PidParams {
            kp: 1.5,
            ki: 0.2,
            kd,
            output_min: -50.0,
            output_max: 50.0,
        })
        .unwrap();
        for _ in 0..5 {
            let y = pid.compute(sp, pv, DT).unwrap();
            prop_assert!((-50.0..=50.0).contains(&y));
        }
    }

    #[test]
    fn pid_params_round_trip(
        kp in 0.0..1.0e3f64,
        ki in 0.0..1.0e3f64,
        kd in 0.0..1.0e3f64,
        lo in -1.0e3..0.0f64,
        hi in 0.0..1.0e3f64,
    ) {
        let mut pid = Pid::new(PidParams {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            output_min: -1.0,
            output_max: 1.0,
        })
        .unwrap();
        let wanted = PidParams { kp, ki, kd, output_min: lo, output_max: hi };
        pid.set_params(wanted.into()).unwrap();
        prop_assert_eq!(pid.params(), wanted);
    }
}

#[test]
fn ramp_steps_by_rate_times_dt() {
    let mut ramp = Ramp::new(RampParams {
        rising_rate: 10.0,
        falling_rate: 5.0,
    })
    .unwrap();

    // First call latches.
    assert_eq!(ramp.compute(0.0, DT).unwrap(), 0.0);
    for n in 1..=5 {
        assert_relative_eq!(ramp.compute(100.0, DT).unwrap(), n as f64, epsilon = 1e-9);
    }
    let top = ramp.state().output;
    for n in 1..=4 {
        assert_relative_eq!(
            ramp.compute(-100.0, DT).unwrap(),
            top - 0.5 * n as f64,
            epsilon = 1e-9
        );
    }
}

#[test]
fn ramp_lands_exactly_on_target() {
    let mut ramp = Ramp::new(RampParams {
        rising_rate: 10.0,
        falling_rate: 10.0,
    })
    .unwrap();
    ramp.compute(0.0, DT).unwrap();
    ramp.compute(0.4, DT).unwrap();
    assert_eq!(ramp.compute(0.4, DT).unwrap(), 0.4);
}

#[test]
fn rejected_update_keeps_previous_params() {
    let initial = PidParams {
        kp: 2.0,
        ki: 0.5,
        kd: 0.0,
        output_min: 0.0,
        output_max: 100.0,
    };
    let mut pid = Pid::new(initial).unwrap();

    let err = pid
        .set_params(PidUpdate {
            output_min: Some(200.0),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, BlockError::InvalidRange { .. }));
    assert_eq!(pid.params(), initial);

    let err = pid
        .set_params(PidUpdate {
            kp: Some(f64::NAN),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, BlockError::InvalidParameter { param: "kp", .. }));
    assert_eq!(pid.params(), initial);
}

#[test]
fn non_positive_dt_is_rejected_without_state_change() {
    let mut lag = FirstOrder::with_initial_output(FirstOrderParams { time_constant: 1.0 }, 3.0)
        .unwrap();
    assert!(matches!(
        lag.compute(10.0, 0.0),
        Err(BlockError::InvalidCycleTime { .. })
    ));
    assert!(matches!(
        lag.compute(10.0, -0.1),
        Err(BlockError::InvalidCycleTime { .. })
    ));
    assert_eq!(lag.state().prev_output, 3.0);
}
