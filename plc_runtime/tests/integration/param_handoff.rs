//! Parameter hand-off between control threads and the cycle.
//!
//! Updates are validated when staged and applied only at a cycle boundary,
//! so a cycle never sees a half-written parameter set.

use std::thread;
use std::time::Duration;

use plc_common::graph::SourceConfig;
use plc_runtime::blocks::{
    BlockParams, BlockState, BlockUpdate, Limit, LimitParams, LimitUpdate, Pid, PidParams,
    PidUpdate, Ramp, RampParams,
};
use plc_runtime::clock::SimulatedClock;
use plc_runtime::cycle::{CycleFlags, CycleRecord, CycleScheduler, SchedulerOptions};
use plc_runtime::error::BlockError;
use plc_runtime::graph::{CycleGraph, NodeSpec, ParamHandle};
use plc_runtime::io::{InputImage, OutputImage, ProcessIo, SignalImage};

const PERIOD: Duration = Duration::from_millis(50);
const DT: f64 = 0.05;

fn clamp_graph() -> (CycleGraph, InputImage) {
    let inputs = SignalImage::from_pairs([("demand", 80.0)]);
    let nodes = vec![
        NodeSpec::new(
            "clamp",
            Limit::new(LimitParams {
                min_value: 0.0,
                max_value: 50.0,
            })
            .unwrap(),
        )
        .input("input", SourceConfig::External("demand".into())),
    ];
    let outputs = [plc_common::graph::OutputConfig {
        name: "valve".into(),
        block: "clamp".into(),
        loopback: None,
    }];
    let graph = CycleGraph::build(nodes, &outputs, &inputs, 8).unwrap();
    (graph, inputs)
}

#[test]
fn staged_update_waits_for_boundary() {
    let (mut graph, mut inputs) = clamp_graph();
    let mut outputs = graph.output_image();
    let handle = graph.handle("clamp").unwrap();

    graph.execute(&mut inputs, &mut outputs, DT);
    assert_eq!(outputs.get("valve"), Some(50.0));

    let merged = handle
        .set_params(BlockUpdate::Limit(LimitUpdate {
            max_value: Some(70.0),
            ..Default::default()
        }))
        .unwrap();
    assert_eq!(
        merged,
        BlockParams::Limit(LimitParams {
            min_value: 0.0,
            max_value: 70.0
        })
    );
    assert!(handle.is_pending());
    // Visible through the handle, not yet in the running block.
    assert_eq!(handle.params(), merged);
    assert_ne!(graph.block_params("clamp"), Some(merged));

    graph.execute(&mut inputs, &mut outputs, DT);
    assert_eq!(outputs.get("valve"), Some(50.0));

    assert!(graph.apply_pending());
    assert!(!handle.is_pending());
    graph.execute(&mut inputs, &mut outputs, DT);
    assert_eq!(outputs.get("valve"), Some(70.0));
    assert!(!graph.apply_pending());
}

#[test]
fn invalid_update_is_not_staged() {
    let (graph, _) = clamp_graph();
    let handle = graph.handle("clamp").unwrap();
    let before = handle.params();

    let err = handle
        .set_params(BlockUpdate::Limit(LimitUpdate {
            min_value: Some(90.0),
            ..Default::default()
        }))
        .unwrap_err();
    assert!(matches!(err, BlockError::InvalidRange { .. }));
    assert!(!handle.is_pending());
    assert_eq!(handle.params(), before);

    let err = handle
        .set_params(BlockUpdate::Pid(PidUpdate::default()))
        .unwrap_err();
    assert!(matches!(err, BlockError::KindMismatch { .. }));
    assert!(!handle.is_pending());
}

#[test]
fn reset_request_clears_state_at_boundary() {
    let inputs = SignalImage::from_pairs([("sp", 10.0), ("pv", 0.0)]);
    let pid = Pid::new(PidParams {
        kp: 1.0,
        ki: 1.0,
        kd: 0.0,
        output_min: -100.0,
        output_max: 100.0,
    })
    .unwrap();
    let nodes = vec![
        NodeSpec::new("pid", pid)
            .input("sp", SourceConfig::External("sp".into()))
            .input("pv", SourceConfig::External("pv".into())),
    ];
    let mut graph = CycleGraph::build(nodes, &[], &inputs, 8).unwrap();
    let mut inputs = inputs;
    let mut outputs = graph.output_image();

    for _ in 0..3 {
        graph.execute(&mut inputs, &mut outputs, DT);
    }
    let Some(BlockState::Pid(state)) = graph.block_state("pid") else {
        panic!("pid state missing");
    };
    assert!(state.integral > 0.0);

    let handle = graph.handle("pid").unwrap();
    handle.request_reset();
    assert!(handle.is_pending());
    assert!(graph.apply_pending());
    assert_eq!(
        graph.block_state("pid"),
        Some(BlockState::Pid(Default::default()))
    );
}

/// Writes a new ramp rate from inside cycle 3.
struct RateChanger {
    handle: Option<ParamHandle>,
    cycle: u32,
}

impl ProcessIo for RateChanger {
    fn read_inputs(&mut self, _image: &mut InputImage) {}

    fn write_outputs(&mut self, _image: &OutputImage) {
        self.cycle += 1;
        if self.cycle == 3 {
            if let Some(handle) = &self.handle {
                handle
                    .set_params(BlockUpdate::Ramp(plc_runtime::blocks::RampUpdate {
                        rising_rate: Some(40.0),
                        ..Default::default()
                    }))
                    .unwrap();
            }
        }
    }
}

#[test]
fn scheduler_flags_cycle_that_applied_params() {
    let inputs = SignalImage::from_pairs([("target", 100.0)]);
    let ramp = Ramp::new(RampParams {
        rising_rate: 20.0,
        falling_rate: 20.0,
    })
    .unwrap();
    let nodes = vec![
        NodeSpec::new("parked", ramp).input("input", SourceConfig::Constant(0.0)),
        NodeSpec::new(
            "ramp_up",
            Ramp::new(RampParams {
                rising_rate: 20.0,
                falling_rate: 20.0,
            })
            .unwrap(),
        )
        .input("input", SourceConfig::External("target".into())),
    ];
    let graph = CycleGraph::build(nodes, &[], &inputs, 8).unwrap();
    let io = RateChanger {
        handle: graph.handle("ramp_up"),
        cycle: 0,
    };
    let options = SchedulerOptions {
        max_cycles: Some(5),
        snapshot_blocks: true,
        ..Default::default()
    };
    let mut sched =
        CycleScheduler::new(graph, inputs, SimulatedClock::new(), io, Vec::new(), options);
    sched.run(PERIOD).unwrap();

    let records: &Vec<CycleRecord> = sched.sink();
    let applied: Vec<u64> = records
        .iter()
        .filter(|r| r.flags.contains(CycleFlags::PARAMS_APPLIED))
        .map(|r| r.seq)
        .collect();
    assert_eq!(applied, vec![4]);

    // Latched at 100 on the first cycle; the rate change is visible in the
    // params and every record carries both block snapshots.
    assert_eq!(
        sched.graph().block_params("ramp_up"),
        Some(BlockParams::Ramp(RampParams {
            rising_rate: 40.0,
            falling_rate: 20.0
        }))
    );
    assert!(
        records
            .iter()
            .all(|r| r.snapshot.as_ref().is_some_and(|s| s.len() == 2))
    );
}

#[test]
fn concurrent_writers_see_consistent_params() {
    let inputs = SignalImage::from_pairs([("sp", 1.0), ("pv", 0.0)]);
    let pid = Pid::new(PidParams {
        kp: 1.0,
        ki: 1.0,
        kd: 0.0,
        output_min: 0.0,
        output_max: 10.0,
    })
    .unwrap();
    let nodes = vec![
        NodeSpec::new("pid", pid)
            .input("sp", SourceConfig::External("sp".into()))
            .input("pv", SourceConfig::External("pv".into())),
    ];
    let graph = CycleGraph::build(nodes, &[], &inputs, 8).unwrap();
    let handle = graph.handle("pid").unwrap();
    let options = SchedulerOptions {
        max_cycles: Some(2000),
        ..Default::default()
    };
    let mut sched =
        CycleScheduler::new(graph, inputs, SimulatedClock::new(), (), Vec::new(), options);

    // Each writer keeps kp == ki so any mixed state is detectable.
    let writers: Vec<_> = (1..=4)
        .map(|w| {
            let handle = handle.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let g = f64::from(w * 1000 + i);
                    handle
                        .set_params(BlockUpdate::Pid(PidUpdate {
                            kp: Some(g),
                            ki: Some(g),
                            ..Default::default()
                        }))
                        .unwrap();
                }
            })
        })
        .collect();

    sched.run(PERIOD).unwrap();
    for w in writers {
        w.join().unwrap();
    }

    let BlockParams::Pid(staged) = handle.params() else {
        panic!("kind changed");
    };
    assert_eq!(staged.kp, staged.ki);
    let Some(BlockParams::Pid(running)) = sched.graph().block_params("pid") else {
        panic!("pid missing");
    };
    assert_eq!(running.kp, running.ki);
}
