//! Scheduler pacing on simulated time.
//!
//! Verifies:
//! - Wake times stay on the `t0 + n·period` grid (no drift)
//! - Overruns skip to the next future tick instead of running back to back
//! - Paused time is excluded from the measured period
//! - Stop takes effect at the next cycle boundary
//! - Control sent while the loop sleeps is honoured before the next cycle
//!
//! The full 1000 × 100 ms wall-clock run is `#[ignore]`d; a short
//! wall-clock smoke test always runs.

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use plc_common::graph::{OutputConfig, SourceConfig};
use plc_runtime::blocks::{FirstOrder, FirstOrderParams, Pid, PidParams};
use plc_runtime::clock::{Clock, MonotonicClock, SimulatedClock};
use plc_runtime::cycle::{
    CycleFlags, CycleRecord, CycleScheduler, SchedulerHandle, SchedulerOptions, SchedulerState,
};
use plc_runtime::error::CycleError;
use plc_runtime::graph::{CycleGraph, NodeSpec};
use plc_runtime::io::{InputImage, OutputImage, ProcessIo, SignalImage};

const PERIOD: Duration = Duration::from_millis(100);

/// PID heating a first-order plant whose output loops back as the PV.
fn closed_loop() -> (CycleGraph, InputImage) {
    let inputs = SignalImage::from_pairs([("setpoint", 50.0), ("temperature", 20.0)]);
    let pid = Pid::new(PidParams {
        kp: 2.0,
        ki: 0.1,
        kd: 0.0,
        output_min: 0.0,
        output_max: 100.0,
    })
    .unwrap();
    let plant =
        FirstOrder::with_initial_output(FirstOrderParams { time_constant: 5.0 }, 20.0).unwrap();
    let nodes = vec![
        NodeSpec::new("controller", pid)
            .input("sp", SourceConfig::External("setpoint".into()))
            .input("pv", SourceConfig::External("temperature".into())),
        NodeSpec::new("plant", plant).input("input", SourceConfig::Block("controller".into())),
    ];
    let outputs = [OutputConfig {
        name: "temperature_out".into(),
        block: "plant".into(),
        loopback: Some("temperature".into()),
    }];
    let graph = CycleGraph::build(nodes, &outputs, &inputs, 32).unwrap();
    (graph, inputs)
}

fn options(max_cycles: u64) -> SchedulerOptions {
    SchedulerOptions {
        max_cycles: Some(max_cycles),
        ..Default::default()
    }
}

/// Process I/O stub that burns simulated time and can drive the control
/// handle from inside the cycle.
struct ScriptedIo {
    clock: SimulatedClock,
    /// Execution time per cycle, by cycle index; missing entries are zero.
    work: Vec<Duration>,
    cycle: usize,
    handle: Arc<OnceLock<SchedulerHandle>>,
    pause_at: Option<usize>,
    stop_at: Option<usize>,
}

impl ScriptedIo {
    fn new(clock: &SimulatedClock) -> Self {
        Self {
            clock: clock.clone(),
            work: Vec::new(),
            cycle: 0,
            handle: Arc::new(OnceLock::new()),
            pause_at: None,
            stop_at: None,
        }
    }
}

impl ProcessIo for ScriptedIo {
    fn read_inputs(&mut self, _image: &mut InputImage) {
        self.cycle += 1;
        if let Some(d) = self.work.get(self.cycle - 1) {
            self.clock.advance(*d);
        }
        if let Some(handle) = self.handle.get() {
            if self.pause_at == Some(self.cycle) {
                handle.pause().unwrap();
            }
            if self.stop_at == Some(self.cycle) {
                handle.stop().unwrap();
            }
        }
    }

    fn write_outputs(&mut self, _image: &OutputImage) {}
}

fn wait_for_state(handle: &SchedulerHandle, want: SchedulerState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.state() != want {
        assert!(Instant::now() < deadline, "scheduler never reached {want}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn wake_times_stay_on_grid() {
    let clock = SimulatedClock::with_wake_latency(Duration::from_micros(300));
    let mut io = ScriptedIo::new(&clock);
    io.work = vec![Duration::from_millis(2); 1000];
    let (graph, inputs) = closed_loop();
    let mut sched = CycleScheduler::new(graph, inputs, clock.clone(), io, Vec::new(), options(1000));

    let stats = sched.run(PERIOD).unwrap();
    let records = sched.sink();

    assert_eq!(stats.cycle_count, 1000);
    assert_eq!(stats.overruns, 0);
    assert_eq!(stats.skipped_ticks, 0);
    // Execution time and wake latency do not accumulate.
    assert_eq!(
        clock.elapsed(),
        PERIOD * 1000 + Duration::from_micros(300) + Duration::from_millis(2)
    );
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.seq, i as u64 + 1);
        assert_eq!(r.tick, r.seq);
        assert_eq!(r.latency, Duration::from_micros(300));
        assert_eq!(r.execution, Duration::from_millis(2));
    }
    assert!(records[1..].iter().all(|r| r.actual == PERIOD));
    assert_eq!(stats.within_tolerance_percent(), 100.0);
}

#[test]
fn overrun_skips_to_next_future_tick() {
    let clock = SimulatedClock::new();
    let mut io = ScriptedIo::new(&clock);
    io.work = vec![Duration::ZERO, Duration::from_millis(250)];
    let (graph, inputs) = closed_loop();
    let mut sched = CycleScheduler::new(graph, inputs, clock.clone(), io, Vec::new(), options(4));

    let stats = sched.run(PERIOD).unwrap();
    let records: &Vec<CycleRecord> = sched.sink();

    assert_eq!(stats.cycle_count, 4);
    assert_eq!(stats.overruns, 1);
    assert_eq!(stats.skipped_ticks, 2);

    // Cycle 2 woke at 200 ms and ran until 450 ms: ticks 3 and 4 are
    // dropped, cycle 3 wakes at 500 ms.
    let overrun = &records[1];
    assert!(overrun.flags.contains(CycleFlags::OVERRUN | CycleFlags::SKIPPED));
    assert_eq!(overrun.tick, 2);
    assert_eq!(overrun.skipped, 2);
    assert_eq!(records[2].tick, 5);
    assert_eq!(records[2].actual, Duration::from_millis(300));
    assert_eq!(records[3].tick, 6);
    assert_eq!(records[3].actual, PERIOD);
    assert_eq!(clock.elapsed(), Duration::from_millis(600));

    let seqs: Vec<u64> = records.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);
}

#[test]
fn execution_equal_to_period_is_not_an_overrun() {
    let clock = SimulatedClock::new();
    let mut io = ScriptedIo::new(&clock);
    io.work = vec![PERIOD; 3];
    let (graph, inputs) = closed_loop();
    let mut sched = CycleScheduler::new(graph, inputs, clock.clone(), io, Vec::new(), options(3));

    let stats = sched.run(PERIOD).unwrap();
    assert_eq!(stats.overruns, 0);
    assert_eq!(stats.skipped_ticks, 0);
    let ticks: Vec<u64> = sched.sink().iter().map(|r| r.tick).collect();
    assert_eq!(ticks, vec![1, 2, 3]);
}

#[test]
fn paused_time_is_not_jitter() {
    let clock = SimulatedClock::new();
    let mut io = ScriptedIo::new(&clock);
    io.pause_at = Some(3);
    let cell = Arc::clone(&io.handle);
    let (graph, inputs) = closed_loop();
    let mut sched = CycleScheduler::new(graph, inputs, clock.clone(), io, Vec::new(), options(6));
    let handle = sched.handle();
    cell.set(handle.clone()).unwrap();

    let helper_clock = clock.clone();
    let helper = thread::spawn(move || {
        wait_for_state(&handle, SchedulerState::Paused);
        assert_eq!(handle.status().cycles, 3);
        helper_clock.advance(Duration::from_secs(2));
        handle.resume().unwrap();
    });

    let stats = sched.run(PERIOD).unwrap();
    helper.join().unwrap();
    let records = sched.sink();

    assert_eq!(stats.cycle_count, 6);
    assert!(records.iter().all(|r| r.actual == PERIOD));
    let resumed: Vec<u64> = records
        .iter()
        .filter(|r| r.flags.contains(CycleFlags::RESUMED))
        .map(|r| r.seq)
        .collect();
    assert_eq!(resumed, vec![4]);
    assert_eq!(stats.within_tolerance_percent(), 100.0);
    assert_eq!(clock.elapsed(), Duration::from_secs(2) + PERIOD * 6);
}

#[test]
fn pause_before_first_cycle_holds_the_loop() {
    let clock = SimulatedClock::new();
    let (graph, inputs) = closed_loop();
    let mut sched = CycleScheduler::new(graph, inputs, clock.clone(), (), Vec::new(), options(2));
    let handle = sched.handle();
    handle.pause().unwrap();

    let helper_clock = clock.clone();
    let helper_handle = handle.clone();
    let helper = thread::spawn(move || {
        wait_for_state(&helper_handle, SchedulerState::Paused);
        helper_clock.advance(Duration::from_secs(10));
        helper_handle.resume().unwrap();
    });

    let stats = sched.run(PERIOD).unwrap();
    helper.join().unwrap();
    assert_eq!(stats.cycle_count, 2);
    assert_eq!(sched.sink()[0].actual, PERIOD);
    assert!(sched.sink()[0].flags.contains(CycleFlags::RESUMED));
}

#[test]
fn stop_while_paused_ends_run() {
    let clock = SimulatedClock::new();
    let mut io = ScriptedIo::new(&clock);
    io.pause_at = Some(2);
    let cell = Arc::clone(&io.handle);
    let (graph, inputs) = closed_loop();
    let mut sched = CycleScheduler::new(graph, inputs, clock, io, Vec::new(), options(100));
    let handle = sched.handle();
    cell.set(handle.clone()).unwrap();

    let helper = thread::spawn(move || {
        wait_for_state(&handle, SchedulerState::Paused);
        handle.stop().unwrap();
    });

    let stats = sched.run(PERIOD).unwrap();
    helper.join().unwrap();
    assert_eq!(stats.cycle_count, 2);
    assert_eq!(sched.state(), SchedulerState::Stopped);
}

#[test]
fn stop_completes_current_cycle() {
    let clock = SimulatedClock::new();
    let mut io = ScriptedIo::new(&clock);
    io.stop_at = Some(3);
    let cell = Arc::clone(&io.handle);
    let (graph, inputs) = closed_loop();
    let mut sched = CycleScheduler::new(graph, inputs, clock, io, Vec::new(), options(100));
    cell.set(sched.handle()).unwrap();

    let stats = sched.run(PERIOD).unwrap();
    assert_eq!(stats.cycle_count, 3);
    assert_eq!(sched.sink().len(), 3);
    // The stopping cycle still published its outputs.
    assert!(sched.outputs().get("temperature_out").unwrap() > 20.0);
    assert_eq!(sched.handle().state(), SchedulerState::Stopped);
}

/// Simulated clock that sends control messages from inside `sleep_until`,
/// as a signal handler or debug client would while the loop sleeps.
struct InterruptingClock {
    inner: SimulatedClock,
    handle: Arc<OnceLock<SchedulerHandle>>,
    sleeps: std::cell::Cell<usize>,
    on_sleep: usize,
    send: fn(&SchedulerHandle),
}

impl InterruptingClock {
    fn new(on_sleep: usize, send: fn(&SchedulerHandle)) -> Self {
        Self {
            inner: SimulatedClock::new(),
            handle: Arc::new(OnceLock::new()),
            sleeps: std::cell::Cell::new(0),
            on_sleep,
            send,
        }
    }
}

impl Clock for InterruptingClock {
    fn now(&self) -> Result<Duration, CycleError> {
        self.inner.now()
    }

    fn sleep_until(&self, deadline: Duration) -> Result<(), CycleError> {
        self.inner.sleep_until(deadline)?;
        self.sleeps.set(self.sleeps.get() + 1);
        if self.sleeps.get() == self.on_sleep {
            if let Some(handle) = self.handle.get() {
                (self.send)(handle);
            }
        }
        Ok(())
    }
}

#[test]
fn stop_during_sleep_skips_the_pending_cycle() {
    let clock = InterruptingClock::new(3, |h| h.stop().unwrap());
    let cell = Arc::clone(&clock.handle);
    let (graph, inputs) = closed_loop();
    let mut sched = CycleScheduler::new(graph, inputs, clock, (), Vec::new(), options(100));
    cell.set(sched.handle()).unwrap();

    let stats = sched.run(PERIOD).unwrap();
    // Two cycles ran before the third wake-up; the stop lands before cycle 3.
    assert_eq!(stats.cycle_count, 2);
    assert_eq!(sched.sink().len(), 2);
    assert_eq!(sched.state(), SchedulerState::Stopped);
}

#[test]
fn pause_during_sleep_holds_before_the_pending_cycle() {
    let clock = InterruptingClock::new(2, |h| {
        h.pause().unwrap();
        h.resume().unwrap();
    });
    let cell = Arc::clone(&clock.handle);
    let (graph, inputs) = closed_loop();
    let mut sched = CycleScheduler::new(graph, inputs, clock, (), Vec::new(), options(4));
    cell.set(sched.handle()).unwrap();

    let stats = sched.run(PERIOD).unwrap();
    let records = sched.sink();
    assert_eq!(stats.cycle_count, 4);
    // Cycle 2 was held at the boundary and runs first after the resume.
    assert_eq!(records[1].seq, 2);
    assert!(records[1].flags.contains(CycleFlags::RESUMED));
    assert_eq!(records[1].tick, 2);
    assert!(!records[0].flags.contains(CycleFlags::RESUMED));
    assert!(records.iter().all(|r| r.skipped == 0));
}

#[test]
fn closed_loop_approaches_setpoint() {
    let clock = SimulatedClock::new();
    let (graph, inputs) = closed_loop();
    let mut sched = CycleScheduler::new(graph, inputs, clock, (), Vec::new(), options(1500));
    let stats = sched.run(PERIOD).unwrap();
    assert_eq!(stats.cycle_count, 1500);
    assert_eq!(stats.block_faults, 0);

    let final_temp = sched.outputs().get("temperature_out").unwrap();
    assert!(
        (final_temp - 50.0).abs() < 0.5,
        "temperature {final_temp} did not settle near 50"
    );
    // The loopback input carries the previous cycle's output.
    let looped = sched.inputs().get("temperature").unwrap();
    assert!(looped > 49.0 && looped <= final_temp);
}

#[test]
fn wall_clock_smoke() {
    let (graph, inputs) = closed_loop();
    let mut sched =
        CycleScheduler::new(graph, inputs, MonotonicClock::new(), (), Vec::new(), options(20));
    let period = Duration::from_millis(10);
    let started = Instant::now();
    let stats = sched.run(period).unwrap();

    assert_eq!(stats.cycle_count, 20);
    assert!(started.elapsed() >= period * 20);
    let avg = stats.avg_actual_ms();
    assert!((9.5..=15.0).contains(&avg), "average period {avg} ms");
}

#[test]
#[ignore] // 100 s wall clock
fn wall_clock_stability_1000_cycles() {
    let (graph, inputs) = closed_loop();
    let mut sched =
        CycleScheduler::new(graph, inputs, MonotonicClock::new(), (), Vec::new(), options(1000));
    let stats = sched.run(PERIOD).unwrap();

    assert_eq!(stats.cycle_count, 1000);
    assert!(
        stats.within_tolerance_percent() >= 95.0,
        "only {:.1}% of cycles within ±5%",
        stats.within_tolerance_percent()
    );
    assert!((stats.avg_actual_ms() - 100.0).abs() < 1.0);
}
