//! Deterministic fixed-period cycle: wait → read → execute → write → record.
//!
//! ## Pacing
//! Wake time of tick `n` is `t0 + n·period` on an absolute clock, so
//! execution time and wake-up latency never accumulate into drift.
//! When a cycle ends after the next wake time, the scheduler jumps to the
//! next tick still in the future and counts the skipped ticks. Two cycles
//! never run back to back.
//!
//! ## Control
//! [`SchedulerHandle`] sends pause/resume/stop messages. They are observed
//! only at a cycle boundary, never during graph execution. Paused time
//! shifts `t0` so it does not show up as jitter.
//!
//! ## RT Setup
//! With the `rt` feature: `mlockall`, stack prefault, CPU affinity and
//! `SCHED_FIFO`. Without it the calls are no-ops.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;
use plc_common::consts::{
    CYCLE_PERIOD_MS_MAX, CYCLE_PERIOD_MS_MIN, JITTER_TOLERANCE_PERCENT,
    MAX_FUNCTION_BLOCKS_LIMIT, TIMEOUT_THRESHOLD_PERCENT_DEFAULT,
};
use static_assertions::assert_impl_all;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::diagnostics::DiagnosticsSink;
use crate::error::CycleError;
use crate::graph::{BlockSnapshot, CycleGraph};
use crate::io::{InputImage, OutputImage, ProcessIo};

// ─── Scheduler State Machine ────────────────────────────────────────

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SchedulerState {
    #[default]
    Idle = 0,
    Running = 1,
    Paused = 2,
    Stopped = 3,
}

impl SchedulerState {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Paused,
            3 => Self::Stopped,
            _ => Self::Idle,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event that can trigger a scheduler state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    Start,
    Pause,
    Resume,
    Stop,
}

/// Result of a scheduler transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition succeeded: new state.
    Ok(SchedulerState),
    /// Transition rejected: reason.
    Rejected(&'static str),
}

/// `Idle → Running → (Paused ↔ Running) → Stopped`.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStateMachine {
    state: SchedulerState,
}

impl SchedulerStateMachine {
    pub const fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
        }
    }

    #[inline]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn handle_event(&mut self, event: SchedulerEvent) -> TransitionResult {
        use SchedulerEvent::*;
        use SchedulerState::*;

        let next = match (self.state, event) {
            (Idle, Start) => Running,
            (Running, Pause) => Paused,
            (Paused, Resume) => Running,
            (Idle | Running | Paused, Stop) => Stopped,

            (Stopped, _) => return TransitionResult::Rejected("scheduler already stopped"),
            (_, Start) => return TransitionResult::Rejected("scheduler already started"),
            (Paused, Pause) => return TransitionResult::Rejected("already paused"),
            (_, Resume) => return TransitionResult::Rejected("not paused"),
            (Idle, Pause) => return TransitionResult::Rejected("scheduler not running"),
        };

        self.state = next;
        TransitionResult::Ok(next)
    }
}

// ─── Control Channel ────────────────────────────────────────────────

/// Message from a control collaborator to the cycle thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Pause,
    Resume,
    Stop,
}

#[derive(Debug, Default)]
struct SharedStatus {
    state: AtomicU8,
    cycles: AtomicU64,
    overruns: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time view of a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub cycles: u64,
    pub overruns: u64,
    pub skipped: u64,
}

/// Cloneable, thread-safe control handle.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: Sender<ControlMessage>,
    status: Arc<SharedStatus>,
}

assert_impl_all!(SchedulerHandle: Send, Sync, Clone);

impl SchedulerHandle {
    /// Freeze the loop at the next cycle boundary.
    pub fn pause(&self) -> Result<(), CycleError> {
        self.send(ControlMessage::Pause)
    }

    pub fn resume(&self) -> Result<(), CycleError> {
        self.send(ControlMessage::Resume)
    }

    /// Stop after the current cycle completes.
    pub fn stop(&self) -> Result<(), CycleError> {
        self.send(ControlMessage::Stop)
    }

    pub fn send(&self, msg: ControlMessage) -> Result<(), CycleError> {
        self.tx.send(msg).map_err(|_| CycleError::ChannelClosed)
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.status.state.load(Ordering::Acquire))
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            state: self.state(),
            cycles: self.status.cycles.load(Ordering::Relaxed),
            overruns: self.status.overruns.load(Ordering::Relaxed),
            skipped: self.status.skipped.load(Ordering::Relaxed),
        }
    }
}

// ─── Cycle Records ──────────────────────────────────────────────────

bitflags! {
    /// Per-cycle event flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CycleFlags: u8 {
        /// Graph execution took longer than the period.
        const OVERRUN        = 0x01;
        /// Ticks were dropped after this cycle.
        const SKIPPED        = 0x02;
        /// First cycle after a pause.
        const RESUMED        = 0x04;
        /// Staged parameters or resets applied before execution.
        const PARAMS_APPLIED = 0x08;
        /// At least one block held its previous output.
        const BLOCK_FAULT    = 0x10;
    }
}

/// Block snapshots attached to a record.
pub type Snapshot = heapless::Vec<BlockSnapshot, MAX_FUNCTION_BLOCKS_LIMIT>;

/// Timing record emitted once per executed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleRecord {
    /// Executed-cycle sequence number, gap-free from 1.
    pub seq: u64,
    /// Tick index `n` of the wake time `t0 + n·period`.
    pub tick: u64,
    /// Target period.
    pub period: Duration,
    /// Time between this wake-up and the previous one.
    pub actual: Duration,
    /// Graph execution time including process I/O.
    pub execution: Duration,
    /// How late the wake-up was relative to its ideal time.
    pub latency: Duration,
    /// Ticks dropped after this cycle.
    pub skipped: u64,
    /// Blocks that failed this cycle.
    pub faults: u16,
    pub flags: CycleFlags,
    pub snapshot: Option<Snapshot>,
}

impl CycleRecord {
    #[inline]
    pub fn actual_ms(&self) -> f64 {
        self.actual.as_secs_f64() * 1000.0
    }

    /// Deviation of `actual` from `period` as a percentage of `period`.
    #[inline]
    pub fn jitter_percent(&self) -> f64 {
        let period = self.period.as_secs_f64();
        (self.actual.as_secs_f64() - period) / period * 100.0
    }
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics over `actual`.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleStats {
    /// Target period [ns].
    pub period_ns: u64,
    /// `actual` above this counts as a timeout [ns].
    pub timeout_ns: u64,
    /// Total cycles recorded.
    pub cycle_count: u64,
    /// Last `actual` [ns].
    pub last_actual_ns: u64,
    pub min_actual_ns: u64,
    pub max_actual_ns: u64,
    /// Running sum for average computation.
    pub sum_actual_ns: u128,
    /// Running sum of squares for stddev computation.
    pub sum_sq_actual_ns: u128,
    /// Cycles whose execution exceeded the period.
    pub overruns: u64,
    /// Ticks dropped to stay on schedule.
    pub skipped_ticks: u64,
    /// Cycles whose `actual` exceeded the timeout threshold.
    pub timeouts: u64,
    /// Cycles with at least one failed block.
    pub block_faults: u64,
    /// Cycles with `actual` within ±5% of the period.
    pub within_tolerance: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: u64,
    /// Maximum execution time [ns].
    pub max_execution_ns: u64,
}

impl CycleStats {
    pub fn new(period: Duration, timeout_threshold_percent: u32) -> Self {
        let period_ns = period.as_nanos() as u64;
        Self {
            period_ns,
            timeout_ns: period_ns * u64::from(timeout_threshold_percent) / 100,
            cycle_count: 0,
            last_actual_ns: 0,
            min_actual_ns: u64::MAX,
            max_actual_ns: 0,
            sum_actual_ns: 0,
            sum_sq_actual_ns: 0,
            overruns: 0,
            skipped_ticks: 0,
            timeouts: 0,
            block_faults: 0,
            within_tolerance: 0,
            max_latency_ns: 0,
            max_execution_ns: 0,
        }
    }

    /// Record one cycle. O(1), no allocation.
    pub fn record(&mut self, record: &CycleRecord) {
        let actual = record.actual.as_nanos() as u64;
        self.cycle_count += 1;
        self.last_actual_ns = actual;
        self.min_actual_ns = self.min_actual_ns.min(actual);
        self.max_actual_ns = self.max_actual_ns.max(actual);
        self.sum_actual_ns += u128::from(actual);
        self.sum_sq_actual_ns += u128::from(actual) * u128::from(actual);
        self.max_latency_ns = self.max_latency_ns.max(record.latency.as_nanos() as u64);
        self.max_execution_ns = self
            .max_execution_ns
            .max(record.execution.as_nanos() as u64);

        if record.flags.contains(CycleFlags::OVERRUN) {
            self.overruns += 1;
        }
        if record.flags.contains(CycleFlags::BLOCK_FAULT) {
            self.block_faults += 1;
        }
        self.skipped_ticks += record.skipped;
        if actual > self.timeout_ns {
            self.timeouts += 1;
        }
        let deviation = (actual as f64 - self.period_ns as f64).abs();
        if deviation <= self.period_ns as f64 * JITTER_TOLERANCE_PERCENT / 100.0 {
            self.within_tolerance += 1;
        }
    }

    /// True if `actual` exceeds the timeout threshold.
    #[inline]
    pub fn is_timeout(&self, actual: Duration) -> bool {
        actual.as_nanos() as u64 > self.timeout_ns
    }

    /// Average `actual` [ms] (0 if no cycles).
    pub fn avg_actual_ms(&self) -> f64 {
        if self.cycle_count == 0 {
            return 0.0;
        }
        self.sum_actual_ns as f64 / self.cycle_count as f64 / 1.0e6
    }

    /// Population standard deviation of `actual` [ms].
    pub fn stddev_actual_ms(&self) -> f64 {
        if self.cycle_count == 0 {
            return 0.0;
        }
        let n = self.cycle_count as f64;
        let mean = self.sum_actual_ns as f64 / n;
        let variance = (self.sum_sq_actual_ns as f64 / n - mean * mean).max(0.0);
        variance.sqrt() / 1.0e6
    }

    pub fn min_actual_ms(&self) -> f64 {
        if self.cycle_count == 0 {
            0.0
        } else {
            self.min_actual_ns as f64 / 1.0e6
        }
    }

    pub fn max_actual_ms(&self) -> f64 {
        self.max_actual_ns as f64 / 1.0e6
    }

    /// Share of cycles within ±5% of the period, in percent.
    pub fn within_tolerance_percent(&self) -> f64 {
        if self.cycle_count == 0 {
            return 0.0;
        }
        self.within_tolerance as f64 / self.cycle_count as f64 * 100.0
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{mlockall, MlockallFlags};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the cycle thread never faults on it.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// RT setup sequence for the calling (cycle) thread.
pub fn rt_setup(cpu_core: Option<usize>, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    if let Some(cpu) = cpu_core {
        rt_set_affinity(cpu)?;
    }
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Scheduler ────────────────────────────────────────────────

/// Scheduler tuning that is not the period itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerOptions {
    /// `actual` above this share of the period counts as a timeout.
    pub timeout_threshold_percent: u32,
    /// Stop after this many executed cycles.
    pub max_cycles: Option<u64>,
    /// Attach block snapshots to every record.
    pub snapshot_blocks: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            timeout_threshold_percent: TIMEOUT_THRESHOLD_PERCENT_DEFAULT,
            max_cycles: None,
            snapshot_blocks: false,
        }
    }
}

/// Outcome of a cycle-boundary control check.
enum Boundary {
    Continue,
    Resumed(Duration),
    Stop,
}

/// Check that `period` lies within the supported range.
pub fn validate_period(period: Duration) -> Result<(), CycleError> {
    let min = Duration::from_millis(u64::from(CYCLE_PERIOD_MS_MIN));
    let max = Duration::from_millis(u64::from(CYCLE_PERIOD_MS_MAX));
    if period < min || period > max {
        return Err(CycleError::InvalidPeriod { period, min, max });
    }
    Ok(())
}

/// Fixed-period cycle scheduler.
///
/// Owns the graph, the process image and all timing state. `run` blocks
/// the calling thread until stopped, the cycle limit is reached, or the
/// clock fails.
pub struct CycleScheduler<C: Clock, I: ProcessIo, S: DiagnosticsSink> {
    clock: C,
    io: I,
    sink: S,
    graph: CycleGraph,
    inputs: InputImage,
    outputs: OutputImage,
    options: SchedulerOptions,
    machine: SchedulerStateMachine,
    control_tx: Sender<ControlMessage>,
    control_rx: Receiver<ControlMessage>,
    status: Arc<SharedStatus>,
    stats: CycleStats,
}

impl<C: Clock, I: ProcessIo, S: DiagnosticsSink> CycleScheduler<C, I, S> {
    pub fn new(
        graph: CycleGraph,
        inputs: InputImage,
        clock: C,
        io: I,
        sink: S,
        options: SchedulerOptions,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::channel();
        let outputs = graph.output_image();
        let stats = CycleStats::new(Duration::ZERO, options.timeout_threshold_percent);
        Self {
            clock,
            io,
            sink,
            graph,
            inputs,
            outputs,
            options,
            machine: SchedulerStateMachine::new(),
            control_tx,
            control_rx,
            status: Arc::new(SharedStatus::default()),
            stats,
        }
    }

    /// Control handle for other threads.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            tx: self.control_tx.clone(),
            status: Arc::clone(&self.status),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.machine.state()
    }

    pub fn graph(&self) -> &CycleGraph {
        &self.graph
    }

    pub fn inputs(&self) -> &InputImage {
        &self.inputs
    }

    pub fn outputs(&self) -> &OutputImage {
        &self.outputs
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Start and run the loop at `period`.
    ///
    /// Returns the final statistics. A clock failure aborts with
    /// [`CycleError::SchedulerFatal`]; the sink still receives `finish`.
    pub fn run(&mut self, period: Duration) -> Result<CycleStats, CycleError> {
        validate_period(period)?;
        self.transition(SchedulerEvent::Start)?;
        self.stats = CycleStats::new(period, self.options.timeout_threshold_percent);
        info!(
            period_ms = period.as_millis() as u64,
            blocks = self.graph.len(),
            "cycle scheduler started"
        );

        let result = self.run_loop(period);

        if self.machine.state() != SchedulerState::Stopped {
            let _ = self.transition(SchedulerEvent::Stop);
        }
        self.sink.finish(&self.stats);

        match result {
            Ok(()) => {
                info!(cycles = self.stats.cycle_count, "cycle scheduler stopped");
                Ok(self.stats.clone())
            }
            Err(e) => {
                tracing::error!(error = %e, "cycle scheduler aborted");
                Err(e)
            }
        }
    }

    fn run_loop(&mut self, period: Duration) -> Result<(), CycleError> {
        let period_ns = period.as_nanos() as u64;
        let dt = period.as_secs_f64();

        let mut t0 = self.clock.now()?;
        let mut prev_wake = t0;
        let mut tick: u64 = 0;
        let mut seq: u64 = 0;
        let mut carried = CycleFlags::empty();

        loop {
            match self.poll_control()? {
                Boundary::Stop => return Ok(()),
                Boundary::Resumed(paused) => {
                    t0 += paused;
                    prev_wake += paused;
                    carried |= CycleFlags::RESUMED;
                }
                Boundary::Continue => {}
            }
            if self.options.max_cycles.is_some_and(|max| seq >= max) {
                return Ok(());
            }

            tick += 1;
            let wake = t0 + Duration::from_nanos(period_ns.saturating_mul(tick));
            self.clock.sleep_until(wake)?;

            // Control sent during the sleep is honoured before this cycle runs.
            match self.poll_control()? {
                Boundary::Stop => return Ok(()),
                Boundary::Resumed(paused) => {
                    t0 += paused;
                    prev_wake += paused;
                    carried |= CycleFlags::RESUMED;
                    // Wait for the same tick on the shifted grid.
                    tick -= 1;
                    continue;
                }
                Boundary::Continue => {}
            }
            let woke = self.clock.now()?;

            // ── Cycle body ──
            let mut flags = std::mem::take(&mut carried);
            if self.graph.apply_pending() {
                flags |= CycleFlags::PARAMS_APPLIED;
            }
            self.io.read_inputs(&mut self.inputs);
            let report = self.graph.execute(&mut self.inputs, &mut self.outputs, dt);
            self.io.write_outputs(&self.outputs);
            let end = self.clock.now()?;

            seq += 1;
            let execution = end.saturating_sub(woke);
            let actual = woke.saturating_sub(prev_wake);
            prev_wake = woke;

            if report.faults > 0 {
                flags |= CycleFlags::BLOCK_FAULT;
            }
            if execution > period {
                flags |= CycleFlags::OVERRUN;
                let err = CycleError::CycleOverrun { execution, period };
                warn!(seq, "{err}");
            }

            let executed_tick = tick;
            // Next tick whose wake time is not already in the past.
            let elapsed_ns = end.saturating_sub(t0).as_nanos() as u64;
            let next_tick = elapsed_ns.div_ceil(period_ns).max(tick + 1);
            let skipped = next_tick - tick - 1;
            if skipped > 0 {
                flags |= CycleFlags::SKIPPED;
                warn!(seq, skipped, "behind schedule, skipping ticks");
                tick = next_tick - 1;
            }

            let snapshot = self.options.snapshot_blocks.then(|| {
                let mut snap = Snapshot::new();
                self.graph.snapshot(&mut snap);
                snap
            });

            let record = CycleRecord {
                seq,
                tick: executed_tick,
                period,
                actual,
                execution,
                latency: woke.saturating_sub(wake),
                skipped,
                faults: report.faults.min(usize::from(u16::MAX)) as u16,
                flags,
                snapshot,
            };
            self.stats.record(&record);
            self.publish_status();
            self.sink.record(&record, &self.stats);
        }
    }

    /// Drain control messages at a cycle boundary.
    fn poll_control(&mut self) -> Result<Boundary, CycleError> {
        loop {
            let msg = match self.control_rx.try_recv() {
                Ok(msg) => msg,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
                    return Ok(Boundary::Continue)
                }
            };
            match msg {
                ControlMessage::Stop => {
                    self.transition(SchedulerEvent::Stop)?;
                    return Ok(Boundary::Stop);
                }
                ControlMessage::Pause => return self.wait_paused(),
                ControlMessage::Resume => {
                    debug!("resume ignored, scheduler not paused");
                }
            }
        }
    }

    /// Block until resumed or stopped.
    fn wait_paused(&mut self) -> Result<Boundary, CycleError> {
        let paused_at = self.clock.now()?;
        self.transition(SchedulerEvent::Pause)?;
        info!("cycle scheduler paused");

        loop {
            match self.control_rx.recv() {
                Ok(ControlMessage::Resume) => {
                    let paused = self.clock.now()?.saturating_sub(paused_at);
                    self.transition(SchedulerEvent::Resume)?;
                    info!(paused_ms = paused.as_millis() as u64, "cycle scheduler resumed");
                    return Ok(Boundary::Resumed(paused));
                }
                Ok(ControlMessage::Stop) | Err(_) => {
                    self.transition(SchedulerEvent::Stop)?;
                    return Ok(Boundary::Stop);
                }
                Ok(ControlMessage::Pause) => debug!("pause ignored, already paused"),
            }
        }
    }

    fn transition(&mut self, event: SchedulerEvent) -> Result<SchedulerState, CycleError> {
        match self.machine.handle_event(event) {
            TransitionResult::Ok(state) => {
                self.status.state.store(state as u8, Ordering::Release);
                Ok(state)
            }
            TransitionResult::Rejected(reason) => Err(CycleError::InvalidTransition(reason)),
        }
    }

    fn publish_status(&self) {
        self.status
            .cycles
            .store(self.stats.cycle_count, Ordering::Relaxed);
        self.status
            .overruns
            .store(self.stats.overruns, Ordering::Relaxed);
        self.status
            .skipped
            .store(self.stats.skipped_ticks, Ordering::Relaxed);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
