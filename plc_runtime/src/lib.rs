//! # PLC Cycle Runtime Library
//!
//! Fixed-period control cycle for soft-PLC style applications. A cycle
//! graph of function blocks (PID, first-order lag, ramp, limit) is
//! evaluated once per period on an absolute, drift-free schedule.
//!
//! ## Layers
//!
//! 1. **Blocks**: validated, self-contained control algorithms
//! 2. **Graph**: ordered wiring between inputs, constants and blocks
//! 3. **Scheduler**: pacing, overrun skip, pause/resume/stop
//! 4. **Diagnostics**: per-cycle records, logs and statistics
//!
//! ## Cycle Path
//!
//! Wiring is resolved at startup. During a cycle the graph performs no
//! lookups and no allocation; parameter changes from other threads are
//! staged and applied only at the cycle boundary.

pub mod blocks;
pub mod clock;
pub mod config;
pub mod cycle;
pub mod debug;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod io;

pub use blocks::{Block, BlockKind, BlockParams, BlockState, BlockUpdate, FunctionBlock};
pub use clock::{Clock, MonotonicClock, SimulatedClock};
pub use cycle::{
    CycleFlags, CycleRecord, CycleScheduler, CycleStats, SchedulerHandle, SchedulerOptions,
    SchedulerState,
};
pub use diagnostics::{ChannelSink, DiagnosticsSink, LogSink};
pub use error::{BlockError, CycleError, GraphError, StartupError};
pub use graph::{CycleGraph, NodeSpec, ParamHandle};
pub use io::{InputImage, OutputImage, ProcessIo, SharedProcessImage};
