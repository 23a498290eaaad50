//! Time sources for the cycle scheduler.
//!
//! Times are [`Duration`]s since an arbitrary clock-specific origin. The
//! scheduler only ever sleeps until an absolute deadline, so any error in a
//! single wake-up does not accumulate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CycleError;

/// Monotonic time source with absolute-deadline sleep.
pub trait Clock {
    /// Current time since the clock origin.
    fn now(&self) -> Result<Duration, CycleError>;

    /// Block until `deadline`. Returns immediately if it already passed.
    fn sleep_until(&self, deadline: Duration) -> Result<(), CycleError>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Result<Duration, CycleError> {
        (**self).now()
    }

    fn sleep_until(&self, deadline: Duration) -> Result<(), CycleError> {
        (**self).sleep_until(deadline)
    }
}

// ─── Monotonic Clock ────────────────────────────────────────────────

/// `CLOCK_MONOTONIC` with `clock_nanosleep(TIMER_ABSTIME)`.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

#[cfg(target_os = "linux")]
impl MonotonicClock {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "linux")]
impl Clock for MonotonicClock {
    fn now(&self) -> Result<Duration, CycleError> {
        use nix::time::{clock_gettime, ClockId};

        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|e| CycleError::SchedulerFatal(format!("clock_gettime: {e}")))?;
        Ok(Duration::new(ts.tv_sec() as u64, ts.tv_nsec() as u32))
    }

    fn sleep_until(&self, deadline: Duration) -> Result<(), CycleError> {
        use nix::errno::Errno;
        use nix::sys::time::TimeSpec;
        use nix::time::{clock_nanosleep, ClockId, ClockNanosleepFlags};

        let request = TimeSpec::from_duration(deadline);
        loop {
            match clock_nanosleep(
                ClockId::CLOCK_MONOTONIC,
                ClockNanosleepFlags::TIMER_ABSTIME,
                &request,
            ) {
                Ok(_) => return Ok(()),
                // Absolute deadline: restarting after a signal is exact.
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    return Err(CycleError::SchedulerFatal(format!("clock_nanosleep: {e}")))
                }
            }
        }
    }
}

/// `std::time::Instant` fallback for non-Linux hosts.
#[cfg(not(target_os = "linux"))]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: std::time::Instant,
}

#[cfg(not(target_os = "linux"))]
impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "linux"))]
impl Clock for MonotonicClock {
    fn now(&self) -> Result<Duration, CycleError> {
        Ok(self.origin.elapsed())
    }

    fn sleep_until(&self, deadline: Duration) -> Result<(), CycleError> {
        let now = self.now()?;
        if let Some(remaining) = deadline.checked_sub(now) {
            std::thread::sleep(remaining);
        }
        Ok(())
    }
}

// ─── Simulated Clock ────────────────────────────────────────────────

/// Virtual time for deterministic tests and offline simulation.
///
/// `sleep_until` jumps straight to the deadline (plus an optional wake
/// latency). Clones share the same time, so a process-I/O stub can call
/// [`advance`](Self::advance) to model execution time.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    now_ns: Arc<AtomicU64>,
    wake_latency_ns: Arc<AtomicU64>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock whose every wake-up lands `latency` after the deadline.
    pub fn with_wake_latency(latency: Duration) -> Self {
        let clock = Self::new();
        clock.set_wake_latency(latency);
        clock
    }

    pub fn set_wake_latency(&self, latency: Duration) {
        self.wake_latency_ns
            .store(latency.as_nanos() as u64, Ordering::Release);
    }

    /// Move time forward by `d`.
    pub fn advance(&self, d: Duration) {
        self.now_ns.fetch_add(d.as_nanos() as u64, Ordering::AcqRel);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::Acquire))
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Result<Duration, CycleError> {
        Ok(self.elapsed())
    }

    fn sleep_until(&self, deadline: Duration) -> Result<(), CycleError> {
        let deadline_ns = deadline.as_nanos() as u64;
        let latency = self.wake_latency_ns.load(Ordering::Acquire);
        let _ = self
            .now_ns
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |now| {
                Some(now.max(deadline_ns) + latency)
            });
        Ok(())
    }
}
