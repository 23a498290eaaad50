//! Diagnostics sinks for the per-cycle record stream.
//!
//! The scheduler is the only producer. Sinks run inside the cycle, so they
//! must not block: [`ChannelSink`] drops records when its consumer falls
//! behind instead of stalling the loop.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use tracing::{info, warn};

use crate::cycle::{CycleRecord, CycleStats};

/// Consumer of cycle records.
pub trait DiagnosticsSink {
    /// Called once per executed cycle. `stats` already include `record`.
    fn record(&mut self, record: &CycleRecord, stats: &CycleStats);

    /// Called once when the scheduler stops.
    fn finish(&mut self, _stats: &CycleStats) {}
}

impl DiagnosticsSink for Vec<CycleRecord> {
    fn record(&mut self, record: &CycleRecord, _stats: &CycleStats) {
        self.push(record.clone());
    }
}

impl<S: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut S {
    fn record(&mut self, record: &CycleRecord, stats: &CycleStats) {
        (**self).record(record, stats);
    }

    fn finish(&mut self, stats: &CycleStats) {
        (**self).finish(stats);
    }
}

impl<A: DiagnosticsSink, B: DiagnosticsSink> DiagnosticsSink for (A, B) {
    fn record(&mut self, record: &CycleRecord, stats: &CycleStats) {
        self.0.record(record, stats);
        self.1.record(record, stats);
    }

    fn finish(&mut self, stats: &CycleStats) {
        self.0.finish(stats);
        self.1.finish(stats);
    }
}

// ─── Log Sink ───────────────────────────────────────────────────────

/// Writes one `tracing` line per cycle plus periodic statistics.
///
/// The per-cycle message `cycle complete: actual <N.N> ms` is parsed by the
/// stability analysis tool; keep its shape.
#[derive(Debug, Clone)]
pub struct LogSink {
    stats_interval: u64,
}

impl LogSink {
    pub fn new(stats_interval: u64) -> Self {
        Self {
            stats_interval: stats_interval.max(1),
        }
    }

    /// True when the periodic statistics line is due after `stats`.
    fn stats_due(&self, stats: &CycleStats) -> bool {
        stats.cycle_count > 0 && stats.cycle_count % self.stats_interval == 0
    }
}

impl DiagnosticsSink for LogSink {
    fn record(&mut self, record: &CycleRecord, stats: &CycleStats) {
        let actual_ms = record.actual_ms();
        info!(seq = record.seq, "cycle complete: actual {actual_ms:.1} ms");

        if stats.is_timeout(record.actual) {
            warn!(
                seq = record.seq,
                actual_ms,
                timeout_ms = stats.timeout_ns as f64 / 1.0e6,
                "cycle exceeded timeout threshold"
            );
        }
        if self.stats_due(stats) {
            log_stats("cycle statistics", stats);
        }
    }

    fn finish(&mut self, stats: &CycleStats) {
        log_stats("cycle summary", stats);
    }
}

fn log_stats(label: &str, stats: &CycleStats) {
    info!(
        cycles = stats.cycle_count,
        avg_ms = format_args!("{:.3}", stats.avg_actual_ms()),
        stddev_ms = format_args!("{:.3}", stats.stddev_actual_ms()),
        min_ms = format_args!("{:.3}", stats.min_actual_ms()),
        max_ms = format_args!("{:.3}", stats.max_actual_ms()),
        within_tolerance_pct = format_args!("{:.1}", stats.within_tolerance_percent()),
        overruns = stats.overruns,
        skipped = stats.skipped_ticks,
        timeouts = stats.timeouts,
        max_latency_us = stats.max_latency_ns / 1000,
        "{label}"
    );
}

// ─── Channel Sink ───────────────────────────────────────────────────

/// Event delivered to a [`ChannelSink`] consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    Record(CycleRecord),
    Finished(CycleStats),
}

/// Bounded hand-off to a consumer thread.
#[derive(Debug)]
pub struct ChannelSink {
    tx: SyncSender<DiagnosticEvent>,
    dropped: u64,
}

impl ChannelSink {
    /// Sink plus the receiving end, buffering up to `capacity` records.
    pub fn new(capacity: usize) -> (Self, Receiver<DiagnosticEvent>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (Self { tx, dropped: 0 }, rx)
    }

    /// Records dropped because the consumer was behind or gone.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl DiagnosticsSink for ChannelSink {
    fn record(&mut self, record: &CycleRecord, _stats: &CycleStats) {
        match self.tx.try_send(DiagnosticEvent::Record(record.clone())) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => self.dropped += 1,
        }
    }

    fn finish(&mut self, stats: &CycleStats) {
        if self.dropped > 0 {
            warn!(dropped = self.dropped, "diagnostic records dropped");
        }
        // Off the cycle path: waiting for the consumer is fine here.
        let _ = self.tx.send(DiagnosticEvent::Finished(stats.clone()));
    }
}
