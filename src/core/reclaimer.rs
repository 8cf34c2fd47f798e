//! Standby memory reclaim loop.
//!
//! Periodically measures available physical memory and, when it drops below
//! the configured threshold, asks the platform to evict standby/cache pages.
//! Reclaim is best-effort: a failed measurement or reclaim is logged and
//! retried on the next tick, never fatal to the loop.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

use super::worker::{spawn_periodic, LoopHandle};
use crate::events::{EventBus, LogLevel};
use crate::platform::format_bytes;
use crate::platform::traits::{MemoryProbe, MemorySnapshot};

/// Periodic standby-memory reclaimer.
///
/// Lifecycle is `Stopped -> Running -> Stopped`; [`start`](Self::start) is a
/// no-op while running and [`stop`](Self::stop) returns only once no tick is
/// in flight.
pub struct MemoryReclaimer {
    threshold_bytes: u64,
    interval: Duration,
    probe: Arc<dyn MemoryProbe>,
    bus: EventBus,
    last: Arc<RwLock<MemorySnapshot>>,
    runner: tokio::sync::Mutex<Option<LoopHandle>>,
}

impl MemoryReclaimer {
    pub fn new(
        threshold_bytes: u64,
        interval: Duration,
        probe: Arc<dyn MemoryProbe>,
        bus: EventBus,
    ) -> Self {
        Self {
            threshold_bytes,
            interval,
            probe,
            bus,
            last: Arc::new(RwLock::new(MemorySnapshot::default())),
            runner: tokio::sync::Mutex::new(None),
        }
    }

    /// Start the reclaim loop. Idempotent: calling while running changes
    /// nothing.
    pub async fn start(&self) {
        let mut runner = self.runner.lock().await;
        if runner.is_some() {
            debug!("memory reclaimer already running");
            return;
        }

        let probe = Arc::clone(&self.probe);
        let bus = self.bus.clone();
        let last = Arc::clone(&self.last);
        let threshold = self.threshold_bytes;

        *runner = Some(spawn_periodic(self.interval, move || {
            Self::tick(&probe, &bus, threshold, &last);
        }));

        self.bus.emit(
            LogLevel::Info,
            format!(
                "Standby reclaimer started (threshold {}, every {}s)",
                format_bytes(self.threshold_bytes),
                self.interval.as_secs()
            ),
        );
    }

    /// Stop the loop, waiting for any in-flight tick to complete. A no-op
    /// when the loop was never started.
    pub async fn stop(&self) {
        let handle = self.runner.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
            self.bus.emit(LogLevel::Info, "Standby reclaimer stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.runner.lock().await.is_some()
    }

    /// One scheduled check: measure, and reclaim when below threshold.
    fn tick(
        probe: &Arc<dyn MemoryProbe>,
        bus: &EventBus,
        threshold_bytes: u64,
        last: &Arc<RwLock<MemorySnapshot>>,
    ) {
        match probe.snapshot() {
            Ok(snap) => {
                Self::store(last, snap);
                if snap.available_bytes < threshold_bytes {
                    debug!(
                        "available {} below threshold {}, reclaiming",
                        format_bytes(snap.available_bytes),
                        format_bytes(threshold_bytes)
                    );
                    Self::reclaim_once(probe, bus, last);
                }
            }
            Err(e) => bus.emit(LogLevel::Error, format!("Memory measurement failed: {}", e)),
        }
    }

    /// Manual, synchronous reclaim trigger. Usable whether or not the loop
    /// is running; returns bytes freed, `0` on failure (the failure itself
    /// is reported on the event bus, never raised).
    pub fn clean_standby_memory(&self) -> u64 {
        Self::reclaim_once(&self.probe, &self.bus, &self.last)
    }

    fn reclaim_once(
        probe: &Arc<dyn MemoryProbe>,
        bus: &EventBus,
        last: &Arc<RwLock<MemorySnapshot>>,
    ) -> u64 {
        match probe.reclaim_standby() {
            Ok(freed) => {
                // Refresh so queries observe the post-reclaim state.
                if let Ok(snap) = probe.snapshot() {
                    Self::store(last, snap);
                }
                bus.emit(
                    LogLevel::Success,
                    format!("Standby memory reclaimed: {} freed", format_bytes(freed)),
                );
                freed
            }
            Err(e) => {
                bus.emit(LogLevel::Error, format!("Standby reclaim failed: {}", e));
                0
            }
        }
    }

    /// Latest memory snapshot. Measures fresh when possible and never takes
    /// the reclaim path; falls back to the last known measurement if the
    /// probe fails.
    pub fn memory_info(&self) -> MemorySnapshot {
        match self.probe.snapshot() {
            Ok(snap) => {
                Self::store(&self.last, snap);
                snap
            }
            Err(_) => *self.last.read().unwrap_or_else(|e| e.into_inner()),
        }
    }

    fn store(last: &Arc<RwLock<MemorySnapshot>>, snap: MemorySnapshot) {
        *last.write().unwrap_or_else(|e| e.into_inner()) = snap;
    }
}
