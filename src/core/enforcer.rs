//! Process priority enforcement loop.
//!
//! On a fixed interval the enforcer sweeps the live process table and
//! applies the configured CPU/IO scheduling classes to every process whose
//! normalized name has a rule. Rules may be added or removed at any time
//! while the loop runs; a sweep already in progress may see either version
//! of a changed rule, but never a torn one.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::rules::{ActiveRule, RuleSet};
use super::worker::{spawn_periodic, LoopHandle};
use crate::events::{EventBus, LogLevel};
use crate::platform::traits::{PlatformError, ProcessTable};

/// Periodic per-process priority enforcer.
///
/// Same lifecycle contract as the reclaimer: idempotent `start`, quiescing
/// `stop`. Owns the active rule set.
pub struct PriorityEnforcer {
    interval: Duration,
    table: Arc<dyn ProcessTable>,
    bus: EventBus,
    rules: RuleSet,
    runner: tokio::sync::Mutex<Option<LoopHandle>>,
}

impl PriorityEnforcer {
    pub fn new(interval: Duration, table: Arc<dyn ProcessTable>, bus: EventBus) -> Self {
        Self {
            interval,
            table,
            bus,
            rules: RuleSet::new(),
            runner: tokio::sync::Mutex::new(None),
        }
    }

    /// Start the sweep loop. Idempotent.
    pub async fn start(&self) {
        let mut runner = self.runner.lock().await;
        if runner.is_some() {
            debug!("priority enforcer already running");
            return;
        }

        let table = Arc::clone(&self.table);
        let bus = self.bus.clone();
        let rules = self.rules.clone();

        *runner = Some(spawn_periodic(self.interval, move || {
            Self::sweep(&table, &bus, &rules);
        }));

        self.bus.emit(
            LogLevel::Info,
            format!(
                "Priority enforcer started (sweep every {}s)",
                self.interval.as_secs()
            ),
        );
    }

    /// Stop the loop, waiting for an in-flight sweep to complete. A no-op
    /// when never started.
    pub async fn stop(&self) {
        let handle = self.runner.lock().await.take();
        if let Some(handle) = handle {
            handle.stop().await;
            self.bus.emit(LogLevel::Info, "Priority enforcer stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.runner.lock().await.is_some()
    }

    /// Insert or overwrite a rule. Safe to call while a sweep is running;
    /// the last registration for a given process name wins.
    pub fn add_rule(&self, rule: ActiveRule) {
        self.bus.emit(
            LogLevel::Info,
            format!(
                "Rule registered: {} -> CPU {} / IO {}",
                rule.process_name, rule.cpu, rule.io
            ),
        );
        self.rules.insert(rule);
    }

    /// Remove the rule for a process name, if present.
    pub fn remove_rule(&self, process_name: &str) {
        if self.rules.remove(process_name).is_some() {
            self.bus
                .emit(LogLevel::Info, format!("Rule removed: {}", process_name));
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// One full pass over the process table. Per-process failures are
    /// logged and never abort the sweep.
    fn sweep(table: &Arc<dyn ProcessTable>, bus: &EventBus, rules: &RuleSet) {
        if rules.is_empty() {
            return;
        }

        let processes = match table.enumerate() {
            Ok(processes) => processes,
            Err(e) => {
                bus.emit(
                    LogLevel::Error,
                    format!("Process enumeration failed: {}", e),
                );
                return;
            }
        };

        for process in processes {
            let Some(rule) = rules.matching(&process.name) else {
                continue;
            };

            // Skip processes already at the target classes.
            if process.cpu_priority == Some(rule.cpu) && process.io_priority == Some(rule.io) {
                continue;
            }

            match table.set_priority(process.pid, rule.cpu, rule.io) {
                Ok(()) => bus.emit(
                    LogLevel::Success,
                    format!(
                        "Applied CPU {} / IO {} to {} (pid {})",
                        rule.cpu, rule.io, process.name, process.pid
                    ),
                ),
                Err(PlatformError::PermissionDenied(msg)) => bus.emit(
                    LogLevel::Warning,
                    format!(
                        "No permission to reprioritize {} (pid {}): {}",
                        process.name, process.pid, msg
                    ),
                ),
                // The process exited between enumeration and application.
                Err(PlatformError::NotFound(_)) => {
                    debug!("{} (pid {}) exited mid-sweep", process.name, process.pid)
                }
                Err(e) => bus.emit(
                    LogLevel::Error,
                    format!(
                        "Failed to reprioritize {} (pid {}): {}",
                        process.name, process.pid, e
                    ),
                ),
            }
        }
    }
}
