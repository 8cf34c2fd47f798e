//! Composition root for the governor workers.
//!
//! The [`Governor`] is the only place configuration is interpreted into
//! worker actions: it wires each worker to its config slice at
//! construction, starts the loops, registers the configured rules, and
//! optionally toggles the OS prefetch service. Startup is best-effort — a
//! failing piece is logged and the rest still starts.

use std::sync::Arc;

use super::config::{ConfigError, GovernorConfig};
use super::enforcer::PriorityEnforcer;
use super::reclaimer::MemoryReclaimer;
use super::rules::ActiveRule;
use super::services::ServiceToggle;
use crate::events::{EventBus, LogLevel};
use crate::platform::traits::MemorySnapshot;
use crate::platform::{PlatformHandles, PREFETCH_SERVICE};
use crate::telemetry::TelemetrySampler;

pub struct Governor {
    config: GovernorConfig,
    bus: EventBus,
    reclaimer: Arc<MemoryReclaimer>,
    enforcer: Arc<PriorityEnforcer>,
    sampler: TelemetrySampler,
    services: ServiceToggle,
}

impl Governor {
    /// Construct all workers bound to the given configuration snapshot.
    ///
    /// The only fatal failure here is an invalid configuration value;
    /// everything at runtime is per-tick contained.
    pub fn initialize(
        config: GovernorConfig,
        platform: PlatformHandles,
        bus: EventBus,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let reclaimer = Arc::new(MemoryReclaimer::new(
            config.memory_threshold_bytes,
            config.memory_check_interval(),
            platform.memory,
            bus.clone(),
        ));
        let enforcer = Arc::new(PriorityEnforcer::new(
            config.sweep_interval(),
            platform.processes,
            bus.clone(),
        ));
        let sampler = TelemetrySampler::new(platform.telemetry);
        let services = ServiceToggle::new(platform.services, bus.clone());

        Ok(Self {
            config,
            bus,
            reclaimer,
            enforcer,
            sampler,
            services,
        })
    }

    /// Start every worker enabled by configuration, register the enabled
    /// rules, then apply the service toggle. Best-effort: an unparsable
    /// rule or a failed toggle is logged and the rest proceeds.
    pub async fn start_all(&self) {
        if self.config.memory_reclaim_enabled {
            self.reclaimer.start().await;
        }

        self.enforcer.start().await;
        for rule in self.config.rules.iter().filter(|r| r.enabled) {
            match ActiveRule::from_config(rule) {
                Ok(active) => self.enforcer.add_rule(active),
                Err(e) => self.bus.emit(
                    LogLevel::Error,
                    format!("Rejected rule for {}: {}", rule.process_name, e),
                ),
            }
        }

        if self.config.prefetch_service_disabled {
            self.services.disable_service(PREFETCH_SERVICE);
        }

        self.bus
            .emit(LogLevel::Success, "All governor workers started");
    }

    /// Stop every running worker. Workers that were never started are a
    /// no-op, not an error.
    pub async fn stop_all(&self) {
        self.reclaimer.stop().await;
        self.enforcer.stop().await;
        self.bus.emit(LogLevel::Info, "Governor stopped");
    }

    /// One manual reclaim pass; returns bytes freed (0 on failure).
    pub fn clean_now(&self) -> u64 {
        self.reclaimer.clean_standby_memory()
    }

    /// Latest memory snapshot, for display.
    pub fn memory_info(&self) -> MemorySnapshot {
        self.reclaimer.memory_info()
    }

    pub fn telemetry(&self) -> &TelemetrySampler {
        &self.sampler
    }

    /// The enforcer, for runtime rule addition/removal.
    pub fn enforcer(&self) -> &PriorityEnforcer {
        &self.enforcer
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }
}
