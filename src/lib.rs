//! ramgov - Background resource governor
//!
//! Keeps a machine responsive by running small background control loops:
//!
//! - **Standby reclaim**: watches available memory and reclaims
//!   standby/cache pages when it falls below a threshold
//! - **Priority rules**: periodically re-applies configured CPU/IO
//!   scheduling classes to matching processes
//! - **CPU telemetry**: on-demand utilization and temperature sampling
//! - **Service toggle**: optionally disables the OS prefetch service
//!
//! All loops publish human-readable events on a broadcast [`EventBus`]
//! and degrade gracefully: a denied or failed operation is logged and
//! the loop keeps running.

pub mod core;
pub mod events;
pub mod platform;
pub mod telemetry;

// Re-exports
pub use core::config::{ConfigError, GovernorConfig, RuleConfig};
pub use core::enforcer::PriorityEnforcer;
pub use core::governor::Governor;
pub use core::reclaimer::MemoryReclaimer;
pub use core::rules::{ActiveRule, CpuPriority, IoPriority, RuleSet};
pub use core::services::ServiceToggle;
pub use events::{EventBus, LogEvent, LogLevel};
pub use platform::{
    create_platform, detect_elevated, format_bytes, CpuTelemetry, MemoryProbe, MemorySnapshot,
    PlatformError, PlatformHandles, PlatformResult, ProcessRecord, ProcessTable, ServiceControl,
    PREFETCH_SERVICE,
};
pub use telemetry::{SysinfoTelemetry, TelemetrySample, TelemetrySampler};
