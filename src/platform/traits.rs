//! Platform capability traits consumed by the governor core.
//!
//! Each concern the core needs from the operating system — memory
//! measurement and standby reclaim, process enumeration and scheduling
//! classes, CPU telemetry, service control — is a separate trait so the
//! control loops can be exercised against mocks and each platform can
//! implement only what it supports.
//!
//! ```text
//! +--------------------+
//! |  Capability traits |  <- this module (interfaces + shared types)
//! +--------------------+
//!          |
//!    +-----+-----+
//!    |           |
//! +--v--+     +--v--+
//! | Lin |     | Win |  <- cfg(target_os) implementations
//! +-----+     +-----+
//! ```

use std::fmt;

use crate::core::rules::{CpuPriority, IoPriority};

// ============================================================================
// Error Types
// ============================================================================

/// Platform-agnostic error type for all capability operations.
#[derive(Debug, Clone)]
pub enum PlatformError {
    /// Permission denied (requires elevated privileges)
    PermissionDenied(String),
    /// Resource not found (process, service, sensor)
    NotFound(String),
    /// Operation not supported on this platform
    NotSupported(String),
    /// I/O error occurred
    Io(String),
    /// System call failed
    System { code: i32, message: String },
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            PlatformError::NotFound(msg) => write!(f, "Not found: {}", msg),
            PlatformError::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            PlatformError::Io(msg) => write!(f, "I/O error: {}", msg),
            PlatformError::System { code, message } => {
                write!(f, "System error ({}): {}", code, message)
            }
        }
    }
}

impl std::error::Error for PlatformError {}

impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => PlatformError::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                PlatformError::PermissionDenied(err.to_string())
            }
            _ => PlatformError::Io(err.to_string()),
        }
    }
}

/// Result type alias for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

// ============================================================================
// Memory Types
// ============================================================================

/// Point-in-time system memory measurement.
///
/// Produced fresh on every reclaimer tick and on-demand query; consumers
/// always receive a copy, never a live accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemorySnapshot {
    /// Total physical memory in bytes
    pub total_bytes: u64,
    /// Available physical memory in bytes (including reclaimable)
    pub available_bytes: u64,
    /// Used memory as a percentage of total (0-100)
    pub used_percentage: f32,
}

impl MemorySnapshot {
    /// Build a snapshot from totals, deriving the usage percentage.
    pub fn from_totals(total_bytes: u64, available_bytes: u64) -> Self {
        let used_percentage = if total_bytes == 0 {
            0.0
        } else {
            let used = total_bytes.saturating_sub(available_bytes);
            (used as f64 / total_bytes as f64 * 100.0) as f32
        };
        Self {
            total_bytes,
            available_bytes,
            used_percentage,
        }
    }

    /// Total physical memory in megabytes.
    pub fn total_mb(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Available physical memory in megabytes.
    pub fn available_mb(&self) -> f64 {
        self.available_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Used physical memory in bytes.
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }
}

// ============================================================================
// Process Types
// ============================================================================

/// One entry from a process enumeration.
///
/// The current scheduling classes are reported when readable so the
/// enforcer can skip processes already at their target; `None` means the
/// class could not be determined (the enforcer then applies unconditionally).
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    /// Process ID
    pub pid: u32,
    /// Executable name as reported by the OS (e.g. `notepad.exe`, `firefox`)
    pub name: String,
    /// Current CPU scheduling class, if readable
    pub cpu_priority: Option<CpuPriority>,
    /// Current IO scheduling class, if readable
    pub io_priority: Option<IoPriority>,
}

// ============================================================================
// Capability Traits
// ============================================================================

/// System memory measurement and standby/cache reclamation.
pub trait MemoryProbe: Send + Sync {
    /// Measure current system memory. Cheap; never takes the reclaim path.
    fn snapshot(&self) -> PlatformResult<MemorySnapshot>;

    /// Reclaim standby/cache pages system-wide.
    ///
    /// Returns the number of bytes that became available (may be
    /// approximate; computed from before/after measurements on platforms
    /// that do not report it directly).
    fn reclaim_standby(&self) -> PlatformResult<u64>;
}

/// Live process table access and scheduling-class application.
pub trait ProcessTable: Send + Sync {
    /// Enumerate all currently running processes.
    fn enumerate(&self) -> PlatformResult<Vec<ProcessRecord>>;

    /// Apply CPU and IO scheduling classes to a process.
    fn set_priority(&self, pid: u32, cpu: CpuPriority, io: IoPriority) -> PlatformResult<()>;
}

/// Instantaneous CPU telemetry.
pub trait CpuTelemetry: Send + Sync {
    /// CPU utilization percentage. Implementations may return a short-window
    /// average; callers clamp to [0, 100].
    fn cpu_usage(&self) -> PlatformResult<f32>;

    /// CPU package temperature in Celsius.
    ///
    /// `None` when no thermal sensor is accessible — a normal condition on
    /// virtualized or sensorless hardware, never an error.
    fn cpu_temperature(&self) -> Option<f64>;
}

/// OS background service control.
pub trait ServiceControl: Send + Sync {
    /// Disable the named service, stopping it if running.
    ///
    /// Must be idempotent: disabling an already-disabled service succeeds.
    fn set_disabled(&self, name: &str) -> PlatformResult<()>;
}
