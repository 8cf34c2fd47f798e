//! Platform layer: capability traits plus the per-OS implementations.
//!
//! ```text
//! src/platform/
//! +-- mod.rs           <- this file (facade, factory, utilities)
//! +-- traits.rs        <- capability trait definitions
//! +-- linux/           <- Linux implementations (cfg(target_os = "linux"))
//! |   +-- mod.rs
//! |   +-- memory.rs
//! |   +-- process.rs
//! |   +-- service.rs
//! +-- windows.rs       <- Windows implementations (cfg(windows))
//! ```

pub mod traits;

pub use traits::{
    CpuTelemetry, MemoryProbe, MemorySnapshot, PlatformError, PlatformResult, ProcessRecord,
    ProcessTable, ServiceControl,
};

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(windows)]
pub mod windows;

use std::sync::Arc;

/// The OS prefetch/caching service the governor can toggle.
#[cfg(windows)]
pub const PREFETCH_SERVICE: &str = "SysMain";
#[cfg(not(windows))]
pub const PREFETCH_SERVICE: &str = "preload";

/// Bundle of capability implementations handed to the governor.
pub struct PlatformHandles {
    pub memory: Arc<dyn MemoryProbe>,
    pub processes: Arc<dyn ProcessTable>,
    pub telemetry: Arc<dyn CpuTelemetry>,
    pub services: Arc<dyn ServiceControl>,
}

/// Build the capability set for the current platform.
#[cfg(target_os = "linux")]
pub fn create_platform() -> PlatformHandles {
    PlatformHandles {
        memory: Arc::new(linux::LinuxMemoryProbe::new()),
        processes: Arc::new(linux::LinuxProcessTable::new()),
        telemetry: Arc::new(crate::telemetry::SysinfoTelemetry::new()),
        services: Arc::new(linux::SystemdServiceControl::new()),
    }
}

/// Build the capability set for the current platform.
#[cfg(windows)]
pub fn create_platform() -> PlatformHandles {
    PlatformHandles {
        memory: Arc::new(windows::WindowsMemoryProbe::new()),
        processes: Arc::new(windows::WindowsProcessTable::new()),
        telemetry: Arc::new(crate::telemetry::SysinfoTelemetry::new()),
        services: Arc::new(windows::ScServiceControl::new()),
    }
}

/// Detect if the current process has elevated privileges.
pub fn detect_elevated() -> bool {
    #[cfg(target_os = "linux")]
    {
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(windows)]
    {
        use std::process::Command;
        Command::new("net")
            .args(["session"])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(not(any(target_os = "linux", windows)))]
    {
        false
    }
}

/// Format bytes into a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Test doubles
// ============================================================================

/// Mock capability implementations shared by the core's test suites.
#[cfg(test)]
pub(crate) mod mock {
    use super::traits::*;
    use crate::core::rules::{CpuPriority, IoPriority};
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct MockMemoryProbe {
        pub total: u64,
        pub available: AtomicU64,
        /// Bytes added to `available` per successful reclaim (also the
        /// reported freed amount).
        pub reclaim_gain: AtomicU64,
        pub snapshot_calls: AtomicUsize,
        pub reclaim_calls: AtomicUsize,
        pub fail_snapshot: AtomicBool,
        pub fail_reclaim: AtomicBool,
    }

    impl MockMemoryProbe {
        pub fn new(total: u64, available: u64) -> Self {
            Self {
                total,
                available: AtomicU64::new(available),
                reclaim_gain: AtomicU64::new(0),
                snapshot_calls: AtomicUsize::new(0),
                reclaim_calls: AtomicUsize::new(0),
                fail_snapshot: AtomicBool::new(false),
                fail_reclaim: AtomicBool::new(false),
            }
        }
    }

    impl MemoryProbe for MockMemoryProbe {
        fn snapshot(&self) -> PlatformResult<MemorySnapshot> {
            self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_snapshot.load(Ordering::SeqCst) {
                return Err(PlatformError::Io("simulated measurement failure".into()));
            }
            Ok(MemorySnapshot::from_totals(
                self.total,
                self.available.load(Ordering::SeqCst),
            ))
        }

        fn reclaim_standby(&self) -> PlatformResult<u64> {
            self.reclaim_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_reclaim.load(Ordering::SeqCst) {
                return Err(PlatformError::PermissionDenied(
                    "simulated reclaim failure".into(),
                ));
            }
            let gain = self.reclaim_gain.load(Ordering::SeqCst);
            self.available.fetch_add(gain, Ordering::SeqCst);
            Ok(gain)
        }
    }

    pub struct MockProcessTable {
        pub processes: Mutex<Vec<ProcessRecord>>,
        /// Every successful set_priority call, in order.
        pub applied: Mutex<Vec<(u32, CpuPriority, IoPriority)>>,
        pub denied_pids: Mutex<Vec<u32>>,
        pub set_calls: AtomicUsize,
    }

    impl MockProcessTable {
        pub fn with_processes(entries: &[(u32, &str)]) -> Self {
            let processes = entries
                .iter()
                .map(|(pid, name)| ProcessRecord {
                    pid: *pid,
                    name: name.to_string(),
                    cpu_priority: Some(CpuPriority::Normal),
                    io_priority: Some(IoPriority::Normal),
                })
                .collect();
            Self {
                processes: Mutex::new(processes),
                applied: Mutex::new(Vec::new()),
                denied_pids: Mutex::new(Vec::new()),
                set_calls: AtomicUsize::new(0),
            }
        }

        pub fn deny(&self, pid: u32) {
            self.denied_pids.lock().unwrap().push(pid);
        }

        pub fn set_current(&self, pid: u32, cpu: CpuPriority, io: IoPriority) {
            let mut processes = self.processes.lock().unwrap();
            if let Some(p) = processes.iter_mut().find(|p| p.pid == pid) {
                p.cpu_priority = Some(cpu);
                p.io_priority = Some(io);
            }
        }
    }

    impl ProcessTable for MockProcessTable {
        fn enumerate(&self) -> PlatformResult<Vec<ProcessRecord>> {
            Ok(self.processes.lock().unwrap().clone())
        }

        fn set_priority(&self, pid: u32, cpu: CpuPriority, io: IoPriority) -> PlatformResult<()> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            if self.denied_pids.lock().unwrap().contains(&pid) {
                return Err(PlatformError::PermissionDenied("simulated denial".into()));
            }
            let mut processes = self.processes.lock().unwrap();
            let Some(process) = processes.iter_mut().find(|p| p.pid == pid) else {
                return Err(PlatformError::NotFound(format!("pid {}", pid)));
            };
            process.cpu_priority = Some(cpu);
            process.io_priority = Some(io);
            self.applied.lock().unwrap().push((pid, cpu, io));
            Ok(())
        }
    }

    pub struct MockTelemetry {
        pub usage: f32,
        pub temperature: Option<f64>,
        pub fail: AtomicBool,
    }

    impl MockTelemetry {
        pub fn with_usage(usage: f32) -> Self {
            Self {
                usage,
                temperature: None,
                fail: AtomicBool::new(false),
            }
        }

        pub fn with_temperature(usage: f32, celsius: f64) -> Self {
            Self {
                usage,
                temperature: Some(celsius),
                fail: AtomicBool::new(false),
            }
        }
    }

    impl CpuTelemetry for MockTelemetry {
        fn cpu_usage(&self) -> PlatformResult<f32> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PlatformError::Io("simulated read failure".into()));
            }
            Ok(self.usage)
        }

        fn cpu_temperature(&self) -> Option<f64> {
            self.temperature
        }
    }

    #[derive(Default)]
    pub struct MockServiceControl {
        pub disabled: Mutex<Vec<String>>,
        pub fail: AtomicBool,
        pub missing: AtomicBool,
    }

    impl ServiceControl for MockServiceControl {
        fn set_disabled(&self, name: &str) -> PlatformResult<()> {
            if self.missing.load(Ordering::SeqCst) {
                return Err(PlatformError::NotFound(name.to_string()));
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(PlatformError::PermissionDenied("simulated denial".into()));
            }
            self.disabled.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_bytes(1024u64 * 1024 * 1024 * 1024), "1.00 TB");
    }
}
