//! Linux memory measurement and standby reclaim via the /proc filesystem.
//!
//! Measurement parses /proc/meminfo. Reclaim is the Linux analogue of
//! purging the standby list: sync dirty pages, drop the page cache,
//! dentries and inodes through /proc/sys/vm/drop_caches, then ask the
//! kernel to compact. Freed bytes are reported as the available-memory
//! delta across the operation.

use std::fs::OpenOptions;
use std::io::Write;
use tracing::{debug, warn};

use crate::platform::traits::{MemoryProbe, MemorySnapshot, PlatformError, PlatformResult};

const MEMINFO_PATH: &str = "/proc/meminfo";
const DROP_CACHES_PATH: &str = "/proc/sys/vm/drop_caches";
const COMPACT_MEMORY_PATH: &str = "/proc/sys/vm/compact_memory";

pub struct LinuxMemoryProbe {
    has_root: bool,
}

impl LinuxMemoryProbe {
    pub fn new() -> Self {
        let has_root = unsafe { libc::geteuid() == 0 };
        if !has_root {
            warn!("running without root - standby reclaim will be denied by the kernel");
        }
        Self { has_root }
    }

    pub fn has_root_privileges(&self) -> bool {
        self.has_root
    }
}

impl Default for LinuxMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for LinuxMemoryProbe {
    fn snapshot(&self) -> PlatformResult<MemorySnapshot> {
        let content = std::fs::read_to_string(MEMINFO_PATH)?;
        parse_meminfo(&content)
    }

    fn reclaim_standby(&self) -> PlatformResult<u64> {
        if !self.has_root {
            return Err(PlatformError::PermissionDenied(
                "drop_caches requires root/CAP_SYS_ADMIN".to_string(),
            ));
        }

        let before = self.snapshot()?;

        // Flush dirty pages first so dropping the cache loses nothing.
        unsafe {
            libc::sync();
        }

        let mut file = OpenOptions::new()
            .write(true)
            .open(DROP_CACHES_PATH)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    PlatformError::PermissionDenied(format!(
                        "cannot write to {}",
                        DROP_CACHES_PATH
                    ))
                } else {
                    PlatformError::Io(e.to_string())
                }
            })?;
        file.write_all(b"3")?;

        // Compaction is opportunistic; not all kernels expose the knob.
        if let Ok(mut file) = OpenOptions::new().write(true).open(COMPACT_MEMORY_PATH) {
            let _ = file.write_all(b"1");
        }

        let after = self.snapshot()?;
        let freed = after.available_bytes.saturating_sub(before.available_bytes);
        debug!(
            "dropped caches: available {} -> {}",
            before.available_bytes, after.available_bytes
        );
        Ok(freed)
    }
}

/// Parse the MemTotal/MemAvailable lines of a /proc/meminfo dump.
fn parse_meminfo(content: &str) -> PlatformResult<MemorySnapshot> {
    let mut total = 0u64;
    let mut available = 0u64;
    let mut free = 0u64;
    let mut buffers = 0u64;
    let mut cached = 0u64;

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "MemTotal" => total = parse_kb_value(value),
            "MemAvailable" => available = parse_kb_value(value),
            "MemFree" => free = parse_kb_value(value),
            "Buffers" => buffers = parse_kb_value(value),
            "Cached" => cached = parse_kb_value(value),
            _ => {}
        }
    }

    if total == 0 {
        return Err(PlatformError::Io(
            "MemTotal missing from /proc/meminfo".to_string(),
        ));
    }

    // Older kernels lack MemAvailable; estimate it.
    if available == 0 {
        available = free + buffers + cached;
    }

    Ok(MemorySnapshot::from_totals(total, available))
}

/// Parse a meminfo value like "16384256 kB" into bytes.
fn parse_kb_value(value: &str) -> u64 {
    value
        .trim()
        .split_whitespace()
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0)
        * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO_FIXTURE: &str = "\
MemTotal:       16316412 kB
MemFree:         1064320 kB
MemAvailable:    8215820 kB
Buffers:          514952 kB
Cached:          6004704 kB
SwapCached:            0 kB
Active:          6142196 kB
";

    #[test]
    fn test_parse_meminfo() {
        let snap = parse_meminfo(MEMINFO_FIXTURE).unwrap();
        assert_eq!(snap.total_bytes, 16316412 * 1024);
        assert_eq!(snap.available_bytes, 8215820 * 1024);
        assert!(snap.used_percentage > 0.0 && snap.used_percentage < 100.0);
    }

    #[test]
    fn test_parse_meminfo_estimates_available_on_old_kernels() {
        let old = "MemTotal: 1000 kB\nMemFree: 100 kB\nBuffers: 50 kB\nCached: 150 kB\n";
        let snap = parse_meminfo(old).unwrap();
        assert_eq!(snap.available_bytes, 300 * 1024);
    }

    #[test]
    fn test_parse_meminfo_rejects_garbage() {
        assert!(parse_meminfo("not meminfo at all").is_err());
    }

    #[test]
    fn test_parse_kb_value() {
        assert_eq!(parse_kb_value("  16384 kB"), 16384 * 1024);
        assert_eq!(parse_kb_value("0 kB"), 0);
        assert_eq!(parse_kb_value("garbage"), 0);
    }

    #[test]
    fn test_live_snapshot() {
        let probe = LinuxMemoryProbe::new();
        let snap = probe.snapshot().unwrap();
        assert!(snap.total_bytes > 0);
        assert!(snap.available_bytes <= snap.total_bytes);
    }
}
