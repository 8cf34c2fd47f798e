//! Linux process enumeration and scheduling-class application.
//!
//! Enumeration walks the numeric directories of /proc, taking the
//! executable name from `comm` and the nice value from `stat`. CPU
//! classes map onto nice values, IO classes onto ioprio_set
//! class/level pairs (best-effort BE levels; VeryLow maps to the IDLE
//! class).

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::core::rules::{CpuPriority, IoPriority};
use crate::platform::traits::{PlatformError, PlatformResult, ProcessRecord, ProcessTable};

const IOPRIO_CLASS_SHIFT: i32 = 13;
const IOPRIO_CLASS_RT: i32 = 1;
const IOPRIO_CLASS_BE: i32 = 2;
const IOPRIO_CLASS_IDLE: i32 = 3;
const IOPRIO_WHO_PROCESS: i32 = 1;

pub struct LinuxProcessTable;

impl LinuxProcessTable {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinuxProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for LinuxProcessTable {
    fn enumerate(&self) -> PlatformResult<Vec<ProcessRecord>> {
        let mut records = Vec::new();

        for entry in fs::read_dir("/proc")? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(pid) = file_name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };

            // Processes can exit between read_dir and the reads below;
            // just skip them.
            let Some(record) = read_process(&entry.path(), pid) else {
                continue;
            };
            records.push(record);
        }

        Ok(records)
    }

    fn set_priority(&self, pid: u32, cpu: CpuPriority, io: IoPriority) -> PlatformResult<()> {
        let nice = nice_for(cpu);
        // glibc types the `which` argument as __priority_which_t, musl as
        // c_int; the cast covers both.
        let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS as _, pid as libc::id_t, nice) };
        if rc != 0 {
            return Err(errno_to_error(pid));
        }

        let value = ioprio_value_for(io);
        let rc = unsafe {
            libc::syscall(
                libc::SYS_ioprio_set,
                IOPRIO_WHO_PROCESS,
                pid as libc::c_int,
                value,
            )
        };
        if rc < 0 {
            return Err(errno_to_error(pid));
        }

        debug!("pid {} set to nice {} / ioprio {:#x}", pid, nice, value);
        Ok(())
    }
}

fn read_process(proc_dir: &Path, pid: u32) -> Option<ProcessRecord> {
    let name = fs::read_to_string(proc_dir.join("comm"))
        .ok()?
        .trim()
        .to_string();
    if name.is_empty() {
        return None;
    }

    let stat = fs::read_to_string(proc_dir.join("stat")).ok()?;
    let cpu_priority = parse_stat_nice(&stat).map(cpu_class_from_nice);

    let io_priority = {
        let rc = unsafe {
            libc::syscall(libc::SYS_ioprio_get, IOPRIO_WHO_PROCESS, pid as libc::c_int)
        };
        if rc < 0 {
            None
        } else {
            io_class_from_value(rc as i32)
        }
    };

    Some(ProcessRecord {
        pid,
        name,
        cpu_priority,
        io_priority,
    })
}

/// Extract the nice value (field 19) from a /proc/[pid]/stat line.
///
/// The comm field may contain spaces and parentheses, so fields are
/// counted from the last `)`.
fn parse_stat_nice(stat: &str) -> Option<i64> {
    let (_, rest) = stat.rsplit_once(')')?;
    // rest starts at field 3 (state); nice is field 19.
    rest.split_whitespace().nth(16)?.parse().ok()
}

fn nice_for(cpu: CpuPriority) -> i32 {
    match cpu {
        CpuPriority::Idle => 19,
        CpuPriority::BelowNormal => 10,
        CpuPriority::Normal => 0,
        CpuPriority::AboveNormal => -5,
        CpuPriority::High => -10,
        CpuPriority::Realtime => -20,
    }
}

/// Bucket an observed nice value into the class whose target it is
/// closest to, so a process set by us reads back as the class we set.
fn cpu_class_from_nice(nice: i64) -> CpuPriority {
    match nice {
        15..=19 => CpuPriority::Idle,
        5..=14 => CpuPriority::BelowNormal,
        -4..=4 => CpuPriority::Normal,
        -9..=-5 => CpuPriority::AboveNormal,
        -19..=-10 => CpuPriority::High,
        _ => CpuPriority::Realtime,
    }
}

fn ioprio_value(class: i32, data: i32) -> i32 {
    (class << IOPRIO_CLASS_SHIFT) | data
}

fn ioprio_value_for(io: IoPriority) -> i32 {
    match io {
        IoPriority::VeryLow => ioprio_value(IOPRIO_CLASS_IDLE, 0),
        IoPriority::Low => ioprio_value(IOPRIO_CLASS_BE, 7),
        IoPriority::Normal => ioprio_value(IOPRIO_CLASS_BE, 4),
        IoPriority::High => ioprio_value(IOPRIO_CLASS_BE, 0),
    }
}

fn io_class_from_value(value: i32) -> Option<IoPriority> {
    let class = value >> IOPRIO_CLASS_SHIFT;
    let level = value & ((1 << IOPRIO_CLASS_SHIFT) - 1);
    match class {
        IOPRIO_CLASS_IDLE => Some(IoPriority::VeryLow),
        IOPRIO_CLASS_RT => Some(IoPriority::High),
        IOPRIO_CLASS_BE => Some(match level {
            0..=1 => IoPriority::High,
            2..=5 => IoPriority::Normal,
            _ => IoPriority::Low,
        }),
        // CLASS_NONE: effective priority follows the nice value, which
        // lands in the BE middle band.
        0 => Some(IoPriority::Normal),
        _ => None,
    }
}

fn errno_to_error(pid: u32) -> PlatformError {
    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EPERM) | Some(libc::EACCES) => {
            PlatformError::PermissionDenied(format!("pid {}: {}", pid, err))
        }
        Some(libc::ESRCH) => PlatformError::NotFound(format!("pid {}", pid)),
        Some(code) => PlatformError::System {
            code,
            message: err.to_string(),
        },
        None => PlatformError::Io(err.to_string()),
    }
}
