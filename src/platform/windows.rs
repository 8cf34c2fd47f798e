//! Windows implementations of the platform capability traits.
//!
//! Memory measurement uses GlobalMemoryStatusEx. Standby reclaim purges
//! the standby page list through NtSetSystemInformation, which requires
//! SeProfileSingleProcessPrivilege (held by administrators). Process
//! enumeration walks a Toolhelp snapshot; scheduling classes go through
//! SetPriorityClass and the documented-but-unofficial ProcessIoPriority
//! information class. Service control shells out to sc.exe.

#![cfg(windows)]

use std::mem;
use std::process::Command;
use std::ptr;

use tracing::{debug, warn};

use crate::core::rules::{CpuPriority, IoPriority};
use crate::platform::traits::{
    MemoryProbe, MemorySnapshot, PlatformError, PlatformResult, ProcessRecord, ProcessTable,
    ServiceControl,
};

use winapi::shared::minwindef::{DWORD, FALSE};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::processthreadsapi::{
    GetCurrentProcess, GetPriorityClass, OpenProcess, OpenProcessToken, SetPriorityClass,
};
use winapi::um::securitybaseapi::AdjustTokenPrivileges;
use winapi::um::sysinfoapi::{GlobalMemoryStatusEx, MEMORYSTATUSEX};
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use winapi::um::winbase::{
    LookupPrivilegeValueW, ABOVE_NORMAL_PRIORITY_CLASS, BELOW_NORMAL_PRIORITY_CLASS,
    HIGH_PRIORITY_CLASS, IDLE_PRIORITY_CLASS, NORMAL_PRIORITY_CLASS, REALTIME_PRIORITY_CLASS,
};
use winapi::um::winnt::{
    HANDLE, LUID, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SET_INFORMATION,
    SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};

// NtSetSystemInformation / Nt*InformationProcess are exported by ntdll
// but not wrapped by winapi.
#[link(name = "ntdll")]
extern "system" {
    fn NtSetSystemInformation(
        system_information_class: u32,
        system_information: *mut std::ffi::c_void,
        system_information_length: u32,
    ) -> i32;

    fn NtSetInformationProcess(
        process_handle: HANDLE,
        process_information_class: u32,
        process_information: *mut std::ffi::c_void,
        process_information_length: u32,
    ) -> i32;

    fn NtQueryInformationProcess(
        process_handle: HANDLE,
        process_information_class: u32,
        process_information: *mut std::ffi::c_void,
        process_information_length: u32,
        return_length: *mut u32,
    ) -> i32;
}

const SYSTEM_MEMORY_LIST_INFORMATION: u32 = 80;
const MEMORY_PURGE_STANDBY_LIST: u32 = 4;
const PROCESS_INFORMATION_IO_PRIORITY: u32 = 33;

const STATUS_PRIVILEGE_NOT_HELD: i32 = 0xC0000061u32 as i32;
const STATUS_ACCESS_DENIED: i32 = 0xC0000022u32 as i32;

const ERROR_ACCESS_DENIED: DWORD = 5;
const ERROR_INVALID_PARAMETER: DWORD = 87;

// ============================================================================
// Memory
// ============================================================================

pub struct WindowsMemoryProbe {
    has_purge_privilege: bool,
}

impl WindowsMemoryProbe {
    pub fn new() -> Self {
        let has_purge_privilege = enable_privilege("SeProfileSingleProcessPrivilege");
        if !has_purge_privilege {
            warn!("running without admin - standby purge will be denied");
        }
        Self { has_purge_privilege }
    }
}

impl Default for WindowsMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for WindowsMemoryProbe {
    fn snapshot(&self) -> PlatformResult<MemorySnapshot> {
        unsafe {
            let mut status: MEMORYSTATUSEX = mem::zeroed();
            status.dwLength = mem::size_of::<MEMORYSTATUSEX>() as DWORD;
            if GlobalMemoryStatusEx(&mut status) == FALSE {
                return Err(last_error_to_platform("GlobalMemoryStatusEx"));
            }
            Ok(MemorySnapshot::from_totals(
                status.ullTotalPhys,
                status.ullAvailPhys,
            ))
        }
    }

    fn reclaim_standby(&self) -> PlatformResult<u64> {
        if !self.has_purge_privilege {
            return Err(PlatformError::PermissionDenied(
                "standby purge requires SeProfileSingleProcessPrivilege".to_string(),
            ));
        }

        let before = self.snapshot()?;

        let mut command = MEMORY_PURGE_STANDBY_LIST;
        let status = unsafe {
            NtSetSystemInformation(
                SYSTEM_MEMORY_LIST_INFORMATION,
                &mut command as *mut u32 as *mut _,
                mem::size_of::<u32>() as u32,
            )
        };
        if status != 0 {
            return Err(ntstatus_to_platform(status, "NtSetSystemInformation"));
        }

        let after = self.snapshot()?;
        let freed = after.available_bytes.saturating_sub(before.available_bytes);
        debug!(
            "purged standby list: available {} -> {}",
            before.available_bytes, after.available_bytes
        );
        Ok(freed)
    }
}

/// Enable a named privilege on the current process token.
fn enable_privilege(name: &str) -> bool {
    let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
    unsafe {
        let mut token: HANDLE = ptr::null_mut();
        if OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut token,
        ) == FALSE
        {
            return false;
        }

        let mut luid: LUID = mem::zeroed();
        if LookupPrivilegeValueW(ptr::null(), wide.as_ptr(), &mut luid) == FALSE {
            CloseHandle(token);
            return false;
        }

        let mut privileges: TOKEN_PRIVILEGES = mem::zeroed();
        privileges.PrivilegeCount = 1;
        privileges.Privileges[0].Luid = luid;
        privileges.Privileges[0].Attributes = SE_PRIVILEGE_ENABLED;

        let adjusted = AdjustTokenPrivileges(
            token,
            FALSE,
            &mut privileges,
            0,
            ptr::null_mut(),
            ptr::null_mut(),
        );
        // AdjustTokenPrivileges succeeds even when nothing was assigned;
        // ERROR_NOT_ALL_ASSIGNED shows up in GetLastError.
        let granted = adjusted != FALSE && GetLastError() == 0;
        CloseHandle(token);
        granted
    }
}

// ============================================================================
// Processes
// ============================================================================

pub struct WindowsProcessTable;

impl WindowsProcessTable {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for WindowsProcessTable {
    fn enumerate(&self) -> PlatformResult<Vec<ProcessRecord>> {
        let mut records = Vec::new();

        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0);
            if snapshot == INVALID_HANDLE_VALUE {
                return Err(last_error_to_platform("CreateToolhelp32Snapshot"));
            }

            let mut entry: PROCESSENTRY32W = mem::zeroed();
            entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as DWORD;

            if Process32FirstW(snapshot, &mut entry) != FALSE {
                loop {
                    let name = utf16_until_nul(&entry.szExeFile);
                    if !name.is_empty() && entry.th32ProcessID != 0 {
                        let (cpu, io) = read_current_classes(entry.th32ProcessID);
                        records.push(ProcessRecord {
                            pid: entry.th32ProcessID,
                            name,
                            cpu_priority: cpu,
                            io_priority: io,
                        });
                    }
                    if Process32NextW(snapshot, &mut entry) == FALSE {
                        break;
                    }
                }
            }
            CloseHandle(snapshot);
        }

        Ok(records)
    }

    fn set_priority(&self, pid: u32, cpu: CpuPriority, io: IoPriority) -> PlatformResult<()> {
        unsafe {
            let handle = OpenProcess(
                PROCESS_SET_INFORMATION | PROCESS_QUERY_LIMITED_INFORMATION,
                FALSE,
                pid,
            );
            if handle.is_null() {
                return Err(open_error_to_platform(pid));
            }

            let result = (|| {
                if SetPriorityClass(handle, priority_class_for(cpu)) == FALSE {
                    return Err(last_error_to_platform("SetPriorityClass"));
                }

                let mut io_value = io_level_for(io);
                let status = NtSetInformationProcess(
                    handle,
                    PROCESS_INFORMATION_IO_PRIORITY,
                    &mut io_value as *mut u32 as *mut _,
                    mem::size_of::<u32>() as u32,
                );
                if status != 0 {
                    return Err(ntstatus_to_platform(status, "NtSetInformationProcess"));
                }
                Ok(())
            })();

            CloseHandle(handle);
            result
        }
    }
}

/// Read the current scheduling classes, if the process can be opened.
fn read_current_classes(pid: u32) -> (Option<CpuPriority>, Option<IoPriority>) {
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid);
        if handle.is_null() {
            return (None, None);
        }

        let class = GetPriorityClass(handle);
        let cpu = if class == 0 {
            None
        } else {
            cpu_class_from_priority_class(class)
        };

        let mut io_value = 0u32;
        let mut returned = 0u32;
        let status = NtQueryInformationProcess(
            handle,
            PROCESS_INFORMATION_IO_PRIORITY,
            &mut io_value as *mut u32 as *mut _,
            mem::size_of::<u32>() as u32,
            &mut returned,
        );
        let io = if status == 0 {
            io_class_from_level(io_value)
        } else {
            None
        };

        CloseHandle(handle);
        (cpu, io)
    }
}

fn priority_class_for(cpu: CpuPriority) -> DWORD {
    match cpu {
        CpuPriority::Idle => IDLE_PRIORITY_CLASS,
        CpuPriority::BelowNormal => BELOW_NORMAL_PRIORITY_CLASS,
        CpuPriority::Normal => NORMAL_PRIORITY_CLASS,
        CpuPriority::AboveNormal => ABOVE_NORMAL_PRIORITY_CLASS,
        CpuPriority::High => HIGH_PRIORITY_CLASS,
        CpuPriority::Realtime => REALTIME_PRIORITY_CLASS,
    }
}

fn cpu_class_from_priority_class(class: DWORD) -> Option<CpuPriority> {
    match class {
        IDLE_PRIORITY_CLASS => Some(CpuPriority::Idle),
        BELOW_NORMAL_PRIORITY_CLASS => Some(CpuPriority::BelowNormal),
        NORMAL_PRIORITY_CLASS => Some(CpuPriority::Normal),
        ABOVE_NORMAL_PRIORITY_CLASS => Some(CpuPriority::AboveNormal),
        HIGH_PRIORITY_CLASS => Some(CpuPriority::High),
        REALTIME_PRIORITY_CLASS => Some(CpuPriority::Realtime),
        _ => None,
    }
}

// Kernel IO priority levels: 0 = very low, 1 = low, 2 = normal, 3 = high.
fn io_level_for(io: IoPriority) -> u32 {
    match io {
        IoPriority::VeryLow => 0,
        IoPriority::Low => 1,
        IoPriority::Normal => 2,
        IoPriority::High => 3,
    }
}

fn io_class_from_level(level: u32) -> Option<IoPriority> {
    match level {
        0 => Some(IoPriority::VeryLow),
        1 => Some(IoPriority::Low),
        2 => Some(IoPriority::Normal),
        3 => Some(IoPriority::High),
        _ => None,
    }
}

fn utf16_until_nul(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

// ============================================================================
// Services
// ============================================================================

/// Service control through sc.exe. Exit codes are win32 error codes;
/// 1060 means the service does not exist, 1062 means already stopped.
pub struct ScServiceControl;

impl ScServiceControl {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScServiceControl {
    fn default() -> Self {
        Self::new()
    }
}

const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;

impl ServiceControl for ScServiceControl {
    fn set_disabled(&self, name: &str) -> PlatformResult<()> {
        let output = Command::new("sc")
            .args(["config", name, "start=", "disabled"])
            .output()
            .map_err(|e| PlatformError::Io(format!("sc: {}", e)))?;
        let code = output.status.code().unwrap_or(-1);
        match code {
            0 => {}
            ERROR_SERVICE_DOES_NOT_EXIST => {
                return Err(PlatformError::NotFound(format!("service {}", name)))
            }
            c if c == ERROR_ACCESS_DENIED as i32 => {
                return Err(PlatformError::PermissionDenied(format!(
                    "sc config {}",
                    name
                )))
            }
            c => {
                return Err(PlatformError::System {
                    code: c,
                    message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
        }

        let output = Command::new("sc")
            .args(["stop", name])
            .output()
            .map_err(|e| PlatformError::Io(format!("sc: {}", e)))?;
        match output.status.code().unwrap_or(-1) {
            0 | ERROR_SERVICE_NOT_ACTIVE => Ok(()),
            c if c == ERROR_ACCESS_DENIED as i32 => Err(PlatformError::PermissionDenied(
                format!("sc stop {}", name),
            )),
            c => Err(PlatformError::System {
                code: c,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

// ============================================================================
// Error mapping
// ============================================================================

fn last_error_to_platform(call: &str) -> PlatformError {
    let code = unsafe { GetLastError() };
    match code {
        ERROR_ACCESS_DENIED => PlatformError::PermissionDenied(call.to_string()),
        _ => PlatformError::System {
            code: code as i32,
            message: format!("{} failed", call),
        },
    }
}

fn open_error_to_platform(pid: u32) -> PlatformError {
    let code = unsafe { GetLastError() };
    match code {
        ERROR_ACCESS_DENIED => PlatformError::PermissionDenied(format!("pid {}", pid)),
        // OpenProcess reports an exited pid as an invalid parameter.
        ERROR_INVALID_PARAMETER => PlatformError::NotFound(format!("pid {}", pid)),
        _ => PlatformError::System {
            code: code as i32,
            message: format!("OpenProcess({}) failed", pid),
        },
    }
}

fn ntstatus_to_platform(status: i32, call: &str) -> PlatformError {
    match status {
        STATUS_PRIVILEGE_NOT_HELD | STATUS_ACCESS_DENIED => {
            PlatformError::PermissionDenied(format!("{} (status {:#x})", call, status))
        }
        _ => PlatformError::System {
            code: status,
            message: format!("{} failed", call),
        },
    }
}
