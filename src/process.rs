//! Process and host identity.
//!
//! Answers the one question the lock protocol needs: is the (hostname,
//! pid) pair recorded in a lock file still alive on this machine?

use crate::error::{Result, SegdirError};

/// Resolve this machine's hostname.
pub fn host_name() -> Result<String> {
    let name = hostname::get().map_err(SegdirError::Hostname)?;
    Ok(name.to_string_lossy().into_owned())
}

/// Compare `candidate` against the current hostname for exact byte
/// equality.
pub fn is_same_hostname(candidate: &[u8]) -> Result<bool> {
    Ok(host_name()?.as_bytes() == candidate)
}

/// Current process identifier.
pub fn pid() -> u32 {
    std::process::id()
}

/// Liveness probe for a process id on this host.
///
/// POSIX: signal 0. Any outcome other than ESRCH proves the process
/// exists (EPERM means alive but owned by someone else).
#[cfg(unix)]
pub fn is_running(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

/// Liveness probe for a process id on this host.
///
/// Windows: walk the toolhelp process snapshot looking for the id.
#[cfg(windows)]
pub fn is_running(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }

    const TH32CS_SNAPPROCESS: u32 = 0x0000_0002;
    const INVALID_HANDLE_VALUE: isize = -1;

    #[repr(C)]
    struct ProcessEntry32W {
        dw_size: u32,
        cnt_usage: u32,
        th32_process_id: u32,
        th32_default_heap_id: usize,
        th32_module_id: u32,
        cnt_threads: u32,
        th32_parent_process_id: u32,
        pc_pri_class_base: i32,
        dw_flags: u32,
        sz_exe_file: [u16; 260],
    }

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn CreateToolhelp32Snapshot(dwFlags: u32, th32ProcessID: u32) -> isize;
        fn Process32FirstW(hSnapshot: isize, lppe: *mut ProcessEntry32W) -> i32;
        fn Process32NextW(hSnapshot: isize, lppe: *mut ProcessEntry32W) -> i32;
        fn CloseHandle(hObject: isize) -> i32;
    }

    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0);
        if snapshot == INVALID_HANDLE_VALUE {
            return false;
        }

        let mut entry: ProcessEntry32W = std::mem::zeroed();
        entry.dw_size = std::mem::size_of::<ProcessEntry32W>() as u32;

        let mut found = false;
        let mut ok = Process32FirstW(snapshot, &mut entry);
        while ok != 0 {
            if entry.th32_process_id == pid {
                found = true;
                break;
            }
            ok = Process32NextW(snapshot, &mut entry);
        }
        CloseHandle(snapshot);
        found
    }
}

/// Parse `text` as a base-10 pid and check that the process is alive.
///
/// False when the text is not a number, parses to 0, falls outside the
/// platform pid range, or names a process that is no longer running.
pub fn is_valid_pid(text: &str) -> bool {
    match text.parse::<u32>() {
        Ok(p) if p != 0 => is_running(p),
        _ => false,
    }
}
