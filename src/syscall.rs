//! SVC dispatch table (spec.md §4.10). `el0_sync_handler` decodes EC==0x15
//! and calls `dispatch` with the syscall number and `frame.x1..x4`; the
//! result is written back into `frame.x0` by the caller.

use crate::lib::error::KError;
use crate::process::{process, scheduler};

const PROCESS_EXIT: u64 = 0;
const PROCESS_MALLOC: u64 = 1;
const PROCESS_FREE: u64 = 2;
const PROCESS_GET_ARGS: u64 = 3;
const PRINT_CHAR: u64 = 4;
const PRINT_STRING: u64 = 5;

pub fn init() {
    crate::info!("syscall dispatch table ready (6 entries)");
}

/// Invalid syscall numbers, and any syscall issued with no current
/// process, return `-EINVSYSCALL` / `-ENOTASK` respectively.
pub fn dispatch(num: u64, x1: u64, x2: u64, x3: u64, _x4: u64) -> i64 {
    match num {
        PROCESS_EXIT => sys_process_exit(x1),
        PROCESS_MALLOC => sys_process_malloc(x1),
        PROCESS_FREE => sys_process_free(x1),
        PROCESS_GET_ARGS => sys_process_get_args(x1, x2),
        PRINT_CHAR => sys_print_char(x1),
        PRINT_STRING => sys_print_string(x1),
        _ => KError::InvalidSyscall.as_isize() as i64,
    }
}

/// Terminates the current process and falls through into whatever task
/// the scheduler picks next. Never returns to the caller on success.
fn sys_process_exit(exit_code: u64) -> i64 {
    let pid = match scheduler::current_process() {
        Some(pid) => pid,
        None => return KError::NoTask.as_isize() as i64,
    };
    crate::info!("process {} exiting with code {}", pid, exit_code as i64);
    let _ = process::process_terminate(pid);

    match crate::process::task::list_head().and_then(crate::process::task::next_ready_from) {
        Some(idx) => {
            if let Some(next_pid) = crate::process::task::process_of(idx) {
                scheduler::set_current_process(next_pid);
            }
            let _ = crate::process::task::task_restore_context(idx);
            0
        }
        None => crate::lib::panic::halt_with_message(format_args!(
            "no READY task remains after process {} exited",
            pid
        )),
    }
}

fn sys_process_malloc(size: u64) -> i64 {
    let pid = match scheduler::current_process() {
        Some(pid) => pid,
        None => return KError::NoTask.as_isize() as i64,
    };
    match process::process_malloc(pid, size as usize) {
        Ok(ptr) => ptr as i64,
        Err(e) => e.as_isize() as i64,
    }
}

fn sys_process_free(ptr: u64) -> i64 {
    let pid = match scheduler::current_process() {
        Some(pid) => pid,
        None => return KError::NoTask.as_isize() as i64,
    };
    match process::process_free(pid, ptr as usize) {
        Ok(()) => 0,
        Err(e) => e.as_isize() as i64,
    }
}

/// Writes `current->arguments` through the user-supplied `argc`/`argv`
/// pointers, but only after `process_memory_verify` confirms both
/// pointers fall inside the calling process's stack, code, or an
/// allocation slot — this implementation validates, unlike the teacher's
/// (spec.md §9 open question, resolved in favour of the secure variant).
fn sys_process_get_args(argc_ptr: u64, argv_ptr: u64) -> i64 {
    let pid = match scheduler::current_process() {
        Some(pid) => pid,
        None => return KError::NoTask.as_isize() as i64,
    };
    let (argc, argv) = match process::get_args(pid) {
        Some(args) => args,
        None => return KError::NotFound.as_isize() as i64,
    };

    let argc_ok = process::process_memory_verify(pid, argc_ptr as usize, 8);
    let argv_ok = process::process_memory_verify(pid, argv_ptr as usize, 8);
    if !argc_ok || !argv_ok {
        return KError::Fault.as_isize() as i64;
    }

    unsafe {
        core::ptr::write(argc_ptr as *mut u64, argc as u64);
        core::ptr::write(argv_ptr as *mut u64, argv as u64);
    }
    0
}

fn sys_print_char(c: u64) -> i64 {
    unsafe {
        crate::uart::write_byte(c as u8);
    }
    0
}

/// Writes bytes from `cstr` until a NUL, capped well above any realistic
/// message to bound a malformed pointer's damage.
fn sys_print_string(cstr: u64) -> i64 {
    const MAX_LEN: usize = 4096;
    let ptr = cstr as *const u8;
    if ptr.is_null() {
        return KError::InvalidArgument.as_isize() as i64;
    }
    let mut i = 0usize;
    unsafe {
        while i < MAX_LEN {
            let byte = core::ptr::read(ptr.add(i));
            if byte == 0 {
                break;
            }
            crate::uart::write_byte(byte);
            i += 1;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_syscall_returns_invalid_syscall() {
        assert_eq!(dispatch(99, 0, 0, 0, 0), KError::InvalidSyscall.as_isize() as i64);
    }
}
