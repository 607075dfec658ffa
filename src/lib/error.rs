// Kernel error codes.
//
// These are the kernel's own closed set, not POSIX errno: every negative
// return value crossing the SVC boundary must match one of these exactly,
// since calling code (and the syscall ABI) is written against the fixed
// numeric values below.

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KError {
    Ok = 0,
    InvalidArgument = 2,
    NoMemory = 3,
    Invalid = 6,
    NotReady = 7,
    Fault = 8,
    InUse = 10,
    NoTask = 11,
    ProcessMax = 12,
    InvalidSyscall = 13,
    Syscall = 14,
    NotFound = 15,
}

impl KError {
    /// Negative numeric value as returned from a kernel function / syscall.
    pub const fn as_isize(self) -> isize {
        -(self as i32 as isize)
    }

    pub const fn description(self) -> &'static str {
        match self {
            KError::Ok => "ok",
            KError::InvalidArgument => "invalid argument",
            KError::NoMemory => "out of memory",
            KError::Invalid => "invalid",
            KError::NotReady => "not ready",
            KError::Fault => "fault",
            KError::InUse => "already in use",
            KError::NoTask => "no runnable task",
            KError::ProcessMax => "process table full",
            KError::InvalidSyscall => "invalid syscall number",
            KError::Syscall => "syscall failed",
            KError::NotFound => "not found",
        }
    }
}

pub type KernelResult<T> = core::result::Result<T, KError>;

/// Collapse a kernel result into the `int`-style ABI used at the SVC
/// boundary: `>=0` on success, negative `KError` value on failure.
pub fn to_isize(result: KernelResult<isize>) -> isize {
    match result {
        Ok(v) => v,
        Err(e) => e.as_isize(),
    }
}
