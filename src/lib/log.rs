//! Kernel logging (printk-style) with a ring buffer.
//!
//! Grounded on this crate's earlier `printk` facility: a leveled macro
//! family backed by a ring buffer of formatted entries, with Error/Warn
//! echoed to the console immediately. The JSON/structured variant and the
//! `dmesg` syscall hook are dropped here — nothing in spec.md's 6-entry
//! syscall table (§4.10) names them.

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU8, Ordering};
use spin::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

/// Messages above this level are buffered but not echoed to the console.
static LOG_THRESHOLD: AtomicU8 = AtomicU8::new(LogLevel::Trace as u8);

const LOG_CAPACITY: usize = 512;
const MESSAGE_CAP: usize = 256;

#[derive(Copy, Clone)]
pub struct LogEntry {
    pub timestamp_us: u64,
    pub level: LogLevel,
    pub message: [u8; MESSAGE_CAP],
    pub len: usize,
}

impl LogEntry {
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.message[..self.len]).unwrap_or("<invalid utf8>")
    }
}

struct LogBuffer {
    entries: Mutex<heapless::Deque<LogEntry, LOG_CAPACITY>>,
}

impl LogBuffer {
    const fn new() -> Self {
        Self { entries: Mutex::new(heapless::Deque::new()) }
    }

    fn push(&self, entry: LogEntry) {
        let mut q = self.entries.lock();
        if q.is_full() {
            q.pop_front();
        }
        let _ = q.push_back(entry);
    }
}

static KERNEL_LOG: LogBuffer = LogBuffer::new();

struct UartWriter;

impl Write for UartWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        unsafe {
            crate::uart::write_bytes(s.as_bytes());
        }
        Ok(())
    }
}

/// Set the immediate-echo threshold. Entries below or at this level keep
/// appending to the ring buffer regardless; only console echo is gated.
pub fn set_threshold(level: LogLevel) {
    LOG_THRESHOLD.store(level as u8, Ordering::Relaxed);
}

pub fn log(level: LogLevel, args: fmt::Arguments<'_>) {
    let msg = alloc::format!("{}", args);
    let mut message = [0u8; MESSAGE_CAP];
    let len = core::cmp::min(msg.len(), MESSAGE_CAP);
    message[..len].copy_from_slice(&msg.as_bytes()[..len]);

    let timestamp_us = crate::time::get_timestamp_us();
    KERNEL_LOG.push(LogEntry { timestamp_us, level, message, len });

    if level <= LogLevel::Warn || (level as u8) <= LOG_THRESHOLD.load(Ordering::Relaxed) {
        let mut writer = UartWriter;
        let _ = write!(writer, "[{}] {}\n", level.as_str(), msg);
    }
}

/// Copy up to `out.len()` of the most recent log entries (oldest first of
/// the returned slice) into `out`. Returns the number written.
pub fn recent(out: &mut [LogEntry]) -> usize {
    let q = KERNEL_LOG.entries.lock();
    let n = core::cmp::min(out.len(), q.len());
    let skip = q.len() - n;
    for (slot, entry) in out[..n].iter_mut().zip(q.iter().skip(skip)) {
        *slot = *entry;
    }
    n
}

#[macro_export]
macro_rules! printk {
    ($level:expr, $($arg:tt)*) => {
        $crate::lib::log::log($level, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::printk!($crate::lib::log::LogLevel::Error, $($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::printk!($crate::lib::log::LogLevel::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::printk!($crate::lib::log::LogLevel::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::printk!($crate::lib::log::LogLevel::Debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::printk!($crate::lib::log::LogLevel::Trace, $($arg)*)
    };
}
