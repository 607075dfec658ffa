//! Panic handler: disables interrupts, dumps what's known about the fault,
//! and halts in `WFE`. There is no unwinding and no recovery — per spec.md
//! §7, a fatal condition is logged once and the kernel stops.

use core::panic::PanicInfo;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use alloc::format;

static PANICKING: AtomicBool = AtomicBool::new(false);
static PANIC_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn panic_handler(info: &PanicInfo) -> ! {
    if PANICKING.swap(true, Ordering::SeqCst) {
        unsafe { crate::uart::write_bytes(b"\n!!! RECURSIVE PANIC !!!\n"); }
        halt();
    }

    let panic_num = PANIC_COUNT.fetch_add(1, Ordering::SeqCst) + 1;
    disable_interrupts();

    print_header(panic_num);
    print_info(info);
    print_registers();
    print_system_state();

    halt();
}

fn print_header(panic_num: u64) {
    unsafe {
        crate::uart::write_bytes(b"\n");
        crate::uart::write_bytes(b"================================================================\n");
        crate::uart::write_bytes(b"!!!                       KERNEL PANIC                      !!!\n");
        crate::uart::write_bytes(b"================================================================\n");
        if panic_num > 1 {
            crate::uart::write_bytes(format!("panic #{}\n", panic_num).as_bytes());
        }
    }
}

fn print_info(info: &PanicInfo) {
    unsafe {
        if let Some(location) = info.location() {
            crate::uart::write_bytes(
                format!("  at {}:{}:{}\n", location.file(), location.line(), location.column())
                    .as_bytes(),
            );
        }
        if let Some(payload) = info.payload().downcast_ref::<&str>() {
            crate::uart::write_bytes(format!("  message: {}\n", payload).as_bytes());
        } else {
            crate::uart::write_bytes(b"  message: <none>\n");
        }
    }
}

#[cfg(target_arch = "aarch64")]
fn print_registers() {
    use core::arch::asm;
    let (mut x29, mut x30, mut sp): (u64, u64, u64);
    unsafe {
        asm!("mov {}, x29", out(reg) x29);
        asm!("mov {}, x30", out(reg) x30);
        asm!("mov {}, sp", out(reg) sp);
        crate::uart::write_bytes(
            format!("  fp(x29)={:#018x} lr(x30)={:#018x} sp={:#018x}\n", x29, x30, sp).as_bytes(),
        );
    }
    let _ = (&mut x29, &mut x30, &mut sp);
}

#[cfg(not(target_arch = "aarch64"))]
fn print_registers() {}

fn print_system_state() {
    let uptime_ms = crate::time::get_uptime_ms();
    unsafe {
        crate::uart::write_bytes(format!("  uptime: {} ms\n", uptime_ms).as_bytes());
    }
    let stats = crate::heap::stats();
    unsafe {
        crate::uart::write_bytes(
            format!(
                "  heap: {} blocks used / {} total, {} alloc failures\n",
                stats.blocks_used, stats.blocks_total, stats.allocation_failures
            )
            .as_bytes(),
        );
        crate::uart::write_bytes(crate::build_info::get_version_string().as_bytes());
        crate::uart::write_bytes(b"\n");
    }
}

#[inline(always)]
fn disable_interrupts() {
    unsafe {
        core::arch::asm!("msr daifset, #0xf");
    }
}

fn halt() -> ! {
    unsafe {
        crate::uart::write_bytes(b"System halted.\n");
    }
    loop {
        unsafe {
            core::arch::asm!("wfe");
        }
    }
}

pub fn panic_count() -> u64 {
    PANIC_COUNT.load(Ordering::Relaxed)
}

pub fn is_panicking() -> bool {
    PANICKING.load(Ordering::Relaxed)
}

/// Print a diagnostic and halt in `WFE`, for fatal conditions that are not
/// Rust panics: an unexpected exception level at boot, an unhandled
/// synchronous exception, or an invariant violated at an interrupt boundary
/// (spec.md §7's "fatal" taxonomy). Never returns.
pub fn halt_with_message(args: core::fmt::Arguments<'_>) -> ! {
    disable_interrupts();
    unsafe {
        crate::uart::write_bytes(b"\n*** FATAL: ");
        crate::uart::write_bytes(format!("{}", args).as_bytes());
        crate::uart::write_bytes(b" ***\n");
    }
    halt();
}
