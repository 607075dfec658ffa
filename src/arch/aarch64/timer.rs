//! ARM generic timer driver (spec.md §4.6). The timer fires PPI 30 through
//! the GIC; this module owns programming `CNTP_CVAL_EL0`/`CNTP_CTL_EL0` and
//! re-arming the next tick from its own IRQ handler, then calls out to
//! whatever subscriber the scheduler registered.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::gic;
use super::trap::InterruptFrame;

pub const TIMER_IRQ: u32 = 30;

static TICKS: AtomicU64 = AtomicU64::new(0);
static INTERVAL_TICKS: AtomicU64 = AtomicU64::new(0);
static SUBSCRIBER: AtomicUsize = AtomicUsize::new(0);

pub type TickFn = fn(&mut InterruptFrame) -> i32;

fn read_cntfrq() -> u64 {
    let v: u64;
    unsafe { core::arch::asm!("mrs {}, CNTFRQ_EL0", out(reg) v) };
    v
}

fn read_cntpct() -> u64 {
    let v: u64;
    unsafe { core::arch::asm!("mrs {}, CNTPCT_EL0", out(reg) v) };
    v
}

fn write_cntp_cval(v: u64) {
    unsafe { core::arch::asm!("msr CNTP_CVAL_EL0, {}", in(reg) v) };
}

fn write_cntp_ctl(v: u64) {
    unsafe { core::arch::asm!("msr CNTP_CTL_EL0, {}", in(reg) v) };
}

fn write_cntfrq(v: u64) {
    unsafe { core::arch::asm!("msr CNTFRQ_EL0, {}", in(reg) v) };
}

/// Registers the tick handler on IRQ 30 and leaves the timer disabled. If
/// `CNTFRQ_EL0` reads back zero (firmware didn't set it), programs the
/// platform's timer frequency hint instead (spec.md §4.6).
pub fn timer_init() {
    let _ = gic::interrupt_register_handler(TIMER_IRQ as usize, timer_irq_handler);
    write_cntp_ctl(0);

    if read_cntfrq() == 0 {
        write_cntfrq(crate::platform::active().timer().freq_hz);
    }

    crate::info!("generic timer initialised, CNTFRQ={}", read_cntfrq());
}

/// Sets the tick period and arms the first deadline. Does not unmask IRQs
/// at the GIC or CPU — call `timer_enable` for that.
pub fn timer_set_interval(ms: u64) {
    let freq = read_cntfrq().max(1);
    let ticks = freq / 1000 * ms;
    INTERVAL_TICKS.store(ticks, Ordering::SeqCst);
    write_cntp_cval(read_cntpct() + ticks);
}

/// Registers the function called on every tick (the scheduler's preemption
/// hook). Stored as a raw fn pointer cast to `usize` so this module stays
/// `#[no_std]`-friendly without pulling in `dyn Fn` boxing.
pub fn timer_set_subscriber(f: TickFn) {
    SUBSCRIBER.store(f as usize, Ordering::SeqCst);
}

/// Arms the timer, enables IRQ 30 at the GIC, and unmasks `DAIF.I` at the
/// CPU (spec.md §4.6).
pub fn timer_enable() {
    write_cntp_ctl(1);
    gic::interrupt_enable(TIMER_IRQ);
    gic::interrupt_enable_all();
}

pub fn timer_disable() {
    write_cntp_ctl(0);
    gic::interrupt_disable(TIMER_IRQ);
}

pub fn ticks() -> u64 {
    TICKS.load(Ordering::SeqCst)
}

fn timer_irq_handler(frame: &mut InterruptFrame) -> i32 {
    TICKS.fetch_add(1, Ordering::SeqCst);

    let interval = INTERVAL_TICKS.load(Ordering::SeqCst);
    if interval != 0 {
        write_cntp_cval(read_cntpct() + interval);
    }

    let sub = SUBSCRIBER.load(Ordering::SeqCst);
    if sub != 0 {
        let f: TickFn = unsafe { core::mem::transmute(sub) };
        return f(frame);
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_counter_starts_at_zero() {
        assert_eq!(TICKS.load(Ordering::SeqCst), 0);
    }
}
