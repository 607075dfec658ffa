//! GICv2 distributor + CPU-interface driver (spec.md §4.5). Grounded in the
//! register-offset/const style of this crate's earlier GICv3 driver and the
//! handler-registry pattern of its interrupt-dispatch module, adapted to
//! the single GICv2 distributor/CPU-interface pair spec.md fixes.

use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

use crate::lib::error::KError;

use super::trap::InterruptFrame;

pub const MAX_INTERRUPT_HANDLERS: usize = 128;

pub type HandlerFn = fn(&mut InterruptFrame) -> i32;

// GICD (distributor) register offsets, from the platform's `gicd` base.
const GICD_CTLR: usize = 0x000;
const GICD_ISENABLER: usize = 0x100;
const GICD_ICENABLER: usize = 0x180;
const GICD_ICPENDR: usize = 0x280;
const GICD_ICFGR: usize = 0xC00;

// GICC (CPU interface) register offsets, from the platform's `gicc` base.
const GICC_CTLR: usize = 0x000;
const GICC_PMR: usize = 0x004;
const GICC_BPR: usize = 0x008;
const GICC_IAR: usize = 0x00C;
const GICC_EOIR: usize = 0x010;

const SPURIOUS_IRQ: u32 = 1023;
const SPURIOUS_THRESHOLD: u32 = 1020;

struct GicBase {
    gicd: usize,
    gicc: usize,
}

static GIC_BASE: Mutex<Option<GicBase>> = Mutex::new(None);
static INIT_DONE: AtomicBool = AtomicBool::new(false);

static HANDLERS: Mutex<[Option<HandlerFn>; MAX_INTERRUPT_HANDLERS]> =
    Mutex::new([None; MAX_INTERRUPT_HANDLERS]);

fn gicd(off: usize) -> *mut u32 {
    let base = GIC_BASE.lock().as_ref().expect("gic not initialised").gicd;
    (base + off) as *mut u32
}

fn gicc(off: usize) -> *mut u32 {
    let base = GIC_BASE.lock().as_ref().expect("gic not initialised").gicc;
    (base + off) as *mut u32
}

/// Distributor + CPU-interface bring-up (spec.md §4.5).
pub fn interrupt_init() {
    let desc = crate::platform::active().gic();
    *GIC_BASE.lock() = Some(GicBase { gicd: desc.gicd, gicc: desc.gicc });

    unsafe {
        write_volatile(gicd(GICD_CTLR), 0); // disable distributor

        // All SPIs level-triggered (ICFGR is 2 bits/IRQ; leave SGIs/PPIs alone).
        for i in 2..(1020 / 16) {
            write_volatile((gicd(GICD_ICFGR) as usize + i * 4) as *mut u32, 0);
        }

        // Disable every interrupt, then clear all pending.
        for i in 0..(MAX_INTERRUPT_HANDLERS / 32).max(1) {
            write_volatile((gicd(GICD_ICENABLER) as usize + i * 4) as *mut u32, 0xFFFF_FFFF);
            write_volatile((gicd(GICD_ICPENDR) as usize + i * 4) as *mut u32, 0xFFFF_FFFF);
        }

        write_volatile(gicd(GICD_CTLR), 1); // enable distributor

        write_volatile(gicc(GICC_PMR), 0xFF); // priority mask: accept all
        write_volatile(gicc(GICC_BPR), 0); // binary point group 0
        write_volatile(gicc(GICC_CTLR), 1); // enable CPU interface
    }

    INIT_DONE.store(true, Ordering::SeqCst);
    crate::info!("GICv2 initialised (gicd={:#x} gicc={:#x})", desc.gicd, desc.gicc);
}

pub fn interrupt_register_handler(n: usize, f: HandlerFn) -> Result<(), KError> {
    if n >= MAX_INTERRUPT_HANDLERS {
        return Err(KError::InvalidArgument);
    }
    let mut handlers = HANDLERS.lock();
    if handlers[n].is_some() {
        return Err(KError::InUse);
    }
    handlers[n] = Some(f);
    Ok(())
}

pub fn interrupt_unregister_handler(n: usize) -> Result<(), KError> {
    if n >= MAX_INTERRUPT_HANDLERS {
        return Err(KError::InvalidArgument);
    }
    HANDLERS.lock()[n] = None;
    Ok(())
}

pub fn interrupt_enable(n: u32) {
    let word = (n / 32) as usize;
    let bit = n % 32;
    unsafe {
        write_volatile((gicd(GICD_ISENABLER) as usize + word * 4) as *mut u32, 1 << bit);
    }
}

pub fn interrupt_disable(n: u32) {
    let word = (n / 32) as usize;
    let bit = n % 32;
    unsafe {
        write_volatile((gicd(GICD_ICENABLER) as usize + word * 4) as *mut u32, 1 << bit);
    }
}

/// Unmask IRQs at the CPU (`DAIF.I`).
pub fn interrupt_enable_all() {
    unsafe { core::arch::asm!("msr daifclr, #2") };
}

/// Mask IRQs at the CPU.
pub fn interrupt_disable_all() {
    unsafe { core::arch::asm!("msr daifset, #2") };
}

/// C entry from the IRQ vector stub (spec.md §4.5).
pub fn irq_handler(frame: &mut InterruptFrame) -> i32 {
    if !INIT_DONE.load(Ordering::SeqCst) {
        return 0;
    }
    let iar = unsafe { read_volatile(gicc(GICC_IAR)) };
    let id = iar & 0x3FF;

    if id >= SPURIOUS_THRESHOLD || id == SPURIOUS_IRQ {
        return 0;
    }

    let handler = HANDLERS.lock()[id as usize];
    let result = match handler {
        Some(f) => f(frame),
        None => 0,
    };

    unsafe { write_volatile(gicc(GICC_EOIR), iar) };
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_frame: &mut InterruptFrame) -> i32 {
        0
    }

    #[test]
    fn register_unregister_round_trip() {
        let mut handlers = [None::<HandlerFn>; MAX_INTERRUPT_HANDLERS];
        handlers[5] = Some(noop as HandlerFn);
        assert!(handlers[5].is_some());
        handlers[5] = None;
        assert!(handlers[5].is_none());
    }

    #[test]
    fn spurious_id_detected() {
        assert!(SPURIOUS_IRQ >= SPURIOUS_THRESHOLD);
        assert!(1023 >= SPURIOUS_THRESHOLD);
    }
}
