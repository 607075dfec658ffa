//! Platform description: centralises the QEMU `virt` addresses spec.md §6
//! fixes (RAM base/size, UART base, GIC bases, timer frequency hint) behind
//! one trait so the rest of the kernel doesn't scatter magic numbers.
//!
//! Grounded on `src/platform/{mod.rs,qemu_virt.rs}`; this crate targets a
//! single fixed machine, so the teacher's DTB-override path and multi-SoC
//! descriptor set (GICv3 redistributor, VirtIO MMIO hint) are dropped.

#![allow(dead_code)]

#[derive(Copy, Clone)]
pub struct UartDesc {
    pub base: usize,
    pub clock_hz: u32,
}

/// GICv2 descriptor: distributor and CPU-interface MMIO bases.
#[derive(Copy, Clone)]
pub struct GicDesc {
    pub gicd: usize,
    pub gicc: usize,
}

#[derive(Copy, Clone)]
pub struct TimerDesc {
    pub freq_hz: u64,
}

#[derive(Copy, Clone)]
pub struct RamRange {
    pub start: usize,
    pub size: usize,
}

pub trait Platform {
    fn uart(&self) -> UartDesc;
    fn gic(&self) -> GicDesc;
    fn timer(&self) -> TimerDesc;
    fn ram(&self) -> RamRange;
}

pub mod qemu_virt;

pub fn active() -> &'static dyn Platform {
    &qemu_virt::INSTANCE
}
