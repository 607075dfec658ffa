use super::{GicDesc, Platform, RamRange, TimerDesc, UartDesc};

/// QEMU `virt` machine, `gic-version=2`, per spec.md §6.
pub struct QemuVirtPlatform;

pub static INSTANCE: QemuVirtPlatform = QemuVirtPlatform;

impl Platform for QemuVirtPlatform {
    fn uart(&self) -> UartDesc {
        UartDesc { base: 0x0900_0000, clock_hz: 24_000_000 }
    }

    fn gic(&self) -> GicDesc {
        GicDesc { gicd: 0x0800_1000, gicc: 0x0800_2000 }
    }

    fn timer(&self) -> TimerDesc {
        // CNTFRQ_EL0 is read at runtime; this is only a bring-up default
        // used if the register reads back zero (spec.md §4.6).
        TimerDesc { freq_hz: 1_000_000_000 }
    }

    fn ram(&self) -> RamRange {
        RamRange { start: 0x4000_0000, size: 0x4000_0000 } // 1 GiB typical
    }
}
