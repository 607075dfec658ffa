#![no_std]
#![no_main]
#![feature(alloc_error_handler)]

//! Boot entry and `kernel_main` (spec.md §4.11). Stage-2 boot
//! (`arch::aarch64::boot`) zeroes `.bss`, installs the vector table, and
//! branches here with `x0` holding a `BootInfo` pointer.

extern crate alloc;

#[allow(special_module_name)]
pub mod lib;

pub mod arch {
    pub mod aarch64;
}

pub mod boot_info;
pub mod build_info;
pub mod heap;
pub mod mm;
pub mod platform;
pub mod process;
pub mod syscall;
pub mod time;
pub mod uart;

use boot_info::BootInfo;
use process::task::Priority;

extern "C" {
    static _start: u8;
    static _end: u8;
}

/// A process that never makes a syscall and never exits; it exists solely
/// to keep the task list non-empty (spec.md §3's "list is non-empty
/// whenever any process exists") and give the scheduler something READY
/// to dispatch before any real workload is loaded. `b .` (self-branch) so
/// it actually spins in place rather than running off the end of its
/// 8-byte buffer into whatever the heap zeroed next to it.
const IDLE_PROCESS_CODE: [u8; 8] = [
    0x00, 0x00, 0x00, 0x14, // b . (branch to self)
    0x00, 0x00, 0x00, 0x14, // b . (unreachable; keeps the buffer loop-only)
];

#[no_mangle]
pub extern "C" fn kernel_main(boot_info_ptr: *const BootInfo) -> ! {
    unsafe {
        uart::init();
        uart::write_bytes(b"Kernel started successfully!\n");
    }

    time::init_boot_timestamp();

    let info = match unsafe { boot_info::verify(boot_info_ptr) } {
        Some(info) => {
            unsafe {
                uart::write_bytes(b"Boot info verified.\n");
            }
            crate::info!("- RAM: {} MB", info.ram_size / (1024 * 1024));
            info
        }
        None => {
            crate::warn!("boot info missing or invalid, falling back to 128 MB RAM");
            BootInfo::fallback(128 * 1024 * 1024)
        }
    };

    heap::kheap_init(info.ram_size);

    let kernel_start = unsafe { &_start as *const u8 as usize };
    let kernel_end = unsafe { &_end as *const u8 as usize };
    mm::page_init(info.ram_size, kernel_start, kernel_end);

    arch::aarch64::gic::interrupt_init();

    process::scheduler::scheduler_init();

    syscall::init();

    build_info::print_build_info();

    match process::process::process_create("idle", Priority::Low, &IDLE_PROCESS_CODE) {
        Ok(pid) => crate::info!("created initial process {}", pid),
        Err(e) => crate::lib::panic::halt_with_message(format_args!(
            "failed to create initial process: {}",
            e.description()
        )),
    }

    if let Err(e) = process::scheduler::scheduler_start() {
        crate::lib::panic::halt_with_message(format_args!(
            "scheduler_start failed: {}",
            e.description()
        ));
    }

    // scheduler_start only returns on failure, handled above; a successful
    // call diverges into the first task via ERET and never reaches here.
    loop {
        unsafe {
            core::arch::asm!("wfe");
        }
    }
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    crate::lib::panic::panic_handler(info)
}
