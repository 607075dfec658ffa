//! The 16-slot AArch64 exception vector table and its entry stubs
//! (spec.md §4.2). Grounded in the vector-table/naked-stub idiom used
//! across this retrieval pack's other bare-metal AArch64 kernels, adapted
//! to the exact 272-byte `InterruptFrame` this crate's data model fixes.

use core::arch::naked_asm;

/// Each vector slot is a 128-byte aligned branch into a named stub, in
/// architectural order: four groups of {Synchronous, IRQ, FIQ, SError} for
/// {Current-EL-SP0, Current-EL-SPx, Lower-EL-A64, Lower-EL-A32}.
#[no_mangle]
#[link_section = ".vector"]
#[unsafe(naked)]
pub unsafe extern "C" fn vector_table() {
    naked_asm!(
        ".align 11", // 2048-byte alignment

        // Current EL, SP_EL0 — never used by this kernel (always EL1h).
        ".align 7", "mov x0, #0", "b trap_unexpected",
        ".align 7", "mov x0, #0", "b trap_unexpected",
        ".align 7", "mov x0, #0", "b trap_unexpected",
        ".align 7", "mov x0, #0", "b trap_unexpected",

        // Current EL, SP_ELx — kernel-mode exceptions.
        ".align 7", "b el1h_sync",
        ".align 7", "b el1h_irq",
        ".align 7", "b el1h_fiq",
        ".align 7", "b el1h_serror",

        // Lower EL, AArch64 — user-mode exceptions.
        ".align 7", "b el0_sync",
        ".align 7", "b el0_irq",
        ".align 7", "b el0_fiq",
        ".align 7", "b el0_serror",

        // Lower EL, AArch32 — unsupported.
        ".align 7", "mov x0, #1", "b trap_unexpected",
        ".align 7", "mov x0, #2", "b trap_unexpected",
        ".align 7", "mov x0, #3", "b trap_unexpected",
        ".align 7", "mov x0, #4", "b trap_unexpected",
    );
}

const _: () = assert!(core::mem::size_of::<InterruptFrame>() == 272);
use crate::arch::aarch64::trap::InterruptFrame;

macro_rules! save_frame_el1h {
    () => {
        concat!(
            "sub sp, sp, #272\n",
            "stp x0, x1, [sp, #0]\n",
            "stp x2, x3, [sp, #16]\n",
            "stp x4, x5, [sp, #32]\n",
            "stp x6, x7, [sp, #48]\n",
            "stp x8, x9, [sp, #64]\n",
            "stp x10, x11, [sp, #80]\n",
            "stp x12, x13, [sp, #96]\n",
            "stp x14, x15, [sp, #112]\n",
            "stp x16, x17, [sp, #128]\n",
            "stp x18, x19, [sp, #144]\n",
            "stp x20, x21, [sp, #160]\n",
            "stp x22, x23, [sp, #176]\n",
            "stp x24, x25, [sp, #192]\n",
            "stp x26, x27, [sp, #208]\n",
            "stp x28, x29, [sp, #224]\n",
            "str x30, [sp, #240]\n",
            // Came from EL1h: the pre-exception SP is this SP plus the
            // frame we just pushed (spec.md §4.2 step 3, EL1h branch).
            "add x0, sp, #272\n",
            "str x0, [sp, #248]\n",
            "mrs x0, elr_el1\n",
            "str x0, [sp, #256]\n",
            "mrs x0, spsr_el1\n",
            "str x0, [sp, #264]\n",
        )
    };
}

macro_rules! save_frame_el0 {
    () => {
        concat!(
            "sub sp, sp, #272\n",
            "stp x0, x1, [sp, #0]\n",
            "stp x2, x3, [sp, #16]\n",
            "stp x4, x5, [sp, #32]\n",
            "stp x6, x7, [sp, #48]\n",
            "stp x8, x9, [sp, #64]\n",
            "stp x10, x11, [sp, #80]\n",
            "stp x12, x13, [sp, #96]\n",
            "stp x14, x15, [sp, #112]\n",
            "stp x16, x17, [sp, #128]\n",
            "stp x18, x19, [sp, #144]\n",
            "stp x20, x21, [sp, #160]\n",
            "stp x22, x23, [sp, #176]\n",
            "stp x24, x25, [sp, #192]\n",
            "stp x26, x27, [sp, #208]\n",
            "stp x28, x29, [sp, #224]\n",
            "str x30, [sp, #240]\n",
            // Came from EL0t: the interrupted stack is SP_EL0 (spec.md
            // §4.2 step 3, lower-EL branch).
            "mrs x0, sp_el0\n",
            "str x0, [sp, #248]\n",
            "mrs x0, elr_el1\n",
            "str x0, [sp, #256]\n",
            "mrs x0, spsr_el1\n",
            "str x0, [sp, #264]\n",
        )
    };
}

macro_rules! restore_frame_and_eret {
    () => {
        concat!(
            "ldr x0, [sp, #256]\n",
            "msr elr_el1, x0\n",
            "ldr x0, [sp, #264]\n",
            "msr spsr_el1, x0\n",
            "ldp x0, x1, [sp, #0]\n",
            "ldp x2, x3, [sp, #16]\n",
            "ldp x4, x5, [sp, #32]\n",
            "ldp x6, x7, [sp, #48]\n",
            "ldp x8, x9, [sp, #64]\n",
            "ldp x10, x11, [sp, #80]\n",
            "ldp x12, x13, [sp, #96]\n",
            "ldp x14, x15, [sp, #112]\n",
            "ldp x16, x17, [sp, #128]\n",
            "ldp x18, x19, [sp, #144]\n",
            "ldp x20, x21, [sp, #160]\n",
            "ldp x22, x23, [sp, #176]\n",
            "ldp x24, x25, [sp, #192]\n",
            "ldp x26, x27, [sp, #208]\n",
            "ldp x28, x29, [sp, #224]\n",
            "ldr x30, [sp, #240]\n",
            "add sp, sp, #272\n",
            "eret\n",
        )
    };
}

#[no_mangle]
#[unsafe(naked)]
unsafe extern "C" fn el1h_sync() {
    naked_asm!(
        save_frame_el1h!(),
        "mov x0, sp",
        "bl el1_sync_handler",
        restore_frame_and_eret!(),
    );
}

#[no_mangle]
#[unsafe(naked)]
unsafe extern "C" fn el1h_irq() {
    naked_asm!(
        save_frame_el1h!(),
        "mov x0, sp",
        "bl irq_handler",
        restore_frame_and_eret!(),
    );
}

#[no_mangle]
#[unsafe(naked)]
unsafe extern "C" fn el1h_fiq() {
    naked_asm!(
        save_frame_el1h!(),
        "mov x0, sp",
        "bl fiq_handler",
        restore_frame_and_eret!(),
    );
}

#[no_mangle]
#[unsafe(naked)]
unsafe extern "C" fn el1h_serror() {
    naked_asm!(
        save_frame_el1h!(),
        "mov x0, sp",
        "bl serror_handler",
        restore_frame_and_eret!(),
    );
}

#[no_mangle]
#[unsafe(naked)]
unsafe extern "C" fn el0_sync() {
    naked_asm!(
        save_frame_el0!(),
        "mov x0, sp",
        "bl el0_sync_handler",
        restore_frame_and_eret!(),
    );
}

#[no_mangle]
#[unsafe(naked)]
unsafe extern "C" fn el0_irq() {
    naked_asm!(
        save_frame_el0!(),
        "mov x0, sp",
        "bl irq_handler",
        restore_frame_and_eret!(),
    );
}

#[no_mangle]
#[unsafe(naked)]
unsafe extern "C" fn el0_fiq() {
    naked_asm!(
        save_frame_el0!(),
        "mov x0, sp",
        "bl fiq_handler",
        restore_frame_and_eret!(),
    );
}

#[no_mangle]
#[unsafe(naked)]
unsafe extern "C" fn el0_serror() {
    naked_asm!(
        save_frame_el0!(),
        "mov x0, sp",
        "bl serror_handler",
        restore_frame_and_eret!(),
    );
}
