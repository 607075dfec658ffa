//! The `ERET`-based task dispatch primitive (spec.md §4.7). There is no
//! cooperative stack-switch routine in this kernel: a task only ever
//! becomes "current" by having its saved register image written into the
//! live architectural registers and then `ERET`ing into it. The high-level
//! validation and bookkeeping (§4.7 steps 1-2) lives in `process::task`;
//! this module is only the raw register/barrier/`ERET` sequence of steps
//! 3-7, grounded in the asm-offset idiom of this crate's earlier
//! `aarch64_context.rs`.

use crate::process::task::TaskRegisters;

extern "C" {
    /// Writes `SPSR_EL1`/`ELR_EL1`/`SP_EL0`-or-`SP` from `*regs`, reloads
    /// the callee-saved `x19..x30` from `*regs`, and `ERET`s. Does not
    /// touch `x0..x18` — the volatile set at the continuation point is
    /// whatever was last live on the kernel stack, per spec.md §4.7
    /// ("Callee-saved reload is sufficient...").
    ///
    /// # Safety
    /// `regs` must point to a fully-initialised `TaskRegisters` with a
    /// non-null `sp` and `pc`/`elr_el1` — the caller (`task::restore_context`)
    /// checks this before calling.
    pub fn task_restore_context_asm(regs: *const TaskRegisters) -> !;
}

const _: () = assert!(core::mem::size_of::<TaskRegisters>() == 280);

core::arch::global_asm!(
    r#"
    .section .text
    .global task_restore_context_asm
task_restore_context_asm:
    // x0 = *const TaskRegisters
    ldr x2, [x0, #264]        // spsr_el1
    msr spsr_el1, x2
    ldr x3, [x0, #272]        // elr_el1
    msr elr_el1, x3

    and x4, x2, #0xf          // SPSR.M[3:0]
    ldr x5, [x0, #248]        // registers.sp
    cbnz x4, 1f
    msr sp_el0, x5
    b 2f
1:
    mov sp, x5
2:
    dsb sy
    isb

    ldp x19, x20, [x0, #152]
    ldp x21, x22, [x0, #168]
    ldp x23, x24, [x0, #184]
    ldp x25, x26, [x0, #200]
    ldp x27, x28, [x0, #216]
    ldp x29, x30, [x0, #232]
    eret
    "#
);
