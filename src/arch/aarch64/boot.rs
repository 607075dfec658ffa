//! `_start`, exception-level descent, BSS zeroing, and the stage-2 handoff
//! into `kernel_main` (spec.md §4.1). Written as `global_asm!`, following
//! this crate's own convention of keeping raw boot/context assembly as
//! inline `global_asm!` blocks rather than separate `.S` files.

core::arch::global_asm!(
    r#"
    .section .text.boot, "ax"
    .global _start
_start:
    // Only the primary CPU (affinity 0) proceeds; this kernel is single-core.
    mrs x0, mpidr_el1
    and x0, x0, #0xff
    cbz x0, 1f
park:
    wfe
    b park
1:
    msr daifset, #0xf
    ldr x0, =__stack_top
    mov sp, x0
    bl uart_init

    mrs x0, CurrentEL
    lsr x0, x0, #2
    cmp x0, #3
    b.eq from_el3
    cmp x0, #2
    b.eq from_el2
    b el1_entry

from_el3:
    // Non-secure, EL1 is AArch64, no FP/SIMD trapping to EL3.
    mov x0, #0x000008
    orr x0, x0, #0x000001     // SCR_EL3.NS
    orr x0, x0, #0x000400     // SCR_EL3.RW (EL2 is AArch64)
    msr scr_el3, x0
    mov x0, #0x33ff
    msr cptr_el3, x0
    adr x0, from_el2
    msr elr_el3, x0
    mov x0, #0x3c5            // EL2h, D/A/I/F masked
    msr spsr_el3, x0
    eret

from_el2:
    mrs x0, CurrentEL
    lsr x0, x0, #2
    cmp x0, #2
    b.ne el1_entry
    mov x0, #(1 << 31)        // HCR_EL2.RW: EL1 is AArch64
    msr hcr_el2, x0
    adr x0, el1_entry
    msr elr_el2, x0
    mov x0, #0x3c5            // EL1h, D/A/I/F masked
    msr spsr_el2, x0
    eret

el1_entry:
    adr x0, vector_table
    msr vbar_el1, x0
    isb

    ldr x1, =__bss_start
    ldr x2, =__bss_end
    mov x3, #0
2:
    cmp x1, x2
    b.ge 3f
    str x3, [x1], #8
    b 2b
3:
    b stage2_entry

    .section .text.boot.stage2, "ax"
    .global stage2_entry
stage2_entry:
    // Early SCTLR: MMU and alignment-check off, caches on.
    mrs x0, sctlr_el1
    bic x0, x0, #(1 << 0)
    bic x0, x0, #(1 << 1)
    orr x0, x0, #(1 << 2)
    orr x0, x0, #(1 << 12)
    msr sctlr_el1, x0
    isb

    adr x0, vector_table
    msr vbar_el1, x0
    isb

    adr x0, BOOT_INFO_BLOB
    mov x1, #0
    mov x2, #0
    mov x3, #0
    mov x4, #0
    mov x5, #0
    mov x6, #0
    mov x7, #0
    mov x8, #0
    mov x9, #0
    mov x10, #0
    mov x11, #0
    mov x12, #0
    mov x13, #0
    mov x14, #0
    mov x15, #0
    mov x16, #0
    mov x17, #0
    mov x18, #0
    mov x19, #0
    mov x20, #0
    mov x21, #0
    mov x22, #0
    mov x23, #0
    mov x24, #0
    mov x25, #0
    mov x26, #0
    mov x27, #0
    mov x28, #0
    mov x29, #0
    mov x30, #0
    bl kernel_main
halt_forever:
    wfe
    b halt_forever

    .section .data
    .align 3
    .global BOOT_INFO_BLOB
BOOT_INFO_BLOB:
    .quad 0x424F4F54        // magic = "BOOT"
    .quad 0                 // architecture (opaque)
    .quad 0x40000000        // ram_size: 1 GiB, matches platform::qemu_virt
    .quad 0                 // kernel_size: patched by kernel_main from linker symbols
    "#
);
