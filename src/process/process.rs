//! Process record, process table, and the heap-backed memory model bound
//! to each process (spec.md §4.8). Grounded on this crate's process-table
//! shape, rebuilt around `kmalloc`/`kfree`-backed allocation slots instead
//! of page-table-mapped address spaces — there is no MMU in this kernel.

use alloc::boxed::Box;
use lazy_static::lazy_static;
use spin::Mutex;

use crate::heap;
use crate::lib::error::KError;

use super::scheduler;
use super::task::{self, Priority, TaskIdx, TaskState};

pub const MAX_PROCESSES: usize = 64;
pub const MAX_ALLOCATIONS: usize = 128;
pub const STACK_SIZE: usize = 128 * 1024;

/// `EL1h`, D/A masked, I/F clear — matches the mode word spec.md §9 notes
/// this implementation uses for every task, kernel or user.
const TASK_SPSR_EL1H: u64 = 0x305;

#[derive(Debug, Clone, Copy)]
pub struct ProcessAllocation {
    pub ptr: usize,
    pub size: usize,
}

impl ProcessAllocation {
    const fn empty() -> Self {
        Self { ptr: 0, size: 0 }
    }
}

pub struct Process {
    pub id: u16,
    pub name: [u8; 64],
    pub name_len: usize,
    pub task: Option<TaskIdx>,
    pub allocations: [ProcessAllocation; MAX_ALLOCATIONS],
    pub code_ptr: usize,
    pub code_size: usize,
    pub stack_base: usize,
    pub argc: usize,
    pub argv: usize,
}

impl Process {
    fn new(id: u16, name: &str) -> Self {
        let mut name_buf = [0u8; 64];
        let bytes = name.as_bytes();
        let n = bytes.len().min(64);
        name_buf[..n].copy_from_slice(&bytes[..n]);
        Self {
            id,
            name: name_buf,
            name_len: n,
            task: None,
            allocations: [ProcessAllocation::empty(); MAX_ALLOCATIONS],
            code_ptr: 0,
            code_size: 0,
            stack_base: 0,
            argc: 0,
            argv: 0,
        }
    }
}

lazy_static! {
    static ref PROCESS_TABLE: Mutex<[Option<Box<Process>>; MAX_PROCESSES]> =
        Mutex::new(core::array::from_fn(|_| None));
}

fn malloc_into(process: &mut Process, size: usize) -> Result<usize, KError> {
    let slot = process
        .allocations
        .iter()
        .position(|a| a.ptr == 0)
        .ok_or(KError::ProcessMax)?;
    let ptr = heap::kmalloc(size);
    if ptr.is_null() {
        return Err(KError::NoMemory);
    }
    process.allocations[slot] = ProcessAllocation { ptr: ptr as usize, size };
    Ok(ptr as usize)
}

fn free_in(process: &mut Process, ptr: usize) -> Result<(), KError> {
    let slot = process
        .allocations
        .iter()
        .position(|a| a.ptr == ptr)
        .ok_or(KError::NotFound)?;
    heap::kfree(process.allocations[slot].ptr as *mut u8);
    process.allocations[slot] = ProcessAllocation::empty();
    Ok(())
}

/// Finds a free table slot, builds the Process record, allocates its stack
/// and a heap copy of `code`, flushes the instruction cache over it, and
/// creates its main task READY to run at `code`'s first byte (spec.md
/// §4.8). Any step failing after the stack allocation frees what was
/// already taken before returning the error.
pub fn process_create(name: &str, priority: Priority, code: &[u8]) -> Result<usize, KError> {
    let mut table = PROCESS_TABLE.lock();
    let slot = table.iter().position(|p| p.is_none()).ok_or(KError::ProcessMax)?;

    let mut process = Process::new(slot as u16, name);

    let stack_ptr = malloc_into(&mut process, STACK_SIZE)?;
    process.stack_base = stack_ptr;

    let code_len = code.len().max(1);
    let code_ptr = match malloc_into(&mut process, code_len) {
        Ok(p) => p,
        Err(e) => {
            let _ = free_in(&mut process, stack_ptr);
            return Err(e);
        }
    };
    unsafe {
        core::ptr::copy_nonoverlapping(code.as_ptr(), code_ptr as *mut u8, code.len());
    }
    process.code_ptr = code_ptr;
    process.code_size = code.len();
    process_memory_flush_icache(code_ptr, code.len());

    let task_idx = task::task_new(priority);
    let mut regs = task::TaskRegisters::zeroed();
    regs.pc = code_ptr as u64;
    regs.elr_el1 = code_ptr as u64;
    regs.sp = ((stack_ptr + STACK_SIZE) as u64) & !15;
    regs.x[30] = process_return_handler as usize as u64;
    regs.spsr_el1 = TASK_SPSR_EL1H;

    task::set_registers(task_idx, regs);
    task::set_process(task_idx, slot);
    task::set_state(task_idx, TaskState::Ready);
    process.task = Some(task_idx);

    table[slot] = Some(Box::new(process));
    Ok(slot)
}

/// A user task falling off the end of its entry point is a bug in this
/// design — there is no return-to-kernel convention for it. Halt loudly
/// rather than run off into whatever `x30` happened to contain.
extern "C" fn process_return_handler() -> ! {
    crate::lib::panic::halt_with_message(format_args!(
        "process task returned past its entry point"
    ));
}

pub fn process_malloc(pid: usize, size: usize) -> Result<usize, KError> {
    let mut table = PROCESS_TABLE.lock();
    let process = table.get_mut(pid).and_then(|p| p.as_mut()).ok_or(KError::NotFound)?;
    malloc_into(process, size)
}

pub fn process_free(pid: usize, ptr: usize) -> Result<(), KError> {
    let mut table = PROCESS_TABLE.lock();
    let process = table.get_mut(pid).and_then(|p| p.as_mut()).ok_or(KError::NotFound)?;
    free_in(process, ptr)
}

/// True iff `[addr, addr+size)` lies entirely within the process's stack,
/// program code, or one allocation slot — the sole substitute for
/// MMU-based isolation (spec.md §4.8).
pub fn process_memory_verify(pid: usize, addr: usize, size: usize) -> bool {
    let table = PROCESS_TABLE.lock();
    let Some(process) = table.get(pid).and_then(|p| p.as_ref()) else {
        return false;
    };
    let end = match addr.checked_add(size) {
        Some(e) => e,
        None => return false,
    };

    let in_range = |base: usize, len: usize| len > 0 && addr >= base && end <= base + len;

    if in_range(process.stack_base, STACK_SIZE) {
        return true;
    }
    if in_range(process.code_ptr, process.code_size) {
        return true;
    }
    process.allocations.iter().any(|a| in_range(a.ptr, a.size))
}

pub fn get_args(pid: usize) -> Option<(usize, usize)> {
    let table = PROCESS_TABLE.lock();
    table.get(pid).and_then(|p| p.as_ref()).map(|p| (p.argc, p.argv))
}

/// `DC CIVAC` (clean+invalidate to PoC) then `IC IVAU` (invalidate to PoU)
/// over the range in 64-byte cache-line strides, with the barriers the
/// architecture requires between the two (spec.md §4.8, §5).
pub fn process_memory_flush_icache(addr: usize, size: usize) {
    if size == 0 {
        return;
    }
    const LINE: usize = 64;
    let start = addr & !(LINE - 1);
    let end = (addr + size + LINE - 1) & !(LINE - 1);

    unsafe {
        let mut a = start;
        while a < end {
            core::arch::asm!("dc civac, {x}", x = in(reg) a);
            a += LINE;
        }
        core::arch::asm!("dsb ish");

        let mut a = start;
        while a < end {
            core::arch::asm!("ic ivau, {x}", x = in(reg) a);
            a += LINE;
        }
        core::arch::asm!("isb");
    }
}

/// Frees every allocation slot, the argv array, the task, and the table
/// slot, in that order. If `pid` is the currently-scheduled process, the
/// scheduler's `current_process` is invalidated so the next tick picks a
/// new one (spec.md §4.8).
pub fn process_terminate(pid: usize) -> Result<(), KError> {
    let mut table = PROCESS_TABLE.lock();
    let mut process = table.get_mut(pid).and_then(|p| p.take()).ok_or(KError::NotFound)?;

    for slot in process.allocations.iter_mut() {
        if slot.ptr != 0 {
            heap::kfree(slot.ptr as *mut u8);
            *slot = ProcessAllocation::empty();
        }
    }

    if process.argv != 0 {
        let entries = process.argv as *const u64;
        for i in 0..process.argc {
            let entry = unsafe { core::ptr::read(entries.add(i)) };
            if entry != 0 {
                heap::kfree(entry as *mut u8);
            }
        }
        heap::kfree(process.argv as *mut u8);
        process.argv = 0;
    }

    if let Some(task_idx) = process.task.take() {
        task::task_return(task_idx);
        task::task_free(task_idx);
    }

    drop(process);
    scheduler::invalidate_if_current(pid);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_verify_rejects_out_of_range() {
        let mut process = Process::new(0, "test");
        process.stack_base = 0x1000;
        process.code_ptr = 0x5000;
        process.code_size = 0x200;
        process.allocations[0] = ProcessAllocation { ptr: 0x9000, size: 0x40 };

        let in_range = |base: usize, len: usize, addr: usize, size: usize| {
            len > 0 && addr >= base && addr + size <= base + len
        };
        assert!(in_range(process.code_ptr, process.code_size, 0x5010, 0x10));
        assert!(!in_range(process.code_ptr, process.code_size, 0x5010, 0x1000));
    }

    #[test]
    fn allocation_slot_starts_empty() {
        let a = ProcessAllocation::empty();
        assert_eq!(a.ptr, 0);
    }
}
