//! Task record, the circular task list, and the high-level half of the
//! `ERET` dispatch primitive (spec.md §4.7). The circular list is kept as
//! an arena of optional `Task`s plus `next`/`prev` indices rather than raw
//! pointers (spec.md §9, "Pointer-cycles → arena + indices").

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};
use spin::Mutex;

use crate::arch::aarch64::context;
use crate::arch::aarch64::trap::InterruptFrame;
use crate::lib::error::KError;

pub type TaskIdx = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    New,
    Ready,
    Running,
    Blocked,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// 280-byte register image: `x0..x30` at 0..240, `sp` at 248, `pc` at 256,
/// `spsr_el1` at 264, `elr_el1` at 272 (spec.md §6). The first 248 bytes
/// match `InterruptFrame`'s `x`/`sp` region, so `task_save_state` is a
/// field-by-field copy rather than a reinterpreting memcpy.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TaskRegisters {
    pub x: [u64; 31],
    pub sp: u64,
    pub pc: u64,
    pub spsr_el1: u64,
    pub elr_el1: u64,
}

const _: () = assert!(core::mem::size_of::<TaskRegisters>() == 280);
const _: () = assert!(core::mem::offset_of!(TaskRegisters, x) == 0);
const _: () = assert!(core::mem::offset_of!(TaskRegisters, sp) == 248);
const _: () = assert!(core::mem::offset_of!(TaskRegisters, pc) == 256);
const _: () = assert!(core::mem::offset_of!(TaskRegisters, spsr_el1) == 264);
const _: () = assert!(core::mem::offset_of!(TaskRegisters, elr_el1) == 272);

impl TaskRegisters {
    pub const fn zeroed() -> Self {
        Self { x: [0; 31], sp: 0, pc: 0, spsr_el1: 0, elr_el1: 0 }
    }
}

pub struct Task {
    pub id: u32,
    pub state: TaskState,
    pub priority: Priority,
    pub registers: TaskRegisters,
    pub process: Option<usize>,
    pub next: TaskIdx,
    pub prev: TaskIdx,
}

static NEXT_ID: AtomicU32 = AtomicU32::new(1);
static TASKS: Mutex<Vec<Option<Task>>> = Mutex::new(Vec::new());
static TASK_LIST_HEAD: Mutex<Option<TaskIdx>> = Mutex::new(None);
static CURRENT_TASK: Mutex<Option<TaskIdx>> = Mutex::new(None);

/// Allocates a task record, assigns a monotonic id, and splices it into
/// the circular list: as the singleton, or after the current tail.
pub fn task_new(priority: Priority) -> TaskIdx {
    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    let mut tasks = TASKS.lock();
    let idx = tasks.len();

    let mut task = Task {
        id,
        state: TaskState::New,
        priority,
        registers: TaskRegisters::zeroed(),
        process: None,
        next: idx,
        prev: idx,
    };

    let mut head = TASK_LIST_HEAD.lock();
    match *head {
        None => *head = Some(idx),
        Some(h) => {
            let tail = tasks[h].as_ref().unwrap().prev;
            task.next = h;
            task.prev = tail;
            tasks[tail].as_mut().unwrap().next = idx;
            tasks[h].as_mut().unwrap().prev = idx;
        }
    }

    tasks.push(Some(task));
    idx
}

pub fn set_state(idx: TaskIdx, state: TaskState) {
    if let Some(task) = TASKS.lock()[idx].as_mut() {
        task.state = state;
    }
}

pub fn state(idx: TaskIdx) -> Option<TaskState> {
    TASKS.lock().get(idx).and_then(|t| t.as_ref()).map(|t| t.state)
}

pub fn set_process(idx: TaskIdx, process: usize) {
    if let Some(task) = TASKS.lock()[idx].as_mut() {
        task.process = Some(process);
    }
}

pub fn set_registers(idx: TaskIdx, registers: TaskRegisters) {
    if let Some(task) = TASKS.lock()[idx].as_mut() {
        task.registers = registers;
    }
}

pub fn current_task() -> Option<TaskIdx> {
    *CURRENT_TASK.lock()
}

pub fn next_of(idx: TaskIdx) -> Option<TaskIdx> {
    TASKS.lock().get(idx).and_then(|t| t.as_ref()).map(|t| t.next)
}

pub fn process_of(idx: TaskIdx) -> Option<usize> {
    TASKS.lock().get(idx).and_then(|t| t.as_ref()).and_then(|t| t.process)
}

/// Copies `x0..x30`, `sp`, `elr_el1`→`pc`, and `spsr_el1` out of the frame
/// into `task.registers`. The sole authoritative save path for
/// interrupt-driven preemption (spec.md §4.7).
pub fn task_save_state(idx: TaskIdx, frame: &InterruptFrame) {
    if let Some(task) = TASKS.lock()[idx].as_mut() {
        task.registers.x = frame.x;
        task.registers.sp = frame.sp;
        task.registers.pc = frame.elr_el1;
        task.registers.spsr_el1 = frame.spsr_el1;
        task.registers.elr_el1 = frame.elr_el1;
    }
}

/// The dispatch primitive (spec.md §4.7 steps 1-2, then the asm in
/// `arch::aarch64::context` for steps 3-7). Never returns on success — the
/// asm call diverges into `ERET`.
pub fn task_restore_context(idx: TaskIdx) -> Result<(), KError> {
    let regs = {
        let mut tasks = TASKS.lock();
        let task = tasks.get_mut(idx).and_then(|t| t.as_mut()).ok_or(KError::Fault)?;
        if task.registers.sp == 0 || task.registers.pc == 0 {
            return Err(KError::Fault);
        }
        task.state = TaskState::Running;
        task.registers
    };
    *CURRENT_TASK.lock() = Some(idx);
    unsafe { context::task_restore_context_asm(&regs) }
}

pub fn task_block(idx: TaskIdx) {
    set_state(idx, TaskState::Blocked);
}

pub fn task_unblock(idx: TaskIdx) {
    set_state(idx, TaskState::Ready);
}

pub fn task_return(idx: TaskIdx) {
    set_state(idx, TaskState::Finished);
    let mut cur = CURRENT_TASK.lock();
    if *cur == Some(idx) {
        *cur = None;
    }
}

/// Unlinks a FINISHED task from the circular list and releases its arena
/// slot. The list head moves on if the freed task was the head; becomes
/// empty if it was the last task.
pub fn task_free(idx: TaskIdx) {
    let mut tasks = TASKS.lock();
    let Some(task) = tasks[idx].take() else { return };

    let mut head = TASK_LIST_HEAD.lock();
    if task.next == idx {
        *head = None;
    } else {
        if let Some(next) = tasks[task.next].as_mut() {
            next.prev = task.prev;
        }
        if let Some(prev) = tasks[task.prev].as_mut() {
            prev.next = task.next;
        }
        if *head == Some(idx) {
            *head = Some(task.next);
        }
    }
}

/// Walks forward from `start` (inclusive) looking for a READY task,
/// wrapping once around the circular list (spec.md §9, "advance from the
/// current position ... until it finds a READY task").
pub fn next_ready_from(start: TaskIdx) -> Option<TaskIdx> {
    let tasks = TASKS.lock();
    if tasks.is_empty() {
        return None;
    }
    let mut idx = start;
    for _ in 0..tasks.len() {
        if let Some(task) = tasks[idx].as_ref() {
            if task.state == TaskState::Ready {
                return Some(idx);
            }
            idx = task.next;
        } else {
            return None;
        }
    }
    None
}

/// The task list head, for `scheduler_start`'s first walk.
pub fn list_head() -> Option<TaskIdx> {
    *TASK_LIST_HEAD.lock()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_offsets_match_layout() {
        assert_eq!(core::mem::size_of::<TaskRegisters>(), 280);
    }

    #[test]
    fn zeroed_registers_fail_validation() {
        let r = TaskRegisters::zeroed();
        assert_eq!(r.sp, 0);
        assert_eq!(r.pc, 0);
    }
}
