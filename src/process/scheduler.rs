//! Timer-driven round-robin scheduler (spec.md §4.9). On tick, saves the
//! preempted task, flips it RUNNING→READY, and advances from its position
//! in the circular task list until a READY task is found — a faithful
//! round-robin rather than the teacher's original "lowest-indexed READY
//! process" scan (spec.md §9, "Scheduler selection policy").

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::arch::aarch64::timer;
use crate::arch::aarch64::trap::InterruptFrame;
use crate::lib::error::KError;

use super::task::{self, TaskState};

pub const SCHEDULER_TICKS_MS: u64 = 10;

static RUNNING: AtomicBool = AtomicBool::new(false);
const NO_PROCESS: usize = usize::MAX;
static CURRENT_PROCESS: AtomicUsize = AtomicUsize::new(NO_PROCESS);

pub fn current_process() -> Option<usize> {
    match CURRENT_PROCESS.load(Ordering::SeqCst) {
        NO_PROCESS => None,
        p => Some(p),
    }
}

pub fn set_current_process(pid: usize) {
    CURRENT_PROCESS.store(pid, Ordering::SeqCst);
}

pub fn invalidate_if_current(pid: usize) {
    let _ = CURRENT_PROCESS.compare_exchange(pid, NO_PROCESS, Ordering::SeqCst, Ordering::SeqCst);
}

pub fn is_running() -> bool {
    RUNNING.load(Ordering::SeqCst)
}

/// Brings up the timer, subscribes the tick handler, and sets the 10 ms
/// interval. Does not enable the timer or unmask IRQs — `scheduler_start`
/// does that.
pub fn scheduler_init() {
    timer::timer_init();
    timer::timer_set_subscriber(scheduler_timer_handler);
    timer::timer_set_interval(SCHEDULER_TICKS_MS);
}

/// Enables the timer and IRQs, marks the scheduler running, then dispatches
/// the first READY task found by walking the circular list once. Rolls
/// back timer/IRQ state and returns `-ENOTASK` if none is READY.
pub fn scheduler_start() -> Result<(), KError> {
    timer::timer_enable();
    RUNNING.store(true, Ordering::SeqCst);

    let first = task::list_head().and_then(task::next_ready_from);
    match first {
        Some(idx) => {
            if let Some(pid) = task::process_of(idx) {
                set_current_process(pid);
            }
            task::task_restore_context(idx)
        }
        None => {
            timer::timer_disable();
            RUNNING.store(false, Ordering::SeqCst);
            Err(KError::NoTask)
        }
    }
}

/// The timer's registered subscriber. If the scheduler isn't running,
/// no-ops (EOK). Otherwise saves the preempted task, advances to the next
/// READY task in the circular list (wrapping back to the same task if it
/// is the only one READY), and dispatches it.
fn scheduler_timer_handler(frame: &mut InterruptFrame) -> i32 {
    if !RUNNING.load(Ordering::SeqCst) {
        return 0;
    }

    let mut search_start = task::list_head();

    if let Some(cur) = task::current_task() {
        task::task_save_state(cur, frame);
        task::set_state(cur, TaskState::Ready);
        if let Some(next) = task::next_of(cur) {
            search_start = Some(next);
        }
    }

    match search_start.and_then(task::next_ready_from) {
        Some(idx) => {
            if let Some(pid) = task::process_of(idx) {
                set_current_process(pid);
            }
            // Diverges into ERET on success; falling through means the
            // frame's owning task vanished between save and select, which
            // cannot happen under the single-writer-at-exception-entry
            // invariant this scheduler relies on.
            let _ = task::task_restore_context(idx);
            0
        }
        None => 0,
    }
}

pub fn scheduler_stop() {
    timer::timer_disable();
    RUNNING.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_round_trips() {
        set_current_process(3);
        assert_eq!(current_process(), Some(3));
        invalidate_if_current(3);
        assert_eq!(current_process(), None);
    }

    #[test]
    fn invalidate_ignores_mismatched_pid() {
        set_current_process(3);
        invalidate_if_current(4);
        assert_eq!(current_process(), Some(3));
    }
}
