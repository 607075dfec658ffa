//! AArch64-specific kernel core: boot, vector table, trap dispatch, context
//! switch, GIC-v2, and the generic timer (spec.md §4.1-§4.7).

pub mod boot;
pub mod context;
pub mod gic;
pub mod timer;
pub mod trap;
pub mod vectors;

pub use trap::InterruptFrame;
