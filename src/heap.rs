//! Fixed-4-KiB-block kernel heap with a one-byte-per-block table (spec.md
//! §4.4), wired in as the crate's `#[global_allocator]`. Grounded on this
//! crate's own heap module, replacing its `linked_list_allocator`-backed
//! byte-granular design with the block-table scheme spec.md fixes.

use bitflags::bitflags;
use core::alloc::{GlobalAlloc, Layout};
use spin::Mutex;

pub const BLOCK_SIZE: usize = 4096;
const MIN_HEAP: u64 = 4 * 1024 * 1024;
const MAX_HEAP: u64 = 256 * 1024 * 1024;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct BlockFlags: u8 {
        const FREE     = 0x00;
        const TAKEN    = 0x01;
        const IS_FIRST = 0x40;
        const HAS_NEXT = 0x80;
    }
}

struct HeapInner {
    table: *mut u8,
    total_blocks: usize,
    saddr: usize,
    allocation_failures: u64,
}

unsafe impl Send for HeapInner {}

static HEAP: Mutex<Option<HeapInner>> = Mutex::new(None);

fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}

fn clamp_u64(v: u64, lo: u64, hi: u64) -> u64 {
    v.max(lo).min(hi)
}

fn find_free_run(table: &[u8], count: usize) -> Option<usize> {
    if count == 0 || count > table.len() {
        return None;
    }
    let mut run_start = 0usize;
    let mut run_len = 0usize;
    for (i, &entry) in table.iter().enumerate() {
        if entry & BlockFlags::TAKEN.bits() != 0 {
            run_len = 0;
            run_start = i + 1;
        } else {
            run_len += 1;
            if run_len == count {
                return Some(run_start);
            }
        }
    }
    None
}

extern "C" {
    static _end: u8;
}

/// Places the block table immediately after the kernel image, the heap
/// region immediately after the table, both 4 KiB-aligned, and fills the
/// table with `FREE` (spec.md §4.4).
pub fn kheap_init(ram_size: u64) {
    let target = (clamp_u64(ram_size / 5, MIN_HEAP, MAX_HEAP) as usize) & !(BLOCK_SIZE - 1);
    let total_blocks = target / BLOCK_SIZE;

    let kernel_end = unsafe { &_end as *const u8 as usize };
    let table_addr = align_up(kernel_end, BLOCK_SIZE);
    let heap_start = align_up(table_addr + total_blocks, BLOCK_SIZE);

    unsafe {
        core::ptr::write_bytes(table_addr as *mut u8, BlockFlags::FREE.bits(), total_blocks);
    }

    *HEAP.lock() = Some(HeapInner {
        table: table_addr as *mut u8,
        total_blocks,
        saddr: heap_start,
        allocation_failures: 0,
    });

    crate::info!(
        "kernel heap: {} blocks ({} bytes) at {:#x}, table at {:#x}",
        total_blocks,
        target,
        heap_start,
        table_addr
    );
}

/// First-fit allocation over contiguous `FREE` blocks. Returns null if no
/// run of the required size fits.
pub fn kmalloc(size: usize) -> *mut u8 {
    if size == 0 {
        return core::ptr::null_mut();
    }
    let n = (size + BLOCK_SIZE - 1) / BLOCK_SIZE;

    let mut guard = HEAP.lock();
    let Some(inner) = guard.as_mut() else {
        return core::ptr::null_mut();
    };
    let table = unsafe { core::slice::from_raw_parts_mut(inner.table, inner.total_blocks) };

    match find_free_run(table, n) {
        Some(start) => {
            for i in 0..n {
                let mut flags = BlockFlags::TAKEN;
                if i == 0 {
                    flags |= BlockFlags::IS_FIRST;
                }
                if i < n - 1 {
                    flags |= BlockFlags::HAS_NEXT;
                }
                table[start + i] = flags.bits();
            }
            (inner.saddr + start * BLOCK_SIZE) as *mut u8
        }
        None => {
            inner.allocation_failures += 1;
            core::ptr::null_mut()
        }
    }
}

/// Walks forward from `ptr`'s block clearing entries while `HAS_NEXT` is
/// set, clearing the terminal entry too. Double-free is silently tolerated
/// (spec.md §4.4); `ptr` must have come from `kmalloc`.
pub fn kfree(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    let mut guard = HEAP.lock();
    let Some(inner) = guard.as_mut() else {
        return;
    };
    let addr = ptr as usize;
    if addr < inner.saddr {
        return;
    }
    let idx = (addr - inner.saddr) / BLOCK_SIZE;
    if idx >= inner.total_blocks {
        return;
    }
    let table = unsafe { core::slice::from_raw_parts_mut(inner.table, inner.total_blocks) };

    let mut i = idx;
    loop {
        let has_next = table[i] & BlockFlags::HAS_NEXT.bits() != 0;
        table[i] = BlockFlags::FREE.bits();
        if !has_next || i + 1 >= inner.total_blocks {
            break;
        }
        i += 1;
    }
}

pub struct HeapStats {
    pub blocks_used: usize,
    pub blocks_total: usize,
    pub allocation_failures: u64,
}

pub fn stats() -> HeapStats {
    let guard = HEAP.lock();
    match guard.as_ref() {
        Some(inner) => {
            let table = unsafe { core::slice::from_raw_parts(inner.table, inner.total_blocks) };
            let used = table.iter().filter(|&&b| b & BlockFlags::TAKEN.bits() != 0).count();
            HeapStats {
                blocks_used: used,
                blocks_total: inner.total_blocks,
                allocation_failures: inner.allocation_failures,
            }
        }
        None => HeapStats { blocks_used: 0, blocks_total: 0, allocation_failures: 0 },
    }
}

struct KernelHeapAllocator;

unsafe impl GlobalAlloc for KernelHeapAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        kmalloc(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        kfree(ptr);
    }
}

#[global_allocator]
static GLOBAL_ALLOCATOR: KernelHeapAllocator = KernelHeapAllocator;

#[alloc_error_handler]
fn alloc_error(layout: Layout) -> ! {
    crate::lib::panic::halt_with_message(format_args!(
        "kernel heap allocation failure: {} bytes, align {}",
        layout.size(),
        layout.align()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fit_run_search() {
        let table = [0u8, 0, BlockFlags::TAKEN.bits(), 0, 0];
        assert_eq!(find_free_run(&table, 2), Some(0));
        assert_eq!(find_free_run(&table, 3), Some(3));
    }

    #[test]
    fn run_search_skips_taken_blocks() {
        let table = [BlockFlags::TAKEN.bits(), BlockFlags::TAKEN.bits(), 0, 0, 0];
        assert_eq!(find_free_run(&table, 3), Some(2));
    }

    #[test]
    fn run_larger_than_table_fails() {
        let table = [0u8; 4];
        assert_eq!(find_free_run(&table, 5), None);
    }

    #[test]
    fn clamp_respects_bounds() {
        assert_eq!(clamp_u64(1, 10, 100), 10);
        assert_eq!(clamp_u64(1000, 10, 100), 100);
        assert_eq!(clamp_u64(50, 10, 100), 50);
    }
}
