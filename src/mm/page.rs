//! Bitmap + per-frame info-byte physical page allocator (spec.md §4.3).
//!
//! `bitmap[⌈total/64⌉]` tracks one bit per 4 KiB frame (1 = allocated);
//! `info[total]` carries a flags byte per frame. Both arrays live on the
//! kernel heap, sized once at `page_init` and never resized.

use alloc::vec;
use alloc::vec::Vec;
use bitflags::bitflags;
use spin::Mutex;

use crate::lib::error::KError;

pub const FRAME_SIZE: usize = 4096;
pub const MAX_FRAMES: usize = 4_194_304;
const FIRST_RESERVED_FRAMES: usize = 64;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        const FREE      = 0x00;
        const RESERVED  = 0x01;
        const ALLOCATED = 0x02;
        const KERNEL    = 0x04;
        const ZEROED    = 0x08;
    }
}

struct PageAllocator {
    bitmap: Vec<u64>,
    info: Vec<u8>,
    total: usize,
    free_pages: usize,
    ram_base: usize,
}

static ALLOCATOR: Mutex<Option<PageAllocator>> = Mutex::new(None);

fn bit_is_set(bitmap: &[u64], idx: usize) -> bool {
    (bitmap[idx / 64] >> (idx % 64)) & 1 != 0
}

fn set_bit(bitmap: &mut [u64], idx: usize) {
    bitmap[idx / 64] |= 1 << (idx % 64);
}

fn clear_bit(bitmap: &mut [u64], idx: usize) {
    bitmap[idx / 64] &= !(1 << (idx % 64));
}

fn find_clear_bit(bitmap: &[u64], total: usize) -> Option<usize> {
    (0..total).find(|&i| !bit_is_set(bitmap, i))
}

fn find_clear_run(bitmap: &[u64], total: usize, count: usize) -> Option<usize> {
    if count == 0 || count > total {
        return None;
    }
    let mut run_start = 0usize;
    let mut run_len = 0usize;
    for i in 0..total {
        if bit_is_set(bitmap, i) {
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

impl PageAllocator {
    fn reserve(&mut self, idx: usize) {
        if idx >= self.total || bit_is_set(&self.bitmap, idx) {
            return;
        }
        set_bit(&mut self.bitmap, idx);
        self.info[idx] = (PageFlags::ALLOCATED | PageFlags::KERNEL).bits();
        self.free_pages -= 1;
    }

    fn reserve_range(&mut self, start_addr: usize, len: usize) {
        if len == 0 {
            return;
        }
        let start = (start_addr.saturating_sub(self.ram_base)) / FRAME_SIZE;
        let end = (start_addr + len - self.ram_base + FRAME_SIZE - 1) / FRAME_SIZE;
        for idx in start..end {
            self.reserve(idx);
        }
    }
}

/// Computes `total`, allocates `bitmap`/`info` from the kernel heap, zeros
/// both, then reserves the first 64 frames plus whatever frames the two
/// arrays themselves occupy (spec.md §4.3). `kernel_start`/`kernel_end` are
/// accepted for parity with the boot-time call site and logged; the image
/// itself lives inside the first-64-frame reservation on this platform.
pub fn page_init(ram_size: u64, kernel_start: usize, kernel_end: usize) {
    let total = ((ram_size / FRAME_SIZE as u64) as usize).min(MAX_FRAMES);
    let bitmap_words = (total + 63) / 64;

    let bitmap = vec![0u64; bitmap_words];
    let info = vec![0u8; total];

    let ram_base = crate::platform::active().ram().start;

    let mut alloc = PageAllocator { bitmap, info, total, free_pages: total, ram_base };

    for idx in 0..FIRST_RESERVED_FRAMES.min(total) {
        alloc.reserve(idx);
    }

    let bitmap_addr = alloc.bitmap.as_ptr() as usize;
    let bitmap_len = alloc.bitmap.len() * core::mem::size_of::<u64>();
    alloc.reserve_range(bitmap_addr, bitmap_len);

    let info_addr = alloc.info.as_ptr() as usize;
    let info_len = alloc.info.len();
    alloc.reserve_range(info_addr, info_len);

    crate::info!(
        "page allocator: {} frames, {} reserved, kernel [{:#x}, {:#x})",
        total,
        total - alloc.free_pages,
        kernel_start,
        kernel_end
    );

    *ALLOCATOR.lock() = Some(alloc);
}

/// Finds the first clear bit, marks it allocated, optionally zeroes the
/// frame, and returns its physical address. `None` if the allocator has no
/// free frame.
pub fn page_alloc(flags: PageFlags) -> Option<usize> {
    let mut guard = ALLOCATOR.lock();
    let alloc = guard.as_mut()?;
    let idx = find_clear_bit(&alloc.bitmap, alloc.total)?;
    set_bit(&mut alloc.bitmap, idx);
    alloc.info[idx] = (PageFlags::ALLOCATED | flags).bits();
    alloc.free_pages -= 1;

    let addr = alloc.ram_base + idx * FRAME_SIZE;
    if flags.contains(PageFlags::ZEROED) {
        unsafe { core::ptr::write_bytes(addr as *mut u8, 0, FRAME_SIZE) };
    }
    Some(addr)
}

/// Finds the first run of `count` clear bits, marks all of them allocated,
/// and returns the run's physical base address.
pub fn page_alloc_contiguous(count: usize, flags: PageFlags) -> Option<usize> {
    let mut guard = ALLOCATOR.lock();
    let alloc = guard.as_mut()?;
    let start = find_clear_run(&alloc.bitmap, alloc.total, count)?;
    for idx in start..start + count {
        set_bit(&mut alloc.bitmap, idx);
        alloc.info[idx] = (PageFlags::ALLOCATED | flags).bits();
    }
    alloc.free_pages -= count;

    let addr = alloc.ram_base + start * FRAME_SIZE;
    if flags.contains(PageFlags::ZEROED) {
        unsafe { core::ptr::write_bytes(addr as *mut u8, 0, FRAME_SIZE * count) };
    }
    Some(addr)
}

/// Clears the bit for `addr`'s frame. Freeing an already-free frame is an
/// error (spec.md §4.3).
pub fn page_free(addr: usize) -> Result<(), KError> {
    let mut guard = ALLOCATOR.lock();
    let alloc = guard.as_mut().ok_or(KError::Invalid)?;
    let idx = (addr - alloc.ram_base) / FRAME_SIZE;
    if idx >= alloc.total || !bit_is_set(&alloc.bitmap, idx) {
        return Err(KError::InvalidArgument);
    }
    clear_bit(&mut alloc.bitmap, idx);
    alloc.info[idx] = PageFlags::FREE.bits();
    alloc.free_pages += 1;
    Ok(())
}

pub fn page_free_contiguous(addr: usize, count: usize) -> Result<(), KError> {
    for i in 0..count {
        page_free(addr + i * FRAME_SIZE)?;
    }
    Ok(())
}

pub fn free_pages() -> usize {
    ALLOCATOR.lock().as_ref().map(|a| a.free_pages).unwrap_or(0)
}

pub fn total_pages() -> usize {
    ALLOCATOR.lock().as_ref().map(|a| a.total).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_bit_scan_finds_first_free() {
        let mut bitmap = [0u64; 2];
        set_bit(&mut bitmap, 0);
        set_bit(&mut bitmap, 1);
        assert_eq!(find_clear_bit(&bitmap, 128), Some(2));
    }

    #[test]
    fn set_then_clear_round_trips() {
        let mut bitmap = [0u64; 1];
        set_bit(&mut bitmap, 10);
        assert!(bit_is_set(&bitmap, 10));
        clear_bit(&mut bitmap, 10);
        assert!(!bit_is_set(&bitmap, 10));
    }

    #[test]
    fn finds_contiguous_run_after_fragmentation() {
        let mut bitmap = [0u64; 1];
        set_bit(&mut bitmap, 3);
        // free run of 3 starting at 0, then a gap at 3, then free again.
        assert_eq!(find_clear_run(&bitmap, 64, 3), Some(0));
        set_bit(&mut bitmap, 0);
        set_bit(&mut bitmap, 1);
        set_bit(&mut bitmap, 2);
        assert_eq!(find_clear_run(&bitmap, 64, 3), Some(4));
    }

    #[test]
    fn run_larger_than_total_fails() {
        let bitmap = [0u64; 1];
        assert_eq!(find_clear_run(&bitmap, 64, 65), None);
    }
}
