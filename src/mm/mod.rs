//! Physical memory management: the bitmap + info frame allocator (spec.md
//! §4.3). Grounded on this crate's own `mm/page.rs`, narrowed from its
//! buddy/paging/VMA/fault-handling scope down to the fixed-frame-size
//! bitmap allocator spec.md fixes — there is no MMU-backed virtual memory
//! in this kernel.

pub mod page;

pub use page::{
    page_alloc, page_alloc_contiguous, page_free, page_free_contiguous, page_init, PageFlags,
};
