//! Buddy Page Allocator
//!
//! This crate implements the physical page allocator of a kernel using the
//! buddy algorithm, featuring:
//! - Per-order free lists kept sorted by frame number
//! - Cascading split on allocation and cascading merge on free
//! - Permanent reservation of individual pages
//! - An IRQ-safe global wrapper for kernel-wide use
//!
//! Page descriptors are owned by the host kernel and reached through
//! [`PageDescriptorTable`].

#![no_std]

#[cfg(test)]
extern crate alloc;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

use core::fmt;

/// The error type used for allocation.
///
/// Only recoverable outcomes are reported here. Caller bugs such as freeing
/// with the wrong order panic instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Invalid parameter (e.g. an order beyond the largest block).
    InvalidParam,
    /// No free block large enough.
    NoMemory,
    /// The page is not free (already allocated, reserved, or untracked).
    NotFree,
    /// The allocator has not been initialised.
    NotInitialized,
    /// The allocator was already initialised.
    AlreadyInitialized,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AllocError::InvalidParam => "invalid parameter",
            AllocError::NoMemory => "out of memory",
            AllocError::NotFree => "page is not free",
            AllocError::NotInitialized => "allocator not initialised",
            AllocError::AlreadyInitialized => "allocator already initialised",
        };
        f.write_str(msg)
    }
}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// A page allocation algorithm the kernel can select by name.
pub trait PageAllocatorAlgorithm {
    /// Stable name used to select the algorithm at boot.
    fn name(&self) -> &'static str;

    /// Hand `page_count` pages starting at `range_start` to the allocator.
    fn init(&mut self, range_start: PageHandle, page_count: usize) -> usize;

    /// Allocate `2^order` contiguous pages.
    fn alloc_pages(&mut self, order: usize) -> AllocResult<PageHandle>;

    /// Free `2^order` contiguous pages starting at `block`.
    fn free_pages(&mut self, block: PageHandle, order: usize);

    /// Prevent `page` from ever being allocated.
    fn reserve_page(&mut self, page: PageHandle) -> AllocResult;

    /// Log the allocator's internal state.
    fn dump_state(&self);
}

/// Checks whether the address has the demanded alignment.
///
/// Equivalent to `addr % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(base_addr: usize, align: usize) -> bool {
    base_addr & (align - 1) == 0
}

pub mod page;
pub use page::{PageDescriptor, PageDescriptorArray, PageDescriptorTable, PageHandle};

// Export our allocator implementations
pub mod buddy;
#[cfg(feature = "tracking")]
pub use buddy::BuddyCounters;
pub use buddy::{BuddyPageAllocator, BuddyStats, FreeAreaTable, DEFAULT_MAX_ORDER};

pub mod global_allocator;
pub use global_allocator::GlobalPageAllocator;
