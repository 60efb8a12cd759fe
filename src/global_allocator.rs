//! Kernel-wide page allocator.
//!
//! The buddy allocator has no locking of its own. This wrapper serialises
//! every call behind an IRQ-safe spin lock so a single instance can live in a
//! `static` and be used from any kernel context.

use crate::buddy::{BuddyPageAllocator, BuddyStats, DEFAULT_MAX_ORDER};
use crate::page::{PageDescriptorTable, PageHandle};
use crate::{AllocError, AllocResult};
use core::sync::atomic::{AtomicBool, Ordering};

use kspin::SpinNoIrq;

#[cfg(feature = "log")]
use log::{error, warn};

/// Global page allocator guarding one [`BuddyPageAllocator`]
pub struct GlobalPageAllocator<D, const MAX_ORDER: usize = DEFAULT_MAX_ORDER> {
    inner: SpinNoIrq<Option<BuddyPageAllocator<D, MAX_ORDER>>>,
    initialized: AtomicBool,
}

impl<D: PageDescriptorTable, const MAX_ORDER: usize> GlobalPageAllocator<D, MAX_ORDER> {
    pub const fn new() -> Self {
        Self {
            inner: SpinNoIrq::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// Install the host descriptor table and seed it with `page_count` pages
    /// from `range_start`. Returns the number of top-order blocks created.
    pub fn init(
        &self,
        pages: D,
        range_start: PageHandle,
        page_count: usize,
    ) -> AllocResult<usize> {
        let mut inner = self.inner.lock();
        if inner.is_some() {
            warn!("global page allocator: already initialised");
            return Err(AllocError::AlreadyInitialized);
        }

        let mut allocator = BuddyPageAllocator::new(pages);
        let blocks = allocator.init(range_start, page_count);
        *inner = Some(allocator);

        self.initialized.store(true, Ordering::SeqCst);
        Ok(blocks)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Run `f` with exclusive access to the underlying allocator.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut BuddyPageAllocator<D, MAX_ORDER>) -> R,
    ) -> AllocResult<R> {
        let mut inner = self.inner.lock();
        match inner.as_mut() {
            Some(allocator) => Ok(f(allocator)),
            None => {
                error!("global page allocator: not initialised");
                Err(AllocError::NotInitialized)
            }
        }
    }

    /// Allocate `2^order` contiguous pages.
    pub fn alloc_pages(&self, order: usize) -> AllocResult<PageHandle> {
        self.with(|allocator| allocator.alloc_pages(order))?
    }

    /// Free a block previously returned by [`alloc_pages`](Self::alloc_pages).
    pub fn free_pages(&self, block: PageHandle, order: usize) {
        let mut inner = self.inner.lock();
        match inner.as_mut() {
            Some(allocator) => allocator.free_pages(block, order),
            None => panic!("buddy: free before initialisation"),
        }
    }

    /// Permanently reserve one page.
    pub fn reserve_page(&self, page: PageHandle) -> AllocResult {
        self.with(|allocator| allocator.reserve_page(page))?
    }

    /// Log the free lists.
    pub fn dump_state(&self) {
        // Nothing to show before init; `with` already logs that case.
        let _ = self.with(|allocator| allocator.dump_state());
    }

    pub fn stats(&self) -> AllocResult<BuddyStats<MAX_ORDER>> {
        self.with(|allocator| allocator.stats())
    }
}

impl<D: PageDescriptorTable, const MAX_ORDER: usize> Default for GlobalPageAllocator<D, MAX_ORDER> {
    fn default() -> Self {
        Self::new()
    }
}
