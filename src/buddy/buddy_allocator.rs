//! Buddy page allocator over a host descriptor table
//!
//! Owns the host's page descriptor table and the free-area table built on
//! top of it, and exposes the page-allocator operations the kernel drives:
//! `init`, `alloc_pages`, `free_pages`, `reserve_page` and `dump_state`.

use crate::page::{PageDescriptorTable, PageHandle};
use crate::{AllocError, AllocResult, PageAllocatorAlgorithm};

#[cfg(feature = "log")]
use log::{debug, info};

use super::{
    buddy_block::{pages_per_block, DEFAULT_MAX_ORDER},
    free_area::FreeAreaTable,
    stats::BuddyStats,
};

#[cfg(feature = "tracking")]
use super::stats::{BuddyCounters, MemoryStatsReporter};

/// Name the allocator registers under.
pub const BUDDY_ALLOCATOR_NAME: &str = "buddy";

/// Buddy page allocator
///
/// Not internally synchronised: every mutating operation takes `&mut self`.
/// Wrap it in [`GlobalPageAllocator`](crate::GlobalPageAllocator) to share it
/// across the kernel.
pub struct BuddyPageAllocator<D, const MAX_ORDER: usize = DEFAULT_MAX_ORDER> {
    pages: D,
    free_areas: FreeAreaTable<MAX_ORDER>,
    total_pages: usize,
    initialized: bool,
}

impl<D: PageDescriptorTable, const MAX_ORDER: usize> BuddyPageAllocator<D, MAX_ORDER> {
    /// Create an allocator over `pages` with every free list empty.
    pub fn new(pages: D) -> Self {
        Self {
            pages,
            free_areas: FreeAreaTable::new(),
            total_pages: 0,
            initialized: false,
        }
    }

    /// Seed the allocator with `page_count` pages starting at `range_start`.
    ///
    /// Returns the number of top-order blocks created. Pages that do not
    /// fill a whole top-order block are never handed out.
    pub fn init(&mut self, range_start: PageHandle, page_count: usize) -> usize {
        assert!(!self.initialized, "buddy: allocator initialised twice");

        debug!(
            "buddy allocator: initialising pfn={:#x}, nr={:#x}",
            self.pages.pgd_to_pfn(range_start),
            page_count
        );

        let blocks = self
            .free_areas
            .init(&mut self.pages, range_start, page_count);
        self.total_pages = blocks * pages_per_block(MAX_ORDER - 1);
        self.initialized = true;

        let untracked = page_count - self.total_pages;
        if untracked > 0 {
            info!(
                "buddy allocator: {} trailing pages do not fill an order-{} block and stay unused",
                untracked,
                MAX_ORDER - 1
            );
        }
        info!(
            "buddy allocator: {} blocks of order {} ({} pages) ready",
            blocks,
            MAX_ORDER - 1,
            self.total_pages
        );
        blocks
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Allocate `2^order` contiguous pages.
    pub fn alloc_pages(&mut self, order: usize) -> AllocResult<PageHandle> {
        if !self.initialized {
            return Err(AllocError::NotInitialized);
        }

        match self.free_areas.alloc(&mut self.pages, order) {
            Ok(block) => {
                #[cfg(feature = "tracking")]
                {
                    self.free_areas.counters_mut().allocs += 1;
                }
                Ok(block)
            }
            Err(e) => {
                #[cfg(feature = "tracking")]
                {
                    self.free_areas.counters_mut().failed_allocs += 1;
                }
                debug!("buddy allocator: allocation of order {} failed: {}", order, e);
                if e == AllocError::NoMemory {
                    self.print_alloc_failure_stats(order);
                }
                Err(e)
            }
        }
    }

    /// Give back a block obtained from [`alloc_pages`](Self::alloc_pages)
    /// with the same `order`.
    pub fn free_pages(&mut self, block: PageHandle, order: usize) {
        assert!(self.initialized, "buddy: free before initialisation");
        self.free_areas.free(&mut self.pages, block, order);
        #[cfg(feature = "tracking")]
        {
            self.free_areas.counters_mut().frees += 1;
        }
    }

    /// Permanently withdraw one page from allocation.
    ///
    /// Fails with [`AllocError::NotFree`] if the page is already allocated or
    /// reserved, or lies outside the seeded range.
    pub fn reserve_page(&mut self, page: PageHandle) -> AllocResult {
        if !self.initialized {
            return Err(AllocError::NotInitialized);
        }

        match self.free_areas.reserve(&mut self.pages, page) {
            Ok(()) => {
                #[cfg(feature = "tracking")]
                {
                    self.free_areas.counters_mut().reservations += 1;
                }
                Ok(())
            }
            Err(e) => {
                debug!(
                    "buddy allocator: cannot reserve pfn {:#x}: {}",
                    self.pages.pgd_to_pfn(page),
                    e
                );
                Err(e)
            }
        }
    }

    /// Log the contents of every free list, one line per order.
    pub fn dump_state(&self) {
        debug!("BUDDY STATE:");
        for order in 0..MAX_ORDER {
            debug!(
                "[{}] {}",
                order,
                self.free_areas.display_order(&self.pages, order)
            );
        }
    }

    /// Snapshot of free and used pages.
    pub fn stats(&self) -> BuddyStats<MAX_ORDER> {
        BuddyStats::from_block_counts(self.total_pages, self.free_areas.block_counts())
    }

    #[cfg(feature = "tracking")]
    pub fn counters(&self) -> BuddyCounters {
        *self.free_areas.counters()
    }

    /// Pages seeded by `init`.
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Pages currently sitting in free lists.
    pub fn free_page_count(&self) -> usize {
        self.free_areas.free_pages()
    }

    /// Starting frame numbers of the free blocks of `order`, lowest first.
    pub fn free_blocks(&self, order: usize) -> impl Iterator<Item = usize> + '_ {
        self.free_areas
            .iter(&self.pages, order)
            .map(move |page| self.pages.pgd_to_pfn(page))
    }

    /// Panic if any free-list invariant is broken.
    pub fn check_invariants(&self) {
        self.free_areas.check_invariants(&self.pages);
    }

    /// The host descriptor table.
    pub fn pages(&self) -> &D {
        &self.pages
    }

    #[cfg(feature = "tracking")]
    fn print_alloc_failure_stats(&self, order: usize) {
        MemoryStatsReporter::print_alloc_failure_stats(&self.stats(), order);
    }

    #[cfg(not(feature = "tracking"))]
    fn print_alloc_failure_stats(&self, _order: usize) {
        // No-op when tracking is disabled
    }
}

impl<D: PageDescriptorTable, const MAX_ORDER: usize> PageAllocatorAlgorithm
    for BuddyPageAllocator<D, MAX_ORDER>
{
    fn name(&self) -> &'static str {
        BUDDY_ALLOCATOR_NAME
    }

    fn init(&mut self, range_start: PageHandle, page_count: usize) -> usize {
        BuddyPageAllocator::init(self, range_start, page_count)
    }

    fn alloc_pages(&mut self, order: usize) -> AllocResult<PageHandle> {
        BuddyPageAllocator::alloc_pages(self, order)
    }

    fn free_pages(&mut self, block: PageHandle, order: usize) {
        BuddyPageAllocator::free_pages(self, block, order)
    }

    fn reserve_page(&mut self, page: PageHandle) -> AllocResult {
        BuddyPageAllocator::reserve_page(self, page)
    }

    fn dump_state(&self) {
        BuddyPageAllocator::dump_state(self)
    }
}
