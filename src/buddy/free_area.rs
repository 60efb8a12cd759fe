//! Free-area table: the core of the buddy system
//!
//! One sorted free list per order. Allocation splits the smallest
//! sufficient block down to the requested order; freeing merges a block with
//! its buddy for as long as the buddy is free.
//!
//! Misuse by the caller (freeing with the wrong order, removing a block that
//! is not free, double frees) panics. Running out of memory and reserving a
//! page that is not free are reported through [`AllocError`].

use core::fmt;

use crate::page::{PageDescriptorTable, PageHandle};
use crate::{AllocError, AllocResult};

#[cfg(feature = "log")]
use log::trace;

#[cfg(feature = "tracking")]
use super::stats::BuddyCounters;
use super::{
    buddy_block::{
        buddy_pfn, is_aligned_for_order, pages_per_block, BuddyBlock, DEFAULT_MAX_ORDER,
    },
    free_list::{FreeList, FreeListIter},
};

/// Per-order free lists for one contiguous range of page descriptors.
pub struct FreeAreaTable<const MAX_ORDER: usize = DEFAULT_MAX_ORDER> {
    free_areas: [FreeList; MAX_ORDER],
    initialized: bool,
    #[cfg(feature = "tracking")]
    counters: BuddyCounters,
}

impl<const MAX_ORDER: usize> FreeAreaTable<MAX_ORDER> {
    /// Create an empty table; call [`init`](Self::init) before use.
    pub const fn new() -> Self {
        Self {
            free_areas: [const { FreeList::new() }; MAX_ORDER],
            initialized: false,
            #[cfg(feature = "tracking")]
            counters: BuddyCounters::new(),
        }
    }

    pub const fn max_order(&self) -> usize {
        MAX_ORDER
    }

    const fn top_order() -> usize {
        MAX_ORDER - 1
    }

    #[cfg(feature = "tracking")]
    pub fn counters(&self) -> &BuddyCounters {
        &self.counters
    }

    #[cfg(feature = "tracking")]
    pub(crate) fn counters_mut(&mut self) -> &mut BuddyCounters {
        &mut self.counters
    }

    fn is_aligned<D: PageDescriptorTable>(pages: &D, page: PageHandle, order: usize) -> bool {
        is_aligned_for_order(pages.pgd_to_pfn(page), order)
    }

    /// Buddy of the order-`order` block at `page`, or `None` if `order` is
    /// out of range or `page` is not aligned for it.
    pub fn buddy_of<D: PageDescriptorTable>(
        &self,
        pages: &D,
        page: PageHandle,
        order: usize,
    ) -> Option<PageHandle> {
        buddy_pfn(pages.pgd_to_pfn(page), order, MAX_ORDER).map(|pfn| pages.pfn_to_pgd(pfn))
    }

    fn expect_buddy<D: PageDescriptorTable>(
        &self,
        pages: &D,
        page: PageHandle,
        order: usize,
    ) -> PageHandle {
        match self.buddy_of(pages, page, order) {
            Some(buddy) => buddy,
            None => panic!(
                "buddy: pfn {:#x} has no buddy at order {}",
                pages.pgd_to_pfn(page),
                order
            ),
        }
    }

    /// Insert a block into the list for `order`, keeping it ascending.
    ///
    /// Returns the entry the block was linked after (`None` for the head).
    pub fn insert_block<D: PageDescriptorTable>(
        &mut self,
        pages: &mut D,
        page: PageHandle,
        order: usize,
    ) -> Option<PageHandle> {
        debug_assert!(
            Self::is_aligned(pages, page, order),
            "buddy: inserting misaligned pfn {:#x} at order {}",
            pages.pgd_to_pfn(page),
            order
        );
        self.free_areas[order].insert_sorted(pages, page)
    }

    /// Remove a block from the list for `order`. Panics if it is not there.
    pub fn remove_block<D: PageDescriptorTable>(
        &mut self,
        pages: &mut D,
        page: PageHandle,
        order: usize,
    ) {
        self.free_areas[order].remove(pages, page);
    }

    /// Split the free block at `page` into two halves of `order - 1`.
    ///
    /// Returns `page`, which now heads the lower half.
    pub fn split_block<D: PageDescriptorTable>(
        &mut self,
        pages: &mut D,
        page: PageHandle,
        order: usize,
    ) -> PageHandle {
        assert!(
            order >= 1 && order < MAX_ORDER,
            "buddy: cannot split a block of order {}",
            order
        );
        assert!(
            Self::is_aligned(pages, page, order),
            "buddy: split of misaligned pfn {:#x} at order {}",
            pages.pgd_to_pfn(page),
            order
        );

        self.remove_block(pages, page, order);

        let new_order = order - 1;
        let upper = self.expect_buddy(pages, page, new_order);
        self.insert_block(pages, page, new_order);
        self.insert_block(pages, upper, new_order);

        #[cfg(feature = "tracking")]
        {
            self.counters.splits += 1;
        }
        trace!(
            "buddy: split pfn {:#x} order {} -> {:#x} + {:#x}",
            pages.pgd_to_pfn(page),
            order,
            pages.pgd_to_pfn(page),
            pages.pgd_to_pfn(upper)
        );
        page
    }

    /// Merge the free block at `page` with its free buddy into `order + 1`.
    ///
    /// Both blocks must be listed at `order`. Returns the merged block, which
    /// starts at the lower of the two.
    pub fn merge_block<D: PageDescriptorTable>(
        &mut self,
        pages: &mut D,
        page: PageHandle,
        order: usize,
    ) -> PageHandle {
        assert!(
            order + 1 < MAX_ORDER,
            "buddy: cannot merge blocks of order {}",
            order
        );

        let buddy = self.expect_buddy(pages, page, order);
        let (left, right) = if page < buddy {
            (page, buddy)
        } else {
            (buddy, page)
        };

        self.remove_block(pages, left, order);
        self.remove_block(pages, right, order);
        self.insert_block(pages, left, order + 1);

        #[cfg(feature = "tracking")]
        {
            self.counters.merges += 1;
        }
        trace!(
            "buddy: merge pfn {:#x} + {:#x} -> order {}",
            pages.pgd_to_pfn(left),
            pages.pgd_to_pfn(right),
            order + 1
        );
        left
    }

    /// Whether the buddy of the listed block at `page` is also free.
    ///
    /// Two free buddies are address-adjacent, so in an ascending list they
    /// are always neighbours. The ordering around `page` is checked before
    /// relying on that.
    pub fn is_buddy_free<D: PageDescriptorTable>(
        &self,
        pages: &D,
        page: PageHandle,
        order: usize,
    ) -> bool {
        let prev = match self.free_areas[order].find(pages, page) {
            Some(prev) => prev,
            None => panic!(
                "buddy: pfn {:#x} is not free at order {}",
                pages.pgd_to_pfn(page),
                order
            ),
        };
        let next = pages.next_free(page);

        assert!(
            prev.map_or(true, |p| p < page) && next.map_or(true, |n| n > page),
            "buddy: free list for order {} is not sorted around pfn {:#x}",
            order,
            pages.pgd_to_pfn(page)
        );

        let buddy = self.expect_buddy(pages, page, order);
        next == Some(buddy) || prev == Some(buddy)
    }

    /// Allocate one block of `order`, splitting a larger block if needed.
    pub fn alloc<D: PageDescriptorTable>(
        &mut self,
        pages: &mut D,
        order: usize,
    ) -> AllocResult<PageHandle> {
        if order >= MAX_ORDER {
            return Err(AllocError::InvalidParam);
        }

        let mut current = (order..MAX_ORDER)
            .find(|&o| !self.free_areas[o].is_empty())
            .ok_or(AllocError::NoMemory)?;
        let block = self.free_areas[current]
            .head()
            .ok_or(AllocError::NoMemory)?;

        // Every list between `order` and `current` is empty, so after each
        // split the lower half is the head of the next list down.
        while current > order {
            self.split_block(pages, block, current);
            current -= 1;
        }

        self.remove_block(pages, block, order);
        Ok(block)
    }

    /// Return a block of `order` and coalesce it with free buddies.
    ///
    /// Returns the block and order it finally settled at.
    pub fn free<D: PageDescriptorTable>(
        &mut self,
        pages: &mut D,
        page: PageHandle,
        order: usize,
    ) -> (PageHandle, usize) {
        assert!(
            order < MAX_ORDER,
            "buddy: free at order {} exceeds maximum order {}",
            order,
            Self::top_order()
        );
        assert!(
            Self::is_aligned(pages, page, order),
            "buddy: free of pfn {:#x} is misaligned for order {}",
            pages.pgd_to_pfn(page),
            order
        );
        let pfn = pages.pgd_to_pfn(page);
        if let Some(block) = self.find_double_free(pages, pfn, order) {
            panic!(
                "buddy: double free of pfn {:#x} order {} (overlaps free block {:#x} order {})",
                pfn, order, block.pfn, block.order
            );
        }

        let mut block = page;
        let mut order = order;
        self.insert_block(pages, block, order);

        while order < Self::top_order() && self.is_buddy_free(pages, block, order) {
            block = self.merge_block(pages, block, order);
            order += 1;
        }
        (block, order)
    }

    /// Free block sharing a frame with the order-`order` block at `pfn`.
    fn find_double_free<D: PageDescriptorTable>(
        &self,
        pages: &D,
        pfn: usize,
        order: usize,
    ) -> Option<BuddyBlock> {
        // Ancestor check: at each order at or above `order` only the aligned
        // block containing `pfn` can overlap.
        for higher in order..MAX_ORDER {
            let start = pfn & !(pages_per_block(higher) - 1);
            let listed = self.free_areas[higher]
                .iter(pages)
                .map(|head| pages.pgd_to_pfn(head))
                .take_while(|&head| head <= start)
                .any(|head| head == start);
            if listed {
                return Some(BuddyBlock::new(higher, start));
            }
        }

        // Descendant check: smaller free blocks inside the range.
        let end = pfn + pages_per_block(order);
        for lower in 0..order {
            let inside = self.free_areas[lower]
                .iter(pages)
                .map(|head| pages.pgd_to_pfn(head))
                .find(|&head| head >= pfn)
                .filter(|&head| head < end);
            if let Some(head) = inside {
                return Some(BuddyBlock::new(lower, head));
            }
        }
        None
    }

    /// Locate the free block, at any order, whose range contains `pfn`.
    pub fn find_free_block<D: PageDescriptorTable>(
        &self,
        pages: &D,
        pfn: usize,
    ) -> Option<BuddyBlock> {
        self.find_overlapping_block(pages, pfn, 1)
    }

    /// First free block, largest order first, sharing a frame with
    /// `[pfn, pfn + count)`.
    pub fn find_overlapping_block<D: PageDescriptorTable>(
        &self,
        pages: &D,
        pfn: usize,
        count: usize,
    ) -> Option<BuddyBlock> {
        let end = pfn + count;
        for order in (0..MAX_ORDER).rev() {
            for head in self.free_areas[order].iter(pages) {
                let block = BuddyBlock::new(order, pages.pgd_to_pfn(head));
                if block.pfn >= end {
                    break;
                }
                if block.pfn + block.pages() > pfn {
                    return Some(block);
                }
            }
        }
        None
    }

    /// Take the single page `page` out of the free lists for good.
    ///
    /// Splits whichever free block contains it down to order 0. Fails with
    /// [`AllocError::NotFree`] if the page is not currently free.
    pub fn reserve<D: PageDescriptorTable>(
        &mut self,
        pages: &mut D,
        page: PageHandle,
    ) -> AllocResult {
        let pfn = pages.pgd_to_pfn(page);
        let found = self.find_free_block(pages, pfn).ok_or(AllocError::NotFree)?;

        let mut block = pages.pfn_to_pgd(found.pfn);
        let mut order = found.order;
        while order > 0 {
            self.split_block(pages, block, order);
            order -= 1;
            let half = pages_per_block(order);
            if pfn >= pages.pgd_to_pfn(block) + half {
                block = self.expect_buddy(pages, block, order);
            }
        }

        assert!(
            block == page,
            "buddy: reserve of pfn {:#x} isolated pfn {:#x}",
            pfn,
            pages.pgd_to_pfn(block)
        );
        self.remove_block(pages, block, 0);
        Ok(())
    }

    /// Seed the top-order list with as many whole blocks as fit.
    ///
    /// Pages past the last whole top-order block stay untracked. Returns the
    /// number of blocks seeded.
    pub fn init<D: PageDescriptorTable>(
        &mut self,
        pages: &mut D,
        range_start: PageHandle,
        page_count: usize,
    ) -> usize {
        assert!(!self.initialized, "buddy: free-area table initialised twice");
        assert!(
            range_start.index() <= pages.len() && page_count <= pages.len() - range_start.index(),
            "buddy: range of {} pages from handle {} exceeds descriptor table of {} pages",
            page_count,
            range_start.index(),
            pages.len()
        );
        let top = Self::top_order();
        assert!(
            Self::is_aligned(pages, range_start, top),
            "buddy: range start pfn {:#x} is not aligned for order {}",
            pages.pgd_to_pfn(range_start),
            top
        );

        let block_pages = pages_per_block(top);
        let blocks = page_count / block_pages;
        let mut block = range_start;
        for _ in 0..blocks {
            self.insert_block(pages, block, top);
            block = block + block_pages;
        }
        self.initialized = true;
        blocks
    }

    /// Number of free blocks at `order`.
    pub fn block_count(&self, order: usize) -> usize {
        if order < MAX_ORDER {
            self.free_areas[order].len()
        } else {
            0
        }
    }

    /// Number of free blocks at each order.
    pub fn block_counts(&self) -> [usize; MAX_ORDER] {
        core::array::from_fn(|order| self.free_areas[order].len())
    }

    /// Total number of free pages across all orders.
    pub fn free_pages(&self) -> usize {
        (0..MAX_ORDER)
            .map(|order| self.free_areas[order].len() * pages_per_block(order))
            .sum()
    }

    /// Iterate over the free block heads of `order`, lowest first.
    pub fn iter<'a, D: PageDescriptorTable>(
        &self,
        pages: &'a D,
        order: usize,
    ) -> FreeListIter<'a, D> {
        self.free_areas[order].iter(pages)
    }

    /// Displayable view of the list for `order`: its block pfns in hex.
    pub fn display_order<'a, D: PageDescriptorTable>(
        &'a self,
        pages: &'a D,
        order: usize,
    ) -> FreeAreaDisplay<'a, D> {
        FreeAreaDisplay {
            list: &self.free_areas[order],
            pages,
        }
    }

    /// Walk every list and panic on the first broken invariant.
    ///
    /// Checks alignment, strict ordering, list lengths, unmerged buddies and
    /// overlap between free blocks of different orders.
    pub fn check_invariants<D: PageDescriptorTable>(&self, pages: &D) {
        for order in 0..MAX_ORDER {
            let list = &self.free_areas[order];
            let mut prev: Option<PageHandle> = None;
            let mut walked = 0;

            for head in list.iter(pages) {
                let pfn = pages.pgd_to_pfn(head);
                assert!(
                    is_aligned_for_order(pfn, order),
                    "buddy: pfn {:#x} misaligned in order {} list",
                    pfn,
                    order
                );
                if let Some(p) = prev {
                    assert!(
                        p < head,
                        "buddy: order {} list not ascending at pfn {:#x}",
                        order,
                        pfn
                    );
                    if order < Self::top_order() {
                        assert!(
                            self.buddy_of(pages, p, order) != Some(head),
                            "buddy: unmerged buddies {:#x} and {:#x} at order {}",
                            pages.pgd_to_pfn(p),
                            pfn,
                            order
                        );
                    }
                }
                for higher in order + 1..MAX_ORDER {
                    for other in self.free_areas[higher].iter(pages) {
                        let covering = BuddyBlock::new(higher, pages.pgd_to_pfn(other));
                        assert!(
                            !covering.contains(pfn),
                            "buddy: pfn {:#x} order {} overlaps free block {:#x} order {}",
                            pfn,
                            order,
                            covering.pfn,
                            higher
                        );
                    }
                }
                prev = Some(head);
                walked += 1;
            }
            assert_eq!(
                walked,
                list.len(),
                "buddy: order {} list length mismatch",
                order
            );
            if let Some(tail) = prev {
                assert!(
                    pages.next_free(tail).is_none(),
                    "buddy: order {} list tail links onward",
                    order
                );
            }
        }
    }
}

impl<const MAX_ORDER: usize> Default for FreeAreaTable<MAX_ORDER> {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats one free list as space-separated hex frame numbers.
pub struct FreeAreaDisplay<'a, D> {
    list: &'a FreeList,
    pages: &'a D,
}

impl<D: PageDescriptorTable> fmt::Display for FreeAreaDisplay<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for head in self.list.iter(self.pages) {
            write!(f, "{:x} ", self.pages.pgd_to_pfn(head))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{PageDescriptor, PageDescriptorArray};
    use alloc::string::ToString;
    use alloc::vec::Vec;

    type SmallTable = FreeAreaTable<3>;

    fn pfns<const M: usize>(
        table: &FreeAreaTable<M>,
        pages: &PageDescriptorArray,
        order: usize,
    ) -> Vec<usize> {
        table.iter(pages, order).map(|h| pages.pgd_to_pfn(h)).collect()
    }

    #[test]
    fn test_init_seeds_top_order() {
        let mut backing = [PageDescriptor::new(); 10];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();

        assert_eq!(table.init(&mut pages, PageHandle::new(0), 10), 2);
        assert_eq!(pfns(&table, &pages, 2), [0, 4]);
        assert_eq!(table.free_pages(), 8);
        table.check_invariants(&pages);
    }

    #[test]
    fn test_split_and_merge() {
        let mut backing = [PageDescriptor::new(); 4];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 4);

        let left = table.split_block(&mut pages, PageHandle::new(0), 2);
        assert_eq!(left, PageHandle::new(0));
        assert!(pfns(&table, &pages, 2).is_empty());
        assert_eq!(pfns(&table, &pages, 1), [0, 2]);
        assert_eq!(table.free_pages(), 4);

        assert!(table.is_buddy_free(&pages, PageHandle::new(2), 1));
        let merged = table.merge_block(&mut pages, PageHandle::new(2), 1);
        assert_eq!(merged, PageHandle::new(0));
        assert_eq!(pfns(&table, &pages, 2), [0]);
        assert!(pfns(&table, &pages, 1).is_empty());
    }

    #[test]
    fn test_buddy_of() {
        let mut backing = [PageDescriptor::new(); 8];
        let pages = PageDescriptorArray::new(0, &mut backing);
        let table = SmallTable::new();

        assert_eq!(table.buddy_of(&pages, PageHandle::new(4), 1), Some(PageHandle::new(6)));
        assert_eq!(table.buddy_of(&pages, PageHandle::new(6), 1), Some(PageHandle::new(4)));
        assert_eq!(table.buddy_of(&pages, PageHandle::new(6), 2), None);
        assert_eq!(table.buddy_of(&pages, PageHandle::new(0), 3), None);
    }

    #[test]
    fn test_buddy_of_uses_frame_numbers() {
        // Descriptor 0 is frame 8: its buddies are frames 10 and 12.
        let mut backing = [PageDescriptor::new(); 8];
        let pages = PageDescriptorArray::new(8, &mut backing);
        let table = SmallTable::new();

        assert_eq!(table.buddy_of(&pages, PageHandle::new(0), 1), Some(PageHandle::new(2)));
        assert_eq!(table.buddy_of(&pages, PageHandle::new(0), 2), Some(PageHandle::new(4)));
        assert_eq!(table.buddy_of(&pages, PageHandle::new(6), 1), Some(PageHandle::new(4)));
    }

    #[test]
    fn test_is_buddy_free_requires_neighbour() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();

        table.insert_block(&mut pages, PageHandle::new(2), 1);
        table.insert_block(&mut pages, PageHandle::new(4), 1);
        // 2 and 4 are adjacent in the list but belong to different pairs.
        assert!(!table.is_buddy_free(&pages, PageHandle::new(2), 1));
        assert!(!table.is_buddy_free(&pages, PageHandle::new(4), 1));

        table.insert_block(&mut pages, PageHandle::new(6), 1);
        assert!(table.is_buddy_free(&pages, PageHandle::new(4), 1));
        assert!(table.is_buddy_free(&pages, PageHandle::new(6), 1));
    }

    #[test]
    fn test_alloc_splits_smallest_sufficient_block() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 8);

        let first = table.alloc(&mut pages, 0).unwrap();
        assert_eq!(first, PageHandle::new(0));
        assert_eq!(pfns(&table, &pages, 0), [1]);
        assert_eq!(pfns(&table, &pages, 1), [2]);
        assert_eq!(pfns(&table, &pages, 2), [4]);

        // Order 1 is now the smallest sufficient list; order 2 stays whole.
        let second = table.alloc(&mut pages, 1).unwrap();
        assert_eq!(second, PageHandle::new(2));
        assert_eq!(pfns(&table, &pages, 2), [4]);
        table.check_invariants(&pages);
    }

    #[test]
    fn test_alloc_errors() {
        let mut backing = [PageDescriptor::new(); 4];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();

        assert_eq!(table.alloc(&mut pages, 0), Err(AllocError::NoMemory));
        assert_eq!(table.alloc(&mut pages, 3), Err(AllocError::InvalidParam));

        table.init(&mut pages, PageHandle::new(0), 4);
        assert!(table.alloc(&mut pages, 2).is_ok());
        assert_eq!(table.alloc(&mut pages, 0), Err(AllocError::NoMemory));
    }

    #[test]
    fn test_free_cascades_to_top() {
        let mut backing = [PageDescriptor::new(); 4];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 4);

        let a = table.alloc(&mut pages, 0).unwrap();
        let b = table.alloc(&mut pages, 0).unwrap();
        let c = table.alloc(&mut pages, 1).unwrap();
        assert_eq!(table.free_pages(), 0);

        assert_eq!(table.free(&mut pages, b, 0), (b, 0));
        assert_eq!(table.free(&mut pages, a, 0), (a, 1));
        assert_eq!(table.free(&mut pages, c, 1), (PageHandle::new(0), 2));
        assert_eq!(pfns(&table, &pages, 2), [0]);
        table.check_invariants(&pages);
    }

    #[test]
    fn test_reserve_isolates_page() {
        let mut backing = [PageDescriptor::new(); 4];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 4);

        assert_eq!(table.reserve(&mut pages, PageHandle::new(3)), Ok(()));
        assert_eq!(pfns(&table, &pages, 1), [0]);
        assert_eq!(pfns(&table, &pages, 0), [2]);
        assert_eq!(table.free_pages(), 3);
        assert_eq!(
            table.reserve(&mut pages, PageHandle::new(3)),
            Err(AllocError::NotFree)
        );
        table.check_invariants(&pages);
    }

    #[test]
    fn test_find_free_block() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 8);
        table.alloc(&mut pages, 0).unwrap();

        assert_eq!(table.find_free_block(&pages, 0), None);
        assert_eq!(table.find_free_block(&pages, 1), Some(BuddyBlock::new(0, 1)));
        assert_eq!(table.find_free_block(&pages, 3), Some(BuddyBlock::new(1, 2)));
        assert_eq!(table.find_free_block(&pages, 7), Some(BuddyBlock::new(2, 4)));
        assert_eq!(table.find_free_block(&pages, 8), None);
    }

    #[test]
    fn test_display_order() {
        let mut backing = [PageDescriptor::new(); 32];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 32);

        assert_eq!(
            table.display_order(&pages, 2).to_string(),
            "0 4 8 c 10 14 18 1c "
        );
        assert_eq!(table.display_order(&pages, 0).to_string(), "");
    }

    #[test]
    #[should_panic(expected = "misaligned for order")]
    fn test_free_with_wrong_order_panics() {
        let mut backing = [PageDescriptor::new(); 4];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 4);
        table.alloc(&mut pages, 0).unwrap();
        table.alloc(&mut pages, 0).unwrap();

        table.free(&mut pages, PageHandle::new(1), 1);
    }

    #[test]
    #[should_panic(expected = "cannot split")]
    fn test_split_order_zero_panics() {
        let mut backing = [PageDescriptor::new(); 4];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.insert_block(&mut pages, PageHandle::new(0), 0);
        table.split_block(&mut pages, PageHandle::new(0), 0);
    }

    #[test]
    #[should_panic(expected = "is not in this free list")]
    fn test_merge_without_buddy_panics() {
        let mut backing = [PageDescriptor::new(); 4];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.insert_block(&mut pages, PageHandle::new(0), 0);
        table.merge_block(&mut pages, PageHandle::new(0), 0);
    }

    #[test]
    #[should_panic(expected = "initialised twice")]
    fn test_double_init_panics() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 4);
        table.init(&mut pages, PageHandle::new(4), 4);
    }

    #[test]
    #[should_panic(expected = "initialised twice")]
    fn test_reinit_after_exhaustion_panics() {
        let mut backing = [PageDescriptor::new(); 4];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 4);
        table.alloc(&mut pages, 2).unwrap();

        // Every list is empty now, but the block is still owned by a caller.
        table.init(&mut pages, PageHandle::new(0), 4);
    }

    #[test]
    #[should_panic(expected = "initialised twice")]
    fn test_reinit_after_empty_init_panics() {
        let mut backing = [PageDescriptor::new(); 4];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        assert_eq!(table.init(&mut pages, PageHandle::new(0), 3), 0);
        table.init(&mut pages, PageHandle::new(0), 4);
    }

    #[test]
    #[should_panic(expected = "exceeds descriptor table")]
    fn test_init_beyond_descriptor_table_panics() {
        let mut backing = [PageDescriptor::new(); 13];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 16);
    }

    #[test]
    #[should_panic(expected = "exceeds descriptor table")]
    fn test_init_offset_range_beyond_table_panics() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(4), 8);
    }

    #[test]
    fn test_init_fills_whole_table() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        assert_eq!(table.init(&mut pages, PageHandle::new(4), 4), 1);
        assert_eq!(pfns(&table, &pages, 2), [4]);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_free_inside_free_block_panics() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 8);
        table.alloc(&mut pages, 0).unwrap();

        // Page 3 sits inside the free order-1 block at 2.
        table.free(&mut pages, PageHandle::new(3), 0);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_free_covering_free_block_panics() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 8);
        table.alloc(&mut pages, 0).unwrap();

        // Frees 0..4 while pages 1..4 are still listed as free.
        table.free(&mut pages, PageHandle::new(0), 2);
    }

    #[test]
    #[should_panic(expected = "not ascending")]
    fn test_check_invariants_unsorted_list_panics() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.insert_block(&mut pages, PageHandle::new(1), 0);
        table.insert_block(&mut pages, PageHandle::new(3), 0);

        // Relink the list as 1 -> 0.
        pages.set_next_free(PageHandle::new(1), Some(PageHandle::new(0)));
        table.check_invariants(&pages);
    }

    #[test]
    #[should_panic(expected = "unmerged buddies")]
    fn test_check_invariants_unmerged_buddies_panics() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.insert_block(&mut pages, PageHandle::new(4), 1);
        table.insert_block(&mut pages, PageHandle::new(6), 1);
        table.check_invariants(&pages);
    }

    #[test]
    #[should_panic(expected = "overlaps free block")]
    fn test_check_invariants_overlap_panics() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.insert_block(&mut pages, PageHandle::new(0), 2);
        table.insert_block(&mut pages, PageHandle::new(2), 1);
        table.check_invariants(&pages);
    }

    #[test]
    #[should_panic(expected = "not sorted around")]
    fn test_is_buddy_free_unsorted_list_panics() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(0, &mut backing);
        let mut table = SmallTable::new();
        table.insert_block(&mut pages, PageHandle::new(1), 0);
        table.insert_block(&mut pages, PageHandle::new(3), 0);

        pages.set_next_free(PageHandle::new(1), Some(PageHandle::new(0)));
        table.is_buddy_free(&pages, PageHandle::new(1), 0);
    }

    #[test]
    #[should_panic(expected = "not aligned for order")]
    fn test_init_misaligned_start_panics() {
        let mut backing = [PageDescriptor::new(); 8];
        let mut pages = PageDescriptorArray::new(1, &mut backing);
        let mut table = SmallTable::new();
        table.init(&mut pages, PageHandle::new(0), 8);
    }
}
