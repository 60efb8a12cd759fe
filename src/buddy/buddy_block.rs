//! Buddy block metadata
//!
//! Block sizes, alignment checks and buddy address arithmetic. All of it is
//! expressed in page-frame numbers; handle translation lives in the free-area
//! table.

use core::cmp::PartialOrd;

/// Default number of orders: blocks of 2^0 up to 2^16 pages.
pub const DEFAULT_MAX_ORDER: usize = 17;

/// Number of pages in a block of the given order.
#[inline]
pub const fn pages_per_block(order: usize) -> usize {
    1 << order
}

/// Whether frame `pfn` can start a block of the given order.
#[inline]
pub const fn is_aligned_for_order(pfn: usize, order: usize) -> bool {
    crate::is_aligned(pfn, pages_per_block(order))
}

/// Frame number of the buddy of the order-`order` block starting at `pfn`.
///
/// The buddy is the other half of the order-`order + 1` block containing
/// `pfn`. Returns `None` if `order >= max_order` or `pfn` is not aligned for
/// `order`.
#[inline]
pub const fn buddy_pfn(pfn: usize, order: usize, max_order: usize) -> Option<usize> {
    if order >= max_order || !is_aligned_for_order(pfn, order) {
        return None;
    }
    if is_aligned_for_order(pfn, order + 1) {
        Some(pfn + pages_per_block(order))
    } else {
        Some(pfn - pages_per_block(order))
    }
}

/// A free block, as reported by list iteration and dumps.
#[derive(Debug, Clone, Copy)]
pub struct BuddyBlock {
    pub order: usize,
    pub pfn: usize,
}

impl BuddyBlock {
    pub const fn new(order: usize, pfn: usize) -> Self {
        Self { order, pfn }
    }

    /// Number of pages covered by this block.
    pub const fn pages(&self) -> usize {
        pages_per_block(self.order)
    }

    /// Whether frame `pfn` lies inside this block.
    pub const fn contains(&self, pfn: usize) -> bool {
        pfn >= self.pfn && pfn < self.pfn + self.pages()
    }
}

impl PartialOrd for BuddyBlock {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        (self.pfn, self.order).partial_cmp(&(other.pfn, other.order))
    }
}

impl PartialEq for BuddyBlock {
    fn eq(&self, other: &Self) -> bool {
        self.pfn == other.pfn && self.order == other.order
    }
}

impl Eq for BuddyBlock {}
