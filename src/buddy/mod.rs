//! Buddy page allocator module
//!
//! This module provides the buddy system:
//! - Sorted free lists threaded through page descriptors
//! - Cascading split on allocation and merge on free
//! - Statistics, invariant checking and state dumps

pub mod buddy_allocator;
pub mod buddy_block;
pub mod free_area;
pub mod free_list;
pub mod stats;

pub use buddy_allocator::{BuddyPageAllocator, BUDDY_ALLOCATOR_NAME};
pub use buddy_block::{
    buddy_pfn, is_aligned_for_order, pages_per_block, BuddyBlock, DEFAULT_MAX_ORDER,
};
pub use free_area::FreeAreaTable;
pub use free_list::FreeList;
#[cfg(feature = "tracking")]
pub use stats::BuddyCounters;
pub use stats::{BuddyStats, MemoryStatsReporter};
