//! Statistics and debugging for buddy allocator
//!
//! Provides free-list snapshots, optional operation counters and failure
//! reporting.

#[cfg(feature = "log")]
use log::error;

use super::buddy_block::{pages_per_block, DEFAULT_MAX_ORDER};

/// Buddy system statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuddyStats<const MAX_ORDER: usize = DEFAULT_MAX_ORDER> {
    pub total_pages: usize,
    pub free_pages: usize,
    pub used_pages: usize,
    pub free_blocks_by_order: [usize; MAX_ORDER],
}

impl<const MAX_ORDER: usize> Default for BuddyStats<MAX_ORDER> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_ORDER: usize> BuddyStats<MAX_ORDER> {
    pub const fn new() -> Self {
        Self {
            total_pages: 0,
            free_pages: 0,
            used_pages: 0,
            free_blocks_by_order: [0; MAX_ORDER],
        }
    }

    /// Build a snapshot from per-order free block counts.
    pub fn from_block_counts(total_pages: usize, free_blocks_by_order: [usize; MAX_ORDER]) -> Self {
        let free_pages = free_blocks_by_order
            .iter()
            .enumerate()
            .map(|(order, &count)| count * pages_per_block(order))
            .sum::<usize>();
        Self {
            total_pages,
            free_pages,
            used_pages: total_pages.saturating_sub(free_pages),
            free_blocks_by_order,
        }
    }
}

/// Cumulative operation counters, kept only with the `tracking` feature.
#[cfg(feature = "tracking")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuddyCounters {
    pub allocs: usize,
    pub failed_allocs: usize,
    pub frees: usize,
    pub reservations: usize,
    pub splits: usize,
    pub merges: usize,
}

#[cfg(feature = "tracking")]
impl BuddyCounters {
    pub const fn new() -> Self {
        Self {
            allocs: 0,
            failed_allocs: 0,
            frees: 0,
            reservations: 0,
            splits: 0,
            merges: 0,
        }
    }
}

/// Detailed memory statistics reporter
pub struct MemoryStatsReporter;

impl MemoryStatsReporter {
    /// Print why an allocation of the given order could not be satisfied.
    #[allow(unused_variables)]
    pub fn print_alloc_failure_stats<const MAX_ORDER: usize>(
        stats: &BuddyStats<MAX_ORDER>,
        request_order: usize,
    ) {
        error!("========================================");
        error!(
            "Request: order {} ({} pages)",
            request_order,
            pages_per_block(request_order)
        );
        error!("  Total pages: {}", stats.total_pages);
        error!("  Free pages: {}", stats.free_pages);
        error!("  Used pages: {}", stats.used_pages);
        error!("  Free blocks by order:");
        for order in (0..MAX_ORDER).rev() {
            let count = stats.free_blocks_by_order[order];
            if count > 0 {
                error!(
                    "    Order {}: {} blocks ({} pages total)",
                    order,
                    count,
                    count * pages_per_block(order)
                );
            }
        }
        error!("========================================");
    }
}
