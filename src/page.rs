//! Page descriptors owned by the host kernel
//!
//! The buddy allocator never owns memory. It threads the host's page
//! descriptors into free lists through a single `next_free` link per
//! descriptor, and relies on the host to translate between a descriptor
//! handle and its physical frame number.

use core::ops::{Add, Sub};

/// Opaque handle to one page descriptor.
///
/// Handles are totally ordered in the same order as the frames they
/// describe, and support arithmetic by page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageHandle(usize);

impl PageHandle {
    /// Create a handle from a descriptor index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Index of the descriptor within the host's table.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl Add<usize> for PageHandle {
    type Output = PageHandle;

    fn add(self, pages: usize) -> PageHandle {
        PageHandle(self.0 + pages)
    }
}

impl Sub<usize> for PageHandle {
    type Output = PageHandle;

    fn sub(self, pages: usize) -> PageHandle {
        PageHandle(self.0 - pages)
    }
}

/// Per-page metadata the allocator is allowed to touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageDescriptor {
    /// Next free block in the same order, valid only while this page heads
    /// a free block.
    pub next_free: Option<PageHandle>,
}

impl PageDescriptor {
    pub const fn new() -> Self {
        Self { next_free: None }
    }
}

/// Host-side page descriptor storage and frame-number translation.
///
/// `pgd_to_pfn` and `pfn_to_pgd` must be inverse over the valid range and
/// preserve ordering.
pub trait PageDescriptorTable {
    /// Number of descriptors in the table.
    fn len(&self) -> usize;

    /// Whether the table has no descriptors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physical frame number described by `page`.
    fn pgd_to_pfn(&self, page: PageHandle) -> usize;

    /// Descriptor handle for physical frame `pfn`.
    fn pfn_to_pgd(&self, pfn: usize) -> PageHandle;

    /// Read the next-free link of `page`.
    fn next_free(&self, page: PageHandle) -> Option<PageHandle>;

    /// Overwrite the next-free link of `page`.
    fn set_next_free(&mut self, page: PageHandle, next: Option<PageHandle>);
}

/// Descriptor table backed by a contiguous slice, starting at `base_pfn`.
pub struct PageDescriptorArray<'a> {
    base_pfn: usize,
    descriptors: &'a mut [PageDescriptor],
}

impl<'a> PageDescriptorArray<'a> {
    /// Wrap `descriptors`, where `descriptors[0]` describes frame `base_pfn`.
    pub fn new(base_pfn: usize, descriptors: &'a mut [PageDescriptor]) -> Self {
        for pgd in descriptors.iter_mut() {
            *pgd = PageDescriptor::new();
        }
        Self {
            base_pfn,
            descriptors,
        }
    }

    /// Frame number of the first descriptor.
    pub fn base_pfn(&self) -> usize {
        self.base_pfn
    }

    /// Handle of the first descriptor.
    pub fn first(&self) -> PageHandle {
        PageHandle(0)
    }

    fn descriptor(&self, page: PageHandle) -> &PageDescriptor {
        match self.descriptors.get(page.0) {
            Some(pgd) => pgd,
            None => panic!(
                "buddy: page handle {} outside descriptor table of {} pages",
                page.0,
                self.descriptors.len()
            ),
        }
    }
}

impl PageDescriptorTable for PageDescriptorArray<'_> {
    fn len(&self) -> usize {
        self.descriptors.len()
    }

    fn pgd_to_pfn(&self, page: PageHandle) -> usize {
        self.base_pfn + page.0
    }

    fn pfn_to_pgd(&self, pfn: usize) -> PageHandle {
        assert!(
            pfn >= self.base_pfn,
            "buddy: pfn {:#x} below descriptor table base {:#x}",
            pfn,
            self.base_pfn
        );
        PageHandle(pfn - self.base_pfn)
    }

    fn next_free(&self, page: PageHandle) -> Option<PageHandle> {
        self.descriptor(page).next_free
    }

    fn set_next_free(&mut self, page: PageHandle, next: Option<PageHandle>) {
        let len = self.descriptors.len();
        match self.descriptors.get_mut(page.0) {
            Some(pgd) => pgd.next_free = next,
            None => panic!(
                "buddy: page handle {} outside descriptor table of {} pages",
                page.0, len
            ),
        }
    }
}
