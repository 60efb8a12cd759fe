//! Sorted free list threaded through page descriptors
//!
//! Each list keeps only its head and length. The links live in the
//! descriptors' `next_free` field, so the descriptor table is passed to every
//! operation instead of being owned by the list.

#[cfg(feature = "log")]
use log::error;

use crate::page::{PageDescriptorTable, PageHandle};

/// Singly-linked list of free block heads, ascending by handle.
pub struct FreeList {
    head: Option<PageHandle>,
    len: usize,
}

impl FreeList {
    /// Create a new empty free list
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub fn head(&self) -> Option<PageHandle> {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Insert `page` keeping the list ascending.
    ///
    /// Returns the insertion point: the entry now linking to `page`, or
    /// `None` if `page` became the head. Inserting a page that is already
    /// listed is a contract violation.
    pub fn insert_sorted<D: PageDescriptorTable>(
        &mut self,
        pages: &mut D,
        page: PageHandle,
    ) -> Option<PageHandle> {
        let mut prev = None;
        let mut current = self.head;
        let mut visited = 0;

        while let Some(entry) = current {
            assert!(visited <= self.len, "buddy: cycle detected during insert");
            assert!(
                entry != page,
                "buddy: page {:?} is already in this free list",
                page
            );
            if entry > page {
                break;
            }
            prev = current;
            current = pages.next_free(entry);
            visited += 1;
        }

        pages.set_next_free(page, current);
        match prev {
            Some(p) => pages.set_next_free(p, Some(page)),
            None => self.head = Some(page),
        }
        self.len += 1;
        prev
    }

    /// Locate `page`, returning its predecessor (`Some(None)` for the head).
    ///
    /// Returns `None` if `page` is not listed. The walk stops early because
    /// the list is sorted.
    pub fn find<D: PageDescriptorTable>(
        &self,
        pages: &D,
        page: PageHandle,
    ) -> Option<Option<PageHandle>> {
        let mut prev = None;
        let mut current = self.head;
        let mut visited = 0;

        while let Some(entry) = current {
            if visited > self.len {
                error!("buddy: cycle detected during search");
                return None;
            }
            if entry == page {
                return Some(prev);
            }
            if entry > page {
                break;
            }
            prev = current;
            current = pages.next_free(entry);
            visited += 1;
        }
        None
    }

    pub fn contains<D: PageDescriptorTable>(&self, pages: &D, page: PageHandle) -> bool {
        self.find(pages, page).is_some()
    }

    /// Unlink `page` and clear its next-free link.
    ///
    /// The page must be listed; removing anything else means the caller's
    /// view of the free lists is wrong, so this panics.
    pub fn remove<D: PageDescriptorTable>(&mut self, pages: &mut D, page: PageHandle) {
        let prev = match self.find(pages, page) {
            Some(prev) => prev,
            None => panic!("buddy: page {:?} is not in this free list", page),
        };
        self.unlink(pages, page, prev);
    }

    /// Remove and return the lowest block, if any.
    pub fn pop_front<D: PageDescriptorTable>(&mut self, pages: &mut D) -> Option<PageHandle> {
        let head = self.head?;
        self.unlink(pages, head, None);
        Some(head)
    }

    fn unlink<D: PageDescriptorTable>(
        &mut self,
        pages: &mut D,
        page: PageHandle,
        prev: Option<PageHandle>,
    ) {
        let next = pages.next_free(page);
        match prev {
            Some(p) => pages.set_next_free(p, next),
            None => self.head = next,
        }
        pages.set_next_free(page, None);
        self.len -= 1;
    }

    /// Iterate over listed block heads in ascending order.
    pub fn iter<'a, D: PageDescriptorTable>(&self, pages: &'a D) -> FreeListIter<'a, D> {
        FreeListIter {
            pages,
            current: self.head,
            remaining: self.len,
        }
    }
}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator for FreeList
pub struct FreeListIter<'a, D> {
    pages: &'a D,
    current: Option<PageHandle>,
    remaining: usize,
}

impl<D: PageDescriptorTable> Iterator for FreeListIter<'_, D> {
    type Item = PageHandle;

    fn next(&mut self) -> Option<Self::Item> {
        // A corrupted link must not turn the walk into an infinite loop.
        if self.remaining == 0 {
            return None;
        }
        let entry = self.current?;
        self.current = self.pages.next_free(entry);
        self.remaining -= 1;
        Some(entry)
    }
}
