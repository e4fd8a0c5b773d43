//! Page record of the simulated page table.
//!
//! This module provides [`Page`], the unit of address space bookkeeping. A page owns
//! its 4KB of content together with the attributes `VirtualQuery` reports for it.

use crate::{
    memory::protection::{MemoryState, PageProtection, RegionType},
    Error, Result,
};

/// Standard page size (4KB).
pub const PAGE_SIZE: usize = 4096;

/// Aligns `address` down to the start of its page.
#[must_use]
pub fn align_down(address: u64) -> u64 {
    address & !(PAGE_SIZE as u64 - 1)
}

/// A single page of simulated virtual memory.
///
/// Pages are only ever stored in a [`MemorySpace`](super::MemorySpace) in the
/// reserved or committed state; a page that is not in the table is free.
///
/// # Example
///
/// ```rust
/// use ntsim::memory::{MemoryState, Page, PageProtection};
///
/// let mut page = Page::zeroed(0x10000);
/// page.commit(PageProtection::READWRITE);
/// page.write(16, b"abcd")?;
///
/// let mut buf = [0u8; 4];
/// page.read(16, &mut buf)?;
/// assert_eq!(&buf, b"abcd");
/// assert_eq!(page.state(), MemoryState::Commit);
/// # Ok::<(), ntsim::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Page {
    /// Page-aligned base address.
    base: u64,
    /// Page content.
    data: Box<[u8; PAGE_SIZE]>,
    /// Allocation state.
    state: MemoryState,
    /// Current protection.
    protect: PageProtection,
    /// Region type reported by queries.
    kind: RegionType,
}

impl Page {
    /// Creates a zero-filled, reserved, no-access private page at `base`.
    ///
    /// `base` is aligned down if it is not already page aligned.
    #[must_use]
    pub fn zeroed(base: u64) -> Self {
        Self {
            base: align_down(base),
            data: Box::new([0u8; PAGE_SIZE]),
            state: MemoryState::Reserve,
            protect: PageProtection::NOACCESS,
            kind: RegionType::Private,
        }
    }

    /// Returns the base address of the page.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Returns the allocation state.
    #[must_use]
    pub fn state(&self) -> MemoryState {
        self.state
    }

    /// Returns the current protection.
    #[must_use]
    pub fn protection(&self) -> PageProtection {
        self.protect
    }

    /// Returns the region type.
    #[must_use]
    pub fn kind(&self) -> RegionType {
        self.kind
    }

    /// Returns the page content regardless of state or protection.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..]
    }

    /// Marks the page committed with the given protection. Content is kept.
    pub fn commit(&mut self, protect: PageProtection) {
        self.state = MemoryState::Commit;
        self.protect = protect;
    }

    /// Demotes the page to reserved. Protection is left as is.
    pub fn decommit(&mut self) {
        self.state = MemoryState::Reserve;
    }

    /// Replaces the protection and returns the previous one.
    pub fn set_protection(&mut self, protect: PageProtection) -> PageProtection {
        std::mem::replace(&mut self.protect, protect)
    }

    /// Returns `true` if the page is committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state == MemoryState::Commit
    }

    /// Returns `true` if a read would observe the page content.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.is_committed() && self.protect.is_accessible()
    }

    /// Returns `true` if the page accepts writes.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.is_committed() && self.protect.is_writable()
    }

    /// Copies `buf.len()` bytes starting at `offset` out of the page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the range leaves the page.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let end = offset.checked_add(buf.len()).ok_or(Error::OutOfBounds)?;
        if end > PAGE_SIZE {
            return Err(Error::OutOfBounds);
        }

        buf.copy_from_slice(&self.data[offset..end]);
        Ok(())
    }

    /// Copies `data` into the page starting at `offset`.
    ///
    /// Protection is not checked here; callers decide whether the page may be written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the range leaves the page.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len()).ok_or(Error::OutOfBounds)?;
        if end > PAGE_SIZE {
            return Err(Error::OutOfBounds);
        }

        self.data[offset..end].copy_from_slice(data);
        Ok(())
    }
}
