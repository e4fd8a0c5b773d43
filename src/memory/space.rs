//! Per-process virtual address space.
//!
//! This module provides [`MemorySpace`], the page table of one simulated process, and
//! [`MemoryBasicInformation`], the descriptor `VirtualQuery` reports for a page.
//!
//! # Allocation Model
//!
//! Memory is tracked page by page in an ordered map keyed by page base. There are no
//! allocation records: an allocation is simply the run of pages it created, which is
//! why releasing with a size of zero only removes the page at the given address.
//!
//! - Allocations without an address hint are placed first-fit, scanning upward from a
//!   low watermark (`0x10000` by default) so that small addresses stay unmapped.
//! - Allocations with a hint are placed at the aligned hint without collision checks.
//!   Pages that already exist are reused with their content.
//!
//! # Access Semantics
//!
//! Reads are best effort and never fault: bytes from missing, reserved or no-access
//! pages read as zero. Writes are partial: they stop at the first page that cannot be
//! written and report how many bytes went in before that.
//!
//! # Example
//!
//! ```rust
//! use ntsim::memory::{AllocationType, MemorySpace, MemoryState, PageProtection, FreeType};
//!
//! let mut space = MemorySpace::new();
//! let base = space.allocate(0, 0x4000, AllocationType::COMMIT | AllocationType::RESERVE, PageProtection::READWRITE);
//! assert_eq!(space.write(base, b"TEST"), 4);
//! assert_eq!(space.read(base, 4), b"TEST");
//!
//! assert!(space.free(base, 0x4000, FreeType::Decommit.bits()));
//! assert_eq!(space.query(base).state, MemoryState::Reserve);
//! ```

use std::collections::BTreeMap;

use log::{trace, warn};

use crate::memory::{
    page::{align_down, Page, PAGE_SIZE},
    protection::{AllocationType, FreeType, MemoryState, PageProtection, RegionType},
};

/// Default lowest address considered by hint-less allocations (64KB).
pub const DEFAULT_LOW_WATERMARK: u64 = 0x1_0000;

/// Descriptor of the page covering a queried address (`MEMORY_BASIC_INFORMATION`).
///
/// The simulation reports one page per query, so `region_size` is always
/// [`PAGE_SIZE`] and `allocation_base` equals `base_address`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryBasicInformation {
    /// Base address of the page.
    pub base_address: u64,
    /// Base of the allocation the page belongs to.
    pub allocation_base: u64,
    /// Protection at allocation time.
    pub allocation_protect: PageProtection,
    /// Size of the described region in bytes.
    pub region_size: u64,
    /// Allocation state.
    pub state: MemoryState,
    /// Current protection.
    pub protect: PageProtection,
    /// Region type.
    pub kind: RegionType,
}

impl MemoryBasicInformation {
    /// Descriptor reported for an address with no page.
    #[must_use]
    pub fn free(address: u64) -> Self {
        let base = align_down(address);
        Self {
            base_address: base,
            allocation_base: base,
            allocation_protect: PageProtection::NOACCESS,
            region_size: PAGE_SIZE as u64,
            state: MemoryState::Free,
            protect: PageProtection::NOACCESS,
            kind: RegionType::Private,
        }
    }

    fn from_page(page: &Page) -> Self {
        Self {
            base_address: page.base(),
            allocation_base: page.base(),
            allocation_protect: page.protection(),
            region_size: PAGE_SIZE as u64,
            state: page.state(),
            protect: page.protection(),
            kind: page.kind(),
        }
    }
}

/// Number of pages covered by `size` bytes, with zero meaning one page.
fn covered_pages(size: usize) -> usize {
    size.div_ceil(PAGE_SIZE).max(1)
}

/// Page table of one simulated process.
///
/// All mutation goes through [`allocate`](Self::allocate), [`free`](Self::free),
/// [`protect`](Self::protect) and [`write`](Self::write). None of these operations
/// can fail with an error; failure is reported through the return value.
#[derive(Clone, Debug)]
pub struct MemorySpace {
    /// Present pages keyed by base address.
    pages: BTreeMap<u64, Page>,
    /// First candidate address for hint-less allocations.
    low_watermark: u64,
}

impl Default for MemorySpace {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySpace {
    /// Creates an empty address space with the default low watermark.
    #[must_use]
    pub fn new() -> Self {
        Self::with_low_watermark(DEFAULT_LOW_WATERMARK)
    }

    /// Creates an empty address space whose hint-less allocations start at `low_watermark`.
    ///
    /// The watermark is aligned down to a page boundary.
    #[must_use]
    pub fn with_low_watermark(low_watermark: u64) -> Self {
        Self {
            pages: BTreeMap::new(),
            low_watermark: align_down(low_watermark),
        }
    }

    /// Returns the number of pages present in the table.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Returns the page at the page-aligned base of `address`, if present.
    #[must_use]
    pub fn page(&self, address: u64) -> Option<&Page> {
        self.pages.get(&align_down(address))
    }

    /// Returns `true` if the page covering `address` is committed.
    #[must_use]
    pub fn is_committed(&self, address: u64) -> bool {
        self.page(address).is_some_and(Page::is_committed)
    }

    /// Finds the lowest run of `count` absent pages at or above the low watermark.
    ///
    /// Returns `None` if no such run fits below the top of the address space.
    fn find_free_run(&self, count: usize) -> Option<u64> {
        let span = (count as u64).checked_mul(PAGE_SIZE as u64)?;
        let mut candidate = self.low_watermark;

        loop {
            let Some(extent) = span.checked_sub(1) else {
                return Some(candidate);
            };
            let last = candidate.checked_add(extent)?;
            match self.pages.range(candidate..=last).next_back() {
                // Skip past the highest collision; everything below it cannot start a fit
                Some((&occupied, _)) => candidate = occupied.checked_add(PAGE_SIZE as u64)?,
                None => return Some(candidate),
            }
        }
    }

    /// Allocates `size` bytes and returns the base address (`VirtualAlloc`).
    ///
    /// With `hint == 0` the first fully free run of `ceil(size / PAGE_SIZE)` pages at or
    /// above the low watermark is used; if none fits below the top of the address space
    /// nothing is created and 0 is returned. A nonzero hint is aligned down and used
    /// as is.
    /// Every covered page is created zero-filled if absent, then committed with
    /// `protect`; `allocation_type` is recorded in the log only.
    pub fn allocate(
        &mut self,
        hint: u64,
        size: usize,
        allocation_type: AllocationType,
        protect: PageProtection,
    ) -> u64 {
        let count = size.div_ceil(PAGE_SIZE);
        let base = if hint == 0 {
            let Some(base) = self.find_free_run(count) else {
                warn!(
                    "allocate: no free run of {count} pages above 0x{:X}",
                    self.low_watermark
                );
                return 0;
            };
            base
        } else {
            align_down(hint)
        };

        for index in 0..count {
            let Some(address) = (index as u64)
                .checked_mul(PAGE_SIZE as u64)
                .and_then(|offset| base.checked_add(offset))
            else {
                break;
            };
            self.pages
                .entry(address)
                .or_insert_with(|| Page::zeroed(address))
                .commit(protect);
        }

        trace!(
            "allocate 0x{base:X} pages={count} type={allocation_type:?} protect={protect:?}"
        );
        base
    }

    /// Decommits or releases pages (`VirtualFree`).
    ///
    /// `free_type` is the raw host value. The covered range starts at the aligned
    /// `address` and spans `ceil(size / PAGE_SIZE)` pages, or one page if `size` is 0.
    ///
    /// - `MEM_DECOMMIT`: every present covered page becomes reserved.
    /// - `MEM_RELEASE`: with `size == 0` only the page at `address` is removed,
    ///   otherwise every covered page is removed.
    ///
    /// Returns `false` without touching the table for any other `free_type`.
    pub fn free(&mut self, address: u64, size: usize, free_type: u32) -> bool {
        let Some(kind) = FreeType::from_repr(free_type) else {
            warn!("free 0x{address:X}: unknown free type 0x{free_type:X}");
            return false;
        };

        let base = align_down(address);
        let addresses = (0..covered_pages(size)).map_while(|index| {
            (index as u64)
                .checked_mul(PAGE_SIZE as u64)
                .and_then(|offset| base.checked_add(offset))
        });

        match kind {
            FreeType::Decommit => {
                for page_address in addresses {
                    if let Some(page) = self.pages.get_mut(&page_address) {
                        page.decommit();
                    }
                }
            }
            FreeType::Release if size == 0 => {
                self.pages.remove(&base);
            }
            FreeType::Release => {
                for page_address in addresses {
                    self.pages.remove(&page_address);
                }
            }
        }

        trace!("free 0x{base:X} size=0x{size:X} {kind}");
        true
    }

    /// Changes the protection of the covered pages (`VirtualProtect`).
    ///
    /// The covered range is computed as for [`free`](Self::free). Returns the previous
    /// protection of the first page, or `None` (and changes nothing) if that page is
    /// not present.
    pub fn protect(
        &mut self,
        address: u64,
        size: usize,
        protect: PageProtection,
    ) -> Option<PageProtection> {
        let base = align_down(address);
        let old = self.pages.get(&base)?.protection();

        for index in 0..covered_pages(size) {
            let Some(page_address) = (index as u64)
                .checked_mul(PAGE_SIZE as u64)
                .and_then(|offset| base.checked_add(offset))
            else {
                break;
            };
            if let Some(page) = self.pages.get_mut(&page_address) {
                page.set_protection(protect);
            }
        }

        Some(old)
    }

    /// Reads `len` bytes starting at `address`.
    ///
    /// Bytes belonging to pages that are absent, not committed or `NOACCESS` read as
    /// zero. This never fails.
    #[must_use]
    pub fn read(&self, address: u64, len: usize) -> Vec<u8> {
        let mut result = vec![0u8; len];
        let mut done = 0usize;

        while done < len {
            let current = address.wrapping_add(done as u64);
            let page_address = align_down(current);
            let offset = (current - page_address) as usize;
            let chunk = (PAGE_SIZE - offset).min(len - done);

            if let Some(page) = self.pages.get(&page_address) {
                if page.is_readable() {
                    let source = &page.bytes()[offset..offset + chunk];
                    result[done..done + chunk].copy_from_slice(source);
                }
            }

            done += chunk;
        }

        result
    }

    /// Writes `data` starting at `address` and returns the number of bytes written.
    ///
    /// Pages are visited in increasing address order; the walk stops at the first page
    /// that is absent, not committed, or not writable. Bytes written before that point
    /// stay written.
    pub fn write(&mut self, address: u64, data: &[u8]) -> usize {
        let mut done = 0usize;

        while done < data.len() {
            let current = address.wrapping_add(done as u64);
            let page_address = align_down(current);
            let offset = (current - page_address) as usize;
            let chunk = (PAGE_SIZE - offset).min(data.len() - done);

            let Some(page) = self.pages.get_mut(&page_address) else {
                break;
            };
            if !page.is_writable() || page.write(offset, &data[done..done + chunk]).is_err() {
                break;
            }

            done += chunk;
        }

        if done < data.len() {
            trace!(
                "write 0x{address:X}: stopped after {done} of {} bytes",
                data.len()
            );
        }
        done
    }

    /// Describes the page covering `address` (`VirtualQuery`).
    #[must_use]
    pub fn query(&self, address: u64) -> MemoryBasicInformation {
        self.page(address).map_or_else(
            || MemoryBasicInformation::free(address),
            MemoryBasicInformation::from_page,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RW: PageProtection = PageProtection::READWRITE;

    fn commit_reserve() -> AllocationType {
        AllocationType::COMMIT | AllocationType::RESERVE
    }

    #[test]
    fn allocate_starts_at_watermark() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 4096, commit_reserve(), RW);
        assert_eq!(base, DEFAULT_LOW_WATERMARK);
        assert_eq!(space.page_count(), 1);
    }

    #[test]
    fn allocate_first_fit_skips_used_pages() {
        let mut space = MemorySpace::new();
        let a = space.allocate(0, 0x2000, commit_reserve(), RW);
        let b = space.allocate(0, 0x1000, commit_reserve(), RW);
        assert_eq!(b, a + 0x2000);

        // Release the first page of `a` and a one-page hole opens at the watermark
        assert!(space.free(a, 0, FreeType::Release.bits()));
        let c = space.allocate(0, 0x1000, commit_reserve(), RW);
        assert_eq!(c, a);

        // A two page request does not fit into a one page hole
        assert!(space.free(c, 0, FreeType::Release.bits()));
        let d = space.allocate(0, 0x2000, commit_reserve(), RW);
        assert_eq!(d, b + 0x1000);
    }

    #[test]
    fn allocate_with_hint_aligns_down() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0x50_0123, 10, commit_reserve(), RW);
        assert_eq!(base, 0x50_0000);
        assert!(space.is_committed(0x50_0FFF));
    }

    #[test]
    fn allocate_with_hint_reuses_content() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0x40_0000, 4096, commit_reserve(), RW);
        assert_eq!(space.write(base, b"keep"), 4);

        space.allocate(base, 4096, commit_reserve(), PageProtection::READONLY);
        assert_eq!(space.read(base, 4), b"keep");
        assert_eq!(space.query(base).protect, PageProtection::READONLY);
    }

    #[test]
    fn allocate_zero_size_creates_nothing() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 0, commit_reserve(), RW);
        assert_eq!(base, DEFAULT_LOW_WATERMARK);
        assert_eq!(space.page_count(), 0);
    }

    #[test]
    fn allocate_near_top_of_address_space() {
        let mut space = MemorySpace::new();
        let base = space.allocate(u64::MAX, 0x3000, commit_reserve(), RW);
        assert_eq!(base, 0xFFFF_FFFF_FFFF_F000);
        assert_eq!(space.page_count(), 1);
    }

    #[test]
    fn query_after_allocate() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 4096, commit_reserve(), RW);
        let info = space.query(base + 100);
        assert_eq!(info.base_address, base);
        assert_eq!(info.allocation_base, base);
        assert_eq!(info.region_size, 4096);
        assert_eq!(info.state, MemoryState::Commit);
        assert_eq!(info.protect, RW);
        assert_eq!(info.allocation_protect, RW);
        assert_eq!(info.kind, RegionType::Private);
    }

    #[test]
    fn query_unmapped() {
        let space = MemorySpace::new();
        let info = space.query(0x1234_5678);
        assert_eq!(info.base_address, 0x1234_5000);
        assert_eq!(info.state, MemoryState::Free);
        assert_eq!(info.protect, PageProtection::NOACCESS);
        assert_eq!(info.kind, RegionType::Private);
        assert_eq!(info.region_size, 4096);
    }

    #[test]
    fn decommit_then_release() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 16384, commit_reserve(), RW);
        assert_eq!(space.query(base).state.bits(), 0x1000);

        assert!(space.free(base, 16384, FreeType::Decommit.bits()));
        for page in 0..4 {
            assert_eq!(space.query(base + page * 4096).state.bits(), 0x2000);
        }

        assert!(space.free(base, 0, FreeType::Release.bits()));
        assert_eq!(space.query(base).state.bits(), 0x10000);
        // Only the addressed page is released
        assert_eq!(space.query(base + 4096).state, MemoryState::Reserve);
        assert_eq!(space.page_count(), 3);
    }

    #[test]
    fn release_with_size_removes_covered_pages() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 0x3000, commit_reserve(), RW);
        assert!(space.free(base, 0x2001, FreeType::Release.bits()));
        assert_eq!(space.page_count(), 0);
    }

    #[test]
    fn decommit_zero_size_is_one_page() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 0x2000, commit_reserve(), RW);
        assert!(space.free(base + 10, 0, FreeType::Decommit.bits()));
        assert_eq!(space.query(base).state, MemoryState::Reserve);
        assert_eq!(space.query(base + 0x1000).state, MemoryState::Commit);
    }

    #[test]
    fn free_unknown_type_changes_nothing() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 0x1000, commit_reserve(), RW);
        assert!(!space.free(base, 0, 0x1234));
        assert!(space.is_committed(base));
    }

    #[test]
    fn read_write_roundtrip_across_pages() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 3 * 4096, commit_reserve(), RW);
        let payload: Vec<u8> = (0..6000u32).map(|i| (i % 251) as u8).collect();

        assert_eq!(space.write(base + 4000, &payload), payload.len());
        assert_eq!(space.read(base + 4000, payload.len()), payload);
    }

    #[test]
    fn read_unmapped_is_zero() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 4096, commit_reserve(), RW);
        space.write(base + 4090, &[0xAA; 6]);

        let data = space.read(base + 4090, 12);
        assert_eq!(&data[..6], &[0xAA; 6]);
        assert_eq!(&data[6..], &[0; 6]);
    }

    #[test]
    fn read_noaccess_and_reserved_is_zero() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 0x2000, commit_reserve(), RW);
        space.write(base, &[1; 0x2000]);

        space.protect(base, 0x1000, PageProtection::NOACCESS);
        space.free(base + 0x1000, 0x1000, FreeType::Decommit.bits());
        assert_eq!(space.read(base, 0x2000), vec![0; 0x2000]);
    }

    #[test]
    fn write_stops_at_readonly_page() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 0x1000, commit_reserve(), RW);
        space.allocate(base + 0x1000, 0x1000, commit_reserve(), PageProtection::READONLY);

        let written = space.write(base + 0xFF0, &[7; 32]);
        assert_eq!(written, 16);
        assert_eq!(space.read(base + 0x1000, 16), vec![0; 16]);
    }

    #[test]
    fn write_to_unmapped_writes_nothing() {
        let mut space = MemorySpace::new();
        assert_eq!(space.write(0x7000_0000, b"data"), 0);
    }

    #[test]
    fn write_execute_readwrite() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 0x1000, commit_reserve(), PageProtection::EXECUTE_READWRITE);
        assert_eq!(space.write(base, &[0xC3]), 1);
    }

    #[test]
    fn protect_returns_old_protection() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 0x2000, commit_reserve(), RW);
        let old = space.protect(base, 0x2000, PageProtection::EXECUTE_READ);
        assert_eq!(old, Some(RW));
        assert_eq!(space.query(base + 0x1000).protect, PageProtection::EXECUTE_READ);
        assert_eq!(space.write(base, &[1]), 0);

        assert_eq!(space.protect(0x9999_0000, 1, RW), None);
    }

    #[test]
    fn allocate_fails_at_top_of_address_space() {
        let mut space = MemorySpace::with_low_watermark(0xFFFF_FFFF_FFFF_F000);
        let last = space.allocate(0, 0x1000, commit_reserve(), RW);
        assert_eq!(last, 0xFFFF_FFFF_FFFF_F000);

        // No page fits above the last one
        assert_eq!(space.allocate(0, 0x1000, commit_reserve(), RW), 0);
        assert_eq!(space.page_count(), 1);

        let mut space = MemorySpace::with_low_watermark(0xFFFF_FFFF_FFFF_F000);
        assert_eq!(space.allocate(0, 0x2000, commit_reserve(), RW), 0);
        assert_eq!(space.page_count(), 0);
    }

    #[test]
    fn read_straddles_readable_and_unreadable_pages() {
        let mut space = MemorySpace::new();
        let base = space.allocate(0, 0x2000, commit_reserve(), RW);
        assert_eq!(space.write(base + 0xFFE, &[1, 2, 3, 4]), 4);
        assert_eq!(space.protect(base + 0x1000, 1, PageProtection::NOACCESS), Some(RW));

        assert_eq!(space.read(base + 0xFFC, 6), vec![0, 0, 1, 2, 0, 0]);
    }
}
