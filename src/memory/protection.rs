//! Page protection, allocation and region attributes.
//!
//! The simulation stores these attributes with the exact numeric values of the host's
//! `PAGE_*`, `MEM_*` constants, so a value read out of a marshalled record can be compared
//! directly against the host documentation.

use bitflags::bitflags;
use strum::{Display, EnumIter, FromRepr};

bitflags! {
    /// Memory protection of a page (`PAGE_*` constants).
    ///
    /// Unlike a pure read/write/execute triple this keeps the host encoding, where each
    /// access combination is its own bit and the modifiers (`GUARD`, `NOCACHE`,
    /// `WRITECOMBINE`) are or-ed on top.
    ///
    /// # Common Values
    ///
    /// - [`READWRITE`](Self::READWRITE) - Default for private allocations
    /// - [`EXECUTE_READ`](Self::EXECUTE_READ) - Code pages
    /// - [`NOACCESS`](Self::NOACCESS) - Reported for free pages
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PageProtection: u32 {
        /// `PAGE_NOACCESS`
        const NOACCESS = 0x01;
        /// `PAGE_READONLY`
        const READONLY = 0x02;
        /// `PAGE_READWRITE`
        const READWRITE = 0x04;
        /// `PAGE_WRITECOPY`
        const WRITECOPY = 0x08;
        /// `PAGE_EXECUTE`
        const EXECUTE = 0x10;
        /// `PAGE_EXECUTE_READ`
        const EXECUTE_READ = 0x20;
        /// `PAGE_EXECUTE_READWRITE`
        const EXECUTE_READWRITE = 0x40;
        /// `PAGE_EXECUTE_WRITECOPY`
        const EXECUTE_WRITECOPY = 0x80;
        /// `PAGE_GUARD` modifier.
        const GUARD = 0x100;
        /// `PAGE_NOCACHE` modifier.
        const NOCACHE = 0x200;
        /// `PAGE_WRITECOMBINE` modifier.
        const WRITECOMBINE = 0x400;
    }
}

impl Default for PageProtection {
    fn default() -> Self {
        Self::READWRITE
    }
}

impl PageProtection {
    /// Returns `true` if the protection accepts writes through `WriteProcessMemory`.
    ///
    /// Only the two plain read-write encodings qualify; write-copy pages are treated
    /// as read-only since the simulation has no copy-on-write mappings.
    #[must_use]
    pub fn is_writable(self) -> bool {
        self.intersects(Self::READWRITE | Self::EXECUTE_READWRITE)
    }

    /// Returns `true` unless the `NOACCESS` bit is set.
    #[must_use]
    pub fn is_accessible(self) -> bool {
        !self.contains(Self::NOACCESS)
    }
}

bitflags! {
    /// Allocation type passed to `VirtualAlloc` (`MEM_*` constants).
    ///
    /// The simulation records every allocation as committed; the flags are accepted
    /// for signature fidelity and logged.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AllocationType: u32 {
        /// `MEM_COMMIT`
        const COMMIT = 0x1000;
        /// `MEM_RESERVE`
        const RESERVE = 0x2000;
        /// `MEM_RESET`
        const RESET = 0x8_0000;
        /// `MEM_TOP_DOWN`
        const TOP_DOWN = 0x10_0000;
        /// `MEM_WRITE_WATCH`
        const WRITE_WATCH = 0x20_0000;
        /// `MEM_LARGE_PAGES`
        const LARGE_PAGES = 0x2000_0000;
    }
}

impl Default for AllocationType {
    fn default() -> Self {
        Self::COMMIT | Self::RESERVE
    }
}

/// Allocation state of a page (`MEM_COMMIT`, `MEM_RESERVE`, `MEM_FREE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, FromRepr)]
#[repr(u32)]
pub enum MemoryState {
    /// Backed and accessible.
    #[strum(serialize = "MEM_COMMIT")]
    Commit = 0x1000,
    /// Claimed but inaccessible.
    #[strum(serialize = "MEM_RESERVE")]
    Reserve = 0x2000,
    /// Not present in the page table.
    #[strum(serialize = "MEM_FREE")]
    Free = 0x1_0000,
}

impl MemoryState {
    /// Returns the host numeric value.
    #[must_use]
    pub fn bits(self) -> u32 {
        self as u32
    }
}

/// Kind of region a page belongs to (`MEM_PRIVATE`, `MEM_MAPPED`, `MEM_IMAGE`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, EnumIter, FromRepr)]
#[repr(u32)]
pub enum RegionType {
    /// Private allocation, the only kind `VirtualAlloc` produces.
    #[default]
    #[strum(serialize = "MEM_PRIVATE")]
    Private = 0x2_0000,
    /// Section view.
    #[strum(serialize = "MEM_MAPPED")]
    Mapped = 0x4_0000,
    /// Executable image.
    #[strum(serialize = "MEM_IMAGE")]
    Image = 0x100_0000,
}

impl RegionType {
    /// Returns the host numeric value.
    #[must_use]
    pub fn bits(self) -> u32 {
        self as u32
    }
}

/// Free operation requested from `VirtualFree`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u32)]
pub enum FreeType {
    /// `MEM_DECOMMIT`: committed pages fall back to reserved.
    #[strum(serialize = "MEM_DECOMMIT")]
    Decommit = 0x4000,
    /// `MEM_RELEASE`: page records are removed.
    #[strum(serialize = "MEM_RELEASE")]
    Release = 0x8000,
}

impl FreeType {
    /// Returns the host numeric value.
    #[must_use]
    pub fn bits(self) -> u32 {
        self as u32
    }
}
