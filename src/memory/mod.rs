//! Simulated virtual memory.
//!
//! This module provides the page-granular memory model each simulated process owns.
//!
//! # Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`MemorySpace`] | Page table of one process: allocate, free, protect, read, write, query |
//! | [`Page`] | One 4KB page with its state, protection and region type |
//! | [`MemoryBasicInformation`] | Descriptor returned by [`MemorySpace::query`] |
//! | [`PageProtection`] | `PAGE_*` protection bitset |
//! | [`AllocationType`] | `MEM_COMMIT` / `MEM_RESERVE` / ... allocation flags |
//! | [`MemoryState`] | `MEM_COMMIT` / `MEM_RESERVE` / `MEM_FREE` |
//! | [`RegionType`] | `MEM_PRIVATE` / `MEM_MAPPED` / `MEM_IMAGE` |
//! | [`FreeType`] | `MEM_DECOMMIT` / `MEM_RELEASE` |
//!
//! # Invariants
//!
//! - Every stored page's base is a multiple of [`PAGE_SIZE`].
//! - A page not present in the table is free, `PAGE_NOACCESS` and private.

mod page;
mod protection;
mod space;

pub use page::{align_down, Page, PAGE_SIZE};
pub use protection::{AllocationType, FreeType, MemoryState, PageProtection, RegionType};
pub use space::{MemoryBasicInformation, MemorySpace, DEFAULT_LOW_WATERMARK};
