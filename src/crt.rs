//! C runtime helpers (`malloc`, `memcpy`, ...) over the current process's memory.
//!
//! All pointers are simulated addresses. Heap blocks are plain page allocations, so
//! every `malloc` returns a fresh page-aligned block and `free` releases the block's
//! first page.

use std::cmp::Ordering;

use crate::{
    memory::{AllocationType, FreeType, PageProtection},
    Kernel,
};

/// C runtime bound to one kernel.
///
/// # Example
///
/// ```rust
/// use ntsim::Kernel;
///
/// let kernel = Kernel::new();
/// let crt = kernel.crt();
///
/// let a = crt.malloc(16);
/// let b = crt.malloc(16);
/// crt.memset(a, 0x41, 16);
/// crt.memcpy(b, a, 16);
/// assert_eq!(crt.memcmp(a, b, 16), std::cmp::Ordering::Equal);
/// crt.free(a);
/// crt.free(b);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Crt<'k> {
    kernel: &'k Kernel,
}

impl Kernel {
    /// Returns the C runtime of the current process.
    #[must_use]
    pub fn crt(&self) -> Crt<'_> {
        Crt { kernel: self }
    }
}

impl Crt<'_> {
    /// Allocates `size` bytes of zeroed, read-write memory.
    ///
    /// A zero-sized request still gets a page.
    #[must_use]
    pub fn malloc(&self, size: usize) -> u64 {
        let flags = AllocationType::COMMIT | AllocationType::RESERVE;
        self.kernel.virtual_alloc(
            0,
            size.max(1),
            flags.bits(),
            PageProtection::READWRITE.bits(),
        )
    }

    /// Releases a block returned by [`malloc`](Self::malloc). Null is ignored.
    pub fn free(&self, pointer: u64) {
        if pointer != 0 {
            self.kernel.virtual_free(pointer, 0, FreeType::Release.bits());
        }
    }

    /// Copies `count` bytes from `source` to `destination` and returns `destination`.
    ///
    /// Unreadable source bytes are copied as zero; the copy stops at the first
    /// unwritable destination page.
    pub fn memcpy(&self, destination: u64, source: u64, count: usize) -> u64 {
        let data = self.kernel.read_memory(source, count);
        self.kernel.write_memory(destination, &data);
        destination
    }

    /// Fills `count` bytes at `destination` with `value` and returns `destination`.
    pub fn memset(&self, destination: u64, value: u8, count: usize) -> u64 {
        self.kernel.write_memory(destination, &vec![value; count]);
        destination
    }

    /// Compares `count` bytes at `left` and `right` lexicographically.
    #[must_use]
    pub fn memcmp(&self, left: u64, right: u64, count: usize) -> Ordering {
        let a = self.kernel.read_memory(left, count);
        let b = self.kernel.read_memory(right, count);
        a.cmp(&b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malloc_returns_distinct_blocks() {
        let kernel = Kernel::new();
        let crt = kernel.crt();
        let a = crt.malloc(10);
        let b = crt.malloc(0);
        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert_eq!(kernel.read_memory(a, 10), vec![0; 10]);
    }

    #[test]
    fn free_makes_block_reusable() {
        let kernel = Kernel::new();
        let crt = kernel.crt();
        let a = crt.malloc(100);
        crt.free(a);
        crt.free(0);
        assert_eq!(crt.malloc(100), a);
    }

    #[test]
    fn memset_memcpy_memcmp() {
        let kernel = Kernel::new();
        let crt = kernel.crt();
        let a = crt.malloc(8);
        let b = crt.malloc(8);

        assert_eq!(crt.memset(a, 0x7F, 8), a);
        assert_eq!(crt.memcmp(a, b, 8), Ordering::Greater);
        assert_eq!(crt.memcmp(b, a, 8), Ordering::Less);

        assert_eq!(crt.memcpy(b, a, 8), b);
        assert_eq!(crt.memcmp(a, b, 8), Ordering::Equal);
        assert_eq!(kernel.read_memory(b, 8), vec![0x7F; 8]);
    }

    #[test]
    fn memcpy_from_unmapped_copies_zeros() {
        let kernel = Kernel::new();
        let crt = kernel.crt();
        let a = crt.malloc(4);
        crt.memset(a, 1, 4);
        crt.memcpy(a, 0x7000_0000, 4);
        assert_eq!(kernel.read_memory(a, 4), vec![0; 4]);
    }
}
