//! Scoped ownership of a kernel handle.

use log::warn;

use crate::{handle::Handle, Kernel};

/// Closes the wrapped handle when dropped.
///
/// The guard is the only owner of its handle: it is not `Clone`, and
/// [`detach`](Self::detach) hands the raw handle back without closing it.
/// Pseudo-handles can be wrapped as well; closing them is a no-op in the kernel.
///
/// # Example
///
/// ```rust
/// use ntsim::{handle::{OwnedHandle, ProcessAccess}, Kernel};
///
/// let kernel = Kernel::new();
/// let pid = kernel.create_process("notepad.exe");
/// let raw = kernel.open_process(ProcessAccess::ALL_ACCESS.bits(), pid);
/// {
///     let guard = OwnedHandle::new(&kernel, raw);
///     assert_eq!(kernel.process_id(guard.get()), pid);
/// }
/// assert_eq!(kernel.process_id(raw), 0);
/// ```
#[derive(Debug)]
pub struct OwnedHandle<'k> {
    kernel: &'k Kernel,
    handle: Option<Handle>,
}

impl<'k> OwnedHandle<'k> {
    /// Takes ownership of `handle`.
    #[must_use]
    pub fn new(kernel: &'k Kernel, handle: Handle) -> Self {
        Self {
            kernel,
            handle: Some(handle),
        }
    }

    /// Returns the owned handle, or [`Handle::NULL`] after [`close`](Self::close).
    #[must_use]
    pub fn get(&self) -> Handle {
        self.handle.unwrap_or(Handle::NULL)
    }

    /// Returns `true` while the guard still owns a handle.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Returns the kernel the handle belongs to.
    #[must_use]
    pub fn kernel(&self) -> &'k Kernel {
        self.kernel
    }

    /// Closes the handle now. Further calls do nothing and return `false`.
    pub fn close(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => self.kernel.close_handle(handle),
            None => false,
        }
    }

    /// Releases ownership and returns the handle without closing it.
    #[must_use]
    pub fn detach(mut self) -> Handle {
        self.handle.take().unwrap_or(Handle::NULL)
    }
}

impl Drop for OwnedHandle<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !self.kernel.close_handle(handle) {
                warn!("handle {handle} was already closed");
            }
        }
    }
}
