//! Handles and per-process handle tables.
//!
//! A handle is an opaque 64-bit value. Two values never live in a table: the
//! pseudo-handles for "the current process" (`-1`) and "the current thread" (`-2`).
//! [`Handle`] decodes a raw value once into either a [`PseudoHandle`] or a table value,
//! so consumers match on the variant instead of comparing magic numbers.
//!
//! # Key Components
//!
//! - [`Handle`] - Tagged handle value
//! - [`HandleTable`] - Per-process map from handle values to [`HandleEntry`]
//! - [`ObjectRef`] - Non-owning reference to a simulated object, resolved through the kernel
//! - [`OwnedHandle`] - Scoped guard closing its handle when dropped
//! - [`ProcessAccess`] / [`ThreadAccess`] - Access masks recorded on entries
//!
//! # Example
//!
//! ```rust
//! use ntsim::handle::{Handle, PseudoHandle};
//!
//! assert_eq!(Handle::from_raw(u64::MAX), Handle::Pseudo(PseudoHandle::CurrentProcess));
//! assert_eq!(Handle::from_raw(0xFFFF_FFFF_FFFF_FFFE), Handle::CURRENT_THREAD);
//! assert_eq!(Handle::from_raw(8).raw(), 8);
//! assert!(Handle::NULL.is_null());
//! ```

mod access;
mod guard;
mod table;

use std::fmt;

pub use access::{ProcessAccess, ThreadAccess};
pub use guard::OwnedHandle;
pub use table::{HandleEntry, HandleTable, ObjectKind, ObjectRef};

/// Raw value of the current-process pseudo-handle (`(HANDLE)-1`).
pub const CURRENT_PROCESS_RAW: u64 = u64::MAX;

/// Raw value of the current-thread pseudo-handle (`(HANDLE)-2`).
pub const CURRENT_THREAD_RAW: u64 = u64::MAX - 1;

/// Reserved handle values that designate the caller's own objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PseudoHandle {
    /// `GetCurrentProcess()`
    CurrentProcess,
    /// `GetCurrentThread()`
    CurrentThread,
}

/// A handle value, decoded into pseudo-handle or table value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    /// One of the reserved pseudo-handles.
    Pseudo(PseudoHandle),
    /// A value to be looked up in the current process's handle table.
    Table(u64),
}

impl Handle {
    /// The null handle returned by failed open operations.
    pub const NULL: Handle = Handle::Table(0);
    /// The current-process pseudo-handle.
    pub const CURRENT_PROCESS: Handle = Handle::Pseudo(PseudoHandle::CurrentProcess);
    /// The current-thread pseudo-handle.
    pub const CURRENT_THREAD: Handle = Handle::Pseudo(PseudoHandle::CurrentThread);

    /// Decodes a raw handle value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        match raw {
            CURRENT_PROCESS_RAW => Self::CURRENT_PROCESS,
            CURRENT_THREAD_RAW => Self::CURRENT_THREAD,
            value => Self::Table(value),
        }
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        match self {
            Self::Pseudo(PseudoHandle::CurrentProcess) => CURRENT_PROCESS_RAW,
            Self::Pseudo(PseudoHandle::CurrentThread) => CURRENT_THREAD_RAW,
            Self::Table(value) => value,
        }
    }

    /// Returns `true` for the null handle.
    #[must_use]
    pub const fn is_null(self) -> bool {
        matches!(self, Self::Table(0))
    }

    /// Returns `true` for either pseudo-handle.
    #[must_use]
    pub const fn is_pseudo(self) -> bool {
        matches!(self, Self::Pseudo(_))
    }
}

impl From<u64> for Handle {
    fn from(raw: u64) -> Self {
        Self::from_raw(raw)
    }
}

impl From<Handle> for u64 {
    fn from(handle: Handle) -> Self {
        handle.raw()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pseudo(pseudo) => write!(f, "Handle({pseudo:?})"),
            Self::Table(value) => write!(f, "Handle(0x{value:X})"),
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.raw())
    }
}
