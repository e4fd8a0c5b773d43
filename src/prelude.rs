//! # ntsim Prelude
//!
//! Re-exports of the types most tests and tools need. Import it with
//! `use ntsim::prelude::*;`.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all ntsim operations
pub use crate::Error;

/// The result type used throughout ntsim
pub use crate::Result;

// ================================================================================================
// Kernel
// ================================================================================================

/// The simulated kernel and its configuration
pub use crate::{Kernel, KernelConfig};

/// Wait results and creation flags
pub use crate::kernel::{CREATE_SUSPENDED, INFINITE, WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT};

// ================================================================================================
// Client Wrappers
// ================================================================================================

/// Result-returning process and thread wrappers
pub use crate::client::{RemoteProcess, RemoteThread};

/// C runtime helpers
pub use crate::crt::Crt;

// ================================================================================================
// Handles
// ================================================================================================

/// Handle values and access rights
pub use crate::handle::{Handle, OwnedHandle, ProcessAccess, ThreadAccess};

// ================================================================================================
// Memory
// ================================================================================================

/// Page protections, allocation flags and query results
pub use crate::memory::{
    AllocationType, FreeType, MemoryBasicInformation, MemoryState, PageProtection, RegionType,
    PAGE_SIZE,
};

// ================================================================================================
// Threads and Modules
// ================================================================================================

/// Register context and thread states
pub use crate::thread::{ContextFlags, ThreadContext, ThreadState, STILL_ACTIVE};

/// Module information record
pub use crate::marshal::ModuleInfo;
