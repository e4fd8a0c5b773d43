//! Binary records exchanged with callers.
//!
//! The simulation's outputs are byte-compatible with the host's published structures.
//! This module converts between the in-memory snapshots and those fixed-offset,
//! little-endian records:
//!
//! | Record | Size | Snapshot |
//! |--------|------|----------|
//! | `MEMORY_BASIC_INFORMATION` | 48 | [`MemoryBasicInformation`](crate::memory::MemoryBasicInformation) |
//! | `CONTEXT` | 1232 | [`ThreadContext`](crate::thread::ThreadContext) |
//! | `MODULEINFO` | 24 | [`ModuleInfo`] |
//!
//! Encoders fail only on short buffers. Decoders additionally reject enum fields
//! with no known value.

pub mod io;

mod context;
mod mbi;
mod modinfo;

pub use context::{
    decode_context, encode_context, read_context_flags, write_context_flags, CONTEXT_FLAGS_OFFSET,
    CONTEXT_SIZE,
};
pub use mbi::{decode_memory_info, encode_memory_info, MEMORY_BASIC_INFORMATION_SIZE};
pub use modinfo::{decode_module_info, encode_module_info, ModuleInfo, MODULE_INFO_SIZE};
