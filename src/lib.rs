// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # ntsim
//!
//! A deterministic, in-process simulation of the Windows process, thread and virtual
//! memory object model.
//!
//! `ntsim` lets memory tooling (process readers, patchers, injectors, debuggers) be
//! exercised on any platform without touching a real operating system. It keeps a
//! registry of simulated processes, each with its own paged address space, handle
//! table, threads and loaded modules, and exposes them through functions shaped like
//! the Win32 calls such tools make.
//!
//! ## Features
//!
//! - **Paged virtual memory** - 4KB pages with reserve/commit/release semantics,
//!   protections and `MEMORY_BASIC_INFORMATION` queries
//! - **Handles** - Per-process handle tables plus the current-process and
//!   current-thread pseudo-handles
//! - **Threads** - Suspend counting, termination, exit codes and full x64 `CONTEXT`
//!   transfer filtered by `ContextFlags`
//! - **Modules** - Case-insensitive module lookup with on-demand loading and stable
//!   export addresses
//! - **Binary records** - Byte-exact `MEMORY_BASIC_INFORMATION`, `CONTEXT` and
//!   `MODULEINFO` layouts
//! - **Thread safe** - One [`Kernel`] can be shared between test threads
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! ntsim = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust
//! use ntsim::prelude::*;
//!
//! let kernel = Kernel::new();
//! let pid = kernel.create_process("target.exe");
//!
//! let process = RemoteProcess::open(&kernel, pid)?;
//! let base = process.alloc(0, 0x1000, PageProtection::READWRITE)?;
//! process.write(base + 8, b"patched")?;
//!
//! let info = process.query(base)?;
//! assert_eq!(info.state, MemoryState::Commit);
//! # Ok::<(), ntsim::Error>(())
//! ```
//!
//! ### Win32-shaped calls
//!
//! The kernel itself reports failure the way the host API does: a null handle, a zero
//! address, `false`, or a sentinel count.
//!
//! ```rust
//! use ntsim::{handle::Handle, memory::{AllocationType, PageProtection}, Kernel};
//!
//! let kernel = Kernel::new();
//! let base = kernel.virtual_alloc(
//!     0,
//!     0x2000,
//!     (AllocationType::RESERVE | AllocationType::COMMIT).bits(),
//!     PageProtection::READWRITE.bits(),
//! );
//! assert_ne!(base, 0);
//! assert_eq!(kernel.write_memory(base, &[1, 2, 3]), 3);
//!
//! assert!(kernel.open_process(0, 12345).is_null());
//! assert!(!kernel.close_handle(Handle::from_raw(0x1234)));
//! ```
//!
//! ## Architecture
//!
//! - [`kernel`] - The [`Kernel`] registry and every Win32-shaped operation
//! - [`memory`] - Pages, protections and the per-process [`memory::MemorySpace`]
//! - [`handle`] - Handle values, handle tables and the [`handle::OwnedHandle`] guard
//! - [`thread`] - Thread state machine and the x64 register context
//! - [`process`] - One simulated process
//! - [`module`] - Loaded modules and their exports
//! - [`marshal`] - Byte layouts of the records exchanged with tools
//! - [`client`] - [`client::RemoteProcess`] and [`client::RemoteThread`], which return
//!   [`Result`] instead of sentinels
//! - [`crt`] - `malloc`, `free`, `memcpy`, `memset` and `memcmp` over simulated memory
//! - [`prelude`] - Convenient re-exports of commonly used types
//!
//! ## Error Handling
//!
//! Operations of the [`client`] and [`marshal`] layers return [`Result<T, Error>`](Result):
//!
//! ```rust
//! use ntsim::{client::RemoteThread, Error, Kernel};
//!
//! let kernel = Kernel::new();
//! match RemoteThread::open(&kernel, 42) {
//!     Ok(thread) => println!("opened {}", thread.tid()),
//!     Err(Error::ThreadNotFound(tid)) => println!("no thread {tid}"),
//!     Err(e) => println!("Other error: {e}"),
//! };
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade. Install any logger
//! (for example `env_logger`) and set `RUST_LOG=ntsim=debug` to follow process, thread
//! and handle lifecycles.

#[macro_use]
pub(crate) mod error;

pub mod client;
pub mod crt;
pub mod handle;
pub mod kernel;
pub mod marshal;
pub mod memory;
pub mod module;
pub mod prelude;
pub mod process;
pub mod thread;

/// `ntsim` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
///
/// # Examples
///
/// ```rust
/// use ntsim::{client::RemoteProcess, Kernel, Result};
///
/// fn read_u32(kernel: &Kernel, pid: u32, address: u64) -> Result<u32> {
///     let process = RemoteProcess::open(kernel, pid)?;
///     let bytes = process.read(address, 4)?;
///     Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `ntsim` Error type
///
/// Returned by the [`client`] wrappers and the [`marshal`] codecs.
pub use error::Error;

/// The simulated kernel and its configuration.
///
/// # Example
///
/// ```rust
/// use ntsim::{Kernel, KernelConfig};
///
/// let kernel = Kernel::with_config(KernelConfig::new().with_current_process(100, "tool.exe"));
/// assert_eq!(kernel.current_process_id(), 100);
/// ```
pub use kernel::{Kernel, KernelConfig};
