//! Tool-facing wrappers over the kernel.
//!
//! [`RemoteProcess`] and [`RemoteThread`] are what a memory tool holds on to: each owns
//! an [`OwnedHandle`](crate::handle::OwnedHandle) that is closed when the wrapper is
//! dropped, talks to the kernel through the same binary records a host tool would use,
//! and turns failure sentinels into [`Error`](crate::Error) values.
//!
//! # Example
//!
//! ```rust
//! use ntsim::{client::RemoteProcess, memory::PageProtection, Kernel};
//!
//! let kernel = Kernel::new();
//! let pid = kernel.create_process("game.exe");
//!
//! let process = RemoteProcess::open(&kernel, pid)?;
//! let base = process.alloc(0, 0x1000, PageProtection::READWRITE)?;
//! process.write(base, &1337u32.to_le_bytes())?;
//!
//! let bytes = process.read(base, 4)?;
//! assert_eq!(u32::from_le_bytes(bytes.try_into().unwrap()), 1337);
//! # Ok::<(), ntsim::Error>(())
//! ```

mod process;
mod thread;

use log::error;

pub use process::RemoteProcess;
pub use thread::RemoteThread;

use crate::Error;

/// Logs and builds the error for a kernel call that returned its failure sentinel.
fn api_failed(api: &'static str, detail: String) -> Error {
    error!("{api} failed: {detail}");
    Error::ApiFailed { api, detail }
}
