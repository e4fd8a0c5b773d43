use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The simulated kernel itself never fails with an error: its operations report failure through
/// the same sentinel values the host API uses (a null handle, `0`, `FALSE`, `u32::MAX`). This
/// enum is returned by the two layers that sit on top of it:
///
/// - the struct marshalling boundary ([`crate::marshal`]), which can only fail on short or
///   malformed buffers
/// - the client layer ([`crate::client`]), which turns kernel sentinels into errors the way a
///   tool-facing wrapper would
///
/// # Error Categories
///
/// ## Buffer Errors
/// - [`Error::OutOfBounds`] - A record did not fit the provided buffer
/// - [`Error::Malformed`] - A record contained a value with no simulated meaning
///
/// ## Object Errors
/// - [`Error::InvalidHandle`] - A handle did not resolve to a live object
/// - [`Error::ProcessNotFound`] - No process with the requested id is registered
/// - [`Error::ThreadNotFound`] - No thread with the requested id is registered
/// - [`Error::HandleClosed`] - The client object's handle was already closed or detached
/// - [`Error::ApiFailed`] - A kernel operation returned its failure sentinel
///
/// # Examples
///
/// ```rust
/// use ntsim::{client::RemoteProcess, Error, Kernel};
///
/// let kernel = Kernel::new();
/// match RemoteProcess::open(&kernel, 12345) {
///     Err(Error::ProcessNotFound(pid)) => assert_eq!(pid, 12345),
///     other => panic!("unexpected: {other:?}"),
/// };
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An out of bound access was attempted while encoding or decoding a record.
    ///
    /// The marshalling layer writes fixed-size records at fixed offsets; this error
    /// means the caller handed in a buffer shorter than the record.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A decoded record contained a value that has no meaning in the simulation.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The handle value does not designate a live object of the expected kind.
    ///
    /// The associated value is the raw 64-bit handle.
    #[error("Invalid handle - 0x{0:X}")]
    InvalidHandle(u64),

    /// No process with the given id is registered with the kernel.
    #[error("Failed to open process {0}")]
    ProcessNotFound(u32),

    /// No thread with the given id exists in any registered process.
    #[error("Failed to open thread {0}")]
    ThreadNotFound(u32),

    /// The client object no longer owns a handle.
    ///
    /// Returned after [`close`](crate::client::RemoteProcess::close) or after the
    /// underlying guard was detached.
    #[error("Handle is closed")]
    HandleClosed,

    /// A kernel operation returned its failure sentinel.
    ///
    /// # Fields
    ///
    /// * `api` - Name of the operation, in host API spelling (e.g. `ReadProcessMemory`)
    /// * `detail` - Human readable context (address, size, ...)
    #[error("{api} failed: {detail}")]
    ApiFailed {
        /// The host API name of the failing operation
        api: &'static str,
        /// Additional context for the failure
        detail: String,
    },
}
