//! Client wrapper for a thread.

use log::{debug, error};

use crate::{
    client::{api_failed, RemoteProcess},
    handle::{Handle, OwnedHandle, ThreadAccess},
    kernel::{INFINITE, WAIT_FAILED},
    marshal::{decode_context, encode_context, write_context_flags, CONTEXT_SIZE},
    thread::{ContextFlags, ThreadContext},
    Error, Kernel, Result,
};

/// An open thread.
///
/// The handle is closed when the value is dropped, unless it was
/// [`detach`](Self::detach)ed first.
#[derive(Debug)]
pub struct RemoteThread<'k> {
    handle: OwnedHandle<'k>,
    tid: u32,
}

impl<'k> RemoteThread<'k> {
    pub(crate) fn from_owned(handle: OwnedHandle<'k>, tid: u32) -> Self {
        Self { handle, tid }
    }

    /// Opens thread `tid` with full access.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThreadNotFound`] if no registered process has such a thread.
    pub fn open(kernel: &'k Kernel, tid: u32) -> Result<Self> {
        let handle = kernel.open_thread(ThreadAccess::ALL_ACCESS.bits(), tid);
        if handle.is_null() {
            error!("Failed to open thread {tid}");
            return Err(Error::ThreadNotFound(tid));
        }

        debug!("Opened thread {tid} as {handle}");
        Ok(Self::from_owned(OwnedHandle::new(kernel, handle), tid))
    }

    /// Wraps the current thread through its pseudo-handle.
    #[must_use]
    pub fn current(kernel: &'k Kernel) -> Self {
        Self::from_owned(
            OwnedHandle::new(kernel, Handle::CURRENT_THREAD),
            kernel.current_thread_id(),
        )
    }

    /// Starts a thread in `process`. Same as [`RemoteProcess::create_thread`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the process has exited.
    pub fn create(process: &RemoteProcess<'k>, start_address: u64, parameter: u64) -> Result<Self> {
        process.create_thread(start_address, parameter)
    }

    /// Returns the thread id.
    #[must_use]
    pub fn tid(&self) -> u32 {
        self.tid
    }

    /// Returns the owned handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandleClosed`] after [`close`](Self::close).
    pub fn handle(&self) -> Result<Handle> {
        if self.handle.is_open() {
            Ok(self.handle.get())
        } else {
            Err(Error::HandleClosed)
        }
    }

    /// Returns `true` while the handle is open.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.handle.is_open()
    }

    /// Closes the handle now. Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        debug!("Closing thread {}", self.tid);
        self.handle.close()
    }

    /// Releases the handle without closing it.
    #[must_use]
    pub fn detach(self) -> Handle {
        self.handle.detach()
    }

    fn kernel(&self) -> &'k Kernel {
        self.handle.kernel()
    }

    /// Suspends the thread and returns the previous suspend count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the thread is gone.
    pub fn suspend(&self) -> Result<u32> {
        let handle = self.handle()?;
        match self.kernel().suspend_thread(handle) {
            u32::MAX => Err(api_failed("SuspendThread", format!("thread {}", self.tid))),
            previous => Ok(previous),
        }
    }

    /// Resumes the thread and returns the remaining suspend count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the thread is gone.
    pub fn resume(&self) -> Result<u32> {
        let handle = self.handle()?;
        match self.kernel().resume_thread(handle) {
            u32::MAX => Err(api_failed("ResumeThread", format!("thread {}", self.tid))),
            remaining => Ok(remaining),
        }
    }

    /// Reads the register groups selected by `flags`.
    ///
    /// Registers outside the selected groups are zero in the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the thread is gone.
    pub fn context(&self, flags: ContextFlags) -> Result<ThreadContext> {
        let handle = self.handle()?;
        let mut buffer = vec![0u8; CONTEXT_SIZE];
        write_context_flags(&mut buffer, flags)?;

        if !self.kernel().get_thread_context(handle, &mut buffer) {
            return Err(api_failed("GetThreadContext", format!("thread {}", self.tid)));
        }
        decode_context(&buffer)
    }

    /// Writes the register groups selected by `context.context_flags`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the thread is gone.
    pub fn set_context(&self, context: &ThreadContext) -> Result<()> {
        let handle = self.handle()?;
        let mut buffer = vec![0u8; CONTEXT_SIZE];
        encode_context(context, &mut buffer)?;

        if !self.kernel().set_thread_context(handle, &buffer) {
            return Err(api_failed("SetThreadContext", format!("thread {}", self.tid)));
        }
        Ok(())
    }

    /// Waits for the thread. In the simulation this ends it with exit code 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if the handle no longer designates a thread.
    pub fn wait(&self) -> Result<()> {
        let handle = self.handle()?;
        if self.kernel().wait_for_single_object(handle, INFINITE) == WAIT_FAILED {
            error!("WaitForSingleObject failed on thread {}", self.tid);
            return Err(Error::InvalidHandle(handle.raw()));
        }
        Ok(())
    }

    /// Terminates the thread. A thread that already ended keeps its exit code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the thread is gone or already terminated.
    pub fn terminate(&self, exit_code: u32) -> Result<()> {
        let handle = self.handle()?;
        if !self.kernel().terminate_thread(handle, exit_code) {
            return Err(api_failed("TerminateThread", format!("thread {}", self.tid)));
        }
        Ok(())
    }

    /// Returns the exit code, `STILL_ACTIVE` while the thread runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the thread is gone.
    pub fn exit_code(&self) -> Result<u32> {
        let handle = self.handle()?;
        self.kernel()
            .exit_code_thread(handle)
            .ok_or_else(|| api_failed("GetExitCodeThread", format!("thread {}", self.tid)))
    }
}
