//! Client wrapper for a process.

use log::{debug, error};

use crate::{
    client::{api_failed, RemoteThread},
    handle::{Handle, OwnedHandle, ProcessAccess},
    marshal::{
        decode_memory_info, decode_module_info, ModuleInfo, MEMORY_BASIC_INFORMATION_SIZE,
        MODULE_INFO_SIZE,
    },
    memory::{AllocationType, FreeType, MemoryBasicInformation, PageProtection},
    Error, Kernel, Result,
};

/// An open process.
///
/// The handle is closed when the value is dropped, unless it was
/// [`detach`](Self::detach)ed first.
#[derive(Debug)]
pub struct RemoteProcess<'k> {
    handle: OwnedHandle<'k>,
    pid: u32,
}

impl<'k> RemoteProcess<'k> {
    /// Opens process `pid` with full access.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessNotFound`] if no such process is registered.
    pub fn open(kernel: &'k Kernel, pid: u32) -> Result<Self> {
        Self::open_with_access(kernel, pid, ProcessAccess::ALL_ACCESS)
    }

    /// Opens process `pid`, recording `access` on the handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessNotFound`] if no such process is registered.
    pub fn open_with_access(kernel: &'k Kernel, pid: u32, access: ProcessAccess) -> Result<Self> {
        let handle = kernel.open_process(access.bits(), pid);
        if handle.is_null() {
            error!("Failed to open process {pid}");
            return Err(Error::ProcessNotFound(pid));
        }

        debug!("Opened process {pid} as {handle}");
        Ok(Self {
            handle: OwnedHandle::new(kernel, handle),
            pid,
        })
    }

    /// Wraps the current process through its pseudo-handle.
    #[must_use]
    pub fn current(kernel: &'k Kernel) -> Self {
        Self {
            handle: OwnedHandle::new(kernel, Handle::CURRENT_PROCESS),
            pid: kernel.current_process_id(),
        }
    }

    /// Returns the process id.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
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
        debug!("Closing process {}", self.pid);
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

    /// Reads `size` bytes at `address`. Unreadable bytes come back as zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandleClosed`] or [`Error::ApiFailed`] if the process is gone.
    pub fn read(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let handle = self.handle()?;
        let mut buffer = vec![0u8; size];
        if !self
            .kernel()
            .read_process_memory(handle, address, &mut buffer)
        {
            return Err(api_failed(
                "ReadProcessMemory",
                format!("0x{address:X} ({size} bytes)"),
            ));
        }
        Ok(buffer)
    }

    /// Writes `data` at `address` and returns the number of bytes written.
    ///
    /// A write that stops at an unwritable page part way through still succeeds with
    /// the shorter count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if nothing could be written.
    pub fn write(&self, address: u64, data: &[u8]) -> Result<usize> {
        let handle = self.handle()?;
        let written = self.kernel().write_process_memory(handle, address, data);
        if written == 0 && !data.is_empty() {
            return Err(api_failed(
                "WriteProcessMemory",
                format!("0x{address:X} ({} bytes)", data.len()),
            ));
        }
        Ok(written)
    }

    /// Describes the page at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the query fails, or a marshalling error if the
    /// returned record cannot be decoded.
    pub fn query(&self, address: u64) -> Result<MemoryBasicInformation> {
        let handle = self.handle()?;
        let mut buffer = [0u8; MEMORY_BASIC_INFORMATION_SIZE];
        if self.kernel().virtual_query_ex(handle, address, &mut buffer) == 0 {
            return Err(api_failed("VirtualQueryEx", format!("0x{address:X}")));
        }
        decode_memory_info(&buffer)
    }

    /// Allocates committed memory and returns its base.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the allocation fails.
    pub fn alloc(&self, address: u64, size: usize, protect: PageProtection) -> Result<u64> {
        let handle = self.handle()?;
        let flags = AllocationType::COMMIT | AllocationType::RESERVE;
        match self
            .kernel()
            .virtual_alloc_ex(handle, address, size, flags.bits(), protect.bits())
        {
            0 => Err(api_failed(
                "VirtualAllocEx",
                format!("0x{address:X} ({size} bytes)"),
            )),
            base => Ok(base),
        }
    }

    /// Releases the page at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the release fails.
    pub fn free(&self, address: u64) -> Result<()> {
        let handle = self.handle()?;
        if !self
            .kernel()
            .virtual_free_ex(handle, address, 0, FreeType::Release.bits())
        {
            return Err(api_failed("VirtualFreeEx", format!("0x{address:X}")));
        }
        Ok(())
    }

    /// Changes the protection of `size` bytes at `address` and returns the old one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the first page is not allocated.
    pub fn protect(
        &self,
        address: u64,
        size: usize,
        protect: PageProtection,
    ) -> Result<PageProtection> {
        let handle = self.handle()?;
        self.kernel()
            .virtual_protect_ex(handle, address, size, protect.bits())
            .map(PageProtection::from_bits_retain)
            .ok_or_else(|| api_failed("VirtualProtectEx", format!("0x{address:X}")))
    }

    /// Returns base, size and entry point of the module whose handle is `module`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the process has no such module.
    pub fn module_info(&self, module: u64) -> Result<ModuleInfo> {
        let handle = self.handle()?;
        let mut buffer = [0u8; MODULE_INFO_SIZE];
        if !self
            .kernel()
            .get_module_information(handle, module, &mut buffer)
        {
            return Err(api_failed("GetModuleInformation", format!("0x{module:X}")));
        }
        decode_module_info(&buffer)
    }

    /// Starts a thread at `start_address` with `parameter` in `Rcx`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the process has exited.
    pub fn create_thread(&self, start_address: u64, parameter: u64) -> Result<RemoteThread<'k>> {
        let handle = self.handle()?;
        let (thread, tid) = self
            .kernel()
            .create_remote_thread(handle, start_address, parameter, 0)
            .ok_or_else(|| {
                api_failed(
                    "CreateRemoteThread",
                    format!("process {} at 0x{start_address:X}", self.pid),
                )
            })?;
        Ok(RemoteThread::from_owned(
            OwnedHandle::new(self.kernel(), thread),
            tid,
        ))
    }

    /// Terminates the process.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the process already exited.
    pub fn terminate(&self, exit_code: u32) -> Result<()> {
        let handle = self.handle()?;
        if !self.kernel().terminate_process(handle, exit_code) {
            return Err(api_failed("TerminateProcess", format!("process {}", self.pid)));
        }
        Ok(())
    }

    /// Returns the exit code, `STILL_ACTIVE` while the process runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiFailed`] if the process is gone.
    pub fn exit_code(&self) -> Result<u32> {
        let handle = self.handle()?;
        self.kernel()
            .exit_code_process(handle)
            .ok_or_else(|| api_failed("GetExitCodeProcess", format!("process {}", self.pid)))
    }
}
