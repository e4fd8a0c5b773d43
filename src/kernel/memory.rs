//! Virtual memory operations (`VirtualAlloc`, `ReadProcessMemory`, ...).
//!
//! Each operation comes in a current-process form and an `_ex` form that takes a
//! process handle. Flag arguments are the host's raw `u32` values; unknown bits are
//! carried along unchanged.

use log::warn;

use crate::{
    handle::Handle,
    marshal::{encode_memory_info, MEMORY_BASIC_INFORMATION_SIZE},
    memory::{AllocationType, PageProtection},
    Kernel,
};

impl Kernel {
    /// Allocates memory in the current process (`VirtualAlloc`).
    ///
    /// See [`virtual_alloc_ex`](Self::virtual_alloc_ex).
    pub fn virtual_alloc(
        &self,
        address: u64,
        size: usize,
        allocation_type: u32,
        protect: u32,
    ) -> u64 {
        self.virtual_alloc_ex(Handle::CURRENT_PROCESS, address, size, allocation_type, protect)
    }

    /// Allocates memory in the process `process` designates (`VirtualAllocEx`).
    ///
    /// With `address == 0` the lowest free run of pages is used; otherwise the
    /// address is aligned down and used without overlap checks. Returns the base
    /// address, or 0 if the handle does not designate a process.
    pub fn virtual_alloc_ex(
        &self,
        process: Handle,
        address: u64,
        size: usize,
        allocation_type: u32,
        protect: u32,
    ) -> u64 {
        self.with_target_process_mut(process, |target| {
            target.memory_mut().allocate(
                address,
                size,
                AllocationType::from_bits_retain(allocation_type),
                PageProtection::from_bits_retain(protect),
            )
        })
        .unwrap_or_else(|| {
            warn!("VirtualAllocEx: invalid process handle {process}");
            0
        })
    }

    /// Decommits or releases memory in the current process (`VirtualFree`).
    pub fn virtual_free(&self, address: u64, size: usize, free_type: u32) -> bool {
        self.virtual_free_ex(Handle::CURRENT_PROCESS, address, size, free_type)
    }

    /// Decommits or releases memory in the process `process` designates (`VirtualFreeEx`).
    ///
    /// `free_type` must be `MEM_DECOMMIT` or `MEM_RELEASE`. Releasing with a size of 0
    /// removes only the page containing `address`.
    pub fn virtual_free_ex(
        &self,
        process: Handle,
        address: u64,
        size: usize,
        free_type: u32,
    ) -> bool {
        self.with_target_process_mut(process, |target| {
            target.memory_mut().free(address, size, free_type)
        })
        .unwrap_or(false)
    }

    /// Changes page protection in the current process (`VirtualProtect`).
    pub fn virtual_protect(&self, address: u64, size: usize, protect: u32) -> Option<u32> {
        self.virtual_protect_ex(Handle::CURRENT_PROCESS, address, size, protect)
    }

    /// Changes page protection in the process `process` designates (`VirtualProtectEx`).
    ///
    /// Returns the previous protection of the first page, or `None` if the handle is
    /// invalid or the first page is not allocated.
    pub fn virtual_protect_ex(
        &self,
        process: Handle,
        address: u64,
        size: usize,
        protect: u32,
    ) -> Option<u32> {
        self.with_target_process_mut(process, |target| {
            target
                .memory_mut()
                .protect(address, size, PageProtection::from_bits_retain(protect))
        })
        .flatten()
        .map(|old| old.bits())
    }

    /// Reads `len` bytes from the current process.
    ///
    /// Unreadable bytes come back as zero.
    #[must_use]
    pub fn read_memory(&self, address: u64, len: usize) -> Vec<u8> {
        self.with_process(self.current_process_id(), |target| {
            target.memory().read(address, len)
        })
        .unwrap_or_else(|| vec![0; len])
    }

    /// Writes `data` into the current process and returns the number of bytes written.
    pub fn write_memory(&self, address: u64, data: &[u8]) -> usize {
        self.write_process_memory(Handle::CURRENT_PROCESS, address, data)
    }

    /// Fills `buffer` from the memory of the process `process` designates
    /// (`ReadProcessMemory`).
    ///
    /// The read is best effort: unreadable bytes come back as zero and the call still
    /// succeeds. Fails only for an invalid handle, leaving `buffer` unchanged.
    pub fn read_process_memory(&self, process: Handle, address: u64, buffer: &mut [u8]) -> bool {
        let len = buffer.len();
        let Some(data) = self.with_target_process(process, |target| target.memory().read(address, len))
        else {
            warn!("ReadProcessMemory: invalid process handle {process}");
            return false;
        };

        buffer.copy_from_slice(&data);
        true
    }

    /// Writes `data` into the process `process` designates (`WriteProcessMemory`).
    ///
    /// Returns the number of bytes written before the first unwritable page, or 0 for
    /// an invalid handle.
    pub fn write_process_memory(&self, process: Handle, address: u64, data: &[u8]) -> usize {
        self.with_target_process_mut(process, |target| target.memory_mut().write(address, data))
            .unwrap_or_else(|| {
                warn!("WriteProcessMemory: invalid process handle {process}");
                0
            })
    }

    /// Describes the page at `address` of the current process (`VirtualQuery`).
    pub fn virtual_query(&self, address: u64, buffer: &mut [u8]) -> usize {
        self.virtual_query_ex(Handle::CURRENT_PROCESS, address, buffer)
    }

    /// Describes the page at `address` of the process `process` designates
    /// (`VirtualQueryEx`).
    ///
    /// Writes a `MEMORY_BASIC_INFORMATION` record into `buffer` and returns its size.
    /// Returns 0 and leaves `buffer` unchanged for an invalid handle or a buffer
    /// shorter than the record.
    pub fn virtual_query_ex(&self, process: Handle, address: u64, buffer: &mut [u8]) -> usize {
        if buffer.len() < MEMORY_BASIC_INFORMATION_SIZE {
            return 0;
        }

        let Some(info) = self.with_target_process(process, |target| target.memory().query(address))
        else {
            return 0;
        };

        match encode_memory_info(&info, buffer) {
            Ok(()) => MEMORY_BASIC_INFORMATION_SIZE,
            Err(_) => 0,
        }
    }
}
