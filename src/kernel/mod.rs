//! The simulated kernel: process registry and handle resolution.
//!
//! [`Kernel`] is the single entry point of the simulation. It owns every [`Process`],
//! decides whether a handle names the current process or thread (pseudo-handles) or a
//! table entry, and exposes the host API families as methods:
//!
//! | Family | Methods |
//! |--------|---------|
//! | Process | [`open_process`](Kernel::open_process), [`process_id`](Kernel::process_id), [`terminate_process`](Kernel::terminate_process), [`close_handle`](Kernel::close_handle) |
//! | Memory | [`virtual_alloc`](Kernel::virtual_alloc), [`virtual_free`](Kernel::virtual_free), [`virtual_protect`](Kernel::virtual_protect), [`read_process_memory`](Kernel::read_process_memory), [`write_process_memory`](Kernel::write_process_memory), [`virtual_query`](Kernel::virtual_query) |
//! | Thread | [`open_thread`](Kernel::open_thread), [`suspend_thread`](Kernel::suspend_thread), [`resume_thread`](Kernel::resume_thread), [`get_thread_context`](Kernel::get_thread_context), [`create_thread`](Kernel::create_thread) |
//! | Module | [`get_module_handle`](Kernel::get_module_handle), [`get_proc_address`](Kernel::get_proc_address), [`get_module_information`](Kernel::get_module_information) |
//! | Sync | [`wait_for_single_object`](Kernel::wait_for_single_object) |
//!
//! Failures are reported the way the host reports them: a null handle, `0`, `false`,
//! `u32::MAX` or a wait code. Nothing in this module returns [`crate::Error`].
//!
//! # Handle Model
//!
//! Every handle minted by any operation is stored in the *current* process's table,
//! even when it designates an object of another process. Entries reference their
//! target by id, so a handle to a removed process resolves to nothing.
//!
//! # Concurrency
//!
//! `Kernel` is `Send + Sync`. Processes live in a [`DashMap`], so each process is
//! guarded by its shard lock, and id counters are atomics. Operations resolve a
//! handle to ids first and release that guard before touching the target, so no
//! operation holds two process guards at once.
//!
//! # Example
//!
//! ```rust
//! use ntsim::{handle::ProcessAccess, Kernel};
//!
//! let kernel = Kernel::new();
//! let pid = kernel.create_process("notepad.exe");
//! let process = kernel.open_process(ProcessAccess::ALL_ACCESS.bits(), pid);
//!
//! let base = kernel.virtual_alloc_ex(process, 0, 0x1000, 0x3000, 0x04);
//! assert_eq!(kernel.write_process_memory(process, base, b"TEST"), 4);
//!
//! let mut buf = [0u8; 4];
//! assert!(kernel.read_process_memory(process, base, &mut buf));
//! assert_eq!(&buf, b"TEST");
//! assert!(kernel.close_handle(process));
//! ```

mod config;
mod memory;
mod module;
mod thread;

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::{mapref::entry::Entry, DashMap};
use log::{debug, warn};

use crate::{
    handle::{Handle, HandleEntry, ObjectKind, ObjectRef, PseudoHandle},
    process::Process,
    thread::Thread,
};

pub use config::KernelConfig;

/// The waited-on object is signaled.
pub const WAIT_OBJECT_0: u32 = 0;

/// The wait timed out before the object was signaled.
pub const WAIT_TIMEOUT: u32 = 0x102;

/// The handle cannot be waited on.
pub const WAIT_FAILED: u32 = u32::MAX;

/// Timeout value meaning "no timeout".
pub const INFINITE: u32 = u32::MAX;

/// Creation flag keeping a new thread suspended.
pub const CREATE_SUSPENDED: u32 = 0x4;

/// Outcome of resolving a handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    /// The current-process pseudo-handle.
    CurrentProcess,
    /// The current-thread pseudo-handle.
    CurrentThread,
    /// An entry of the current process's handle table.
    Entry(HandleEntry),
}

impl Resolved {
    /// Returns the kind of object the handle designates.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::CurrentProcess => ObjectKind::Process,
            Self::CurrentThread => ObjectKind::Thread,
            Self::Entry(entry) => entry.kind(),
        }
    }
}

/// A simulated kernel.
///
/// Each instance is an independent simulation; tests can create as many as they like.
#[derive(Debug)]
pub struct Kernel {
    config: KernelConfig,
    processes: DashMap<u32, Process>,
    next_pid: AtomicU32,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Creates a kernel with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    /// Creates a kernel with the given configuration.
    ///
    /// Registers the system process (no threads) and the current process with one
    /// running thread.
    #[must_use]
    pub fn with_config(config: KernelConfig) -> Self {
        let processes = DashMap::new();

        let system = Process::new(
            config.system_process_id,
            config.system_process_name.clone(),
            &config,
        );
        processes.insert(config.system_process_id, system);

        let mut current = Process::new(
            config.current_process_id,
            config.current_process_name.clone(),
            &config,
        );
        current.create_thread().start();
        processes.insert(config.current_process_id, current);

        debug!(
            "kernel up: current process {} ({})",
            config.current_process_id, config.current_process_name
        );

        Self {
            next_pid: AtomicU32::new(config.first_process_id),
            config,
            processes,
        }
    }

    /// Returns the configuration the kernel was created with.
    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Returns the id of the current process (`GetCurrentProcessId`).
    #[must_use]
    pub fn current_process_id(&self) -> u32 {
        self.config.current_process_id
    }

    /// Returns the current-process pseudo-handle (`GetCurrentProcess`).
    #[must_use]
    pub fn current_process(&self) -> Handle {
        Handle::CURRENT_PROCESS
    }

    /// Registers a new process and returns its id.
    ///
    /// Ids are handed out from the configured first id in configured steps, skipping
    /// ids already in use.
    pub fn create_process(&self, name: &str) -> u32 {
        let step = self.config.process_id_step.max(1);
        loop {
            let pid = self.next_pid.fetch_add(step, Ordering::Relaxed);
            if let Entry::Vacant(slot) = self.processes.entry(pid) {
                slot.insert(Process::new(pid, name, &self.config));
                debug!("process {pid} ({name}) created");
                return pid;
            }
        }
    }

    /// Removes a process from the registry.
    ///
    /// Handles referencing it stay in their tables and resolve to nothing from now
    /// on. The current process cannot be removed.
    pub fn remove_process(&self, pid: u32) -> bool {
        if pid == self.current_process_id() {
            warn!("refusing to remove the current process {pid}");
            return false;
        }
        self.processes.remove(&pid).is_some()
    }

    /// Returns the ids of all registered processes in ascending order.
    #[must_use]
    pub fn process_ids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.processes.iter().map(|entry| *entry.key()).collect();
        pids.sort_unstable();
        pids
    }

    /// Runs `f` on process `pid`.
    ///
    /// The process is locked while `f` runs; `f` must not call back into the kernel.
    pub fn with_process<R>(&self, pid: u32, f: impl FnOnce(&Process) -> R) -> Option<R> {
        self.processes.get(&pid).map(|process| f(&*process))
    }

    /// Runs `f` on process `pid` with write access.
    ///
    /// The process is locked while `f` runs; `f` must not call back into the kernel.
    pub fn with_process_mut<R>(&self, pid: u32, f: impl FnOnce(&mut Process) -> R) -> Option<R> {
        self.processes
            .get_mut(&pid)
            .map(|mut process| f(&mut *process))
    }

    /// Stores a handle to `object` in the current process's table.
    ///
    /// Returns [`Handle::NULL`] only if the current process is gone.
    pub fn create_handle(&self, object: ObjectRef, access: u32) -> Handle {
        self.with_process_mut(self.current_process_id(), |process| {
            process.handles_mut().create(object, access)
        })
        .map_or(Handle::NULL, Handle::Table)
    }

    /// Opens a handle to process `pid` (`OpenProcess`).
    ///
    /// Returns [`Handle::NULL`] if no such process is registered.
    pub fn open_process(&self, access: u32, pid: u32) -> Handle {
        if !self.processes.contains_key(&pid) {
            debug!("open_process: no process {pid}");
            return Handle::NULL;
        }
        self.create_handle(ObjectRef::Process { pid }, access)
    }

    /// Closes a handle (`CloseHandle`).
    ///
    /// Pseudo-handles always close successfully without touching the table. Closing
    /// a table handle twice fails the second time.
    pub fn close_handle(&self, handle: Handle) -> bool {
        match handle {
            Handle::Pseudo(_) => true,
            Handle::Table(value) => self
                .with_process_mut(self.current_process_id(), |process| {
                    process.handles_mut().close(value)
                })
                .unwrap_or(false),
        }
    }

    /// Resolves a handle against the pseudo-handles and the current process's table.
    #[must_use]
    pub fn resolve(&self, handle: Handle) -> Option<Resolved> {
        match handle {
            Handle::Pseudo(PseudoHandle::CurrentProcess) => Some(Resolved::CurrentProcess),
            Handle::Pseudo(PseudoHandle::CurrentThread) => Some(Resolved::CurrentThread),
            Handle::Table(value) => self
                .with_process(self.current_process_id(), |process| {
                    process.handles().get(value).cloned()
                })
                .flatten()
                .map(Resolved::Entry),
        }
    }

    /// Returns the id of the live process `handle` designates.
    pub(crate) fn process_target(&self, handle: Handle) -> Option<u32> {
        let pid = match self.resolve(handle)? {
            Resolved::CurrentProcess => self.current_process_id(),
            Resolved::Entry(HandleEntry {
                object: ObjectRef::Process { pid },
                ..
            }) => pid,
            _ => return None,
        };
        self.processes.contains_key(&pid).then_some(pid)
    }

    /// Returns `(pid, tid)` of the live thread `handle` designates.
    pub(crate) fn thread_target(&self, handle: Handle) -> Option<(u32, u32)> {
        let (pid, tid) = match self.resolve(handle)? {
            Resolved::CurrentThread => (self.current_process_id(), self.current_thread_id()),
            Resolved::Entry(HandleEntry {
                object: ObjectRef::Thread { pid, tid },
                ..
            }) => (pid, tid),
            _ => return None,
        };

        self.with_process(pid, |process| process.thread(tid).is_some())
            .unwrap_or(false)
            .then_some((pid, tid))
    }

    /// Runs `f` on the process `handle` designates.
    pub(crate) fn with_target_process<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(&Process) -> R,
    ) -> Option<R> {
        let pid = self.process_target(handle)?;
        self.with_process(pid, f)
    }

    /// Runs `f` on the process `handle` designates, with write access.
    pub(crate) fn with_target_process_mut<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut Process) -> R,
    ) -> Option<R> {
        let pid = self.process_target(handle)?;
        self.with_process_mut(pid, f)
    }

    /// Runs `f` on the thread `handle` designates, with write access.
    pub(crate) fn with_target_thread_mut<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut Thread) -> R,
    ) -> Option<R> {
        let (pid, tid) = self.thread_target(handle)?;
        self.with_process_mut(pid, |process| process.thread_mut(tid).map(f))
            .flatten()
    }

    /// Returns the id of the process `handle` designates, or 0 (`GetProcessId`).
    #[must_use]
    pub fn process_id(&self, handle: Handle) -> u32 {
        self.process_target(handle).unwrap_or(0)
    }

    /// Terminates the process `handle` designates (`TerminateProcess`).
    ///
    /// Its threads are dropped; memory and handles stay. Fails for an invalid handle or
    /// an already terminated process.
    pub fn terminate_process(&self, handle: Handle, exit_code: u32) -> bool {
        self.with_target_process_mut(handle, |process| process.terminate(exit_code))
            .unwrap_or(false)
    }

    /// Returns the exit code of a process, `STILL_ACTIVE` while it runs
    /// (`GetExitCodeProcess`).
    #[must_use]
    pub fn exit_code_process(&self, handle: Handle) -> Option<u32> {
        self.with_target_process(handle, Process::exit_code)
    }

    /// Waits for an object (`WaitForSingleObject`).
    ///
    /// The timeout is ignored. A thread is terminated with exit code 0 and the wait
    /// returns [`WAIT_OBJECT_0`]. A process is signaled once it has exited; a running
    /// one yields [`WAIT_TIMEOUT`]. Anything else yields [`WAIT_FAILED`].
    pub fn wait_for_single_object(&self, handle: Handle, _timeout_ms: u32) -> u32 {
        match self.resolve(handle).map(|resolved| resolved.kind()) {
            Some(ObjectKind::Thread) => self
                .with_target_thread_mut(handle, Thread::wait)
                .map_or(WAIT_FAILED, |()| WAIT_OBJECT_0),
            Some(ObjectKind::Process) => {
                match self.with_target_process(handle, Process::is_running) {
                    Some(true) => WAIT_TIMEOUT,
                    Some(false) => WAIT_OBJECT_0,
                    None => WAIT_FAILED,
                }
            }
            _ => {
                warn!("wait on {handle}: not a waitable object");
                WAIT_FAILED
            }
        }
    }
}
