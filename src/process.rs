//! Simulated processes.
//!
//! A [`Process`] exclusively owns one [`MemorySpace`], one [`HandleTable`], its threads
//! and its modules. Processes are created and owned by the [`Kernel`](crate::Kernel);
//! everything else refers to them by id.

use std::collections::BTreeMap;

use log::debug;

use crate::{
    handle::HandleTable,
    kernel::KernelConfig,
    memory::MemorySpace,
    module::ModuleTable,
    thread::{Thread, ThreadContext, STILL_ACTIVE},
};

/// A simulated process.
#[derive(Clone, Debug)]
pub struct Process {
    id: u32,
    name: String,
    memory: MemorySpace,
    handles: HandleTable,
    threads: BTreeMap<u32, Thread>,
    modules: ModuleTable,
    exit_code: Option<u32>,
    next_thread_id: u32,
    initial_context: ThreadContext,
}

impl Process {
    /// Creates a process with no threads, using the numbering and placement of `config`.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, config: &KernelConfig) -> Self {
        Self {
            id,
            name: name.into(),
            memory: MemorySpace::with_low_watermark(config.low_watermark),
            handles: HandleTable::new(),
            threads: BTreeMap::new(),
            modules: ModuleTable::new(config.modules),
            exit_code: None,
            next_thread_id: config.thread_id_base,
            initial_context: config.initial_context(),
        }
    }

    /// Returns the process id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the address space.
    #[must_use]
    pub fn memory(&self) -> &MemorySpace {
        &self.memory
    }

    /// Returns the address space for modification.
    pub fn memory_mut(&mut self) -> &mut MemorySpace {
        &mut self.memory
    }

    /// Returns the handle table.
    #[must_use]
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Returns the handle table for modification.
    pub fn handles_mut(&mut self) -> &mut HandleTable {
        &mut self.handles
    }

    /// Returns the module table.
    #[must_use]
    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    /// Returns the module table for modification.
    pub fn modules_mut(&mut self) -> &mut ModuleTable {
        &mut self.modules
    }

    /// Creates a new, not yet started thread and returns it.
    ///
    /// Thread ids come from a per-process ascending sequence.
    pub fn create_thread(&mut self) -> &mut Thread {
        let tid = self.next_thread_id;
        self.next_thread_id = self.next_thread_id.wrapping_add(1);
        debug!("thread {tid} created in process {}", self.id);

        self.threads
            .entry(tid)
            .or_insert_with(|| Thread::new(tid, self.id, self.initial_context.clone()))
    }

    /// Looks up a thread by id.
    #[must_use]
    pub fn thread(&self, tid: u32) -> Option<&Thread> {
        self.threads.get(&tid)
    }

    /// Looks up a thread by id for modification.
    pub fn thread_mut(&mut self, tid: u32) -> Option<&mut Thread> {
        self.threads.get_mut(&tid)
    }

    /// Returns the lowest thread id, which is the first thread created.
    #[must_use]
    pub fn main_thread_id(&self) -> Option<u32> {
        self.threads.keys().next().copied()
    }

    /// Iterates over threads in increasing id order.
    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.threads.values()
    }

    /// Returns the number of threads.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Returns `true` until the process has terminated.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.exit_code.is_none()
    }

    /// Returns the exit code, or [`STILL_ACTIVE`] while running.
    #[must_use]
    pub fn exit_code(&self) -> u32 {
        self.exit_code.unwrap_or(STILL_ACTIVE)
    }

    /// Terminates the process.
    ///
    /// Sets the exit code and drops all threads. Memory, modules and handles are left
    /// in place. Returns `false` if the process had already terminated.
    pub fn terminate(&mut self, exit_code: u32) -> bool {
        if self.exit_code.is_some() {
            return false;
        }

        debug!("process {} ({}) exited with {exit_code}", self.id, self.name);
        self.exit_code = Some(exit_code);
        self.threads.clear();
        true
    }
}
