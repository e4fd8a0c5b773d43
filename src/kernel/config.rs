//! Kernel configuration.
//!
//! [`KernelConfig`] carries every constant the simulated kernel bootstraps with: the
//! identity of the current and system processes, id numbering, memory placement and
//! the register values new threads start from. The defaults reproduce the host's
//! observable numbering closely enough for tools that print ids and addresses.
//!
//! # Example
//!
//! ```rust
//! use ntsim::{Kernel, KernelConfig};
//!
//! let config = KernelConfig::new()
//!     .with_current_process(4242, "injector.exe")
//!     .with_low_watermark(0x40_0000);
//! let kernel = Kernel::with_config(config);
//!
//! assert_eq!(kernel.current_process_id(), 4242);
//! assert_eq!(kernel.virtual_alloc(0, 0x1000, 0x3000, 0x04), 0x40_0000);
//! ```

use crate::{memory::DEFAULT_LOW_WATERMARK, module::ModuleLayout, thread::ThreadContext};

/// Configuration of a simulated kernel.
///
/// # Default Configuration
///
/// - current process `9999`, `CurrentTestRunner.exe`
/// - system process `4`, `System`
/// - created processes numbered from `8` in steps of `4`
/// - thread ids per process from `1000`
/// - hint-less allocations from `0x10000`
/// - on-demand modules from `0x7FF8_0000_0000`, `1MB` apart, `64KB` images
/// - new threads at `Rip = 0x7FF7_0000_1000`, `Rsp = 0xE0000`, `EFlags = 0x202`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelConfig {
    /// Id of the process the caller runs in.
    pub current_process_id: u32,

    /// Display name of the current process.
    pub current_process_name: String,

    /// Id of the system process registered at bootstrap.
    ///
    /// The system process has no threads.
    pub system_process_id: u32,

    /// Display name of the system process.
    pub system_process_name: String,

    /// Id given to the first process created after bootstrap.
    pub first_process_id: u32,

    /// Increment between consecutive created process ids.
    pub process_id_step: u32,

    /// First thread id of every process.
    pub thread_id_base: u32,

    /// Lowest address considered by hint-less allocations.
    pub low_watermark: u64,

    /// Placement of modules created on demand.
    pub modules: ModuleLayout,

    /// Instruction pointer of new threads created without a start address.
    pub initial_rip: u64,

    /// Stack pointer of new threads.
    pub initial_rsp: u64,

    /// Flags register of new threads.
    pub initial_eflags: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            current_process_id: 9999,
            current_process_name: "CurrentTestRunner.exe".to_string(),
            system_process_id: 4,
            system_process_name: "System".to_string(),
            first_process_id: 8,
            process_id_step: 4,
            thread_id_base: 1000,
            low_watermark: DEFAULT_LOW_WATERMARK,
            modules: ModuleLayout::default(),
            initial_rip: 0x7FF7_0000_1000,
            initial_rsp: 0xE0000,
            initial_eflags: 0x202,
        }
    }
}

impl KernelConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the id and name of the current process.
    #[must_use]
    pub fn with_current_process(mut self, id: u32, name: impl Into<String>) -> Self {
        self.current_process_id = id;
        self.current_process_name = name.into();
        self
    }

    /// Sets the id of the system process.
    #[must_use]
    pub fn with_system_process_id(mut self, id: u32) -> Self {
        self.system_process_id = id;
        self
    }

    /// Sets the first created process id and the step between ids.
    ///
    /// A step of zero is treated as one.
    #[must_use]
    pub fn with_process_ids(mut self, first: u32, step: u32) -> Self {
        self.first_process_id = first;
        self.process_id_step = step.max(1);
        self
    }

    /// Sets the first thread id of every process.
    #[must_use]
    pub fn with_thread_id_base(mut self, base: u32) -> Self {
        self.thread_id_base = base;
        self
    }

    /// Sets the lowest address hint-less allocations may return.
    #[must_use]
    pub fn with_low_watermark(mut self, address: u64) -> Self {
        self.low_watermark = address;
        self
    }

    /// Sets the placement of on-demand modules.
    #[must_use]
    pub fn with_modules(mut self, layout: ModuleLayout) -> Self {
        self.modules = layout;
        self
    }

    /// Sets the registers new threads start with.
    #[must_use]
    pub fn with_initial_registers(mut self, rip: u64, rsp: u64, eflags: u32) -> Self {
        self.initial_rip = rip;
        self.initial_rsp = rsp;
        self.initial_eflags = eflags;
        self
    }

    /// Builds the register file a new thread starts with.
    #[must_use]
    pub fn initial_context(&self) -> ThreadContext {
        ThreadContext::initial(self.initial_rip, self.initial_rsp, self.initial_eflags)
    }
}
