//! Module operations (`GetModuleHandle`, `GetProcAddress`, `GetModuleInformation`).
//!
//! A module handle (`HMODULE`) is the module's base address. Modules and exports are
//! looked up with insert-if-absent semantics in the current process.

use log::debug;
use widestring::U16CStr;

use crate::{
    handle::Handle,
    marshal::{encode_module_info, ModuleInfo, MODULE_INFO_SIZE},
    Kernel,
};

impl Kernel {
    /// Registers a module at an explicit base in the current process.
    ///
    /// Returns `false` if a module with that name is already loaded.
    pub fn register_module(&self, name: &str, base: u64, size: u32) -> bool {
        self.with_process_mut(self.current_process_id(), |process| {
            process.modules_mut().register(name, base, size)
        })
        .unwrap_or(false)
    }

    /// Returns the handle of module `name`, loading it if absent (`GetModuleHandleA`).
    ///
    /// Names are compared without regard to ASCII case. An empty name designates the
    /// current process's own image.
    pub fn get_module_handle(&self, name: &str) -> u64 {
        self.with_process_mut(self.current_process_id(), |process| {
            let image = if name.is_empty() {
                process.name().to_string()
            } else {
                name.to_string()
            };
            process.modules_mut().get_or_insert(&image).base()
        })
        .unwrap_or(0)
    }

    /// UTF-16 variant of [`get_module_handle`](Self::get_module_handle)
    /// (`GetModuleHandleW`).
    pub fn get_module_handle_w(&self, name: &U16CStr) -> u64 {
        self.get_module_handle(&name.to_string_lossy())
    }

    /// Loads module `name` and returns its handle (`LoadLibraryA`).
    ///
    /// Loading an already loaded module returns the existing handle.
    pub fn load_library(&self, name: &str) -> u64 {
        debug!("LoadLibrary({name})");
        self.get_module_handle(name)
    }

    /// Returns the address of export `name` of `module`, creating it if absent
    /// (`GetProcAddress`).
    ///
    /// Export names are case sensitive. Returns 0 if `module` is not the base of a
    /// module loaded in the current process.
    pub fn get_proc_address(&self, module: u64, name: &str) -> u64 {
        self.with_process_mut(self.current_process_id(), |process| {
            let stride = process.modules().layout().export_stride;
            process
                .modules_mut()
                .by_base_mut(module)
                .map(|found| found.export_or_insert(name, stride))
        })
        .flatten()
        .unwrap_or(0)
    }

    /// Writes a `MODULEINFO` record for `module` of the process `process` designates
    /// (`GetModuleInformation`).
    ///
    /// Fails if the handle is invalid, no module of that process has base `module`,
    /// or `buffer` is shorter than [`MODULE_INFO_SIZE`].
    pub fn get_module_information(&self, process: Handle, module: u64, buffer: &mut [u8]) -> bool {
        if buffer.len() < MODULE_INFO_SIZE {
            return false;
        }

        let info = self
            .with_target_process(process, |target| {
                target.modules().by_base(module).map(ModuleInfo::from)
            })
            .flatten();

        match info {
            Some(info) => encode_module_info(&info, buffer).is_ok(),
            None => false,
        }
    }
}
