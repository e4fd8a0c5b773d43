//! `MODULEINFO` record.
//!
//! The simulation uses a packed 64-bit layout: `lpBaseOfDll` at 0 (8 bytes),
//! `SizeOfImage` at 8 (4 bytes) and `EntryPoint` at 12 (8 bytes). Callers pass a
//! buffer of at least [`MODULE_INFO_SIZE`] bytes.

use crate::{
    marshal::io::{read_le_at, write_le_at},
    module::Module,
    Error::OutOfBounds,
    Result,
};

/// Buffer size required for a `MODULEINFO` record.
pub const MODULE_INFO_SIZE: usize = 24;

/// Snapshot of a module as reported by `GetModuleInformation`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Base address of the module.
    pub base_of_dll: u64,
    /// Size of the image in bytes.
    pub size_of_image: u32,
    /// Entry point address.
    pub entry_point: u64,
}

impl From<&Module> for ModuleInfo {
    fn from(module: &Module) -> Self {
        Self {
            base_of_dll: module.base(),
            size_of_image: module.size(),
            entry_point: module.entry_point(),
        }
    }
}

/// Writes `info` into `buffer`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `buffer` is shorter than
/// [`MODULE_INFO_SIZE`]. The buffer is left unchanged in that case.
pub fn encode_module_info(info: &ModuleInfo, buffer: &mut [u8]) -> Result<()> {
    if buffer.len() < MODULE_INFO_SIZE {
        return Err(OutOfBounds);
    }

    let mut offset = 0;
    write_le_at(buffer, &mut offset, info.base_of_dll)?;
    write_le_at(buffer, &mut offset, info.size_of_image)?;
    write_le_at(buffer, &mut offset, info.entry_point)?;
    Ok(())
}

/// Reads a record written by [`encode_module_info`].
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `buffer` is shorter than
/// [`MODULE_INFO_SIZE`].
pub fn decode_module_info(buffer: &[u8]) -> Result<ModuleInfo> {
    if buffer.len() < MODULE_INFO_SIZE {
        return Err(OutOfBounds);
    }

    let mut offset = 0;
    Ok(ModuleInfo {
        base_of_dll: read_le_at(buffer, &mut offset)?,
        size_of_image: read_le_at(buffer, &mut offset)?,
        entry_point: read_le_at(buffer, &mut offset)?,
    })
}
