//! Modules loaded into a simulated process.
//!
//! Modules and their exports materialize on first lookup. Both tiers are explicit
//! insert-if-absent operations, so the addresses a lookup returns depend only on the
//! order of first lookups and never change afterwards.

use std::collections::HashMap;

use log::debug;

/// Offset of the reported entry point from a module's base.
pub const ENTRY_POINT_RVA: u64 = 0x1000;

/// Placement parameters for modules created on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleLayout {
    /// Base of the first module created on demand.
    pub first_base: u64,
    /// Distance between consecutive on-demand module bases.
    pub base_stride: u64,
    /// Image size reported for on-demand modules.
    pub image_size: u32,
    /// Distance between consecutive export addresses.
    pub export_stride: u64,
}

impl Default for ModuleLayout {
    fn default() -> Self {
        Self {
            first_base: 0x7FF8_0000_0000,
            base_stride: 0x10_0000,
            image_size: 0x1_0000,
            export_stride: 0x10,
        }
    }
}

/// A module loaded into a simulated process.
#[derive(Clone, Debug)]
pub struct Module {
    id: u32,
    name: String,
    base: u64,
    size: u32,
    exports: HashMap<String, u64>,
}

impl Module {
    /// Creates a module with an empty export directory.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, base: u64, size: u32) -> Self {
        Self {
            id,
            name: name.into(),
            base,
            size,
            exports: HashMap::new(),
        }
    }

    /// Returns the module id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the name the module was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the base address, which doubles as the module handle.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Returns the image size.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns the entry point address.
    #[must_use]
    pub fn entry_point(&self) -> u64 {
        self.base.wrapping_add(ENTRY_POINT_RVA)
    }

    /// Looks up an export without creating it. Names are case sensitive.
    #[must_use]
    pub fn export(&self, name: &str) -> Option<u64> {
        self.exports.get(name).copied()
    }

    /// Returns the number of exports.
    #[must_use]
    pub fn export_count(&self) -> usize {
        self.exports.len()
    }

    /// Records an export at `base + offset`, replacing any previous address.
    pub fn add_export(&mut self, name: impl Into<String>, offset: u64) -> u64 {
        let address = self.base.wrapping_add(offset);
        self.exports.insert(name.into(), address);
        address
    }

    /// Returns the export `name`, creating it if absent.
    ///
    /// A new export is placed at `base + stride * (export_count + 1)`.
    pub fn export_or_insert(&mut self, name: &str, stride: u64) -> u64 {
        if let Some(address) = self.export(name) {
            return address;
        }

        let slot = self.exports.len() as u64 + 1;
        let address = self.add_export(name, stride.wrapping_mul(slot));
        debug!("export {}!{name} at 0x{address:X}", self.name);
        address
    }
}

/// Modules of one process, keyed by case-insensitive name.
#[derive(Clone, Debug)]
pub struct ModuleTable {
    modules: HashMap<String, Module>,
    layout: ModuleLayout,
    next_id: u32,
    next_base: u64,
}

impl Default for ModuleTable {
    fn default() -> Self {
        Self::new(ModuleLayout::default())
    }
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl ModuleTable {
    /// Creates an empty table placing on-demand modules according to `layout`.
    #[must_use]
    pub fn new(layout: ModuleLayout) -> Self {
        Self {
            modules: HashMap::new(),
            layout,
            next_id: 1,
            next_base: layout.first_base,
        }
    }

    /// Returns the placement parameters.
    #[must_use]
    pub fn layout(&self) -> ModuleLayout {
        self.layout
    }

    /// Returns the number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no module is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Looks up a module by name, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(&key(name))
    }

    /// Looks up a module by name for modification.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.get_mut(&key(name))
    }

    /// Looks up a module by base address.
    #[must_use]
    pub fn by_base(&self, base: u64) -> Option<&Module> {
        self.modules.values().find(|module| module.base == base)
    }

    /// Looks up a module by base address for modification.
    pub fn by_base_mut(&mut self, base: u64) -> Option<&mut Module> {
        self.modules.values_mut().find(|module| module.base == base)
    }

    /// Registers a module at an explicit base and size.
    ///
    /// Returns `false` and leaves the table unchanged if the name is taken.
    pub fn register(&mut self, name: &str, base: u64, size: u32) -> bool {
        let slot = key(name);
        if self.modules.contains_key(&slot) {
            return false;
        }

        let id = self.take_id();
        debug!("module {name} registered at 0x{base:X} size 0x{size:X}");
        self.modules.insert(slot, Module::new(id, name, base, size));
        true
    }

    /// Returns the module `name`, creating it at the next on-demand base if absent.
    pub fn get_or_insert(&mut self, name: &str) -> &mut Module {
        let Self {
            modules,
            layout,
            next_id,
            next_base,
        } = self;

        modules.entry(key(name)).or_insert_with(|| {
            let id = *next_id;
            *next_id = next_id.wrapping_add(1);
            let base = *next_base;
            *next_base = base.wrapping_add(layout.base_stride);

            debug!("module {name} loaded at 0x{base:X}");
            Module::new(id, name, base, layout.image_size)
        })
    }

    /// Iterates over the modules in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }
}
