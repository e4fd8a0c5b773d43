//! Per-process handle table.

use std::{collections::BTreeMap, fmt};

use log::trace;
use strum::Display;

/// Kind of object a handle designates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ObjectKind {
    /// A simulated process.
    Process,
    /// A simulated thread.
    Thread,
    /// A module loaded into a simulated process.
    Module,
    /// Any other kernel object the simulation only tracks by name.
    Other,
}

/// Non-owning reference from a handle entry to its target object.
///
/// Targets are named by id rather than held, so a handle outliving its object
/// (for example after the owning process was removed) resolves to nothing
/// instead of keeping the object alive.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    /// Process `pid`.
    Process {
        /// Process id.
        pid: u32,
    },
    /// Thread `tid` owned by process `pid`.
    Thread {
        /// Owning process id.
        pid: u32,
        /// Thread id.
        tid: u32,
    },
    /// Module `name` loaded into process `pid`.
    Module {
        /// Owning process id.
        pid: u32,
        /// Module name as registered.
        name: String,
    },
    /// An object with no simulated behavior, identified by a label.
    Other {
        /// Free-form label.
        label: String,
    },
}

impl ObjectRef {
    /// Returns the kind of the referenced object.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Process { .. } => ObjectKind::Process,
            Self::Thread { .. } => ObjectKind::Thread,
            Self::Module { .. } => ObjectKind::Module,
            Self::Other { .. } => ObjectKind::Other,
        }
    }
}

/// One entry of a [`HandleTable`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandleEntry {
    /// Handle value the entry is stored under.
    pub value: u64,
    /// Referenced object.
    pub object: ObjectRef,
    /// Access mask requested when the handle was created.
    pub access: u32,
}

impl HandleEntry {
    /// Returns the kind of the referenced object.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.object.kind()
    }
}

impl fmt::Display for HandleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:X} -> {} (access 0x{:X})",
            self.value,
            self.object.kind(),
            self.access
        )
    }
}

/// First value handed out by a fresh table.
const FIRST_HANDLE_VALUE: u64 = 4;

/// Distance between consecutive handle values.
const HANDLE_VALUE_STEP: u64 = 4;

/// Map from handle values to entries, owned by one process.
///
/// Values start at 4 and grow by 4. They are never reused within the table's
/// lifetime, so a closed value stays invalid.
///
/// # Example
///
/// ```rust
/// use ntsim::handle::{HandleTable, ObjectKind, ObjectRef};
///
/// let mut table = HandleTable::new();
/// let value = table.create(ObjectRef::Process { pid: 8 }, 0x1F_FFFF);
/// assert_eq!(value, 4);
/// assert_eq!(table.get(value).map(|e| e.kind()), Some(ObjectKind::Process));
///
/// assert!(table.close(value));
/// assert!(!table.close(value));
/// ```
#[derive(Clone, Debug)]
pub struct HandleTable {
    entries: BTreeMap<u64, HandleEntry>,
    next_value: u64,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_value: FIRST_HANDLE_VALUE,
        }
    }

    /// Stores a new entry and returns its handle value.
    pub fn create(&mut self, object: ObjectRef, access: u32) -> u64 {
        let value = self.next_value;
        self.next_value = self.next_value.wrapping_add(HANDLE_VALUE_STEP);

        let entry = HandleEntry {
            value,
            object,
            access,
        };
        trace!("handle {entry}");
        self.entries.insert(value, entry);
        value
    }

    /// Looks up the entry stored under `value`.
    #[must_use]
    pub fn get(&self, value: u64) -> Option<&HandleEntry> {
        self.entries.get(&value)
    }

    /// Removes the entry stored under `value`. Returns `false` if there was none.
    pub fn close(&mut self, value: u64) -> bool {
        self.entries.remove(&value).is_some()
    }

    /// Returns the number of open handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no handle is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over open entries in increasing handle order.
    pub fn iter(&self) -> impl Iterator<Item = &HandleEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_multiples_of_four() {
        let mut table = HandleTable::new();
        let a = table.create(ObjectRef::Process { pid: 4 }, 0);
        let b = table.create(ObjectRef::Thread { pid: 4, tid: 1000 }, 0);
        let c = table.create(
            ObjectRef::Other {
                label: "event".to_string(),
            },
            0,
        );
        assert_eq!((a, b, c), (4, 8, 12));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn closed_values_are_not_reused() {
        let mut table = HandleTable::new();
        let a = table.create(ObjectRef::Process { pid: 4 }, 0);
        assert!(table.close(a));
        let b = table.create(ObjectRef::Process { pid: 4 }, 0);
        assert_ne!(a, b);
        assert!(table.get(a).is_none());
        assert!(!table.is_empty());
    }

    #[test]
    fn entry_kind_and_access() {
        let mut table = HandleTable::new();
        let value = table.create(
            ObjectRef::Module {
                pid: 9999,
                name: "ntdll.dll".to_string(),
            },
            0x10,
        );
        let entry = table.get(value).unwrap();
        assert_eq!(entry.kind(), ObjectKind::Module);
        assert_eq!(entry.access, 0x10);
        assert_eq!(entry.value, value);
    }

    #[test]
    fn close_unknown_value() {
        let mut table = HandleTable::new();
        assert!(!table.close(0));
        assert!(!table.close(0x1234));
    }

    #[test]
    fn iter_in_order() {
        let mut table = HandleTable::new();
        for pid in [12, 8, 4] {
            table.create(ObjectRef::Process { pid }, 0);
        }
        let pids: Vec<_> = table
            .iter()
            .map(|entry| match entry.object {
                ObjectRef::Process { pid } => pid,
                _ => 0,
            })
            .collect();
        assert_eq!(pids, [12, 8, 4]);
    }
}
