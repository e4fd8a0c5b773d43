//! Low-level little-endian reading and writing utilities for fixed-layout records.
//!
//! Every record the simulation hands across the API boundary is a packed sequence of
//! little-endian integers at fixed offsets. This module provides the bounds-checked
//! primitives the record codecs in [`crate::marshal`] are written on.
//!
//! # Key Components
//!
//! - [`crate::marshal::io::WireIO`] - Trait implemented by every primitive a record field can hold
//! - [`crate::marshal::io::read_le_at`] / [`crate::marshal::io::write_le_at`] - Typed access at an
//!   offset that auto-advances
//! - [`crate::marshal::io::read_bytes_at`] / [`crate::marshal::io::write_bytes_at`] - Raw byte
//!   ranges such as the floating point save area
//!
//! # Usage Examples
//!
//! ```rust
//! use ntsim::marshal::io::{read_le_at, write_le_at};
//!
//! let mut data = [0u8; 12];
//! let mut offset = 0;
//! write_le_at(&mut data, &mut offset, 0x1122_3344_5566_7788u64)?;
//! write_le_at(&mut data, &mut offset, 7u32)?;
//! assert_eq!(offset, 12);
//!
//! let mut offset = 8;
//! let value: u32 = read_le_at(&data, &mut offset)?;
//! assert_eq!(value, 7);
//! # Ok::<(), ntsim::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All functions return [`crate::Error::OutOfBounds`] if the buffer is too short to
//! hold the value at the requested offset. Nothing is written in that case.

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive types that can be stored in a little-endian record field.
///
/// Each implementation names the fixed-size byte array that backs the type
/// (e.g. `[u8; 4]` for `u32`) and converts to and from it.
pub trait WireIO: Sized {
    /// Byte array representation of the type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_wire_io {
    ($($ty:ty => $len:literal),* $(,)?) => {
        $(
            impl WireIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_wire_io! {
    u8 => 1,
    u16 => 2,
    u32 => 4,
    u64 => 8,
    i64 => 8,
}

/// Reads a little-endian value of type `T` from the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: WireIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Reads a little-endian value of type `T` at `offset` and advances the offset.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position (advanced after reading)
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at<T: WireIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset.checked_add(type_len).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Writes `value` in little-endian byte order at the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn write_le<T: WireIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_le_at(data, &mut offset, value)
}

/// Writes `value` in little-endian byte order at `offset` and advances the offset.
///
/// # Arguments
///
/// * `data` - The mutable byte buffer to write to
/// * `offset` - Mutable reference to the offset position (advanced after writing)
/// * `value` - The value to write
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn write_le_at<T: WireIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    write_bytes_at(data, offset, bytes.as_ref())
}

/// Copies `N` raw bytes starting at `offset` into an array and advances the offset.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_bytes_at<const N: usize>(data: &[u8], offset: &mut usize) -> Result<[u8; N]> {
    let end = offset.checked_add(N).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let mut out = [0u8; N];
    out.copy_from_slice(&data[*offset..end]);
    *offset = end;
    Ok(out)
}

/// Copies `bytes` into `data` at `offset` and advances the offset.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn write_bytes_at(data: &mut [u8], offset: &mut usize, bytes: &[u8]) -> Result<()> {
    let end = offset.checked_add(bytes.len()).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u16() {
        let result = read_le::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0201);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0403_0201);
    }

    #[test]
    fn read_le_u64() {
        let result = read_le::<u64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807060504030201);
    }

    #[test]
    fn read_le_i64_negative() {
        let data = [0xFF; 8];
        assert_eq!(read_le::<i64>(&data).unwrap(), -1);
    }

    #[test]
    fn read_le_at_advances() {
        let mut offset = 2;
        let result = read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(result, 0x0403);
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_le_out_of_bounds() {
        let mut offset = 6;
        assert!(matches!(
            read_le_at::<u32>(&TEST_BUFFER, &mut offset),
            Err(OutOfBounds)
        ));
        // Offset is untouched on failure
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_le_offset_overflow() {
        let mut offset = usize::MAX;
        assert!(read_le_at::<u8>(&TEST_BUFFER, &mut offset).is_err());
    }

    #[test]
    fn write_le_sequence() {
        let mut data = [0u8; 8];
        let mut offset = 0;
        write_le_at(&mut data, &mut offset, 1u16).unwrap();
        write_le_at(&mut data, &mut offset, 2u16).unwrap();
        write_le_at(&mut data, &mut offset, 3u32).unwrap();

        assert_eq!(data, [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00]);
        assert_eq!(offset, 8);
    }

    #[test]
    fn write_le_out_of_bounds_leaves_buffer() {
        let mut data = [0xAAu8; 3];
        assert!(write_le(&mut data, 0u32).is_err());
        assert_eq!(data, [0xAA; 3]);
    }

    #[test]
    fn bytes_at() {
        let mut data = [0u8; 6];
        let mut offset = 1;
        write_bytes_at(&mut data, &mut offset, &[9, 8, 7]).unwrap();
        assert_eq!(offset, 4);

        let mut offset = 1;
        let read: [u8; 3] = read_bytes_at(&data, &mut offset).unwrap();
        assert_eq!(read, [9, 8, 7]);

        let mut offset = 4;
        assert!(read_bytes_at::<3>(&data, &mut offset).is_err());
    }
}
