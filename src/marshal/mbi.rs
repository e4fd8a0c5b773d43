//! `MEMORY_BASIC_INFORMATION` record (x64 layout).
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0  | 8 | `BaseAddress` |
//! | 8  | 8 | `AllocationBase` |
//! | 16 | 4 | `AllocationProtect` |
//! | 20 | 4 | `PartitionId` / padding (written as zero) |
//! | 24 | 8 | `RegionSize` |
//! | 32 | 4 | `State` |
//! | 36 | 4 | `Protect` |
//! | 40 | 4 | `Type` |
//! | 44 | 4 | padding (written as zero) |

use crate::{
    marshal::io::{read_le_at, write_le_at},
    memory::{MemoryBasicInformation, MemoryState, PageProtection, RegionType},
    Error::OutOfBounds,
    Result,
};

/// Size of the x64 `MEMORY_BASIC_INFORMATION` record.
pub const MEMORY_BASIC_INFORMATION_SIZE: usize = 48;

/// Writes `info` into the first [`MEMORY_BASIC_INFORMATION_SIZE`] bytes of `buffer`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `buffer` is too short. The buffer is left
/// unchanged in that case.
pub fn encode_memory_info(info: &MemoryBasicInformation, buffer: &mut [u8]) -> Result<()> {
    if buffer.len() < MEMORY_BASIC_INFORMATION_SIZE {
        return Err(OutOfBounds);
    }

    let mut offset = 0;
    write_le_at(buffer, &mut offset, info.base_address)?;
    write_le_at(buffer, &mut offset, info.allocation_base)?;
    write_le_at(buffer, &mut offset, info.allocation_protect.bits())?;
    write_le_at(buffer, &mut offset, 0u32)?;
    write_le_at(buffer, &mut offset, info.region_size)?;
    write_le_at(buffer, &mut offset, info.state.bits())?;
    write_le_at(buffer, &mut offset, info.protect.bits())?;
    write_le_at(buffer, &mut offset, info.kind.bits())?;
    write_le_at(buffer, &mut offset, 0u32)?;
    Ok(())
}

/// Reads a record written by [`encode_memory_info`] or by the host.
///
/// Protection values are kept bit for bit, including bits this crate has no name for.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `buffer` is too short, and
/// [`crate::Error::Malformed`] for a state or type value that is not a known constant.
pub fn decode_memory_info(buffer: &[u8]) -> Result<MemoryBasicInformation> {
    if buffer.len() < MEMORY_BASIC_INFORMATION_SIZE {
        return Err(OutOfBounds);
    }

    let mut offset = 0;
    let base_address = read_le_at::<u64>(buffer, &mut offset)?;
    let allocation_base = read_le_at::<u64>(buffer, &mut offset)?;
    let allocation_protect = PageProtection::from_bits_retain(read_le_at(buffer, &mut offset)?);
    offset += 4;
    let region_size = read_le_at::<u64>(buffer, &mut offset)?;

    let raw_state = read_le_at::<u32>(buffer, &mut offset)?;
    let state = MemoryState::from_repr(raw_state)
        .ok_or_else(|| malformed_error!("Unknown memory state 0x{:X}", raw_state))?;

    let protect = PageProtection::from_bits_retain(read_le_at(buffer, &mut offset)?);

    let raw_kind = read_le_at::<u32>(buffer, &mut offset)?;
    let kind = RegionType::from_repr(raw_kind)
        .ok_or_else(|| malformed_error!("Unknown region type 0x{:X}", raw_kind))?;

    Ok(MemoryBasicInformation {
        base_address,
        allocation_base,
        allocation_protect,
        region_size,
        state,
        protect,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{marshal::io::read_le, Error};

    fn committed() -> MemoryBasicInformation {
        MemoryBasicInformation {
            base_address: 0x1_0000,
            allocation_base: 0x1_0000,
            allocation_protect: PageProtection::READWRITE,
            region_size: 0x1000,
            state: MemoryState::Commit,
            protect: PageProtection::EXECUTE_READ,
            kind: RegionType::Private,
        }
    }

    #[test]
    fn field_offsets() {
        let mut buffer = [0xCCu8; MEMORY_BASIC_INFORMATION_SIZE];
        encode_memory_info(&committed(), &mut buffer).unwrap();

        assert_eq!(read_le::<u64>(&buffer[0..]).unwrap(), 0x1_0000);
        assert_eq!(read_le::<u64>(&buffer[8..]).unwrap(), 0x1_0000);
        assert_eq!(read_le::<u32>(&buffer[16..]).unwrap(), 0x04);
        assert_eq!(read_le::<u32>(&buffer[20..]).unwrap(), 0);
        assert_eq!(read_le::<u64>(&buffer[24..]).unwrap(), 0x1000);
        assert_eq!(read_le::<u32>(&buffer[32..]).unwrap(), 0x1000);
        assert_eq!(read_le::<u32>(&buffer[36..]).unwrap(), 0x20);
        assert_eq!(read_le::<u32>(&buffer[40..]).unwrap(), 0x20000);
        assert_eq!(read_le::<u32>(&buffer[44..]).unwrap(), 0);
    }

    #[test]
    fn decode_free_region() {
        let info = MemoryBasicInformation::free(0x5000);
        let mut buffer = [0u8; MEMORY_BASIC_INFORMATION_SIZE];
        encode_memory_info(&info, &mut buffer).unwrap();
        assert_eq!(decode_memory_info(&buffer).unwrap(), info);
    }

    #[test]
    fn short_buffer() {
        let mut buffer = [0xAAu8; MEMORY_BASIC_INFORMATION_SIZE - 1];
        assert!(matches!(
            encode_memory_info(&committed(), &mut buffer),
            Err(Error::OutOfBounds)
        ));
        assert_eq!(buffer, [0xAA; MEMORY_BASIC_INFORMATION_SIZE - 1]);
        assert!(matches!(decode_memory_info(&buffer), Err(Error::OutOfBounds)));
    }

    #[test]
    fn unknown_state_is_malformed() {
        let mut buffer = [0u8; MEMORY_BASIC_INFORMATION_SIZE];
        encode_memory_info(&committed(), &mut buffer).unwrap();
        buffer[32..36].copy_from_slice(&0x1234u32.to_le_bytes());
        assert!(matches!(
            decode_memory_info(&buffer),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn unknown_type_is_malformed() {
        let mut buffer = [0u8; MEMORY_BASIC_INFORMATION_SIZE];
        encode_memory_info(&committed(), &mut buffer).unwrap();
        buffer[40..44].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            decode_memory_info(&buffer),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn longer_buffer_keeps_tail() {
        let mut buffer = [0xEEu8; 64];
        encode_memory_info(&committed(), &mut buffer).unwrap();
        assert_eq!(&buffer[48..], &[0xEE; 16]);
    }
}
