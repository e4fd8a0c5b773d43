//! x64 `CONTEXT` record.
//!
//! The record is 1232 bytes. Fields are written in declaration order with no implicit
//! padding; the offsets below are the host ABI's.
//!
//! | Offset | Field |
//! |--------|-------|
//! | `0x000` | `P1Home`..`P6Home` |
//! | `0x030` | `ContextFlags` |
//! | `0x034` | `MxCsr` |
//! | `0x038` | `SegCs`, `SegDs`, `SegEs`, `SegFs`, `SegGs`, `SegSs` |
//! | `0x044` | `EFlags` |
//! | `0x048` | `Dr0`..`Dr3`, `Dr6`, `Dr7` |
//! | `0x078` | `Rax`, `Rcx`, `Rdx`, `Rbx`, `Rsp`, `Rbp`, `Rsi`, `Rdi`, `R8`..`R15` |
//! | `0x0F8` | `Rip` |
//! | `0x100` | `FltSave` (512 bytes) |
//! | `0x300` | `VectorRegister[26]` |
//! | `0x4A0` | `VectorControl`, `DebugControl` |
//! | `0x4B0` | `LastBranchToRip`, `LastBranchFromRip` |
//! | `0x4C0` | `LastExceptionToRip`, `LastExceptionFromRip` |

use crate::{
    marshal::io::{read_bytes_at, read_le_at, write_bytes_at, write_le_at},
    thread::{ContextFlags, ThreadContext, M128A, FLOAT_SAVE_SIZE},
    Error::OutOfBounds,
    Result,
};

/// Size of the x64 `CONTEXT` record.
pub const CONTEXT_SIZE: usize = 1232;

/// Offset of `ContextFlags` inside the record.
pub const CONTEXT_FLAGS_OFFSET: usize = 0x30;

/// Writes `context` into the first [`CONTEXT_SIZE`] bytes of `buffer`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `buffer` is too short. The buffer is left
/// unchanged in that case.
pub fn encode_context(context: &ThreadContext, buffer: &mut [u8]) -> Result<()> {
    if buffer.len() < CONTEXT_SIZE {
        return Err(OutOfBounds);
    }

    let mut offset = 0;
    for home in context.p_home {
        write_le_at(buffer, &mut offset, home)?;
    }

    write_le_at(buffer, &mut offset, context.context_flags.bits())?;
    write_le_at(buffer, &mut offset, context.mx_csr)?;

    for segment in [
        context.seg_cs,
        context.seg_ds,
        context.seg_es,
        context.seg_fs,
        context.seg_gs,
        context.seg_ss,
    ] {
        write_le_at(buffer, &mut offset, segment)?;
    }
    write_le_at(buffer, &mut offset, context.eflags)?;

    for register in [
        context.dr0,
        context.dr1,
        context.dr2,
        context.dr3,
        context.dr6,
        context.dr7,
        context.rax,
        context.rcx,
        context.rdx,
        context.rbx,
        context.rsp,
        context.rbp,
        context.rsi,
        context.rdi,
        context.r8,
        context.r9,
        context.r10,
        context.r11,
        context.r12,
        context.r13,
        context.r14,
        context.r15,
        context.rip,
    ] {
        write_le_at(buffer, &mut offset, register)?;
    }

    write_bytes_at(buffer, &mut offset, &context.flt_save)?;
    for vector in &context.vector_register {
        write_le_at(buffer, &mut offset, vector.low)?;
        write_le_at(buffer, &mut offset, vector.high)?;
    }

    for register in [
        context.vector_control,
        context.debug_control,
        context.last_branch_to_rip,
        context.last_branch_from_rip,
        context.last_exception_to_rip,
        context.last_exception_from_rip,
    ] {
        write_le_at(buffer, &mut offset, register)?;
    }

    debug_assert_eq!(offset, CONTEXT_SIZE);
    Ok(())
}

/// Reads a record written by [`encode_context`] or by the host.
///
/// `ContextFlags` bits are kept as found, including unknown ones.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `buffer` is shorter than [`CONTEXT_SIZE`].
pub fn decode_context(buffer: &[u8]) -> Result<ThreadContext> {
    if buffer.len() < CONTEXT_SIZE {
        return Err(OutOfBounds);
    }

    let mut offset = 0;
    let mut context = ThreadContext::default();

    for home in &mut context.p_home {
        *home = read_le_at(buffer, &mut offset)?;
    }

    context.context_flags = ContextFlags::from_bits_retain(read_le_at(buffer, &mut offset)?);
    context.mx_csr = read_le_at(buffer, &mut offset)?;

    for segment in [
        &mut context.seg_cs,
        &mut context.seg_ds,
        &mut context.seg_es,
        &mut context.seg_fs,
        &mut context.seg_gs,
        &mut context.seg_ss,
    ] {
        *segment = read_le_at(buffer, &mut offset)?;
    }
    context.eflags = read_le_at(buffer, &mut offset)?;

    for register in [
        &mut context.dr0,
        &mut context.dr1,
        &mut context.dr2,
        &mut context.dr3,
        &mut context.dr6,
        &mut context.dr7,
        &mut context.rax,
        &mut context.rcx,
        &mut context.rdx,
        &mut context.rbx,
        &mut context.rsp,
        &mut context.rbp,
        &mut context.rsi,
        &mut context.rdi,
        &mut context.r8,
        &mut context.r9,
        &mut context.r10,
        &mut context.r11,
        &mut context.r12,
        &mut context.r13,
        &mut context.r14,
        &mut context.r15,
        &mut context.rip,
    ] {
        *register = read_le_at(buffer, &mut offset)?;
    }

    context.flt_save = read_bytes_at::<FLOAT_SAVE_SIZE>(buffer, &mut offset)?;
    for vector in &mut context.vector_register {
        *vector = M128A {
            low: read_le_at(buffer, &mut offset)?,
            high: read_le_at(buffer, &mut offset)?,
        };
    }

    for register in [
        &mut context.vector_control,
        &mut context.debug_control,
        &mut context.last_branch_to_rip,
        &mut context.last_branch_from_rip,
        &mut context.last_exception_to_rip,
        &mut context.last_exception_from_rip,
    ] {
        *register = read_le_at(buffer, &mut offset)?;
    }

    Ok(context)
}

/// Reads only `ContextFlags` from a record.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the field lies past the end of `buffer`.
pub fn read_context_flags(buffer: &[u8]) -> Result<ContextFlags> {
    let mut offset = CONTEXT_FLAGS_OFFSET;
    Ok(ContextFlags::from_bits_retain(read_le_at(
        buffer,
        &mut offset,
    )?))
}

/// Writes only `ContextFlags` into a record, as callers do before a context read.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the field lies past the end of `buffer`.
pub fn write_context_flags(buffer: &mut [u8], flags: ContextFlags) -> Result<()> {
    let mut offset = CONTEXT_FLAGS_OFFSET;
    write_le_at(buffer, &mut offset, flags.bits())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{marshal::io::read_le, Error};

    fn sample() -> ThreadContext {
        let mut context = ThreadContext::initial(0x7FF7_0000_1000, 0xE0000, 0x202);
        context.p_home = [1, 2, 3, 4, 5, 6];
        context.rax = 0xAAAA;
        context.rcx = 0xCCCC;
        context.r15 = 0x1515;
        context.dr7 = 0x77;
        context.flt_save[0] = 0x7F;
        context.flt_save[511] = 0x80;
        context.vector_register[0] = M128A { low: 1, high: -1 };
        context.vector_register[25] = M128A { low: 25, high: 26 };
        context.vector_control = 0x4A0;
        context.last_exception_from_rip = 0x4C8;
        context
    }

    #[test]
    fn host_offsets() {
        let mut buffer = vec![0u8; CONTEXT_SIZE];
        encode_context(&sample(), &mut buffer).unwrap();

        assert_eq!(read_le::<u64>(&buffer[0x00..]).unwrap(), 1);
        assert_eq!(read_le::<u64>(&buffer[0x28..]).unwrap(), 6);
        assert_eq!(
            read_le::<u32>(&buffer[0x30..]).unwrap(),
            ContextFlags::FULL.bits()
        );
        assert_eq!(read_le::<u32>(&buffer[0x34..]).unwrap(), 0x1F80);
        assert_eq!(read_le::<u16>(&buffer[0x38..]).unwrap(), 0x33);
        assert_eq!(read_le::<u16>(&buffer[0x42..]).unwrap(), 0x2B);
        assert_eq!(read_le::<u32>(&buffer[0x44..]).unwrap(), 0x202);
        assert_eq!(read_le::<u64>(&buffer[0x70..]).unwrap(), 0x77);
        assert_eq!(read_le::<u64>(&buffer[0x78..]).unwrap(), 0xAAAA);
        assert_eq!(read_le::<u64>(&buffer[0x80..]).unwrap(), 0xCCCC);
        assert_eq!(read_le::<u64>(&buffer[0x98..]).unwrap(), 0xE0000);
        assert_eq!(read_le::<u64>(&buffer[0xF0..]).unwrap(), 0x1515);
        assert_eq!(read_le::<u64>(&buffer[0xF8..]).unwrap(), 0x7FF7_0000_1000);
        assert_eq!(buffer[0x100], 0x7F);
        assert_eq!(buffer[0x2FF], 0x80);
        assert_eq!(read_le::<u64>(&buffer[0x300..]).unwrap(), 1);
        assert_eq!(read_le::<i64>(&buffer[0x308..]).unwrap(), -1);
        assert_eq!(read_le::<u64>(&buffer[0x490..]).unwrap(), 25);
        assert_eq!(read_le::<u64>(&buffer[0x4A0..]).unwrap(), 0x4A0);
        assert_eq!(read_le::<u64>(&buffer[0x4C8..]).unwrap(), 0x4C8);
    }

    #[test]
    fn decode_restores_all_fields() {
        let context = sample();
        let mut buffer = vec![0u8; CONTEXT_SIZE];
        encode_context(&context, &mut buffer).unwrap();
        assert_eq!(decode_context(&buffer).unwrap(), context);
    }

    #[test]
    fn short_buffers() {
        let mut buffer = vec![0u8; CONTEXT_SIZE - 1];
        assert!(matches!(
            encode_context(&sample(), &mut buffer),
            Err(Error::OutOfBounds)
        ));
        assert!(buffer.iter().all(|&b| b == 0));
        assert!(matches!(decode_context(&buffer), Err(Error::OutOfBounds)));
    }

    #[test]
    fn flags_field_access() {
        let mut buffer = vec![0u8; CONTEXT_SIZE];
        write_context_flags(&mut buffer, ContextFlags::CONTROL).unwrap();
        assert_eq!(buffer[0x30..0x34], 0x0010_0001u32.to_le_bytes());
        assert_eq!(read_context_flags(&buffer).unwrap(), ContextFlags::CONTROL);
        assert!(read_context_flags(&buffer[..0x33]).is_err());
    }
}
