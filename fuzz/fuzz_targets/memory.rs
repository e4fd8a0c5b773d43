#![no_main]

use libfuzzer_sys::fuzz_target;
use ntsim::memory::{AllocationType, MemorySpace, PageProtection};

// Each 16-byte chunk is one operation: tag, address, length
fuzz_target!(|data: &[u8]| {
    let mut space = MemorySpace::new();
    for chunk in data.chunks_exact(16) {
        let address = u64::from_le_bytes(chunk[1..9].try_into().unwrap()) & 0xFFFF_FFFF_F000;
        let length = (u32::from_le_bytes(chunk[9..13].try_into().unwrap()) & 0xF_FFFF) as usize;
        let protect = PageProtection::from_bits_retain(u32::from(chunk[13]));

        match chunk[0] % 5 {
            0 => {
                space.allocate(address, length, AllocationType::COMMIT, protect);
            }
            1 => {
                space.free(address, length, 0x4000);
            }
            2 => {
                space.free(address, length, 0x8000);
            }
            3 => {
                let written = space.write(address, &vec![chunk[14]; length]);
                assert!(written <= length);
            }
            _ => {
                assert_eq!(space.read(address, length).len(), length);
            }
        }
    }
});
