#![no_main]

use libfuzzer_sys::fuzz_target;
use ntsim::marshal::{decode_context, decode_memory_info, decode_module_info};

fuzz_target!(|data: &[u8]| {
    let _ = decode_memory_info(data);
    let _ = decode_context(data);
    let _ = decode_module_info(data);
});
