#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(records) = memsift::loader::parse_index(text) {
            for record in records {
                assert!(record.end > record.start);
            }
        }
    }
});
