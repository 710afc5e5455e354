#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Write;

fuzz_target!(|data: &[u8]| {
    let Ok(mut file) = tempfile::NamedTempFile::new() else {
        return;
    };
    if file.write_all(data).is_err() {
        return;
    }
    if let Ok(set) = memsift::load(file.path(), memsift::LoadMode::Lazy) {
        for region in &set {
            let _ = region.read_bytes(region.start(), 16);
        }
    }
});
