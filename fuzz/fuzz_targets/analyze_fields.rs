#![no_main]
use libfuzzer_sys::fuzz_target;
use memsift::{FieldAnalyzer, MemoryRegion, RegionSet, Structure, TargetDescriptor};

fuzz_target!(|data: &[u8]| {
    let Ok(region) = MemoryRegion::from_bytes(0x1000, vec![0u8; 0x1000]) else {
        return;
    };
    let Ok(regions) = RegionSet::build(vec![region], "fuzz") else {
        return;
    };
    let structure = Structure::new(0x8000, data.to_vec());
    for target in [TargetDescriptor::linux_32(), TargetDescriptor::linux_64()] {
        let result = FieldAnalyzer::default()
            .analyze(&structure, &regions, &target)
            .expect("analysis of arbitrary bytes never fails");
        assert!(result.verify_tiling().is_ok());
    }
});
