//! Sandbox process dumps and raw images.

use memsift::loader::cuckoo::{PAGE_EXECUTE_READ, PAGE_READWRITE};
use memsift::loader::LoadError;
use memsift::{
    load_raw_image, BackingKind, CuckooDump, FieldAnalyzer, FieldKind, Perms, Structure,
    TargetDescriptor,
};
use tempfile::TempDir;

use crate::common::*;

#[test]
fn test_sandbox_dump_regions_are_file_backed() {
    let dir = TempDir::new().unwrap();
    let mut data = cuckoo_record(0x0040_1000, PAGE_EXECUTE_READ, &[0xc3; 0x100]);
    let mut object = Vec::new();
    object.extend(0x0040_1020u32.to_le_bytes());
    object.extend(b"Config\0\0");
    object.extend(3u32.to_le_bytes());
    data.extend(cuckoo_record(0x0080_0000, PAGE_READWRITE, &object));
    let path = write_fixture(&dir, "2480-1.dmp", &data);

    let dump = CuckooDump::open(&path).unwrap();
    assert_eq!(dump.pid(), Some(2480));
    assert_eq!(dump.target().word_size(), 4);

    let regions = dump.regions();
    assert_eq!(regions.len(), 2);
    for region in regions {
        assert_eq!(region.backing_kind(), BackingKind::File);
    }
    let code = regions.region_for_address(0x0040_1000).unwrap();
    assert!(code.perms().contains(Perms::READ | Perms::EXECUTE));
    assert!(!code.perms().is_writable());

    let record = Structure::from_region_set(regions, 0x0080_0000, 16).unwrap();
    let result = FieldAnalyzer::default()
        .analyze(&record, regions, dump.target())
        .unwrap();
    let kinds: Vec<_> = result.fields.iter().map(|f| (f.offset, f.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            (0, FieldKind::Pointer),
            (4, FieldKind::StringAsciiNul),
            (11, FieldKind::Unknown),
            (12, FieldKind::SmallIntUnsigned),
        ]
    );
}

#[test]
fn test_sandbox_dump_tolerates_truncation() {
    let dir = TempDir::new().unwrap();
    let mut data = cuckoo_record(0x1000, PAGE_READWRITE, &[1; 0x20]);
    let mut tail = cuckoo_record(0x4000, PAGE_READWRITE, &[2; 0x40]);
    tail.truncate(24 + 0x10);
    data.extend(tail);
    let path = write_fixture(&dir, "77-3.dmp", &data);

    let dump = CuckooDump::open(&path).unwrap();
    let last = dump.regions().region_for_address(0x4000).unwrap();
    assert_eq!(last.size(), 0x10);
    assert_eq!(&dump.regions().read_bytes(0x400c, 4).unwrap()[..], &[2; 4]);
}

#[test]
fn test_empty_inputs_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "1-1.dmp", &[]);
    assert!(matches!(
        CuckooDump::open(&path),
        Err(LoadError::EmptyImage { .. })
    ));
    assert!(matches!(
        load_raw_image(&path, 0),
        Err(LoadError::EmptyImage { .. })
    ));
}

#[test]
fn test_raw_image_at_base() {
    let dir = TempDir::new().unwrap();
    let mut image = vec![0u8; 0x2000];
    image[0x1000..0x1008].copy_from_slice(&0xffff_8000_0000_1000u64.to_le_bytes());
    let path = write_fixture(&dir, "core.img", &image);

    let set = load_raw_image(&path, 0xffff_8000_0000_0000).unwrap();
    assert_eq!(set.len(), 1);
    let target = TargetDescriptor::linux_64();
    assert_eq!(
        set.read_word(&target, 0xffff_8000_0000_1000).unwrap(),
        0xffff_8000_0000_1000
    );
}
