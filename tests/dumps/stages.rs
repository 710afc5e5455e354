//! Failures report the stage that produced them.

use memsift::loader::LoadError;
use memsift::mappings::RegionError;
use memsift::{DumpLoader, LoadMode, MemsiftError, Stage};
use tempfile::TempDir;

use crate::common::*;

fn load_err(path: &std::path::Path, mode: LoadMode) -> MemsiftError {
    DumpLoader::default().mode(mode).load(path).unwrap_err().into()
}

#[test]
fn test_unrecognized_containers() {
    let dir = TempDir::new().unwrap();

    let noise = write_fixture(&dir, "noise.bin", &[0x5a; 2048]);
    let err = load_err(&noise, LoadMode::Lazy);
    assert_eq!(err.stage(), Stage::ContainerRecognition);
    assert!(err.to_string().contains("noise.bin"));

    let empty = write_fixture(&dir, "empty.tar", &[]);
    assert_eq!(load_err(&empty, LoadMode::Eager).stage(), Stage::ContainerRecognition);

    // A valid tar without the index member is not a dump.
    let mut members = two_region_members();
    members.remove(0);
    let no_index = write_fixture(&dir, "noindex.tar", &tar_bytes(&members));
    let err = DumpLoader::default().load(&no_index).unwrap_err();
    assert!(matches!(err, LoadError::UnrecognizedContainer { .. }));

    // Index present but no member named like a region.
    let only_index = write_fixture(
        &dir,
        "onlyindex.tar",
        &tar_bytes(&[("mappings".to_string(), b"1000-2000,x\n".to_vec())]),
    );
    let err = DumpLoader::default().load(&only_index).unwrap_err();
    assert!(matches!(err, LoadError::UnrecognizedContainer { .. }));
}

#[test]
fn test_corrupt_tar_header() {
    let dir = TempDir::new().unwrap();
    let mut bytes = tar_bytes(&two_region_members());
    // Second header sits after the index header and its one data block.
    bytes[1024] ^= 0xff;
    let path = write_fixture(&dir, "corrupt.tar", &bytes);
    let err = load_err(&path, LoadMode::Eager);
    assert!(matches!(
        err,
        MemsiftError::Load(LoadError::CorruptArchive { .. })
    ));
    assert_eq!(err.stage(), Stage::ContainerRecognition);
}

#[test]
fn test_truncated_gzip_dump() {
    let dir = TempDir::new().unwrap();
    let mut bytes = gzip_bytes(&tar_bytes(&two_region_members()));
    bytes.truncate(bytes.len() / 2);
    let path = write_fixture(&dir, "cut.tar.gz", &bytes);
    let err = load_err(&path, LoadMode::Lazy);
    assert!(matches!(
        err,
        MemsiftError::Load(LoadError::CorruptArchive { kind: "gzip", .. })
    ));
    assert_eq!(err.stage(), Stage::ContainerRecognition);
}

#[test]
fn test_malformed_index_reports_line() {
    let dir = TempDir::new().unwrap();
    let mut members = two_region_members();
    members[0].1.extend_from_slice(b"\nnot-a-range,/x\n");
    let path = write_fixture(&dir, "dump.tar", &tar_bytes(&members));

    let err = DumpLoader::default().load(&path).unwrap_err();
    match &err {
        LoadError::MalformedIndex { line, .. } => assert_eq!(*line, 4),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(MemsiftError::from(err).stage(), Stage::IndexParsing);
}

#[test]
fn test_overlapping_index_records() {
    let dir = TempDir::new().unwrap();
    let members = dump_members(&[
        (0x1000, 0x3000, "a", vec![1; 0x2000]),
        (0x2000, 0x4000, "b", vec![2; 0x2000]),
    ]);
    let path = write_fixture(&dir, "dump.tar", &tar_bytes(&members));

    let err = load_err(&path, LoadMode::Eager);
    assert!(matches!(
        err,
        MemsiftError::Load(LoadError::Region(RegionError::Overlap { .. }))
    ));
    assert_eq!(err.stage(), Stage::RegionConstruction);
}

#[test]
fn test_missing_content_in_eager_mode() {
    let dir = TempDir::new().unwrap();
    let mut members = two_region_members();
    members.pop();
    let path = write_fixture(&dir, "dump.tar", &tar_bytes(&members));

    let err = load_err(&path, LoadMode::Eager);
    assert_eq!(err.stage(), Stage::RegionConstruction);
    assert!(err.to_string().contains("0x600000"));
}

#[test]
fn test_read_failures_are_region_reads() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "dump.tar", &tar_bytes(&two_region_members()));
    let set = memsift::load(&path, LoadMode::Lazy).unwrap();

    let err: MemsiftError = set.read_bytes(0x40_0ffc, 8).unwrap_err().into();
    assert_eq!(err.stage(), Stage::RegionRead);
    assert!(err.to_string().contains("0x400ffc"));
}
