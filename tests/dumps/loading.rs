//! Loading dumps from every supported container encoding.

use memsift::loader::{ContainerKind, LoadError};
use memsift::mappings::RegionError;
use memsift::{BackingKind, DumpLoader, LoadMode, LoaderConfig, Perms, TargetDescriptor};
use tempfile::TempDir;

use crate::common::*;

fn assert_two_region_content(set: &memsift::RegionSet) {
    assert_eq!(set.len(), 2);
    assert_eq!(set.total_size(), 0x3000);

    let app = set.region_for_address(0x40_0800).unwrap();
    assert_eq!(app.pathname(), "/bin/app");
    assert!(app.perms().contains(Perms::READ | Perms::WRITE | Perms::EXECUTE));
    assert_eq!(&set.read_bytes(0x40_0800, 4).unwrap()[..], b"AAAA");

    let heap = set.region_for_address(0x60_1ffc).unwrap();
    assert_eq!(heap.pathname(), "[heap]");
    assert_eq!(&set.read_bytes(0x60_1ffc, 4).unwrap()[..], &[0u8; 4]);

    let target = TargetDescriptor::linux_64();
    assert_eq!(set.read_word(&target, 0x40_0000).unwrap(), 0x4141_4141_4141_4141);

    assert!(!set.contains_address(0x50_0000));
    assert!(matches!(
        set.read_bytes(0x50_0000, 1),
        Err(RegionError::NotMapped { address: 0x50_0000 })
    ));
}

#[test]
fn test_tar_dump_eager_and_lazy() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "dump.tar", &tar_bytes(&two_region_members()));

    let (set, report) = DumpLoader::default()
        .mode(LoadMode::Eager)
        .load_with_report(&path)
        .unwrap();
    assert_two_region_content(&set);
    assert_eq!(report.container, ContainerKind::Tar);
    assert_eq!(report.buffered, 2);
    assert_eq!(report.bytes_materialized, 0x3000);

    let (set, report) = DumpLoader::default()
        .mode(LoadMode::Lazy)
        .load_with_report(&path)
        .unwrap();
    assert_eq!(report.deferred, 2);
    assert_eq!(report.bytes_materialized, 0);
    assert_two_region_content(&set);
}

#[test]
fn test_large_regions_are_file_backed() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "dump.tar", &tar_bytes(&two_region_members()));
    let config = LoaderConfig {
        eager_file_backed_threshold: 0x1800,
        ..LoaderConfig::default()
    };

    let (set, report) = DumpLoader::new(config)
        .mode(LoadMode::Eager)
        .load_with_report(&path)
        .unwrap();
    assert_eq!(report.buffered, 1);
    assert_eq!(report.file_backed, 1);
    assert_eq!(
        set.region_for_address(0x60_0000).unwrap().backing_kind(),
        BackingKind::File
    );
    assert_two_region_content(&set);
}

#[test]
fn test_directory_dump() {
    let dir = TempDir::new().unwrap();
    let root = write_directory_dump(&dir, &two_region_members());
    let (set, report) = DumpLoader::default()
        .mode(LoadMode::Eager)
        .load_with_report(&root)
        .unwrap();
    assert_eq!(report.container, ContainerKind::Directory);
    assert_two_region_content(&set);
}

#[test]
fn test_compressed_containers_are_buffered() {
    let dir = TempDir::new().unwrap();
    let zip = write_fixture(&dir, "dump.zip", &zip_bytes(&two_region_members()));
    let tgz = write_fixture(
        &dir,
        "dump.tar.gz",
        &gzip_bytes(&tar_bytes(&two_region_members())),
    );
    // Force the file-backed path; these containers must ignore it.
    let config = LoaderConfig {
        eager_file_backed_threshold: 0,
        lazy_file_backed_threshold: 0,
        ..LoaderConfig::default()
    };

    for (path, kind) in [(zip, ContainerKind::Zip), (tgz, ContainerKind::GzipTar)] {
        let (set, report) = DumpLoader::new(config.clone())
            .mode(LoadMode::Eager)
            .load_with_report(&path)
            .unwrap();
        assert_eq!(report.container, kind);
        assert_eq!(report.file_backed, 0);
        assert_eq!(report.buffered, 2);
        assert_two_region_content(&set);

        let (set, report) = DumpLoader::new(config.clone())
            .mode(LoadMode::Lazy)
            .load_with_report(&path)
            .unwrap();
        assert_eq!(report.deferred, 2);
        assert_two_region_content(&set);
    }
}

#[test]
fn test_missing_content_degrades_only_in_lazy_mode() {
    let dir = TempDir::new().unwrap();
    let mut members = two_region_members();
    members[0].1.extend_from_slice(b"7ff00000-7ff01000,[stack]\n");
    let path = write_fixture(&dir, "dump.tar", &tar_bytes(&members));

    let err = DumpLoader::default()
        .mode(LoadMode::Eager)
        .load(&path)
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::IndexContentMismatch {
            start: 0x7ff0_0000,
            end: 0x7ff0_1000,
            ..
        }
    ));

    let (set, report) = DumpLoader::default()
        .mode(LoadMode::Lazy)
        .load_with_report(&path)
        .unwrap();
    assert_eq!(set.len(), 3);
    assert_eq!(report.placeholders, 1);
    let stack = set.region_for_address(0x7ff0_0010).unwrap();
    assert!(stack.is_placeholder());
    assert_eq!(stack.pathname(), "[stack]");
    assert!(!set.contains_address(0x7ff0_0010));
    assert!(matches!(
        set.read_bytes(0x7ff0_0010, 4),
        Err(RegionError::Unavailable { .. })
    ));
}

#[test]
fn test_reset_refetches_deferred_content() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "dump.tar", &tar_bytes(&two_region_members()));
    let mut set = memsift::load(&path, LoadMode::Lazy).unwrap();

    assert_eq!(&set.read_bytes(0x40_0000, 2).unwrap()[..], b"AA");
    set.reset();
    assert_eq!(&set.read_bytes(0x40_0ffe, 2).unwrap()[..], b"AA");
}

#[test]
fn test_regions_found_by_pathname() {
    let dir = TempDir::new().unwrap();
    let members = dump_members(&[
        (0x1000, 0x2000, "/lib/libc.so.6", vec![1; 0x1000]),
        (0x2000, 0x3000, "/lib/libc.so.6", vec![2; 0x1000]),
        (0x8000, 0x9000, "[heap]", vec![3; 0x1000]),
    ]);
    let path = write_fixture(&dir, "dump.tar", &tar_bytes(&members));
    let set = memsift::load(&path, LoadMode::Eager).unwrap();

    let libc: Vec<_> = set.regions_with_pathname("/lib/libc.so.6").collect();
    assert_eq!(libc.len(), 2);
    assert_eq!(libc[0].start(), 0x1000);
    // Adjacent regions stay distinct.
    assert_eq!(set.region_for_address(0x2000).unwrap().start(), 0x2000);
}
