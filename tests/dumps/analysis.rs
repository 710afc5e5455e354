//! Field analysis over structures read from loaded dumps.

use memsift::heuristics::FieldAnalyzer;
use memsift::{
    AnalyzerConfig, FieldKind, FieldValue, FunctionNames, LoadMode, RegionSet, Structure,
    TargetDescriptor,
};
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::*;

const RECORD_AT: u64 = 0x60_0000;

fn record_bytes() -> Vec<u8> {
    let mut heap = Vec::new();
    heap.extend(0x40_0010u64.to_le_bytes());
    heap.extend(b"hello world\0\0\0\0\0");
    heap.extend(7u64.to_le_bytes());
    heap.extend([0u8; 16]);
    heap.extend((-3i64).to_le_bytes());
    heap
}

fn load_with_record(dir: &TempDir, mode: LoadMode) -> RegionSet {
    let mut heap = record_bytes();
    heap.resize(0x1000, 0xcc);
    let members = dump_members(&[
        (0x40_0000, 0x40_1000, "/bin/app", vec![0x90; 0x1000]),
        (RECORD_AT, RECORD_AT + 0x1000, "[heap]", heap),
    ]);
    let path = write_fixture(dir, "dump.tar", &tar_bytes(&members));
    memsift::load(&path, mode).unwrap()
}

fn layout(result: &memsift::AnalyzedStructure) -> Vec<(usize, FieldKind, usize)> {
    result.fields.iter().map(|f| (f.offset, f.kind, f.size)).collect()
}

#[test]
fn test_record_layout_from_dump() {
    let dir = TempDir::new().unwrap();
    let target = TargetDescriptor::linux_64();

    for mode in [LoadMode::Eager, LoadMode::Lazy] {
        let set = load_with_record(&dir, mode);
        let record = Structure::from_region_set(&set, RECORD_AT, 56).unwrap();
        let result = FieldAnalyzer::default()
            .analyze(&record, &set, &target)
            .unwrap();

        assert_eq!(
            layout(&result),
            vec![
                (0, FieldKind::Pointer, 8),
                (8, FieldKind::StringAsciiNul, 12),
                (20, FieldKind::Unknown, 4),
                (24, FieldKind::SmallIntUnsigned, 8),
                (32, FieldKind::ZeroRun, 16),
                (48, FieldKind::SmallIntSigned, 8),
            ]
        );
        assert!(result.fields[2].is_padding);
        assert_eq!(result.fields[0].value, Some(FieldValue::Pointer(0x40_0010)));
        assert_eq!(result.fields[0].comment.as_deref(), Some("/bin/app"));
        assert_eq!(
            result.fields[1].value,
            Some(FieldValue::Text("hello world".to_string()))
        );
        assert_eq!(result.fields[5].value, Some(FieldValue::Signed(-3)));
    }
}

#[test]
fn test_function_names_annotate_pointers() {
    let dir = TempDir::new().unwrap();
    let set = load_with_record(&dir, LoadMode::Eager);
    let target = TargetDescriptor::linux_64();

    let mut names = FunctionNames::new();
    names.insert(0x40_0010, "main".to_string());
    let record = Structure::from_region_set(&set, RECORD_AT, 8)
        .unwrap()
        .with_function_names(Arc::new(names));
    let result = FieldAnalyzer::default()
        .analyze(&record, &set, &target)
        .unwrap();

    assert_eq!(result.fields.len(), 1);
    assert_eq!(result.fields[0].comment.as_deref(), Some("app::main"));
    let listing = result.render(&record);
    assert!(listing.contains("POINTER"));
    assert!(listing.contains("app::main"));
}

#[test]
fn test_threshold_is_configurable() {
    let dir = TempDir::new().unwrap();
    let set = load_with_record(&dir, LoadMode::Eager);
    let target = TargetDescriptor::linux_64();
    let record = Structure::from_region_set(&set, RECORD_AT + 24, 8).unwrap();

    let strict = FieldAnalyzer::new(AnalyzerConfig {
        small_int_threshold: 4,
        ..AnalyzerConfig::default()
    });
    let result = strict.analyze(&record, &set, &target).unwrap();
    assert_eq!(layout(&result), vec![(0, FieldKind::Unknown, 8)]);
    assert!(!result.fields[0].is_padding);
}

#[test]
fn test_layout_serializes_to_json() {
    let dir = TempDir::new().unwrap();
    let set = load_with_record(&dir, LoadMode::Eager);
    let target = TargetDescriptor::linux_64();
    let record = Structure::from_region_set(&set, RECORD_AT, 56).unwrap();
    let result = FieldAnalyzer::default()
        .analyze(&record, &set, &target)
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&result.to_json_string().unwrap()).unwrap();
    assert_eq!(json["address"], RECORD_AT);
    assert_eq!(json["size"], 56);
    assert_eq!(json["fields"].as_array().unwrap().len(), 6);
    assert_eq!(json["fields"][0]["value"]["type"], "Pointer");
}

#[test]
fn test_many_records_in_parallel() {
    let dir = TempDir::new().unwrap();
    let set = load_with_record(&dir, LoadMode::Lazy);
    let target = TargetDescriptor::linux_64();
    let records: Vec<Structure> = (0..16)
        .map(|i| Structure::from_region_set(&set, RECORD_AT + i * 64, 64).unwrap())
        .collect();

    let analyzer = FieldAnalyzer::default();
    let results = analyzer.analyze_many(&records, &set, &target);
    assert_eq!(results.len(), 16);
    for (record, result) in records.iter().zip(results) {
        let result = result.unwrap();
        assert_eq!(result.address, record.address());
        assert!(result.verify_tiling().is_ok());
        assert_eq!(result, analyzer.analyze(record, &set, &target).unwrap());
    }
}

#[test]
fn test_unmapped_structure_cannot_be_read() {
    let dir = TempDir::new().unwrap();
    let set = load_with_record(&dir, LoadMode::Eager);
    assert!(Structure::from_region_set(&set, 0x50_0000, 8).is_err());
    assert!(Structure::from_region_set(&set, RECORD_AT + 0xff8, 16).is_err());
}
