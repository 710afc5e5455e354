//! Fixture writers shared by the integration tests.
//!
//! Every fixture is built in a fresh temporary directory, so tests never
//! depend on files checked into the repository.

use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

const BLOCK: usize = 512;

/// A dump member: archive name plus content.
pub type Member = (String, Vec<u8>);

/// Index text plus one member per region, in the layout dumps are captured in.
pub fn dump_members(regions: &[(u64, u64, &str, Vec<u8>)]) -> Vec<Member> {
    let mut index = String::new();
    let mut members = Vec::new();
    for (start, end, label, content) in regions {
        index.push_str(&format!("{:x}-{:x},{}\n", start, end, label));
        members.push((format!("{:#x}-{:#x}", start, end), content.clone()));
    }
    members.insert(0, ("mappings".to_string(), index.into_bytes()));
    members
}

fn tar_header(name: &str, size: usize) -> Vec<u8> {
    let mut h = vec![0u8; BLOCK];
    h[..name.len()].copy_from_slice(name.as_bytes());
    h[100..107].copy_from_slice(b"0000644");
    h[124..135].copy_from_slice(format!("{:011o}", size).as_bytes());
    h[156] = b'0';
    h[257..263].copy_from_slice(b"ustar\0");
    h[263..265].copy_from_slice(b"00");
    h[148..156].copy_from_slice(b"        ");
    let sum: u32 = h.iter().map(|&b| u32::from(b)).sum();
    h[148..155].copy_from_slice(format!("{:06o}\0", sum).as_bytes());
    h
}

pub fn tar_bytes(members: &[Member]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in members {
        out.extend(tar_header(&format!("./{}", name), data.len()));
        out.extend_from_slice(data);
        out.resize(out.len().div_ceil(BLOCK) * BLOCK, 0);
    }
    out.extend(vec![0u8; BLOCK * 2]);
    out
}

/// Zip archive with every member deflated.
pub fn zip_bytes(members: &[Member]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();
    for (name, data) in members {
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        let payload = enc.finish().unwrap();
        let offset = out.len() as u32;

        out.extend_from_slice(&[0x50, 0x4B, 0x03, 0x04, 20, 0, 0, 0, 8, 0]);
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&payload);

        central.extend_from_slice(&[0x50, 0x4B, 0x01, 0x02, 20, 0, 20, 0, 0, 0, 8, 0]);
        central.extend_from_slice(&[0; 8]);
        central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&[0; 12]);
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }
    let cd_offset = out.len() as u32;
    let cd_len = central.len() as u32;
    out.extend(central);
    out.extend_from_slice(&[0x50, 0x4B, 0x05, 0x06, 0, 0, 0, 0]);
    out.extend_from_slice(&(members.len() as u16).to_le_bytes());
    out.extend_from_slice(&(members.len() as u16).to_le_bytes());
    out.extend_from_slice(&cd_len.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&[0, 0]);
    out
}

pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// One sandbox dump record: header followed by content.
pub fn cuckoo_record(addr: u64, protect: u32, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(24 + content.len());
    out.extend_from_slice(&addr.to_le_bytes());
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x1000u32.to_le_bytes()); // MEM_COMMIT
    out.extend_from_slice(&0x20000u32.to_le_bytes()); // MEM_PRIVATE
    out.extend_from_slice(&protect.to_le_bytes());
    out.extend_from_slice(content);
    out
}

/// Write `bytes` to `name` inside `dir` and return the path.
pub fn write_fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// Lay the members out as files in a subdirectory of `dir`.
pub fn write_directory_dump(dir: &TempDir, members: &[Member]) -> PathBuf {
    let root = dir.path().join("dump");
    fs::create_dir(&root).unwrap();
    for (name, data) in members {
        fs::write(root.join(name), data).unwrap();
    }
    root
}

/// Two-region dump used across tests: 0x1000 bytes of `0x41` at 0x400000
/// labelled `/bin/app`, and 0x2000 bytes of `0x00` at 0x600000 labelled
/// `[heap]`.
pub fn two_region_members() -> Vec<Member> {
    dump_members(&[
        (0x40_0000, 0x40_1000, "/bin/app", vec![0x41; 0x1000]),
        (0x60_0000, 0x60_2000, "[heap]", vec![0x00; 0x2000]),
    ])
}
