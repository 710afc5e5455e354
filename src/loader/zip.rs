//! Zip reader driven by the central directory.
//!
//! Members can only be extracted whole, so every region loaded from a zip
//! dump ends up buffer-backed.

use bytes::Bytes;
use flate2::read::DeflateDecoder;
use std::collections::HashMap;
use std::io::{self, Read};
use tracing::debug;

use super::error::{LoadError, Result};
use super::tar::normalize_name;

const EOCD_SIG: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
const CENTRAL_SIG: [u8; 4] = [0x50, 0x4B, 0x01, 0x02];
const LOCAL_SIG: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const EOCD_LEN: usize = 22;
const MAX_COMMENT: usize = 0xFFFF;

const STORED: u16 = 0;
const DEFLATE: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipEntry {
    pub method: u16,
    pub compressed_size: usize,
    pub uncompressed_size: usize,
    pub local_header_offset: usize,
}

pub fn looks_like_zip(data: &[u8]) -> bool {
    data.starts_with(&LOCAL_SIG) || data.starts_with(&EOCD_SIG)
}

/// Read the central directory.
pub fn read_entries(data: &[u8]) -> Result<HashMap<String, ZipEntry>> {
    let eocd = find_eocd(data)
        .ok_or_else(|| LoadError::corrupt("zip", "end of central directory not found"))?;
    let total = usize::from(le16(data, eocd + 10));
    let cd_offset = le32(data, eocd + 16) as usize;

    let mut entries = HashMap::with_capacity(total);
    let mut pos = cd_offset;
    for _ in 0..total {
        if pos + 46 > data.len() || data[pos..pos + 4] != CENTRAL_SIG {
            return Err(LoadError::corrupt(
                "zip",
                format!("bad central directory record at offset {:#x}", pos),
            ));
        }
        let method = le16(data, pos + 10);
        let compressed_size = le32(data, pos + 20);
        let uncompressed_size = le32(data, pos + 24);
        let name_len = usize::from(le16(data, pos + 28));
        let extra_len = usize::from(le16(data, pos + 30));
        let comment_len = usize::from(le16(data, pos + 32));
        let local_header_offset = le32(data, pos + 42);
        if [compressed_size, uncompressed_size, local_header_offset].contains(&u32::MAX) {
            return Err(LoadError::corrupt("zip", "zip64 archives are not supported"));
        }

        let name_end = pos + 46 + name_len;
        let name = data
            .get(pos + 46..name_end)
            .ok_or_else(|| LoadError::corrupt("zip", "member name runs past end of archive"))?;
        let name = normalize_name(&String::from_utf8_lossy(name));
        if !name.is_empty() && !name.ends_with('/') {
            entries.insert(
                name,
                ZipEntry {
                    method,
                    compressed_size: compressed_size as usize,
                    uncompressed_size: uncompressed_size as usize,
                    local_header_offset: local_header_offset as usize,
                },
            );
        }
        pos = name_end + extra_len + comment_len;
    }

    debug!(members = entries.len(), "Indexed zip central directory");
    Ok(entries)
}

/// Extract one member in full.
pub fn extract(data: &[u8], entry: &ZipEntry) -> io::Result<Bytes> {
    let local = entry.local_header_offset;
    if local + 30 > data.len() || data[local..local + 4] != LOCAL_SIG {
        return Err(invalid(format!("bad local header at offset {:#x}", local)));
    }
    let start = local + 30 + usize::from(le16(data, local + 26)) + usize::from(le16(data, local + 28));
    let raw = start
        .checked_add(entry.compressed_size)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| invalid(format!("member data at {:#x} runs past end of archive", start)))?;

    match entry.method {
        STORED => Ok(Bytes::copy_from_slice(raw)),
        DEFLATE => {
            // declared size is only a hint, bounded by the archive length
            let mut out = Vec::with_capacity(entry.uncompressed_size.min(data.len()));
            DeflateDecoder::new(raw).read_to_end(&mut out)?;
            Ok(Bytes::from(out))
        }
        other => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unsupported zip compression method {}", other),
        )),
    }
}

fn find_eocd(data: &[u8]) -> Option<usize> {
    if data.len() < EOCD_LEN {
        return None;
    }
    let lowest = data.len().saturating_sub(EOCD_LEN + MAX_COMMENT);
    (lowest..=data.len() - EOCD_LEN)
        .rev()
        .find(|&i| data[i..i + 4] == EOCD_SIG)
}

fn le16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn le32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}
