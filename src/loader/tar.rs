//! Minimal ustar reader.
//!
//! Walks 512-byte headers and records where each regular member's data
//! starts, so callers can slice or map the archive directly without copying.

use std::collections::HashMap;
use tracing::{debug, trace};

use super::error::{LoadError, Result};

const BLOCK: usize = 512;

/// Location of one regular member inside the archive bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TarEntry {
    pub data_offset: usize,
    pub size: usize,
}

/// True if `data` starts with a tar header whose checksum verifies.
pub fn looks_like_tar(data: &[u8]) -> bool {
    data.len() >= BLOCK && header_checksum_ok(&data[..BLOCK])
}

/// Index every regular member of the archive by normalized name.
///
/// # Errors
/// `CorruptArchive` on a bad checksum, an unparsable size field or a member
/// whose data runs past the end of the archive.
pub fn read_entries(data: &[u8]) -> Result<HashMap<String, TarEntry>> {
    let mut entries = HashMap::new();
    let mut offset = 0usize;
    let mut long_name: Option<String> = None;

    while offset + BLOCK <= data.len() {
        let header = &data[offset..offset + BLOCK];
        if header.iter().all(|&b| b == 0) {
            break;
        }
        if !header_checksum_ok(header) {
            return Err(LoadError::corrupt(
                "tar",
                format!("bad header checksum at offset {:#x}", offset),
            ));
        }

        let size = parse_size(&header[124..136]).ok_or_else(|| {
            LoadError::corrupt("tar", format!("bad size field at offset {:#x}", offset))
        })?;
        let data_offset = offset + BLOCK;
        let data_end = data_offset
            .checked_add(size)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                LoadError::corrupt(
                    "tar",
                    format!("member at offset {:#x} runs past end of archive", offset),
                )
            })?;

        match header[156] {
            b'0' | 0 | b'7' => {
                let name = long_name.take().unwrap_or_else(|| header_name(header));
                let name = normalize_name(&name);
                trace!(name = %name, data_offset, size, "Tar member");
                if !name.is_empty() && !name.ends_with('/') {
                    entries.insert(name, TarEntry { data_offset, size });
                }
            }
            b'L' => {
                long_name = Some(cstr(&data[data_offset..data_end]));
            }
            // Directories, links, pax headers and other specials carry no region content.
            flag => {
                trace!(flag, "Skipping tar special entry");
                long_name = None;
            }
        }

        offset = data_offset + size.div_ceil(BLOCK) * BLOCK;
    }

    debug!(members = entries.len(), "Indexed tar archive");
    Ok(entries)
}

/// Strip leading `./` components and a leading `/`.
pub fn normalize_name(name: &str) -> String {
    let mut name = name;
    loop {
        if let Some(rest) = name.strip_prefix("./") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix('/') {
            name = rest;
        } else {
            break;
        }
    }
    name.to_string()
}

fn header_name(header: &[u8]) -> String {
    let name = cstr(&header[0..100]);
    let prefix = if &header[257..262] == b"ustar" {
        cstr(&header[345..500])
    } else {
        String::new()
    };
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn cstr(field: &[u8]) -> String {
    let end = memchr::memchr(0, field).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn parse_size(field: &[u8]) -> Option<usize> {
    // GNU base-256 encoding for sizes that do not fit in 11 octal digits.
    if field[0] & 0x80 != 0 {
        let value = field[1..]
            .iter()
            .try_fold(u64::from(field[0] & 0x7f), |acc, &b| {
                acc.checked_mul(256).map(|v| v | u64::from(b))
            })?;
        return usize::try_from(value).ok();
    }
    let text = cstr(field);
    let text = text.trim_matches(|c: char| c == ' ' || c == '\0');
    if text.is_empty() {
        return Some(0);
    }
    u64::from_str_radix(text, 8)
        .ok()
        .and_then(|v| usize::try_from(v).ok())
}

fn header_checksum_ok(header: &[u8]) -> bool {
    let stored = cstr(&header[148..156]);
    let Ok(stored) = u32::from_str_radix(stored.trim_matches(|c: char| c == ' ' || c == '\0'), 8)
    else {
        return false;
    };
    let computed: u32 = header
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { u32::from(b' ') } else { u32::from(b) })
        .sum();
    stored == computed
}
