//! Sandbox process dumps: one file, a sequence of `header + content` records.
//!
//! Each header is 24 little-endian bytes: `addr: u64, size: u32, state: u32,
//! type: u32, protect: u32`, followed by `size` bytes of region content. All
//! regions are file-backed views of one shared memory map.

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::error::{LoadError, Result};
use crate::mappings::{Backing, FileView, MemoryRegion, Perms, RegionSet};
use crate::target::TargetDescriptor;

pub const RECORD_HEADER_LEN: usize = 24;

pub const PAGE_READONLY: u32 = 0x02;
pub const PAGE_READWRITE: u32 = 0x04;
pub const PAGE_WRITECOPY: u32 = 0x08;
pub const PAGE_EXECUTE: u32 = 0x10;
pub const PAGE_EXECUTE_READ: u32 = 0x20;
pub const PAGE_EXECUTE_READWRITE: u32 = 0x40;
pub const PAGE_EXECUTE_WRITECOPY: u32 = 0x80;

/// Map a Windows page protection value to region permissions.
///
/// Unknown values yield no permissions.
pub fn protect_to_perms(protect: u32) -> Perms {
    match protect {
        PAGE_READONLY => Perms::READ,
        PAGE_READWRITE => Perms::READ | Perms::WRITE,
        PAGE_WRITECOPY => Perms::READ | Perms::WRITE | Perms::COPY_ON_WRITE,
        PAGE_EXECUTE | PAGE_EXECUTE_READ => Perms::READ | Perms::EXECUTE,
        PAGE_EXECUTE_READWRITE => Perms::READ | Perms::WRITE | Perms::EXECUTE,
        PAGE_EXECUTE_WRITECOPY => {
            Perms::READ | Perms::WRITE | Perms::COPY_ON_WRITE | Perms::EXECUTE
        }
        _ => Perms::empty(),
    }
}

/// A loaded sandbox process dump.
#[derive(Debug)]
pub struct CuckooDump {
    regions: RegionSet,
    target: Arc<TargetDescriptor>,
    pid: Option<u32>,
}

impl CuckooDump {
    /// Open a dump captured from a 32-bit Windows process.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_target(path, TargetDescriptor::win_32())
    }

    pub fn open_with_target(path: impl AsRef<Path>, target: Arc<TargetDescriptor>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(LoadError::EmptyImage {
                path: path.to_path_buf(),
            });
        }
        // Safety: read-only map of a regular file.
        let map = Arc::new(unsafe { Mmap::map(&file)? });
        let regions = read_records(&map)?;

        // Dumps are named `<pid>-<n>.dmp`.
        let pid = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.split('-').next())
            .and_then(|pid| pid.parse().ok());

        let regions = RegionSet::build(regions, path.display().to_string())?;
        info!(
            path = %path.display(),
            regions = regions.len(),
            pid = ?pid,
            target = %target,
            "Loaded sandbox process dump"
        );
        Ok(Self {
            regions,
            target,
            pid,
        })
    }

    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    pub fn into_regions(self) -> RegionSet {
        self.regions
    }

    pub fn target(&self) -> &Arc<TargetDescriptor> {
        &self.target
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

fn read_records(map: &Arc<Mmap>) -> Result<Vec<MemoryRegion>> {
    let total = map.len();
    let mut regions = Vec::new();
    let mut offset = 0usize;

    while offset < total {
        if total - offset < RECORD_HEADER_LEN {
            warn!(offset, trailing = total - offset, "Ignoring trailing bytes shorter than a record header");
            break;
        }
        let header = &map[offset..offset + RECORD_HEADER_LEN];
        let addr = u64::from_le_bytes(header[0..8].try_into().map_err(|_| short_header(offset))?);
        let field = |at: usize| -> Result<u32> {
            Ok(u32::from_le_bytes(
                header[at..at + 4].try_into().map_err(|_| short_header(offset))?,
            ))
        };
        let (mut size, state, kind, protect) = (field(8)? as usize, field(12)?, field(16)?, field(20)?);
        let data_offset = offset + RECORD_HEADER_LEN;

        if data_offset + size > total {
            let available = total - data_offset;
            warn!(
                addr = %format!("{:#x}", addr),
                size = %format!("{:#x}", size),
                available = %format!("{:#x}", available),
                "Shrinking truncated last record"
            );
            size = available;
        }
        trace!(addr = %format!("{:#x}", addr), size, state, kind, protect, "Dump record");

        if size == 0 {
            debug!(addr = %format!("{:#x}", addr), "Skipping record without content");
        } else {
            let end = addr.checked_add(size as u64).ok_or_else(|| {
                LoadError::corrupt("process dump", format!("region at {:#x} wraps the address space", addr))
            })?;
            let view = FileView::new(Arc::clone(map), data_offset, size)?;
            let region = MemoryRegion::new(addr, end, Backing::File(view))?
                .with_perms(protect_to_perms(protect))
                .with_offset(data_offset as u64);
            regions.push(region);
        }
        offset = data_offset + size;
    }

    debug!(records = regions.len(), "Parsed process dump records");
    Ok(regions)
}

fn short_header(offset: usize) -> LoadError {
    LoadError::corrupt("process dump", format!("short record header at {:#x}", offset))
}
