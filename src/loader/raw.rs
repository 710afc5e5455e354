//! Raw memory images mapped at a fixed base address (kernel-core style).

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::error::{LoadError, Result};
use crate::mappings::{Backing, FileView, MemoryRegion, Perms, RegionError, RegionSet};

/// Map the whole of `path` as one file-backed region starting at `base`.
pub fn load_raw_image(path: impl AsRef<Path>, base: u64) -> Result<RegionSet> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Err(LoadError::EmptyImage {
            path: path.to_path_buf(),
        });
    }
    let end = base
        .checked_add(len)
        .ok_or(RegionError::InvalidBounds { start: base, end: u64::MAX })?;

    // Safety: read-only map of a regular file.
    let map = Arc::new(unsafe { Mmap::map(&file)? });
    let map_len = map.len();
    let label = path.display().to_string();
    let region = MemoryRegion::new(base, end, Backing::File(FileView::new(map, 0, map_len)?))?
        .with_perms(Perms::READ | Perms::WRITE | Perms::EXECUTE)
        .with_pathname(label.as_str());

    info!(path = %label, base = %format!("{:#x}", base), size = len, "Mapped raw image");
    Ok(RegionSet::build(vec![region], label)?)
}
