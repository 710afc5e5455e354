//! A single contiguous range of captured address space.

use bytes::Bytes;
use memchr::memchr;
use std::fmt;
use tracing::trace;

use super::backing::{Backing, BackingKind, ReadFailure};
use super::error::{RegionError, Result};
use super::perms::Perms;
use crate::target::TargetDescriptor;

/// One captured memory mapping, `[start, end)`.
///
/// Content is read-only once built. Device, inode and offset fields record
/// provenance from the capture and carry no semantics here.
#[derive(Debug)]
pub struct MemoryRegion {
    start: u64,
    end: u64,
    perms: Perms,
    offset: u64,
    major_device: u32,
    minor_device: u32,
    inode: u64,
    pathname: String,
    backing: Backing,
}

impl MemoryRegion {
    /// Create a region over `[start, end)`.
    ///
    /// # Errors
    /// `InvalidBounds` unless `end > start`.
    pub fn new(start: u64, end: u64, backing: Backing) -> Result<Self> {
        if end <= start {
            return Err(RegionError::InvalidBounds { start, end });
        }
        Ok(Self {
            start,
            end,
            perms: Perms::READ,
            offset: 0,
            major_device: 0,
            minor_device: 0,
            inode: 0,
            pathname: String::new(),
            backing,
        })
    }

    /// Buffer-backed region whose extent is the buffer length.
    pub fn from_bytes(start: u64, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let end = start.saturating_add(data.len() as u64);
        Self::new(start, end, Backing::Buffer(data))
    }

    /// Region whose range is known but whose content was not captured.
    pub fn placeholder(start: u64, end: u64) -> Result<Self> {
        Self::new(start, end, Backing::Placeholder)
    }

    pub fn with_perms(mut self, perms: Perms) -> Self {
        self.perms = perms;
        self
    }

    pub fn with_pathname(mut self, pathname: impl Into<String>) -> Self {
        self.pathname = pathname.into();
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_device(mut self, major: u32, minor: u32) -> Self {
        self.major_device = major;
        self.minor_device = minor;
        self
    }

    pub fn with_inode(mut self, inode: u64) -> Self {
        self.inode = inode;
        self
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn perms(&self) -> Perms {
        self.perms
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn major_device(&self) -> u32 {
        self.major_device
    }

    pub fn minor_device(&self) -> u32 {
        self.minor_device
    }

    pub fn inode(&self) -> u64 {
        self.inode
    }

    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    pub fn backing_kind(&self) -> BackingKind {
        self.backing.kind()
    }

    pub fn is_placeholder(&self) -> bool {
        self.backing_kind() == BackingKind::Placeholder
    }

    /// True if `address` lies in `[start, end)`.
    pub fn contains(&self, address: u64) -> bool {
        self.start <= address && address < self.end
    }

    /// Read `len` bytes at virtual `address`.
    ///
    /// # Errors
    /// `OutOfRange` if the window leaves the region, `Unavailable` on a
    /// placeholder, `Truncated` when the capture holds fewer bytes than the
    /// range announces, `Io` if a deferred fetch fails.
    pub fn read_bytes(&self, address: u64, len: usize) -> Result<Bytes> {
        let rel = self.relative(address, len)?;
        trace!(address = %format!("{:#x}", address), len, backing = %self.backing_kind(), "Region read");
        self.backing.read(rel, len).map_err(|failure| match failure {
            ReadFailure::Unavailable => RegionError::Unavailable {
                start: self.start,
                end: self.end,
            },
            ReadFailure::Short { available } => RegionError::Truncated {
                address,
                len,
                start: self.start,
                end: self.end,
                available_end: self.start + available as u64,
            },
            ReadFailure::Io(err) => RegionError::Io(err),
        })
    }

    /// Read one target word at `address`, decoded in the target's byte order.
    pub fn read_word(&self, target: &TargetDescriptor, address: u64) -> Result<u64> {
        let bytes = self.read_bytes(address, target.word_size())?;
        Ok(target.decode_word(&bytes)?)
    }

    /// Read one target pointer at `address`.
    pub fn read_pointer(&self, target: &TargetDescriptor, address: u64) -> Result<u64> {
        let bytes = self.read_bytes(address, target.pointer_size())?;
        Ok(target.decode_pointer(&bytes)?)
    }

    /// Read the raw bytes of one extended float at `address`.
    pub fn read_float_ext(&self, target: &TargetDescriptor, address: u64) -> Result<Bytes> {
        let bytes = self.read_bytes(address, target.float_ext_size())?;
        target.float_ext_bytes(&bytes)?;
        Ok(bytes)
    }

    /// Read `count` consecutive elements of `element_size` bytes.
    pub fn read_array(&self, address: u64, element_size: usize, count: usize) -> Result<Bytes> {
        let len = element_size
            .checked_mul(count)
            .ok_or(RegionError::OutOfRange {
                address,
                len: usize::MAX,
                start: self.start,
                end: self.end,
            })?;
        self.read_bytes(address, len)
    }

    /// Read a NUL-terminated string of at most `max_len` bytes, stopping at
    /// the region end.
    pub fn read_cstring(&self, address: u64, max_len: usize) -> Result<String> {
        if !self.contains(address) {
            return Err(RegionError::OutOfRange {
                address,
                len: max_len,
                start: self.start,
                end: self.end,
            });
        }
        let available = (self.end - address).min(max_len as u64) as usize;
        let bytes = self.read_bytes(address, available)?;
        let stop = memchr(0, &bytes).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..stop]).into_owned())
    }

    /// Drop cached content. Never touches buffer or file backings.
    pub fn reset(&mut self) {
        self.backing.reset();
    }

    fn relative(&self, address: u64, len: usize) -> Result<usize> {
        let out_of_range = || RegionError::OutOfRange {
            address,
            len,
            start: self.start,
            end: self.end,
        };
        let end = address.checked_add(len as u64).ok_or_else(out_of_range)?;
        if address < self.start || end > self.end {
            return Err(out_of_range());
        }
        Ok((address - self.start) as usize)
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:08x} {} {:08x} {:02x}:{:02x} {} {}",
            self.start,
            self.end,
            self.perms,
            self.offset,
            self.major_device,
            self.minor_device,
            self.inode,
            self.pathname
        )
    }
}
