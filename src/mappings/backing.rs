//! Backing strategies for region content.
//!
//! A region's bytes are either held in an owned buffer, fetched once on
//! first access (lazy loading), read through a memory-mapped view of the
//! container file, or absent altogether.

use bytes::Bytes;
use memmap2::Mmap;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::trace;

/// Produces the full content of one region on demand.
pub type Fetcher = Box<dyn Fn() -> io::Result<Bytes> + Send + Sync>;

/// Which backing strategy a region uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackingKind {
    Buffer,
    Deferred,
    File,
    Placeholder,
}

impl fmt::Display for BackingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackingKind::Buffer => write!(f, "buffer"),
            BackingKind::Deferred => write!(f, "deferred"),
            BackingKind::File => write!(f, "file"),
            BackingKind::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// A read-only window over a shared memory map.
///
/// Every read names its own offset; there is no cursor, so concurrent
/// readers never interfere.
#[derive(Clone)]
pub struct FileView {
    map: Arc<Mmap>,
    offset: usize,
    len: usize,
}

impl FileView {
    /// Create a view of `len` bytes starting `offset` bytes into `map`.
    pub fn new(map: Arc<Mmap>, offset: usize, len: usize) -> io::Result<Self> {
        let end = offset.checked_add(len).filter(|&end| end <= map.len());
        if end.is_none() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "view {:#x}+{:#x} exceeds mapped file of {:#x} bytes",
                    offset,
                    len,
                    map.len()
                ),
            ));
        }
        Ok(Self { map, offset, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the view inside the mapped file.
    pub fn file_offset(&self) -> usize {
        self.offset
    }

    fn slice(&self, rel: usize, len: usize) -> &[u8] {
        let start = self.offset + rel;
        &self.map[start..start + len]
    }
}

impl fmt::Debug for FileView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileView")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

/// Content fetched on first access and cached afterwards.
pub struct DeferredBuffer {
    fetch: Fetcher,
    cell: OnceCell<Bytes>,
}

impl DeferredBuffer {
    pub fn new(fetch: Fetcher) -> Self {
        Self {
            fetch,
            cell: OnceCell::new(),
        }
    }

    /// Return the cached content, fetching it if this is the first access.
    ///
    /// Concurrent first accesses are safe: at most one fetch result is kept.
    pub fn get(&self) -> io::Result<&Bytes> {
        self.cell.get_or_try_init(|| {
            let data = (self.fetch)()?;
            trace!(len = data.len(), "Fetched deferred region content");
            Ok(data)
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Drop the cached content; the next read fetches again.
    pub fn reset(&mut self) {
        self.cell.take();
    }
}

impl fmt::Debug for DeferredBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredBuffer")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// How a region's content is made available.
#[derive(Debug)]
pub enum Backing {
    Buffer(Bytes),
    Deferred(DeferredBuffer),
    File(FileView),
    Placeholder,
}

impl Backing {
    pub fn kind(&self) -> BackingKind {
        match self {
            Backing::Buffer(_) => BackingKind::Buffer,
            Backing::Deferred(_) => BackingKind::Deferred,
            Backing::File(_) => BackingKind::File,
            Backing::Placeholder => BackingKind::Placeholder,
        }
    }

    /// Read `len` bytes at `rel` bytes into the content.
    pub(crate) fn read(&self, rel: usize, len: usize) -> Result<Bytes, ReadFailure> {
        let end = rel.saturating_add(len);
        match self {
            Backing::Placeholder => Err(ReadFailure::Unavailable),
            Backing::Buffer(data) => slice_bytes(data, rel, end),
            Backing::Deferred(deferred) => slice_bytes(deferred.get()?, rel, end),
            Backing::File(view) => {
                if end > view.len() {
                    return Err(ReadFailure::Short {
                        available: view.len(),
                    });
                }
                Ok(Bytes::copy_from_slice(view.slice(rel, len)))
            }
        }
    }

    /// Number of content bytes currently held in memory.
    pub fn resident_bytes(&self) -> usize {
        match self {
            Backing::Buffer(data) => data.len(),
            Backing::Deferred(deferred) => deferred.cell.get().map_or(0, Bytes::len),
            Backing::File(_) | Backing::Placeholder => 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        if let Backing::Deferred(deferred) = self {
            deferred.reset();
        }
    }
}

/// Why a backing could not serve a read; mapped to `RegionError` by the region.
#[derive(Debug)]
pub(crate) enum ReadFailure {
    Unavailable,
    Short { available: usize },
    Io(io::Error),
}

impl From<io::Error> for ReadFailure {
    fn from(err: io::Error) -> Self {
        ReadFailure::Io(err)
    }
}

fn slice_bytes(data: &Bytes, rel: usize, end: usize) -> Result<Bytes, ReadFailure> {
    if end > data.len() {
        return Err(ReadFailure::Short {
            available: data.len(),
        });
    }
    Ok(data.slice(rel..end))
}
