//! Dump loading: from a container artifact to a populated [`RegionSet`].
//!
//! The index is parsed up front. Each record's content member is then
//! resolved and given a backing:
//!
//! - containers without random access (zip, gzip-wrapped tar) always get an
//!   in-memory buffer, filled immediately in eager mode or on first read in
//!   lazy mode;
//! - otherwise regions above the mode's size threshold are file-backed;
//! - smaller regions are buffered, eagerly or on first read;
//! - a missing member fails an eager load and becomes a placeholder in a
//!   lazy one.

pub mod container;
pub mod cuckoo;
pub mod error;
pub mod index;
pub mod raw;
pub mod tar;
pub mod zip;

pub use container::{Container, ContainerKind};
pub use cuckoo::CuckooDump;
pub use error::{LoadError, Result};
pub use index::{parse_index, IndexRecord};
pub use raw::load_raw_image;

use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::mappings::{Backing, BackingKind, DeferredBuffer, MemoryRegion, Perms, RegionSet};
use crate::span_trace;

/// When region content is read from the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum LoadMode {
    /// Read every region's content during the load.
    Eager,
    /// Read only the index; fetch content on first access.
    #[default]
    Lazy,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Eager => write!(f, "eager"),
            LoadMode::Lazy => write!(f, "lazy"),
        }
    }
}

/// Summary of one completed load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub label: String,
    pub container: ContainerKind,
    pub mode: LoadMode,
    pub regions: usize,
    pub buffered: usize,
    pub deferred: usize,
    pub file_backed: usize,
    pub placeholders: usize,
    /// Content bytes held in memory when the load returned.
    pub bytes_materialized: u64,
}

impl LoadReport {
    fn new(label: String, container: ContainerKind, mode: LoadMode) -> Self {
        Self {
            label,
            container,
            mode,
            regions: 0,
            buffered: 0,
            deferred: 0,
            file_backed: 0,
            placeholders: 0,
            bytes_materialized: 0,
        }
    }

    fn record(&mut self, region: &MemoryRegion) {
        self.regions += 1;
        match region.backing_kind() {
            BackingKind::Buffer => self.buffered += 1,
            BackingKind::Deferred => self.deferred += 1,
            BackingKind::File => self.file_backed += 1,
            BackingKind::Placeholder => self.placeholders += 1,
        }
        self.bytes_materialized += region.backing().resident_bytes() as u64;
    }
}

/// Loads process dumps stored as an index plus one member per region.
#[derive(Debug, Clone, Default)]
pub struct DumpLoader {
    config: LoaderConfig,
    mode: LoadMode,
}

impl DumpLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            mode: LoadMode::default(),
        }
    }

    pub fn mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<RegionSet> {
        self.load_with_report(path).map(|(set, _)| set)
    }

    /// Load a dump and report how its regions were backed.
    ///
    /// No partial set is returned: any error aborts the whole load.
    pub fn load_with_report(&self, path: impl AsRef<Path>) -> Result<(RegionSet, LoadReport)> {
        let path = path.as_ref();
        let span = span_trace!("load_dump", path = %path.display(), mode = %self.mode);
        let _guard = span.enter();

        let container = Container::open(path, &self.config)?;
        let records = parse_index(&container.read_index()?)?;
        let perms: Perms = self.config.default_permissions.parse()?;

        if !container.kind().supports_random_access() {
            warn!(
                kind = %container.kind(),
                "Container cannot be read at offsets; all regions will be buffered in memory"
            );
        }

        let label = path.display().to_string();
        let mut report = LoadReport::new(label.clone(), container.kind(), self.mode);
        let mut regions = Vec::with_capacity(records.len());
        for record in &records {
            let region = self
                .build_region(&container, record)?
                .with_perms(perms)
                .with_pathname(record.label.as_str());
            report.record(&region);
            regions.push(region);
        }

        let set = RegionSet::build(regions, label)?;
        info!(
            label = %report.label,
            regions = report.regions,
            buffered = report.buffered,
            deferred = report.deferred,
            file_backed = report.file_backed,
            placeholders = report.placeholders,
            bytes = report.bytes_materialized,
            "Loaded memory dump"
        );
        Ok((set, report))
    }

    fn build_region(&self, container: &Arc<Container>, record: &IndexRecord) -> Result<MemoryRegion> {
        let (start, end) = (record.start, record.end);
        let candidates = record.member_candidates();
        let Some(member) = container.resolve(&candidates) else {
            return match self.mode {
                LoadMode::Eager => Err(LoadError::IndexContentMismatch {
                    token: record.token.clone(),
                    start,
                    end,
                }),
                LoadMode::Lazy => {
                    warn!(
                        start = %format!("{:#x}", start),
                        end = %format!("{:#x}", end),
                        label = %record.label,
                        "Region content absent from container, using placeholder"
                    );
                    Ok(MemoryRegion::placeholder(start, end)?)
                }
            };
        };

        let member_len = container.member_len(member);
        if let Some(len) = member_len {
            if len != record.size() {
                warn!(
                    member,
                    indexed = record.size(),
                    stored = len,
                    "Region content size differs from indexed bounds"
                );
            }
        }

        let threshold = match self.mode {
            LoadMode::Eager => self.config.eager_file_backed_threshold,
            LoadMode::Lazy => self.config.lazy_file_backed_threshold,
        };
        let backing = if container.kind().supports_random_access()
            && record.size() > threshold
            && member_len != Some(0)
        {
            Backing::File(container.view(member)?)
        } else {
            match self.mode {
                LoadMode::Eager => Backing::Buffer(container.whole(member)?),
                LoadMode::Lazy => Backing::Deferred(deferred(container, member)),
            }
        };

        debug!(
            start = %format!("{:#x}", start),
            end = %format!("{:#x}", end),
            member,
            backing = %backing.kind(),
            "Built region"
        );
        Ok(MemoryRegion::new(start, end, backing)?)
    }
}

fn deferred(container: &Arc<Container>, member: &str) -> DeferredBuffer {
    let container = Arc::clone(container);
    let member = member.to_string();
    DeferredBuffer::new(Box::new(move || -> std::io::Result<Bytes> {
        container.whole(&member)
    }))
}

/// Load a dump with the default configuration.
pub fn load(path: impl AsRef<Path>, mode: LoadMode) -> Result<RegionSet> {
    DumpLoader::default().mode(mode).load(path)
}
