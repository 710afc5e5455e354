//! An ordered, non-overlapping collection of regions forming one snapshot.

use bytes::Bytes;
use tracing::debug;

use super::error::{RegionError, Result};
use super::region::MemoryRegion;
use crate::target::TargetDescriptor;

/// One captured address space.
///
/// Regions are kept sorted by start address, so address lookup is a binary
/// search. The set is read-only once built and can be shared across threads.
#[derive(Debug)]
pub struct RegionSet {
    regions: Vec<MemoryRegion>,
    label: String,
}

impl RegionSet {
    /// Build a set from `regions`, sorting them by start address.
    ///
    /// # Errors
    /// `Overlap` if any two ranges intersect. Touching ranges such as
    /// `[0, 10)` and `[10, 20)` are accepted.
    pub fn build(mut regions: Vec<MemoryRegion>, label: impl Into<String>) -> Result<Self> {
        regions.sort_by_key(MemoryRegion::start);
        for pair in regions.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if b.start() < a.end() {
                return Err(RegionError::Overlap {
                    first_start: a.start(),
                    first_end: a.end(),
                    second_start: b.start(),
                    second_end: b.end(),
                });
            }
        }

        let label = label.into();
        debug!(label = %label, regions = regions.len(), "Built region set");
        Ok(Self { regions, label })
    }

    /// The unique region containing `address`, if any.
    pub fn region_for_address(&self, address: u64) -> Option<&MemoryRegion> {
        let idx = self.regions.partition_point(|r| r.start() <= address);
        let candidate = self.regions.get(idx.checked_sub(1)?)?;
        candidate.contains(address).then_some(candidate)
    }

    /// True if `address` falls in a region whose content was captured.
    ///
    /// Placeholders are excluded so that a known gap is never taken as a
    /// valid pointer target.
    pub fn contains_address(&self, address: u64) -> bool {
        self.region_for_address(address)
            .is_some_and(|r| !r.is_placeholder())
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MemoryRegion> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Regions whose source path label equals `pathname`.
    pub fn regions_with_pathname<'a>(
        &'a self,
        pathname: &'a str,
    ) -> impl Iterator<Item = &'a MemoryRegion> + 'a {
        self.regions.iter().filter(move |r| r.pathname() == pathname)
    }

    /// Read bytes through whichever region owns `address`.
    pub fn read_bytes(&self, address: u64, len: usize) -> Result<Bytes> {
        self.owner(address)?.read_bytes(address, len)
    }

    /// Read one target word through whichever region owns `address`.
    pub fn read_word(&self, target: &TargetDescriptor, address: u64) -> Result<u64> {
        self.owner(address)?.read_word(target, address)
    }

    /// Sum of all region sizes, placeholders included.
    pub fn total_size(&self) -> u64 {
        self.regions.iter().map(MemoryRegion::size).sum()
    }

    /// Drop cached content held by deferred regions.
    pub fn reset(&mut self) {
        self.regions.iter_mut().for_each(MemoryRegion::reset);
    }

    fn owner(&self, address: u64) -> Result<&MemoryRegion> {
        self.region_for_address(address)
            .ok_or(RegionError::NotMapped { address })
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a MemoryRegion;
    type IntoIter = std::slice::Iter<'a, MemoryRegion>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}
