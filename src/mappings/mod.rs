//! Mapping model: regions, their backings and the region set.

pub mod backing;
pub mod error;
pub mod perms;
pub mod region;
pub mod set;

pub use backing::{Backing, BackingKind, DeferredBuffer, Fetcher, FileView};
pub use error::{RegionError, Result};
pub use perms::Perms;
pub use region::MemoryRegion;
pub use set::RegionSet;
