//! memsift: load captured process memory and infer record layouts in it.
//!
//! A dump container (tar, zip, gzip-wrapped tar, directory, sandbox dump or
//! raw image) is loaded into a [`RegionSet`] of typed, permission-tagged
//! memory regions. A [`FieldAnalyzer`] then partitions candidate structures
//! read from those regions into fields: zero runs, strings, pointers, small
//! integers and unknown bytes.
//!
//! ```no_run
//! use memsift::{load, FieldAnalyzer, LoadMode, Structure, TargetDescriptor};
//!
//! let regions = load("dump.tar", LoadMode::Lazy)?;
//! let target = TargetDescriptor::linux_64();
//! let record = Structure::from_region_set(&regions, 0x0060_2010, 64)?;
//! let layout = FieldAnalyzer::default().analyze(&record, &regions, &target)?;
//! print!("{}", layout.render(&record));
//! # Ok::<(), memsift::MemsiftError>(())
//! ```

/// Runtime configuration
pub mod config;
/// Top-level error and failing stage
pub mod error;
/// Field layout inference
pub mod heuristics;
/// Dump containers and loaders
pub mod loader;
/// Logging and tracing infrastructure
pub mod logging;
/// Memory regions and region sets
pub mod mappings;
/// Target word size and byte order
pub mod target;

pub use config::{AnalyzerConfig, Config, LoaderConfig};
pub use error::{MemsiftError, Result, Stage};
pub use heuristics::{
    AnalyzedStructure, Field, FieldAnalyzer, FieldKind, FieldValue, FunctionNames, Structure,
};
pub use loader::{load, load_raw_image, CuckooDump, DumpLoader, LoadMode, LoadReport};
pub use mappings::{BackingKind, MemoryRegion, Perms, RegionSet};
pub use target::{Endianness, OsFamily, TargetDescriptor};
