//! Top-level error type for memsift.
//!
//! Each module keeps its own error enum; `MemsiftError` wraps them so a
//! caller driving a whole load-then-analyze run can always tell which stage
//! failed.

use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::heuristics::AnalysisError;
use crate::loader::LoadError;
use crate::mappings::RegionError;
use crate::target::TargetError;

/// Processing stage at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ContainerRecognition,
    IndexParsing,
    RegionConstruction,
    RegionRead,
    FieldAnalysis,
    Configuration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ContainerRecognition => "container recognition",
            Stage::IndexParsing => "index parsing",
            Stage::RegionConstruction => "region construction",
            Stage::RegionRead => "region read",
            Stage::FieldAnalysis => "field analysis",
            Stage::Configuration => "configuration",
        };
        f.write_str(s)
    }
}

/// Main error type for memsift operations.
#[derive(Debug, Error)]
pub enum MemsiftError {
    #[error("{stage} failed: {0}", stage = Stage::from(.0))]
    Load(#[from] LoadError),

    #[error("{stage} failed: {0}", stage = Stage::from(.0))]
    Region(#[from] RegionError),

    #[error("{stage} failed: {0}", stage = Stage::from(.0))]
    Target(#[from] TargetError),

    #[error("field analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("configuration failed: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for memsift operations
pub type Result<T> = std::result::Result<T, MemsiftError>;

impl MemsiftError {
    pub fn stage(&self) -> Stage {
        match self {
            MemsiftError::Load(e) => e.into(),
            MemsiftError::Region(e) => e.into(),
            MemsiftError::Target(e) => e.into(),
            MemsiftError::Analysis(AnalysisError::Region(_)) => Stage::RegionRead,
            MemsiftError::Analysis(_) => Stage::FieldAnalysis,
            MemsiftError::Config(_) => Stage::Configuration,
        }
    }
}

impl From<&RegionError> for Stage {
    fn from(err: &RegionError) -> Self {
        match err {
            RegionError::Overlap { .. }
            | RegionError::InvalidBounds { .. }
            | RegionError::InvalidPermissions(_) => Stage::RegionConstruction,
            RegionError::OutOfRange { .. }
            | RegionError::Unavailable { .. }
            | RegionError::Truncated { .. }
            | RegionError::NotMapped { .. }
            | RegionError::Decode(_)
            | RegionError::Io(_) => Stage::RegionRead,
        }
    }
}

impl From<&LoadError> for Stage {
    fn from(err: &LoadError) -> Self {
        match err {
            LoadError::UnrecognizedContainer { .. }
            | LoadError::CorruptArchive { .. }
            | LoadError::EmptyImage { .. }
            | LoadError::Io(_) => Stage::ContainerRecognition,
            LoadError::MalformedIndex { .. } => Stage::IndexParsing,
            LoadError::IndexContentMismatch { .. } | LoadError::Region(_) => {
                Stage::RegionConstruction
            }
        }
    }
}

impl From<&TargetError> for Stage {
    fn from(err: &TargetError) -> Self {
        match err {
            TargetError::UnsupportedSize { .. } => Stage::Configuration,
            TargetError::LengthMismatch { .. } => Stage::RegionRead,
        }
    }
}
