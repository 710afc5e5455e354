//! Errors raised by the field analyzer.
//!
//! Every variant except `Region` signals a defect in a detector or in the
//! caller, not bad input data: the analysis of that structure is abandoned.

use thiserror::Error;

use crate::mappings::RegionError;
use crate::target::TargetError;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("field at offset {offset:#x} overlaps previous field ending at {previous_end:#x}")]
    OverlappingFields { offset: usize, previous_end: usize },

    #[error("offset {offset:#x} is not aligned to the {word_size}-byte word")]
    MisalignedOffset { offset: usize, word_size: usize },

    #[error("range {offset:#x}+{size:#x} exceeds structure of {len:#x} bytes")]
    OutOfBounds { offset: usize, size: usize, len: usize },

    #[error("fields do not tile the structure at offset {offset:#x}")]
    IncompleteTiling { offset: usize },

    #[error("cannot read structure bytes: {0}")]
    Region(#[from] RegionError),

    #[error("decode error: {0}")]
    Target(#[from] TargetError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
