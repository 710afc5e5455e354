//! Errors raised while turning a container into a region set.

use std::path::PathBuf;
use thiserror::Error;

use crate::mappings::RegionError;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{}: not a recognized memory dump: {reason}", .path.display())]
    UnrecognizedContainer { path: PathBuf, reason: String },

    #[error("malformed index record on line {line} ({record:?}): {reason}")]
    MalformedIndex {
        line: usize,
        record: String,
        reason: String,
    },

    #[error("no content in container for indexed region {start:#x}-{end:#x} ({token})")]
    IndexContentMismatch { token: String, start: u64, end: u64 },

    #[error("corrupt {kind} archive: {reason}")]
    CorruptArchive { kind: &'static str, reason: String },

    #[error("{}: image is empty", .path.display())]
    EmptyImage { path: PathBuf },

    #[error("region construction failed: {0}")]
    Region(#[from] RegionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub(crate) fn corrupt(kind: &'static str, reason: impl Into<String>) -> Self {
        LoadError::CorruptArchive {
            kind,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
