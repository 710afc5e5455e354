//! Error types for region construction and region reads.

use thiserror::Error;

use crate::target::TargetError;

#[derive(Error, Debug)]
pub enum RegionError {
    #[error("read of {len} bytes at {address:#x} exceeds region {start:#x}-{end:#x}")]
    OutOfRange {
        address: u64,
        len: usize,
        start: u64,
        end: u64,
    },

    #[error("region {start:#x}-{end:#x} has no captured content")]
    Unavailable { start: u64, end: u64 },

    #[error("captured content of region {start:#x}-{end:#x} stops at {available_end:#x}, read at {address:#x} needs {len} bytes")]
    Truncated {
        address: u64,
        len: usize,
        start: u64,
        end: u64,
        available_end: u64,
    },

    #[error("regions {first_start:#x}-{first_end:#x} and {second_start:#x}-{second_end:#x} overlap")]
    Overlap {
        first_start: u64,
        first_end: u64,
        second_start: u64,
        second_end: u64,
    },

    #[error("invalid region bounds {start:#x}-{end:#x}")]
    InvalidBounds { start: u64, end: u64 },

    #[error("address {address:#x} is not mapped")]
    NotMapped { address: u64 },

    #[error("invalid permission string {0:?}")]
    InvalidPermissions(String),

    #[error("decode error: {0}")]
    Decode(#[from] TargetError),

    #[error("I/O error while fetching region content: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegionError>;
