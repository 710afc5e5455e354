//! Target descriptors for captured address spaces.
//!
//! A [`TargetDescriptor`] carries the architecture parameters of the system
//! that produced a dump: word size, pointer size, extended-float size, byte
//! order and OS family. It is an immutable value handed explicitly to every
//! component that decodes bytes, so two dumps of different word sizes can be
//! analyzed side by side in one process.
//!
//! Descriptors are interned: [`TargetDescriptor::make`] returns the same
//! `Arc` for the same parameter tuple.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Errors raised while building descriptors or decoding raw bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("length mismatch: expected {expected} bytes, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("unsupported {what} size: {size}")]
    UnsupportedSize { what: &'static str, size: usize },
}

pub type Result<T> = std::result::Result<T, TargetError>;

/// Byte order of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    /// Little-endian byte order
    Little,
    /// Big-endian byte order
    Big,
}

impl Endianness {
    /// Byte order of the analysis host.
    pub fn host() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// Decode an unsigned integer of up to eight bytes.
    pub(crate) fn fold(self, bytes: &[u8]) -> u64 {
        match self {
            Endianness::Little => bytes
                .iter()
                .rev()
                .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
            Endianness::Big => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "little"),
            Endianness::Big => write!(f, "big"),
        }
    }
}

/// Operating system family of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsFamily {
    Linux,
    Windows,
    Other,
}

impl OsFamily {
    /// OS family of the analysis host.
    pub fn host() -> Self {
        if cfg!(windows) {
            OsFamily::Windows
        } else if cfg!(target_os = "linux") {
            OsFamily::Linux
        } else {
            OsFamily::Other
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Linux => write!(f, "linux"),
            OsFamily::Windows => write!(f, "windows"),
            OsFamily::Other => write!(f, "other"),
        }
    }
}

type DescriptorKey = (usize, usize, usize, Endianness, OsFamily);

static DESCRIPTORS: Lazy<Mutex<HashMap<DescriptorKey, Arc<TargetDescriptor>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Immutable per-architecture decoding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetDescriptor {
    word_size: usize,
    pointer_size: usize,
    float_ext_size: usize,
    endianness: Endianness,
    os_family: OsFamily,
}

impl TargetDescriptor {
    /// Build (or fetch from the cache) the descriptor for a parameter tuple.
    ///
    /// # Errors
    /// `UnsupportedSize` if the word or pointer size is not 4 or 8, or the
    /// extended-float size is zero.
    pub fn make(
        word_size: usize,
        pointer_size: usize,
        float_ext_size: usize,
        endianness: Endianness,
        os_family: OsFamily,
    ) -> Result<Arc<Self>> {
        check_scalar("word", word_size)?;
        check_scalar("pointer", pointer_size)?;
        if float_ext_size == 0 {
            return Err(TargetError::UnsupportedSize {
                what: "extended float",
                size: float_ext_size,
            });
        }

        Ok(Self::intern((
            word_size,
            pointer_size,
            float_ext_size,
            endianness,
            os_family,
        )))
    }

    /// 32-bit little-endian Linux (ILP32).
    pub fn linux_32() -> Arc<Self> {
        Self::preset(4, 4, 12, OsFamily::Linux)
    }

    /// 64-bit little-endian Linux (LP64).
    pub fn linux_64() -> Arc<Self> {
        Self::preset(8, 8, 16, OsFamily::Linux)
    }

    /// 32-bit little-endian Windows.
    pub fn win_32() -> Arc<Self> {
        Self::preset(4, 4, 8, OsFamily::Windows)
    }

    /// 64-bit little-endian Windows.
    ///
    /// The word size is the register width (8) rather than the LLP64 `long`,
    /// since heuristic scanning walks memory in register-sized steps.
    pub fn win_64() -> Arc<Self> {
        Self::preset(8, 8, 8, OsFamily::Windows)
    }

    /// Descriptor mirroring the analysis host.
    pub fn host() -> Arc<Self> {
        let word = std::mem::size_of::<std::os::raw::c_long>();
        let pointer = std::mem::size_of::<usize>();
        let float_ext = if pointer == 8 { 16 } else { 12 };
        // Host sizes are always 4 or 8 on supported platforms.
        Self::make(word, pointer, float_ext, Endianness::host(), OsFamily::host())
            .unwrap_or_else(|_| Self::linux_64())
    }

    fn preset(word: usize, pointer: usize, float_ext: usize, os: OsFamily) -> Arc<Self> {
        Self::intern((word, pointer, float_ext, Endianness::Little, os))
    }

    fn intern(key: DescriptorKey) -> Arc<Self> {
        let mut cache = DESCRIPTORS.lock().unwrap_or_else(PoisonError::into_inner);
        let descriptor = cache.entry(key).or_insert_with(|| {
            let (word_size, pointer_size, float_ext_size, endianness, os_family) = key;
            debug!(
                word_size,
                pointer_size,
                float_ext_size,
                endianness = %endianness,
                os = %os_family,
                "Interning target descriptor"
            );
            Arc::new(Self {
                word_size,
                pointer_size,
                float_ext_size,
                endianness,
                os_family,
            })
        });
        Arc::clone(descriptor)
    }

    pub fn word_size(&self) -> usize {
        self.word_size
    }

    pub fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    /// Storage size of the platform's `long double`.
    pub fn float_ext_size(&self) -> usize {
        self.float_ext_size
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn os_family(&self) -> OsFamily {
        self.os_family
    }

    /// Number of bits in one word.
    pub fn word_bits(&self) -> u32 {
        (self.word_size * 8) as u32
    }

    /// True if `offset` sits on a word boundary.
    pub fn is_word_aligned(&self, offset: usize) -> bool {
        offset % self.word_size == 0
    }

    /// Round `offset` up to the next word boundary.
    pub fn align_up(&self, offset: usize) -> usize {
        offset.div_ceil(self.word_size) * self.word_size
    }

    /// Decode exactly `word_size` bytes as an unsigned word in target order.
    pub fn decode_word(&self, bytes: &[u8]) -> Result<u64> {
        self.decode_word_with(bytes, self.endianness)
    }

    /// Decode exactly `word_size` bytes as an unsigned word in the given order.
    pub fn decode_word_with(&self, bytes: &[u8], endianness: Endianness) -> Result<u64> {
        expect_len(bytes, self.word_size)?;
        Ok(endianness.fold(bytes))
    }

    /// Decode exactly `word_size` bytes as a two's-complement signed word.
    ///
    /// `endianness` overrides the target byte order when given.
    pub fn decode_word_signed(&self, bytes: &[u8], endianness: Option<Endianness>) -> Result<i64> {
        let raw = self.decode_word_with(bytes, endianness.unwrap_or(self.endianness))?;
        Ok(sign_extend(raw, self.word_size))
    }

    /// Decode exactly `pointer_size` bytes as an address.
    pub fn decode_pointer(&self, bytes: &[u8]) -> Result<u64> {
        expect_len(bytes, self.pointer_size)?;
        Ok(self.endianness.fold(bytes))
    }

    /// Raw storage of one extended float (`long double`).
    ///
    /// Extended floats are not decoded; the bytes are returned as stored,
    /// after checking there are exactly `float_ext_size` of them.
    pub fn float_ext_bytes<'a>(&self, bytes: &'a [u8]) -> Result<&'a [u8]> {
        expect_len(bytes, self.float_ext_size)?;
        Ok(bytes)
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}-bit/{}",
            self.os_family,
            self.pointer_size * 8,
            self.endianness
        )
    }
}

/// Reinterpret the low `size` bytes of `raw` as a signed integer.
pub(crate) fn sign_extend(raw: u64, size: usize) -> i64 {
    let shift = 64 - (size as u32 * 8);
    ((raw << shift) as i64) >> shift
}

fn check_scalar(what: &'static str, size: usize) -> Result<()> {
    match size {
        4 | 8 => Ok(()),
        _ => Err(TargetError::UnsupportedSize { what, size }),
    }
}

fn expect_len(bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() != expected {
        return Err(TargetError::LengthMismatch {
            expected,
            found: bytes.len(),
        });
    }
    Ok(())
}
