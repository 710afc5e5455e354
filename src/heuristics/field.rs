//! Typed fields produced by the analyzer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write;

use crate::target::Endianness;

/// What a field was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// One or more consecutive all-zero words
    ZeroRun,
    /// Printable 7-bit text
    StringAscii,
    /// Printable 7-bit text followed by its NUL terminator
    StringAsciiNul,
    /// UTF-16 text in the target byte order
    StringUtf16,
    /// A word whose value lands in a captured region
    Pointer,
    SmallIntSigned,
    SmallIntUnsigned,
    /// Unclaimed bytes
    Unknown,
}

impl FieldKind {
    pub fn is_string(self) -> bool {
        matches!(
            self,
            FieldKind::StringAscii | FieldKind::StringAsciiNul | FieldKind::StringUtf16
        )
    }

    pub fn is_small_int(self) -> bool {
        matches!(self, FieldKind::SmallIntSigned | FieldKind::SmallIntUnsigned)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::ZeroRun => "ZERO-RUN",
            FieldKind::StringAscii => "STRING-ASCII",
            FieldKind::StringAsciiNul => "STRING-ASCII-NUL-TERMINATED",
            FieldKind::StringUtf16 => "STRING-UTF16",
            FieldKind::Pointer => "POINTER",
            FieldKind::SmallIntSigned => "SMALL-INT-SIGNED",
            FieldKind::SmallIntUnsigned => "SMALL-INT-UNSIGNED",
            FieldKind::Unknown => "UNKNOWN",
        };
        f.pad(name)
    }
}

/// Decoded content of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Pointer(u64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unsigned(v) => write!(f, "{}", v),
            FieldValue::Signed(v) => write!(f, "{}", v),
            FieldValue::Pointer(v) => write!(f, "{:#x}", v),
            FieldValue::Text(t) => write!(f, "{:?}", t),
        }
    }
}

/// A contiguous typed sub-range of a structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Offset from the start of the structure
    pub offset: usize,
    /// Length in bytes
    pub size: usize,
    pub kind: FieldKind,
    /// True only for sub-word unknown remainders
    pub is_padding: bool,
    pub value: Option<FieldValue>,
    /// Byte order that produced a small-integer or UTF-16 classification
    pub endianness: Option<Endianness>,
    /// Resolved pointer target label or symbol
    pub comment: Option<String>,
}

impl Field {
    pub fn new(offset: usize, size: usize, kind: FieldKind) -> Self {
        Self {
            offset,
            size,
            kind,
            is_padding: false,
            value: None,
            endianness: None,
            comment: None,
        }
    }

    /// Word-aligned unclaimed bytes, still open to detectors.
    pub fn unknown(offset: usize, size: usize) -> Self {
        Self::new(offset, size, FieldKind::Unknown)
    }

    /// Sub-word unclaimed bytes that no detector examines.
    pub fn padding(offset: usize, size: usize) -> Self {
        Self {
            is_padding: true,
            ..Self::new(offset, size, FieldKind::Unknown)
        }
    }

    pub fn with_value(mut self, value: FieldValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = Some(endianness);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// One past the last byte.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// One-line description; `bytes` are the owning structure's bytes and
    /// are hex-dumped for fields without a decoded value.
    pub fn render(&self, bytes: &[u8]) -> String {
        let mut line = format!("{:#06x} {:<27} {:>4}", self.offset, self.kind, self.size);
        match &self.value {
            Some(value) => {
                let _ = write!(line, "  {}", value);
            }
            None => {
                if let Some(raw) = bytes.get(self.offset..self.end()) {
                    line.push_str("  ");
                    for (i, b) in raw.iter().take(16).enumerate() {
                        if i > 0 {
                            line.push(' ');
                        }
                        let _ = write!(line, "{:02x}", b);
                    }
                    if raw.len() > 16 {
                        line.push_str(" ..");
                    }
                }
            }
        }
        if self.is_padding {
            line.push_str("  (padding)");
        }
        if let Some(e) = self.endianness {
            let _ = write!(line, "  [{}]", e);
        }
        if let Some(comment) = &self.comment {
            let _ = write!(line, "  # {}", comment);
        }
        line
    }
}
