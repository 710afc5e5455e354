//! Parsing of the region index shipped inside a dump container.
//!
//! One record per line: `<start>-<end>,<label>`. Bounds are hexadecimal with
//! an optional `0x` prefix. The label is everything after the first comma, so
//! labels may themselves contain commas. Blank lines are ignored.

use super::error::{LoadError, Result};

/// One parsed index line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// The `<start>-<end>` token exactly as written.
    pub token: String,
    pub start: u64,
    pub end: u64,
    pub label: String,
    /// 1-based line number in the index.
    pub line: usize,
}

impl IndexRecord {
    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    /// Member names under which this record's content may be stored.
    ///
    /// The token as written comes first, then the canonical `0x`-prefixed
    /// spellings produced by dumpers (plain and zero-padded to 8 digits).
    pub fn member_candidates(&self) -> Vec<String> {
        let mut names = vec![
            self.token.clone(),
            format!("{:#x}-{:#x}", self.start, self.end),
            format!("0x{:08x}-0x{:08x}", self.start, self.end),
        ];
        names.dedup();
        names
    }
}

/// Parse a complete index.
///
/// # Errors
/// `MalformedIndex` on the first line that is not a valid record.
pub fn parse_index(text: &str) -> Result<Vec<IndexRecord>> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(record) = parse_record(idx + 1, line)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Parse one line; `Ok(None)` for a blank line.
pub fn parse_record(line_no: usize, line: &str) -> Result<Option<IndexRecord>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let malformed = |reason: &str| LoadError::MalformedIndex {
        line: line_no,
        record: line.to_string(),
        reason: reason.to_string(),
    };

    let (token, label) = line
        .split_once(',')
        .ok_or_else(|| malformed("missing ',' between bounds and label"))?;
    let token = token.trim();
    let (start, end) = token
        .split_once('-')
        .ok_or_else(|| malformed("bounds must be written as <start>-<end>"))?;
    let start = parse_hex(start).ok_or_else(|| malformed("start is not a hexadecimal address"))?;
    let end = parse_hex(end).ok_or_else(|| malformed("end is not a hexadecimal address"))?;
    if end <= start {
        return Err(malformed("end must be greater than start"));
    }

    Ok(Some(IndexRecord {
        token: token.to_string(),
        start,
        end,
        label: label.trim().to_string(),
        line: line_no,
    }))
}

fn parse_hex(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
