//! The closed set of field detectors and their fixed pipeline order.

use tracing::trace;

use super::error::{AnalysisError, Result};
use super::field::{Field, FieldKind, FieldValue};
use super::strings::{decode_utf16, printable_prefix_len, rfind_utf16};
use super::structure::{basename, Structure};
use crate::config::AnalyzerConfig;
use crate::mappings::RegionSet;
use crate::target::{sign_extend, Endianness, TargetDescriptor};

/// Everything a detector may consult, passed explicitly.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    pub structure: &'a Structure,
    pub regions: &'a RegionSet,
    pub target: &'a TargetDescriptor,
    pub config: &'a AnalyzerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detector {
    ZeroRun,
    Utf16,
    Ascii,
    Pointer,
    SmallInt,
}

/// Detector order. UTF-16 runs before ASCII; swapping them changes results
/// on ambiguous input.
pub const PIPELINE: [Detector; 5] = [
    Detector::ZeroRun,
    Detector::Utf16,
    Detector::Ascii,
    Detector::Pointer,
    Detector::SmallInt,
];

impl Detector {
    pub fn name(self) -> &'static str {
        match self {
            Detector::ZeroRun => "zero-run",
            Detector::Utf16 => "utf16",
            Detector::Ascii => "ascii",
            Detector::Pointer => "pointer",
            Detector::SmallInt => "small-int",
        }
    }

    /// Find fields inside `[offset, offset + size)` of the structure.
    ///
    /// # Errors
    /// `MisalignedOffset` if `offset` is not on a word boundary and
    /// `OutOfBounds` if the range leaves the structure.
    pub fn make_fields(self, ctx: &ScanContext<'_>, offset: usize, size: usize) -> Result<Vec<Field>> {
        let word_size = ctx.target.word_size();
        if !ctx.target.is_word_aligned(offset) {
            return Err(AnalysisError::MisalignedOffset { offset, word_size });
        }
        let len = ctx.structure.len();
        if offset.checked_add(size).map_or(true, |end| end > len) {
            return Err(AnalysisError::OutOfBounds { offset, size, len });
        }

        let fields = match self {
            Detector::ZeroRun => zero_runs(ctx, offset, size),
            Detector::Utf16 => utf16_strings(ctx, offset, size),
            Detector::Ascii => ascii_strings(ctx, offset, size),
            Detector::Pointer => pointers(ctx, offset, size)?,
            Detector::SmallInt => small_ints(ctx, offset, size)?,
        };
        trace!(
            detector = self.name(),
            offset,
            size,
            found = fields.len(),
            "Detector ran on gap"
        );
        Ok(fields)
    }
}

fn words<'a>(ctx: &ScanContext<'a>, offset: usize, size: usize) -> impl Iterator<Item = (usize, &'a [u8])> {
    let w = ctx.target.word_size();
    ctx.structure.bytes()[offset..offset + size]
        .chunks_exact(w)
        .enumerate()
        .map(move |(i, word)| (offset + i * w, word))
}

fn zero_runs(ctx: &ScanContext<'_>, offset: usize, size: usize) -> Vec<Field> {
    let w = ctx.target.word_size();
    let mut fields = Vec::new();
    let mut run: Option<Field> = None;
    for (at, word) in words(ctx, offset, size) {
        if word.iter().all(|&b| b == 0) {
            match run.as_mut() {
                Some(field) => field.size += w,
                None => run = Some(Field::new(at, w, FieldKind::ZeroRun)),
            }
        } else if let Some(field) = run.take() {
            fields.push(field);
        }
    }
    fields.extend(run);
    fields
}

fn utf16_strings(ctx: &ScanContext<'_>, offset: usize, mut size: usize) -> Vec<Field> {
    let w = ctx.target.word_size();
    let endianness = ctx.target.endianness();
    let bytes = ctx.structure.bytes();
    let mut fields = Vec::new();
    while size >= w {
        let window = &bytes[offset..offset + size];
        match rfind_utf16(window, endianness, ctx.config.min_utf16_chars) {
            Some(index) => {
                let text = decode_utf16(&window[index..], endianness);
                fields.push(
                    Field::new(offset + index, size - index, FieldKind::StringUtf16)
                        .with_value(FieldValue::Text(text))
                        .with_endianness(endianness),
                );
                size = index;
            }
            None => size -= w,
        }
    }
    fields
}

fn ascii_strings(ctx: &ScanContext<'_>, offset: usize, size: usize) -> Vec<Field> {
    let bytes = ctx.structure.bytes();
    let w = ctx.target.word_size();
    let end = offset + size;
    let mut cursor = offset;
    let mut fields = Vec::new();
    while cursor + w <= end {
        let window = &bytes[cursor..end];
        let run = printable_prefix_len(window);
        if run == 0 || run < ctx.config.min_ascii_len {
            cursor += w;
            continue;
        }
        let text = String::from_utf8_lossy(&window[..run]).into_owned();
        let field = if window.get(run) == Some(&0) {
            Field::new(cursor, run + 1, FieldKind::StringAsciiNul)
        } else {
            Field::new(cursor, run, FieldKind::StringAscii)
        };
        cursor = ctx.target.align_up(field.end());
        fields.push(field.with_value(FieldValue::Text(text)));
    }
    fields
}

fn pointers(ctx: &ScanContext<'_>, offset: usize, size: usize) -> Result<Vec<Field>> {
    let mut fields = Vec::new();
    for (at, word) in words(ctx, offset, size) {
        let value = ctx.target.decode_word(word)?;
        let Some(region) = ctx
            .regions
            .region_for_address(value)
            .filter(|r| !r.is_placeholder())
        else {
            continue;
        };
        let comment = match ctx.structure.function_name(value) {
            Some(name) => format!("{}::{}", basename(region.pathname()), name),
            None if region.pathname().is_empty() => {
                format!("{:#x}-{:#x}", region.start(), region.end())
            }
            None => region.pathname().to_string(),
        };
        fields.push(
            Field::new(at, word.len(), FieldKind::Pointer)
                .with_value(FieldValue::Pointer(value))
                .with_comment(comment),
        );
    }
    Ok(fields)
}

fn small_ints(ctx: &ScanContext<'_>, offset: usize, size: usize) -> Result<Vec<Field>> {
    let native = ctx.target.endianness();
    let swapped = match native {
        Endianness::Little => Endianness::Big,
        Endianness::Big => Endianness::Little,
    };
    let threshold = ctx.config.small_int_threshold;
    let mut fields = Vec::new();
    for (at, word) in words(ctx, offset, size) {
        for endianness in [native, swapped] {
            let raw = ctx.target.decode_word_with(word, endianness)?;
            if let Some((kind, value)) = classify_small_int(raw, word.len(), threshold) {
                fields.push(
                    Field::new(at, word.len(), kind)
                        .with_value(value)
                        .with_endianness(endianness),
                );
                break;
            }
        }
    }
    Ok(fields)
}

/// Unsigned below `threshold`, signed above `2^(8 * size) - threshold`.
pub fn classify_small_int(raw: u64, size: usize, threshold: u64) -> Option<(FieldKind, FieldValue)> {
    if raw < threshold {
        return Some((FieldKind::SmallIntUnsigned, FieldValue::Unsigned(raw)));
    }
    let signed_floor = (1u128 << (size * 8)).saturating_sub(u128::from(threshold));
    if u128::from(raw) > signed_floor {
        return Some((
            FieldKind::SmallIntSigned,
            FieldValue::Signed(sign_extend(raw, size)),
        ));
    }
    None
}
