//! Gap recomputation between detector passes.

use super::error::{AnalysisError, Result};
use super::field::Field;

/// Sort `fields` by offset and return the unclaimed ranges of `[0, len)`.
///
/// Each gap is split into an unaligned leading piece, a word-aligned body
/// whose length is a multiple of `word_size`, and a sub-word tail. Only the
/// body is left open to detectors; the other pieces are padding.
///
/// # Errors
/// `OverlappingFields` if two fields intersect, `OutOfBounds` if a field
/// runs past `len`.
pub fn make_gaps(fields: &mut [Field], len: usize, word_size: usize) -> Result<Vec<Field>> {
    fields.sort_by_key(|f| (f.offset, f.size));

    let mut gaps = Vec::new();
    let mut next = 0usize;
    for field in fields.iter() {
        if field.offset < next {
            return Err(AnalysisError::OverlappingFields {
                offset: field.offset,
                previous_end: next,
            });
        }
        split_gap(&mut gaps, next, field.offset, word_size);
        next = field.end();
    }
    if next > len {
        return Err(AnalysisError::OutOfBounds {
            offset: 0,
            size: next,
            len,
        });
    }
    split_gap(&mut gaps, next, len, word_size);
    Ok(gaps)
}

fn split_gap(gaps: &mut Vec<Field>, start: usize, end: usize, word_size: usize) {
    let mut cursor = start;
    let misalign = cursor % word_size;
    if misalign != 0 && cursor < end {
        let lead = (word_size - misalign).min(end - cursor);
        gaps.push(Field::padding(cursor, lead));
        cursor += lead;
    }
    let body = end.saturating_sub(cursor) / word_size * word_size;
    if body > 0 {
        gaps.push(Field::unknown(cursor, body));
        cursor += body;
    }
    if cursor < end {
        gaps.push(Field::padding(cursor, end - cursor));
    }
}
