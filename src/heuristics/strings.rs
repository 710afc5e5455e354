//! Text run scanners used by the string detectors.

use encoding_rs::{UTF_16BE, UTF_16LE};

use crate::target::Endianness;

/// Printable 7-bit byte, whitespace included.
pub fn is_printable(b: u8) -> bool {
    b.is_ascii_graphic() || matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Length of the printable run at the start of `bytes`.
pub fn printable_prefix_len(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|&&b| is_printable(b)).count()
}

/// Start index of the longest UTF-16 text suffix of `bytes`.
///
/// Code units are read backwards from the end in `endianness` order. One
/// trailing NUL unit is accepted as a terminator; every other unit must be a
/// printable 7-bit character. Returns `None` unless at least `min_chars`
/// characters precede the terminator.
pub fn rfind_utf16(bytes: &[u8], endianness: Endianness, min_chars: usize) -> Option<usize> {
    let base = bytes.len() % 2;
    let unit = |i: usize| {
        let pair = [bytes[base + 2 * i], bytes[base + 2 * i + 1]];
        match endianness {
            Endianness::Little => u16::from_le_bytes(pair),
            Endianness::Big => u16::from_be_bytes(pair),
        }
    };

    let mut i = bytes.len() / 2;
    if i > 0 && unit(i - 1) == 0 {
        i -= 1;
    }
    let text_end = i;
    while i > 0 && u8::try_from(unit(i - 1)).is_ok_and(is_printable) {
        i -= 1;
    }

    (text_end - i >= min_chars.max(1)).then_some(base + 2 * i)
}

/// Decode UTF-16 text, dropping a trailing NUL terminator.
pub fn decode_utf16(bytes: &[u8], endianness: Endianness) -> String {
    let encoding = match endianness {
        Endianness::Little => UTF_16LE,
        Endianness::Big => UTF_16BE,
    };
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.trim_end_matches('\0').to_string()
}
