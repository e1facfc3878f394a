//! Conversions between UTF-16 code unit offsets and UTF-8 byte offsets.
//!
//! Every offset exchanged with the backends is counted in UTF-16 code units.

use std::{fmt, str::Chars};

pub fn get_utf16_len(str: &str) -> usize {
    if str.is_empty() {
        return 0;
    }

    let iter = encode_utf16(str);
    iter.count()
}

/// Convert a UTF-16 index into a UTF-8 byte index of `str`.
///
/// An index landing between the two halves of a surrogate pair resolves to the
/// end of that character. Returns None if `utf16_index` exceeds the length.
pub fn utf16_to_utf8(str: &str, utf16_index: usize) -> Option<usize> {
    if utf16_index == 0 {
        return Some(0);
    }

    let mut iter = encode_utf16(str);
    for _ in 0..utf16_index {
        iter.next()?;
    }

    Some(iter.visited)
}

/// Whether `utf16_index` falls on a character boundary of `str`
pub fn is_char_boundary(str: &str, utf16_index: usize) -> bool {
    let mut iter = encode_utf16(str);
    for _ in 0..utf16_index {
        if iter.next().is_none() {
            return false;
        }
    }

    iter.extra == 0
}

/// The closest character boundary at or before `utf16_index`
pub fn floor_char_boundary(str: &str, utf16_index: usize) -> usize {
    if utf16_index == 0 || is_char_boundary(str, utf16_index) {
        utf16_index
    } else {
        // only the second half of a surrogate pair is off a boundary
        utf16_index - 1
    }
}

/// The closest character boundary at or after `utf16_index`
pub fn ceil_char_boundary(str: &str, utf16_index: usize) -> usize {
    if utf16_index >= get_utf16_len(str) || is_char_boundary(str, utf16_index) {
        utf16_index
    } else {
        utf16_index + 1
    }
}

fn encode_utf16(s: &str) -> EncodeUtf16 {
    EncodeUtf16 {
        chars: s.chars(),
        extra: 0,
        visited: 0,
    }
}

// from std
#[derive(Clone)]
pub struct EncodeUtf16<'a> {
    chars: Chars<'a>,
    extra: u16,
    visited: usize,
}

impl fmt::Debug for EncodeUtf16<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeUtf16").finish_non_exhaustive()
    }
}

impl<'a> Iterator for EncodeUtf16<'a> {
    type Item = u16;

    #[inline]
    fn next(&mut self) -> Option<u16> {
        if self.extra != 0 {
            let tmp = self.extra;
            self.extra = 0;
            return Some(tmp);
        }

        let mut buf = [0; 2];
        self.chars.next().map(|ch| {
            self.visited += ch.len_utf8();
            let n = ch.encode_utf16(&mut buf).len();
            if n == 2 {
                self.extra = buf[1];
            }
            buf[0]
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let (low, high) = self.chars.size_hint();
        // every char gets either one u16 or two u16,
        // so this iterator is between 1 or 2 times as
        // long as the underlying iterator.
        (low, high.and_then(|n| n.checked_mul(2)))
    }
}
