use std::{fmt::Display, sync::Arc};

use parking_lot::Mutex;

use crate::{
    error::TextError,
    utf16::{get_utf16_len, is_char_boundary, utf16_to_utf8},
};

/// A text value addressed in UTF-16 code units.
///
/// Clones share the same underlying string, so a page's content can be observed
/// by more than one owner.
#[derive(Debug, Clone, Default)]
pub struct SharedText {
    inner: Arc<Mutex<String>>,
}

impl SharedText {
    pub fn new(content: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(content.to_string())),
        }
    }

    /// Offsets inside a surrogate pair are rejected instead of being moved.
    pub fn insert(&self, index: usize, text: &str) -> Result<(), TextError> {
        let mut s = self.inner.lock();
        let len = get_utf16_len(&s);
        if index > len {
            return Err(TextError::IndexOutOfRange { index, len });
        }
        if !is_char_boundary(&s, index) {
            return Err(TextError::NotCharBoundary { index });
        }

        let byte_index =
            utf16_to_utf8(&s, index).ok_or(TextError::IndexOutOfRange { index, len })?;
        s.insert_str(byte_index, text);
        Ok(())
    }

    pub fn delete(&self, index: usize, len: usize) -> Result<(), TextError> {
        let mut s = self.inner.lock();
        let doc_len = get_utf16_len(&s);
        let end = index.checked_add(len);
        let err = TextError::RangeOutOfRange {
            start: index,
            end: end.unwrap_or(usize::MAX),
            len: doc_len,
        };
        let end = match end {
            Some(end) if end <= doc_len => end,
            _ => return Err(err),
        };
        for i in [index, end] {
            if !is_char_boundary(&s, i) {
                return Err(TextError::NotCharBoundary { index: i });
            }
        }

        let start = utf16_to_utf8(&s, index).ok_or_else(|| err.clone())?;
        let end = utf16_to_utf8(&s, end).ok_or(err)?;
        s.replace_range(start..end, "");
        Ok(())
    }

    pub fn set(&self, content: &str) {
        let mut s = self.inner.lock();
        s.clear();
        s.push_str(content);
    }

    pub fn len_utf16(&self) -> usize {
        get_utf16_len(&self.inner.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

}

impl Display for SharedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner.lock())
    }
}
