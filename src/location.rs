//! Source positions shared by the parser, the cache and every resolver.
//!
//! Rows and columns are 1-based and columns count bytes, so a location can
//! be turned back into a slice of the original text with `offset` and
//! `length` alone.

use std::fmt;

/// A byte range inside one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SourceLocation {
    /// Path of the file as it is keyed in the [`FileCache`](crate::cache::FileCache).
    pub file: String,
    pub row: u32,
    pub col: u32,
    /// Byte offset of the first character.
    pub offset: u32,
    /// Byte length of the text the node was parsed from.
    pub length: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, row: u32, col: u32, offset: u32, length: u32) -> Self {
        Self {
            file: file.into(),
            row,
            col,
            offset,
            length,
        }
    }

    /// A zero-length location, used for cursor positions.
    pub fn point(file: impl Into<String>, row: u32, col: u32, offset: u32) -> Self {
        Self::new(file, row, col, offset, 0)
    }

    /// Offset one past the last byte.
    pub fn end(&self) -> u32 {
        self.offset + self.length
    }

    /// Whether `inner` starts inside `self`.
    ///
    /// Both ends are inclusive: a cursor sitting right after the last
    /// character of a token still belongs to that token.
    pub fn contains(&self, inner: &SourceLocation) -> bool {
        inner.offset >= self.offset && inner.offset <= self.end()
    }

    /// A location spanning from the start of `self` to the end of `last`.
    pub fn span_to(&self, last: &SourceLocation) -> SourceLocation {
        let end = last.end().max(self.end());
        SourceLocation {
            file: self.file.clone(),
            row: self.row,
            col: self.col,
            offset: self.offset,
            length: end - self.offset,
        }
    }

    /// Same position, moved one byte to the left.
    pub(crate) fn step_back(&self) -> Option<SourceLocation> {
        if self.offset == 0 || self.col <= 1 {
            return None;
        }
        Some(SourceLocation {
            col: self.col - 1,
            offset: self.offset - 1,
            ..self.clone()
        })
    }

    /// Identity key used to order and deduplicate results.
    pub(crate) fn key(&self) -> (&str, u32, u32) {
        (&self.file, self.row, self.col)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.row, self.col)
    }
}
