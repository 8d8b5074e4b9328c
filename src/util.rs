/// Utility functions for the regols server.
///
/// This module contains the conversions between the protocol's view of a
/// document (URIs, 0-based lines, UTF-16 columns) and the engine's
/// (cache keys, 1-based rows, byte columns), plus client logging.
use std::path::Path;

use memchr::memchr_iter;
use tower_lsp::lsp_types::*;

use crate::Backend;
use crate::location::SourceLocation;

/// Line start offsets of one text, for converting between byte offsets
/// and editor positions.
pub(crate) struct LineIndex<'t> {
    text: &'t str,
    starts: Vec<u32>,
}

impl<'t> LineIndex<'t> {
    pub(crate) fn new(text: &'t str) -> Self {
        let mut starts = vec![0];
        starts.extend(memchr_iter(b'\n', text.as_bytes()).map(|i| i as u32 + 1));
        Self { text, starts }
    }

    fn line_bounds(&self, line: usize) -> (u32, u32) {
        let start = self.starts[line];
        let end = self
            .starts
            .get(line + 1)
            .map_or(self.text.len() as u32, |next| next - 1);
        (start, end)
    }

    /// The cursor at an editor position, clamped to the text.
    pub(crate) fn location(&self, file: &str, position: Position) -> SourceLocation {
        let line = (position.line as usize).min(self.starts.len() - 1);
        let (start, end) = self.line_bounds(line);
        let text = self.text.get(start as usize..end as usize).unwrap_or("");

        let mut units = 0;
        let mut byte = text.len();
        for (index, ch) in text.char_indices() {
            if units >= position.character {
                byte = index;
                break;
            }
            units += ch.len_utf16() as u32;
        }
        let byte = byte as u32;
        SourceLocation::point(file, line as u32 + 1, byte + 1, start + byte)
    }

    /// The editor position of a byte offset.
    pub(crate) fn position(&self, offset: u32) -> Position {
        let offset = offset.min(self.text.len() as u32);
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        };
        let start = self.starts[line];
        let character = self
            .text
            .get(start as usize..offset as usize)
            .map_or(offset - start, |prefix| prefix.encode_utf16().count() as u32);
        Position::new(line as u32, character)
    }

    /// The editor position of a 1-based row and byte column.  Rows past
    /// the end of the text are passed through so edits can append lines.
    pub(crate) fn position_at(&self, row: u32, col: u32) -> Position {
        let line = row.saturating_sub(1) as usize;
        if line >= self.starts.len() {
            return Position::new(line as u32, col.saturating_sub(1));
        }
        let (start, end) = self.line_bounds(line);
        self.position((start + col.saturating_sub(1)).min(end))
    }

    pub(crate) fn range(&self, location: &SourceLocation) -> Range {
        Range::new(self.position(location.offset), self.position(location.end()))
    }
}

/// The cache key of a file on disk.
pub(crate) fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// The cache key of a document.  Non-file URIs are keyed verbatim.
pub(crate) fn uri_to_key(uri: &Url) -> String {
    match uri.to_file_path() {
        Ok(path) => path_key(&path),
        Err(()) => uri.to_string(),
    }
}

pub(crate) fn key_to_uri(key: &str) -> Option<Url> {
    Url::from_file_path(key).ok().or_else(|| Url::parse(key).ok())
}

impl Backend {
    /// The cursor location for a request, if the document is cached.
    pub(crate) fn cursor_location(&self, uri: &Url, position: Position) -> Option<SourceLocation> {
        let key = uri_to_key(uri);
        let policy = self.cache.get(&key)?;
        Some(LineIndex::new(&policy.raw_text).location(&key, position))
    }

    /// A source location as a protocol location, measured against the
    /// file's current text.
    pub(crate) fn to_lsp_location(&self, location: &SourceLocation) -> Option<Location> {
        let uri = key_to_uri(&location.file)?;
        let policy = self.cache.get(&location.file)?;
        let range = LineIndex::new(&policy.raw_text).range(location);
        Some(Location::new(uri, range))
    }

    pub(crate) async fn log(&self, typ: MessageType, message: String) {
        if let Some(client) = &self.client {
            client.log_message(typ, message).await;
        }
    }
}
