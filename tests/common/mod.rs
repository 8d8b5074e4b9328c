#![allow(dead_code)]

use regols::{Backend, FileCache, SourceLocation};

pub fn create_test_backend() -> Backend {
    Backend::new_test()
}

/// Cache `files` and return the cursor marked with `|` in one of them.
///
/// The marker is removed before the file is parsed.  Panics when no file
/// carries a marker.
pub fn cache_with_cursor(files: &[(&str, &str)]) -> (FileCache, SourceLocation) {
    let cache = FileCache::new();
    let mut cursor = None;
    for (path, text) in files {
        let text = match text.find('|') {
            Some(offset) => {
                cursor = Some(cursor_at(path, text, offset));
                text.replacen('|', "", 1)
            }
            None => text.to_string(),
        };
        cache.put(path, &text);
    }
    (cache, cursor.expect("no `|` cursor marker in test files"))
}

/// Cache `files` without a cursor.
pub fn cache_with(files: &[(&str, &str)]) -> FileCache {
    let cache = FileCache::new();
    for (path, text) in files {
        cache.put(path, text);
    }
    cache
}

/// The cursor at byte `offset` of `text`.
pub fn cursor_at(path: &str, text: &str, offset: usize) -> SourceLocation {
    let before = &text[..offset];
    let row = before.matches('\n').count() as u32 + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let col = (offset - line_start) as u32 + 1;
    SourceLocation::point(path, row, col, offset as u32)
}

/// `(file, row, col)` of each location, for compact assertions.
pub fn positions(locations: &[SourceLocation]) -> Vec<(String, u32, u32)> {
    locations
        .iter()
        .map(|loc| (loc.file.clone(), loc.row, loc.col))
        .collect()
}

pub fn pos(file: &str, row: u32, col: u32) -> (String, u32, u32) {
    (file.to_string(), row, col)
}
