/// Workspace indexing.
///
/// Walks the workspace root (honouring `.gitignore` and friends, even
/// outside a git checkout) and loads every `.rego` file into the cache so
/// cross-file navigation works before the files are opened.  Files that
/// are already cached came from the editor and are left alone.
use std::fs;
use std::path::Path;

use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use crate::cache::FileCache;
use crate::config::Config;
use crate::util::path_key;

pub const REGO_EXTENSION: &str = "rego";

/// Load every policy file under `root`.  Returns how many were added.
pub fn index_workspace(cache: &FileCache, root: &Path, config: &Config) -> usize {
    let mut indexed = 0;
    for entry in WalkBuilder::new(root).require_git(false).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping workspace entry: {err}");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) || !is_policy_file(path) {
            continue;
        }
        if config.is_excluded(path) {
            debug!(path = %path.display(), "excluded by configuration");
            continue;
        }

        let key = path_key(path);
        if cache.contains(&key) {
            continue;
        }
        match fs::read_to_string(path) {
            Ok(text) => {
                cache.put(&key, &text);
                indexed += 1;
            }
            Err(err) => warn!(path = %path.display(), "cannot read policy: {err}"),
        }
    }
    info!(root = %root.display(), files = indexed, "indexed workspace");
    indexed
}

pub fn is_policy_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == REGO_EXTENSION)
}
