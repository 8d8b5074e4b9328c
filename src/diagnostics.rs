/// Diagnostics publishing.
///
/// Every edit bumps the file's generation and spawns a task that remembers
/// the generation it was started for.  The task waits for typing to
/// settle, recompiles the project and publishes only if no later edit to
/// the same file arrived in the meantime, so the latest edit always wins
/// and at most one result per file reaches the client.  Results cover
/// every cached file, which also clears diagnostics that a fix elsewhere
/// made stale.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tower_lsp::lsp_types::*;
use tracing::{debug, trace, warn};

use crate::Backend;
use crate::syntax::RegoError;
use crate::util::{LineIndex, key_to_uri};

/// How long a diagnostics task waits before compiling.
const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Per-file edit generations.
#[derive(Debug, Default)]
pub(crate) struct DiagnosticScheduler {
    generations: Mutex<HashMap<String, u64>>,
}

impl DiagnosticScheduler {
    /// Start a new generation for `path` and return it.
    pub(crate) fn bump(&self, path: &str) -> u64 {
        let mut generations = self.generations.lock();
        let generation = generations.entry(path.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    pub(crate) fn is_current(&self, path: &str, generation: u64) -> bool {
        self.generations.lock().get(path) == Some(&generation)
    }

    /// Drop the counter for a closed file; pending tasks become stale.
    pub(crate) fn forget(&self, path: &str) {
        self.generations.lock().remove(path);
    }
}

/// `errors` as protocol diagnostics, measured against `text`.
pub(crate) fn to_diagnostics(text: &str, errors: &[RegoError]) -> Vec<Diagnostic> {
    let index = LineIndex::new(text);
    errors
        .iter()
        .map(|err| Diagnostic {
            range: index.range(err.location()),
            severity: Some(DiagnosticSeverity::ERROR),
            source: Some("regols".to_string()),
            message: err.message().to_string(),
            ..Default::default()
        })
        .collect()
}

impl Backend {
    /// Recompute and publish diagnostics after an edit to `path`.
    pub(crate) fn schedule_diagnostics(&self, path: &str) {
        let generation = self.diagnostics.bump(path);
        let Some(client) = self.client.clone() else {
            return;
        };
        let cache = Arc::clone(&self.cache);
        let scheduler = Arc::clone(&self.diagnostics);
        let path = path.to_string();
        debug!(path = %path, generation, "scheduling diagnostics");

        tokio::spawn(async move {
            tokio::time::sleep(SETTLE_DELAY).await;
            if !scheduler.is_current(&path, generation) {
                trace!(path = %path, generation, "diagnostics superseded");
                return;
            }

            let compiling = Arc::clone(&cache);
            let errors = match tokio::task::spawn_blocking(move || compiling.all_errors()).await {
                Ok(errors) => errors,
                Err(err) => {
                    warn!(path = %path, "diagnostics task failed: {err}");
                    return;
                }
            };
            if !scheduler.is_current(&path, generation) {
                trace!(path = %path, generation, "diagnostics superseded after compiling");
                return;
            }

            for (file, errors) in errors {
                let Some(uri) = key_to_uri(&file) else {
                    continue;
                };
                let text = cache.get(&file).map(|p| p.raw_text).unwrap_or_default();
                client.publish_diagnostics(uri, to_diagnostics(&text, &errors), None).await;
            }
        });
    }
}
