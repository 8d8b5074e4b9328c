/// Server configuration.
///
/// Settings come from the first file found among: the path passed with
/// `--config`, `.regols.toml` in the workspace root, and
/// `regols/config.toml` in the user's configuration directory.  A missing
/// file means defaults; an unreadable or malformed one is logged and
/// treated the same way, so a typo never keeps the server from starting.
use std::fs;
use std::path::{Path, PathBuf};

use etcetera::BaseStrategy;
use serde::Deserialize;
use tracing::{debug, warn};

/// File name looked up in the workspace root.
pub const WORKSPACE_CONFIG: &str = ".regols.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `tracing` filter directive, e.g. `regols=debug`.
    pub log_level: Option<String>,
    pub workspace: WorkspaceConfig,
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Parse every `.rego` file under the root on startup.
    pub index_on_start: bool,
    /// Path fragments; files whose path contains one are not indexed.
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionConfig {
    /// Insert argument placeholders for functions when the client
    /// supports snippets.
    pub snippets: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            index_on_start: true,
            exclude: Vec::new(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self { snippets: true }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Resolve the configuration for a session.
    pub fn load(explicit: Option<&Path>, workspace_root: Option<&Path>) -> Self {
        let candidates = explicit
            .map(Path::to_path_buf)
            .into_iter()
            .chain(workspace_root.map(|root| root.join(WORKSPACE_CONFIG)))
            .chain(user_config_path());

        for path in candidates {
            if !path.is_file() {
                continue;
            }
            match Self::read(&path) {
                Ok(config) => {
                    debug!(path = %path.display(), "loaded configuration");
                    return config;
                }
                Err(message) => {
                    warn!(path = %path.display(), "ignoring configuration: {message}");
                    return Self::default();
                }
            }
        }
        Self::default()
    }

    fn read(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::parse(&text).map_err(|e| e.to_string())
    }

    /// Whether `path` falls under one of the excluded fragments.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.workspace
            .exclude
            .iter()
            .any(|fragment| !fragment.is_empty() && path.contains(fragment.as_str()))
    }
}

fn user_config_path() -> Option<PathBuf> {
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("regols").join("config.toml"))
}
