//! regols: a language server for Rego policies.
//!
//! The navigation engine works on a [`FileCache`] of parsed modules:
//! [`TermLocator`] maps a cursor to a syntax node, and the resolvers answer
//! definition, reference, completion and hover queries from there.
//! [`Backend`] puts the engine behind the Language Server Protocol.
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tower_lsp::Client;

pub mod cache;
pub mod completion;
pub mod config;
pub mod definition;
mod diagnostics;
pub mod hover;
pub mod locate;
pub mod location;
pub mod references;
mod server;
pub mod syntax;
mod util;
pub mod workspace;

pub use cache::{FileCache, Policy};
pub use completion::{CompletionItem, CompletionKind, CompletionResolver};
pub use config::Config;
pub use definition::DefinitionResolver;
pub use hover::{Document, HoverResolver};
pub use locate::TermLocator;
pub use location::SourceLocation;
pub use references::ReferenceResolver;

use crate::diagnostics::DiagnosticScheduler;

pub struct Backend {
    name: String,
    version: String,
    cache: Arc<FileCache>,
    workspace_root: Mutex<Option<PathBuf>>,
    /// `--config` from the command line; takes precedence over the
    /// workspace and user files.
    config_path: Option<PathBuf>,
    config: RwLock<Config>,
    /// Whether the client accepts snippet completions.
    snippet_support: Mutex<bool>,
    diagnostics: Arc<DiagnosticScheduler>,
    client: Option<Client>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self::with_client(Some(client), None, Config::default())
    }

    /// A server whose configuration was loaded up front, from `config_path`
    /// when given.
    pub fn with_config(client: Client, config_path: Option<PathBuf>, config: Config) -> Self {
        Self::with_client(Some(client), config_path, config)
    }

    /// A server without a client connection, for tests.
    pub fn new_test() -> Self {
        Self::with_client(None, None, Config::default())
    }

    fn with_client(client: Option<Client>, config_path: Option<PathBuf>, config: Config) -> Self {
        Self {
            name: "regols".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cache: Arc::new(FileCache::new()),
            workspace_root: Mutex::new(None),
            config_path,
            config: RwLock::new(config),
            snippet_support: Mutex::new(false),
            diagnostics: Arc::new(DiagnosticScheduler::default()),
            client,
        }
    }

    /// The shared cache.
    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }
}
