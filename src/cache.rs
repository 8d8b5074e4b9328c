/// Per-file store of source text, parse errors and the last good tree.
///
/// The cache is the only shared mutable state in the engine.  One
/// reader/writer lock guards the whole map; resolvers take the read side
/// just long enough to clone the `Arc<Module>`s they need and then walk
/// the trees without holding it.
///
/// A failed parse never discards the previous module: while the user is
/// halfway through typing `lib.`, navigation keeps working against the
/// last tree that parsed.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::syntax::{self, Module, ParseError, ParseErrorKind, RegoError};

/// The cached state of one file.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub raw_text: Arc<str>,
    /// Errors from the most recent parse; empty when it succeeded.
    pub parse_errors: Vec<ParseError>,
    /// The most recent module that parsed successfully.
    pub module: Option<Arc<Module>>,
}

impl Policy {
    /// Whether the file has no usable package clause, either because it
    /// never parsed or because the latest text lost it.
    pub fn lacks_package(&self) -> bool {
        self.module.is_none()
            || self.parse_errors.first().is_some_and(|err| {
                matches!(err.kind, ParseErrorKind::EmptyModule | ParseErrorKind::PackageExpected)
            })
    }
}

#[derive(Debug, Default)]
pub struct FileCache {
    policies: RwLock<BTreeMap<String, Policy>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `text` and store it under `path`.
    pub fn put(&self, path: &str, text: &str) {
        let parsed = syntax::parse_module(path, text);
        let mut policies = self.policies.write();
        let policy = policies.entry(path.to_string()).or_default();
        policy.raw_text = Arc::from(text);
        match parsed {
            Ok(module) => {
                debug!(path, rules = module.rules.len(), "parsed module");
                policy.parse_errors.clear();
                policy.module = Some(Arc::new(module));
            }
            Err(errors) => {
                debug!(path, errors = errors.len(), "parse failed, keeping previous module");
                policy.parse_errors = errors;
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<Policy> {
        self.policies.read().get(path).cloned()
    }

    pub fn delete(&self, path: &str) {
        if self.policies.write().remove(path).is_some() {
            trace!(path, "dropped from cache");
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.policies.read().contains_key(path)
    }

    pub fn module(&self, path: &str) -> Option<Arc<Module>> {
        self.policies.read().get(path)?.module.clone()
    }

    /// Every parsed module, ordered by path.
    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.policies.read().values().filter_map(|p| p.module.clone()).collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.policies.read().keys().cloned().collect()
    }

    /// Every module declaring `package`, ordered by path.
    pub fn find_modules_by_package(&self, package: &[String]) -> Vec<Arc<Module>> {
        self.policies
            .read()
            .values()
            .filter_map(|p| p.module.as_ref())
            .filter(|m| m.package.matches(package))
            .cloned()
            .collect()
    }

    /// Every distinct package path in the project, sorted.
    pub fn packages(&self) -> Vec<Vec<String>> {
        let packages: BTreeSet<Vec<String>> = self
            .policies
            .read()
            .values()
            .filter_map(|p| p.module.as_ref())
            .map(|m| m.package_path())
            .collect();
        packages.into_iter().collect()
    }

    /// Problems to report for `path`: its own parse errors if it has any,
    /// otherwise the compile errors of the whole project that fall in it.
    pub fn errors_for(&self, path: &str) -> Vec<RegoError> {
        let Some(policy) = self.get(path) else {
            return Vec::new();
        };
        if !policy.parse_errors.is_empty() {
            return policy.parse_errors.into_iter().map(RegoError::from).collect();
        }
        syntax::compile(&self.modules())
            .into_iter()
            .filter(|err| err.location.file == path)
            .map(RegoError::from)
            .collect()
    }

    /// [`FileCache::errors_for`] for every cached file at once, compiling
    /// the project a single time.  Files without problems map to an empty
    /// list so stale diagnostics can be cleared.
    pub fn all_errors(&self) -> BTreeMap<String, Vec<RegoError>> {
        let snapshot: Vec<(String, Policy)> = self
            .policies
            .read()
            .iter()
            .map(|(path, policy)| (path.clone(), policy.clone()))
            .collect();
        let modules: Vec<Arc<Module>> = snapshot.iter().filter_map(|(_, p)| p.module.clone()).collect();
        let mut compiled: BTreeMap<String, Vec<RegoError>> = BTreeMap::new();
        for err in syntax::compile(&modules) {
            compiled.entry(err.location.file.clone()).or_default().push(err.into());
        }

        snapshot
            .into_iter()
            .map(|(path, policy)| {
                let errors = if policy.parse_errors.is_empty() {
                    compiled.remove(&path).unwrap_or_default()
                } else {
                    policy.parse_errors.into_iter().map(RegoError::from).collect()
                };
                (path, errors)
            })
            .collect()
    }
}
