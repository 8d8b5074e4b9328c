/// Go to definition.
///
/// Resolution runs in stages and stops at the first one that produces a
/// result:
///
///   1. **Local scope**: a bare variable bound earlier in the same rule
///      branch (see [`scope`]).
///   2. **Import alias**: a variable naming an import jumps to the alias,
///      or to the last path segment when there is no alias.
///   3. **Import path**: a `data.`-rooted reference (the path of an import
///      statement) jumps to the `package` clause of every file declaring
///      that package.
///   4. **Rule lookup**: every rule clause with the referenced name in the
///      target package.  Clauses are never deduplicated; each one is a
///      valid target.
mod scope;

pub(crate) use scope::{binding_in_expr, declared_locally, local_binding};

use std::sync::Arc;

use crate::cache::FileCache;
use crate::location::SourceLocation;
use crate::syntax::{Module, Rule, Term};

/// A rule clause found by name, together with the module that owns it.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub module: Arc<Module>,
    index: usize,
}

impl RuleMatch {
    pub fn rule(&self) -> &Rule {
        &self.module.rules[self.index]
    }

    /// The rule's documentation text.
    pub fn text(&self) -> String {
        self.module.rule_text(self.rule())
    }
}

pub struct DefinitionResolver<'c> {
    cache: &'c FileCache,
}

impl<'c> DefinitionResolver<'c> {
    pub fn new(cache: &'c FileCache) -> Self {
        Self { cache }
    }

    pub fn resolve(&self, term: &Term) -> Vec<SourceLocation> {
        let Some(module) = self.cache.module(&term.location.file) else {
            return Vec::new();
        };
        if let Some(binding) = local_binding(&module, term) {
            return vec![binding];
        }
        self.resolve_outside_rule(&module, term)
    }

    /// Stages 2 to 4: everything except the rule-local scope.
    pub(crate) fn resolve_outside_rule(&self, module: &Module, term: &Term) -> Vec<SourceLocation> {
        if let Some(name) = term.as_variable()
            && let Some(location) = module.import_named(name).and_then(|imp| imp.local_name_location())
        {
            return vec![location.clone()];
        }

        if let Some(path) = data_path(term) {
            let packages: Vec<SourceLocation> = self
                .cache
                .find_modules_by_package(&path)
                .iter()
                .map(|m| m.package.location.clone())
                .collect();
            if !packages.is_empty() {
                return packages;
            }
        }

        self.defining_rules(module, term)
            .iter()
            .map(|m| m.rule().location.clone())
            .collect()
    }

    /// Every rule clause `term` may refer to.
    pub fn defining_rules(&self, module: &Module, term: &Term) -> Vec<RuleMatch> {
        let Some((package, name)) = rule_target(module, term) else {
            return Vec::new();
        };
        self.cache
            .find_modules_by_package(&package)
            .into_iter()
            .flat_map(|module| {
                module
                    .rules
                    .iter()
                    .enumerate()
                    .filter(|(_, rule)| rule.name == name)
                    .map(|(index, _)| RuleMatch {
                        module: module.clone(),
                        index,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// The package path of a `data.a.b` reference.
fn data_path(term: &Term) -> Option<Vec<String>> {
    let segments = term.as_reference()?;
    let (root, rest) = segments.split_first()?;
    if root.as_variable() != Some("data") {
        return None;
    }
    rest.iter().map(|s| s.as_string().map(str::to_string)).collect()
}

/// The package a term's rule lives in and the rule's name.
///
/// A qualified reference resolves its root through the module's imports
/// (or `data`); anything else is looked up in the module's own package.
pub(crate) fn rule_target(module: &Module, term: &Term) -> Option<(Vec<String>, String)> {
    let Some(segments) = term.as_reference() else {
        return Some((module.package_path(), term.as_variable()?.to_string()));
    };
    let (root, rest) = segments.split_first()?;
    let root = root.as_variable()?;
    let mut path = if root == "data" {
        Vec::new()
    } else {
        module.import_named(root)?.package_path()?
    };
    let mut names: Vec<String> = rest
        .iter()
        .map(|s| s.as_string().map(str::to_string))
        .collect::<Option<_>>()?;
    let name = names.pop()?;
    path.extend(names);
    Some((path, name))
}

/// The package path a term's root refers to: the imported package for a
/// qualified reference, otherwise the module's own package.
pub(crate) fn term_package(module: &Module, term: &Term) -> Option<Vec<String>> {
    match term.as_reference() {
        Some(segments) if segments.len() > 1 => {
            let root = segments.first()?.as_variable()?;
            module.import_named(root)?.package_path()
        }
        _ => Some(module.package_path()),
    }
}
