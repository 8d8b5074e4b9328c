/// Completion.
///
/// This module groups all completion logic:
/// - **mod**: the item model and [`CompletionResolver`], which classifies the
///   cursor position (package clause, import region, rule body)
/// - **builder**: items for rules and built-in functions, snippet text
/// - **variables**: variables bound earlier in the enclosing rule
/// - **import_edit**: where a missing `import` statement goes
/// - **handler**: conversion to LSP completion items for the server
pub mod builder;
pub(crate) mod handler;
pub(crate) mod import_edit;
pub mod variables;

use std::collections::HashSet;
use std::path::Path;

use tracing::trace;

use crate::cache::FileCache;
use crate::definition::term_package;
use crate::locate::TermLocator;
use crate::location::SourceLocation;
use crate::syntax::{Module, Term, package_ref};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionKind {
    Variable,
    Package,
    Function,
    BuiltinFunction,
    Import,
}

/// Text inserted at a 1-based row and byte column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub row: u32,
    pub col: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    /// Let the client insert this text over the word at the cursor.
    Text(String),
    Edit(TextEdit),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    pub detail: Option<String>,
    pub insertion: Insertion,
    /// Edits applied elsewhere in the file when the item is accepted.
    pub extra_edits: Vec<TextEdit>,
    /// The insertion text with one tab stop per parameter, for clients that
    /// accept snippets.
    pub snippet: Option<String>,
}

impl CompletionItem {
    pub(crate) fn new(label: impl Into<String>, kind: CompletionKind) -> Self {
        let label = label.into();
        Self {
            insertion: Insertion::Text(label.clone()),
            label,
            kind,
            detail: None,
            extra_edits: Vec::new(),
            snippet: None,
        }
    }

    pub(crate) fn with_edit(mut self, at: &SourceLocation, text: impl Into<String>) -> Self {
        self.insertion = Insertion::Edit(TextEdit {
            row: at.row,
            col: at.col,
            text: text.into(),
        });
        self
    }

    /// The edit inserting the item, if it has one.
    pub fn edit(&self) -> Option<&TextEdit> {
        match &self.insertion {
            Insertion::Edit(edit) => Some(edit),
            Insertion::Text(_) => None,
        }
    }
}

pub struct CompletionResolver<'c> {
    cache: &'c FileCache,
}

impl<'c> CompletionResolver<'c> {
    pub fn new(cache: &'c FileCache) -> Self {
        Self { cache }
    }

    /// Candidates at `location`, filtered by the text already typed there.
    pub fn resolve(&self, location: &SourceLocation) -> Vec<CompletionItem> {
        let target = TermLocator::new(self.cache).locate(location);
        let anchor = match &target {
            Some(term) => insertion_anchor(term),
            None => location.clone(),
        };
        let candidates = self.candidates(&anchor, target.as_ref());
        let items = filter_items(target.as_ref(), candidates);
        trace!(%location, items = items.len(), "completion");
        items
    }

    fn candidates(&self, anchor: &SourceLocation, target: Option<&Term>) -> Vec<CompletionItem> {
        let Some(policy) = self.cache.get(&anchor.file) else {
            return Vec::new();
        };
        if policy.lacks_package() {
            let line_start = SourceLocation { col: 1, ..anchor.clone() };
            return package_items(&line_start);
        }
        let Some(module) = policy.module else {
            return Vec::new();
        };
        if module.rule_at(anchor).is_none() {
            return self.import_items(&module, anchor);
        }

        let mut items = Vec::new();
        // A qualified target (`lib.x`) only completes members of `lib`.
        if target.and_then(Term::as_reference).is_none() {
            items.extend(self.package_name_items(&module, anchor));
            if let Some(rule) = module.rule_at(anchor) {
                items.extend(variables::local_variables(rule.branch_at(anchor), anchor));
            }
        }
        items.extend(self.rule_items(&module, anchor, target));
        if let Some(target) = target {
            items.extend(builder::builtin_items(anchor, target));
        }
        items
    }

    /// `import` statements for every package the file does not already see.
    fn import_items(&self, module: &Module, anchor: &SourceLocation) -> Vec<CompletionItem> {
        let mut present = vec![module.package_path()];
        present.extend(module.imports.iter().filter_map(|imp| imp.package_path()));

        let line_start = SourceLocation { col: 1, ..anchor.clone() };
        self.cache
            .packages()
            .into_iter()
            .filter(|package| !present.contains(package))
            .map(|package| {
                let text = format!("import {}", package_ref(&package));
                CompletionItem::new(text.clone(), CompletionKind::Import).with_edit(&line_start, text)
            })
            .collect()
    }

    /// Imported packages by their local name, then every other package by
    /// its last segment together with the `import` it needs.
    fn package_name_items(&self, module: &Module, anchor: &SourceLocation) -> Vec<CompletionItem> {
        let mut items: Vec<CompletionItem> = module
            .imports
            .iter()
            .filter_map(|imp| imp.local_name().or(imp.tail().map(|(name, _)| name)))
            .map(|name| CompletionItem::new(name, CompletionKind::Package))
            .collect();

        let own = module.package_path();
        for package in self.cache.packages() {
            if package == own || module.imports_package(&package).is_some() {
                continue;
            }
            let Some(name) = package.last() else {
                continue;
            };
            let mut item = CompletionItem::new(name.clone(), CompletionKind::Package).with_edit(anchor, name.clone());
            item.extra_edits.push(import_edit::import_edit(module, &package));
            items.push(item);
        }
        items
    }

    fn rule_items(&self, module: &Module, anchor: &SourceLocation, target: Option<&Term>) -> Vec<CompletionItem> {
        let package = target
            .and_then(|term| term_package(module, term))
            .unwrap_or_else(|| module.package_path());
        builder::rule_items(anchor, &self.cache.find_modules_by_package(&package))
    }
}

/// Where the replacement text of an item goes: the last selector of a
/// reference, otherwise the term itself.
fn insertion_anchor(term: &Term) -> SourceLocation {
    term.as_reference()
        .and_then(|segments| segments.last())
        .map_or_else(|| term.location.clone(), |last| last.location.clone())
}

/// The text already typed for `target`.
fn typed_prefix(target: Option<&Term>) -> String {
    let Some(term) = target else {
        return String::new();
    };
    match term.as_reference() {
        Some(segments) => segments
            .last()
            .and_then(Term::as_string)
            .unwrap_or_default()
            .to_string(),
        None => term.to_string(),
    }
}

/// Keep items matching the typed prefix, one per label.
fn filter_items(target: Option<&Term>, items: Vec<CompletionItem>) -> Vec<CompletionItem> {
    let prefix = typed_prefix(target);
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| item.label.starts_with(&prefix))
        .filter(|item| seen.insert(item.label.clone()))
        .collect()
}

/// Suggested `package` clauses for a file without one: the directory name,
/// the file name (minus a `_test` suffix) and the two joined.
fn package_items(at: &SourceLocation) -> Vec<CompletionItem> {
    let path = Path::new(&at.file);
    let file = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(".rego"))
        .filter(|stem| !stem.is_empty())
        .map(|stem| stem.strip_suffix("_test").unwrap_or(stem).replace('-', "_"));
    let dir = path
        .parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .map(|name| name.replace('-', "_"));

    let mut names = Vec::new();
    match (dir, file) {
        (Some(dir), Some(file)) => {
            names.push(dir.clone());
            names.push(file.clone());
            names.push(format!("{dir}.{file}"));
        }
        (Some(only), None) | (None, Some(only)) => names.push(only),
        (None, None) => {}
    }

    names
        .into_iter()
        .map(|name| {
            let text = format!("package {name}");
            CompletionItem::new(text.clone(), CompletionKind::Package).with_edit(at, text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_items_strip_test_suffix_and_hyphens() {
        let at = SourceLocation::point("policies/my-dir/core_test.rego", 1, 1, 0);
        let labels: Vec<String> = package_items(&at).into_iter().map(|i| i.label).collect();
        assert_eq!(labels, ["package my_dir", "package core", "package my_dir.core"]);
    }

    #[test]
    fn package_items_without_directory() {
        let at = SourceLocation::point("core.rego", 1, 1, 0);
        let labels: Vec<String> = package_items(&at).into_iter().map(|i| i.label).collect();
        assert_eq!(labels, ["package core"]);
    }

    #[test]
    fn prefix_of_reference_is_last_string_selector() {
        let loc = SourceLocation::point("a.rego", 1, 1, 0);
        let term = Term::reference(vec![Term::variable("json", loc.clone()), Term::string("pa", loc.clone())]);
        assert_eq!(typed_prefix(Some(&term)), "pa");
        assert_eq!(typed_prefix(Some(&Term::variable("ms", loc))), "ms");
        assert_eq!(typed_prefix(None), "");
    }
}
