/// Find references.
///
/// A variable bound inside its rule is rule-scoped: its references are the
/// occurrences of the name in that one branch, and name reuse in other
/// rules is shadowing, not a reference.
///
/// Anything else (rules, imports, package names) is searched project-wide.
/// Only modules that can see the symbol are visited: the package that
/// defines it, the package the query comes from, and every module that
/// imports the defining package.  Before a module is scanned the query
/// term is rewritten into that module's vocabulary, so `lib.method`
/// matches `x.method` under `import data.lib as x` and bare `method`
/// inside package `lib` itself.
use crate::cache::FileCache;
use crate::definition::{DefinitionResolver, binding_in_expr, declared_locally};
use crate::location::SourceLocation;
use crate::syntax::{Module, Rule, Term, TermKind};

pub struct ReferenceResolver<'c> {
    cache: &'c FileCache,
}

impl<'c> ReferenceResolver<'c> {
    pub fn new(cache: &'c FileCache) -> Self {
        Self { cache }
    }

    /// Every occurrence of the binding `term` denotes, sorted by file and
    /// row.
    pub fn resolve(&self, term: &Term) -> Vec<SourceLocation> {
        let Some(module) = self.cache.module(&term.location.file) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        if declared_locally(&module, term) {
            if let Some(rule) = module.rule_at(&term.location) {
                scan_branch(term, rule.branch_at(&term.location), true, &mut found);
            }
        } else {
            self.project_references(&module, term, &mut found);
        }

        found.sort_by(|a, b| a.key().cmp(&b.key()));
        found.dedup_by(|a, b| a.key() == b.key());
        found
    }

    fn project_references(&self, module: &Module, term: &Term, found: &mut Vec<SourceLocation>) {
        let definitions = DefinitionResolver::new(self.cache).resolve_outside_rule(module, term);
        let own_package = module.package_path();
        let defining_package = definitions
            .first()
            .and_then(|loc| self.cache.module(&loc.file))
            .map(|m| m.package_path())
            .unwrap_or_else(|| own_package.clone());
        found.extend(definitions);

        if let Some(name) = term.as_variable() {
            for package in self.cache.packages() {
                if package.last().map(String::as_str) != Some(name) {
                    continue;
                }
                for m in self.cache.find_modules_by_package(&package) {
                    found.extend(m.package.last().map(|seg| seg.location.clone()));
                }
            }
        }

        let query_rule = module.rule_at(&term.location).map(|r| r.location.clone());
        for target in self.cache.modules() {
            let visible = target.package.matches(&defining_package)
                || target.package.matches(&own_package)
                || target.imports_package(&defining_package).is_some();
            if !visible {
                continue;
            }

            for import in &target.imports {
                if let Some((tail, location)) = import.tail() {
                    let bound = Term::variable(tail, location.clone());
                    matches_in(term, &bound, found);
                }
            }

            let projected = project(term, module, &target);
            for rule in &target.rules {
                let permissive = query_rule.as_ref() == Some(&rule.location);
                for branch in rule.branches() {
                    scan_branch(&projected, branch, permissive, found);
                }
            }
        }
    }
}

/// Collects matches of `pattern` in one rule branch.
///
/// Outside the rule the query came from (`permissive == false`) a branch
/// that declares the name itself is skipped, and scanning stops at the
/// first statement that binds it (`:=`, `some`, or a bare reference
/// such as `xs[x]`).
fn scan_branch(pattern: &Term, rule: &Rule, permissive: bool, found: &mut Vec<SourceLocation>) {
    if pattern.as_variable() == Some(rule.name.as_str()) {
        if !permissive {
            return;
        }
        found.push(rule.name_location.clone());
    }

    for head in rule.head_terms() {
        let mut hits = Vec::new();
        matches_in(pattern, head, &mut hits);
        if !hits.is_empty() && !permissive {
            return;
        }
        found.extend(hits);
    }

    for expr in &rule.body {
        if !permissive
            && let Some(name) = pattern.as_variable()
            && binding_in_expr(expr, name, u32::MAX).is_some()
        {
            return;
        }
        for term in expr.terms() {
            matches_in(pattern, term, found);
        }
    }
}

/// Occurrences of `pattern` inside `term`.
///
/// A variable pattern matches variables by name, including the variable
/// segments of references.  A reference pattern matches any reference it
/// is a prefix of and reports the last matched segment.
fn matches_in(pattern: &Term, term: &Term, found: &mut Vec<SourceLocation>) {
    match (&pattern.kind, &term.kind) {
        (TermKind::Variable(want), TermKind::Variable(name)) => {
            if want == name {
                found.push(term.location.clone());
            }
        }
        (TermKind::Reference(prefix), TermKind::Reference(segments)) => {
            let is_prefix = prefix.len() <= segments.len()
                && prefix.iter().zip(segments).all(|(p, s)| p.same_value(s));
            if is_prefix && let Some(last) = segments.get(prefix.len() - 1) {
                found.push(last.location.clone());
                return;
            }
            for segment in segments.iter().skip(1) {
                matches_in(pattern, segment, found);
            }
        }
        (_, TermKind::Variable(_) | TermKind::Literal(_)) => {}
        _ => {
            for child in term.children() {
                matches_in(pattern, child, found);
            }
        }
    }
}

/// The package `term` belongs to from the point of view of `origin`.
fn origin_package(term: &Term, origin: &Module) -> Option<Vec<String>> {
    match term.as_reference() {
        None => Some(origin.package_path()),
        Some(segments) => {
            let root = segments.first()?.as_variable()?;
            origin.import_named(root)?.package_path()
        }
    }
}

/// Rewrites `term`, written in `origin`, the way `target` would spell it.
fn project(term: &Term, origin: &Module, target: &Module) -> Term {
    let Some(package) = origin_package(term, origin) else {
        return term.clone();
    };

    if !target.package.matches(&package) {
        let Some(prefix) = target.imports_package(&package).and_then(|imp| imp.local_name()) else {
            return term.clone();
        };
        return match &term.kind {
            TermKind::Reference(segments) => {
                let mut segments = segments.clone();
                if let Some(root) = segments.first_mut() {
                    *root = Term::variable(prefix, root.location.clone());
                }
                Term::new(TermKind::Reference(segments), term.location.clone())
            }
            TermKind::Variable(name) => Term::new(
                TermKind::Reference(vec![
                    Term::variable(prefix, term.location.clone()),
                    Term::string(name.clone(), term.location.clone()),
                ]),
                term.location.clone(),
            ),
            _ => term.clone(),
        };
    }

    // Inside the package itself the qualifier disappears.
    let Some(segments) = term.as_reference() else {
        return term.clone();
    };
    let Some(first) = segments.get(1).and_then(|s| s.as_string().map(|name| (name, &s.location))) else {
        return term.clone();
    };
    let head = Term::variable(first.0, first.1.clone());
    if segments.len() == 2 {
        return head;
    }
    let mut rest = vec![head];
    rest.extend(segments[2..].iter().cloned());
    Term::reference(rest)
}
