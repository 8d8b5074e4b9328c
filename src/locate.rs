/// Cursor position to syntax node.
///
/// Every query starts here.  The locator walks the cached module for the
/// file (possibly an older tree than the current text) and returns the
/// most specific term under the cursor: a bare variable for the root of a
/// reference, a truncated reference for a selector, or the whole path of
/// an import.
///
/// When the cursor sits exactly where the latest parse failed, typically
/// right after a dangling `lib.`, the query is moved one byte left onto
/// the last valid character and the resulting variable is turned into a
/// `lib.""` reference so completion has a qualified target to work with.
use tracing::trace;

use crate::cache::FileCache;
use crate::location::SourceLocation;
use crate::syntax::{Module, Rule, Term, TermKind};

pub struct TermLocator<'c> {
    cache: &'c FileCache,
}

impl<'c> TermLocator<'c> {
    pub fn new(cache: &'c FileCache) -> Self {
        Self { cache }
    }

    pub fn locate(&self, location: &SourceLocation) -> Option<Term> {
        let policy = self.cache.get(&location.file)?;
        let module = policy.module.as_ref()?;

        let shifted = policy
            .parse_errors
            .iter()
            .any(|err| err.location.offset == location.offset)
            .then(|| location.step_back())
            .flatten();
        let query = shifted.as_ref().unwrap_or(location);

        let term = term_in_module(module, query)?;
        if shifted.is_some()
            && let TermKind::Variable(_) = term.kind
        {
            trace!(%location, "completing after a dangling selector");
            let empty = Term::string("", location.clone());
            return Some(Term::reference(vec![term, empty]));
        }
        Some(term)
    }
}

fn term_in_module(module: &Module, query: &SourceLocation) -> Option<Term> {
    if let Some(import) = module.imports.iter().find(|imp| imp.path.location.contains(query)) {
        return Some(import.path.clone());
    }
    let rule = module.rule_at(query)?;
    term_in_rule(rule.branch_at(query), query)
}

fn term_in_rule(rule: &Rule, query: &SourceLocation) -> Option<Term> {
    if rule.name_location.contains(query) && rule.location.contains(&rule.name_location) {
        return Some(Term::variable(rule.name.clone(), rule.name_location.clone()));
    }
    if let Some(head) = rule.head_terms().find(|t| t.location.contains(query)) {
        return term_at(head, query);
    }

    // `with` modifiers are not searched.
    let expr = rule.body.iter().find(|e| e.location.contains(query))?;
    expr.terms()
        .into_iter()
        .find(|t| t.location.contains(query))
        .and_then(|t| term_at(t, query))
}

/// The most specific term inside `term` under `query`.
pub(crate) fn term_at(term: &Term, query: &SourceLocation) -> Option<Term> {
    if !term.location.contains(query) {
        return None;
    }
    match &term.kind {
        TermKind::Variable(_) | TermKind::Literal(_) => Some(term.clone()),
        TermKind::Reference(segments) => {
            let (index, segment) = segments
                .iter()
                .enumerate()
                .find(|(_, s)| s.location.contains(query))?;
            if index > 0 && segment.as_string().is_some() {
                return Some(Term::reference(segments[..=index].to_vec()));
            }
            term_at(segment, query)
        }
        TermKind::Call { operator, args } => std::iter::once(operator.as_ref())
            .chain(args)
            .find_map(|t| term_at(t, query)),
        TermKind::Array(items) | TermKind::Set(items) => items.iter().find_map(|t| term_at(t, query)),
        TermKind::Object(pairs) => pairs
            .iter()
            .flat_map(|(k, v)| [k, v])
            .find_map(|t| term_at(t, query)),
        TermKind::Comprehension { .. } => term.children().into_iter().find_map(|t| term_at(t, query)),
    }
}
