/// Rule-local variable scope.
///
/// A variable is bound inside the rule branch that contains it by, in
/// priority order: the head key, the head value, the head arguments, then
/// body statements.  Within a body only the left side of `:=`/`=`, the
/// names declared by `some`, and the selectors of a bare reference or
/// array statement (`containers[c]`) introduce bindings.  A bare call
/// statement never does.
///
/// Comprehensions and `every` open nested queries that bind the same way;
/// `every` also declares its key and value.  A name already bound by an
/// enclosing query is a reference inside the nested one.
///
/// Only occurrences that start before the queried one qualify, which also
/// excludes the queried node itself.
use crate::location::SourceLocation;
use crate::syntax::{ExprKind, Expression, Module, Rule, Term, TermKind};

/// A nested query enclosing the queried position.
struct Scope<'a> {
    declared: Vec<&'a Term>,
    body: &'a [Expression],
    /// The position is the head of a comprehension, which reads what the
    /// body after it binds.
    in_head: bool,
}

/// Where the variable `term` is bound in its enclosing rule branch.
pub(crate) fn local_binding(module: &Module, term: &Term) -> Option<SourceLocation> {
    binding_before(module, term, term.location.offset)
}

/// Whether `term` is a rule-local variable, including when `term` is the
/// binding occurrence itself.
pub(crate) fn declared_locally(module: &Module, term: &Term) -> bool {
    binding_before(module, term, term.location.offset + 1).is_some()
}

fn binding_before(module: &Module, term: &Term, before: u32) -> Option<SourceLocation> {
    let name = term.as_variable()?;
    let rule = module.rule_at(&term.location)?.branch_at(&term.location);
    binding_in_branch(rule, name, &term.location, before)
}

fn binding_in_branch(rule: &Rule, name: &str, at: &SourceLocation, before: u32) -> Option<SourceLocation> {
    let outer = rule
        .head_terms()
        .find_map(|t| binding_in_term(t, name, before))
        .or_else(|| binding_in_body(&rule.body, name, before));
    if outer.is_some() {
        return outer;
    }

    let mut scopes = Vec::new();
    for term in rule.head_terms() {
        enclosing_term(term, at, &mut scopes);
    }
    for expr in &rule.body {
        enclosing_expr(expr, at, &mut scopes);
    }
    scopes.iter().find_map(|scope| {
        let limit = if scope.in_head { u32::MAX } else { before };
        scope
            .declared
            .iter()
            .find_map(|t| binding_in_term(t, name, before))
            .or_else(|| binding_in_body(scope.body, name, limit))
    })
}

/// Collects the nested queries around `at`, outermost first.
fn enclosing_term<'a>(term: &'a Term, at: &SourceLocation, scopes: &mut Vec<Scope<'a>>) {
    if !term.location.contains(at) {
        return;
    }
    if let TermKind::Comprehension { key, head, body, .. } = &term.kind {
        let in_head = key.iter().chain([head]).any(|t| t.location.contains(at));
        scopes.push(Scope {
            declared: Vec::new(),
            body,
            in_head,
        });
        for t in key.iter().chain([head]) {
            enclosing_term(t, at, scopes);
        }
        for expr in body {
            enclosing_expr(expr, at, scopes);
        }
        return;
    }
    for child in term.children() {
        enclosing_term(child, at, scopes);
    }
}

fn enclosing_expr<'a>(expr: &'a Expression, at: &SourceLocation, scopes: &mut Vec<Scope<'a>>) {
    if !expr.location.contains(at) {
        return;
    }
    match &expr.kind {
        // The domain is evaluated outside the `every` query.
        ExprKind::Every { domain, .. } if domain.location.contains(at) => enclosing_term(domain, at, scopes),
        ExprKind::Every { key, value, body, .. } => {
            scopes.push(Scope {
                declared: key.iter().chain([value]).collect(),
                body,
                in_head: false,
            });
            for expr in body {
                enclosing_expr(expr, at, scopes);
            }
        }
        _ => {
            for term in expr.terms() {
                enclosing_term(term, at, scopes);
            }
        }
    }
}

fn binding_in_body(body: &[Expression], name: &str, before: u32) -> Option<SourceLocation> {
    body.iter().find_map(|e| binding_in_expr(e, name, before))
}

/// Where `expr`, a statement of some query, binds `name`.
pub(crate) fn binding_in_expr(expr: &Expression, name: &str, before: u32) -> Option<SourceLocation> {
    match &expr.kind {
        ExprKind::Infix { left, operator, .. } if operator.binds() => binding_in_term(left, name, before),
        ExprKind::Some { bindings, .. } => bindings.iter().find_map(|t| binding_in_term(t, name, before)),
        ExprKind::Term(term) => match &term.kind {
            TermKind::Reference(_) | TermKind::Array(_) => binding_in_term(term, name, before),
            _ => None,
        },
        ExprKind::Infix { .. } | ExprKind::Every { .. } => None,
    }
}

fn binding_in_term(term: &Term, name: &str, before: u32) -> Option<SourceLocation> {
    match &term.kind {
        TermKind::Variable(var) => (var == name && term.location.offset < before).then(|| term.location.clone()),
        // The base of a reference is read, not bound.
        TermKind::Reference(segments) => segments.iter().skip(1).find_map(|t| binding_in_term(t, name, before)),
        TermKind::Array(items) | TermKind::Set(items) => items.iter().find_map(|t| binding_in_term(t, name, before)),
        TermKind::Object(pairs) => pairs
            .iter()
            .flat_map(|(k, v)| [k, v])
            .find_map(|t| binding_in_term(t, name, before)),
        TermKind::Call { .. } | TermKind::Literal(_) | TermKind::Comprehension { .. } => None,
    }
}
