//! Syntax tree for parsed Rego modules.
//!
//! All nodes own their data and carry the [`SourceLocation`] they were
//! parsed from, so trees can be shared across threads behind an `Arc`
//! and outlive the text they came from.

use std::fmt;
use std::sync::Arc;

use crate::location::SourceLocation;

/// Upper bound on the number of `else` branches walked for one rule.
pub const MAX_ELSE_DEPTH: usize = 512;

/// A node in the expression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub kind: TermKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermKind {
    Variable(String),
    /// A selector chain.  The first segment is the base, later segments are
    /// string selectors (`a.b`, `a["b"]`) or term selectors (`a[b]`).
    Reference(Vec<Term>),
    /// A function call.  Infix arithmetic is represented as a call whose
    /// operator names the built-in (`plus`, `minus`, ...).
    Call {
        operator: Box<Term>,
        args: Vec<Term>,
    },
    Array(Vec<Term>),
    Object(Vec<(Term, Term)>),
    Set(Vec<Term>),
    Literal(Literal),
    /// `[head | body]`, `{head | body}` or `{key: head | body}`.  The body
    /// is a scope of its own.
    Comprehension {
        kind: ComprehensionKind,
        key: Option<Box<Term>>,
        head: Box<Term>,
        body: Vec<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    Array,
    Set,
    Object,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    /// Numbers are kept as written.
    Number(String),
    Boolean(bool),
    Null,
}

impl Term {
    pub fn new(kind: TermKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    pub fn variable(name: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(TermKind::Variable(name.into()), location)
    }

    pub fn string(value: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(TermKind::Literal(Literal::String(value.into())), location)
    }

    /// Builds a reference whose location spans its first to last segment.
    pub fn reference(segments: Vec<Term>) -> Self {
        let location = match (segments.first(), segments.last()) {
            (Some(first), Some(last)) => first.location.span_to(&last.location),
            _ => SourceLocation::default(),
        };
        Self::new(TermKind::Reference(segments), location)
    }

    pub fn as_variable(&self) -> Option<&str> {
        match &self.kind {
            TermKind::Variable(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&[Term]> {
        match &self.kind {
            TermKind::Reference(segments) => Some(segments),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match &self.kind {
            TermKind::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Name of the root variable for variables and references.
    pub fn root_name(&self) -> Option<&str> {
        match &self.kind {
            TermKind::Variable(name) => Some(name),
            TermKind::Reference(segments) => segments.first().and_then(Term::as_variable),
            _ => None,
        }
    }

    /// Structural equality ignoring locations.
    pub fn same_value(&self, other: &Term) -> bool {
        match (&self.kind, &other.kind) {
            (TermKind::Variable(a), TermKind::Variable(b)) => a == b,
            (TermKind::Literal(a), TermKind::Literal(b)) => a == b,
            (TermKind::Reference(a), TermKind::Reference(b))
            | (TermKind::Array(a), TermKind::Array(b))
            | (TermKind::Set(a), TermKind::Set(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            (
                TermKind::Call { operator: oa, args: aa },
                TermKind::Call { operator: ob, args: ab },
            ) => oa.same_value(ob) && aa.len() == ab.len() && aa.iter().zip(ab).all(|(x, y)| x.same_value(y)),
            (TermKind::Object(a), TermKind::Object(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|((ka, va), (kb, vb))| ka.same_value(kb) && va.same_value(vb))
            }
            _ => false,
        }
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<&Term> {
        match &self.kind {
            TermKind::Variable(_) | TermKind::Literal(_) => Vec::new(),
            TermKind::Reference(items) | TermKind::Array(items) | TermKind::Set(items) => items.iter().collect(),
            TermKind::Call { operator, args } => std::iter::once(operator.as_ref()).chain(args).collect(),
            TermKind::Object(pairs) => pairs.iter().flat_map(|(k, v)| [k, v]).collect(),
            TermKind::Comprehension { key, head, body, .. } => key
                .as_deref()
                .into_iter()
                .chain(std::iter::once(head.as_ref()))
                .chain(body.iter().flat_map(Expression::terms))
                .collect(),
        }
    }

    /// Pre-order walk over this term and everything below it.
    pub fn walk<'t>(&'t self, visit: &mut impl FnMut(&'t Term)) {
        let mut stack = vec![self];
        while let Some(term) = stack.pop() {
            visit(term);
            let children = term.children();
            stack.extend(children.into_iter().rev());
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn write_list<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
    separator: &str,
) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::Number(n) => f.write_str(n),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Null => f.write_str("null"),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TermKind::Variable(name) => f.write_str(name),
            TermKind::Literal(literal) => write!(f, "{literal}"),
            TermKind::Reference(segments) => {
                let Some((base, rest)) = segments.split_first() else {
                    return Ok(());
                };
                write!(f, "{base}")?;
                for segment in rest {
                    match segment.as_string() {
                        Some(s) if is_identifier(s) => write!(f, ".{s}")?,
                        _ => write!(f, "[{segment}]")?,
                    }
                }
                Ok(())
            }
            TermKind::Call { operator, args } => {
                write!(f, "{operator}(")?;
                write_list(f, args, ", ")?;
                f.write_str(")")
            }
            TermKind::Array(items) => {
                f.write_str("[")?;
                write_list(f, items, ", ")?;
                f.write_str("]")
            }
            TermKind::Set(items) if items.is_empty() => f.write_str("set()"),
            TermKind::Set(items) => {
                f.write_str("{")?;
                write_list(f, items, ", ")?;
                f.write_str("}")
            }
            TermKind::Object(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            TermKind::Comprehension { kind, key, head, body } => {
                let (open, close) = match kind {
                    ComprehensionKind::Array => ("[", "]"),
                    ComprehensionKind::Set | ComprehensionKind::Object => ("{", "}"),
                };
                f.write_str(open)?;
                if let Some(key) = key {
                    write!(f, "{key}: ")?;
                }
                write!(f, "{head} | ")?;
                write_list(f, body, "; ")?;
                f.write_str(close)
            }
        }
    }
}

/// Operators that join the two sides of a body expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Assign,
    Unify,
    Equal,
    NotEqual,
    Lt,
    Lte,
    Gt,
    Gte,
    Member,
}

impl InfixOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assign => ":=",
            Self::Unify => "=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Member => "in",
        }
    }

    /// `:=` and `=` introduce bindings on their left-hand side.
    pub fn binds(self) -> bool {
        matches!(self, Self::Assign | Self::Unify)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithModifier {
    pub target: Term,
    pub value: Term,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Term(Term),
    Infix { operator: InfixOp, left: Term, right: Term },
    Some { bindings: Vec<Term>, collection: Option<Term> },
    /// `every key, value in domain { body }`.
    Every {
        key: Option<Term>,
        value: Term,
        domain: Term,
        body: Vec<Expression>,
    },
}

/// One statement of a rule body.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub negated: bool,
    pub with: Vec<WithModifier>,
    pub location: SourceLocation,
}

impl Expression {
    /// Operand terms in source order, excluding `with` modifiers.  The
    /// statements of an `every` body are flattened in.
    pub fn terms(&self) -> Vec<&Term> {
        match &self.kind {
            ExprKind::Term(term) => vec![term],
            ExprKind::Infix { left, right, .. } => vec![left, right],
            ExprKind::Some { bindings, collection } => bindings.iter().chain(collection).collect(),
            ExprKind::Every {
                key,
                value,
                domain,
                body,
            } => key
                .iter()
                .chain([value, domain])
                .chain(body.iter().flat_map(Expression::terms))
                .collect(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("not ")?;
        }
        match &self.kind {
            ExprKind::Term(term) => write!(f, "{term}")?,
            ExprKind::Infix { operator, left, right } => write!(f, "{left} {} {right}", operator.as_str())?,
            ExprKind::Some { bindings, collection } => {
                f.write_str("some ")?;
                write_list(f, bindings, ", ")?;
                if let Some(collection) = collection {
                    write!(f, " in {collection}")?;
                }
            }
            ExprKind::Every {
                key,
                value,
                domain,
                body,
            } => {
                f.write_str("every ")?;
                if let Some(key) = key {
                    write!(f, "{key}, ")?;
                }
                write!(f, "{value} in {domain} {{ ")?;
                write_list(f, body, "; ")?;
                f.write_str(" }")?;
            }
        }
        for modifier in &self.with {
            write!(f, " with {} as {}", modifier.target, modifier.value)?;
        }
        Ok(())
    }
}

/// A rule clause.  `else` branches hang off the clause they follow and
/// share its name and arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub name_location: SourceLocation,
    pub key: Option<Term>,
    pub value: Option<Term>,
    pub args: Vec<Term>,
    /// Whether the head used `:=` rather than `=`.
    pub assign: bool,
    pub body: Vec<Expression>,
    pub else_clause: Option<Box<Rule>>,
    pub is_default: bool,
    /// Span of the head, from the name (or `default`) to the end of the
    /// value.
    pub head_location: SourceLocation,
    /// Span of the whole clause including every following `else`.
    pub location: SourceLocation,
}

impl Rule {
    /// This clause followed by each of its `else` branches.
    pub fn branches(&self) -> Branches<'_> {
        Branches {
            next: Some(self),
            remaining: MAX_ELSE_DEPTH,
        }
    }

    /// The innermost branch whose span contains `location`.
    pub fn branch_at(&self, location: &SourceLocation) -> &Rule {
        self.branches()
            .filter(|branch| branch.location.contains(location))
            .last()
            .unwrap_or(self)
    }

    pub fn is_function(&self) -> bool {
        !self.args.is_empty()
    }

    /// Head terms in lookup priority order.
    pub fn head_terms(&self) -> impl Iterator<Item = &Term> {
        self.key.iter().chain(&self.value).chain(&self.args)
    }

    /// Text shown for `default` rules, rebuilt from the head.
    pub fn default_text(&self) -> String {
        let op = if self.assign { ":=" } else { "=" };
        match &self.value {
            Some(value) => format!("default {} {op} {value}", self.name),
            None => format!("default {}", self.name),
        }
    }
}

pub struct Branches<'r> {
    next: Option<&'r Rule>,
    remaining: usize,
}

impl<'r> Iterator for Branches<'r> {
    type Item = &'r Rule;

    fn next(&mut self) -> Option<&'r Rule> {
        if self.remaining == 0 {
            return None;
        }
        let rule = self.next?;
        self.remaining -= 1;
        self.next = rule.else_clause.as_deref();
        Some(rule)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub name: String,
    pub location: SourceLocation,
}

/// A `package` clause.  The path is stored without the implicit `data`
/// root.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub path: Vec<PathSegment>,
    pub location: SourceLocation,
}

impl Package {
    pub fn names(&self) -> Vec<String> {
        self.path.iter().map(|s| s.name.clone()).collect()
    }

    pub fn matches(&self, path: &[String]) -> bool {
        self.path.len() == path.len() && self.path.iter().zip(path).all(|(s, p)| &s.name == p)
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.path.last()
    }
}

/// Renders a package path as it appears in an import.
pub fn package_ref(path: &[String]) -> String {
    let mut out = String::from("data");
    for name in path {
        if is_identifier(name) {
            out.push('.');
            out.push_str(name);
        } else {
            out.push_str(&format!("[{name:?}]"));
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: Term,
    pub alias: Option<String>,
    pub alias_location: Option<SourceLocation>,
    pub location: SourceLocation,
}

impl Import {
    /// The imported package path for `data` imports, without `data`.
    pub fn package_path(&self) -> Option<Vec<String>> {
        let segments = self.path.as_reference()?;
        let (root, rest) = segments.split_first()?;
        if root.as_variable() != Some("data") {
            return None;
        }
        rest.iter().map(|s| s.as_string().map(str::to_string)).collect()
    }

    /// The last selector of the import path and its location.
    pub fn tail(&self) -> Option<(&str, &SourceLocation)> {
        let last = self.path.as_reference()?.last()?;
        last.as_string().map(|name| (name, &last.location))
    }

    /// The name this import binds in the importing module.
    pub fn local_name(&self) -> Option<&str> {
        if let Some(alias) = &self.alias {
            return Some(alias);
        }
        match self.path.root_name() {
            Some("data" | "input") => self.tail().map(|(name, _)| name).or(self.path.as_variable()),
            _ => None,
        }
    }

    /// Where [`Import::local_name`] is written.
    pub fn local_name_location(&self) -> Option<&SourceLocation> {
        if self.alias.is_some() {
            return self.alias_location.as_ref();
        }
        match self.tail() {
            Some((_, location)) => Some(location),
            None => self.path.as_variable().map(|_| &self.path.location),
        }
    }
}

/// One parsed file.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub file: String,
    pub package: Package,
    pub imports: Vec<Import>,
    pub rules: Vec<Rule>,
    pub source: Arc<str>,
}

impl Module {
    /// The source text covered by `location`.
    pub fn text(&self, location: &SourceLocation) -> &str {
        self.source
            .get(location.offset as usize..location.end() as usize)
            .unwrap_or("")
    }

    pub fn package_path(&self) -> Vec<String> {
        self.package.names()
    }

    /// The top-level rule whose span contains `location`.
    pub fn rule_at(&self, location: &SourceLocation) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.location.contains(location))
    }

    /// The import that binds `name` in this module.
    pub fn import_named(&self, name: &str) -> Option<&Import> {
        self.imports.iter().find(|imp| imp.local_name() == Some(name))
    }

    pub fn imports_package(&self, path: &[String]) -> Option<&Import> {
        self.imports
            .iter()
            .find(|imp| imp.package_path().is_some_and(|p| p == path))
    }

    /// Documentation text for a rule: its source, or a rebuilt head for
    /// `default` rules.
    pub fn rule_text(&self, rule: &Rule) -> String {
        if rule.is_default {
            rule.default_text()
        } else {
            self.text(&rule.location).to_string()
        }
    }
}
