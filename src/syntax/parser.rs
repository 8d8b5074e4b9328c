/// Rego modules from text.
///
/// Parsing is done by the `regorus` parser.  Its spanned tree is lowered
/// here into the owned [`Module`] every resolver walks: reference chains
/// become one [`TermKind::Reference`], infix arithmetic and set operators
/// become calls to the built-in they stand for, and rules that share a
/// head through `else` are chained behind the first clause.
///
/// Positions are recomputed from byte offsets because regorus counts a tab
/// as four columns.
///
/// Only the first syntax error is reported.  Callers keep the previous
/// good tree around, so a precise error offset matters more than
/// recovering and reporting many.
use std::sync::Arc;

use memchr::memchr_iter;
use regorus::unstable::{
    self as rego, ArithOp, AssignOp, BinOp, BoolOp, Expr, Lexer, LiteralStmt, Query, RuleBody, RuleHead, Source, Span,
    Token, TokenKind,
};

use crate::location::SourceLocation;
use crate::syntax::ast::*;
use crate::syntax::{ParseError, ParseErrorKind};

/// Keywords accepted without a `future.keywords` import.
const FUTURE_KEYWORDS: [&str; 4] = ["contains", "every", "if", "in"];

/// Parse `text` as the module stored under `file`.
pub fn parse_module(file: &str, text: &str) -> Result<Module, Vec<ParseError>> {
    let lowering = Lowering::new(file, text);
    let source = match Source::from_contents(file.to_string(), text.to_string()) {
        Ok(source) => source,
        Err(err) => return Err(vec![lowering.error_at(0, 0, err.to_string())]),
    };
    lowering.check_preamble(&source).map_err(|err| vec![err])?;

    match parse_source(&source) {
        Ok(parsed) => Ok(lowering.module(&parsed)),
        Err(rendered) => Err(vec![lowering.syntax_error(&source, &rendered)]),
    }
}

fn parse_source(source: &Source) -> Result<rego::Module, String> {
    let mut parser = rego::Parser::new(source).map_err(|err| err.to_string())?;
    for keyword in FUTURE_KEYWORDS {
        parser
            .set_future_keyword(keyword, &None)
            .map_err(|err| err.to_string())?;
    }
    parser.parse().map_err(|err| err.to_string())
}

/// Symbol and built-in name of every operator lowered to a call.
fn arith_operator(op: &ArithOp) -> (&'static str, &'static str) {
    match op {
        ArithOp::Add => ("+", "plus"),
        ArithOp::Sub => ("-", "minus"),
        ArithOp::Mul => ("*", "mul"),
        ArithOp::Div => ("/", "div"),
        ArithOp::Mod => ("%", "rem"),
    }
}

fn set_operator(op: &BinOp) -> (&'static str, &'static str) {
    match op {
        BinOp::Union => ("|", "or"),
        BinOp::Intersection => ("&", "and"),
    }
}

fn comparison(op: &BoolOp) -> (InfixOp, &'static str) {
    match op {
        BoolOp::Lt => (InfixOp::Lt, "lt"),
        BoolOp::Le => (InfixOp::Lte, "lte"),
        BoolOp::Eq => (InfixOp::Equal, "equal"),
        BoolOp::Ge => (InfixOp::Gte, "gte"),
        BoolOp::Gt => (InfixOp::Gt, "gt"),
        BoolOp::Ne => (InfixOp::NotEqual, "neq"),
    }
}

fn assignment(op: &AssignOp) -> (InfixOp, &'static str) {
    match op {
        AssignOp::ColEq => (InfixOp::Assign, "assign"),
        AssignOp::Eq => (InfixOp::Unify, "eq"),
    }
}

/// The value of a string literal.  Regorus spans cover the text between
/// the delimiters.
fn string_value(span: &Span, raw: bool) -> String {
    let text = span.text();
    let delimiter = if raw { '`' } else { '"' };
    let inner = text
        .strip_prefix(delimiter)
        .and_then(|t| t.strip_suffix(delimiter))
        .unwrap_or(text);
    if raw {
        return inner.to_string();
    }
    serde_json::from_str::<String>(&format!("\"{inner}\"")).unwrap_or_else(|_| inner.to_string())
}

/// `(line, col)` of a `file:line:col` header.
fn line_col(header: &str) -> Option<(u32, u32)> {
    let mut parts = header.trim().rsplitn(3, ':');
    let col = parts.next()?.trim().parse().ok()?;
    let line = parts.next()?.trim().parse().ok()?;
    Some((line, col))
}

/// Position and message of a rendered regorus error.
///
/// Most errors read `\n--> file:line:col\n<excerpt>\nerror: message`, a
/// few are flattened to `file:line:col error: message`.
fn split_rendered(rendered: &str) -> Option<(u32, u32, String)> {
    if let Some(at) = rendered.find("--> ") {
        let rest = &rendered[at + 4..];
        let (line, col) = line_col(rest.lines().next()?)?;
        let message = rest
            .find("\nerror: ")
            .and_then(|i| rest[i + 8..].lines().next())
            .unwrap_or("");
        return Some((line, col, message.trim().to_string()));
    }
    let (header, message) = rendered.split_once(" error: ")?;
    let (line, col) = line_col(header)?;
    Some((line, col, message.lines().next().unwrap_or("").trim().to_string()))
}

/// Tokens of `source` up to the end or the first lexing error.
fn tokens(source: &Source) -> Vec<(TokenKind, u32, u32)> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Ok(Token(kind, span)) = lexer.next_token() {
        if kind == TokenKind::Eof {
            break;
        }
        tokens.push((kind, span.start, span.end));
    }
    tokens
}

struct Lowering<'s> {
    file: &'s str,
    text: &'s str,
    line_starts: Vec<u32>,
}

impl<'s> Lowering<'s> {
    fn new(file: &'s str, text: &'s str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(memchr_iter(b'\n', text.as_bytes()).map(|i| i as u32 + 1));
        Self {
            file,
            text,
            line_starts,
        }
    }

    // ── Positions ───────────────────────────────────────────────────────

    fn location(&self, start: u32, end: u32) -> SourceLocation {
        let line = match self.line_starts.binary_search(&start) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        };
        let col = start - self.line_starts[line] + 1;
        SourceLocation::new(self.file, line as u32 + 1, col, start, end.saturating_sub(start))
    }

    fn span(&self, span: &Span) -> SourceLocation {
        self.location(span.start, span.end)
    }

    /// A string literal's location including its delimiters.
    fn quoted(&self, span: &Span) -> SourceLocation {
        let before = (span.start as usize).checked_sub(1).and_then(|i| self.text.as_bytes().get(i));
        if matches!(before, Some(b'"' | b'`')) {
            return self.location(span.start - 1, span.end + 1);
        }
        self.span(span)
    }

    /// Where `symbol` is written between two operands.
    fn operator_location(&self, symbol: &str, from: u32, to: u32) -> SourceLocation {
        let gap = self.text.get(from as usize..to as usize).unwrap_or("");
        let start = gap.find(symbol).map_or(from, |i| from + i as u32);
        self.location(start, start + symbol.len() as u32)
    }

    /// Byte offset of a regorus `line:col`, where a tab counts four
    /// columns.
    fn offset_at(&self, line: u32, col: u32) -> u32 {
        let Some(&start) = self.line_starts.get(line.saturating_sub(1) as usize) else {
            return self.text.len() as u32;
        };
        let rest = self.text.get(start as usize..).unwrap_or("");
        let mut column = 1;
        for (index, ch) in rest.char_indices() {
            if column >= col || ch == '\n' {
                return start + index as u32;
            }
            column += if ch == '\t' { 4 } else { ch.len_utf8() as u32 };
        }
        self.text.len() as u32
    }

    // ── Errors ──────────────────────────────────────────────────────────

    fn error_at(&self, offset: u32, length: u32, message: String) -> ParseError {
        let mut location = self.location(offset, offset);
        location.length = length;
        ParseError {
            kind: ParseErrorKind::Syntax,
            message,
            location,
        }
    }

    /// Rejects texts without statements or without a leading `package`.
    fn check_preamble(&self, source: &Source) -> Result<(), ParseError> {
        // Lexing errors surface from the parser.
        let Ok(Token(kind, span)) = Lexer::new(source).next_token() else {
            return Ok(());
        };
        if kind == TokenKind::Eof {
            return Err(ParseError {
                kind: ParseErrorKind::EmptyModule,
                message: "empty module".to_string(),
                location: SourceLocation::new(self.file, 1, 1, 0, 0),
            });
        }
        if kind != TokenKind::Ident || span.text() != "package" {
            return Err(ParseError {
                kind: ParseErrorKind::PackageExpected,
                message: "package expected".to_string(),
                location: self.span(&span),
            });
        }
        Ok(())
    }

    /// The error to report for a failed parse.
    ///
    /// A selector dot with no identifier after it is reported one byte past
    /// the dot, which is where the cursor sits while typing.  Regorus gives
    /// up on a broken first statement at the opening brace of its body, so
    /// its own position is useless there.
    fn syntax_error(&self, source: &Source, rendered: &str) -> ParseError {
        let tokens = tokens(source);
        let token_text = |&(_, start, end): &(TokenKind, u32, u32)| self.text.get(start as usize..end as usize);

        let dangling = tokens.iter().enumerate().find_map(|(i, token)| {
            let followed = tokens
                .get(i + 1)
                .is_some_and(|(kind, start, _)| *kind == TokenKind::Ident && *start == token.2);
            (token.0 == TokenKind::Symbol && token_text(token) == Some(".") && !followed).then_some(token.2)
        });
        if let Some(offset) = dangling {
            return self.error_at(offset, 0, "expecting identifier after `.`".to_string());
        }

        let Some((line, col, message)) = split_rendered(rendered) else {
            return self.error_at(0, 0, rendered.trim().to_string());
        };
        let offset = self.offset_at(line, col);
        let at = tokens.iter().position(|&(_, start, _)| start == offset);
        let length = at.map_or(0, |i| tokens[i].2 - tokens[i].1);

        let empty_body = at.is_some_and(|i| {
            token_text(&tokens[i]) == Some("{") && tokens.get(i + 1).and_then(token_text) == Some("}")
        });
        if empty_body {
            return self.error_at(offset, length, "found empty body".to_string());
        }
        self.error_at(offset, length, message)
    }

    // ── Module structure ────────────────────────────────────────────────

    fn module(&self, parsed: &rego::Module) -> Module {
        let mut rules = Vec::new();
        for rule in &parsed.policy {
            self.rule(rule, &mut rules);
        }
        Module {
            file: self.file.to_string(),
            package: self.package(&parsed.package),
            imports: parsed.imports.iter().map(|import| self.import(import)).collect(),
            rules,
            source: Arc::from(self.text),
        }
    }

    fn package(&self, package: &rego::Package) -> Package {
        let mut segments = Vec::new();
        self.segments(&package.refr, &mut segments);
        let path = segments
            .into_iter()
            .filter_map(|segment| {
                let name = segment.as_variable().or(segment.as_string())?.to_string();
                Some(PathSegment {
                    name,
                    location: segment.location,
                })
            })
            .collect();
        Package {
            path,
            location: self.span(&package.span),
        }
    }

    fn import(&self, import: &rego::Import) -> Import {
        Import {
            path: self.term(&import.refr),
            alias: import.r#as.as_ref().map(|alias| alias.text().to_string()),
            alias_location: import.r#as.as_ref().map(|alias| self.span(alias)),
            location: self.span(&import.span),
        }
    }

    /// The name a rule head declares: the base of its reference.
    fn rule_name(&self, refr: &Expr) -> (String, SourceLocation) {
        match refr {
            Expr::RefDot { refr, .. } | Expr::RefBrack { refr, .. } => self.rule_name(refr),
            _ => (refr.span().text().to_string(), self.span(refr.span())),
        }
    }

    /// Lowers one rule.  Query blocks following the first body (`p { a }
    /// { b }`) become clauses of their own.
    fn rule(&self, rule: &rego::Rule, out: &mut Vec<Rule>) {
        let (span, head, bodies) = match rule {
            rego::Rule::Default {
                span,
                refr,
                args,
                op,
                value,
                ..
            } => {
                let (name, name_location) = self.rule_name(refr);
                let location = self.span(span);
                out.push(Rule {
                    name,
                    name_location,
                    key: None,
                    value: Some(self.term(value)),
                    args: self.terms(args),
                    assign: matches!(op, AssignOp::ColEq),
                    body: Vec::new(),
                    else_clause: None,
                    is_default: true,
                    head_location: location.clone(),
                    location,
                });
                return;
            }
            rego::Rule::Spec { span, head, bodies, .. } => (span, head, bodies),
        };

        let (refr, head_span, assign, args) = match head {
            RuleHead::Compr { span, refr, assign, .. } => (refr, span, assign.as_ref(), &[][..]),
            RuleHead::Set { span, refr, .. } => (refr, span, None, &[][..]),
            RuleHead::Func {
                span,
                refr,
                args,
                assign,
                ..
            } => (refr, span, assign.as_ref(), &args[..]),
        };
        let key = match head {
            RuleHead::Set { key, .. } => key.as_ref().map(|key| self.term(key)),
            // `p[k] if ...` and `p[k] = v`.
            RuleHead::Compr { refr, .. } => match &**refr {
                Expr::RefBrack { refr, index, .. } if matches!(&**refr, Expr::Var { .. }) => Some(self.term(index)),
                _ => None,
            },
            RuleHead::Func { .. } => None,
        };

        let (name, name_location) = self.rule_name(refr);
        let assign_op = assign.is_some_and(|a| matches!(a.op, AssignOp::ColEq));
        let head_location = self.location(span.start, head_span.end);

        let (first, rest) = match bodies.split_first() {
            Some((first, rest)) => (Some(first), rest),
            None => (None, &[][..]),
        };
        let (branches, blocks): (Vec<&RuleBody>, Vec<&RuleBody>) =
            rest.iter().partition(|body| body.span.text().starts_with("else"));

        let end = match (first, blocks.is_empty()) {
            (Some(first), false) => first.span.end,
            _ => span.end,
        };
        let mut tail: Option<Box<Rule>> = None;
        for branch in branches.into_iter().rev() {
            let head_end = branch.assign.as_ref().map_or(branch.span.start + 4, |a| a.span.end);
            tail = Some(Box::new(Rule {
                name: name.clone(),
                name_location: name_location.clone(),
                key: None,
                value: branch.assign.as_ref().map(|a| self.term(&a.value)),
                args: self.terms(args),
                assign: assign_op || branch.assign.as_ref().is_some_and(|a| matches!(a.op, AssignOp::ColEq)),
                body: self.body(&branch.query),
                else_clause: tail,
                is_default: false,
                head_location: self.location(branch.span.start, head_end),
                location: self.location(branch.span.start, end),
            }));
        }

        let clause = Rule {
            name,
            name_location,
            key,
            value: assign.map(|a| self.term(&a.value)),
            args: self.terms(args),
            assign: assign_op,
            body: first.map(|body| self.body(&body.query)).unwrap_or_default(),
            else_clause: tail,
            is_default: false,
            head_location,
            location: self.location(span.start, end),
        };
        let siblings: Vec<Rule> = blocks
            .into_iter()
            .map(|block| Rule {
                body: self.body(&block.query),
                else_clause: None,
                location: self.span(&block.span),
                ..clause.clone()
            })
            .collect();
        out.push(clause);
        out.extend(siblings);
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn body(&self, query: &Query) -> Vec<Expression> {
        query.stmts.iter().map(|stmt| self.statement(stmt)).collect()
    }

    fn statement(&self, stmt: &LiteralStmt) -> Expression {
        let (kind, negated) = match &stmt.literal {
            rego::Literal::SomeVars { vars, .. } => {
                let bindings = vars
                    .iter()
                    .map(|var| Term::variable(var.text(), self.span(var)))
                    .collect();
                (ExprKind::Some { bindings, collection: None }, false)
            }
            rego::Literal::SomeIn {
                key,
                value,
                collection,
                ..
            } => {
                let mut bindings: Vec<Term> = key.iter().map(|key| self.term(key)).collect();
                bindings.push(self.term(value));
                let collection = Some(self.term(collection));
                (ExprKind::Some { bindings, collection }, false)
            }
            rego::Literal::Expr { expr, .. } => (self.expression(expr), false),
            rego::Literal::NotExpr { expr, .. } => (self.expression(expr), true),
            rego::Literal::Every {
                key,
                value,
                domain,
                query,
                ..
            } => {
                let kind = ExprKind::Every {
                    key: key.as_ref().map(|key| Term::variable(key.text(), self.span(key))),
                    value: Term::variable(value.text(), self.span(value)),
                    domain: self.term(domain),
                    body: self.body(query),
                };
                (kind, false)
            }
        };

        let with = stmt
            .with_mods
            .iter()
            .map(|modifier| WithModifier {
                target: self.term(&modifier.refr),
                value: self.term(&modifier.r#as),
                location: self.span(&modifier.span),
            })
            .collect();
        Expression {
            kind,
            negated,
            with,
            location: self.span(&stmt.span),
        }
    }

    /// A statement's expression.  Assignments, comparisons and `x in xs`
    /// at the top of a statement join two operands.
    fn expression(&self, expr: &Expr) -> ExprKind {
        let (operator, left, right) = match expr {
            Expr::AssignExpr { op, lhs, rhs, .. } => (assignment(op).0, lhs, rhs),
            Expr::BoolExpr { op, lhs, rhs, .. } => (comparison(op).0, lhs, rhs),
            Expr::Membership {
                key: None,
                value,
                collection,
                ..
            } => (InfixOp::Member, value, collection),
            _ => return ExprKind::Term(self.term(expr)),
        };
        ExprKind::Infix {
            operator,
            left: self.term(left),
            right: self.term(right),
        }
    }

    // ── Terms ───────────────────────────────────────────────────────────

    fn terms<T: std::ops::Deref<Target = Expr>>(&self, exprs: &[T]) -> Vec<Term> {
        exprs.iter().map(|expr| self.term(expr)).collect()
    }

    /// The base and selectors of a reference chain.
    fn segments(&self, expr: &Expr, out: &mut Vec<Term>) {
        match expr {
            Expr::RefDot {
                refr, field: (field, _), ..
            } => {
                self.segments(refr, out);
                out.push(Term::string(field.text(), self.span(field)));
            }
            Expr::RefBrack { refr, index, .. } => {
                self.segments(refr, out);
                out.push(self.term(index));
            }
            _ => out.push(self.term(expr)),
        }
    }

    /// A call to the built-in behind an operator written between `lhs` and
    /// `rhs`.
    fn operator_call(&self, (symbol, builtin): (&str, &str), lhs: &Expr, rhs: &Expr, location: SourceLocation) -> Term {
        let at = self.operator_location(symbol, lhs.span().end, rhs.span().start);
        self.builtin_call(builtin, at, vec![self.term(lhs), self.term(rhs)], location)
    }

    fn builtin_call(&self, builtin: &str, at: SourceLocation, args: Vec<Term>, location: SourceLocation) -> Term {
        let operator = match builtin.split_once('.') {
            Some((namespace, name)) => Term::new(
                TermKind::Reference(vec![
                    Term::variable(namespace, at.clone()),
                    Term::string(name, at.clone()),
                ]),
                at,
            ),
            None => Term::variable(builtin, at),
        };
        Term::new(
            TermKind::Call {
                operator: Box::new(operator),
                args,
            },
            location,
        )
    }

    fn comprehension(
        &self,
        kind: ComprehensionKind,
        key: Option<&Expr>,
        head: &Expr,
        query: &Query,
        location: SourceLocation,
    ) -> Term {
        Term::new(
            TermKind::Comprehension {
                kind,
                key: key.map(|key| Box::new(self.term(key))),
                head: Box::new(self.term(head)),
                body: self.body(query),
            },
            location,
        )
    }

    fn term(&self, expr: &Expr) -> Term {
        let location = self.span(expr.span());
        match expr {
            Expr::String { span, .. } => Term::string(string_value(span, false), self.quoted(span)),
            Expr::RawString { span, .. } => Term::string(string_value(span, true), self.quoted(span)),
            Expr::Number { span, .. } => {
                Term::new(TermKind::Literal(Literal::Number(span.text().to_string())), location)
            }
            Expr::Bool { span, .. } => Term::new(TermKind::Literal(Literal::Boolean(span.text() == "true")), location),
            Expr::Null { .. } => Term::new(TermKind::Literal(Literal::Null), location),
            Expr::Var { span, .. } => Term::variable(span.text(), location),
            Expr::Array { items, .. } => Term::new(TermKind::Array(self.terms(items)), location),
            Expr::Set { items, .. } => Term::new(TermKind::Set(self.terms(items)), location),
            Expr::Object { fields, .. } => {
                let pairs = fields
                    .iter()
                    .map(|(_, key, value)| (self.term(key), self.term(value)))
                    .collect();
                Term::new(TermKind::Object(pairs), location)
            }
            Expr::ArrayCompr { term, query, .. } => {
                self.comprehension(ComprehensionKind::Array, None, term, query, location)
            }
            Expr::SetCompr { term, query, .. } => {
                self.comprehension(ComprehensionKind::Set, None, term, query, location)
            }
            Expr::ObjectCompr { key, value, query, .. } => {
                self.comprehension(ComprehensionKind::Object, Some(&**key), value, query, location)
            }
            Expr::Call { fcn, params, .. } => Term::new(
                TermKind::Call {
                    operator: Box::new(self.term(fcn)),
                    args: self.terms(params),
                },
                location,
            ),
            Expr::UnaryExpr { span, expr, .. } => {
                let at = self.location(span.start, span.start + 1);
                self.builtin_call("minus", at, vec![self.term(expr)], location)
            }
            Expr::RefDot { .. } | Expr::RefBrack { .. } => {
                let mut segments = Vec::new();
                self.segments(expr, &mut segments);
                Term::new(TermKind::Reference(segments), location)
            }
            Expr::BinExpr { op, lhs, rhs, .. } => self.operator_call(set_operator(op), lhs, rhs, location),
            Expr::ArithExpr { op, lhs, rhs, .. } => self.operator_call(arith_operator(op), lhs, rhs, location),
            Expr::BoolExpr { op, lhs, rhs, .. } => {
                let (infix, builtin) = comparison(op);
                self.operator_call((infix.as_str(), builtin), lhs, rhs, location)
            }
            Expr::AssignExpr { op, lhs, rhs, .. } => {
                let (infix, builtin) = assignment(op);
                self.operator_call((infix.as_str(), builtin), lhs, rhs, location)
            }
            Expr::Membership {
                key,
                value,
                collection,
                ..
            } => {
                let mut args: Vec<Term> = key.iter().map(|key| self.term(key)).collect();
                args.push(self.term(value));
                args.push(self.term(collection));
                let builtin = if key.is_some() {
                    "internal.member_3"
                } else {
                    "internal.member_2"
                };
                let at = self.operator_location("in", value.span().end, collection.span().start);
                self.builtin_call(builtin, at, args, location)
            }
        }
    }
}
