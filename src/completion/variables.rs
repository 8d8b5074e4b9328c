/// Variable name completion.
///
/// Offers the variables the enclosing rule branch has bound before the
/// cursor: the head key and arguments (unless the cursor is in the head
/// itself), and whatever body statements on earlier rows bind.  The walk
/// stops at the first statement that does not start above the cursor row,
/// and enters an `every` body only when the cursor is inside it.
use crate::completion::{CompletionItem, CompletionKind};
use crate::location::SourceLocation;
use crate::syntax::{ExprKind, Expression, Rule, Term, TermKind};

pub fn local_variables(rule: &Rule, cursor: &SourceLocation) -> Vec<CompletionItem> {
    let mut names = Vec::new();
    if !rule.head_location.contains(cursor) {
        for term in rule.key.iter().chain(&rule.args) {
            bound_names(term, &mut names);
        }
    }

    body_names(&rule.body, cursor, &mut names);

    names
        .into_iter()
        .map(|name| CompletionItem::new(name, CompletionKind::Variable))
        .collect()
}

fn body_names(body: &[Expression], cursor: &SourceLocation, names: &mut Vec<String>) {
    for expr in body {
        if expr.location.row >= cursor.row {
            break;
        }
        match &expr.kind {
            ExprKind::Term(term) => bound_names(term, names),
            ExprKind::Infix { operator, left, .. } if operator.binds() => bound_names(left, names),
            ExprKind::Some { bindings, .. } => bindings.iter().for_each(|t| bound_names(t, names)),
            // Only visible from inside the `every` body.
            ExprKind::Every { key, value, body, .. } if expr.location.contains(cursor) => {
                key.iter().chain([value]).for_each(|t| bound_names(t, names));
                body_names(body, cursor, names);
            }
            ExprKind::Infix { .. } | ExprKind::Every { .. } => {}
        }
    }
}

fn bound_names(term: &Term, names: &mut Vec<String>) {
    match &term.kind {
        TermKind::Variable(name) => names.push(name.clone()),
        TermKind::Array(items) => items.iter().for_each(|t| bound_names(t, names)),
        // The base of `lib.x[y]` is not a local.
        TermKind::Reference(segments) => segments.iter().skip(1).for_each(|t| bound_names(t, names)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_module;

    fn labels(text: &str, row: u32, col: u32) -> Vec<String> {
        labels_at(text, row, col, 0)
    }

    fn labels_at(text: &str, row: u32, col: u32, offset: u32) -> Vec<String> {
        let module = parse_module("main.rego", text).unwrap();
        let cursor = SourceLocation::point("main.rego", row, col, offset);
        local_variables(&module.rules[0], &cursor)
            .into_iter()
            .map(|item| item.label)
            .collect()
    }

    #[test]
    fn key_and_earlier_bindings() {
        let text = "package main\n\nviolation[msg] {\n\tms := hoge(fuga)\n\tmessages[message]\n\tm\n}\n";
        assert_eq!(labels(text, 6, 2), ["msg", "ms", "message"]);
    }

    #[test]
    fn statements_on_the_cursor_row_are_skipped() {
        let text = "package main\n\nviolation[msg] {\n\tmsg = \"hello\"\n\tms\n}\n";
        assert_eq!(labels(text, 5, 3), ["msg", "msg"]);
    }

    #[test]
    fn calls_bind_nothing() {
        let text = "package main\n\nf(a) {\n\ttrace(a)\n\tb := 1\n\tc\n}\n";
        assert_eq!(labels(text, 6, 2), ["a", "b"]);
    }

    #[test]
    fn every_declares_inside_its_body() {
        let text = "package main\n\nallow {\n\tevery i, x in input.xs {\n\t\ty := x\n\t\ty\n\t}\n\tz\n}\n";
        let inside = text.find("\t\ty\n").unwrap() as u32 + 3;
        assert_eq!(labels_at(text, 6, 4, inside), ["i", "x", "y"]);

        let after = text.find("\tz").unwrap() as u32 + 2;
        assert!(labels_at(text, 8, 3, after).is_empty());
    }
}
