/// Completion item building for rules and built-in functions.
///
/// Clauses of one rule collapse into a single item.  Its insertion text
/// comes from the first clause (`name(args)`, `name[key]` or `name`), its
/// detail joins every clause's source with a blank line, and it is a
/// function as soon as any clause takes arguments or a key.
use std::collections::HashMap;
use std::sync::Arc;

use crate::completion::{CompletionItem, CompletionKind};
use crate::location::SourceLocation;
use crate::syntax::builtins::{self, Builtin};
use crate::syntax::{Module, Rule, Term};

/// One item per rule name across `modules`, in source order.
pub(crate) fn rule_items(at: &SourceLocation, modules: &[Arc<Module>]) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for module in modules {
        for rule in &module.rules {
            let text = module.rule_text(rule);
            let callable = rule.is_function() || rule.key.is_some();
            if let Some(&index) = by_name.get(&rule.name) {
                let item = &mut items[index];
                if let Some(detail) = item.detail.as_mut() {
                    detail.push_str("\n\n");
                    detail.push_str(&text);
                }
                if callable {
                    item.kind = CompletionKind::Function;
                }
                continue;
            }

            let kind = if callable {
                CompletionKind::Function
            } else {
                CompletionKind::Variable
            };
            let mut item = CompletionItem::new(rule.name.clone(), kind).with_edit(at, rule_insert_text(rule));
            item.detail = Some(text);
            if rule.is_function() {
                item.snippet = Some(snippet(&rule.name, rule.args.iter().map(Term::to_string)));
            } else if let Some(key) = &rule.key {
                let key = escape_placeholder(&key.to_string());
                item.snippet = Some(format!("{}[${{1:{key}}}]", escape_placeholder(&rule.name)));
            }
            by_name.insert(rule.name.clone(), items.len());
            items.push(item);
        }
    }
    items
}

fn rule_insert_text(rule: &Rule) -> String {
    if rule.is_function() {
        let args: Vec<String> = rule.args.iter().map(Term::to_string).collect();
        format!("{}({})", rule.name, args.join(", "))
    } else if let Some(key) = &rule.key {
        format!("{}[{key}]", rule.name)
    } else {
        rule.name.clone()
    }
}

/// Built-ins callable from `target`.
///
/// An unqualified target sees every built-in by its full name; a
/// qualified one like `json.p` sees the members of the `json.` namespace
/// by their short name.
pub(crate) fn builtin_items(at: &SourceLocation, target: &Term) -> Vec<CompletionItem> {
    let Some(segments) = target.as_reference() else {
        return builtins::callable().map(|b| builtin_item(at, b.name, b)).collect();
    };
    let Some(root) = segments.first() else {
        return Vec::new();
    };
    let namespace = format!("{root}.");
    builtins::callable()
        .filter_map(|b| b.name.strip_prefix(namespace.as_str()).map(|short| builtin_item(at, short, b)))
        .collect()
}

fn builtin_item(at: &SourceLocation, label: &str, builtin: &Builtin) -> CompletionItem {
    let text = format!("{label}({})", builtin.params.join(", "));
    let mut item = CompletionItem::new(label, CompletionKind::BuiltinFunction).with_edit(at, text);
    item.detail = Some(builtin.documentation());
    item.snippet = Some(snippet(label, builtin.params.iter().map(|p| p.to_string())));
    item
}

/// `name(${1:a}, ${2:b})`.
pub(crate) fn snippet(name: &str, params: impl Iterator<Item = String>) -> String {
    let stops: Vec<String> = params
        .enumerate()
        .map(|(i, param)| format!("${{{}:{}}}", i + 1, escape_placeholder(&param)))
        .collect();
    format!("{}({})", escape_placeholder(name), stops.join(", "))
}

fn escape_placeholder(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '$' | '}' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_numbers_tab_stops() {
        let text = snippet("sprintf", ["string".to_string(), "array[any]".to_string()].into_iter());
        assert_eq!(text, "sprintf(${1:string}, ${2:array[any]})");
    }

    #[test]
    fn snippet_escapes_placeholder_text() {
        let text = snippet("f", ["{a: b}".to_string()].into_iter());
        assert_eq!(text, "f(${1:{a: b\\}})");
    }

    #[test]
    fn snippet_without_params() {
        assert_eq!(snippet("time.now_ns", std::iter::empty()), "time.now_ns()");
    }
}
