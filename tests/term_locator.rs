mod common;

use common::{cache_with, cache_with_cursor, cursor_at};
use regols::TermLocator;
use regols::syntax::TermKind;

#[test]
fn finds_variable_in_body() {
    let (cache, cursor) = cache_with_cursor(&[(
        "main.rego",
        "package main\n\nviolation[msg] {\n\tm|sg = \"hello\"\n}",
    )]);
    let term = TermLocator::new(&cache).locate(&cursor).unwrap();
    assert_eq!(term.as_variable(), Some("msg"));
    assert_eq!((term.location.row, term.location.col), (4, 2));
    assert_eq!(term.location.offset as usize, "package main\n\nviolation[msg] {\n\t".len());
}

#[test]
fn root_of_reference_is_a_bare_variable() {
    let (cache, cursor) = cache_with_cursor(&[(
        "main.rego",
        "package main\n\nimport data.lib\n\nviolation[msg] {\n\tl|ib.method()\n}",
    )]);
    let term = TermLocator::new(&cache).locate(&cursor).unwrap();
    assert_eq!(term.as_variable(), Some("lib"));
    assert_eq!((term.location.row, term.location.col), (6, 2));
}

#[test]
fn selector_yields_truncated_reference() {
    let (cache, cursor) = cache_with_cursor(&[(
        "main.rego",
        "package main\n\nviolation[msg] {\n\tinput.a.b|c.d\n}",
    )]);
    let term = TermLocator::new(&cache).locate(&cursor).unwrap();
    assert_eq!(term.to_string(), "input.a.bc");
}

#[test]
fn dangling_selector_uses_previous_tree() {
    let cache = cache_with(&[(
        "main.rego",
        "package main\n\nimport data.lib\n\nviolation[msg] {\n\tlib\n}",
    )]);

    let edited = "package main\n\nimport data.lib\n\nviolation[msg] {\n\tlib.\n}";
    cache.put("main.rego", edited);
    let offset = edited.find("lib.\n").unwrap() + "lib.".len();
    let cursor = cursor_at("main.rego", edited, offset);

    let term = TermLocator::new(&cache).locate(&cursor).unwrap();
    let TermKind::Reference(segments) = &term.kind else {
        panic!("expected a reference, got {term:?}");
    };
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].as_variable(), Some("lib"));
    assert_eq!((segments[0].location.row, segments[0].location.col), (6, 2));
    assert_eq!(segments[1].as_string(), Some(""));
    assert_eq!((segments[1].location.row, segments[1].location.col), (6, 6));
}

#[test]
fn whitespace_after_term_finds_nothing() {
    let (cache, cursor) = cache_with_cursor(&[(
        "main.rego",
        "package main\n\nimport data.lib\n\nviolation[msg] {\n\tlib |\n}",
    )]);
    assert!(TermLocator::new(&cache).locate(&cursor).is_none());
}

#[test]
fn finds_term_in_else_branches() {
    let text = "package main\n\nauthorize = \"allow\" {\n\tmsg == \"allow\"\n} else = \"deny\" {\n\tm|sg == \"deny\"\n} else = \"out\" {\n\tmsg == \"out\"\n}";
    let (cache, cursor) = cache_with_cursor(&[("src.rego", text)]);
    let term = TermLocator::new(&cache).locate(&cursor).unwrap();
    assert_eq!(term.as_variable(), Some("msg"));
    assert_eq!((term.location.row, term.location.col), (6, 2));

    let text = "package main\n\nauthorize = \"allow\" {\n\tmsg == \"allow\"\n} else = \"deny\" {\n\tmsg == \"deny\"\n} else = \"out\" {\n\tm|sg == \"out\"\n}";
    let (cache, cursor) = cache_with_cursor(&[("src.rego", text)]);
    let term = TermLocator::new(&cache).locate(&cursor).unwrap();
    assert_eq!((term.location.row, term.location.col), (8, 2));
}

#[test]
fn finds_rule_value() {
    let (cache, cursor) = cache_with_cursor(&[(
        "src.rego",
        "package main\n\nauthorize = i|nput {\n\tinput.message == \"allow\"\n}",
    )]);
    let term = TermLocator::new(&cache).locate(&cursor).unwrap();
    assert_eq!(term.as_variable(), Some("input"));
    assert_eq!((term.location.row, term.location.col), (3, 13));
}

#[test]
fn with_modifiers_are_not_searched() {
    let (cache, cursor) = cache_with_cursor(&[(
        "src_test.rego",
        "package main\n\ntest_hoge {\n\tviolation w|ith input as \"{}\"\n}\n\nviolation[msg] {\n\tmsg := \"hello\"\n}",
    )]);
    assert!(TermLocator::new(&cache).locate(&cursor).is_none());
}

#[test]
fn import_yields_whole_path() {
    let (cache, cursor) = cache_with_cursor(&[("src.rego", "package main\n\nimport data.li|b")]);
    let term = TermLocator::new(&cache).locate(&cursor).unwrap();
    assert_eq!(term.to_string(), "data.lib");
    assert_eq!((term.location.row, term.location.col), (3, 8));
}

#[test]
fn rule_name_is_a_variable() {
    let (cache, cursor) = cache_with_cursor(&[(
        "src.rego",
        "package src\n\ni|s_hello(msg) {\n\tmsg == \"hello\"\n}",
    )]);
    let term = TermLocator::new(&cache).locate(&cursor).unwrap();
    assert_eq!(term.as_variable(), Some("is_hello"));
    assert_eq!((term.location.row, term.location.col), (3, 1));
}

#[test]
fn unknown_file_finds_nothing() {
    let (cache, _) = cache_with_cursor(&[("a.rego", "package a\n\nx| = 1")]);
    let cursor = regols::SourceLocation::point("missing.rego", 1, 1, 0);
    assert!(TermLocator::new(&cache).locate(&cursor).is_none());
}
