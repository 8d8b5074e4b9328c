mod common;

use common::{cache_with, cache_with_cursor, cursor_at};
use regols::completion::TextEdit;
use regols::syntax::builtins::BUILTIN_DETAIL;
use regols::{CompletionItem, CompletionKind, CompletionResolver, SourceLocation};

fn complete(files: &[(&str, &str)]) -> Vec<CompletionItem> {
    let (cache, cursor) = cache_with_cursor(files);
    CompletionResolver::new(&cache).resolve(&cursor)
}

fn labels(items: &[CompletionItem]) -> Vec<&str> {
    items.iter().map(|item| item.label.as_str()).collect()
}

fn find<'i>(items: &'i [CompletionItem], label: &str) -> &'i CompletionItem {
    items
        .iter()
        .find(|item| item.label == label)
        .unwrap_or_else(|| panic!("no `{label}` in {:?}", labels(items)))
}

fn edit(row: u32, col: u32, text: &str) -> TextEdit {
    TextEdit {
        row,
        col,
        text: text.to_string(),
    }
}

// ─── Imports ────────────────────────────────────────────────────────────────

#[test]
fn lists_import_between_package_and_rules() {
    let items = complete(&[("src.rego", "package src\n\n|"), ("lib.rego", "package lib")]);
    assert_eq!(labels(&items), ["import data.lib"]);
    assert_eq!(items[0].kind, CompletionKind::Import);
    assert_eq!(items[0].edit(), Some(&edit(3, 1, "import data.lib")));
}

#[test]
fn import_replaces_partial_keyword_from_line_start() {
    let cache = cache_with(&[("src.rego", "package src\n\n\n"), ("lib.rego", "package lib")]);
    let edited = "package src\n\nim\n";
    cache.put("src.rego", edited);
    let cursor = cursor_at("src.rego", edited, "package src\n\nim".len());

    let items = CompletionResolver::new(&cache).resolve(&cursor);
    assert_eq!(labels(&items), ["import data.lib"]);
    assert_eq!(items[0].edit(), Some(&edit(3, 1, "import data.lib")));
}

#[test]
fn already_imported_package_is_not_offered() {
    let items = complete(&[
        ("src.rego", "package src\n\nimport data.lib\n|"),
        ("lib.rego", "package lib"),
    ]);
    assert!(items.is_empty());
}

// ─── Package clauses ────────────────────────────────────────────────────────

#[test]
fn empty_file_gets_package_suggestions() {
    let cache = cache_with(&[("test-test/core.rego", "")]);
    // Some clients send column 0 for an empty document.
    let cursor = SourceLocation::point("test-test/core.rego", 1, 0, 0);
    let items = CompletionResolver::new(&cache).resolve(&cursor);
    assert_eq!(
        labels(&items),
        ["package test_test", "package core", "package test_test.core"]
    );
    for item in &items {
        assert_eq!(item.kind, CompletionKind::Package);
        assert_eq!(item.edit(), Some(&edit(1, 1, &item.label)));
    }
}

#[test]
fn file_without_package_clause_gets_package_suggestions() {
    let items = complete(&[("test/core.rego", "p|")]);
    assert_eq!(labels(&items), ["package test", "package core", "package test.core"]);

    let items = complete(&[("aaa/bbb_test.rego", "p|")]);
    assert_eq!(labels(&items), ["package aaa", "package bbb", "package aaa.bbb"]);
}

// ─── Variables ──────────────────────────────────────────────────────────────

#[test]
fn variables_of_the_else_branch() {
    let items = complete(&[(
        "src.rego",
        "package src\n\nauthorize = \"allow\" {\n\tmsg := \"allow\"\n\ttrace(msg)\n} else = \"deny\" {\n\tms := \"deny\"\n\tms|\n}",
    )]);
    assert_eq!(labels(&items), ["ms"]);
    assert_eq!(items[0].kind, CompletionKind::Variable);
    assert_eq!(items[0].edit(), None);
}

#[test]
fn duplicate_variables_collapse() {
    let items = complete(&[(
        "main.rego",
        "package main\n\nviolation[msg] {\n\tmsg = \"hello\"\n\tms|\n}",
    )]);
    assert_eq!(labels(&items), ["msg"]);
}

#[test]
fn variables_bound_earlier_in_the_rule() {
    let items = complete(&[(
        "main.rego",
        "package main\n\nviolation[msg] {\n\tms := hoge(fuga)\n\tmessages[message]\n\tm|\n}",
    )]);
    let names = labels(&items);
    for expected in ["msg", "ms", "message"] {
        assert!(names.contains(&expected), "missing {expected} in {names:?}");
    }
    assert!(!names.contains(&"fuga"));
}

#[test]
fn empty_line_lists_variables_without_prefix() {
    let items = complete(&[(
        "main.rego",
        "package main\n\nviolation[msg] {\n\tmsg = \"hello\"\n|\n}",
    )]);
    assert_eq!(find(&items, "msg").kind, CompletionKind::Variable);
}

// ─── Package names ──────────────────────────────────────────────────────────

#[test]
fn imported_package_name() {
    let items = complete(&[(
        "main.rego",
        "package main\n\nimport data.lib\n\nviolation[msg] {\n\tl|\n}",
    )]);
    let lib = find(&items, "lib");
    assert_eq!(lib.kind, CompletionKind::Package);
    assert_eq!(lib.edit(), None);
    assert!(lib.extra_edits.is_empty());
}

#[test]
fn unimported_package_name_adds_import_after_package_clause() {
    let items = complete(&[
        ("main.rego", "package main\n\nviolation[msg] {\n\tl|\n}"),
        ("lib.rego", "package lib"),
    ]);
    let lib = find(&items, "lib");
    assert_eq!(lib.kind, CompletionKind::Package);
    assert_eq!(lib.edit(), Some(&edit(4, 2, "lib")));
    assert_eq!(lib.extra_edits, [edit(2, 1, "\nimport data.lib\n")]);
}

#[test]
fn unimported_package_name_adds_import_after_last_import() {
    let items = complete(&[
        (
            "main.rego",
            "package main\n\nimport data.hoge\n\nviolation[msg] {\n\tl|\n}",
        ),
        ("lib.rego", "package lib"),
    ]);
    let lib = find(&items, "lib");
    assert_eq!(lib.edit(), Some(&edit(6, 2, "lib")));
    assert_eq!(lib.extra_edits, [edit(4, 1, "import data.lib\n")]);
}

// ─── Rules ──────────────────────────────────────────────────────────────────

#[test]
fn rule_clauses_collapse_into_one_item() {
    let items = complete(&[(
        "src.rego",
        "package src\n\nfunc() {\n\tme|\n}\n\nmem_multiple(\"E\") = 1000000000000000000000\n\nmem_multiple(\"P\") = 1000000000000000000",
    )]);
    assert_eq!(labels(&items), ["mem_multiple"]);
    let item = &items[0];
    assert_eq!(item.kind, CompletionKind::Function);
    assert_eq!(item.edit(), Some(&edit(4, 2, "mem_multiple(\"E\")")));
    assert_eq!(
        item.detail.as_deref(),
        Some("mem_multiple(\"E\") = 1000000000000000000000\n\nmem_multiple(\"P\") = 1000000000000000000")
    );
}

#[test]
fn rules_in_the_same_file() {
    let items = complete(&[(
        "main.rego",
        "package main\n\nviolation [msg] {\n\ti|\n}\n\nis_hello(msg) {\n\tmsg == \"hello\"\n}",
    )]);
    let item = find(&items, "is_hello");
    assert_eq!(item.kind, CompletionKind::Function);
    assert_eq!(item.edit(), Some(&edit(4, 2, "is_hello(msg)")));
    assert_eq!(item.detail.as_deref(), Some("is_hello(msg) {\n\tmsg == \"hello\"\n}"));
    assert_eq!(item.snippet.as_deref(), Some("is_hello(${1:msg})"));
}

#[test]
fn rules_in_another_file_of_the_package() {
    let items = complete(&[
        ("main.rego", "package main\n\nviolation [msg] {\n\the|\n}"),
        ("other.rego", "package main\n\nhello(msg) {\n\tmsg == \"hello\"\n}"),
    ]);
    let item = find(&items, "hello");
    assert_eq!(item.edit(), Some(&edit(4, 2, "hello(msg)")));
    assert_eq!(item.detail.as_deref(), Some("hello(msg) {\n\tmsg == \"hello\"\n}"));
}

#[test]
fn rules_of_an_imported_package() {
    let items = complete(&[
        (
            "main.rego",
            "package main\n\nimport data.lib\n\nviolation [msg] {\n\tlib.i|\n}",
        ),
        ("lib.rego", "package lib\n\nis_hello(msg) {\n\tmsg == \"hello\"\n}"),
    ]);
    assert_eq!(labels(&items), ["is_hello"]);
    assert_eq!(items[0].edit(), Some(&edit(6, 6, "is_hello(msg)")));
}

#[test]
fn default_rule_is_a_variable() {
    let items = complete(&[(
        "src.rego",
        "package src\n\nviolation[msg] {\n\tis|\n}\n\ndefault is_test = true",
    )]);
    let item = find(&items, "is_test");
    assert_eq!(item.kind, CompletionKind::Variable);
    assert_eq!(item.edit(), Some(&edit(4, 2, "is_test")));
    assert_eq!(item.detail.as_deref(), Some("default is_test = true"));
    assert_eq!(item.snippet, None);
}

#[test]
fn partial_rule_completes_with_key() {
    let items = complete(&[(
        "src.rego",
        "package src\n\ndeny[msg] {\n\tmsg := \"no\"\n}\n\nallow {\n\tcount(d|) == 0\n}",
    )]);
    let item = find(&items, "deny");
    assert_eq!(item.kind, CompletionKind::Function);
    assert_eq!(item.edit(), Some(&edit(8, 8, "deny[msg]")));
    assert_eq!(item.snippet.as_deref(), Some("deny[${1:msg}]"));
}

// ─── Built-ins ──────────────────────────────────────────────────────────────

#[test]
fn builtins_by_full_name() {
    let items = complete(&[("main.rego", "package main\n\nviolation[msg] {\n\tj|\n}")]);
    let item = find(&items, "json.patch");
    let signature = "json.patch(any, array[object<op: string, path: any>[any: any]])";
    assert_eq!(item.kind, CompletionKind::BuiltinFunction);
    assert_eq!(item.detail, Some(format!("{signature}\n\n{BUILTIN_DETAIL}")));
    assert_eq!(item.edit(), Some(&edit(4, 2, signature)));
}

#[test]
fn builtins_of_a_namespace_by_short_name() {
    let items = complete(&[("main.rego", "package main\n\nviolation[msg] {\n\tjson.p|\n}")]);
    assert_eq!(labels(&items), ["patch"]);
    let item = &items[0];
    assert_eq!(
        item.detail,
        Some(format!(
            "json.patch(any, array[object<op: string, path: any>[any: any]])\n\n{BUILTIN_DETAIL}"
        ))
    );
    assert_eq!(
        item.edit(),
        Some(&edit(4, 7, "patch(any, array[object<op: string, path: any>[any: any]])"))
    );
    assert_eq!(
        item.snippet.as_deref(),
        Some("patch(${1:any}, ${2:array[object<op: string, path: any>[any: any]]})")
    );
}

#[test]
fn operators_are_not_offered() {
    let items = complete(&[("main.rego", "package main\n\nallow {\n\tpl|\n}")]);
    assert!(!labels(&items).contains(&"plus"));
}

// ─── Editing ────────────────────────────────────────────────────────────────

#[test]
fn dangling_selector_completes_members() {
    let cache = cache_with(&[
        ("main.rego", "package main\n\nimport data.lib\n\nviolation[msg] {\n\tlib\n}"),
        ("lib.rego", "package lib\n\nis_hello(msg) {\n\tmsg == \"hello\"\n}\n\nmax_size = 10"),
    ]);
    let edited = "package main\n\nimport data.lib\n\nviolation[msg] {\n\tlib.\n}";
    cache.put("main.rego", edited);
    let cursor = cursor_at("main.rego", edited, edited.find("lib.\n").unwrap() + "lib.".len());

    let items = CompletionResolver::new(&cache).resolve(&cursor);
    assert_eq!(labels(&items), ["is_hello", "max_size"]);
    assert_eq!(items[0].edit(), Some(&edit(6, 6, "is_hello(msg)")));
    assert_eq!(items[1].kind, CompletionKind::Variable);
}

#[test]
fn unknown_file_has_no_items() {
    let cache = cache_with(&[("a.rego", "package a")]);
    let cursor = SourceLocation::point("b.rego", 1, 1, 0);
    assert!(CompletionResolver::new(&cache).resolve(&cursor).is_empty());
}
