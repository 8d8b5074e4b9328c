use regols::FileCache;
use regols::syntax::RegoError;

#[test]
fn failed_parse_keeps_previous_module() {
    let cache = FileCache::new();
    cache.put("a.rego", "package a\n\nallow = true\n");
    cache.put("a.rego", "package a\n\nallow = \n");

    let policy = cache.get("a.rego").unwrap();
    assert_eq!(&*policy.raw_text, "package a\n\nallow = \n");
    assert_eq!(policy.parse_errors.len(), 1);
    let module = policy.module.unwrap();
    assert_eq!(module.rules[0].name, "allow");
    assert_eq!(&*module.source, "package a\n\nallow = true\n");
}

#[test]
fn successful_parse_clears_errors() {
    let cache = FileCache::new();
    cache.put("a.rego", "package a\n\nallow = \n");
    assert!(cache.get("a.rego").unwrap().module.is_none());

    cache.put("a.rego", "package a\n\nallow = true\n");
    let policy = cache.get("a.rego").unwrap();
    assert!(policy.parse_errors.is_empty());
    assert!(policy.module.is_some());
}

#[test]
fn lookup_by_package() {
    let cache = FileCache::new();
    cache.put("b.rego", "package lib\n\nb = 1\n");
    cache.put("a.rego", "package lib\n\na = 1\n");
    cache.put("main.rego", "package main\n\nallow = true\n");

    let files: Vec<String> = cache
        .find_modules_by_package(&["lib".to_string()])
        .iter()
        .map(|m| m.file.clone())
        .collect();
    assert_eq!(files, ["a.rego", "b.rego"]);
    assert_eq!(cache.packages(), [vec!["lib".to_string()], vec!["main".to_string()]]);
    assert_eq!(cache.paths(), ["a.rego", "b.rego", "main.rego"]);
}

#[test]
fn delete_forgets_the_file() {
    let cache = FileCache::new();
    cache.put("a.rego", "package a\n");
    assert!(cache.contains("a.rego"));
    cache.delete("a.rego");
    assert!(!cache.contains("a.rego"));
    assert!(cache.get("a.rego").is_none());
    assert!(cache.modules().is_empty());
}

#[test]
fn package_state() {
    let cache = FileCache::new();
    cache.put("empty.rego", "");
    cache.put("bare.rego", "allow = true");
    cache.put("ok.rego", "package ok\n");
    assert!(cache.get("empty.rego").unwrap().lacks_package());
    assert!(cache.get("bare.rego").unwrap().lacks_package());
    assert!(!cache.get("ok.rego").unwrap().lacks_package());

    // Deleting the clause from a file that used to parse.
    cache.put("ok.rego", "");
    assert!(cache.get("ok.rego").unwrap().lacks_package());
}

#[test]
fn parse_errors_take_precedence_over_compile_errors() {
    let cache = FileCache::new();
    cache.put("a.rego", "package a\n\nallow {\n\tx == 1\n}\n");
    let errors = cache.errors_for("a.rego");
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], RegoError::Compile(_)));

    cache.put("a.rego", "package a\n\nallow {\n\tinput.\n}\n");
    let errors = cache.errors_for("a.rego");
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], RegoError::Parse(_)));
}

#[test]
fn compile_errors_are_attributed_to_their_file() {
    let cache = FileCache::new();
    cache.put("main.rego", "package main\n\nimport data.lib\n\nallow {\n\tlib.check(input)\n}\n");
    cache.put("lib.rego", "package lib\n\nother(x) {\n\tx\n}\n");

    assert_eq!(cache.errors_for("main.rego").len(), 1);
    assert!(cache.errors_for("lib.rego").is_empty());
    assert!(cache.errors_for("missing.rego").is_empty());

    // Defining the rule in another file fixes the caller.
    cache.put("lib.rego", "package lib\n\ncheck(x) {\n\tx\n}\n");
    assert!(cache.errors_for("main.rego").is_empty());
}

#[test]
fn all_errors_covers_every_file() {
    let cache = FileCache::new();
    cache.put("bad.rego", "package bad\n\nallow {\n\tinput.\n}\n");
    cache.put("good.rego", "package good\n\nallow = true\n");
    cache.put("unsafe.rego", "package unsafe\n\nallow {\n\ty > 1\n}\n");

    let all = cache.all_errors();
    assert_eq!(all.len(), 3);
    assert_eq!(all["bad.rego"].len(), 1);
    assert!(all["good.rego"].is_empty());
    assert_eq!(all["unsafe.rego"][0].message(), "var y is unsafe");
    assert_eq!(all["unsafe.rego"][0].location().row, 4);
}
