use std::fs;
use std::path::Path;

use regols::config::{Config, WORKSPACE_CONFIG};
use regols::workspace::{index_workspace, is_policy_file};
use regols::FileCache;

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn key(root: &Path, relative: &str) -> String {
    root.join(relative).to_string_lossy().into_owned()
}

#[test]
fn test_policy_files_are_recognised_by_extension() {
    assert!(is_policy_file(Path::new("/work/policy.rego")));
    assert!(!is_policy_file(Path::new("/work/policy.rego.bak")));
    assert!(!is_policy_file(Path::new("/work/rego")));
    assert!(!is_policy_file(Path::new("/work/data.json")));
}

#[test]
fn test_index_loads_nested_policies() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let root = dir.path();
    write(root, "main.rego", "package main\n\nallow = true\n");
    write(root, "lib/strings.rego", "package lib.strings\n\nupper(s) = s\n");
    write(root, "README.md", "# policies\n");
    write(root, "data.json", "{}\n");

    let cache = FileCache::new();
    let indexed = index_workspace(&cache, root, &Config::default());

    assert_eq!(indexed, 2);
    assert!(cache.contains(&key(root, "main.rego")));
    assert!(cache.contains(&key(root, "lib/strings.rego")));
    assert_eq!(cache.packages().len(), 2);
}

#[test]
fn test_index_honours_gitignore_without_git() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let root = dir.path();
    write(root, ".gitignore", "build/\n");
    write(root, "main.rego", "package main\n");
    write(root, "build/generated.rego", "package generated\n");

    let cache = FileCache::new();
    assert_eq!(index_workspace(&cache, root, &Config::default()), 1);
    assert!(!cache.contains(&key(root, "build/generated.rego")));
}

#[test]
fn test_index_skips_excluded_paths() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let root = dir.path();
    write(root, "main.rego", "package main\n");
    write(root, "vendor/opa/lib.rego", "package opa\n");

    let config = Config::parse("[workspace]\nexclude = [\"vendor\"]\n").unwrap();
    let cache = FileCache::new();
    assert_eq!(index_workspace(&cache, root, &config), 1);
    assert!(!cache.contains(&key(root, "vendor/opa/lib.rego")));
}

#[test]
fn test_index_keeps_open_documents() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let root = dir.path();
    write(root, "main.rego", "package main\n\nallow = true\n");

    let cache = FileCache::new();
    let open = key(root, "main.rego");
    cache.put(&open, "package edited\n");

    assert_eq!(index_workspace(&cache, root, &Config::default()), 0);
    assert_eq!(&*cache.get(&open).unwrap().raw_text, "package edited\n");
}

#[test]
fn test_broken_policies_are_indexed_with_their_errors() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let root = dir.path();
    write(root, "broken.rego", "package broken\n\nallow {\n\tinput.\n}\n");

    let cache = FileCache::new();
    assert_eq!(index_workspace(&cache, root, &Config::default()), 1);
    assert_eq!(cache.errors_for(&key(root, "broken.rego")).len(), 1);
}

#[test]
fn test_workspace_config_file_is_found() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let root = dir.path();
    write(root, WORKSPACE_CONFIG, "log_level = \"regols=debug\"\n\n[completion]\nsnippets = false\n");

    let config = Config::load(None, Some(root));
    assert_eq!(config.log_level.as_deref(), Some("regols=debug"));
    assert!(!config.completion.snippets);
    assert!(config.workspace.index_on_start);
}

#[test]
fn test_explicit_config_wins_over_workspace_file() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let root = dir.path();
    write(root, WORKSPACE_CONFIG, "[completion]\nsnippets = false\n");
    write(root, "custom.toml", "[workspace]\nindex_on_start = false\n");

    let config = Config::load(Some(&root.join("custom.toml")), Some(root));
    assert!(!config.workspace.index_on_start);
    assert!(config.completion.snippets);
}

#[test]
fn test_malformed_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let root = dir.path();
    write(root, WORKSPACE_CONFIG, "[workspace\nindex_on_start = nope\n");

    assert_eq!(Config::load(None, Some(root)), Config::default());
}
