/// Import-statement insertion helpers.
///
/// Completing the name of a package the file has not imported yet also
/// inserts the `import` for it.  The new statement goes on the line after
/// the last existing import so it is grouped with the others, or right
/// after the `package` clause (separated by a blank line) when the file
/// has no imports yet.
use crate::completion::TextEdit;
use crate::syntax::{Module, package_ref};

/// The edit importing `package` into `module`.
pub(crate) fn import_edit(module: &Module, package: &[String]) -> TextEdit {
    let import = package_ref(package);
    match module.imports.iter().map(|imp| imp.location.row).max() {
        Some(last_row) => TextEdit {
            row: last_row + 1,
            col: 1,
            text: format!("import {import}\n"),
        },
        None => TextEdit {
            row: module.package.location.row + 1,
            col: 1,
            text: format!("\nimport {import}\n"),
        },
    }
}
