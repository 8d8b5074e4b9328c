/// Project-wide semantic checks.
///
/// These need every module in view at once: a call is only undefined if
/// no file of the target package declares the rule, and `default` rules
/// clash across files of one package.
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::syntax::ast::*;
use crate::syntax::builtins;
use crate::syntax::CompileError;

/// Names that are always in scope inside a rule body.
const GLOBALS: [&str; 3] = ["input", "data", "_"];

/// Run every check over `modules`, returning errors ordered by file and
/// offset.
pub fn compile(modules: &[Arc<Module>]) -> Vec<CompileError> {
    let project = Project::new(modules);
    let mut errors = Vec::new();

    for module in modules {
        for rule in &module.rules {
            for branch in rule.branches() {
                project.check_calls(module, branch, &mut errors);
                project.check_safety(module, branch, &mut errors);
            }
        }
    }
    project.check_defaults(&mut errors);

    errors.sort_by(|a, b| (&a.location.file, a.location.offset).cmp(&(&b.location.file, b.location.offset)));
    errors
}

struct Project<'m> {
    packages: BTreeMap<Vec<String>, Vec<&'m Module>>,
}

impl<'m> Project<'m> {
    fn new(modules: &'m [Arc<Module>]) -> Self {
        let mut packages: BTreeMap<Vec<String>, Vec<&'m Module>> = BTreeMap::new();
        for module in modules {
            packages.entry(module.package_path()).or_default().push(module);
        }
        Self { packages }
    }

    fn has_rule(&self, package: &[String], name: &str) -> bool {
        self.packages
            .get(package)
            .is_some_and(|modules| modules.iter().any(|m| m.rules.iter().any(|r| r.name == name)))
    }

    /// Resolve an imported name to `(package, rule)`.
    fn imported(module: &Module, root: &str, rest: &[String]) -> Option<(Vec<String>, String)> {
        let mut path = module.import_named(root)?.package_path()?;
        path.extend(rest.iter().cloned());
        let name = path.pop()?;
        Some((path, name))
    }

    fn is_defined_call(&self, module: &Module, operator: &Term) -> bool {
        if builtins::lookup(&operator.to_string()).is_some() {
            return true;
        }
        match &operator.kind {
            TermKind::Variable(name) => {
                self.has_rule(&module.package_path(), name)
                    || Self::imported(module, name, &[]).is_some_and(|(pkg, rule)| self.has_rule(&pkg, &rule))
            }
            TermKind::Reference(segments) => {
                let Some((root, rest)) = segments.split_first() else {
                    return true;
                };
                let Some(root) = root.as_variable() else {
                    return true;
                };
                let names: Option<Vec<String>> = rest.iter().map(|s| s.as_string().map(str::to_string)).collect();
                let Some(mut names) = names else {
                    // Dynamic selectors cannot be checked statically.
                    return true;
                };
                if root == "data" {
                    let Some(name) = names.pop() else {
                        return false;
                    };
                    return self.has_rule(&names, &name);
                }
                Self::imported(module, root, &names).is_some_and(|(pkg, rule)| self.has_rule(&pkg, &rule))
            }
            _ => true,
        }
    }

    fn check_calls(&self, module: &Module, rule: &Rule, errors: &mut Vec<CompileError>) {
        let mut visit = |term: &Term| {
            if let TermKind::Call { operator, .. } = &term.kind
                && !self.is_defined_call(module, operator)
            {
                errors.push(CompileError {
                    message: format!("undefined function {operator}"),
                    location: operator.location.clone(),
                });
            }
        };
        for term in rule.head_terms() {
            term.walk(&mut visit);
        }
        for expr in &rule.body {
            for term in expr.terms() {
                term.walk(&mut visit);
            }
            for modifier in &expr.with {
                modifier.value.walk(&mut visit);
            }
        }
    }

    /// Flags variables read in a rule that nothing in the rule binds.
    ///
    /// Deliberately lenient: every variable that could be an output
    /// (unification on either side, call arguments, reference selectors)
    /// counts as bound.
    fn check_safety(&self, module: &Module, rule: &Rule, errors: &mut Vec<CompileError>) {
        let mut bound: HashSet<&str> = HashSet::new();
        for term in rule.key.iter().chain(&rule.args) {
            collect_variables(term, &mut bound);
        }
        for term in rule.head_terms() {
            bind_nested(term, &mut bound);
        }
        bind_body(&rule.body, &mut bound);

        let mut used: Vec<&Term> = Vec::new();
        for term in rule.value.iter() {
            collect_reads(term, &mut used);
        }
        for expr in &rule.body {
            for term in expr.terms() {
                collect_reads(term, &mut used);
            }
            for modifier in &expr.with {
                collect_reads(&modifier.value, &mut used);
            }
        }

        let package = module.package_path();
        let mut reported: HashSet<&str> = HashSet::new();
        for var in used {
            let Some(name) = var.as_variable() else {
                continue;
            };
            if bound.contains(name)
                || GLOBALS.contains(&name)
                || reported.contains(name)
                || module.import_named(name).is_some()
                || self.has_rule(&package, name)
                || builtins::is_namespace(name)
            {
                continue;
            }
            reported.insert(name);
            errors.push(CompileError {
                message: format!("var {name} is unsafe"),
                location: var.location.clone(),
            });
        }
    }

    fn check_defaults(&self, errors: &mut Vec<CompileError>) {
        for (package, modules) in &self.packages {
            let mut seen: HashSet<&str> = HashSet::new();
            for module in modules {
                for rule in module.rules.iter().filter(|r| r.is_default) {
                    if !seen.insert(&rule.name) {
                        errors.push(CompileError {
                            message: format!("multiple default rules {}.{} found", package_ref(package), rule.name),
                            location: rule.location.clone(),
                        });
                    }
                }
            }
        }
    }
}

fn collect_variables<'t>(term: &'t Term, out: &mut HashSet<&'t str>) {
    term.walk(&mut |t: &'t Term| {
        if let Some(name) = t.as_variable() {
            out.insert(name);
        }
    });
}

/// Adds what the statements of a query bind, including the queries nested
/// in them.
fn bind_body<'t>(body: &'t [Expression], bound: &mut HashSet<&'t str>) {
    for expr in body {
        match &expr.kind {
            ExprKind::Infix { operator, left, right } if operator.binds() => {
                collect_variables(left, bound);
                if *operator == InfixOp::Unify {
                    collect_variables(right, bound);
                }
            }
            ExprKind::Some { bindings, .. } => {
                for binding in bindings {
                    collect_variables(binding, bound);
                }
            }
            ExprKind::Every { key, value, body, .. } => {
                for var in key.iter().chain([value]) {
                    collect_variables(var, bound);
                }
                bind_body(body, bound);
            }
            _ => {}
        }
        for term in expr.terms() {
            collect_outputs(term, bound);
            bind_nested(term, bound);
        }
    }
}

/// Adds what the comprehensions inside `term` bind.
fn bind_nested<'t>(term: &'t Term, bound: &mut HashSet<&'t str>) {
    term.walk(&mut |t: &'t Term| {
        if let TermKind::Comprehension { body, .. } = &t.kind {
            bind_body(body, bound);
        }
    });
}

/// Variables in positions that may be assigned during evaluation.
fn collect_outputs<'t>(term: &'t Term, out: &mut HashSet<&'t str>) {
    term.walk(&mut |t: &'t Term| match &t.kind {
        TermKind::Reference(segments) => {
            for segment in segments.iter().skip(1) {
                collect_variables(segment, out);
            }
        }
        TermKind::Call { args, .. } => {
            for arg in args {
                collect_variables(arg, out);
            }
        }
        _ => {}
    });
}

/// Variables that are read, skipping call operators.
fn collect_reads<'t>(term: &'t Term, out: &mut Vec<&'t Term>) {
    match &term.kind {
        TermKind::Variable(_) => out.push(term),
        TermKind::Literal(_) => {}
        TermKind::Call { args, .. } => {
            for arg in args {
                collect_reads(arg, out);
            }
        }
        _ => {
            for child in term.children() {
                collect_reads(child, out);
            }
        }
    }
}
