//! Name resolution over the lowered syntax tree
//!
//! A recursive descent that carries the binding table by value into nested
//! scopes. Module and class bodies are flow ordered: a rebinding suppresses
//! attribution only for the statements after it. Function bodies follow
//! Python's rule that a name assigned anywhere in the body is local
//! throughout it, unless declared `global` or `nonlocal`.

use super::bindings::{package_for_module, Binding, ImportBindings, PackageFilter};
use super::syntax::{Expr, ExprKind, Param, Stmt, StmtKind, Target};
use crate::domain::{UsageKind, UsageSite};
use std::collections::HashSet;
use std::path::Path;

/// Resolves every reference to an imported package in one parsed file
pub fn resolve_usages(
    file: &Path,
    source: &str,
    module: &[Stmt],
    filter: &PackageFilter,
) -> Vec<UsageSite> {
    let mut resolver = Resolver {
        file,
        lines: source.lines().collect(),
        filter,
        usages: Vec::new(),
    };
    let mut table = ImportBindings::new();
    resolver.prebind_imports(module, &mut table);
    let declared = HashSet::new();
    let ctx = ScopeCtx {
        declared: &declared,
        class_outer: None,
    };
    resolver.walk_block(module, &mut table, ctx);
    resolver.usages
}

#[derive(Clone, Copy)]
struct ScopeCtx<'s> {
    /// Names declared `global`/`nonlocal` in the enclosing function
    declared: &'s HashSet<String>,
    /// Inside a class body: the table functions defined there can see
    class_outer: Option<&'s ImportBindings>,
}

struct Resolver<'a> {
    file: &'a Path,
    lines: Vec<&'a str>,
    filter: &'a PackageFilter,
    usages: Vec<UsageSite>,
}

impl Resolver<'_> {
    fn record(&mut self, line: usize, symbol: String, package: &str, kind: UsageKind) {
        let context = line
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(|l| l.trim().to_string())
            .unwrap_or_default();
        self.usages.push(UsageSite {
            file: self.file.to_path_buf(),
            line,
            symbol,
            bound_package: package.to_string(),
            context,
            kind,
        });
    }

    /// Binds imports reachable without entering a def or class body
    fn prebind_imports(&mut self, stmts: &[Stmt], table: &mut ImportBindings) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Import(_) | StmtKind::FromImport { .. } => {
                    self.apply_import(stmt, table, false)
                }
                _ => {
                    for body in nested_bodies(stmt) {
                        self.prebind_imports(body, table);
                    }
                }
            }
        }
    }

    fn apply_import(&mut self, stmt: &Stmt, table: &mut ImportBindings, record: bool) {
        match &stmt.kind {
            StmtKind::Import(names) => {
                for alias in names {
                    let top = alias.name.split('.').next().unwrap_or(&alias.name);
                    let package = package_for_module(top);
                    if !self.filter.accepts(&package) {
                        table.unbind(alias.local_name());
                        continue;
                    }
                    let symbol = match alias.alias {
                        Some(_) => alias.name.clone(),
                        None => top.to_string(),
                    };
                    table.bind(
                        alias.local_name(),
                        Binding {
                            package: package.clone(),
                            symbol,
                        },
                    );
                    if record {
                        self.record(alias.line, alias.name.clone(), &package, UsageKind::Import);
                    }
                }
            }
            StmtKind::FromImport {
                module,
                level,
                names,
                wildcard,
            } => {
                let top = module.split('.').next().unwrap_or(module);
                let package = package_for_module(top);
                if *level > 0 || module.is_empty() || !self.filter.accepts(&package) {
                    for alias in names {
                        table.unbind(alias.local_name());
                    }
                    return;
                }
                if *wildcard && record {
                    self.record(stmt.line, format!("{}.*", module), &package, UsageKind::Import);
                }
                for alias in names {
                    table.bind(
                        alias.local_name(),
                        Binding {
                            package: package.clone(),
                            symbol: alias.name.clone(),
                        },
                    );
                    if record {
                        self.record(
                            alias.line,
                            format!("{}.{}", module, alias.name),
                            &package,
                            UsageKind::Import,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    fn unbind(&self, name: &str, table: &mut ImportBindings, ctx: ScopeCtx<'_>) {
        if !ctx.declared.contains(name) {
            table.unbind(name);
        }
    }

    /// Reads inside a target, then drops the names it binds
    fn bind_target(&mut self, target: &Target, table: &mut ImportBindings, ctx: ScopeCtx<'_>) {
        match target {
            Target::Name(name) => self.unbind(name, table, ctx),
            Target::Tuple(items) => {
                for item in items {
                    self.bind_target(item, table, ctx);
                }
            }
            Target::Expr(expr) => self.walk_expr(expr, table),
        }
    }

    /// Walks statement-level expressions; walrus targets rebind afterwards
    fn walk_exprs<'e>(
        &mut self,
        exprs: impl IntoIterator<Item = &'e Expr>,
        table: &mut ImportBindings,
        ctx: ScopeCtx<'_>,
    ) {
        let mut walrus = Vec::new();
        for expr in exprs {
            self.walk_expr(expr, table);
            collect_walrus(expr, &mut walrus);
        }
        for name in walrus {
            self.unbind(&name, table, ctx);
        }
    }

    fn walk_block(&mut self, stmts: &[Stmt], table: &mut ImportBindings, ctx: ScopeCtx<'_>) {
        for stmt in stmts {
            self.walk_stmt(stmt, table, ctx);
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt, table: &mut ImportBindings, ctx: ScopeCtx<'_>) {
        match &stmt.kind {
            StmtKind::Import(_) | StmtKind::FromImport { .. } => {
                self.apply_import(stmt, table, true)
            }
            StmtKind::Assign {
                targets,
                value,
                annotation,
            } => {
                self.walk_exprs(annotation.iter().chain(value.iter()), table, ctx);
                for target in targets {
                    self.bind_target(target, table, ctx);
                }
            }
            StmtKind::FunctionDef {
                name,
                decorators,
                params,
                returns,
                body,
            } => {
                self.walk_exprs(decorators, table, ctx);
                self.walk_params(params, table);
                if let Some(returns) = returns {
                    self.walk_expr(returns, table);
                }
                let outer = ctx.class_outer.unwrap_or(table);
                let (mut inner, declared) = self.function_scope(outer, params, body);
                let inner_ctx = ScopeCtx {
                    declared: &declared,
                    class_outer: None,
                };
                self.walk_block(body, &mut inner, inner_ctx);
                self.unbind(name, table, ctx);
            }
            StmtKind::ClassDef {
                name,
                decorators,
                bases,
                body,
            } => {
                self.walk_exprs(decorators.iter().chain(bases.iter()), table, ctx);
                let visible = ctx.class_outer.unwrap_or(table).clone();
                let mut class_table = table.clone();
                let no_decls = HashSet::new();
                let class_ctx = ScopeCtx {
                    declared: &no_decls,
                    class_outer: Some(&visible),
                };
                self.walk_block(body, &mut class_table, class_ctx);
                self.unbind(name, table, ctx);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.walk_exprs([iter], table, ctx);
                let mut looped = table.clone();
                self.bind_target(target, &mut looped, ctx);
                self.walk_block(body, &mut looped, ctx);
                self.walk_block(orelse, &mut looped, ctx);
                table.merge(&looped);
            }
            StmtKind::With { items, body } => {
                for (expr, target) in items {
                    self.walk_exprs([expr], table, ctx);
                    if let Some(target) = target {
                        self.bind_target(target, table, ctx);
                    }
                }
                self.walk_block(body, table, ctx);
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let mut result = table.clone();
                self.walk_block(body, &mut result, ctx);
                let mut handler_entry = table.clone();
                handler_entry.merge(&result);
                self.walk_block(orelse, &mut result, ctx);
                for handler in handlers {
                    let mut handled = handler_entry.clone();
                    if let Some(kind) = &handler.kind {
                        self.walk_expr(kind, &handled);
                    }
                    if let Some(name) = &handler.name {
                        self.unbind(name, &mut handled, ctx);
                    }
                    self.walk_block(&handler.body, &mut handled, ctx);
                    result.merge(&handled);
                }
                self.walk_block(finalbody, &mut result, ctx);
                *table = result;
            }
            StmtKind::Branch {
                tests,
                bodies,
                exhaustive,
            } => {
                self.walk_exprs(tests, table, ctx);
                let mut joined = (!exhaustive || bodies.is_empty()).then(|| table.clone());
                for body in bodies {
                    let mut branch = table.clone();
                    self.walk_block(body, &mut branch, ctx);
                    match joined.as_mut() {
                        Some(j) => j.merge(&branch),
                        None => joined = Some(branch),
                    }
                }
                if let Some(joined) = joined {
                    *table = joined;
                }
            }
            StmtKind::Global(_) | StmtKind::Nonlocal(_) => {}
            StmtKind::Delete(targets) => {
                for target in targets {
                    self.bind_target(target, table, ctx);
                }
            }
            StmtKind::Expr(exprs) => self.walk_exprs(exprs, table, ctx),
        }
    }

    /// Defaults and annotations evaluate in the enclosing scope
    fn walk_params(&mut self, params: &[Param], table: &ImportBindings) {
        for param in params {
            if let Some(annotation) = &param.annotation {
                self.walk_expr(annotation, table);
            }
            if let Some(default) = &param.default {
                self.walk_expr(default, table);
            }
        }
    }

    /// Table seen on entry to a function body
    fn function_scope(
        &mut self,
        outer: &ImportBindings,
        params: &[Param],
        body: &[Stmt],
    ) -> (ImportBindings, HashSet<String>) {
        let mut declared = HashSet::new();
        collect_declared(body, &mut declared);

        let mut locals: Vec<String> = params.iter().filter_map(|p| p.name.clone()).collect();
        collect_locals(body, &mut locals);

        let mut table = outer.clone();
        for name in locals.iter().filter(|n| !declared.contains(*n)) {
            table.unbind(name);
        }
        self.prebind_imports(body, &mut table);
        (table, declared)
    }

    fn walk_expr(&mut self, expr: &Expr, table: &ImportBindings) {
        match &expr.kind {
            ExprKind::Name(name) => {
                if let Some(binding) = table.get(name) {
                    let (symbol, package) = (binding.symbol.clone(), binding.package.clone());
                    self.record(expr.line, symbol, &package, UsageKind::Name);
                }
            }
            ExprKind::Attribute { value, .. } => {
                if !self.record_chain(expr, table, UsageKind::Attribute) && chain(expr).is_none() {
                    self.walk_expr(value, table);
                }
            }
            ExprKind::Call { func, args } => {
                if !self.record_chain(func, table, UsageKind::Call) {
                    self.walk_expr(func, table);
                }
                for arg in args {
                    self.walk_expr(arg, table);
                }
            }
            ExprKind::Lambda { params, body } => {
                self.walk_params(params, table);
                let mut inner = table.clone();
                for name in params.iter().filter_map(|p| p.name.as_deref()) {
                    inner.unbind(name);
                }
                self.walk_expr(body, &inner);
            }
            ExprKind::Comprehension {
                generators,
                elements,
            } => {
                let mut inner = table.clone();
                for (i, generator) in generators.iter().enumerate() {
                    let scope = if i == 0 { table } else { &inner };
                    self.walk_expr(&generator.iter, scope);
                    let mut names = Vec::new();
                    generator.target.bound_names(&mut names);
                    for name in &names {
                        inner.unbind(name);
                    }
                    for cond in &generator.conds {
                        self.walk_expr(cond, &inner);
                    }
                }
                for element in elements {
                    self.walk_expr(element, &inner);
                }
            }
            ExprKind::NamedExpr { value, .. } => self.walk_expr(value, table),
            ExprKind::Other(children) => {
                for child in children {
                    self.walk_expr(child, table);
                }
            }
        }
    }

    /// Records a name/attribute chain rooted at a bound name as one usage
    fn record_chain(&mut self, expr: &Expr, table: &ImportBindings, kind: UsageKind) -> bool {
        let Some((root, attrs)) = chain(expr) else {
            return false;
        };
        let Some(binding) = table.get(root) else {
            return false;
        };
        let mut symbol = binding.symbol.clone();
        for attr in attrs {
            symbol.push('.');
            symbol.push_str(attr);
        }
        let package = binding.package.clone();
        self.record(expr.line, symbol, &package, kind);
        true
    }
}

/// Splits `a.b.c` into its root name and attribute path
fn chain(expr: &Expr) -> Option<(&str, Vec<&str>)> {
    match &expr.kind {
        ExprKind::Name(name) => Some((name, Vec::new())),
        ExprKind::Attribute { value, attr } => {
            let (root, mut attrs) = chain(value)?;
            attrs.push(attr);
            Some((root, attrs))
        }
        _ => None,
    }
}

/// Statement bodies that share the enclosing scope
fn nested_bodies(stmt: &Stmt) -> Vec<&[Stmt]> {
    match &stmt.kind {
        StmtKind::For { body, orelse, .. } => vec![body, orelse],
        StmtKind::With { body, .. } => vec![body],
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            let mut bodies: Vec<&[Stmt]> = vec![body, orelse, finalbody];
            bodies.extend(handlers.iter().map(|h| h.body.as_slice()));
            bodies
        }
        StmtKind::Branch { bodies, .. } => bodies.iter().map(Vec::as_slice).collect(),
        _ => Vec::new(),
    }
}

fn collect_declared(stmts: &[Stmt], out: &mut HashSet<String>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Global(names) | StmtKind::Nonlocal(names) => {
                out.extend(names.iter().cloned())
            }
            _ => {
                for body in nested_bodies(stmt) {
                    collect_declared(body, out);
                }
            }
        }
    }
}

/// Names a function body binds locally, excluding nested def/class bodies
fn collect_locals(stmts: &[Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Import(names) | StmtKind::FromImport { names, .. } => {
                out.extend(names.iter().map(|n| n.local_name().to_string()))
            }
            StmtKind::Assign {
                targets, value, ..
            } => {
                targets.iter().for_each(|t| t.bound_names(out));
                if let Some(value) = value {
                    collect_walrus(value, out);
                }
            }
            StmtKind::FunctionDef { name, .. } | StmtKind::ClassDef { name, .. } => {
                out.push(name.clone())
            }
            StmtKind::For { target, iter, .. } => {
                target.bound_names(out);
                collect_walrus(iter, out);
            }
            StmtKind::With { items, .. } => {
                for (expr, target) in items {
                    collect_walrus(expr, out);
                    if let Some(target) = target {
                        target.bound_names(out);
                    }
                }
            }
            StmtKind::Try { handlers, .. } => {
                out.extend(handlers.iter().filter_map(|h| h.name.clone()))
            }
            StmtKind::Branch { tests, .. } => tests.iter().for_each(|t| collect_walrus(t, out)),
            StmtKind::Delete(targets) => targets.iter().for_each(|t| t.bound_names(out)),
            StmtKind::Expr(exprs) => exprs.iter().for_each(|e| collect_walrus(e, out)),
            StmtKind::Global(_) | StmtKind::Nonlocal(_) => {}
        }
        for body in nested_bodies(stmt) {
            collect_locals(body, out);
        }
    }
}

/// Walrus targets bind in the enclosing function, even inside comprehensions
fn collect_walrus(expr: &Expr, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::NamedExpr { target, value } => {
            out.push(target.clone());
            collect_walrus(value, out);
        }
        ExprKind::Name(_) | ExprKind::Lambda { .. } => {}
        ExprKind::Attribute { value, .. } => collect_walrus(value, out),
        ExprKind::Call { func, args } => {
            collect_walrus(func, out);
            args.iter().for_each(|a| collect_walrus(a, out));
        }
        ExprKind::Comprehension {
            generators,
            elements,
        } => {
            for generator in generators {
                collect_walrus(&generator.iter, out);
                generator.conds.iter().for_each(|c| collect_walrus(c, out));
            }
            elements.iter().for_each(|e| collect_walrus(e, out));
        }
        ExprKind::Other(children) => children.iter().for_each(|c| collect_walrus(c, out)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::syntax::parse_module;

    fn scan_with(source: &str, filter: &PackageFilter) -> Vec<UsageSite> {
        let path = Path::new("app.py");
        let module = parse_module(path, source).unwrap();
        resolve_usages(path, source, &module, filter)
    }

    fn scan(source: &str) -> Vec<UsageSite> {
        scan_with(source, &PackageFilter::all())
    }

    fn non_import(usages: &[UsageSite]) -> Vec<(usize, String, UsageKind)> {
        usages
            .iter()
            .filter(|u| u.kind != UsageKind::Import)
            .map(|u| (u.line, u.symbol.clone(), u.kind))
            .collect()
    }

    #[test]
    fn test_from_import_call() {
        let usages = scan("from flask import Flask\napp = Flask(__name__)\n");
        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].symbol, "flask.Flask");
        assert_eq!(usages[0].kind, UsageKind::Import);
        assert_eq!(usages[1].symbol, "Flask");
        assert_eq!(usages[1].bound_package, "flask");
        assert_eq!(usages[1].line, 2);
        assert_eq!(usages[1].context, "app = Flask(__name__)");
        assert_eq!(usages[1].kind, UsageKind::Call);
    }

    #[test]
    fn test_longest_chain_recorded_once() {
        let usages = scan("import requests\nresp = requests.get(url)\n");
        assert_eq!(
            non_import(&usages),
            vec![(2, "requests.get".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_import_alias() {
        let usages = scan("import numpy as np\nx = np.linalg.norm(v)\n");
        let found = non_import(&usages);
        assert_eq!(found, vec![(2, "numpy.linalg.norm".to_string(), UsageKind::Call)]);
        assert!(usages.iter().all(|u| u.bound_package == "numpy"));
    }

    #[test]
    fn test_dotted_import_alias() {
        let usages = scan("import a.b as x\nx.c()\n");
        assert_eq!(non_import(&usages), vec![(2, "a.b.c".to_string(), UsageKind::Call)]);
    }

    #[test]
    fn test_dotted_import_binds_top_level() {
        let usages = scan("import os.path\nos.path.join('a')\n");
        assert_eq!(usages[0].symbol, "os.path");
        assert_eq!(
            non_import(&usages),
            vec![(2, "os.path.join".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_attribute_and_name_usages() {
        let usages = scan("import requests\nerr = requests.exceptions.HTTPError\nf(requests)\n");
        assert_eq!(
            non_import(&usages),
            vec![
                (2, "requests.exceptions.HTTPError".to_string(), UsageKind::Attribute),
                (3, "requests".to_string(), UsageKind::Name),
            ]
        );
    }

    #[test]
    fn test_call_result_attribute() {
        let usages = scan("import requests\nrequests.Session().get(url)\n");
        assert_eq!(
            non_import(&usages),
            vec![(2, "requests.Session".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_parameter_shadows_import() {
        let src = "import requests\ndef f(requests):\n    return requests.get()\n";
        assert!(non_import(&scan(src)).is_empty());
    }

    #[test]
    fn test_assignment_anywhere_in_function_is_local() {
        let src = "import requests\ndef f():\n    requests.get()\n    requests = None\n";
        assert!(non_import(&scan(src)).is_empty());
    }

    #[test]
    fn test_global_keeps_outer_binding() {
        let src = "import requests\ndef f():\n    global requests\n    requests.get()\n    requests = None\n";
        assert_eq!(
            non_import(&scan(src)),
            vec![(4, "requests.get".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_nonlocal_keeps_enclosing_binding() {
        let src = "def outer():\n    import requests\n    def inner():\n        nonlocal requests\n        requests.get()\n        requests = 1\n    return inner\n";
        assert_eq!(
            non_import(&scan(src)),
            vec![(5, "requests.get".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_module_reassignment_is_flow_ordered() {
        let src = "import requests\nrequests.get(a)\nrequests = None\nrequests.get(b)\n";
        assert_eq!(
            non_import(&scan(src)),
            vec![(2, "requests.get".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_function_defined_before_import_sees_it() {
        let src = "def f():\n    return requests.get()\n\nimport requests\n";
        assert_eq!(
            non_import(&scan(src)),
            vec![(2, "requests.get".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_function_level_import() {
        let src = "def f():\n    import yaml\n    return yaml.safe_load(s)\n\nyaml.dump(x)\n";
        let usages = scan(src);
        assert_eq!(
            non_import(&usages),
            vec![(3, "yaml.safe_load".to_string(), UsageKind::Call)]
        );
        assert!(usages.iter().all(|u| u.bound_package == "pyyaml"));
    }

    #[test]
    fn test_comprehension_variable_shadows() {
        let src = "import json\nout = [json for json in items]\nall(json.loads(x) for x in xs)\n";
        assert_eq!(
            non_import(&scan(src)),
            vec![(3, "json.loads".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_lambda_parameter_shadows() {
        let src = "import json\nf = lambda json: json.dumps(1)\ng = lambda x: json.dumps(x)\n";
        assert_eq!(
            non_import(&scan(src)),
            vec![(3, "json.dumps".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_for_with_except_targets_shadow() {
        let src = "import json\ndef f():\n    for json in xs:\n        json.x()\n\ndef g():\n    with open(p) as json:\n        json.read()\n\ndef h():\n    try:\n        pass\n    except Exception as json:\n        json.args\n";
        assert!(non_import(&scan(src)).is_empty());
    }

    #[test]
    fn test_nested_def_and_class_names_shadow() {
        let src = "import json\ndef f():\n    def json():\n        pass\n    return json()\n";
        assert!(non_import(&scan(src)).is_empty());
    }

    #[test]
    fn test_method_does_not_see_class_scope() {
        let src = "import requests\nclass A:\n    requests = None\n    x = requests\n    def m(self):\n        return requests.get()\n";
        assert_eq!(
            non_import(&scan(src)),
            vec![(6, "requests.get".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_decorators_and_bases_use_enclosing_scope() {
        let src = "import click\nimport attr\n@click.command()\ndef main():\n    pass\nclass C(attr.Base):\n    pass\n";
        assert_eq!(
            non_import(&scan(src)),
            vec![
                (3, "click.command".to_string(), UsageKind::Call),
                (6, "attr.Base".to_string(), UsageKind::Attribute),
            ]
        );
    }

    #[test]
    fn test_branches_union_bindings() {
        let src = "if fast:\n    import ujson as json\nelse:\n    json = None\njson.dumps(x)\n";
        let usages = non_import(&scan(src));
        assert_eq!(usages, vec![(5, "ujson.dumps".to_string(), UsageKind::Call)]);
    }

    #[test]
    fn test_try_import_fallback() {
        let src = "try:\n    import simplejson as json\nexcept ImportError:\n    import json\njson.loads(s)\n";
        let usages = scan(src);
        let calls: Vec<_> = usages.iter().filter(|u| u.kind == UsageKind::Call).collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].line, 5);
    }

    #[test]
    fn test_relative_import_binds_nothing() {
        let src = "from . import requests\nfrom .models import User\nrequests.get()\nUser()\n";
        assert!(scan(src).is_empty());
    }

    #[test]
    fn test_wildcard_import_records_import_only() {
        let usages = scan("from os.path import *\njoin('a')\n");
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].symbol, "os.path.*");
        assert_eq!(usages[0].bound_package, "os");
    }

    #[test]
    fn test_from_submodule_import() {
        let usages = scan("from google.cloud import storage\nstorage.Client()\n");
        assert_eq!(usages[0].symbol, "google.cloud.storage");
        assert_eq!(usages[0].bound_package, "google");
        assert_eq!(
            non_import(&usages),
            vec![(2, "storage.Client".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_filter_drops_other_packages() {
        let filter = PackageFilter::only(["flask"]);
        let usages = scan_with("import requests\nimport flask\nrequests.get()\nflask.Flask()\n", &filter);
        assert!(usages.iter().all(|u| u.bound_package == "flask"));
        assert_eq!(usages.len(), 2);
    }

    #[test]
    fn test_filtered_import_still_rebinds() {
        let filter = PackageFilter::only(["flask"]);
        let src = "import flask\nimport other as flask\nflask.Flask()\n";
        let usages = scan_with(src, &filter);
        assert!(non_import(&usages).is_empty());
    }

    #[test]
    fn test_keyword_argument_name_is_not_a_usage() {
        let usages = scan("import requests\nf(requests=1)\n");
        assert!(non_import(&usages).is_empty());
    }

    #[test]
    fn test_walrus_rebinds_at_module_level() {
        let src = "import json\nif (json := load()):\n    pass\njson.dumps(1)\n";
        assert!(non_import(&scan(src)).is_empty());
    }

    #[test]
    fn test_multiline_call_uses_start_line() {
        let src = "import requests\nrequests.post(\n    url,\n    json=requests.compat.x,\n)\n";
        assert_eq!(
            non_import(&scan(src)),
            vec![
                (2, "requests.post".to_string(), UsageKind::Call),
                (4, "requests.compat.x".to_string(), UsageKind::Attribute),
            ]
        );
    }

    #[test]
    fn test_del_unbinds_import() {
        let src = "import requests
requests.get(u)
del requests
requests.get(u)
";
        assert_eq!(
            non_import(&scan(src)),
            vec![(2, "requests.get".to_string(), UsageKind::Call)]
        );
    }

    #[test]
    fn test_del_attribute_reads_and_keeps_binding() {
        let src = "import requests
del requests.adapters, other
requests.get(u)
";
        assert_eq!(
            non_import(&scan(src)),
            vec![
                (2, "requests.adapters".to_string(), UsageKind::Attribute),
                (3, "requests.get".to_string(), UsageKind::Call),
            ]
        );
    }

    #[test]
    fn test_del_in_function_makes_name_local() {
        let src = "import requests

def f():
    requests.get(u)
    del requests
";
        assert!(non_import(&scan(src)).is_empty());
    }

    #[test]
    fn test_long_operator_chain_is_flattened() {
        let terms = vec!["1"; 5000].join(" + ");
        let src = format!("import requests
x = {} + requests.x
ok = a and b and requests.y
", terms);
        assert_eq!(
            non_import(&scan(&src)),
            vec![
                (2, "requests.x".to_string(), UsageKind::Attribute),
                (3, "requests.y".to_string(), UsageKind::Attribute),
            ]
        );
    }
}
