//! Lowering of tree-sitter Python trees into a small tagged syntax tree
//!
//! Only the shapes that affect name binding are kept as dedicated variants.
//! Every other node is reduced to its nested expressions so that references
//! inside it are still visited by the resolver.

use crate::error::ScanError;
use std::path::Path;
use tree_sitter::{Node, Parser};

/// Deepest nesting the lowering and resolver descend into.
///
/// Same-kind operator chains (`a + b + c`, `x and y and z`) are flattened
/// and count as one level.
pub const MAX_NESTING_DEPTH: usize = 200;

/// Operators whose chains are lowered into a single flat node
const CHAIN_KINDS: &[&str] = &["binary_operator", "boolean_operator"];

fn is_chain(kind: &str) -> bool {
    CHAIN_KINDS.contains(&kind)
}

/// One name in an `import` or `from ... import` statement
#[derive(Debug, Clone, PartialEq)]
pub struct ImportAlias {
    /// Dotted module path (`import`) or imported name (`from`)
    pub name: String,
    pub alias: Option<String>,
    pub line: usize,
}

impl ImportAlias {
    /// Local name the import binds
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

/// Function or lambda parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
}

/// Left-hand side of an assignment, `for` target or `as` clause
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Tuple(Vec<Target>),
    /// Attribute or subscript target; read, never bound
    Expr(Expr),
}

impl Target {
    /// Collects the plain names this target binds
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match self {
            Target::Name(name) => out.push(name.clone()),
            Target::Tuple(items) => items.iter().for_each(|t| t.bound_names(out)),
            Target::Expr(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Handler {
    pub kind: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

/// `for target in iter if cond` part of a comprehension
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub target: Target,
    pub iter: Expr,
    pub conds: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub line: usize,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Import(Vec<ImportAlias>),
    FromImport {
        module: String,
        /// Number of leading dots; 0 for absolute imports
        level: usize,
        names: Vec<ImportAlias>,
        wildcard: bool,
    },
    Assign {
        targets: Vec<Target>,
        value: Option<Expr>,
        annotation: Option<Expr>,
    },
    FunctionDef {
        name: String,
        decorators: Vec<Expr>,
        params: Vec<Param>,
        returns: Option<Expr>,
        body: Vec<Stmt>,
    },
    ClassDef {
        name: String,
        decorators: Vec<Expr>,
        bases: Vec<Expr>,
        body: Vec<Stmt>,
    },
    For {
        target: Target,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    With {
        items: Vec<(Expr, Option<Target>)>,
        body: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<Handler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    /// `if`/`while`/`match` and other compound statements: alternative bodies
    Branch {
        tests: Vec<Expr>,
        bodies: Vec<Vec<Stmt>>,
        /// True when one of the bodies always runs (`if` with `else`)
        exhaustive: bool,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    /// `del` targets; plain names are unbound
    Delete(Vec<Target>),
    Expr(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub line: usize,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
    },
    Comprehension {
        generators: Vec<Generator>,
        elements: Vec<Expr>,
    },
    NamedExpr {
        target: String,
        value: Box<Expr>,
    },
    Other(Vec<Expr>),
}

impl Expr {
    fn other(line: usize, children: Vec<Expr>) -> Self {
        Expr {
            line,
            kind: ExprKind::Other(children),
        }
    }
}

/// Parses Python source and lowers it to statements
pub fn parse_module(path: &Path, source: &str) -> Result<Vec<Stmt>, ScanError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ScanError::Grammar {
            message: e.to_string(),
        })?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ScanError::syntax_error(path, 1))?;
    let root = tree.root_node();
    if let Some(line) = too_deep_at(root, MAX_NESTING_DEPTH) {
        return Err(ScanError::too_deep(path, line, MAX_NESTING_DEPTH));
    }
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(1);
        return Err(ScanError::syntax_error(path, line));
    }

    let lowering = Lowering {
        source: source.as_bytes(),
    };
    Ok(lowering.statements(root))
}

/// Line of some node nested deeper than `limit`, walking iteratively
fn too_deep_at(root: Node, limit: usize) -> Option<usize> {
    let mut stack = vec![(root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        if depth > limit {
            return Some(line_of(node));
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let flattened = is_chain(child.kind()) && child.kind() == node.kind();
            stack.push((child, if flattened { depth } else { depth + 1 }));
        }
    }
    None
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(line_of(node));
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error_line)
}

fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

struct Lowering<'a> {
    source: &'a [u8],
}

impl Lowering<'_> {
    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    /// Lowers the statements directly under a module or block node
    fn statements(&self, node: Node) -> Vec<Stmt> {
        named_children(node)
            .into_iter()
            .filter_map(|child| self.statement(child))
            .collect()
    }

    fn block_field(&self, node: Node, field: &str) -> Vec<Stmt> {
        node.child_by_field_name(field)
            .map(|b| self.statements(b))
            .unwrap_or_default()
    }

    fn statement(&self, node: Node) -> Option<Stmt> {
        let line = line_of(node);
        let kind = match node.kind() {
            "future_import_statement" | "pass_statement" | "break_statement"
            | "continue_statement" => return None,
            "import_statement" => StmtKind::Import(self.import_names(node)),
            "import_from_statement" => self.from_import(node),
            "expression_statement" => self.expression_statement(node),
            "function_definition" => self.function_def(node, Vec::new())?,
            "class_definition" => self.class_def(node, Vec::new())?,
            "decorated_definition" => {
                let decorators: Vec<Expr> = named_children(node)
                    .into_iter()
                    .filter(|c| c.kind() == "decorator")
                    .flat_map(named_children)
                    .map(|e| self.expr(e))
                    .collect();
                let def = node.child_by_field_name("definition")?;
                match def.kind() {
                    "class_definition" => self.class_def(def, decorators)?,
                    _ => self.function_def(def, decorators)?,
                }
            }
            "if_statement" => self.if_statement(node),
            "for_statement" => StmtKind::For {
                target: self.target(node.child_by_field_name("left")?),
                iter: self.expr(node.child_by_field_name("right")?),
                body: self.block_field(node, "body"),
                orelse: node
                    .child_by_field_name("alternative")
                    .map(|alt| self.block_field(alt, "body"))
                    .unwrap_or_default(),
            },
            "while_statement" => {
                let mut bodies = vec![self.block_field(node, "body")];
                if let Some(alt) = node.child_by_field_name("alternative") {
                    bodies.push(self.block_field(alt, "body"));
                }
                StmtKind::Branch {
                    tests: node
                        .child_by_field_name("condition")
                        .map(|c| vec![self.expr(c)])
                        .unwrap_or_default(),
                    bodies,
                    exhaustive: false,
                }
            }
            "with_statement" => self.with_statement(node),
            "try_statement" => self.try_statement(node),
            "global_statement" => StmtKind::Global(self.identifiers(node)),
            "nonlocal_statement" => StmtKind::Nonlocal(self.identifiers(node)),
            "delete_statement" => StmtKind::Delete(
                named_children(node)
                    .into_iter()
                    .map(|c| self.target(c))
                    .collect(),
            ),
            _ => self.generic_statement(node),
        };
        Some(Stmt { line, kind })
    }

    fn identifiers(&self, node: Node) -> Vec<String> {
        named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "identifier")
            .map(|c| self.text(c))
            .collect()
    }

    fn import_alias(&self, node: Node) -> ImportAlias {
        match node.kind() {
            "aliased_import" => ImportAlias {
                name: node
                    .child_by_field_name("name")
                    .map(|n| self.text(n))
                    .unwrap_or_default(),
                alias: node.child_by_field_name("alias").map(|a| self.text(a)),
                line: line_of(node),
            },
            _ => ImportAlias {
                name: self.text(node),
                alias: None,
                line: line_of(node),
            },
        }
    }

    fn import_names(&self, node: Node) -> Vec<ImportAlias> {
        field_children(node, "name")
            .into_iter()
            .map(|n| self.import_alias(n))
            .collect()
    }

    fn from_import(&self, node: Node) -> StmtKind {
        let (module, level) = match node.child_by_field_name("module_name") {
            Some(m) if m.kind() == "relative_import" => {
                let mut level = 0;
                let mut module = String::new();
                for child in named_children(m) {
                    match child.kind() {
                        "import_prefix" => level = self.text(child).matches('.').count(),
                        _ => module = self.text(child),
                    }
                }
                (module, level.max(1))
            }
            Some(m) => (self.text(m), 0),
            None => (String::new(), 0),
        };
        let wildcard = named_children(node)
            .iter()
            .any(|c| c.kind() == "wildcard_import");
        StmtKind::FromImport {
            module,
            level,
            names: self.import_names(node),
            wildcard,
        }
    }

    fn expression_statement(&self, node: Node) -> StmtKind {
        let children = named_children(node);
        if let [single] = children.as_slice() {
            match single.kind() {
                "assignment" => return self.assignment(*single),
                "augmented_assignment" => {
                    let targets = single
                        .child_by_field_name("left")
                        .map(|l| vec![self.target(l)])
                        .unwrap_or_default();
                    return StmtKind::Assign {
                        targets,
                        value: single.child_by_field_name("right").map(|r| self.expr(r)),
                        annotation: None,
                    };
                }
                _ => {}
            }
        }
        StmtKind::Expr(children.into_iter().map(|c| self.expr(c)).collect())
    }

    /// Flattens chained assignments, `a = b = value`
    fn assignment(&self, node: Node) -> StmtKind {
        let mut targets = Vec::new();
        let annotation = node.child_by_field_name("type").map(|t| self.expr(t));
        let mut current = node;
        let value = loop {
            if let Some(left) = current.child_by_field_name("left") {
                targets.push(self.target(left));
            }
            match current.child_by_field_name("right") {
                Some(right) if right.kind() == "assignment" => current = right,
                Some(right) => break Some(self.expr(right)),
                None => break None,
            }
        };
        StmtKind::Assign {
            targets,
            value,
            annotation,
        }
    }

    fn target(&self, node: Node) -> Target {
        match node.kind() {
            "identifier" => Target::Name(self.text(node)),
            "pattern_list" | "tuple_pattern" | "list_pattern" | "tuple" | "list"
            | "expression_list" => Target::Tuple(
                named_children(node)
                    .into_iter()
                    .map(|c| self.target(c))
                    .collect(),
            ),
            "list_splat_pattern" | "parenthesized_expression" => match named_children(node).first() {
                Some(inner) => self.target(*inner),
                None => Target::Tuple(Vec::new()),
            },
            _ => Target::Expr(self.expr(node)),
        }
    }

    fn function_def(&self, node: Node, decorators: Vec<Expr>) -> Option<StmtKind> {
        Some(StmtKind::FunctionDef {
            name: self.text(node.child_by_field_name("name")?),
            decorators,
            params: node
                .child_by_field_name("parameters")
                .map(|p| self.params(p))
                .unwrap_or_default(),
            returns: node.child_by_field_name("return_type").map(|r| self.expr(r)),
            body: self.block_field(node, "body"),
        })
    }

    fn class_def(&self, node: Node, decorators: Vec<Expr>) -> Option<StmtKind> {
        Some(StmtKind::ClassDef {
            name: self.text(node.child_by_field_name("name")?),
            decorators,
            bases: node
                .child_by_field_name("superclasses")
                .map(|s| self.arguments(s))
                .unwrap_or_default(),
            body: self.block_field(node, "body"),
        })
    }

    /// First identifier at or below a parameter-like node
    fn param_name(&self, node: Node) -> Option<String> {
        if node.kind() == "identifier" {
            return Some(self.text(node));
        }
        named_children(node)
            .into_iter()
            .find_map(|c| self.param_name(c))
    }

    fn params(&self, node: Node) -> Vec<Param> {
        named_children(node)
            .into_iter()
            .filter_map(|p| match p.kind() {
                "keyword_separator" | "positional_separator" => None,
                "default_parameter" | "typed_default_parameter" => Some(Param {
                    name: p.child_by_field_name("name").and_then(|n| self.param_name(n)),
                    annotation: p.child_by_field_name("type").map(|t| self.expr(t)),
                    default: p.child_by_field_name("value").map(|v| self.expr(v)),
                }),
                "typed_parameter" => Some(Param {
                    name: named_children(p)
                        .into_iter()
                        .find(|c| c.kind() != "type")
                        .and_then(|c| self.param_name(c)),
                    annotation: p.child_by_field_name("type").map(|t| self.expr(t)),
                    default: None,
                }),
                _ => Some(Param {
                    name: self.param_name(p),
                    annotation: None,
                    default: None,
                }),
            })
            .collect()
    }

    fn if_statement(&self, node: Node) -> StmtKind {
        let mut tests = Vec::new();
        let mut bodies = Vec::new();
        let mut exhaustive = false;
        if let Some(cond) = node.child_by_field_name("condition") {
            tests.push(self.expr(cond));
        }
        bodies.push(self.block_field(node, "consequence"));
        for alt in field_children(node, "alternative") {
            match alt.kind() {
                "elif_clause" => {
                    if let Some(cond) = alt.child_by_field_name("condition") {
                        tests.push(self.expr(cond));
                    }
                    bodies.push(self.block_field(alt, "consequence"));
                }
                _ => {
                    exhaustive = true;
                    bodies.push(self.block_field(alt, "body"));
                }
            }
        }
        StmtKind::Branch {
            tests,
            bodies,
            exhaustive,
        }
    }

    fn with_statement(&self, node: Node) -> StmtKind {
        let mut items = Vec::new();
        for clause in named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "with_clause")
        {
            for item in named_children(clause) {
                let Some(value) = item.child_by_field_name("value") else {
                    continue;
                };
                if value.kind() == "as_pattern" {
                    let expr = named_children(value)
                        .first()
                        .map(|e| self.expr(*e))
                        .unwrap_or_else(|| Expr::other(line_of(value), Vec::new()));
                    let target = value.child_by_field_name("alias").map(|a| self.as_target(a));
                    items.push((expr, target));
                } else {
                    let target = item.child_by_field_name("alias").map(|a| self.as_target(a));
                    items.push((self.expr(value), target));
                }
            }
        }
        StmtKind::With {
            items,
            body: self.block_field(node, "body"),
        }
    }

    fn as_target(&self, node: Node) -> Target {
        if node.kind() == "as_pattern_target" {
            if let Some(inner) = named_children(node).first() {
                return self.target(*inner);
            }
        }
        self.target(node)
    }

    fn try_statement(&self, node: Node) -> StmtKind {
        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "except_clause" | "except_group_clause" => handlers.push(self.handler(child)),
                "else_clause" => orelse = self.block_field(child, "body"),
                "finally_clause" => {
                    finalbody = named_children(child)
                        .into_iter()
                        .filter(|c| c.kind() == "block")
                        .flat_map(|b| self.statements(b))
                        .collect()
                }
                _ => {}
            }
        }
        StmtKind::Try {
            body: self.block_field(node, "body"),
            handlers,
            orelse,
            finalbody,
        }
    }

    fn handler(&self, node: Node) -> Handler {
        let mut handler = Handler {
            kind: None,
            name: None,
            body: Vec::new(),
        };
        let mut saw_as = false;
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            if !child.is_named() {
                if matches!(child.kind(), "as" | ",") {
                    saw_as = true;
                }
                continue;
            }
            match child.kind() {
                "comment" => {}
                "block" => handler.body = self.statements(child),
                "as_pattern" => {
                    handler.kind = named_children(child).first().map(|e| self.expr(*e));
                    handler.name = child
                        .child_by_field_name("alias")
                        .and_then(|a| self.param_name(a));
                }
                _ if saw_as => handler.name = self.param_name(child),
                _ if handler.kind.is_none() => handler.kind = Some(self.expr(child)),
                _ => {}
            }
        }
        handler
    }

    fn generic_statement(&self, node: Node) -> StmtKind {
        let mut tests = Vec::new();
        let mut bodies = Vec::new();
        self.collect_compound(node, &mut tests, &mut bodies);
        if bodies.is_empty() {
            StmtKind::Expr(tests)
        } else {
            StmtKind::Branch {
                tests,
                bodies,
                exhaustive: false,
            }
        }
    }

    fn collect_compound(&self, node: Node, tests: &mut Vec<Expr>, bodies: &mut Vec<Vec<Stmt>>) {
        for child in named_children(node) {
            match child.kind() {
                "block" => bodies.push(self.statements(child)),
                kind if kind.ends_with("_clause") => self.collect_compound(child, tests, bodies),
                _ => tests.push(self.expr(child)),
            }
        }
    }

    fn arguments(&self, node: Node) -> Vec<Expr> {
        named_children(node)
            .into_iter()
            .filter_map(|arg| match arg.kind() {
                "keyword_argument" => arg.child_by_field_name("value").map(|v| self.expr(v)),
                _ => Some(self.expr(arg)),
            })
            .collect()
    }

    fn expr(&self, node: Node) -> Expr {
        let line = line_of(node);
        let kind = match node.kind() {
            "identifier" => ExprKind::Name(self.text(node)),
            "attribute" => match (
                node.child_by_field_name("object"),
                node.child_by_field_name("attribute"),
            ) {
                (Some(object), Some(attr)) => ExprKind::Attribute {
                    value: Box::new(self.expr(object)),
                    attr: self.text(attr),
                },
                _ => return self.generic_expr(node),
            },
            "call" => {
                let Some(func) = node.child_by_field_name("function") else {
                    return self.generic_expr(node);
                };
                let args = match node.child_by_field_name("arguments") {
                    Some(a) if a.kind() == "generator_expression" => vec![self.expr(a)],
                    Some(a) => self.arguments(a),
                    None => Vec::new(),
                };
                ExprKind::Call {
                    func: Box::new(self.expr(func)),
                    args,
                }
            }
            "keyword_argument" => match node.child_by_field_name("value") {
                Some(value) => return self.expr(value),
                None => ExprKind::Other(Vec::new()),
            },
            "lambda" => ExprKind::Lambda {
                params: node
                    .child_by_field_name("parameters")
                    .map(|p| self.params(p))
                    .unwrap_or_default(),
                body: Box::new(match node.child_by_field_name("body") {
                    Some(body) => self.expr(body),
                    None => Expr::other(line, Vec::new()),
                }),
            },
            kind if is_chain(kind) => ExprKind::Other(
                self.chain_operands(node)
                    .into_iter()
                    .map(|operand| self.expr(operand))
                    .collect(),
            ),
            "list_comprehension" | "set_comprehension" | "dictionary_comprehension"
            | "generator_expression" => self.comprehension(node),
            "named_expression" => match (
                node.child_by_field_name("name"),
                node.child_by_field_name("value"),
            ) {
                (Some(name), Some(value)) => ExprKind::NamedExpr {
                    target: self.text(name),
                    value: Box::new(self.expr(value)),
                },
                _ => return self.generic_expr(node),
            },
            _ => return self.generic_expr(node),
        };
        Expr { line, kind }
    }

    /// Operands of a same-kind operator chain, in source order
    fn chain_operands<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let kind = node.kind();
        let mut operands = Vec::new();
        let mut pending: Vec<Node<'t>> = named_children(node).into_iter().rev().collect();
        while let Some(next) = pending.pop() {
            if next.kind() == kind {
                pending.extend(named_children(next).into_iter().rev());
            } else {
                operands.push(next);
            }
        }
        operands
    }

    fn generic_expr(&self, node: Node) -> Expr {
        let children = named_children(node)
            .into_iter()
            .map(|c| self.expr(c))
            .collect();
        Expr::other(line_of(node), children)
    }

    fn comprehension(&self, node: Node) -> ExprKind {
        let mut generators: Vec<Generator> = Vec::new();
        let mut elements = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "for_in_clause" => {
                    let (Some(left), Some(right)) = (
                        child.child_by_field_name("left"),
                        child.child_by_field_name("right"),
                    ) else {
                        continue;
                    };
                    generators.push(Generator {
                        target: self.target(left),
                        iter: self.expr(right),
                        conds: Vec::new(),
                    });
                }
                "if_clause" => {
                    let conds: Vec<Expr> =
                        named_children(child).into_iter().map(|c| self.expr(c)).collect();
                    match generators.last_mut() {
                        Some(generator) => generator.conds.extend(conds),
                        None => elements.extend(conds),
                    }
                }
                _ => elements.push(self.expr(child)),
            }
        }
        ExprKind::Comprehension {
            generators,
            elements,
        }
    }
}
