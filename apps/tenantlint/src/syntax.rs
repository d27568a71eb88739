//! Syntax-tree scope analysis.
//!
//! Parses a file with tree-sitter and judges each call site against the
//! call expression it belongs to. A call is scoped when its arguments or its
//! callee chain carry scope evidence, either directly (a scope-key
//! identifier or property, a helper call, a string naming the key) or
//! through an identifier whose declaration in lexical reach carries it.
//!
//! Comments never count as evidence, unlike the line window.

use crate::errors::SyntaxError;
use crate::models::{CallSite, ScanTarget};
use crate::window::ScopeMatcher;
use std::collections::HashSet;
use tree_sitter::{Language, Node, Parser, Tree};

/// How many declarations deep identifier resolution may follow.
const MAX_RESOLVE_DEPTH: usize = 4;

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "function_expression",
    "function",
    "arrow_function",
    "method_definition",
    "generator_function_declaration",
    "generator_function",
];

/// Grammar for a file extension, if supported.
pub fn language_for(extension: &str) -> Option<Language> {
    match extension {
        "ts" | "mts" | "cts" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "js" | "jsx" | "mjs" | "cjs" => Some(tree_sitter_javascript::LANGUAGE.into()),
        _ => None,
    }
}

/// What a name resolves to from a given position.
enum Binding<'t> {
    /// Bound by a declaration or parameter default with this initializer.
    Value(Node<'t>),
    /// Bound, but with nothing to inspect (plain parameter, bare `let`).
    Opaque,
    Unbound,
}

pub struct SyntaxAnalyzer<'a> {
    tree: Tree,
    source: &'a str,
    matcher: &'a ScopeMatcher,
}

impl<'a> SyntaxAnalyzer<'a> {
    /// Parse `target`. Fails when no grammar applies or the tree contains
    /// syntax errors; callers fall back to the line window.
    pub fn parse(target: &'a ScanTarget, matcher: &'a ScopeMatcher) -> Result<Self, SyntaxError> {
        let extension = target.extension().unwrap_or("");
        let language = language_for(extension).ok_or_else(|| SyntaxError::UnsupportedLanguage {
            extension: extension.to_string(),
        })?;
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| SyntaxError::Language {
                message: e.to_string(),
            })?;
        let tree = parser
            .parse(target.source.as_bytes(), None)
            .ok_or(SyntaxError::NoTree)?;
        if tree.root_node().has_error() {
            return Err(SyntaxError::Malformed {
                line: first_error_line(tree.root_node()),
            });
        }
        Ok(Self {
            tree,
            source: target.source.as_str(),
            matcher,
        })
    }

    /// `Some(scoped)` for a call site matched to a call expression, `None`
    /// when the text at the call site is not a call (e.g. inside a comment).
    pub fn judge(&self, call: &CallSite) -> Option<bool> {
        let node = self.locate(call)?;
        let mut visited = HashSet::new();
        let in_args = node
            .child_by_field_name("arguments")
            .is_some_and(|args| self.has_evidence(args, 0, &mut visited));
        let scoped = in_args
            || node
                .child_by_field_name("function")
                .is_some_and(|callee| self.has_evidence(callee, 0, &mut visited));
        tracing::debug!(
            file = %call.location.file,
            line = call.location.line,
            scoped,
            "syntax check"
        );
        Some(scoped)
    }

    /// Innermost call expression whose callee covers the call-site offset
    /// and names the call-site method.
    fn locate(&self, call: &CallSite) -> Option<Node<'_>> {
        let leaf = self
            .tree
            .root_node()
            .descendant_for_byte_range(call.offset, call.offset + 1)?;
        let mut cur = Some(leaf);
        while let Some(node) = cur {
            if node.kind() == "call_expression" {
                if let Some(callee) = node.child_by_field_name("function") {
                    let covers = callee.start_byte() <= call.offset && call.offset < callee.end_byte();
                    if covers && self.callee_name(callee) == Some(call.method.as_str()) {
                        return Some(node);
                    }
                }
            }
            cur = node.parent();
        }
        None
    }

    fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn callee_name(&self, callee: Node<'_>) -> Option<&str> {
        match callee.kind() {
            "identifier" => Some(self.text(callee)),
            "member_expression" => callee
                .child_by_field_name("property")
                .map(|p| self.text(p)),
            _ => None,
        }
    }

    fn has_evidence(&self, node: Node<'_>, depth: usize, visited: &mut HashSet<usize>) -> bool {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            match n.kind() {
                "comment" => continue,
                "identifier" | "shorthand_property_identifier" => {
                    let name = self.text(n);
                    if self.matcher.is_key(name) {
                        return true;
                    }
                    if depth < MAX_RESOLVE_DEPTH {
                        if let Binding::Value(value) = self.resolve(name, n) {
                            if visited.insert(value.id()) && self.has_evidence(value, depth + 1, visited) {
                                return true;
                            }
                        }
                    }
                    continue;
                }
                "property_identifier" | "shorthand_property_identifier_pattern" => {
                    if self.matcher.is_key(self.text(n)) {
                        return true;
                    }
                    continue;
                }
                "call_expression" => {
                    let helper = n
                        .child_by_field_name("function")
                        .and_then(|f| self.callee_name(f))
                        .is_some_and(|name| self.matcher.is_helper(name));
                    if helper {
                        return true;
                    }
                }
                "string" | "template_string" => {
                    if self.matcher.mentions_key(self.text(n)) {
                        return true;
                    }
                }
                _ => {}
            }
            let mut cursor = n.walk();
            stack.extend(n.named_children(&mut cursor));
        }
        false
    }

    /// Resolve `name` as seen from `at`: the nearest preceding declaration
    /// in an enclosing block, or a parameter of an enclosing function.
    fn resolve<'t>(&self, name: &str, at: Node<'t>) -> Binding<'t> {
        let before = at.start_byte();
        let mut cur = at.parent();
        while let Some(scope) = cur {
            if FUNCTION_KINDS.contains(&scope.kind()) {
                let params = scope
                    .child_by_field_name("parameters")
                    .or_else(|| scope.child_by_field_name("parameter"));
                if let Some(params) = params {
                    if let Some(binding) = self.parameter_binding(params, name) {
                        return binding;
                    }
                }
            }
            if self.header_binds(scope, name, before) {
                return Binding::Opaque;
            }
            if let Some(binding) = self.declaration_in(scope, name, before) {
                return binding;
            }
            cur = scope.parent();
        }
        Binding::Unbound
    }

    /// Loop variables of `for...of`/`for...in` and `catch` parameters bind
    /// only inside the statement body.
    fn header_binds(&self, scope: Node<'_>, name: &str, before: usize) -> bool {
        let pattern = match scope.kind() {
            "for_in_statement" => scope.child_by_field_name("left"),
            "catch_clause" => scope.child_by_field_name("parameter"),
            _ => None,
        };
        let (Some(pattern), Some(body)) = (pattern, scope.child_by_field_name("body")) else {
            return false;
        };
        body.start_byte() <= before && self.binds(pattern, name)
    }

    fn declaration_in<'t>(&self, scope: Node<'t>, name: &str, before: usize) -> Option<Binding<'t>> {
        let mut found = None;
        let mut cursor = scope.walk();
        for child in scope.named_children(&mut cursor) {
            if child.end_byte() > before {
                break;
            }
            let decl = if child.kind() == "export_statement" {
                child.child_by_field_name("declaration")
            } else {
                Some(child)
            };
            let Some(decl) = decl else { continue };
            if !matches!(decl.kind(), "lexical_declaration" | "variable_declaration") {
                continue;
            }
            let mut inner = decl.walk();
            for declarator in decl.named_children(&mut inner) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let binds = declarator
                    .child_by_field_name("name")
                    .is_some_and(|pattern| self.binds(pattern, name));
                if binds {
                    found = Some(match declarator.child_by_field_name("value") {
                        Some(value) => Binding::Value(value),
                        None => Binding::Opaque,
                    });
                }
            }
        }
        found
    }

    fn parameter_binding<'t>(&self, params: Node<'t>, name: &str) -> Option<Binding<'t>> {
        if params.kind() == "identifier" {
            return (self.text(params) == name).then_some(Binding::Opaque);
        }
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if self.binds(param, name) {
                let default = param
                    .child_by_field_name("value")
                    .or_else(|| param.child_by_field_name("right"));
                return Some(match default {
                    Some(value) => Binding::Value(value),
                    None => Binding::Opaque,
                });
            }
        }
        None
    }

    /// Whether a binding pattern introduces `name`.
    fn binds(&self, pattern: Node<'_>, name: &str) -> bool {
        match pattern.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => self.text(pattern) == name,
            "type_annotation" | "comment" => false,
            "required_parameter" | "optional_parameter" => pattern
                .child_by_field_name("pattern")
                .is_some_and(|p| self.binds(p, name)),
            "assignment_pattern" | "object_assignment_pattern" => pattern
                .child_by_field_name("left")
                .is_some_and(|p| self.binds(p, name)),
            "pair_pattern" => pattern
                .child_by_field_name("value")
                .is_some_and(|p| self.binds(p, name)),
            _ => {
                let mut cursor = pattern.walk();
                let children: Vec<Node<'_>> = pattern.named_children(&mut cursor).collect();
                children.into_iter().any(|c| self.binds(c, name))
            }
        }
    }
}

fn first_error_line(root: Node<'_>) -> usize {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return node.start_position().row + 1;
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    root.start_position().row + 1
}
