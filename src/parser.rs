//! Go source to arena [`Ast`] conversion on top of tree-sitter.
//!
//! Declarations, specs, fields and type expressions are converted node by
//! node. Statements other than declarations, short variable declarations and
//! labels are kept as source text, as are expressions the resolver has no use
//! for. Comments are grouped the way `go/parser` groups them and attached as
//! doc, line or floating groups.

use tree_sitter::{Node, Parser};

use crate::ast::{
    Ast, Comment, DeclTok, ExprHint, Field, FileNode, FuncDecl, FuncType, GenDecl, ImportSpec, NodeId, NodeKind,
    RawText, TypeSpec, ValueSpec,
};
use crate::error::{Error, Result};
use crate::position::{FileSet, Pos};
use crate::types::ChanDir;

/// Output of [`parse_file`].
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub ast: Ast,
    pub root: NodeId,
    /// Every comment group of the file, in position order.
    pub comments: Vec<NodeId>,
    pub package_name: String,
    pub base: u32,
}

#[cfg(feature = "lang-go")]
fn new_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    let language: tree_sitter::Language = tree_sitter_go::LANGUAGE.into();
    parser
        .set_language(&language)
        .map_err(|e| Error::Parser(format!("failed to set tree-sitter language: {e}")))?;
    Ok(parser)
}

#[cfg(not(feature = "lang-go"))]
fn new_parser() -> Result<Parser> {
    Err(Error::Parser("built without the Go grammar (feature `lang-go`)".to_string()))
}

/// Parses `src` and registers it in `fset` under `filename`.
pub fn parse_file(fset: &mut FileSet, filename: &str, src: &str) -> Result<ParsedFile> {
    let mut parser = new_parser()?;
    let tree = parser
        .parse(src, None)
        .ok_or_else(|| Error::Parser(format!("parsing {filename} did not produce a tree")))?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(syntax_error(filename, src, root));
    }

    let base = fset.add_file(filename, src);
    let mut conv = Converter {
        filename,
        src,
        base,
        ast: Ast::new(),
        comments: Vec::new(),
    };
    let (root_id, package_name) = conv.source_file(root)?;
    let Converter { ast, mut comments, .. } = conv;
    comments.sort_by_key(|c| ast.pos(*c));
    Ok(ParsedFile {
        ast,
        root: root_id,
        comments,
        package_name,
        base,
    })
}

fn syntax_error(filename: &str, src: &str, root: Node) -> Error {
    let bad = first_error(root).unwrap_or(root);
    let p = bad.start_position();
    let message = if bad.is_missing() {
        format!("expected {}", bad.kind())
    } else {
        let text = src.get(bad.byte_range()).unwrap_or_default();
        let snippet: String = text.chars().take(24).collect();
        let snippet = snippet.lines().next().unwrap_or_default();
        if snippet.is_empty() {
            "syntax error".to_string()
        } else {
            format!("syntax error: unexpected {snippet}")
        }
    };
    Error::Syntax {
        file: filename.to_string(),
        line: p.row + 1,
        column: p.column + 1,
        message,
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error)
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn all_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

fn non_comment(node: Node) -> Vec<Node> {
    named_children(node).into_iter().filter(|c| c.kind() != "comment").collect()
}

/// Named children with list wrappers (`statement_list`, `*_spec_list`)
/// flattened, in source order.
fn flattened_children(node: Node) -> Vec<Node> {
    let mut out = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "statement_list" | "var_spec_list" | "import_spec_list" | "const_spec_list" | "type_spec_list" => {
                out.extend(named_children(child))
            }
            _ => out.push(child),
        }
    }
    out.sort_by_key(|n| n.start_byte());
    out
}

fn line_indent(src: &str, at: usize) -> &str {
    let start = src[..at].rfind('\n').map_or(0, |i| i + 1);
    let line = &src[start..];
    let n = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..n]
}

/// One entry of a comment-aware list.
enum Slot<'t> {
    Item {
        node: Node<'t>,
        doc: Option<NodeId>,
        line: Option<NodeId>,
    },
    Floating {
        group: NodeId,
        trailing: bool,
    },
}

struct Converter<'s> {
    filename: &'s str,
    src: &'s str,
    base: u32,
    ast: Ast,
    comments: Vec<NodeId>,
}

impl<'s> Converter<'s> {
    fn pos(&self, node: Node) -> Pos {
        Pos(self.base + node.start_byte() as u32)
    }

    fn end(&self, node: Node) -> Pos {
        Pos(self.base + node.end_byte() as u32)
    }

    fn text(&self, node: Node) -> &'s str {
        self.src.get(node.byte_range()).unwrap_or_default()
    }

    fn alloc(&mut self, node: Node, kind: NodeKind) -> NodeId {
        let (pos, end) = (self.pos(node), self.end(node));
        self.ast.alloc(pos, end, kind)
    }

    fn ident(&mut self, node: Node) -> NodeId {
        let name = self.text(node).to_string();
        self.alloc(node, NodeKind::Ident(name))
    }

    fn raw_text(&self, node: Node) -> RawText {
        let text = self.text(node);
        if text.contains('`') {
            return RawText {
                text: text.to_string(),
                reindent: false,
            };
        }
        let indent = line_indent(self.src, node.start_byte());
        let mut lines = text.split('\n');
        let mut out = lines.next().unwrap_or_default().to_string();
        for line in lines {
            out.push('\n');
            let common = line
                .char_indices()
                .zip(indent.chars())
                .take_while(|((_, a), b)| a == b)
                .count();
            out.push_str(&line[common..]);
        }
        RawText::new(out)
    }

    fn error_at(&self, node: Node, message: impl Into<String>) -> Error {
        let p = node.start_position();
        Error::Syntax {
            file: self.filename.to_string(),
            line: p.row + 1,
            column: p.column + 1,
            message: message.into(),
        }
    }

    fn required<'t>(&self, node: Node<'t>, field: &str) -> Result<Node<'t>> {
        node.child_by_field_name(field)
            .ok_or_else(|| self.error_at(node, format!("missing {field} in {}", node.kind())))
    }

    fn comment_group(&mut self, nodes: &[Node]) -> Option<NodeId> {
        let (first, last) = (nodes.first()?, nodes.last()?);
        let list = nodes
            .iter()
            .map(|n| Comment {
                pos: self.pos(*n),
                text: self.text(*n).trim_end_matches('\r').to_string(),
            })
            .collect();
        let id = self
            .ast
            .alloc(self.pos(*first), self.end(*last), NodeKind::CommentGroup(list));
        self.comments.push(id);
        Some(id)
    }

    /// Splits list children into items with their doc and line comments, and
    /// floating comment groups. `open_row` is the row of the token opening the
    /// list, if any.
    fn arrange<'t>(&mut self, children: Vec<Node<'t>>, open_row: Option<usize>) -> Vec<Slot<'t>> {
        let mut slots: Vec<Slot<'t>> = Vec::new();
        let mut pending: Vec<Node<'t>> = Vec::new();
        let mut line_nodes: Vec<Node<'t>> = Vec::new();
        let mut last_row = open_row;

        for child in children {
            if child.kind() != "comment" {
                self.close_line_group(&mut slots, &mut line_nodes);
                let mut doc = None;
                if let Some(last) = pending.last() {
                    if last.end_position().row + 1 >= child.start_position().row {
                        doc = self.comment_group(&pending);
                    } else {
                        let group = self.comment_group(&pending);
                        push_floating(&mut slots, group, false);
                    }
                    pending.clear();
                }
                slots.push(Slot::Item {
                    node: child,
                    doc,
                    line: None,
                });
                last_row = Some(child.end_position().row);
                continue;
            }

            let row = child.start_position().row;
            if pending.is_empty() && last_row == Some(row) {
                line_nodes.push(child);
                continue;
            }
            self.close_line_group(&mut slots, &mut line_nodes);
            if let Some(last) = pending.last() {
                if row > last.end_position().row + 1 {
                    let group = self.comment_group(&pending);
                    push_floating(&mut slots, group, false);
                    pending.clear();
                }
            }
            pending.push(child);
        }
        self.close_line_group(&mut slots, &mut line_nodes);
        if !pending.is_empty() {
            let group = self.comment_group(&pending);
            push_floating(&mut slots, group, false);
        }
        slots
    }

    fn close_line_group<'t>(&mut self, slots: &mut Vec<Slot<'t>>, line_nodes: &mut Vec<Node<'t>>) {
        if line_nodes.is_empty() {
            return;
        }
        let group = self.comment_group(line_nodes);
        line_nodes.clear();
        match slots.last_mut() {
            Some(Slot::Item { line, .. }) if line.is_none() => *line = group,
            _ => push_floating(slots, group, true),
        }
    }

    fn floating(&mut self, group: NodeId, trailing: bool) -> NodeId {
        let (pos, end) = (self.ast.pos(group), self.ast.end(group));
        self.ast.alloc(pos, end, NodeKind::Floating { group, trailing })
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn source_file(&mut self, root: Node) -> Result<(NodeId, String)> {
        let children = named_children(root);
        if !children.iter().any(|c| c.kind() == "package_clause") {
            return Err(self.error_at(root, "expected 'package'"));
        }

        let mut doc = None;
        let mut header = Vec::new();
        let mut package = None;
        let mut package_name = String::new();
        let mut decls = Vec::new();

        for slot in self.arrange(children, None) {
            match slot {
                Slot::Floating { group, trailing } => {
                    let id = self.floating(group, trailing);
                    if package.is_none() {
                        header.push(id);
                    } else {
                        decls.push(id);
                    }
                }
                Slot::Item {
                    node,
                    doc: item_doc,
                    line,
                } => {
                    if node.kind() == "package_clause" {
                        let name_node = named_children(node)
                            .into_iter()
                            .find(|c| c.kind() == "package_identifier")
                            .ok_or_else(|| self.error_at(node, "expected package name"))?;
                        package_name = self.text(name_node).to_string();
                        doc = item_doc;
                        package = Some(self.alloc(node, NodeKind::Ident(package_name.clone())));
                        if let Some(group) = line {
                            decls.push(self.floating(group, true));
                        }
                        continue;
                    }
                    if package.is_none() {
                        return Err(self.error_at(node, "expected 'package'"));
                    }
                    let (decl, line_used) = self.top_level(node, item_doc, line)?;
                    decls.push(decl);
                    if let (Some(group), false) = (line, line_used) {
                        decls.push(self.floating(group, true));
                    }
                }
            }
        }

        let package = package.ok_or_else(|| self.error_at(root, "expected 'package'"))?;
        let file = FileNode {
            doc,
            header,
            package,
            decls,
        };
        let id = self.alloc(root, NodeKind::File(file));
        Ok((id, package_name))
    }

    /// Converts a top-level declaration. The flag reports whether the line
    /// comment was attached to the declaration.
    fn top_level(&mut self, node: Node, doc: Option<NodeId>, line: Option<NodeId>) -> Result<(NodeId, bool)> {
        match node.kind() {
            "import_declaration" | "const_declaration" | "var_declaration" | "type_declaration" => {
                self.gen_decl(node, doc, line)
            }
            "function_declaration" | "method_declaration" => Ok((self.func_decl(node, doc)?, false)),
            _ => Err(self.error_at(node, "non-declaration statement outside function body")),
        }
    }

    fn gen_decl(&mut self, node: Node, doc: Option<NodeId>, line: Option<NodeId>) -> Result<(NodeId, bool)> {
        let tok = match node.kind() {
            "import_declaration" => DeclTok::Import,
            "const_declaration" => DeclTok::Const,
            "var_declaration" => DeclTok::Var,
            _ => DeclTok::Type,
        };
        let grouped = all_children(node)
            .iter()
            .any(|c| c.kind() == "(" || c.kind().ends_with("_spec_list"));
        let children = flattened_children(node);

        let mut specs = Vec::new();
        let mut line_used = false;
        if grouped {
            let open = Some(node.start_position().row);
            for slot in self.arrange(children, open) {
                match slot {
                    Slot::Item { node, doc, line } => specs.push(self.spec(node, doc, line)?),
                    Slot::Floating { group, trailing } => specs.push(self.floating(group, trailing)),
                }
            }
        } else {
            for child in children {
                if child.kind() == "comment" {
                    continue;
                }
                let comment = if line_used { None } else { line };
                line_used = comment.is_some();
                specs.push(self.spec(child, None, comment)?);
            }
        }

        let decl = GenDecl {
            doc,
            tok,
            grouped,
            specs,
        };
        Ok((self.alloc(node, NodeKind::GenDecl(decl)), line_used))
    }

    fn spec(&mut self, node: Node, doc: Option<NodeId>, comment: Option<NodeId>) -> Result<NodeId> {
        let kind = match node.kind() {
            "import_spec" => {
                let name = node.child_by_field_name("name").map(|n| self.ident(n));
                let path = node
                    .child_by_field_name("path")
                    .map(|p| self.text(p).to_string())
                    .ok_or_else(|| self.error_at(node, "missing import path"))?;
                NodeKind::ImportSpec(ImportSpec {
                    doc,
                    name,
                    path,
                    comment,
                })
            }
            "const_spec" | "var_spec" => {
                let names = field_children(node, "name")
                    .into_iter()
                    .map(|n| self.ident(n))
                    .collect();
                let ty = match node.child_by_field_name("type") {
                    Some(t) => Some(self.type_expr(t)?),
                    None => None,
                };
                let mut values = Vec::new();
                if let Some(list) = node.child_by_field_name("value") {
                    let exprs = if list.kind() == "expression_list" {
                        non_comment(list)
                    } else {
                        vec![list]
                    };
                    for e in exprs {
                        values.push(self.expr(e)?);
                    }
                }
                NodeKind::ValueSpec(ValueSpec {
                    doc,
                    names,
                    ty,
                    values,
                    comment,
                })
            }
            "type_spec" | "type_alias" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.ident(n))
                    .ok_or_else(|| self.error_at(node, "missing type name"))?;
                let type_params = node
                    .child_by_field_name("type_parameters")
                    .map(|t| self.text(t).to_string());
                let ty_node = node
                    .child_by_field_name("type")
                    .ok_or_else(|| self.error_at(node, "missing type"))?;
                let ty = self.type_expr(ty_node)?;
                NodeKind::TypeSpec(TypeSpec {
                    doc,
                    name,
                    type_params,
                    assign: node.kind() == "type_alias",
                    ty,
                    comment,
                })
            }
            other => return Err(self.error_at(node, format!("unexpected {other} in declaration"))),
        };
        Ok(self.alloc(node, kind))
    }

    fn func_decl(&mut self, node: Node, doc: Option<NodeId>) -> Result<NodeId> {
        let recv = match node.child_by_field_name("receiver") {
            Some(r) => Some(self.param_list(r)?),
            None => None,
        };
        let name = node
            .child_by_field_name("name")
            .map(|n| self.ident(n))
            .ok_or_else(|| self.error_at(node, "missing function name"))?;
        let type_params = node
            .child_by_field_name("type_parameters")
            .map(|t| self.text(t).to_string());
        let ty = self.signature(node)?;
        let body = match node.child_by_field_name("body") {
            Some(b) => Some(self.block(b)?),
            None => None,
        };
        let decl = FuncDecl {
            doc,
            recv,
            name,
            type_params,
            ty,
            body,
        };
        Ok(self.alloc(node, NodeKind::FuncDecl(decl)))
    }

    /// `parameters` and `result` of a function-shaped node as a FuncType.
    fn signature(&mut self, node: Node) -> Result<NodeId> {
        let params_node = node
            .child_by_field_name("parameters")
            .ok_or_else(|| self.error_at(node, "missing parameter list"))?;
        let params = self.param_list(params_node)?;
        let results = match node.child_by_field_name("result") {
            Some(r) if r.kind() == "parameter_list" => Some(self.param_list(r)?),
            Some(r) => Some(self.type_expr(r)?),
            None => None,
        };
        let start = self.pos(params_node);
        let end = self.end(node.child_by_field_name("result").unwrap_or(params_node));
        Ok(self.ast.alloc(start, end, NodeKind::FuncType(FuncType { params, results })))
    }

    fn param_list(&mut self, node: Node) -> Result<NodeId> {
        let mut fields = Vec::new();
        for child in non_comment(node) {
            let names: Vec<NodeId> = field_children(child, "name")
                .into_iter()
                .map(|n| self.ident(n))
                .collect();
            let ty_node = child
                .child_by_field_name("type")
                .ok_or_else(|| self.error_at(child, "missing parameter type"))?;
            let mut ty = self.type_expr(ty_node)?;
            if child.kind() == "variadic_parameter_declaration" {
                let dots = all_children(child).into_iter().find(|c| c.kind() == "...");
                let start = dots.map_or(self.pos(ty_node), |d| self.pos(d));
                ty = self.ast.alloc(start, self.end(ty_node), NodeKind::Ellipsis(ty));
            }
            let field = Field {
                doc: None,
                names,
                ty,
                tag: None,
                comment: None,
            };
            fields.push(self.alloc(child, NodeKind::Field(field)));
        }
        Ok(self.alloc(node, NodeKind::FieldList(fields)))
    }

    fn struct_fields(&mut self, list: Node) -> Result<NodeId> {
        let mut items = Vec::new();
        let open = Some(list.start_position().row);
        for slot in self.arrange(flattened_children(list), open) {
            match slot {
                Slot::Floating { group, trailing } => items.push(self.floating(group, trailing)),
                Slot::Item { node, doc, line } => {
                    let names: Vec<NodeId> = field_children(node, "name")
                        .into_iter()
                        .map(|n| self.ident(n))
                        .collect();
                    let ty_node = node
                        .child_by_field_name("type")
                        .ok_or_else(|| self.error_at(node, "missing field type"))?;
                    let mut ty = self.type_expr(ty_node)?;
                    if names.is_empty() {
                        if let Some(star) = all_children(node).into_iter().find(|c| c.kind() == "*") {
                            ty = self.ast.alloc(self.pos(star), self.end(ty_node), NodeKind::Pointer(ty));
                        }
                    }
                    let tag = node.child_by_field_name("tag").map(|t| self.text(t).to_string());
                    let field = Field {
                        doc,
                        names,
                        ty,
                        tag,
                        comment: line,
                    };
                    items.push(self.alloc(node, NodeKind::Field(field)));
                }
            }
        }
        Ok(self.alloc(list, NodeKind::FieldList(items)))
    }

    fn interface_elems(&mut self, iface: Node) -> Result<NodeId> {
        let mut items = Vec::new();
        let open = Some(iface.start_position().row);
        for slot in self.arrange(named_children(iface), open) {
            match slot {
                Slot::Floating { group, trailing } => items.push(self.floating(group, trailing)),
                Slot::Item { node, doc, line } => {
                    let (names, ty) = match node.kind() {
                        "method_elem" | "method_spec" => {
                            let name = node
                                .child_by_field_name("name")
                                .map(|n| self.ident(n))
                                .ok_or_else(|| self.error_at(node, "missing method name"))?;
                            (vec![name], self.signature(node)?)
                        }
                        _ => {
                            let inner = non_comment(node);
                            let ty = match inner.as_slice() {
                                [single] if node.kind() != "interface_type_name" => self.type_expr(*single)?,
                                _ => self.type_expr_or_raw(node)?,
                            };
                            (Vec::new(), ty)
                        }
                    };
                    let field = Field {
                        doc,
                        names,
                        ty,
                        tag: None,
                        comment: line,
                    };
                    items.push(self.alloc(node, NodeKind::Field(field)));
                }
            }
        }
        Ok(self.alloc(iface, NodeKind::FieldList(items)))
    }

    fn type_expr_or_raw(&mut self, node: Node) -> Result<NodeId> {
        match node.kind() {
            "interface_type_name" => {
                let inner = non_comment(node);
                match inner.first() {
                    Some(first) => self.type_expr(*first),
                    None => Ok(self.alloc(node, NodeKind::TypeName(self.text(node).to_string()))),
                }
            }
            _ => Ok(self.alloc(node, NodeKind::RawType(self.text(node).to_string()))),
        }
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    fn type_expr(&mut self, node: Node) -> Result<NodeId> {
        let kind = match node.kind() {
            "type_identifier" | "identifier" | "package_identifier" => NodeKind::TypeName(self.text(node).to_string()),
            "qualified_type" => NodeKind::Qualified {
                pkg: self.text(self.required(node, "package")?).to_string(),
                name: self.text(self.required(node, "name")?).to_string(),
            },
            "selector_expression" => {
                let operand = self.required(node, "operand")?;
                if operand.kind() != "identifier" {
                    NodeKind::RawType(self.text(node).to_string())
                } else {
                    NodeKind::Qualified {
                        pkg: self.text(operand).to_string(),
                        name: self.text(self.required(node, "field")?).to_string(),
                    }
                }
            }
            "generic_type" => {
                let base = self.type_expr(self.required(node, "type")?)?;
                let args = self.text(self.required(node, "type_arguments")?).to_string();
                NodeKind::Generic { base, args }
            }
            "pointer_type" => {
                let inner = non_comment(node)
                    .last()
                    .copied()
                    .ok_or_else(|| self.error_at(node, "missing pointer base type"))?;
                NodeKind::Pointer(self.type_expr(inner)?)
            }
            "array_type" => {
                let len = Some(self.text(self.required(node, "length")?).to_string());
                let elem = self.type_expr(self.required(node, "element")?)?;
                NodeKind::Array { len, elem }
            }
            "implicit_length_array_type" => NodeKind::Array {
                len: None,
                elem: self.type_expr(self.required(node, "element")?)?,
            },
            "slice_type" => NodeKind::Slice(self.type_expr(self.required(node, "element")?)?),
            "map_type" => {
                let key = self.type_expr(self.required(node, "key")?)?;
                let value = self.type_expr(self.required(node, "value")?)?;
                NodeKind::Map { key, value }
            }
            "channel_type" => {
                let tokens = all_children(node);
                let dir = match (tokens.first().map(|t| t.kind()), tokens.get(1).map(|t| t.kind())) {
                    (Some("<-"), _) => ChanDir::RecvOnly,
                    (_, Some("<-")) => ChanDir::SendOnly,
                    _ => ChanDir::SendRecv,
                };
                NodeKind::Chan {
                    dir,
                    elem: self.type_expr(self.required(node, "value")?)?,
                }
            }
            "function_type" => return self.signature_type(node),
            "struct_type" => {
                let list = non_comment(node)
                    .into_iter()
                    .find(|c| c.kind() == "field_declaration_list")
                    .ok_or_else(|| self.error_at(node, "missing struct body"))?;
                NodeKind::StructType(self.struct_fields(list)?)
            }
            "interface_type" => NodeKind::InterfaceType(self.interface_elems(node)?),
            "parenthesized_type" => {
                let inner = non_comment(node)
                    .first()
                    .copied()
                    .ok_or_else(|| self.error_at(node, "empty parentheses"))?;
                NodeKind::Paren(self.type_expr(inner)?)
            }
            _ => NodeKind::RawType(self.text(node).to_string()),
        };
        Ok(self.alloc(node, kind))
    }

    /// A `func(...)` type: the FuncType node spans the whole literal type.
    fn signature_type(&mut self, node: Node) -> Result<NodeId> {
        let sig = self.signature(node)?;
        let (pos, end) = (self.pos(node), self.end(node));
        let n = self.ast.node_mut(sig);
        n.pos = pos;
        n.end = end;
        Ok(sig)
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn expr(&mut self, node: Node) -> Result<NodeId> {
        let kind = match node.kind() {
            "func_literal" => {
                let ty = self.signature(node)?;
                let body_node = node
                    .child_by_field_name("body")
                    .ok_or_else(|| self.error_at(node, "missing function body"))?;
                let body = self.block(body_node)?;
                NodeKind::FuncLit { ty, body }
            }
            "composite_literal" => {
                let ty = match node.child_by_field_name("type") {
                    Some(t) => Some(self.type_expr(t)?),
                    None => None,
                };
                let body = node
                    .child_by_field_name("body")
                    .map(|b| self.raw_text(b))
                    .unwrap_or_else(|| RawText::new("{}"));
                NodeKind::CompositeLit { ty, body }
            }
            "unary_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o).to_string())
                    .unwrap_or_default();
                let operand = node
                    .child_by_field_name("operand")
                    .ok_or_else(|| self.error_at(node, "missing operand"))?;
                NodeKind::Unary {
                    op,
                    x: self.expr(operand)?,
                }
            }
            _ => {
                let hint = self.hint(node)?;
                NodeKind::RawExpr {
                    text: self.raw_text(node),
                    hint,
                }
            }
        };
        Ok(self.alloc(node, kind))
    }

    fn hint(&mut self, node: Node) -> Result<ExprHint> {
        let hint = match node.kind() {
            "int_literal" => ExprHint::Int,
            "float_literal" => ExprHint::Float,
            "imaginary_literal" => ExprHint::Imag,
            "rune_literal" => ExprHint::Rune,
            "interpreted_string_literal" | "raw_string_literal" => ExprHint::Str,
            "true" | "false" => ExprHint::Bool,
            "nil" => ExprHint::Nil,
            "iota" | "identifier" => ExprHint::Ident(self.text(node).to_string()),
            "selector_expression" => match (node.child_by_field_name("operand"), node.child_by_field_name("field")) {
                (Some(op), Some(f)) if op.kind() == "identifier" => ExprHint::Selector {
                    pkg: self.text(op).to_string(),
                    name: self.text(f).to_string(),
                },
                _ => ExprHint::Other,
            },
            "call_expression" => {
                let Some(func) = node.child_by_field_name("function") else {
                    return Ok(ExprHint::Other);
                };
                if !matches!(func.kind(), "identifier" | "selector_expression") {
                    return Ok(ExprHint::Other);
                }
                let name = self.text(func).to_string();
                let mut arg = None;
                if name == "new" || name == "make" {
                    if let Some(args) = node.child_by_field_name("arguments") {
                        if let Some(first) = non_comment(args).first() {
                            arg = Some(self.type_expr(*first)?);
                        }
                    }
                }
                ExprHint::Call { func: name, arg }
            }
            "type_conversion_expression" => match node.child_by_field_name("type") {
                Some(t) => ExprHint::Conversion { ty: self.type_expr(t)? },
                None => ExprHint::Other,
            },
            "parenthesized_expression" => match non_comment(node).first() {
                Some(inner) => self.hint(*inner)?,
                None => ExprHint::Other,
            },
            "binary_expression" => {
                let op = node.child_by_field_name("operator").map(|o| self.text(o)).unwrap_or_default();
                if matches!(op, "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||") {
                    ExprHint::Bool
                } else {
                    let left = match node.child_by_field_name("left") {
                        Some(l) => self.hint(l)?,
                        None => ExprHint::Other,
                    };
                    match (left, node.child_by_field_name("right")) {
                        (ExprHint::Other, Some(r)) if !matches!(op, "<<" | ">>") => self.hint(r)?,
                        (left, _) => left,
                    }
                }
            }
            "unary_expression" => {
                let op = node.child_by_field_name("operator").map(|o| self.text(o)).unwrap_or_default();
                match (op, node.child_by_field_name("operand")) {
                    ("!", _) => ExprHint::Bool,
                    ("-" | "+" | "^", Some(x)) => self.hint(x)?,
                    _ => ExprHint::Other,
                }
            }
            _ => ExprHint::Other,
        };
        Ok(hint)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn block(&mut self, node: Node) -> Result<NodeId> {
        let mut stmts = Vec::new();
        let open = Some(node.start_position().row);
        for slot in self.arrange(flattened_children(node), open) {
            match slot {
                Slot::Floating { group, trailing } => stmts.push(self.floating(group, trailing)),
                Slot::Item { node, doc, line } => {
                    if node.kind() == "empty_statement" {
                        continue;
                    }
                    let is_decl = matches!(node.kind(), "var_declaration" | "const_declaration" | "type_declaration");
                    if let (Some(group), false) = (doc, is_decl) {
                        stmts.push(self.floating(group, false));
                    }
                    let (stmt, line_used) = if is_decl {
                        let (decl, used) = self.gen_decl(node, doc, line)?;
                        (self.alloc(node, NodeKind::DeclStmt(decl)), used)
                    } else {
                        (self.statement(node)?, false)
                    };
                    stmts.push(stmt);
                    if let (Some(group), false) = (line, line_used) {
                        stmts.push(self.floating(group, true));
                    }
                }
            }
        }
        Ok(self.alloc(node, NodeKind::Block(stmts)))
    }

    fn statement(&mut self, node: Node) -> Result<NodeId> {
        let kind = match node.kind() {
            "short_var_declaration" => {
                let left = node.child_by_field_name("left").map(non_comment).unwrap_or_default();
                let right = node.child_by_field_name("right").map(non_comment).unwrap_or_default();
                if left.is_empty() || left.iter().any(|l| l.kind() != "identifier") {
                    NodeKind::RawStmt(self.raw_text(node))
                } else {
                    let names = left.into_iter().map(|l| self.ident(l)).collect();
                    let mut values = Vec::new();
                    for r in right {
                        values.push(self.expr(r)?);
                    }
                    NodeKind::ShortVar { names, values }
                }
            }
            "labeled_statement" => {
                let label_node = node
                    .child_by_field_name("label")
                    .ok_or_else(|| self.error_at(node, "missing label"))?;
                let label = self.ident(label_node);
                let inner = non_comment(node)
                    .into_iter()
                    .find(|c| c.id() != label_node.id() && c.kind() != "empty_statement");
                let stmt = match inner {
                    Some(s) => Some(self.statement(s)?),
                    None => None,
                };
                NodeKind::Labeled { label, stmt }
            }
            "var_declaration" | "const_declaration" | "type_declaration" => {
                let (decl, _) = self.gen_decl(node, None, None)?;
                NodeKind::DeclStmt(decl)
            }
            _ => NodeKind::RawStmt(self.raw_text(node)),
        };
        Ok(self.alloc(node, kind))
    }
}

fn push_floating(slots: &mut Vec<Slot<'_>>, group: Option<NodeId>, trailing: bool) {
    if let Some(group) = group {
        slots.push(Slot::Floating { group, trailing });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ParsedFile {
        let mut fset = FileSet::new();
        parse_file(&mut fset, "test.go", src).expect("source should parse")
    }

    fn decls(p: &ParsedFile) -> Vec<NodeId> {
        p.ast.file(p.root).unwrap().decls.clone()
    }

    #[test]
    fn parses_package_and_declarations() {
        let p = parse("package demo\n\nimport \"fmt\"\n\ntype S struct {\n\tA, B int `json:\"a\"`\n}\n\nfunc (s *S) Get() int { return s.A }\n");
        assert_eq!(p.package_name, "demo");
        let d = decls(&p);
        assert_eq!(d.len(), 3, "import, type and func declarations");

        let NodeKind::GenDecl(g) = p.ast.kind(d[1]) else { panic!("expected type decl") };
        assert_eq!(g.tok, DeclTok::Type);
        let NodeKind::TypeSpec(ts) = p.ast.kind(g.specs[0]) else { panic!("expected type spec") };
        assert_eq!(p.ast.ident_name(ts.name), "S");
        let NodeKind::StructType(list) = p.ast.kind(ts.ty) else { panic!("expected struct") };
        let NodeKind::FieldList(fields) = p.ast.kind(*list) else { panic!("expected fields") };
        let NodeKind::Field(f) = p.ast.kind(fields[0]) else { panic!("expected field") };
        assert_eq!(f.names.len(), 2);
        assert_eq!(f.tag.as_deref(), Some("`json:\"a\"`"));

        let NodeKind::FuncDecl(fd) = p.ast.kind(d[2]) else { panic!("expected func") };
        assert!(fd.recv.is_some());
        assert!(fd.body.is_some());
    }

    #[test]
    fn attaches_doc_and_line_comments() {
        let src = "package p\n\n// S is documented.\ntype S struct {\n\t// A doc\n\tA int // A line\n}\n\n// floating\n\nvar x = 1 // x line\n";
        let p = parse(src);
        let d = decls(&p);
        let NodeKind::GenDecl(g) = p.ast.kind(d[0]) else { panic!("expected decl") };
        let doc = g.doc.expect("type decl should carry its doc");
        assert_eq!(p.ast.comment_group(doc)[0].text, "// S is documented.");

        assert!(matches!(p.ast.kind(d[1]), NodeKind::Floating { trailing: false, .. }));

        let NodeKind::GenDecl(v) = p.ast.kind(d[2]) else { panic!("expected var decl") };
        let NodeKind::ValueSpec(vs) = p.ast.kind(v.specs[0]) else { panic!("expected value spec") };
        let line = vs.comment.expect("line comment on ungrouped var");
        assert_eq!(p.ast.comment_group(line)[0].text, "// x line");
        assert_eq!(p.comments.len(), 5);
    }

    #[test]
    fn syntax_errors_carry_position() {
        let mut fset = FileSet::new();
        let err = parse_file(&mut fset, "bad.go", "package p\n\nfunc f( {\n").unwrap_err();
        match err {
            Error::Syntax { file, line, .. } => {
                assert_eq!(file, "bad.go");
                assert!(line >= 3, "error should point at or after the broken line, got {line}");
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
        assert!(fset.is_empty(), "failed parses must not register a file");
    }

    #[test]
    fn expression_hints() {
        let p = parse("package p\n\nvar (\n\ta = 1\n\tb = \"s\"\n\tc = new(T)\n\td = &T{}\n\te = []byte(\"x\")\n)\n");
        let d = decls(&p);
        let NodeKind::GenDecl(g) = p.ast.kind(d[0]) else { panic!("expected var group") };
        assert!(g.grouped);
        let value = |i: usize| {
            let NodeKind::ValueSpec(vs) = p.ast.kind(g.specs[i]) else { panic!("expected spec") };
            vs.values[0]
        };
        assert!(matches!(p.ast.kind(value(0)), NodeKind::RawExpr { hint: ExprHint::Int, .. }));
        assert!(matches!(p.ast.kind(value(1)), NodeKind::RawExpr { hint: ExprHint::Str, .. }));
        assert!(matches!(
            p.ast.kind(value(2)),
            NodeKind::RawExpr { hint: ExprHint::Call { arg: Some(_), .. }, .. }
        ));
        assert!(matches!(p.ast.kind(value(3)), NodeKind::Unary { .. }));
        assert!(matches!(p.ast.kind(value(4)), NodeKind::RawExpr { .. }));
    }
}
