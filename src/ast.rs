//! Arena syntax tree for Go source.
//!
//! Nodes live in a per-file [`Ast`] and are addressed by [`NodeId`]. Splicing a
//! statement list or expanding a field group only rewrites id vectors, so ids
//! held elsewhere (facades, struct fields, imports) stay valid.
//!
//! The tree is deliberately shallow below the declaration level: type
//! expressions are fully structured, function bodies are lists of statements
//! whose declarations are structured and whose other forms are kept as text.

use crate::position::Pos;
use crate::types::ChanDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclTok {
    Import,
    Const,
    Type,
    Var,
}

impl DeclTok {
    pub fn keyword(self) -> &'static str {
        match self {
            DeclTok::Import => "import",
            DeclTok::Const => "const",
            DeclTok::Type => "type",
            DeclTok::Var => "var",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub pos: Pos,
    /// Full comment text including the `//` or `/* */` markers. A comment
    /// produced by a doc edit may hold several `//` lines joined by `\n`.
    pub text: String,
}

/// Source text kept verbatim. Continuation lines are stored relative to the
/// indentation of the line the text started on, unless `reindent` is false
/// (raw string literals must not be touched).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawText {
    pub text: String,
    pub reindent: bool,
}

impl RawText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reindent: true,
        }
    }
}

/// What the resolver may infer from an expression it does not model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprHint {
    Int,
    Float,
    Imag,
    Rune,
    Str,
    Bool,
    Nil,
    Ident(String),
    Selector { pkg: String, name: String },
    /// `f(arg, ...)`; `arg` is the first argument when it is written as a type.
    Call { func: String, arg: Option<NodeId> },
    Conversion { ty: NodeId },
    Other,
}

#[derive(Debug, Clone)]
pub struct FileNode {
    pub doc: Option<NodeId>,
    /// Floating comments above the package clause.
    pub header: Vec<NodeId>,
    pub package: NodeId,
    /// Declarations and floating comments in source order.
    pub decls: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct GenDecl {
    pub doc: Option<NodeId>,
    pub tok: DeclTok,
    pub grouped: bool,
    /// Specs and floating comments in source order.
    pub specs: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub doc: Option<NodeId>,
    pub name: Option<NodeId>,
    /// Quoted path literal as written.
    pub path: String,
    pub comment: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub doc: Option<NodeId>,
    pub names: Vec<NodeId>,
    pub ty: Option<NodeId>,
    pub values: Vec<NodeId>,
    pub comment: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub doc: Option<NodeId>,
    pub name: NodeId,
    pub type_params: Option<String>,
    pub assign: bool,
    pub ty: NodeId,
    pub comment: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub doc: Option<NodeId>,
    pub recv: Option<NodeId>,
    pub name: NodeId,
    pub type_params: Option<String>,
    pub ty: NodeId,
    pub body: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct FuncType {
    pub params: NodeId,
    pub results: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub doc: Option<NodeId>,
    pub names: Vec<NodeId>,
    pub ty: NodeId,
    /// Tag literal as written, including its quotes.
    pub tag: Option<String>,
    pub comment: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    File(FileNode),
    Ident(String),
    CommentGroup(Vec<Comment>),
    /// A comment group standing on its own inside a list. `trailing` groups
    /// continue the line of the previous item.
    Floating { group: NodeId, trailing: bool },

    GenDecl(GenDecl),
    ImportSpec(ImportSpec),
    ValueSpec(ValueSpec),
    TypeSpec(TypeSpec),
    FuncDecl(FuncDecl),
    /// Fields, parameters, interface elements and floating comments.
    FieldList(Vec<NodeId>),
    Field(Field),

    TypeName(String),
    Qualified { pkg: String, name: String },
    Generic { base: NodeId, args: String },
    Pointer(NodeId),
    /// `len` is `None` for `[...]T`.
    Array { len: Option<String>, elem: NodeId },
    Slice(NodeId),
    Map { key: NodeId, value: NodeId },
    Chan { dir: ChanDir, elem: NodeId },
    FuncType(FuncType),
    StructType(NodeId),
    InterfaceType(NodeId),
    Ellipsis(NodeId),
    Paren(NodeId),
    RawType(String),

    FuncLit { ty: NodeId, body: NodeId },
    CompositeLit { ty: Option<NodeId>, body: RawText },
    Unary { op: String, x: NodeId },
    RawExpr { text: RawText, hint: ExprHint },

    Block(Vec<NodeId>),
    DeclStmt(NodeId),
    ShortVar { names: Vec<NodeId>, values: Vec<NodeId> },
    Labeled { label: NodeId, stmt: Option<NodeId> },
    RawStmt(RawText),
}

impl NodeKind {
    /// Calls `f` for every direct child, in source order.
    pub fn for_each_child(&self, f: &mut dyn FnMut(NodeId)) {
        fn opt(o: &Option<NodeId>, f: &mut dyn FnMut(NodeId)) {
            if let Some(id) = o {
                f(*id);
            }
        }
        match self {
            NodeKind::File(n) => {
                opt(&n.doc, f);
                n.header.iter().for_each(|id| f(*id));
                f(n.package);
                n.decls.iter().for_each(|id| f(*id));
            }
            NodeKind::Ident(_) | NodeKind::CommentGroup(_) => {}
            NodeKind::Floating { group, .. } => f(*group),
            NodeKind::GenDecl(d) => {
                opt(&d.doc, f);
                d.specs.iter().for_each(|id| f(*id));
            }
            NodeKind::ImportSpec(s) => {
                opt(&s.doc, f);
                opt(&s.name, f);
                opt(&s.comment, f);
            }
            NodeKind::ValueSpec(s) => {
                opt(&s.doc, f);
                s.names.iter().for_each(|id| f(*id));
                opt(&s.ty, f);
                s.values.iter().for_each(|id| f(*id));
                opt(&s.comment, f);
            }
            NodeKind::TypeSpec(s) => {
                opt(&s.doc, f);
                f(s.name);
                f(s.ty);
                opt(&s.comment, f);
            }
            NodeKind::FuncDecl(d) => {
                opt(&d.doc, f);
                opt(&d.recv, f);
                f(d.name);
                f(d.ty);
                opt(&d.body, f);
            }
            NodeKind::FieldList(items) => items.iter().for_each(|id| f(*id)),
            NodeKind::Field(fl) => {
                opt(&fl.doc, f);
                fl.names.iter().for_each(|id| f(*id));
                f(fl.ty);
                opt(&fl.comment, f);
            }
            NodeKind::TypeName(_) | NodeKind::Qualified { .. } | NodeKind::RawType(_) => {}
            NodeKind::Generic { base, .. } => f(*base),
            NodeKind::Pointer(x)
            | NodeKind::Slice(x)
            | NodeKind::StructType(x)
            | NodeKind::InterfaceType(x)
            | NodeKind::Ellipsis(x)
            | NodeKind::Paren(x) => f(*x),
            NodeKind::Array { elem, .. } => f(*elem),
            NodeKind::Map { key, value } => {
                f(*key);
                f(*value);
            }
            NodeKind::Chan { elem, .. } => f(*elem),
            NodeKind::FuncType(ft) => {
                f(ft.params);
                opt(&ft.results, f);
            }
            NodeKind::FuncLit { ty, body } => {
                f(*ty);
                f(*body);
            }
            NodeKind::CompositeLit { ty, .. } => opt(ty, f),
            NodeKind::Unary { x, .. } => f(*x),
            NodeKind::RawExpr { hint, .. } => match hint {
                ExprHint::Call { arg: Some(arg), .. } => f(*arg),
                ExprHint::Conversion { ty } => f(*ty),
                _ => {}
            },
            NodeKind::Block(stmts) => stmts.iter().for_each(|id| f(*id)),
            NodeKind::DeclStmt(d) => f(*d),
            NodeKind::ShortVar { names, values } => {
                names.iter().for_each(|id| f(*id));
                values.iter().for_each(|id| f(*id));
            }
            NodeKind::Labeled { label, stmt } => {
                f(*label);
                opt(stmt, f);
            }
            NodeKind::RawStmt(_) => {}
        }
    }

    /// Rebuilds the node with every child id passed through `f`.
    pub fn map_children(&self, f: &mut dyn FnMut(NodeId) -> NodeId) -> NodeKind {
        fn opt(o: Option<NodeId>, f: &mut dyn FnMut(NodeId) -> NodeId) -> Option<NodeId> {
            o.map(|id| f(id))
        }
        fn list(v: &[NodeId], f: &mut dyn FnMut(NodeId) -> NodeId) -> Vec<NodeId> {
            v.iter().map(|id| f(*id)).collect()
        }
        match self {
            NodeKind::File(n) => NodeKind::File(FileNode {
                doc: opt(n.doc, f),
                header: list(&n.header, f),
                package: f(n.package),
                decls: list(&n.decls, f),
            }),
            NodeKind::Ident(_) | NodeKind::CommentGroup(_) => self.clone(),
            NodeKind::Floating { group, trailing } => NodeKind::Floating {
                group: f(*group),
                trailing: *trailing,
            },
            NodeKind::GenDecl(d) => NodeKind::GenDecl(GenDecl {
                doc: opt(d.doc, f),
                tok: d.tok,
                grouped: d.grouped,
                specs: list(&d.specs, f),
            }),
            NodeKind::ImportSpec(s) => NodeKind::ImportSpec(ImportSpec {
                doc: opt(s.doc, f),
                name: opt(s.name, f),
                path: s.path.clone(),
                comment: opt(s.comment, f),
            }),
            NodeKind::ValueSpec(s) => NodeKind::ValueSpec(ValueSpec {
                doc: opt(s.doc, f),
                names: list(&s.names, f),
                ty: opt(s.ty, f),
                values: list(&s.values, f),
                comment: opt(s.comment, f),
            }),
            NodeKind::TypeSpec(s) => NodeKind::TypeSpec(TypeSpec {
                doc: opt(s.doc, f),
                name: f(s.name),
                type_params: s.type_params.clone(),
                assign: s.assign,
                ty: f(s.ty),
                comment: opt(s.comment, f),
            }),
            NodeKind::FuncDecl(d) => NodeKind::FuncDecl(FuncDecl {
                doc: opt(d.doc, f),
                recv: opt(d.recv, f),
                name: f(d.name),
                type_params: d.type_params.clone(),
                ty: f(d.ty),
                body: opt(d.body, f),
            }),
            NodeKind::FieldList(items) => NodeKind::FieldList(list(items, f)),
            NodeKind::Field(fl) => NodeKind::Field(Field {
                doc: opt(fl.doc, f),
                names: list(&fl.names, f),
                ty: f(fl.ty),
                tag: fl.tag.clone(),
                comment: opt(fl.comment, f),
            }),
            NodeKind::TypeName(_) | NodeKind::Qualified { .. } | NodeKind::RawType(_) => self.clone(),
            NodeKind::Generic { base, args } => NodeKind::Generic {
                base: f(*base),
                args: args.clone(),
            },
            NodeKind::Pointer(x) => NodeKind::Pointer(f(*x)),
            NodeKind::Slice(x) => NodeKind::Slice(f(*x)),
            NodeKind::StructType(x) => NodeKind::StructType(f(*x)),
            NodeKind::InterfaceType(x) => NodeKind::InterfaceType(f(*x)),
            NodeKind::Ellipsis(x) => NodeKind::Ellipsis(f(*x)),
            NodeKind::Paren(x) => NodeKind::Paren(f(*x)),
            NodeKind::Array { len, elem } => NodeKind::Array {
                len: len.clone(),
                elem: f(*elem),
            },
            NodeKind::Map { key, value } => NodeKind::Map {
                key: f(*key),
                value: f(*value),
            },
            NodeKind::Chan { dir, elem } => NodeKind::Chan {
                dir: *dir,
                elem: f(*elem),
            },
            NodeKind::FuncType(ft) => NodeKind::FuncType(FuncType {
                params: f(ft.params),
                results: opt(ft.results, f),
            }),
            NodeKind::FuncLit { ty, body } => NodeKind::FuncLit {
                ty: f(*ty),
                body: f(*body),
            },
            NodeKind::CompositeLit { ty, body } => NodeKind::CompositeLit {
                ty: opt(*ty, f),
                body: body.clone(),
            },
            NodeKind::Unary { op, x } => NodeKind::Unary {
                op: op.clone(),
                x: f(*x),
            },
            NodeKind::RawExpr { text, hint } => {
                let hint = match hint {
                    ExprHint::Call { func, arg } => ExprHint::Call {
                        func: func.clone(),
                        arg: opt(*arg, f),
                    },
                    ExprHint::Conversion { ty } => ExprHint::Conversion { ty: f(*ty) },
                    other => other.clone(),
                };
                NodeKind::RawExpr {
                    text: text.clone(),
                    hint,
                }
            }
            NodeKind::Block(stmts) => NodeKind::Block(list(stmts, f)),
            NodeKind::DeclStmt(d) => NodeKind::DeclStmt(f(*d)),
            NodeKind::ShortVar { names, values } => NodeKind::ShortVar {
                names: list(names, f),
                values: list(values, f),
            },
            NodeKind::Labeled { label, stmt } => NodeKind::Labeled {
                label: f(*label),
                stmt: opt(*stmt, f),
            },
            NodeKind::RawStmt(t) => NodeKind::RawStmt(t.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub pos: Pos,
    pub end: Pos,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, pos: Pos, end: Pos, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { pos, end, kind });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    pub fn pos(&self, id: NodeId) -> Pos {
        self.nodes[id.index()].pos
    }

    pub fn end(&self, id: NodeId) -> Pos {
        self.nodes[id.index()].end
    }

    /// Name of an identifier node; empty for any other node.
    pub fn ident_name(&self, id: NodeId) -> &str {
        match self.kind(id) {
            NodeKind::Ident(name) => name,
            _ => "",
        }
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.kind(id).for_each_child(&mut |c| out.push(c));
        out
    }

    /// Path from `target` up to `root`, innermost first. `None` when the target
    /// is not reachable from `root`.
    pub fn path_to(&self, root: NodeId, target: NodeId) -> Option<Vec<NodeId>> {
        let mut stack = vec![root];
        if self.find_path(target, &mut stack) {
            stack.reverse();
            Some(stack)
        } else {
            None
        }
    }

    fn find_path(&self, target: NodeId, stack: &mut Vec<NodeId>) -> bool {
        let Some(&top) = stack.last() else { return false };
        if top == target {
            return true;
        }
        for child in self.children(top) {
            stack.push(child);
            if self.find_path(target, stack) {
                return true;
            }
            stack.pop();
        }
        false
    }

    /// Every node of the subtree rooted at `id`, pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            let mut kids = self.children(n);
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    /// Copies the subtree rooted at `id` inside this arena.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let node = self.node(id).clone();
        let kind = node.kind.map_children(&mut |child| self.deep_clone(child));
        self.alloc(node.pos, node.end, kind)
    }

    /// Copies the subtree rooted at `id` of another arena into this one.
    pub fn graft(&mut self, from: &Ast, id: NodeId) -> NodeId {
        let node = from.node(id);
        let kind = node.kind.map_children(&mut |child| self.graft(from, child));
        self.alloc(node.pos, node.end, kind)
    }

    /// Comment groups inside the subtree rooted at `id`.
    pub fn comment_groups(&self, id: NodeId) -> Vec<NodeId> {
        self.subtree(id)
            .into_iter()
            .filter(|n| matches!(self.kind(*n), NodeKind::CommentGroup(_)))
            .collect()
    }

    pub fn comment_group(&self, id: NodeId) -> &[Comment] {
        match self.kind(id) {
            NodeKind::CommentGroup(list) => list,
            _ => &[],
        }
    }

    pub fn file(&self, root: NodeId) -> Option<&FileNode> {
        match self.kind(root) {
            NodeKind::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn file_mut(&mut self, root: NodeId) -> Option<&mut FileNode> {
        match self.kind_mut(root) {
            NodeKind::File(f) => Some(f),
            _ => None,
        }
    }

    /// Position of the first token of a node including its doc comment.
    pub fn leading_pos(&self, id: NodeId) -> Pos {
        let doc = match self.kind(id) {
            NodeKind::GenDecl(d) => d.doc,
            NodeKind::FuncDecl(d) => d.doc,
            NodeKind::ImportSpec(s) => s.doc,
            NodeKind::ValueSpec(s) => s.doc,
            NodeKind::TypeSpec(s) => s.doc,
            NodeKind::Field(f) => f.doc,
            _ => None,
        };
        match doc {
            Some(d) if self.pos(d).is_valid() => self.pos(d),
            _ => self.pos(id),
        }
    }

    /// Base type name of a receiver or embedded field type: `*T`, `T[K]`,
    /// `pkg.T` all yield `T`.
    pub fn base_type_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::TypeName(n) => Some(n),
            NodeKind::Qualified { name, .. } => Some(name),
            NodeKind::Pointer(x) | NodeKind::Paren(x) => self.base_type_name(*x),
            NodeKind::Generic { base, .. } => self.base_type_name(*base),
            _ => None,
        }
    }
}

/// Text of a comment group the way `go/ast` reports it: markers removed,
/// directives dropped, blank lines collapsed, one trailing newline.
pub fn comment_text(list: &[Comment]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for c in list {
        if let Some(body) = c.text.strip_prefix("/*") {
            let body = body.strip_suffix("*/").unwrap_or(body);
            lines.extend(body.lines().map(|l| l.trim_end().to_string()));
            continue;
        }
        for raw in c.text.split('\n') {
            let Some(line) = raw.trim_start().strip_prefix("//") else {
                lines.push(raw.trim_end().to_string());
                continue;
            };
            if is_directive(line) {
                continue;
            }
            let line = line.strip_prefix(' ').unwrap_or(line);
            lines.push(line.trim_end().to_string());
        }
    }

    let mut out: Vec<String> = Vec::new();
    for line in lines {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    if out.is_empty() {
        return String::new();
    }
    let mut text = out.join("\n");
    text.push('\n');
    text
}

fn is_directive(line: &str) -> bool {
    if line.starts_with("line ") || line.starts_with("extern ") || line.starts_with("export ") {
        return true;
    }
    // //go:generate, //nolint:all and friends.
    match line.split_once(':') {
        Some((head, rest)) => {
            !head.is_empty()
                && rest.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
                && head.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(text: &str) -> Comment {
        Comment {
            pos: Pos::NONE,
            text: text.to_string(),
        }
    }

    #[test]
    fn comment_text_strips_markers() {
        let list = vec![comment("// Hello world."), comment("//"), comment("// Second.")];
        assert_eq!(comment_text(&list), "Hello world.\n\nSecond.\n");

        let block = vec![comment("/* block\n   text */")];
        assert_eq!(comment_text(&block), " block\n   text\n");
    }

    #[test]
    fn comment_text_drops_directives() {
        let list = vec![comment("//go:generate stringer"), comment("// Kind doc")];
        assert_eq!(comment_text(&list), "Kind doc\n");
        assert_eq!(comment_text(&[comment("//")]), "");
    }

    #[test]
    fn deep_clone_copies_children() {
        let mut ast = Ast::new();
        let elem = ast.alloc(Pos(1), Pos(4), NodeKind::TypeName("int".into()));
        let slice = ast.alloc(Pos(1), Pos(6), NodeKind::Slice(elem));
        let copy = ast.deep_clone(slice);
        assert_ne!(copy, slice);
        let NodeKind::Slice(inner) = ast.kind(copy) else { panic!("not a slice") };
        assert_ne!(*inner, elem);
        assert!(matches!(ast.kind(*inner), NodeKind::TypeName(n) if n == "int"));
    }

    #[test]
    fn path_to_is_innermost_first() {
        let mut ast = Ast::new();
        let elem = ast.alloc(Pos(1), Pos(4), NodeKind::TypeName("int".into()));
        let ptr = ast.alloc(Pos(1), Pos(5), NodeKind::Pointer(elem));
        let slice = ast.alloc(Pos(1), Pos(7), NodeKind::Slice(ptr));
        assert_eq!(ast.path_to(slice, elem), Some(vec![elem, ptr, slice]));
        assert_eq!(ast.base_type_name(ptr), Some("int"));
    }
}
