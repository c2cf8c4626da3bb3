//! gofmt-style rendering of the arena tree.
//!
//! Indentation uses tabs. Rows of a list (struct fields, grouped specs,
//! statements with line comments) are aligned in columns following the
//! elastic tabstop rules of `text/tabwriter` with empty columns discarded.
//! Blank lines come from the source positions, capped at one.
//!
//! Every rendering function returns text whose first line carries no
//! indentation and whose continuation lines carry absolute indentation for the
//! given depth, so results nest without post-processing.

use crate::ast::{Ast, DeclTok, Field, FuncDecl, GenDecl, NodeId, NodeKind, RawText};
use crate::position::{FileSet, Pos};

/// Largest field or method rendered inline in a one-line struct or interface.
const MAX_INLINE_FIELD: usize = 30;
/// Largest function header plus body rendered on one line.
const MAX_INLINE_BODY: usize = 100;

enum Row {
    /// Aligned cells; only the last cell may span lines.
    Cells(Vec<String>),
    /// Text outside the column layout. Ends the current alignment block.
    Text(String),
}

struct Entry {
    newlines: usize,
    row: Row,
    /// Printed one level left of the list (labels).
    dedent: bool,
}

fn indent(depth: usize) -> String {
    "\t".repeat(depth)
}

pub struct Printer<'a> {
    ast: &'a Ast,
    fset: &'a FileSet,
}

impl<'a> Printer<'a> {
    pub fn new(ast: &'a Ast, fset: &'a FileSet) -> Self {
        Self { ast, fset }
    }

    /// Renders a whole file, ending with a newline.
    pub fn file(&self, root: NodeId) -> String {
        let Some(file) = self.ast.file(root) else {
            return self.node(root);
        };
        let mut out = String::new();
        for h in &file.header {
            out.push_str(&self.node_at(*h, 0));
            out.push_str("\n\n");
        }
        if let Some(doc) = file.doc {
            out.push_str(&self.comment_group(doc, 0));
            out.push('\n');
        }
        out.push_str("package ");
        out.push_str(self.ast.ident_name(file.package));

        let mut prev_end = self.ast.end(file.package);
        for &decl in &file.decls {
            if let NodeKind::Floating { group, trailing: true } = self.ast.kind(decl) {
                out.push(' ');
                out.push_str(&self.comment_group(*group, 0));
                prev_end = self.ast.end(decl);
                continue;
            }
            let n = self.newlines(prev_end, decl, 2);
            out.push_str(&"\n".repeat(n));
            out.push_str(&self.node_at(decl, 0));
            prev_end = self.ast.end(decl);
        }
        out.push('\n');
        out
    }

    /// Renders any node at depth zero.
    pub fn node(&self, id: NodeId) -> String {
        self.node_at(id, 0)
    }

    pub fn node_at(&self, id: NodeId, depth: usize) -> String {
        match self.ast.kind(id) {
            NodeKind::File(_) => self.file(id),
            NodeKind::Ident(name) => name.clone(),
            NodeKind::CommentGroup(_) => self.comment_group(id, depth),
            NodeKind::Floating { group, .. } => self.comment_group(*group, depth),
            NodeKind::GenDecl(d) => self.gen_decl(d, depth),
            NodeKind::FuncDecl(d) => self.func_decl(d, depth),
            NodeKind::ImportSpec(_) | NodeKind::ValueSpec(_) | NodeKind::TypeSpec(_) => {
                let doc = self.doc_of(id);
                self.with_doc(doc, depth, self.single_spec(id, depth))
            }
            NodeKind::Field(f) => {
                let cells = self.field_cells(f, depth);
                let line = align(&[cells]).pop().unwrap_or_default();
                self.with_doc(f.doc, depth, line)
            }
            NodeKind::FieldList(_) => self.params(id, depth),
            NodeKind::Block(_) => self.block(id, depth),
            NodeKind::DeclStmt(_)
            | NodeKind::ShortVar { .. }
            | NodeKind::Labeled { .. }
            | NodeKind::RawStmt(_) => self.stmt(id, depth),
            NodeKind::FuncLit { .. }
            | NodeKind::CompositeLit { .. }
            | NodeKind::Unary { .. }
            | NodeKind::RawExpr { .. } => self.expr(id, depth),
            _ => self.ty(id, depth),
        }
    }

    // -----------------------------------------------------------------------
    // Layout helpers
    // -----------------------------------------------------------------------

    fn doc_of(&self, id: NodeId) -> Option<NodeId> {
        match self.ast.kind(id) {
            NodeKind::GenDecl(d) => d.doc,
            NodeKind::FuncDecl(d) => d.doc,
            NodeKind::ImportSpec(s) => s.doc,
            NodeKind::ValueSpec(s) => s.doc,
            NodeKind::TypeSpec(s) => s.doc,
            NodeKind::Field(f) => f.doc,
            NodeKind::DeclStmt(d) => self.doc_of(*d),
            _ => None,
        }
    }

    /// Where a node starts in the source, counting a doc comment that was
    /// part of the source. Docs added later carry no position.
    fn leading_pos(&self, id: NodeId) -> Pos {
        match self.doc_of(id) {
            Some(d) if self.ast.pos(d).is_valid() => self.ast.pos(d),
            _ => self.ast.pos(id),
        }
    }

    /// Line breaks before `id`: the source distance from `prev_end`, at least
    /// one and at most two. `default` applies to nodes without positions.
    fn newlines(&self, prev_end: Pos, id: NodeId, default: usize) -> usize {
        let pos = self.leading_pos(id);
        if !self.fset.same_file(prev_end, pos) {
            return default;
        }
        let line = self.fset.line(pos);
        line.saturating_sub(self.fset.line(prev_end)).clamp(1, 2)
    }

    fn one_line(&self, id: NodeId) -> bool {
        let (pos, end) = (self.ast.pos(id), self.ast.end(id));
        if !pos.is_valid() || !end.is_valid() {
            return true;
        }
        self.fset.line(pos) == self.fset.line(end)
    }

    fn with_doc(&self, doc: Option<NodeId>, depth: usize, text: String) -> String {
        match doc {
            Some(d) => format!("{}\n{}{}", self.comment_group(d, depth), indent(depth), text),
            None => text,
        }
    }

    fn comment_group(&self, id: NodeId, depth: usize) -> String {
        let mut out = String::new();
        let mut prev_line: Option<usize> = None;
        for c in self.ast.comment_group(id) {
            let line = self.fset.line(c.pos);
            if let Some(prev) = prev_line {
                if line != 0 && line == prev {
                    out.push(' ');
                } else {
                    out.push('\n');
                    out.push_str(&indent(depth));
                }
            }
            if c.text.starts_with("//") {
                for (i, l) in c.text.split('\n').enumerate() {
                    if i > 0 {
                        out.push('\n');
                        out.push_str(&indent(depth));
                    }
                    out.push_str(l.trim());
                }
            } else {
                out.push_str(&c.text);
            }
            prev_line = Some(line + c.text.matches('\n').count());
        }
        out
    }

    /// Entries of a delimited list. Trailing comments join the previous row;
    /// a trailing comment right after the opening token lands in `head`.
    fn list_entries(
        &self,
        items: &[NodeId],
        depth: usize,
        head: &mut String,
        make_row: &dyn Fn(NodeId) -> (Row, bool),
    ) -> Vec<Entry> {
        let mut entries: Vec<Entry> = Vec::new();
        let mut prev_end: Option<Pos> = None;
        for &item in items {
            if let NodeKind::Floating { group, trailing: true } = self.ast.kind(item) {
                let text = self.comment_group(*group, depth);
                match entries.last_mut().map(|e| &mut e.row) {
                    Some(Row::Cells(cells)) => cells.push(text),
                    Some(Row::Text(t)) => {
                        t.push(' ');
                        t.push_str(&text);
                    }
                    None => {
                        head.push(' ');
                        head.push_str(&text);
                    }
                }
                prev_end = Some(self.ast.end(item));
                continue;
            }
            let newlines = match prev_end {
                Some(end) => self.newlines(end, item, 1),
                None => 1,
            };
            // declaration statements render their own doc
            let doc = match self.ast.kind(item) {
                NodeKind::Floating { .. } | NodeKind::DeclStmt(_) => None,
                _ => self.doc_of(item),
            };
            let (row, dedent) = make_row(item);
            match doc {
                Some(d) => {
                    entries.push(Entry {
                        newlines,
                        row: Row::Text(self.comment_group(d, depth)),
                        dedent: false,
                    });
                    entries.push(Entry {
                        newlines: 1,
                        row,
                        dedent,
                    });
                }
                None => entries.push(Entry { newlines, row, dedent }),
            }
            prev_end = Some(self.ast.end(item));
        }
        entries
    }

    fn render(&self, entries: &[Entry], depth: usize) -> String {
        let mut texts = vec![String::new(); entries.len()];
        let mut i = 0;
        while i < entries.len() {
            if let Row::Text(t) = &entries[i].row {
                texts[i] = t.clone();
                i += 1;
                continue;
            }
            let start = i;
            i += 1;
            while i < entries.len() && entries[i].newlines == 1 && !entries[i].dedent {
                match (&entries[i].row, &entries[i - 1].row) {
                    (Row::Cells(_), Row::Cells(prev)) if !prev.iter().any(|c| c.contains('\n')) => i += 1,
                    _ => break,
                }
            }
            let rows: Vec<Vec<String>> = entries[start..i]
                .iter()
                .filter_map(|e| match &e.row {
                    Row::Cells(c) => Some(c.clone()),
                    Row::Text(_) => None,
                })
                .collect();
            for (k, text) in align(&rows).into_iter().enumerate() {
                texts[start + k] = text;
            }
        }

        let mut out = String::new();
        for (e, text) in entries.iter().zip(texts) {
            out.push_str(&"\n".repeat(e.newlines));
            let d = if e.dedent { depth.saturating_sub(1) } else { depth };
            out.push_str(&indent(d));
            out.push_str(&text);
        }
        out
    }

    /// Raw statement or expression text at `depth`. Continuation lines
    /// take one level per line that left brackets open, and never less than
    /// they had; `case`, `default` and labels sit one level out.
    fn reindent(&self, text: &RawText, depth: usize) -> String {
        if !text.reindent {
            return text.text.clone();
        }
        let mut tidy = Tidy::default();
        let mut out = String::with_capacity(text.text.len());
        for (i, line) in text.text.split('\n').enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if tidy.in_comment {
                tidy.line(line);
                if !line.trim().is_empty() {
                    out.push_str(&indent(depth));
                    out.push_str(line.trim_end());
                }
                continue;
            }
            let tabs = line.len() - line.trim_start_matches('\t').len();
            let (mut level, code) = tidy.line(line);
            if i == 0 {
                out.push_str(&code);
                continue;
            }
            if code.is_empty() {
                continue;
            }
            if dedents(&code) {
                level = level.saturating_sub(1);
            }
            out.push_str(&indent(depth + level.max(tabs)));
            out.push_str(&code);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn gen_decl(&self, d: &GenDecl, depth: usize) -> String {
        let mut out = d.tok.keyword().to_string();
        if !d.grouped {
            if let Some(spec) = d
                .specs
                .iter()
                .find(|s| !matches!(self.ast.kind(**s), NodeKind::Floating { .. }))
            {
                out.push(' ');
                out.push_str(&self.single_spec(*spec, depth));
            }
            return self.with_doc(d.doc, depth, out);
        }
        if d.specs.is_empty() {
            out.push_str(" ()");
            return self.with_doc(d.doc, depth, out);
        }

        let keep = if matches!(d.tok, DeclTok::Const | DeclTok::Var) {
            self.keep_type_column(&d.specs)
        } else {
            Vec::new()
        };
        let mut head = " (".to_string();
        let entries = self.list_entries(&d.specs, depth + 1, &mut head, &|spec| {
            let keep_type = d
                .specs
                .iter()
                .position(|s| *s == spec)
                .and_then(|i| keep.get(i).copied())
                .unwrap_or(false);
            (self.spec_row(spec, depth + 1, keep_type), false)
        });
        out.push_str(&head);
        out.push_str(&self.render(&entries, depth + 1));
        out.push('\n');
        out.push_str(&indent(depth));
        out.push(')');
        self.with_doc(d.doc, depth, out)
    }

    /// Marks value specs whose type column must stay in place: runs of specs
    /// with values keep the column when any spec of the run has a type.
    fn keep_type_column(&self, specs: &[NodeId]) -> Vec<bool> {
        let mut keep = vec![false; specs.len()];
        let mut run_start: Option<usize> = None;
        let mut keep_type = false;
        for (i, spec) in specs.iter().enumerate() {
            let NodeKind::ValueSpec(s) = self.ast.kind(*spec) else { continue };
            if !s.values.is_empty() {
                if run_start.is_none() {
                    run_start = Some(i);
                    keep_type = false;
                }
            } else if let Some(start) = run_start.take() {
                if keep_type {
                    keep[start..i].iter_mut().for_each(|k| *k = true);
                }
            }
            if s.ty.is_some() {
                keep_type = true;
            }
        }
        if let (Some(start), true) = (run_start, keep_type) {
            keep[start..].iter_mut().for_each(|k| *k = true);
        }
        keep
    }

    fn spec_row(&self, spec: NodeId, depth: usize, keep_type: bool) -> Row {
        match self.ast.kind(spec) {
            NodeKind::ImportSpec(s) => {
                let mut cells = vec![self.import_text(s.name, &s.path)];
                if let Some(c) = s.comment {
                    cells.push(self.comment_group(c, depth));
                }
                Row::Cells(cells)
            }
            NodeKind::ValueSpec(s) => {
                let mut cells = vec![self.names(&s.names)];
                let mut extra = 3;
                if s.ty.is_some() || keep_type {
                    cells.push(s.ty.map(|t| self.ty(t, depth)).unwrap_or_default());
                    extra -= 1;
                }
                if !s.values.is_empty() {
                    cells.push(format!("= {}", self.exprs(&s.values, depth)));
                    extra -= 1;
                }
                if let Some(c) = s.comment {
                    for _ in 1..extra {
                        cells.push(String::new());
                    }
                    cells.push(self.comment_group(c, depth));
                }
                Row::Cells(cells)
            }
            NodeKind::TypeSpec(s) => {
                let mut name = self.ast.ident_name(s.name).to_string();
                name.push_str(s.type_params.as_deref().unwrap_or_default());
                let assign = if s.assign { "= " } else { "" };
                let mut cells = vec![name, format!("{assign}{}", self.ty(s.ty, depth))];
                if let Some(c) = s.comment {
                    cells.push(self.comment_group(c, depth));
                }
                Row::Cells(cells)
            }
            NodeKind::Floating { group, .. } => Row::Text(self.comment_group(*group, depth)),
            _ => Row::Text(self.node_at(spec, depth)),
        }
    }

    fn single_spec(&self, spec: NodeId, depth: usize) -> String {
        let (text, comment) = match self.ast.kind(spec) {
            NodeKind::ImportSpec(s) => (self.import_text(s.name, &s.path), s.comment),
            NodeKind::ValueSpec(s) => {
                let mut text = self.names(&s.names);
                if let Some(t) = s.ty {
                    text.push(' ');
                    text.push_str(&self.ty(t, depth));
                }
                if !s.values.is_empty() {
                    text.push_str(" = ");
                    text.push_str(&self.exprs(&s.values, depth));
                }
                (text, s.comment)
            }
            NodeKind::TypeSpec(s) => {
                let mut text = self.ast.ident_name(s.name).to_string();
                text.push_str(s.type_params.as_deref().unwrap_or_default());
                text.push(' ');
                if s.assign {
                    text.push_str("= ");
                }
                text.push_str(&self.ty(s.ty, depth));
                (text, s.comment)
            }
            _ => (self.node_at(spec, depth), None),
        };
        match comment {
            Some(c) => format!("{text} {}", self.comment_group(c, depth)),
            None => text,
        }
    }

    fn import_text(&self, name: Option<NodeId>, path: &str) -> String {
        match name {
            Some(n) => format!("{} {path}", self.ast.ident_name(n)),
            None => path.to_string(),
        }
    }

    fn names(&self, names: &[NodeId]) -> String {
        names
            .iter()
            .map(|n| self.ast.ident_name(*n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn exprs(&self, values: &[NodeId], depth: usize) -> String {
        values
            .iter()
            .map(|v| self.expr(*v, depth))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// A spec shown on its own: keyword, spec and doc.
    pub fn spec_decl(&self, tok: DeclTok, spec: NodeId) -> String {
        let text = format!("{} {}", tok.keyword(), self.single_spec(spec, 0));
        self.with_doc(self.doc_of(spec), 0, text)
    }

    /// Header of a function declaration or literal, up to the body.
    pub fn func_header(&self, id: NodeId) -> String {
        match self.ast.kind(id) {
            NodeKind::FuncDecl(d) => self.decl_header(d, 0),
            NodeKind::FuncLit { ty, .. } => format!("func{}", self.signature(*ty, 0)),
            NodeKind::FuncType(_) => format!("func{}", self.signature(id, 0)),
            _ => String::new(),
        }
    }

    fn decl_header(&self, d: &FuncDecl, depth: usize) -> String {
        let mut header = "func ".to_string();
        if let Some(recv) = d.recv {
            header.push_str(&self.params(recv, depth));
            header.push(' ');
        }
        header.push_str(self.ast.ident_name(d.name));
        header.push_str(d.type_params.as_deref().unwrap_or_default());
        header.push_str(&self.signature(d.ty, depth));
        header
    }

    fn func_decl(&self, d: &FuncDecl, depth: usize) -> String {
        let header = self.decl_header(d, depth);
        let mut out = header.clone();
        if let Some(body) = d.body {
            out.push(' ');
            out.push_str(&self.func_body(body, header.chars().count(), depth));
        }
        self.with_doc(d.doc, depth, out)
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    /// `(params) results` of a FuncType node.
    fn signature(&self, id: NodeId, depth: usize) -> String {
        let NodeKind::FuncType(ft) = self.ast.kind(id) else {
            return String::new();
        };
        let mut out = self.params(ft.params, depth);
        let Some(results) = ft.results else { return out };
        match self.ast.kind(results) {
            NodeKind::FieldList(items) => {
                let fields: Vec<&Field> = items
                    .iter()
                    .filter_map(|i| match self.ast.kind(*i) {
                        NodeKind::Field(f) => Some(f),
                        _ => None,
                    })
                    .collect();
                match fields.as_slice() {
                    [] => {}
                    [single] if single.names.is_empty() => {
                        out.push(' ');
                        out.push_str(&self.ty(single.ty, depth));
                    }
                    _ => {
                        out.push(' ');
                        out.push_str(&self.params(results, depth));
                    }
                }
            }
            _ => {
                out.push(' ');
                out.push_str(&self.ty(results, depth));
            }
        }
        out
    }

    fn params(&self, list: NodeId, depth: usize) -> String {
        let NodeKind::FieldList(items) = self.ast.kind(list) else {
            return "()".to_string();
        };
        let parts: Vec<String> = items
            .iter()
            .filter_map(|i| match self.ast.kind(*i) {
                NodeKind::Field(f) if f.names.is_empty() => Some(self.ty(f.ty, depth)),
                NodeKind::Field(f) => Some(format!("{} {}", self.names(&f.names), self.ty(f.ty, depth))),
                _ => None,
            })
            .collect();
        format!("({})", parts.join(", "))
    }

    pub fn ty(&self, id: NodeId, depth: usize) -> String {
        match self.ast.kind(id) {
            NodeKind::TypeName(n) | NodeKind::Ident(n) | NodeKind::RawType(n) => n.clone(),
            NodeKind::Qualified { pkg, name } => format!("{pkg}.{name}"),
            NodeKind::Generic { base, args } => format!("{}{args}", self.ty(*base, depth)),
            NodeKind::Pointer(x) => format!("*{}", self.ty(*x, depth)),
            NodeKind::Array { len, elem } => match len {
                Some(n) => format!("[{n}]{}", self.ty(*elem, depth)),
                None => format!("[...]{}", self.ty(*elem, depth)),
            },
            NodeKind::Slice(x) => format!("[]{}", self.ty(*x, depth)),
            NodeKind::Map { key, value } => format!("map[{}]{}", self.ty(*key, depth), self.ty(*value, depth)),
            NodeKind::Chan { dir, elem } => {
                let prefix = match dir {
                    crate::types::ChanDir::SendRecv => "chan ",
                    crate::types::ChanDir::SendOnly => "chan<- ",
                    crate::types::ChanDir::RecvOnly => "<-chan ",
                };
                format!("{prefix}{}", self.ty(*elem, depth))
            }
            NodeKind::FuncType(_) => format!("func{}", self.signature(id, depth)),
            NodeKind::StructType(list) => self.composite_type(id, *list, "struct", depth),
            NodeKind::InterfaceType(list) => self.composite_type(id, *list, "interface", depth),
            NodeKind::Ellipsis(x) => format!("...{}", self.ty(*x, depth)),
            NodeKind::Paren(x) => format!("({})", self.ty(*x, depth)),
            _ => String::new(),
        }
    }

    fn composite_type(&self, id: NodeId, list: NodeId, keyword: &str, depth: usize) -> String {
        let items: &[NodeId] = match self.ast.kind(list) {
            NodeKind::FieldList(items) => items,
            _ => &[],
        };
        let fields: Vec<&Field> = items
            .iter()
            .filter_map(|i| match self.ast.kind(*i) {
                NodeKind::Field(f) => Some(f),
                _ => None,
            })
            .collect();
        let has_comments =
            fields.len() != items.len() || fields.iter().any(|f| f.doc.is_some() || f.comment.is_some());
        let one_line = self.one_line(id);

        if !has_comments && one_line {
            if fields.is_empty() {
                return format!("{keyword}{{}}");
            }
            if let [f] = fields.as_slice() {
                if let Some(inline) = self.inline_field(f, keyword == "interface", depth) {
                    return format!("{keyword}{{ {inline} }}");
                }
            }
        }
        if items.is_empty() {
            return format!("{keyword} {{\n{}}}", indent(depth));
        }

        let mut head = format!("{keyword} {{");
        let entries = self.list_entries(items, depth + 1, &mut head, &|item| match self.ast.kind(item) {
            NodeKind::Field(f) if keyword == "interface" => (Row::Cells(self.method_cells(f, depth + 1)), false),
            NodeKind::Field(f) => (Row::Cells(self.field_cells(f, depth + 1)), false),
            _ => (Row::Text(self.node_at(item, depth + 1)), false),
        });
        format!("{head}{}\n{}}}", self.render(&entries, depth + 1), indent(depth))
    }

    fn inline_field(&self, f: &Field, interface: bool, depth: usize) -> Option<String> {
        if f.tag.is_some() {
            return None;
        }
        let (text, size) = if interface {
            let text = self.method_cells(f, depth).join(" ");
            let size = text.chars().count();
            (text, size)
        } else {
            let ty = self.ty(f.ty, depth);
            let size = ty.chars().count();
            if f.names.is_empty() {
                (ty, size)
            } else {
                (format!("{} {ty}", self.names(&f.names)), size + 1)
            }
        };
        (!text.contains('\n') && size <= MAX_INLINE_FIELD).then_some(text)
    }

    fn field_cells(&self, f: &Field, depth: usize) -> Vec<String> {
        let ty = self.ty(f.ty, depth);
        let comment = f.comment.map(|c| self.comment_group(c, depth));
        let mut cells = Vec::new();
        if f.names.is_empty() {
            cells.push(ty);
            match (&f.tag, comment) {
                (Some(tag), c) => {
                    cells.push(tag.clone());
                    cells.extend(c);
                }
                (None, Some(c)) => cells.extend([String::new(), String::new(), c]),
                (None, None) => {}
            }
        } else {
            cells.push(self.names(&f.names));
            cells.push(ty);
            match (&f.tag, comment) {
                (Some(tag), c) => {
                    cells.extend([String::new(), tag.clone()]);
                    cells.extend(c);
                }
                (None, Some(c)) => cells.extend([String::new(), c]),
                (None, None) => {}
            }
        }
        cells
    }

    fn method_cells(&self, f: &Field, depth: usize) -> Vec<String> {
        let text = match f.names.first() {
            Some(name) => format!("{}{}", self.ast.ident_name(*name), self.signature(f.ty, depth)),
            None => self.ty(f.ty, depth),
        };
        let mut cells = vec![text];
        cells.extend(f.comment.map(|c| self.comment_group(c, depth)));
        cells
    }

    // -----------------------------------------------------------------------
    // Statements and expressions
    // -----------------------------------------------------------------------

    /// Body of a function declaration or literal. Small bodies whose braces
    /// sit on one line stay on one line.
    fn func_body(&self, id: NodeId, header: usize, depth: usize) -> String {
        let NodeKind::Block(stmts) = self.ast.kind(id) else {
            return self.node_at(id, depth);
        };
        let simple = stmts.len() <= 5
            && stmts
                .iter()
                .all(|s| !matches!(self.ast.kind(*s), NodeKind::Floating { .. } | NodeKind::Labeled { .. }));
        if self.one_line(id) && simple {
            let parts: Vec<String> = stmts.iter().map(|s| self.stmt(*s, depth + 1)).collect();
            let size = header + parts.iter().map(|p| p.chars().count()).sum::<usize>() + 2 * parts.len().saturating_sub(1);
            if parts.iter().all(|p| !p.contains('\n')) && size <= MAX_INLINE_BODY {
                return if parts.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{ {} }}", parts.join("; "))
                };
            }
        }
        self.block(id, depth)
    }

    fn block(&self, id: NodeId, depth: usize) -> String {
        let stmts: &[NodeId] = match self.ast.kind(id) {
            NodeKind::Block(stmts) => stmts,
            _ => &[],
        };
        if stmts.is_empty() {
            return if self.one_line(id) {
                "{}".to_string()
            } else {
                format!("{{\n{}}}", indent(depth))
            };
        }
        let mut head = "{".to_string();
        let entries = self.list_entries(stmts, depth + 1, &mut head, &|s| {
            let dedent = matches!(self.ast.kind(s), NodeKind::Labeled { .. });
            (Row::Cells(vec![self.stmt(s, depth + 1)]), dedent)
        });
        format!("{head}{}\n{}}}", self.render(&entries, depth + 1), indent(depth))
    }

    fn stmt(&self, id: NodeId, depth: usize) -> String {
        match self.ast.kind(id) {
            NodeKind::RawStmt(text) => self.reindent(text, depth),
            NodeKind::DeclStmt(d) => self.node_at(*d, depth),
            NodeKind::ShortVar { names, values } => {
                format!("{} := {}", self.names(names), self.exprs(values, depth))
            }
            NodeKind::Labeled { label, stmt } => {
                let mut out = format!("{}:", self.ast.ident_name(*label));
                if let Some(s) = stmt {
                    out.push('\n');
                    out.push_str(&indent(depth));
                    out.push_str(&self.stmt(*s, depth));
                }
                out
            }
            NodeKind::Floating { group, .. } => self.comment_group(*group, depth),
            NodeKind::Block(_) => self.block(id, depth),
            _ => self.expr(id, depth),
        }
    }

    fn expr(&self, id: NodeId, depth: usize) -> String {
        match self.ast.kind(id) {
            NodeKind::RawExpr { text, .. } => self.reindent(text, depth),
            NodeKind::FuncLit { ty, body } => {
                let header = format!("func{}", self.signature(*ty, depth));
                let body = self.func_body(*body, header.chars().count(), depth);
                format!("{header} {body}")
            }
            NodeKind::CompositeLit { ty, body } => {
                let ty = ty.map(|t| self.ty(t, depth)).unwrap_or_default();
                format!("{ty}{}", self.reindent(body, depth))
            }
            NodeKind::Unary { op, x } => format!("{op}{}", self.expr(*x, depth)),
            NodeKind::Ident(name) => name.clone(),
            _ => self.ty(id, depth),
        }
    }
}

const ASSIGN_OPS: [&str; 13] = ["", ":", "+", "-", "*", "/", "%", "&", "|", "^", "<<", ">>", "&^"];

/// Line-by-line state for raw code: open block comments and the brackets
/// left open, grouped by the line that opened them.
#[derive(Default)]
struct Tidy {
    in_comment: bool,
    open: Vec<usize>,
}

impl Tidy {
    /// Returns the nesting level of `line` and its text with gofmt spacing:
    /// one space around assignment operators and one after commas and
    /// semicolons. Literals and comments are copied as they are.
    fn line(&mut self, line: &str) -> (usize, String) {
        let chars: Vec<char> = line.trim().chars().collect();
        let mut out = String::with_capacity(line.len());
        let mut level = self.open.len();
        let mut leading = true;
        let mut opened = 0usize;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            if self.in_comment {
                out.push(c);
                if c == '*' && next == Some('/') {
                    out.push('/');
                    i += 1;
                    self.in_comment = false;
                }
                i += 1;
                continue;
            }
            match c {
                '/' if next == Some('/') => {
                    out.extend(chars[i..].iter());
                    break;
                }
                '/' if next == Some('*') => {
                    out.push_str("/*");
                    self.in_comment = true;
                    leading = false;
                    i += 2;
                    continue;
                }
                '"' | '\'' => {
                    let end = literal_end(&chars, i);
                    out.extend(chars[i..end].iter());
                    leading = false;
                    i = end;
                    continue;
                }
                '(' | '[' | '{' => {
                    opened += 1;
                    leading = false;
                }
                ')' | ']' | '}' => {
                    if opened > 0 {
                        opened -= 1;
                    } else if let Some(top) = self.open.last_mut() {
                        *top -= 1;
                        if *top == 0 {
                            self.open.pop();
                        }
                    }
                    if leading {
                        level = self.open.len();
                    }
                }
                ',' | ';' => {
                    out.push(c);
                    if next.is_some_and(|n| !n.is_whitespace() && !matches!(n, ')' | ']' | '}' | ';')) {
                        out.push(' ');
                    }
                    leading = false;
                    i += 1;
                    continue;
                }
                '=' if next == Some('=') => {
                    out.push_str("==");
                    leading = false;
                    i += 2;
                    continue;
                }
                '=' => {
                    let start = out.trim_end_matches(|o: char| "+-*/%&|^<>:!".contains(o)).len();
                    if ASSIGN_OPS.contains(&&out[start..]) {
                        let op = format!("{}=", &out[start..]);
                        out.truncate(start);
                        out.truncate(out.trim_end().len());
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(&op);
                        i += 1;
                        while chars.get(i).is_some_and(|n| n.is_whitespace()) {
                            i += 1;
                        }
                        if i < chars.len() {
                            out.push(' ');
                        }
                        leading = false;
                        continue;
                    }
                    leading = false;
                }
                _ if !c.is_whitespace() => leading = false,
                _ => {}
            }
            out.push(c);
            i += 1;
        }
        if opened > 0 {
            self.open.push(opened);
        }
        (level, out.trim_end().to_string())
    }
}

/// Index just past the string or rune literal starting at `start`.
fn literal_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

/// `case x:`, `default:` and bare labels sit one level left of their block.
fn dedents(code: &str) -> bool {
    if code.starts_with("case ") || code.starts_with("default:") {
        return true;
    }
    match code.strip_suffix(':') {
        Some(label) => !label.is_empty() && label.chars().all(|c| c.is_alphanumeric() || c == '_'),
        None => false,
    }
}

/// Aligns rows of cells in columns. A column block is a run of consecutive
/// rows that all have a cell in that column followed by another cell; the
/// block is as wide as its widest cell plus one. Blocks whose cells are all
/// empty take no space.
fn align(rows: &[Vec<String>]) -> Vec<String> {
    let rows: Vec<Vec<String>> = rows.iter().map(|r| merge_multiline(r)).collect();
    let mut out = vec![String::new(); rows.len()];
    let mut widths = Vec::new();
    format_block(&rows, 0, rows.len(), &mut widths, &mut out);
    out
}

/// Cells after the first multi-line cell continue its last line.
fn merge_multiline(row: &[String]) -> Vec<String> {
    match row.iter().position(|c| c.contains('\n')) {
        Some(k) if k + 1 < row.len() => {
            let mut cells = row[..k].to_vec();
            let tail: Vec<&str> = row[k..].iter().map(String::as_str).filter(|c| !c.is_empty()).collect();
            cells.push(tail.join(" "));
            cells
        }
        _ => row.to_vec(),
    }
}

fn format_block(rows: &[Vec<String>], line0: usize, line1: usize, widths: &mut Vec<usize>, out: &mut [String]) {
    let column = widths.len();
    let mut line0 = line0;
    let mut this = line0;
    while this < line1 {
        if column + 1 >= rows[this].len() {
            this += 1;
            continue;
        }
        write_lines(rows, line0, this, widths, out);
        line0 = this;

        let mut width = 0;
        let mut discardable = true;
        while this < line1 && column + 1 < rows[this].len() {
            let w = rows[this][column].chars().count();
            width = width.max(w + 1);
            if w > 0 {
                discardable = false;
            }
            this += 1;
        }
        if discardable {
            width = 0;
        }
        widths.push(width);
        format_block(rows, line0, this, widths, out);
        widths.pop();
        line0 = this;
    }
    write_lines(rows, line0, line1, widths, out);
}

fn write_lines(rows: &[Vec<String>], line0: usize, line1: usize, widths: &[usize], out: &mut [String]) {
    for i in line0..line1 {
        let row = &rows[i];
        let mut line = String::new();
        for (j, cell) in row.iter().enumerate() {
            line.push_str(cell);
            if j + 1 < row.len() && j < widths.len() {
                let w = cell.chars().count();
                line.push_str(&" ".repeat(widths[j].saturating_sub(w)));
            } else if j + 1 < row.len() && !cell.is_empty() {
                line.push(' ');
            }
        }
        out[i] = line;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    fn format(src: &str) -> String {
        let mut fset = FileSet::new();
        let parsed = parse_file(&mut fset, "fmt.go", src).expect("source should parse");
        Printer::new(&parsed.ast, &fset).file(parsed.root)
    }

    #[test]
    fn align_pads_columns_and_discards_empty_ones() {
        let rows = vec![
            vec!["A".to_string(), "int".to_string(), String::new(), "`json:\"a\"`".to_string()],
            vec!["Bbbb".to_string(), "string".to_string(), String::new(), "// d".to_string()],
        ];
        let out = align(&rows);
        assert_eq!(out[0], "A    int    `json:\"a\"`");
        assert_eq!(out[1], "Bbbb string // d");
    }

    #[test]
    fn gofmt_output_is_stable() {
        let src = "package p\n\nimport (\n\t\"fmt\"\n\tstr \"strings\"\n)\n\n// S holds things.\ntype S struct {\n\tName  string `json:\"name\"`\n\tCount int    // how many\n}\n\nconst (\n\tA = iota\n\tBB\n)\n\nfunc (s *S) Hello() string { return fmt.Sprint(str.ToUpper(s.Name)) }\n\nfunc main() {\n\tx := 1\n\n\tif x > 0 {\n\t\tprintln(x)\n\t}\n}\n";
        assert_eq!(format(src), src);
    }

    #[test]
    fn raw_statements_get_gofmt_spacing_and_indentation() {
        let src = "package p\n\nfunc f(v int) {\n\t_= v\n\tx:=[]int{1,2}\n\tv+=x[0]\n\tprintln(\"a=b,c\",v)\n\tswitch {\n\tcase v > 0:\n\treturn\n\t}\n\tif v != 0 {\n\t\tprintln(v,\n\t\t\t\"x,y\")\n\t}\n}\n";
        let out = format(src);
        println!("{out}");
        assert_eq!(
            out,
            "package p\n\nfunc f(v int) {\n\t_ = v\n\tx := []int{1, 2}\n\tv += x[0]\n\tprintln(\"a=b,c\", v)\n\tswitch {\n\tcase v > 0:\n\t\treturn\n\t}\n\tif v != 0 {\n\t\tprintln(v,\n\t\t\t\"x,y\")\n\t}\n}\n"
        );
        assert_eq!(format(&out), out, "tidied output is stable");
    }

    #[test]
    fn one_line_struct_stays_inline() {
        let out = format("package p\n\ntype S struct { Name string }\n\ntype E struct{}\n");
        assert!(out.contains("type S struct{ Name string }"), "got:\n{out}");
        assert!(out.contains("type E struct{}"), "got:\n{out}");
    }

    #[test]
    fn empty_bodies_keep_their_shape() {
        let out = format("package p\n\nfunc a() {}\n\nfunc b() {\n}\n");
        assert!(out.contains("func a() {}"));
        assert!(out.contains("func b() {\n}"));
    }
}
