//! Package resolver: binds identifiers to objects and types.
//!
//! Runs in four phases over all files of one package: collect package-level
//! objects, resolve named and alias types, resolve function signatures (binding
//! methods to receiver types), then infer value types. Function bodies are
//! walked for local declarations only when requested.
//!
//! Errors are either hard (the load fails) or soft (recorded on the package and
//! logged). Types that depend on packages that were not loaded resolve to the
//! invalid type; their source spelling is kept in the type table.

use std::collections::HashMap;

use crate::ast::{Ast, DeclTok, ExprHint, NodeId, NodeKind};
use crate::file::FileId;
use crate::kind::ObjKind;
use crate::package::PackageId;
use crate::position::{FileSet, Pos};
use crate::printer::Printer;
use crate::tags::unquote;
use crate::types::{is_exported, BasicKind, NodeRef, Object, ObjectId, Type, TypeId, TypeTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub pos: Pos,
    pub msg: String,
    /// Soft errors leave the package usable.
    pub soft: bool,
}

/// Resolver output for one package.
#[derive(Debug, Clone, Default)]
pub struct PackageInfo {
    /// Package scope.
    pub scope: HashMap<String, ObjectId>,
    /// Declaring identifier (or embedded field node) to object.
    pub defs: HashMap<NodeRef, ObjectId>,
    /// Struct type nodes to their types.
    pub struct_types: HashMap<NodeRef, TypeId>,
    pub errors: Vec<TypeError>,
}

impl PackageInfo {
    pub fn hard_errors(&self) -> impl Iterator<Item = &TypeError> {
        self.errors.iter().filter(|e| !e.soft)
    }
}

/// One file handed to the resolver.
#[derive(Clone, Copy)]
pub struct CheckFile<'a> {
    pub id: FileId,
    pub ast: &'a Ast,
    pub root: NodeId,
}

/// An already resolved dependency, keyed by import path.
#[derive(Clone, Copy)]
pub struct DepScope<'a> {
    pub id: PackageId,
    pub name: &'a str,
    pub scope: &'a HashMap<String, ObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Resolving,
    Done,
}

struct PendingType {
    file: usize,
    spec: NodeId,
}

struct PendingValue {
    file: usize,
    ty: Option<NodeId>,
    values: Vec<NodeId>,
    index: usize,
    names: usize,
    constant: bool,
}

#[derive(Clone)]
struct ImportRef {
    path: String,
}

pub fn check_package(
    table: &mut TypeTable,
    fset: &FileSet,
    pkg: PackageId,
    files: &[CheckFile<'_>],
    deps: &HashMap<String, DepScope<'_>>,
    locals: bool,
) -> PackageInfo {
    let mut c = Checker {
        table,
        fset,
        pkg,
        files,
        deps,
        locals,
        info: PackageInfo::default(),
        imports: vec![HashMap::new(); files.len()],
        dot_imports: vec![Vec::new(); files.len()],
        types: HashMap::new(),
        values: HashMap::new(),
        funcs: Vec::new(),
        state: HashMap::new(),
        cache: HashMap::new(),
        scopes: Vec::new(),
        body_depth: 0,
    };
    for f in 0..files.len() {
        c.collect(f);
    }
    let mut pending: Vec<ObjectId> = c.types.keys().copied().collect();
    pending.sort();
    for obj in pending {
        c.ensure_type(obj);
    }
    c.check_containment();
    let funcs = std::mem::take(&mut c.funcs);
    for &(f, decl, obj) in &funcs {
        c.func_signature(f, decl, obj);
    }
    let mut pending: Vec<ObjectId> = c.values.keys().copied().collect();
    pending.sort();
    for obj in pending {
        c.ensure_value(obj);
    }
    if locals {
        for &(f, decl, _) in &funcs {
            c.func_body(f, decl);
        }
    }
    c.info
}

struct Checker<'a, 't> {
    table: &'t mut TypeTable,
    fset: &'a FileSet,
    pkg: PackageId,
    files: &'a [CheckFile<'a>],
    deps: &'a HashMap<String, DepScope<'a>>,
    locals: bool,
    info: PackageInfo,
    /// Per file: alias to import.
    imports: Vec<HashMap<String, ImportRef>>,
    dot_imports: Vec<Vec<String>>,
    types: HashMap<ObjectId, PendingType>,
    values: HashMap<ObjectId, PendingValue>,
    funcs: Vec<(usize, NodeId, ObjectId)>,
    state: HashMap<ObjectId, State>,
    cache: HashMap<(usize, NodeId), TypeId>,
    scopes: Vec<HashMap<String, ObjectId>>,
    body_depth: usize,
}

impl Checker<'_, '_> {
    fn ast(&self, f: usize) -> &Ast {
        self.files[f].ast
    }

    fn node_ref(&self, f: usize, node: NodeId) -> NodeRef {
        NodeRef {
            file: self.files[f].id,
            node,
        }
    }

    fn error(&mut self, f: usize, node: NodeId, msg: impl Into<String>, soft: bool) {
        let msg = msg.into();
        let pos = self.ast(f).pos(node);
        debug_log!("\tresolver error (soft={}): {}", soft, msg);
        self.info.errors.push(TypeError { pos, msg, soft });
    }

    /// Names from an unloaded dot import are unknowable, so any name may be
    /// one of them.
    fn undeclared(&mut self, f: usize, node: NodeId, name: &str) {
        let blind = self.dot_imports[f].iter().any(|p| !self.deps.contains_key(p));
        self.error(f, node, format!("undeclared name: {name}"), blind);
    }

    fn new_object(&mut self, f: usize, ident: Option<NodeId>, kind: ObjKind, name: &str, ty: TypeId) -> ObjectId {
        let mut obj = Object::new(kind, name, ty);
        obj.pkg = Some(self.pkg);
        obj.decl = ident.map(|i| self.node_ref(f, i));
        obj.local = self.body_depth > 0;
        let id = self.table.new_object(obj);
        if let Some(i) = ident {
            let key = self.node_ref(f, i);
            self.info.defs.insert(key, id);
        }
        id
    }

    fn declare(&mut self, f: usize, ident: NodeId, obj: ObjectId) {
        let name = self.table.obj(obj).name.clone();
        if name == "_" {
            return;
        }
        let scope = match self.scopes.last_mut() {
            Some(s) => s,
            None => &mut self.info.scope,
        };
        if scope.contains_key(&name) {
            self.error(f, ident, format!("{name} redeclared in this block"), false);
            return;
        }
        scope.insert(name, obj);
    }

    fn lookup(&self, f: usize, name: &str) -> Option<ObjectId> {
        for scope in self.scopes.iter().rev() {
            if let Some(o) = scope.get(name) {
                return Some(*o);
            }
        }
        if let Some(o) = self.info.scope.get(name) {
            return Some(*o);
        }
        for path in &self.dot_imports[f] {
            if let Some(o) = self.deps.get(path).and_then(|d| d.scope.get(name)) {
                if is_exported(name) {
                    return Some(*o);
                }
            }
        }
        self.table.universe_lookup(name)
    }

    fn contains_invalid(&self, t: TypeId) -> bool {
        self.table.type_string(t, None).contains("invalid type")
    }

    fn source_text(&self, f: usize, node: NodeId) -> String {
        Printer::new(self.ast(f), self.fset).ty(node, 0)
    }

    // -----------------------------------------------------------------------
    // Phase 1: collection
    // -----------------------------------------------------------------------

    fn collect(&mut self, f: usize) {
        let ast = self.files[f].ast;
        let Some(file) = ast.file(self.files[f].root) else { return };
        for &decl in &file.decls {
            match ast.kind(decl) {
                NodeKind::GenDecl(g) if g.tok == DeclTok::Import => {
                    for &spec in &g.specs {
                        self.collect_import(f, spec);
                    }
                }
                NodeKind::GenDecl(g) => self.collect_gen_decl(f, g.tok, &g.specs),
                NodeKind::FuncDecl(d) => {
                    let name = ast.ident_name(d.name).to_string();
                    let obj = self.new_object(f, Some(d.name), ObjKind::Fun, &name, self.table.invalid());
                    if d.recv.is_none() && name != "init" {
                        self.declare(f, d.name, obj);
                    }
                    self.funcs.push((f, decl, obj));
                }
                _ => {}
            }
        }
    }

    fn collect_import(&mut self, f: usize, spec: NodeId) {
        let ast = self.files[f].ast;
        let NodeKind::ImportSpec(s) = ast.kind(spec) else { return };
        let path = unquote(&s.path).unwrap_or_else(|| s.path.trim_matches('"').to_string());
        let explicit = s.name.map(|n| ast.ident_name(n).to_string());
        let dep = self.deps.get(&path).copied();
        if dep.is_none() {
            self.error(f, spec, format!("could not import {path}"), true);
        }
        match explicit.as_deref() {
            Some("_") => {}
            Some(".") => self.dot_imports[f].push(path),
            _ => {
                let alias = explicit.clone().unwrap_or_else(|| match dep {
                    Some(d) => d.name.to_string(),
                    None => path.rsplit('/').next().unwrap_or(&path).to_string(),
                });
                if let (Some(_), Some(ident)) = (&explicit, s.name) {
                    self.new_object(f, Some(ident), ObjKind::Pkg, &alias, self.table.invalid());
                }
                self.imports[f].insert(alias, ImportRef { path });
            }
        }
    }

    fn collect_gen_decl(&mut self, f: usize, tok: DeclTok, specs: &[NodeId]) {
        let ast = self.files[f].ast;
        let mut prev: Option<(Option<NodeId>, Vec<NodeId>)> = None;
        for &spec in specs {
            match ast.kind(spec) {
                NodeKind::TypeSpec(s) => {
                    let name = ast.ident_name(s.name).to_string();
                    let obj = self.new_object(f, Some(s.name), ObjKind::Typ, &name, self.table.invalid());
                    if s.assign {
                        self.table.obj_mut(obj).is_alias = true;
                    } else {
                        let named = self.table.new_type(Type::Named {
                            obj,
                            underlying: None,
                            methods: Vec::new(),
                        });
                        self.table.obj_mut(obj).ty = named;
                    }
                    self.declare(f, s.name, obj);
                    self.types.insert(obj, PendingType { file: f, spec });
                }
                NodeKind::ValueSpec(s) => {
                    let constant = tok == DeclTok::Const;
                    let (ty, values) = if constant && s.ty.is_none() && s.values.is_empty() {
                        prev.clone().unwrap_or((None, Vec::new()))
                    } else {
                        (s.ty, s.values.clone())
                    };
                    prev = Some((ty, values.clone()));
                    let kind = if constant { ObjKind::Con } else { ObjKind::Var };
                    for (index, &ident) in s.names.iter().enumerate() {
                        let name = ast.ident_name(ident).to_string();
                        if name == "_" {
                            continue;
                        }
                        let obj = self.new_object(f, Some(ident), kind, &name, self.table.invalid());
                        self.declare(f, ident, obj);
                        self.values.insert(
                            obj,
                            PendingValue {
                                file: f,
                                ty,
                                values: values.clone(),
                                index,
                                names: s.names.len(),
                                constant,
                            },
                        );
                    }
                }
                _ => {}
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase 2: types
    // -----------------------------------------------------------------------

    fn ensure_type(&mut self, obj: ObjectId) {
        if self.state.contains_key(&obj) {
            if self.state.get(&obj) == Some(&State::Resolving) {
                let name = self.table.obj(obj).name.clone();
                if let Some(p) = self.types.get(&obj) {
                    let (file, spec) = (p.file, p.spec);
                    self.error(file, spec, format!("invalid recursive type {name}"), false);
                }
                let named = self.table.obj(obj).ty;
                let invalid = self.table.invalid();
                self.table.set_underlying(named, invalid);
            }
            return;
        }
        let Some(p) = self.types.get(&obj) else { return };
        let (f, spec) = (p.file, p.spec);
        self.state.insert(obj, State::Resolving);

        let ast = self.files[f].ast;
        let NodeKind::TypeSpec(s) = ast.kind(spec) else { return };
        let scoped = self.push_type_params(f, s.type_params.as_deref());
        let t = self.resolve_type(f, s.ty);
        if scoped {
            self.scopes.pop();
        }

        if self.table.obj(obj).is_alias {
            self.table.obj_mut(obj).ty = t;
        } else {
            let named = self.table.obj(obj).ty;
            let underlying = match self.table.ty(t) {
                Type::Named { obj: other, .. } => {
                    let other = *other;
                    self.ensure_type(other);
                    self.table.underlying(t)
                }
                _ => t,
            };
            // a recursive reference may already have marked it invalid
            if let Type::Named { underlying: None, .. } = self.table.ty(named) {
                self.table.set_underlying(named, underlying);
            }
        }
        self.state.insert(obj, State::Done);
    }

    /// A named type may not hold itself by value through struct fields or
    /// array elements; pointers, slices, maps and channels break the cycle.
    fn check_containment(&mut self) {
        let mut declared: Vec<ObjectId> = self.types.keys().copied().filter(|o| !self.table.obj(*o).is_alias).collect();
        declared.sort();
        for obj in declared {
            let named = self.table.obj(obj).ty;
            if !self.holds_by_value(named, named, &mut Vec::new()) {
                continue;
            }
            let name = self.table.obj(obj).name.clone();
            let (file, spec) = (self.types[&obj].file, self.types[&obj].spec);
            self.error(file, spec, format!("invalid recursive type {name}"), false);
        }
    }

    fn holds_by_value(&self, t: TypeId, target: TypeId, seen: &mut Vec<TypeId>) -> bool {
        match self.table.ty(t) {
            Type::Named { underlying, .. } => {
                if seen.contains(&t) {
                    return false;
                }
                seen.push(t);
                match underlying {
                    Some(u) => self.holds_by_value(*u, target, seen),
                    None => false,
                }
            }
            Type::Struct { fields, .. } => fields.iter().any(|&v| {
                let ft = self.table.obj(v).ty;
                ft == target || self.holds_by_value(ft, target, seen)
            }),
            Type::Array { elem, .. } => *elem == target || self.holds_by_value(*elem, target, seen),
            _ => false,
        }
    }

    /// Declares type parameters `[K comparable, V any]` in a new scope.
    fn push_type_params(&mut self, f: usize, params: Option<&str>) -> bool {
        let Some(text) = params else { return false };
        let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
        let mut scope = HashMap::new();
        let mut depth = 0usize;
        let mut start = 0;
        let mut groups = Vec::new();
        for (i, c) in inner.char_indices() {
            match c {
                '[' | '(' | '{' => depth += 1,
                ']' | ')' | '}' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    groups.push(&inner[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        groups.push(&inner[start..]);
        for group in groups {
            let Some(name) = group.split_whitespace().next() else { continue };
            if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                continue;
            }
            let obj = self.new_object(f, None, ObjKind::Typ, name, self.table.invalid());
            let any = self.table.empty_interface();
            let named = self.table.new_type(Type::Named {
                obj,
                underlying: Some(any),
                methods: Vec::new(),
            });
            let o = self.table.obj_mut(obj);
            o.ty = named;
            o.pkg = None;
            scope.insert(name.to_string(), obj);
        }
        self.scopes.push(scope);
        true
    }

    fn resolve_type(&mut self, f: usize, node: NodeId) -> TypeId {
        if let Some(t) = self.cache.get(&(f, node)) {
            return *t;
        }
        let ast = self.files[f].ast;
        let t = match ast.kind(node) {
            NodeKind::TypeName(name) | NodeKind::Ident(name) => self.type_by_name(f, node, name),
            NodeKind::Qualified { pkg, name } => self.qualified(f, node, pkg, name, true),
            NodeKind::Generic { base, .. } => self.resolve_type(f, *base),
            NodeKind::Pointer(x) => {
                let elem = self.resolve_type(f, *x);
                self.table.pointer_to(elem)
            }
            NodeKind::Array { len, elem } => {
                let elem = self.resolve_type(f, *elem);
                let len = len.as_deref().and_then(parse_int);
                self.table.new_type(Type::Array { len, elem })
            }
            NodeKind::Slice(x) | NodeKind::Ellipsis(x) => {
                let elem = self.resolve_type(f, *x);
                self.table.new_type(Type::Slice { elem })
            }
            NodeKind::Map { key, value } => {
                let key = self.resolve_type(f, *key);
                let elem = self.resolve_type(f, *value);
                self.table.new_type(Type::Map { key, elem })
            }
            NodeKind::Chan { dir, elem } => {
                let elem = self.resolve_type(f, *elem);
                self.table.new_type(Type::Chan { dir: *dir, elem })
            }
            NodeKind::FuncType(ft) => self.signature(f, None, ft.params, ft.results),
            NodeKind::StructType(list) => self.struct_type(f, node, *list),
            NodeKind::InterfaceType(list) => self.interface_type(f, *list),
            NodeKind::Paren(x) => self.resolve_type(f, *x),
            _ => self.table.invalid(),
        };
        self.cache.insert((f, node), t);
        t
    }

    fn type_by_name(&mut self, f: usize, node: NodeId, name: &str) -> TypeId {
        match self.lookup(f, name) {
            Some(obj) if self.table.obj(obj).kind == ObjKind::Typ => {
                // named types resolve their underlying type on their own turn
                if self.table.obj(obj).is_alias {
                    self.ensure_type(obj);
                }
                self.table.obj(obj).ty
            }
            Some(_) => {
                self.error(f, node, format!("{name} is not a type"), false);
                self.table.invalid()
            }
            None => {
                if self.body_depth == 0 {
                    self.undeclared(f, node, name);
                }
                self.table.invalid()
            }
        }
    }

    /// `pkg.Name` through the file's imports. With `want_type`, the object
    /// must be a type and its type is returned; otherwise the object's type.
    fn qualified(&mut self, f: usize, node: NodeId, pkg: &str, name: &str, want_type: bool) -> TypeId {
        let Some(import) = self.imports[f].get(pkg) else {
            if self.body_depth == 0 && want_type {
                self.undeclared(f, node, pkg);
            }
            return self.table.invalid();
        };
        let Some(dep) = self.deps.get(&import.path) else {
            return self.table.invalid();
        };
        match dep.scope.get(name).copied() {
            Some(obj) if is_exported(name) => {
                let o = self.table.obj(obj);
                if want_type && o.kind != ObjKind::Typ {
                    self.error(f, node, format!("{pkg}.{name} is not a type"), false);
                    return self.table.invalid();
                }
                o.ty
            }
            _ => {
                self.error(f, node, format!("undefined: {pkg}.{name}"), false);
                self.table.invalid()
            }
        }
    }

    fn struct_type(&mut self, f: usize, node: NodeId, list: NodeId) -> TypeId {
        let ast = self.files[f].ast;
        let mut fields = Vec::new();
        let mut tags = Vec::new();
        let items: &[NodeId] = match ast.kind(list) {
            NodeKind::FieldList(items) => items,
            _ => &[],
        };
        for &item in items {
            let NodeKind::Field(fd) = ast.kind(item) else { continue };
            let t = self.resolve_type(f, fd.ty);
            let text = self.contains_invalid(t).then(|| self.source_text(f, fd.ty));
            let tag = fd.tag.as_deref().and_then(unquote);
            if fd.names.is_empty() {
                let name = ast.base_type_name(fd.ty).unwrap_or_default().to_string();
                let v = self.new_object(f, None, ObjKind::Var, &name, t);
                let key = self.node_ref(f, item);
                let o = self.table.obj_mut(v);
                o.field = true;
                o.embedded = true;
                o.decl = Some(key);
                self.info.defs.insert(key, v);
                if let Some(text) = &text {
                    self.table.record_invalid_text(v, text.clone());
                }
                fields.push(v);
                tags.push(tag.clone());
            }
            for &ident in &fd.names {
                let name = ast.ident_name(ident).to_string();
                let v = self.new_object(f, Some(ident), ObjKind::Var, &name, t);
                self.table.obj_mut(v).field = true;
                if let Some(text) = &text {
                    self.table.record_invalid_text(v, text.clone());
                }
                fields.push(v);
                tags.push(tag.clone());
            }
        }
        let t = self.table.new_type(Type::Struct { fields, tags });
        let origin = self.node_ref(f, node);
        self.table.set_struct_origin(t, origin);
        self.info.struct_types.insert(origin, t);
        t
    }

    fn interface_type(&mut self, f: usize, list: NodeId) -> TypeId {
        let ast = self.files[f].ast;
        let mut methods = Vec::new();
        let mut embeddeds = Vec::new();
        let items: &[NodeId] = match ast.kind(list) {
            NodeKind::FieldList(items) => items,
            _ => &[],
        };
        for &item in items {
            let NodeKind::Field(fd) = ast.kind(item) else { continue };
            match fd.names.first() {
                Some(&ident) => {
                    let sig = self.resolve_type(f, fd.ty);
                    let name = ast.ident_name(ident).to_string();
                    methods.push(self.new_object(f, Some(ident), ObjKind::Fun, &name, sig));
                }
                None => {
                    let t = self.resolve_type(f, fd.ty);
                    if !matches!(self.table.ty(t), Type::Invalid) {
                        embeddeds.push(t);
                    }
                }
            }
        }
        self.table.new_type(Type::Interface { methods, embeddeds })
    }

    // -----------------------------------------------------------------------
    // Phase 3: signatures
    // -----------------------------------------------------------------------

    fn signature(&mut self, f: usize, recv: Option<ObjectId>, params: NodeId, results: Option<NodeId>) -> TypeId {
        let (params, variadic) = self.tuple(f, params);
        let results = match results {
            None => self.table.empty_tuple(),
            Some(r) if matches!(self.ast(f).kind(r), NodeKind::FieldList(_)) => self.tuple(f, r).0,
            Some(r) => {
                let t = self.resolve_type(f, r);
                let v = self.new_object(f, None, ObjKind::Var, "", t);
                if self.contains_invalid(t) {
                    let text = self.source_text(f, r);
                    self.table.record_invalid_text(v, text);
                }
                self.table.new_type(Type::Tuple { vars: vec![v] })
            }
        };
        self.table.new_type(Type::Signature {
            recv,
            params,
            results,
            variadic,
        })
    }

    fn tuple(&mut self, f: usize, list: NodeId) -> (TypeId, bool) {
        let ast = self.files[f].ast;
        let mut vars = Vec::new();
        let mut variadic = false;
        let items: &[NodeId] = match ast.kind(list) {
            NodeKind::FieldList(items) => items,
            _ => &[],
        };
        for &item in items {
            let NodeKind::Field(fd) = ast.kind(item) else { continue };
            variadic = matches!(ast.kind(fd.ty), NodeKind::Ellipsis(_));
            let t = self.resolve_type(f, fd.ty);
            let text = self.contains_invalid(t).then(|| self.source_text(f, fd.ty));
            let idents: Vec<Option<NodeId>> = if fd.names.is_empty() {
                vec![None]
            } else {
                fd.names.iter().copied().map(Some).collect()
            };
            for ident in idents {
                let name = ident.map(|i| ast.ident_name(i).to_string()).unwrap_or_default();
                let v = self.new_object(f, ident, ObjKind::Var, &name, t);
                if let Some(text) = &text {
                    self.table.record_invalid_text(v, text.clone());
                }
                vars.push(v);
            }
        }
        (self.table.new_type(Type::Tuple { vars }), variadic)
    }

    fn func_signature(&mut self, f: usize, decl: NodeId, obj: ObjectId) {
        let ast = self.files[f].ast;
        let NodeKind::FuncDecl(d) = ast.kind(decl) else { return };
        let NodeKind::FuncType(ft) = ast.kind(d.ty) else { return };

        let mut scoped = self.push_type_params(f, d.type_params.as_deref());
        let mut recv_var = None;
        let mut owner = None;
        if let Some(recv) = d.recv {
            let field = match ast.kind(recv) {
                NodeKind::FieldList(items) => items.iter().find_map(|i| match ast.kind(*i) {
                    NodeKind::Field(fd) => Some(fd),
                    _ => None,
                }),
                _ => None,
            };
            if let Some(fd) = field {
                if let NodeKind::Generic { args, .. } = peel_pointer(ast, fd.ty) {
                    if scoped {
                        self.scopes.pop();
                    }
                    scoped = self.push_type_params(f, Some(args.as_str()));
                }
                let base = ast.base_type_name(fd.ty).unwrap_or_default().to_string();
                let base_obj = self
                    .info
                    .scope
                    .get(&base)
                    .copied()
                    .filter(|o| self.table.obj(*o).kind == ObjKind::Typ);
                let t = match base_obj {
                    Some(_) => self.resolve_type(f, fd.ty),
                    None => {
                        let name = ast.ident_name(d.name);
                        self.error(f, fd.ty, format!("undeclared receiver type {base} of method {name}"), true);
                        self.table.invalid()
                    }
                };
                let name = fd.names.first().map(|n| ast.ident_name(*n).to_string()).unwrap_or_default();
                let v = self.new_object(f, fd.names.first().copied(), ObjKind::Var, &name, t);
                recv_var = Some(v);
                owner = base_obj.map(|o| self.table.obj(o).ty);
            }
        }
        let sig = self.signature(f, recv_var, ft.params, ft.results);
        if scoped {
            self.scopes.pop();
        }
        self.table.obj_mut(obj).ty = sig;
        if let Some(named) = owner {
            if matches!(self.table.ty(named), Type::Named { .. }) {
                self.table.add_method(named, obj);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase 4: values
    // -----------------------------------------------------------------------

    fn ensure_value(&mut self, obj: ObjectId) {
        match self.state.get(&obj) {
            Some(State::Done) => return,
            Some(State::Resolving) => {
                if let Some(p) = self.values.get(&obj) {
                    let file = p.file;
                    let node = self.table.obj(obj).decl.map(|d| d.node);
                    let name = self.table.obj(obj).name.clone();
                    if let Some(node) = node {
                        self.error(file, node, format!("initialization cycle for {name}"), false);
                    }
                }
                return;
            }
            None => {}
        }
        let Some(p) = self.values.get(&obj) else { return };
        let (f, ty, values, index, names, constant) =
            (p.file, p.ty, p.values.clone(), p.index, p.names, p.constant);
        self.state.insert(obj, State::Resolving);
        let t = self.value_type(f, ty, &values, index, names, constant);
        self.table.obj_mut(obj).ty = t;
        self.state.insert(obj, State::Done);
    }

    fn value_type(
        &mut self,
        f: usize,
        ty: Option<NodeId>,
        values: &[NodeId],
        index: usize,
        names: usize,
        constant: bool,
    ) -> TypeId {
        if let Some(ty) = ty {
            return self.resolve_type(f, ty);
        }
        let t = if values.len() == names {
            self.infer(f, values[index])
        } else if let [single] = values {
            let t = self.infer(f, *single);
            match self.table.tuple_vars(t).get(index) {
                Some(v) => self.table.obj(*v).ty,
                None => self.table.invalid(),
            }
        } else {
            self.table.invalid()
        };
        if constant {
            return t;
        }
        self.default_type(t)
    }

    fn default_type(&self, t: TypeId) -> TypeId {
        match self.table.ty(t) {
            Type::Basic { kind, .. } if *kind != BasicKind::UntypedNil => self.table.basic(kind.default_kind()),
            _ => t,
        }
    }

    fn infer(&mut self, f: usize, expr: NodeId) -> TypeId {
        let ast = self.files[f].ast;
        match ast.kind(expr) {
            NodeKind::FuncLit { ty, body } => {
                let t = self.resolve_type(f, *ty);
                if self.locals {
                    self.func_lit_body(f, *ty, *body);
                }
                t
            }
            NodeKind::CompositeLit { ty: Some(t), .. } => self.resolve_type(f, *t),
            NodeKind::Unary { op, x } => {
                let t = self.infer(f, *x);
                match op.as_str() {
                    "&" => self.table.pointer_to(t),
                    "<-" => match self.table.ty(self.table.underlying(t)) {
                        Type::Chan { elem, .. } => *elem,
                        _ => self.table.invalid(),
                    },
                    "!" if matches!(self.table.ty(t), Type::Invalid) => self.table.basic(BasicKind::UntypedBool),
                    "*" => match self.table.ty(t) {
                        Type::Pointer { elem } => *elem,
                        _ => self.table.invalid(),
                    },
                    _ => t,
                }
            }
            NodeKind::RawExpr { hint, .. } => self.infer_hint(f, expr, hint),
            _ => self.table.invalid(),
        }
    }

    fn infer_hint(&mut self, f: usize, expr: NodeId, hint: &ExprHint) -> TypeId {
        match hint {
            ExprHint::Int => self.table.basic(BasicKind::UntypedInt),
            ExprHint::Float => self.table.basic(BasicKind::UntypedFloat),
            ExprHint::Imag => self.table.basic(BasicKind::UntypedComplex),
            ExprHint::Rune => self.table.basic(BasicKind::UntypedRune),
            ExprHint::Str => self.table.basic(BasicKind::UntypedString),
            ExprHint::Bool => self.table.basic(BasicKind::UntypedBool),
            ExprHint::Nil => self.table.basic(BasicKind::UntypedNil),
            ExprHint::Ident(name) => self.value_by_name(f, expr, name),
            ExprHint::Selector { pkg, name } => {
                if self.lookup(f, pkg).is_some() {
                    // field or method selection on a value
                    return self.table.invalid();
                }
                self.qualified(f, expr, pkg, name, false)
            }
            ExprHint::Call { func, arg } => self.call_type(f, expr, func, *arg),
            ExprHint::Conversion { ty } => self.resolve_type(f, *ty),
            ExprHint::Other => self.table.invalid(),
        }
    }

    fn value_by_name(&mut self, f: usize, expr: NodeId, name: &str) -> TypeId {
        let Some(obj) = self.lookup(f, name) else {
            if self.body_depth == 0 {
                self.undeclared(f, expr, name);
            }
            return self.table.invalid();
        };
        match self.table.obj(obj).kind {
            ObjKind::Con | ObjKind::Var => {
                self.ensure_value(obj);
                self.table.obj(obj).ty
            }
            ObjKind::Fun | ObjKind::Nil => self.table.obj(obj).ty,
            _ => self.table.invalid(),
        }
    }

    fn call_type(&mut self, f: usize, expr: NodeId, func: &str, arg: Option<NodeId>) -> TypeId {
        match (func, arg) {
            ("new", Some(arg)) => {
                let t = self.resolve_type(f, arg);
                return self.table.pointer_to(t);
            }
            ("make", Some(arg)) => return self.resolve_type(f, arg),
            ("len" | "cap" | "copy", _) if self.lookup(f, func) == self.table.universe_lookup(func) => {
                return self.table.basic(BasicKind::Int);
            }
            _ => {}
        }
        let callee = match func.split_once('.') {
            Some((pkg, name)) if self.imports[f].contains_key(pkg) && self.lookup(f, pkg).is_none() => {
                let Some(dep) = self.imports[f].get(pkg).and_then(|i| self.deps.get(&i.path)) else {
                    return self.table.invalid();
                };
                dep.scope.get(name).copied()
            }
            Some(_) => None,
            None => self.lookup(f, func),
        };
        let Some(obj) = callee else {
            if !func.contains('.') && self.body_depth == 0 {
                self.undeclared(f, expr, func);
            }
            return self.table.invalid();
        };
        match self.table.obj(obj).kind {
            // conversion
            ObjKind::Typ => {
                self.ensure_type(obj);
                self.table.obj(obj).ty
            }
            ObjKind::Fun => match self.table.ty(self.table.obj(obj).ty) {
                Type::Signature { results, .. } => {
                    let results = *results;
                    match self.table.tuple_vars(results) {
                        [single] => self.table.obj(*single).ty,
                        _ => results,
                    }
                }
                _ => self.table.invalid(),
            },
            _ => self.table.invalid(),
        }
    }

    // -----------------------------------------------------------------------
    // Locals
    // -----------------------------------------------------------------------

    fn func_body(&mut self, f: usize, decl: NodeId) {
        let ast = self.files[f].ast;
        let NodeKind::FuncDecl(d) = ast.kind(decl) else { return };
        let Some(body) = d.body else { return };
        let mut params = HashMap::new();
        if let Some(recv) = d.recv {
            self.param_names(f, recv, &mut params);
        }
        if let NodeKind::FuncType(ft) = ast.kind(d.ty) {
            self.param_names(f, ft.params, &mut params);
            if let Some(r) = ft.results {
                self.param_names(f, r, &mut params);
            }
        }
        self.scopes.push(params);
        let scoped = self.push_type_params(f, d.type_params.as_deref());
        self.body_depth += 1;
        self.block(f, body);
        self.body_depth -= 1;
        if scoped {
            self.scopes.pop();
        }
        self.scopes.pop();
    }

    fn func_lit_body(&mut self, f: usize, ty: NodeId, body: NodeId) {
        let ast = self.files[f].ast;
        let mut params = HashMap::new();
        if let NodeKind::FuncType(ft) = ast.kind(ty) {
            self.param_names(f, ft.params, &mut params);
            if let Some(r) = ft.results {
                self.param_names(f, r, &mut params);
            }
        }
        self.scopes.push(params);
        self.body_depth += 1;
        self.block(f, body);
        self.body_depth -= 1;
        self.scopes.pop();
    }

    /// Parameter names are in scope inside the body; their objects come from
    /// the signature.
    fn param_names(&self, f: usize, list: NodeId, scope: &mut HashMap<String, ObjectId>) {
        let ast = self.files[f].ast;
        let NodeKind::FieldList(items) = ast.kind(list) else { return };
        for item in items {
            let NodeKind::Field(fd) = ast.kind(*item) else { continue };
            for ident in &fd.names {
                if let Some(obj) = self.info.defs.get(&self.node_ref(f, *ident)) {
                    scope.insert(ast.ident_name(*ident).to_string(), *obj);
                }
            }
        }
    }

    fn block(&mut self, f: usize, block: NodeId) {
        let ast = self.files[f].ast;
        let NodeKind::Block(stmts) = ast.kind(block) else { return };
        self.scopes.push(HashMap::new());
        for &stmt in stmts {
            self.statement(f, stmt);
        }
        self.scopes.pop();
    }

    fn statement(&mut self, f: usize, stmt: NodeId) {
        let ast = self.files[f].ast;
        match ast.kind(stmt) {
            NodeKind::DeclStmt(decl) => {
                let NodeKind::GenDecl(g) = ast.kind(*decl) else { return };
                self.local_gen_decl(f, g.tok, &g.specs);
            }
            NodeKind::ShortVar { names, values } => {
                let types: Vec<TypeId> = if values.len() == names.len() {
                    values.iter().map(|v| self.infer(f, *v)).collect()
                } else if let [single] = values.as_slice() {
                    let t = self.infer(f, *single);
                    let vars = self.table.tuple_vars(t).to_vec();
                    (0..names.len())
                        .map(|i| vars.get(i).map_or(self.table.invalid(), |v| self.table.obj(*v).ty))
                        .collect()
                } else {
                    vec![self.table.invalid(); names.len()]
                };
                for (i, &ident) in names.iter().enumerate() {
                    let name = ast.ident_name(ident).to_string();
                    let redeclared = self.scopes.last().is_some_and(|s| s.contains_key(&name));
                    if name == "_" || redeclared {
                        continue;
                    }
                    let t = self.default_type(types.get(i).copied().unwrap_or(self.table.invalid()));
                    let obj = self.new_object(f, Some(ident), ObjKind::Var, &name, t);
                    self.declare(f, ident, obj);
                }
            }
            NodeKind::Labeled { label, stmt } => {
                let name = ast.ident_name(*label).to_string();
                self.new_object(f, Some(*label), ObjKind::Lbl, &name, self.table.invalid());
                if let Some(s) = stmt {
                    self.statement(f, *s);
                }
            }
            NodeKind::Block(_) => self.block(f, stmt),
            _ => {}
        }
    }

    fn local_gen_decl(&mut self, f: usize, tok: DeclTok, specs: &[NodeId]) {
        let ast = self.files[f].ast;
        let mut prev: Option<(Option<NodeId>, Vec<NodeId>)> = None;
        for &spec in specs {
            match ast.kind(spec) {
                NodeKind::TypeSpec(s) => {
                    let name = ast.ident_name(s.name).to_string();
                    let obj = self.new_object(f, Some(s.name), ObjKind::Typ, &name, self.table.invalid());
                    self.declare(f, s.name, obj);
                    if s.assign {
                        self.table.obj_mut(obj).is_alias = true;
                        let t = self.resolve_type(f, s.ty);
                        self.table.obj_mut(obj).ty = t;
                    } else {
                        let named = self.table.new_type(Type::Named {
                            obj,
                            underlying: None,
                            methods: Vec::new(),
                        });
                        self.table.obj_mut(obj).ty = named;
                        let t = self.resolve_type(f, s.ty);
                        let underlying = self.table.underlying(t);
                        self.table.set_underlying(named, underlying);
                    }
                }
                NodeKind::ValueSpec(s) => {
                    let constant = tok == DeclTok::Const;
                    let (ty, values) = if constant && s.ty.is_none() && s.values.is_empty() {
                        prev.clone().unwrap_or((None, Vec::new()))
                    } else {
                        (s.ty, s.values.clone())
                    };
                    prev = Some((ty, values.clone()));
                    let kind = if constant { ObjKind::Con } else { ObjKind::Var };
                    for (index, &ident) in s.names.iter().enumerate() {
                        let name = ast.ident_name(ident).to_string();
                        if name == "_" {
                            continue;
                        }
                        let t = self.value_type(f, ty, &values, index, s.names.len(), constant);
                        let obj = self.new_object(f, Some(ident), kind, &name, t);
                        self.declare(f, ident, obj);
                    }
                }
                _ => {}
            }
        }
    }
}

fn peel_pointer(ast: &Ast, id: NodeId) -> &NodeKind {
    match ast.kind(id) {
        NodeKind::Pointer(x) | NodeKind::Paren(x) => peel_pointer(ast, *x),
        other => other,
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let t = text.replace('_', "");
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        return i64::from_str_radix(bin, 2).ok();
    }
    if let Some(oct) = t.strip_prefix("0o").or_else(|| t.strip_prefix("0O")) {
        return i64::from_str_radix(oct, 8).ok();
    }
    if t.len() > 1 && t.starts_with('0') {
        return i64::from_str_radix(&t[1..], 8).ok();
    }
    t.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    fn check(src: &str, locals: bool) -> (TypeTable, PackageInfo, crate::parser::ParsedFile) {
        let mut fset = FileSet::new();
        let parsed = parse_file(&mut fset, "p.go", src).expect("source should parse");
        let mut table = TypeTable::new();
        let pkg = PackageId(0);
        table.set_package(pkg, "p", "example.com/p");
        let files = [CheckFile {
            id: FileId(0),
            ast: &parsed.ast,
            root: parsed.root,
        }];
        let info = check_package(&mut table, &fset, pkg, &files, &HashMap::new(), locals);
        (table, info, parsed)
    }

    fn type_of(table: &TypeTable, info: &PackageInfo, name: &str) -> String {
        let obj = info.scope.get(name).copied().expect("name should be declared");
        table.type_string(table.obj(obj).ty, Some(PackageId(0)))
    }

    #[test]
    fn resolves_package_level_declarations() {
        let src = "package p\n\ntype S struct {\n\tName string\n\tNext *S\n}\n\ntype Alias = S\n\nconst (\n\tA = iota\n\tB\n)\n\nvar (\n\tx = 1.5\n\ts = &S{}\n\tm = make(map[string]int)\n\tf = func(a int) string { return \"\" }\n)\n";
        let (table, info, _) = check(src, false);
        assert!(info.hard_errors().next().is_none(), "unexpected errors: {:?}", info.errors);
        let s = table.obj(info.scope["S"]).ty;
        assert_eq!(table.type_string(table.underlying(s), Some(PackageId(0))), "struct{Name string; Next *S}");
        assert_eq!(type_of(&table, &info, "Alias"), "S");
        assert_eq!(type_of(&table, &info, "B"), "untyped int");
        assert_eq!(type_of(&table, &info, "x"), "float64");
        assert_eq!(type_of(&table, &info, "s"), "*S");
        assert_eq!(type_of(&table, &info, "m"), "map[string]int");
        assert_eq!(type_of(&table, &info, "f"), "func(a int) string");
    }

    #[test]
    fn binds_methods_to_receiver_types() {
        let src = "package p\n\ntype M struct{}\n\nfunc (m *M) String() string { return \"\" }\n\nfunc (M) Len() int { return 0 }\n\nfunc (x *Missing) Gone() {}\n";
        let (table, info, _) = check(src, false);
        let m = table.obj(info.scope["M"]).ty;
        let Type::Named { methods, .. } = table.ty(m) else {
            panic!("M should be a named type");
        };
        assert_eq!(methods.len(), 2);
        assert!(table.has_pointer_receiver(methods[0]));
        assert!(!table.has_pointer_receiver(methods[1]));
        assert!(info.hard_errors().next().is_none(), "unknown receivers are soft: {:?}", info.errors);
        assert!(info.errors.iter().any(|e| e.soft && e.msg.contains("Missing")));
    }

    #[test]
    fn embedded_fields_promote_methods() {
        let src = "package p\n\ntype S interface{ String() string }\n\ntype A struct{}\n\nfunc (A) String() string { return \"\" }\n\ntype P struct{}\n\nfunc (*P) String() string { return \"\" }\n\ntype ByValue struct{ A }\n\ntype ByPointer struct{ *P }\n\ntype Deep struct{ ByValue }\n\ntype Hidden struct {\n\tA\n\tString int\n}\n\ntype Both struct {\n\tA\n\t*P\n}\n";
        let (table, info, _) = check(src, false);
        let ty = |name: &str| table.obj(info.scope[name]).ty;
        let s = ty("S");

        assert!(table.implements(ty("ByValue"), s, false));
        assert!(table.implements(ty("ByValue"), s, true));
        assert!(table.implements(ty("ByPointer"), s, false), "embedded *P carries pointer methods");
        assert!(table.implements(ty("Deep"), s, false), "promotion goes through several levels");
        assert!(!table.implements(ty("Hidden"), s, true), "a shallower field hides the method");
        assert!(!table.implements(ty("Both"), s, true), "two methods at one depth are ambiguous");

        let pv = table.method_set(ty("P"), false);
        assert!(pv.is_empty(), "value of P has no pointer methods");
    }

    #[test]
    fn reports_hard_errors() {
        let (_, info, _) = check("package p\n\nvar a Unknown\n\ntype T int\ntype T string\n\ntype X Y\ntype Y X\n", false);
        let msgs: Vec<&str> = info.hard_errors().map(|e| e.msg.as_str()).collect();
        println!("errors: {msgs:?}");
        assert!(msgs.iter().any(|m| m.contains("undeclared name: Unknown")));
        assert!(msgs.iter().any(|m| m.contains("T redeclared")));
        assert!(msgs.iter().any(|m| m.contains("invalid recursive type")));
    }

    #[test]
    fn self_containing_structs_are_recursive() {
        let src = "package p\n\ntype R struct{ r R }\n\ntype Outer struct{ in [2]Inner }\n\ntype Inner struct{ o Outer }\n\ntype List struct {\n\tnext *List\n\tkids []List\n\tbyID map[int]List\n}\n";
        let (_, info, _) = check(src, false);
        let msgs: Vec<&str> = info.hard_errors().map(|e| e.msg.as_str()).collect();
        println!("errors: {msgs:?}");
        assert!(msgs.contains(&"invalid recursive type R"));
        assert!(msgs.contains(&"invalid recursive type Outer"));
        assert!(!msgs.iter().any(|m| m.contains("List")), "indirection breaks the cycle");
    }

    #[test]
    fn unresolved_dot_imports_soften_undeclared_names() {
        let src = "package p\n\nimport . \"strings\"\n\nvar b Builder\n\nfunc New() *Reader { return nil }\n";
        let (_, info, _) = check(src, false);
        assert!(info.hard_errors().next().is_none(), "errors: {:?}", info.errors);
        assert!(info.errors.iter().any(|e| e.soft && e.msg == "undeclared name: Builder"));

        let (_, info, _) = check("package p\n\nvar b Builder\n", false);
        assert!(info.hard_errors().any(|e| e.msg == "undeclared name: Builder"), "no dot import, still hard");
    }

    #[test]
    fn unloaded_imports_are_soft_and_keep_source_text() {
        let src = "package p\n\nimport \"example.com/other\"\n\nfunc Use(v other.Thing, rest ...other.Opt) {}\n";
        let (table, info, _) = check(src, false);
        assert!(info.hard_errors().next().is_none(), "errors: {:?}", info.errors);
        assert!(info.errors.iter().any(|e| e.soft && e.msg.contains("could not import example.com/other")));
        assert_eq!(type_of(&table, &info, "Use"), "func(v other.Thing, rest ...other.Opt)");
    }

    #[test]
    fn locals_are_resolved_on_request() {
        let src = "package p\n\nfunc F() {\n\tx := 1\n\tvar y string\n\t_ = y\nloop:\n\tfor {\n\t\tbreak loop\n\t}\n\t_ = x\n}\n";
        let (table, info, _) = check(src, true);
        let locals: Vec<(String, ObjKind)> = info
            .defs
            .values()
            .map(|o| table.obj(*o))
            .filter(|o| o.local)
            .map(|o| (o.name.clone(), o.kind))
            .collect();
        assert!(locals.contains(&("x".to_string(), ObjKind::Var)), "locals: {locals:?}");
        assert!(locals.contains(&("y".to_string(), ObjKind::Var)));
        assert!(locals.contains(&("loop".to_string(), ObjKind::Lbl)));

        let (table, info, _) = check(src, false);
        assert!(
            !info.defs.values().any(|o| table.obj(*o).local),
            "bodies are skipped unless locals are requested"
        );
    }

    #[test]
    fn parses_go_integer_literals() {
        assert_eq!(parse_int("10"), Some(10));
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("017"), Some(15));
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("N"), None);
    }
}
