//! Declaration indexer.
//!
//! Pass 1 walks one file and creates a [`Declaration`] for every node that
//! declares something worth querying. Pass 2 runs once per package, after every
//! file went through pass 1, and binds methods to the type declaration named by
//! their receiver, which may live in another file.

use std::cell::OnceCell;
use std::collections::HashSet;

use crate::ast::{Ast, Field, NodeId, NodeKind};
use crate::facade::{DeclId, Declaration};
use crate::file::FileId;
use crate::kind::ObjKind;
use crate::package::PackageId;
use crate::program::Program;
use crate::types::{NodeRef, ObjectId, Type, TypeId};

/// Splits `A, B, C int` struct fields into one field node per name, so each
/// name owns its type node and tag literal.
pub(crate) fn expand_field_groups(ast: &mut Ast, root: NodeId) -> usize {
    let mut expanded = 0;
    for node in ast.subtree(root) {
        let NodeKind::StructType(list) = *ast.kind(node) else { continue };
        let NodeKind::FieldList(items) = ast.kind(list).clone() else { continue };
        if !items.iter().any(|i| matches!(ast.kind(*i), NodeKind::Field(f) if f.names.len() > 1)) {
            continue;
        }
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let field = match ast.kind(item) {
                NodeKind::Field(f) if f.names.len() > 1 => f.clone(),
                _ => {
                    out.push(item);
                    continue;
                }
            };
            let end = ast.end(item);
            let last = field.names.len() - 1;
            for (i, &name) in field.names.iter().enumerate() {
                let ty = if i == 0 { field.ty } else { ast.deep_clone(field.ty) };
                let split = Field {
                    doc: if i == 0 { field.doc } else { None },
                    names: vec![name],
                    ty,
                    tag: field.tag.clone(),
                    comment: if i == last { field.comment } else { None },
                };
                if i == 0 {
                    *ast.kind_mut(item) = NodeKind::Field(split);
                    out.push(item);
                } else {
                    let pos = ast.pos(name);
                    out.push(ast.alloc(pos, end, NodeKind::Field(split)));
                }
            }
            expanded += last;
        }
        *ast.kind_mut(list) = NodeKind::FieldList(out);
    }
    expanded
}

struct Candidate {
    ident: Option<NodeId>,
    node: NodeId,
    object: Option<ObjectId>,
    ty: Option<TypeId>,
}

/// Pass 1 over one file.
pub(crate) fn index_file(prog: &mut Program, file_id: FileId) {
    let file = &prog.files[file_id.index()];
    let pkg_id = file.package;
    let pkg = &prog.packages[pkg_id.index()];
    let ast = &file.ast;
    let def = |ident: NodeId| {
        pkg.defs.get(&NodeRef {
            file: file_id,
            node: ident,
        })
    };

    let mut found = Vec::new();
    // type nodes that are the declared type of a type spec
    let mut spec_types = HashSet::new();
    for node in ast.subtree(file.root) {
        let named = |ident: NodeId, node: NodeId, found: &mut Vec<Candidate>| {
            if let Some(obj) = def(ident) {
                found.push(Candidate {
                    ident: Some(ident),
                    node,
                    object: Some(*obj),
                    ty: None,
                });
            }
        };
        match ast.kind(node) {
            NodeKind::ImportSpec(s) => {
                if let Some(name) = s.name {
                    named(name, node, &mut found);
                }
            }
            NodeKind::TypeSpec(s) => {
                spec_types.insert(s.ty);
                named(s.name, node, &mut found);
            }
            NodeKind::ValueSpec(s) => {
                for &ident in &s.names {
                    named(ident, node, &mut found);
                }
            }
            NodeKind::FuncDecl(d) => named(d.name, node, &mut found),
            NodeKind::ShortVar { names, .. } => {
                for &ident in names {
                    named(ident, node, &mut found);
                }
            }
            NodeKind::Labeled { label, .. } => named(*label, node, &mut found),
            NodeKind::InterfaceType(list) => {
                let NodeKind::FieldList(items) = ast.kind(*list) else { continue };
                for &item in items {
                    if let NodeKind::Field(f) = ast.kind(item) {
                        if let Some(&ident) = f.names.first() {
                            named(ident, item, &mut found);
                        }
                    }
                }
            }
            NodeKind::StructType(_) if !spec_types.contains(&node) => {
                let key = NodeRef { file: file_id, node };
                if let Some(ty) = pkg.struct_types.get(&key) {
                    found.push(Candidate {
                        ident: None,
                        node,
                        object: None,
                        ty: Some(*ty),
                    });
                }
            }
            _ => {}
        }
    }

    for c in found {
        let (kind, name, ty, local) = match c.object {
            Some(obj) => {
                let o = prog.table.obj(obj);
                (o.kind, o.name.clone(), o.ty, o.local)
            }
            None => (ObjKind::Typ, String::new(), c.ty.unwrap_or(prog.table.invalid()), false),
        };
        if kind == ObjKind::Bad || name == "_" {
            continue;
        }
        if local && !prog.options.local_declarations {
            continue;
        }
        let id = DeclId(prog.decls.len() as u32);
        debug_log!("\tindexed {} {:?} as {}", kind, name, id.index());
        prog.decls.push(Declaration {
            file: file_id,
            package: pkg_id,
            ident: c.ident,
            node: c.node,
            object: c.object,
            ty,
            kind,
            name,
            methods: Vec::new(),
            fields: OnceCell::new(),
            local,
            removed: false,
        });
        prog.files[file_id.index()].decls.push(id);
        let pkg = &mut prog.packages[pkg_id.index()];
        pkg.decls.push(id);
        if let Some(obj) = c.object {
            pkg.by_object.insert(obj, id);
        }
        let named_type = kind == ObjKind::Typ
            && match c.object {
                None => true,
                Some(obj) => !prog.table.obj(obj).is_alias && matches!(prog.table.ty(ty), Type::Named { .. }),
            };
        if named_type {
            pkg.type_decls.entry(ty).or_insert(id);
        }
    }
}

/// Receiver base type name of a method declaration.
pub(crate) fn receiver_base(prog: &Program, id: DeclId) -> Option<String> {
    let decl = &prog.decls[id.index()];
    let ast = &prog.files[decl.file.index()].ast;
    let NodeKind::FuncDecl(d) = ast.kind(decl.node) else { return None };
    let NodeKind::FieldList(items) = ast.kind(d.recv?) else { return None };
    items.iter().find_map(|item| match ast.kind(*item) {
        NodeKind::Field(f) => ast.base_type_name(f.ty).map(str::to_string),
        _ => None,
    })
}

/// Pass 2 over one package.
pub(crate) fn bind_methods(prog: &mut Program, pkg_id: PackageId) -> usize {
    let mut bound = 0;
    let decls = prog.packages[pkg_id.index()].decls.clone();
    for id in decls {
        let decl = &prog.decls[id.index()];
        if decl.kind != ObjKind::Fun || decl.removed {
            continue;
        }
        let Some(base) = receiver_base(prog, id) else { continue };
        let pkg = &prog.packages[pkg_id.index()];
        let owner = pkg
            .scope
            .get(&base)
            .and_then(|obj| pkg.by_object.get(obj))
            .copied()
            .filter(|o| prog.decls[o.index()].kind == ObjKind::Typ);
        match owner {
            Some(owner) => {
                prog.decls[owner.index()].methods.push(id);
                bound += 1;
            }
            None => {
                debug_log!("\tmethod {} left unbound, no type {} in package", prog.decls[id.index()].name, base);
            }
        }
    }
    bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;
    use crate::position::FileSet;
    use crate::printer::Printer;

    #[test]
    fn field_groups_expand_one_node_per_name() {
        let mut fset = FileSet::new();
        let src = "package p\n\ntype S struct {\n\t// Doc.\n\tA, B, C int `json:\"x\"` // trailing\n}\n";
        let mut parsed = parse_file(&mut fset, "s.go", src).unwrap();
        let n = expand_field_groups(&mut parsed.ast, parsed.root);
        assert_eq!(n, 2, "two extra fields");
        let out = Printer::new(&parsed.ast, &fset).file(parsed.root);
        println!("{out}");
        assert!(out.contains("\t// Doc.\n\tA int `json:\"x\"`\n"), "doc stays on the first name:\n{out}");
        assert!(out.contains("\tB int `json:\"x\"`\n"), "got:\n{out}");
        assert!(out.contains("\tC int `json:\"x\"` // trailing\n"), "comment moves to the last name:\n{out}");

        let fields: Vec<NodeId> = parsed
            .ast
            .subtree(parsed.root)
            .into_iter()
            .filter(|n| matches!(parsed.ast.kind(*n), NodeKind::Field(_)))
            .collect();
        let types: HashSet<NodeId> = fields
            .iter()
            .filter_map(|f| match parsed.ast.kind(*f) {
                NodeKind::Field(f) => Some(f.ty),
                _ => None,
            })
            .collect();
        assert_eq!(types.len(), fields.len(), "every field owns its type node");
    }
}
