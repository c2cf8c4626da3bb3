//! Doc comment and function body edits.

use crate::ast::{Comment, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::facade::DeclId;
use crate::file::File;
use crate::parser::parse_file;
use crate::position::Pos;
use crate::printer::Printer;
use crate::program::Program;

/// Turns free text or an existing comment into `//` lines.
pub(crate) fn clean_doc(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.trim_end().lines() {
        let mut line = raw.trim();
        if let Some(rest) = line.strip_prefix("/*") {
            line = rest;
        }
        if let Some(rest) = line.strip_suffix("*/") {
            line = rest;
        }
        let line = line.strip_prefix("//").unwrap_or(line).trim();
        if line.is_empty() {
            lines.push("//".to_string());
        } else {
            lines.push(format!("// {line}"));
        }
    }
    while lines.first().is_some_and(|l| l == "//") {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l == "//") {
        lines.pop();
    }
    lines
}

/// Finds the doc slot for `target`: the innermost enclosing function, field,
/// spec or declaration. A spec of an ungrouped declaration documents through
/// the declaration.
fn doc_owner(file: &File, target: NodeId) -> Option<NodeId> {
    let path = file.ast.path_to(file.root, target)?;
    for (i, &node) in path.iter().enumerate() {
        match file.ast.kind(node) {
            NodeKind::FuncDecl(_) | NodeKind::Field(_) | NodeKind::GenDecl(_) => return Some(node),
            NodeKind::TypeSpec(_) | NodeKind::ValueSpec(_) | NodeKind::ImportSpec(_) => {
                return match path.get(i + 1).map(|p| file.ast.kind(*p)) {
                    Some(NodeKind::GenDecl(g)) if !g.grouped => Some(path[i + 1]),
                    _ => Some(node),
                };
            }
            // statements inside a body have no doc slot
            NodeKind::ShortVar { .. } | NodeKind::Labeled { .. } | NodeKind::Block(_) => return None,
            _ => {}
        }
    }
    None
}

fn doc_slot(kind: &mut NodeKind) -> Option<&mut Option<NodeId>> {
    match kind {
        NodeKind::FuncDecl(d) => Some(&mut d.doc),
        NodeKind::Field(f) => Some(&mut f.doc),
        NodeKind::GenDecl(g) => Some(&mut g.doc),
        NodeKind::TypeSpec(s) => Some(&mut s.doc),
        NodeKind::ValueSpec(s) => Some(&mut s.doc),
        NodeKind::ImportSpec(s) => Some(&mut s.doc),
        _ => None,
    }
}

fn comment_slot(kind: &mut NodeKind) -> Option<&mut Option<NodeId>> {
    match kind {
        NodeKind::Field(f) => Some(&mut f.comment),
        NodeKind::TypeSpec(s) => Some(&mut s.comment),
        NodeKind::ValueSpec(s) => Some(&mut s.comment),
        NodeKind::ImportSpec(s) => Some(&mut s.comment),
        _ => None,
    }
}

/// Replaces the doc comment of the declaration around `target`. Empty text
/// removes it. Returns false when no declaration encloses the target.
pub(crate) fn set_doc(file: &mut File, target: NodeId, text: &str) -> bool {
    let Some(owner) = doc_owner(file, target) else {
        debug_log!("\tno doc attachment point for node {:?}", target);
        return false;
    };
    let lines = clean_doc(text);
    let anchor = file.ast.pos(owner).shift_back(1);
    replace_group(file, owner, lines, anchor, doc_slot)
}

/// Replaces the line comment of a field or spec.
pub(crate) fn set_comment(file: &mut File, node: NodeId, text: &str) -> bool {
    let lines: Vec<String> = clean_doc(text);
    // a line comment stays on one line
    let joined = lines
        .iter()
        .map(|l| l.trim_start_matches('/').trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let lines = if joined.is_empty() {
        Vec::new()
    } else {
        vec![format!("// {joined}")]
    };
    let anchor = file.ast.end(node);
    replace_group(file, node, lines, anchor, comment_slot)
}

fn replace_group(
    file: &mut File,
    owner: NodeId,
    lines: Vec<String>,
    anchor: Pos,
    slot: fn(&mut NodeKind) -> Option<&mut Option<NodeId>>,
) -> bool {
    let Some(current) = slot(file.ast.kind_mut(owner)).map(|s| *s) else {
        return false;
    };
    if lines.is_empty() {
        if let Some(old) = current {
            file.comments.retain(|c| *c != old);
        }
        if let Some(s) = slot(file.ast.kind_mut(owner)) {
            *s = None;
        }
        return true;
    }

    let text = lines.join("\n");
    match current {
        Some(group) => {
            let pos = file.ast.comment_group(group).first().map_or(anchor, |c| c.pos);
            *file.ast.kind_mut(group) = NodeKind::CommentGroup(vec![Comment { pos, text }]);
        }
        None => {
            // the group node has no position, so the layout around the
            // declaration is computed from the declaration itself
            let group = file
                .ast
                .alloc(Pos::NONE, Pos::NONE, NodeKind::CommentGroup(vec![Comment { pos: anchor, text }]));
            if let Some(s) = slot(file.ast.kind_mut(owner)) {
                *s = Some(group);
            }
            file.insert_comment(group);
        }
    }
    true
}

/// Replaces the statements of a function body with `text`.
///
/// The text is checked in a fragment holding only the function header, so
/// malformed statements never reach the file.
pub(crate) fn cover_body(prog: &mut Program, id: DeclId, text: &str) -> Result<()> {
    let decl = &prog.decls[id.index()];
    let file_idx = decl.file.index();
    let ast = &prog.files[file_idx].ast;

    let (owner, body) = body_target(prog, id)
        .ok_or_else(|| Error::Unsupported(format!("{} has no function body", decl.name)))?;
    let printer = Printer::new(ast, &prog.fset);
    let header = match ast.kind(owner) {
        NodeKind::FuncLit { ty, .. } => {
            let sig = printer.func_header(*ty);
            format!("func _{}", sig.strip_prefix("func").unwrap_or(&sig))
        }
        _ => printer.func_header(owner),
    };
    let fragment = format!("package p\n\n{header} {{\n{text}\n}}\n");
    let name = prog.next_fragment_name();
    debug_log!("\tbody fragment {}:\n{}", name, fragment);
    let parsed = parse_file(&mut prog.fset, &name, &fragment)?;

    let decls = parsed.ast.file(parsed.root).map(|f| f.decls.clone()).unwrap_or_default();
    let real: Vec<NodeId> = decls
        .iter()
        .copied()
        .filter(|d| !matches!(parsed.ast.kind(*d), NodeKind::Floating { .. }))
        .collect();
    let new_body = match real.as_slice() {
        [single] => match parsed.ast.kind(*single) {
            NodeKind::FuncDecl(f) => f.body,
            _ => None,
        },
        _ => None,
    };
    let Some(new_body) = new_body else {
        return Err(Error::StructuralMismatch(format!(
            "expected one function with a body, found {} declarations",
            real.len()
        )));
    };
    let NodeKind::Block(stmts) = parsed.ast.kind(new_body) else {
        return Err(Error::StructuralMismatch("function body is not a block".to_string()));
    };

    let file = &mut prog.files[file_idx];
    let old_groups = file.ast.comment_groups(body);
    file.comments.retain(|c| !old_groups.contains(c));
    let grafted: Vec<NodeId> = stmts.iter().map(|s| file.ast.graft(&parsed.ast, *s)).collect();
    for stmt in &grafted {
        for group in file.ast.comment_groups(*stmt) {
            file.insert_comment(group);
        }
    }
    if let NodeKind::Block(list) = file.ast.kind_mut(body) {
        *list = grafted;
    }
    Ok(())
}

/// The function (declaration or literal) owning the body of a declaration.
pub(crate) fn body_target(prog: &Program, id: DeclId) -> Option<(NodeId, NodeId)> {
    let decl = &prog.decls[id.index()];
    let ast = &prog.files[decl.file.index()].ast;
    let func_lit = |value: NodeId| match ast.kind(value) {
        NodeKind::FuncLit { body, .. } => Some((value, *body)),
        _ => None,
    };
    match ast.kind(decl.node) {
        NodeKind::FuncDecl(f) => f.body.map(|b| (decl.node, b)),
        NodeKind::ValueSpec(s) => {
            let i = s.names.iter().position(|n| Some(*n) == decl.ident)?;
            s.values.get(i).copied().and_then(func_lit)
        }
        NodeKind::ShortVar { names, values } => {
            let i = names.iter().position(|n| Some(*n) == decl.ident)?;
            values.get(i).copied().and_then(func_lit)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_doc_prefixes_every_line() {
        assert_eq!(clean_doc("Hello\nworld"), vec!["// Hello", "// world"]);
        assert_eq!(clean_doc("// already\n//\n// marked"), vec!["// already", "//", "// marked"]);
        assert_eq!(clean_doc("/* block */"), vec!["// block"]);
        assert!(clean_doc("  \n").is_empty());
    }
}
