//! Struct fields of a struct-shaped declaration and their tag handlers.
//!
//! Fields are correlated lazily: the resolver's field variables are matched to
//! the `Field` nodes of the struct literal that produced the type, by the
//! identifier (or, for embedded fields, the field node) that declared them.

use crate::ast::{comment_text, Ast, NodeId, NodeKind};
use crate::file::{File, FileId};
use crate::mutate;
use crate::program::Program;
use crate::tags::{quote, unquote, Tag, TagError, Tags};
use crate::types::{is_exported, ObjectId, Ty, Type, TypeId, Var};

/// One field slot, after multi-name groups have been expanded.
#[derive(Debug, Clone)]
pub(crate) struct StructField {
    pub(crate) file: FileId,
    /// The `Field` node.
    pub(crate) node: NodeId,
    pub(crate) var: ObjectId,
    pub(crate) name: String,
    pub(crate) embedded: bool,
}

pub(crate) fn correlate(prog: &Program, struct_ty: TypeId) -> Vec<StructField> {
    let table = &prog.table;
    let Type::Struct { fields, .. } = table.ty(struct_ty) else {
        return Vec::new();
    };
    let Some(origin) = table.struct_origin(struct_ty) else {
        debug_log!("\tstruct type without origin, no fields correlated");
        return Vec::new();
    };
    let file = &prog.files[origin.file.index()];
    let ast = &file.ast;
    let items: &[NodeId] = match ast.kind(origin.node) {
        NodeKind::StructType(list) => match ast.kind(*list) {
            NodeKind::FieldList(items) => items,
            _ => &[],
        },
        _ => &[],
    };

    let mut out = Vec::with_capacity(fields.len());
    for &var in fields {
        let obj = table.obj(var);
        let Some(decl) = obj.decl else { continue };
        let node = if obj.embedded {
            Some(decl.node)
        } else {
            items.iter().copied().find(|item| match ast.kind(*item) {
                NodeKind::Field(f) => f.names.contains(&decl.node),
                _ => false,
            })
        };
        let Some(node) = node else {
            debug_log!("\tfield {} has no syntax node", obj.name);
            continue;
        };
        out.push(StructField {
            file: origin.file,
            node,
            var,
            name: obj.name.clone(),
            embedded: obj.embedded,
        });
    }
    out
}

/// Tags of a field node. Malformed tags read as empty.
///
/// The node is the only copy of a tag: struct types shared by several
/// declarations hand out fields over the same node.
fn parse_tags(ast: &Ast, node: NodeId) -> Tags {
    let NodeKind::Field(f) = ast.kind(node) else {
        return Tags::new();
    };
    let Some(literal) = f.tag.as_deref() else {
        return Tags::new();
    };
    let Some(raw) = unquote(literal) else {
        return Tags::new();
    };
    match Tags::parse(&raw) {
        Ok(tags) => tags,
        Err(e) => {
            debug_log!("\tignoring malformed tag {}: {}", literal, e);
            Tags::new()
        }
    }
}

fn group_text(ast: &Ast, group: Option<NodeId>) -> String {
    group.map(|g| comment_text(ast.comment_group(g))).unwrap_or_default()
}

/// Read access to a struct field.
#[derive(Clone, Copy)]
pub struct FieldRef<'p> {
    pub(crate) prog: &'p Program,
    pub(crate) field: &'p StructField,
}

impl<'p> FieldRef<'p> {
    fn ast(&self) -> &'p Ast {
        &self.prog.files[self.field.file.index()].ast
    }

    pub fn name(&self) -> &'p str {
        &self.field.name
    }

    pub fn exported(&self) -> bool {
        is_exported(&self.field.name)
    }

    /// Anonymous (embedded) field.
    pub fn embedded(&self) -> bool {
        self.field.embedded
    }

    pub fn doc(&self) -> String {
        match self.ast().kind(self.field.node) {
            NodeKind::Field(f) => group_text(self.ast(), f.doc),
            _ => String::new(),
        }
    }

    /// Line comment after the field.
    pub fn comment(&self) -> String {
        match self.ast().kind(self.field.node) {
            NodeKind::Field(f) => group_text(self.ast(), f.comment),
            _ => String::new(),
        }
    }

    pub fn tags(&self) -> Tags {
        parse_tags(self.ast(), self.field.node)
    }

    pub fn ty(&self) -> Ty<'p> {
        self.var().ty()
    }

    pub fn var(&self) -> Var<'p> {
        let pkg = self.prog.files[self.field.file.index()].package;
        Var::new(&self.prog.table, self.field.var, Some(pkg))
    }

    /// Type text; unresolved types keep their source spelling.
    pub fn type_string(&self) -> String {
        self.var().type_string()
    }

    pub fn node(&self) -> NodeId {
        self.field.node
    }
}

/// Mutable access to a struct field.
pub struct FieldMut<'p> {
    pub(crate) file: &'p mut File,
    pub(crate) field: &'p StructField,
}

impl FieldMut<'_> {
    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn exported(&self) -> bool {
        is_exported(&self.field.name)
    }

    pub fn embedded(&self) -> bool {
        self.field.embedded
    }

    pub fn tags(&self) -> Tags {
        parse_tags(&self.file.ast, self.field.node)
    }

    /// Replaces the doc comment above the field; empty text removes it.
    pub fn set_doc(&mut self, text: &str) -> bool {
        mutate::set_doc(self.file, self.field.node, text)
    }

    /// Replaces the line comment after the field; empty text removes it.
    pub fn set_comment(&mut self, text: &str) -> bool {
        mutate::set_comment(self.file, self.field.node, text)
    }

    pub fn tags_mut(&mut self) -> TagsMut<'_> {
        let node = self.field.node;
        let tags = parse_tags(&self.file.ast, node);
        TagsMut {
            ast: &mut self.file.ast,
            node,
            tags,
        }
    }
}

/// Tag handler of one field. Every mutation sorts the tags by key and writes
/// the literal back to the field node, removing it when no tag remains.
pub struct TagsMut<'a> {
    ast: &'a mut Ast,
    node: NodeId,
    tags: Tags,
}

impl TagsMut<'_> {
    pub fn get(&self, key: &str) -> Result<&Tag, TagError> {
        self.tags.get(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.tags.keys()
    }

    pub fn set(&mut self, tag: Tag) -> Result<(), TagError> {
        self.tags.set(tag)?;
        self.write_back();
        Ok(())
    }

    pub fn add_options(&mut self, key: &str, options: &[&str]) {
        self.tags.add_options(key, options);
        self.write_back();
    }

    pub fn delete(&mut self, keys: &[&str]) {
        self.tags.delete(keys);
        self.write_back();
    }

    pub fn delete_options(&mut self, key: &str, options: &[&str]) {
        self.tags.delete_options(key, options);
        self.write_back();
    }

    fn write_back(&mut self) {
        self.tags.sort();
        let text = self.tags.to_string();
        let literal = if text.is_empty() {
            None
        } else if text.contains('`') {
            Some(quote(&text))
        } else {
            Some(format!("`{text}`"))
        };
        if let NodeKind::Field(f) = self.ast.kind_mut(self.node) {
            f.tag = literal;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Pos;

    fn field_with_tag(tag: Option<&str>) -> (Ast, NodeId) {
        let mut ast = Ast::new();
        let name = ast.alloc(Pos::NONE, Pos::NONE, NodeKind::Ident("Name".into()));
        let ty = ast.alloc(Pos::NONE, Pos::NONE, NodeKind::TypeName("string".into()));
        let field = ast.alloc(
            Pos::NONE,
            Pos::NONE,
            NodeKind::Field(crate::ast::Field {
                doc: None,
                names: vec![name],
                ty,
                tag: tag.map(str::to_string),
                comment: None,
            }),
        );
        (ast, field)
    }

    fn tag_literal(ast: &Ast, node: NodeId) -> Option<String> {
        match ast.kind(node) {
            NodeKind::Field(f) => f.tag.clone(),
            _ => None,
        }
    }

    #[test]
    fn malformed_tags_read_as_empty() {
        let (ast, node) = field_with_tag(Some("`json:bad`"));
        assert!(parse_tags(&ast, node).is_empty());
        let (ast, node) = field_with_tag(Some("\"json:\\\"a\\\"\""));
        assert_eq!(parse_tags(&ast, node).get("json").unwrap().name, "a");
    }

    #[test]
    fn mutations_sort_and_write_back() {
        let (mut ast, node) = field_with_tag(Some("`xml:\"n\"`"));
        let tags = parse_tags(&ast, node);
        let mut handler = TagsMut {
            ast: &mut ast,
            node,
            tags,
        };
        handler.set(Tag::new("json", "name").with_options(["omitempty"])).unwrap();
        assert_eq!(handler.get("json").unwrap().name, "name");
        assert_eq!(
            tag_literal(&ast, node).as_deref(),
            Some("`json:\"name,omitempty\" xml:\"n\"`")
        );

        let tags = parse_tags(&ast, node);
        assert_eq!(tags.keys(), vec!["json", "xml"], "a fresh read sees the written literal");
        let mut handler = TagsMut {
            ast: &mut ast,
            node,
            tags,
        };
        handler.delete(&["json", "xml"]);
        assert_eq!(handler.get("json"), Err(TagError::NotExist));
        assert_eq!(tag_literal(&ast, node), None, "empty tag sets clear the literal");
    }
}
