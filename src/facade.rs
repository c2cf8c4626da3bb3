//! Declaration facades.
//!
//! Every indexed declaration is a [`Declaration`] record owned by the
//! [`Program`] and addressed by a [`DeclId`]. Callers get short-lived handles:
//! [`Facade`] for queries, [`FacadeMut`] for edits. Accessors that only make
//! sense for one type shape panic when called on another; that is a bug in the
//! calling code, not a data problem.

use std::cell::OnceCell;
use std::fmt;

use crate::ast::{comment_text, NodeId, NodeKind};
use crate::error::Result;
use crate::file::FileId;
use crate::kind::{ObjKind, TypKind, TypKinds};
use crate::mutate;
use crate::package::PackageId;
use crate::position::Position;
use crate::printer::Printer;
use crate::program::Program;
use crate::struct_field::{correlate, FieldMut, FieldRef, StructField};
use crate::types::{is_exported, BasicInfo, BasicKind, ChanDir, ObjectId, Tuple, Ty, Type, TypeId, TypeTable, Var};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub(crate) u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Declaration {
    pub(crate) file: FileId,
    pub(crate) package: PackageId,
    /// Declaring identifier; `None` for anonymous struct types.
    pub(crate) ident: Option<NodeId>,
    /// Spec, function, field, statement or struct type node.
    pub(crate) node: NodeId,
    pub(crate) object: Option<ObjectId>,
    pub(crate) ty: TypeId,
    pub(crate) kind: ObjKind,
    pub(crate) name: String,
    /// Bound methods, in binding order.
    pub(crate) methods: Vec<DeclId>,
    pub(crate) fields: OnceCell<Vec<StructField>>,
    pub(crate) local: bool,
    pub(crate) removed: bool,
}

/// Read-only handle on one declaration.
#[derive(Clone, Copy)]
pub struct Facade<'p> {
    pub(crate) prog: &'p Program,
    pub(crate) id: DeclId,
}

impl<'p> Facade<'p> {
    fn decl(&self) -> &'p Declaration {
        &self.prog.decls[self.id.index()]
    }

    fn table(&self) -> &'p TypeTable {
        &self.prog.table
    }

    fn underlying_id(&self) -> TypeId {
        self.table().underlying(self.decl().ty)
    }

    fn shape(&self) -> &'p Type {
        self.table().ty(self.underlying_id())
    }

    fn ty_of(&self, id: TypeId) -> Ty<'p> {
        Ty::new(self.table(), id, Some(self.decl().package))
    }

    #[track_caller]
    fn require(&self, accessor: &str, kinds: impl Into<TypKinds>) {
        let kinds = kinds.into();
        let kind = self.typ_kind();
        if !kinds.matches(kind) {
            panic!("goaster: {accessor} of non-{kinds} type {} ({kind})", self.name());
        }
    }

    pub fn decl_id(&self) -> DeclId {
        self.id
    }

    pub fn obj_kind(&self) -> ObjKind {
        self.decl().kind
    }

    /// Shape of the declared type, one level below a named type.
    pub fn typ_kind(&self) -> TypKind {
        self.table().typ_kind(self.underlying_id())
    }

    /// Declared name; empty for anonymous struct types.
    pub fn name(&self) -> &'p str {
        &self.decl().name
    }

    /// Unique object id: exported names stand alone, others are qualified by
    /// their package path.
    pub fn id(&self) -> String {
        match self.decl().object {
            Some(obj) => self.table().object_id(obj),
            None => String::new(),
        }
    }

    pub fn exported(&self) -> bool {
        is_exported(self.name())
    }

    pub fn is_local(&self) -> bool {
        self.decl().local
    }

    pub fn doc(&self) -> String {
        let file = &self.prog.files[self.decl().file.index()];
        let ast = &file.ast;
        let Some(path) = self.ident().or(Some(self.node())).and_then(|n| ast.path_to(file.root, n)) else {
            return String::new();
        };
        for (i, &node) in path.iter().enumerate() {
            let doc = match ast.kind(node) {
                NodeKind::FuncDecl(d) => d.doc,
                NodeKind::Field(f) => f.doc,
                NodeKind::TypeSpec(_) | NodeKind::ValueSpec(_) | NodeKind::ImportSpec(_) => {
                    let own = match ast.kind(node) {
                        NodeKind::TypeSpec(s) => s.doc,
                        NodeKind::ValueSpec(s) => s.doc,
                        NodeKind::ImportSpec(s) => s.doc,
                        _ => None,
                    };
                    own.or_else(|| match path.get(i + 1).map(|p| ast.kind(*p)) {
                        Some(NodeKind::GenDecl(g)) if !g.grouped => g.doc,
                        _ => None,
                    })
                }
                NodeKind::ShortVar { .. } | NodeKind::Labeled { .. } => return String::new(),
                _ => continue,
            };
            return doc.map(|d| comment_text(ast.comment_group(d))).unwrap_or_default();
        }
        String::new()
    }

    /// Declared type.
    pub fn ty(&self) -> Ty<'p> {
        self.ty_of(self.decl().ty)
    }

    pub fn underlying(&self) -> Ty<'p> {
        self.ty_of(self.underlying_id())
    }

    pub fn is_alias(&self) -> bool {
        self.decl().object.is_some_and(|o| self.table().obj(o).is_alias)
    }

    // -- named types --------------------------------------------------------

    /// Bound methods of the named type this declaration resolves to: the
    /// declaration itself for a type, its declared type for values and aliases.
    /// `None` when that type is not named; named types declared outside the
    /// loaded packages have no bound methods.
    fn named_methods(&self) -> Option<&'p [DeclId]> {
        let ty = self.decl().ty;
        if !matches!(self.table().ty(ty), Type::Named { .. }) {
            return None;
        }
        if self.obj_kind() == ObjKind::Typ && !self.is_alias() {
            return Some(&self.decl().methods);
        }
        let prog = self.prog;
        let owner = prog.packages.iter().find_map(|p| p.facade_of_type(ty));
        Some(owner.map_or(&[][..], |id| &prog.decls[id.index()].methods[..]))
    }

    #[track_caller]
    fn require_named(&self, accessor: &str) -> &'p [DeclId] {
        match self.named_methods() {
            Some(methods) => methods,
            None => panic!("goaster: {accessor} of non-Named type {} ({})", self.name(), self.ty().kind()),
        }
    }

    pub fn num_methods(&self) -> usize {
        self.require_named("NumMethods").len()
    }

    /// Panics when `i` is out of range.
    pub fn method(&self, i: usize) -> Facade<'p> {
        let methods = self.require_named("Method");
        assert!(i < methods.len(), "goaster: method index {i} out of range [0, {})", methods.len());
        self.prog.facade(methods[i])
    }

    /// Bound methods; empty for declarations whose type is not named.
    pub fn methods(&self) -> impl Iterator<Item = Facade<'p>> + 'p {
        let prog = self.prog;
        self.named_methods().unwrap_or_default().iter().map(move |m| prog.facade(*m))
    }

    /// Whether this type (or a pointer to it) satisfies the interface `iface`.
    pub fn implements(&self, iface: &Facade<'_>, use_pointer: bool) -> bool {
        iface.require("Implements", TypKind::Interface);
        self.table().implements(self.decl().ty, iface.decl().ty, use_pointer)
    }

    pub fn assignable_to(&self, t: &Facade<'_>) -> bool {
        self.table().assignable(self.decl().ty, t.decl().ty)
    }

    pub fn convertible_to(&self, t: &Facade<'_>) -> bool {
        self.table().convertible(self.decl().ty, t.decl().ty)
    }

    /// Whether a value of this interface type can be asserted to `t`.
    pub fn assertable_to(&self, t: &Facade<'_>) -> bool {
        self.require("AssertableTo", TypKind::Interface);
        self.table().assertable(self.decl().ty, t.decl().ty)
    }

    // -- element-bearing shapes --------------------------------------------

    pub fn elem(&self) -> Ty<'p> {
        self.require(
            "Elem",
            TypKind::Array | TypKind::Slice | TypKind::Map | TypKind::Chan | TypKind::Pointer,
        );
        let elem = match self.shape() {
            Type::Array { elem, .. }
            | Type::Slice { elem }
            | Type::Map { elem, .. }
            | Type::Chan { elem, .. }
            | Type::Pointer { elem } => *elem,
            _ => self.table().invalid(),
        };
        self.ty_of(elem)
    }

    pub fn key(&self) -> Ty<'p> {
        self.require("Key", TypKind::Map);
        match self.shape() {
            Type::Map { key, .. } => self.ty_of(*key),
            _ => self.ty_of(self.table().invalid()),
        }
    }

    /// Array length (-1 for `[...]T`) or tuple length.
    pub fn len(&self) -> i64 {
        self.require("Len", TypKind::Array | TypKind::Tuple);
        match self.shape() {
            Type::Array { len, .. } => len.unwrap_or(-1),
            Type::Tuple { vars } => vars.len() as i64,
            _ => 0,
        }
    }

    pub fn chan_dir(&self) -> ChanDir {
        self.require("ChanDir", TypKind::Chan);
        match self.shape() {
            Type::Chan { dir, .. } => *dir,
            _ => ChanDir::SendRecv,
        }
    }

    pub fn basic_kind(&self) -> BasicKind {
        self.require("BasicKind", TypKind::Basic);
        match self.shape() {
            Type::Basic { kind, .. } => *kind,
            _ => BasicKind::Invalid,
        }
    }

    pub fn basic_info(&self) -> BasicInfo {
        self.basic_kind().info()
    }

    // -- signatures ---------------------------------------------------------

    fn signature(&self, accessor: &str) -> (Option<ObjectId>, TypeId, TypeId, bool) {
        self.require(accessor, TypKind::Signature);
        match self.shape() {
            Type::Signature {
                recv,
                params,
                results,
                variadic,
            } => (*recv, *params, *results, *variadic),
            _ => {
                let empty = self.table().empty_tuple();
                (None, empty, empty, false)
            }
        }
    }

    pub fn is_method(&self) -> bool {
        self.signature("IsMethod").0.is_some()
    }

    pub fn recv(&self) -> Option<Var<'p>> {
        let (recv, ..) = self.signature("Recv");
        recv.map(|r| Var::new(self.table(), r, Some(self.decl().package)))
    }

    pub fn params(&self) -> Tuple<'p> {
        let (_, params, ..) = self.signature("Params");
        Tuple::new(self.table(), params, Some(self.decl().package))
    }

    pub fn results(&self) -> Tuple<'p> {
        let (_, _, results, _) = self.signature("Results");
        Tuple::new(self.table(), results, Some(self.decl().package))
    }

    pub fn variadic(&self) -> bool {
        self.signature("Variadic").3
    }

    /// The formatted statement block; `None` for abstract methods and
    /// external functions.
    pub fn body(&self) -> Option<String> {
        self.require("Body", TypKind::Signature);
        let (_, body) = mutate::body_target(self.prog, self.id)?;
        let file = &self.prog.files[self.decl().file.index()];
        Some(Printer::new(&file.ast, &self.prog.fset).node(body))
    }

    // -- structs ------------------------------------------------------------

    fn fields(&self, accessor: &str) -> &'p [StructField] {
        self.require(accessor, TypKind::Struct);
        let prog = self.prog;
        let ty = self.underlying_id();
        self.decl().fields.get_or_init(|| correlate(prog, ty))
    }

    pub fn num_fields(&self) -> usize {
        self.fields("NumFields").len()
    }

    /// Panics when `i` is out of range.
    pub fn field(&self, i: usize) -> FieldRef<'p> {
        let fields = self.fields("Field");
        assert!(i < fields.len(), "goaster: field index {i} out of range [0, {})", fields.len());
        FieldRef {
            prog: self.prog,
            field: &fields[i],
        }
    }

    pub fn field_by_name(&self, name: &str) -> Option<FieldRef<'p>> {
        let prog = self.prog;
        self.fields("FieldByName")
            .iter()
            .find(|f| f.name == name)
            .map(|field| FieldRef { prog, field })
    }

    pub fn struct_fields(&self) -> impl Iterator<Item = FieldRef<'p>> + 'p {
        let prog = self.prog;
        self.fields("Fields").iter().map(move |field| FieldRef { prog, field })
    }

    // -- interfaces ---------------------------------------------------------

    pub fn iface_num_embeddeds(&self) -> usize {
        self.require("NumEmbeddeds", TypKind::Interface);
        self.table().embeddeds(self.decl().ty).len()
    }

    pub fn iface_embedded_type(&self, i: usize) -> Ty<'p> {
        self.require("EmbeddedType", TypKind::Interface);
        let embeddeds = self.table().embeddeds(self.decl().ty);
        assert!(i < embeddeds.len(), "goaster: embedded index {i} out of range [0, {})", embeddeds.len());
        self.ty_of(embeddeds[i])
    }

    /// Interface without methods, embedded ones included.
    pub fn iface_empty(&self) -> bool {
        self.require("Empty", TypKind::Interface);
        self.table().interface_methods(self.decl().ty).is_empty()
    }

    pub fn iface_num_explicit_methods(&self) -> usize {
        self.require("NumExplicitMethods", TypKind::Interface);
        self.table().explicit_methods(self.decl().ty).len()
    }

    /// Explicit methods are ordered by their unique id.
    pub fn iface_explicit_method(&self, i: usize) -> Var<'p> {
        self.require("ExplicitMethod", TypKind::Interface);
        let methods = self.table().explicit_methods(self.decl().ty);
        assert!(i < methods.len(), "goaster: method index {i} out of range [0, {})", methods.len());
        Var::new(self.table(), methods[i], Some(self.decl().package))
    }

    // -- location -----------------------------------------------------------

    pub fn file(&self) -> FileId {
        self.decl().file
    }

    pub fn package(&self) -> PackageId {
        self.decl().package
    }

    pub fn ident(&self) -> Option<NodeId> {
        self.decl().ident
    }

    pub fn node(&self) -> NodeId {
        self.decl().node
    }

    pub fn object(&self) -> Option<ObjectId> {
        self.decl().object
    }

    pub fn position(&self) -> Option<Position> {
        let ast = &self.prog.files[self.decl().file.index()].ast;
        let pos = ast.pos(self.ident().unwrap_or(self.node()));
        self.prog.fset.position(pos)
    }
}

impl fmt::Display for Facade<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prog.preview(self.id))
    }
}

impl fmt::Debug for Facade<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facade")
            .field("name", &self.name())
            .field("obj_kind", &self.obj_kind())
            .field("typ_kind", &self.typ_kind())
            .finish()
    }
}

/// Mutable handle on one declaration.
pub struct FacadeMut<'p> {
    pub(crate) prog: &'p mut Program,
    pub(crate) id: DeclId,
}

impl FacadeMut<'_> {
    pub fn as_ref(&self) -> Facade<'_> {
        self.prog.facade(self.id)
    }

    pub fn decl_id(&self) -> DeclId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.prog.decls[self.id.index()].name
    }

    pub fn obj_kind(&self) -> ObjKind {
        self.prog.decls[self.id.index()].kind
    }

    pub fn typ_kind(&self) -> TypKind {
        self.as_ref().typ_kind()
    }

    /// Replaces the doc comment; empty text removes it. Returns false when the
    /// declaration has no doc slot (statements inside bodies).
    pub fn set_doc(&mut self, text: &str) -> bool {
        let decl = &self.prog.decls[self.id.index()];
        let target = decl.ident.unwrap_or(decl.node);
        let file = decl.file.index();
        mutate::set_doc(&mut self.prog.files[file], target, text)
    }

    /// Replaces the function body with the statements in `text`.
    pub fn cover_body(&mut self, text: &str) -> Result<()> {
        self.as_ref().require("CoverBody", TypKind::Signature);
        mutate::cover_body(self.prog, self.id, text)
    }

    pub fn num_fields(&self) -> usize {
        self.as_ref().num_fields()
    }

    /// Panics when `i` is out of range.
    pub fn field_mut(&mut self, i: usize) -> FieldMut<'_> {
        let n = self.as_ref().num_fields();
        assert!(i < n, "goaster: field index {i} out of range [0, {n})");
        let Program { decls, files, .. } = &mut *self.prog;
        let field = decls[self.id.index()]
            .fields
            .get()
            .and_then(|f| f.get(i))
            .unwrap_or_else(|| panic!("goaster: field index {i} out of range [0, {n})"));
        FieldMut {
            file: &mut files[field.file.index()],
            field,
        }
    }

    pub fn field_mut_by_name(&mut self, name: &str) -> Option<FieldMut<'_>> {
        let i = self
            .as_ref()
            .struct_fields()
            .position(|f| f.name() == name)?;
        Some(self.field_mut(i))
    }
}
