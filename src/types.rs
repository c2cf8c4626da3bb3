//! Resolved types and objects.
//!
//! One [`TypeTable`] per program holds every type and object, including the
//! universe scope. Types reference each other by [`TypeId`], objects by
//! [`ObjectId`], so named types from different packages can point at each
//! other without shared ownership.

use std::collections::HashMap;
use std::fmt;

use crate::ast::NodeId;
use crate::file::FileId;
use crate::kind::{ObjKind, TypKind};
use crate::package::PackageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

/// A syntax node of a specific file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub file: FileId,
    pub node: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ChanDir {
    SendRecv,
    SendOnly,
    RecvOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum BasicKind {
    Invalid,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub const BYTE: BasicKind = BasicKind::Uint8;
    pub const RUNE: BasicKind = BasicKind::Int32;

    pub fn info(self) -> BasicInfo {
        use BasicKind::*;
        match self {
            Bool => BasicInfo::IS_BOOLEAN,
            Int | Int8 | Int16 | Int32 | Int64 => BasicInfo::IS_INTEGER,
            Uint | Uint8 | Uint16 | Uint32 | Uint64 | Uintptr => BasicInfo::IS_INTEGER | BasicInfo::IS_UNSIGNED,
            Float32 | Float64 => BasicInfo::IS_FLOAT,
            Complex64 | Complex128 => BasicInfo::IS_COMPLEX,
            String => BasicInfo::IS_STRING,
            UntypedBool => BasicInfo::IS_BOOLEAN | BasicInfo::IS_UNTYPED,
            UntypedInt | UntypedRune => BasicInfo::IS_INTEGER | BasicInfo::IS_UNTYPED,
            UntypedFloat => BasicInfo::IS_FLOAT | BasicInfo::IS_UNTYPED,
            UntypedComplex => BasicInfo::IS_COMPLEX | BasicInfo::IS_UNTYPED,
            UntypedString => BasicInfo::IS_STRING | BasicInfo::IS_UNTYPED,
            UntypedNil => BasicInfo::IS_UNTYPED,
            Invalid | UnsafePointer => BasicInfo(0),
        }
    }

    /// Type the untyped kinds default to when a variable is declared.
    pub fn default_kind(self) -> BasicKind {
        match self {
            BasicKind::UntypedBool => BasicKind::Bool,
            BasicKind::UntypedInt => BasicKind::Int,
            BasicKind::UntypedRune => BasicKind::RUNE,
            BasicKind::UntypedFloat => BasicKind::Float64,
            BasicKind::UntypedComplex => BasicKind::Complex128,
            BasicKind::UntypedString => BasicKind::String,
            other => other,
        }
    }
}

/// Properties of a basic type, combinable as flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BasicInfo(pub u32);

impl BasicInfo {
    pub const IS_BOOLEAN: BasicInfo = BasicInfo(1 << 0);
    pub const IS_INTEGER: BasicInfo = BasicInfo(1 << 1);
    pub const IS_UNSIGNED: BasicInfo = BasicInfo(1 << 2);
    pub const IS_FLOAT: BasicInfo = BasicInfo(1 << 3);
    pub const IS_COMPLEX: BasicInfo = BasicInfo(1 << 4);
    pub const IS_STRING: BasicInfo = BasicInfo(1 << 5);
    pub const IS_UNTYPED: BasicInfo = BasicInfo(1 << 6);

    pub const IS_ORDERED: BasicInfo = BasicInfo(Self::IS_INTEGER.0 | Self::IS_FLOAT.0 | Self::IS_STRING.0);
    pub const IS_NUMERIC: BasicInfo = BasicInfo(Self::IS_INTEGER.0 | Self::IS_FLOAT.0 | Self::IS_COMPLEX.0);
    pub const IS_CONST_TYPE: BasicInfo = BasicInfo(Self::IS_BOOLEAN.0 | Self::IS_NUMERIC.0 | Self::IS_STRING.0);

    /// Reports whether any of the flags in `other` is set.
    pub fn intersects(self, other: BasicInfo) -> bool {
        self.0 & other.0 != 0
    }

    pub fn contains(self, other: BasicInfo) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for BasicInfo {
    type Output = BasicInfo;

    fn bitor(self, rhs: BasicInfo) -> BasicInfo {
        BasicInfo(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
pub enum Type {
    Invalid,
    Basic { kind: BasicKind, name: &'static str },
    /// `len` is `None` when the length is not a literal.
    Array { len: Option<i64>, elem: TypeId },
    Slice { elem: TypeId },
    Struct { fields: Vec<ObjectId>, tags: Vec<Option<String>> },
    Pointer { elem: TypeId },
    Tuple { vars: Vec<ObjectId> },
    Signature {
        recv: Option<ObjectId>,
        params: TypeId,
        results: TypeId,
        variadic: bool,
    },
    Interface { methods: Vec<ObjectId>, embeddeds: Vec<TypeId> },
    Map { key: TypeId, elem: TypeId },
    Chan { dir: ChanDir, elem: TypeId },
    /// `underlying` is `None` until the declaration has been resolved.
    Named {
        obj: ObjectId,
        underlying: Option<TypeId>,
        methods: Vec<ObjectId>,
    },
}

#[derive(Debug, Clone)]
pub struct Object {
    pub kind: ObjKind,
    pub name: String,
    pub pkg: Option<PackageId>,
    pub ty: TypeId,
    /// Declaring identifier, `None` for universe and synthesized objects.
    pub decl: Option<NodeRef>,
    pub is_alias: bool,
    pub field: bool,
    pub embedded: bool,
    pub local: bool,
}

impl Object {
    pub fn new(kind: ObjKind, name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            kind,
            name: name.into(),
            pkg: None,
            ty,
            decl: None,
            is_alias: false,
            field: false,
            embedded: false,
            local: false,
        }
    }

    pub fn exported(&self) -> bool {
        is_exported(&self.name)
    }
}

pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

const BASICS: &[(BasicKind, &str)] = &[
    (BasicKind::Bool, "bool"),
    (BasicKind::Int, "int"),
    (BasicKind::Int8, "int8"),
    (BasicKind::Int16, "int16"),
    (BasicKind::Int32, "int32"),
    (BasicKind::Int64, "int64"),
    (BasicKind::Uint, "uint"),
    (BasicKind::Uint8, "uint8"),
    (BasicKind::Uint16, "uint16"),
    (BasicKind::Uint32, "uint32"),
    (BasicKind::Uint64, "uint64"),
    (BasicKind::Uintptr, "uintptr"),
    (BasicKind::Float32, "float32"),
    (BasicKind::Float64, "float64"),
    (BasicKind::Complex64, "complex64"),
    (BasicKind::Complex128, "complex128"),
    (BasicKind::String, "string"),
    (BasicKind::Uint8, "byte"),
    (BasicKind::Int32, "rune"),
];

const UNTYPED: &[(BasicKind, &str)] = &[
    (BasicKind::UntypedBool, "untyped bool"),
    (BasicKind::UntypedInt, "untyped int"),
    (BasicKind::UntypedRune, "untyped rune"),
    (BasicKind::UntypedFloat, "untyped float"),
    (BasicKind::UntypedComplex, "untyped complex"),
    (BasicKind::UntypedString, "untyped string"),
    (BasicKind::UntypedNil, "untyped nil"),
];

const BUILTIN_FUNCS: &[&str] = &[
    "append", "cap", "clear", "close", "complex", "copy", "delete", "imag", "len", "make", "max", "min", "new",
    "panic", "print", "println", "real", "recover",
];

#[derive(Debug, Clone)]
struct PackageName {
    name: String,
    path: String,
}

#[derive(Debug, Clone)]
pub struct TypeTable {
    types: Vec<Type>,
    objects: Vec<Object>,
    universe: HashMap<String, ObjectId>,
    basics: HashMap<&'static str, TypeId>,
    kinds: HashMap<BasicKind, TypeId>,
    invalid: TypeId,
    empty_interface: TypeId,
    empty_tuple: TypeId,
    packages: HashMap<PackageId, PackageName>,
    /// Source text of types the resolver could not resolve, per variable.
    invalid_text: HashMap<ObjectId, String>,
    /// Struct literal that produced each struct type.
    struct_origin: HashMap<TypeId, NodeRef>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut t = TypeTable {
            types: Vec::new(),
            objects: Vec::new(),
            universe: HashMap::new(),
            basics: HashMap::new(),
            kinds: HashMap::new(),
            invalid: TypeId(0),
            empty_interface: TypeId(0),
            empty_tuple: TypeId(0),
            packages: HashMap::new(),
            invalid_text: HashMap::new(),
            struct_origin: HashMap::new(),
        };
        t.invalid = t.new_type(Type::Invalid);
        t.empty_interface = t.new_type(Type::Interface {
            methods: Vec::new(),
            embeddeds: Vec::new(),
        });
        t.empty_tuple = t.new_type(Type::Tuple { vars: Vec::new() });

        for &(kind, name) in BASICS.iter().chain(UNTYPED) {
            let id = t.new_type(Type::Basic { kind, name });
            t.basics.insert(name, id);
            t.kinds.entry(kind).or_insert(id);
            if !name.starts_with("untyped") {
                t.declare_universe(ObjKind::Typ, name, id);
            }
        }
        let unsafe_ptr = t.new_type(Type::Basic {
            kind: BasicKind::UnsafePointer,
            name: "unsafe.Pointer",
        });
        t.kinds.insert(BasicKind::UnsafePointer, unsafe_ptr);

        // error: interface { Error() string }
        let string = t.basic(BasicKind::String);
        let error_obj = t.declare_universe(ObjKind::Typ, "error", t.invalid);
        let error_named = t.new_type(Type::Named {
            obj: error_obj,
            underlying: None,
            methods: Vec::new(),
        });
        t.objects[error_obj.0 as usize].ty = error_named;
        let result = t.new_object(Object::new(ObjKind::Var, "", string));
        let results = t.new_type(Type::Tuple { vars: vec![result] });
        let recv = t.new_object(Object::new(ObjKind::Var, "", error_named));
        let sig = t.new_type(Type::Signature {
            recv: Some(recv),
            params: t.empty_tuple,
            results,
            variadic: false,
        });
        let error_method = t.new_object(Object::new(ObjKind::Fun, "Error", sig));
        let error_iface = t.new_type(Type::Interface {
            methods: vec![error_method],
            embeddeds: Vec::new(),
        });
        t.set_underlying(error_named, error_iface);

        let any = t.declare_universe(ObjKind::Typ, "any", t.empty_interface);
        t.objects[any.0 as usize].is_alias = true;

        let comparable = t.declare_universe(ObjKind::Typ, "comparable", t.invalid);
        let comparable_named = t.new_type(Type::Named {
            obj: comparable,
            underlying: Some(t.empty_interface),
            methods: Vec::new(),
        });
        t.objects[comparable.0 as usize].ty = comparable_named;

        for name in BUILTIN_FUNCS {
            t.declare_universe(ObjKind::Bui, name, t.invalid);
        }
        let ubool = t.basic(BasicKind::UntypedBool);
        t.declare_universe(ObjKind::Con, "true", ubool);
        t.declare_universe(ObjKind::Con, "false", ubool);
        let uint = t.basic(BasicKind::UntypedInt);
        t.declare_universe(ObjKind::Con, "iota", uint);
        let unil = t.basic(BasicKind::UntypedNil);
        t.declare_universe(ObjKind::Nil, "nil", unil);
        t
    }

    fn declare_universe(&mut self, kind: ObjKind, name: &str, ty: TypeId) -> ObjectId {
        let id = self.new_object(Object::new(kind, name, ty));
        self.universe.insert(name.to_string(), id);
        id
    }

    pub fn new_type(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn new_object(&mut self, obj: Object) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(obj);
        id
    }

    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    pub fn ty_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.0 as usize]
    }

    pub fn obj(&self, id: ObjectId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub fn obj_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.0 as usize]
    }

    pub fn invalid(&self) -> TypeId {
        self.invalid
    }

    pub fn empty_interface(&self) -> TypeId {
        self.empty_interface
    }

    pub fn empty_tuple(&self) -> TypeId {
        self.empty_tuple
    }

    pub fn basic(&self, kind: BasicKind) -> TypeId {
        self.kinds.get(&kind).copied().unwrap_or(self.invalid)
    }

    pub fn basic_by_name(&self, name: &str) -> Option<TypeId> {
        self.basics.get(name).copied().filter(|_| !name.starts_with("untyped"))
    }

    pub fn universe_lookup(&self, name: &str) -> Option<ObjectId> {
        self.universe.get(name).copied()
    }

    pub fn set_package(&mut self, id: PackageId, name: &str, path: &str) {
        self.packages.insert(
            id,
            PackageName {
                name: name.to_string(),
                path: path.to_string(),
            },
        );
    }

    pub fn package_path(&self, id: PackageId) -> Option<&str> {
        self.packages.get(&id).map(|p| p.path.as_str())
    }

    pub(crate) fn set_underlying(&mut self, named: TypeId, underlying: TypeId) {
        if let Type::Named { underlying: u, .. } = self.ty_mut(named) {
            *u = Some(underlying);
        }
    }

    pub(crate) fn add_method(&mut self, named: TypeId, method: ObjectId) {
        if let Type::Named { methods, .. } = self.ty_mut(named) {
            methods.push(method);
        }
    }

    pub(crate) fn record_invalid_text(&mut self, var: ObjectId, text: impl Into<String>) {
        self.invalid_text.insert(var, text.into());
    }

    pub(crate) fn set_struct_origin(&mut self, ty: TypeId, origin: NodeRef) {
        self.struct_origin.insert(ty, origin);
    }

    pub fn struct_origin(&self, ty: TypeId) -> Option<NodeRef> {
        self.struct_origin.get(&ty).copied()
    }

    /// Underlying type: named types resolve one level, everything else is its
    /// own underlying type.
    pub fn underlying(&self, id: TypeId) -> TypeId {
        match self.ty(id) {
            Type::Named { underlying, .. } => underlying.unwrap_or(self.invalid),
            _ => id,
        }
    }

    pub fn typ_kind(&self, id: TypeId) -> TypKind {
        match self.ty(id) {
            Type::Invalid => TypKind::Invalid,
            Type::Basic { kind, .. } => {
                if *kind == BasicKind::Invalid {
                    TypKind::Invalid
                } else {
                    TypKind::Basic
                }
            }
            Type::Array { .. } => TypKind::Array,
            Type::Slice { .. } => TypKind::Slice,
            Type::Struct { .. } => TypKind::Struct,
            Type::Pointer { .. } => TypKind::Pointer,
            Type::Tuple { .. } => TypKind::Tuple,
            Type::Signature { .. } => TypKind::Signature,
            Type::Interface { .. } => TypKind::Interface,
            Type::Map { .. } => TypKind::Map,
            Type::Chan { .. } => TypKind::Chan,
            Type::Named { .. } => TypKind::Named,
        }
    }

    /// The `Id` of an object: exported names stand alone, unexported names
    /// are qualified by their package path.
    pub fn object_id(&self, id: ObjectId) -> String {
        let obj = self.obj(id);
        if obj.exported() {
            return obj.name.clone();
        }
        let path = obj.pkg.and_then(|p| self.package_path(p)).unwrap_or("_");
        format!("{path}.{}", obj.name)
    }

    pub fn pointer_to(&mut self, elem: TypeId) -> TypeId {
        self.new_type(Type::Pointer { elem })
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Type as Go source, qualifying named types of packages other than `from`.
    pub fn type_string(&self, id: TypeId, from: Option<PackageId>) -> String {
        let mut out = String::new();
        self.write_type(&mut out, id, from, 0);
        out
    }

    /// Type of a variable, using the recorded source text when the resolver
    /// could not resolve it.
    pub fn var_type_string(&self, var: ObjectId, from: Option<PackageId>) -> String {
        if let Some(text) = self.invalid_text.get(&var) {
            return text.clone();
        }
        self.type_string(self.obj(var).ty, from)
    }

    fn write_type(&self, out: &mut String, id: TypeId, from: Option<PackageId>, depth: usize) {
        if depth > 32 {
            out.push_str("...");
            return;
        }
        match self.ty(id) {
            Type::Invalid => out.push_str("invalid type"),
            Type::Basic { name, .. } => out.push_str(name),
            Type::Array { len, elem } => {
                match len {
                    Some(n) => out.push_str(&format!("[{n}]")),
                    None => out.push_str("[?]"),
                }
                self.write_type(out, *elem, from, depth + 1);
            }
            Type::Slice { elem } => {
                out.push_str("[]");
                self.write_type(out, *elem, from, depth + 1);
            }
            Type::Struct { fields, tags } => {
                out.push_str("struct{");
                for (i, f) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    let obj = self.obj(*f);
                    if !obj.embedded {
                        out.push_str(&obj.name);
                        out.push(' ');
                    }
                    out.push_str(&self.var_type_string(*f, from));
                    if let Some(Some(tag)) = tags.get(i) {
                        out.push(' ');
                        out.push_str(&format!("{tag:?}"));
                    }
                }
                out.push('}');
            }
            Type::Pointer { elem } => {
                out.push('*');
                self.write_type(out, *elem, from, depth + 1);
            }
            Type::Tuple { vars } => {
                out.push('(');
                self.write_vars(out, vars, false, from);
                out.push(')');
            }
            Type::Signature {
                params,
                results,
                variadic,
                ..
            } => {
                out.push_str("func");
                self.write_signature(out, *params, *results, *variadic, from);
            }
            Type::Interface { methods, embeddeds } => {
                if methods.is_empty() && embeddeds.is_empty() {
                    out.push_str("interface{}");
                    return;
                }
                out.push_str("interface{");
                let mut first = true;
                for e in embeddeds {
                    if !first {
                        out.push_str("; ");
                    }
                    first = false;
                    self.write_type(out, *e, from, depth + 1);
                }
                for m in methods {
                    if !first {
                        out.push_str("; ");
                    }
                    first = false;
                    let obj = self.obj(*m);
                    out.push_str(&obj.name);
                    if let Type::Signature {
                        params,
                        results,
                        variadic,
                        ..
                    } = self.ty(obj.ty)
                    {
                        self.write_signature(out, *params, *results, *variadic, from);
                    }
                }
                out.push('}');
            }
            Type::Map { key, elem } => {
                out.push_str("map[");
                self.write_type(out, *key, from, depth + 1);
                out.push(']');
                self.write_type(out, *elem, from, depth + 1);
            }
            Type::Chan { dir, elem } => {
                out.push_str(match dir {
                    ChanDir::SendRecv => "chan ",
                    ChanDir::SendOnly => "chan<- ",
                    ChanDir::RecvOnly => "<-chan ",
                });
                self.write_type(out, *elem, from, depth + 1);
            }
            Type::Named { obj, .. } => {
                let o = self.obj(*obj);
                if let (Some(pkg), true) = (o.pkg, o.pkg != from) {
                    if let Some(p) = self.packages.get(&pkg) {
                        out.push_str(&p.name);
                        out.push('.');
                    }
                }
                out.push_str(&o.name);
            }
        }
    }

    fn write_signature(&self, out: &mut String, params: TypeId, results: TypeId, variadic: bool, from: Option<PackageId>) {
        out.push('(');
        if let Type::Tuple { vars } = self.ty(params) {
            self.write_vars(out, vars, variadic, from);
        }
        out.push(')');
        let Type::Tuple { vars } = self.ty(results) else { return };
        match vars.as_slice() {
            [] => {}
            [single] if self.obj(*single).name.is_empty() => {
                out.push(' ');
                out.push_str(&self.var_type_string(*single, from));
            }
            _ => {
                out.push_str(" (");
                self.write_vars(out, vars, false, from);
                out.push(')');
            }
        }
    }

    fn write_vars(&self, out: &mut String, vars: &[ObjectId], variadic: bool, from: Option<PackageId>) {
        for (i, v) in vars.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let obj = self.obj(*v);
            if !obj.name.is_empty() {
                out.push_str(&obj.name);
                out.push(' ');
            }
            if let Some(text) = self.invalid_text.get(v) {
                out.push_str(text);
                continue;
            }
            if variadic && i + 1 == vars.len() {
                out.push_str("...");
                if let Type::Slice { elem } = self.ty(obj.ty) {
                    out.push_str(&self.type_string(*elem, from));
                    continue;
                }
            }
            out.push_str(&self.var_type_string(*v, from));
        }
    }

    // -----------------------------------------------------------------------
    // Relations
    // -----------------------------------------------------------------------

    pub fn tuple_vars(&self, id: TypeId) -> &[ObjectId] {
        match self.ty(id) {
            Type::Tuple { vars } => vars,
            _ => &[],
        }
    }

    pub fn identical(&self, a: TypeId, b: TypeId) -> bool {
        self.identical_depth(a, b, 0)
    }

    fn identical_depth(&self, a: TypeId, b: TypeId, depth: usize) -> bool {
        if a == b {
            return true;
        }
        if depth > 32 {
            return false;
        }
        let same = |x: TypeId, y: TypeId| self.identical_depth(x, y, depth + 1);
        match (self.ty(a), self.ty(b)) {
            (Type::Basic { kind: x, .. }, Type::Basic { kind: y, .. }) => x == y,
            (Type::Array { len: l1, elem: e1 }, Type::Array { len: l2, elem: e2 }) => l1 == l2 && same(*e1, *e2),
            (Type::Slice { elem: e1 }, Type::Slice { elem: e2 }) => same(*e1, *e2),
            (Type::Pointer { elem: e1 }, Type::Pointer { elem: e2 }) => same(*e1, *e2),
            (Type::Map { key: k1, elem: e1 }, Type::Map { key: k2, elem: e2 }) => same(*k1, *k2) && same(*e1, *e2),
            (Type::Chan { dir: d1, elem: e1 }, Type::Chan { dir: d2, elem: e2 }) => d1 == d2 && same(*e1, *e2),
            (Type::Struct { fields: f1, tags: t1 }, Type::Struct { fields: f2, tags: t2 }) => {
                f1.len() == f2.len()
                    && t1 == t2
                    && f1.iter().zip(f2).all(|(x, y)| {
                        let (ox, oy) = (self.obj(*x), self.obj(*y));
                        ox.name == oy.name && ox.embedded == oy.embedded && same(ox.ty, oy.ty)
                    })
            }
            (Type::Tuple { vars: v1 }, Type::Tuple { vars: v2 }) => {
                v1.len() == v2.len() && v1.iter().zip(v2).all(|(x, y)| same(self.obj(*x).ty, self.obj(*y).ty))
            }
            (
                Type::Signature {
                    params: p1,
                    results: r1,
                    variadic: v1,
                    ..
                },
                Type::Signature {
                    params: p2,
                    results: r2,
                    variadic: v2,
                    ..
                },
            ) => v1 == v2 && same(*p1, *p2) && same(*r1, *r2),
            (Type::Interface { .. }, Type::Interface { .. }) => {
                let m1 = self.interface_methods(a);
                let m2 = self.interface_methods(b);
                m1.len() == m2.len()
                    && m1.iter().zip(&m2).all(|(x, y)| {
                        let (ox, oy) = (self.obj(*x), self.obj(*y));
                        ox.name == oy.name && same(ox.ty, oy.ty)
                    })
            }
            (Type::Named { obj: o1, .. }, Type::Named { obj: o2, .. }) => o1 == o2,
            _ => false,
        }
    }

    /// Explicitly declared methods of an interface type, ordered by object id.
    pub fn explicit_methods(&self, iface: TypeId) -> Vec<ObjectId> {
        let mut out = match self.ty(self.underlying(iface)) {
            Type::Interface { methods, .. } => methods.clone(),
            _ => Vec::new(),
        };
        out.sort_by_key(|m| self.object_id(*m));
        out
    }

    pub fn embeddeds(&self, iface: TypeId) -> &[TypeId] {
        match self.ty(self.underlying(iface)) {
            Type::Interface { embeddeds, .. } => embeddeds,
            _ => &[],
        }
    }

    /// Complete method set of an interface, embedded interfaces included.
    pub fn interface_methods(&self, iface: TypeId) -> Vec<ObjectId> {
        let mut out: Vec<ObjectId> = Vec::new();
        let mut seen_types: Vec<TypeId> = Vec::new();
        self.collect_interface_methods(iface, &mut out, &mut seen_types);
        out.sort_by_key(|m| self.object_id(*m));
        out
    }

    fn collect_interface_methods(&self, iface: TypeId, out: &mut Vec<ObjectId>, seen: &mut Vec<TypeId>) {
        if seen.contains(&iface) {
            return;
        }
        seen.push(iface);
        let Type::Interface { methods, embeddeds } = self.ty(self.underlying(iface)) else { return };
        for m in methods {
            let name = &self.obj(*m).name;
            if !out.iter().any(|o| &self.obj(*o).name == name) {
                out.push(*m);
            }
        }
        for e in embeddeds {
            self.collect_interface_methods(*e, out, seen);
        }
    }

    pub fn has_pointer_receiver(&self, method: ObjectId) -> bool {
        match self.ty(self.obj(method).ty) {
            Type::Signature { recv: Some(r), .. } => matches!(self.ty(self.obj(*r).ty), Type::Pointer { .. }),
            _ => false,
        }
    }

    /// Methods callable on a value of type `t` (or `*t` when `pointer`).
    pub fn method_set(&self, t: TypeId, pointer: bool) -> Vec<ObjectId> {
        let (base, pointer) = match self.ty(t) {
            Type::Pointer { elem } => (*elem, true),
            _ => (t, pointer),
        };
        if matches!(self.ty(self.underlying(base)), Type::Interface { .. }) {
            if base != t {
                // pointer to interface has no methods
                return Vec::new();
            }
            return self.interface_methods(base);
        }

        // Breadth-first over embedded fields. A name found at one depth hides
        // the same name deeper down; a name found twice at one depth is
        // ambiguous and selects nothing.
        let mut out = Vec::new();
        let mut hidden: Vec<String> = Vec::new();
        let mut seen: Vec<TypeId> = Vec::new();
        let mut level = vec![(base, pointer)];
        while !level.is_empty() {
            // `None` marks a name that blocks promotion without being callable:
            // fields, and pointer methods reached through a value.
            let mut found: Vec<(&str, Option<ObjectId>)> = Vec::new();
            let mut next = Vec::new();
            for (ty, indirect) in level {
                if let Type::Named { methods, .. } = self.ty(ty) {
                    if seen.contains(&ty) {
                        continue;
                    }
                    seen.push(ty);
                    for m in methods {
                        let callable = indirect || !self.has_pointer_receiver(*m);
                        found.push((&self.obj(*m).name, callable.then_some(*m)));
                    }
                }
                match self.ty(self.underlying(ty)) {
                    Type::Struct { fields, .. } => {
                        for f in fields {
                            let field = self.obj(*f);
                            found.push((&field.name, None));
                            if field.embedded {
                                match self.ty(field.ty) {
                                    Type::Pointer { elem } => next.push((*elem, true)),
                                    _ => next.push((field.ty, indirect)),
                                }
                            }
                        }
                    }
                    Type::Interface { .. } => {
                        for m in self.interface_methods(ty) {
                            found.push((&self.obj(m).name, Some(m)));
                        }
                    }
                    _ => {}
                }
            }
            for (name, method) in &found {
                if hidden.iter().any(|h| h.as_str() == *name) {
                    continue;
                }
                let unique = found.iter().filter(|(n, _)| n == name).count() == 1;
                if let (true, Some(m)) = (unique, method) {
                    out.push(*m);
                }
            }
            hidden.extend(found.iter().map(|(n, _)| n.to_string()));
            level = next;
        }
        out
    }

    /// Structural satisfaction check: every interface method must have a
    /// same-named method with matching variadic-ness, arity and textual
    /// parameter and result types.
    pub fn implements(&self, t: TypeId, iface: TypeId, use_pointer: bool) -> bool {
        if !matches!(self.ty(self.underlying(iface)), Type::Interface { .. }) {
            return false;
        }
        let wanted = self.interface_methods(iface);
        if wanted.is_empty() {
            return true;
        }
        let have = self.method_set(t, use_pointer);
        wanted.iter().all(|w| {
            let name = &self.obj(*w).name;
            have.iter()
                .find(|h| &self.obj(**h).name == name)
                .is_some_and(|h| self.same_signature_text(self.obj(*w).ty, self.obj(*h).ty))
        })
    }

    fn same_signature_text(&self, a: TypeId, b: TypeId) -> bool {
        let (
            Type::Signature {
                params: p1,
                results: r1,
                variadic: v1,
                ..
            },
            Type::Signature {
                params: p2,
                results: r2,
                variadic: v2,
                ..
            },
        ) = (self.ty(a), self.ty(b))
        else {
            return false;
        };
        if v1 != v2 {
            return false;
        }
        let same_tuple = |x: TypeId, y: TypeId| {
            let (vx, vy) = (self.tuple_vars(x), self.tuple_vars(y));
            vx.len() == vy.len()
                && vx
                    .iter()
                    .zip(vy)
                    .all(|(a, b)| self.var_type_string(*a, None) == self.var_type_string(*b, None))
        };
        same_tuple(*p1, *p2) && same_tuple(*r1, *r2)
    }

    fn basic_info(&self, t: TypeId) -> Option<(BasicKind, BasicInfo)> {
        match self.ty(self.underlying(t)) {
            Type::Basic { kind, .. } => Some((*kind, kind.info())),
            _ => None,
        }
    }

    fn is_named(&self, t: TypeId) -> bool {
        matches!(self.ty(t), Type::Named { .. } | Type::Basic { .. })
    }

    /// Whether a value of type `v` may be assigned to a variable of type `t`.
    pub fn assignable(&self, v: TypeId, t: TypeId) -> bool {
        if self.identical(v, t) {
            return true;
        }
        let (vu, tu) = (self.underlying(v), self.underlying(t));

        if let Some((vk, vinfo)) = self.basic_info(v) {
            if vinfo.contains(BasicInfo::IS_UNTYPED) {
                if vk == BasicKind::UntypedNil {
                    return matches!(
                        self.ty(tu),
                        Type::Pointer { .. }
                            | Type::Signature { .. }
                            | Type::Slice { .. }
                            | Type::Map { .. }
                            | Type::Chan { .. }
                            | Type::Interface { .. }
                    );
                }
                if matches!(self.ty(tu), Type::Interface { .. }) {
                    return self.interface_methods(tu).is_empty();
                }
                return match self.basic_info(t) {
                    Some((_, tinfo)) => {
                        (vinfo.intersects(BasicInfo::IS_BOOLEAN) && tinfo.intersects(BasicInfo::IS_BOOLEAN))
                            || (vinfo.intersects(BasicInfo::IS_STRING) && tinfo.intersects(BasicInfo::IS_STRING))
                            || (vinfo.intersects(BasicInfo::IS_NUMERIC) && tinfo.intersects(BasicInfo::IS_NUMERIC))
                    }
                    None => false,
                };
            }
        }

        if self.identical(vu, tu) && (!self.is_named(v) || !self.is_named(t)) {
            return true;
        }
        if matches!(self.ty(tu), Type::Interface { .. }) {
            return self.implements(v, t, false);
        }
        if let (Type::Chan { dir: ChanDir::SendRecv, elem: e1 }, Type::Chan { elem: e2, .. }) = (self.ty(vu), self.ty(tu)) {
            return self.identical(*e1, *e2) && (!self.is_named(v) || !self.is_named(t));
        }
        false
    }

    /// Whether a value of type `v` converts to type `t`.
    pub fn convertible(&self, v: TypeId, t: TypeId) -> bool {
        if self.assignable(v, t) {
            return true;
        }
        let (vu, tu) = (self.underlying(v), self.underlying(t));
        if self.identical(vu, tu) {
            return true;
        }
        if let (Type::Pointer { elem: a }, Type::Pointer { elem: b }) = (self.ty(v), self.ty(t)) {
            if self.identical(self.underlying(*a), self.underlying(*b)) {
                return true;
            }
        }
        let vb = self.basic_info(v);
        let tb = self.basic_info(t);
        if let (Some((_, vi)), Some((_, ti))) = (vb, tb) {
            let real = BasicInfo(BasicInfo::IS_INTEGER.0 | BasicInfo::IS_FLOAT.0);
            if vi.intersects(real) && ti.intersects(real) {
                return true;
            }
            if vi.intersects(BasicInfo::IS_COMPLEX) && ti.intersects(BasicInfo::IS_COMPLEX) {
                return true;
            }
            if vi.intersects(BasicInfo::IS_INTEGER) && ti.intersects(BasicInfo::IS_STRING) {
                return true;
            }
        }
        let is_byte_or_rune_slice = |t: TypeId| match self.ty(self.underlying(t)) {
            Type::Slice { elem } => matches!(
                self.basic_info(*elem),
                Some((BasicKind::Uint8, _)) | Some((BasicKind::Int32, _))
            ),
            _ => false,
        };
        let is_string = |b: Option<(BasicKind, BasicInfo)>| b.is_some_and(|(_, i)| i.intersects(BasicInfo::IS_STRING));
        (is_string(vb) && is_byte_or_rune_slice(t)) || (is_byte_or_rune_slice(v) && is_string(tb))
    }

    /// Whether a value of interface type `iface` can be asserted to `t`.
    pub fn assertable(&self, iface: TypeId, t: TypeId) -> bool {
        if matches!(self.ty(self.underlying(t)), Type::Interface { .. }) {
            return true;
        }
        self.implements(t, iface, false)
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A resolved type together with the table it lives in.
#[derive(Clone, Copy)]
pub struct Ty<'t> {
    table: &'t TypeTable,
    id: TypeId,
    from: Option<PackageId>,
}

impl<'t> Ty<'t> {
    pub(crate) fn new(table: &'t TypeTable, id: TypeId, from: Option<PackageId>) -> Self {
        Self { table, id, from }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn shape(&self) -> &'t Type {
        self.table.ty(self.id)
    }

    pub fn kind(&self) -> TypKind {
        self.table.typ_kind(self.id)
    }

    pub fn underlying(&self) -> Ty<'t> {
        Ty::new(self.table, self.table.underlying(self.id), self.from)
    }

    /// Name of a named or basic type.
    pub fn name(&self) -> Option<&'t str> {
        match self.shape() {
            Type::Named { obj, .. } => Some(self.table.obj(*obj).name.as_str()),
            Type::Basic { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn identical(&self, other: &Ty<'_>) -> bool {
        self.table.identical(self.id, other.id)
    }
}

impl fmt::Display for Ty<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table.type_string(self.id, self.from))
    }
}

impl fmt::Debug for Ty<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ty({self})")
    }
}

/// A parameter, result, receiver or field variable.
#[derive(Clone, Copy)]
pub struct Var<'t> {
    table: &'t TypeTable,
    obj: ObjectId,
    from: Option<PackageId>,
}

impl<'t> Var<'t> {
    pub(crate) fn new(table: &'t TypeTable, obj: ObjectId, from: Option<PackageId>) -> Self {
        Self { table, obj, from }
    }

    pub fn object(&self) -> ObjectId {
        self.obj
    }

    pub fn name(&self) -> &'t str {
        &self.table.obj(self.obj).name
    }

    pub fn ty(&self) -> Ty<'t> {
        Ty::new(self.table, self.table.obj(self.obj).ty, self.from)
    }

    pub fn embedded(&self) -> bool {
        self.table.obj(self.obj).embedded
    }

    /// Type text; unresolved types keep their source spelling.
    pub fn type_string(&self) -> String {
        self.table.var_type_string(self.obj, self.from)
    }
}

impl fmt::Display for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name().is_empty() {
            f.write_str(&self.type_string())
        } else {
            write!(f, "{} {}", self.name(), self.type_string())
        }
    }
}

impl fmt::Debug for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Var({self})")
    }
}

/// Ordered parameter or result list.
#[derive(Clone, Copy)]
pub struct Tuple<'t> {
    table: &'t TypeTable,
    id: TypeId,
    from: Option<PackageId>,
}

impl<'t> Tuple<'t> {
    pub(crate) fn new(table: &'t TypeTable, id: TypeId, from: Option<PackageId>) -> Self {
        Self { table, id, from }
    }

    pub fn len(&self) -> usize {
        self.table.tuple_vars(self.id).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Panics when `i` is out of range.
    pub fn at(&self, i: usize) -> Var<'t> {
        let vars = self.table.tuple_vars(self.id);
        assert!(i < vars.len(), "goaster: tuple index {i} out of range [0, {})", vars.len());
        Var::new(self.table, vars[i], self.from)
    }

    pub fn iter(&self) -> impl Iterator<Item = Var<'t>> + 't {
        let (table, from) = (self.table, self.from);
        table.tuple_vars(self.id).iter().map(move |v| Var::new(table, *v, from))
    }
}

impl fmt::Display for Tuple<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table.type_string(self.id, self.from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_has_basic_types_and_error() {
        let t = TypeTable::new();
        let int = t.basic_by_name("int").unwrap();
        assert_eq!(t.typ_kind(int), TypKind::Basic);
        assert!(t.basic_by_name("untyped int").is_none());

        let byte = t.basic_by_name("byte").unwrap();
        let uint8 = t.basic_by_name("uint8").unwrap();
        assert!(t.identical(byte, uint8));
        assert_eq!(t.type_string(byte, None), "byte");

        let err = t.obj(t.universe_lookup("error").unwrap()).ty;
        assert_eq!(t.typ_kind(err), TypKind::Named);
        assert_eq!(t.typ_kind(t.underlying(err)), TypKind::Interface);
        assert_eq!(t.type_string(t.underlying(err), None), "interface{Error() string}");
    }

    #[test]
    fn basic_info_flags() {
        assert!(BasicKind::Uint16.info().contains(BasicInfo::IS_UNSIGNED));
        assert!(BasicKind::Float32.info().intersects(BasicInfo::IS_NUMERIC));
        assert!(!BasicKind::String.info().intersects(BasicInfo::IS_NUMERIC));
        assert!(BasicKind::UntypedRune.info().contains(BasicInfo::IS_UNTYPED));
        assert_eq!(BasicKind::UntypedFloat.default_kind(), BasicKind::Float64);
    }

    #[test]
    fn composite_type_strings() {
        let mut t = TypeTable::new();
        let string = t.basic(BasicKind::String);
        let int = t.basic(BasicKind::Int);
        let m = t.new_type(Type::Map { key: string, elem: int });
        let s = t.new_type(Type::Slice { elem: m });
        let c = t.new_type(Type::Chan {
            dir: ChanDir::RecvOnly,
            elem: s,
        });
        assert_eq!(t.type_string(c, None), "<-chan []map[string]int");
    }

    #[test]
    fn untyped_constants_assign_to_matching_basics() {
        let t = TypeTable::new();
        let uint = t.basic(BasicKind::UntypedInt);
        let f64 = t.basic(BasicKind::Float64);
        let s = t.basic(BasicKind::String);
        assert!(t.assignable(uint, f64));
        assert!(!t.assignable(uint, s));
        assert!(t.convertible(t.basic(BasicKind::Int), s));
    }
}
