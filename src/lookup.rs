//! Type lookup by source spelling.

use crate::facade::{DeclId, Facade};
use crate::file::FileId;
use crate::kind::{ObjKind, TypKinds};
use crate::program::{Program, Scope};
use crate::types::{BasicKind, Type, TypeId};

/// Result of [`Program::lookup_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeLookup {
    /// A predeclared basic type (`int`, `string`, `byte`, ...).
    Basic(BasicKind),
    /// Another predeclared type (`error`, `any`, `comparable`).
    Universe(TypeId),
    Decl(DeclId),
}

impl TypeLookup {
    pub fn decl(self) -> Option<DeclId> {
        match self {
            TypeLookup::Decl(id) => Some(id),
            _ => None,
        }
    }
}

impl Program {
    /// Resolves a type name as written in `file`.
    ///
    /// `alias.Name` goes through the file's imports to a loaded package.
    /// Unqualified names are looked up among predeclared types, then in the
    /// file, then in the rest of its package.
    pub fn lookup_type(&self, file: FileId, name: &str) -> Option<TypeLookup> {
        let name = name.trim();
        if let Some((alias, ty)) = name.split_once('.') {
            let pkg = self.imported_as(file, alias)?;
            return self.first_type(Scope::Package(pkg), ty);
        }

        if let Some(obj) = self.table.universe_lookup(name) {
            let obj = self.table.obj(obj);
            if obj.kind == ObjKind::Typ {
                return Some(match self.table.ty(obj.ty) {
                    Type::Basic { kind, .. } => TypeLookup::Basic(*kind),
                    _ => TypeLookup::Universe(obj.ty),
                });
            }
        }

        let pkg = self.file(file).package();
        self.first_type(Scope::File(file), name)
            .or_else(|| self.first_type(Scope::Package(pkg), name))
    }

    /// Convenience over [`Program::lookup_type`] for declared types.
    pub fn lookup_type_facade(&self, file: FileId, name: &str) -> Option<Facade<'_>> {
        self.lookup_type(file, name)?.decl().map(|id| self.facade(id))
    }

    fn first_type(&self, scope: Scope, name: &str) -> Option<TypeLookup> {
        self.lookup_in(scope, ObjKind::Typ, TypKinds::ANY, name)
            .into_iter()
            .find(|f| !f.is_local())
            .map(|f| TypeLookup::Decl(f.decl_id()))
    }

    /// Loaded package imported by `file` under the local name `alias`. Imports
    /// without alias also match the real package name, which may differ from
    /// the last path segment.
    fn imported_as(&self, file: FileId, alias: &str) -> Option<crate::package::PackageId> {
        let file = self.file(file);
        if let Some(pkg) = file.find_import_by_alias(alias).and_then(|path| self.package(path)) {
            return Some(pkg.id());
        }
        file.imports()
            .iter()
            .filter(|i| i.alias.is_none())
            .filter_map(|i| self.package(&i.path))
            .find(|p| p.name() == alias)
            .map(|p| p.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::TypKind;

    #[test]
    fn resolves_basic_file_and_package_types() {
        let prog = Program::load_sources([
            ("a.go", "package p\n\ntype A struct{ B B }\n"),
            ("b.go", "package p\n\ntype B int\n\ntype Err = error\n"),
        ])
        .unwrap();
        let a_file = prog.file_by_name("a.go").unwrap().id();

        assert_eq!(prog.lookup_type(a_file, "int"), Some(TypeLookup::Basic(BasicKind::Int)));
        assert_eq!(prog.lookup_type(a_file, "byte"), Some(TypeLookup::Basic(BasicKind::Uint8)));
        assert!(matches!(prog.lookup_type(a_file, "error"), Some(TypeLookup::Universe(_))));

        let a = prog.lookup_type_facade(a_file, "A").unwrap();
        assert_eq!(a.typ_kind(), TypKind::Struct);
        let b = prog.lookup_type_facade(a_file, "B").expect("other files of the package are searched");
        assert_eq!(b.basic_kind(), BasicKind::Int);
        let err = prog.lookup_type_facade(a_file, "Err").unwrap();
        assert!(err.is_alias());
        assert_eq!(prog.lookup_type(a_file, "Nope"), None);
        assert_eq!(prog.lookup_type(a_file, "fmt.Stringer"), None, "unimported alias");
    }
}
