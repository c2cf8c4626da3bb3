use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::checker::TypeError;
use crate::facade::DeclId;
use crate::file::FileId;
use crate::types::{NodeRef, ObjectId, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub(crate) u32);

impl PackageId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One resolution unit: the files of a directory (or of a set of in-memory
/// sources) sharing a package clause.
#[derive(Debug, Clone)]
pub struct Package {
    pub(crate) id: PackageId,
    pub(crate) path: String,
    pub(crate) name: String,
    pub(crate) dir: Option<PathBuf>,
    pub(crate) files: Vec<FileId>,
    /// Declaration index in collection order.
    pub(crate) decls: Vec<DeclId>,
    /// Soft resolver errors; hard ones fail the load.
    pub(crate) errors: Vec<TypeError>,
    pub(crate) scope: HashMap<String, ObjectId>,
    pub(crate) defs: HashMap<NodeRef, ObjectId>,
    pub(crate) struct_types: HashMap<NodeRef, TypeId>,
    pub(crate) by_object: HashMap<ObjectId, DeclId>,
    pub(crate) type_decls: HashMap<TypeId, DeclId>,
}

impl Package {
    pub(crate) fn new(id: PackageId, path: String, name: String, dir: Option<PathBuf>) -> Self {
        Self {
            id,
            path,
            name,
            dir,
            files: Vec::new(),
            decls: Vec::new(),
            errors: Vec::new(),
            scope: HashMap::new(),
            defs: HashMap::new(),
            struct_types: HashMap::new(),
            by_object: HashMap::new(),
            type_decls: HashMap::new(),
        }
    }

    pub fn id(&self) -> PackageId {
        self.id
    }

    /// Import path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn files(&self) -> &[FileId] {
        &self.files
    }

    pub fn decls(&self) -> &[DeclId] {
        &self.decls
    }

    pub fn errors(&self) -> &[TypeError] {
        &self.errors
    }

    /// Declaration of the named type `ty`, when declared in this package.
    pub fn facade_of_type(&self, ty: TypeId) -> Option<DeclId> {
        self.type_decls.get(&ty).copied()
    }

    /// Declaration bound to a resolver object.
    pub fn decl_of_object(&self, obj: ObjectId) -> Option<DeclId> {
        self.by_object.get(&obj).copied()
    }
}
