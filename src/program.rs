//! Loaded programs.
//!
//! A [`Program`] owns everything derived from one load: the position table, the
//! type table, packages, files and the declaration arena. Packages are either
//! *created* (what the caller asked for) or *imported* (module-local
//! dependencies pulled in to resolve them).

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use xxhash_rust::xxh3::xxh3_64;

use crate::ast::{DeclTok, NodeId, NodeKind};
use crate::checker::{check_package, CheckFile, DepScope, TypeError};
use crate::collector;
use crate::config::{Config, ScanConfig};
use crate::error::{Error, Result};
use crate::facade::{DeclId, Declaration, Facade, FacadeMut};
use crate::file::{File, FileId};
use crate::kind::{ObjKind, ObjKinds, TypKinds};
use crate::package::{Package, PackageId};
use crate::parser::{parse_file, ParsedFile};
use crate::position::FileSet;
use crate::printer::Printer;
use crate::scanner::{self, ScanOptions};
use crate::tags::unquote;
use crate::types::{NodeRef, Object, TypeTable};

/// Where a query looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Program,
    Package(PackageId),
    File(FileId),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOptions {
    /// Index declarations inside function bodies.
    pub local_declarations: bool,
    /// Load `_test.go` files of the package.
    pub include_tests: bool,
    /// Rewrite files even when their rendered text is unchanged.
    pub rewrite_unchanged: bool,
    pub scan: ScanConfig,
}

impl LoadOptions {
    pub fn with_local_declarations(mut self, on: bool) -> Self {
        self.local_declarations = on;
        self
    }

    pub fn with_tests(mut self, on: bool) -> Self {
        self.include_tests = on;
        self
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            local_declarations: cfg.load.local_declarations,
            include_tests: cfg.load.include_tests,
            rewrite_unchanged: cfg.format.rewrite_unchanged,
            scan: cfg.scan.clone(),
        }
    }

    fn scan_options(&self) -> ScanOptions {
        ScanOptions::new(&self.scan, self.include_tests)
    }
}

struct Source {
    filename: String,
    path: Option<PathBuf>,
    text: String,
}

struct Module {
    root: PathBuf,
    path: String,
}

pub struct Program {
    pub(crate) fset: FileSet,
    pub(crate) table: TypeTable,
    pub(crate) packages: Vec<Package>,
    pub(crate) files: Vec<File>,
    pub(crate) decls: Vec<crate::facade::Declaration>,
    pub(crate) options: LoadOptions,
    created: Vec<PackageId>,
    imported: Vec<PackageId>,
    /// Counter for synthesized file names.
    synthetic: u32,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("packages", &self.packages.iter().map(|p| &p.path).collect::<Vec<_>>())
            .field("files", &self.files.len())
            .field("decls", &self.decls.len())
            .finish()
    }
}

impl Program {
    fn new(options: LoadOptions) -> Self {
        Self {
            fset: FileSet::new(),
            table: TypeTable::new(),
            packages: Vec::new(),
            files: Vec::new(),
            decls: Vec::new(),
            options,
            created: Vec::new(),
            imported: Vec::new(),
            synthetic: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Loads one file as a package of its own. Without `src` the file is read
    /// from disk and can be rewritten in place.
    pub fn load_file(filename: impl AsRef<Path>, src: Option<&str>) -> Result<Program> {
        Self::load_file_with(filename, src, &LoadOptions::default())
    }

    pub fn load_file_with(filename: impl AsRef<Path>, src: Option<&str>, options: &LoadOptions) -> Result<Program> {
        let mut prog = Program::new(options.clone());
        let filename = filename.as_ref();
        let source = match src {
            Some(text) => Source {
                filename: prog.source_name(filename),
                path: None,
                text: text.to_string(),
            },
            None => Source {
                filename: filename.display().to_string(),
                path: Some(filename.to_path_buf()),
                text: std::fs::read_to_string(filename).map_err(|e| Error::io(filename, e))?,
            },
        };
        let parsed = prog.parse_sources(vec![source])?;
        let id = prog.add_package(None, None, parsed)?;
        prog.created.push(id);
        Ok(prog)
    }

    /// Loads in-memory sources as one package. Empty names get synthesized
    /// ones.
    pub fn load_sources<I, N, S>(sources: I) -> Result<Program>
    where
        I: IntoIterator<Item = (N, S)>,
        N: AsRef<str>,
        S: Into<String>,
    {
        Self::load_sources_with(sources, &LoadOptions::default())
    }

    pub fn load_sources_with<I, N, S>(sources: I, options: &LoadOptions) -> Result<Program>
    where
        I: IntoIterator<Item = (N, S)>,
        N: AsRef<str>,
        S: Into<String>,
    {
        let mut prog = Program::new(options.clone());
        let sources: Vec<Source> = sources
            .into_iter()
            .map(|(name, text)| Source {
                filename: prog.source_name(Path::new(name.as_ref())),
                path: None,
                text: text.into(),
            })
            .collect();
        if sources.is_empty() {
            return Err(Error::NoGoFiles(PathBuf::new()));
        }
        let parsed = prog.parse_sources(sources)?;
        let id = prog.add_package(None, None, parsed)?;
        prog.created.push(id);
        Ok(prog)
    }

    /// Loads package directories, plus the module-local packages they import.
    pub fn load_packages<I, P>(paths: I) -> Result<Program>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::load_packages_with(paths, &LoadOptions::default())
    }

    pub fn load_packages_with<I, P>(paths: I, options: &LoadOptions) -> Result<Program>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut prog = Program::new(options.clone());
        let mut visiting = Vec::new();
        for dir in paths {
            let id = prog.load_dir(dir.as_ref(), &mut visiting)?;
            if !prog.created.contains(&id) {
                prog.created.push(id);
            }
            prog.imported.retain(|i| *i != id);
        }
        Ok(prog)
    }

    fn source_name(&mut self, filename: &Path) -> String {
        if !filename.as_os_str().is_empty() {
            return filename.display().to_string();
        }
        self.synthetic += 1;
        format!("goaster_{}.go", self.synthetic)
    }

    /// Name of the next body replacement fragment.
    pub(crate) fn next_fragment_name(&mut self) -> String {
        self.synthetic += 1;
        format!("goaster_fragment_{}.go", self.synthetic)
    }

    fn load_dir(&mut self, dir: &Path, visiting: &mut Vec<String>) -> Result<PackageId> {
        let dir = std::fs::canonicalize(dir).map_err(|e| Error::io(dir, e))?;
        let module = find_module(&dir);
        let import_path = import_path_of(&dir, module.as_ref());
        if let Some(p) = self.packages.iter().find(|p| p.path == import_path) {
            return Ok(p.id);
        }
        if let Some(at) = visiting.iter().position(|p| *p == import_path) {
            let mut cycle = visiting[at..].to_vec();
            cycle.push(import_path);
            return Err(Error::ImportCycle(cycle));
        }

        let paths = scanner::package_files(&dir, &self.options.scan_options())?;
        if paths.is_empty() {
            return Err(Error::NoGoFiles(dir));
        }
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            sources.push(Source {
                filename: path.display().to_string(),
                path: Some(path),
                text,
            });
        }
        let parsed = self.parse_sources(sources)?;

        visiting.push(import_path.clone());
        if let Some(module) = &module {
            let mut deps: Vec<String> = parsed.iter().flat_map(|(_, p)| import_paths(p)).collect();
            deps.sort();
            deps.dedup();
            for dep in deps {
                let Some(rel) = module_relative(&module.path, &dep) else { continue };
                let dep_dir = module.root.join(rel);
                debug_log!("\t{} imports module package {}", import_path, dep);
                let id = self.load_dir(&dep_dir, visiting)?;
                if !self.created.contains(&id) && !self.imported.contains(&id) {
                    self.imported.push(id);
                }
            }
        }
        visiting.pop();

        self.add_package(Some(import_path), Some(dir), parsed)
    }

    fn parse_sources(&mut self, sources: Vec<Source>) -> Result<Vec<(Source, ParsedFile)>> {
        let mut out = Vec::with_capacity(sources.len());
        for source in sources {
            let mut parsed = parse_file(&mut self.fset, &source.filename, &source.text)?;
            collector::expand_field_groups(&mut parsed.ast, parsed.root);
            out.push((source, parsed));
        }
        Ok(out)
    }

    /// Registers parsed files as one package, resolves and indexes it.
    fn add_package(
        &mut self,
        import_path: Option<String>,
        dir: Option<PathBuf>,
        parsed: Vec<(Source, ParsedFile)>,
    ) -> Result<PackageId> {
        let name = parsed
            .iter()
            .map(|(_, p)| p.package_name.as_str())
            .find(|n| !n.ends_with("_test"))
            .or_else(|| parsed.first().map(|(_, p)| p.package_name.as_str()))
            .unwrap_or_default()
            .to_string();
        let id = PackageId(self.packages.len() as u32);
        let path = import_path.unwrap_or_else(|| name.clone());
        let mut pkg = Package::new(id, path, name, dir);

        for (source, parsed) in parsed {
            if parsed.package_name != pkg.name {
                debug_log!(
                    "\tskipping {}: package {} is not {}",
                    source.filename,
                    parsed.package_name,
                    pkg.name
                );
                continue;
            }
            let fid = FileId(self.files.len() as u32);
            let hash = xxh3_64(source.text.as_bytes());
            self.files.push(File::new(fid, id, source.filename, source.path, parsed, hash));
            pkg.files.push(fid);
        }

        self.table.set_package(id, &pkg.name, &pkg.path);
        self.packages.push(pkg);
        self.check(id)?;

        let files = self.packages[id.index()].files.clone();
        for file in files {
            collector::index_file(self, file);
        }
        let bound = collector::bind_methods(self, id);
        debug_log!(
            "\tpackage {}: {} declarations, {} methods bound",
            self.packages[id.index()].path,
            self.packages[id.index()].decls.len(),
            bound
        );
        Ok(id)
    }

    fn check(&mut self, id: PackageId) -> Result<()> {
        let Program {
            fset,
            table,
            packages,
            files,
            options,
            ..
        } = &mut *self;
        let pkg = &packages[id.index()];
        let check_files: Vec<CheckFile<'_>> = pkg
            .files
            .iter()
            .map(|f| {
                let file = &files[f.index()];
                CheckFile {
                    id: *f,
                    ast: &file.ast,
                    root: file.root,
                }
            })
            .collect();
        let deps: HashMap<String, DepScope<'_>> = packages
            .iter()
            .filter(|p| p.id != id)
            .map(|p| {
                (
                    p.path.clone(),
                    DepScope {
                        id: p.id,
                        name: &p.name,
                        scope: &p.scope,
                    },
                )
            })
            .collect();
        let info = check_package(table, fset, id, &check_files, &deps, options.local_declarations);

        let hard: Vec<&TypeError> = info.hard_errors().collect();
        if !hard.is_empty() {
            return Err(Error::Load {
                package: pkg.path.clone(),
                message: error_list(fset, &hard),
            });
        }
        for e in &info.errors {
            let at = fset.position(e.pos).map(|p| p.to_string()).unwrap_or_else(|| "-".into());
            tracing::warn!(package = %pkg.path, "{at}: {}", e.msg);
        }

        let pkg = &mut self.packages[id.index()];
        pkg.scope = info.scope;
        pkg.defs = info.defs;
        pkg.struct_types = info.struct_types;
        pkg.errors = info.errors;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn fset(&self) -> &FileSet {
        &self.fset
    }

    pub fn table(&self) -> &TypeTable {
        &self.table
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Package by import path.
    pub fn package(&self, path: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.path == path)
    }

    pub fn package_by_id(&self, id: PackageId) -> &Package {
        &self.packages[id.index()]
    }

    pub fn created_packages(&self) -> impl Iterator<Item = &Package> + '_ {
        self.created.iter().map(|id| &self.packages[id.index()])
    }

    pub fn imported_packages(&self) -> impl Iterator<Item = &Package> + '_ {
        self.imported.iter().map(|id| &self.packages[id.index()])
    }

    /// Every loaded package, in load order.
    pub fn all_packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.index()]
    }

    /// Mutable file access for import edits.
    pub fn file_mut(&mut self, id: FileId) -> &mut File {
        &mut self.files[id.index()]
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    /// File by the name it was loaded under.
    pub fn file_by_name(&self, filename: &str) -> Option<&File> {
        self.files.iter().find(|f| f.filename == filename)
    }

    pub fn facade(&self, id: DeclId) -> Facade<'_> {
        Facade { prog: self, id }
    }

    pub fn facade_mut(&mut self, id: DeclId) -> FacadeMut<'_> {
        FacadeMut { prog: self, id }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn scope_decls(&self, scope: Scope) -> Vec<DeclId> {
        match scope {
            Scope::Program => self.packages.iter().flat_map(|p| p.decls.iter().copied()).collect(),
            Scope::Package(id) => self.packages[id.index()].decls.clone(),
            Scope::File(id) => self.files[id.index()].decls.clone(),
        }
    }

    fn matches(&self, id: DeclId, obj: ObjKinds, typ: TypKinds, name: &str) -> bool {
        let decl = &self.decls[id.index()];
        if decl.removed || !obj.matches(decl.kind) {
            return false;
        }
        if !name.is_empty() && decl.name != name {
            return false;
        }
        typ.matches(self.facade(id).typ_kind())
    }

    /// Declarations matching both kind masks and `name` (empty matches any
    /// name), in index order.
    pub fn lookup_in(
        &self,
        scope: Scope,
        obj: impl Into<ObjKinds>,
        typ: impl Into<TypKinds>,
        name: &str,
    ) -> Vec<Facade<'_>> {
        let (obj, typ) = (obj.into(), typ.into());
        self.scope_decls(scope)
            .into_iter()
            .filter(|id| self.matches(*id, obj, typ, name))
            .map(|id| self.facade(id))
            .collect()
    }

    pub fn lookup(&self, obj: impl Into<ObjKinds>, typ: impl Into<TypKinds>, name: &str) -> Vec<Facade<'_>> {
        self.lookup_in(Scope::Program, obj, typ, name)
    }

    /// Visits declarations in index order until the visitor returns false.
    /// Returns false when the visit was stopped.
    pub fn inspect_in(&self, scope: Scope, mut visitor: impl FnMut(Facade<'_>) -> bool) -> bool {
        for id in self.scope_decls(scope) {
            if self.decls[id.index()].removed {
                continue;
            }
            if !visitor(self.facade(id)) {
                return false;
            }
        }
        true
    }

    pub fn inspect(&self, visitor: impl FnMut(Facade<'_>) -> bool) -> bool {
        self.inspect_in(Scope::Program, visitor)
    }

    pub fn inspect_mut(&mut self, scope: Scope, mut visitor: impl FnMut(&mut FacadeMut<'_>) -> bool) -> bool {
        for id in self.scope_decls(scope) {
            if self.decls[id.index()].removed {
                continue;
            }
            let mut facade = FacadeMut { prog: self, id };
            if !visitor(&mut facade) {
                return false;
            }
        }
        true
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    pub fn format_file(&self, id: FileId) -> String {
        self.files[id.index()].render(&self.fset)
    }

    /// Rendered text of every file of the package, keyed by file name.
    pub fn format_package(&self, id: PackageId) -> BTreeMap<String, String> {
        self.packages[id.index()]
            .files
            .iter()
            .map(|f| (self.files[f.index()].filename.clone(), self.format_file(*f)))
            .collect()
    }

    /// Rendered text of every loaded file, keyed by file name.
    pub fn format(&self) -> BTreeMap<String, String> {
        self.files.iter().map(|f| (f.filename.clone(), self.format_file(f.id))).collect()
    }

    /// Writes the file back when its rendered text differs from what was
    /// loaded. Returns whether the file was written.
    pub fn rewrite_file(&mut self, id: FileId) -> Result<bool> {
        let text = self.format_file(id);
        let rewrite_unchanged = self.options.rewrite_unchanged;
        let file = &mut self.files[id.index()];
        let Some(path) = file.path.clone() else {
            debug_log!("\t{} has no path, not rewritten", file.filename);
            return Ok(false);
        };
        let hash = xxh3_64(text.as_bytes());
        if hash == file.source_hash && !rewrite_unchanged {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::write(&path, &text).map_err(|e| Error::io(&path, e))?;
        file.source_hash = hash;
        Ok(true)
    }

    /// Writes back every changed file. Returns how many were written.
    pub fn rewrite(&mut self) -> Result<usize> {
        let mut written = 0;
        for i in 0..self.files.len() {
            if self.rewrite_file(FileId(i as u32))? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// The formatted declaration around a facade, doc comment included. Specs
    /// of grouped declarations are shown with their keyword only.
    pub fn preview(&self, id: DeclId) -> String {
        let decl = &self.decls[id.index()];
        let file = &self.files[decl.file.index()];
        let printer = Printer::new(&file.ast, &self.fset);
        match file.ast.kind(decl.node) {
            NodeKind::TypeSpec(_) | NodeKind::ValueSpec(_) | NodeKind::ImportSpec(_) => {
                match enclosing_gen_decl(file, decl.node) {
                    Some((_, tok, true)) => printer.spec_decl(tok, decl.node),
                    Some((gen, _, _)) => printer.node(gen),
                    None => printer.node(decl.node),
                }
            }
            NodeKind::StructType(_) => printer.ty(decl.node, 0),
            _ => printer.node(decl.node),
        }
    }

    // -----------------------------------------------------------------------
    // Index edits
    // -----------------------------------------------------------------------

    /// Binds a method declaration to a type declaration of its receiver. A
    /// method is owned by one type at a time.
    pub fn bind_method(&mut self, method: DeclId, ty: DeclId) -> Result<()> {
        let m = &self.decls[method.index()];
        let base = match m.kind {
            ObjKind::Fun => collector::receiver_base(self, method),
            _ => None,
        };
        let Some(base) = base else {
            return Err(Error::NotMethod(m.name.clone()));
        };
        let owner = &self.decls[ty.index()];
        if owner.kind != ObjKind::Typ || owner.name != base {
            return Err(Error::ReceiverMismatch {
                method: m.name.clone(),
                expected: owner.name.clone(),
                found: base,
            });
        }
        if owner.methods.contains(&method) {
            return Ok(());
        }
        for decl in &mut self.decls {
            decl.methods.retain(|d| *d != method);
        }
        self.decls[ty.index()].methods.push(method);
        Ok(())
    }

    /// Removes a package-level declaration from the index and the syntax
    /// tree, detaching its comments from the file.
    pub fn remove(&mut self, id: DeclId) -> Result<()> {
        let decl = &self.decls[id.index()];
        if decl.removed {
            return Ok(());
        }
        if decl.local {
            return Err(Error::Unsupported(format!("{} is local to a function body", decl.name)));
        }
        let (file_id, node, ident, name) = (decl.file, decl.node, decl.ident, decl.name.clone());
        let file = &mut self.files[file_id.index()];
        let top: Vec<NodeId> = file.ast.file(file.root).map(|f| f.decls.clone()).unwrap_or_default();

        let detached = match file.ast.kind(node).clone() {
            NodeKind::FuncDecl(_) if top.contains(&node) => {
                detach_top(file, node);
                Some(node)
            }
            NodeKind::ImportSpec(s) => {
                let path = unquote(&s.path).unwrap_or_else(|| s.path.trim_matches('"').to_string());
                file.del_import(&path);
                Some(node)
            }
            NodeKind::ValueSpec(s) if s.names.len() > 1 => {
                // drop one name of `var a, b = 1, 2`
                let i = s.names.iter().position(|n| Some(*n) == ident);
                if let (Some(i), NodeKind::ValueSpec(spec)) = (i, file.ast.kind_mut(node)) {
                    if spec.values.len() == spec.names.len() {
                        spec.values.remove(i);
                    }
                    spec.names.remove(i);
                }
                None
            }
            NodeKind::TypeSpec(_) | NodeKind::ValueSpec(_) => {
                let Some((gen, _, _)) = enclosing_gen_decl(file, node).filter(|(g, ..)| top.contains(g)) else {
                    return Err(Error::Unsupported(format!("{name} is not a package-level declaration")));
                };
                let groups = file.ast.comment_groups(node);
                file.comments.retain(|c| !groups.contains(c));
                if let NodeKind::GenDecl(g) = file.ast.kind_mut(gen) {
                    g.specs.retain(|s| *s != node);
                }
                let only_comments = match file.ast.kind(gen) {
                    NodeKind::GenDecl(g) => g.specs.iter().all(|s| matches!(file.ast.kind(*s), NodeKind::Floating { .. })),
                    _ => false,
                };
                if only_comments {
                    detach_top(file, gen);
                }
                Some(node)
            }
            _ => {
                return Err(Error::Unsupported(format!("{name} is not a package-level declaration")));
            }
        };

        // declarations nested in the removed subtree go with it
        let mut gone = vec![id];
        if let Some(root) = detached {
            let nodes = file.ast.subtree(root);
            gone.extend(
                file.decls
                    .iter()
                    .copied()
                    .filter(|d| *d != id && nodes.contains(&self.decls[d.index()].node)),
            );
        }
        for d in gone {
            self.unindex(d);
        }
        Ok(())
    }

    /// [`File::cover_import`] on one file of the program. Declarations of
    /// import aliases follow the edit.
    pub fn cover_import(&mut self, file: FileId, origin: &str, path: &str, alias: Option<&str>) {
        self.files[file.index()].cover_import(origin, path, alias);
        self.sync_import_decls(file);
    }

    /// [`File::del_import`] on one file of the program; the alias declaration
    /// of the import is unindexed with it.
    pub fn del_import(&mut self, file: FileId, path: &str) {
        self.files[file.index()].del_import(path);
        self.sync_import_decls(file);
    }

    /// Matches the `Pkg` declarations of a file to its import list.
    fn sync_import_decls(&mut self, file_id: FileId) {
        let file = &self.files[file_id.index()];
        let package = file.package;
        let live: Vec<(NodeId, Option<NodeId>, String)> = file
            .imports
            .iter()
            .filter_map(|i| {
                let NodeKind::ImportSpec(s) = file.ast.kind(i.spec) else { return None };
                let alias = i.alias.as_deref().filter(|a| !matches!(*a, "_" | "."))?;
                Some((i.spec, s.name, alias.to_string()))
            })
            .collect();
        let known: Vec<DeclId> = file
            .decls
            .iter()
            .copied()
            .filter(|d| self.decls[d.index()].kind == ObjKind::Pkg)
            .collect();

        let mut covered = Vec::new();
        for id in known {
            let node = self.decls[id.index()].node;
            let Some((_, ident, alias)) = live.iter().find(|(spec, ..)| *spec == node) else {
                debug_log!("\tunindexed import alias {}", self.decls[id.index()].name);
                self.unindex(id);
                continue;
            };
            covered.push(node);
            let decl = &mut self.decls[id.index()];
            decl.ident = *ident;
            decl.name = alias.clone();
            if let Some(obj) = decl.object {
                self.table.obj_mut(obj).name = alias.clone();
            }
        }

        // imports that gained an alias
        for (spec, ident, alias) in live.into_iter().filter(|(spec, ..)| !covered.contains(spec)) {
            let mut obj = Object::new(ObjKind::Pkg, alias.clone(), self.table.invalid());
            obj.pkg = Some(package);
            obj.decl = ident.map(|node| NodeRef { file: file_id, node });
            let object = self.table.new_object(obj);
            let id = DeclId(self.decls.len() as u32);
            debug_log!("\tindexed import alias {} as {}", alias, id.index());
            self.decls.push(Declaration {
                file: file_id,
                package,
                ident,
                node: spec,
                object: Some(object),
                ty: self.table.invalid(),
                kind: ObjKind::Pkg,
                name: alias,
                methods: Vec::new(),
                fields: OnceCell::new(),
                local: false,
                removed: false,
            });
            self.files[file_id.index()].decls.push(id);
            let pkg = &mut self.packages[package.index()];
            pkg.decls.push(id);
            pkg.by_object.insert(object, id);
        }
    }

    fn unindex(&mut self, id: DeclId) {
        let (file, package, object, ty) = {
            let d = &mut self.decls[id.index()];
            d.removed = true;
            (d.file, d.package, d.object, d.ty)
        };
        self.files[file.index()].decls.retain(|d| *d != id);
        let pkg = &mut self.packages[package.index()];
        pkg.decls.retain(|d| *d != id);
        if let Some(obj) = object {
            pkg.by_object.remove(&obj);
        }
        if pkg.type_decls.get(&ty) == Some(&id) {
            pkg.type_decls.remove(&ty);
        }
        for decl in &mut self.decls {
            decl.methods.retain(|m| *m != id);
        }
    }
}

/// Removes a top-level node and every comment group inside it.
fn detach_top(file: &mut File, node: NodeId) {
    let groups = file.ast.comment_groups(node);
    file.comments.retain(|c| !groups.contains(c));
    let root = file.root;
    if let Some(f) = file.ast.file_mut(root) {
        f.decls.retain(|d| *d != node);
    }
}

/// The general declaration holding `spec`: node, keyword, grouped.
fn enclosing_gen_decl(file: &File, spec: NodeId) -> Option<(NodeId, DeclTok, bool)> {
    let path = file.ast.path_to(file.root, spec)?;
    path.iter().skip(1).find_map(|n| match file.ast.kind(*n) {
        NodeKind::GenDecl(g) => Some((*n, g.tok, g.grouped)),
        _ => None,
    })
}

/// "pos: msg" for the first three errors, then a count of the rest.
fn error_list(fset: &FileSet, errors: &[&TypeError]) -> String {
    let shown: Vec<String> = errors
        .iter()
        .take(3)
        .map(|e| match fset.position(e.pos) {
            Some(p) => format!("{p}: {}", e.msg),
            None => e.msg.clone(),
        })
        .collect();
    let mut message = shown.join(", ");
    if errors.len() > 3 {
        message.push_str(&format!(" and {} more", errors.len() - 3));
    }
    message
}

fn module_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?m)^module\s+"?([^\s"]+)"?"#).unwrap())
}

/// Nearest `go.mod` at or above `dir`.
fn find_module(dir: &Path) -> Option<Module> {
    for root in dir.ancestors() {
        let Ok(text) = std::fs::read_to_string(root.join("go.mod")) else { continue };
        let path = module_regex().captures(&text)?.get(1)?.as_str().to_string();
        return Some(Module {
            root: root.to_path_buf(),
            path,
        });
    }
    None
}

fn import_path_of(dir: &Path, module: Option<&Module>) -> String {
    let slashed = |p: &Path| {
        p.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .filter(|c| c != "/" && !c.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    };
    match module.and_then(|m| dir.strip_prefix(&m.root).ok().map(|rel| (m, rel))) {
        Some((m, rel)) if rel.as_os_str().is_empty() => m.path.clone(),
        Some((m, rel)) => format!("{}/{}", m.path, slashed(rel)),
        None => dir.display().to_string().replace('\\', "/"),
    }
}

/// Directory of `import` relative to the module root, when it is inside the
/// module.
fn module_relative<'a>(module: &str, import: &'a str) -> Option<&'a str> {
    if import == module {
        return Some("");
    }
    import.strip_prefix(module)?.strip_prefix('/')
}

fn import_paths(parsed: &ParsedFile) -> Vec<String> {
    let ast = &parsed.ast;
    let Some(file) = ast.file(parsed.root) else { return Vec::new() };
    let mut out = Vec::new();
    for decl in &file.decls {
        let NodeKind::GenDecl(g) = ast.kind(*decl) else { continue };
        if g.tok != DeclTok::Import {
            continue;
        }
        for spec in &g.specs {
            if let NodeKind::ImportSpec(s) = ast.kind(*spec) {
                out.push(unquote(&s.path).unwrap_or_else(|| s.path.trim_matches('"').to_string()));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::TypKind;

    const SRC: &str = r#"package shapes

import "fmt"

// Shape is anything with an area.
type Shape interface {
	Area() float64
}

type (
	// Square has equal sides.
	Square struct {
		Side float64
	}
	Circle struct{ R float64 }
)

const Pi = 3.14

var registry = map[string]Shape{}

func (s Square) Area() float64 { return s.Side * s.Side }

func (c *Circle) Area() float64 { return Pi * c.R * c.R }

func Describe(s Shape) string { return fmt.Sprint(s.Area()) }
"#;

    fn load() -> Program {
        Program::load_file("shapes.go", Some(SRC)).expect("source should load")
    }

    #[test]
    fn lookup_filters_by_kind_masks_and_name() {
        let prog = load();
        let types: Vec<&str> = prog.lookup(ObjKind::Typ, TypKinds::ANY, "").iter().map(|f| f.name()).collect();
        assert_eq!(types, vec!["Shape", "Square", "Circle"]);

        let structs = prog.lookup(ObjKind::Typ, TypKind::Struct, "");
        assert_eq!(structs.len(), 2);

        let funcs = prog.lookup(ObjKind::Fun, TypKinds::NONE, "Area");
        assert_eq!(funcs.len(), 3, "two methods and the interface method");

        let values = prog.lookup(ObjKind::Con | ObjKind::Var, TypKinds::ANY, "");
        let names: Vec<&str> = values.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["Pi", "registry"]);
        assert!(prog.lookup(ObjKind::Typ, TypKinds::ANY, "Triangle").is_empty());
    }

    #[test]
    fn methods_are_bound_in_pass_two() {
        let prog = load();
        let square = &prog.lookup(ObjKind::Typ, TypKinds::ANY, "Square")[0];
        let circle = &prog.lookup(ObjKind::Typ, TypKinds::ANY, "Circle")[0];
        assert_eq!(square.num_methods(), 1);
        assert_eq!(circle.num_methods(), 1);
        assert!(circle.method(0).is_method());
        let shape = &prog.lookup(ObjKind::Typ, TypKinds::ANY, "Shape")[0];
        assert!(square.implements(shape, false));
        assert!(!circle.implements(shape, false));
        assert!(circle.implements(shape, true));
    }

    #[test]
    fn inspect_stops_when_the_visitor_says_so() {
        let prog = load();
        let mut seen = Vec::new();
        let finished = prog.inspect(|f| {
            seen.push(f.name().to_string());
            f.name() != "Square"
        });
        assert!(!finished);
        assert_eq!(seen.last().map(String::as_str), Some("Square"));
        let file = prog.created_packages().next().unwrap().files()[0];
        let mut count = 0;
        assert!(prog.inspect_in(Scope::File(file), |_| {
            count += 1;
            true
        }));
        assert_eq!(count, prog.file(file).decls().len());
    }

    #[test]
    fn preview_shows_spec_with_keyword_and_doc() {
        let prog = load();
        let square = prog.lookup(ObjKind::Typ, TypKinds::ANY, "Square");
        let text = square[0].to_string();
        println!("{text}");
        assert!(text.starts_with("// Square has equal sides.\ntype Square struct {"), "got:\n{text}");
        let pi = prog.lookup(ObjKind::Con, TypKinds::ANY, "Pi");
        assert_eq!(pi[0].to_string(), "const Pi = 3.14");
    }

    #[test]
    fn remove_detaches_declaration_and_doc() {
        let mut prog = load();
        let shape = prog.lookup(ObjKind::Typ, TypKinds::ANY, "Shape")[0].decl_id();
        let square = prog.lookup(ObjKind::Typ, TypKinds::ANY, "Square")[0].decl_id();
        prog.remove(shape).unwrap();
        prog.remove(square).unwrap();
        let file = prog.created_packages().next().unwrap().files()[0];
        let out = prog.format_file(file);
        println!("{out}");
        assert!(!out.contains("Shape is anything"));
        assert!(!out.contains("type Shape"));
        assert!(!out.contains("Square struct"));
        assert!(out.contains("Circle struct{ R float64 }"));
        assert!(prog.lookup(ObjKind::Typ, TypKinds::ANY, "Square").is_empty());
        assert!(prog.file(file).comments().iter().all(|c| {
            !crate::ast::comment_text(prog.file(file).ast().comment_group(*c)).contains("Square")
        }));
    }

    #[test]
    fn bind_method_checks_receiver() {
        let mut prog = load();
        let describe = prog.lookup(ObjKind::Fun, TypKinds::ANY, "Describe")[0].decl_id();
        let square = prog.lookup(ObjKind::Typ, TypKinds::ANY, "Square")[0].decl_id();
        let circle = prog.lookup(ObjKind::Typ, TypKinds::ANY, "Circle")[0].decl_id();
        let circle_area = prog.facade(circle).method(0).decl_id();
        assert!(matches!(prog.bind_method(describe, square), Err(Error::NotMethod(_))));
        assert!(matches!(
            prog.bind_method(circle_area, square),
            Err(Error::ReceiverMismatch { .. })
        ));
        prog.bind_method(circle_area, circle).unwrap();
        assert_eq!(prog.facade(circle).num_methods(), 1, "binding twice keeps one entry");
    }

    #[test]
    fn hard_errors_fail_the_load_with_context() {
        let err = Program::load_sources([("a.go", "package a\n\nvar x = missing\nvar x = 2\n")]).unwrap_err();
        let msg = err.to_string();
        println!("{msg}");
        assert!(msg.contains("couldn't load package a"), "{msg}");
        assert!(msg.contains("a.go:"), "{msg}");
    }

    #[test]
    fn soft_errors_keep_the_package() {
        let prog = Program::load_sources([("", "package a\n\nimport \"example.com/nope\"\n\nvar V nope.T\n")]).unwrap();
        let pkg = prog.created_packages().next().unwrap();
        assert_eq!(pkg.name(), "a");
        assert!(pkg.errors().iter().all(|e| e.soft));
        assert!(!pkg.errors().is_empty());
        assert_eq!(prog.file(pkg.files()[0]).filename(), "goaster_1.go");
    }

    #[test]
    fn error_list_caps_at_three() {
        let fset = FileSet::new();
        let errs: Vec<TypeError> = (0..5)
            .map(|i| TypeError {
                pos: crate::position::Pos::NONE,
                msg: format!("e{i}"),
                soft: false,
            })
            .collect();
        let refs: Vec<&TypeError> = errs.iter().collect();
        assert_eq!(error_list(&fset, &refs), "e0, e1, e2 and 2 more");
    }

    #[test]
    fn module_paths() {
        assert_eq!(module_relative("example.com/m", "example.com/m/a/b"), Some("a/b"));
        assert_eq!(module_relative("example.com/m", "example.com/m"), Some(""));
        assert_eq!(module_relative("example.com/m", "example.com/mx"), None);
        let m = Module {
            root: PathBuf::from("/w"),
            path: "example.com/m".into(),
        };
        assert_eq!(import_path_of(Path::new("/w/a/b"), Some(&m)), "example.com/m/a/b");
        assert_eq!(import_path_of(Path::new("/w"), Some(&m)), "example.com/m");
    }
}
