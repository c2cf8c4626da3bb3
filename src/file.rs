//! One parsed source file and its import list.
//!
//! The flat [`Import`] list and the import declarations of the tree are edited
//! together, so rendering always reflects what [`File::imports`] reports.

use std::path::{Path, PathBuf};

use crate::ast::{comment_text, Ast, DeclTok, GenDecl, ImportSpec, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::facade::DeclId;
use crate::package::PackageId;
use crate::parser::ParsedFile;
use crate::position::{FileSet, Pos};
use crate::printer::Printer;
use crate::tags::{quote, unquote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub(crate) u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One import specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Local name: the alias, or the last path segment.
    pub name: String,
    pub alias: Option<String>,
    pub path: String,
    pub doc: Option<String>,
    pub(crate) spec: NodeId,
}

#[derive(Debug, Clone)]
pub struct File {
    pub(crate) id: FileId,
    pub(crate) package: PackageId,
    pub(crate) filename: String,
    /// Where the file is written back to; `None` for in-memory sources.
    pub(crate) path: Option<PathBuf>,
    pub(crate) package_name: String,
    pub(crate) ast: Ast,
    pub(crate) root: NodeId,
    /// Comment groups in position order.
    pub(crate) comments: Vec<NodeId>,
    pub(crate) imports: Vec<Import>,
    pub(crate) decls: Vec<DeclId>,
    /// xxh3 of the text the file was loaded from.
    pub(crate) source_hash: u64,
}

impl File {
    pub(crate) fn new(
        id: FileId,
        package: PackageId,
        filename: String,
        path: Option<PathBuf>,
        parsed: ParsedFile,
        source_hash: u64,
    ) -> Self {
        let mut file = File {
            id,
            package,
            filename,
            path,
            package_name: parsed.package_name,
            ast: parsed.ast,
            root: parsed.root,
            comments: parsed.comments,
            imports: Vec::new(),
            decls: Vec::new(),
            source_hash,
        };
        file.imports = file.collect_imports();
        file
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn package(&self) -> PackageId {
        self.package
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    /// Declarations whose identifier lies in this file, in index order.
    pub fn decls(&self) -> &[DeclId] {
        &self.decls
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn comments(&self) -> &[NodeId] {
        &self.comments
    }

    pub fn render(&self, fset: &FileSet) -> String {
        Printer::new(&self.ast, fset).file(self.root)
    }

    fn import_decls(&self) -> Vec<NodeId> {
        let Some(file) = self.ast.file(self.root) else { return Vec::new() };
        file.decls
            .iter()
            .copied()
            .filter(|d| matches!(self.ast.kind(*d), NodeKind::GenDecl(g) if g.tok == DeclTok::Import))
            .collect()
    }

    fn collect_imports(&self) -> Vec<Import> {
        let mut out = Vec::new();
        for decl in self.import_decls() {
            let NodeKind::GenDecl(g) = self.ast.kind(decl) else { continue };
            for &spec in &g.specs {
                let NodeKind::ImportSpec(s) = self.ast.kind(spec) else { continue };
                let alias = s.name.map(|n| self.ast.ident_name(n).to_string());
                let path = unquote(&s.path).unwrap_or_else(|| s.path.trim_matches('"').to_string());
                let doc = s.doc.or(if g.grouped { None } else { g.doc });
                out.push(Import {
                    name: local_name(alias.as_deref(), &path),
                    alias,
                    path,
                    doc: doc
                        .map(|d| comment_text(self.ast.comment_group(d)))
                        .filter(|t| !t.is_empty()),
                    spec,
                });
            }
        }
        out
    }

    /// The alias of the import of `path`: `Some(None)` for an import without
    /// alias, `None` when the path is not imported.
    pub fn find_import_by_path(&self, path: &str) -> Option<Option<&str>> {
        let path = normalize(path);
        self.imports
            .iter()
            .find(|i| i.path == path)
            .map(|i| i.alias.as_deref())
    }

    /// The path imported under the local name `alias`.
    pub fn find_import_by_alias(&self, alias: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|i| i.name == alias)
            .map(|i| i.path.as_str())
    }

    /// Replaces the path of every import of `origin`, and its alias when one is
    /// given. No-op when nothing matches. Use [`crate::Program::cover_import`]
    /// to keep the declarations of aliases indexed.
    pub fn cover_import(&mut self, origin: &str, path: &str, alias: Option<&str>) {
        let (origin, path) = (normalize(origin), normalize(path));
        for i in 0..self.imports.len() {
            if self.imports[i].path != origin {
                continue;
            }
            let spec = self.imports[i].spec;
            let name_node = alias.map(|a| self.ast.alloc(Pos::NONE, Pos::NONE, NodeKind::Ident(a.to_string())));
            if let NodeKind::ImportSpec(s) = self.ast.kind_mut(spec) {
                s.path = quote(&path);
                if name_node.is_some() {
                    s.name = name_node;
                }
            }
            let import = &mut self.imports[i];
            import.path = path.clone();
            if let Some(a) = alias {
                import.alias = Some(a.to_string());
            }
            import.name = local_name(import.alias.as_deref(), &import.path);
        }
    }

    /// Adds an import, grouping it with the first import declaration or
    /// creating one after the package clause.
    pub fn add_import(&mut self, path: &str, alias: Option<&str>) -> Result<()> {
        let path = normalize(path);
        let alias = alias.filter(|a| !a.is_empty());
        let name = local_name(alias, &path);
        let clash = self.imports.iter().any(|i| {
            i.path == path || (alias.is_some_and(|a| a != "_" && a != ".") && i.name == name)
        });
        if clash {
            return Err(Error::DuplicateImport {
                path,
                alias: alias.unwrap_or_default().to_string(),
            });
        }

        let name_node = alias.map(|a| self.ast.alloc(Pos::NONE, Pos::NONE, NodeKind::Ident(a.to_string())));
        let spec = self.ast.alloc(
            Pos::NONE,
            Pos::NONE,
            NodeKind::ImportSpec(ImportSpec {
                doc: None,
                name: name_node,
                path: quote(&path),
                comment: None,
            }),
        );
        match self.import_decls().first().copied() {
            Some(decl) => {
                if let NodeKind::GenDecl(g) = self.ast.kind_mut(decl) {
                    g.specs.push(spec);
                    let count = g.specs.len();
                    g.grouped |= count > 1;
                }
            }
            None => {
                let decl = self.ast.alloc(
                    Pos::NONE,
                    Pos::NONE,
                    NodeKind::GenDecl(GenDecl {
                        doc: None,
                        tok: DeclTok::Import,
                        grouped: false,
                        specs: vec![spec],
                    }),
                );
                if let Some(file) = self.ast.file_mut(self.root) {
                    file.decls.insert(0, decl);
                }
            }
        }
        self.imports.push(Import {
            name,
            alias: alias.map(str::to_string),
            path,
            doc: None,
            spec,
        });
        Ok(())
    }

    /// Removes the import of `path`. An import declaration left without specs
    /// is removed too. No-op when the path is not imported. See
    /// [`crate::Program::del_import`].
    pub fn del_import(&mut self, path: &str) {
        let path = normalize(path);
        let removed: Vec<NodeId> = self
            .imports
            .iter()
            .filter(|i| i.path == path)
            .map(|i| i.spec)
            .collect();
        if removed.is_empty() {
            return;
        }
        self.imports.retain(|i| i.path != path);

        let mut empty = Vec::new();
        for decl in self.import_decls() {
            if let NodeKind::GenDecl(g) = self.ast.kind_mut(decl) {
                g.specs.retain(|s| !removed.contains(s));
                if g.specs.is_empty() {
                    empty.push(decl);
                }
            }
        }
        for decl in &empty {
            let groups = self.ast.comment_groups(*decl);
            self.comments.retain(|c| !groups.contains(c));
        }
        for spec in &removed {
            let groups = self.ast.comment_groups(*spec);
            self.comments.retain(|c| !groups.contains(c));
        }
        if let Some(file) = self.ast.file_mut(self.root) {
            file.decls.retain(|d| !empty.contains(d));
        }
    }

    /// Adds a comment group to the position-ordered comment list.
    pub(crate) fn insert_comment(&mut self, group: NodeId) {
        if self.comments.contains(&group) {
            return;
        }
        self.comments.push(group);
        let ast = &self.ast;
        // inserted groups carry no node position, only their comments do
        self.comments.sort_by_key(|c| {
            let pos = ast.pos(*c);
            if pos.is_valid() {
                pos
            } else {
                ast.comment_group(*c).first().map_or(pos, |first| first.pos)
            }
        });
    }
}

/// Strips the quotes of a path literal; plain paths pass through.
fn normalize(path: &str) -> String {
    let path = path.trim();
    unquote(path).unwrap_or_else(|| path.to_string())
}

fn local_name(alias: Option<&str>, path: &str) -> String {
    match alias {
        Some(a) => a.to_string(),
        None => path.rsplit('/').next().unwrap_or(path).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    fn load(src: &str) -> (FileSet, File) {
        let mut fset = FileSet::new();
        let parsed = parse_file(&mut fset, "a.go", src).expect("source should parse");
        let file = File::new(FileId(0), PackageId(0), "a.go".into(), None, parsed, 0);
        (fset, file)
    }

    #[test]
    fn lists_imports_with_local_names() {
        let (_, file) = load("package a\n\nimport (\n\t// Logging.\n\tlog \"github.com/x/zap\"\n\t\"net/http\"\n)\n");
        let imports = file.imports();
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].name, "log");
        assert_eq!(imports[0].doc.as_deref(), Some("Logging.\n"));
        assert_eq!(imports[1].name, "http");
        assert_eq!(file.find_import_by_path("\"net/http\""), Some(None));
        assert_eq!(file.find_import_by_path("github.com/x/zap"), Some(Some("log")));
        assert_eq!(file.find_import_by_alias("http"), Some("net/http"));
        assert_eq!(file.find_import_by_path("fmt"), None);
    }

    #[test]
    fn cover_import_rewrites_tree_and_list() {
        let (fset, mut file) = load("package a\n\nimport (\n\t_ \"aaa\"\n\t_ \"errors\"\n\t_ \"bbb\"\n)\n");
        file.cover_import("\"errors\"", "\"fmt\"", Some("_"));
        file.cover_import("missing", "other", None);
        let out = file.render(&fset);
        println!("{out}");
        assert!(out.contains("import (\n\t_ \"aaa\"\n\t_ \"fmt\"\n\t_ \"bbb\"\n)"));
        assert!(!out.contains("errors"));
        assert_eq!(file.find_import_by_path("fmt"), Some(Some("_")));
    }

    #[test]
    fn add_import_creates_declaration_and_groups() {
        let (fset, mut file) = load("package a\n\nfunc F() {}\n");
        file.add_import("fmt", None).unwrap();
        assert!(file.render(&fset).starts_with("package a\n\nimport \"fmt\"\n\nfunc F() {}"));

        file.add_import("\"strings\"", Some("str")).unwrap();
        let out = file.render(&fset);
        assert!(out.contains("import (\n\t\"fmt\"\n\tstr \"strings\"\n)"), "got:\n{out}");

        let dup = file.add_import("fmt", Some("f"));
        assert!(matches!(dup, Err(Error::DuplicateImport { .. })));
        let dup = file.add_import("other/str", Some("str"));
        assert!(matches!(dup, Err(Error::DuplicateImport { .. })));
    }

    #[test]
    fn del_import_drops_empty_declarations() {
        let (fset, mut file) = load("package a\n\nimport \"fmt\"\n\nfunc F() {}\n");
        file.del_import("nope");
        assert_eq!(file.imports().len(), 1);
        file.del_import("fmt");
        assert!(file.imports().is_empty());
        assert_eq!(file.render(&fset), "package a\n\nfunc F() {}\n");
    }
}
