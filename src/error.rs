use std::path::PathBuf;

use thiserror::Error;

use crate::tags::TagError;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the library reports to callers.
///
/// Kind mismatches on facade accessors are not represented here: those are
/// caller bugs and panic.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{file}:{line}:{column}: {message}")]
    Syntax {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// Hard resolver errors of one package. `message` already lists the first
    /// few errors in the "a, b, c and N more" form.
    #[error("couldn't load package {package} due to errors: {message}")]
    Load { package: String, message: String },

    #[error("no Go files in {0}")]
    NoGoFiles(PathBuf),

    #[error("import cycle not allowed: {}", .0.join(" -> "))]
    ImportCycle(Vec<String>),

    #[error("body replacement: {0}")]
    StructuralMismatch(String),

    #[error("import {path:?} or alias {alias:?} already exists")]
    DuplicateImport { path: String, alias: String },

    #[error("{0} is not a method")]
    NotMethod(String),

    #[error("method {method} has receiver {found}, not {expected}")]
    ReceiverMismatch {
        method: String,
        expected: String,
        found: String,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("package scan: {0}")]
    Walk(#[from] ignore::Error),

    #[error("exclude pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("tree-sitter: {0}")]
    Parser(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
