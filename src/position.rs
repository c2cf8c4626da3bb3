//! Position table shared by every file of a program.
//!
//! Each registered source gets a disjoint range of [`Pos`] values, so a single
//! integer identifies both the file and the byte offset inside it.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pos(pub u32);

impl Pos {
    pub const NONE: Pos = Pos(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Offset the position, saturating at the invalid position.
    pub fn shift_back(self, n: u32) -> Pos {
        if !self.is_valid() {
            return self;
        }
        Pos(self.0.saturating_sub(n).max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub filename: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

#[derive(Debug, Clone)]
struct SourceFile {
    name: String,
    base: u32,
    size: u32,
    line_starts: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: Vec<SourceFile>,
    next_base: u32,
}

impl FileSet {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            next_base: 1,
        }
    }

    /// Registers `src` under `name` and returns its base position.
    pub fn add_file(&mut self, name: &str, src: &str) -> u32 {
        let base = self.next_base.max(1);
        let size = src.len() as u32;
        let mut line_starts = vec![0u32];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        self.files.push(SourceFile {
            name: name.to_string(),
            base,
            size,
            line_starts,
        });
        // +1 so the end-of-file position of one file never aliases the next base.
        self.next_base = base + size + 1;
        base
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn find(&self, pos: Pos) -> Option<&SourceFile> {
        if !pos.is_valid() {
            return None;
        }
        let idx = self.files.partition_point(|f| f.base <= pos.0);
        let file = self.files.get(idx.checked_sub(1)?)?;
        (pos.0 <= file.base + file.size).then_some(file)
    }

    /// Index of the registered file containing `pos`.
    pub fn file_index(&self, pos: Pos) -> Option<usize> {
        let file = self.find(pos)?;
        self.files.iter().position(|f| f.base == file.base)
    }

    pub fn filename(&self, pos: Pos) -> Option<&str> {
        self.find(pos).map(|f| f.name.as_str())
    }

    /// 1-based line of `pos`, or 0 when the position is unknown.
    pub fn line(&self, pos: Pos) -> usize {
        match self.find(pos) {
            Some(f) => {
                let off = pos.0 - f.base;
                f.line_starts.partition_point(|&s| s <= off)
            }
            None => 0,
        }
    }

    pub fn position(&self, pos: Pos) -> Option<Position> {
        let f = self.find(pos)?;
        let off = pos.0 - f.base;
        let line = f.line_starts.partition_point(|&s| s <= off);
        let line_start = f.line_starts[line - 1];
        Some(Position {
            filename: f.name.clone(),
            line,
            column: (off - line_start) as usize + 1,
        })
    }

    /// Reports whether two positions lie in the same registered file.
    pub fn same_file(&self, a: Pos, b: Pos) -> bool {
        match (self.find(a), self.find(b)) {
            (Some(x), Some(y)) => x.base == y.base,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_resolve_to_line_and_column() {
        let mut fset = FileSet::new();
        let a = fset.add_file("a.go", "package a\n\nvar x = 1\n");
        let b = fset.add_file("b.go", "package b\n");

        let p = fset.position(Pos(a + 11)).unwrap();
        assert_eq!(p.filename, "a.go");
        assert_eq!(p.line, 3);
        assert_eq!(p.column, 1);

        let q = fset.position(Pos(b + 8)).unwrap();
        assert_eq!(q.filename, "b.go");
        assert_eq!((q.line, q.column), (1, 9));

        assert!(fset.same_file(Pos(a), Pos(a + 5)));
        assert!(!fset.same_file(Pos(a), Pos(b)));
        assert_eq!(fset.line(Pos::NONE), 0);
    }
}
