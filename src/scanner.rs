use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::error::Result;

fn default_overrides(root: &Path, exclude_dir_names: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(root);

    // `go list ./...` never descends into these. Each name needs a pattern for
    // the entry and one for its contents.
    for d in [".git", "vendor", "testdata", "node_modules", "target"] {
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    for name in exclude_dir_names {
        let d = name.trim().trim_matches('/');
        if d.is_empty() {
            continue;
        }
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    Ok(ob.build()?)
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub include_tests: bool,
    pub exclude_dir_names: Vec<String>,
    pub exclude_globs: Vec<String>,
}

impl ScanOptions {
    pub fn new(scan: &ScanConfig, include_tests: bool) -> Self {
        Self {
            include_tests,
            exclude_dir_names: scan.exclude_dir_names.clone(),
            exclude_globs: scan.exclude_globs.clone(),
        }
    }

    fn patterns(&self) -> Result<Vec<glob::Pattern>> {
        Ok(self
            .exclude_globs
            .iter()
            .map(|g| glob::Pattern::new(g))
            .collect::<std::result::Result<_, _>>()?)
    }

    fn wants(&self, path: &Path, patterns: &[glob::Pattern]) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !name.ends_with(".go") || name.starts_with('_') || name.starts_with('.') {
            return false;
        }
        if !self.include_tests && name.ends_with("_test.go") {
            return false;
        }
        !patterns.iter().any(|p| p.matches(name))
    }
}

/// Go source files directly inside `dir`, sorted by name.
pub fn package_files(dir: &Path, opts: &ScanOptions) -> Result<Vec<PathBuf>> {
    let patterns = opts.patterns()?;
    let mut out = Vec::new();
    let walker = WalkBuilder::new(dir)
        .standard_filters(true)
        .max_depth(Some(1))
        .build();

    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(_) => continue,
        };
        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = dent.into_path();
        if opts.wants(&path, &patterns) {
            out.push(path);
        }
    }

    out.sort();
    Ok(out)
}

/// Every package directory below `root` (the `./...` pattern), sorted.
pub fn package_dirs(root: &Path, opts: &ScanOptions) -> Result<Vec<PathBuf>> {
    let patterns = opts.patterns()?;
    let overrides = default_overrides(root, &opts.exclude_dir_names)?;
    let walker = WalkBuilder::new(root)
        .standard_filters(true)
        .overrides(overrides)
        .build();

    let mut dirs = Vec::new();
    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(_) => continue,
        };
        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = dent.path();
        if !opts.wants(path, &patterns) {
            continue;
        }
        if let Some(parent) = path.parent() {
            if !dirs.iter().any(|d: &PathBuf| d == parent) {
                dirs.push(parent.to_path_buf());
            }
        }
    }

    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "package x\n").unwrap();
    }

    #[test]
    fn package_files_skip_tests_and_globs() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["a.go", "b_test.go", "c_gen.go", "notes.txt", "sub/d.go"] {
            touch(dir.path(), f);
        }
        let opts = ScanOptions {
            exclude_globs: vec!["*_gen.go".into()],
            ..Default::default()
        };
        let files = package_files(dir.path(), &opts).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["a.go"]);

        let opts = ScanOptions {
            include_tests: true,
            ..Default::default()
        };
        assert_eq!(package_files(dir.path(), &opts).unwrap().len(), 3);
    }

    #[test]
    fn package_dirs_skip_vendor_and_excluded_names() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["a.go", "api/b.go", "vendor/v/c.go", "mocks/m.go", "docs/readme.md"] {
            touch(dir.path(), f);
        }
        let opts = ScanOptions {
            exclude_dir_names: vec!["mocks".into()],
            ..Default::default()
        };
        let dirs = package_dirs(dir.path(), &opts).unwrap();
        let rel: Vec<_> = dirs
            .iter()
            .map(|d| d.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(rel, vec!["".to_string(), "api".to_string()]);
    }
}
