use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extra skips for `dir/...` expansion, on top of `.gitignore` and the
/// directories the go tool ignores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory names skipped at any depth, e.g. "mocks".
    pub exclude_dir_names: Vec<String>,
    /// Glob patterns matched against file names (e.g. "*_gen.go").
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Index declarations inside function bodies (short variable declarations,
    /// local types and values, labels).
    pub local_declarations: bool,
    /// Load `_test.go` files that belong to the package.
    pub include_tests: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Write files back even when the rendered text hashes the same as the
    /// loaded source.
    pub rewrite_unchanged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub load: LoadConfig,
    pub scan: ScanConfig,
    pub format: FormatConfig,
}

/// Reads `goaster.toml`, then `.goaster.json`, from `root`. A missing or
/// unparsable file falls through to the next one, and finally to defaults.
pub fn load_config(root: &Path) -> Config {
    if let Ok(text) = std::fs::read_to_string(root.join("goaster.toml")) {
        match toml::from_str::<Config>(&text) {
            Ok(cfg) => return cfg,
            Err(e) => tracing::warn!("ignoring goaster.toml: {e}"),
        }
    }

    let text = std::fs::read_to_string(root.join(".goaster.json"));
    let Ok(text) = text else { return Config::default() };

    serde_json::from_str::<Config>(&text).unwrap_or_else(|e| {
        tracing::warn!("ignoring .goaster.json: {e}");
        Config::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_wins_over_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("goaster.toml"),
            "[load]\nlocal_declarations = true\n\n[scan]\nexclude_globs = [\"*_gen.go\"]\n",
        )
        .unwrap();
        std::fs::write(dir.path().join(".goaster.json"), r#"{"load":{"include_tests":true}}"#).unwrap();

        let cfg = load_config(dir.path());
        assert!(cfg.load.local_declarations);
        assert!(!cfg.load.include_tests, "json must not be merged when toml parsed");
        assert_eq!(cfg.scan.exclude_globs, vec!["*_gen.go".to_string()]);
        assert!(!cfg.format.rewrite_unchanged);
    }

    #[test]
    fn falls_back_to_json_then_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(dir.path()), Config::default());

        std::fs::write(dir.path().join("goaster.toml"), "not [valid").unwrap();
        std::fs::write(
            dir.path().join(".goaster.json"),
            r#"{"scan":{"exclude_dir_names":["mocks"]},"format":{"rewrite_unchanged":true}}"#,
        )
        .unwrap();
        let cfg = load_config(dir.path());
        assert_eq!(cfg.scan.exclude_dir_names, vec!["mocks".to_string()]);
        assert!(cfg.format.rewrite_unchanged);
    }
}
