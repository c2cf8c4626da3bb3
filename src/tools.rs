//! Small text helpers shared by the CLI and callers generating code.

use std::sync::OnceLock;

use regex::Regex;

/// `UserID` -> `user_id`, `HTTPServer` -> `http_server`.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

fn package_clause() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(\s*package\s+)([\p{L}_][\p{L}\p{N}_]*)").unwrap())
}

/// Rewrites the package clause of `src`. Text without a package clause is
/// returned unchanged.
pub fn change_package_name(src: &str, name: &str) -> String {
    package_clause()
        .replace(src, |caps: &regex::Captures<'_>| format!("{}{}", &caps[1], name))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_splits_initialisms() {
        assert_eq!(snake_case("Name"), "name");
        assert_eq!(snake_case("UserID"), "user_id");
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("CreatedAt2"), "created_at2");
        assert_eq!(snake_case("ID"), "id");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn change_package_name_touches_only_the_clause() {
        let src = "// Package a does things.\npackage a\n\nvar packages = 1\n";
        assert_eq!(
            change_package_name(src, "b"),
            "// Package a does things.\npackage b\n\nvar packages = 1\n"
        );
        assert_eq!(change_package_name("var x = 1\n", "b"), "var x = 1\n");
    }
}
