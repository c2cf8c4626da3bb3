//! Struct tag codec: `key:"name,opt,opt" key2:"..."`.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("bad syntax for struct tag pair")]
    Syntax,
    #[error("bad syntax for struct tag key")]
    KeySyntax,
    #[error("bad syntax for struct tag value")]
    ValueSyntax,
    #[error("tag does not exist")]
    NotExist,
    #[error("tag key is not set")]
    KeyNotSet,
}

/// One `key:"name,options..."` pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tag {
    pub key: String,
    pub name: String,
    pub options: Vec<String>,
}

impl Tag {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            options: Vec::new(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_option(&self, opt: &str) -> bool {
        self.options.iter().any(|o| o == opt)
    }

    /// The unquoted value: name followed by the options.
    pub fn value(&self) -> String {
        if self.options.is_empty() {
            return self.name.clone();
        }
        format!("{},{}", self.name, self.options.join(","))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, quote(&self.value()))
    }
}

/// An ordered set of tags, at most one per key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tags {
    tags: Vec<Tag>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a tag string without its surrounding backticks.
    pub fn parse(tag: &str) -> Result<Tags, TagError> {
        let mut tags = Vec::new();
        let mut rest = tag.as_bytes();

        loop {
            let skip = rest.iter().take_while(|b| **b == b' ').count();
            rest = &rest[skip..];
            if rest.is_empty() {
                break;
            }

            let mut i = 0;
            while i < rest.len() && rest[i] > b' ' && rest[i] != b':' && rest[i] != b'"' && rest[i] != 0x7f {
                i += 1;
            }
            if i == 0 {
                return Err(TagError::KeySyntax);
            }
            if i + 1 >= rest.len() || rest[i] != b':' {
                return Err(TagError::Syntax);
            }
            if rest[i + 1] != b'"' {
                return Err(TagError::ValueSyntax);
            }
            let key = String::from_utf8_lossy(&rest[..i]).into_owned();
            rest = &rest[i + 1..];

            let mut j = 1;
            while j < rest.len() && rest[j] != b'"' {
                if rest[j] == b'\\' {
                    j += 1;
                }
                j += 1;
            }
            if j >= rest.len() {
                return Err(TagError::ValueSyntax);
            }
            let quoted = std::str::from_utf8(&rest[..=j]).map_err(|_| TagError::ValueSyntax)?;
            rest = &rest[j + 1..];

            let value = unquote(quoted).ok_or(TagError::ValueSyntax)?;
            let mut parts = value.split(',');
            let name = parts.next().unwrap_or_default().to_string();
            let options = parts.map(str::to_string).collect();
            tags.push(Tag { key, name, options });
        }

        Ok(Tags { tags })
    }

    pub fn get(&self, key: &str) -> Result<&Tag, TagError> {
        self.tags.iter().find(|t| t.key == key).ok_or(TagError::NotExist)
    }

    /// Replaces the tag with the same key, or appends it.
    pub fn set(&mut self, tag: Tag) -> Result<(), TagError> {
        if tag.key.is_empty() {
            return Err(TagError::KeyNotSet);
        }
        match self.tags.iter_mut().find(|t| t.key == tag.key) {
            Some(existing) => *existing = tag,
            None => self.tags.push(tag),
        }
        Ok(())
    }

    /// Appends options missing from the tag with `key`. No-op if absent.
    pub fn add_options(&mut self, key: &str, options: &[&str]) {
        for t in self.tags.iter_mut().filter(|t| t.key == key) {
            for opt in options {
                if !t.has_option(opt) {
                    t.options.push((*opt).to_string());
                }
            }
        }
    }

    pub fn delete(&mut self, keys: &[&str]) {
        self.tags.retain(|t| !keys.contains(&t.key.as_str()));
    }

    pub fn delete_options(&mut self, key: &str, options: &[&str]) {
        for t in self.tags.iter_mut().filter(|t| t.key == key) {
            t.options.retain(|o| !options.contains(&o.as_str()));
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.key.as_str()).collect()
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Orders tags by key.
    pub fn sort(&mut self) {
        self.tags.sort_by(|a, b| a.key.cmp(&b.key));
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{t}")?;
        }
        Ok(())
    }
}

/// Double-quoted literal using Go escape rules.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\u{b}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Inverse of [`quote`], also accepting raw (backquoted) literals. `None` on
/// malformed input.
pub(crate) fn unquote(s: &str) -> Option<String> {
    if s.len() >= 2 && s.starts_with('`') && s.ends_with('`') {
        let inner = &s[1..s.len() - 1];
        return (!inner.contains('`')).then(|| inner.replace('\r', ""));
    }
    let inner = s.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' | '\n' => return None,
            '\\' => {}
            c => {
                out.push(c);
                continue;
            }
        }
        let esc = chars.next()?;
        match esc {
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{b}'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'x' | 'u' | 'U' => {
                let n = match esc {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = chars.by_ref().take(n).collect();
                if hex.len() != n {
                    return None;
                }
                let v = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(v)?);
            }
            '0'..='7' => {
                let rest: String = chars.by_ref().take(2).collect();
                if rest.len() != 2 {
                    return None;
                }
                let v = u32::from_str_radix(&format!("{esc}{rest}"), 8).ok()?;
                if v > 255 {
                    return None;
                }
                out.push(char::from_u32(v)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_names_and_options() {
        let tags = Tags::parse(r#"json:"foo,omitempty,string" xml:"foo""#).unwrap();
        assert_eq!(tags.keys(), vec!["json", "xml"]);
        let json = tags.get("json").unwrap();
        assert_eq!(json.name, "foo");
        assert_eq!(json.options, vec!["omitempty", "string"]);
        assert!(json.has_option("string"));
        assert_eq!(tags.get("xml").unwrap().options, Vec::<String>::new());
    }

    #[test]
    fn reports_malformed_tags() {
        assert_eq!(Tags::parse(r#":"foo""#), Err(TagError::KeySyntax));
        assert_eq!(Tags::parse("json"), Err(TagError::Syntax));
        assert_eq!(Tags::parse("json:foo"), Err(TagError::ValueSyntax));
        assert_eq!(Tags::parse(r#"json:"foo"#), Err(TagError::ValueSyntax));
        assert!(Tags::parse("").unwrap().is_empty());
    }

    #[test]
    fn set_replaces_existing_key() {
        let mut tags = Tags::parse(r#"json:"a" xml:"b""#).unwrap();
        tags.set(Tag::new("json", "c").with_options(["omitempty"])).unwrap();
        assert_eq!(tags.to_string(), r#"json:"c,omitempty" xml:"b""#);
        assert_eq!(tags.set(Tag::new("", "x")), Err(TagError::KeyNotSet));
    }

    #[test]
    fn option_edits_and_sorting() {
        let mut tags = Tags::parse(r#"xml:"b" json:"a,x""#).unwrap();
        tags.add_options("json", &["x", "omitempty"]);
        tags.delete_options("json", &["x"]);
        tags.sort();
        assert_eq!(tags.to_string(), r#"json:"a,omitempty" xml:"b""#);
        tags.delete(&["xml", "json"]);
        assert_eq!(tags.to_string(), "");
        assert_eq!(tags.get("json"), Err(TagError::NotExist));
    }

    #[test]
    fn quoting_round_trips_escapes() {
        let raw = "a\"b\\c\td";
        assert_eq!(unquote(&quote(raw)).as_deref(), Some(raw));
        assert_eq!(unquote(r#""\x41é\101""#).as_deref(), Some("AéA"));
        assert_eq!(unquote("`raw\\n`").as_deref(), Some("raw\\n"));
        assert_eq!(unquote(r#""\q""#), None);
    }
}
