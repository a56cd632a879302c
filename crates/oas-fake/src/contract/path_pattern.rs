//! OpenAPI path-pattern matching.
//!
//! A `{name}` placeholder matches one or more non-slash characters; every
//! other character matches literally. Patterns are compiled to an anchored
//! regex once, at contract load.

use regex::Regex;
use std::fmt;

/// Compiled path pattern such as `/pets/{petId}`.
#[derive(Clone)]
pub struct PathPattern {
    raw: String,
    regex: Regex,
    names: Vec<String>,
}

impl PathPattern {
    pub fn compile(raw: &str) -> Result<Self, regex::Error> {
        let mut expr = String::with_capacity(raw.len() + 8);
        let mut names = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        expr.push('^');
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|c| open + c) else {
                break;
            };
            literal.push_str(&rest[..open]);
            expr.push_str(&regex::escape(&literal));
            literal.clear();

            expr.push_str("([^/]+)");
            names.push(rest[open + 1..close].to_string());
            rest = &rest[close + 1..];
        }
        literal.push_str(rest);
        expr.push_str(&regex::escape(&literal));
        expr.push('$');

        Ok(Self {
            raw: raw.to_string(),
            regex: Regex::new(&expr)?,
            names,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in order of appearance.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Placeholder values captured from a concrete path, percent-decoded.
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let raw = caps.get(i + 1).map(|m| m.as_str()).unwrap_or("");
                    let value = urlencoding::decode(raw)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| raw.to_string());
                    (name.clone(), value)
                })
                .collect(),
        )
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for PathPattern {}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.raw).finish()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> PathPattern {
        PathPattern::compile(raw).unwrap()
    }

    #[test]
    fn test_literal_pattern() {
        let p = pattern("/pets");
        assert!(p.matches("/pets"));
        assert!(!p.matches("/pets/"));
        assert!(!p.matches("/pets/1"));
        assert!(!p.matches("/petsx"));
    }

    #[test]
    fn test_placeholder_matches_one_segment() {
        let p = pattern("/pets/{petId}");
        assert!(p.matches("/pets/123"));
        assert!(p.matches("/pets/abc-def"));
        assert!(!p.matches("/pets/"));
        assert!(!p.matches("/pets/1/2"));
        assert!(!p.matches("/dogs/1"));
    }

    #[test]
    fn test_multiple_placeholders_and_captures() {
        let p = pattern("/owners/{ownerId}/pets/{petId}");
        assert_eq!(p.names(), ["ownerId", "petId"]);
        assert_eq!(
            p.captures("/owners/7/pets/hello%20world"),
            Some(vec![
                ("ownerId".to_string(), "7".to_string()),
                ("petId".to_string(), "hello world".to_string()),
            ])
        );
        assert!(p.captures("/owners/7/cats/1").is_none());
    }

    #[test]
    fn test_placeholder_inside_segment() {
        let p = pattern("/files/{name}.json");
        assert!(p.matches("/files/report.json"));
        assert!(!p.matches("/files/report.xml"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = pattern("/v1.0/items+extra");
        assert!(p.matches("/v1.0/items+extra"));
        assert!(!p.matches("/v1x0/itemsextra"));
    }

    #[test]
    fn test_unclosed_brace_is_literal() {
        let p = pattern("/weird/{oops");
        assert!(p.matches("/weird/{oops"));
        assert!(!p.matches("/weird/value"));
        assert!(p.names().is_empty());
    }

    #[test]
    fn test_every_literal_segment_must_match() {
        let p = pattern("/a/{x}/c/{y}/e");
        assert!(p.matches("/a/1/c/2/e"));
        for wrong in ["/z/1/c/2/e", "/a/1/z/2/e", "/a/1/c/2/z"] {
            assert!(!p.matches(wrong), "{wrong} should not match");
        }
    }
}
