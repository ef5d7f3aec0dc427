//! Route pattern compilation.
//!
//! # Responsibilities
//! - Parse `/teams/{team}/{id?}` into literal and placeholder tokens
//! - Reject malformed patterns at registration time
//! - Expand trailing optionals into one alternative per omissible suffix
//!
//! # Design Decisions
//! - Placeholders occupy a whole path segment and match `[^/]+`
//! - Alternatives differ in segment count, so at most one can match a path
//! - No regex: matching is a segment-by-segment comparison

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::routing::error::DefinitionError;

/// One piece of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A segment that must appear verbatim, stored percent-decoded.
    Literal(String),
    /// A `{name}` or `{name?}` placeholder.
    Segment { name: String, optional: bool },
}

/// A pattern compiled into matchable alternatives and a reverse template.
///
/// Serialized as its source string and recompiled on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompiledPattern {
    source: String,
    tokens: Vec<Token>,
    /// Token-prefix lengths, shortest first. Each one is a full alternative.
    alternatives: Vec<usize>,
}

impl CompiledPattern {
    /// Compile a pattern string.
    pub fn compile(pattern: &str) -> Result<Self, DefinitionError> {
        let source = normalize_pattern(pattern);
        let invalid = |reason: &str| DefinitionError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut tokens = Vec::new();
        let mut seen_optional = false;

        for raw in source.split('/').filter(|s| !s.is_empty()) {
            if !raw.contains('{') && !raw.contains('}') {
                if seen_optional {
                    return Err(invalid("literal segment after an optional segment"));
                }
                tokens.push(Token::Literal(decode_segment(raw)));
                continue;
            }

            let inner = raw
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .ok_or_else(|| invalid("unbalanced braces or placeholder mixed with text"))?;
            if inner.contains('{') || inner.contains('}') {
                return Err(invalid("unbalanced braces"));
            }

            let (name, optional) = match inner.strip_suffix('?') {
                Some(name) => (name, true),
                None => (inner, false),
            };
            if name.is_empty() {
                return Err(invalid("empty segment name"));
            }
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid("segment names may only contain [A-Za-z0-9_]"));
            }
            if tokens
                .iter()
                .any(|t| matches!(t, Token::Segment { name: n, .. } if n == name))
            {
                return Err(invalid("duplicate segment name"));
            }
            if seen_optional && !optional {
                return Err(invalid("required segment after an optional segment"));
            }
            seen_optional |= optional;

            tokens.push(Token::Segment {
                name: name.to_string(),
                optional,
            });
        }

        let required = tokens
            .iter()
            .take_while(|t| !matches!(t, Token::Segment { optional: true, .. }))
            .count();
        let alternatives = (required..=tokens.len()).collect();

        Ok(Self {
            source,
            tokens,
            alternatives,
        })
    }

    /// The normalized pattern string.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Tokens in order; the reverse template used for URL generation.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Matchable alternatives, shortest first.
    pub fn alternatives(&self) -> impl Iterator<Item = &[Token]> {
        self.alternatives.iter().filter_map(|len| self.tokens.get(..*len))
    }

    /// Returns true if the pattern has no placeholders.
    pub fn is_static(&self) -> bool {
        self.tokens.iter().all(|t| matches!(t, Token::Literal(_)))
    }

    /// Whether `name` is a placeholder in this pattern.
    pub fn has_segment(&self, name: &str) -> bool {
        self.segment_names().any(|n| n == name)
    }

    /// Placeholder names in declaration order.
    pub fn segment_names(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Segment { name, .. } => Some(name.as_str()),
            Token::Literal(_) => None,
        })
    }

    /// Match already-split, decoded path segments.
    ///
    /// Returns the captured placeholder values on success.
    pub fn match_segments(&self, segments: &[String]) -> Option<Vec<(String, String)>> {
        let alternative = self.alternatives().find(|alt| alt.len() == segments.len())?;

        let mut captures = Vec::new();
        for (token, value) in alternative.iter().zip(segments) {
            match token {
                Token::Literal(lit) if lit == value => {}
                Token::Literal(_) => return None,
                Token::Segment { name, .. } => captures.push((name.clone(), value.clone())),
            }
        }
        Some(captures)
    }
}

impl TryFrom<String> for CompiledPattern {
    type Error = DefinitionError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Self::compile(&source)
    }
}

impl From<CompiledPattern> for String {
    fn from(pattern: CompiledPattern) -> Self {
        pattern.source
    }
}

fn decode_segment(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Ensure a leading slash and drop a trailing one (except for the root).
pub fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern.trim();
    let mut out = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Split a request path into percent-decoded segments.
///
/// Empty segments (double or trailing slashes) are dropped, so `/foo/` and
/// `/foo` dispatch identically.
pub fn path_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(path: &str) -> Vec<String> {
        path_segments(path)
    }

    #[test]
    fn test_static_pattern_matches_literally() {
        let p = CompiledPattern::compile("/about/team").unwrap();
        assert!(p.is_static());
        assert_eq!(p.match_segments(&segs("/about/team")), Some(vec![]));
        assert!(p.match_segments(&segs("/about")).is_none());
        assert!(p.match_segments(&segs("/about/Team")).is_none());
    }

    #[test]
    fn test_optional_suffix_alternatives() {
        let p = CompiledPattern::compile("/teams/{team}/{id?}/{page?}").unwrap();
        let lens: Vec<usize> = p.alternatives().map(|a| a.len()).collect();
        assert_eq!(lens, vec![2, 3, 4]);

        let caps = p.match_segments(&segs("/teams/red")).unwrap();
        assert_eq!(caps, vec![("team".into(), "red".into())]);

        let caps = p.match_segments(&segs("/teams/red/7/2")).unwrap();
        assert_eq!(caps.len(), 3);
        assert_eq!(caps[2], ("page".into(), "2".into()));

        assert!(p.match_segments(&segs("/teams")).is_none());
    }

    #[test]
    fn test_root_pattern() {
        let p = CompiledPattern::compile("/").unwrap();
        assert_eq!(p.as_str(), "/");
        assert_eq!(p.match_segments(&segs("/")), Some(vec![]));
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_pattern("users/"), "/users");
        assert_eq!(normalize_pattern("  /users//  "), "/users");
    }

    #[test]
    fn test_decoding() {
        assert_eq!(segs("/files/a%20b//c/"), vec!["files", "a b", "c"]);
    }

    #[test]
    fn test_encoded_literals_match_decoded_requests() {
        let p = CompiledPattern::compile("/caf%C3%A9/{id}").unwrap();
        assert_eq!(p.tokens()[0], Token::Literal("café".into()));
        assert!(p.match_segments(&segs("/caf%C3%A9/1")).is_some());
        assert!(p.match_segments(&segs("/café/1")).is_some());
        assert_eq!(p.as_str(), "/caf%C3%A9/{id}");
    }

    #[test]
    fn test_serializes_as_source_and_recompiles() {
        let p = CompiledPattern::compile("/teams/{team}/{id?}").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#""/teams/{team}/{id?}""#);
        assert_eq!(serde_json::from_str::<CompiledPattern>(&json).unwrap(), p);

        assert!(serde_json::from_str::<CompiledPattern>(r#""/teams/{team""#).is_err());
        let field_shaped = r#"{"source":"/a/{id}","tokens":[],"alternatives":[9]}"#;
        assert!(serde_json::from_str::<CompiledPattern>(field_shaped).is_err());
    }

    #[test]
    fn test_malformed_patterns() {
        let cases = [
            "/users/{id",
            "/users/id}",
            "/users/{}",
            "/users/{?}",
            "/users/{a{b}}",
            "/users/x{id}",
            "/users/{id?}/{name}",
            "/users/{id?}/edit",
            "/users/{id}/{id}",
            "/users/{i-d}",
        ];
        for case in cases {
            let err = CompiledPattern::compile(case).unwrap_err();
            assert!(
                matches!(err, DefinitionError::InvalidPattern { .. }),
                "expected failure for {case}"
            );
        }
    }
}
