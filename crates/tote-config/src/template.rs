//! Filename templates.
//!
//! A deliberately small language: literal text plus the placeholders
//! `[name]`, `[hash]` and `[contenthash]`. Hash placeholders accept an
//! optional length, e.g. `[hash:8]`. Templates are parsed once when the
//! configuration is validated and rendered once per chunk.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Hex characters used for `[hash]` and `[contenthash]` without a length.
pub const DEFAULT_HASH_LENGTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Name,
    Hash(usize),
    ContentHash(usize),
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateValues<'a> {
    pub name: &'a str,
    /// Full hex digest of the build.
    pub hash: &'a str,
    /// Full hex digest of the artifact being named.
    pub content_hash: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    source: String,
    tokens: Vec<Token>,
}

impl FilenameTemplate {
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidTemplate {
            template: source.to_string(),
            message,
        };

        if source.is_empty() {
            return Err(invalid("template is empty".to_string()));
        }

        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find('[') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find(']')
                .ok_or_else(|| invalid(format!("unterminated placeholder at byte {open}")))?;
            let placeholder = &after[..close];

            let (key, length) = match placeholder.split_once(':') {
                Some((key, len)) => {
                    let len: usize = len
                        .parse()
                        .map_err(|_| invalid(format!("invalid length in [{placeholder}]")))?;
                    if len == 0 {
                        return Err(invalid(format!("zero length in [{placeholder}]")));
                    }
                    (key, Some(len))
                }
                None => (placeholder, None),
            };

            let token = match (key, length) {
                ("name", None) => Token::Name,
                ("name", Some(_)) => {
                    return Err(invalid("[name] does not take a length".to_string()));
                }
                ("hash", len) => Token::Hash(len.unwrap_or(DEFAULT_HASH_LENGTH)),
                ("contenthash", len) => Token::ContentHash(len.unwrap_or(DEFAULT_HASH_LENGTH)),
                (other, _) => return Err(invalid(format!("unknown placeholder [{other}]"))),
            };

            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(token);
            rest = &after[close + 1..];
        }

        if rest.contains(']') {
            return Err(invalid("unmatched ']'".to_string()));
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }

    /// Parse one of the crate's own default templates. A default that fails
    /// to parse degrades to a literal so construction stays infallible.
    pub(crate) fn builtin(source: &'static str) -> Self {
        Self::parse(source).unwrap_or_else(|_| Self {
            source: source.to_string(),
            tokens: vec![Token::Literal(source.to_string())],
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn uses_content_hash(&self) -> bool {
        self.tokens.iter().any(|t| matches!(t, Token::ContentHash(_)))
    }

    pub fn render(&self, values: &TemplateValues<'_>) -> String {
        let mut out = String::with_capacity(self.source.len() + values.name.len());
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Name => out.push_str(values.name),
                Token::Hash(len) => out.push_str(truncate(values.hash, *len)),
                Token::ContentHash(len) => out.push_str(truncate(values.content_hash, *len)),
            }
        }
        out
    }
}

fn truncate(digest: &str, len: usize) -> &str {
    // Digests are ASCII hex, so byte slicing is safe.
    &digest[..len.min(digest.len())]
}

impl FromStr for FilenameTemplate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for FilenameTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for FilenameTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::parse(&source).map_err(serde::de::Error::custom)
    }
}
