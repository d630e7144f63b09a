//! Key templates.
//!
//! A [`KeyTemplate`] is compiled once from a declaration such as
//! `USER#{user_id}` and then used in both directions: rendering a key from
//! field values and matching a stored key back into field values.

mod error;
mod matcher;
mod parse;

use std::collections::BTreeMap;

pub use error::TemplateError;

/// Placeholder name to canonical string value.
pub type KeyValues = BTreeMap<String, String>;

/// One piece of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A compiled key template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    pattern: String,
    segments: Vec<Segment>,
}

/// Result of rendering a template with only some placeholders bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrefix {
    pub key: String,
    /// True when every placeholder was bound and `key` is the full key.
    pub complete: bool,
}

impl KeyTemplate {
    /// Compiles a template declaration.
    pub fn compile(pattern: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            pattern: pattern.to_string(),
            segments: parse::parse(pattern)?,
        })
    }

    /// The declaration this template was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders().any(|p| p == name)
    }

    /// Renders the full key.
    ///
    /// Fails with [`TemplateError::MissingField`] naming the first
    /// placeholder without a value.
    pub fn render(&self, values: &KeyValues) -> Result<String, TemplateError> {
        let mut key = String::with_capacity(self.pattern.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => key.push_str(literal),
                Segment::Placeholder(name) => match values.get(name) {
                    Some(value) => key.push_str(value),
                    None => {
                        return Err(TemplateError::MissingField {
                            field: name.clone(),
                        })
                    }
                },
            }
        }
        Ok(key)
    }

    /// Renders up to the first unbound placeholder.
    ///
    /// The literal immediately before the unbound placeholder is kept, so
    /// `ORDER#{date}#{id}` with only `date` bound renders `ORDER#2024-01-01#`.
    pub fn render_prefix(&self, values: &KeyValues) -> RenderedPrefix {
        let mut key = String::with_capacity(self.pattern.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => key.push_str(literal),
                Segment::Placeholder(name) => match values.get(name) {
                    Some(value) => key.push_str(value),
                    None => {
                        return RenderedPrefix {
                            key,
                            complete: false,
                        }
                    }
                },
            }
        }
        RenderedPrefix {
            key,
            complete: true,
        }
    }

    /// Matches a stored key, binding every placeholder to its raw text.
    pub fn matches(&self, key: &str) -> Option<KeyValues> {
        matcher::match_segments(&self.segments, key)
    }

    /// Characters of the separator literals (those after a placeholder).
    ///
    /// Values containing them may not survive a render/match round trip.
    /// Leading literals are anchored and never searched for.
    pub fn delimiters(&self) -> Vec<char> {
        let mut seen_placeholder = false;
        let mut chars = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Placeholder(_) => seen_placeholder = true,
                Segment::Literal(literal) if seen_placeholder => chars.extend(literal.chars()),
                Segment::Literal(_) => {}
            }
        }
        chars.sort_unstable();
        chars.dedup();
        chars
    }
}

impl std::fmt::Display for KeyTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}
