//! Key template parsing.
//!
//! A template is literal text with `{name}` placeholders, e.g.
//! `ORDER#{created_at}#{order_id}`.

use super::{Segment, TemplateError};

/// Splits a template string into literal and placeholder segments.
pub(super) fn parse(pattern: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.char_indices();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (inner, c) in chars.by_ref() {
                    match c {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => {
                            return Err(TemplateError::UnbalancedBrace {
                                pattern: pattern.to_string(),
                                position: inner,
                            })
                        }
                        c => name.push(c),
                    }
                }
                if !closed {
                    return Err(TemplateError::UnbalancedBrace {
                        pattern: pattern.to_string(),
                        position,
                    });
                }
                if !is_valid_name(&name) {
                    return Err(TemplateError::InvalidPlaceholder {
                        pattern: pattern.to_string(),
                        name,
                    });
                }

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                } else if let Some(Segment::Placeholder(previous)) = segments.last() {
                    return Err(TemplateError::AdjacentPlaceholders {
                        pattern: pattern.to_string(),
                        first: previous.clone(),
                        second: name,
                    });
                }

                let duplicate = segments
                    .iter()
                    .any(|s| matches!(s, Segment::Placeholder(existing) if *existing == name));
                if duplicate {
                    return Err(TemplateError::DuplicatePlaceholder {
                        pattern: pattern.to_string(),
                        name,
                    });
                }

                segments.push(Segment::Placeholder(name));
            }
            '}' => {
                return Err(TemplateError::UnbalancedBrace {
                    pattern: pattern.to_string(),
                    position,
                })
            }
            c => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

/// Placeholder names are identifiers: `[A-Za-z_][A-Za-z0-9_]*`.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
