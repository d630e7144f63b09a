//! Reverse matching of stored keys against a compiled template.
//!
//! Literal segments are anchored at their position. A placeholder binds the
//! longest run of characters that still lets the remaining segments match,
//! backtracking to shorter runs when they do not. Failed (segment, offset)
//! states are remembered, so a key is matched in polynomial time whatever
//! its content.

use std::collections::HashSet;

use super::{KeyValues, Segment};

/// Matches `key` against `segments`, returning the placeholder bindings.
pub(super) fn match_segments(segments: &[Segment], key: &str) -> Option<KeyValues> {
    if let Some(Segment::Literal(last)) = segments.last() {
        if !key.ends_with(last.as_str()) {
            return None;
        }
    }

    let mut matcher = Matcher {
        segments,
        key,
        failed: HashSet::new(),
        bound: KeyValues::new(),
    };
    if matcher.match_from(0, 0) {
        Some(matcher.bound)
    } else {
        None
    }
}

struct Matcher<'a> {
    segments: &'a [Segment],
    key: &'a str,
    /// (segment index, byte offset) pairs known not to match.
    failed: HashSet<(usize, usize)>,
    bound: KeyValues,
}

impl Matcher<'_> {
    fn match_from(&mut self, segment: usize, offset: usize) -> bool {
        if self.failed.contains(&(segment, offset)) {
            return false;
        }
        let matched = self.step(segment, offset);
        if !matched {
            self.failed.insert((segment, offset));
        }
        matched
    }

    fn step(&mut self, segment: usize, offset: usize) -> bool {
        let segments = self.segments;
        let remaining = &self.key[offset..];

        match segments.get(segment) {
            None => remaining.is_empty(),
            Some(Segment::Literal(literal)) => {
                remaining.starts_with(literal.as_str())
                    && self.match_from(segment + 1, offset + literal.len())
            }
            Some(Segment::Placeholder(name)) => match segments.get(segment + 1) {
                None => {
                    self.bound.insert(name.clone(), remaining.to_string());
                    true
                }
                Some(Segment::Literal(next)) => {
                    for at in candidate_positions(remaining, next) {
                        if self.match_from(segment + 1, offset + at) {
                            self.bound.insert(name.clone(), remaining[..at].to_string());
                            return true;
                        }
                    }
                    false
                }
                // Compilation rejects adjacent placeholders.
                Some(Segment::Placeholder(_)) => false,
            },
        }
    }
}

/// Byte offsets where `literal` occurs in `haystack`, rightmost first.
fn candidate_positions<'a>(haystack: &'a str, literal: &'a str) -> impl Iterator<Item = usize> + 'a {
    let last = haystack.len().saturating_sub(literal.len());
    (0..=last).rev().filter(move |&at| {
        haystack.len() >= literal.len()
            && haystack.is_char_boundary(at)
            && haystack[at..].starts_with(literal)
    })
}
