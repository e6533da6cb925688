// Chord-slot patterns such as `1-2-1-3`.
//
// A pattern is a list of 1-based indices into a committed pick-set,
// separated by single dashes. Slot i of the output uses pick
// `pattern[i % len] - 1`, so a short pattern cycles over a long sequence.
// Indices run from 1 to 255. Empty segments, zero, larger numbers, signs and
// non-digits make the whole pattern invalid.

use std::str::FromStr;
use thiserror::Error;

/// A validated slot pattern. Indices are stored 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid chord pattern '{0}'")]
pub struct InvalidPattern(pub String);

impl Pattern {
    /// Parse an optional pattern string. Blank input is "no pattern"; an
    /// invalid pattern is dropped with a warning.
    pub fn parse_lenient(s: Option<&str>) -> Option<Pattern> {
        let s = s?.trim();
        if s.is_empty() {
            return None;
        }
        match s.parse() {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                log::warn!("Ignoring {e}");
                None
            }
        }
    }

    /// Number of picks the pattern references (its largest index).
    pub fn pick_count(&self) -> usize {
        self.indices.iter().max().map_or(0, |&m| m + 1)
    }

    /// 0-based pick index for output slot `slot`.
    pub fn pick_for_slot(&self, slot: usize) -> usize {
        self.indices[slot % self.indices.len()]
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl FromStr for Pattern {
    type Err = InvalidPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPattern(s.to_string());
        let mut indices = Vec::new();
        for segment in s.trim().split('-') {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let n: u8 = segment.parse().map_err(|_| invalid())?;
            if n == 0 {
                return Err(invalid());
            }
            indices.push(n as usize - 1);
        }
        Ok(Pattern { indices })
    }
}
