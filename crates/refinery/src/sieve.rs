//! Segment sieve: anchor-keyword segmentation of raw model output.
//!
//! Long freeform responses that describe repeated entities ("Persona 1: ...",
//! "Persona 2: ...") are split into self-contained atoms, one per entity,
//! before each atom is refined independently. Splitting is pure local
//! computation: no I/O, and running it twice on the same input yields
//! identical atoms.

use regex::RegexBuilder;

use crate::error::{Error, Result};

// Bounds on compiled pattern size, so a pathological anchor keyword cannot
// exhaust memory during regex construction.
const REGEX_SIZE_LIMIT: usize = 1 << 20;
const REGEX_DFA_SIZE_LIMIT: usize = 1 << 21;

/// Splits raw text into ordered atoms at anchor-keyword boundaries.
///
/// A boundary is the anchor keyword, optionally followed by an ordinal number,
/// followed by a colon or period separator (`Persona 1:`, `페르소나2:`,
/// `Keyword.`). Text before the first boundary is preamble and is discarded;
/// fragments that trim to empty are discarded as well, so N anchor
/// occurrences yield exactly N atoms.
///
/// # Example
///
/// ```
/// use refinery::sieve::SegmentSieve;
///
/// let sieve = SegmentSieve::new("페르소나")?;
/// let atoms = sieve.split("페르소나1: Alice\n페르소나2: Bob");
/// assert_eq!(atoms, vec!["페르소나1: Alice", "페르소나2: Bob"]);
/// # Ok::<(), refinery::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SegmentSieve {
    boundary: regex::Regex,
}

impl SegmentSieve {
    /// Compile a sieve for the given anchor keyword.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank keyword and
    /// [`Error::Configuration`] if the boundary pattern fails to compile.
    pub fn new(anchor: &str) -> Result<Self> {
        if anchor.trim().is_empty() {
            return Err(Error::invalid_input("anchor keyword must not be blank"));
        }

        let pattern = format!(r"{}\s*\d*\s*[:.]", regex::escape(anchor));
        let boundary = RegexBuilder::new(&pattern)
            .size_limit(REGEX_SIZE_LIMIT)
            .dfa_size_limit(REGEX_DFA_SIZE_LIMIT)
            .build()
            .map_err(|e| {
                Error::configuration(format!("invalid anchor boundary pattern: {e}"))
            })?;

        Ok(SegmentSieve { boundary })
    }

    /// Split `text` into atoms, in input order.
    ///
    /// Returns an empty vector when the anchor pattern never occurs — a
    /// legitimate outcome the walker recovers with a whole-text fallback, not
    /// an error.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        let starts: Vec<usize> = self.boundary.find_iter(text).map(|m| m.start()).collect();
        if starts.is_empty() {
            return Vec::new();
        }

        let mut atoms = Vec::with_capacity(starts.len());
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            let fragment = text[start..end].trim();
            if !fragment.is_empty() {
                atoms.push(fragment.to_string());
            }
        }
        atoms
    }
}
