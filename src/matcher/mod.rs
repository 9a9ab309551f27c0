//! Tiered text location.
//!
//! A needle is located inside a document by an ordered list of strategies:
//!
//! 1. [`ExactTier`] - literal substring search
//! 2. [`NormalizedTier`] - substring search over whitespace-canonical text
//! 3. [`FuzzyTier`] - sliding-window similarity over canonical text
//!
//! The first tier that finds a unique span wins. A tier that finds the needle
//! more than once reports [`MatchOutcome::Ambiguous`] and the search stops
//! there: falling through could pick a different, equally valid occurrence.

mod fuzzy;
mod normalize;

pub use fuzzy::{FuzzyTier, DEFAULT_FUZZY_MARGIN, DEFAULT_FUZZY_THRESHOLD, DEFAULT_LENGTH_TOLERANCE};
pub use normalize::Normalized;

use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::fmt;

/// Byte range `[start, end)` inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text covered by this span, if it lies on character boundaries of `text`.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Normalized,
    Fuzzy,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchTier::Exact => "exact",
            MatchTier::Normalized => "normalized",
            MatchTier::Fuzzy => "fuzzy",
        };
        f.write_str(name)
    }
}

/// A located span plus how it was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedSpan {
    /// Span in original document coordinates
    pub span: Span,
    pub tier: MatchTier,
    /// Similarity in [0, 1]; 1.0 for the exact and normalized tiers
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[must_use = "MatchOutcome should be checked for Found/NotFound/Ambiguous"]
pub enum MatchOutcome {
    Found(MatchedSpan),
    NotFound,
    Ambiguous { tier: MatchTier, count: usize },
}

impl MatchOutcome {
    pub fn found(self) -> Option<MatchedSpan> {
        match self {
            MatchOutcome::Found(m) => Some(m),
            _ => None,
        }
    }
}

/// Text under search, with its canonical form computed on first use.
pub struct Haystack<'a> {
    raw: &'a str,
    normalized: OnceCell<Normalized>,
}

impl<'a> Haystack<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            normalized: OnceCell::new(),
        }
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn normalized(&self) -> &Normalized {
        self.normalized.get_or_init(|| Normalized::new(self.raw))
    }
}

/// One matching tier.
pub trait MatchStrategy: Send + Sync {
    fn tier(&self) -> MatchTier;

    /// Locate `needle` in `document`. Spans are in raw document coordinates.
    fn locate(&self, document: &Haystack<'_>, needle: &Haystack<'_>) -> MatchOutcome;
}

/// Literal substring search.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactTier;

impl MatchStrategy for ExactTier {
    fn tier(&self) -> MatchTier {
        MatchTier::Exact
    }

    fn locate(&self, document: &Haystack<'_>, needle: &Haystack<'_>) -> MatchOutcome {
        let needle = needle.raw();
        if needle.is_empty() {
            return MatchOutcome::NotFound;
        }
        let hits = find_occurrences(document.raw(), needle);
        match hits.as_slice() {
            [] => MatchOutcome::NotFound,
            [start] => MatchOutcome::Found(MatchedSpan {
                span: Span::new(*start, start + needle.len()),
                tier: MatchTier::Exact,
                score: 1.0,
            }),
            many => MatchOutcome::Ambiguous {
                tier: MatchTier::Exact,
                count: many.len(),
            },
        }
    }
}

/// Substring search after whitespace canonicalization of both sides.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedTier;

impl MatchStrategy for NormalizedTier {
    fn tier(&self) -> MatchTier {
        MatchTier::Normalized
    }

    fn locate(&self, document: &Haystack<'_>, needle: &Haystack<'_>) -> MatchOutcome {
        let needle = &needle.normalized().text;
        if needle.is_empty() {
            return MatchOutcome::NotFound;
        }
        let doc = document.normalized();
        let hits = find_occurrences(&doc.text, needle);
        match hits.as_slice() {
            [] => MatchOutcome::NotFound,
            [start] => match doc.to_source(*start, start + needle.len()) {
                Some(span) => MatchOutcome::Found(MatchedSpan {
                    span,
                    tier: MatchTier::Normalized,
                    score: 1.0,
                }),
                None => MatchOutcome::NotFound,
            },
            many => MatchOutcome::Ambiguous {
                tier: MatchTier::Normalized,
                count: many.len(),
            },
        }
    }
}

/// Byte offsets of every occurrence of `needle`, overlapping ones included.
pub fn find_occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    let mut found = Vec::new();
    if needle.is_empty() {
        return found;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let at = from + pos;
        found.push(at);
        let step = haystack[at..].chars().next().map_or(1, char::len_utf8);
        from = at + step;
        if from >= haystack.len() {
            break;
        }
    }
    found
}

/// Tunables for the fuzzy tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum similarity for the best fuzzy window
    pub fuzzy_threshold: f64,
    /// Minimum lead of the best window over the best non-overlapping rival
    pub fuzzy_margin: f64,
    /// Allowed window length deviation, as a fraction of the needle length
    pub length_tolerance: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            fuzzy_margin: DEFAULT_FUZZY_MARGIN,
            length_tolerance: DEFAULT_LENGTH_TOLERANCE,
        }
    }
}

/// Ordered list of strategies; first unique hit wins, ambiguity stops the search.
pub struct Matcher {
    tiers: Vec<Box<dyn MatchStrategy>>,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self::with_tiers(vec![
            Box::new(ExactTier),
            Box::new(NormalizedTier),
            Box::new(FuzzyTier::new(config)),
        ])
    }

    pub fn with_tiers(tiers: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { tiers }
    }

    pub fn locate(&self, document: &str, needle: &str) -> MatchOutcome {
        let document = Haystack::new(document);
        let needle = Haystack::new(needle);

        for tier in &self.tiers {
            match tier.locate(&document, &needle) {
                MatchOutcome::NotFound => continue,
                outcome => return outcome,
            }
        }
        MatchOutcome::NotFound
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}
