//! Sliding-window similarity search for drifted text.
//!
//! Windows start and end on token boundaries of the canonical document and
//! span the needle's length plus or minus a tolerance. Each window is scored
//! with the normalized Levenshtein ratio against the canonical needle.

use crate::matcher::{Haystack, MatchOutcome, MatchStrategy, MatchTier, MatchedSpan, MatcherConfig, Span};
use std::collections::HashMap;

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;
pub const DEFAULT_FUZZY_MARGIN: f64 = 0.05;
pub const DEFAULT_LENGTH_TOLERANCE: f64 = 0.2;

/// Float slack for threshold and margin comparisons.
const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
pub struct FuzzyTier {
    config: MatcherConfig,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    /// Canonical byte range
    window: Span,
}

impl FuzzyTier {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    fn best_windows(&self, doc: &str, needle: &str) -> Vec<Candidate> {
        let needle_len = needle.chars().count();
        let tolerance = ((needle_len as f64 * self.config.length_tolerance).ceil() as usize).max(1);
        let min_len = needle_len.saturating_sub(tolerance).max(1);
        let max_len = needle_len + tolerance;

        // Char index -> byte offset, with a trailing entry for the end.
        let mut offsets: Vec<usize> = doc.char_indices().map(|(i, _)| i).collect();
        offsets.push(doc.len());
        let chars: Vec<char> = doc.chars().collect();

        let token_starts: Vec<usize> = (0..chars.len())
            .filter(|&i| chars[i] != ' ' && (i == 0 || chars[i - 1] == ' '))
            .collect();
        let token_ends: Vec<usize> = (1..=chars.len())
            .filter(|&i| chars[i - 1] != ' ' && (i == chars.len() || chars[i] == ' '))
            .collect();

        let needle_bag = char_bag(needle.chars());
        // Windows that cannot reach this score cannot be the winner nor a
        // rival close enough to block it.
        let floor = self.config.fuzzy_threshold - self.config.fuzzy_margin;

        let mut candidates = Vec::new();
        for &start in &token_starts {
            let first_end = token_ends.partition_point(|&e| e < start + min_len);
            for &end in &token_ends[first_end..] {
                let len = end - start;
                if len > max_len {
                    break;
                }
                let longest = len.max(needle_len) as f64;
                let window = &doc[offsets[start]..offsets[end]];

                let bag_bound = 1.0 - bag_distance(&needle_bag, window) as f64 / longest;
                if bag_bound + SCORE_EPSILON < floor {
                    continue;
                }

                let score = strsim::normalized_levenshtein(window, needle);
                candidates.push(Candidate {
                    score,
                    window: Span::new(offsets[start], offsets[end]),
                });
            }
        }
        candidates
    }
}

impl MatchStrategy for FuzzyTier {
    fn tier(&self) -> MatchTier {
        MatchTier::Fuzzy
    }

    fn locate(&self, document: &Haystack<'_>, needle: &Haystack<'_>) -> MatchOutcome {
        let needle = &needle.normalized().text;
        if needle.is_empty() {
            return MatchOutcome::NotFound;
        }
        let doc = document.normalized();
        let candidates = self.best_windows(&doc.text, needle);

        let Some(best) = candidates
            .iter()
            .copied()
            .reduce(|best, c| if c.score > best.score { c } else { best })
        else {
            return MatchOutcome::NotFound;
        };

        if best.score + SCORE_EPSILON < self.config.fuzzy_threshold {
            return MatchOutcome::NotFound;
        }

        // Shifted copies of the winning window always score close to it; only
        // a window elsewhere in the document counts as a rival.
        let rival = candidates
            .iter()
            .filter(|c| !c.window.overlaps(&best.window))
            .map(|c| c.score)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));
        if let Some(rival) = rival {
            if best.score - rival + SCORE_EPSILON < self.config.fuzzy_margin {
                return MatchOutcome::NotFound;
            }
        }

        match doc.to_source(best.window.start, best.window.end) {
            Some(span) => MatchOutcome::Found(MatchedSpan {
                span,
                tier: MatchTier::Fuzzy,
                score: best.score,
            }),
            None => MatchOutcome::NotFound,
        }
    }
}

fn char_bag(chars: impl Iterator<Item = char>) -> HashMap<char, isize> {
    let mut bag = HashMap::new();
    for ch in chars {
        *bag.entry(ch).or_insert(0) += 1;
    }
    bag
}

/// Multiset distance; a lower bound on the Levenshtein distance.
fn bag_distance(needle_bag: &HashMap<char, isize>, window: &str) -> usize {
    let mut diff = needle_bag.clone();
    for ch in window.chars() {
        *diff.entry(ch).or_insert(0) -= 1;
    }
    let (missing, extra) = diff.values().fold((0usize, 0usize), |(m, e), &v| {
        if v > 0 {
            (m + v as usize, e)
        } else {
            (m, e + (-v) as usize)
        }
    });
    missing.max(extra)
}
