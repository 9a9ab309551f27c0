//! Whitespace canonicalization with a byte map back to the source text.

use crate::matcher::Span;

/// Canonical form of a text: line endings unified, each line trimmed, and
/// every whitespace run collapsed to a single ASCII space.
///
/// Every byte of `text` remembers the source range of the character it came
/// from, so spans found in canonical coordinates can be projected back.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub text: String,
    starts: Vec<usize>,
    ends: Vec<usize>,
}

impl Normalized {
    pub fn new(raw: &str) -> Self {
        let mut out = Normalized {
            text: String::with_capacity(raw.len()),
            starts: Vec::with_capacity(raw.len()),
            ends: Vec::with_capacity(raw.len()),
        };
        let mut pending_ws: Option<(usize, usize)> = None;

        for (idx, ch) in raw.char_indices() {
            let end = idx + ch.len_utf8();
            if ch.is_whitespace() {
                match &mut pending_ws {
                    Some((_, ws_end)) => *ws_end = end,
                    None => pending_ws = Some((idx, end)),
                }
                continue;
            }
            if let Some((ws_start, ws_end)) = pending_ws.take() {
                // Leading whitespace is dropped, interior runs become one space.
                if !out.text.is_empty() {
                    out.push(' ', ws_start, ws_end);
                }
            }
            out.push(ch, idx, end);
        }

        out
    }

    fn push(&mut self, ch: char, start: usize, end: usize) {
        self.text.push(ch);
        for _ in 0..ch.len_utf8() {
            self.starts.push(start);
            self.ends.push(end);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Project a canonical byte range `[start, end)` onto the source text.
    ///
    /// Returns `None` for empty or out-of-range spans.
    pub fn to_source(&self, start: usize, end: usize) -> Option<Span> {
        if start >= end || end > self.text.len() {
            return None;
        }
        Some(Span::new(self.starts[start], self.ends[end - 1]))
    }
}
