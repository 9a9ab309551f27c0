//! Documentation sections and a keyword retriever over them.

use crate::upstream::{Retriever, UpstreamError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_64;

/// Read-only snapshot of one retrieval hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Path relative to the documentation root, `/`-separated
    pub file_path: String,
    pub section_type: String,
    #[serde(default)]
    pub parent_section: Option<String>,
}

/// Every Markdown section under a documentation root.
#[derive(Debug, Clone, Default)]
pub struct SectionIndex {
    sections: Vec<DocumentSection>,
}

impl SectionIndex {
    /// Walk `root` for `.md`/`.markdown` files and split them on ATX headings.
    pub fn load(root: &Path) -> Result<Self, UpstreamError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| UpstreamError::Retrieval(e.to_string()))?;
            let is_markdown = matches!(
                entry.path().extension().and_then(|s| s.to_str()),
                Some("md") | Some("markdown")
            );
            if entry.file_type().is_file() && is_markdown {
                files.push(entry.into_path());
            }
        }
        files.sort();

        let mut sections = Vec::new();
        for path in files {
            let text = fs::read_to_string(&path).map_err(|e| {
                UpstreamError::Retrieval(format!("cannot read {}: {e}", path.display()))
            })?;
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            sections.extend(split_markdown(&relative, &text));
        }

        Ok(Self { sections })
    }

    pub fn from_sections(sections: Vec<DocumentSection>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[DocumentSection] {
        &self.sections
    }

    pub fn get(&self, id: &str) -> Option<&DocumentSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Sections sharing key terms with section `id`, most similar first.
    ///
    /// Similarity is the Jaccard overlap of key terms (longer than three
    /// characters, stop words dropped); only scores above
    /// [`RELATED_THRESHOLD`] count. Returns `None` for an unknown id.
    pub fn related(&self, id: &str, max_results: usize) -> Option<Vec<(f64, &DocumentSection)>> {
        let target = self.get(id)?;
        let target_terms = key_terms(target);

        let mut scored: Vec<(f64, &DocumentSection)> = self
            .sections
            .iter()
            .filter(|s| s.id != target.id)
            .map(|s| (jaccard(&target_terms, &key_terms(s)), s))
            .filter(|(score, _)| *score > RELATED_THRESHOLD)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(max_results);
        Some(scored)
    }

    /// Case-insensitive substring search over titles and bodies.
    pub fn find_by_keyword(&self, keyword: &str) -> Vec<&DocumentSection> {
        let keyword = keyword.to_lowercase();
        self.sections
            .iter()
            .filter(|s| {
                s.title.to_lowercase().contains(&keyword)
                    || s.content.to_lowercase().contains(&keyword)
            })
            .collect()
    }
}

fn section_id(relative: &str, ordinal: usize) -> String {
    format!("{:016x}", xxh3_64(format!("{relative}#{ordinal}").as_bytes()))
}

fn heading_level(line: &str) -> Option<(usize, &str)> {
    let level = line.bytes().take_while(|&b| b == b'#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    Some((level, rest.trim().trim_end_matches('#').trim_end()))
}

fn split_markdown(relative: &str, text: &str) -> Vec<DocumentSection> {
    struct Open {
        level: usize,
        title: String,
        body: Vec<String>,
    }

    let stem = Path::new(relative)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| relative.to_string());

    let mut finished: Vec<(usize, String, String)> = Vec::new();
    let mut current = Open {
        level: 0,
        title: stem,
        body: Vec::new(),
    };
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }
        let heading = if in_fence { None } else { heading_level(line) };
        match heading {
            Some((level, title)) => {
                let done = std::mem::replace(
                    &mut current,
                    Open {
                        level,
                        title: title.to_string(),
                        body: Vec::new(),
                    },
                );
                finished.push((done.level, done.title, done.body.join("\n")));
            }
            None => current.body.push(line.to_string()),
        }
    }
    finished.push((current.level, current.title, current.body.join("\n")));

    // Attach parents: nearest earlier section with a lower heading level.
    let mut sections = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();
    for (ordinal, (level, title, body)) in finished.into_iter().enumerate() {
        let content = body.trim().to_string();
        if level == 0 && content.is_empty() {
            continue;
        }
        let id = section_id(relative, ordinal);
        while stack.last().is_some_and(|(l, _)| *l >= level && level > 0) {
            stack.pop();
        }
        let parent_section = if level > 0 {
            stack.last().map(|(_, id)| id.clone())
        } else {
            None
        };
        if level > 0 {
            stack.push((level, id.clone()));
        }
        sections.push(DocumentSection {
            id,
            title,
            content,
            file_path: relative.to_string(),
            section_type: if level == 0 {
                "preamble".to_string()
            } else {
                format!("h{level}")
            },
            parent_section,
        });
    }
    sections
}

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Minimum key-term overlap for [`SectionIndex::related`].
pub const RELATED_THRESHOLD: f64 = 0.3;

fn key_terms(section: &DocumentSection) -> HashSet<String> {
    tokenize(&format!("{} {}", section.title, section.content))
        .into_iter()
        .filter(|t| t.chars().count() > 3 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / a.union(b).count() as f64
}

/// Most frequent non-stop-word terms of a query, most frequent first.
pub fn query_terms(query: &str, top_n: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for token in tokenize(query) {
        if token.len() <= 2 || STOP_WORDS.contains(&token.as_str()) {
            continue;
        }
        match counts.iter_mut().find(|(t, _)| *t == token) {
            Some((_, n)) => *n += 1,
            None => counts.push((token, 1)),
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(top_n).map(|(t, _)| t).collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Term-overlap retriever: title hit 3, body hit 1, full phrase 5.
#[derive(Debug, Clone)]
pub struct KeywordRetriever {
    index: SectionIndex,
    max_results: usize,
}

impl KeywordRetriever {
    pub fn new(index: SectionIndex, max_results: usize) -> Self {
        Self { index, max_results }
    }

    fn score(terms: &[String], section: &DocumentSection) -> f64 {
        let title: HashSet<String> = tokenize(&section.title).into_iter().collect();
        let body: HashSet<String> = tokenize(&section.content).into_iter().collect();
        let mut score = 0.0;
        for term in terms {
            if title.contains(term) {
                score += 3.0;
            } else if body.contains(term) {
                score += 1.0;
            }
        }
        let phrase = terms.join(" ");
        let haystack = format!("{} {}", section.title, section.content).to_lowercase();
        if !phrase.is_empty() && haystack.contains(&phrase) {
            score += 5.0;
        }
        score
    }
}

impl Retriever for KeywordRetriever {
    fn search(&self, query: &str) -> Result<Vec<DocumentSection>, UpstreamError> {
        let terms = query_terms(query, 5);
        let mut scored: Vec<(f64, &DocumentSection)> = self
            .index
            .sections()
            .iter()
            .map(|s| (Self::score(&terms, s), s))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(self.max_results)
            .map(|(_, s)| s.clone())
            .collect())
    }
}
