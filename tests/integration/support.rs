use doc_patcher::{
    Batch, ChangeType, DocsGuard, JsonStore, Matcher, UpdateLifecycle, UpdateSuggestion,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A documentation tree plus a store directory beside it.
pub struct Workspace {
    _dir: TempDir,
    pub docs: PathBuf,
    pub store_dir: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        let store_dir = dir.path().join("store");
        Self {
            _dir: dir,
            docs,
            store_dir,
        }
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.docs.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.docs.join(relative)).unwrap()
    }

    pub fn lifecycle(&self) -> UpdateLifecycle {
        let store = Arc::new(JsonStore::open(&self.store_dir).unwrap());
        let guard = DocsGuard::new(&self.docs, Some(&self.store_dir)).unwrap();
        UpdateLifecycle::new(store, guard, Matcher::default()).unwrap()
    }
}

pub fn suggestion(file: &str, original: &str, suggested: &str) -> UpdateSuggestion {
    UpdateSuggestion {
        section_id: format!("{file}#0"),
        section_title: "Section".to_string(),
        file_path: file.to_string(),
        original_content: original.to_string(),
        suggested_content: suggested.to_string(),
        change_type: ChangeType::Modification,
        confidence_score: 0.8,
        reasoning: "keep docs current".to_string(),
    }
}

pub fn ids(batch: &Batch) -> Vec<String> {
    batch
        .suggestions
        .iter()
        .map(|s| s.suggestion_id.clone())
        .collect()
}
