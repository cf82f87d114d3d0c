//! Documents, per-extension loaders, and corpus discovery.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use walkdir::WalkDir;

use crate::types::KnowledgeError;

/// Hierarchy tags derived from a document's path relative to the knowledge
/// root. Levels beyond the path's depth carry the `"N/A"` filler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTags {
    pub level1: String,
    pub level2: String,
    pub level3: String,
}

impl PathTags {
    pub const NOT_APPLICABLE: &'static str = "N/A";
}

impl Default for PathTags {
    fn default() -> Self {
        Self {
            level1: Self::NOT_APPLICABLE.to_string(),
            level2: Self::NOT_APPLICABLE.to_string(),
            level3: Self::NOT_APPLICABLE.to_string(),
        }
    }
}

/// A loaded document: raw text plus provenance. Immutable once produced by a
/// loader, except for enrichment filling in [`PathTags`].
#[derive(Clone, Debug)]
pub struct Document {
    /// Path the document was loaded from.
    pub source: PathBuf,
    /// Full text content.
    pub content: String,
    /// Hierarchy tags; `None` until enrichment runs.
    pub tags: Option<PathTags>,
}

impl Document {
    pub fn new(source: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            tags: None,
        }
    }

    /// Source path as a string, the form stored in chunk metadata.
    pub fn source_str(&self) -> String {
        self.source.to_string_lossy().into_owned()
    }
}

/// Loads documents of particular file extensions.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Extensions (without the dot) this loader handles.
    fn extensions(&self) -> &'static [&'static str];

    async fn load(&self, path: &Path) -> Result<Document, KnowledgeError>;
}

/// Loader for plain-text corpora files (`.sql`, `.sh`, `.txt`).
pub struct PlainTextLoader;

#[async_trait]
impl DocumentLoader for PlainTextLoader {
    fn extensions(&self) -> &'static [&'static str] {
        &["sql", "sh", "txt"]
    }

    async fn load(&self, path: &Path) -> Result<Document, KnowledgeError> {
        let content = fs::read_to_string(path).await?;
        Ok(Document::new(path, content))
    }
}

/// Loader for Markdown files. Strips a leading YAML front-matter block so
/// headers don't pollute retrieval context.
pub struct MarkdownLoader;

#[async_trait]
impl DocumentLoader for MarkdownLoader {
    fn extensions(&self) -> &'static [&'static str] {
        &["md"]
    }

    async fn load(&self, path: &Path) -> Result<Document, KnowledgeError> {
        let content = fs::read_to_string(path).await?;
        Ok(Document::new(path, strip_front_matter(&content)))
    }
}

fn strip_front_matter(content: &str) -> String {
    if let Some(rest) = content.strip_prefix("---\n")
        && let Some(end) = rest.find("\n---\n")
    {
        return rest[end + 5..].to_string();
    }
    content.to_string()
}

/// Result of loading a corpus: documents plus the files that could not be
/// loaded, with the reason each was skipped.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub skipped: Vec<(PathBuf, String)>,
}

/// Walks the knowledge root and dispatches files to loaders by extension.
///
/// Individual file failures never abort the run; they are recorded in the
/// outcome and logged. Files with no matching loader are ignored.
pub struct CorpusLoader {
    root: PathBuf,
    loaders: Vec<Arc<dyn DocumentLoader>>,
}

impl CorpusLoader {
    /// Creates a loader over `root` with the default loader set
    /// (Markdown plus plain text).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loaders: vec![Arc::new(MarkdownLoader), Arc::new(PlainTextLoader)],
        }
    }

    /// Adds a loader; later additions win on extension conflicts.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loaders.insert(0, loader);
        self
    }

    fn loader_for(&self, path: &Path) -> Option<&Arc<dyn DocumentLoader>> {
        let ext = path.extension()?.to_str()?;
        self.loaders
            .iter()
            .find(|loader| loader.extensions().contains(&ext))
    }

    pub async fn load_all(&self) -> Result<LoadOutcome, KnowledgeError> {
        if !self.root.is_dir() {
            return Err(KnowledgeError::Config(format!(
                "knowledge root '{}' is not a directory",
                self.root.display()
            )));
        }

        let mut outcome = LoadOutcome::default();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                    outcome.skipped.push((path, err.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(loader) = self.loader_for(entry.path()) else {
                continue;
            };
            match loader.load(entry.path()).await {
                Ok(document) => outcome.documents.push(document),
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "skipping document");
                    outcome.skipped.push((entry.path().to_path_buf(), err.to_string()));
                }
            }
        }

        tracing::info!(
            loaded = outcome.documents.len(),
            skipped = outcome.skipped.len(),
            root = %self.root.display(),
            "corpus loaded"
        );
        Ok(outcome)
    }
}
