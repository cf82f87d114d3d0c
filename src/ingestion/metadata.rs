//! Path-derived metadata enrichment.

use std::path::Path;

use super::document::{Document, PathTags};
use crate::types::KnowledgeError;

/// Fills a document's [`PathTags`] from its path relative to the knowledge
/// root.
///
/// The first three components of the relative path become `level1..level3`;
/// shallower paths pad with `"N/A"`, and a file sitting directly at the root
/// uses its own filename as `level1`. Re-running recomputes identical values,
/// overwriting safely.
///
/// Fails with [`KnowledgeError::OutsideRoot`] when the document's source does
/// not live under `knowledge_root`; callers skip such documents and continue.
pub fn enrich(mut doc: Document, knowledge_root: &Path) -> Result<Document, KnowledgeError> {
    let relative = doc
        .source
        .strip_prefix(knowledge_root)
        .map_err(|_| KnowledgeError::OutsideRoot {
            path: doc.source.clone(),
            root: knowledge_root.to_path_buf(),
        })?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let na = || PathTags::NOT_APPLICABLE.to_string();
    let tags = match parts.as_slice() {
        [p0, p1, p2, ..] => PathTags {
            level1: p0.clone(),
            level2: p1.clone(),
            level3: p2.clone(),
        },
        [p0, p1] => PathTags {
            level1: p0.clone(),
            level2: p1.clone(),
            level3: na(),
        },
        _ => PathTags {
            level1: relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(na),
            level2: na(),
            level3: na(),
        },
    };

    doc.tags = Some(tags);
    Ok(doc)
}
