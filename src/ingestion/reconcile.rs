//! Diff-based reconciliation between desired chunks and the stored index.

use std::collections::{HashMap, HashSet};

use tracing::info;

use super::chunker::Chunk;
use crate::index::KnowledgeIndex;
use crate::types::KnowledgeError;

/// Ids to insert and ids to remove, computed as pure set differences.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexDiff {
    pub to_add: HashSet<String>,
    pub to_delete: HashSet<String>,
}

impl IndexDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty()
    }
}

/// Computes the diff between the desired id set and what the store holds.
///
/// An id present in both sets is untouched; identical corpora therefore
/// produce an empty diff no matter how often reconciliation runs.
pub fn diff_ids(desired: &HashSet<String>, existing: &HashSet<String>) -> IndexDiff {
    IndexDiff {
        to_add: desired.difference(existing).cloned().collect(),
        to_delete: existing.difference(desired).cloned().collect(),
    }
}

/// Counts from one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Chunks embedded and written.
    pub added: usize,
    /// Stored chunks removed because their content disappeared.
    pub deleted: usize,
    /// Chunks already present and left untouched.
    pub unchanged: usize,
    /// Per-id (id, reason) pairs for writes or deletes that failed while the
    /// rest of the batch went through.
    pub failed: Vec<(String, String)>,
}

/// Brings the index in line with the given chunks: deletes stale entries
/// first, then embeds and inserts new ones. Chunks sharing an id (identical
/// source and text) collapse into a single entry.
pub async fn reconcile(
    index: &KnowledgeIndex,
    chunks: Vec<Chunk>,
) -> Result<ReconcileReport, KnowledgeError> {
    let mut by_id: HashMap<String, Chunk> = HashMap::with_capacity(chunks.len());
    for chunk in chunks {
        by_id.entry(chunk.id.clone()).or_insert(chunk);
    }

    let desired: HashSet<String> = by_id.keys().cloned().collect();
    let existing = index.existing_ids().await?;
    let diff = diff_ids(&desired, &existing);
    let unchanged = desired.intersection(&existing).count();

    if diff.is_empty() {
        info!(unchanged, "index already up to date");
        return Ok(ReconcileReport {
            unchanged,
            ..Default::default()
        });
    }

    let mut report = ReconcileReport {
        unchanged,
        ..Default::default()
    };

    if !diff.to_delete.is_empty() {
        let stale: Vec<String> = diff.to_delete.into_iter().collect();
        let outcome = index.delete(&stale).await?;
        report.deleted = outcome.succeeded.len();
        report.failed.extend(outcome.failed);
    }

    if !diff.to_add.is_empty() {
        let entries: Vec<_> = diff
            .to_add
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(Chunk::into_entry)
            .collect();
        let outcome = index.upsert(entries).await?;
        report.added = outcome.succeeded.len();
        report.failed.extend(outcome.failed);
    }

    info!(
        added = report.added,
        deleted = report.deleted,
        unchanged = report.unchanged,
        failed = report.failed.len(),
        "reconciled index"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_sets_produce_empty_diff() {
        let diff = diff_ids(&ids(&["a", "b"]), &ids(&["a", "b"]));
        assert!(diff.is_empty());
    }

    #[test]
    fn new_and_stale_ids_are_partitioned() {
        let diff = diff_ids(&ids(&["a", "b", "c"]), &ids(&["b", "c", "d"]));
        assert_eq!(diff.to_add, ids(&["a"]));
        assert_eq!(diff.to_delete, ids(&["d"]));
    }

    #[test]
    fn empty_store_adds_everything() {
        let diff = diff_ids(&ids(&["a", "b"]), &HashSet::new());
        assert_eq!(diff.to_add, ids(&["a", "b"]));
        assert!(diff.to_delete.is_empty());
    }

    #[test]
    fn empty_corpus_deletes_everything() {
        let diff = diff_ids(&HashSet::new(), &ids(&["a", "b"]));
        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_delete, ids(&["a", "b"]));
    }
}
