//! Recursive character chunking with stable, content-addressed chunk ids.

use serde_json::json;
use tracing::debug;

use super::document::{Document, PathTags};
use super::identity::chunk_id;
use crate::index::IndexEntry;
use crate::types::KnowledgeError;

/// Separator ladder tried in order before falling back to fixed-width
/// character windows.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// One chunk of a source document, carrying the document's path tags and a
/// deterministic id derived from `(source, text)`.
#[derive(Clone, Debug)]
pub struct Chunk {
    pub id: String,
    pub source: String,
    pub text: String,
    pub tags: PathTags,
}

impl Chunk {
    /// Converts the chunk into the entry shape the vector index stores.
    pub fn into_entry(self) -> IndexEntry {
        IndexEntry {
            id: self.id,
            source: self.source,
            content: self.text,
            metadata: json!({
                "level1": self.tags.level1,
                "level2": self.tags.level2,
                "level3": self.tags.level3,
            }),
        }
    }
}

/// Splits documents into overlapping chunks of at most `chunk_size`
/// characters.
#[derive(Clone, Copy, Debug)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, KnowledgeError> {
        if chunk_size == 0 {
            return Err(KnowledgeError::Config(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(KnowledgeError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Chunks every document, copying its path tags into each chunk verbatim.
    ///
    /// A document no longer than `chunk_size` yields exactly one chunk with
    /// unmodified content. Documents with no visible content yield nothing.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            let source = doc.source_str();
            let tags = doc.tags.clone().unwrap_or_default();
            let pieces = self.split_text(&doc.content);
            debug!(source = %source, pieces = pieces.len(), "chunked document");
            for text in pieces {
                chunks.push(Chunk {
                    id: chunk_id(&source, &text),
                    source: source.clone(),
                    text,
                    tags: tags.clone(),
                });
            }
        }
        chunks
    }

    /// Splits one text into pieces of at most `chunk_size` characters.
    /// Whitespace-only text yields no pieces; the same rule applies to every
    /// merged piece, so blank runs inside a document never become chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if text.chars().count() <= self.chunk_size {
            return vec![text.to_string()];
        }
        let fragments = self.split_recursive(text, 0);
        self.merge_fragments(fragments)
    }

    /// Breaks text on the separator ladder, recursing into fragments that are
    /// still oversized, until only character windows remain.
    fn split_recursive(&self, text: &str, level: usize) -> Vec<String> {
        if text.chars().count() <= self.chunk_size {
            return vec![text.to_string()];
        }
        let Some(sep) = SEPARATORS.get(level) else {
            return self.char_windows(text);
        };
        let mut out = Vec::new();
        for part in split_keeping_separator(text, sep) {
            if part.chars().count() <= self.chunk_size {
                out.push(part);
            } else {
                out.extend(self.split_recursive(&part, level + 1));
            }
        }
        out
    }

    /// Fixed-width fallback for text with no usable separators. Windows step
    /// by `chunk_size - chunk_overlap` so consecutive windows share the
    /// configured overlap.
    fn char_windows(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut out = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            out.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        out
    }

    /// Greedily packs fragments into chunks of at most `chunk_size`
    /// characters, carrying up to `chunk_overlap` trailing characters of each
    /// chunk into the next.
    fn merge_fragments(&self, fragments: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_len = 0usize;

        for fragment in fragments {
            let frag_len = fragment.chars().count();
            if current_len + frag_len > self.chunk_size && !current.is_empty() {
                let assembled = current.concat();
                if !assembled.trim().is_empty() {
                    chunks.push(assembled);
                }
                // Keep a trailing span of fragments as overlap for the next
                // chunk, bounded by chunk_overlap.
                while current_len > self.chunk_overlap
                    || (!current.is_empty() && current_len + frag_len > self.chunk_size)
                {
                    let dropped = current.remove(0);
                    current_len -= dropped.chars().count();
                }
            }
            current.push(fragment);
            current_len += frag_len;
        }
        if !current.is_empty() {
            let tail = current.concat();
            if !tail.trim().is_empty() {
                chunks.push(tail);
            }
        }
        chunks
    }
}

/// Splits on `sep`, keeping the separator attached to the preceding piece so
/// rejoining pieces reproduces the original text.
fn split_keeping_separator(text: &str, sep: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(sep) {
        let end = pos + sep.len();
        out.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(size, overlap).unwrap()
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 20).is_ok());
    }

    #[test]
    fn short_document_is_one_unmodified_chunk() {
        let text = "short paragraph.\n\nanother one.";
        let pieces = chunker(1000, 200).split_text(text);
        assert_eq!(pieces, vec![text.to_string()]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(chunker(1000, 200).split_text("").is_empty());
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        let c = chunker(100, 0);
        assert!(c.split_text("   \n\n \t ").is_empty());
        assert!(c.split_text(&" ".repeat(250)).is_empty());
    }

    #[test]
    fn blank_runs_never_become_chunks() {
        let text = format!(
            "{}\n\n{}\n\n{}",
            "a".repeat(60),
            " ".repeat(150),
            "b".repeat(60)
        );
        let pieces = chunker(100, 0).split_text(&text);
        assert!(pieces.iter().all(|p| !p.trim().is_empty()));
        assert!(pieces.iter().any(|p| p.contains('a')));
        assert!(pieces.iter().any(|p| p.contains('b')));
    }

    #[test]
    fn all_pieces_respect_the_size_bound() {
        let text = "word ".repeat(400);
        let pieces = chunker(100, 20).split_text(&text);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(piece.chars().count() <= 100, "oversized: {}", piece.len());
        }
    }

    #[test]
    fn paragraph_boundaries_are_preferred() {
        let text = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
        let pieces = chunker(100, 0).split_text(&text);
        assert_eq!(pieces.len(), 2);
        assert!(pieces[0].starts_with('a'));
        assert!(pieces[1].starts_with('b'));
    }

    #[test]
    fn unbroken_text_falls_back_to_windows_with_overlap() {
        let text = "x".repeat(250);
        let pieces = chunker(100, 20).split_text(&text);
        assert!(pieces.len() >= 2);
        for pair in pieces.windows(2) {
            let prev_tail: String = pair[0].chars().rev().take(20).collect();
            let next_head: String = pair[1].chars().take(20).collect();
            let prev_tail: String = prev_tail.chars().rev().collect();
            assert_eq!(prev_tail, next_head);
        }
    }

    #[test]
    fn chunks_carry_document_tags_and_stable_ids() {
        let mut doc = Document::new(PathBuf::from("/kb/docs/a/b.md"), "hello world");
        doc.tags = Some(PathTags {
            level1: "docs".into(),
            level2: "a".into(),
            level3: "b.md".into(),
        });
        let chunks = chunker(1000, 200).split_documents(std::slice::from_ref(&doc));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].tags.level1, "docs");
        assert_eq!(chunks[0].id, chunk_id("/kb/docs/a/b.md", "hello world"));

        let again = chunker(1000, 200).split_documents(&[doc]);
        assert_eq!(chunks[0].id, again[0].id);
    }

    #[test]
    fn entry_metadata_carries_levels() {
        let chunk = Chunk {
            id: "abc".into(),
            source: "/kb/a.md".into(),
            text: "text".into(),
            tags: PathTags {
                level1: "a.md".into(),
                level2: "N/A".into(),
                level3: "N/A".into(),
            },
        };
        let entry = chunk.into_entry();
        assert_eq!(entry.metadata["level1"], "a.md");
        assert_eq!(entry.metadata["level2"], "N/A");
    }
}
