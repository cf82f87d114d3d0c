//! Content-addressed chunk identity.

use sha2::{Digest, Sha256};

/// Derives the stable id for a chunk from its source path and text.
///
/// The id is a SHA-256 digest over the length-prefixed source bytes followed
/// by the text bytes. The length prefix makes the encoding unambiguous:
/// `("ab", "c")` and `("a", "bc")` hash different byte streams, so shifting
/// content across the source/text boundary always changes the id.
///
/// Same `(source, text)` always yields the same id; any change to either
/// field changes it.
pub fn chunk_id(source: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update((source.len() as u64).to_le_bytes());
    hasher.update(source.as_bytes());
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_id() {
        assert_eq!(chunk_id("docs/a.md", "hello"), chunk_id("docs/a.md", "hello"));
    }

    #[test]
    fn any_field_change_changes_id() {
        let base = chunk_id("docs/a.md", "hello");
        assert_ne!(base, chunk_id("docs/b.md", "hello"));
        assert_ne!(base, chunk_id("docs/a.md", "hello!"));
    }

    #[test]
    fn boundary_shift_does_not_collide() {
        // Without a delimiter these two would hash identical bytes.
        assert_ne!(chunk_id("ab", "c"), chunk_id("a", "bc"));
        assert_ne!(chunk_id("", "abc"), chunk_id("abc", ""));
    }

    #[test]
    fn id_is_fixed_length_hex() {
        let id = chunk_id("src", "text");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
