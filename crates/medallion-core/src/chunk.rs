//! Fixed-width text chunker.
//!
//! Splits a silver record's content into [`Chunk`]s of at most `width`
//! characters with no overlap. The final chunk may be shorter. Widths are
//! measured in Unicode scalar values, so multi-byte text never splits inside
//! a character.
//!
//! Chunk identifiers follow a [`ChunkIdPolicy`]:
//!
//! - [`ChunkIdPolicy::Random`] assigns a fresh UUIDv4 per chunk. Re-running
//!   the gold stage over unchanged input produces a disjoint set of IDs and
//!   therefore duplicate index entries.
//! - [`ChunkIdPolicy::Deterministic`] derives the ID from the SHA-256 of
//!   `(source_file, offset)`, so a re-run targets the same IDs and an
//!   upserting index stays deduplicated.
//!
//! # Example
//!
//! ```rust
//! use medallion_core::chunk::{chunk_text, ChunkIdPolicy};
//!
//! let text = "x".repeat(1000);
//! let chunks = chunk_text("raw/a.txt", &text, 512, ChunkIdPolicy::Random);
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].text.chars().count(), 488);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Default slice width in characters.
pub const DEFAULT_CHUNK_WIDTH: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkIdPolicy {
    #[default]
    Random,
    Deterministic,
}

/// Split `text` into contiguous, non-overlapping slices of `width` chars.
///
/// Empty text yields no chunks. A `width` of zero is treated as one.
pub fn chunk_text(source_file: &str, text: &str, width: usize, policy: ChunkIdPolicy) -> Vec<Chunk> {
    let width = width.max(1);
    let mut chunks = Vec::new();
    let mut start_byte = 0;
    let mut start_char = 0;
    let mut chars_in_slice = 0;

    for (byte_idx, _) in text.char_indices() {
        if chars_in_slice == width {
            chunks.push(make_chunk(
                source_file,
                chunks.len() as i64,
                start_char,
                &text[start_byte..byte_idx],
                policy,
            ));
            start_byte = byte_idx;
            start_char += chars_in_slice;
            chars_in_slice = 0;
        }
        chars_in_slice += 1;
    }

    if chars_in_slice > 0 {
        chunks.push(make_chunk(
            source_file,
            chunks.len() as i64,
            start_char,
            &text[start_byte..],
            policy,
        ));
    }

    chunks
}

fn make_chunk(
    source_file: &str,
    index: i64,
    offset: usize,
    text: &str,
    policy: ChunkIdPolicy,
) -> Chunk {
    let id = match policy {
        ChunkIdPolicy::Random => Uuid::new_v4(),
        ChunkIdPolicy::Deterministic => stable_id(source_file, offset),
    };

    Chunk {
        id: id.to_string(),
        source_file: source_file.to_string(),
        chunk_index: index,
        offset,
        text: text.to_string(),
    }
}

fn stable_id(source_file: &str, offset: usize) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(source_file.as_bytes());
    hasher.update([0u8]);
    hasher.update((offset as u64).to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_thousand_chars_two_chunks() {
        let text = "a".repeat(1000);
        let chunks = chunk_text("raw/a.txt", &text, 512, ChunkIdPolicy::Random);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.len(), 512);
        assert_eq!(chunks[1].text.len(), 488);
        assert_eq!(chunks[1].offset, 512);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(chunk_text("raw/a.txt", "", 512, ChunkIdPolicy::Random).is_empty());
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let text = "b".repeat(1024);
        let chunks = chunk_text("raw/a.txt", &text, 512, ChunkIdPolicy::Random);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.text.len() == 512));
    }

    #[test]
    fn test_indices_contiguous_and_text_reassembles() {
        let text = (0..300)
            .map(|i| format!("word{} ", i))
            .collect::<String>();
        let chunks = chunk_text("raw/a.txt", &text, 100, ChunkIdPolicy::Random);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.source_file, "raw/a.txt");
        }
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_multibyte_chars_counted_as_chars() {
        let text = "é".repeat(5);
        let chunks = chunk_text("raw/a.txt", &text, 2, ChunkIdPolicy::Random);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "éé");
        assert_eq!(chunks[2].text, "é");
        assert_eq!(chunks[2].offset, 4);
    }

    #[test]
    fn test_random_ids_fresh_per_run() {
        let text = "c".repeat(2000);
        let first: HashSet<_> = chunk_text("raw/a.txt", &text, 512, ChunkIdPolicy::Random)
            .into_iter()
            .map(|c| c.id)
            .collect();
        let second: HashSet<_> = chunk_text("raw/a.txt", &text, 512, ChunkIdPolicy::Random)
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(first.len(), 4);
        assert!(first.is_disjoint(&second));
    }

    #[test]
    fn test_deterministic_ids_stable_and_distinct() {
        let text = "d".repeat(2000);
        let a = chunk_text("raw/a.txt", &text, 512, ChunkIdPolicy::Deterministic);
        let b = chunk_text("raw/a.txt", &text, 512, ChunkIdPolicy::Deterministic);
        let other = chunk_text("raw/b.txt", &text, 512, ChunkIdPolicy::Deterministic);
        for ((x, y), z) in a.iter().zip(&b).zip(&other) {
            assert_eq!(x.id, y.id);
            assert_ne!(x.id, z.id);
        }
        let unique: HashSet<_> = a.iter().map(|c| &c.id).collect();
        assert_eq!(unique.len(), a.len());
    }
}
