//! Content-defined chunking via a rolling cyclic-polynomial (buzhash) hash.
//!
//! Chunk boundaries fall where the rolling fingerprint over a trailing
//! 64-byte window matches a fixed mask, bounded to `[MIN_CHUNK, MAX_CHUNK]`
//! with an average chunk size near `TARGET_CHUNK`. Each chunk is hashed
//! with BLAKE3; the whole file's signature is the BLAKE3 of the
//! concatenation of its chunk hashes, so two files sharing long runs of
//! identical bytes share chunk hashes without sharing a file-level hash.

use crate::dispatch::hash;
use crate::Digest;

/// Trailing-window size the rolling hash is computed over.
pub const WINDOW: usize = 64;
/// Minimum chunk size.
pub const MIN_CHUNK: usize = 2 * 1024;
/// Maximum chunk size; a chunk is cut here even with no boundary match.
pub const MAX_CHUNK: usize = 64 * 1024;
/// Target average chunk size.
pub const TARGET_CHUNK: usize = 16 * 1024;

// log2(TARGET_CHUNK) == 14: a boundary is declared when the low 14 bits of
// the rolling hash are all zero, which happens with probability 1/2^14 per
// byte — giving an expected run length of 2^14 = TARGET_CHUNK bytes.
const BOUNDARY_MASK: u64 = (1u64 << 14) - 1;

/// Deterministic per-byte table for the cyclic-polynomial rolling hash,
/// generated once from a fixed seed via splitmix64 — fixed, not random per
/// process, so chunk boundaries are reproducible across runs and machines.
fn gear_table() -> &'static [u64; 256] {
    static TABLE: std::sync::OnceLock<[u64; 256]> = std::sync::OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u64; 256];
        let mut seed: u64 = 0x9E3779B97F4A7C15;
        let mut i = 0;
        while i < 256 {
            // splitmix64
            seed = seed.wrapping_add(0x9E3779B97F4A7C15);
            let mut z = seed;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^= z >> 31;
            table[i] = z;
            i += 1;
        }
        table
    })
}

/// One content-defined chunk of a larger file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset of the chunk's start within the source data.
    pub offset: usize,
    /// Chunk length in bytes.
    pub len: usize,
    /// BLAKE3 hash of the chunk's bytes.
    pub hash: Digest,
}

/// Split `data` into content-defined chunks and return them alongside the
/// file-level signature (BLAKE3 of the concatenated chunk hashes).
#[must_use]
pub fn chunk(data: &[u8]) -> (Vec<Chunk>, Digest) {
    let table = gear_table();
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut rolling: u64 = 0;

    let mut i = 0usize;
    while i < data.len() {
        let window_len = i + 1 - start;
        rolling = rolling.rotate_left(1) ^ table[data[i] as usize];

        let at_boundary = window_len >= WINDOW && (rolling & BOUNDARY_MASK) == 0;
        let reached_max = window_len >= MAX_CHUNK;
        let is_last_byte = i + 1 == data.len();

        if window_len >= MIN_CHUNK && (at_boundary || reached_max || is_last_byte) {
            let end = i + 1;
            let bytes = &data[start..end];
            chunks.push(Chunk {
                offset: start,
                len: bytes.len(),
                hash: hash(bytes),
            });
            start = end;
            rolling = 0;
        }
        i += 1;
    }

    if start < data.len() {
        let bytes = &data[start..];
        chunks.push(Chunk {
            offset: start,
            len: bytes.len(),
            hash: hash(bytes),
        });
    }

    let mut concat = Vec::with_capacity(chunks.len() * 32);
    for c in &chunks {
        concat.extend_from_slice(&c.hash);
    }
    (chunks, hash(&concat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_no_chunks() {
        let (chunks, _) = chunk(&[]);
        assert!(chunks.is_empty());
    }

    #[test]
    fn chunks_cover_the_input_contiguously() {
        let data = vec![0u8; 200 * 1024];
        let (chunks, _) = chunk(&data);
        assert!(!chunks.is_empty());
        let mut expected_offset = 0;
        for c in &chunks {
            assert_eq!(c.offset, expected_offset);
            assert!(c.len <= MAX_CHUNK);
            expected_offset += c.len;
        }
        assert_eq!(expected_offset, data.len());
    }

    #[test]
    fn identical_prefixes_produce_identical_leading_chunk_hashes() {
        let mut a = vec![1u8; 100 * 1024];
        let mut b = a.clone();
        a.extend_from_slice(b"tail-a");
        b.extend_from_slice(b"tail-b-longer");
        let (chunks_a, _) = chunk(&a);
        let (chunks_b, _) = chunk(&b);
        assert_eq!(chunks_a[0].hash, chunks_b[0].hash);
    }

    #[test]
    fn signature_is_deterministic() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(500);
        let (_, sig1) = chunk(&data);
        let (_, sig2) = chunk(&data);
        assert_eq!(sig1, sig2);
    }
}
