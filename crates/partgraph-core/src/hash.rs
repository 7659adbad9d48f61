//! 64-bit hashing capability used to derive edge ids for edge indices.
//!
//! The pipeline only needs `same bytes -> same u64` and a negligible collision
//! rate, so the algorithm is injected through [`Hash64`]. The default
//! implementation folds a SHA-256 digest down to its first eight bytes.

use sha2::{Digest, Sha256};

/// A deterministic `bytes -> u64` hash.
pub trait Hash64: Send + Sync {
    fn hash64(&self, bytes: &[u8]) -> u64;
}

impl<F> Hash64 for F
where
    F: Fn(&[u8]) -> u64 + Send + Sync,
{
    fn hash64(&self, bytes: &[u8]) -> u64 {
        self(bytes)
    }
}

/// SHA-256 truncated to 64 bits (little-endian first 8 bytes of the digest).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hash64;

impl Hash64 for Sha256Hash64 {
    fn hash64(&self, bytes: &[u8]) -> u64 {
        let digest = Sha256::digest(bytes);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(head)
    }
}

/// Id of the edge `(src, dst, edge_type)`.
///
/// The triple is packed as `u64 src, u64 dst, i32 edge_type`, little-endian,
/// 20 bytes, before hashing.
pub fn edge_id_hash(hasher: &dyn Hash64, src: u64, dst: u64, edge_type: i32) -> u64 {
    let mut packed = [0u8; 20];
    packed[..8].copy_from_slice(&src.to_le_bytes());
    packed[8..16].copy_from_slice(&dst.to_le_bytes());
    packed[16..].copy_from_slice(&edge_type.to_le_bytes());
    hasher.hash64(&packed)
}
