//! SHA-512/256 hashing for address checksums and transaction ids.

use sha2::{Digest, Sha512_256};

/// Compute a SHA-512/256 digest of arbitrary data.
pub fn sha512_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn sha512_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
