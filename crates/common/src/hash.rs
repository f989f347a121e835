//! Hash computation utilities.
//!
//! Fingerprints identify cached query results. They are XXH3-128 digests of
//! a sequence of string fields, rendered as fixed-length lowercase hex.

use xxhash_rust::xxh3::Xxh3;

/// Length of a rendered fingerprint token in characters.
pub const FINGERPRINT_LEN: usize = 32;

/// Compute XXH128 hash of a byte slice.
///
/// # Arguments
/// * `data` - Bytes to hash
///
/// # Returns
/// 32-character lowercase hex string (128 bits).
pub fn hash_bytes(data: &[u8]) -> String {
    let hash: u128 = xxhash_rust::xxh3::xxh3_128(data);
    format!("{:032x}", hash)
}

/// Fingerprint an ordered sequence of string fields.
///
/// Every field is length-prefixed before hashing, so `["ab", "c"]` and
/// `["a", "bc"]` produce different fingerprints.
///
/// # Arguments
/// * `parts` - Fields to hash, in order
///
/// # Returns
/// A `FINGERPRINT_LEN`-character lowercase hex token.
pub fn fingerprint_parts(parts: &[&str]) -> String {
    let mut hasher: Xxh3Hasher = Xxh3Hasher::new();
    for part in parts {
        hasher.update_field(part);
    }
    hasher.finish_hex()
}

/// Streaming hasher for incremental XXH128 hashing.
pub struct Xxh3Hasher {
    inner: Xxh3,
}

impl Xxh3Hasher {
    /// Create a new streaming hasher.
    pub fn new() -> Self {
        Self { inner: Xxh3::new() }
    }

    /// Update the hasher with additional raw bytes.
    ///
    /// # Arguments
    /// * `data` - Bytes to add to the hash computation
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Update the hasher with one length-prefixed string field.
    ///
    /// # Arguments
    /// * `field` - Field to add to the hash computation
    pub fn update_field(&mut self, field: &str) {
        self.inner.update(&(field.len() as u64).to_le_bytes());
        self.inner.update(field.as_bytes());
    }

    /// Finalize and return the hash as u128.
    pub fn finish(&self) -> u128 {
        self.inner.digest128()
    }

    /// Finalize and return the hash as 32-char hex string.
    pub fn finish_hex(&self) -> String {
        format!("{:032x}", self.finish())
    }
}

impl Default for Xxh3Hasher {
    fn default() -> Self {
        Self::new()
    }
}
