//! Content fingerprints for table snapshots.
//!
//! A fingerprint is the SHA-256 of every cell's canonical string, fed row by
//! row in snapshot order and column by column in row order. Nothing is
//! sorted: the same rows returned in a different order hash differently.
//! Cells are concatenated without separators.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::snapshot::TableSnapshot;

/// Length of a fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// Digest of a table snapshot's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the fingerprint of a snapshot.
pub fn fingerprint(snapshot: &TableSnapshot) -> Fingerprint {
    let mut hasher = Sha256::new();
    for row in snapshot.rows() {
        for value in row.values() {
            hasher.update(value.to_string().as_bytes());
        }
    }

    Fingerprint(hasher.finalize().into())
}
