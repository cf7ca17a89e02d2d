//! Module file checksums.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Computes the SHA-256 digest of the given data and returns it as a hex string.
pub fn sha256_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of a file's contents, as a hex string. Hosts compare it to notice
/// that a module was rebuilt.
pub fn file_checksum(path: &Path) -> Result<String> {
    let data = std::fs::read(path)?;
    Ok(sha256_digest(&data))
}
