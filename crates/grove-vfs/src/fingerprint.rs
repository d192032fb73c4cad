//! Content fingerprints.
//!
//! A fingerprint is the lowercase hex SHA-256 of a file's content and serves
//! as its stable cross-location identity for deduplication and media lookup.
//!
//! Appended files use an incremental scheme instead of re-hashing the whole
//! content: the new fingerprint is the SHA-256 of the two previous
//! fingerprints' raw (hex-decoded) bytes concatenated. This is a pinned wire
//! contract shared with other appliance components; see the golden tests.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, VfsError};

/// Fingerprint of zero-length content.
pub const EMPTY_FINGERPRINT: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parses and normalizes a caller-supplied hex digest.
    pub fn parse(value: &str) -> Result<Self> {
        if value.len() != 64 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(VfsError::InvalidArgument(format!(
                "not a sha256 hex digest: {value:?}"
            )));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fingerprint of an in-memory byte slice.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Fingerprint of a file's full content, streamed in 64 KiB chunks.
    ///
    /// Blocking; callers on the async surface run this via `spawn_blocking`.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Combines this fingerprint with the fingerprint of an appended
    /// segment: `sha256(hexdecode(self) || hexdecode(segment))`.
    ///
    /// The inputs are the raw 32-byte digests, not the hex text.
    pub fn combine(&self, segment: &Fingerprint) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(hex::decode(&self.0).expect("fingerprint is valid hex"));
        hasher.update(hex::decode(&segment.0).expect("fingerprint is valid hex"));
        Fingerprint(hex::encode(hasher.finalize()))
    }

    /// True for the fingerprint of zero-length content.
    pub fn is_empty_content(&self) -> bool {
        self.0 == EMPTY_FINGERPRINT
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const WORLD: &str = "486ea46224d1bb4fb680f34f7c9ad96a8f24ec88be73ea8e5a6c65260e9cb8a7";

    #[test]
    fn of_bytes_known_values() {
        assert_eq!(Fingerprint::of_bytes(b"hello").as_str(), HELLO);
        assert_eq!(Fingerprint::of_bytes(b"world").as_str(), WORLD);
        assert_eq!(Fingerprint::of_bytes(b"").as_str(), EMPTY_FINGERPRINT);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Fingerprint::parse("abc").is_err());
        assert!(Fingerprint::parse(&"g".repeat(64)).is_err());
        // Uppercase input is accepted but normalized
        let upper = HELLO.to_ascii_uppercase();
        assert_eq!(Fingerprint::parse(&upper).unwrap().as_str(), HELLO);
    }

    #[test]
    fn combine_golden_value() {
        // Pinned contract: the combine input is the hex-DECODED digest
        // bytes, 64 bytes total, not the 128-byte hex text.
        let a = Fingerprint::parse(HELLO).unwrap();
        let b = Fingerprint::parse(WORLD).unwrap();
        assert_eq!(
            a.combine(&b).as_str(),
            "7305db9b2abccd706c256db3d97e5ff48d677cfe4d3a5904afb7da0e3950e1e2"
        );
    }

    #[test]
    fn combine_is_order_sensitive() {
        let a = Fingerprint::parse(HELLO).unwrap();
        let b = Fingerprint::parse(WORLD).unwrap();
        assert_ne!(a.combine(&b), b.combine(&a));
    }

    #[test]
    fn of_file_matches_of_bytes() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello").unwrap();
        tmp.flush().unwrap();
        assert_eq!(Fingerprint::of_file(tmp.path()).unwrap().as_str(), HELLO);
    }
}
