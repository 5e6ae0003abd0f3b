//! Digest helpers for snapshot fingerprints and allocation keys.
//!
//! Fingerprint digests are part of the on-disk snapshot contract:
//! `source_doc_md5` and `page_md5` are MD5 over raw bytes, `text_sha1`
//! is SHA-1 over normalized text, and serial-bucket keys are truncated
//! SHA-256. Changing any of these invalidates every persisted snapshot.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// MD5 of a byte slice, lowercase hex.
pub fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-1 of normalized text, lowercase hex.
pub fn text_sha1(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serial-bucket key: first 16 hex chars of SHA-256 over
/// `source_md5|muni|period`, with explicit placeholders for absent parts.
pub fn bucket_key(source_md5: &str, muni_name: Option<&str>, period: Option<&str>) -> String {
    let input = format!(
        "{}|{}|{}",
        source_md5,
        muni_name.unwrap_or("NO_MUNI"),
        period.unwrap_or("NO_PERIOD")
    );
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}
