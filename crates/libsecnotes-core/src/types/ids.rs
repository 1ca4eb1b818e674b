use rand::Rng;
use sha2::{Digest, Sha256};

/// Length in bytes of a random identifier (threads, comments, trails, crumbs)
pub const ID_BYTES: usize = 16;

/// Generate a random 128-bit identifier as lowercase hex
pub fn generate_id() -> String {
    let bytes: [u8; ID_BYTES] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Deterministic id for a stored comment that predates comment ids.
///
/// Records written before ids existed only carry timestamp, author and body,
/// so the same legacy comment read from two stores gets the same id.
pub fn legacy_comment_id(timestamp_ms: u64, author: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"secnotes:legacy-comment:");
    hasher.update(timestamp_ms.to_be_bytes());
    hasher.update((author.len() as u64).to_be_bytes());
    hasher.update(author.as_bytes());
    hasher.update(body.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..ID_BYTES])
}
