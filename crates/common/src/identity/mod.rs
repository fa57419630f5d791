//! Deterministic identity for harvest candidates
//!
//! Two identifiers are derived per candidate:
//! - `fingerprint`: identifies a (subject, bibliographic source) pair and is
//!   the registry dedup key. Case and surrounding whitespace on either input
//!   must not change the result.
//! - `candidate_content_id`: identifies one harvestable variant of a source
//!   (the overall record, or one per associated data tag).
//!
//! Both recipes are frozen under [`crate::FINGERPRINT_SCHEME`]; changing the
//! hashed components or their order is a breaking migration.

use sha2::{Digest, Sha256};

/// SHA-256 fingerprint of a (subject, source) pair, hex-encoded.
pub fn fingerprint(subject_id: &str, source_code: &str) -> String {
    let key = format!(
        "{}|{}|{}",
        crate::FINGERPRINT_SCHEME,
        source_code.trim().to_lowercase(),
        subject_id.trim().to_lowercase(),
    );
    hex_digest(&key)
}

/// SHA-256 content id distinguishing variant candidates that share one
/// source code, hex-encoded.
pub fn candidate_content_id(
    source_code: &str,
    document_type: &str,
    best_url: Option<&str>,
    data_tags: &[String],
) -> String {
    let raw = format!(
        "{}|{}|{}|{}",
        source_code.trim(),
        document_type.trim().to_lowercase(),
        best_url.unwrap_or(""),
        data_tags.join(" "),
    );
    hex_digest(&raw)
}

fn hex_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
