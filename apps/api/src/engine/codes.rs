//! Artifact codes and verify hashes.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::engine::Status;

const CODE_PREFIX: &str = "ci-";
const VERIFY_HASH_LEN: usize = 16;

/// Generates a shareable code of the form `ci-XX-XXXXX` (lowercase hex).
///
/// Four OS-random bytes give eight hex digits; only the first seven are used,
/// so the code space is 16^7. See DESIGN.md for why the eighth is dropped.
pub fn generate_artifact_code() -> String {
    let mut bytes = [0u8; 4];
    OsRng.fill_bytes(&mut bytes);
    let hex = hex::encode(bytes);
    format!("{CODE_PREFIX}{}-{}", &hex[0..2], &hex[2..7])
}

/// True for strings shaped exactly like `ci-[0-9a-f]{2}-[0-9a-f]{5}`, i.e. codes this
/// module generates. Seal requests are not held to this shape.
#[cfg(test)]
pub fn is_valid_artifact_code(code: &str) -> bool {
    let Some(rest) = code.strip_prefix(CODE_PREFIX) else {
        return false;
    };
    match rest.split_once('-') {
        Some((first, second)) => {
            first.len() == 2 && second.len() == 5 && is_lower_hex(first) && is_lower_hex(second)
        }
        None => false,
    }
}

/// First 16 hex chars of `sha256("<code>-<minute>-<status>")`.
pub fn generate_verify_hash(artifact_code: &str, minute: i64, status: Status) -> String {
    let digest = Sha256::digest(format!("{artifact_code}-{minute}-{status}").as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(VERIFY_HASH_LEN);
    hash
}

pub fn is_valid_verify_hash(hash: &str) -> bool {
    hash.len() == VERIFY_HASH_LEN && is_lower_hex(hash)
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
