//! Cache key builders.

use sha2::{Digest, Sha256};

use genqueue_entity::job::GenerationParams;

/// Prefix applied to generation result keys.
const PREFIX: &str = "result";

/// Deterministic fingerprint of a generation request.
///
/// Two requests share a fingerprint when they target the same model, come
/// from the same user and have the same normalized parameters.
pub fn fingerprint(model_id: &str, user_id: &str, params: &GenerationParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(user_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(params.normalized().as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Cache key for a stored generation result.
pub fn generation_result(fingerprint: &str) -> String {
    format!("{PREFIX}:{fingerprint}")
}
