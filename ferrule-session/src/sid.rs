//! Session id generation.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Produces session ids.
pub type SidGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// New random session id: 64 lowercase hex chars.
///
/// The SHA-256 digest of two independent v4 UUIDs.
pub fn generate_sid() -> String {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    hex::encode(hasher.finalize())
}
