//! Identity and session index normalization.
//!
//! Storage never sees a raw NameID: it is reduced to a SHA-1 hex digest so the
//! directory can correlate sessions without holding the identifier itself.
//! Session indexes are kept as-is unless they exceed the column width.

use crate::models::NameId;
use rand::{rngs::OsRng, RngCore};
use sha1::{Digest, Sha1};

/// Maximum stored length of a session index.
pub const MAX_SESSION_INDEX_LEN: usize = 50;

/// Length of an identity hash (hex-encoded SHA-1).
pub const IDENTITY_HASH_LEN: usize = 40;

/// Random bytes in a generated opaque id.
const GENERATED_ID_BYTES: usize = 21;

/// Hash a NameID into its fixed-width storage key.
///
/// Each field is written length-prefixed (`-` for absent fields) so no two
/// distinct identifiers serialize to the same bytes.
#[must_use]
pub fn hash_identity(name_id: &NameId) -> String {
    let mut hasher = Sha1::new();
    for field in [
        Some(name_id.value.as_str()),
        name_id.format.as_deref(),
        name_id.name_qualifier.as_deref(),
        name_id.sp_name_qualifier.as_deref(),
        name_id.sp_provided_id.as_deref(),
    ] {
        match field {
            Some(value) => {
                hasher.update(value.len().to_string().as_bytes());
                hasher.update(b":");
                hasher.update(value.as_bytes());
                hasher.update(b";");
            }
            None => hasher.update(b"-;"),
        }
    }
    hex::encode(hasher.finalize())
}

/// Normalize a session index for storage or lookup.
///
/// An absent index is replaced by a freshly generated one, so the session is
/// still tracked but can never be matched by a request naming an index.
#[must_use]
pub fn normalize_session_index(raw: Option<&str>) -> String {
    match raw {
        Some(index) => normalize_known_index(index),
        None => generate_id(),
    }
}

/// Normalize an index supplied by a peer. Deterministic.
#[must_use]
pub fn normalize_known_index(index: &str) -> String {
    if index.len() > MAX_SESSION_INDEX_LEN {
        hex::encode(Sha1::digest(index.as_bytes()))
    } else {
        index.to_string()
    }
}

/// Generate an opaque random identifier (`_` followed by 42 hex characters).
#[must_use]
pub fn generate_id() -> String {
    let mut bytes = [0u8; GENERATED_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("_{}", hex::encode(bytes))
}
