use super::entry::ManifestEntry;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Calculates the SHA-256 hash of a sorted entry set.
///
/// Each entry contributes `group key, NUL, path, NUL` so that no two distinct
/// sets share an input stream.
pub(crate) fn fingerprint_entries(entries: BTreeSet<&ManifestEntry>) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(entry.group.key().as_bytes());
        hasher.update([0u8]);
        hasher.update(entry.path.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
