// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Content digests used for identifiers and cache keys.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the given parts, separated by a unit separator.
pub fn digest_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}

/// Hex-encoded SHA-256 of raw bytes.
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Short identifier: prefix plus the first 16 hex digits of the digest.
pub fn short_id<'a>(prefix: &str, parts: impl IntoIterator<Item = &'a str>) -> String {
    let digest = digest_parts(parts);
    format!("{prefix}-{}", &digest[..16])
}
