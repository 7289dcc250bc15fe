// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the shared data model.

use crate::conflict::{ConflictId, ConflictStatus};

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by core record operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A conflict lifecycle transition that the status machine forbids.
    #[error("conflict {id}: cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: ConflictId,
        from: ConflictStatus,
        to: ConflictStatus,
    },

    /// A rule template record failed validation.
    #[error("invalid rule template '{id}': {reason}")]
    InvalidTemplate { id: String, reason: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
