// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::state::RunState;

/// Result type for pipeline setup and run handles
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors.
///
/// Resource limits and cancellation are not errors: they end a run with a
/// `Failed` or `Cancelled` status in the report.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Geometry(#[from] bimclash_geometry::Error),

    #[error(transparent)]
    Detect(#[from] bimclash_detect::Error),

    #[error(transparent)]
    Rules(#[from] bimclash_rules::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid run state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("Failed to start worker threads: {0}")]
    Workers(String),

    #[error("Run did not finish within {duration_ms} ms")]
    Timeout { duration_ms: u64 },

    #[error("Run thread exited without a report")]
    Disconnected,
}
