// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bimclash_core::ElementId;
use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building element tables and indices
#[derive(Error, Debug)]
pub enum Error {
    #[error("Duplicate element id: {0}")]
    DuplicateId(ElementId),

    #[error("Invalid index configuration: {0}")]
    InvalidConfig(String),
}
