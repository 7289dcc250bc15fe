// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for rule table and formula loading
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading rules; never during a run
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid formula '{formula}': {reason}")]
    InvalidFormula { formula: String, reason: String },

    #[error("Duplicate rule template id: {0}")]
    DuplicateTemplate(String),

    #[error("Template '{id}': {source}")]
    Template {
        id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] bimclash_core::Error),

    #[error("Rule table JSON: {0}")]
    Json(#[from] serde_json::Error),
}
