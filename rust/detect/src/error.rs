// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for detection setup
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors, reported before a run starts
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid clearance tolerance for {pair}: {value}")]
    InvalidTolerance { pair: String, value: f64 },

    #[error("Invalid duplicate epsilon: {0}")]
    InvalidEpsilon(f64),

    #[error("Invalid severity model: {0}")]
    InvalidSeverityModel(String),
}
