// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cooperative run control shared by the pipeline stages.

/// Polled by long-running stages once per processing unit (element, pair,
/// conflict). Implementations must be cheap and thread-safe: stages call
/// them from rayon workers.
///
/// Stages also charge the estimated size of what they retain before keeping
/// it, so a memory ceiling holds while a stage is still running.
pub trait Checkpoint: Sync {
    /// `false` asks the stage to stop at the next unit boundary.
    fn proceed(&self) -> bool;

    /// Announce how many units the current stage will process.
    fn begin(&self, units: usize) {
        let _ = units;
    }

    /// Record `units` completed processing units.
    fn advance(&self, units: usize) {
        let _ = units;
    }

    /// Account `bytes` of retained results. `false` means the stage must not
    /// keep them and should stop.
    fn charge(&self, bytes: usize) -> bool {
        let _ = bytes;
        true
    }
}

/// Checkpoint that never stops and ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unbounded;

impl Checkpoint for Unbounded {
    #[inline]
    fn proceed(&self) -> bool {
        true
    }
}
