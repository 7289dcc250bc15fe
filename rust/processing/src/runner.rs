// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background runs.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bimclash_core::RawElement;
use bimclash_rules::SuccessHistory;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};

use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, RunControl};
use crate::progress::CancelToken;
use crate::report::RunReport;

/// Handle to a run executing on its own thread.
pub struct RunHandle {
    rx: Receiver<Result<RunReport>>,
    cancel: CancelToken,
}

impl RunHandle {
    /// Ask the run to stop at the next unit boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the run to finish.
    pub fn join(self) -> Result<RunReport> {
        self.rx.recv().map_err(|_| Error::Disconnected)?
    }

    /// Waits up to `timeout`; the run keeps going if it has not finished.
    pub fn join_timeout(&self, timeout: Duration) -> Result<RunReport> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => Error::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            },
            RecvTimeoutError::Disconnected => Error::Disconnected,
        })?
    }
}

impl Pipeline {
    /// Run the pipeline on a named background thread.
    pub fn spawn(
        self: &Arc<Self>,
        elements: Vec<RawElement>,
        history: SuccessHistory,
        control: RunControl,
    ) -> Result<RunHandle> {
        let (tx, rx) = bounded(1);
        let cancel = control.cancel.clone();
        let pipeline = Arc::clone(self);

        thread::Builder::new()
            .name("bimclash-run".into())
            .spawn(move || {
                let result = pipeline.run(&elements, &history, &control);
                // The handle may have been dropped; nobody is waiting then.
                let _ = tx.send(result);
            })
            .map_err(|e| Error::Workers(e.to_string()))?;

        Ok(RunHandle { rx, cancel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_reports_disconnected_when_sender_dropped() {
        let (tx, rx) = bounded::<Result<RunReport>>(1);
        drop(tx);
        let handle = RunHandle {
            rx,
            cancel: CancelToken::new(),
        };
        assert!(matches!(handle.join(), Err(Error::Disconnected)));
    }

    #[test]
    fn join_timeout_reports_timeout_while_running() {
        let (_tx, rx) = bounded::<Result<RunReport>>(1);
        let handle = RunHandle {
            rx,
            cancel: CancelToken::new(),
        };
        let err = handle.join_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, Error::Timeout { duration_ms: 10 }));
    }
}
