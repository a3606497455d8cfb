//! Cooperative cancellation for pipeline runs.
//!
//! A [`CancelHandle`] flips a `watch` channel; every [`Cancellation`] clone
//! observes it. Each external call is raced against the token and the step
//! deadline in [`guarded`].

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::PipelineError;
use crate::types::Step;

/// Create a linked handle/token pair.
#[must_use]
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

/// Trigger side. Dropping it without calling [`CancelHandle::cancel`] leaves
/// tokens un-cancelled forever.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    /// A token that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        cancellation().1
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pends forever if the handle
    /// was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Run `fut` unless `cancel` fires or `timeout` elapses first.
///
/// The inner output is returned untouched; only cancellation and the
/// deadline become [`PipelineError`]s here.
pub(crate) async fn guarded<F>(
    step: Step,
    timeout: Duration,
    cancel: &Cancellation,
    fut: F,
) -> Result<F::Output, PipelineError>
where
    F: Future,
{
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled { step });
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(PipelineError::Cancelled { step }),
        result = tokio::time::timeout(timeout, fut) => result.map_err(|_| PipelineError::TimedOut {
            step,
            after_secs: timeout.as_secs(),
        }),
    }
}
