//! Await iteration results from async code.
//!
//! The adapters report through callbacks. [`completion`] produces a callback
//! of the right shape together with a [`Completion`] that resolves once the
//! callback is called, so async callers can `await` while the event loop
//! runs in the same task.

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::error::{Fault, LoopError, LoopResult};

/// Receiving half of a completion callback.
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<(Option<Fault>, T)>,
}

/// Create a completion callback for adapters that produce a result.
pub fn completion<T>() -> (impl FnOnce(Option<Fault>, T) + Send + 'static, Completion<T>)
where
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let callback = move |fault: Option<Fault>, value: T| {
        // Receiver may be gone if the caller stopped waiting
        let _ = tx.send((fault, value));
    };
    (callback, Completion { rx })
}

/// Create a completion callback for `iterate` and `for_each`.
pub fn unit_completion() -> (impl FnOnce(Option<Fault>) + Send + 'static, Completion<()>) {
    let (callback, completion) = completion::<()>();
    (move |fault: Option<Fault>| callback(fault, ()), completion)
}

impl<T> Completion<T> {
    /// Wait for the result.
    ///
    /// A fault becomes [`LoopError::Iteration`]; a callback dropped without
    /// being called becomes [`LoopError::Cancelled`].
    pub async fn wait(self) -> LoopResult<T> {
        match self.rx.await {
            Ok(delivered) => into_result(delivered),
            Err(_) => Err(LoopError::Cancelled),
        }
    }

    /// Wait for the fault and the (possibly partial) result.
    pub async fn wait_partial(self) -> LoopResult<(Option<Fault>, T)> {
        self.rx.await.map_err(|_| LoopError::Cancelled)
    }

    /// Take the result without waiting, if it has been delivered.
    pub fn try_take(&mut self) -> Option<LoopResult<T>> {
        match self.rx.try_recv() {
            Ok(delivered) => Some(into_result(delivered)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(LoopError::Cancelled)),
        }
    }
}

fn into_result<T>((fault, value): (Option<Fault>, T)) -> LoopResult<T> {
    match fault {
        Some(fault) => Err(LoopError::Iteration(fault)),
        None => Ok(value),
    }
}
