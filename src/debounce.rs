//! ==============================================================================
//! debounce.rs - debounced filter input
//! ==============================================================================
//!
//! purpose:
//!     the search box fires on every keystroke. filtering on every keystroke is
//!     wasted work, so raw values go through a debounce window first: a value
//!     is only emitted once the input has been quiet for `window`.
//!
//!         keystrokes:  c  co  co2 ................ t
//!         emitted:                 co2 (+500ms)      t (+500ms)
//!
//!     a subscription owns the timer task. dropping it (or calling
//!     unsubscribe) aborts the task, so nothing outlives the view.
//!
//! relationships:
//!     - used by: server.rs (one input + subscription per live session)
//!
//! ==============================================================================

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// raw filter text, written on every keystroke
pub struct FilterInput {
    tx: watch::Sender<String>,
    window: Duration,
}

impl FilterInput {
    pub fn new(window: Duration) -> Self {
        let (tx, _rx) = watch::channel(String::new());
        Self { tx, window }
    }

    /// push the current raw value of the input
    pub fn set(&self, value: impl Into<String>) {
        self.tx.send_replace(value.into());
    }

    /// number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// start a debounced stream of settled values.
    ///
    /// only changes after this call are seen, and a settled value equal to
    /// the previously settled one is not emitted again.
    pub fn subscribe(&self) -> FilterSubscription {
        let mut rx = self.tx.subscribe();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let window = self.window;

        // baseline is taken here, not on the task's first poll, so a set()
        // right after subscribe() still counts as a change
        let mut last = rx.borrow_and_update().clone();

        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                // wait until the input has been quiet for a full window
                let closed = loop {
                    tokio::select! {
                        res = rx.changed() => {
                            if res.is_err() {
                                break true;
                            }
                        }
                        _ = tokio::time::sleep(window) => break false,
                    }
                };

                let value = rx.borrow_and_update().clone();
                if value != last {
                    last = value.clone();
                    if out_tx.send(value).is_err() {
                        return;
                    }
                }
                if closed {
                    return;
                }
            }
        });

        FilterSubscription { rx: out_rx, task }
    }
}

/// settled filter values; the debounce task lives as long as this does
pub struct FilterSubscription {
    rx: mpsc::UnboundedReceiver<String>,
    task: JoinHandle<()>,
}

impl FilterSubscription {
    /// next settled value, `None` once the input is gone
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for FilterSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
