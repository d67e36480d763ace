//! Tick Scheduler
//!
//! Explicit replacement for fire-and-forget interval timers: the run loop
//! owns its cadence, and shutdown is a watch-channel signal checked between
//! ticks. An in-flight tick always completes before the loop exits, so the
//! store is never left mid-mutation by a ctrl-c.

use std::time::Duration;

use tokio::sync::watch;

/// Hand this to whatever owns the ctrl-c handler
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Signal the run loop to stop after its current tick
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Waited on by the run loop between ticks
#[derive(Debug)]
pub struct Scheduler {
    rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new() -> (Self, ShutdownHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { rx }, ShutdownHandle { tx })
    }

    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep until the next tick is due or shutdown is signalled.
    /// Returns `true` to keep running, `false` to stop.
    ///
    /// A dropped [`ShutdownHandle`] counts as shutdown: nobody can signal a
    /// stop anymore, and looping on a closed channel would spin.
    pub async fn sleep(&mut self, interval: Duration) -> bool {
        if self.is_shutdown() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => true,
            changed = self.rx.changed() => changed.is_ok() && !self.is_shutdown(),
        }
    }
}
