//! Re-armable one-shot countdown for the unoccupied transition.

use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Sleep, sleep};

/// One-shot timer with cancel-then-schedule re-arm semantics.
///
/// Owned by the occupancy engine; [`fired`](Self::fired) is awaited inside
/// the engine's event loop so the expiry is handled as just another
/// serialized event. Re-arming replaces any pending deadline rather than
/// stacking timers; at most one pending fire is ever outstanding.
pub struct DelayTimer {
    pending: Option<Pin<Box<Sleep>>>,
}

impl DelayTimer {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Arm (or re-arm) the timer to fire after `after`. Any previously
    /// pending deadline is cancelled first.
    pub fn arm(&mut self, after: Duration) {
        self.pending = Some(Box::pin(sleep(after)));
    }

    /// Cancel the pending deadline, if any.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Resolve when the armed deadline elapses, then return to idle.
    ///
    /// While idle this never resolves, so it is safe to keep in a `select!`
    /// alongside the edge queue. Dropping the future (the select picking
    /// another branch) leaves the deadline pending.
    pub async fn fired(&mut self) {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.await;
                self.pending = None;
            }
            None => std::future::pending().await,
        }
    }
}

impl Default for DelayTimer {
    fn default() -> Self {
        Self::new()
    }
}
