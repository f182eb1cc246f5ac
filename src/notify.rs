//! Capabilities the engine uses to reach the device framework.
//!
//! The cluster layer that exposes occupancy to controllers and persists the
//! configured delay lives outside this crate. The engine only sees these two
//! narrow interfaces; production wiring and tests supply different
//! implementations.

use async_trait::async_trait;
use log::info;
use std::sync::atomic::{AtomicU16, Ordering};

/// Sink for confirmed occupancy transitions.
///
/// Called by the engine exactly once per actual state change, never once
/// per edge. The implementation is responsible for any further propagation.
#[async_trait]
pub trait OccupancyPublisher: Send + Sync {
    async fn publish_occupancy(&self, occupied: bool);
}

/// Read-only accessor for the externally owned unoccupied delay.
///
/// The engine re-reads this on every timer arm, so a configuration change
/// takes effect on the next motion pulse, not retroactively. `None` means
/// the value is currently unavailable; the engine falls back to its fixed
/// default.
pub trait DelaySource: Send + Sync {
    fn unoccupied_delay_secs(&self) -> Option<u16>;
}

/// Publisher that logs transitions.
///
/// Stand-in for the framework's attribute-update path in the shipped
/// binary; swap in a real publisher to drive a cluster.
pub struct LogPublisher;

#[async_trait]
impl OccupancyPublisher for LogPublisher {
    async fn publish_occupancy(&self, occupied: bool) {
        info!(
            "[Publish] occupancy -> {}",
            if occupied { "OCCUPIED" } else { "UNOCCUPIED" }
        );
    }
}

/// Shared, externally mutable delay value.
///
/// Stands in for the framework's writable delay attribute: the operator
/// side holds one clone and may update it at any time, the engine reads it
/// fresh on every arm.
pub struct SharedDelay {
    secs: AtomicU16,
}

impl SharedDelay {
    pub fn new(secs: u16) -> Self {
        Self {
            secs: AtomicU16::new(secs),
        }
    }

    pub fn set(&self, secs: u16) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl DelaySource for SharedDelay {
    fn unoccupied_delay_secs(&self) -> Option<u16> {
        Some(self.secs.load(Ordering::SeqCst))
    }
}
