//! Motion simulation for development and testing.
//!
//! Periodically drives the simulated line high for a short hold, then low
//! again, producing the same edge pattern a real detector would.

use crate::config::SimulationConfig;
use crate::hal::sim::SimulatedLine;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};

/// Spawn a task that produces a motion burst every
/// `burst_interval_secs` (the first one immediately).
///
/// # Returns
///
/// A `JoinHandle` that can be used to abort the simulation task.
pub fn run_motion_simulation(
    line: Arc<SimulatedLine>,
    config: SimulationConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut burst = interval(Duration::from_secs(config.burst_interval_secs));
        loop {
            burst.tick().await;
            info!("[Sim] motion burst ({}s hold)", config.hold_secs);
            line.set_high();
            sleep(Duration::from_secs(config.hold_secs)).await;
            line.set_low();
        }
    })
}
