//! Presence sensor library.
//!
//! Turns noisy, edge-triggered motion-detector signals into a debounced
//! binary occupancy state with a retriggerable quiet period, publishes each
//! confirmed transition exactly once, and drives a blink-then-hold LED
//! animation alongside sensing.

pub mod config;
pub mod engine;
pub mod error;
pub mod hal;
pub mod indicator;
pub mod input;
pub mod notify;
