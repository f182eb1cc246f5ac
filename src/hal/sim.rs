//! Simulated HAL backend.
//!
//! Stands in for real GPIO/PWM hardware: the simulated line delivers edges
//! to the installed handler from whatever task drives it, exactly like an
//! ISR trampoline would, and the simulated indicator records every duty
//! write so tests can assert on the animation.

use super::{EdgeHandler, EdgeTrigger, IndicatorOutput, Level, MotionLine, Pull};
use crate::error::{Result, SensorError};
use log::trace;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// A simulated digital input line.
///
/// Driven by calling [`set_high`](Self::set_high) / [`set_low`](Self::set_low);
/// each actual transition invokes the installed edge handler synchronously
/// on the caller's context.
pub struct SimulatedLine {
    offset: u32,
    level: AtomicBool,
    config: Mutex<Option<(Pull, EdgeTrigger)>>,
    handler: Mutex<Option<EdgeHandler>>,
}

impl SimulatedLine {
    pub fn new(offset: u32) -> Self {
        Self {
            offset,
            level: AtomicBool::new(false),
            config: Mutex::new(None),
            handler: Mutex::new(None),
        }
    }

    /// Drive the line high. Fires the edge handler on an actual transition.
    pub fn set_high(&self) {
        self.set_level(true);
    }

    /// Drive the line low. Fires the edge handler on an actual transition.
    pub fn set_low(&self) {
        self.set_level(false);
    }

    fn set_level(&self, high: bool) {
        let old = self.level.swap(high, Ordering::SeqCst);
        if old == high {
            return;
        }
        trace!("[Sim] line {} -> {}", self.offset, if high { "high" } else { "low" });

        let trigger = match *self.config.lock() {
            Some((_, trigger)) => trigger,
            None => return, // unconfigured lines deliver nothing
        };
        let fires = match trigger {
            EdgeTrigger::Rising => high,
            EdgeTrigger::Falling => !high,
            EdgeTrigger::Both => true,
        };
        if fires && let Some(handler) = self.handler.lock().as_ref() {
            handler();
        }
    }
}

impl MotionLine for SimulatedLine {
    fn offset(&self) -> u32 {
        self.offset
    }

    fn configure(&self, pull: Pull, trigger: EdgeTrigger) -> Result<()> {
        let mut config = self.config.lock();
        if config.is_some() {
            return Err(SensorError::LineBusy { line: self.offset });
        }
        *config = Some((pull, trigger));
        Ok(())
    }

    fn set_edge_handler(&self, handler: EdgeHandler) -> Result<()> {
        if self.config.lock().is_none() {
            return Err(SensorError::LineConfig {
                line: self.offset,
                reason: "line not configured".to_string(),
            });
        }
        *self.handler.lock() = Some(handler);
        Ok(())
    }

    fn level(&self) -> Level {
        if self.level.load(Ordering::SeqCst) {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// A simulated PWM indicator output that records every duty write.
pub struct SimulatedIndicator {
    history: Mutex<Vec<u16>>,
}

impl SimulatedIndicator {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(Vec::new()),
        }
    }

    /// The most recently written duty value (0 if never written).
    pub fn duty(&self) -> u16 {
        self.history.lock().last().copied().unwrap_or(0)
    }

    /// All duty writes in order.
    pub fn history(&self) -> Vec<u16> {
        self.history.lock().clone()
    }
}

impl Default for SimulatedIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorOutput for SimulatedIndicator {
    fn set_duty(&self, duty: u16) {
        trace!("[Sim] indicator duty -> {}", duty);
        self.history.lock().push(duty);
    }
}
