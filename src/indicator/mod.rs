//! LED indicator sequencer.
//!
//! Owns the physical indicator output and runs the blink-then-hold alert
//! animation as its own timer-driven state machine. Entry points are
//! callable at any time from any task; each safely preempts whatever
//! sequence is currently running.

use crate::hal::IndicatorOutput;
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Animation phase of the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedPhase {
    /// Ambient level, nothing animating.
    Dim,
    /// Mid-alert; the payload is the number of completed off→on cycles.
    BlinkCycle(u8),
    /// Sustained full brightness, no further callbacks.
    Bright,
}

/// Fixed animation parameters, set once at construction.
#[derive(Debug, Clone)]
pub struct LedSettings {
    pub dim_duty: u16,
    pub bright_duty: u16,
    pub blink_period: Duration,
    pub blink_cycles: u8,
}

impl Default for LedSettings {
    fn default() -> Self {
        Self {
            dim_duty: 102,
            bright_duty: 1023,
            blink_period: Duration::from_millis(150),
            blink_cycles: 3,
        }
    }
}

struct SequencerInner {
    phase: LedPhase,
    blink_task: Option<JoinHandle<()>>,
    /// Bumped on every `enter_*` call. A blink task whose generation no
    /// longer matches must exit without touching anything; this closes the
    /// window between `abort()` and the task noticing it.
    generation: u64,
}

impl SequencerInner {
    fn preempt(&mut self) {
        if let Some(task) = self.blink_task.take() {
            task.abort();
        }
        self.generation += 1;
    }
}

/// Timer-driven indicator state machine.
///
/// All phase mutation, whether from an `enter_*` call or from the blink
/// task itself, goes through one mutex, which is never held across an
/// await. Entry points other than [`enter_blink`](Self::enter_blink) and
/// [`on_occupancy_changed`](Self::on_occupancy_changed) need no runtime;
/// those two spawn the blink task and must be called within one.
pub struct LedSequencer {
    output: Arc<dyn IndicatorOutput>,
    settings: LedSettings,
    inner: Arc<Mutex<SequencerInner>>,
}

impl LedSequencer {
    /// Create the sequencer and drive the output to the ambient dim level.
    pub fn new(output: Arc<dyn IndicatorOutput>, settings: LedSettings) -> Self {
        output.set_duty(settings.dim_duty);
        Self {
            output,
            settings,
            inner: Arc::new(Mutex::new(SequencerInner {
                phase: LedPhase::Dim,
                blink_task: None,
                generation: 0,
            })),
        }
    }

    pub fn phase(&self) -> LedPhase {
        self.inner.lock().phase
    }

    /// Occupancy-change notification from the engine: occupied announces
    /// with the blink sequence, unoccupied returns to ambient dim.
    pub fn on_occupancy_changed(&self, occupied: bool) {
        if occupied {
            self.enter_blink();
        } else {
            self.enter_dim();
        }
    }

    /// Cancel any running animation and hold the ambient dim level.
    pub fn enter_dim(&self) {
        let mut inner = self.inner.lock();
        inner.preempt();
        inner.phase = LedPhase::Dim;
        self.output.set_duty(self.settings.dim_duty);
        debug!("[LED] dim");
    }

    /// Cancel any running animation and hold full brightness, without the
    /// announcing flash.
    pub fn enter_bright(&self) {
        let mut inner = self.inner.lock();
        inner.preempt();
        inner.phase = LedPhase::Bright;
        self.output.set_duty(self.settings.bright_duty);
        debug!("[LED] bright");
    }

    /// Start (or restart) the alert animation: full brightness, then
    /// `blink_cycles` off→on flashes, then settle at steady bright.
    ///
    /// Calling this mid-sequence restarts the count from zero; alerts are
    /// never queued.
    pub fn enter_blink(&self) {
        let mut inner = self.inner.lock();
        inner.preempt();
        inner.phase = LedPhase::BlinkCycle(0);
        self.output.set_duty(self.settings.bright_duty);

        let generation = inner.generation;
        let shared = Arc::clone(&self.inner);
        let output = Arc::clone(&self.output);
        let settings = self.settings.clone();
        inner.blink_task = Some(tokio::spawn(async move {
            Self::blink_loop(shared, output, settings, generation).await;
        }));
        debug!("[LED] blink x{}", self.settings.blink_cycles);
    }

    /// Cancel any running animation and turn the output off entirely.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.preempt();
        inner.phase = LedPhase::Dim;
        self.output.set_duty(0);
    }

    async fn blink_loop(
        shared: Arc<Mutex<SequencerInner>>,
        output: Arc<dyn IndicatorOutput>,
        settings: LedSettings,
        generation: u64,
    ) {
        let mut lit = true;
        loop {
            tokio::time::sleep(settings.blink_period).await;

            let mut inner = shared.lock();
            if inner.generation != generation {
                return; // preempted between ticks
            }
            let LedPhase::BlinkCycle(completed) = inner.phase else {
                return;
            };
            if lit {
                output.set_duty(0);
                lit = false;
            } else {
                output.set_duty(settings.bright_duty);
                lit = true;
                let completed = completed + 1;
                if completed >= settings.blink_cycles {
                    // Sequence done: hold bright, no further callbacks.
                    inner.phase = LedPhase::Bright;
                    inner.blink_task = None;
                    debug!("[LED] blink done, holding bright");
                    return;
                }
                inner.phase = LedPhase::BlinkCycle(completed);
            }
        }
    }
}
