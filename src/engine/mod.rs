//! Edge-to-occupancy state machine.
//!
//! A single consumer task turns queued edge records into a debounced binary
//! occupancy state: any active-level edge makes the room occupied and
//! (re)arms the quiet timer; only the timer elapsing makes it unoccupied
//! again. The raw sensor falling is informational, so the published state
//! is decoupled from the detector's own chatter and blanking intervals.

pub mod delay;
pub mod edge;

use crate::hal::{Level, MotionLine};
use crate::indicator::LedSequencer;
use crate::notify::{DelaySource, OccupancyPublisher};
use delay::DelayTimer;
use edge::{EdgeReceiver, EdgeRecord};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Quiet period used when the configured delay is unavailable or zero.
pub const DEFAULT_UNOCCUPIED_DELAY_SECS: u16 = 900;

/// Published occupancy state, distinct from the raw sensor level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OccupancyState {
    Unoccupied,
    Occupied,
}

/// One iteration's worth of work for the consumer loop. Timer expiry is
/// folded in here so state is only ever mutated from one place.
enum EngineEvent {
    Edge(EdgeRecord),
    QuietElapsed,
    QueueClosed,
    Shutdown,
}

/// The occupancy consumer task.
///
/// Owns the occupancy state and the quiet timer outright; nothing else
/// mutates either. On every confirmed transition it publishes first, then
/// notifies the sequencer.
pub struct OccupancyEngine {
    line: Arc<dyn MotionLine>,
    edges: EdgeReceiver,
    timer: DelayTimer,
    state: OccupancyState,
    publisher: Arc<dyn OccupancyPublisher>,
    delay: Arc<dyn DelaySource>,
    sequencer: Arc<LedSequencer>,
}

impl OccupancyEngine {
    pub fn new(
        line: Arc<dyn MotionLine>,
        edges: EdgeReceiver,
        publisher: Arc<dyn OccupancyPublisher>,
        delay: Arc<dyn DelaySource>,
        sequencer: Arc<LedSequencer>,
    ) -> Self {
        Self {
            line,
            edges,
            timer: DelayTimer::new(),
            state: OccupancyState::Unoccupied,
            publisher,
            delay,
            sequencer,
        }
    }

    /// Spawn the consumer loop. It runs until `shutdown` is cancelled or
    /// the edge queue producer goes away.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    async fn run(mut self, shutdown: CancellationToken) {
        info!(
            "[PIR] occupancy engine started on line {}, state {}",
            self.line.offset(),
            self.state
        );
        loop {
            // Biased: drain pending edges before honoring the deadline, so
            // an edge that arrived just ahead of expiry re-arms instead of
            // racing it.
            let event = tokio::select! {
                biased;
                maybe_edge = self.edges.recv() => match maybe_edge {
                    Some(edge) => EngineEvent::Edge(edge),
                    None => EngineEvent::QueueClosed,
                },
                _ = self.timer.fired() => EngineEvent::QuietElapsed,
                _ = shutdown.cancelled() => EngineEvent::Shutdown,
            };

            match event {
                EngineEvent::Edge(edge) => self.on_edge(edge).await,
                EngineEvent::QuietElapsed => self.on_quiet_elapsed().await,
                EngineEvent::QueueClosed => {
                    warn!("[PIR] edge queue closed, stopping engine");
                    break;
                }
                EngineEvent::Shutdown => break,
            }
        }
        info!("[PIR] occupancy engine stopped");
    }

    async fn on_edge(&mut self, edge: EdgeRecord) {
        // Re-read the level instead of trusting the edge direction; this
        // self-corrects when queue slots were dropped or coalesced.
        let level = self.line.level();
        debug!(
            "[PIR] edge on line {}, level {:?}, state {}",
            edge.line, level, self.state
        );
        match level {
            Level::High => {
                if self.state == OccupancyState::Unoccupied {
                    self.transition(OccupancyState::Occupied).await;
                }
                // Every active edge postpones the unoccupied transition,
                // whatever the prior state was.
                self.arm_quiet_timer();
            }
            Level::Low => {
                // The detector's own output falling (internal blanking)
                // does not end occupancy; the quiet timer is authoritative.
                debug!(
                    "[PIR] raw signal low, state remains {} until the quiet timer expires",
                    self.state
                );
            }
        }
    }

    async fn on_quiet_elapsed(&mut self) {
        info!("[PIR] quiet period elapsed");
        if self.state == OccupancyState::Occupied {
            self.transition(OccupancyState::Unoccupied).await;
        }
    }

    /// Mutate the state and emit both notifications, publish first. Called
    /// only for actual changes, so each transition publishes exactly once.
    async fn transition(&mut self, next: OccupancyState) {
        self.state = next;
        info!("[PIR] state -> {}", next);
        let occupied = next == OccupancyState::Occupied;
        self.publisher.publish_occupancy(occupied).await;
        self.sequencer.on_occupancy_changed(occupied);
    }

    fn arm_quiet_timer(&mut self) {
        // Read the configured delay fresh on every arm; a stale value must
        // never outlive the attribute write that replaced it.
        let secs = match self.delay.unoccupied_delay_secs() {
            Some(secs) if secs > 0 => secs,
            _ => {
                warn!(
                    "[PIR] unoccupied delay unavailable, using default {}s",
                    DEFAULT_UNOCCUPIED_DELAY_SECS
                );
                DEFAULT_UNOCCUPIED_DELAY_SECS
            }
        };
        self.timer.arm(Duration::from_secs(u64::from(secs)));
        debug!("[PIR] quiet timer (re)armed for {}s", secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::edge::EdgeSource;
    use crate::hal::sim::{SimulatedIndicator, SimulatedLine};
    use crate::indicator::{LedPhase, LedSettings};
    use crate::notify::SharedDelay;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::time::{Instant, advance};

    struct RecordingPublisher {
        events: Mutex<Vec<(Instant, bool)>>,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }

        fn events(&self) -> Vec<(Instant, bool)> {
            self.events.lock().clone()
        }

        fn occupancies(&self) -> Vec<bool> {
            self.events.lock().iter().map(|(_, o)| *o).collect()
        }
    }

    #[async_trait]
    impl OccupancyPublisher for RecordingPublisher {
        async fn publish_occupancy(&self, occupied: bool) {
            self.events.lock().push((Instant::now(), occupied));
        }
    }

    struct Harness {
        line: Arc<SimulatedLine>,
        source: EdgeSource,
        publisher: Arc<RecordingPublisher>,
        delay: Arc<SharedDelay>,
        sequencer: Arc<LedSequencer>,
        indicator: Arc<SimulatedIndicator>,
        shutdown: CancellationToken,
        engine: JoinHandle<()>,
    }

    fn start(delay_secs: u16, queue_depth: usize) -> Harness {
        let line = Arc::new(SimulatedLine::new(4));
        let (source, edges) =
            EdgeSource::attach(line.clone() as Arc<dyn MotionLine>, queue_depth).unwrap();

        let indicator = Arc::new(SimulatedIndicator::new());
        let sequencer = Arc::new(LedSequencer::new(
            indicator.clone(),
            LedSettings::default(),
        ));
        let publisher = Arc::new(RecordingPublisher::new());
        let delay = Arc::new(SharedDelay::new(delay_secs));

        let shutdown = CancellationToken::new();
        let engine = OccupancyEngine::new(
            source.line(),
            edges,
            publisher.clone(),
            delay.clone(),
            sequencer.clone(),
        )
        .spawn(shutdown.clone());

        Harness {
            line,
            source,
            publisher,
            delay,
            sequencer,
            indicator,
            shutdown,
            engine,
        }
    }

    /// Let the engine and sequencer tasks run up to their next wait.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance_secs(secs: u64) {
        advance(Duration::from_secs(secs)).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_motion_publishes_occupied_once() {
        let h = start(5, 10);

        h.line.set_high();
        settle().await;
        assert_eq!(h.publisher.occupancies(), vec![true]);
        assert_eq!(h.sequencer.phase(), LedPhase::BlinkCycle(0));

        // More motion while already occupied: re-arm only, no republish.
        h.line.set_low();
        h.line.set_high();
        settle().await;
        assert_eq!(h.publisher.occupancies(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retriggered_quiet_period() {
        let h = start(5, 10);
        let t0 = Instant::now();

        // Active edge at t=0: publish immediately, start the alert blink.
        h.line.set_high();
        settle().await;
        let events = h.publisher.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], (t0, true));
        assert_eq!(h.sequencer.phase(), LedPhase::BlinkCycle(0));

        // Blink runs to steady bright without blocking sensing
        // (3 cycles x 2 ticks x 150ms).
        for _ in 0..6 {
            settle().await;
            advance(Duration::from_millis(150)).await;
            settle().await;
        }
        assert_eq!(h.sequencer.phase(), LedPhase::Bright);

        // Raw signal falls: informational only.
        advance(Duration::from_millis(2100)).await; // t=3
        h.line.set_low();
        settle().await;
        assert_eq!(h.publisher.events().len(), 1);

        // Motion again at t=3 re-arms the timer; still no new publish.
        h.line.set_high();
        settle().await;
        assert_eq!(h.publisher.events().len(), 1);

        // Nothing more until last_edge + delay = t=8.
        advance(Duration::from_millis(4900)).await;
        settle().await;
        assert_eq!(h.publisher.events().len(), 1);

        advance(Duration::from_millis(100)).await;
        settle().await;
        let events = h.publisher.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].1, false);
        assert_eq!(events[1].0 - t0, Duration::from_secs(8));
        assert_eq!(h.sequencer.phase(), LedPhase::Dim);
        assert_eq!(h.indicator.duty(), 102);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falling_edge_does_not_end_occupancy() {
        let h = start(5, 10);
        let t0 = Instant::now();

        h.line.set_high();
        settle().await;
        advance_secs(1).await;
        h.line.set_low();
        settle().await;

        advance_secs(3).await; // t=4, timer deadline is t=5
        assert_eq!(h.publisher.occupancies(), vec![true]);

        advance_secs(1).await; // t=5
        let events = h.publisher.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].0 - t0, Duration::from_secs(5));
        assert_eq!(events[1].1, false);
    }

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_keeps_old_delay() {
        let h = start(5, 10);

        h.line.set_high();
        settle().await;

        // Shortening the configured delay mid-period must not move the
        // deadline that is already armed.
        advance_secs(1).await;
        h.delay.set(1);
        advance_secs(2).await; // t=3; a 1s delay would long since have fired
        assert_eq!(h.publisher.occupancies(), vec![true]);

        advance_secs(2).await; // t=5, original deadline
        assert_eq!(h.publisher.occupancies(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_delay_applies_on_rearm() {
        let h = start(5, 10);
        let t0 = Instant::now();

        h.line.set_high();
        settle().await;

        advance_secs(3).await; // t=3
        h.delay.set(10);
        h.line.set_low();
        h.line.set_high(); // re-arm reads the new value
        settle().await;

        advance_secs(5).await; // t=8, old deadline would have hit
        assert_eq!(h.publisher.events().len(), 1);

        advance_secs(5).await; // t=13
        let events = h.publisher.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].0 - t0, Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_falls_back_to_default() {
        let h = start(0, 10);

        h.line.set_high();
        settle().await;
        assert_eq!(h.publisher.occupancies(), vec![true]);

        advance_secs(899).await;
        assert_eq!(h.publisher.events().len(), 1);

        advance_secs(1).await;
        assert_eq!(h.publisher.occupancies(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflowed_burst_converges_by_level_reread() {
        let h = start(5, 2);

        // A burst of five transitions lands before the consumer runs; the
        // depth-2 queue keeps the first two records and drops the rest.
        h.line.set_high();
        h.line.set_low();
        h.line.set_high();
        h.line.set_low();
        h.line.set_high();
        assert_eq!(h.source.dropped_edges(), 3);

        // The survivors are stale ("rising" and "falling" from the start of
        // the burst), but the level re-read sees the line still high, so the
        // final state is correct and published exactly once.
        settle().await;
        assert_eq!(h.publisher.occupancies(), vec![true]);

        advance_secs(5).await;
        assert_eq!(h.publisher.occupancies(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_once_per_transition_across_bursts() {
        let h = start(2, 10);

        h.line.set_high();
        settle().await;
        h.line.set_low();
        settle().await;
        advance_secs(2).await;

        h.line.set_high();
        settle().await;
        h.line.set_low();
        settle().await;
        advance_secs(2).await;

        assert_eq!(h.publisher.occupancies(), vec![true, false, true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_loop() {
        let h = start(5, 10);

        h.shutdown.cancel();
        settle().await;
        assert!(h.engine.is_finished());
    }
}
