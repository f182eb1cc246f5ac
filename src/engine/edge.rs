//! Edge capture: input line to bounded queue.
//!
//! The edge handler is the interrupt-context side of the engine. It does
//! exactly one thing per transition: a non-blocking push of an [`EdgeRecord`]
//! onto a fixed-capacity queue. A full queue loses the edge; the engine's
//! level re-read recovers from the loss on the next delivered edge.

use crate::error::Result;
use crate::hal::{EdgeTrigger, MotionLine, Pull};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Identity of the line that triggered. The level is deliberately not
/// captured here; the engine re-reads it at processing time.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRecord {
    pub line: u32,
}

/// Owns the configured input line and the edge-drop counter.
pub struct EdgeSource {
    line: Arc<dyn MotionLine>,
    dropped: Arc<AtomicU64>,
}

impl EdgeSource {
    /// Configure `line` for pull-down, both-edge delivery and start feeding
    /// the returned receiver.
    ///
    /// Configuration failures (line busy, invalid line) are fatal; the
    /// caller must not proceed with a half-initialized sensor.
    pub fn attach(line: Arc<dyn MotionLine>, queue_depth: usize) -> Result<(Self, EdgeReceiver)> {
        line.configure(Pull::Down, EdgeTrigger::Both)?;

        let (tx, rx) = mpsc::channel(queue_depth);
        let dropped = Arc::new(AtomicU64::new(0));

        let offset = line.offset();
        let counter = Arc::clone(&dropped);
        line.set_edge_handler(Box::new(move || {
            // Producing-context rule: never block, never allocate. A full
            // queue drops the edge silently.
            if tx.try_send(EdgeRecord { line: offset }).is_err() {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }))?;

        Ok((Self { line, dropped }, EdgeReceiver { rx }))
    }

    /// Number of edges lost to queue overflow since attach.
    pub fn dropped_edges(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// The underlying line, for level re-reads.
    pub fn line(&self) -> Arc<dyn MotionLine> {
        Arc::clone(&self.line)
    }
}

/// Sole consumer end of the edge queue.
pub struct EdgeReceiver {
    rx: mpsc::Receiver<EdgeRecord>,
}

impl EdgeReceiver {
    /// Wait for the next edge. Returns `None` once the producer side is gone.
    pub async fn recv(&mut self) -> Option<EdgeRecord> {
        self.rx.recv().await
    }
}
