//! The event coalescer — batches a burst of inbound events into one
//! ordered delivery.
//!
//! The first event of a batch arms a single flush timer; everything that
//! arrives inside the window joins the buffer. On flush the whole buffer is
//! delivered in arrival order and cleared. The guarantee is "delivery order
//! matches arrival order", nothing more: sequence correctness is the
//! reducer's job. The point is to protect the rendering layer from thrash
//! during update storms while bounding added latency to one window.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tracing::debug;

use colloquy_events::WorldEvent;

/// Capacity of the coalescer's input channel.
const INPUT_CAPACITY: usize = 1024;

/// Batches inbound events over a short window.
#[derive(Clone)]
pub struct EventCoalescer {
    input: mpsc::Sender<WorldEvent>,
}

impl EventCoalescer {
    /// Spawn the coalescer task delivering batches to `output`.
    ///
    /// A flush whose consumer is gone no-ops (the batch is dropped at debug
    /// level); the task itself keeps running so late pushes stay safe.
    #[must_use]
    pub fn spawn(window: Duration, output: mpsc::Sender<Vec<WorldEvent>>) -> Self {
        let (input, rx) = mpsc::channel(INPUT_CAPACITY);
        let _ = tokio::spawn(run(rx, window, output));
        Self { input }
    }

    /// Buffer one event for the next flush.
    ///
    /// No-ops if the coalescer task is gone.
    pub async fn push(&self, event: WorldEvent) {
        if self.input.send(event).await.is_err() {
            debug!("coalescer task gone, event dropped");
        }
    }
}

/// The coalescer loop: recv first event, arm one timer, buffer until it
/// fires, deliver, repeat. Exits when the input channel closes.
async fn run(
    mut rx: mpsc::Receiver<WorldEvent>,
    window: Duration,
    output: mpsc::Sender<Vec<WorldEvent>>,
) {
    while let Some(first) = rx.recv().await {
        let mut buffer = vec![first];
        let flush_at = time::sleep(window);
        tokio::pin!(flush_at);
        loop {
            tokio::select! {
                () = &mut flush_at => break,
                next = rx.recv() => match next {
                    Some(event) => buffer.push(event),
                    // Input closed mid-window: deliver what we have.
                    None => {
                        deliver(&output, buffer).await;
                        return;
                    }
                },
            }
        }
        deliver(&output, buffer).await;
    }
}

async fn deliver(output: &mpsc::Sender<Vec<WorldEvent>>, batch: Vec<WorldEvent>) {
    let len = batch.len();
    if output.send(batch).await.is_err() {
        // Consumer torn down; the flush must no-op rather than error.
        debug!(dropped = len, "coalescer consumer gone, batch dropped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::{EventId, SessionId};
    use colloquy_events::EventKind;
    use serde_json::json;

    fn event(id: &str, seq: i64) -> WorldEvent {
        WorldEvent {
            id: EventId::from(id),
            session_id: SessionId::from("s1"),
            kind: EventKind::Other("status:update".into()),
            sequence: seq,
            timestamp: "2026-03-01T12:00:00.000Z".into(),
            payload: json!({}),
        }
    }

    const WINDOW: Duration = Duration::from_millis(50);

    #[tokio::test(start_paused = true)]
    async fn burst_inside_window_is_one_ordered_batch() {
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let coalescer = EventCoalescer::spawn(WINDOW, out_tx);

        for i in 0..10 {
            coalescer.push(event(&format!("e{i}"), i)).await;
        }

        let batch = out_rx.recv().await.unwrap();
        assert_eq!(batch.len(), 10);
        let ids: Vec<&str> = batch.iter().map(|e| e.id.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("e{i}")).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());

        // Nothing else pending.
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn events_in_separate_windows_are_separate_batches() {
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let coalescer = EventCoalescer::spawn(WINDOW, out_tx);

        coalescer.push(event("e1", 1)).await;
        let first = out_rx.recv().await.unwrap();
        assert_eq!(first.len(), 1);

        coalescer.push(event("e2", 2)).await;
        let second = out_rx.recv().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id.as_str(), "e2");
    }

    #[tokio::test(start_paused = true)]
    async fn no_events_no_batches() {
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let _coalescer = EventCoalescer::spawn(WINDOW, out_tx);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_with_consumer_gone_is_a_safe_no_op() {
        let (out_tx, out_rx) = mpsc::channel(8);
        let coalescer = EventCoalescer::spawn(WINDOW, out_tx);
        drop(out_rx);

        coalescer.push(event("e1", 1)).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Still accepts pushes afterwards without panicking.
        coalescer.push(event("e2", 2)).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn late_arrival_starts_a_new_window() {
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let coalescer = EventCoalescer::spawn(WINDOW, out_tx);

        coalescer.push(event("e1", 1)).await;
        coalescer.push(event("e2", 2)).await;
        let first = out_rx.recv().await.unwrap();
        assert_eq!(first.len(), 2);

        tokio::time::sleep(Duration::from_millis(500)).await;

        coalescer.push(event("e3", 3)).await;
        let second = out_rx.recv().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id.as_str(), "e3");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_coalescer_flushes_buffered_events() {
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let coalescer = EventCoalescer::spawn(WINDOW, out_tx);

        coalescer.push(event("e1", 1)).await;
        drop(coalescer);

        let batch = out_rx.recv().await.unwrap();
        assert_eq!(batch.len(), 1);
    }
}
