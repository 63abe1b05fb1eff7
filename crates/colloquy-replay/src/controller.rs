//! The [`ReplayController`] — play/pause/seek/speed over a finite event log.
//!
//! Displayed state is always a reducer fold of a log prefix. Forward ticks
//! advance incrementally (equivalent by the fold property); seeks re-derive
//! from the empty state, so a backward seek is exactly as correct as playing
//! from the start. Elapsed and total durations come from event timestamp
//! deltas, never from wall-clock playback time.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use colloquy_events::WorldEvent;
use colloquy_session::Session;
use colloquy_session::reducer;

use crate::speed::Speed;

/// Default base tick length: one event per second at `Speed::Normal`.
pub const DEFAULT_BASE_TICK_MS: u64 = 1000;

#[derive(Debug)]
struct ReplayState {
    index: usize,
    playing: bool,
    speed: Speed,
    session: Option<Session>,
}

struct Shared {
    events: Vec<WorldEvent>,
    base_tick_ms: u64,
    state: Mutex<ReplayState>,
    ticker: Mutex<Option<CancellationToken>>,
}

/// Drives the reducer over a recorded event log.
pub struct ReplayController {
    shared: Arc<Shared>,
}

impl ReplayController {
    /// Create a controller positioned at the first event (index 0).
    #[must_use]
    pub fn new(events: Vec<WorldEvent>) -> Self {
        Self::with_base_tick(events, DEFAULT_BASE_TICK_MS)
    }

    /// Create a controller with a custom base tick length.
    #[must_use]
    pub fn with_base_tick(events: Vec<WorldEvent>, base_tick_ms: u64) -> Self {
        let session = reducer::fold(events.first());
        Self {
            shared: Arc::new(Shared {
                events,
                base_tick_ms,
                state: Mutex::new(ReplayState {
                    index: 0,
                    playing: false,
                    speed: Speed::Normal,
                    session,
                }),
                ticker: Mutex::new(None),
            }),
        }
    }

    /// Number of events in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.events.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.events.is_empty()
    }

    /// Current playback index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.shared.state.lock().index
    }

    /// Whether playback is running.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.shared.state.lock().playing
    }

    /// Current playback speed.
    #[must_use]
    pub fn speed(&self) -> Speed {
        self.shared.state.lock().speed
    }

    /// The session state derived from the log prefix at the current index.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.shared.state.lock().session.clone()
    }

    /// Playback progress in percent: `(index + 1) / len * 100`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        if self.shared.events.is_empty() {
            return 0.0;
        }
        let index = self.shared.state.lock().index;
        (index + 1) as f64 / self.shared.events.len() as f64 * 100.0
    }

    /// Milliseconds of discussion time between the first event and the
    /// current one, from event timestamps.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        let index = self.shared.state.lock().index;
        self.shared.timestamp_delta(index)
    }

    /// Milliseconds of discussion time covered by the whole log.
    #[must_use]
    pub fn total_ms(&self) -> i64 {
        if self.shared.events.is_empty() {
            return 0;
        }
        self.shared.timestamp_delta(self.shared.events.len() - 1)
    }

    /// Start playback. No-op if already playing or the log is empty.
    pub fn play(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.playing || self.shared.events.is_empty() {
                return;
            }
            state.playing = true;
        }
        spawn_ticker(&self.shared);
    }

    /// Pause playback, keeping the index.
    pub fn pause(&self) {
        self.shared.stop_ticker();
        self.shared.state.lock().playing = false;
    }

    /// Seek to `index`, clamped to `[0, len - 1]`.
    ///
    /// Displayed state is re-derived by folding events `0..=index` from the
    /// empty state.
    pub fn seek(&self, index: usize) {
        if self.shared.events.is_empty() {
            return;
        }
        let clamped = index.min(self.shared.events.len() - 1);
        let session = reducer::fold(self.shared.events[..=clamped].iter());
        let mut state = self.shared.state.lock();
        state.index = clamped;
        state.session = session;
        debug!(index = clamped, "seek");
    }

    /// Change playback speed.
    ///
    /// While playing, the ticker restarts at the new cadence without losing
    /// the current index.
    pub fn set_speed(&self, speed: Speed) {
        let restart = {
            let mut state = self.shared.state.lock();
            if state.speed == speed {
                return;
            }
            state.speed = speed;
            state.playing
        };
        if restart {
            self.shared.stop_ticker();
            spawn_ticker(&self.shared);
        }
    }
}

impl Drop for ReplayController {
    fn drop(&mut self) {
        self.shared.stop_ticker();
    }
}

impl Shared {
    /// Advance one event. Returns `false` once the last event is reached
    /// and playback has stopped.
    fn step(&self) -> bool {
        let mut state = self.state.lock();
        let next = state.index + 1;
        if next >= self.events.len() {
            state.playing = false;
            return false;
        }
        // Forward advance is incremental; equivalent to a prefix fold.
        state.session = Some(reducer::apply(state.session.take(), &self.events[next]));
        state.index = next;
        if next + 1 == self.events.len() {
            state.playing = false;
            debug!("replay reached end of log");
            return false;
        }
        true
    }

    fn stop_ticker(&self) {
        if let Some(cancel) = self.ticker.lock().take() {
            cancel.cancel();
        }
    }

    fn timestamp_delta(&self, index: usize) -> i64 {
        let first = self.events.first().and_then(WorldEvent::timestamp_ms);
        let at = self.events.get(index).and_then(WorldEvent::timestamp_ms);
        match (first, at) {
            (Some(first), Some(at)) => (at - first).max(0),
            _ => 0,
        }
    }
}

fn spawn_ticker(shared: &Arc<Shared>) {
    let cancel = CancellationToken::new();
    *shared.ticker.lock() = Some(cancel.clone());

    let period = {
        let state = shared.state.lock();
        state.speed.tick_interval(shared.base_tick_ms)
    };
    // The ticker holds a weak handle so a dropped controller tears its
    // task down instead of keeping itself alive through it.
    let weak = Arc::downgrade(shared);
    let _ = tokio::spawn(async move {
        let mut ticks = time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    let Some(shared) = weak.upgrade() else {
                        break;
                    };
                    if !shared.step() {
                        break;
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
