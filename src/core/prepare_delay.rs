//! Randomised delay before a player's initial prepare.
//!
//! Many players enabled on the same frame would all request chunk 0 at once.
//! Each one instead waits a random time in `[min_ms, max_ms]` before preparing,
//! which spreads the initial loads over a short window.

use log::trace;
use rand::Rng;
use std::time::{Duration, Instant};

/// What to do once the delay elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredPrepare {
    pub play_after: bool,
}

/// # Usage
/// ```ignore
/// // On enable:
/// delay.schedule(DeferredPrepare { play_after: true });
///
/// // In update:
/// if let Some(action) = delay.tick() {
///     player.preload_set(set_id, action.play_after);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct PrepareDelay {
    min_ms: u64,
    max_ms: u64,
    pending: Option<(DeferredPrepare, Instant)>,
}

impl PrepareDelay {
    /// Bounds are swapped if given in the wrong order
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
            pending: None,
        }
    }

    /// True when both bounds are 0; `schedule` is then pointless
    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    fn pick(&self) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

    /// Schedule (or reschedule) the deferred prepare
    pub fn schedule(&mut self, action: DeferredPrepare) -> Duration {
        let delay = self.pick();
        self.pending = Some((action, Instant::now() + delay));
        trace!("PrepareDelay: prepare in {}ms", delay.as_millis());
        delay
    }

    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            trace!("PrepareDelay: cancelled");
        }
    }

    /// Returns the action once its time has come, clearing it
    pub fn tick(&mut self) -> Option<DeferredPrepare> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<DeferredPrepare> {
        let (action, due) = self.pending?;
        if now >= due {
            self.pending = None;
            Some(action)
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
