use cells_types::{ActorId, Clock};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Minimum spacing between two uses of the same facility by one actor.
///
/// Checking and recording are separate so callers only start a cooldown once
/// the guarded action actually happened.
pub struct CooldownTracker {
    period: Duration,
    last_use: DashMap<ActorId, DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl CooldownTracker {
    pub fn new(period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            period,
            last_use: DashMap::new(),
            clock,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time left before `actor` may act again, or `None` if ready.
    pub fn remaining(&self, actor: &ActorId) -> Option<Duration> {
        let last = *self.last_use.get(actor)?;
        let elapsed = self
            .clock
            .now()
            .signed_duration_since(last)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if elapsed >= self.period {
            self.last_use.remove(actor);
            return None;
        }
        Some(self.period - elapsed)
    }

    pub fn is_ready(&self, actor: &ActorId) -> bool {
        self.remaining(actor).is_none()
    }

    pub fn record(&self, actor: &ActorId) {
        self.last_use.insert(*actor, self.clock.now());
    }

    pub fn clear(&self, actor: &ActorId) {
        self.last_use.remove(actor);
    }

    /// Drop entries whose period has elapsed.
    pub fn compact(&self) -> usize {
        let now = self.clock.now();
        let before = self.last_use.len();
        self.last_use.retain(|_, last| {
            now.signed_duration_since(*last)
                .to_std()
                .map(|elapsed| elapsed < self.period)
                .unwrap_or(true)
        });
        before - self.last_use.len()
    }

    pub fn len(&self) -> usize {
        self.last_use.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_use.is_empty()
    }
}

impl std::fmt::Debug for CooldownTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooldownTracker")
            .field("period", &self.period)
            .field("tracked", &self.last_use.len())
            .finish_non_exhaustive()
    }
}
