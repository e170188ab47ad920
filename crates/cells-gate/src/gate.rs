//! Rolling-window rate limiting.

use crate::actions::bypass_capability;
use crate::config::RateGateConfig;
use cells_types::{capabilities, AccessPolicy, ActorId, Clock};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    started_at: DateTime<Utc>,
}

impl WindowEntry {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            started_at: now,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now.signed_duration_since(self.started_at) >= ttl
    }
}

#[derive(Debug)]
struct ActionWindow {
    ceiling: u32,
    entries: DashMap<ActorId, WindowEntry>,
}

impl ActionWindow {
    fn new(ceiling: u32) -> Self {
        Self {
            ceiling,
            entries: DashMap::new(),
        }
    }

    fn admit(&self, actor: &ActorId, now: DateTime<Utc>, ttl: chrono::Duration, cap: usize) -> bool {
        if !self.entries.contains_key(actor) {
            self.make_room(now, ttl, cap);
        }

        let mut entry = self
            .entries
            .entry(*actor)
            .or_insert_with(|| WindowEntry::fresh(now));
        if entry.is_expired(now, ttl) {
            *entry = WindowEntry::fresh(now);
        }
        if entry.count >= self.ceiling {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Drop expired entries, then the oldest ones, until a new actor fits.
    fn make_room(&self, now: DateTime<Utc>, ttl: chrono::Duration, cap: usize) {
        if self.entries.len() < cap {
            return;
        }
        self.entries.retain(|_, e| !e.is_expired(now, ttl));
        while self.entries.len() >= cap.max(1) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.started_at)
                .map(|e| *e.key());
            match oldest {
                Some(actor) => {
                    self.entries.remove(&actor);
                }
                None => break,
            }
        }
    }

    fn active(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.is_expired(now, ttl))
            .count()
    }
}

/// Per-actor, per-action counters with a fixed TTL window.
pub struct RateGate {
    config: RateGateConfig,
    ttl: chrono::Duration,
    windows: DashMap<String, ActionWindow>,
    access: AccessPolicy,
    clock: Arc<dyn Clock>,
}

impl RateGate {
    pub fn new(config: RateGateConfig, access: AccessPolicy, clock: Arc<dyn Clock>) -> Self {
        let ttl = chrono::Duration::from_std(config.window()).unwrap_or(chrono::Duration::MAX);
        Self {
            config,
            ttl,
            windows: DashMap::new(),
            access,
            clock,
        }
    }

    pub fn config(&self) -> &RateGateConfig {
        &self.config
    }

    /// Whether `actor` skips the limit for `action`.
    pub fn is_exempt(&self, actor: &ActorId, action: &str) -> bool {
        self.access.has_capability(actor, capabilities::BYPASS)
            || self
                .access
                .has_capability(actor, capabilities::BYPASS_RATE_LIMIT)
            || bypass_capability(action).is_some_and(|cap| self.access.has_capability(actor, cap))
    }

    /// Count one `action` for `actor`, returning whether it is admitted.
    pub fn try_consume(&self, actor: &ActorId, action: &str) -> bool {
        if self.is_exempt(actor, action) {
            return true;
        }

        let now = self.clock.now();
        let window = self
            .windows
            .entry(action.to_string())
            .or_insert_with(|| ActionWindow::new(self.config.ceiling_for(action)))
            .downgrade();

        let allowed = window.admit(actor, now, self.ttl, self.config.max_tracked_actors);
        if !allowed {
            debug!(actor = %actor, action, ceiling = window.ceiling, "Rate limit reached");
        }
        allowed
    }

    /// Forget every counter held for `actor`.
    pub fn clear(&self, actor: &ActorId) {
        for window in self.windows.iter() {
            window.entries.remove(actor);
        }
    }

    /// Active (unexpired) entries per action.
    pub fn stats(&self) -> BTreeMap<String, usize> {
        let now = self.clock.now();
        self.windows
            .iter()
            .map(|w| (w.key().clone(), w.active(now, self.ttl)))
            .collect()
    }

    /// Purge expired entries now, returning how many were removed.
    pub fn compact(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for window in self.windows.iter() {
            let before = window.entries.len();
            window.entries.retain(|_, e| !e.is_expired(now, self.ttl));
            removed += before - window.entries.len();
        }
        if removed > 0 {
            debug!(removed, "Compacted rate gate");
        }
        removed
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("config", &self.config)
            .field("actions", &self.windows.len())
            .finish_non_exhaustive()
    }
}
