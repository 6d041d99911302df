use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::domain::negotiation::{NegotiationKey, NegotiationState};

/// Keyed storage for negotiation threads. The engine performs its
/// read-compute-write sequence under its own transition lock, so a store
/// only needs plain get/put/delete plus TTL eviction.
pub trait NegotiationStore: Send + Sync {
    fn get(&self, key: &NegotiationKey) -> Option<NegotiationState>;
    fn put(&self, key: NegotiationKey, state: NegotiationState);
    fn delete(&self, key: &NegotiationKey);
    /// Drops entries idle longer than the configured window and returns how
    /// many were removed.
    fn evict_idle(&self, now: DateTime<Utc>) -> usize;
}

pub struct InMemoryNegotiationStore {
    ttl: Duration,
    entries: Mutex<HashMap<NegotiationKey, NegotiationState>>,
}

impl InMemoryNegotiationStore {
    pub fn new(state_ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(state_ttl_secs.min(i64::MAX as u64) as i64),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<NegotiationKey, NegotiationState>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl NegotiationStore for InMemoryNegotiationStore {
    fn get(&self, key: &NegotiationKey) -> Option<NegotiationState> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: NegotiationKey, state: NegotiationState) {
        self.lock().insert(key, state);
    }

    fn delete(&self, key: &NegotiationKey) {
        self.lock().remove(key);
    }

    fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, state| !state.idle_since(now, self.ttl));
        before - entries.len()
    }
}
