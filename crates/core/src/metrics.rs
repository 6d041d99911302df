use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-wide operational counters, mutated by the negotiation engine and
/// the verification client and read by the metrics endpoint. Plain atomics;
/// these are monotone counters, not a metrics pipeline.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    calls_total: AtomicU64,
    auth_failures: AtomicU64,
    offers_accepted: AtomicU64,
    offers_rejected: AtomicU64,
    negotiation_rounds_total: AtomicU64,
    registry_lookups_attempted: AtomicU64,
    registry_lookups_failed: AtomicU64,
    registry_fallbacks_used: AtomicU64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub calls_total: u64,
    pub auth_failures: u64,
    pub offers_accepted: u64,
    pub offers_rejected: u64,
    pub negotiation_rounds_total: u64,
    pub registry_lookups_attempted: u64,
    pub registry_lookups_failed: u64,
    pub registry_fallbacks_used: u64,
}

impl MetricsRegistry {
    pub fn record_call(&self) {
        self.calls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self, rounds: u32) {
        self.offers_accepted.fetch_add(1, Ordering::Relaxed);
        self.negotiation_rounds_total.fetch_add(u64::from(rounds), Ordering::Relaxed);
    }

    pub fn record_rejected(&self, rounds: u32) {
        self.offers_rejected.fetch_add(1, Ordering::Relaxed);
        self.negotiation_rounds_total.fetch_add(u64::from(rounds), Ordering::Relaxed);
    }

    pub fn record_lookup_attempt(&self) {
        self.registry_lookups_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_failure(&self) {
        self.registry_lookups_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback_use(&self) {
        self.registry_fallbacks_used.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls_total: self.calls_total.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            offers_accepted: self.offers_accepted.load(Ordering::Relaxed),
            offers_rejected: self.offers_rejected.load(Ordering::Relaxed),
            negotiation_rounds_total: self.negotiation_rounds_total.load(Ordering::Relaxed),
            registry_lookups_attempted: self.registry_lookups_attempted.load(Ordering::Relaxed),
            registry_lookups_failed: self.registry_lookups_failed.load(Ordering::Relaxed),
            registry_fallbacks_used: self.registry_fallbacks_used.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Mean rounds per concluded negotiation; `None` until one concludes.
    pub fn avg_negotiation_rounds(&self) -> Option<f64> {
        let concluded = self.offers_accepted + self.offers_rejected;
        if concluded == 0 {
            return None;
        }
        Some(self.negotiation_rounds_total as f64 / concluded as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::MetricsRegistry;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let registry = MetricsRegistry::default();
        registry.record_call();
        registry.record_call();
        registry.record_auth_failure();
        registry.record_accepted(1);
        registry.record_rejected(3);
        registry.record_lookup_attempt();
        registry.record_lookup_failure();
        registry.record_fallback_use();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.calls_total, 2);
        assert_eq!(snapshot.auth_failures, 1);
        assert_eq!(snapshot.offers_accepted, 1);
        assert_eq!(snapshot.offers_rejected, 1);
        assert_eq!(snapshot.negotiation_rounds_total, 4);
        assert_eq!(snapshot.registry_lookups_attempted, 1);
        assert_eq!(snapshot.registry_lookups_failed, 1);
        assert_eq!(snapshot.registry_fallbacks_used, 1);
    }

    #[test]
    fn average_rounds_is_none_before_any_conclusion() {
        let registry = MetricsRegistry::default();
        assert_eq!(registry.snapshot().avg_negotiation_rounds(), None);

        registry.record_accepted(2);
        registry.record_rejected(3);
        let average = registry.snapshot().avg_negotiation_rounds().expect("two concluded");
        assert!((average - 2.5).abs() < f64::EPSILON);
    }
}
