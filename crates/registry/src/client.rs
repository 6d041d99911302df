use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use loadline_core::config::{RegistryConfig, VerificationMode};
use loadline_core::{CarrierSnapshot, MetricsRegistry};

use crate::normalize::snapshot_from_response;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("carrier registry lookup failed: {0}")]
    Unavailable(String),
}

/// Seam over the raw registry HTTP call so the client's mode, cache, and
/// fallback behavior can be exercised against stubbed responses.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, carrier_id: &str) -> Result<Value>;
}

pub struct HttpSnapshotFetcher {
    client: reqwest::Client,
    base_url: String,
    web_key: SecretString,
}

impl HttpSnapshotFetcher {
    pub fn new(base_url: String, web_key: SecretString, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(timeout_secs))
            .build()
            .context("building registry http client")?;
        Ok(Self { client, base_url, web_key })
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self, carrier_id: &str) -> Result<Value> {
        let url = format!(
            "{}companySnapshot?webKey={}&mcNumber={}",
            self.base_url,
            self.web_key.expose_secret(),
            carrier_id
        );
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("registry request failed")?
            .error_for_status()
            .context("registry returned an error status")?;
        response.json::<Value>().await.context("registry body was not valid json")
    }
}

struct CacheEntry {
    snapshot: CarrierSnapshot,
    stored_at: DateTime<Utc>,
}

/// Carrier verification client with a time-boxed cache and a three-mode
/// resiliency policy.
///
/// - `strict`: one real lookup; any failure surfaces as `Unavailable`.
/// - `auto`: one real lookup; any failure silently degrades to a synthesized
///   snapshot cached under the same TTL.
/// - `simulated` (or no web key configured): always synthesizes.
///
/// Lookups for the same carrier id are serialized through a per-key mutex so
/// the cache's read-then-write is atomic per key; distinct carriers proceed
/// in parallel.
pub struct RegistryClient {
    mode: VerificationMode,
    fetcher: Option<Arc<dyn SnapshotFetcher>>,
    ttl: Duration,
    metrics: Arc<MetricsRegistry>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RegistryClient {
    pub fn new(
        mode: VerificationMode,
        fetcher: Option<Arc<dyn SnapshotFetcher>>,
        cache_ttl_secs: u64,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            mode,
            fetcher,
            ttl: Duration::seconds(cache_ttl_secs.min(i64::MAX as u64) as i64),
            metrics,
            cache: Mutex::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RegistryConfig, metrics: Arc<MetricsRegistry>) -> Result<Self> {
        let fetcher: Option<Arc<dyn SnapshotFetcher>> = match &config.web_key {
            Some(web_key) if config.mode != VerificationMode::Simulated => {
                Some(Arc::new(HttpSnapshotFetcher::new(
                    config.base_url.clone(),
                    web_key.clone(),
                    config.timeout_secs,
                )?))
            }
            _ => None,
        };
        Ok(Self::new(config.mode, fetcher, config.cache_ttl_secs, metrics))
    }

    pub fn mode(&self) -> VerificationMode {
        self.mode
    }

    pub async fn verify(&self, carrier_id: &str) -> Result<CarrierSnapshot, VerifyError> {
        let id = carrier_id.trim().to_string();
        let key_lock = self.key_lock(&id);
        let _serialized = key_lock.lock().await;

        if let Some(hit) = self.cached(&id) {
            debug!(carrier_id = %id, "verification served from cache");
            return Ok(hit);
        }

        let fetcher = match (&self.fetcher, self.mode) {
            (Some(fetcher), mode) if mode != VerificationMode::Simulated => Arc::clone(fetcher),
            _ => {
                let snapshot = CarrierSnapshot::simulated(&id);
                if self.mode != VerificationMode::Simulated {
                    // No web key configured: operating degraded, not simulated
                    // by choice.
                    self.metrics.record_fallback_use();
                }
                self.store(&id, snapshot.clone());
                return Ok(snapshot);
            }
        };

        self.metrics.record_lookup_attempt();
        match fetcher.fetch(&id).await {
            Ok(body) => {
                let snapshot = snapshot_from_response(&id, &body);
                self.store(&id, snapshot.clone());
                Ok(snapshot)
            }
            Err(error) => {
                self.metrics.record_lookup_failure();
                if self.mode == VerificationMode::Strict {
                    warn!(carrier_id = %id, error = %error, "strict verification failed");
                    return Err(VerifyError::Unavailable(error.to_string()));
                }
                warn!(
                    carrier_id = %id,
                    error = %error,
                    "verification degraded to synthesized snapshot"
                );
                self.metrics.record_fallback_use();
                let snapshot = CarrierSnapshot::fallback(&id);
                self.store(&id, snapshot.clone());
                Ok(snapshot)
            }
        }
    }

    fn key_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.key_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    fn cached(&self, id: &str) -> Option<CarrierSnapshot> {
        let cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache
            .get(id)
            .filter(|entry| Utc::now() - entry.stored_at < self.ttl)
            .map(|entry| entry.snapshot.clone())
    }

    fn store(&self, id: &str, snapshot: CarrierSnapshot) {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.insert(id.to_string(), CacheEntry { snapshot, stored_at: Utc::now() });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use loadline_core::config::VerificationMode;
    use loadline_core::{MetricsRegistry, Provenance};

    use super::{RegistryClient, SnapshotFetcher, VerifyError};

    struct StubFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubFetcher {
        fn succeeding() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail: false })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail: true })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotFetcher for StubFetcher {
        async fn fetch(&self, _carrier_id: &str) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            Ok(json!({
                "legalName": "Acme Freight LLC",
                "allowToOperate": "Y",
                "outOfService": "N"
            }))
        }
    }

    fn client(
        mode: VerificationMode,
        fetcher: Arc<StubFetcher>,
        ttl_secs: u64,
    ) -> (RegistryClient, Arc<MetricsRegistry>) {
        let metrics = Arc::new(MetricsRegistry::default());
        let client = RegistryClient::new(mode, Some(fetcher), ttl_secs, Arc::clone(&metrics));
        (client, metrics)
    }

    #[tokio::test]
    async fn simulated_mode_never_touches_the_fetcher() {
        let fetcher = StubFetcher::succeeding();
        let (client, metrics) =
            client(VerificationMode::Simulated, Arc::clone(&fetcher), 3600);

        let snapshot = client.verify("123456").await.expect("simulated never fails");

        assert_eq!(snapshot.provenance, Provenance::Simulated);
        assert!(snapshot.eligible());
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(metrics.snapshot().registry_lookups_attempted, 0);
        assert_eq!(metrics.snapshot().registry_fallbacks_used, 0);
    }

    #[tokio::test]
    async fn missing_web_key_degrades_and_counts_a_fallback() {
        let metrics = Arc::new(MetricsRegistry::default());
        let client =
            RegistryClient::new(VerificationMode::Auto, None, 3600, Arc::clone(&metrics));

        let snapshot = client.verify("123456").await.expect("keyless mode never fails");

        assert_eq!(snapshot.provenance, Provenance::Simulated);
        assert_eq!(metrics.snapshot().registry_fallbacks_used, 1);
    }

    #[tokio::test]
    async fn strict_mode_surfaces_lookup_failures() {
        let fetcher = StubFetcher::failing();
        let (client, metrics) = client(VerificationMode::Strict, Arc::clone(&fetcher), 3600);

        let error = client.verify("123456").await.expect_err("strict must fail");

        assert!(matches!(error, VerifyError::Unavailable(_)));
        assert_eq!(metrics.snapshot().registry_lookups_attempted, 1);
        assert_eq!(metrics.snapshot().registry_lookups_failed, 1);
        assert_eq!(metrics.snapshot().registry_fallbacks_used, 0);
    }

    #[tokio::test]
    async fn auto_mode_degrades_instead_of_failing() {
        let fetcher = StubFetcher::failing();
        let (client, metrics) = client(VerificationMode::Auto, Arc::clone(&fetcher), 3600);

        let snapshot = client.verify("123456").await.expect("auto never fails");

        assert_eq!(snapshot.provenance, Provenance::DegradedFallback);
        assert!(snapshot.eligible());
        assert_eq!(metrics.snapshot().registry_lookups_failed, 1);
        assert_eq!(metrics.snapshot().registry_fallbacks_used, 1);
    }

    #[tokio::test]
    async fn fresh_cache_hits_skip_the_external_call() {
        let fetcher = StubFetcher::succeeding();
        let (client, metrics) = client(VerificationMode::Strict, Arc::clone(&fetcher), 3600);

        let first = client.verify(" 123456 ").await.expect("first lookup");
        let second = client.verify("123456").await.expect("cached lookup");

        assert_eq!(first, second);
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(metrics.snapshot().registry_lookups_attempted, 1);
    }

    #[tokio::test]
    async fn expired_cache_entries_trigger_a_fresh_lookup() {
        let fetcher = StubFetcher::succeeding();
        let (client, _) = client(VerificationMode::Auto, Arc::clone(&fetcher), 0);

        client.verify("123456").await.expect("first lookup");
        client.verify("123456").await.expect("second lookup");

        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn degraded_snapshots_are_cached_like_real_ones() {
        let fetcher = StubFetcher::failing();
        let (client, metrics) = client(VerificationMode::Auto, Arc::clone(&fetcher), 3600);

        client.verify("123456").await.expect("degrades");
        let second = client.verify("123456").await.expect("cached fallback");

        assert_eq!(second.provenance, Provenance::DegradedFallback);
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(metrics.snapshot().registry_fallbacks_used, 1);
    }
}
