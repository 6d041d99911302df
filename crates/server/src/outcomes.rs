use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use loadline_core::{ExtractedEntities, Sentiment};

/// One finalized call, as stored. Entities and sentiment are advisory
/// extraction output; `mc_number`/`load_id`/`final_price` are the resolved
/// values after explicit fields won over extraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub mc_number: Option<String>,
    pub load_id: Option<String>,
    pub transcript: String,
    pub entities: ExtractedEntities,
    pub final_price: Option<Decimal>,
    pub accepted: Option<bool>,
    pub sentiment: Sentiment,
}

impl CallRecord {
    pub fn new(
        mc_number: Option<String>,
        load_id: Option<String>,
        transcript: String,
        entities: ExtractedEntities,
        final_price: Option<Decimal>,
        accepted: Option<bool>,
        sentiment: Sentiment,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            mc_number,
            load_id,
            transcript,
            entities,
            final_price,
            accepted,
            sentiment,
        }
    }
}

/// Append-only in-memory call outcome log with the query surface the
/// metrics endpoint and dashboard need.
#[derive(Debug, Default)]
pub struct InMemoryOutcomeLog {
    records: RwLock<Vec<CallRecord>>,
}

impl InMemoryOutcomeLog {
    pub fn record(&self, record: CallRecord) -> CallRecord {
        let mut records = match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record.clone());
        record
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent `limit` records, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<CallRecord> {
        let records = self.read();
        let start = records.len().saturating_sub(limit);
        records[start..].to_vec()
    }

    /// Call volume bucketed by UTC calendar day of the record timestamp.
    pub fn daily_counts(&self) -> BTreeMap<String, u64> {
        let mut buckets = BTreeMap::new();
        for record in self.read().iter() {
            let day = record.recorded_at.date_naive().to_string();
            *buckets.entry(day).or_insert(0) += 1;
        }
        buckets
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<CallRecord>> {
        match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
