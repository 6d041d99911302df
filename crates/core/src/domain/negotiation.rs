use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::carrier::CarrierId;
use crate::domain::load::LoadId;

/// One negotiation thread exists per (carrier, load) pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NegotiationKey {
    pub carrier_id: CarrierId,
    pub load_id: LoadId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeKind {
    Offer,
    Counter,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeEntry {
    pub kind: ExchangeKind,
    pub value: Decimal,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    Open,
    Settled,
    Exhausted,
}

/// Mutable per-key negotiation record.
///
/// `threshold` is the policy's acceptance boundary (a floor under the
/// percentage policy, a ceiling under the ceiling policy), captured once at
/// creation alongside the listed rate so a mid-negotiation board refresh
/// cannot move the goalposts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationState {
    pub round: u32,
    pub status: NegotiationStatus,
    pub settled_price: Option<Decimal>,
    pub listed_rate: Decimal,
    pub threshold: Decimal,
    pub history: Vec<ExchangeEntry>,
    pub last_activity: DateTime<Utc>,
}

impl NegotiationState {
    pub fn open(listed_rate: Decimal, threshold: Decimal) -> Self {
        Self {
            round: 0,
            status: NegotiationStatus::Open,
            settled_price: None,
            listed_rate,
            threshold,
            history: Vec::new(),
            last_activity: Utc::now(),
        }
    }

    pub fn push_exchange(&mut self, kind: ExchangeKind, value: Decimal, at: DateTime<Utc>) {
        self.history.push(ExchangeEntry { kind, value, at });
        self.last_activity = at;
    }

    pub fn settle(&mut self, price: Decimal) {
        self.status = NegotiationStatus::Settled;
        self.settled_price = Some(price);
    }

    pub fn exhaust(&mut self) {
        self.status = NegotiationStatus::Exhausted;
    }

    pub fn idle_since(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.last_activity > ttl
    }
}
