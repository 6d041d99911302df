use std::sync::{Arc, Mutex};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amount::{parse_amount, RawAmount};
use crate::config::NegotiationConfig;
use crate::domain::carrier::CarrierId;
use crate::domain::load::{Load, LoadId};
use crate::domain::negotiation::{
    ExchangeKind, NegotiationKey, NegotiationState, NegotiationStatus,
};
use crate::errors::DomainError;
use crate::metrics::MetricsRegistry;
use crate::negotiation::policy::{policy_for, AcceptancePolicy};
use crate::negotiation::store::NegotiationStore;

pub const REASON_MAX_ROUNDS: &str = "max rounds reached";
pub const NOTE_ALREADY_SETTLED: &str = "already settled";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_offer: Option<Decimal>,
    pub round: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl NegotiationOutcome {
    fn settled(price: Decimal, round: u32, note: Option<&str>) -> Self {
        Self {
            accepted: true,
            price: Some(price),
            counter_offer: None,
            round,
            reason: None,
            note: note.map(str::to_string),
        }
    }

    fn countered(counter: Decimal, round: u32) -> Self {
        Self {
            accepted: false,
            price: None,
            counter_offer: Some(counter),
            round,
            reason: None,
            note: None,
        }
    }

    fn exhausted(round: u32) -> Self {
        Self {
            accepted: false,
            price: None,
            counter_offer: None,
            round,
            reason: Some(REASON_MAX_ROUNDS.to_string()),
            note: None,
        }
    }
}

/// Bounded-round counter-offer state machine, one thread per
/// (carrier, load) key.
///
/// Every transition runs under one engine-level lock: transitions are pure
/// in-memory work, and the coarse lock makes the per-key read-compute-write
/// sequence atomic, so two concurrent offers for the same pair can never
/// both observe the same round.
pub struct NegotiationEngine {
    policy: Box<dyn AcceptancePolicy>,
    store: Arc<dyn NegotiationStore>,
    metrics: Arc<MetricsRegistry>,
    max_rounds: u32,
    transition_gate: Mutex<()>,
}

impl NegotiationEngine {
    pub fn new(
        policy: Box<dyn AcceptancePolicy>,
        store: Arc<dyn NegotiationStore>,
        metrics: Arc<MetricsRegistry>,
        max_rounds: u32,
    ) -> Self {
        Self { policy, store, metrics, max_rounds, transition_gate: Mutex::new(()) }
    }

    pub fn from_config(
        config: &NegotiationConfig,
        store: Arc<dyn NegotiationStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self::new(policy_for(config), store, metrics, config.max_rounds)
    }

    /// Runs one negotiation step for the given pair. The caller has already
    /// resolved `load`; an unknown load id never reaches the engine and so
    /// never creates state.
    pub fn negotiate(
        &self,
        carrier_id: &CarrierId,
        load_id: &LoadId,
        raw_offer: &RawAmount,
        load: &Load,
    ) -> Result<NegotiationOutcome, DomainError> {
        let _gate = match self.transition_gate.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Utc::now();
        self.store.evict_idle(now);

        let key = NegotiationKey { carrier_id: carrier_id.clone(), load_id: load_id.clone() };
        let mut state = self.store.get(&key).unwrap_or_else(|| {
            NegotiationState::open(load.loadboard_rate, self.policy.threshold(load.loadboard_rate))
        });

        match state.status {
            NegotiationStatus::Settled => {
                // Idempotent once settled: same price, same round, no mutation.
                let price = state.settled_price.unwrap_or(state.listed_rate);
                return Ok(NegotiationOutcome::settled(
                    price,
                    state.round,
                    Some(NOTE_ALREADY_SETTLED),
                ));
            }
            NegotiationStatus::Exhausted => {
                // Terminal by design: a dead negotiation stays dead and is
                // not re-counted in the metrics.
                return Ok(NegotiationOutcome::exhausted(state.round));
            }
            NegotiationStatus::Open => {}
        }

        // Parse before any mutation so an invalid offer leaves no trace.
        let offer = parse_amount(raw_offer)?;
        state.push_exchange(ExchangeKind::Offer, offer, now);

        if self.policy.is_acceptable(state.threshold, offer) {
            state.settle(offer);
            self.metrics.record_accepted(state.round);
            let outcome = NegotiationOutcome::settled(offer, state.round, None);
            self.store.put(key, state);
            return Ok(outcome);
        }

        if state.round >= self.max_rounds {
            state.exhaust();
            self.metrics.record_rejected(state.round);
            let outcome = NegotiationOutcome::exhausted(state.round);
            self.store.put(key, state);
            return Ok(outcome);
        }

        let counter = self.policy.counter_offer(state.listed_rate, state.threshold, offer, state.round);
        state.push_exchange(ExchangeKind::Counter, counter, now);
        state.round += 1;
        let outcome = NegotiationOutcome::countered(counter, state.round);
        self.store.put(key, state);
        Ok(outcome)
    }
}
