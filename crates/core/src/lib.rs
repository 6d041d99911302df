pub mod amount;
pub mod config;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod negotiation;
pub mod transcript;

pub use amount::{parse_amount, RawAmount};
pub use domain::carrier::{CarrierId, CarrierSnapshot, Provenance};
pub use domain::load::{Load, LoadId};
pub use domain::negotiation::{
    ExchangeEntry, ExchangeKind, NegotiationKey, NegotiationState, NegotiationStatus,
};
pub use errors::DomainError;
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use negotiation::{
    AcceptancePolicy, CeilingPolicy, InMemoryNegotiationStore, NegotiationEngine,
    NegotiationOutcome, NegotiationStore, PercentageFloorPolicy,
};
pub use transcript::{extract_entities, sentiment, ExtractedEntities, Sentiment};
