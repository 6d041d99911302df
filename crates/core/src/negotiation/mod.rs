pub mod engine;
pub mod policy;
pub mod store;

pub use engine::{NegotiationEngine, NegotiationOutcome, NOTE_ALREADY_SETTLED, REASON_MAX_ROUNDS};
pub use policy::{
    policy_for, round_money, AcceptancePolicy, CeilingPolicy, PercentageFloorPolicy,
};
pub use store::{InMemoryNegotiationStore, NegotiationStore};
