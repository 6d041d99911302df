use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CarrierId(pub String);

/// Where a verification snapshot came from. Only `Verified` snapshots carry
/// real registry data; the other two are synthesized to keep the calling
/// workflow unblocked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Verified,
    DegradedFallback,
    Simulated,
}

/// Normalized result of one carrier registry lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierSnapshot {
    pub carrier_id: CarrierId,
    pub legal_name: Option<String>,
    pub allowed_to_operate: bool,
    pub out_of_service: bool,
    pub snapshot_at: DateTime<Utc>,
    pub provenance: Provenance,
}

impl CarrierSnapshot {
    /// Whether the carrier may be engaged. Synthesized snapshots are always
    /// eligible: non-production configurations and degraded lookups must not
    /// block the call flow.
    pub fn eligible(&self) -> bool {
        match self.provenance {
            Provenance::Verified => self.allowed_to_operate && !self.out_of_service,
            Provenance::DegradedFallback | Provenance::Simulated => true,
        }
    }

    pub fn simulated(carrier_id: &str) -> Self {
        Self::synthesized(carrier_id, Provenance::Simulated)
    }

    pub fn fallback(carrier_id: &str) -> Self {
        Self::synthesized(carrier_id, Provenance::DegradedFallback)
    }

    fn synthesized(carrier_id: &str, provenance: Provenance) -> Self {
        Self {
            carrier_id: CarrierId(carrier_id.to_string()),
            legal_name: Some(format!("Simulated Carrier {carrier_id}")),
            allowed_to_operate: true,
            out_of_service: false,
            snapshot_at: Utc::now(),
            provenance,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{CarrierId, CarrierSnapshot, Provenance};

    fn verified(allowed: bool, out_of_service: bool) -> CarrierSnapshot {
        CarrierSnapshot {
            carrier_id: CarrierId("123456".to_string()),
            legal_name: Some("Acme Freight LLC".to_string()),
            allowed_to_operate: allowed,
            out_of_service,
            snapshot_at: Utc::now(),
            provenance: Provenance::Verified,
        }
    }

    #[test]
    fn verified_eligibility_requires_authority_and_active_status() {
        assert!(verified(true, false).eligible());
        assert!(!verified(false, false).eligible());
        assert!(!verified(true, true).eligible());
    }

    #[test]
    fn synthesized_snapshots_are_always_eligible() {
        assert!(CarrierSnapshot::simulated("123456").eligible());
        assert!(CarrierSnapshot::fallback("123456").eligible());
    }

    #[test]
    fn provenance_serializes_in_kebab_case() {
        let tag = serde_json::to_string(&Provenance::DegradedFallback).expect("serialize");
        assert_eq!(tag, "\"degraded-fallback\"");
    }
}
