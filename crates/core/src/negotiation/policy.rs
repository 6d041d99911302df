use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::{NegotiationConfig, PolicyKind};

/// All monetary values are pinned to 2 decimal places, half-up. One rounding
/// rule everywhere keeps policy outputs reproducible across runs.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Strategy seam for deciding acceptance and producing counter-offers.
///
/// The acceptance boundary (`threshold`) is computed once per negotiation and
/// captured in the state; `is_acceptable` and `counter_offer` then work from
/// that captured value.
pub trait AcceptancePolicy: Send + Sync {
    fn kind(&self) -> PolicyKind;
    fn threshold(&self, listed_rate: Decimal) -> Decimal;
    fn is_acceptable(&self, threshold: Decimal, offer: Decimal) -> bool;
    fn counter_offer(
        &self,
        listed_rate: Decimal,
        threshold: Decimal,
        offer: Decimal,
        round: u32,
    ) -> Decimal;
}

/// Accepts any offer at or above a fixed percentage of the listed rate.
/// Counters open at the midpoint and then concede toward the listed rate
/// with a geometrically shrinking step.
pub struct PercentageFloorPolicy {
    pub min_accept_pct: Decimal,
}

impl Default for PercentageFloorPolicy {
    fn default() -> Self {
        Self { min_accept_pct: Decimal::new(85, 2) }
    }
}

impl AcceptancePolicy for PercentageFloorPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::PercentageFloor
    }

    fn threshold(&self, listed_rate: Decimal) -> Decimal {
        round_money(listed_rate * self.min_accept_pct)
    }

    fn is_acceptable(&self, threshold: Decimal, offer: Decimal) -> bool {
        offer >= threshold
    }

    fn counter_offer(
        &self,
        listed_rate: Decimal,
        _threshold: Decimal,
        offer: Decimal,
        round: u32,
    ) -> Decimal {
        if round == 0 {
            return round_money((listed_rate + offer) / Decimal::TWO);
        }
        // concession = (listed - offer) * 0.5 * 0.7^(round - 1)
        let mut concession_factor = Decimal::new(5, 1);
        for _ in 1..round {
            concession_factor *= Decimal::new(7, 1);
        }
        round_money(listed_rate - (listed_rate - offer) * concession_factor)
    }
}

/// Models a carrier asking for more than the board rate: a ceiling of
/// listed × (1 + max_over_pct) is fixed at creation, and the counter is
/// always exactly that ceiling. The broker's best and final number does not
/// move across rounds.
pub struct CeilingPolicy {
    pub max_over_pct: Decimal,
}

impl Default for CeilingPolicy {
    fn default() -> Self {
        Self { max_over_pct: Decimal::new(10, 2) }
    }
}

impl AcceptancePolicy for CeilingPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Ceiling
    }

    fn threshold(&self, listed_rate: Decimal) -> Decimal {
        round_money(listed_rate * (Decimal::ONE + self.max_over_pct))
    }

    fn is_acceptable(&self, threshold: Decimal, offer: Decimal) -> bool {
        offer <= threshold
    }

    fn counter_offer(
        &self,
        _listed_rate: Decimal,
        threshold: Decimal,
        _offer: Decimal,
        _round: u32,
    ) -> Decimal {
        threshold
    }
}

pub fn policy_for(config: &NegotiationConfig) -> Box<dyn AcceptancePolicy> {
    match config.policy {
        PolicyKind::PercentageFloor => {
            Box::new(PercentageFloorPolicy { min_accept_pct: config.min_accept_pct })
        }
        PolicyKind::Ceiling => Box::new(CeilingPolicy { max_over_pct: config.max_over_pct }),
    }
}
