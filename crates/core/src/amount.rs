use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Offer values arrive from the call platform either as JSON numbers or as
/// strings ("1200", "$1,200.50"). Webhook payload typing is not under our
/// control, so the union is modeled explicitly at the boundary instead of
/// coercing deep inside the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"-?\d{1,7}(?:\.\d{1,2})?").expect("amount pattern literal"))
}

/// Normalizes a heterogeneous offer input into a canonical currency value.
///
/// Numbers convert directly. Strings are trimmed, stripped of `$` and
/// thousands separators, and the first signed integer-or-two-decimal
/// substring is parsed. Anything else is an `InvalidAmount` client error.
pub fn parse_amount(value: &RawAmount) -> Result<Decimal, DomainError> {
    match value {
        RawAmount::Number(number) => Decimal::try_from(*number)
            .map_err(|_| DomainError::InvalidAmount(number.to_string())),
        RawAmount::Text(text) => {
            let stripped = text.trim().replace(['$', ','], "");
            amount_pattern()
                .find(&stripped)
                .and_then(|matched| Decimal::from_str(matched.as_str()).ok())
                .ok_or_else(|| DomainError::InvalidAmount(text.clone()))
        }
    }
}
