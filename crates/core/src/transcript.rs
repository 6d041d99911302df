use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Best-effort entities pulled out of a call transcript. Advisory only:
/// explicitly supplied structured fields always take precedence over these.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mc_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

fn mc_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\bMC(?:\s|#|:)?\s*(\d{4,10})\b").expect("mc pattern literal")
    })
}

fn load_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bL\d{3,}\b").expect("load id pattern literal"))
}

fn dollar_price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\s*(\d{2,6}(?:\.\d{1,2})?)\b").expect("dollar price pattern literal")
    })
}

fn bare_price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(\d{2,6}(?:\.\d{1,2})?)\b").expect("bare price pattern literal")
    })
}

pub fn extract_entities(text: &str) -> ExtractedEntities {
    let mut entities = ExtractedEntities::default();

    if let Some(captures) = mc_pattern().captures(text) {
        entities.mc_number = captures.get(1).map(|m| m.as_str().to_string());
    }
    if let Some(matched) = load_id_pattern().find(text) {
        entities.load_id = Some(matched.as_str().to_string());
    }
    // Dollar-prefixed figures win over bare numbers so an MC number earlier
    // in the sentence is not mistaken for a price.
    let without_separators = text.replace(',', "");
    let price_match = dollar_price_pattern()
        .captures(&without_separators)
        .or_else(|| bare_price_pattern().captures(&without_separators));
    if let Some(captures) = price_match {
        entities.price = captures.get(1).and_then(|m| Decimal::from_str(m.as_str()).ok());
    }

    entities
}

const POSITIVE_TOKENS: &[&str] =
    &["good", "great", "ok", "thanks", "thank", "yes", "happy", "accept"];
const NEGATIVE_TOKENS: &[&str] =
    &["no", "not", "reject", "angry", "bad", "hate", "problem", "can't", "cannot"];

pub fn sentiment(text: &str) -> Sentiment {
    if text.is_empty() {
        return Sentiment::Neutral;
    }
    let lowered = text.to_lowercase();
    let positive: usize = POSITIVE_TOKENS.iter().map(|token| lowered.matches(token).count()).sum();
    let negative: usize = NEGATIVE_TOKENS.iter().map(|token| lowered.matches(token).count()).sum();

    if positive > negative {
        Sentiment::Positive
    } else if negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{extract_entities, sentiment, Sentiment};

    #[test]
    fn extracts_mc_number_load_id_and_price() {
        let entities = extract_entities(
            "This is MC# 123456 calling about load L1001, we can do it for $1,250.50",
        );
        assert_eq!(entities.mc_number.as_deref(), Some("123456"));
        assert_eq!(entities.load_id.as_deref(), Some("L1001"));
        assert_eq!(entities.price, Some(Decimal::new(125_050, 2)));
    }

    #[test]
    fn bare_numbers_are_used_when_no_dollar_figure_exists() {
        let entities = extract_entities("we could do 950 on that lane");
        assert_eq!(entities.price, Some(Decimal::new(950, 0)));
    }

    #[test]
    fn missing_entities_stay_none() {
        let entities = extract_entities("call me back tomorrow");
        assert!(entities.mc_number.is_none());
        assert!(entities.load_id.is_none());
        assert!(entities.price.is_none());
    }

    #[test]
    fn sentiment_follows_keyword_balance() {
        assert_eq!(sentiment("thanks, great rate, happy to accept"), Sentiment::Positive);
        assert_eq!(sentiment("no, that's a bad rate, cannot do it"), Sentiment::Negative);
        assert_eq!(sentiment("let me check the schedule"), Sentiment::Neutral);
        assert_eq!(sentiment(""), Sentiment::Neutral);
    }
}
