use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadId(pub String);

impl LoadId {
    /// Load board files and webhook payloads disagree on surrounding
    /// whitespace, so ids are compared in trimmed form.
    pub fn matches(&self, other: &str) -> bool {
        self.0.trim() == other.trim()
    }
}

/// A shipment listing from the load board. Only `load_id` and
/// `loadboard_rate` matter to negotiation; the rest is carried through for
/// the calling agent to read to the carrier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub load_id: LoadId,
    pub origin: String,
    pub destination: String,
    pub pickup_datetime: String,
    pub delivery_datetime: String,
    pub equipment_type: String,
    pub loadboard_rate: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub commodity_type: Option<String>,
    #[serde(default)]
    pub num_of_pieces: Option<u32>,
    #[serde(default)]
    pub miles: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<String>,
}
