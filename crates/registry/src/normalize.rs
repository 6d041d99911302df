use chrono::{DateTime, Utc};
use serde_json::Value;

use loadline_core::{CarrierId, CarrierSnapshot, Provenance};

// The registry is not guaranteed to use one field-naming scheme, so each
// logical attribute is probed through an ordered candidate list.
const ALLOWED_FIELDS: &[&str] =
    &["allowToOperate", "allowedToOperate", "allow_to_operate", "allow", "operatingAuthority"];
const OUT_OF_SERVICE_FIELDS: &[&str] =
    &["outOfService", "out_of_service", "outOfServiceIndicator", "oosStatus"];
const LEGAL_NAME_FIELDS: &[&str] = &["legalName", "legal_name", "dbaName", "name"];
const SNAPSHOT_DATE_FIELDS: &[&str] = &["snapshotDate", "snapshot_date", "recordDate", "asOfDate"];

/// Normalizes a raw registry response into a `CarrierSnapshot`.
pub fn snapshot_from_response(carrier_id: &str, response: &Value) -> CarrierSnapshot {
    let body = unwrap_content(response);

    CarrierSnapshot {
        carrier_id: CarrierId(carrier_id.to_string()),
        legal_name: probe(body, LEGAL_NAME_FIELDS)
            .and_then(Value::as_str)
            .map(str::to_string),
        allowed_to_operate: probe(body, ALLOWED_FIELDS).map(truthy).unwrap_or(false),
        out_of_service: probe(body, OUT_OF_SERVICE_FIELDS).map(truthy).unwrap_or(false),
        snapshot_at: probe(body, SNAPSHOT_DATE_FIELDS)
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
        provenance: Provenance::Verified,
    }
}

/// Some registry deployments wrap the record in a `content` envelope.
fn unwrap_content(response: &Value) -> &Value {
    match response.get("content") {
        Some(inner) if inner.is_object() => inner,
        _ => response,
    }
}

fn probe<'a>(body: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    candidates.iter().find_map(|field| {
        body.get(field).filter(|value| !value.is_null())
    })
}

/// Coerces the registry's assorted flag encodings to a boolean. Anything not
/// recognizably affirmative is false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "y" | "yes" | "true" | "authorized" | "active"
        ),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}
