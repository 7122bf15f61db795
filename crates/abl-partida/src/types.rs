//! Data model: coordinates, upstream payload shapes and resolution results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Geographic point as received from the caller. Not validated; bad values
/// are forwarded upstream and surface as upstream errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lat, self.lng)
    }
}

/// One functional unit of a horizontal property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyUnit {
    pub pdahorizontal: String,
    pub piso: String,
    pub dpto: String,
}

impl PropertyUnit {
    /// Keep only the three identifying fields of an upstream unit entry.
    pub fn from_upstream(raw: &Value) -> Self {
        Self {
            pdahorizontal: text_field(raw, "pdahorizontal"),
            piso: text_field(raw, "piso"),
            dpto: text_field(raw, "dpto"),
        }
    }
}

fn text_field(raw: &Value, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Resolved tax-record data: every unit of a horizontal property, or the
/// single matrix identifier of a plain parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AblData {
    Units(Vec<PropertyUnit>),
    Matrix(String),
}

/// Answer to "does a tax record exist here?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerificationOutcome {
    Success {
        message: String,
        /// Unit entries exactly as returned upstream.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phs: Option<Vec<Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pdamatriz: Option<String>,
    },
    #[serde(rename = "error")]
    Failure { message: String },
}

pub const MSG_RECORD_EXISTS: &str = "La partida existe";
pub const MSG_NO_RECORD: &str = "La partida no existe";
pub const MSG_NO_UNITS: &str = "La partida no existe (sin unidades funcionales)";

impl VerificationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            VerificationOutcome::Success { message, .. } | VerificationOutcome::Failure { message } => {
                message
            }
        }
    }
}

/// Shape of a base cadastral payload, decoded once.
///
/// The horizontal flag wins over a matrix identifier when both are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParcelRecord {
    /// `propiedad_horizontal == "Si"`: units must be fetched separately.
    Horizontal,
    /// Plain parcel with its matrix identifier.
    Matrix(String),
    /// Neither field usable.
    Unregistered,
}

impl ParcelRecord {
    pub fn decode(payload: &Value) -> Self {
        if payload.get("propiedad_horizontal").and_then(Value::as_str) == Some("Si") {
            return ParcelRecord::Horizontal;
        }
        match payload.get("pdamatriz") {
            Some(Value::String(s)) if !s.is_empty() => ParcelRecord::Matrix(s.clone()),
            Some(Value::Number(n)) if n.as_f64() != Some(0.0) => ParcelRecord::Matrix(n.to_string()),
            _ => ParcelRecord::Unregistered,
        }
    }
}

/// Unit entries of a horizontal-property payload. Anything but an array
/// under `phs` counts as no units.
pub fn horizontal_units(payload: &Value) -> Vec<Value> {
    payload
        .get("phs")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_horizontal_takes_priority() {
        let payload = json!({"propiedad_horizontal": "Si", "pdamatriz": "456"});
        assert_eq!(ParcelRecord::decode(&payload), ParcelRecord::Horizontal);
    }

    #[test]
    fn test_decode_matrix() {
        let payload = json!({"propiedad_horizontal": "No", "pdamatriz": "456"});
        assert_eq!(ParcelRecord::decode(&payload), ParcelRecord::Matrix("456".into()));
        assert_eq!(
            ParcelRecord::decode(&json!({"pdamatriz": 789})),
            ParcelRecord::Matrix("789".into())
        );
    }

    #[test]
    fn test_decode_unregistered() {
        for payload in [
            json!({}),
            json!({"pdamatriz": ""}),
            json!({"pdamatriz": null}),
            json!({"pdamatriz": 0}),
            json!({"propiedad_horizontal": "si"}),
            json!([1, 2, 3]),
        ] {
            assert_eq!(ParcelRecord::decode(&payload), ParcelRecord::Unregistered, "{payload}");
        }
    }

    #[test]
    fn test_horizontal_units_tolerates_bad_shapes() {
        assert!(horizontal_units(&json!({})).is_empty());
        assert!(horizontal_units(&json!({"phs": null})).is_empty());
        assert!(horizontal_units(&json!({"phs": "nope"})).is_empty());
        assert_eq!(horizontal_units(&json!({"phs": [{"piso": "1"}]})).len(), 1);
    }

    #[test]
    fn test_unit_keeps_identifying_fields_only() {
        let raw = json!({"pdahorizontal": "123", "piso": 1, "dpto": "A", "superficie": 50});
        let unit = PropertyUnit::from_upstream(&raw);
        assert_eq!(
            unit,
            PropertyUnit {
                pdahorizontal: "123".into(),
                piso: "1".into(),
                dpto: "A".into(),
            }
        );
        assert_eq!(PropertyUnit::from_upstream(&json!({})).dpto, "");
    }

    #[test]
    fn test_outcome_wire_shape() {
        let ok = VerificationOutcome::Success {
            message: MSG_RECORD_EXISTS.into(),
            phs: None,
            pdamatriz: Some("456".into()),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "success", "message": "La partida existe", "pdamatriz": "456"})
        );

        let failure = VerificationOutcome::Failure {
            message: MSG_NO_RECORD.into(),
        };
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            json!({"status": "error", "message": "La partida no existe"})
        );
        assert!(!failure.is_success());
    }

    #[test]
    fn test_abl_data_serializes_untagged() {
        assert_eq!(serde_json::to_value(AblData::Matrix("456".into())).unwrap(), json!("456"));
        let units = AblData::Units(vec![PropertyUnit {
            pdahorizontal: "1".into(),
            piso: "PB".into(),
            dpto: "B".into(),
        }]);
        assert_eq!(
            serde_json::to_value(units).unwrap(),
            json!([{"pdahorizontal": "1", "piso": "PB", "dpto": "B"}])
        );
    }
}
