//! Feature records, labels and the versioned stream message

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::{FEATURE_COLUMNS, FEATURE_COUNT, SCHEMA_VERSION};

/// One traffic sample's numeric descriptors.
///
/// Serializes as an object keyed by the dataset column names, in column order.
/// Every field is finite: records are validated on construction and JSON cannot
/// carry NaN or infinity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureRecord {
    #[serde(rename = "Average Packet Size")]
    pub average_packet_size: f64,
    #[serde(rename = "Flow Bytes/s")]
    pub flow_bytes_per_sec: f64,
    #[serde(rename = "Max Packet Length")]
    pub max_packet_length: f64,
    #[serde(rename = "Fwd Packet Length Mean")]
    pub fwd_packet_length_mean: f64,
    #[serde(rename = "Fwd IAT Min")]
    pub fwd_iat_min: f64,
    #[serde(rename = "Total Length of Fwd Packets")]
    pub total_length_fwd_packets: f64,
    #[serde(rename = "Flow IAT Mean")]
    pub flow_iat_mean: f64,
    #[serde(rename = "Fwd IAT Std")]
    pub fwd_iat_std: f64,
    #[serde(rename = "Fwd Packet Length Max")]
    pub fwd_packet_length_max: f64,
    #[serde(rename = "Flow Packets/s")]
    pub flow_packets_per_sec: f64,
}

impl FeatureRecord {
    /// Build a record from values given in `FEATURE_COLUMNS` order
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.len() != FEATURE_COUNT {
            return Err(SchemaError::Arity {
                expected: FEATURE_COUNT,
                got: values.len(),
            });
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(SchemaError::NonFinite {
                feature: FEATURE_COLUMNS[pos],
            });
        }

        Ok(Self {
            average_packet_size: values[0],
            flow_bytes_per_sec: values[1],
            max_packet_length: values[2],
            fwd_packet_length_mean: values[3],
            fwd_iat_min: values[4],
            total_length_fwd_packets: values[5],
            flow_iat_mean: values[6],
            fwd_iat_std: values[7],
            fwd_packet_length_max: values[8],
            flow_packets_per_sec: values[9],
        })
    }

    /// Convert to a vector in `FEATURE_COLUMNS` order
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.average_packet_size,
            self.flow_bytes_per_sec,
            self.max_packet_length,
            self.fwd_packet_length_mean,
            self.fwd_iat_min,
            self.total_length_fwd_packets,
            self.flow_iat_mean,
            self.fwd_iat_std,
            self.fwd_packet_length_max,
            self.flow_packets_per_sec,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.to_vector().iter().all(|v| v.is_finite())
    }
}

/// Binary traffic classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// Class 0
    Benign,
    /// Class 1
    Attack,
}

impl Label {
    pub fn from_class_index(index: usize) -> Result<Self> {
        match index {
            0 => Ok(Label::Benign),
            1 => Ok(Label::Attack),
            other => Err(SchemaError::UnknownClass(other)),
        }
    }

    pub fn class_index(self) -> usize {
        match self {
            Label::Benign => 0,
            Label::Attack => 1,
        }
    }

    /// Map a raw dataset label: the benign marker is class 0, anything else is an attack
    pub fn from_ground_truth(raw: &str, benign_marker: &str) -> Self {
        if raw == benign_marker {
            Label::Benign
        } else {
            Label::Attack
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Benign => "Benign",
            Label::Attack => "Attack",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored record at a fixed position of the replay sequence. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionEvent {
    pub index: u64,
    pub features: FeatureRecord,
    pub prediction: Label,
}

/// Message pushed to dashboard clients, one per `PredictionEvent`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Schema version (see `SCHEMA_VERSION`)
    pub version: u32,
    /// Position of the event in the replay sequence
    pub index: u64,
    /// Raw feature values keyed by column name
    pub features: FeatureRecord,
    /// Predicted class
    pub prediction: Label,
}

impl StreamMessage {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a message payload, rejecting versions this build does not understand
    pub fn decode(payload: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(payload)?;
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        if version != u64::from(SCHEMA_VERSION) {
            return Err(SchemaError::UnsupportedVersion(version));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn into_event(self) -> PredictionEvent {
        PredictionEvent {
            index: self.index,
            features: self.features,
            prediction: self.prediction,
        }
    }
}

impl From<&PredictionEvent> for StreamMessage {
    fn from(event: &PredictionEvent) -> Self {
        Self {
            version: SCHEMA_VERSION,
            index: event.index,
            features: event.features,
            prediction: event.prediction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_values() -> Vec<f64> {
        (1..=FEATURE_COUNT).map(|v| v as f64 * 1.5).collect()
    }

    #[test]
    fn test_from_values_rejects_wrong_arity() {
        let err = FeatureRecord::from_values(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, SchemaError::Arity { expected: 10, got: 2 }));
    }

    #[test]
    fn test_from_values_rejects_infinity() {
        let mut values = sample_values();
        values[3] = f64::INFINITY;
        let err = FeatureRecord::from_values(&values).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::NonFinite {
                feature: "Fwd Packet Length Mean"
            }
        ));
    }

    #[test]
    fn test_to_vector_preserves_column_order() {
        let values = sample_values();
        let record = FeatureRecord::from_values(&values).unwrap();
        assert_eq!(record.to_vector().to_vec(), values);
        assert!(record.is_finite());
    }

    #[test]
    fn test_features_serialize_with_column_names_in_order() {
        let record = FeatureRecord::from_values(&sample_values()).unwrap();
        let json = serde_json::to_string(&record).unwrap();

        let mut last = 0;
        for column in FEATURE_COLUMNS {
            let pos = json
                .find(&format!("\"{column}\""))
                .unwrap_or_else(|| panic!("missing column {column}"));
            assert!(pos >= last, "column {column} out of order");
            last = pos;
        }
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(Label::from_ground_truth("BENIGN", "BENIGN"), Label::Benign);
        assert_eq!(
            Label::from_ground_truth("Web Attack - XSS", "BENIGN"),
            Label::Attack
        );
        assert_eq!(Label::from_ground_truth("benign", "BENIGN"), Label::Attack);
        assert_eq!(Label::from_class_index(1).unwrap(), Label::Attack);
        assert!(Label::from_class_index(2).is_err());
        assert_eq!(serde_json::to_string(&Label::Benign).unwrap(), "\"benign\"");
    }

    #[test]
    fn test_message_decode_matches_encoded_event() {
        let event = PredictionEvent {
            index: 7,
            features: FeatureRecord::from_values(&sample_values()).unwrap(),
            prediction: Label::Attack,
        };
        let payload = StreamMessage::from(&event).encode().unwrap();
        assert!(payload.contains("\"version\":1"));
        assert!(payload.contains("\"prediction\":\"attack\""));

        let decoded = StreamMessage::decode(&payload).unwrap();
        assert_eq!(decoded.into_event(), event);
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let err = StreamMessage::decode(r#"{"version":2,"index":0}"#).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_decode_reports_out_of_range_version_unchanged() {
        let event = PredictionEvent {
            index: 0,
            features: FeatureRecord::from_values(&sample_values()).unwrap(),
            prediction: Label::Benign,
        };
        // 2^32 + 1 must not wrap around to the current version
        let payload = StreamMessage::from(&event)
            .encode()
            .unwrap()
            .replacen("\"version\":1", "\"version\":4294967297", 1);

        let err = StreamMessage::decode(&payload).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedVersion(4294967297)));
        assert_eq!(err.to_string(), "Unsupported schema version: 4294967297");
    }

    #[test]
    fn test_decode_rejects_loosely_quoted_payload() {
        let err = StreamMessage::decode("{'features': {}, 'prediction': '0'}").unwrap_err();
        assert!(matches!(err, SchemaError::Malformed(_)));
    }
}
