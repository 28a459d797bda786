//! Payload codec
//!
//! Maps a field map to and from the compact text carried inside one QR
//! symbol. The canonical encoding is a JSON object with keys in lexicographic
//! order and no whitespace, so the same field map always encodes to the same
//! bytes and payload fingerprints can be compared directly.
//!
//! Decoding is all-or-nothing: either every key is known and every value fits
//! its declared type, or nothing is returned.

use crate::record::{FieldMap, FieldValue};
use crate::schema::{FieldDescriptor, FieldSchema, FieldType};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Largest byte payload a version 40 QR symbol holds (binary mode, level L);
/// longer text cannot have come from a scan
pub const QR_CAPACITY_BYTES: usize = 2953;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Text is not a scouting payload at all
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Payload structure is right, but a key or value does not fit the schema
    #[error("Schema mismatch on '{field}': {reason}")]
    SchemaMismatch { field: String, reason: String },
}

/// Canonical encoding of a field map
pub fn encode(fields: &FieldMap) -> String {
    let object: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(id, value)| (id.clone(), to_json(value)))
        .collect();
    Value::Object(object).to_string()
}

/// Decode payload text into a field map
///
/// `null` values count as omitted. Counters also accept integer strings and
/// booleans also accept `0`/`1`, matching what the scouting form emits.
pub fn decode(schema: &FieldSchema, text: &str) -> Result<FieldMap, DecodeError> {
    if text.len() > QR_CAPACITY_BYTES {
        return Err(DecodeError::MalformedPayload(format!(
            "{} bytes is more than one QR code holds ({} bytes)",
            text.len(),
            QR_CAPACITY_BYTES
        )));
    }

    let parsed: Value = serde_json::from_str(text.trim())
        .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

    let Value::Object(object) = parsed else {
        return Err(DecodeError::MalformedPayload(
            "expected a JSON object".to_string(),
        ));
    };

    let mut fields = FieldMap::new();
    for (id, raw) in object {
        let descriptor = schema.field(&id).ok_or_else(|| DecodeError::SchemaMismatch {
            field: id.clone(),
            reason: "unknown field".to_string(),
        })?;

        if raw.is_null() {
            continue;
        }

        let value = coerce(descriptor, &raw).map_err(|reason| DecodeError::SchemaMismatch {
            field: id.clone(),
            reason,
        })?;
        descriptor
            .check(&value)
            .map_err(|reason| DecodeError::SchemaMismatch {
                field: id.clone(),
                reason,
            })?;

        fields.insert(id, value);
    }

    Ok(fields)
}

/// Lowercase hex SHA-256 of the canonical encoding
pub fn fingerprint(fields: &FieldMap) -> String {
    let digest = Sha256::digest(encode(fields).as_bytes());
    format!("{:x}", digest)
}

fn to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Boolean(b) => Value::Bool(*b),
        FieldValue::Integer(i) => Value::from(*i),
        FieldValue::Text(s) => Value::String(s.clone()),
    }
}

fn coerce(descriptor: &FieldDescriptor, raw: &Value) -> Result<FieldValue, String> {
    match (&descriptor.field_type, raw) {
        (FieldType::Counter { .. }, Value::Number(n)) => n
            .as_i64()
            .map(FieldValue::Integer)
            .ok_or_else(|| format!("{} is not an integer", n)),
        (FieldType::Counter { .. }, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| format!("'{}' is not an integer", s)),
        (FieldType::Boolean, Value::Bool(b)) => Ok(FieldValue::Boolean(*b)),
        (FieldType::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(FieldValue::Boolean(false)),
            Some(1) => Ok(FieldValue::Boolean(true)),
            _ => Err(format!("{} is not a boolean", n)),
        },
        (
            FieldType::Choice { .. } | FieldType::Text { .. } | FieldType::Timestamp,
            Value::String(s),
        ) => Ok(FieldValue::Text(s.clone())),
        (_, other) => Err(format!("unexpected JSON value {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "timestamp": "2024-03-02T10:15:00.000Z",
        "match_number": 12,
        "team_number": 254,
        "alliance": "Red",
        "scouter_name": "Ada",
        "auto_balls_scored_upper": 2,
        "auto_taxi": true,
        "climb_level": "High",
        "notes": "fast cycles"
    }"#;

    #[test]
    fn test_decode_then_encode_round_trips() {
        let schema = FieldSchema::builtin();
        let fields = decode(&schema, SAMPLE).unwrap();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields["auto_balls_scored_upper"], FieldValue::Integer(2));

        let text = encode(&fields);
        assert_eq!(decode(&schema, &text).unwrap(), fields);
    }

    #[test]
    fn test_full_record_round_trips() {
        let schema = FieldSchema::builtin();
        let fields = schema.with_defaults(decode(&schema, SAMPLE).unwrap());
        assert_eq!(decode(&schema, &encode(&fields)).unwrap(), fields);
    }

    #[test]
    fn test_encoding_is_canonical() {
        let schema = FieldSchema::builtin();
        let reordered = r#"{"notes":"fast cycles","climb_level":"High","auto_taxi":true,
            "auto_balls_scored_upper":2,"scouter_name":"Ada","alliance":"Red",
            "team_number":254,"match_number":12,"timestamp":"2024-03-02T10:15:00.000Z"}"#;

        let a = encode(&decode(&schema, SAMPLE).unwrap());
        let b = encode(&decode(&schema, reordered).unwrap());
        assert_eq!(a, b);
        assert!(a.starts_with(r#"{"alliance":"Red","auto_balls_scored_upper":2"#));
        assert_eq!(
            fingerprint(&decode(&schema, SAMPLE).unwrap()),
            fingerprint(&decode(&schema, reordered).unwrap())
        );
    }

    #[test]
    fn test_malformed_payloads() {
        let schema = FieldSchema::builtin();
        for text in ["", "hello", "[1,2,3]", "{\"match_number\": 1", "42"] {
            assert!(
                matches!(decode(&schema, text), Err(DecodeError::MalformedPayload(_))),
                "expected malformed for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_unknown_key_is_schema_mismatch() {
        let schema = FieldSchema::builtin();
        let err = decode(&schema, r#"{"match_number": 1, "t": 254, "w": 120.5}"#).unwrap_err();
        assert!(matches!(err, DecodeError::SchemaMismatch { ref field, .. } if field == "t" || field == "w"));
    }

    #[test]
    fn test_out_of_bounds_and_bad_option() {
        let schema = FieldSchema::builtin();
        let err = decode(&schema, r#"{"auto_balls_scored_upper": 21}"#).unwrap_err();
        assert!(matches!(err, DecodeError::SchemaMismatch { ref field, .. } if field == "auto_balls_scored_upper"));

        let err = decode(&schema, r#"{"climb_level": "Moon"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::SchemaMismatch { ref field, .. } if field == "climb_level"));

        let err = decode(&schema, r#"{"auto_taxi": "yes"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::SchemaMismatch { ref field, .. } if field == "auto_taxi"));
    }

    #[test]
    fn test_lenient_scalar_forms() {
        let schema = FieldSchema::builtin();
        let fields = decode(
            &schema,
            r#"{"match_number": "14", "auto_taxi": 1, "broke_down": 0, "climb_time": null}"#,
        )
        .unwrap();
        assert_eq!(fields["match_number"], FieldValue::Integer(14));
        assert_eq!(fields["auto_taxi"], FieldValue::Boolean(true));
        assert_eq!(fields["broke_down"], FieldValue::Boolean(false));
        assert!(!fields.contains_key("climb_time"));
    }

    #[test]
    fn test_fractional_counter_rejected() {
        let schema = FieldSchema::builtin();
        assert!(decode(&schema, r#"{"penalties": 1.5}"#).is_err());
    }

    #[test]
    fn test_full_payload_fits_one_qr_symbol() {
        let schema = FieldSchema::builtin();
        let mut fields = schema.with_defaults(decode(&schema, SAMPLE).unwrap());
        fields.insert("notes".into(), FieldValue::Text("x".repeat(500)));
        fields.insert("scouter_name".into(), FieldValue::Text("y".repeat(64)));
        assert!(encode(&fields).len() < QR_CAPACITY_BYTES);
    }

    #[test]
    fn test_oversized_text_is_malformed() {
        let schema = FieldSchema::builtin();
        let padded = format!("{}{}", SAMPLE, " ".repeat(QR_CAPACITY_BYTES));
        assert!(matches!(decode(&schema, &padded), Err(DecodeError::MalformedPayload(_))));

        let notes = format!(r#"{{"notes": "{}"}}"#, "x".repeat(QR_CAPACITY_BYTES));
        let err = decode(&schema, &notes).unwrap_err();
        assert!(err.to_string().contains("more than one QR code holds"));
    }
}
