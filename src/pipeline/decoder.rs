//! Payload decoding from subscription messages to `Reading`
//!
//! Accepts the publisher's JSON shape `{"timestamp": <ms>, "value": <float>}`.
//! Extra fields are ignored. Anything else is a `DecodeError` that the
//! ingestion loop logs and drops before the engine ever sees it.

use super::types::Reading;
use serde::Deserialize;

#[derive(Debug)]
pub enum DecodeError {
    /// Not valid UTF-8
    Encoding(std::str::Utf8Error),
    /// Not JSON, or fields of the wrong type
    Json(serde_json::Error),
    MissingTimestamp,
    NegativeTimestamp(i64),
    MissingValue,
}

impl From<std::str::Utf8Error> for DecodeError {
    fn from(err: std::str::Utf8Error) -> Self {
        DecodeError::Encoding(err)
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err)
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Encoding(e) => write!(f, "Payload is not UTF-8: {}", e),
            DecodeError::Json(e) => write!(f, "Failed to decode JSON payload: {}", e),
            DecodeError::MissingTimestamp => write!(f, "Received data without a valid timestamp"),
            DecodeError::NegativeTimestamp(ts) => write!(f, "Negative timestamp: {}", ts),
            DecodeError::MissingValue => write!(f, "Received data without a value"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Wire shape of an inbound message
#[derive(Debug, Deserialize)]
struct RawReading {
    timestamp: Option<i64>,
    value: Option<f64>,
}

/// Decode one JSON payload (a JSONL line or a message body)
pub fn decode_reading(payload: &str) -> Result<Reading, DecodeError> {
    let raw: RawReading = serde_json::from_str(payload.trim())?;

    let timestamp = raw.timestamp.ok_or(DecodeError::MissingTimestamp)?;
    if timestamp < 0 {
        return Err(DecodeError::NegativeTimestamp(timestamp));
    }

    let value = raw.value.ok_or(DecodeError::MissingValue)?;

    Ok(Reading::new(timestamp, value))
}

/// Decode a raw message body as delivered by a byte-oriented transport
pub fn decode_reading_bytes(payload: &[u8]) -> Result<Reading, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    decode_reading(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_publisher_payload() {
        let reading = decode_reading(r#"{"timestamp": 1700000000000, "value": 12.4}"#).unwrap();

        assert_eq!(reading.timestamp, 1_700_000_000_000);
        assert_eq!(reading.value, 12.4);
    }

    #[test]
    fn test_integer_value_and_extra_fields() {
        let reading =
            decode_reading(r#"{"timestamp": 5, "value": 7, "Variable": "PM2.5", "sensor": "x"}"#)
                .unwrap();

        assert_eq!(reading.value, 7.0);
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(
            decode_reading(r#"{"value": 3.0}"#),
            Err(DecodeError::MissingTimestamp)
        ));
        assert!(matches!(
            decode_reading(r#"{"timestamp": null, "value": 3.0}"#),
            Err(DecodeError::MissingTimestamp)
        ));
        assert!(matches!(
            decode_reading(r#"{"timestamp": 1000}"#),
            Err(DecodeError::MissingValue)
        ));
    }

    #[test]
    fn test_negative_timestamp() {
        assert!(matches!(
            decode_reading(r#"{"timestamp": -1, "value": 3.0}"#),
            Err(DecodeError::NegativeTimestamp(-1))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(decode_reading(r#"{"timestamp": 1"#), Err(DecodeError::Json(_))));
        assert!(matches!(
            decode_reading(r#"{"timestamp": "yesterday", "value": 1.0}"#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(decode_reading("42"), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_decode_bytes() {
        let reading = decode_reading_bytes(br#"{"timestamp": 10, "value": 1.5}"#).unwrap();
        assert_eq!(reading.timestamp, 10);

        assert!(matches!(
            decode_reading_bytes(&[0xff, 0xfe]),
            Err(DecodeError::Encoding(_))
        ));
    }
}
