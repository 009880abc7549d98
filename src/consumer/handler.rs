//! Per-message processing: decode, validate, fold into the store, log
//!
//! Validation failures drop the message. The caller still acknowledges it;
//! only a crash before the ack leads to redelivery.

use crate::{
    state::AggregateStore,
    stats::format_stat,
    window::ReadingSnapshot,
};
use serde_json::{Map, Value};

/// Substituted when a message carries no usable sensor id
pub const UNKNOWN_SENSOR_ID: &str = "UNKNOWN_ID";

const PREVIEW_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing or invalid 'sensorType'")]
    InvalidSensorType,
    #[error("missing or invalid 'value' for type {0}")]
    InvalidValue(String),
}

/// A validated reading decoded from the wire
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub sensor_id: String,
    pub sensor_type: String,
    pub value: f64,
}

impl SensorReading {
    /// Decode and validate one payload
    ///
    /// Accepts `sensorId`/`sensorType` as well as the publisher's
    /// `sensor_id`/`sensor_type`. Extra fields are ignored.
    pub fn from_payload(payload: &[u8]) -> Result<Self, MessageError> {
        let document: Value = serde_json::from_slice(payload)?;
        let fields = document.as_object().ok_or(MessageError::NotAnObject)?;

        let sensor_type = field(fields, "sensorType", "sensor_type")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or(MessageError::InvalidSensorType)?
            .to_string();

        let value = field(fields, "value", "value")
            .filter(|v| v.is_number())
            .and_then(Value::as_f64)
            .ok_or_else(|| MessageError::InvalidValue(sensor_type.clone()))?;

        let sensor_id = match field(fields, "sensorId", "sensor_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            Some(id) => id.to_string(),
            None => {
                log::warn!(
                    "Received message missing or invalid 'sensorId' for type {}: {}",
                    sensor_type,
                    payload_preview(payload)
                );
                UNKNOWN_SENSOR_ID.to_string()
            }
        };

        Ok(Self {
            sensor_id,
            sensor_type,
            value,
        })
    }
}

fn field<'a>(fields: &'a Map<String, Value>, name: &str, alias: &str) -> Option<&'a Value> {
    fields
        .get(name)
        .filter(|v| !v.is_null())
        .or_else(|| fields.get(alias))
}

/// First characters of a payload for log context
pub fn payload_preview(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

/// Result of a successfully folded message
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedReading {
    pub reading: SensorReading,
    pub snapshot: ReadingSnapshot,
}

impl ProcessedReading {
    /// The per-message log line
    pub fn log_line(&self) -> String {
        format!(
            "[{}] Msg Rcvd (ID: {}): Value={:.2}. Stats (last {}): Mean={}, StDev={}",
            self.reading.sensor_type,
            self.reading.sensor_id,
            self.reading.value,
            self.snapshot.window_len,
            format_stat(self.snapshot.mean),
            format_stat(self.snapshot.stdev)
        )
    }
}

/// Validate a payload and fold it into the store
///
/// The store is only touched once validation has passed, so a rejected
/// message never creates a category or bumps a count.
pub fn process_payload(
    store: &AggregateStore,
    payload: &[u8],
) -> Result<ProcessedReading, MessageError> {
    let reading = SensorReading::from_payload(payload)?;
    let snapshot = store.record_reading(&reading.sensor_type, reading.value);
    Ok(ProcessedReading { reading, snapshot })
}

/// Process one delivery body end to end, including logging
///
/// Returns `true` when the reading was recorded, `false` when dropped.
/// Logging happens after the store lock has been released.
pub fn handle_payload(store: &AggregateStore, payload: &[u8]) -> bool {
    match process_payload(store, payload) {
        Ok(processed) => {
            if store.should_log(&processed.reading.sensor_type) {
                log::info!("{}", processed.log_line());
            }
            true
        }
        Err(MessageError::Malformed(e)) => {
            log::warn!("Received non-JSON message ({}): {}", e, payload_preview(payload));
            false
        }
        Err(e) => {
            log::warn!("Dropping message, {}: {}", e, payload_preview(payload));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camel_case_payload() {
        let reading = SensorReading::from_payload(
            br#"{"sensorId":"s-1","sensorType":"Temperature","value":21.5,"timestamp":1700000000}"#,
        )
        .unwrap();

        assert_eq!(reading.sensor_id, "s-1");
        assert_eq!(reading.sensor_type, "Temperature");
        assert_eq!(reading.value, 21.5);
    }

    #[test]
    fn test_parse_snake_case_payload() {
        let reading = SensorReading::from_payload(
            br#"{"sensor_id":"9f1c","sensor_type":"Humidity","value":55}"#,
        )
        .unwrap();

        assert_eq!(reading.sensor_id, "9f1c");
        assert_eq!(reading.sensor_type, "Humidity");
        assert_eq!(reading.value, 55.0);
    }

    #[test]
    fn test_missing_sensor_id_uses_sentinel() {
        let reading =
            SensorReading::from_payload(br#"{"sensorType":"Pressure","value":1013.2}"#).unwrap();
        assert_eq!(reading.sensor_id, UNKNOWN_SENSOR_ID);

        let reading =
            SensorReading::from_payload(br#"{"sensorId":42,"sensorType":"Pressure","value":1}"#)
                .unwrap();
        assert_eq!(reading.sensor_id, UNKNOWN_SENSOR_ID);
    }

    #[test]
    fn test_invalid_payloads_rejected() {
        assert!(matches!(
            SensorReading::from_payload(b"not json"),
            Err(MessageError::Malformed(_))
        ));
        assert!(matches!(
            SensorReading::from_payload(b"[1, 2, 3]"),
            Err(MessageError::NotAnObject)
        ));
        assert!(matches!(
            SensorReading::from_payload(br#"{"value":1.0}"#),
            Err(MessageError::InvalidSensorType)
        ));
        assert!(matches!(
            SensorReading::from_payload(br#"{"sensorType":"","value":1.0}"#),
            Err(MessageError::InvalidSensorType)
        ));
        assert!(matches!(
            SensorReading::from_payload(br#"{"sensorType":7,"value":1.0}"#),
            Err(MessageError::InvalidSensorType)
        ));
        assert!(matches!(
            SensorReading::from_payload(br#"{"sensorType":"Temp","value":"12.5"}"#),
            Err(MessageError::InvalidValue(_))
        ));
        assert!(matches!(
            SensorReading::from_payload(br#"{"sensorType":"Temp","value":null}"#),
            Err(MessageError::InvalidValue(_))
        ));
        assert!(matches!(
            SensorReading::from_payload(br#"{"sensorType":"Temp","value":true}"#),
            Err(MessageError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_dropped_messages_leave_store_untouched() {
        let store = AggregateStore::new(10);

        assert!(!handle_payload(&store, b"\xff\xfe garbage"));
        assert!(!handle_payload(&store, br#"{"value":3.0}"#));
        assert!(!handle_payload(&store, br#"{"sensorType":"Temp","value":"x"}"#));

        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_handle_payload_records_reading() {
        let store = AggregateStore::new(10);
        assert!(handle_payload(&store, br#"{"sensorType":"Temp","value":5}"#));

        let snapshot = store.snapshot();
        let window = &snapshot["Temp"];
        assert_eq!(window.count(), 1);
        assert_eq!(window.mean(), Some(5.0));
        assert_eq!(window.stdev(), None);
    }

    #[test]
    fn test_log_line_formats_missing_stats() {
        let store = AggregateStore::new(10);
        let processed =
            process_payload(&store, br#"{"sensorId":"t1","sensorType":"Temp","value":5}"#).unwrap();

        assert_eq!(
            processed.log_line(),
            "[Temp] Msg Rcvd (ID: t1): Value=5.00. Stats (last 1): Mean=5.00, StDev=N/A"
        );
    }

    #[test]
    fn test_payload_preview_truncates() {
        let long = "x".repeat(250);
        let preview = payload_preview(long.as_bytes());
        assert_eq!(preview.len(), PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
        assert_eq!(payload_preview(b"short"), "short");
    }
}
