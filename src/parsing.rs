use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::PredictedLabel;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parses the timestamps the collector writes.
///
/// RFC 3339 strings keep their offset; naive ISO-8601 strings are read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    // offsets without a colon, e.g. "+0000"
    if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Reads a metric that may arrive as a number, a numeric string or a boolean.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

pub fn value_as_label(value: &Value) -> Option<PredictedLabel> {
    match value {
        Value::String(s) => Some(s.parse().unwrap_or(PredictedLabel::Unknown)),
        _ => None,
    }
}

pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_timestamp(&s),
        // epoch seconds
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(|secs| DateTime::from_timestamp_millis((secs * 1000.0) as i64)),
        _ => None,
    })
}

pub fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

pub fn deserialize_label<'de, D>(deserializer: D) -> Result<Option<PredictedLabel>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();

        // RFC 3339 with offset
        assert_eq!(parse_timestamp("2024-05-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:30:00.000000+00:00"), Some(expected));

        // Naive timestamps are UTC
        assert_eq!(parse_timestamp("2024-05-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("  2024-05-01T12:30:00.000  "), Some(expected));

        // Invalid inputs
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-01T00:00:00"), None);
    }

    #[test]
    fn test_value_as_f64() {
        assert_eq!(value_as_f64(&json!(42)), Some(42.0));
        assert_eq!(value_as_f64(&json!(0.25)), Some(0.25));
        assert_eq!(value_as_f64(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(value_as_f64(&json!(true)), Some(1.0));
        assert_eq!(value_as_f64(&json!(false)), Some(0.0));

        assert_eq!(value_as_f64(&json!("n/a")), None);
        assert_eq!(value_as_f64(&json!("NaN")), None);
        assert_eq!(value_as_f64(&json!(null)), None);
        assert_eq!(value_as_f64(&json!([1, 2])), None);
    }

    #[test]
    fn test_value_as_label() {
        assert_eq!(value_as_label(&json!("good")), Some(PredictedLabel::Good));
        assert_eq!(value_as_label(&json!("BAD")), Some(PredictedLabel::Bad));
        assert_eq!(value_as_label(&json!("alert")), Some(PredictedLabel::Alert));
        assert_eq!(value_as_label(&json!("critical")), Some(PredictedLabel::Unknown));
        assert_eq!(value_as_label(&json!(1)), None);
    }

    #[test]
    fn test_row_boundary_validation() {
        use crate::types::{NodeRow, PodRow};

        let pod: PodRow = serde_json::from_value(json!({
            "pod": "api-0",
            "namespace": "default",
            "timestamp": "2024-05-01T12:30:00",
            "cpu_usage": "35.5",
            "memory_usage": 120,
            "restarts": 2,
            "predicted_label": "alert",
            "prob_alert": 0.7
        }))
        .unwrap();

        assert_eq!(pod.pod.as_deref(), Some("api-0"));
        assert_eq!(pod.cpu_usage, Some(35.5));
        assert_eq!(pod.memory_usage, Some(120.0));
        assert_eq!(pod.predicted_label, Some(PredictedLabel::Alert));
        assert!(pod.timestamp.is_some());
        assert_eq!(pod.extra.get("prob_alert"), Some(&json!(0.7)));

        // Garbage never fails the whole row
        let node: NodeRow = serde_json::from_value(json!({
            "node_name": "worker-1",
            "timestamp": "not a date",
            "cpu_usage": "high",
            "predicted_label": null
        }))
        .unwrap();

        assert_eq!(node.node_name.as_deref(), Some("worker-1"));
        assert_eq!(node.timestamp, None);
        assert_eq!(node.cpu_usage, None);
        assert_eq!(node.predicted_label, None);
    }
}
