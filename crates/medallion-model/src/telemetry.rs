// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

pub const DEVICES: [&str; 5] = ["CNC-001", "CNC-002", "ROBOT-A", "ROBOT-B", "PRESS-04"];

pub const TELEMETRY_REQUIRED_KEYS: [&str; 6] = [
    "event_id",
    "device_id",
    "timestamp",
    "temperature",
    "vibration",
    "status",
];

const TEMPERATURE_MIN: f64 = 60.0;
const TEMPERATURE_MAX: f64 = 95.0;
const VIBRATION_MIN: f64 = 0.1;
const VIBRATION_GENERATED_MAX: f64 = 5.0;
const VIBRATION_LIMIT: f64 = 4.8;
const WARNING_STATUS: &str = "WARNING";
const STATUS_WEIGHTS: [(&str, u32); 2] = [("OK", 6), (WARNING_STATUS, 1)];

/// One raw sensor reading on the bronze topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub event_id: String,
    pub device_id: String,
    pub timestamp: String,
    pub temperature: f64,
    pub vibration: f64,
    pub status: String,
}

/// One gold-layer aggregate over a window of cleansed readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    pub window_start: String,
    pub window_end: String,
    pub total_events: u64,
    pub avg_temp: f64,
    pub anomaly_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub reason: String,
}

impl ValidationIssue {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Generates `count` synthetic readings spaced one millisecond apart from `start`.
pub fn generate_events<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    start: DateTime<Utc>,
) -> Vec<TelemetryRecord> {
    let total_weight: u32 = STATUS_WEIGHTS.iter().map(|(_, w)| w).sum();
    (0..count)
        .map(|i| {
            let mut pick = rng.gen_range(0..total_weight);
            let status = STATUS_WEIGHTS
                .iter()
                .find(|(_, w)| {
                    if pick < *w {
                        true
                    } else {
                        pick -= w;
                        false
                    }
                })
                .map_or("OK", |(s, _)| *s);
            let timestamp = start + Duration::milliseconds(i as i64);
            TelemetryRecord {
                event_id: uuid::Builder::from_random_bytes(rng.gen())
                    .into_uuid()
                    .to_string(),
                device_id: DEVICES[rng.gen_range(0..DEVICES.len())].to_string(),
                timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Micros, false),
                temperature: rng.gen_range(TEMPERATURE_MIN..=TEMPERATURE_MAX),
                vibration: rng.gen_range(VIBRATION_MIN..=VIBRATION_GENERATED_MAX),
                status: status.to_string(),
            }
        })
        .collect()
}

pub(crate) fn parse_iso_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Checks a raw payload against the cleansing rules, collecting every issue found.
pub fn validate_telemetry(value: &Value) -> Result<TelemetryRecord, Vec<ValidationIssue>> {
    let Some(obj) = value.as_object() else {
        return Err(vec![ValidationIssue::new("$", "payload must be a JSON object")]);
    };
    let mut issues: Vec<ValidationIssue> = TELEMETRY_REQUIRED_KEYS
        .iter()
        .filter(|k| !obj.contains_key(**k))
        .map(|k| ValidationIssue::new(k, "missing"))
        .collect();

    let timestamp = match obj.get("timestamp") {
        Some(Value::String(ts)) if parse_iso_timestamp(ts).is_some() => Some(ts.clone()),
        Some(Value::String(ts)) => {
            issues.push(ValidationIssue::new(
                "timestamp",
                format!("invalid timestamp (not ISO 8601): {ts:?}"),
            ));
            None
        }
        Some(other) => {
            issues.push(ValidationIssue::new(
                "timestamp",
                format!("must be a string in ISO format, got {other}"),
            ));
            None
        }
        None => None,
    };

    let temperature = obj.get("temperature").and_then(|v| {
        let parsed = numeric(v);
        match parsed {
            None => issues.push(ValidationIssue::new(
                "temperature",
                format!("must be float-like, got {v}"),
            )),
            Some(t) if !(TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&t) => {
                issues.push(ValidationIssue::new(
                    "temperature",
                    format!("out of range [60, 95]: {t}"),
                ));
            }
            Some(_) => {}
        }
        parsed
    });

    let vibration = obj.get("vibration").and_then(|v| {
        let parsed = numeric(v);
        match parsed {
            None => issues.push(ValidationIssue::new(
                "vibration",
                format!("must be float-like, got {v}"),
            )),
            Some(x) if x > VIBRATION_LIMIT => issues.push(ValidationIssue::new(
                "vibration",
                format!("above limit 4.8: {x}"),
            )),
            Some(_) => {}
        }
        parsed
    });

    let event_id = obj.get("event_id").and_then(text);
    let device_id = obj.get("device_id").and_then(text);
    let status = obj.get("status").and_then(text);

    if !issues.is_empty() {
        return Err(issues);
    }
    match (event_id, device_id, timestamp, temperature, vibration, status) {
        (
            Some(event_id),
            Some(device_id),
            Some(timestamp),
            Some(temperature),
            Some(vibration),
            Some(status),
        ) => Ok(TelemetryRecord {
            event_id,
            device_id,
            timestamp,
            temperature,
            vibration,
            status,
        }),
        _ => Err(vec![ValidationIssue::new(
            "$",
            "identifier fields must be strings",
        )]),
    }
}

/// Aggregates cleansed readings into one KPI row; `None` when there is nothing to aggregate.
#[must_use]
pub fn compute_kpis(records: &[TelemetryRecord]) -> Option<KpiRecord> {
    if records.is_empty() {
        return None;
    }
    let total = records.len();
    let avg_temp = records.iter().map(|r| r.temperature).sum::<f64>() / total as f64;
    let anomaly_count = records.iter().filter(|r| r.status == WARNING_STATUS).count();

    let mut stamped: Vec<(DateTime<FixedOffset>, &str)> = records
        .iter()
        .filter_map(|r| parse_iso_timestamp(&r.timestamp).map(|ts| (ts, r.timestamp.as_str())))
        .collect();
    stamped.sort_by_key(|(ts, _)| *ts);
    let window_start = stamped.first().map(|(_, raw)| raw.to_string())?;
    let window_end = stamped.last().map(|(_, raw)| raw.to_string())?;

    Some(KpiRecord {
        window_start,
        window_end,
        total_events: total as u64,
        avg_temp: (avg_temp * 100.0).round() / 100.0,
        anomaly_count: anomaly_count as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn reading(ts: &str, temp: f64, status: &str) -> TelemetryRecord {
        TelemetryRecord {
            event_id: "e".into(),
            device_id: "CNC-001".into(),
            timestamp: ts.into(),
            temperature: temp,
            vibration: 1.0,
            status: status.into(),
        }
    }

    #[test]
    fn generated_events_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let start = Utc::now();
        let events = generate_events(&mut rng, 100, start);
        assert_eq!(events.len(), 100);
        for e in &events {
            assert!((60.0..=95.0).contains(&e.temperature));
            assert!((0.1..=5.0).contains(&e.vibration));
            assert!(DEVICES.contains(&e.device_id.as_str()));
            assert!(e.status == "OK" || e.status == "WARNING");
            assert!(parse_iso_timestamp(&e.timestamp).is_some());
        }
        let ids: std::collections::HashSet<_> = events.iter().map(|e| &e.event_id).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn valid_payload_passes() {
        let payload = json!({
            "event_id": "1", "device_id": "CNC-001",
            "timestamp": "2024-05-01T10:00:00.123456+00:00",
            "temperature": 72.5, "vibration": 4.8, "status": "OK"
        });
        let record = validate_telemetry(&payload).expect("valid");
        assert_eq!(record.vibration, 4.8);
    }

    #[test]
    fn naive_iso_timestamps_are_accepted() {
        let payload = json!({
            "event_id": "1", "device_id": "CNC-001",
            "timestamp": "2024-05-01T10:00:00",
            "temperature": "60", "vibration": 0.1, "status": "OK"
        });
        assert!(validate_telemetry(&payload).is_ok());
    }

    #[test]
    fn invalid_payload_collects_every_issue() {
        let payload = json!({
            "event_id": "1",
            "timestamp": "yesterday",
            "temperature": 99.0, "vibration": 4.81, "status": "OK"
        });
        let issues = validate_telemetry(&payload).expect_err("invalid");
        let fields: Vec<_> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["device_id", "timestamp", "temperature", "vibration"]);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(validate_telemetry(&json!("raw text")).is_err());
    }

    #[test]
    fn kpis_aggregate_window_and_anomalies() {
        let records = vec![
            reading("2024-05-01T10:00:02+00:00", 70.0, "OK"),
            reading("2024-05-01T10:00:00+00:00", 80.0, "WARNING"),
            reading("2024-05-01T10:00:01+00:00", 75.56, "OK"),
        ];
        let kpi = compute_kpis(&records).expect("kpi");
        assert_eq!(kpi.total_events, 3);
        assert_eq!(kpi.anomaly_count, 1);
        assert_eq!(kpi.avg_temp, 75.19);
        assert_eq!(kpi.window_start, "2024-05-01T10:00:00+00:00");
        assert_eq!(kpi.window_end, "2024-05-01T10:00:02+00:00");
        assert!(compute_kpis(&[]).is_none());
    }
}
