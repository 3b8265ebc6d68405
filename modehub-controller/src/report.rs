/**
 * TELEMETRY REPORT - Décodage et normalisation des rapports envoyés par les bots
 *
 * RÔLE : Valider la structure d'un objet JSON reçu sur le canal données puis
 * le projeter sur le `RecordSchema` (valeurs par défaut pour les champs absents).
 *
 * Les clés inconnues sont ignorées, les clés manquantes ne sont pas une erreur.
 * Un rapport sans aucune des trois clés de premier niveau est rejeté.
 */

use crate::models::{Mode, Record};
use crate::schema::RecordSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Raisons pour lesquelles un payload est écarté sans enregistrement
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("undecodable payload: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("payload is not a telemetry report: {0}")]
    Structure(#[source] serde_json::Error),
    #[error("report has none of Hostname, ResourceMetrics, Syscalls")]
    MissingKeys,
    #[error("invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: Value },
    #[error("payload exceeds {limit} bytes without a complete report")]
    Oversized { limit: usize },
    #[error("truncated payload ({len} bytes) superseded by a new report")]
    Truncated { len: usize },
}

#[derive(Debug, Deserialize)]
struct WireReport {
    #[serde(rename = "Hostname", default)]
    hostname: Option<String>,
    #[serde(rename = "ResourceMetrics", default)]
    resource_metrics: Option<Map<String, Value>>,
    #[serde(rename = "Syscalls", default)]
    syscalls: Option<Map<String, Value>>,
}

/// Rapport validé, restreint aux champs catalogués
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryReport {
    pub hostname: String,
    pub metrics: HashMap<&'static str, f64>,
    pub syscalls: HashMap<&'static str, u64>,
}

impl TelemetryReport {
    pub fn from_slice(payload: &[u8], schema: &RecordSchema) -> Result<Self, ReportError> {
        let value: Value = serde_json::from_slice(payload).map_err(ReportError::Decode)?;
        Self::from_value(value, schema)
    }

    pub fn from_value(value: Value, schema: &RecordSchema) -> Result<Self, ReportError> {
        // serde accepte aussi un tableau pour une struct
        if !value.is_object() {
            return Err(ReportError::Structure(serde::de::Error::custom(format!(
                "expected a JSON object, got {value}"
            ))));
        }
        let wire: WireReport = serde_json::from_value(value).map_err(ReportError::Structure)?;

        if wire.hostname.is_none() && wire.resource_metrics.is_none() && wire.syscalls.is_none() {
            return Err(ReportError::MissingKeys);
        }

        let mut report = TelemetryReport {
            hostname: wire.hostname.unwrap_or_default(),
            ..Default::default()
        };

        if let Some(metrics) = wire.resource_metrics {
            for &name in schema.metrics() {
                if let Some(raw) = metrics.get(name) {
                    let value = raw.as_f64().ok_or_else(|| invalid(name, raw))?;
                    report.metrics.insert(name, value);
                }
            }
        }

        if let Some(syscalls) = wire.syscalls {
            for &name in schema.syscalls() {
                if let Some(raw) = syscalls.get(name) {
                    let count = as_counter(raw).ok_or_else(|| invalid(name, raw))?;
                    report.syscalls.insert(name, count);
                }
            }
        }

        Ok(report)
    }

    /// Projette le rapport sur le schéma, `mode` étant le mode courant à la réception
    pub fn into_record(self, schema: &RecordSchema, mode: Mode, timestamp: String) -> Record {
        let metrics = schema
            .metrics()
            .iter()
            .map(|name| self.metrics.get(name).copied().unwrap_or(0.0))
            .collect();
        let syscalls = schema
            .syscalls()
            .iter()
            .map(|name| self.syscalls.get(name).copied().unwrap_or(0))
            .collect();

        Record {
            timestamp,
            mode,
            hostname: self.hostname,
            metrics,
            syscalls,
        }
    }
}

fn invalid(field: &str, raw: &Value) -> ReportError {
    ReportError::InvalidValue {
        field: field.to_string(),
        value: raw.clone(),
    }
}

// certains bots sérialisent les compteurs en flottants (3.0)
fn as_counter(raw: &Value) -> Option<u64> {
    if let Some(n) = raw.as_u64() {
        return Some(n);
    }
    let f = raw.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> RecordSchema {
        RecordSchema::standard()
    }

    #[test]
    fn test_scenario_report_normalizes_with_defaults() {
        let payload =
            br#"{"Hostname":"h1","ResourceMetrics":{"node_load1": 1.5},"Syscalls":{"open": 3}}"#;
        let report = TelemetryReport::from_slice(payload, &schema()).unwrap();
        let timestamp = "2024-05-01 10:00:00".to_string();
        let record = report.into_record(&schema(), Mode::NormalTraffic, timestamp);

        assert_eq!(record.hostname, "h1");
        assert_eq!(record.mode, Mode::NormalTraffic);
        assert_eq!(record.metrics.len(), 26);
        assert_eq!(record.syscalls.len(), 21);

        let load1 = schema().metrics().iter().position(|m| *m == "node_load1").unwrap();
        let open = schema().syscalls().iter().position(|s| *s == "open").unwrap();
        for (i, v) in record.metrics.iter().enumerate() {
            assert_eq!(*v, if i == load1 { 1.5 } else { 0.0 });
        }
        for (i, v) in record.syscalls.iter().enumerate() {
            assert_eq!(*v, if i == open { 3 } else { 0 });
        }
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let value = json!({
            "Hostname": "bot-7",
            "Uptime": 1234,
            "ResourceMetrics": {"node_load5": 0.5, "gpu_temp": "hot"},
            "Syscalls": {"ioctl": 9, "read": 12}
        });
        let report = TelemetryReport::from_value(value, &schema()).unwrap();

        assert_eq!(report.metrics.len(), 1);
        assert_eq!(report.metrics["node_load5"], 0.5);
        assert_eq!(report.syscalls.len(), 1);
        assert_eq!(report.syscalls["read"], 12);
    }

    #[test]
    fn test_partial_report_is_accepted() {
        let report =
            TelemetryReport::from_value(json!({"Syscalls": {"brk": 2.0}}), &schema()).unwrap();
        assert_eq!(report.hostname, "");
        assert_eq!(report.syscalls["brk"], 2);
        assert!(report.metrics.is_empty());
    }

    #[test]
    fn test_missing_all_keys_rejected() {
        let err = TelemetryReport::from_value(json!({"hello": "world"}), &schema()).unwrap_err();
        assert!(matches!(err, ReportError::MissingKeys));

        let err = TelemetryReport::from_value(json!({}), &schema()).unwrap_err();
        assert!(matches!(err, ReportError::MissingKeys));
    }

    #[test]
    fn test_structurally_invalid_rejected() {
        let values = [
            json!([1, 2, 3]),
            json!(["h1"]),
            json!("text"),
            json!({"Hostname": 42}),
            json!({"Syscalls": [1]}),
        ];
        for value in values {
            let err = TelemetryReport::from_value(value, &schema()).unwrap_err();
            assert!(matches!(err, ReportError::Structure(_)), "got {err:?}");
        }
    }

    #[test]
    fn test_invalid_catalogued_values_rejected() {
        let rejected = |value| TelemetryReport::from_value(value, &schema()).unwrap_err();

        let err = rejected(json!({"ResourceMetrics": {"node_load1": "high"}}));
        assert!(
            matches!(err, ReportError::InvalidValue { ref field, .. } if field == "node_load1")
        );

        let err = rejected(json!({"Syscalls": {"open": -1}}));
        assert!(matches!(err, ReportError::InvalidValue { ref field, .. } if field == "open"));

        let err = rejected(json!({"Syscalls": {"open": 2.5}}));
        assert!(matches!(err, ReportError::InvalidValue { .. }));
    }

    #[test]
    fn test_undecodable_payload() {
        let err = TelemetryReport::from_slice(b"{\"Hostname\": ", &schema()).unwrap_err();
        assert!(matches!(err, ReportError::Decode(_)));
    }
}
