/*!
Construction de rapports de télémétrie au format du canal données

Produit les objets JSON `{"Hostname", "ResourceMetrics", "Syscalls"}` tels
qu'un bot les envoie, plus quelques payloads invalides pour les tests.
*/

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    hostname: Option<String>,
    metrics: Map<String, Value>,
    syscalls: Map<String, Value>,
}

impl ReportBuilder {
    pub fn new<S: Into<String>>(hostname: S) -> Self {
        Self {
            hostname: Some(hostname.into()),
            ..Default::default()
        }
    }

    /// Rapport sans `Hostname`
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn metric<S: Into<String>>(mut self, name: S, value: f64) -> Self {
        self.metrics.insert(name.into(), Value::from(value));
        self
    }

    pub fn syscall<S: Into<String>>(mut self, name: S, count: u64) -> Self {
        self.syscalls.insert(name.into(), Value::from(count));
        self
    }

    /// Champ brut, pour tester les valeurs invalides
    pub fn raw_metric<S: Into<String>>(mut self, name: S, value: Value) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn build(self) -> Value {
        let mut report = Map::new();
        if let Some(hostname) = self.hostname {
            report.insert("Hostname".into(), Value::String(hostname));
        }
        if !self.metrics.is_empty() {
            report.insert("ResourceMetrics".into(), Value::Object(self.metrics));
        }
        if !self.syscalls.is_empty() {
            report.insert("Syscalls".into(), Value::Object(self.syscalls));
        }
        Value::Object(report)
    }
}

/// Payloads que le contrôleur doit écarter sans fermer la connexion
pub fn malformed_payloads() -> Vec<&'static [u8]> {
    vec![
        b"not json at all".as_slice(),
        b"{\"Hostname\": \"broken\"".as_slice(),
        b"{}".as_slice(),
        b"{\"Uptime\": 12}".as_slice(),
        b"[\"Hostname\", \"ResourceMetrics\"]".as_slice(),
    ]
}
