use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mode de fonctionnement diffusé aux bots (baseline + profils de charge)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    NormalTraffic,
    HighTraffic,
    UdpFlood,
    TcpFlood,
    HttpFlood,
    IcmpFlood,
}

impl Mode {
    /// Ordre fixe des modes, le premier est le mode de départ
    pub const ALL: [Mode; 6] = [
        Mode::NormalTraffic,
        Mode::HighTraffic,
        Mode::UdpFlood,
        Mode::TcpFlood,
        Mode::HttpFlood,
        Mode::IcmpFlood,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::NormalTraffic => "normal_traffic",
            Mode::HighTraffic => "high_traffic",
            Mode::UdpFlood => "udp_flood",
            Mode::TcpFlood => "tcp_flood",
            Mode::HttpFlood => "http_flood",
            Mode::IcmpFlood => "icmp_flood",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown mode: {0}")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

/// Observation normalisée, une ligne du fichier de sortie.
/// `metrics` et `syscalls` suivent l'ordre du `RecordSchema` qui l'a produite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub timestamp: String,
    pub mode: Mode,
    pub hostname: String,
    pub metrics: Vec<f64>,
    pub syscalls: Vec<u64>,
}

impl Record {
    /// Cellules texte dans l'ordre de l'en-tête
    pub fn cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(3 + self.metrics.len() + self.syscalls.len());
        cells.push(self.timestamp.clone());
        cells.push(self.mode.as_str().to_string());
        cells.push(self.hostname.clone());
        cells.extend(self.metrics.iter().map(|v| format_metric(*v)));
        cells.extend(self.syscalls.iter().map(|v| v.to_string()));
        cells
    }
}

/// Représentation décimale la plus courte qui relit la même valeur,
/// toujours avec une partie décimale ou un exposant (`0.0`, `1.5`, `1e16`)
pub fn format_metric(value: f64) -> String {
    format!("{value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names_roundtrip() {
        for mode in Mode::ALL {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
        assert_eq!(Mode::default(), Mode::NormalTraffic);
        assert!("syn_flood".parse::<Mode>().is_err());
    }

    #[test]
    fn test_mode_serde_uses_wire_names() {
        let json = serde_json::to_string(&Mode::IcmpFlood).unwrap();
        assert_eq!(json, "\"icmp_flood\"");
    }

    #[test]
    fn test_format_metric() {
        assert_eq!(format_metric(0.0), "0.0");
        assert_eq!(format_metric(1.5), "1.5");
        assert_eq!(format_metric(42.0), "42.0");
        assert_eq!(format_metric(-0.25), "-0.25");
        assert_eq!(format_metric(1e15), "1000000000000000.0");
        assert_eq!(format_metric(1e16), "1e16");
        assert_eq!(format_metric(1e300), "1e300");
        assert_eq!(format_metric(12345678.9), "12345678.9");
    }

    #[test]
    fn test_record_cells_order() {
        let record = Record {
            timestamp: "2024-01-01 00:00:00".into(),
            mode: Mode::UdpFlood,
            hostname: "bot-1".into(),
            metrics: vec![1.5, 0.0],
            syscalls: vec![3, 0],
        };
        assert_eq!(
            record.cells(),
            vec!["2024-01-01 00:00:00", "udp_flood", "bot-1", "1.5", "0.0", "3", "0"]
        );
    }
}
