use crate::scheduler::SwitchInterval;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "MODEHUB_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "modehub.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {key}: {value}")]
    Env { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub bind_address: String,
    pub control_port: u16,
    pub data_port: u16,
    pub output_path: PathBuf,
    /// nombre de bots contrôle avant le premier changement de mode
    pub expected_connections: usize,
    pub switch_interval: SwitchIntervalConf,
    pub max_report_bytes: usize,
    /// 0 désactive le log périodique
    pub stats_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchIntervalConf {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            control_port: 7745,
            data_port: 7746,
            output_path: PathBuf::from("collected_data.csv"),
            expected_connections: 2,
            switch_interval: SwitchIntervalConf::default(),
            max_report_bytes: 64 * 1024,
            stats_interval_secs: 60,
        }
    }
}

impl Default for SwitchIntervalConf {
    fn default() -> Self {
        Self {
            min_secs: 5.0,
            max_secs: 15.0,
        }
    }
}

impl ControllerConfig {
    pub fn from_yaml(txt: &str, path: &Path) -> Result<Self, ConfigError> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(txt).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Surcharges ponctuelles via variables d'environnement
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MODEHUB_CONTROL_PORT") {
            self.control_port = parse_env("MODEHUB_CONTROL_PORT", v)?;
        }
        if let Some(v) = lookup("MODEHUB_DATA_PORT") {
            self.data_port = parse_env("MODEHUB_DATA_PORT", v)?;
        }
        if let Some(v) = lookup("MODEHUB_OUTPUT") {
            self.output_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MODEHUB_EXPECTED_CONNECTIONS") {
            self.expected_connections = parse_env("MODEHUB_EXPECTED_CONNECTIONS", v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_port != 0 && self.control_port == self.data_port {
            return Err(ConfigError::Invalid(format!(
                "control_port and data_port are both {}",
                self.control_port
            )));
        }
        if self.expected_connections == 0 {
            return Err(ConfigError::Invalid("expected_connections must be >= 1".into()));
        }
        let SwitchIntervalConf { min_secs, max_secs } = self.switch_interval;
        if Duration::try_from_secs_f64(min_secs).is_err()
            || Duration::try_from_secs_f64(max_secs).is_err()
        {
            return Err(ConfigError::Invalid(
                "switch_interval bounds must be finite and non-negative".into(),
            ));
        }
        if min_secs > max_secs {
            return Err(ConfigError::Invalid(format!(
                "switch_interval.min_secs ({min_secs}) > max_secs ({max_secs})"
            )));
        }
        if self.max_report_bytes == 0 {
            return Err(ConfigError::Invalid("max_report_bytes must be > 0".into()));
        }
        Ok(())
    }

    /// Bornes invalides ramenées à zéro, `validate` les refuse en amont
    pub fn switch_interval(&self) -> SwitchInterval {
        let secs = |s: f64| Duration::try_from_secs_f64(s).unwrap_or(Duration::ZERO);
        SwitchInterval::new(
            secs(self.switch_interval.min_secs),
            secs(self.switch_interval.max_secs),
        )
    }

    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    pub fn data_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.data_port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { key, value })
}

/// Charge `modehub.yaml` (ou `$MODEHUB_CONFIG`), applique l'environnement et valide
pub async fn load_config() -> Result<ControllerConfig, ConfigError> {
    let path =
        PathBuf::from(std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into()));

    let mut config = if path.exists() {
        let txt = fs::read_to_string(&path).await.map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "[config] loaded");
        ControllerConfig::from_yaml(&txt, &path)?
    } else {
        warn!(path = %path.display(), "[config] no config file, using defaults");
        ControllerConfig::default()
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
