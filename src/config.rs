use crate::collectors::{DEFAULT_DEVICE_URL, SIMULATED_DATA_URL};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub listen: String,
    pub interval_secs: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceConfig>,
}

/// A monitored machine. Only `url` matters to the pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeviceConfig {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl DeviceConfig {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.id)
    }

    pub fn is_simulated(&self) -> bool {
        self.url == SIMULATED_DATA_URL
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation(
                "поле listen обязательно".to_string(),
            ));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "поле listen должно быть корректным адресом host:port".to_string(),
            ));
        }
        if self.interval_secs < 1 {
            return Err(ConfigError::Validation(
                "interval_secs должно быть >= 1".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_ms должен быть > 0".to_string(),
            ));
        }

        validate_devices(&self.devices)?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Command-line timeout wins over the file; zero is raised to 1 ms.
    pub fn apply_timeout_override(&mut self, timeout_ms: Option<u64>) {
        if let Some(ms) = timeout_ms {
            self.request_timeout_ms = ms.max(1);
        }
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_devices(devices: &[DeviceConfig]) -> Result<(), ConfigError> {
    let mut ids = HashSet::new();
    for device in devices {
        if device.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "devices[*].id не должен быть пустым".to_string(),
            ));
        }
        if !ids.insert(device.id.clone()) {
            return Err(ConfigError::Validation(format!(
                "id устройства '{}' должен быть уникальным",
                device.id
            )));
        }
        let url = device.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Validation(format!(
                "devices '{}' url не должен быть пустым",
                device.id
            )));
        }
        if !device.is_simulated() && !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "devices '{}' url должен начинаться с http:// или https:// либо быть {}",
                device.id, SIMULATED_DATA_URL
            )));
        }
    }
    Ok(())
}

const fn default_request_timeout_ms() -> u64 {
    1000
}

fn default_devices() -> Vec<DeviceConfig> {
    vec![DeviceConfig {
        id: "local".to_string(),
        url: DEFAULT_DEVICE_URL.to_string(),
        name: None,
    }]
}
