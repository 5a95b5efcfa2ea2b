use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_DEVICE_ID: &str = "DEVICE_ID";
pub const ENV_SUPERVISOR_URL: &str = "SUPERVISOR_URL";
pub const ENV_CLIENT_CERT: &str = "CLIENT_CERT";
pub const ENV_CLIENT_KEY: &str = "CLIENT_KEY";
pub const ENV_CA_CERT: &str = "CA_CERT";
pub const ENV_REPORT_INTERVAL: &str = "REPORT_INTERVAL";
pub const ENV_REPORT_TIMEOUT: &str = "REPORT_TIMEOUT";
pub const ENV_HEALTH_THRESHOLDS: &str = "HEALTH_THRESHOLDS";

const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Config {
    pub device_id: String,
    pub supervisor_url: reqwest::Url,
    pub tls: TlsConfig,
    pub interval: Duration,
    pub request_timeout: Duration,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
    pub ca_cert: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    #[serde(default = "default_cpu_degraded_percent")]
    pub cpu_degraded_percent: f64,
    #[serde(default = "default_cpu_fail_percent")]
    pub cpu_fail_percent: f64,
    #[serde(default = "default_net_loss_degraded")]
    pub net_loss_degraded: f64,
    #[serde(default = "default_net_loss_fail")]
    pub net_loss_fail: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_degraded_percent: default_cpu_degraded_percent(),
            cpu_fail_percent: default_cpu_fail_percent(),
            net_loss_degraded: default_net_loss_degraded(),
            net_loss_fail: default_net_loss_fail(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("переменная окружения {0} не задана")]
    Missing(&'static str),
    #[error("переменная окружения {name} содержит некорректное значение: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("не удалось прочитать файл порогов {path}: {source}")]
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
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    // Пустые значения считаются незаданными.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let device_id = require(ENV_DEVICE_ID)?;
        let supervisor_url = parse_url(&require(ENV_SUPERVISOR_URL)?)?;
        let tls = TlsConfig {
            client_cert: PathBuf::from(require(ENV_CLIENT_CERT)?),
            client_key: PathBuf::from(require(ENV_CLIENT_KEY)?),
            ca_cert: PathBuf::from(require(ENV_CA_CERT)?),
        };
        let interval = match get(ENV_REPORT_INTERVAL) {
            Some(raw) => parse_duration(ENV_REPORT_INTERVAL, &raw)?,
            None => DEFAULT_INTERVAL,
        };
        let request_timeout = match get(ENV_REPORT_TIMEOUT) {
            Some(raw) => parse_duration(ENV_REPORT_TIMEOUT, &raw)?,
            None => DEFAULT_REQUEST_TIMEOUT.min(interval),
        };
        let thresholds = match get(ENV_HEALTH_THRESHOLDS) {
            Some(path) => Thresholds::load_from_file(path)?,
            None => Thresholds::default(),
        };

        let cfg = Config {
            device_id,
            supervisor_url,
            tls,
            interval,
            request_timeout,
            thresholds,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "идентификатор устройства не должен быть пустым".to_string(),
            ));
        }
        if self.supervisor_url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "адрес супервизора должен использовать https, получено '{}'",
                self.supervisor_url.scheme()
            )));
        }
        if self.interval < Duration::from_secs(1) {
            return Err(ConfigError::Validation(
                "интервал отправки должен быть >= 1s".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "таймаут запроса должен быть > 0".to_string(),
            ));
        }
        if self.request_timeout > self.interval {
            return Err(ConfigError::Validation(format!(
                "таймаут запроса ({}) не должен превышать интервал отправки ({})",
                humantime::format_duration(self.request_timeout),
                humantime::format_duration(self.interval)
            )));
        }

        self.thresholds.validate()
    }
}

impl Thresholds {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let thresholds: Thresholds =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path_display,
                source,
            })?;

        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.cpu_degraded_percent) {
            return Err(ConfigError::Validation(
                "cpu_degraded_percent должно быть в диапазоне 0..100".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.cpu_fail_percent) {
            return Err(ConfigError::Validation(
                "cpu_fail_percent должно быть в диапазоне 0..100".to_string(),
            ));
        }
        if self.cpu_degraded_percent > self.cpu_fail_percent {
            return Err(ConfigError::Validation(
                "cpu_degraded_percent не должно превышать cpu_fail_percent".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.net_loss_degraded) {
            return Err(ConfigError::Validation(
                "net_loss_degraded должно быть в диапазоне 0..1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.net_loss_fail) {
            return Err(ConfigError::Validation(
                "net_loss_fail должно быть в диапазоне 0..1".to_string(),
            ));
        }
        if self.net_loss_degraded > self.net_loss_fail {
            return Err(ConfigError::Validation(
                "net_loss_degraded не должно превышать net_loss_fail".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_url(raw: &str) -> Result<reqwest::Url, ConfigError> {
    reqwest::Url::parse(raw).map_err(|err| ConfigError::Invalid {
        name: ENV_SUPERVISOR_URL,
        reason: err.to_string(),
    })
}

fn parse_duration(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw).map_err(|err| ConfigError::Invalid {
        name,
        reason: err.to_string(),
    })
}

const fn default_cpu_degraded_percent() -> f64 {
    85.0
}

const fn default_cpu_fail_percent() -> f64 {
    97.0
}

const fn default_net_loss_degraded() -> f64 {
    0.05
}

const fn default_net_loss_fail() -> f64 {
    0.20
}
