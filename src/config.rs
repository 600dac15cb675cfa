use crate::errors::ConfigError;
use crate::global_variables::{
    AMQP_URL, CONNECT_SETTLE_MS, DEFAULT_BAUD_RATE, DEFAULT_DEVICE_PATH, QUEUE_LIGHT_SNAPSHOTS,
    RECONNECT_SETTLE_MS, SAFETY_CHECK_INTERVAL_TICKS, TICK_INTERVAL_MS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// How the controller reaches the signal board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkConfig {
    /// A serial port opened at `baud_rate`, 8N1.
    Device { path: String, baud_rate: u32 },
    /// A serial-over-TCP bridge in front of the board.
    Tcp { address: String },
    /// No hardware; commands are only logged.
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// JSON sample lines on stdin.
    Stdin,
    /// Synthetic counts, for bench-top runs without a camera.
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub link: LinkConfig,
    pub connect_settle_ms: u64,
    pub reconnect_settle_ms: u64,
    pub tick_interval_ms: u64,
    pub safety_check_interval_ticks: u64,
    pub source: SourceKind,
    pub snapshot_csv: Option<String>,
    pub amqp_url: Option<String>,
    pub amqp_queue: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::Device {
                path: DEFAULT_DEVICE_PATH.to_string(),
                baud_rate: DEFAULT_BAUD_RATE,
            },
            connect_settle_ms: CONNECT_SETTLE_MS,
            reconnect_settle_ms: RECONNECT_SETTLE_MS,
            tick_interval_ms: TICK_INTERVAL_MS,
            safety_check_interval_ticks: SAFETY_CHECK_INTERVAL_TICKS,
            source: SourceKind::Stdin,
            snapshot_csv: None,
            amqp_url: None,
            amqp_queue: QUEUE_LIGHT_SNAPSHOTS.to_string(),
        }
    }
}

impl ControllerConfig {
    /// Loads a JSON config file; missing fields fall back to the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: ControllerConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Config from the first CLI argument if present, otherwise defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be > 0".into()));
        }
        if self.safety_check_interval_ticks == 0 {
            return Err(ConfigError::Invalid(
                "safety_check_interval_ticks must be > 0".into(),
            ));
        }
        if let LinkConfig::Device { baud_rate: 0, .. } = self.link {
            return Err(ConfigError::Invalid("baud_rate must be > 0".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }

    pub fn reconnect_settle(&self) -> Duration {
        Duration::from_millis(self.reconnect_settle_ms)
    }

    /// The AMQP URL, if snapshot publishing is turned on.
    pub fn amqp_url(&self) -> Option<&str> {
        self.amqp_url.as_deref().map(|u| if u.is_empty() { AMQP_URL } else { u })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"link": {{"kind": "tcp", "address": "10.0.0.7:4000"}}, "source": "random"}}"#
        )
        .unwrap();

        let config = ControllerConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.link,
            LinkConfig::Tcp {
                address: "10.0.0.7:4000".to_string()
            }
        );
        assert_eq!(config.source, SourceKind::Random);
        assert_eq!(config.tick_interval_ms, TICK_INTERVAL_MS);
        assert_eq!(config.safety_check_interval_ticks, SAFETY_CHECK_INTERVAL_TICKS);
    }

    #[test]
    fn dry_run_link_parses() {
        let config: ControllerConfig =
            serde_json::from_str(r#"{"link": {"kind": "dry_run"}}"#).unwrap();
        assert_eq!(config.link, LinkConfig::DryRun);
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"tick_interval_ms": 0}}"#).unwrap();
        assert!(matches!(
            ControllerConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn zero_baud_rate_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"link": {{"kind": "device", "path": "/dev/ttyACM0", "baud_rate": 0}}}}"#
        )
        .unwrap();
        assert!(matches!(
            ControllerConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ControllerConfig::from_file("/nonexistent/controller.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/controller.json"));
    }

    #[test]
    fn empty_amqp_url_means_default_broker() {
        let config = ControllerConfig {
            amqp_url: Some(String::new()),
            ..ControllerConfig::default()
        };
        assert_eq!(config.amqp_url(), Some(AMQP_URL));
        assert_eq!(ControllerConfig::default().amqp_url(), None);
    }
}
