use std::io;
use thiserror::Error;

/// Failures on the hardware command link.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("could not open link to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("write to {target} failed after reconnect: {source}")]
    Send {
        target: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level error for starting and running the controller.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("worker task failed: {0}")]
    Worker(String),
}
