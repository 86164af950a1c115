use std::{env, time::Duration};

use dotenvy::dotenv;

use crate::Credentials;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { name: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(name) => {
                write!(f, "environment variable `{name}` should be defined")
            }
            ConfigError::Invalid { name, value } => {
                write!(f, "environment variable `{name}` has invalid value `{value}`")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Everything needed to talk to one assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantConfig {
    pub credentials: Credentials,
    pub assistant_id: String,
    /// Wait between two status fetches of a run that is still queued or in progress.
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Bounded automatic retries applied by the HTTP client, not by the run loop.
    pub max_retries: u32,
}

impl AssistantConfig {
    pub fn new(credentials: Credentials, assistant_id: impl Into<String>) -> Self {
        Self {
            credentials,
            assistant_id: assistant_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Loads `.env` if present, then reads the configuration from the process
    /// environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let credentials = Credentials::from_env()?;
        let assistant_id =
            env::var("ASSISTANT_ID").map_err(|_| ConfigError::Missing("ASSISTANT_ID"))?;

        let mut config = AssistantConfig::new(credentials, assistant_id);
        if let Some(interval) = parse_nonzero_secs("ASSISTANT_POLL_INTERVAL_SECS")? {
            config.poll_interval = interval;
        }
        if let Some(secs) = parse_var::<u64>("OPENAI_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var::<u32>("OPENAI_MAX_RETRIES")? {
            config.max_retries = retries;
        }
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(None),
    }
}

/// A zero interval would turn polling into a busy loop of status fetches.
fn parse_nonzero_secs(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    match parse_var::<u64>(name)? {
        Some(0) => Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
        }),
        secs => Ok(secs.map(Duration::from_secs)),
    }
}
