//! Relays chat turns to the OpenAI Assistants API.
//!
//! A turn is started with [`initiator::start_or_continue`], which yields the
//! thread and run it created, and is driven to completion by
//! [`poller::poll`], which executes any tool calls the run asks for through a
//! [`dispatch::Toolbox`]. [`session::ChatSession`] ties both together for an
//! interactive front-end.

use serde::Deserialize;
use std::env;

pub mod api;
pub mod assistants;
pub mod client;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod initiator;
pub mod poller;
pub mod session;

#[cfg(test)]
mod test_support;

pub use api::AssistantApi;
pub use client::OpenAiClient;
pub use config::{AssistantConfig, ConfigError};
pub use context::AssistantContext;
pub use dispatch::{Calculator, DispatchError, Toolbox};
pub use error::RunError;
pub use poller::RunOutcome;
pub use session::ChatSession;

pub const BASE_URL: &str = "https://api.openai.com/v1/";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OpenAiError {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl OpenAiError {
    pub fn new(message: String, error_type: String) -> OpenAiError {
        OpenAiError {
            message,
            error_type,
            param: None,
            code: None,
        }
    }
}

impl std::fmt::Display for OpenAiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for OpenAiError {}

impl From<reqwest::Error> for OpenAiError {
    fn from(value: reqwest::Error) -> Self {
        OpenAiError::new(value.to_string(), "reqwest".to_string())
    }
}

impl From<std::io::Error> for OpenAiError {
    fn from(value: std::io::Error) -> Self {
        OpenAiError::new(value.to_string(), "io".to_string())
    }
}

impl From<derive_builder::UninitializedFieldError> for OpenAiError {
    fn from(value: derive_builder::UninitializedFieldError) -> Self {
        OpenAiError::new(value.to_string(), "builder".to_string())
    }
}

pub type ApiResponseOrError<T> = Result<T, OpenAiError>;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Credentials {
    api_key: String,
    base_url: String,
    organization: Option<String>,
}

impl Credentials {
    /// Creates credentials with the given API key and base URL.
    ///
    /// If the base URL is empty, it will use the default.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = if base_url.is_empty() {
            BASE_URL.to_string()
        } else {
            parse_base_url(base_url)
        };
        Self {
            api_key: api_key.into(),
            base_url,
            organization: None,
        }
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Fetches the credentials from the environment variables
    /// `OPENAI_KEY` (or `OPENAI_API_KEY`), `OPENAI_BASE_URL` and `OPENAI_ORG`.
    ///
    /// `.env` files are honoured, see [`AssistantConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = first_set_var(&["OPENAI_KEY", "OPENAI_API_KEY"])
            .ok_or(ConfigError::Missing("OPENAI_KEY"))?;
        let base_url = env::var("OPENAI_BASE_URL").unwrap_or_default();
        let credentials = Credentials::new(api_key, base_url);
        Ok(match env::var("OPENAI_ORG") {
            Ok(organization) if !organization.is_empty() => {
                credentials.with_organization(organization)
            }
            _ => credentials,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }
}

/// The value of the first variable that is set and not empty.
fn first_set_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| env::var(name).ok().filter(|value| !value.is_empty()))
}

fn parse_base_url(mut value: String) -> String {
    if !value.ends_with('/') {
        value += "/";
    }
    value
}
