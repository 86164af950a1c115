use std::{str::FromStr, time::Duration};

use crate::{config::AssistantConfig, ApiResponseOrError, Credentials, OpenAiError};
use anyhow::Result;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    multipart::Form,
    Client, Method, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(8);
const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

#[derive(Clone)]
pub struct OpenAiClient {
    credentials: Credentials,
    client: Client,
    max_retries: u32,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpenAiClient")
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiErrorWrapper {
    error: OpenAiError,
}

impl OpenAiClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_limits(
            credentials,
            crate::config::DEFAULT_TIMEOUT,
            crate::config::DEFAULT_MAX_RETRIES,
        )
    }

    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        Self::with_limits(
            config.credentials.clone(),
            config.timeout,
            config.max_retries,
        )
    }

    pub fn with_limits(credentials: Credentials, timeout: Duration, max_retries: u32) -> Result<Self> {
        let mut headers: HeaderMap = [
            (
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", credentials.api_key()))?,
            ),
            (
                HeaderName::from_str("OpenAI-Beta")?,
                HeaderValue::from_str("assistants=v2")?,
            ),
        ]
        .into_iter()
        .collect();

        if let Some(organization) = credentials.organization() {
            headers.insert(
                HeaderName::from_str("OpenAI-Organization")?,
                HeaderValue::from_str(organization)?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            credentials,
            client,
            max_retries,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Sends the request, retrying connection failures, timeouts, 429 and
    /// 5xx. Every attempt of a non-GET request carries the same
    /// `Idempotency-Key`, so a retry of a request the server already handled
    /// is not applied twice.
    async fn request_inner<F>(
        &self,
        method: Method,
        route: String,
        build: F,
    ) -> Result<Response, reqwest::Error>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let url = format!("{}{}", self.credentials.base_url(), route);
        let idempotency_key = idempotency_key(&method);
        let mut attempt = 0;

        loop {
            debug!("OpenAI Request[{}] {}", method, url);
            let mut request = build(self.client.request(method.clone(), url.as_str()));
            if let Some(key) = &idempotency_key {
                request = request.header(IDEMPOTENCY_KEY, key.as_str());
            }
            let result = request.send().await;

            match result {
                Ok(response)
                    if attempt < self.max_retries && is_retryable_status(response.status()) =>
                {
                    warn!(
                        "OpenAI Response[{}] {} {url}, retrying ({}/{})",
                        method,
                        response.status().as_str(),
                        attempt + 1,
                        self.max_retries
                    );
                }
                Ok(response) => {
                    debug!(
                        "OpenAI Response[{}] {} {url}",
                        method,
                        response.status().as_str()
                    );
                    return Ok(response);
                }
                Err(error)
                    if attempt < self.max_retries && (error.is_connect() || error.is_timeout()) =>
                {
                    warn!(
                        "OpenAI Request[{}] {url} failed: {error}, retrying ({}/{})",
                        method,
                        attempt + 1,
                        self.max_retries
                    );
                }
                Err(error) => return Err(error),
            }

            tokio::time::sleep(backoff(attempt)).await;
            attempt += 1;
        }
    }

    async fn decode<T>(response: Response) -> ApiResponseOrError<T>
    where
        T: DeserializeOwned,
    {
        if response.status().is_success() {
            return Ok(response.json::<T>().await?);
        }

        let result = response.text().await?;
        if let Ok(api_response) = serde_json::from_str::<OpenAiErrorWrapper>(&result) {
            Err(api_response.error)
        } else {
            Err(OpenAiError::new(result, "unknown".to_string()))
        }
    }

    pub async fn request<S, R, T>(
        &self,
        method: Method,
        route: R,
        body: Option<S>,
    ) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        S: Serialize,
        T: DeserializeOwned,
    {
        let response = self
            .request_inner(method, route.into(), |request| match &body {
                Some(body) => request.json(body),
                None => request,
            })
            .await?;

        Self::decode(response).await
    }

    pub async fn get<R, T>(&self, route: R) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        T: DeserializeOwned,
    {
        self.request::<(), R, T>(Method::GET, route, None).await
    }

    pub async fn post<S, R, T>(&self, route: R, body: S) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        S: Serialize,
        T: DeserializeOwned,
    {
        self.request(Method::POST, route, Some(body)).await
    }

    /// Sends a multipart form. The form is rebuilt for every attempt since
    /// [`Form`] cannot be cloned.
    pub async fn post_multipart<R, F, T>(&self, route: R, form: F) -> ApiResponseOrError<T>
    where
        R: Into<String>,
        F: Fn() -> Form,
        T: DeserializeOwned,
    {
        let response = self
            .request_inner(Method::POST, route.into(), |request| {
                request.multipart(form())
            })
            .await?;

        Self::decode(response).await
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn idempotency_key(method: &Method) -> Option<String> {
    (*method != Method::GET).then(|| Uuid::new_v4().to_string())
}

fn backoff(attempt: u32) -> Duration {
    INITIAL_BACKOFF
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_BACKOFF)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct List<T> {
    pub first_id: Option<String>,
    pub last_id: Option<String>,
    pub data: Vec<T>,
    pub has_more: bool,
}
