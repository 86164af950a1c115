use std::time::Duration;

use tracing::{error, info};

use crate::{
    api::{AssistantApi, RunHandle},
    client::OpenAiClient,
    config::{AssistantConfig, DEFAULT_POLL_INTERVAL},
    dispatch::{Calculator, Toolbox},
    initiator, poller,
    poller::RunOutcome,
};

/// Everything a chat turn needs, built once at start-up and passed by
/// reference.
#[derive(Debug)]
pub struct AssistantContext<A = OpenAiClient, T = Calculator> {
    api: A,
    toolbox: T,
    assistant_id: String,
    poll_interval: Duration,
}

impl AssistantContext {
    /// The production context: HTTP client plus the arithmetic toolbox.
    pub fn from_config(config: &AssistantConfig) -> anyhow::Result<Self> {
        let api = OpenAiClient::from_config(config)?;
        Ok(AssistantContext::new(api, Calculator, config.assistant_id.clone())
            .with_poll_interval(config.poll_interval))
    }
}

impl<A, T> AssistantContext<A, T>
where
    A: AssistantApi,
    T: Toolbox,
{
    pub fn new(api: A, toolbox: T, assistant_id: impl Into<String>) -> Self {
        AssistantContext {
            api,
            toolbox,
            assistant_id: assistant_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn toolbox(&self) -> &T {
        &self.toolbox
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    pub async fn start_or_continue(
        &self,
        message_content: &str,
        file_ids: &[String],
        thread_id: Option<&str>,
    ) -> Option<RunHandle> {
        initiator::start_or_continue(
            &self.api,
            &self.assistant_id,
            message_content,
            file_ids,
            thread_id,
        )
        .await
    }

    pub async fn poll(&self, handle: &RunHandle) -> Option<RunOutcome> {
        poller::poll(&self.api, &self.toolbox, handle, self.poll_interval).await
    }

    pub async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Option<String> {
        match self.api.upload_file(filename, bytes).await {
            Ok(file_id) => {
                info!("File {filename} uploaded as {file_id}");
                Some(file_id)
            }
            Err(err) => {
                error!("Error uploading file {filename}: {err}");
                None
            }
        }
    }
}
