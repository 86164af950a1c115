//! The remote operations the relay depends on.
//!
//! [`OpenAiClient`] is the production implementation. Tests drive the
//! initiator and poller with in-memory doubles of the same trait.

use async_trait::async_trait;

use crate::{
    assistants::{
        files::FilePurpose,
        messages::{CreateMessageRequest, Message},
        runs::{CreateRunRequest, CreateThreadRunRequest, Run, SubmitToolOutputsRequest, ToolOutput},
        threads::CreateThreadRequest,
    },
    client::OpenAiClient,
    ApiResponseOrError,
};

/// Identifies a started run. A run never moves to another thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunHandle {
    pub run_id: String,
    pub thread_id: String,
}

impl From<Run> for RunHandle {
    fn from(run: Run) -> Self {
        RunHandle {
            run_id: run.id,
            thread_id: run.thread_id,
        }
    }
}

#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Creates a thread seeded with `message` and starts a run on it.
    async fn create_thread_and_run(
        &self,
        assistant_id: &str,
        message: CreateMessageRequest,
    ) -> ApiResponseOrError<RunHandle>;

    /// Appends a message to an existing thread and returns the message id.
    async fn add_message(
        &self,
        thread_id: &str,
        message: CreateMessageRequest,
    ) -> ApiResponseOrError<String>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str)
        -> ApiResponseOrError<RunHandle>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> ApiResponseOrError<Run>;

    /// Submits the outputs of every pending tool call at once. Returns the
    /// resumed run.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> ApiResponseOrError<Run>;

    /// The newest message of the thread, if it has any.
    async fn latest_message(&self, thread_id: &str) -> ApiResponseOrError<Option<Message>>;

    /// Uploads a file for use by assistants and returns its id.
    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> ApiResponseOrError<String>;
}

#[async_trait]
impl AssistantApi for OpenAiClient {
    async fn create_thread_and_run(
        &self,
        assistant_id: &str,
        message: CreateMessageRequest,
    ) -> ApiResponseOrError<RunHandle> {
        let request = CreateThreadRunRequest::builder()
            .assistant_id(assistant_id)
            .thread(CreateThreadRequest::builder().messages(vec![message]).build()?)
            .build()?;

        Ok(self.create_thread_run(request).await?.into())
    }

    async fn add_message(
        &self,
        thread_id: &str,
        message: CreateMessageRequest,
    ) -> ApiResponseOrError<String> {
        Ok(self.create_message(thread_id, message).await?.id)
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> ApiResponseOrError<RunHandle> {
        let request = CreateRunRequest::builder()
            .assistant_id(assistant_id)
            .build()?;

        Ok(OpenAiClient::create_run(self, thread_id, request).await?.into())
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> ApiResponseOrError<Run> {
        OpenAiClient::get_run(self, thread_id, run_id).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> ApiResponseOrError<Run> {
        let request = SubmitToolOutputsRequest {
            tool_outputs: outputs,
        };

        OpenAiClient::submit_tool_outputs(self, thread_id, run_id, request).await
    }

    async fn latest_message(&self, thread_id: &str) -> ApiResponseOrError<Option<Message>> {
        let list = self.list_recent_messages(thread_id, 1).await?;
        Ok(list.data.into_iter().next())
    }

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> ApiResponseOrError<String> {
        let file =
            OpenAiClient::upload_file(self, filename, bytes, FilePurpose::Assistants).await?;
        Ok(file.id)
    }
}
