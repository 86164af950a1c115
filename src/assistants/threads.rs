use derive_builder::Builder;
use serde::Serialize;

use crate::{client::OpenAiClient, ApiResponseOrError, OpenAiError};

use super::{
    messages::CreateMessageRequest,
    runs::{CreateThreadRunRequest, Run},
};

#[derive(Serialize, Builder, Debug, Clone)]
#[builder(pattern = "owned")]
#[builder(name = "CreateThreadBuilder")]
#[builder(setter(into))]
#[builder(build_fn(error = "OpenAiError"))]
pub struct CreateThreadRequest {
    /// Messages the thread starts with.
    pub messages: Vec<CreateMessageRequest>,
}

impl CreateThreadRequest {
    pub fn builder() -> CreateThreadBuilder {
        CreateThreadBuilder::default()
    }
}

impl OpenAiClient {
    /// Creates a thread and starts a run on it in one request.
    pub async fn create_thread_run(
        &self,
        request: CreateThreadRunRequest,
    ) -> ApiResponseOrError<Run> {
        self.post("threads/runs", request).await
    }
}
