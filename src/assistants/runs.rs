use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{client::OpenAiClient, ApiResponseOrError, OpenAiError};

use super::threads::CreateThreadRequest;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Run {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created_at: u32,
    /// The ID of the assistant used for this run.
    #[serde(default)]
    pub assistant_id: String,
    /// The ID of the thread associated with this run.
    pub thread_id: String,
    /// The status of the run.
    pub status: Status,
    /// Details on the action required to continue the run. Will be null if no action is required.
    #[serde(default)]
    pub required_action: Option<RequiredAction>,

    /// The last error that occurred during this run.
    #[serde(default)]
    pub last_error: Option<LastError>,

    /// The time at which the run will expire.
    #[serde(default)]
    pub expires_at: Option<u32>,
    /// The time at which the run was completed.
    #[serde(default)]
    pub completed_at: Option<u32>,
    /// The time at which the run was failed.
    #[serde(default)]
    pub failed_at: Option<u32>,

    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl Run {
    /// The tool calls the run is waiting on, empty unless the status is
    /// [`Status::RequiresAction`].
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        match &self.required_action {
            Some(action) if self.status == Status::RequiresAction => action.tool_calls(),
            _ => &[],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    /// A status this crate does not know. Treated as terminal so a run in a
    /// state the poller cannot interpret is not polled forever.
    #[serde(other)]
    Unknown,
}

impl Status {
    /// Whether the run will not change status on its own anymore. A run
    /// waiting on tool outputs is not terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Status::Queued | Status::InProgress | Status::RequiresAction
        )
    }
}

/// `{"type": "submit_tool_outputs", "submit_tool_outputs": {"tool_calls": [...]}}`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RequiredAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub submit_tool_outputs: Option<SubmitToolOutputs>,
}

impl RequiredAction {
    pub fn submit_tool_outputs(tool_calls: Vec<ToolCall>) -> Self {
        RequiredAction {
            kind: "submit_tool_outputs".to_string(),
            submit_tool_outputs: Some(SubmitToolOutputs { tool_calls }),
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.submit_tool_outputs
            .as_ref()
            .map(|outputs| outputs.tool_calls.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubmitToolOutputs {
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct ToolCall {
    /// The ID of the tool call, referenced when submitting its output.
    pub id: String,
    /// The type of the tool. Currently, only `function` is supported.
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    /// The function that the model called.
    pub function: ToolCallFunction,
}

fn function_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        ToolCall {
            id: id.into(),
            kind: function_type(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct ToolCallFunction {
    /// The name of the function to call.
    pub name: String,
    /// The arguments to call the function with, as generated by the model in
    /// JSON format.
    /// Note that the model does not always generate valid JSON, and may
    /// hallucinate parameters not defined by your function schema.
    pub arguments: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LastError {
    pub code: String,
    pub message: String,
}

#[derive(Serialize, Builder, Debug, Clone)]
#[builder(pattern = "owned")]
#[builder(name = "CreateThreadRunBuilder")]
#[builder(setter(into))]
#[builder(build_fn(error = "OpenAiError"))]
pub struct CreateThreadRunRequest {
    /// ID of the assistant to use.
    pub assistant_id: String,
    /// The thread to create.
    pub thread: CreateThreadRequest,
}

impl CreateThreadRunRequest {
    pub fn builder() -> CreateThreadRunBuilder {
        CreateThreadRunBuilder::default()
    }
}

#[derive(Serialize, Builder, Debug, Clone)]
#[builder(pattern = "owned")]
#[builder(name = "CreateRunBuilder")]
#[builder(setter(into))]
#[builder(build_fn(error = "OpenAiError"))]
pub struct CreateRunRequest {
    pub assistant_id: String,
}

impl CreateRunRequest {
    pub fn builder() -> CreateRunBuilder {
        CreateRunBuilder::default()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SubmitToolOutputsRequest {
    pub tool_outputs: Vec<ToolOutput>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub tool_call_id: String,
    /// JSON-encoded return value of the call.
    pub output: String,
}

impl OpenAiClient {
    pub async fn create_run(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> ApiResponseOrError<Run> {
        self.post(format!("threads/{thread_id}/runs"), request)
            .await
    }

    pub async fn get_run(&self, thread_id: &str, run_id: &str) -> ApiResponseOrError<Run> {
        self.get(format!("threads/{thread_id}/runs/{run_id}")).await
    }

    pub async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        request: SubmitToolOutputsRequest,
    ) -> ApiResponseOrError<Run> {
        self.post(
            format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            request,
        )
        .await
    }
}
