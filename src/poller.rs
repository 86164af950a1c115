//! Drives a run to a terminal status.
//!
//! While the run is queued or in progress the poller waits and re-fetches.
//! When the run requires action, every pending tool call is executed
//! concurrently through the [`Toolbox`] and the outputs are submitted in one
//! batch, which resumes the run.

use std::{collections::HashSet, time::Duration};

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    api::{AssistantApi, RunHandle},
    assistants::runs::{Status, ToolCall, ToolOutput},
    dispatch::Toolbox,
};

use crate::error::RunError;

/// The result of one tool call made while polling.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolReturnValue {
    pub tool_call_id: String,
    pub tool_name: String,
    /// The function's return value, or the dispatch error as a string.
    pub output: Value,
}

impl ToolReturnValue {
    pub fn to_tool_output(&self) -> ToolOutput {
        ToolOutput {
            tool_call_id: self.tool_call_id.clone(),
            output: self.output.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub thread_id: String,
    pub run_id: String,
    /// The terminal status the run ended in.
    pub status: Status,
    /// Text of the newest thread message, `None` if the thread has no text
    /// message.
    pub message: Option<String>,
    /// Every tool call executed during the run, in the order requested.
    pub tool_return_values: Vec<ToolReturnValue>,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    pub fn first_tool_return_value(&self) -> Option<&Value> {
        self.tool_return_values.first().map(|value| &value.output)
    }
}

/// Polls the run until it reaches a terminal status, dispatching tool calls
/// along the way. Errors are logged and reported as `None`.
pub async fn poll<A, T>(
    api: &A,
    toolbox: &T,
    handle: &RunHandle,
    interval: Duration,
) -> Option<RunOutcome>
where
    A: AssistantApi + ?Sized,
    T: Toolbox + ?Sized,
{
    match try_poll(api, toolbox, handle, interval).await {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            error!(run_id = %handle.run_id, thread_id = %handle.thread_id, "{err}");
            None
        }
    }
}

pub async fn try_poll<A, T>(
    api: &A,
    toolbox: &T,
    handle: &RunHandle,
    interval: Duration,
) -> Result<RunOutcome, RunError>
where
    A: AssistantApi + ?Sized,
    T: Toolbox + ?Sized,
{
    let RunHandle { run_id, thread_id } = handle;

    let mut run = api
        .get_run(thread_id, run_id)
        .await
        .map_err(RunError::FetchStatus)?;
    let mut tool_return_values = Vec::new();

    while !run.status.is_terminal() {
        if run.status == Status::RequiresAction {
            let values = dispatch_tool_calls(toolbox, run.pending_tool_calls()).await;
            let outputs = values.iter().map(ToolReturnValue::to_tool_output).collect();

            run = api
                .submit_tool_outputs(thread_id, run_id, outputs)
                .await
                .map_err(RunError::SubmitToolOutputs)?;
            tool_return_values.extend(values);
        } else {
            debug!(%run_id, status = %run.status, "Run not finished, waiting");
            tokio::time::sleep(interval).await;
            run = api
                .get_run(thread_id, run_id)
                .await
                .map_err(RunError::FetchStatus)?;
        }
    }

    if run.status != Status::Completed {
        match &run.last_error {
            Some(last_error) => warn!(
                %run_id,
                status = %run.status,
                code = %last_error.code,
                "Run ended without completing: {}",
                last_error.message
            ),
            None => warn!(%run_id, status = %run.status, "Run ended without completing"),
        }
    }

    let message = api
        .latest_message(thread_id)
        .await
        .map_err(RunError::FetchMessage)?;

    Ok(RunOutcome {
        thread_id: thread_id.clone(),
        run_id: run_id.clone(),
        status: run.status,
        message: message.as_ref().and_then(|m| m.text()).map(str::to_string),
        tool_return_values,
    })
}

/// Runs every call of one `requires_action` event concurrently and waits for
/// all of them. A call id that appears twice is executed once.
async fn dispatch_tool_calls<T>(toolbox: &T, tool_calls: &[ToolCall]) -> Vec<ToolReturnValue>
where
    T: Toolbox + ?Sized,
{
    let mut seen = HashSet::new();
    let calls = tool_calls
        .iter()
        .filter(|call| seen.insert(call.id.as_str()))
        .map(|call| execute_tool_call(toolbox, call));

    join_all(calls).await
}

async fn execute_tool_call<T>(toolbox: &T, tool_call: &ToolCall) -> ToolReturnValue
where
    T: Toolbox + ?Sized,
{
    let function_name = &tool_call.function.name;
    info!("Processing tool call for function {function_name}");
    debug!(
        tool_call_id = %tool_call.id,
        arguments = %tool_call.function.arguments,
        "Processing tool call for function {function_name}"
    );

    let output = match toolbox
        .call(function_name, &tool_call.function.arguments)
        .await
    {
        Ok(value) => value,
        Err(err) => {
            warn!(tool_call_id = %tool_call.id, "{err}");
            Value::String(err.to_string())
        }
    };

    ToolReturnValue {
        tool_call_id: tool_call.id.clone(),
        tool_name: function_name.clone(),
        output,
    }
}
