use tracing::{error, info};

use crate::{
    api::{AssistantApi, RunHandle},
    assistants::messages::CreateMessageRequest,
    error::RunError,
};

/// Sends one user message and starts one run for it.
///
/// Without a `thread_id` a new thread is created with the message and the
/// run in a single request. With one, the message is appended to that thread
/// and a run is started on it. Errors are logged and reported as `None`.
pub async fn start_or_continue<A>(
    api: &A,
    assistant_id: &str,
    message_content: &str,
    file_ids: &[String],
    thread_id: Option<&str>,
) -> Option<RunHandle>
where
    A: AssistantApi + ?Sized,
{
    match try_start_or_continue(api, assistant_id, message_content, file_ids, thread_id).await {
        Ok(handle) => Some(handle),
        Err(err) => {
            error!(thread_id = thread_id.unwrap_or("<new>"), "{err}");
            None
        }
    }
}

pub async fn try_start_or_continue<A>(
    api: &A,
    assistant_id: &str,
    message_content: &str,
    file_ids: &[String],
    thread_id: Option<&str>,
) -> Result<RunHandle, RunError>
where
    A: AssistantApi + ?Sized,
{
    let message = CreateMessageRequest::user(message_content, file_ids);

    let Some(thread_id) = thread_id else {
        info!("Creating new thread");
        let handle = api
            .create_thread_and_run(assistant_id, message)
            .await
            .map_err(RunError::CreateThreadAndRun)?;
        info!(thread_id = %handle.thread_id, run_id = %handle.run_id, "Thread created");
        return Ok(handle);
    };

    info!(files = file_ids.len(), "Adding message to thread {thread_id}");
    let message_id = api
        .add_message(thread_id, message)
        .await
        .map_err(RunError::AddMessage)?;
    info!("Message {message_id} added to thread {thread_id}");

    let handle = api
        .create_run(thread_id, assistant_id)
        .await
        .map_err(RunError::CreateRun)?;
    info!(run_id = %handle.run_id, "Run started on thread {thread_id}");
    Ok(handle)
}
