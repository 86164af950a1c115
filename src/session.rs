use tracing::warn;

use crate::{
    api::AssistantApi, assistants::messages::Role, context::AssistantContext, dispatch::Toolbox,
    poller::RunOutcome,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

/// State of one chat session, owned by the front-end.
///
/// The thread id is assigned by the first successful turn and reused by every
/// later one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSession {
    thread_id: Option<String>,
    file_ids: Vec<String>,
    transcript: Vec<TranscriptEntry>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn file_ids(&self) -> &[String] {
        &self.file_ids
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Uploads a file and attaches it to every later message of the session.
    pub async fn attach_file<A, T>(
        &mut self,
        ctx: &AssistantContext<A, T>,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Option<String>
    where
        A: AssistantApi,
        T: Toolbox,
    {
        let file_id = ctx.upload_file(filename, bytes).await?;
        self.file_ids.push(file_id.clone());
        Some(file_id)
    }

    /// Uploads a file that replaces every previously attached one.
    pub async fn replace_file<A, T>(
        &mut self,
        ctx: &AssistantContext<A, T>,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Option<String>
    where
        A: AssistantApi,
        T: Toolbox,
    {
        let file_id = ctx.upload_file(filename, bytes).await?;
        self.file_ids = vec![file_id.clone()];
        Some(file_id)
    }

    /// Runs one chat turn: sends `prompt`, drives the run to a terminal
    /// status and records the assistant's reply.
    pub async fn send<A, T>(&mut self, ctx: &AssistantContext<A, T>, prompt: &str) -> Option<RunOutcome>
    where
        A: AssistantApi,
        T: Toolbox,
    {
        self.transcript.push(TranscriptEntry {
            role: Role::User,
            content: prompt.to_string(),
        });

        let handle = ctx
            .start_or_continue(prompt, &self.file_ids, self.thread_id.as_deref())
            .await?;

        if self.thread_id.is_none() {
            self.thread_id = Some(handle.thread_id.clone());
        } else if self.thread_id.as_deref() != Some(handle.thread_id.as_str()) {
            warn!(
                "Run {} started on thread {} instead of the session's thread",
                handle.run_id, handle.thread_id
            );
        }

        let outcome = ctx.poll(&handle).await?;
        if let Some(message) = &outcome.message {
            self.transcript.push(TranscriptEntry {
                role: Role::Assistant,
                content: message.clone(),
            });
        }
        Some(outcome)
    }
}
