//! In-memory [`AssistantApi`] double that records every call.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;

use crate::{
    api::{AssistantApi, RunHandle},
    assistants::{
        messages::{CreateMessageRequest, Message, MessageContent, Role},
        runs::{RequiredAction, Run, Status, ToolCall, ToolOutput},
    },
    ApiResponseOrError, OpenAiError,
};

pub fn run(status: Status) -> Run {
    Run {
        id: "run_1".to_string(),
        object: "thread.run".to_string(),
        created_at: 0,
        assistant_id: "asst_1".to_string(),
        thread_id: "thread_1".to_string(),
        status,
        required_action: None,
        last_error: None,
        expires_at: None,
        completed_at: None,
        failed_at: None,
        metadata: None,
    }
}

pub fn run_requiring(tool_calls: impl IntoIterator<Item = ToolCall>) -> Run {
    Run {
        required_action: Some(RequiredAction::submit_tool_outputs(
            tool_calls.into_iter().collect(),
        )),
        ..run(Status::RequiresAction)
    }
}

fn stub_error() -> OpenAiError {
    OpenAiError::new("stubbed failure".to_string(), "stub".to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateThreadAndRun {
        assistant_id: String,
        message: CreateMessageRequest,
    },
    AddMessage {
        thread_id: String,
        message: CreateMessageRequest,
    },
    CreateRun {
        thread_id: String,
        assistant_id: String,
    },
    UploadFile {
        filename: String,
        len: usize,
    },
}

#[derive(Default)]
struct State {
    runs: VecDeque<Run>,
    submit_results: VecDeque<Run>,
    latest_message: Option<Option<Message>>,
    get_run_calls: usize,
    fail_get_run_at: Option<usize>,
    fail_submit: bool,
    fail_create_thread: bool,
    fail_add_message: bool,
    fail_create_run: bool,
    fail_upload: bool,
    threads: usize,
    started_runs: usize,
    uploads: usize,
    calls: Vec<Call>,
    submissions: Vec<Vec<ToolOutput>>,
}

#[derive(Default)]
pub struct StubApi {
    state: Mutex<State>,
}

impl StubApi {
    fn state(&mut self) -> &mut State {
        self.state.get_mut().unwrap()
    }

    /// Statuses returned by successive `get_run` calls.
    pub fn with_runs(mut self, runs: impl IntoIterator<Item = Run>) -> Self {
        self.state().runs.extend(runs);
        self
    }

    /// Runs returned by successive `submit_tool_outputs` calls.
    pub fn with_submit_results(mut self, runs: impl IntoIterator<Item = Run>) -> Self {
        self.state().submit_results.extend(runs);
        self
    }

    pub fn with_latest_message(mut self, text: &str) -> Self {
        self.state().latest_message = Some(Some(Message {
            id: "msg_latest".to_string(),
            object: "thread.message".to_string(),
            created_at: 0,
            thread_id: "thread_1".to_string(),
            role: Role::Assistant,
            content: vec![MessageContent::text(text)],
            assistant_id: Some("asst_1".to_string()),
            run_id: Some("run_1".to_string()),
            attachments: None,
        }));
        self
    }

    pub fn with_empty_thread(mut self) -> Self {
        self.state().latest_message = Some(None);
        self
    }

    /// Fails the `get_run` call with this zero-based index.
    pub fn failing_get_run_at(mut self, index: usize) -> Self {
        self.state().fail_get_run_at = Some(index);
        self
    }

    pub fn failing_submit(mut self) -> Self {
        self.state().fail_submit = true;
        self
    }

    pub fn failing_create_thread(mut self) -> Self {
        self.state().fail_create_thread = true;
        self
    }

    pub fn failing_add_message(mut self) -> Self {
        self.state().fail_add_message = true;
        self
    }

    pub fn failing_create_run(mut self) -> Self {
        self.state().fail_create_run = true;
        self
    }

    pub fn failing_upload(mut self) -> Self {
        self.state().fail_upload = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn submissions(&self) -> Vec<Vec<ToolOutput>> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn get_run_calls(&self) -> usize {
        self.state.lock().unwrap().get_run_calls
    }
}

#[async_trait]
impl AssistantApi for StubApi {
    async fn create_thread_and_run(
        &self,
        assistant_id: &str,
        message: CreateMessageRequest,
    ) -> ApiResponseOrError<RunHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateThreadAndRun {
            assistant_id: assistant_id.to_string(),
            message,
        });
        if state.fail_create_thread {
            return Err(stub_error());
        }
        state.threads += 1;
        state.started_runs += 1;
        Ok(RunHandle {
            run_id: format!("run_{}", state.started_runs),
            thread_id: format!("thread_{}", state.threads),
        })
    }

    async fn add_message(
        &self,
        thread_id: &str,
        message: CreateMessageRequest,
    ) -> ApiResponseOrError<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::AddMessage {
            thread_id: thread_id.to_string(),
            message,
        });
        if state.fail_add_message {
            return Err(stub_error());
        }
        Ok(format!("msg_{}", state.calls.len()))
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> ApiResponseOrError<RunHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateRun {
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
        });
        if state.fail_create_run {
            return Err(stub_error());
        }
        state.started_runs += 1;
        Ok(RunHandle {
            run_id: format!("run_{}", state.started_runs),
            thread_id: thread_id.to_string(),
        })
    }

    async fn get_run(&self, _thread_id: &str, _run_id: &str) -> ApiResponseOrError<Run> {
        let mut state = self.state.lock().unwrap();
        let index = state.get_run_calls;
        state.get_run_calls += 1;
        if state.fail_get_run_at == Some(index) {
            return Err(stub_error());
        }
        state.runs.pop_front().ok_or_else(|| {
            OpenAiError::new("no more stubbed runs".to_string(), "stub".to_string())
        })
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> ApiResponseOrError<Run> {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(outputs);
        if state.fail_submit {
            return Err(stub_error());
        }
        state.submit_results.pop_front().ok_or_else(|| {
            OpenAiError::new("no more stubbed submit results".to_string(), "stub".to_string())
        })
    }

    async fn latest_message(&self, _thread_id: &str) -> ApiResponseOrError<Option<Message>> {
        self.state
            .lock()
            .unwrap()
            .latest_message
            .clone()
            .ok_or_else(stub_error)
    }

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> ApiResponseOrError<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::UploadFile {
            filename: filename.to_string(),
            len: bytes.len(),
        });
        if state.fail_upload {
            return Err(stub_error());
        }
        state.uploads += 1;
        Ok(format!("file-{}", state.uploads))
    }
}
