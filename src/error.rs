use crate::OpenAiError;

/// A remote call that ended the current initiate or poll operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    CreateThreadAndRun(OpenAiError),
    AddMessage(OpenAiError),
    CreateRun(OpenAiError),
    FetchStatus(OpenAiError),
    SubmitToolOutputs(OpenAiError),
    FetchMessage(OpenAiError),
}

impl RunError {
    pub fn source_error(&self) -> &OpenAiError {
        match self {
            RunError::CreateThreadAndRun(error)
            | RunError::AddMessage(error)
            | RunError::CreateRun(error)
            | RunError::FetchStatus(error)
            | RunError::SubmitToolOutputs(error)
            | RunError::FetchMessage(error) => error,
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = match self {
            RunError::CreateThreadAndRun(_) => "creating thread and run",
            RunError::AddMessage(_) => "adding message to thread",
            RunError::CreateRun(_) => "creating run",
            RunError::FetchStatus(_) => "retrieving run status",
            RunError::SubmitToolOutputs(_) => "submitting tool outputs",
            RunError::FetchMessage(_) => "retrieving final messages",
        };
        write!(f, "Error {step}: {}", self.source_error())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source_error())
    }
}
