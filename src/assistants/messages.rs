use crate::{
    client::{List, OpenAiClient},
    ApiResponseOrError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created_at: u32,
    /// The thread ID that this message belongs to.
    pub thread_id: String,
    /// The entity that produced the message. One of user or assistant
    pub role: Role,
    /// The content of the message.
    pub content: Vec<MessageContent>,
    /// The assistant that produced the message.
    #[serde(default)]
    pub assistant_id: Option<String>,
    /// The ID of the run associated with the creation of this message. Value is null when messages are created manually using the create message or create thread endpoints.
    #[serde(default)]
    pub run_id: Option<String>,
    /// A list of files attached to the message.
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
}

impl Message {
    /// The value of the first text part, if the message has one.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find_map(|content| content.text.as_ref())
            .map(|text| text.value.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One part of a message. Only `text` parts carry a payload this crate reads;
/// image parts are kept by their type only.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Text>,
}

impl MessageContent {
    pub fn text(value: impl Into<String>) -> Self {
        MessageContent {
            kind: "text".to_string(),
            text: Some(Text {
                value: value.into(),
                annotations: Vec::new(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Text {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_id: String,
    pub tools: Vec<AttachmentTool>,
}

impl Attachment {
    /// Attaches an uploaded file so the assistant can search it.
    pub fn file_search(file_id: impl Into<String>) -> Self {
        Attachment {
            file_id: file_id.into(),
            tools: vec![AttachmentTool {
                kind: "file_search".to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AttachmentTool {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CreateMessageRequest {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

impl CreateMessageRequest {
    /// A user message with every file id attached. No `attachments` key is
    /// sent when there are no files.
    pub fn user(content: impl Into<String>, file_ids: &[String]) -> Self {
        let attachments = (!file_ids.is_empty())
            .then(|| file_ids.iter().map(Attachment::file_search).collect());

        CreateMessageRequest {
            role: Role::User,
            content: content.into(),
            attachments,
        }
    }

    pub fn file_ids(&self) -> Vec<&str> {
        self.attachments
            .iter()
            .flatten()
            .map(|attachment| attachment.file_id.as_str())
            .collect()
    }
}

impl OpenAiClient {
    pub async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> ApiResponseOrError<Message> {
        self.post(format!("threads/{thread_id}/messages"), request)
            .await
    }

    /// Lists the newest `limit` messages of a thread, newest first.
    pub async fn list_recent_messages(
        &self,
        thread_id: &str,
        limit: u8,
    ) -> ApiResponseOrError<List<Message>> {
        self.get(format!(
            "threads/{thread_id}/messages?limit={limit}&order=desc"
        ))
        .await
    }
}
