use crate::{client::OpenAiClient, ApiResponseOrError};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct File {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created_at: u32,
    #[serde(default)]
    pub bytes: u32,
    pub filename: String,
    pub purpose: FilePurpose,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FilePurpose {
    Assistants,
    AssistantsOutput,
    Vision,
}

impl OpenAiClient {
    pub async fn upload_file(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        purpose: FilePurpose,
    ) -> ApiResponseOrError<File> {
        self.post_multipart("files", || {
            let file_part = Part::bytes(bytes.clone()).file_name(filename.to_string());

            Form::new()
                .part("file", file_part)
                .text("purpose", purpose.to_string())
        })
        .await
    }
}
