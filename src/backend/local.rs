use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{build_client, encode_image, json_headers, non_empty, post_json, trim_trailing_slash};
use super::{BackendError, TextBackend, FRAME_CAPTION_PROMPT};
use crate::settings::BackendSettings;

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen2.5vl:3b";

/// Ollama-style `/api/generate` endpoint running on this machine.
pub struct LocalBackend {
    http: Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct LocalRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Deserialize)]
struct LocalResponse {
    response: Option<String>,
}

impl LocalBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        Ok(Self {
            http: build_client()?,
            endpoint: trim_trailing_slash(
                settings.endpoint.clone().unwrap_or_else(|| DEFAULT_ENDPOINT.into()),
            ),
            model: settings.model.clone().unwrap_or_else(|| DEFAULT_MODEL.into()),
        })
    }

    async fn generate(
        &self,
        prompt: &str,
        images: Vec<String>,
        format: Option<&'static str>,
    ) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.endpoint);
        let request = LocalRequest {
            model: &self.model,
            prompt,
            images,
            stream: false,
            format,
        };
        let response: LocalResponse =
            post_json(&self.http, &url, json_headers(&[])?, &request).await?;
        non_empty(response.response)
    }
}

impl TextBackend for LocalBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn describe_frame(&self, image: &[u8]) -> Result<String, BackendError> {
        self.generate(FRAME_CAPTION_PROMPT, vec![encode_image(image)], None)
            .await
    }

    async fn generate_structured(&self, prompt: &str) -> Result<String, BackendError> {
        self.generate(prompt, Vec::new(), Some("json")).await
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, BackendError> {
        self.generate(prompt, Vec::new(), None).await
    }
}
