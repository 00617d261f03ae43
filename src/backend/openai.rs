use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{build_client, encode_image, json_headers, non_empty, post_json, trim_trailing_slash};
use super::{BackendError, TextBackend, FRAME_CAPTION_PROMPT};
use crate::settings::BackendSettings;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TEMPERATURE: f32 = 0.3;

/// Chat-completions style API.
pub struct OpenAiBackend {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| BackendError::Configuration("openai requires an API key".into()))?;

        Ok(Self {
            http: build_client()?,
            endpoint: trim_trailing_slash(
                settings.endpoint.clone().unwrap_or_else(|| DEFAULT_ENDPOINT.into()),
            ),
            model: settings.model.clone().unwrap_or_else(|| DEFAULT_MODEL.into()),
            api_key,
        })
    }

    async fn complete(&self, content: Vec<ContentPart<'_>>) -> Result<String, BackendError> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content }],
            temperature: TEMPERATURE,
        };
        let bearer = format!("Bearer {}", self.api_key);
        let headers = json_headers(&[("authorization", bearer.as_str())])?;
        let response: ChatResponse = post_json(&self.http, &url, headers, &request).await?;
        non_empty(
            response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content),
        )
    }
}

impl TextBackend for OpenAiBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn describe_frame(&self, image: &[u8]) -> Result<String, BackendError> {
        let data_url = format!("data:image/jpeg;base64,{}", encode_image(image));
        self.complete(vec![
            ContentPart::Text { text: FRAME_CAPTION_PROMPT },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: data_url },
            },
        ])
        .await
    }

    // JSON-object response mode rejects top-level arrays, so structured
    // requests go out as plain completions and rely on the caller's parser.
    async fn generate_structured(&self, prompt: &str) -> Result<String, BackendError> {
        self.complete(vec![ContentPart::Text { text: prompt }]).await
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, BackendError> {
        self.complete(vec![ContentPart::Text { text: prompt }]).await
    }
}
