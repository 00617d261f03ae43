use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{build_client, encode_image, json_headers, non_empty, post_json, trim_trailing_slash};
use super::{BackendError, TextBackend, FRAME_CAPTION_PROMPT};
use crate::settings::BackendSettings;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const TEMPERATURE: f32 = 0.3;

/// Google Generative Language API (`generateContent`).
pub struct GeminiBackend {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|part| part.text).collect();
        Some(text)
    }
}

impl GeminiBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| BackendError::Configuration("gemini requires an API key".into()))?;

        Ok(Self {
            http: build_client()?,
            endpoint: trim_trailing_slash(
                settings.endpoint.clone().unwrap_or_else(|| DEFAULT_ENDPOINT.into()),
            ),
            model: settings.model.clone().unwrap_or_else(|| DEFAULT_MODEL.into()),
            api_key,
        })
    }

    async fn generate(
        &self,
        parts: Vec<Part<'_>>,
        response_mime_type: Option<&'static str>,
    ) -> Result<String, BackendError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model);
        let request = GenerateRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                response_mime_type,
            },
        };
        let headers = json_headers(&[("x-goog-api-key", self.api_key.as_str())])?;
        let response: GenerateResponse = post_json(&self.http, &url, headers, &request).await?;
        non_empty(response.into_text())
    }
}

impl TextBackend for GeminiBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn describe_frame(&self, image: &[u8]) -> Result<String, BackendError> {
        let parts = vec![
            Part::Text { text: FRAME_CAPTION_PROMPT },
            Part::Image {
                inline_data: InlineData {
                    mime_type: "image/jpeg",
                    data: encode_image(image),
                },
            },
        ];
        self.generate(parts, None).await
    }

    async fn generate_structured(&self, prompt: &str) -> Result<String, BackendError> {
        self.generate(vec![Part::Text { text: prompt }], Some("application/json"))
            .await
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, BackendError> {
        self.generate(vec![Part::Text { text: prompt }], None).await
    }
}
