//! Text/vision generation backends.
//!
//! The pipeline only ever talks to [`TextBackend`]. Which concrete provider
//! sits behind it is decided once, from settings, by [`Backend::from_settings`].

mod gemini;
mod http;
mod local;
mod openai;

use std::future::Future;

use thiserror::Error;

use crate::settings::BackendSettings;

pub use gemini::GeminiBackend;
pub use local::LocalBackend;
pub use openai::OpenAiBackend;

/// Caption request sent with every sampled frame.
pub const FRAME_CAPTION_PROMPT: &str = "Describe what is on this screen in one or two short, factual sentences. \
Name the application or website in use, the content visible, and what the user appears to be doing. \
Do not speculate beyond what is visible.";

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend returned no text")]
    EmptyResponse,
    #[error("provider '{0}' is not supported")]
    Unsupported(String),
    #[error("backend misconfigured: {0}")]
    Configuration(String),
}

/// The capability the pipeline consumes. All three calls are opaque text
/// generation; parsing whatever comes back is the caller's job.
pub trait TextBackend: Send + Sync {
    /// Identifier recorded as `source_model` on observations.
    fn model_name(&self) -> &str;

    /// Best-effort short caption for one encoded frame.
    fn describe_frame(
        &self,
        image: &[u8],
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// Completion expected to contain a JSON object.
    fn generate_structured(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// Free-form completion.
    fn generate_text(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;
}

/// Configuration-time choice of provider.
pub enum Backend {
    Gemini(GeminiBackend),
    OpenAi(OpenAiBackend),
    Local(LocalBackend),
    Unsupported { provider: String },
}

impl Backend {
    pub fn from_settings(settings: &BackendSettings) -> Result<Self, BackendError> {
        let provider = settings.provider.trim().to_ascii_lowercase();
        let backend = match provider.as_str() {
            "gemini" => Backend::Gemini(GeminiBackend::new(settings)?),
            "openai" => Backend::OpenAi(OpenAiBackend::new(settings)?),
            "local" | "ollama" => Backend::Local(LocalBackend::new(settings)?),
            _ => Backend::Unsupported { provider },
        };
        Ok(backend)
    }

    pub fn provider(&self) -> &str {
        match self {
            Backend::Gemini(_) => "gemini",
            Backend::OpenAi(_) => "openai",
            Backend::Local(_) => "local",
            Backend::Unsupported { provider } => provider,
        }
    }
}

impl TextBackend for Backend {
    fn model_name(&self) -> &str {
        match self {
            Backend::Gemini(b) => b.model_name(),
            Backend::OpenAi(b) => b.model_name(),
            Backend::Local(b) => b.model_name(),
            Backend::Unsupported { .. } => "unsupported",
        }
    }

    async fn describe_frame(&self, image: &[u8]) -> Result<String, BackendError> {
        match self {
            Backend::Gemini(b) => b.describe_frame(image).await,
            Backend::OpenAi(b) => b.describe_frame(image).await,
            Backend::Local(b) => b.describe_frame(image).await,
            Backend::Unsupported { provider } => Err(BackendError::Unsupported(provider.clone())),
        }
    }

    async fn generate_structured(&self, prompt: &str) -> Result<String, BackendError> {
        match self {
            Backend::Gemini(b) => b.generate_structured(prompt).await,
            Backend::OpenAi(b) => b.generate_structured(prompt).await,
            Backend::Local(b) => b.generate_structured(prompt).await,
            Backend::Unsupported { provider } => Err(BackendError::Unsupported(provider.clone())),
        }
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, BackendError> {
        match self {
            Backend::Gemini(b) => b.generate_text(prompt).await,
            Backend::OpenAi(b) => b.generate_text(prompt).await,
            Backend::Local(b) => b.generate_text(prompt).await,
            Backend::Unsupported { provider } => Err(BackendError::Unsupported(provider.clone())),
        }
    }
}
