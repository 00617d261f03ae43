use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::BackendError;

const REQUEST_TIMEOUT_SECS: u64 = 120;
const MAX_ERROR_BODY_CHARS: usize = 500;

pub(super) fn build_client() -> Result<Client, BackendError> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|err| BackendError::Configuration(err.to_string()))
}

pub(super) fn trim_trailing_slash(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

pub(super) fn json_headers(extra: &[(&'static str, &str)]) -> Result<HeaderMap, BackendError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for &(name, value) in extra {
        let value = HeaderValue::from_str(value)
            .map_err(|err| BackendError::Configuration(format!("invalid {name} header: {err}")))?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}

pub(super) fn encode_image(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub(super) async fn post_json<T, R>(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    body: &T,
) -> Result<R, BackendError>
where
    T: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|err| BackendError::Transport(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    response
        .json::<R>()
        .await
        .map_err(|err| BackendError::Transport(format!("malformed response: {err}")))
}

/// Reject empty completions so callers never parse an empty string as "no opinion".
pub(super) fn non_empty(text: Option<String>) -> Result<String, BackendError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(BackendError::EmptyResponse),
    }
}
