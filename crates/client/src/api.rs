//! HTTP client for the panel API.
//!
//! Wraps the upload, submission, result and health endpoints using
//! [`reqwest`]. Every JSON call goes through [`PanelApi::fetch_json`],
//! the single place where HTTP failures, non-JSON bodies and
//! `status: "error"` payloads become [`PanelError`]s.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use atelier_core::protocol::{
    CLIENT_ID_HEADER, GENERATE_PATH, HEALTH_PATH, RESULT_PATH, STATUS_ERROR, UPLOAD_FIELD,
    UPLOAD_PATH,
};
use atelier_core::request::JobRequest;
use atelier_core::types::JobHandle;

use crate::backend::{
    GenerationBackend, HealthResponse, ResultResponse, SubmitResponse, UploadFile, UploadResponse,
};
use crate::error::PanelError;

/// Raw bodies quoted in [`PanelError::NonJsonResponse`] are cut to this many chars.
const MAX_QUOTED_BODY_CHARS: usize = 200;

/// HTTP client for one panel backend.
#[derive(Debug, Clone)]
pub struct PanelApi {
    client: reqwest::Client,
    base_url: String,
}

impl PanelApi {
    /// Create a client for a panel backend.
    ///
    /// * `base_url` - HTTP base URL, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an endpoint path or a server-relative URL against the base.
    /// Absolute URLs pass through unchanged.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Send a request and decode its JSON body.
    ///
    /// Fails with [`PanelError::NonJsonResponse`] when the body does not
    /// parse, and with [`PanelError::Transport`] when the status is not
    /// 2xx or the payload's `status` field reads `"error"`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PanelError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let value = interpret_body(status.as_u16(), status.is_success(), &text)?;
        serde_json::from_value(value).map_err(|e| PanelError::MalformedPayload(e.to_string()))
    }

    /// Probe `GET /health`.
    pub async fn health(&self) -> Result<HealthResponse, PanelError> {
        self.fetch_json(self.client.get(self.url(HEALTH_PATH))).await
    }

    /// Download a result image (usually a `/api/proxy/view?...` URL).
    pub async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, PanelError> {
        let response = self.client.get(self.url(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PanelError::Transport {
                status: status.as_u16(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl GenerationBackend for PanelApi {
    async fn upload_file(&self, file: &UploadFile) -> Result<UploadResponse, PanelError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime)?;
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);

        self.fetch_json(self.client.post(self.url(UPLOAD_PATH)).multipart(form))
            .await
    }

    async fn submit(&self, request: &JobRequest) -> Result<SubmitResponse, PanelError> {
        let builder = self
            .client
            .post(self.url(GENERATE_PATH))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(CLIENT_ID_HEADER, request.client_id.as_str())
            .json(request);

        self.fetch_json(builder).await
    }

    async fn fetch_result(&self, handle: &JobHandle) -> Result<ResultResponse, PanelError> {
        let builder = self
            .client
            .get(self.url(RESULT_PATH))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("prompt_id", handle.as_str())]);

        self.fetch_json(builder).await
    }
}

/// Classify a response body.
///
/// Parses `text` as JSON, then rejects non-success statuses and payloads
/// whose `status` is `"error"`, preferring the payload's `message` over
/// a generic `HTTP <status>`.
pub fn interpret_body(
    status: u16,
    is_success: bool,
    text: &str,
) -> Result<serde_json::Value, PanelError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| PanelError::NonJsonResponse {
            status,
            body: text.chars().take(MAX_QUOTED_BODY_CHARS).collect(),
        })?;

    let error_status = value.get("status").and_then(|s| s.as_str()) == Some(STATUS_ERROR);
    if !is_success || error_status {
        let message = value
            .get("message")
            .and_then(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(PanelError::Transport { status, message });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn url_joins_relative_paths() {
        let api = PanelApi::new("http://host:5000/");
        assert_eq!(api.url("/api/upload"), "http://host:5000/api/upload");
        assert_eq!(api.url("api/upload"), "http://host:5000/api/upload");
        assert_eq!(api.url("https://cdn/x.png"), "https://cdn/x.png");
    }

    #[test]
    fn interpret_accepts_success_payload() {
        let value = interpret_body(200, true, r#"{"status":"success","path":"p"}"#).unwrap();
        assert_eq!(value["path"], "p");
    }

    #[test]
    fn interpret_rejects_non_json_with_truncated_body() {
        let body = "<html>".repeat(100);
        let err = interpret_body(502, false, &body).unwrap_err();
        assert_matches!(err, PanelError::NonJsonResponse { status: 502, body } if body.chars().count() == 200);
    }

    #[test]
    fn interpret_rejects_error_status_payload_even_on_200() {
        let err = interpret_body(200, true, r#"{"status":"error","message":"disk full"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn interpret_falls_back_to_http_status() {
        let err = interpret_body(404, false, r#"{"error":"Not found"}"#).unwrap_err();
        assert_matches!(err, PanelError::Transport { status: 404, ref message } if message == "HTTP 404");
    }
}
