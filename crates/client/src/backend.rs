//! Backend seam and wire payloads of the panel HTTP API.
//!
//! [`GenerationBackend`] is the narrow contract the job controller needs
//! from the backend. [`crate::api::PanelApi`] implements it over HTTP;
//! tests substitute scripted fakes.

use async_trait::async_trait;
use serde::Deserialize;

use atelier_core::protocol::STATUS_SUCCESS;
use atelier_core::request::JobRequest;
use atelier_core::types::JobHandle;

use crate::error::PanelError;

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Guess the MIME type from the file extension.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = mime_for(&file_name).to_string();
        Self {
            file_name,
            mime,
            bytes,
        }
    }

    pub fn png(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: "image/png".to_string(),
            bytes,
        }
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Response of `POST /api/upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    /// Server-assigned storage path of the uploaded file.
    #[serde(default)]
    pub path: Option<String>,
}

/// Response of `POST /api/generate`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

impl SubmitResponse {
    /// Extract the job handle; a response without one is malformed.
    pub fn into_handle(self) -> Result<JobHandle, PanelError> {
        match self.prompt_id {
            Some(id) if !id.is_empty() => Ok(JobHandle(id)),
            _ => Err(PanelError::MalformedPayload(
                "submission response has no prompt_id".to_string(),
            )),
        }
    }
}

/// One generated image in a result payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultImage {
    pub url: String,
    /// Backend-side reference to the image, when the backend provides one.
    #[serde(default)]
    pub path: Option<String>,
}

/// Response of `GET /api/result`.
///
/// Missing images while the job is still running are normal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub images: Vec<ResultImage>,
}

impl ResultResponse {
    /// The first image, once the job reports success with at least one.
    pub fn first_image(&self) -> Option<&ResultImage> {
        if self.status == STATUS_SUCCESS {
            self.images.first()
        } else {
            None
        }
    }
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Whether the panel could reach its generation server.
    #[serde(default)]
    pub server: Option<bool>,
}

/// Operations the job controller needs from the panel backend.
///
/// Implementations return the parsed payloads as-is; the upload adapter
/// and the controller interpret their `status` fields.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send a file as a multipart body.
    async fn upload_file(&self, file: &UploadFile) -> Result<UploadResponse, PanelError>;

    /// Submit a job request.
    async fn submit(&self, request: &JobRequest) -> Result<SubmitResponse, PanelError>;

    /// Look up the result of a submitted job.
    async fn fetch_result(&self, handle: &JobHandle) -> Result<ResultResponse, PanelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_is_guessed_from_extension() {
        assert_eq!(UploadFile::new("a.PNG", vec![]).mime, "image/png");
        assert_eq!(UploadFile::new("b.jpeg", vec![]).mime, "image/jpeg");
        assert_eq!(UploadFile::new("noext", vec![]).mime, "application/octet-stream");
    }

    #[test]
    fn first_image_requires_success_status() {
        let pending: ResultResponse = serde_json::from_str(
            r#"{"status":"pending","images":[{"url":"/api/proxy/view?filename=a.png"}]}"#,
        )
        .unwrap();
        assert!(pending.first_image().is_none());

        let done: ResultResponse = serde_json::from_str(
            r#"{"status":"success","images":[{"url":"u1"},{"url":"u2"}]}"#,
        )
        .unwrap();
        assert_eq!(done.first_image().unwrap().url, "u1");
    }

    #[test]
    fn result_without_images_parses() {
        let r: ResultResponse = serde_json::from_str(r#"{"status":"running"}"#).unwrap();
        assert!(r.images.is_empty());
    }

    #[test]
    fn submit_response_requires_prompt_id() {
        let ok: SubmitResponse =
            serde_json::from_str(r#"{"status":"success","prompt_id":"p-1"}"#).unwrap();
        assert_eq!(ok.into_handle().unwrap().as_str(), "p-1");

        let missing: SubmitResponse = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert!(matches!(
            missing.into_handle(),
            Err(PanelError::MalformedPayload(_))
        ));
    }
}
