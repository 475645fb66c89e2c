//! Upload adapter: file in, server-side storage path out.

use atelier_core::protocol::STATUS_SUCCESS;

use crate::backend::{GenerationBackend, UploadFile};
use crate::error::PanelError;

/// Fallback message when a failed upload carries none.
const UPLOAD_FAILED: &str = "upload failed";

/// Upload `file` and return its server-assigned path.
///
/// No file selected is not an error: returns `Ok(None)` without touching
/// the network. Any response whose `status` is not `"success"` fails with
/// [`PanelError::UploadFailed`].
pub async fn upload<B>(backend: &B, file: Option<&UploadFile>) -> Result<Option<String>, PanelError>
where
    B: GenerationBackend + ?Sized,
{
    let Some(file) = file else {
        return Ok(None);
    };

    let response = backend.upload_file(file).await?;
    if response.status != STATUS_SUCCESS {
        let message = response
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UPLOAD_FAILED.to_string());
        return Err(PanelError::UploadFailed(message));
    }

    let path = response.path.filter(|p| !p.is_empty()).ok_or_else(|| {
        PanelError::MalformedPayload("upload response has no path".to_string())
    })?;

    tracing::debug!(file_name = %file.file_name, path = %path, "File uploaded");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use atelier_core::request::JobRequest;
    use atelier_core::types::JobHandle;

    use super::*;
    use crate::backend::{ResultResponse, SubmitResponse, UploadResponse};

    struct ScriptedUpload {
        response: UploadResponse,
        calls: AtomicU32,
    }

    impl ScriptedUpload {
        fn new(json: &str) -> Self {
            Self {
                response: serde_json::from_str(json).unwrap(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedUpload {
        async fn upload_file(&self, _file: &UploadFile) -> Result<UploadResponse, PanelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }

        async fn submit(&self, _request: &JobRequest) -> Result<SubmitResponse, PanelError> {
            unreachable!("upload tests never submit")
        }

        async fn fetch_result(&self, _handle: &JobHandle) -> Result<ResultResponse, PanelError> {
            unreachable!("upload tests never poll")
        }
    }

    fn file() -> UploadFile {
        UploadFile::new("face.jpg", vec![1, 2, 3])
    }

    #[tokio::test]
    async fn no_file_is_a_noop() {
        let backend = ScriptedUpload::new(r#"{"status":"success","path":"x"}"#);
        assert_eq!(upload(&backend, None).await.unwrap(), None);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_returns_path() {
        let backend = ScriptedUpload::new(r#"{"status":"success","path":"uploads/face.jpg"}"#);
        let path = upload(&backend, Some(&file())).await.unwrap();
        assert_eq!(path.as_deref(), Some("uploads/face.jpg"));
    }

    #[tokio::test]
    async fn non_success_status_fails_with_message() {
        let backend = ScriptedUpload::new(r#"{"status":"pending","message":"quota"}"#);
        let err = upload(&backend, Some(&file())).await.unwrap_err();
        assert_matches!(err, PanelError::UploadFailed(msg) if msg == "quota");
    }

    #[tokio::test]
    async fn non_success_without_message_uses_fallback() {
        let backend = ScriptedUpload::new(r#"{"status":"nope"}"#);
        let err = upload(&backend, Some(&file())).await.unwrap_err();
        assert_eq!(err.to_string(), UPLOAD_FAILED);
    }

    #[tokio::test]
    async fn success_without_path_is_malformed() {
        let backend = ScriptedUpload::new(r#"{"status":"success"}"#);
        let err = upload(&backend, Some(&file())).await.unwrap_err();
        assert_matches!(err, PanelError::MalformedPayload(_));
    }
}
