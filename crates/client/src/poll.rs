//! Result polling.
//!
//! Polling is the only authority on job completion: the push channel may
//! report progress, but a job is done only when a result payload carries
//! an image.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use atelier_core::types::JobHandle;

use crate::backend::{GenerationBackend, ResultImage};
use crate::error::PanelError;

/// Default delay between result queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of result queries before giving up.
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60;

/// Tunable parameters of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

/// Query the result endpoint until it returns an image.
///
/// Individual query errors are swallowed and retried; the backend may
/// answer 404 before the job is registered. Returns the first image as
/// soon as one appears, [`PanelError::PollTimeout`] once every attempt
/// is spent, or [`PanelError::Superseded`] if `cancel` fires first.
pub async fn poll_result<B>(
    backend: &B,
    handle: &JobHandle,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<ResultImage, PanelError>
where
    B: GenerationBackend + ?Sized,
{
    for attempt in 1..=config.max_attempts {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PanelError::Superseded),
            outcome = backend.fetch_result(handle) => outcome,
        };

        match outcome {
            Ok(response) => {
                if let Some(image) = response.first_image() {
                    tracing::info!(prompt_id = %handle, attempt, "Result ready");
                    return Ok(image.clone());
                }
                tracing::trace!(
                    prompt_id = %handle,
                    attempt,
                    status = %response.status,
                    "Result not ready",
                );
            }
            Err(e) => {
                tracing::debug!(
                    prompt_id = %handle,
                    attempt,
                    error = %e,
                    "Result query failed, retrying",
                );
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PanelError::Superseded),
            _ = tokio::time::sleep(config.interval) => {}
        }
    }

    tracing::warn!(
        prompt_id = %handle,
        attempts = config.max_attempts,
        "Gave up waiting for result",
    );
    Err(PanelError::PollTimeout {
        attempts: config.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use tokio::time::Instant;

    use atelier_core::request::JobRequest;

    use super::*;
    use crate::backend::{ResultResponse, SubmitResponse, UploadFile, UploadResponse};

    /// Replays scripted result responses; pending once the script runs out.
    struct ScriptedResults {
        script: Mutex<VecDeque<Result<ResultResponse, PanelError>>>,
        calls: AtomicU32,
    }

    impl ScriptedResults {
        fn new(script: Vec<Result<ResultResponse, PanelError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedResults {
        async fn upload_file(&self, _file: &UploadFile) -> Result<UploadResponse, PanelError> {
            unreachable!()
        }

        async fn submit(&self, _request: &JobRequest) -> Result<SubmitResponse, PanelError> {
            unreachable!()
        }

        async fn fetch_result(&self, _handle: &JobHandle) -> Result<ResultResponse, PanelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(pending()))
        }
    }

    fn pending() -> ResultResponse {
        ResultResponse {
            status: "running".into(),
            images: vec![],
        }
    }

    fn success(url: &str) -> ResultResponse {
        ResultResponse {
            status: "success".into(),
            images: vec![ResultImage {
                url: url.into(),
                path: None,
            }],
        }
    }

    fn handle() -> JobHandle {
        JobHandle("p-1".into())
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_image_after_transient_failures() {
        let backend = ScriptedResults::new(vec![
            Err(PanelError::Transport {
                status: 404,
                message: "HTTP 404".into(),
            }),
            Ok(pending()),
            Ok(success("/api/proxy/view?filename=a.png")),
        ]);
        let start = Instant::now();

        let image = poll_result(&backend, &handle(), &PollConfig::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(image.url, "/api/proxy/view?filename=a.png");
        assert_eq!(backend.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn success_status_without_images_keeps_polling() {
        let backend = ScriptedResults::new(vec![
            Ok(ResultResponse {
                status: "success".into(),
                images: vec![],
            }),
            Ok(success("u")),
        ]);

        let image = poll_result(&backend, &handle(), &PollConfig::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(image.url, "u");
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_sixty_attempts_one_second_apart() {
        let backend = ScriptedResults::new(vec![]);
        let start = Instant::now();

        let err = poll_result(&backend, &handle(), &PollConfig::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_matches!(err, PanelError::PollTimeout { attempts: 60 });
        assert_eq!(backend.calls(), 60);
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop() {
        let backend = std::sync::Arc::new(ScriptedResults::new(vec![]));
        let cancel = CancellationToken::new();

        let task = {
            let backend = std::sync::Arc::clone(&backend);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                poll_result(&*backend, &handle(), &PollConfig::default(), &cancel).await
            })
        };

        tokio::time::sleep(Duration::from_millis(4500)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert_matches!(err, PanelError::Superseded);
        assert_eq!(backend.calls(), 5);
    }
}
