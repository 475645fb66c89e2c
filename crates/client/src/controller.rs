//! Job lifecycle controller.
//!
//! [`JobController`] drives one submission at a time through
//! `preparing -> submitted -> done | failed`:
//!
//! 1. **preparing**: reset the progress bar and the task-started flag,
//!    build the [`JobRequest`], upload the source image (and, for
//!    inpainting, the drawn mask).
//! 2. **submitted**: post the request and poll for the result.
//! 3. **done**: pin the bar at 100%, record the [`ResultReference`], and
//!    hide the bar after a short delay.
//! 4. **failed**: hide the bar and surface the error message.
//!
//! Starting a new submission cancels the previous one's token, which
//! stops its upload/submit/poll at the next suspension point. A
//! superseded run leaves the shared progress and phase state alone.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use atelier_core::mask::{ImageGeometry, MaskEditor};
use atelier_core::mode::{GenerationMode, GenerationType};
use atelier_core::protocol::strip_proxy_prefix;
use atelier_core::request::{GenerationForm, JobRequest};
use atelier_core::types::{JobHandle, SessionId, Timestamp};

use crate::backend::{GenerationBackend, ResultImage, UploadFile};
use crate::config::{PanelConfig, DEFAULT_FINISH_DELAY};
use crate::error::PanelError;
use crate::poll::{poll_result, PollConfig};
use crate::progress::ProgressTracker;
use crate::upload::upload;

/// File name the exported mask is uploaded under.
pub const MASK_FILE_NAME: &str = "mask.png";

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

/// Where the current submission is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobPhase {
    #[default]
    Idle,
    /// Uploading dependencies; any previous result is hidden.
    Preparing,
    /// Submitted and polling.
    Submitted { prompt_id: JobHandle },
    /// Result displayed.
    Done { url: String },
    /// Failed; `message` is what the user is shown.
    Failed { message: String },
}

/// The most recently displayed result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultReference {
    /// URL the image is displayed from.
    pub url: String,
    /// Backend-side reference to the image, used as the source image when
    /// a mask is applied to this result.
    pub image_path: String,
    pub prompt_id: JobHandle,
    pub completed_at: Timestamp,
}

impl ResultReference {
    fn new(image: ResultImage, prompt_id: JobHandle) -> Self {
        let image_path = image
            .path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| strip_proxy_prefix(&image.url).to_string());
        Self {
            url: image.url,
            image_path,
            prompt_id,
            completed_at: chrono::Utc::now(),
        }
    }
}

/// Timing parameters of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub poll: PollConfig,
    /// How long the completed bar stays visible before it is hidden.
    pub finish_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            finish_delay: DEFAULT_FINISH_DELAY,
        }
    }
}

impl From<&PanelConfig> for ControllerConfig {
    fn from(config: &PanelConfig) -> Self {
        Self {
            poll: config.poll,
            finish_delay: config.finish_delay,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the generation lifecycle for one panel session.
pub struct JobController<B> {
    backend: Arc<B>,
    session: SessionId,
    progress: Arc<ProgressTracker>,
    mask: Mutex<MaskEditor>,
    phase: watch::Sender<JobPhase>,
    last_result: Mutex<Option<ResultReference>>,
    /// Cancellation token of the newest submission.
    current: Mutex<Option<CancellationToken>>,
    config: ControllerConfig,
}

impl<B> JobController<B>
where
    B: GenerationBackend + 'static,
{
    pub fn new(backend: Arc<B>, session: SessionId, config: ControllerConfig) -> Self {
        let (phase, _) = watch::channel(JobPhase::Idle);
        Self {
            backend,
            session,
            progress: Arc::new(ProgressTracker::new()),
            mask: Mutex::new(MaskEditor::new()),
            phase,
            last_result: Mutex::new(None),
            current: Mutex::new(None),
            config,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Progress tracker, to share with the push channel or a renderer.
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    pub fn phase(&self) -> JobPhase {
        self.phase.borrow().clone()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<JobPhase> {
        self.phase.subscribe()
    }

    pub fn last_result(&self) -> Option<ResultReference> {
        lock(&self.last_result).clone()
    }

    // ---- mask session ----

    /// Arm the mask editor over the displayed image.
    pub fn arm_mask(&self, geometry: ImageGeometry) -> Result<u64, PanelError> {
        Ok(lock(&self.mask).arm(geometry)?)
    }

    /// Hide the mask canvas and drop its strokes.
    pub fn cancel_mask(&self) {
        lock(&self.mask).cancel();
    }

    /// Run `f` against the mask editor, e.g. to forward pointer events.
    pub fn with_mask<R>(&self, f: impl FnOnce(&mut MaskEditor) -> R) -> R {
        f(&mut lock(&self.mask))
    }

    // ---- submissions ----

    /// Submit a job built from the form for `mode`.
    ///
    /// `file` is the user's selected upload; it is required (and only
    /// sent) when the mode needs a source image.
    pub async fn generate(
        &self,
        mode: GenerationMode,
        gen_type: GenerationType,
        form: &GenerationForm,
        file: Option<&UploadFile>,
    ) -> Result<ResultReference, PanelError> {
        let token = self.begin_submission();
        tracing::info!(mode = %mode, session = %self.session, "Starting submission");

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(PanelError::Superseded),
            outcome = async {
                let request = self.prepare(mode, gen_type, form, file).await?;
                self.submit_and_observe(request, &token).await
            } => outcome,
        };

        self.conclude(outcome, &token)
    }

    /// Re-submit the displayed result as an inpaint job under the drawn mask.
    ///
    /// Same lifecycle as [`generate`](Self::generate); the source image is
    /// the stored [`ResultReference::image_path`] instead of a new upload.
    pub async fn apply_mask(&self, prompt: &str) -> Result<ResultReference, PanelError> {
        if !lock(&self.mask).has_strokes() {
            return Err(PanelError::MaskNotDrawn);
        }
        let image_path = self
            .last_result()
            .map(|r| r.image_path)
            .ok_or(PanelError::NoPreviousResult)?;

        let token = self.begin_submission();
        tracing::info!(session = %self.session, image = %image_path, "Applying mask to result");

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(PanelError::Superseded),
            outcome = async {
                let mask = self.export_mask().await?.ok_or_else(|| {
                    PanelError::MaskExportFailed("mask canvas is empty".to_string())
                })?;
                let mask_path = self.upload_required(&mask, "mask").await?;
                let request = JobRequest::mask_apply(&self.session, image_path, mask_path, prompt);
                self.submit_and_observe(request, &token).await
            } => outcome,
        };

        let result = self.conclude(outcome, &token);
        if result.is_ok() {
            self.cancel_mask();
        }
        result
    }

    // ---- private helpers ----

    /// Cancel any in-flight submission and reset the shared state.
    fn begin_submission(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = lock(&self.current).replace(token.clone()) {
            if !previous.is_cancelled() {
                tracing::debug!("Cancelling superseded submission");
                previous.cancel();
            }
        }
        self.progress.begin();
        self.phase.send_replace(JobPhase::Preparing);
        token
    }

    async fn prepare(
        &self,
        mode: GenerationMode,
        gen_type: GenerationType,
        form: &GenerationForm,
        file: Option<&UploadFile>,
    ) -> Result<JobRequest, PanelError> {
        let mut request = JobRequest::from_form(mode, form, &self.session)?;

        if mode.requires_source_image(gen_type) {
            let path = upload(&*self.backend, file)
                .await?
                .ok_or(PanelError::MissingUpload(missing_upload_message(mode)))?;
            request = request.with_image(path);
        }

        if mode == GenerationMode::Inpaint {
            if let Some(mask) = self.export_mask().await? {
                let mask_path = self.upload_required(&mask, "mask").await?;
                request = request.with_mask(mask_path);
            }
        }

        Ok(request)
    }

    async fn submit_and_observe(
        &self,
        request: JobRequest,
        token: &CancellationToken,
    ) -> Result<ResultReference, PanelError> {
        let handle = self.backend.submit(&request).await?.into_handle()?;
        tracing::info!(prompt_id = %handle, mode = %request.mode, "Job submitted");
        self.phase.send_replace(JobPhase::Submitted {
            prompt_id: handle.clone(),
        });

        let image = poll_result(&*self.backend, &handle, &self.config.poll, token).await?;
        Ok(ResultReference::new(image, handle))
    }

    /// Apply the terminal state of a submission to the shared state.
    fn conclude(
        &self,
        outcome: Result<ResultReference, PanelError>,
        token: &CancellationToken,
    ) -> Result<ResultReference, PanelError> {
        if token.is_cancelled() {
            tracing::debug!("Submission superseded; leaving state to the newer one");
            return Err(PanelError::Superseded);
        }

        match outcome {
            Ok(result) => {
                let epoch = self.progress.complete();
                let progress = Arc::clone(&self.progress);
                let delay = self.config.finish_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    progress.settle(epoch);
                });

                *lock(&self.last_result) = Some(result.clone());
                self.phase.send_replace(JobPhase::Done {
                    url: result.url.clone(),
                });
                tracing::info!(prompt_id = %result.prompt_id, url = %result.url, "Job finished");
                Ok(result)
            }
            Err(e) => {
                self.progress.hide();
                self.phase.send_replace(JobPhase::Failed {
                    message: e.to_string(),
                });
                tracing::warn!(error = %e, "Submission failed");
                Err(e)
            }
        }
    }

    /// PNG-encode the drawn mask off the async task.
    ///
    /// `Ok(None)` when nothing was drawn.
    async fn export_mask(&self) -> Result<Option<UploadFile>, PanelError> {
        let Some(snapshot) = lock(&self.mask).snapshot() else {
            return Ok(None);
        };
        let png = tokio::task::spawn_blocking(move || snapshot.encode_png())
            .await
            .map_err(|e| PanelError::MaskExportFailed(e.to_string()))??;
        Ok(Some(UploadFile::png(MASK_FILE_NAME, png)))
    }

    async fn upload_required(&self, file: &UploadFile, what: &str) -> Result<String, PanelError> {
        upload(&*self.backend, Some(file)).await?.ok_or_else(|| {
            PanelError::MalformedPayload(format!("{what} upload returned no path"))
        })
    }
}

/// Message shown when a mode's required source image is missing.
fn missing_upload_message(mode: GenerationMode) -> &'static str {
    match mode {
        GenerationMode::TextToImage => "Please upload a source image",
        GenerationMode::FaceSwap => "Please upload the image to face-swap",
        GenerationMode::Inpaint => "Please upload the image to repair",
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
