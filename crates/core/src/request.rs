//! Job request construction from the panel form.
//!
//! A [`JobRequest`] is built fresh for each submission from the active
//! mode and the current [`GenerationForm`], then completed with the
//! server-side paths of any uploaded source image or mask. Optional
//! fields are omitted from the JSON body when unset.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::mode::GenerationMode;
use crate::types::SessionId;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Prompt sent by `text_to_image` when the prompt field is left empty.
pub const DEFAULT_TXT2IMG_PROMPT: &str =
    "realistic style, asian woman, natural light, clear facial details";

/// Prompt sent when applying an edited mask with the prompt field empty.
pub const DEFAULT_REPAIR_PROMPT: &str = "repair image";

pub const DEFAULT_WIDTH: u32 = 1024;
pub const DEFAULT_HEIGHT: u32 = 1024;
pub const DEFAULT_STEPS: u32 = 20;
pub const DEFAULT_GUIDANCE: f32 = 5.5;

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

/// User-editable generation parameters.
///
/// Empty prompt strings mean "not overridden"; see [`JobRequest::from_form`]
/// for the per-mode fallbacks.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct GenerationForm {
    pub prompt: String,
    pub negative_prompt: String,
    #[validate(range(min = 64, max = 4096))]
    pub width: u32,
    #[validate(range(min = 64, max = 4096))]
    pub height: u32,
    #[validate(range(min = 1, max = 150))]
    pub steps: u32,
    #[validate(range(min = 0.0, max = 30.0))]
    pub guidance: f32,
    pub seed: Option<i64>,
}

impl Default for GenerationForm {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            steps: DEFAULT_STEPS,
            guidance: DEFAULT_GUIDANCE,
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// JSON body of a job submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub mode: GenerationMode,
    pub client_id: SessionId,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Server-side path of the source image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Server-side path of the mask image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
}

impl JobRequest {
    fn bare(mode: GenerationMode, client_id: &SessionId, prompt: String) -> Self {
        Self {
            mode,
            client_id: client_id.clone(),
            prompt,
            negative_prompt: None,
            width: None,
            height: None,
            steps: None,
            guidance: None,
            seed: None,
            image: None,
            mask: None,
        }
    }

    /// Build the mode-dependent request body from the form.
    ///
    /// - `text_to_image`: validates the form, falls back to
    ///   [`DEFAULT_TXT2IMG_PROMPT`] and an empty negative prompt, and
    ///   sends every sampling parameter.
    /// - `face_swap` / `inpaint`: prompt only (empty when unset).
    ///
    /// Source image and mask paths are attached afterwards with
    /// [`with_image`](Self::with_image) / [`with_mask`](Self::with_mask).
    pub fn from_form(
        mode: GenerationMode,
        form: &GenerationForm,
        client_id: &SessionId,
    ) -> Result<Self, CoreError> {
        match mode {
            GenerationMode::TextToImage => {
                form.validate()
                    .map_err(|e| CoreError::Validation(e.to_string()))?;
                let prompt = if form.prompt.is_empty() {
                    DEFAULT_TXT2IMG_PROMPT.to_string()
                } else {
                    form.prompt.clone()
                };
                Ok(Self {
                    negative_prompt: Some(form.negative_prompt.clone()),
                    width: Some(form.width),
                    height: Some(form.height),
                    steps: Some(form.steps),
                    guidance: Some(form.guidance),
                    seed: form.seed,
                    ..Self::bare(mode, client_id, prompt)
                })
            }
            GenerationMode::FaceSwap | GenerationMode::Inpaint => {
                Ok(Self::bare(mode, client_id, form.prompt.clone()))
            }
        }
    }

    /// Inpaint request re-submitting a previous result under a new mask.
    pub fn mask_apply(
        client_id: &SessionId,
        image_path: impl Into<String>,
        mask_path: impl Into<String>,
        prompt: &str,
    ) -> Self {
        let prompt = if prompt.is_empty() {
            DEFAULT_REPAIR_PROMPT
        } else {
            prompt
        };
        Self::bare(GenerationMode::Inpaint, client_id, prompt.to_string())
            .with_image(image_path)
            .with_mask(mask_path)
    }

    pub fn with_image(mut self, path: impl Into<String>) -> Self {
        self.image = Some(path.into());
        self
    }

    pub fn with_mask(mut self, path: impl Into<String>) -> Self {
        self.mask = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn session() -> SessionId {
        SessionId::generate()
    }

    #[test]
    fn txt2img_defaults_fill_prompt_and_parameters() {
        let client_id = session();
        let req = JobRequest::from_form(
            GenerationMode::TextToImage,
            &GenerationForm::default(),
            &client_id,
        )
        .unwrap();

        assert_eq!(req.prompt, DEFAULT_TXT2IMG_PROMPT);
        assert_eq!(req.negative_prompt.as_deref(), Some(""));
        assert_eq!(req.width, Some(DEFAULT_WIDTH));
        assert_eq!(req.height, Some(DEFAULT_HEIGHT));
        assert_eq!(req.steps, Some(DEFAULT_STEPS));
        assert_eq!(req.guidance, Some(DEFAULT_GUIDANCE));
        assert_eq!(req.seed, None);
        assert_eq!(req.image, None);
        assert_eq!(req.client_id, client_id);
    }

    #[test]
    fn txt2img_body_omits_unset_optionals() {
        let req = JobRequest::from_form(
            GenerationMode::TextToImage,
            &GenerationForm::default(),
            &session(),
        )
        .unwrap();
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["mode"], "txt2img");
        assert!(json.get("seed").is_none());
        assert!(json.get("image").is_none());
        assert!(json.get("mask").is_none());
        assert_eq!(json["steps"], DEFAULT_STEPS);
    }

    #[test]
    fn txt2img_keeps_user_prompt_and_seed() {
        let form = GenerationForm {
            prompt: "a lighthouse at dusk".into(),
            seed: Some(42),
            ..Default::default()
        };
        let req = JobRequest::from_form(GenerationMode::TextToImage, &form, &session()).unwrap();
        assert_eq!(req.prompt, "a lighthouse at dusk");
        assert_eq!(req.seed, Some(42));
    }

    #[test]
    fn txt2img_rejects_out_of_range_steps() {
        let form = GenerationForm {
            steps: 0,
            ..Default::default()
        };
        let err = JobRequest::from_form(GenerationMode::TextToImage, &form, &session()).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("steps"));
    }

    #[test]
    fn face_swap_sends_prompt_only() {
        let form = GenerationForm {
            steps: 0,
            negative_prompt: "blurry".into(),
            ..Default::default()
        };
        let req = JobRequest::from_form(GenerationMode::FaceSwap, &form, &session()).unwrap();
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["mode"], "face_swap");
        assert_eq!(json["prompt"], "");
        assert!(json.get("negative_prompt").is_none());
        assert!(json.get("steps").is_none());
        assert!(json.get("width").is_none());
    }

    #[test]
    fn mask_apply_uses_repair_prompt_fallback() {
        let req = JobRequest::mask_apply(&session(), "filename=a.png", "uploads/mask.png", "");
        assert_eq!(req.mode, GenerationMode::Inpaint);
        assert_eq!(req.prompt, DEFAULT_REPAIR_PROMPT);
        assert_eq!(req.image.as_deref(), Some("filename=a.png"));
        assert_eq!(req.mask.as_deref(), Some("uploads/mask.png"));
    }
}
