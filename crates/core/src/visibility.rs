//! Field-visibility projection for the panel form.
//!
//! Pure presentation state: given the active mode and `text_to_image`
//! sub-type, decide which inputs are shown and how the upload field is
//! labelled. No backend interaction.

use serde::Serialize;

use crate::mode::{GenerationMode, GenerationType};

/// Upload label when seeding `text_to_image` with an init image.
pub const LABEL_SOURCE_IMAGE: &str = "upload source image";
/// Upload label in `face_swap` mode.
pub const LABEL_FACE_SWAP_TARGET: &str = "upload face-swap target";
/// Upload label in `inpaint` mode.
pub const LABEL_REPAIR_IMAGE: &str = "upload image to repair";

/// Which form sections are visible for a mode/sub-type pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldVisibility {
    pub gen_type_selector: bool,
    pub preset_selector: bool,
    pub negative_prompt: bool,
    pub upload: bool,
    pub mask_tools: bool,
    pub advanced_options: bool,
    /// Label text of the upload field; `None` while the field is hidden.
    pub upload_label: Option<&'static str>,
}

/// Project a mode and sub-type onto the form's field visibility.
///
/// `gen_type` only matters for `text_to_image`. The result never depends
/// on the previously active mode.
pub fn compute_visibility(mode: GenerationMode, gen_type: GenerationType) -> FieldVisibility {
    match mode {
        GenerationMode::TextToImage => {
            let seeded = gen_type == GenerationType::InitImage;
            FieldVisibility {
                gen_type_selector: true,
                preset_selector: true,
                negative_prompt: true,
                upload: seeded,
                mask_tools: false,
                advanced_options: true,
                upload_label: seeded.then_some(LABEL_SOURCE_IMAGE),
            }
        }
        GenerationMode::FaceSwap => FieldVisibility {
            gen_type_selector: false,
            preset_selector: true,
            negative_prompt: false,
            upload: true,
            mask_tools: false,
            advanced_options: false,
            upload_label: Some(LABEL_FACE_SWAP_TARGET),
        },
        GenerationMode::Inpaint => FieldVisibility {
            gen_type_selector: false,
            preset_selector: true,
            negative_prompt: true,
            upload: true,
            mask_tools: true,
            advanced_options: true,
            upload_label: Some(LABEL_REPAIR_IMAGE),
        },
    }
}

/// The panel's current mode selection.
///
/// Switching the sub-type is remembered even while another mode is
/// active, so returning to `text_to_image` restores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeSelection {
    pub mode: GenerationMode,
    pub gen_type: GenerationType,
}

impl ModeSelection {
    pub fn set_mode(&mut self, mode: GenerationMode) -> FieldVisibility {
        self.mode = mode;
        self.visibility()
    }

    pub fn set_gen_type(&mut self, gen_type: GenerationType) -> FieldVisibility {
        self.gen_type = gen_type;
        self.visibility()
    }

    pub fn visibility(&self) -> FieldVisibility {
        compute_visibility(self.mode, self.gen_type)
    }
}
