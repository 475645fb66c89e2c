//! Quality presets for the sampling parameters.

use std::str::FromStr;

use crate::error::CoreError;
use crate::request::GenerationForm;

pub const PRESET_FAST: &str = "fast";
pub const PRESET_FINE: &str = "fine";

/// All valid preset names.
pub const VALID_PRESETS: &[&str] = &[PRESET_FAST, PRESET_FINE];

/// A named steps/guidance pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPreset {
    /// Few steps, low guidance.
    Fast,
    /// Full sampling.
    Fine,
}

impl QualityPreset {
    pub fn steps(self) -> u32 {
        match self {
            Self::Fast => 4,
            Self::Fine => 20,
        }
    }

    pub fn guidance(self) -> f32 {
        match self {
            Self::Fast => 3.0,
            Self::Fine => 5.5,
        }
    }

    /// Overwrite the form's steps and guidance. Other fields are untouched.
    pub fn apply(self, form: &mut GenerationForm) {
        form.steps = self.steps();
        form.guidance = self.guidance();
    }
}

impl FromStr for QualityPreset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            PRESET_FAST => Ok(Self::Fast),
            PRESET_FINE => Ok(Self::Fine),
            other => Err(CoreError::Validation(format!(
                "Invalid preset '{other}'. Must be one of: {}",
                VALID_PRESETS.join(", ")
            ))),
        }
    }
}
