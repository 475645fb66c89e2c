//! Generation modes and the `text_to_image` sub-type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Wire name of [`GenerationMode::TextToImage`].
pub const MODE_TXT2IMG: &str = "txt2img";
/// Wire name of [`GenerationMode::FaceSwap`].
pub const MODE_FACE_SWAP: &str = "face_swap";
/// Wire name of [`GenerationMode::Inpaint`].
pub const MODE_INPAINT: &str = "inpaint";

/// All valid mode wire names.
pub const VALID_MODES: &[&str] = &[MODE_TXT2IMG, MODE_FACE_SWAP, MODE_INPAINT];

/// What kind of job the panel submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GenerationMode {
    #[default]
    #[serde(rename = "txt2img")]
    TextToImage,
    #[serde(rename = "face_swap")]
    FaceSwap,
    #[serde(rename = "inpaint")]
    Inpaint,
}

impl GenerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextToImage => MODE_TXT2IMG,
            Self::FaceSwap => MODE_FACE_SWAP,
            Self::Inpaint => MODE_INPAINT,
        }
    }

    /// Whether a job in this mode needs an uploaded source image.
    ///
    /// `text_to_image` only needs one with the init-image sub-type.
    pub fn requires_source_image(self, gen_type: GenerationType) -> bool {
        match self {
            Self::TextToImage => gen_type == GenerationType::InitImage,
            Self::FaceSwap | Self::Inpaint => true,
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            MODE_TXT2IMG | "text_to_image" => Ok(Self::TextToImage),
            MODE_FACE_SWAP => Ok(Self::FaceSwap),
            MODE_INPAINT => Ok(Self::Inpaint),
            other => Err(CoreError::Validation(format!(
                "Invalid mode '{other}'. Must be one of: {}",
                VALID_MODES.join(", ")
            ))),
        }
    }
}

/// Sub-type of `text_to_image`: pure prompt, or seeded by an init image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationType {
    #[default]
    Prompt,
    #[serde(rename = "init")]
    InitImage,
}

impl FromStr for GenerationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prompt" => Ok(Self::Prompt),
            "init" | "init-image" => Ok(Self::InitImage),
            other => Err(CoreError::Validation(format!(
                "Invalid generation type '{other}'. Must be one of: prompt, init"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_serialize_to_wire_names() {
        assert_eq!(
            serde_json::to_string(&GenerationMode::TextToImage).unwrap(),
            r#""txt2img""#
        );
        assert_eq!(
            serde_json::to_string(&GenerationMode::FaceSwap).unwrap(),
            r#""face_swap""#
        );
        assert_eq!(
            serde_json::to_string(&GenerationMode::Inpaint).unwrap(),
            r#""inpaint""#
        );
    }

    #[test]
    fn mode_parses_wire_and_long_names() {
        assert_eq!("txt2img".parse::<GenerationMode>().unwrap(), GenerationMode::TextToImage);
        assert_eq!(
            "text_to_image".parse::<GenerationMode>().unwrap(),
            GenerationMode::TextToImage
        );
        assert!("video".parse::<GenerationMode>().is_err());
    }

    #[test]
    fn source_image_requirement_follows_mode() {
        use GenerationMode::*;
        use GenerationType::*;
        assert!(!TextToImage.requires_source_image(Prompt));
        assert!(TextToImage.requires_source_image(InitImage));
        assert!(FaceSwap.requires_source_image(Prompt));
        assert!(Inpaint.requires_source_image(Prompt));
    }
}
