//! Command-line arguments.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use atelier_core::mask::DisplayPoint;
use atelier_core::mode::{GenerationMode, GenerationType};
use atelier_core::preset::QualityPreset;
use atelier_core::request::GenerationForm;
use atelier_core::visibility::ModeSelection;

/// Headless image-generation panel.
#[derive(Parser, Debug)]
#[command(
    name = "atelier",
    about = "Submit an image-generation job and wait for the result",
    long_about = "Submit one job to the panel backend, follow its progress, and\n\
                  optionally download the result and repaint a masked region of it.\n\n\
                  Example:\n  \
                  atelier --prompt \"a lighthouse at dusk\" --preset fast -o out.png\n  \
                  atelier --mode face_swap --file face.jpg -o swapped.png\n  \
                  atelier -o out.png --stroke \"10,10 80,40\" --repair-output fixed.png"
)]
pub struct CliArgs {
    /// Generation mode: txt2img, face_swap, inpaint.
    #[arg(short, long, default_value = "txt2img")]
    pub mode: GenerationMode,

    /// text_to_image sub-type: prompt, init.
    #[arg(long, default_value = "prompt", value_name = "TYPE")]
    pub gen_type: GenerationType,

    #[arg(short, long, default_value = "")]
    pub prompt: String,

    #[arg(long, default_value = "", value_name = "PROMPT")]
    pub negative: String,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// Sampling steps. Overrides the preset.
    #[arg(long)]
    pub steps: Option<u32>,

    /// Guidance scale. Overrides the preset.
    #[arg(long)]
    pub guidance: Option<f32>,

    #[arg(long)]
    pub seed: Option<i64>,

    /// Quality preset: fast, fine.
    #[arg(long)]
    pub preset: Option<QualityPreset>,

    /// Image to upload (source, face-swap target, or image to repair).
    #[arg(short, long, value_name = "IMAGE")]
    pub file: Option<PathBuf>,

    /// Where to save the result image.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Mask stroke over the result, as display-space points "x,y x,y ...".
    /// Repeat for several strokes. Triggers a repair pass after generation.
    #[arg(long = "stroke", value_name = "POINTS")]
    pub strokes: Vec<Stroke>,

    /// On-screen size the stroke coordinates refer to. Defaults to the
    /// result's natural size.
    #[arg(long, value_name = "WxH")]
    pub display_size: Option<DisplaySize>,

    /// Prompt of the repair pass.
    #[arg(long, default_value = "", value_name = "PROMPT")]
    pub repair_prompt: String,

    /// Where to save the repaired image.
    #[arg(long, value_name = "FILE")]
    pub repair_output: Option<PathBuf>,

    /// Override `PANEL_BASE_URL`.
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Print which form fields the selected mode shows, then exit.
    #[arg(long)]
    pub show_fields: bool,
}

impl CliArgs {
    pub fn selection(&self) -> ModeSelection {
        ModeSelection {
            mode: self.mode,
            gen_type: self.gen_type,
        }
    }

    /// Form values: defaults, then the preset, then explicit flags.
    pub fn form(&self) -> GenerationForm {
        let mut form = GenerationForm {
            prompt: self.prompt.clone(),
            negative_prompt: self.negative.clone(),
            ..Default::default()
        };
        if let Some(preset) = self.preset {
            preset.apply(&mut form);
        }
        if let Some(width) = self.width {
            form.width = width;
        }
        if let Some(height) = self.height {
            form.height = height;
        }
        if let Some(steps) = self.steps {
            form.steps = steps;
        }
        if let Some(guidance) = self.guidance {
            form.guidance = guidance;
        }
        form.seed = self.seed;
        form
    }
}

/// One pointer drag: the first point is the press, the rest are moves.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke(pub Vec<DisplayPoint>);

impl FromStr for Stroke {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let points = s
            .split_whitespace()
            .map(|pair| {
                let (x, y) = pair
                    .split_once(',')
                    .ok_or_else(|| format!("expected x,y but got '{pair}'"))?;
                let x: f32 = x.trim().parse().map_err(|_| format!("bad x in '{pair}'"))?;
                let y: f32 = y.trim().parse().map_err(|_| format!("bad y in '{pair}'"))?;
                Ok(DisplayPoint::new(x, y))
            })
            .collect::<Result<Vec<_>, String>>()?;

        if points.len() < 2 {
            return Err("a stroke needs at least two points".to_string());
        }
        Ok(Self(points))
    }
}

/// Displayed size of the image, `WxH`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width: f32,
    pub height: f32,
}

impl FromStr for DisplaySize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WxH but got '{s}'"))?;
        let width: f32 = w.trim().parse().map_err(|_| format!("bad width '{w}'"))?;
        let height: f32 = h.trim().parse().map_err(|_| format!("bad height '{h}'"))?;
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !(positive(width) && positive(height)) {
            return Err(format!("display size must be positive and finite, got '{s}'"));
        }
        Ok(Self { width, height })
    }
}
