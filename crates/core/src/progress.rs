//! Progress indicator state.

use serde::Serialize;

/// Label shown right after a submission starts.
pub const LABEL_PREPARING: &str = "preparing...";
/// Label forced when the backend starts executing a job.
pub const LABEL_STARTING: &str = "starting...";
/// Label used when a progress event carries no description.
pub const LABEL_GENERATING: &str = "generating...";
/// Label pinned at terminal success.
pub const LABEL_COMPLETE: &str = "complete";

/// Clamp a reported fraction into `[0, 1]`. NaN maps to 0.
pub fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// What the progress indicator currently shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressState {
    pub visible: bool,
    /// Always within `[0, 1]`.
    pub fraction: f64,
    pub description: String,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::hidden()
    }
}

impl ProgressState {
    /// Hidden indicator with an empty fill, ready for reuse.
    pub fn hidden() -> Self {
        Self {
            visible: false,
            fraction: 0.0,
            description: String::new(),
        }
    }

    /// Visible, zeroed indicator at submission start.
    pub fn preparing() -> Self {
        Self {
            visible: true,
            fraction: 0.0,
            description: LABEL_PREPARING.to_string(),
        }
    }

    /// Set the fraction (clamped) and description. An empty description
    /// falls back to [`LABEL_GENERATING`].
    pub fn report(&mut self, fraction: f64, description: &str) {
        self.fraction = clamp_fraction(fraction);
        self.description = if description.is_empty() {
            LABEL_GENERATING.to_string()
        } else {
            description.to_string()
        };
    }

    /// Rendered fill width in percent.
    pub fn fill_percent(&self) -> f64 {
        clamp_fraction(self.fraction) * 100.0
    }
}
