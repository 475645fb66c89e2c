//! Freehand mask editor.
//!
//! The editor owns a single RGBA bitmap that overlays the displayed
//! result image. The bitmap is always sized to the image's *natural*
//! resolution while pointer input arrives in *display* coordinates, so
//! every pointer position is scaled by `natural / displayed` before it
//! is drawn. Exported masks therefore align pixel-for-pixel with the
//! source image regardless of how large it was shown on screen.
//!
//! Lifecycle: `inactive -> armed -> drawing <-> armed -> (export | cancel)`.
//! [`MaskEditor::arm`] always starts a clean session.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Stroke constants
// ---------------------------------------------------------------------------

/// Stroke colour: red at 0.8 alpha.
pub const STROKE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 204]);

/// Minimum stroke width in backing pixels.
pub const MIN_STROKE_WIDTH: f32 = 8.0;

/// Stroke width grows by one pixel per this many pixels of image width.
const STROKE_WIDTH_DIVISOR: f32 = 200.0;

/// Stroke width for a bitmap of the given natural width.
pub fn stroke_width_for(natural_width: u32) -> f32 {
    (natural_width as f32 / STROKE_WIDTH_DIVISOR)
        .round()
        .max(MIN_STROKE_WIDTH)
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Natural and on-screen size of the image the mask is drawn over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageGeometry {
    pub natural_width: u32,
    pub natural_height: u32,
    pub display_width: f32,
    pub display_height: f32,
}

impl ImageGeometry {
    /// Geometry of an image shown at its natural size.
    pub fn unscaled(width: u32, height: u32) -> Self {
        Self {
            natural_width: width,
            natural_height: height,
            display_width: width as f32,
            display_height: height as f32,
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.natural_width == 0 || self.natural_height == 0 {
            return Err(CoreError::Validation(format!(
                "Mask source image has no pixels ({}x{})",
                self.natural_width, self.natural_height
            )));
        }
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !(positive(self.display_width) && positive(self.display_height)) {
            return Err(CoreError::Validation(format!(
                "Mask display size must be positive and finite, got {}x{}",
                self.display_width, self.display_height
            )));
        }
        Ok(())
    }
}

/// Pointer position relative to the top-left corner of the displayed canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayPoint {
    pub x: f32,
    pub y: f32,
}

impl DisplayPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Position in backing-bitmap pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasPoint {
    pub x: f32,
    pub y: f32,
}

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

/// Observable state of the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskPhase {
    /// Hidden; ignores pointer input.
    Inactive,
    /// Visible and waiting for a stroke.
    Armed,
    /// A stroke is in progress.
    Drawing,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Inactive,
    Armed,
    Drawing { last: CanvasPoint },
}

/// Canvas overlay for drawing an inpainting mask.
#[derive(Debug)]
pub struct MaskEditor {
    state: State,
    geometry: Option<ImageGeometry>,
    canvas: RgbaImage,
    has_strokes: bool,
    strokes: Vec<Vec<CanvasPoint>>,
    stroke_width: f32,
    session: u64,
}

impl Default for MaskEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskEditor {
    pub fn new() -> Self {
        Self {
            state: State::Inactive,
            geometry: None,
            canvas: RgbaImage::new(0, 0),
            has_strokes: false,
            strokes: Vec::new(),
            stroke_width: MIN_STROKE_WIDTH,
            session: 0,
        }
    }

    /// Bind the canvas to an image and start a clean drawing session.
    ///
    /// The backing bitmap takes the image's natural resolution; previous
    /// pixels, strokes and the "has strokes" flag are discarded. Returns
    /// the new session number.
    pub fn arm(&mut self, geometry: ImageGeometry) -> Result<u64, CoreError> {
        geometry.validate()?;

        self.canvas = RgbaImage::new(geometry.natural_width, geometry.natural_height);
        self.stroke_width = stroke_width_for(geometry.natural_width);
        self.geometry = Some(geometry);
        self.has_strokes = false;
        self.strokes.clear();
        self.state = State::Armed;
        self.session += 1;
        Ok(self.session)
    }

    /// Hide the canvas and drop everything drawn in this session.
    pub fn cancel(&mut self) {
        self.state = State::Inactive;
        self.has_strokes = false;
        self.strokes.clear();
        self.canvas = RgbaImage::new(0, 0);
    }

    pub fn phase(&self) -> MaskPhase {
        match self.state {
            State::Inactive => MaskPhase::Inactive,
            State::Armed => MaskPhase::Armed,
            State::Drawing { .. } => MaskPhase::Drawing,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, State::Inactive)
    }

    pub fn has_strokes(&self) -> bool {
        self.has_strokes
    }

    /// Current session number; bumped by every [`arm`](Self::arm).
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn stroke_width(&self) -> f32 {
        self.stroke_width
    }

    /// Backing bitmap. Empty while inactive.
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Completed and in-progress stroke paths in canvas coordinates.
    pub fn strokes(&self) -> &[Vec<CanvasPoint>] {
        &self.strokes
    }

    /// Map a display-space pointer position to backing-bitmap pixels.
    pub fn to_canvas(&self, point: DisplayPoint) -> Option<CanvasPoint> {
        let g = self.geometry.as_ref()?;
        let p = CanvasPoint {
            x: point.x * (g.natural_width as f32 / g.display_width),
            y: point.y * (g.natural_height as f32 / g.display_height),
        };
        (p.x.is_finite() && p.y.is_finite()).then_some(p)
    }

    /// Begin a stroke path. Ignored while inactive.
    pub fn pointer_down(&mut self, point: DisplayPoint) -> Option<CanvasPoint> {
        if !self.is_active() {
            return None;
        }
        let p = self.to_canvas(point)?;
        self.strokes.push(vec![p]);
        self.state = State::Drawing { last: p };
        Some(p)
    }

    /// Extend the active stroke and mark the mask as drawn. Ignored
    /// unless a stroke is in progress.
    pub fn pointer_move(&mut self, point: DisplayPoint) -> Option<CanvasPoint> {
        let State::Drawing { last } = self.state else {
            return None;
        };
        let p = self.to_canvas(point)?;
        self.draw_segment(last, p);
        if let Some(stroke) = self.strokes.last_mut() {
            stroke.push(p);
        }
        self.has_strokes = true;
        self.state = State::Drawing { last: p };
        Some(p)
    }

    /// End the active stroke. Drawing never resumes on its own.
    pub fn pointer_up(&mut self) {
        if let State::Drawing { .. } = self.state {
            self.state = State::Armed;
        }
    }

    /// Pointer left the canvas; same as [`pointer_up`](Self::pointer_up).
    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    /// Copy of the drawn bitmap, or `None` when there is nothing to export.
    pub fn snapshot(&self) -> Option<MaskSnapshot> {
        if !self.is_active() || !self.has_strokes {
            return None;
        }
        Some(MaskSnapshot {
            image: self.canvas.clone(),
        })
    }

    /// PNG-encode the drawn mask.
    ///
    /// `Ok(None)` means "no mask supplied": the editor is inactive or no
    /// stroke was drawn.
    pub fn export(&self) -> Result<Option<Vec<u8>>, CoreError> {
        self.snapshot().map(|s| s.encode_png()).transpose()
    }

    // ---- private helpers ----

    /// Round-capped line from `from` to `to`, stamped one pixel apart.
    ///
    /// Only the part that can touch the canvas is stamped.
    fn draw_segment(&mut self, from: CanvasPoint, to: CanvasPoint) {
        let radius = self.stroke_width / 2.0;
        let (w, h) = self.canvas.dimensions();
        let Some((from, to)) = clip_segment(from, to, w as f32, h as f32, radius) else {
            return;
        };

        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let distance = (dx * dx + dy * dy).sqrt();

        if distance < 0.1 {
            self.stamp(to.x, to.y, radius);
            return;
        }

        let steps = distance.ceil() as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.stamp(from.x + dx * t, from.y + dy * t, radius);
        }
    }

    fn stamp(&mut self, cx: f32, cy: f32, radius: f32) {
        let (w, h) = self.canvas.dimensions();
        let x0 = (cx - radius).floor().max(0.0) as u32;
        let y0 = (cy - radius).floor().max(0.0) as u32;
        let x1 = ((cx + radius).ceil().max(0.0) as u32).min(w);
        let y1 = ((cy + radius).ceil().max(0.0) as u32).min(h);
        let r2 = radius * radius;

        for y in y0..y1 {
            for x in x0..x1 {
                let px = x as f32 + 0.5 - cx;
                let py = y as f32 + 0.5 - cy;
                if px * px + py * py <= r2 {
                    self.canvas.put_pixel(x, y, STROKE_COLOR);
                }
            }
        }
    }
}

/// Clip a segment to `[-margin, width + margin] x [-margin, height + margin]`
/// (Liang-Barsky). `None` when it lies entirely outside.
fn clip_segment(
    from: CanvasPoint,
    to: CanvasPoint,
    width: f32,
    height: f32,
    margin: f32,
) -> Option<(CanvasPoint, CanvasPoint)> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let (mut t0, mut t1) = (0.0_f32, 1.0_f32);

    let edges = [
        (-dx, from.x + margin),
        (dx, width + margin - from.x),
        (-dy, from.y + margin),
        (dy, height + margin - from.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f32| CanvasPoint {
        x: from.x + dx * t,
        y: from.y + dy * t,
    };
    Some((at(t0), at(t1)))
}

/// Detached copy of a drawn mask, safe to encode off the caller's task.
#[derive(Debug, Clone)]
pub struct MaskSnapshot {
    image: RgbaImage,
}

impl MaskSnapshot {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| CoreError::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }
}
