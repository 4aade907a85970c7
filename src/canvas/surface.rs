//! The sketch surface: buffers, strokes, background loads, undo/redo.
//!
//! A surface owns three equally-sized buffers. `marks` holds user strokes
//! over transparency and is the only thing exported or snapshotted.
//! `backdrop` holds the background render (fitted image, or a placeholder
//! fill). `composite` is presentation state and always equals marks
//! source-over backdrop; draw and erase recomposite the touched region from
//! the other two buffers, so erasing reveals the backdrop and never any
//! previously erased stroke.

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::history::{MarksSnapshot, SnapshotHistory, DEFAULT_HISTORY_CAPACITY};
use super::raster::{sweep_segment, PixelBuffer, Rect};
use super::viewport::Viewport;
use super::{CanvasError, Color, DrawTool, DrawingMode, Point};

/// Hard cap on buffer dimensions.
const MAX_BUFFER_DIM: u32 = 16384;

/// Backdrop fill when no background image is present.
const PLACEHOLDER_FILL: Color = Color::rgb(0xf0, 0xf0, 0xf0);

/// Surface construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceConfig {
    /// Presentation area a background image is fitted into.
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Buffer size as a multiple of the fitted image, leaving margin to
    /// draw past the image edges. Values below 1.0 are treated as 1.0.
    pub margin_factor: f32,
    /// Pre-margin buffer size when no background image is loaded.
    pub default_width: u32,
    pub default_height: u32,
    /// Undo history depth.
    pub history_capacity: usize,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1280,
            viewport_height: 800,
            margin_factor: 1.5,
            default_width: 600,
            default_height: 400,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Ties an asynchronous background load to the surface state that requested
/// it. Installing with a superseded token is rejected, so only the most
/// recently requested background ever lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(u64);

/// Where the fitted background image sits inside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePlacement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Mode and anchor of the stroke currently being drawn. The mode is copied
/// at begin, so mid-stroke mode changes do not affect it.
#[derive(Debug, Clone, Copy)]
struct ActiveStroke {
    mode: DrawingMode,
    last: Point,
}

/// The drawing canvas core.
pub struct SketchSurface {
    config: SurfaceConfig,
    composite: PixelBuffer,
    marks: PixelBuffer,
    backdrop: PixelBuffer,
    background: Option<ImagePlacement>,
    viewport: Viewport,
    history: SnapshotHistory,
    active: Option<ActiveStroke>,
    load_seq: u64,
    load_error: Option<String>,
}

impl SketchSurface {
    pub fn new() -> Self {
        Self::with_config(SurfaceConfig::default())
    }

    pub fn with_config(config: SurfaceConfig) -> Self {
        let mut config = config;
        config.margin_factor = config.margin_factor.max(1.0);
        let mut surface = Self {
            config,
            composite: PixelBuffer::new(0, 0),
            marks: PixelBuffer::new(0, 0),
            backdrop: PixelBuffer::new(0, 0),
            background: None,
            viewport: Viewport::new(),
            history: SnapshotHistory::new(config.history_capacity),
            active: None,
            load_seq: 0,
            load_error: None,
        };
        surface.apply_placeholder(None);
        surface
    }

    // Background loading ----------------------------------------------------

    /// Mark the start of a background load. Supersedes every earlier token,
    /// so a slow response for an old target can no longer install.
    pub fn begin_background_load(&mut self) -> LoadToken {
        self.load_seq += 1;
        LoadToken(self.load_seq)
    }

    /// Install a decoded background image: fit it into the configured
    /// viewport (downscale only), center it in a margin-sized buffer, and
    /// reset marks and history.
    pub fn install_background(
        &mut self,
        token: LoadToken,
        image: &RgbaImage,
    ) -> Result<(), CanvasError> {
        self.ensure_current(token)?;

        let (image_width, image_height) = image.dimensions();
        if image_width == 0 || image_height == 0 {
            return Err(CanvasError::InvalidInput("background image is empty".into()));
        }
        let scale = fit_scale(
            image_width,
            image_height,
            self.config.viewport_width,
            self.config.viewport_height,
        );
        let fit_width = ((image_width as f32 * scale).round() as u32).max(1);
        let fit_height = ((image_height as f32 * scale).round() as u32).max(1);
        let (buffer_width, buffer_height) = self.buffer_size(fit_width, fit_height);
        if buffer_width > MAX_BUFFER_DIM || buffer_height > MAX_BUFFER_DIM {
            return Err(CanvasError::InvalidInput(format!(
                "buffer {buffer_width}x{buffer_height} exceeds {MAX_BUFFER_DIM}"
            )));
        }

        let resized;
        let fitted: &RgbaImage = if scale < 1.0 {
            resized = imageops::resize(image, fit_width, fit_height, FilterType::Lanczos3);
            &resized
        } else {
            image
        };
        let offset_x = ((buffer_width - fit_width) as f32 / 2.0).round() as u32;
        let offset_y = ((buffer_height - fit_height) as f32 / 2.0).round() as u32;

        let mut backdrop = PixelBuffer::new(buffer_width, buffer_height);
        backdrop.blit_image(fitted, offset_x, offset_y);
        self.backdrop = backdrop;
        self.marks = PixelBuffer::new(buffer_width, buffer_height);
        self.composite = self.backdrop.clone();
        self.background = Some(ImagePlacement {
            x: offset_x,
            y: offset_y,
            width: fit_width,
            height: fit_height,
        });
        self.finish_reload(None);
        info!(
            image_width,
            image_height, buffer_width, buffer_height, scale, "background installed"
        );
        Ok(())
    }

    /// Install the no-image placeholder (story without a generated image).
    pub fn install_blank(&mut self, token: LoadToken) -> Result<(), CanvasError> {
        self.ensure_current(token)?;
        self.apply_placeholder(None);
        Ok(())
    }

    /// Install the placeholder after a failed load, keeping the failure
    /// message readable via [`SketchSurface::load_error`].
    pub fn install_load_failure(
        &mut self,
        token: LoadToken,
        message: impl Into<String>,
    ) -> Result<(), CanvasError> {
        self.ensure_current(token)?;
        let message = message.into();
        warn!(%message, "background load failed, falling back to placeholder");
        self.apply_placeholder(Some(message));
        Ok(())
    }

    fn ensure_current(&self, token: LoadToken) -> Result<(), CanvasError> {
        if token.0 == self.load_seq {
            Ok(())
        } else {
            debug!(
                token = token.0,
                current = self.load_seq,
                "discarding stale background install"
            );
            Err(CanvasError::StaleLoad(token.0))
        }
    }

    fn apply_placeholder(&mut self, load_error: Option<String>) {
        let (width, height) =
            self.buffer_size(self.config.default_width, self.config.default_height);
        self.backdrop = PixelBuffer::filled(width, height, PLACEHOLDER_FILL);
        self.marks = PixelBuffer::new(width, height);
        self.composite = self.backdrop.clone();
        self.background = None;
        self.finish_reload(load_error);
    }

    /// Shared tail of every (re)initialization: drop any active stroke and
    /// rebase history on the now-empty marks buffer.
    fn finish_reload(&mut self, load_error: Option<String>) {
        self.active = None;
        self.load_error = load_error;
        self.history.reset();
        self.history.push(MarksSnapshot::capture(&self.marks));
    }

    fn buffer_size(&self, content_width: u32, content_height: u32) -> (u32, u32) {
        let factor = self.config.margin_factor;
        (
            (content_width as f32 * factor).round() as u32,
            (content_height as f32 * factor).round() as u32,
        )
    }

    // Strokes ---------------------------------------------------------------

    /// Start a stroke at `point`. Ignored when no tool is selected. The
    /// first paint happens on the first `extend_stroke` call, so a press
    /// without movement leaves the buffers unchanged.
    pub fn begin_stroke(&mut self, point: Point, mode: &DrawingMode) {
        if mode.tool == DrawTool::None {
            debug!("stroke begin ignored: no tool selected");
            return;
        }
        if self.active.is_some() {
            // Pointer state desync: finish the previous stroke first.
            self.end_stroke();
        }
        self.active = Some(ActiveStroke {
            mode: *mode,
            last: point,
        });
    }

    /// Continue the active stroke to `point`, stamping discs along the
    /// segment. No-op when no stroke is active.
    pub fn extend_stroke(&mut self, point: Point) {
        let (mode, last) = match &self.active {
            Some(stroke) => (stroke.mode, stroke.last),
            None => return,
        };
        let radius = (mode.thickness / 2.0).max(0.5);
        let dirty = match mode.tool {
            DrawTool::Draw => {
                let color = mode.color;
                sweep_segment(last, point, radius, |x, y| {
                    self.marks.stamp_disc(x, y, radius, color)
                })
            }
            DrawTool::Erase => {
                sweep_segment(last, point, radius, |x, y| self.marks.clear_disc(x, y, radius))
            }
            DrawTool::None => Rect::empty(),
        };
        self.recomposite_rect(dirty);
        if let Some(stroke) = self.active.as_mut() {
            stroke.last = point;
        }
    }

    /// Finish the active stroke and record a history snapshot. No-op when
    /// no stroke is active.
    pub fn end_stroke(&mut self) {
        if self.active.take().is_some() {
            self.history.push(MarksSnapshot::capture(&self.marks));
        }
    }

    pub fn is_stroke_active(&self) -> bool {
        self.active.is_some()
    }

    /// Recompute `composite` as marks over backdrop within `rect`.
    fn recomposite_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.composite.copy_rect_from(&self.backdrop, rect);
        self.composite.blend_rect_over(&self.marks, rect);
    }

    fn recomposite_full(&mut self) {
        let full = self.composite.bounds();
        self.recomposite_rect(full);
    }

    // History ---------------------------------------------------------------

    /// Step back one snapshot. Returns whether anything changed. Ignored
    /// while a stroke is active.
    pub fn undo(&mut self) -> bool {
        if self.active.is_some() {
            return false;
        }
        let restored = match self.history.undo() {
            Some(snapshot) => snapshot.restore_into(&mut self.marks),
            None => return false,
        };
        match restored {
            Ok(()) => {
                self.recomposite_full();
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "undo restore failed");
                false
            }
        }
    }

    /// Step forward one snapshot. Returns whether anything changed. Ignored
    /// while a stroke is active.
    pub fn redo(&mut self) -> bool {
        if self.active.is_some() {
            return false;
        }
        let restored = match self.history.redo() {
            Some(snapshot) => snapshot.restore_into(&mut self.marks),
            None => return false,
        };
        match restored {
            Ok(()) => {
                self.recomposite_full();
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "redo restore failed");
                false
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Wipe all marks and rebase history, keeping the background.
    pub fn clear_all_marks(&mut self) {
        self.active = None;
        self.marks.clear();
        self.recomposite_full();
        self.history.reset();
        self.history.push(MarksSnapshot::capture(&self.marks));
    }

    // Export ----------------------------------------------------------------

    /// Encode the marks buffer (strokes only, transparent elsewhere) as PNG.
    /// The background never appears in the output.
    pub fn export_marks_png(&self) -> Result<Vec<u8>, CanvasError> {
        let (width, height) = self.marks.dimensions();
        let image = RgbaImage::from_raw(width, height, self.marks.data().to_vec())
            .ok_or_else(|| CanvasError::InvalidInput("marks buffer length mismatch".into()))?;
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }

    /// Marks buffer as a `data:image/png;base64,` URL, the payload format
    /// the story backend expects for sketch commits.
    pub fn export_marks_data_url(&self) -> Result<String, CanvasError> {
        let png = self.export_marks_png()?;
        Ok(format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png)
        ))
    }

    // State -----------------------------------------------------------------

    /// Whether at least one completed stroke is in effect at the current
    /// history position.
    pub fn has_user_marks(&self) -> bool {
        self.history.cursor() > 0
    }

    pub fn has_background(&self) -> bool {
        self.background.is_some()
    }

    /// Failure message of the last background load, if it failed.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.composite.dimensions()
    }

    pub fn image_placement(&self) -> Option<ImagePlacement> {
        self.background
    }

    pub fn composite(&self) -> &PixelBuffer {
        &self.composite
    }

    pub fn marks(&self) -> &PixelBuffer {
        &self.marks
    }

    pub fn backdrop(&self) -> &PixelBuffer {
        &self.backdrop
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }
}

impl Default for SketchSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform scale that fits an image into the viewport. Never upscales.
fn fit_scale(
    image_width: u32,
    image_height: u32,
    viewport_width: u32,
    viewport_height: u32,
) -> f32 {
    let scale_x = viewport_width as f32 / image_width as f32;
    let scale_y = viewport_height as f32 / image_height as f32;
    1.0_f32.min(scale_x).min(scale_y)
}
