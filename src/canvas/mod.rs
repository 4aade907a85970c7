//! Sketch canvas engine.
//!
//! The canvas is split into three straight-alpha RGBA buffers: the `marks`
//! buffer holds user strokes over transparency, the `backdrop` holds the
//! background-only render, and the `composite` is what a host presents.
//! `SketchSurface` keeps the composite equal to marks layered over the
//! backdrop after every operation.

mod history;
mod raster;
mod surface;
mod viewport;

pub use history::{MarksSnapshot, SnapshotHistory, DEFAULT_HISTORY_CAPACITY};
pub use raster::{sweep_segment, PixelBuffer, Rect};
pub use surface::{ImagePlacement, LoadToken, SketchSurface, SurfaceConfig};
pub use viewport::{Viewport, ZOOM_MAX, ZOOM_MIN, ZOOM_STEP};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pen width used when no explicit thickness is set for drawing.
pub const DEFAULT_DRAW_THICKNESS: f32 = 5.0;
/// Eraser width used when no explicit thickness is set for erasing.
pub const DEFAULT_ERASE_THICKNESS: f32 = 15.0;

/// Canvas errors.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("Stale load token {0}: a newer background load superseded it")]
    StaleLoad(u64),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

/// A point in buffer coordinates (native canvas pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse a `#rrggbb` or `#rrggbbaa` hex string (leading `#` optional).
    pub fn from_hex(value: &str) -> Result<Self, CanvasError> {
        let digits = value.strip_prefix('#').unwrap_or(value);
        let bytes = hex::decode(digits)
            .map_err(|e| CanvasError::InvalidColor(format!("{value}: {e}")))?;
        match bytes.as_slice() {
            [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
            [r, g, b, a] => Ok(Self {
                r: *r,
                g: *g,
                b: *b,
                a: *a,
            }),
            _ => Err(CanvasError::InvalidColor(format!(
                "expected #rrggbb or #rrggbbaa, got {value}"
            ))),
        }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Which tool the next stroke uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DrawTool {
    /// No tool selected. Stroke begin requests are ignored.
    #[default]
    None,
    Draw,
    Erase,
}

/// Tool, color and width for the next stroke. Captured once when a stroke
/// begins; changing the mode mid-stroke does not affect the active stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingMode {
    pub tool: DrawTool,
    pub color: Color,
    pub thickness: f32,
}

impl DrawingMode {
    pub fn none() -> Self {
        Self {
            tool: DrawTool::None,
            color: Color::TRANSPARENT,
            thickness: 0.0,
        }
    }

    pub fn draw(color: Color) -> Self {
        Self {
            tool: DrawTool::Draw,
            color,
            thickness: DEFAULT_DRAW_THICKNESS,
        }
    }

    pub fn erase() -> Self {
        Self {
            tool: DrawTool::Erase,
            color: Color::TRANSPARENT,
            thickness: DEFAULT_ERASE_THICKNESS,
        }
    }

    pub fn with_thickness(mut self, thickness: f32) -> Self {
        self.thickness = thickness;
        self
    }
}

impl Default for DrawingMode {
    fn default() -> Self {
        Self::none()
    }
}
