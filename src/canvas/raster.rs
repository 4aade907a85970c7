//! Raster primitives: RGBA pixel buffer, dirty rects, disc stamping.
//!
//! Strokes are rasterized by stamping hard-edged discs along each segment
//! at sub-radius spacing. The overlap produces round caps and joins without
//! a path rasterizer. Every mutation reports the touched region as a `Rect`
//! so callers can recomposite only what changed.

use super::{Color, Point};

/// Stamp spacing along a segment, as a fraction of the disc radius.
const SWEEP_SPACING: f32 = 0.25;

/// Axis-aligned dirty region. `right`/`bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn empty() -> Self {
        Self {
            left: i32::MAX,
            top: i32::MAX,
            right: i32::MIN,
            bottom: i32::MIN,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Grow to include a disc of `radius` centered at (`x`, `y`).
    pub fn expand(&mut self, x: i32, y: i32, radius: i32) {
        self.left = self.left.min(x - radius);
        self.top = self.top.min(y - radius);
        self.right = self.right.max(x + radius + 1);
        self.bottom = self.bottom.max(y + radius + 1);
    }

    pub fn union(&mut self, other: &Rect) {
        if other.is_empty() {
            return;
        }
        self.left = self.left.min(other.left);
        self.top = self.top.min(other.top);
        self.right = self.right.max(other.right);
        self.bottom = self.bottom.max(other.bottom);
    }

    pub fn clamp_to(&mut self, width: u32, height: u32) {
        self.left = self.left.max(0);
        self.top = self.top.max(0);
        self.right = self.right.min(width as i32);
        self.bottom = self.bottom.min(height as i32);
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::empty()
    }
}

/// A straight-alpha RGBA8 buffer, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    /// Buffer filled with a single color.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let mut buffer = Self::new(width, height);
        buffer.fill(color);
        buffer
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn fill(&mut self, color: Color) {
        let rgba = color.to_rgba();
        for pixel in self.data.chunks_exact_mut(4) {
            pixel.copy_from_slice(&rgba);
        }
    }

    /// Pixel at (`x`, `y`), transparent black when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0, 0];
        }
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        self.data[idx..idx + 4].copy_from_slice(&rgba);
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.data.iter().skip(3).step_by(4).all(|&a| a == 0)
    }

    /// Copy decoded image pixels at the given offset, rows clipped to the
    /// buffer. No blending: destination pixels are replaced.
    pub fn blit_image(&mut self, image: &image::RgbaImage, offset_x: u32, offset_y: u32) {
        if offset_x >= self.width || offset_y >= self.height {
            return;
        }
        let copy_width = image.width().min(self.width - offset_x) as usize;
        let copy_height = image.height().min(self.height - offset_y) as usize;
        let src = image.as_raw();
        let src_stride = image.width() as usize * 4;
        let dst_stride = self.width as usize * 4;

        for row in 0..copy_height {
            let src_start = row * src_stride;
            let dst_start = (offset_y as usize + row) * dst_stride + offset_x as usize * 4;
            self.data[dst_start..dst_start + copy_width * 4]
                .copy_from_slice(&src[src_start..src_start + copy_width * 4]);
        }
    }

    /// Stamp a hard-edged disc, source-over. Returns the touched region,
    /// clamped to the buffer.
    pub fn stamp_disc(&mut self, cx: f32, cy: f32, radius: f32, color: Color) -> Rect {
        self.disc_op(cx, cy, radius, |dst| blend_over(color.to_rgba(), dst))
    }

    /// Clear a hard-edged disc to full transparency. Returns the touched
    /// region, clamped to the buffer.
    pub fn clear_disc(&mut self, cx: f32, cy: f32, radius: f32) -> Rect {
        self.disc_op(cx, cy, radius, |_| [0, 0, 0, 0])
    }

    fn disc_op(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        op: impl Fn([u8; 4]) -> [u8; 4],
    ) -> Rect {
        let radius = radius.max(0.5);
        let mut rect = Rect::empty();
        rect.expand(cx.round() as i32, cy.round() as i32, radius.ceil() as i32);
        rect.clamp_to(self.width, self.height);
        if rect.is_empty() {
            return rect;
        }

        let radius_sq = radius * radius;
        for y in rect.top..rect.bottom {
            let dy = y as f32 + 0.5 - cy;
            for x in rect.left..rect.right {
                let dx = x as f32 + 0.5 - cx;
                if dx * dx + dy * dy > radius_sq {
                    continue;
                }
                let idx = ((y as u32 * self.width + x as u32) * 4) as usize;
                let dst = [
                    self.data[idx],
                    self.data[idx + 1],
                    self.data[idx + 2],
                    self.data[idx + 3],
                ];
                self.data[idx..idx + 4].copy_from_slice(&op(dst));
            }
        }
        rect
    }

    /// Replace the pixels of `rect` with the same region of `src`.
    /// Both buffers must share dimensions.
    pub fn copy_rect_from(&mut self, src: &PixelBuffer, mut rect: Rect) {
        debug_assert_eq!(self.dimensions(), src.dimensions());
        rect.clamp_to(self.width, self.height);
        if rect.is_empty() {
            return;
        }
        let stride = self.width as usize * 4;
        let row_bytes = rect.width() as usize * 4;
        for y in rect.top..rect.bottom {
            let start = y as usize * stride + rect.left as usize * 4;
            self.data[start..start + row_bytes]
                .copy_from_slice(&src.data[start..start + row_bytes]);
        }
    }

    /// Source-over composite the pixels of `rect` from `top` onto this
    /// buffer. Both buffers must share dimensions.
    pub fn blend_rect_over(&mut self, top: &PixelBuffer, mut rect: Rect) {
        debug_assert_eq!(self.dimensions(), top.dimensions());
        rect.clamp_to(self.width, self.height);
        if rect.is_empty() {
            return;
        }
        let stride = self.width as usize * 4;
        for y in rect.top..rect.bottom {
            let row = y as usize * stride;
            for x in rect.left..rect.right {
                let idx = row + x as usize * 4;
                let src = [
                    top.data[idx],
                    top.data[idx + 1],
                    top.data[idx + 2],
                    top.data[idx + 3],
                ];
                if src[3] == 0 {
                    continue;
                }
                let dst = [
                    self.data[idx],
                    self.data[idx + 1],
                    self.data[idx + 2],
                    self.data[idx + 3],
                ];
                self.data[idx..idx + 4].copy_from_slice(&blend_over(src, dst));
            }
        }
    }
}

/// Source-over blend of straight-alpha RGBA pixels.
fn blend_over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    if src[3] == 255 || dst[3] == 0 {
        return src;
    }
    if src[3] == 0 {
        return dst;
    }
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}

/// Run `stamp` at sub-radius spacing along the segment `from`..`to`,
/// including both endpoints, and union the touched regions. A zero-length
/// segment stamps once.
pub fn sweep_segment(
    from: Point,
    to: Point,
    radius: f32,
    mut stamp: impl FnMut(f32, f32) -> Rect,
) -> Rect {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let distance = (dx * dx + dy * dy).sqrt();

    let mut dirty = Rect::empty();
    if distance < f32::EPSILON {
        dirty.union(&stamp(from.x, from.y));
        return dirty;
    }

    let spacing = (radius * SWEEP_SPACING).max(0.5);
    let steps = (distance / spacing).ceil().max(1.0) as u32;
    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        dirty.union(&stamp(from.x + dx * t, from.y + dy * t));
    }
    dirty
}
