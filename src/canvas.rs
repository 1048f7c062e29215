// ============================================================================
// PIXEL SURFACE — flat RGBA raster, paint state, snapshots
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use std::ops::{Deref, DerefMut};

/// RGBA colour, one byte per channel (non-premultiplied).
pub type Color = Rgba<u8>;

/// Value read for every pixel outside the surface.
pub const TRANSPARENT: Color = Rgba([0, 0, 0, 0]);

/// Integer pixel-grid coordinate. May lie outside the surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// |dx| + |dy|, widened so extreme coordinates cannot overflow.
    pub fn manhattan_distance(self, other: Position) -> u64 {
        (other.x as i64 - self.x as i64).unsigned_abs()
            + (other.y as i64 - self.y as i64).unsigned_abs()
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

// ============================================================================
// COLOUR LITERALS
// ============================================================================

/// Error for malformed colour literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    Empty,
    InvalidHex(String),
    InvalidFunction(String),
}

impl std::fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorParseError::Empty => write!(f, "empty colour literal"),
            ColorParseError::InvalidHex(s) => write!(f, "invalid hex colour '{}'", s),
            ColorParseError::InvalidFunction(s) => write!(f, "invalid colour function '{}'", s),
        }
    }
}

impl std::error::Error for ColorParseError {}

/// Parse a CSS-style colour: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`,
/// `rgb(r, g, b)` or `rgba(r, g, b, a)` with `a` in 0–255.
pub fn parse_color(literal: &str) -> Result<Color, ColorParseError> {
    let s = literal.trim();
    if s.is_empty() {
        return Err(ColorParseError::Empty);
    }

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| ColorParseError::InvalidHex(s.to_string()));
    }

    let lower = s.to_ascii_lowercase();
    let (body, expected) = if let Some(rest) = lower.strip_prefix("rgba(") {
        (rest, 4)
    } else if let Some(rest) = lower.strip_prefix("rgb(") {
        (rest, 3)
    } else {
        return Err(ColorParseError::InvalidFunction(s.to_string()));
    };

    let body = body
        .strip_suffix(')')
        .ok_or_else(|| ColorParseError::InvalidFunction(s.to_string()))?;
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if parts.len() != expected {
        return Err(ColorParseError::InvalidFunction(s.to_string()));
    }

    let mut channels = [0u8, 0, 0, 255];
    for (slot, part) in channels.iter_mut().zip(&parts) {
        *slot = part
            .parse::<u8>()
            .map_err(|_| ColorParseError::InvalidFunction(s.to_string()))?;
    }
    Ok(Rgba(channels))
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

/// Format as `#rrggbbaa`.
pub fn color_to_hex(color: Color) -> String {
    format!(
        "#{:02x}{:02x}{:02x}{:02x}",
        color[0], color[1], color[2], color[3]
    )
}

// ============================================================================
// PAINT STATE
// ============================================================================

/// How painted pixels combine with what is already on the surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaintMode {
    /// Normal paint: opaque colours replace, translucent colours blend over.
    #[default]
    SourceOver,
    /// Eraser: destination alpha is scaled by `1 - src_alpha`.
    DestinationOut,
}

/// Active colour + compositing mode used by `Surface::paint_pixel`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaintState {
    pub color: Color,
    pub mode: PaintMode,
}

impl PaintState {
    pub fn new(color: Color, mode: PaintMode) -> Self {
        Self { color, mode }
    }
}

impl Default for PaintState {
    fn default() -> Self {
        Self {
            color: Rgba([0, 0, 0, 255]),
            mode: PaintMode::SourceOver,
        }
    }
}

/// Combine `src` onto `dst` under `mode`.
pub fn composite(dst: Color, src: Color, mode: PaintMode) -> Color {
    match mode {
        PaintMode::SourceOver => {
            // Fast paths: opaque replaces, transparent is a no-op
            if src[3] == 255 {
                return src;
            }
            if src[3] == 0 {
                return dst;
            }

            let sa = src[3] as f32 / 255.0;
            let da = dst[3] as f32 / 255.0;
            let out_a = sa + da * (1.0 - sa);
            if out_a <= 0.0 {
                return TRANSPARENT;
            }

            let channel = |i: usize| {
                let s = src[i] as f32;
                let d = dst[i] as f32;
                ((s * sa + d * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8
            };
            Rgba([
                channel(0),
                channel(1),
                channel(2),
                (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
            ])
        }
        PaintMode::DestinationOut => {
            let alpha = (dst[3] as u32 * (255 - src[3] as u32) + 127) / 255;
            if alpha == 0 {
                TRANSPARENT
            } else {
                Rgba([dst[0], dst[1], dst[2], alpha as u8])
            }
        }
    }
}

// ============================================================================
// SURFACE
// ============================================================================

/// Full deep copy of a surface's pixels. Opaque to callers.
#[derive(Clone)]
pub struct Snapshot {
    pixels: RgbaImage,
}

impl Snapshot {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// The editable raster: `width × height × 4` bytes, row-major,
/// `index(x, y) = y·width·4 + x·4`.
///
/// Out-of-range reads return transparent black, out-of-range writes are
/// dropped. Rasterizers rely on this to paint shapes that cross the edge.
#[derive(Clone)]
pub struct Surface {
    pixels: RgbaImage,
    paint: PaintState,
}

impl Surface {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_image(RgbaImage::new(width, height))
    }

    pub fn from_image(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            paint: PaintState::default(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Borrow the backing buffer.
    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width() && (pos.y as u32) < self.height()
    }

    /// Byte offset of `pos` in the raw buffer, `None` when off-surface.
    pub fn index(&self, pos: Position) -> Option<usize> {
        if !self.contains(pos) {
            return None;
        }
        let w = self.width() as usize;
        Some(pos.y as usize * w * 4 + pos.x as usize * 4)
    }

    // ---- point access -------------------------------------------------------

    pub fn get_pixel(&self, pos: Position) -> Color {
        match self.index(pos) {
            Some(i) => {
                let raw = self.pixels.as_raw();
                Rgba([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]])
            }
            None => TRANSPARENT,
        }
    }

    /// Raw write, ignoring the paint state.
    pub fn set_pixel(&mut self, pos: Position, color: Color) {
        if self.contains(pos) {
            self.pixels.put_pixel(pos.x as u32, pos.y as u32, color);
        }
    }

    // ---- paint state --------------------------------------------------------

    pub fn paint_state(&self) -> PaintState {
        self.paint
    }

    /// Switch to `state` until the returned scope is dropped, at which point
    /// the previous paint state is restored.
    pub fn configure(&mut self, state: PaintState) -> PaintScope<'_> {
        let saved = std::mem::replace(&mut self.paint, state);
        PaintScope {
            surface: self,
            saved,
        }
    }

    /// Composite the active paint colour onto one pixel.
    pub fn paint_pixel(&mut self, pos: Position) {
        if !self.contains(pos) {
            return;
        }
        let (x, y) = (pos.x as u32, pos.y as u32);
        let dst = *self.pixels.get_pixel(x, y);
        let out = composite(dst, self.paint.color, self.paint.mode);
        self.pixels.put_pixel(x, y, out);
    }

    /// Paint the inclusive span `x0..=x1` on row `y`, clipped to the surface.
    pub fn paint_span(&mut self, y: i32, x0: i32, x1: i32) {
        if y < 0 || y as u32 >= self.height() {
            return;
        }
        let (lo, hi) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let lo = lo.max(0);
        let hi = (hi as i64).min(self.width() as i64 - 1);
        if hi < lo as i64 {
            return;
        }
        for x in lo..=hi as i32 {
            self.paint_pixel(Position::new(x, y));
        }
    }

    // ---- bulk operations ----------------------------------------------------

    /// Deep-copy the current pixels.
    pub fn save(&self) -> Snapshot {
        Snapshot {
            pixels: self.pixels.clone(),
        }
    }

    /// Replace the pixels with a previously saved snapshot.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        if snapshot.pixels.dimensions() == self.pixels.dimensions() {
            self.pixels.copy_from_slice(snapshot.pixels.as_raw());
        } else {
            self.pixels = snapshot.pixels.clone();
        }
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        self.fill(TRANSPARENT);
    }

    /// Overwrite every pixel with `color` (no compositing).
    pub fn fill(&mut self, color: Color) {
        let px = color.0;
        self.pixels
            .par_chunks_exact_mut(4)
            .for_each(|chunk| chunk.copy_from_slice(&px));
    }

    /// Copy `src` onto the surface with its top-left at `offset`, replacing
    /// destination pixels (alpha included). Clipped to the surface.
    pub fn blit(&mut self, src: &RgbaImage, offset: Position) {
        let w = self.width() as i64;
        let h = self.height() as i64;

        for sy in 0..src.height() {
            let gy = offset.y as i64 + sy as i64;
            if gy < 0 || gy >= h {
                continue;
            }
            // Horizontal clip computed once per row
            let first = (-(offset.x as i64)).max(0);
            let last = (w - offset.x as i64).min(src.width() as i64);
            if last <= first {
                continue;
            }
            let src_row = sy as usize * src.width() as usize * 4;
            let src_from = src_row + first as usize * 4;
            let src_to = src_row + last as usize * 4;
            let dst_from = (gy as usize * w as usize + (offset.x as i64 + first) as usize) * 4;
            let len = src_to - src_from;

            let dst: &mut [u8] = &mut self.pixels;
            dst[dst_from..dst_from + len].copy_from_slice(&src.as_raw()[src_from..src_to]);
        }
    }

    /// Number of pixels that differ from `other` (dimensions must match,
    /// otherwise every pixel of the larger buffer counts as different).
    pub fn diff_count(&self, other: &Surface) -> usize {
        if self.pixels.dimensions() != other.pixels.dimensions() {
            return (self.width() as usize * self.height() as usize)
                .max(other.width() as usize * other.height() as usize);
        }
        self.pixels
            .as_raw()
            .par_chunks_exact(4)
            .zip(other.pixels.as_raw().par_chunks_exact(4))
            .filter(|(a, b)| a != b)
            .count()
    }

    /// Number of pixels with non-zero alpha.
    pub fn opaque_pixel_count(&self) -> usize {
        self.pixels
            .as_raw()
            .par_chunks_exact(4)
            .filter(|px| px[3] != 0)
            .count()
    }
}

/// Scoped paint configuration; derefs to the surface and restores the
/// previous paint state when dropped.
pub struct PaintScope<'a> {
    surface: &'a mut Surface,
    saved: PaintState,
}

impl Deref for PaintScope<'_> {
    type Target = Surface;

    fn deref(&self) -> &Surface {
        self.surface
    }
}

impl DerefMut for PaintScope<'_> {
    fn deref_mut(&mut self) -> &mut Surface {
        self.surface
    }
}

impl Drop for PaintScope<'_> {
    fn drop(&mut self) {
        self.surface.paint = self.saved;
    }
}
