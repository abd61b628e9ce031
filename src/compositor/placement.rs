//! Pure placement geometry for every watermark mode.
//!
//! All functions work in surface pixel coordinates (origin top-left, y down)
//! and never touch pixel data, so layouts can be checked without rendering.

use super::WatermarkMode;

/// Watermark width as a fraction of the surface width, per mode.
pub const TILED_WIDTH_RATIO: f64 = 0.15;
pub const CENTERED_WIDTH_RATIO: f64 = 0.25;
pub const CORNER_WIDTH_RATIO: f64 = 0.45;

/// Gap between the corner watermark and the right border, as a fraction of
/// the surface width.
pub const CORNER_RIGHT_INSET_RATIO: f64 = 0.01;

/// Tile rotation in degrees; negative is counter-clockwise on screen.
pub const TILE_ROTATION_DEGREES: f32 = -30.0;

/// Horizontal tile pitch in multiples of the tile width.
pub const TILE_SPACING_X: f64 = 2.0;
/// Vertical tile pitch in multiples of the tile height.
pub const TILE_SPACING_Y: f64 = 1.5;

/// Where one watermark instance lands on the surface, before rotation.
///
/// `x`/`y` is the top-left corner of the unrotated, scaled watermark and may
/// be negative or past the surface edges; blending clips it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerPlacement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    pub rotation_degrees: f32,
}

impl LayerPlacement {
    pub fn right(&self) -> i64 {
        self.x + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height as i64
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Scale a watermark to `ratio` of the surface width, keeping its aspect ratio.
///
/// Returns `None` for a degenerate (zero-sized) watermark.
pub fn scaled_size(
    surface_width: u32,
    mark_width: u32,
    mark_height: u32,
    ratio: f64,
) -> Option<(u32, u32)> {
    if mark_width == 0 || mark_height == 0 {
        return None;
    }

    let width = (surface_width as f64 * ratio).round().max(1.0);
    let height = (width * mark_height as f64 / mark_width as f64)
        .round()
        .max(1.0);

    Some((width as u32, height as u32))
}

/// Plan every watermark instance for `mode` on a `surface_width` x
/// `surface_height` surface, given the watermark's native size.
pub fn plan_layers(
    mode: WatermarkMode,
    surface_width: u32,
    surface_height: u32,
    mark_width: u32,
    mark_height: u32,
) -> Vec<LayerPlacement> {
    match mode {
        WatermarkMode::Tiled => {
            tiled_layers(surface_width, surface_height, mark_width, mark_height)
        }
        WatermarkMode::Centered => {
            centered_layer(surface_width, surface_height, mark_width, mark_height)
                .into_iter()
                .collect()
        }
        WatermarkMode::CornerBottomRight => {
            corner_layer(surface_width, surface_height, mark_width, mark_height)
                .into_iter()
                .collect()
        }
    }
}

fn centered_layer(
    surface_width: u32,
    surface_height: u32,
    mark_width: u32,
    mark_height: u32,
) -> Option<LayerPlacement> {
    let (width, height) =
        scaled_size(surface_width, mark_width, mark_height, CENTERED_WIDTH_RATIO)?;

    Some(LayerPlacement {
        x: (surface_width as i64 - width as i64) / 2,
        y: (surface_height as i64 - height as i64) / 2,
        width,
        height,
        rotation_degrees: 0.0,
    })
}

fn corner_layer(
    surface_width: u32,
    surface_height: u32,
    mark_width: u32,
    mark_height: u32,
) -> Option<LayerPlacement> {
    let (width, height) = scaled_size(surface_width, mark_width, mark_height, CORNER_WIDTH_RATIO)?;
    let inset = (surface_width as f64 * CORNER_RIGHT_INSET_RATIO).round() as i64;

    Some(LayerPlacement {
        x: surface_width as i64 - width as i64 - inset,
        // Bottom edge flush with the surface
        y: surface_height as i64 - height as i64,
        width,
        height,
        rotation_degrees: 0.0,
    })
}

/// Brick-pattern grid covering the surface plus one pitch beyond every edge,
/// so rotated tiles never leave bare corners.
fn tiled_layers(
    surface_width: u32,
    surface_height: u32,
    mark_width: u32,
    mark_height: u32,
) -> Vec<LayerPlacement> {
    let Some((width, height)) =
        scaled_size(surface_width, mark_width, mark_height, TILED_WIDTH_RATIO)
    else {
        return Vec::new();
    };

    let step_x = width as f64 * TILE_SPACING_X;
    let step_y = height as f64 * TILE_SPACING_Y;
    let limit_x = surface_width as f64 + step_x;
    let limit_y = surface_height as f64 + step_y;

    let mut layers = Vec::new();
    let mut row = 0usize;
    let mut y = -step_y;

    while y < limit_y {
        let row_offset = if row % 2 == 1 { step_x / 2.0 } else { 0.0 };
        let mut x = -step_x + row_offset;

        while x < limit_x {
            layers.push(LayerPlacement {
                x: x.round() as i64,
                y: y.round() as i64,
                width,
                height,
                rotation_degrees: TILE_ROTATION_DEGREES,
            });
            x += step_x;
        }

        y += step_y;
        row += 1;
    }

    layers
}
