//! Fixed-grid avatar collage attached to the team announcement.
//!
//! Tiles are laid out left to right, top to bottom, on a grid of
//! `COLUMNS` columns. The output is an SVG document with each avatar
//! embedded as a base64 PNG data URI, so no image codec is needed.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub const TILE_SIZE: u32 = 128;
pub const COLUMNS: u32 = 3;
/// Gap between tiles and around the edge.
pub const GUTTER: u32 = 8;

pub const FILENAME: &str = "team.svg";
pub const CONTENT_TYPE: &str = "image/svg+xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl Placement {
    fn overlaps(&self, other: &Placement) -> bool {
        self.x < other.x + other.size
            && other.x < self.x + self.size
            && self.y < other.y + other.size
            && other.y < self.y + self.size
    }
}

/// Pixel offsets for `count` tiles.
pub fn layout(count: usize) -> Vec<Placement> {
    (0..count as u32)
        .map(|i| Placement {
            x: GUTTER + (i % COLUMNS) * (TILE_SIZE + GUTTER),
            y: GUTTER + (i / COLUMNS) * (TILE_SIZE + GUTTER),
            size: TILE_SIZE,
        })
        .collect()
}

/// Canvas width and height for `count` tiles.
pub fn canvas_size(count: usize) -> (u32, u32) {
    let count = count as u32;
    let columns = count.clamp(1, COLUMNS);
    let rows = count.div_ceil(COLUMNS).max(1);
    (
        GUTTER + columns * (TILE_SIZE + GUTTER),
        GUTTER + rows * (TILE_SIZE + GUTTER),
    )
}

/// Render PNG avatars, in roster order, into one SVG document.
pub fn render_svg(avatars: &[Vec<u8>]) -> String {
    let (width, height) = canvas_size(avatars.len());
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    svg.push_str(&format!(
        r##"<rect width="{width}" height="{height}" fill="#2b2d31"/>"##
    ));

    for (placement, png) in layout(avatars.len()).iter().zip(avatars) {
        svg.push_str(&format!(
            r#"<image x="{}" y="{}" width="{size}" height="{size}" href="data:image/png;base64,{}"/>"#,
            placement.x,
            placement.y,
            STANDARD.encode(png),
            size = placement.size,
        ));
    }

    svg.push_str("</svg>");
    svg
}
