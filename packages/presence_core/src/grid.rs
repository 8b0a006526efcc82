//! Canvas geometry for the toggle-box grid.

/// Edge length of one box, in pixels.
pub const BOX_SIZE: u32 = 50;
/// Space between adjacent boxes, in pixels.
pub const PADDING: u32 = 5;
/// Canvas width used when none is configured.
pub const DEFAULT_CANVAS_WIDTH: u32 = 1400;

/// Grid layout derived from the canvas width (16:7 aspect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasGrid {
    width: u32,
    height: u32,
    cols: u32,
    rows: u32,
}

impl CanvasGrid {
    pub fn new(width: u32) -> Self {
        let height = ((width as f64) * 7.0 / 16.0).round() as u32;
        let cell = BOX_SIZE + PADDING;
        Self {
            width,
            height,
            cols: width / cell,
            rows: height / cell,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Saturates for absurdly wide canvases instead of overflowing.
    pub fn total_boxes(&self) -> u32 {
        self.cols.saturating_mul(self.rows)
    }

    pub fn contains(&self, index: u32) -> bool {
        index < self.total_boxes()
    }

    pub fn center(&self) -> (i32, i32) {
        (to_coord(self.width / 2), to_coord(self.height / 2))
    }

    /// Clamp a pointer position onto the canvas.
    pub fn clamp_point(&self, x: i32, y: i32) -> (i32, i32) {
        (x.clamp(0, to_coord(self.width)), y.clamp(0, to_coord(self.height)))
    }
}

fn to_coord(pixels: u32) -> i32 {
    i32::try_from(pixels).unwrap_or(i32::MAX)
}

impl Default for CanvasGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_WIDTH)
    }
}
