//! The two spaces geometry is measured in.
//!
//! Canonical records and every pixel-based writer use [`Pixel`]; YOLO label
//! lines and visual-inspection vertices are ratios of the image size, tagged
//! [`Normalized`]. The markers are uninhabited and only ever appear as type
//! parameters.

/// Names a coordinate space in debug output.
pub trait Space {
    const UNIT: &'static str;
}

/// Absolute pixels, origin at the top-left corner, Y growing downwards.
pub enum Pixel {}

/// Fractions of image width and height.
pub enum Normalized {}

impl Space for Pixel {
    const UNIT: &'static str = "px";
}

impl Space for Normalized {
    const UNIT: &'static str = "ratio";
}
