//! Vertices of boxes, rings and keypoints.
//!
//! Canonical records keep geometry as flat `[x0, y0, x1, y1, ...]` lists.
//! [`Coord`] is the paired view of one entry of such a list, tagged with the
//! space it was measured in so pixel and ratio values never meet by accident.

use std::marker::PhantomData;

use super::{Normalized, Pixel, Space};

/// One vertex, tagged with [`Pixel`] or [`Normalized`].
pub struct Coord<TSpace> {
    pub x: f64,
    pub y: f64,
    _space: PhantomData<TSpace>,
}

// Derives would require `TSpace: Copy`, which the uninhabited markers
// never implement.
impl<TSpace> Clone for Coord<TSpace> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<TSpace> Copy for Coord<TSpace> {}

impl<TSpace> PartialEq for Coord<TSpace> {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl<TSpace> Coord<TSpace> {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            _space: PhantomData,
        }
    }

    /// Pairs up a flat coordinate list. A trailing odd value is dropped.
    pub fn pairs(flat: &[f64]) -> impl Iterator<Item = Self> + '_ {
        flat.chunks_exact(2).map(|p| Self::new(p[0], p[1]))
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Turns the vertex around `center`. Positive `degrees` go clockwise
    /// on screen, matching the rotation attribute of rectangle labels.
    pub fn rotate_about(&self, center: Self, degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let (dx, dy) = (self.x - center.x, self.y - center.y);
        Self::new(
            center.x + dx * cos - dy * sin,
            center.y + dx * sin + dy * cos,
        )
    }
}

impl Coord<Pixel> {
    /// Ratio of the image size, as YOLO and visual-inspection vertices use.
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> Coord<Normalized> {
        Coord::new(self.x / image_width, self.y / image_height)
    }
}

impl Coord<Normalized> {
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> Coord<Pixel> {
        Coord::new(self.x * image_width, self.y * image_height)
    }
}

impl<TSpace: Space> std::fmt::Debug for Coord<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}) {}", self.x, self.y, TSpace::UNIT)
    }
}

impl<TSpace> Default for Coord<TSpace> {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn twice<T>(c: Coord<T>) -> [Coord<T>; 2] {
        [c, c]
    }

    #[test]
    fn copies_inside_generic_code() {
        let [a, b] = twice(Coord::<Normalized>::new(0.25, 0.75));
        assert_eq!(a, b);
        assert_eq!(a.x, 0.25);
    }

    #[test]
    fn debug_names_the_space() {
        assert_eq!(format!("{:?}", Coord::<Pixel>::new(3.0, 4.5)), "(3, 4.5) px");
        assert_eq!(format!("{:?}", Coord::<Normalized>::new(0.5, 1.0)), "(0.5, 1) ratio");
    }

    #[test]
    fn pairs_ignore_a_dangling_value() {
        let coords: Vec<Coord<Pixel>> = Coord::pairs(&[1.0, 2.0, 3.0, 4.0, 5.0]).collect();
        assert_eq!(coords, vec![Coord::new(1.0, 2.0), Coord::new(3.0, 4.0)]);
    }

    #[test]
    fn zero_turn_keeps_vertex() {
        let point: Coord<Pixel> = Coord::new(12.0, 7.0);
        let rotated = point.rotate_about(Coord::new(3.0, 4.0), 0.0);
        assert!((rotated.x - 12.0).abs() < 1e-9);
        assert!((rotated.y - 7.0).abs() < 1e-9);
    }

    #[test]
    fn quarter_turn_is_clockwise_on_screen() {
        let point: Coord<Pixel> = Coord::new(10.0, 0.0);
        let rotated = point.rotate_about(Coord::default(), 90.0);
        assert!(rotated.x.abs() < 1e-9);
        assert!((rotated.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn ratio_conversion_scales_each_axis() {
        let ratio = Coord::<Pixel>::new(32.0, 48.0).to_normalized(128.0, 64.0);
        assert_eq!(ratio, Coord::new(0.25, 0.75));
        assert_eq!(ratio.to_pixel(128.0, 64.0), Coord::new(32.0, 48.0));
        assert!(!Coord::<Pixel>::new(f64::NAN, 1.0).is_finite());
    }
}
