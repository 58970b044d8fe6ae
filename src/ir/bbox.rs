//! Axis-aligned boxes in XYXY form.

use super::coord::Coord;
use super::{Normalized, Pixel};

/// An axis-aligned box stored as (xmin, ymin, xmax, ymax).
///
/// The constructor does not reorder corners; use [`BBoxXYXY::from_points`]
/// when the input is an arbitrary point set.
pub struct BBoxXYXY<TSpace> {
    pub min: Coord<TSpace>,
    pub max: Coord<TSpace>,
}

impl<TSpace> Clone for BBoxXYXY<TSpace> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<TSpace> Copy for BBoxXYXY<TSpace> {}

impl<TSpace> PartialEq for BBoxXYXY<TSpace> {
    fn eq(&self, other: &Self) -> bool {
        self.min == other.min && self.max == other.max
    }
}

impl<TSpace> BBoxXYXY<TSpace> {
    #[inline]
    pub fn new(min: Coord<TSpace>, max: Coord<TSpace>) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            min: Coord::new(xmin, ymin),
            max: Coord::new(xmax, ymax),
        }
    }

    /// Top-left corner plus size, the COCO `bbox` layout.
    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::from_xyxy(x, y, x + width, y + height)
    }

    /// Smallest box containing every coordinate pair of a flat `[x0, y0, x1, y1, ...]` list.
    ///
    /// Returns `None` when the list holds no complete pair.
    pub fn from_points(points: &[f64]) -> Option<Self> {
        Self::enclosing(Coord::pairs(points))
    }

    /// Smallest box containing every coordinate yielded by `coords`.
    pub fn enclosing(coords: impl IntoIterator<Item = Coord<TSpace>>) -> Option<Self> {
        let mut coords = coords.into_iter();
        let first = coords.next()?;
        let mut bbox = Self::new(first, first);
        for c in coords {
            bbox.min.x = bbox.min.x.min(c.x);
            bbox.min.y = bbox.min.y.min(c.y);
            bbox.max.x = bbox.max.x.max(c.x);
            bbox.max.y = bbox.max.y.max(c.y);
        }
        Some(bbox)
    }

    #[inline]
    pub fn xmin(&self) -> f64 {
        self.min.x
    }

    #[inline]
    pub fn ymin(&self) -> f64 {
        self.min.y
    }

    #[inline]
    pub fn xmax(&self) -> f64 {
        self.max.x
    }

    #[inline]
    pub fn ymax(&self) -> f64 {
        self.max.y
    }

    /// May be negative if xmax < xmin.
    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// May be negative if ymax < ymin.
    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    #[inline]
    pub fn center(&self) -> Coord<TSpace> {
        Coord::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// True when the box collapses to a line once coordinates are truncated
    /// to whole pixels.
    ///
    /// `[5.0, 5.9, 5.4, 20.0]` is degenerate: both x values truncate to 5.
    pub fn is_degenerate_in_pixels(&self) -> bool {
        self.min.x.trunc() == self.max.x.trunc() || self.min.y.trunc() == self.max.y.trunc()
    }

    #[inline]
    pub fn to_xywh(&self) -> (f64, f64, f64, f64) {
        (self.xmin(), self.ymin(), self.width(), self.height())
    }

    /// Corners in drawing order: top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Coord<TSpace>; 4] {
        [
            self.min,
            Coord::new(self.max.x, self.min.y),
            self.max,
            Coord::new(self.min.x, self.max.y),
        ]
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYXY")
            .field("xmin", &self.min.x)
            .field("ymin", &self.min.y)
            .field("xmax", &self.max.x)
            .field("ymax", &self.max.y)
            .finish()
    }
}

impl<TSpace> Default for BBoxXYXY<TSpace> {
    fn default() -> Self {
        Self::from_xyxy(0.0, 0.0, 0.0, 0.0)
    }
}

impl BBoxXYXY<Pixel> {
    /// Converts to fractions of the image size.
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> BBoxXYXY<Normalized> {
        BBoxXYXY::new(
            self.min.to_normalized(image_width, image_height),
            self.max.to_normalized(image_width, image_height),
        )
    }

    /// Rotates the four corners around the box center and returns them.
    pub fn rotated_corners(&self, degrees: f64) -> [Coord<Pixel>; 4] {
        let center = self.center();
        self.corners().map(|c| c.rotate_about(center, degrees))
    }
}

impl BBoxXYXY<Normalized> {
    /// Builds a box from YOLO's (center x, center y, width, height) ratios.
    pub fn from_cxcywh(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::from_xyxy(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    /// Returns (center x, center y, width, height).
    pub fn to_cxcywh(&self) -> (f64, f64, f64, f64) {
        let center = self.center();
        (center.x, center.y, self.width(), self.height())
    }

    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> BBoxXYXY<Pixel> {
        BBoxXYXY::new(
            self.min.to_pixel(image_width, image_height),
            self.max.to_pixel(image_width, image_height),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_xywh() {
        let bbox: BBoxXYXY<Pixel> = BBoxXYXY::from_xywh(10.0, 20.0, 90.0, 60.0);
        assert_eq!(bbox.xmax(), 100.0);
        assert_eq!(bbox.ymax(), 80.0);
        assert_eq!(bbox.area(), 5400.0);
    }

    #[test]
    fn test_bbox_from_points_orders_corners() {
        let bbox: BBoxXYXY<Pixel> =
            BBoxXYXY::from_points(&[50.0, 10.0, 10.0, 50.0, 30.0, 5.0]).unwrap();
        assert_eq!(bbox.to_xywh(), (10.0, 5.0, 40.0, 45.0));
        assert!(BBoxXYXY::<Pixel>::from_points(&[1.0]).is_none());
    }

    #[test]
    fn test_degenerate_after_truncation() {
        let thin: BBoxXYXY<Pixel> = BBoxXYXY::from_xyxy(5.0, 5.9, 5.4, 20.0);
        assert!(thin.is_degenerate_in_pixels());
        let ok: BBoxXYXY<Pixel> = BBoxXYXY::from_xyxy(5.0, 5.9, 6.0, 20.0);
        assert!(!ok.is_degenerate_in_pixels());
    }

    #[test]
    fn test_cxcywh_roundtrip_through_pixels() {
        let bbox: BBoxXYXY<Pixel> = BBoxXYXY::from_xyxy(10.0, 10.0, 50.0, 50.0);
        let (cx, cy, w, h) = bbox.to_normalized(100.0, 100.0).to_cxcywh();
        assert!((cx - 0.3).abs() < 1e-12);
        assert!((cy - 0.3).abs() < 1e-12);
        assert!((w - 0.4).abs() < 1e-12);
        assert!((h - 0.4).abs() < 1e-12);

        let back = BBoxXYXY::from_cxcywh(cx, cy, w, h).to_pixel(100.0, 100.0);
        assert!((back.xmin() - 10.0).abs() < 1e-9);
        assert!((back.ymax() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_enclosing_and_corners_in_generic_space() {
        fn hull_of_corners<T>(bbox: BBoxXYXY<T>) -> Option<BBoxXYXY<T>> {
            BBoxXYXY::enclosing(bbox.corners())
        }
        let bbox: BBoxXYXY<Normalized> = BBoxXYXY::from_xyxy(0.1, 0.2, 0.6, 0.9);
        let copy = bbox;
        assert_eq!(hull_of_corners(bbox), Some(copy));
    }

    #[test]
    fn test_rotated_corners_keep_center() {
        let bbox: BBoxXYXY<Pixel> = BBoxXYXY::from_xyxy(0.0, 0.0, 20.0, 10.0);
        let rotated = bbox.rotated_corners(90.0);
        let hull = BBoxXYXY::enclosing(rotated).unwrap();
        assert!((hull.xmin() - 5.0).abs() < 1e-9);
        assert!((hull.xmax() - 15.0).abs() < 1e-9);
        assert!((hull.ymin() + 5.0).abs() < 1e-9);
        assert!((hull.ymax() - 15.0).abs() < 1e-9);
    }
}
