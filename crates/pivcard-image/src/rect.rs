//! Rectangles and points.

use std::fmt;

/// A point in 2D space, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Rotates `self` around `center` by `radians`, clockwise in image coordinate space (y points
    /// down).
    pub fn rotate_around(&self, center: Point2D, radians: f32) -> Point2D {
        let (sin, cos) = radians.sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Point2D {
            x: center.x + dx * cos - dy * sin,
            y: center.y + dx * sin + dy * cos,
        }
    }

    pub fn distance_to(&self, other: Point2D) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An axis-aligned rectangle with integer, top-left-origin coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl Rect {
    /// Creates a rectangle from its top-left corner and size.
    #[inline]
    pub const fn from_top_left(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle centered on `(cx, cy)` with the given size.
    pub fn from_center(cx: f32, cy: f32, width: u32, height: u32) -> Self {
        Self {
            x: (cx - width as f32 / 2.0).round() as i32,
            y: (cy - height as f32 / 2.0).round() as i32,
            width,
            height,
        }
    }

    #[inline]
    pub const fn x(&self) -> i32 {
        self.x
    }

    #[inline]
    pub const fn y(&self) -> i32 {
        self.y
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Grows the rectangle by `amount` pixels on every side, keeping it centered.
    pub fn grow(&self, amount: i32) -> Rect {
        Rect::from_top_left(
            self.x - amount,
            self.y - amount,
            (self.width as i32 + 2 * amount).max(0) as u32,
            (self.height as i32 + 2 * amount).max(0) as u32,
        )
    }

    /// Returns the intersection of `self` and `other`, or `None` if they don't overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.left().max(other.left());
        let y1 = self.top().max(other.top());
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            None
        } else {
            Some(Rect::from_top_left(x1, y1, (x2 - x1) as u32, (y2 - y1) as u32))
        }
    }

    /// Returns the smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let x1 = self.left().min(other.left());
        let y1 = self.top().min(other.top());
        let x2 = self.right().max(other.right());
        let y2 = self.bottom().max(other.bottom());
        Rect::from_top_left(x1, y1, (x2 - x1) as u32, (y2 - y1) as u32)
    }

    /// Computes the intersection-over-union of `self` and `other`, a value in `0.0..=1.0`.
    pub fn iou(&self, other: &Rect) -> f32 {
        let intersection = match self.intersection(other) {
            Some(rect) => rect.area(),
            None => 0,
        };
        if intersection == 0 {
            return 0.0;
        }
        let union = self.area() + other.area() - intersection;
        intersection as f32 / union as f32
    }

    /// Returns whether `point` lies within `self`.
    pub fn contains(&self, point: Point2D) -> bool {
        point.x >= self.left() as f32
            && point.x < self.right() as f32
            && point.y >= self.top() as f32
            && point.y < self.bottom() as f32
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect {{ x: {}, y: {}, w: {}, h: {} }}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// A rectangle that has been rotated around its center by some angle.
///
/// Used to describe a face crop that has been rotated to align the eyes horizontally before the
/// axis-aligned output crop is taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn radians(&self) -> f32 {
        self.radians
    }

    /// Returns the four corners of the rectangle, in image space, after rotation.
    pub fn corners(&self) -> [Point2D; 4] {
        let center = self.rect.center();
        let (l, t, r, b) = (
            self.rect.left() as f32,
            self.rect.top() as f32,
            self.rect.right() as f32,
            self.rect.bottom() as f32,
        );
        [
            Point2D::new(l, t).rotate_around(center, self.radians),
            Point2D::new(r, t).rotate_around(center, self.radians),
            Point2D::new(r, b).rotate_around(center, self.radians),
            Point2D::new(l, b).rotate_around(center, self.radians),
        ]
    }

    /// Returns the smallest axis-aligned [`Resolution`] that can hold this rectangle after
    /// rotation, per the standard `ceil(|w*cos| + |h*sin|)` frame-growth formula.
    pub fn bounding_resolution(&self) -> crate::Resolution {
        let (sin, cos) = self.radians.sin_cos();
        let w = self.rect.width() as f32;
        let h = self.rect.height() as f32;
        let bw = (w * cos).abs() + (h * sin).abs();
        let bh = (w * sin).abs() + (h * cos).abs();
        crate::Resolution::new(bw.ceil() as u32, bh.ceil() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn intersection_of_disjoint_rects_is_none() {
        let a = Rect::from_top_left(0, 0, 10, 10);
        let b = Rect::from_top_left(20, 20, 10, 10);
        assert_eq!(a.intersection(&b), None);
    }

    #[test]
    fn intersection_of_overlapping_rects() {
        let a = Rect::from_top_left(0, 0, 10, 10);
        let b = Rect::from_top_left(5, 5, 10, 10);
        let i = a.intersection(&b).unwrap();
        assert_eq!(i, Rect::from_top_left(5, 5, 5, 5));
    }

    #[test]
    fn iou_of_identical_rects_is_one() {
        let a = Rect::from_top_left(0, 0, 10, 10);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn iou_of_disjoint_rects_is_zero() {
        let a = Rect::from_top_left(0, 0, 10, 10);
        let b = Rect::from_top_left(100, 100, 10, 10);
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn rotation_by_zero_is_identity() {
        let rect = Rect::from_top_left(0, 0, 100, 50);
        let rotated = RotatedRect::new(rect, 0.0);
        let res = rotated.bounding_resolution();
        assert_eq!(res.width(), 100);
        assert_eq!(res.height(), 50);
    }

    #[test]
    fn rotation_by_quarter_turn_swaps_dimensions() {
        let rect = Rect::from_top_left(0, 0, 100, 50);
        let rotated = RotatedRect::new(rect, std::f32::consts::FRAC_PI_2);
        let res = rotated.bounding_resolution();
        assert_eq!(res.width(), 50);
        assert_eq!(res.height(), 100);
    }

    #[test]
    fn point_rotation_around_center_preserves_distance() {
        let center = Point2D::new(0.0, 0.0);
        let p = Point2D::new(10.0, 0.0);
        let rotated = p.rotate_around(center, std::f32::consts::FRAC_PI_2);
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(rotated.y, 10.0, epsilon = 1e-4);
    }
}
