//! Pixel resolutions and aspect-ratio arithmetic.

use std::fmt;

use crate::Rect;

/// A width/height pair describing the size of an image or a target output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// Creates a new resolution.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns `width / height` as a floating-point ratio.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Computes the largest [`Rect`] with the given `aspect_ratio` that fits inside `self`,
    /// centered on both axes.
    ///
    /// This is used to pick the letterboxed/pillarboxed destination area when resizing an image
    /// into a frame of a different aspect ratio without distorting it.
    pub fn fit_aspect_ratio(&self, aspect_ratio: f32) -> Rect {
        let self_ratio = self.aspect_ratio();
        if aspect_ratio > self_ratio {
            // Source is wider than self: fit width, letterbox top/bottom.
            let height = (self.width as f32 / aspect_ratio).round() as u32;
            let y = (self.height.saturating_sub(height)) / 2;
            Rect::from_top_left(0, y as i32, self.width, height)
        } else {
            // Source is taller than (or equal to) self: fit height, pillarbox left/right.
            let width = (self.height as f32 * aspect_ratio).round() as u32;
            let x = (self.width.saturating_sub(width)) / 2;
            Rect::from_top_left(x as i32, 0, width, self.height)
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn aspect_ratio_matches_dimensions() {
        let res = Resolution::new(1920, 1080);
        assert_relative_eq!(res.aspect_ratio(), 16.0 / 9.0, epsilon = 1e-4);
    }

    #[test]
    fn fit_letterboxes_wider_content() {
        let frame = Resolution::new(100, 100);
        let rect = frame.fit_aspect_ratio(2.0);
        assert_eq!(rect.width(), 100);
        assert_eq!(rect.height(), 50);
        assert_eq!(rect.y(), 25);
    }

    #[test]
    fn fit_pillarboxes_taller_content() {
        let frame = Resolution::new(100, 100);
        let rect = frame.fit_aspect_ratio(0.5);
        assert_eq!(rect.height(), 100);
        assert_eq!(rect.width(), 50);
        assert_eq!(rect.x(), 25);
    }
}
