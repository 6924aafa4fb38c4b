//! ROI builder (Appendix C.6): the single fixed rectangular inner region of the 420x560 output
//! frame that receives maxshift priority during JPEG 2000 encoding.
//!
//! The exact pixel bounds are fixed by the standard's Appendix C.6 and documented in this
//! workspace's `DESIGN.md` (a concrete choice was made there since the distilled specification
//! withholds the precise figures and instructs implementers to consult the standard directly).

use pivcard_image::Rect;

use crate::geometry::{OUTPUT_HEIGHT, OUTPUT_WIDTH};

/// Priority level tagged on the single inner region this builder produces. Interpreted by the
/// encoder adapter as the region's start-level independent of `roi_start_level`.
pub const INNER_REGION_PRIORITY: i32 = 3;

/// Width and height of the inner region, expressed as a fraction of the output frame, and its
/// vertical offset from the top, as fixed by Appendix C.6.
const REGION_WIDTH_FRACTION: f32 = 0.524; // 220 / 420
const REGION_HEIGHT_FRACTION: f32 = 0.5; // 280 / 560
const REGION_TOP_FRACTION: f32 = 0.25; // 140 / 560

/// A tagged rectangular region of the output frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiRegion {
    pub rect: Rect,
    pub priority: i32,
    pub name: &'static str,
}

/// The complete set of ROI regions for an output image. Currently always a single named region.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiSet {
    inner: RoiRegion,
}

impl RoiSet {
    /// Builds the Appendix C.6 inner region, centered horizontally in the 420x560 frame.
    pub fn build() -> Self {
        let width = (OUTPUT_WIDTH as f32 * REGION_WIDTH_FRACTION).round() as u32;
        let height = (OUTPUT_HEIGHT as f32 * REGION_HEIGHT_FRACTION).round() as u32;
        let x = ((OUTPUT_WIDTH - width) / 2) as i32;
        let y = (OUTPUT_HEIGHT as f32 * REGION_TOP_FRACTION).round() as i32;

        let rect = Rect::from_top_left(x, y, width, height);
        assert!(rect.width() > 0 && rect.height() > 0, "ROI rectangle must have positive dimensions");
        assert!(
            rect.x() >= 0 && rect.y() >= 0 && rect.right() <= OUTPUT_WIDTH as i32 && rect.bottom() <= OUTPUT_HEIGHT as i32,
            "ROI rectangle {rect} must lie within the {OUTPUT_WIDTH}x{OUTPUT_HEIGHT} output frame",
        );

        Self {
            inner: RoiRegion {
                rect,
                priority: INNER_REGION_PRIORITY,
                name: "inner",
            },
        }
    }

    pub fn inner_region(&self) -> RoiRegion {
        self.inner
    }

    pub fn regions(&self) -> impl Iterator<Item = &RoiRegion> {
        std::iter::once(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_region_is_centered_horizontally() {
        let roi = RoiSet::build();
        let region = roi.inner_region();
        let left_margin = region.rect.x();
        let right_margin = OUTPUT_WIDTH as i32 - region.rect.right();
        assert_eq!(left_margin, right_margin);
    }

    #[test]
    fn inner_region_fits_within_frame() {
        let roi = RoiSet::build();
        let region = roi.inner_region();
        assert!(region.rect.right() <= OUTPUT_WIDTH as i32);
        assert!(region.rect.bottom() <= OUTPUT_HEIGHT as i32);
    }
}
