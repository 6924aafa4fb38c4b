//! Alpha-blending support for copying pixel data between views.

use crate::{AsImageView, Color, ImageViewMut};

/// Builder returned by [`crate::Image::blend_from`] / `ImageViewMut::blend_from`.
///
/// Blending happens eagerly as soon as the builder is constructed, stretching or shrinking the
/// source view to cover the destination view entirely using nearest-neighbor sampling, the same
/// way [`crate::ImageView::aspect_aware_resize`] does.
pub struct Blend<'a> {
    dest: ImageViewMut<'a>,
}

impl<'a> Blend<'a> {
    pub(crate) fn new(mut dest: ImageViewMut<'a>, src: crate::ImageView<'_>) -> Self {
        blend_into(&mut dest, &src, 1.0);
        Self { dest }
    }

    /// Re-blends the source onto the destination using the given opacity in `0.0..=1.0`, replacing
    /// the full-opacity blend performed by the constructor.
    pub fn opacity(mut self, amount: f32, src: &impl AsImageView) -> Self {
        blend_into(&mut self.dest, &src.as_view(), amount);
        self
    }
}

fn blend_into(dest: &mut ImageViewMut<'_>, src: &crate::ImageView<'_>, amount: f32) {
    let (dw, dh) = (dest.width(), dest.height());
    let (sw, sh) = (src.width(), src.height());
    if dw == 0 || dh == 0 || sw == 0 || sh == 0 {
        return;
    }

    for dest_y in 0..dh {
        for dest_x in 0..dw {
            let src_x = ((dest_x as f32 + 0.5) / dw as f32 * sw as f32) as u32;
            let src_y = ((dest_y as f32 + 0.5) / dh as f32 * sh as f32) as u32;
            let src_color = src.get(src_x.min(sw - 1), src_y.min(sh - 1));
            let blended = if amount >= 1.0 {
                src_color
            } else {
                let dst_color = dest.get(dest_x, dest_y);
                mix(dst_color, src_color, amount * (src_color.a() as f32 / 255.0))
            };
            dest.set(dest_x, dest_y, blended);
        }
    }
}

fn mix(dst: Color, src: Color, alpha: f32) -> Color {
    let alpha = alpha.clamp(0.0, 1.0);
    let channel = |d: u8, s: u8| -> u8 { (d as f32 * (1.0 - alpha) + s as f32 * alpha).round() as u8 };
    Color::from_rgb8(
        channel(dst.r(), src.r()),
        channel(dst.g(), src.g()),
        channel(dst.b(), src.b()),
    )
    .with_alpha(255)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Image;

    #[test]
    fn full_opacity_blend_copies_source() {
        let mut src = Image::new(2, 2);
        src.clear(Color::RED);
        let mut dst = Image::new(2, 2);
        dst.clear(Color::BLUE);
        dst.blend_from(&src);
        assert_eq!(dst.as_view().get_pixel(0, 0), Color::RED);
    }
}
