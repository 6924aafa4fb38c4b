//! Image loading, decoding and pixel manipulation.
//!
//! This mirrors the layout of the image-handling code the rest of the workspace is modeled on:
//! an owning [`Image`] type plus borrowed [`ImageView`]/[`ImageViewMut`] windows into it, with
//! [`AsImageView`]/[`AsImageViewMut`] letting the rest of the pipeline stay generic over which one
//! it's given.

mod blend;
mod rect;
pub mod resolution;

use std::{fmt, path::Path};

use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{GenericImage, GenericImageView, ImageBuffer, Rgba, RgbaImage};

pub use blend::Blend;
pub use rect::{Point2D, Rect, RotatedRect};
pub use resolution::Resolution;

#[allow(dead_code)]
enum JpegBackend {
    JpegDecoder,
    Mozjpeg,
    ZuneJpeg,
}

const JPEG_BACKEND: JpegBackend = JpegBackend::ZuneJpeg;

#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("jpg" | "jpeg") => Ok(Self::Jpeg),
            Some("png") => Ok(Self::Png),
            other => anyhow::bail!(
                "invalid image path '{}' (unsupported extension {:?})",
                path.display(),
                other
            ),
        }
    }
}

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    buf: RgbaImage,
}

impl Image {
    /// Loads an image from the filesystem.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read(path)?;
        match ImageFormat::from_path(path)? {
            ImageFormat::Jpeg => Self::decode_jpeg(&data),
            ImageFormat::Png => {
                let buf =
                    image::load_from_memory_with_format(&data, image::ImageFormat::Png)?.to_rgba8();
                Ok(Self { buf })
            }
        }
    }

    /// Decodes a JFIF JPEG from a byte slice, the typical input format for the facial photo
    /// ingestion step.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        let buf = match JPEG_BACKEND {
            JpegBackend::JpegDecoder => {
                image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
            }
            JpegBackend::Mozjpeg => {
                let decompressor = mozjpeg::Decompress::new_mem(data)?;
                let mut decomp = decompressor.rgba()?;
                let buf = decomp
                    .read_scanlines_flat()
                    .ok_or_else(|| anyhow::anyhow!("failed to decode JPEG scanlines"))?;
                ImageBuffer::from_raw(decomp.width() as u32, decomp.height() as u32, buf)
                    .ok_or_else(|| anyhow::anyhow!("decoded JPEG buffer has wrong size"))?
            }
            JpegBackend::ZuneJpeg => {
                let mut decomp = zune_jpeg::Decoder::new();
                decomp.set_num_threads(1)?;
                decomp.rgba();
                let buf = decomp.decode_buffer(data)?;
                let width = u32::from(decomp.width());
                let height = u32::from(decomp.height());
                ImageBuffer::from_raw(width, height, buf)
                    .ok_or_else(|| anyhow::anyhow!("decoded JPEG buffer has wrong size"))?
            }
        };

        Ok(Self { buf })
    }

    /// Saves an image to the file system. The path must have a supported extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        ImageFormat::from_path(path)?;
        self.buf.save(path)?;
        Ok(())
    }

    /// Creates an empty, fully transparent black image of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0, 0, self.width(), self.height())
    }

    /// Resizes this image to `new_res`, letterboxing with black bars to preserve aspect ratio.
    ///
    /// Uses nearest-neighbor interpolation; this crate runs on the CPU only and favors predictable
    /// throughput over resampling quality.
    pub fn aspect_aware_resize(&self, new_res: Resolution) -> Image {
        self.as_view().aspect_aware_resize(new_res)
    }

    /// Resizes to `new_res` in "fill, then center-crop" mode. See
    /// [`ImageView::fill_resize`].
    pub fn fill_resize(&self, new_res: Resolution) -> Image {
        self.as_view().fill_resize(new_res)
    }

    /// Creates an immutable view of the area described by `rect`, clipped to the image bounds.
    pub fn view(&self, rect: &Rect) -> ImageView<'_> {
        match self.rect().intersection(rect) {
            Some(rect) => ImageView {
                sub_image: self
                    .buf
                    .view(rect.x() as _, rect.y() as _, rect.width(), rect.height()),
            },
            None => ImageView {
                sub_image: self.buf.view(0, 0, 0, 0),
            },
        }
    }

    /// Creates a mutable view of the area described by `rect`, clipped to the image bounds.
    pub fn view_mut(&mut self, rect: &Rect) -> ImageViewMut<'_> {
        match self.rect().intersection(rect) {
            Some(rect) => ImageViewMut {
                sub_image: self
                    .buf
                    .sub_image(rect.x() as _, rect.y() as _, rect.width(), rect.height()),
            },
            None => ImageViewMut {
                sub_image: self.buf.sub_image(0, 0, 0, 0),
            },
        }
    }

    /// Rotates the image by `radians` around its center, growing the canvas to fit the result and
    /// filling newly exposed corners with black, per the standard PIV/TWIC frame-growth geometry.
    pub fn rotate_around_center(&self, radians: f32) -> Image {
        let rect = RotatedRect::new(self.rect(), radians);
        let out_res = rect.bounding_resolution();
        let mut out = Image::new(out_res.width(), out_res.height());

        let src_center = Point2D::new(self.width() as f32 / 2.0, self.height() as f32 / 2.0);
        let dst_center = Point2D::new(out_res.width() as f32 / 2.0, out_res.height() as f32 / 2.0);

        for dest_y in 0..out.height() {
            for dest_x in 0..out.width() {
                let dst_point = Point2D::new(dest_x as f32 + 0.5, dest_y as f32 + 0.5);
                // Inverse-map: rotate the destination pixel back by `-radians` around the
                // destination center, then translate into source image space.
                let rel = dst_point.rotate_around(dst_center, -radians);
                let src_x = rel.x - dst_center.x + src_center.x;
                let src_y = rel.y - dst_center.y + src_center.y;

                if src_x >= 0.0 && src_y >= 0.0 && src_x < self.width() as f32 && src_y < self.height() as f32 {
                    let color = self.as_view().get_pixel(src_x as u32, src_y as u32);
                    out.view_mut(&out.rect()).set_pixel(dest_x, dest_y, color);
                }
            }
        }

        out
    }

    pub fn flip_horizontal(&self) -> Image {
        Image {
            buf: image::imageops::flip_horizontal(&self.buf),
        }
    }

    pub fn flip_vertical(&self) -> Image {
        Image {
            buf: image::imageops::flip_vertical(&self.buf),
        }
    }

    /// Overwrites `self` with `src`, stretching or shrinking it to fill the destination.
    pub fn blend_from<V: AsImageView>(&mut self, src: &V) -> Blend<'_> {
        Blend::new(self.as_view_mut(), src.as_view())
    }

    /// Sets every pixel to `color`.
    pub fn clear(&mut self, color: Color) {
        self.buf.pixels_mut().for_each(|pix| pix.0 = color.0);
    }

    #[inline]
    pub(crate) fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

/// An immutable view of a rectangular section of an [`Image`].
pub struct ImageView<'a> {
    sub_image: image::SubImage<&'a RgbaImage>,
}

impl<'a> ImageView<'a> {
    pub fn width(&self) -> u32 {
        self.sub_image.width()
    }

    pub fn height(&self) -> u32 {
        self.sub_image.height()
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0, 0, self.width(), self.height())
    }

    /// Reads the color of the pixel at `(x, y)`, relative to this view's origin.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the bounds of this view.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Color {
        Color(self.sub_image.get_pixel(x, y).0)
    }

    pub(crate) fn get(&self, x: u32, y: u32) -> Color {
        self.get_pixel(x, y)
    }

    /// Borrows an identical [`ImageView`] with a shorter lifetime.
    pub fn reborrow(&self) -> ImageView<'_> {
        ImageView {
            sub_image: self.sub_image.view(0, 0, self.width(), self.height()),
        }
    }

    pub fn view(&self, rect: &Rect) -> ImageView<'_> {
        match self.rect().intersection(rect) {
            Some(rect) => ImageView {
                sub_image: self
                    .sub_image
                    .view(rect.x() as _, rect.y() as _, rect.width(), rect.height()),
            },
            None => ImageView {
                sub_image: self.sub_image.view(0, 0, 0, 0),
            },
        }
    }

    /// Copies the contents of this view into a new owned [`Image`].
    pub fn to_image(&self) -> Image {
        Image {
            buf: self.sub_image.to_image(),
        }
    }

    /// Resizes this view to `new_res`, letterboxing with black bars to preserve aspect ratio.
    pub fn aspect_aware_resize(&self, new_res: Resolution) -> Image {
        let cur_ratio = self.resolution().aspect_ratio();
        let new_ratio = new_res.aspect_ratio();
        log::trace!(
            "aspect-aware resize from {} -> {} ({} -> {})",
            self.resolution(),
            new_res,
            cur_ratio,
            new_ratio,
        );

        let mut out = Image::new(new_res.width(), new_res.height());
        let target_rect = new_res.fit_aspect_ratio(self.resolution().aspect_ratio());
        let mut target_view = out.view_mut(&target_rect);

        for dest_y in 0..target_rect.height() {
            for dest_x in 0..target_rect.width() {
                let src_x =
                    ((dest_x as f32 + 0.5) / target_rect.width() as f32 * self.width() as f32) as u32;
                let src_y =
                    ((dest_y as f32 + 0.5) / target_rect.height() as f32 * self.height() as f32) as u32;
                let pixel = self.get_pixel(src_x.min(self.width().saturating_sub(1)), src_y.min(self.height().saturating_sub(1)));
                target_view.set(dest_x, dest_y, pixel);
            }
        }

        out
    }

    /// Resizes this view to `new_res` in "fill, then center-crop" mode: the source is scaled up
    /// just enough to cover the whole target frame, then centered, cropping off whatever
    /// overhangs on the long axis. Unlike [`Self::aspect_aware_resize`], no padding is ever
    /// produced.
    pub fn fill_resize(&self, new_res: Resolution) -> Image {
        let scale = (new_res.width() as f32 / self.width().max(1) as f32)
            .max(new_res.height() as f32 / self.height().max(1) as f32);
        let off_x = (new_res.width() as f32 - self.width() as f32 * scale) / 2.0;
        let off_y = (new_res.height() as f32 - self.height() as f32 * scale) / 2.0;

        let mut out = Image::new(new_res.width(), new_res.height());
        let full_rect = out.rect();
        let mut target_view = out.view_mut(&full_rect);
        for dest_y in 0..new_res.height() {
            for dest_x in 0..new_res.width() {
                let src_x = (dest_x as f32 - off_x) / scale;
                let src_y = (dest_y as f32 - off_y) / scale;
                let src_x = src_x.clamp(0.0, self.width().saturating_sub(1) as f32) as u32;
                let src_y = src_y.clamp(0.0, self.height().saturating_sub(1) as f32) as u32;
                let pixel = self.get_pixel(src_x, src_y);
                target_view.set(dest_x, dest_y, pixel);
            }
        }

        out
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} ImageView", self.width(), self.height())
    }
}

/// A mutable view of a rectangular section of an [`Image`].
pub struct ImageViewMut<'a> {
    sub_image: image::SubImage<&'a mut RgbaImage>,
}

impl<'a> ImageViewMut<'a> {
    pub fn width(&self) -> u32 {
        self.sub_image.width()
    }

    pub fn height(&self) -> u32 {
        self.sub_image.height()
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0, 0, self.width(), self.height())
    }

    #[inline]
    pub(crate) fn get(&self, x: u32, y: u32) -> Color {
        Color(self.sub_image.get_pixel(x, y).0)
    }

    /// Sets the pixel at `(x, y)`, relative to this view's origin.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the bounds of this view.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.sub_image.put_pixel(x, y, Rgba(color.0));
    }

    /// Alias of [`ImageViewMut::set`] using the naming the rotation/crop code favors.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        self.set(x, y, color)
    }

    pub fn reborrow(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            sub_image: self.sub_image.sub_image(0, 0, self.width(), self.height()),
        }
    }

    pub fn view(&self, rect: &Rect) -> ImageView<'_> {
        match self.rect().intersection(rect) {
            Some(rect) => ImageView {
                sub_image: self
                    .sub_image
                    .view(rect.x() as _, rect.y() as _, rect.width(), rect.height()),
            },
            None => ImageView {
                sub_image: self.sub_image.view(0, 0, 0, 0),
            },
        }
    }

    pub fn view_mut(&mut self, rect: &Rect) -> ImageViewMut<'_> {
        match self.rect().intersection(rect) {
            Some(rect) => ImageViewMut {
                sub_image: self.sub_image.sub_image(
                    rect.x() as _,
                    rect.y() as _,
                    rect.width(),
                    rect.height(),
                ),
            },
            None => ImageViewMut {
                sub_image: self.sub_image.sub_image(0, 0, 0, 0),
            },
        }
    }

    /// Copies the contents of this view into a new owned [`Image`].
    pub fn to_image(&self) -> Image {
        Image {
            buf: self.sub_image.to_image(),
        }
    }

    pub fn blend_from<V: AsImageView>(&mut self, src: &V) -> Blend<'_> {
        Blend::new(self.reborrow(), src.as_view())
    }
}

impl fmt::Debug for ImageViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} ImageViewMut", self.width(), self.height())
    }
}

/// An 8-bit RGBA color, sRGB, non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }

    pub fn with_alpha(mut self, a: u8) -> Color {
        self.0[3] = a;
        self
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r(), self.g(), self.b(), self.a())
    }
}

// FIXME leaks the `embedded-graphics` dependency
impl PixelColor for Color {
    type Raw = RawU32;
}

/// Trait for types that can be treated as a read-only view of image data.
pub trait AsImageView {
    fn as_view(&self) -> ImageView<'_>;
}

/// Trait for types that can be treated as a mutable view of image data.
pub trait AsImageViewMut: AsImageView {
    fn as_view_mut(&mut self) -> ImageViewMut<'_>;
}

impl AsImageView for Image {
    fn as_view(&self) -> ImageView<'_> {
        self.view(&self.rect())
    }
}

impl<'a> AsImageView for ImageView<'a> {
    fn as_view(&self) -> ImageView<'_> {
        self.reborrow()
    }
}

impl AsImageViewMut for Image {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        let rect = self.rect();
        self.view_mut(&rect)
    }
}

impl<'a> AsImageView for ImageViewMut<'a> {
    fn as_view(&self) -> ImageView<'_> {
        ImageView {
            sub_image: self.sub_image.view(0, 0, self.width(), self.height()),
        }
    }
}

impl<'a> AsImageViewMut for ImageViewMut<'a> {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.reborrow()
    }
}

impl<V: AsImageView> AsImageView for &V {
    fn as_view(&self) -> ImageView<'_> {
        (*self).as_view()
    }
}

impl<V: AsImageView> AsImageView for &mut V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageViewMut> AsImageViewMut for &mut V {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        (*self).as_view_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_image_is_black_and_transparent() {
        let img = Image::new(4, 4);
        assert_eq!(img.as_view().get_pixel(0, 0), Color([0, 0, 0, 0]));
    }

    #[test]
    fn clear_sets_every_pixel() {
        let mut img = Image::new(4, 4);
        img.clear(Color::RED);
        assert_eq!(img.as_view().get_pixel(3, 3), Color::RED);
    }

    #[test]
    fn view_clips_to_image_bounds() {
        let img = Image::new(10, 10);
        let view = img.view(&Rect::from_top_left(5, 5, 100, 100));
        assert_eq!(view.width(), 5);
        assert_eq!(view.height(), 5);
    }

    #[test]
    fn view_fully_outside_is_empty() {
        let img = Image::new(10, 10);
        let view = img.view(&Rect::from_top_left(100, 100, 10, 10));
        assert_eq!(view.width(), 0);
        assert_eq!(view.height(), 0);
    }

    #[test]
    fn aspect_aware_resize_preserves_target_size() {
        let img = Image::new(100, 50);
        let resized = img.aspect_aware_resize(Resolution::new(60, 60));
        assert_eq!(resized.resolution(), Resolution::new(60, 60));
    }

    #[test]
    fn fill_resize_preserves_target_size_without_padding() {
        let mut img = Image::new(100, 50);
        img.clear(Color::RED);
        let resized = img.fill_resize(Resolution::new(60, 60));
        assert_eq!(resized.resolution(), Resolution::new(60, 60));
        // every pixel should be covered by source content, never left as the transparent default
        assert_eq!(resized.as_view().get_pixel(0, 0), Color::RED);
        assert_eq!(resized.as_view().get_pixel(59, 59), Color::RED);
    }

    #[test]
    fn rotate_by_zero_preserves_dimensions() {
        let img = Image::new(20, 10);
        let rotated = img.rotate_around_center(0.0);
        assert_eq!(rotated.width(), 20);
        assert_eq!(rotated.height(), 10);
    }

    #[test]
    fn rotate_by_quarter_turn_swaps_dimensions() {
        let img = Image::new(20, 10);
        let rotated = img.rotate_around_center(std::f32::consts::FRAC_PI_2);
        assert_eq!(rotated.width(), 10);
        assert_eq!(rotated.height(), 20);
    }
}
