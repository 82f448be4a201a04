//! Watermark scaling and alpha compositing.
//!
//! The watermark is resized so that its width is `scale_percent` percent of
//! the target width (aspect ratio preserved, Lanczos resampling), then blended
//! onto the target with its own alpha channel as the mask:
//! `result = alpha * watermark + (1 - alpha) * image`

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, RgbaImage};

use crate::anchor::Anchor;
use crate::error::{Error, Result};

/// Smallest accepted scale percentage.
pub const MIN_SCALE: u32 = 1;

/// Largest accepted scale percentage. Keeps the scaled watermark no wider
/// than the target.
pub const MAX_SCALE: u32 = 100;

/// Check that `scale_percent` lies in `MIN_SCALE..=MAX_SCALE`.
///
/// # Errors
///
/// Returns [`Error::InvalidScale`] otherwise.
pub fn check_scale(scale_percent: u32) -> Result<()> {
    if (MIN_SCALE..=MAX_SCALE).contains(&scale_percent) {
        Ok(())
    } else {
        Err(Error::InvalidScale(scale_percent.to_string()))
    }
}

/// Size of the watermark after scaling it relative to a target of width
/// `image_width`.
///
/// The uniform ratio is `(scale_percent / 100) * image_width / wm_width`, and
/// each side is rounded to the nearest pixel. A zero-width watermark yields
/// `(0, 0)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scaled_watermark_size(
    image_width: u32,
    wm_width: u32,
    wm_height: u32,
    scale_percent: u32,
) -> (u32, u32) {
    if wm_width == 0 {
        return (0, 0);
    }
    let ratio = f64::from(scale_percent) / 100.0 * f64::from(image_width) / f64::from(wm_width);
    let width = (f64::from(wm_width) * ratio).round();
    let height = (f64::from(wm_height) * ratio).round();
    (width as u32, height as u32)
}

/// Resize `watermark` for a target of width `image_width`.
///
/// # Errors
///
/// Returns [`Error::InvalidScale`] for an out-of-range scale and
/// [`Error::WatermarkTooSmall`] if either scaled side rounds to zero.
pub fn scale_watermark(
    watermark: &RgbaImage,
    image_width: u32,
    scale_percent: u32,
) -> Result<RgbaImage> {
    check_scale(scale_percent)?;

    let (width, height) =
        scaled_watermark_size(image_width, watermark.width(), watermark.height(), scale_percent);
    if width == 0 || height == 0 {
        return Err(Error::WatermarkTooSmall {
            width,
            height,
            scale: scale_percent,
        });
    }

    Ok(imageops::resize(watermark, width, height, FilterType::Lanczos3))
}

/// Blend `overlay` onto `image` in-place with its top-left corner at
/// `(pos_x, pos_y)`.
///
/// Each covered pixel becomes `alpha * overlay + (1 - alpha) * image` per
/// color channel, where `alpha` is the overlay's alpha channel scaled to
/// `[0, 1]`. Fully transparent overlay pixels are left unchanged, and the part
/// of the overlay outside the image is clipped.
pub fn blend_onto(image: &mut RgbImage, overlay: &RgbaImage, pos_x: u32, pos_y: u32) {
    let img_w = image.width();
    let img_h = image.height();

    // Clip to image bounds
    let x2 = pos_x.saturating_add(overlay.width()).min(img_w);
    let y2 = pos_y.saturating_add(overlay.height()).min(img_h);

    if pos_x >= x2 || pos_y >= y2 {
        return;
    }

    for dy in 0..(y2 - pos_y) {
        for dx in 0..(x2 - pos_x) {
            let src = overlay.get_pixel(dx, dy);
            if src[3] == 0 {
                continue;
            }

            let alpha = f32::from(src[3]) / 255.0;
            let inv_alpha = 1.0 - alpha;

            let px = image.get_pixel_mut(pos_x + dx, pos_y + dy);
            for ch in 0..3 {
                let blended = alpha * f32::from(src[ch]) + inv_alpha * f32::from(px[ch]);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    px[ch] = blended.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

/// Composite `watermark` onto `image` at `anchor`, scaled to `scale_percent`
/// percent of the image width.
///
/// The result is opaque RGB: any alpha in `image` is dropped, the same as
/// compositing in RGBA and discarding the alpha channel afterwards.
///
/// # Errors
///
/// Returns [`Error::InvalidScale`] or [`Error::WatermarkTooSmall`] when the
/// watermark cannot be scaled.
pub fn compose(
    image: &DynamicImage,
    watermark: &RgbaImage,
    anchor: Anchor,
    scale_percent: u32,
) -> Result<RgbImage> {
    let mut base = image.to_rgb8();
    let scaled = scale_watermark(watermark, base.width(), scale_percent)?;

    let (x, y) = anchor.position(base.width(), base.height(), scaled.width(), scaled.height());
    blend_onto(&mut base, &scaled, x, y);

    Ok(base)
}

/// Decode the image at `path`, detecting the format from its contents
/// rather than trusting the extension.
///
/// # Errors
///
/// Returns an [`image::ImageError`] if the file cannot be read or decoded.
pub fn open_image(path: &Path) -> image::ImageResult<DynamicImage> {
    image::ImageReader::open(path)?.with_guessed_format()?.decode()
}

/// Decode `image_path` and `watermark_path` and [`compose`] them.
///
/// # Errors
///
/// Returns [`Error::Image`] if the target cannot be decoded,
/// [`Error::WatermarkDecode`] if the watermark cannot, or any error from
/// [`compose`].
pub fn compose_files(
    image_path: &Path,
    watermark_path: &Path,
    anchor: Anchor,
    scale_percent: u32,
) -> Result<RgbImage> {
    let image = open_image(image_path)?;
    let watermark = open_image(watermark_path)
        .map_err(Error::WatermarkDecode)?
        .to_rgba8();
    compose(&image, &watermark, anchor, scale_percent)
}
