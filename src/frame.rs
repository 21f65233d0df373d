//! Frame normalization: materializes a crop region into an owned pixel
//! buffer and applies the luminance transform the recognition engine sees.
//! Both transforms are deterministic; identical input pixels produce
//! bit-exact output.

use image::RgbaImage;
use tracing::debug;

use crate::geometry::CropRegion;

/// An owned pixel buffer sized to one crop, created per capture attempt and
/// discarded after recognition.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    buffer: RgbaImage,
}

impl CapturedImage {
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.buffer
    }

    /// Deep copy for the on-screen debug surface. The copy never aliases the
    /// buffer handed to recognition: mutating this image afterwards leaves
    /// the copy untouched.
    pub fn debug_copy(&self) -> CapturedImage {
        CapturedImage { buffer: self.buffer.clone() }
    }

    /// Encode as PNG bytes (debug surface persistence, engine handoff).
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, String> {
        let mut bytes = Vec::new();
        self.buffer
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| format!("png encode: {e}"))?;
        Ok(bytes)
    }
}

/// Copy the region out of a native frame, 1:1 with no resampling. The region
/// is rounded to whole pixels here and clamped against the frame bounds; a
/// zero-area result means nothing to capture.
pub fn capture(frame: &RgbaImage, region: &CropRegion) -> CapturedImage {
    let x0 = region.x.round().max(0.0) as u32;
    let y0 = region.y.round().max(0.0) as u32;
    let x0 = x0.min(frame.width());
    let y0 = y0.min(frame.height());
    let w = (region.width.round().max(0.0) as u32).min(frame.width() - x0);
    let h = (region.height.round().max(0.0) as u32).min(frame.height() - y0);

    let mut buffer = RgbaImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            buffer.put_pixel(x, y, *frame.get_pixel(x0 + x, y0 + y));
        }
    }

    debug!(x = x0, y = y0, w, h, "frame_captured");
    CapturedImage { buffer }
}

/// In-place BT.601 grayscale: R=G=B=luma, alpha left untouched. Idempotent.
pub fn to_grayscale(image: &mut CapturedImage) {
    for pixel in image.buffer.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let luma = (r as f64 * 0.299 + g as f64 * 0.587 + b as f64 * 0.114)
            .round()
            .clamp(0.0, 255.0) as u8;
        pixel.0 = [luma, luma, luma, a];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient_frame(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    #[test]
    fn capture_copies_exact_region() {
        let frame = gradient_frame(100, 80);
        let region = CropRegion { x: 10.0, y: 20.0, width: 30.0, height: 15.0 };
        let img = capture(&frame, &region);
        assert_eq!(img.width(), 30);
        assert_eq!(img.height(), 15);
        assert_eq!(img.as_rgba().get_pixel(0, 0), frame.get_pixel(10, 20));
        assert_eq!(img.as_rgba().get_pixel(29, 14), frame.get_pixel(39, 34));
    }

    #[test]
    fn capture_clamps_against_frame_bounds() {
        let frame = gradient_frame(50, 50);
        let region = CropRegion { x: 40.0, y: 45.0, width: 30.0, height: 30.0 };
        let img = capture(&frame, &region);
        assert_eq!(img.width(), 10);
        assert_eq!(img.height(), 5);
    }

    #[test]
    fn capture_zero_area_region_is_empty_not_a_panic() {
        let frame = gradient_frame(50, 50);
        let img = capture(&frame, &CropRegion::ZERO);
        assert_eq!(img.width(), 0);
        assert_eq!(img.height(), 0);
    }

    #[test]
    fn grayscale_uses_bt601_weights() {
        let frame = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 50, 255]));
        let mut img = capture(&frame, &CropRegion { x: 0.0, y: 0.0, width: 1.0, height: 1.0 });
        to_grayscale(&mut img);
        // 200*0.299 + 100*0.587 + 50*0.114 = 124.2 -> 124
        assert_eq!(img.as_rgba().get_pixel(0, 0).0, [124, 124, 124, 255]);
    }

    #[test]
    fn grayscale_is_idempotent() {
        let frame = gradient_frame(16, 16);
        let region = CropRegion { x: 0.0, y: 0.0, width: 16.0, height: 16.0 };
        let mut once = capture(&frame, &region);
        to_grayscale(&mut once);
        let mut twice = once.debug_copy();
        to_grayscale(&mut twice);
        assert_eq!(once.as_rgba().as_raw(), twice.as_rgba().as_raw());
    }

    #[test]
    fn grayscale_preserves_dimensions_and_alpha() {
        let frame = RgbaImage::from_fn(8, 4, |x, _| Rgba([10, 20, 30, (x * 7) as u8]));
        let region = CropRegion { x: 0.0, y: 0.0, width: 8.0, height: 4.0 };
        let mut img = capture(&frame, &region);
        to_grayscale(&mut img);
        assert_eq!((img.width(), img.height()), (8, 4));
        for x in 0..8 {
            assert_eq!(img.as_rgba().get_pixel(x, 0).0[3], (x * 7) as u8);
        }
    }

    #[test]
    fn debug_copy_does_not_alias_the_recognition_buffer() {
        let frame = gradient_frame(8, 8);
        let region = CropRegion { x: 0.0, y: 0.0, width: 8.0, height: 8.0 };
        let mut img = capture(&frame, &region);
        let copy = img.debug_copy();
        to_grayscale(&mut img);
        // The copy still holds the pre-normalization pixels.
        assert_eq!(copy.as_rgba().get_pixel(3, 5), frame.get_pixel(3, 5));
        assert_ne!(copy.as_rgba().as_raw(), img.as_rgba().as_raw());
    }
}
