//! Viewport geometry: maps the on-screen alignment guide into a pixel
//! rectangle in the camera's native resolution. The displayed video element
//! letterboxes or pillarboxes the stream when its aspect ratio differs from
//! the native one (object-fit: contain), so the guide must first be expressed
//! relative to the actual video content rectangle before scaling.

use serde::Serialize;
use tracing::debug;

/// A fixed pixel resolution (the camera's native width/height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// An axis-aligned rectangle in display (CSS) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl DisplayRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn is_zero_area(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A rectangle in native pixel coordinates, derived once per capture attempt.
/// Always lies within `[0, native.w] x [0, native.h]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRegion {
    pub const ZERO: CropRegion = CropRegion { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };

    /// Zero-area regions signal a no-capture condition, never a crash.
    pub fn is_zero_area(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Debug)]
pub enum GeometryError {
    /// Native or display dimensions degenerate to a zero-sized content
    /// rectangle; the viewport cannot produce a usable mapping.
    DegenerateViewport,
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::DegenerateViewport => {
                write!(f, "viewport degenerate: video content rectangle has no area")
            }
        }
    }
}

/// The sub-region of the display element actually filled by video pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Compute the content rectangle for a native stream shown inside a display
/// element with object-fit: contain semantics.
pub fn content_rect(native: Size, display_w: f64, display_h: f64) -> Result<ContentRect, GeometryError> {
    if native.w == 0 || native.h == 0 || display_w <= 0.0 || display_h <= 0.0 {
        return Err(GeometryError::DegenerateViewport);
    }

    let native_ratio = native.w as f64 / native.h as f64;
    let display_ratio = display_w / display_h;

    let rect = if native_ratio > display_ratio {
        // Native wider: full width, letterbox bars above and below.
        let content_h = display_w / native_ratio;
        ContentRect {
            x: 0.0,
            y: (display_h - content_h) / 2.0,
            width: display_w,
            height: content_h,
        }
    } else {
        // Native taller or equal: full height, pillarbox bars left and right.
        let content_w = display_h * native_ratio;
        ContentRect {
            x: (display_w - content_w) / 2.0,
            y: 0.0,
            width: content_w,
            height: display_h,
        }
    };

    if rect.width <= 0.0 || rect.height <= 0.0 {
        return Err(GeometryError::DegenerateViewport);
    }
    Ok(rect)
}

/// Map the alignment guide (display coordinates) into a native-pixel crop.
///
/// `video` is the video element's own rectangle on screen; the guide position
/// is first expressed relative to the video element, then relative to the
/// content rectangle, then scaled from content pixels to native pixels.
/// A zero-area guide yields a zero-area crop (no-capture condition).
pub fn compute_crop_region(
    native: Size,
    guide: DisplayRect,
    video: DisplayRect,
) -> Result<CropRegion, GeometryError> {
    if guide.is_zero_area() || video.is_zero_area() {
        return Ok(CropRegion::ZERO);
    }

    let content = content_rect(native, video.width, video.height)?;

    let guide_left = (guide.left - video.left) - content.x;
    let guide_top = (guide.top - video.top) - content.y;

    let scale_x = native.w as f64 / content.width;
    let scale_y = native.h as f64 / content.height;

    let crop = CropRegion {
        x: guide_left * scale_x,
        y: guide_top * scale_y,
        width: guide.width * scale_x,
        height: guide.height * scale_y,
    };

    let clamped = clamp_to(native, crop);
    debug!(
        crop_x = clamped.x,
        crop_y = clamped.y,
        crop_w = clamped.width,
        crop_h = clamped.height,
        scale_x,
        scale_y,
        "crop_region_computed"
    );
    Ok(clamped)
}

/// Clamp a crop into `[0, native.w] x [0, native.h]`. Well-formed inputs do
/// not exceed bounds, but the guide can overlap a letterbox bar.
fn clamp_to(native: Size, crop: CropRegion) -> CropRegion {
    let max_w = native.w as f64;
    let max_h = native.h as f64;
    let x = crop.x.clamp(0.0, max_w);
    let y = crop.y.clamp(0.0, max_h);
    CropRegion {
        x,
        y,
        width: crop.width.max(0.0).min(max_w - x),
        height: crop.height.max(0.0).min(max_h - y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn equal_ratio_has_no_offsets_and_uniform_scale() {
        // 1280x720 shown at 390x219.375 is exactly 16:9 on both sides.
        let content = content_rect(Size::new(1280, 720), 390.0, 219.375).unwrap();
        assert!(content.x.abs() < EPS);
        assert!(content.y.abs() < EPS);
        assert!((content.width - 390.0).abs() < EPS);
        assert!((content.height - 219.375).abs() < EPS);

        let scale_x = 1280.0 / content.width;
        let scale_y = 720.0 / content.height;
        assert!((scale_x - scale_y).abs() < EPS);
        assert!((scale_x - 1280.0 / 390.0).abs() < EPS);
    }

    #[test]
    fn phone_layout_scale_is_about_3_28() {
        // Spec scenario: 1280x720 native, 390x219 display (~ same ratio).
        let content = content_rect(Size::new(1280, 720), 390.0, 219.0).unwrap();
        let scale_x = 1280.0 / content.width;
        let scale_y = 720.0 / content.height;
        assert!((scale_x - 3.28).abs() < 0.01, "scale_x = {scale_x}");
        assert!((scale_y - 3.28).abs() < 0.02, "scale_y = {scale_y}");
        assert!(content.y < 0.5);
    }

    #[test]
    fn wider_native_letterboxes_vertically() {
        // 16:9 native inside a 4:3 display: bars above and below.
        let content = content_rect(Size::new(1280, 720), 400.0, 300.0).unwrap();
        assert!(content.y > 0.0);
        assert!(content.height < 300.0);
        assert!(content.x.abs() < EPS);
        assert!((content.width - 400.0).abs() < EPS);
        assert!((content.height - 225.0).abs() < EPS);
        assert!((content.y - 37.5).abs() < EPS);
    }

    #[test]
    fn portrait_display_pillarbox_scenario() {
        // Spec scenario: 1280x720 (16:9) inside 300x400 (3:4). The width
        // a full-height fit would need (400 * 16/9 ~ 711) exceeds the
        // display, so the width-constrained branch applies.
        let content = content_rect(Size::new(1280, 720), 300.0, 400.0).unwrap();
        assert!((content.height - 168.75).abs() < EPS);
        assert!((content.y - 115.625).abs() < EPS);
        assert!((content.width - 300.0).abs() < EPS);
        assert!(content.x.abs() < EPS);
    }

    #[test]
    fn guide_maps_through_content_origin_and_scale() {
        let native = Size::new(1280, 720);
        let video = DisplayRect::new(10.0, 20.0, 400.0, 300.0);
        // Content: 400x225 at y=37.5 inside the video element.
        let guide = DisplayRect::new(110.0, 127.5, 100.0, 50.0);
        let crop = compute_crop_region(native, guide, video).unwrap();

        // Guide relative to content origin: (100, 70); scale 3.2 both axes.
        assert!((crop.x - 320.0).abs() < EPS);
        assert!((crop.y - 224.0).abs() < EPS);
        assert!((crop.width - 320.0).abs() < EPS);
        assert!((crop.height - 160.0).abs() < EPS);
    }

    #[test]
    fn zero_area_guide_yields_zero_area_crop() {
        let native = Size::new(1280, 720);
        let video = DisplayRect::new(0.0, 0.0, 390.0, 219.0);
        let guide = DisplayRect::new(50.0, 50.0, 0.0, 40.0);
        let crop = compute_crop_region(native, guide, video).unwrap();
        assert!(crop.is_zero_area());
    }

    #[test]
    fn zero_area_video_yields_zero_area_crop() {
        let native = Size::new(1280, 720);
        let video = DisplayRect::new(0.0, 0.0, 0.0, 0.0);
        let guide = DisplayRect::new(10.0, 10.0, 100.0, 40.0);
        let crop = compute_crop_region(native, guide, video).unwrap();
        assert!(crop.is_zero_area());
    }

    #[test]
    fn degenerate_native_is_an_error() {
        assert!(content_rect(Size::new(0, 720), 390.0, 219.0).is_err());
        assert!(content_rect(Size::new(1280, 0), 390.0, 219.0).is_err());
    }

    #[test]
    fn guide_overlapping_letterbox_is_clamped_in_bounds() {
        let native = Size::new(1280, 720);
        let video = DisplayRect::new(0.0, 0.0, 400.0, 300.0);
        // Guide starts inside the top letterbox bar (content starts at y=37.5).
        let guide = DisplayRect::new(0.0, 0.0, 400.0, 300.0);
        let crop = compute_crop_region(native, guide, video).unwrap();
        assert!(crop.x >= 0.0 && crop.y >= 0.0);
        assert!(crop.x + crop.width <= 1280.0 + EPS);
        assert!(crop.y + crop.height <= 720.0 + EPS);
    }
}
