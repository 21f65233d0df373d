//! Narrow UI capability handles injected into the controller. The controller
//! never touches presentation directly; each handle covers exactly one
//! concern, so tests run against in-memory fakes and the binary wires up the
//! console implementation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::frame::CapturedImage;
use crate::geometry::DisplayRect;

/// The on-screen layout a capture attempt maps through: the video element's
/// rectangle and the alignment guide's rectangle, both in display
/// coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub video: DisplayRect,
    pub guide: DisplayRect,
}

/// Provides the current viewport layout (display size may change with
/// layout; it is re-read per capture attempt).
pub trait ViewportSource: Send + Sync {
    fn viewport(&self) -> Viewport;
}

/// Result/notice display region.
pub trait TextDisplay: Send + Sync {
    fn show_message(&self, message: &str);
    /// Review state: raw OCR text is always shown alongside the correction.
    fn show_review(&self, raw_text: &str, corrected: &str);
    fn show_result(&self, title: &str, raw_text: &str, price: Option<f64>, results: &[String]);
    /// Errors always carry the raw OCR text when one exists, so the user can
    /// judge whether recognition or the backend was at fault.
    fn show_error(&self, message: &str, raw_text: Option<&str>);
    fn clear(&self);
    /// Debug copy of the normalized crop; never the recognition buffer itself.
    fn show_debug_image(&self, image: &CapturedImage);
}

/// Busy spinner.
pub trait BusyIndicator: Send + Sync {
    fn set_busy(&self, busy: bool);
}

/// The capture trigger control.
pub trait Trigger: Send + Sync {
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
}

/// Render a price the way the result region shows it: a numeric price is a
/// yen amount, an answered-but-empty price is the "no data" notice.
pub fn price_text(price: Option<f64>) -> String {
    match price {
        Some(p) => format!("約 {} 円", p.round() as i64),
        None => "データなし".to_string(),
    }
}

/// Console-backed surface for the interactive binary. Emulates a phone
/// layout: a 390x219 video element with a centered title-band guide.
pub struct ConsoleSurface {
    trigger_enabled: AtomicBool,
    debug_image_path: PathBuf,
}

impl ConsoleSurface {
    pub fn new() -> Self {
        Self {
            trigger_enabled: AtomicBool::new(true),
            debug_image_path: PathBuf::from("/tmp/bookworth_debug.png"),
        }
    }
}

impl Default for ConsoleSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewportSource for ConsoleSurface {
    fn viewport(&self) -> Viewport {
        let video = DisplayRect::new(0.0, 0.0, 390.0, 219.0);
        // Title band: centered, 80% of the width, a third of the height.
        let guide = DisplayRect::new(39.0, 73.0, 312.0, 73.0);
        Viewport { video, guide }
    }
}

impl TextDisplay for ConsoleSurface {
    fn show_message(&self, message: &str) {
        println!("{message}");
    }

    fn show_review(&self, raw_text: &str, corrected: &str) {
        println!("OCR結果: 「{raw_text}」");
        println!("補正タイトル: 「{corrected}」");
        println!("このタイトルで検索するには submit、修正するには submit <タイトル> を入力してください。");
    }

    fn show_result(&self, title: &str, raw_text: &str, price: Option<f64>, results: &[String]) {
        println!("「{title}」の相場: {}", price_text(price));
        println!("(OCR結果: {raw_text})");
        for line in results {
            println!("  - {line}");
        }
    }

    fn show_error(&self, message: &str, raw_text: Option<&str>) {
        match raw_text {
            Some(raw) => println!("エラー: {message} (OCR結果: {raw})"),
            None => println!("エラー: {message}"),
        }
    }

    fn clear(&self) {
        println!();
    }

    fn show_debug_image(&self, image: &CapturedImage) {
        match image.to_png_bytes() {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.debug_image_path, bytes) {
                    debug!(error = %e, "debug image write failed (best-effort)");
                } else {
                    debug!(path = %self.debug_image_path.display(), "debug_image_saved");
                }
            }
            Err(e) => debug!(error = %e, "debug image encode failed (best-effort)"),
        }
    }
}

impl BusyIndicator for ConsoleSurface {
    fn set_busy(&self, busy: bool) {
        if busy {
            println!("解析中...");
        }
    }
}

impl Trigger for ConsoleSurface {
    fn set_enabled(&self, enabled: bool) {
        self.trigger_enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.trigger_enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_price_renders_as_yen_amount() {
        assert_eq!(price_text(Some(1500.0)), "約 1500 円");
        assert_eq!(price_text(Some(1234.6)), "約 1235 円");
    }

    #[test]
    fn missing_price_renders_the_no_data_notice() {
        assert_eq!(price_text(None), "データなし");
    }

    #[test]
    fn console_guide_sits_inside_the_video_rect() {
        let vp = ConsoleSurface::new().viewport();
        assert!(vp.guide.left >= vp.video.left);
        assert!(vp.guide.top >= vp.video.top);
        assert!(vp.guide.left + vp.guide.width <= vp.video.left + vp.video.width);
        assert!(vp.guide.top + vp.guide.height <= vp.video.top + vp.video.height);
    }

    #[test]
    fn trigger_flag_round_trips() {
        let surface = ConsoleSurface::new();
        assert!(surface.is_enabled());
        surface.set_enabled(false);
        assert!(!surface.is_enabled());
        surface.set_enabled(true);
        assert!(surface.is_enabled());
    }
}
