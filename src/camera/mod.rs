//! Video frame acquisition boundary. The pipeline only needs a live raster
//! surface with a fixed native resolution; how frames are produced is a
//! platform concern. Startup capability detection: probes for an available
//! grabber tool once and reports unavailability instead of failing later.

use std::path::PathBuf;
use std::process::Command;

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::geometry::Size;

/// A live frame source with a fixed native resolution for the lifetime of a
/// capture session.
pub trait VideoFrameSource: Send + Sync {
    fn native_resolution(&self) -> Size;
    /// Grab the current frame at native resolution. Blocking.
    fn grab_frame(&self) -> Result<RgbaImage, CameraError>;
}

#[derive(Debug)]
pub enum CameraError {
    /// No grabber tool found, no device, or the source cannot start.
    Unavailable(String),
    GrabFailed(String),
    DecodeFailed(String),
}

impl std::fmt::Display for CameraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraError::Unavailable(msg) => write!(f, "camera unavailable: {msg}"),
            CameraError::GrabFailed(msg) => write!(f, "frame grab failed: {msg}"),
            CameraError::DecodeFailed(msg) => write!(f, "frame decode failed: {msg}"),
        }
    }
}

/// Frame grabber backend.
#[derive(Debug, Clone, Copy)]
pub enum GrabberBackend {
    Fswebcam,
    Ffmpeg,
}

/// Detect an available frame grabber tool.
pub fn detect_backend() -> Option<GrabberBackend> {
    for (name, backend) in [
        ("fswebcam", GrabberBackend::Fswebcam),
        ("ffmpeg", GrabberBackend::Ffmpeg),
    ] {
        if probe_command(name) {
            info!(backend = name, "frame grabber detected");
            return Some(backend);
        }
    }
    warn!("no frame grabber found (need fswebcam or ffmpeg)");
    None
}

/// V4L2 device camera backed by a subprocess grabber. The native resolution
/// is learned from a probe frame at open time and is constant afterwards.
pub struct DeviceCamera {
    backend: GrabberBackend,
    device: String,
    native: Size,
}

impl DeviceCamera {
    /// Open the device, probing tool availability and native resolution.
    pub fn open(device: &str) -> Result<Self, CameraError> {
        let backend = detect_backend().ok_or_else(|| {
            CameraError::Unavailable("no frame grabber tool on PATH (fswebcam or ffmpeg)".into())
        })?;

        let probe = grab_to_image(backend, device)?;
        let native = Size::new(probe.width(), probe.height());
        info!(device, native_w = native.w, native_h = native.h, "device camera opened");

        Ok(Self { backend, device: device.to_string(), native })
    }
}

impl VideoFrameSource for DeviceCamera {
    fn native_resolution(&self) -> Size {
        self.native
    }

    fn grab_frame(&self) -> Result<RgbaImage, CameraError> {
        grab_to_image(self.backend, &self.device)
    }
}

/// Grab one frame from the device into a temp PNG and decode it.
fn grab_to_image(backend: GrabberBackend, device: &str) -> Result<RgbaImage, CameraError> {
    let tmp_path = PathBuf::from(format!("/tmp/bookworth_frame_{}.png", uuid::Uuid::new_v4()));
    let _guard = TempFileGuard { path: tmp_path.clone() };

    let result = match backend {
        GrabberBackend::Fswebcam => Command::new("fswebcam")
            .args(["-d", device, "--no-banner", "--png", "9"])
            .arg(&tmp_path)
            .output(),
        GrabberBackend::Ffmpeg => Command::new("ffmpeg")
            .args(["-y", "-f", "v4l2", "-i", device, "-frames:v", "1"])
            .arg(&tmp_path)
            .output(),
    };

    let output = result
        .map_err(|e| CameraError::GrabFailed(format!("failed to run grabber: {e}")))?;
    if !output.status.success() {
        return Err(CameraError::GrabFailed(format!(
            "grabber exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let bytes = std::fs::read(&tmp_path)
        .map_err(|e| CameraError::GrabFailed(format!("failed to read grabbed frame: {e}")))?;

    let frame = image::load_from_memory(&bytes)
        .map_err(|e| CameraError::DecodeFailed(e.to_string()))?
        .to_rgba8();

    debug!(w = frame.width(), h = frame.height(), "frame_grabbed");
    Ok(frame)
}

/// Still-image source: a single file stands in for the live stream. Useful
/// without camera hardware; every grab returns the same frame.
#[derive(Debug)]
pub struct StillSource {
    frame: RgbaImage,
    native: Size,
}

impl StillSource {
    pub fn open(path: &std::path::Path) -> Result<Self, CameraError> {
        let frame = image::open(path)
            .map_err(|e| CameraError::Unavailable(format!("cannot open {}: {e}", path.display())))?
            .to_rgba8();
        let native = Size::new(frame.width(), frame.height());
        info!(path = %path.display(), native_w = native.w, native_h = native.h, "still source opened");
        Ok(Self { frame, native })
    }

    pub fn from_image(frame: RgbaImage) -> Self {
        let native = Size::new(frame.width(), frame.height());
        Self { frame, native }
    }
}

impl VideoFrameSource for StillSource {
    fn native_resolution(&self) -> Size {
        self.native
    }

    fn grab_frame(&self) -> Result<RgbaImage, CameraError> {
        Ok(self.frame.clone())
    }
}

/// RAII cleanup for grabbed temp frames (best-effort).
struct TempFileGuard {
    path: PathBuf,
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if self.path.exists() {
                debug!(error = %e, "temp frame cleanup failed (best-effort)");
            }
        }
    }
}

fn probe_command(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn still_source_reports_native_resolution_and_stable_frames() {
        let img = RgbaImage::from_pixel(64, 48, Rgba([1, 2, 3, 255]));
        let source = StillSource::from_image(img);
        assert_eq!(source.native_resolution(), Size::new(64, 48));
        let a = source.grab_frame().unwrap();
        let b = source.grab_frame().unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn still_source_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let img = RgbaImage::from_fn(10, 6, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        img.save(&path).unwrap();

        let source = StillSource::open(&path).unwrap();
        assert_eq!(source.native_resolution(), Size::new(10, 6));
        assert_eq!(source.grab_frame().unwrap().get_pixel(3, 2).0, [3, 2, 0, 255]);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = StillSource::open(std::path::Path::new("/nonexistent/frame.png")).unwrap_err();
        assert!(matches!(err, CameraError::Unavailable(_)));
    }
}
