//! Tesseract engine adapter. Each recognition is a fresh session: the image
//! is written to a unique temp PNG, `tesseract` runs once against it, and
//! the file is removed on every exit path via an RAII guard. Binary
//! availability is probed once at construction.

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, info, warn};

use crate::frame::CapturedImage;

use super::{OcrEngine, OcrError};

pub struct TesseractEngine {
    available: bool,
    /// Page segmentation mode. 6 ("assume a single uniform block of text")
    /// suits a cropped title band.
    psm: u32,
}

impl TesseractEngine {
    pub fn new() -> Self {
        let available = probe_tesseract();
        if available {
            info!("tesseract binary found");
        } else {
            warn!("tesseract not found on PATH — recognition will be unavailable");
        }
        Self { available, psm: 6 }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize_raw(&self, image: &CapturedImage, languages: &[String]) -> Result<String, OcrError> {
        if !self.available {
            return Err(OcrError::EngineUnavailable("tesseract not on PATH".into()));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(OcrError::RecognitionFailed("empty image buffer".into()));
        }

        let png = image
            .to_png_bytes()
            .map_err(OcrError::RecognitionFailed)?;

        let tmp_path = PathBuf::from(format!("/tmp/bookworth_ocr_{}.png", uuid::Uuid::new_v4()));
        // Guard installed before the write so a failed run still cleans up.
        let _guard = SessionGuard { path: tmp_path.clone() };

        std::fs::write(&tmp_path, &png)
            .map_err(|e| OcrError::RecognitionFailed(format!("temp image write: {e}")))?;

        let lang_arg = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        let output = Command::new("tesseract")
            .arg(&tmp_path)
            .arg("stdout")
            .args(["-l", &lang_arg])
            .args(["--psm", &self.psm.to_string()])
            .output()
            .map_err(|e| OcrError::RecognitionFailed(format!("failed to run tesseract: {e}")))?;

        if !output.status.success() {
            return Err(OcrError::RecognitionFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(lang = %lang_arg, chars = text.chars().count(), "ocr_session_complete");
        Ok(text)
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Removes the session's temp image when the recognition scope ends,
/// regardless of outcome.
struct SessionGuard {
    path: PathBuf,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn probe_tesseract() -> bool {
    Command::new("tesseract")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
