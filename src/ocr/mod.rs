//! Recognition adapter: one engine session per call, released
//! unconditionally, raw text post-processed before anything downstream
//! sees it. An all-whitespace engine output is a meaningful "no text"
//! result, not a failure.

pub mod tesseract;

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::frame::CapturedImage;

/// The engine's output for a single captured image, whitespace already
/// stripped. An empty `raw_text` means "nothing recognized".
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionResult {
    pub raw_text: String,
}

impl RecognitionResult {
    pub fn is_empty(&self) -> bool {
        self.raw_text.is_empty()
    }
}

#[derive(Debug)]
pub enum OcrError {
    /// The engine could not be acquired (binary missing, session setup failed).
    EngineUnavailable(String),
    /// The run itself errored.
    RecognitionFailed(String),
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::EngineUnavailable(msg) => write!(f, "OCR engine unavailable: {msg}"),
            OcrError::RecognitionFailed(msg) => write!(f, "recognition failed: {msg}"),
        }
    }
}

/// Recognition engine boundary. Implementations return the engine's raw
/// best-effort text; cleaning happens in [`recognize`].
pub trait OcrEngine: Send + Sync {
    fn recognize_raw(&self, image: &CapturedImage, languages: &[String]) -> Result<String, OcrError>;
    fn is_available(&self) -> bool;
}

/// Run one recognition session and post-process its output. The returned
/// result may be empty — the caller decides what "no text" means.
pub fn recognize(
    engine: &dyn OcrEngine,
    image: &CapturedImage,
    languages: &[String],
) -> Result<RecognitionResult, OcrError> {
    let raw = engine.recognize_raw(image, languages)?;
    Ok(RecognitionResult { raw_text: strip_whitespace(&raw) })
}

/// Strip all whitespace and line breaks from engine output. Printed spines
/// and covers break titles across lines; the backend expects one token run.
pub fn strip_whitespace(text: &str) -> String {
    // Unicode-aware: also collapses full-width spaces common in jpn output.
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
    re.replace_all(text, "").into_owned()
}
