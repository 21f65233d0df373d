//! Workflow controller: drives one check sequence at a time through
//! capture → normalize → recognize → correct → (review) → search, owning
//! every state transition and recovery path. The trigger stays disabled for
//! the whole of Loading and is restored on every exit, success or not.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::camera::VideoFrameSource;
use crate::frame;
use crate::gateway::{GatewayError, PriceQuote, TitleGateway};
use crate::geometry;
use crate::metrics::{MetricsRegistry, Stage};
use crate::ocr::{self, OcrEngine, OcrError};
use crate::state_machine::{StateMachine, WorkflowState};
use crate::surface::{BusyIndicator, TextDisplay, Trigger, ViewportSource};

/// Everything that can go wrong in a check sequence, mapped to the state the
/// user recovers in.
#[derive(Debug)]
pub enum PipelineError {
    /// Camera or geometry cannot produce a usable crop region.
    CaptureUnavailable(String),
    /// The engine ran but produced no usable text. Recoverable, not fatal.
    EmptyRecognition,
    /// The recognition engine could not be acquired or threw.
    EngineFailure(String),
    /// Network or backend error, with a human-readable reason.
    GatewayFailure(String),
    /// The user submitted empty text in review.
    ValidationFailure,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::CaptureUnavailable(msg) => write!(f, "capture unavailable: {msg}"),
            PipelineError::EmptyRecognition => write!(f, "no text recognized"),
            PipelineError::EngineFailure(msg) => write!(f, "recognition engine failure: {msg}"),
            PipelineError::GatewayFailure(reason) => write!(f, "price lookup failed: {reason}"),
            PipelineError::ValidationFailure => write!(f, "title must not be empty"),
        }
    }
}

impl From<GatewayError> for PipelineError {
    fn from(e: GatewayError) -> Self {
        PipelineError::GatewayFailure(e.to_string())
    }
}

impl From<OcrError> for PipelineError {
    fn from(e: OcrError) -> Self {
        PipelineError::EngineFailure(e.to_string())
    }
}

/// Text carried between the check sequence and the review submission. The
/// raw OCR text is never discarded; it is shown alongside everything.
struct ReviewContext {
    raw_text: String,
    corrected: String,
}

pub struct WorkflowController<G> {
    state: Arc<StateMachine>,
    source: Arc<dyn VideoFrameSource>,
    engine: Arc<dyn OcrEngine>,
    gateway: G,
    viewport: Arc<dyn ViewportSource>,
    display: Arc<dyn TextDisplay>,
    busy: Arc<dyn BusyIndicator>,
    trigger: Arc<dyn Trigger>,
    metrics: Arc<MetricsRegistry>,
    languages: Vec<String>,
    /// Collapse correct + search into one call and land on Result directly.
    single_step: bool,
    review: Mutex<Option<ReviewContext>>,
}

impl<G: TitleGateway> WorkflowController<G> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<StateMachine>,
        source: Arc<dyn VideoFrameSource>,
        engine: Arc<dyn OcrEngine>,
        gateway: G,
        viewport: Arc<dyn ViewportSource>,
        display: Arc<dyn TextDisplay>,
        busy: Arc<dyn BusyIndicator>,
        trigger: Arc<dyn Trigger>,
        metrics: Arc<MetricsRegistry>,
        languages: Vec<String>,
        single_step: bool,
    ) -> Self {
        Self {
            state,
            source,
            engine,
            gateway,
            viewport,
            display,
            busy,
            trigger,
            metrics,
            languages,
            single_step,
            review: Mutex::new(None),
        }
    }

    pub fn current_state(&self) -> WorkflowState {
        self.state.current()
    }

    /// The user requested a check. Runs the whole capture-to-query sequence
    /// and returns the state the controller lands in.
    pub async fn check(&self) -> WorkflowState {
        // Review -> Loading is a valid edge too (the price search), so the
        // transition alone cannot gate this entry point.
        if self.state.current() != WorkflowState::Camera
            || self.state.transition(WorkflowState::Loading).is_err()
        {
            warn!(state = %self.state.current(), "check ignored outside Camera");
            return self.state.current();
        }

        let request_id = Uuid::new_v4().to_string();
        info!(request_id = %request_id, "check_started");

        let _guard = BusyGuard::engage(&self.trigger, &self.busy);
        let total = self.metrics.span(Stage::CheckTotal);

        let recognition = self.capture_and_recognize().await;
        let raw_text = match recognition {
            Ok(text) if text.is_empty() => {
                // Recoverable notice. Never touches a previously shown
                // Result and never advances past Camera.
                info!(request_id = %request_id, "empty_recognition");
                self.display
                    .show_message("文字を認識できませんでした。ガイド枠に合わせてもう一度お試しください。");
                let _ = self.state.transition(WorkflowState::Camera);
                total.finish();
                return self.state.current();
            }
            Ok(text) => text,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "check_failed_before_gateway");
                self.display.show_error(&e.to_string(), None);
                let _ = self.state.transition(WorkflowState::Camera);
                total.finish();
                return self.state.current();
            }
        };

        info!(request_id = %request_id, chars = raw_text.chars().count(), "ocr_text_ready");

        if self.single_step {
            let span = self.metrics.span(Stage::Search);
            match self.gateway.lookup(&raw_text).await {
                Ok(quote) => {
                    span.finish();
                    self.finish_with_result(&raw_text, quote);
                }
                Err(e) => {
                    span.finish();
                    self.fail_to_camera(&request_id, e, &raw_text);
                }
            }
        } else {
            let span = self.metrics.span(Stage::Correction);
            match self.gateway.correct_title(&raw_text).await {
                Ok(quote) => {
                    span.finish();
                    let corrected = quote
                        .corrected_title
                        .unwrap_or_else(|| raw_text.clone());
                    let _ = self.state.transition(WorkflowState::Review);
                    self.display.show_review(&raw_text, &corrected);
                    *self.review.lock() = Some(ReviewContext { raw_text, corrected });
                }
                Err(e) => {
                    span.finish();
                    self.fail_to_camera(&request_id, e, &raw_text);
                }
            }
        }

        total.finish();
        self.state.current()
    }

    /// The user confirmed (or edited) the title in review. Runs the price
    /// search; a failed search returns to Review so edits are not lost.
    pub async fn submit(&self, edited: Option<&str>) -> WorkflowState {
        if self.state.current() != WorkflowState::Review {
            warn!(state = %self.state.current(), "submit ignored outside Review");
            return self.state.current();
        }

        let (raw_text, stored) = {
            let review = self.review.lock();
            match review.as_ref() {
                Some(ctx) => (ctx.raw_text.clone(), ctx.corrected.clone()),
                None => (String::new(), String::new()),
            }
        };

        let final_title = edited.map(str::trim).unwrap_or(&stored).to_string();
        if final_title.is_empty() {
            self.display
                .show_error(&PipelineError::ValidationFailure.to_string(), Some(&raw_text));
            return self.state.current();
        }

        if self.state.transition(WorkflowState::Loading).is_err() {
            return self.state.current();
        }
        let _guard = BusyGuard::engage(&self.trigger, &self.busy);

        // Keep the user's edit around so a failed search shows it again.
        *self.review.lock() = Some(ReviewContext {
            raw_text: raw_text.clone(),
            corrected: final_title.clone(),
        });

        let span = self.metrics.span(Stage::Search);
        match self.gateway.search_price(&final_title).await {
            Ok(quote) => {
                span.finish();
                let _ = self.state.transition(WorkflowState::Result);
                let title = quote
                    .corrected_title
                    .clone()
                    .unwrap_or_else(|| final_title.clone());
                self.display
                    .show_result(&title, &raw_text, quote.price, &quote.search_results);
            }
            Err(e) => {
                span.finish();
                let error = PipelineError::from(e);
                warn!(error = %error, "search_failed");
                self.display.show_error(&error.to_string(), Some(&raw_text));
                let _ = self.state.transition(WorkflowState::Review);
                self.display.show_review(&raw_text, &final_title);
            }
        }

        self.state.current()
    }

    /// Clear the displayed result and return to the viewfinder.
    pub fn reset(&self) -> WorkflowState {
        match self.state.transition(WorkflowState::Camera) {
            Ok(_) => {
                *self.review.lock() = None;
                self.display.clear();
            }
            Err(_) => {
                warn!(state = %self.state.current(), "reset ignored");
            }
        }
        self.state.current()
    }

    /// Synchronous pixel pipeline plus the two blocking collaborators
    /// (frame grab, engine run), each hopped onto the blocking pool.
    async fn capture_and_recognize(&self) -> Result<String, PipelineError> {
        let capture_span = self.metrics.span(Stage::Capture);

        let source = Arc::clone(&self.source);
        let native_frame = tokio::task::spawn_blocking(move || source.grab_frame())
            .await
            .map_err(|e| PipelineError::CaptureUnavailable(format!("capture task: {e}")))?
            .map_err(|e| PipelineError::CaptureUnavailable(e.to_string()))?;

        let vp = self.viewport.viewport();
        let native = self.source.native_resolution();
        let crop = geometry::compute_crop_region(native, vp.guide, vp.video)
            .map_err(|e| PipelineError::CaptureUnavailable(e.to_string()))?;
        if crop.is_zero_area() {
            return Err(PipelineError::CaptureUnavailable(
                "alignment guide maps to an empty region".into(),
            ));
        }

        let mut image = frame::capture(&native_frame, &crop);
        frame::to_grayscale(&mut image);
        // Debug copy taken after normalization; it must never alias the
        // buffer recognition consumes.
        self.display.show_debug_image(&image.debug_copy());
        capture_span.finish();

        let ocr_span = self.metrics.span(Stage::Recognition);
        let engine = Arc::clone(&self.engine);
        let languages = self.languages.clone();
        let result = tokio::task::spawn_blocking(move || {
            ocr::recognize(engine.as_ref(), &image, &languages)
        })
        .await
        .map_err(|e| PipelineError::EngineFailure(format!("recognition task: {e}")))??;
        ocr_span.finish();

        Ok(result.raw_text)
    }

    fn finish_with_result(&self, raw_text: &str, quote: PriceQuote) {
        let _ = self.state.transition(WorkflowState::Result);
        let title = quote
            .corrected_title
            .clone()
            .unwrap_or_else(|| raw_text.to_string());
        self.display
            .show_result(&title, raw_text, quote.price, &quote.search_results);
    }

    fn fail_to_camera(&self, request_id: &str, e: GatewayError, raw_text: &str) {
        let error = PipelineError::from(e);
        warn!(request_id = %request_id, error = %error, "gateway_failed");
        self.display.show_error(&error.to_string(), Some(raw_text));
        let _ = self.state.transition(WorkflowState::Camera);
    }
}

/// Disables the trigger and shows the busy indicator for one Loading span;
/// drop restores both on every exit path.
struct BusyGuard {
    trigger: Arc<dyn Trigger>,
    busy: Arc<dyn BusyIndicator>,
}

impl BusyGuard {
    fn engage(trigger: &Arc<dyn Trigger>, busy: &Arc<dyn BusyIndicator>) -> Self {
        trigger.set_enabled(false);
        busy.set_busy(true);
        Self {
            trigger: Arc::clone(trigger),
            busy: Arc::clone(busy),
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.set_busy(false);
        self.trigger.set_enabled(true);
    }
}
