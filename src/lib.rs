//! Bookworth: point a camera at a printed book title, crop the aligned
//! region, recognize the title, and ask the valuation backend what the book
//! resells for. Main library: configuration, wiring, interactive session.

pub mod camera;
pub mod controller;
pub mod frame;
pub mod gateway;
pub mod geometry;
pub mod metrics;
pub mod ocr;
pub mod state_machine;
pub mod surface;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tracing::{error, info, warn};

use camera::{DeviceCamera, StillSource, VideoFrameSource};
use controller::WorkflowController;
use gateway::cache::CachedGateway;
use gateway::client::HttpGateway;
use metrics::MetricsRegistry;
use ocr::tesseract::TesseractEngine;
use ocr::OcrEngine;
use state_machine::StateMachine;
use surface::{ConsoleSurface, Trigger};

/// Session configuration, read from the environment at startup.
struct Config {
    camera_device: String,
    /// When set, a still image stands in for the live camera.
    image_path: Option<PathBuf>,
    languages: Vec<String>,
    single_step: bool,
}

impl Config {
    fn from_env() -> Self {
        let languages = std::env::var("BOOKWORTH_OCR_LANGS")
            .unwrap_or_else(|_| "jpn+eng".into())
            .split('+')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            camera_device: std::env::var("BOOKWORTH_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".into()),
            image_path: std::env::var("BOOKWORTH_IMAGE").ok().map(PathBuf::from),
            languages,
            single_step: std::env::var("BOOKWORTH_SINGLE_STEP")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

/// Build and run the interactive session.
pub async fn run() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookworth=debug".parse().unwrap()),
        )
        .with_target(true)
        .init();

    info!("bookworth starting");
    let config = Config::from_env();

    let source: Arc<dyn VideoFrameSource> = match &config.image_path {
        Some(path) => match StillSource::open(path) {
            Ok(source) => Arc::new(source),
            Err(e) => {
                error!(error = %e, "still source init failed");
                return;
            }
        },
        None => match DeviceCamera::open(&config.camera_device) {
            Ok(camera) => Arc::new(camera),
            Err(e) => {
                error!(error = %e, "camera init failed (set BOOKWORTH_IMAGE to use a still image)");
                return;
            }
        },
    };

    let engine = Arc::new(TesseractEngine::new());
    if !engine.is_available() {
        warn!("recognition engine unavailable — checks will fail until tesseract is installed");
    }

    let gateway = match HttpGateway::new(None) {
        Ok(client) => CachedGateway::new(client, 256, Duration::from_secs(600)),
        Err(e) => {
            error!(error = %e, "gateway init failed");
            return;
        }
    };

    let surface = Arc::new(ConsoleSurface::new());
    let metrics = Arc::new(MetricsRegistry::new());
    let state = Arc::new(StateMachine::new());

    let controller = WorkflowController::new(
        Arc::clone(&state),
        source,
        engine,
        gateway,
        Arc::clone(&surface) as Arc<dyn surface::ViewportSource>,
        Arc::clone(&surface) as Arc<dyn surface::TextDisplay>,
        Arc::clone(&surface) as Arc<dyn surface::BusyIndicator>,
        Arc::clone(&surface) as Arc<dyn surface::Trigger>,
        Arc::clone(&metrics),
        config.languages,
        config.single_step,
    );

    info!(single_step = config.single_step, "bookworth setup complete");
    session_loop(controller, surface, metrics).await;
}

/// The user-facing triggers: one command per line on stdin.
async fn session_loop<G: gateway::TitleGateway>(
    controller: WorkflowController<G>,
    surface: Arc<ConsoleSurface>,
    metrics: Arc<MetricsRegistry>,
) {
    println!("コマンド: check / submit [タイトル] / reset / state / metrics / quit");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "stdin read failed");
                break;
            }
        };

        let (command, rest) = match line.trim().split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, Some(rest.trim())),
            None => (line.trim(), None),
        };

        match command {
            "" => {}
            "check" => {
                // One sequence at a time: the trigger stays disabled for the
                // whole of Loading.
                if !surface.is_enabled() {
                    println!("解析中です。しばらくお待ちください。");
                    continue;
                }
                controller.check().await;
            }
            "submit" => {
                controller.submit(rest.filter(|s| !s.is_empty())).await;
            }
            "reset" => {
                controller.reset();
            }
            "state" => {
                println!("{}", controller.current_state());
            }
            "metrics" => match serde_json::to_string_pretty(&metrics.summary()) {
                Ok(json) => println!("{json}"),
                Err(e) => error!(error = %e, "metrics summary failed"),
            },
            "quit" | "exit" => break,
            other => println!("不明なコマンド: {other}"),
        }
    }

    info!("bookworth session ended");
}
