use anyhow::{Context, Result};
use facewatch_core::{ArcFaceEncoder, EnrollmentStore, RecognitionEngine, ScrfdDetector};
use facewatch_hw::Camera;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod display;
mod session;

use display::OpenCvWindow;
use session::{Session, StoreRecognizer};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config::Config::from_env();
    tracing::info!(?config, "facewatch starting");

    let mut detector = ScrfdDetector::load(&config.scrfd_model_path()).context("failed to load SCRFD detector")?;
    let mut encoder = ArcFaceEncoder::load(&config.arcface_model_path()).context("failed to load ArcFace encoder")?;

    let store = EnrollmentStore::build(&config.faces_dir, &mut detector, &mut encoder)
        .with_context(|| format!("failed to enroll faces from {}", config.faces_dir.display()))?;

    let engine = RecognitionEngine::new(detector, encoder).with_tolerance(config.match_tolerance);

    for device in Camera::list_devices() {
        tracing::debug!(path = %device.path, name = %device.name, driver = %device.driver, "capture device");
    }

    let camera = match Camera::open(&config.camera_device) {
        Ok(camera) => camera,
        Err(e) => {
            tracing::error!(device = %config.camera_device, error = %e, "unable to open camera");
            return Err(e).with_context(|| format!("failed to open camera {}", config.camera_device));
        }
    };

    std::thread::sleep(Duration::from_millis(config.warmup_ms));

    let window = OpenCvWindow::create(&config.window_title).context("failed to create display window")?;
    let recognizer = StoreRecognizer::new(engine, &store);

    let summary = Session::new(camera, recognizer, window)
        .run()
        .context("recognition loop failed")?;

    tracing::info!(frames = summary.frames, reason = ?summary.stop_reason, "facewatch exiting");
    Ok(())
}
