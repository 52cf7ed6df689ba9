//! The render/display loop.
//!
//! Single-threaded and blocking: read a frame, recognize on every other
//! frame, smooth the boxes, draw, show, poll for quit.

use crate::display::DisplayError;
use facewatch_core::{
    EngineError, EnrollmentStore, FaceDetector, FaceEncoder, FaceRegion, FramePhase, LocationSmoother,
    RecognitionEngine, RecognizedFace,
};
use facewatch_hw::{Camera, CameraError, Frame};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("camera: {0}")]
    Camera(#[from] CameraError),
    #[error("end of stream")]
    EndOfStream,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("recognition failed: {0}")]
    Recognition(#[from] EngineError),
    #[error("display failed: {0}")]
    Display(#[from] DisplayError),
}

/// Blocking producer of frames.
pub trait FrameSource {
    fn read(&mut self) -> Result<Frame, SourceError>;
    fn release(&mut self);
}

impl FrameSource for Camera {
    fn read(&mut self) -> Result<Frame, SourceError> {
        Ok(self.read_frame()?)
    }

    fn release(&mut self) {
        Camera::release(self);
    }
}

/// Full recognition pass over one frame.
pub trait Recognizer {
    /// Faces with regions in detector space.
    fn recognize(&mut self, frame: &Frame) -> Result<Vec<RecognizedFace>, EngineError>;

    /// Multiplier from detector space to frame space.
    fn upscale_factor(&self) -> i32;
}

/// A [`RecognitionEngine`] bound to the enrollment store it matches against.
pub struct StoreRecognizer<'a, D, E> {
    engine: RecognitionEngine<D, E>,
    store: &'a EnrollmentStore,
}

impl<'a, D: FaceDetector, E: FaceEncoder> StoreRecognizer<'a, D, E> {
    pub fn new(engine: RecognitionEngine<D, E>, store: &'a EnrollmentStore) -> Self {
        Self { engine, store }
    }
}

impl<D: FaceDetector, E: FaceEncoder> Recognizer for StoreRecognizer<'_, D, E> {
    fn recognize(&mut self, frame: &Frame) -> Result<Vec<RecognizedFace>, EngineError> {
        self.engine.recognize(&frame.data, frame.width, frame.height, self.store)
    }

    fn upscale_factor(&self) -> i32 {
        self.engine.upscale_factor()
    }
}

/// Presents composed frames and reports the quit key.
pub trait Display {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<(), DisplayError>;
    fn quit_requested(&mut self) -> Result<bool, DisplayError>;
}

/// Face box in frame coordinates with its `name(confidence)` text.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledBox {
    pub region: FaceRegion,
    pub label: String,
}

/// Everything drawn on top of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub fps: f64,
    pub boxes: Vec<LabelledBox>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuitRequested,
    SourceEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames read and presented.
    pub frames: u64,
    pub recognition_passes: u64,
    pub stop_reason: StopReason,
}

/// Cumulative frame rate since the loop started; 0 before any time has passed.
fn frames_per_second(frames: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        frames as f64 / secs
    } else {
        0.0
    }
}

/// Owns all loop state: the source, recognizer, display and smoothed results.
pub struct Session<S, R, V> {
    source: S,
    recognizer: R,
    display: V,
    phase: FramePhase,
    smoother: LocationSmoother,
    labels: Vec<String>,
    frames: u64,
    recognition_passes: u64,
}

impl<S: FrameSource, R: Recognizer, V: Display> Session<S, R, V> {
    pub fn new(source: S, recognizer: R, display: V) -> Self {
        Self {
            source,
            recognizer,
            display,
            phase: FramePhase::default(),
            smoother: LocationSmoother::default(),
            labels: Vec::new(),
            frames: 0,
            recognition_passes: 0,
        }
    }

    /// Run until the quit key is pressed or the source fails.
    ///
    /// The source is released exactly once on every exit path.
    pub fn run(mut self) -> Result<RunSummary, SessionError> {
        let outcome = self.run_loop();
        self.source.release();

        let summary = outcome?;
        tracing::info!(
            frames = summary.frames,
            recognition_passes = summary.recognition_passes,
            reason = ?summary.stop_reason,
            "recognition loop finished"
        );
        Ok(summary)
    }

    fn run_loop(&mut self) -> Result<RunSummary, SessionError> {
        let started = Instant::now();

        let stop_reason = loop {
            let frame = match self.source.read() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, frame = self.frames + 1, "unable to capture frame, stopping");
                    break StopReason::SourceEnded;
                }
            };

            self.frames += 1;
            let fps = frames_per_second(self.frames, started.elapsed());

            let overlay = self.step(&frame, fps)?;
            self.display.present(&frame, &overlay)?;

            if self.display.quit_requested()? {
                break StopReason::QuitRequested;
            }
        };

        Ok(RunSummary {
            frames: self.frames,
            recognition_passes: self.recognition_passes,
            stop_reason,
        })
    }

    /// Advance the phase machine for one frame and build its overlay.
    fn step(&mut self, frame: &Frame, fps: f64) -> Result<Overlay, SessionError> {
        if self.phase == FramePhase::Recognize {
            let faces = self.recognizer.recognize(frame)?;
            self.recognition_passes += 1;

            let raw: Vec<FaceRegion> = faces.iter().map(|f| f.region).collect();
            self.smoother.update(&raw);
            self.labels = faces.iter().map(|f| f.result.display_label()).collect();

            tracing::debug!(frame = self.frames, faces = faces.len(), labels = ?self.labels, "recognized");
        }
        self.phase = self.phase.next();

        let factor = self.recognizer.upscale_factor();
        let boxes = self
            .smoother
            .regions()
            .iter()
            .zip(self.labels.iter())
            .map(|(region, label)| LabelledBox {
                region: region.scaled(factor),
                label: label.clone(),
            })
            .collect();

        Ok(Overlay { fps, boxes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facewatch_core::MatchResult;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn blank_frame(sequence: u32) -> Frame {
        Frame {
            data: vec![0; 4 * 4 * 3],
            width: 4,
            height: 4,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Yields `limit` frames, then fails. Counts releases.
    struct ScriptedSource {
        remaining: usize,
        released: Rc<RefCell<usize>>,
        sequence: u32,
    }

    impl ScriptedSource {
        fn new(limit: usize) -> (Self, Rc<RefCell<usize>>) {
            let released = Rc::new(RefCell::new(0));
            (
                Self {
                    remaining: limit,
                    released: released.clone(),
                    sequence: 0,
                },
                released,
            )
        }
    }

    impl FrameSource for ScriptedSource {
        fn read(&mut self) -> Result<Frame, SourceError> {
            if self.remaining == 0 {
                return Err(SourceError::EndOfStream);
            }
            self.remaining -= 1;
            self.sequence += 1;
            Ok(blank_frame(self.sequence))
        }

        fn release(&mut self) {
            *self.released.borrow_mut() += 1;
        }
    }

    /// Returns one scripted result per call and logs which frames it saw.
    struct ScriptedRecognizer {
        passes: Vec<Vec<RecognizedFace>>,
        seen: Rc<RefCell<Vec<u32>>>,
        fail: bool,
    }

    impl ScriptedRecognizer {
        fn new(passes: Vec<Vec<RecognizedFace>>) -> (Self, Rc<RefCell<Vec<u32>>>) {
            let seen = Rc::new(RefCell::new(Vec::new()));
            (
                Self {
                    passes,
                    seen: seen.clone(),
                    fail: false,
                },
                seen,
            )
        }
    }

    impl Recognizer for ScriptedRecognizer {
        fn recognize(&mut self, frame: &Frame) -> Result<Vec<RecognizedFace>, EngineError> {
            if self.fail {
                return Err(EngineError::EmptyEnrollment);
            }
            let index = self.seen.borrow().len();
            self.seen.borrow_mut().push(frame.sequence);
            Ok(self.passes.get(index).cloned().unwrap_or_default())
        }

        fn upscale_factor(&self) -> i32 {
            4
        }
    }

    /// Records every overlay; asks to quit after `quit_after` frames.
    struct RecordingDisplay {
        overlays: Rc<RefCell<Vec<Overlay>>>,
        quit_after: Option<usize>,
    }

    impl RecordingDisplay {
        fn new(quit_after: Option<usize>) -> (Self, Rc<RefCell<Vec<Overlay>>>) {
            let overlays = Rc::new(RefCell::new(Vec::new()));
            (
                Self {
                    overlays: overlays.clone(),
                    quit_after,
                },
                overlays,
            )
        }
    }

    impl Display for RecordingDisplay {
        fn present(&mut self, _frame: &Frame, overlay: &Overlay) -> Result<(), DisplayError> {
            self.overlays.borrow_mut().push(overlay.clone());
            Ok(())
        }

        fn quit_requested(&mut self) -> Result<bool, DisplayError> {
            Ok(self.quit_after == Some(self.overlays.borrow().len()))
        }
    }

    fn face(region: FaceRegion, name: &str) -> RecognizedFace {
        RecognizedFace {
            region,
            result: MatchResult {
                label: Some(name.to_string()),
                confidence: Some("99.3%".to_string()),
            },
        }
    }

    #[test]
    fn test_recognition_runs_on_odd_frames_only() {
        for n in 1..=7usize {
            let (source, _) = ScriptedSource::new(n);
            let (recognizer, seen) = ScriptedRecognizer::new(Vec::new());
            let (display, _) = RecordingDisplay::new(None);

            let summary = Session::new(source, recognizer, display).run().unwrap();

            assert_eq!(summary.frames, n as u64);
            assert_eq!(summary.recognition_passes, n.div_ceil(2) as u64);
            let expected: Vec<u32> = (1..=n as u32).step_by(2).collect();
            assert_eq!(*seen.borrow(), expected, "n = {n}");
        }
    }

    #[test]
    fn test_read_failure_stops_after_previous_frame_and_releases_once() {
        // Read fails on iteration 4.
        let (source, released) = ScriptedSource::new(3);
        let (recognizer, _) = ScriptedRecognizer::new(Vec::new());
        let (display, overlays) = RecordingDisplay::new(None);

        let summary = Session::new(source, recognizer, display).run().unwrap();

        assert_eq!(summary.stop_reason, StopReason::SourceEnded);
        assert_eq!(overlays.borrow().len(), 3);
        assert_eq!(*released.borrow(), 1);
    }

    #[test]
    fn test_quit_key_stops_and_releases_once() {
        let (source, released) = ScriptedSource::new(100);
        let (recognizer, _) = ScriptedRecognizer::new(Vec::new());
        let (display, overlays) = RecordingDisplay::new(Some(5));

        let summary = Session::new(source, recognizer, display).run().unwrap();

        assert_eq!(summary.stop_reason, StopReason::QuitRequested);
        assert_eq!(summary.frames, 5);
        assert_eq!(overlays.borrow().len(), 5);
        assert_eq!(*released.borrow(), 1);
    }

    #[test]
    fn test_recognition_error_still_releases_source() {
        let (source, released) = ScriptedSource::new(10);
        let (mut recognizer, _) = ScriptedRecognizer::new(Vec::new());
        recognizer.fail = true;
        let (display, overlays) = RecordingDisplay::new(None);

        let err = Session::new(source, recognizer, display).run().unwrap_err();

        assert!(matches!(err, SessionError::Recognition(EngineError::EmptyEnrollment)));
        assert!(overlays.borrow().is_empty());
        assert_eq!(*released.borrow(), 1);
    }

    #[test]
    fn test_reuse_frames_repeat_previous_overlay() {
        let (source, _) = ScriptedSource::new(2);
        let (recognizer, _) = ScriptedRecognizer::new(vec![vec![face(FaceRegion::new(10, 20, 30, 5), "alice.jpg")]]);
        let (display, overlays) = RecordingDisplay::new(None);

        Session::new(source, recognizer, display).run().unwrap();

        let overlays = overlays.borrow();
        assert_eq!(overlays[0].boxes, overlays[1].boxes);
        assert_eq!(overlays[0].boxes.len(), 1);
    }

    #[test]
    fn test_boxes_are_smoothed_and_rescaled() {
        let (source, _) = ScriptedSource::new(3);
        let (recognizer, _) = ScriptedRecognizer::new(vec![
            vec![face(FaceRegion::new(0, 0, 0, 0), "alice.jpg")],
            vec![face(FaceRegion::new(10, 10, 10, 10), "alice.jpg")],
        ]);
        let (display, overlays) = RecordingDisplay::new(None);

        Session::new(source, recognizer, display).run().unwrap();

        let overlays = overlays.borrow();
        assert_eq!(overlays[0].boxes[0].region, FaceRegion::new(0, 0, 0, 0));
        // Frame 3: smoothed (2, 2, 2, 2) in detector space, x4 for display.
        assert_eq!(overlays[2].boxes[0].region, FaceRegion::new(8, 8, 8, 8));
        assert_eq!(overlays[2].boxes[0].label, "alice.jpg(99.3%)");
    }

    #[test]
    fn test_faces_disappearing_clears_boxes() {
        let (source, _) = ScriptedSource::new(3);
        let (recognizer, _) = ScriptedRecognizer::new(vec![
            vec![face(FaceRegion::new(1, 2, 3, 4), "alice.jpg")],
            Vec::new(),
        ]);
        let (display, overlays) = RecordingDisplay::new(None);

        Session::new(source, recognizer, display).run().unwrap();

        assert!(overlays.borrow()[2].boxes.is_empty());
    }

    #[test]
    fn test_fps_is_frames_over_elapsed_time() {
        assert_eq!(frames_per_second(30, Duration::from_secs(2)), 15.0);
        assert_eq!(frames_per_second(1, Duration::from_millis(250)), 4.0);
        assert_eq!(frames_per_second(45, Duration::from_millis(1500)), 30.0);
    }

    #[test]
    fn test_fps_before_any_elapsed_time_is_zero() {
        assert_eq!(frames_per_second(1, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_fps_is_non_negative_and_finite() {
        let (source, _) = ScriptedSource::new(4);
        let (recognizer, _) = ScriptedRecognizer::new(Vec::new());
        let (display, overlays) = RecordingDisplay::new(None);

        Session::new(source, recognizer, display).run().unwrap();

        assert!(overlays.borrow().iter().all(|o| o.fps.is_finite() && o.fps >= 0.0));
    }
}
