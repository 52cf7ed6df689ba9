//! facewatch-hw: webcam capture for the recognition loop.
//!
//! Provides V4L2-based camera access producing packed BGR frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
