//! facelog-hw — Webcam capture for the attendance loop.
//!
//! Opens a V4L2 device, negotiates a grayscale-friendly format and hands out
//! grayscale frames from a memory-mapped stream.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameSource, FrameStream, PixelFormat};
pub use frame::{Frame, FrameError};
