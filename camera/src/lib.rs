//! Frame sources for the diagnosis demo.
//!
//! Frames are captured as JPEG bytes, either from a Video4Linux device (feature `v4l`) or from a
//! directory of images replayed in a loop, and decoded into RGB images for classification.
pub mod frame;
pub mod replay;
pub mod sensors;

pub use common::Error;
pub use frame::decode_jpeg;
pub use sensors::{open_source, CameraConfig, CaptureFn, FrameSource};
