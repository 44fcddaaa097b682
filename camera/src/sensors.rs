//! Sensors module.
//!
use std::path::PathBuf;

use bytes::Bytes;
#[cfg(feature = "v4l")]
use rscam::{Camera, Config};
use simple_error::simple_error;

use crate::{replay::get_replay_capture_fn, Error};

/// Capture one JPEG frame, `None` if the source missed a frame.
pub type CaptureFn = Box<dyn Fn() -> Option<Bytes> + Send + Sync>;

/// Where frames come from and how they are oriented.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Video device, e.g. `/dev/video0`.
    pub device: String,
    /// Replay the JPEG images of this directory instead of opening `device`.
    pub replay_dir: Option<PathBuf>,
    /// Requested resolution, the maximum supported one if `None`.
    pub resolution: Option<(u32, u32)>,
    /// Mirror frames horizontally, for front cameras.
    pub flip: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".into(),
            replay_dir: None,
            resolution: None,
            flip: true,
        }
    }
}

/// Initialized frame source.
pub struct FrameSource {
    capture_fn: CaptureFn,
    flip: bool,
}

impl FrameSource {
    /// Create a new instance.
    pub fn new(capture_fn: CaptureFn, flip: bool) -> FrameSource {
        FrameSource { capture_fn, flip }
    }

    /// Capture a JPEG frame.
    pub fn capture(&self) -> Option<Bytes> {
        (*self.capture_fn)()
    }

    /// Whether decoded frames should be mirrored.
    pub fn flip(&self) -> bool {
        self.flip
    }
}

/// Open the frame source described by `config`.
pub fn open_source(config: &CameraConfig) -> Result<FrameSource, Error> {
    let capture_fn = match &config.replay_dir {
        Some(dir) => get_replay_capture_fn(dir)?,
        None => open_device(config)?,
    };

    Ok(FrameSource::new(capture_fn, config.flip))
}

#[cfg(feature = "v4l")]
fn open_device(config: &CameraConfig) -> Result<CaptureFn, Error> {
    get_capture_fn_linux(&config.device, "MJPG", config.resolution, None)
}

#[cfg(not(feature = "v4l"))]
fn open_device(config: &CameraConfig) -> Result<CaptureFn, Error> {
    Err(simple_error!(
        "Cannot open {}: built without the `v4l` feature, use a replay directory instead",
        config.device
    )
    .into())
}

/// Get a capture function to a video device on a Linux machine.
#[cfg(feature = "v4l")]
pub fn get_capture_fn_linux(
    device_name: &str,
    format: &str,
    resolution: Option<(u32, u32)>,
    frame_rate: Option<(u32, u32)>,
) -> Result<CaptureFn, Error> {
    let mut cam = Camera::new(device_name)?;
    log_supported_formats(&cam, format);
    let format = format.as_bytes();

    log::info!("Using camera {}", device_name);

    let resolution = resolution
        .map(Ok)
        .unwrap_or_else(|| get_max_resolution(&cam, format))?;

    let frame_rate = frame_rate
        .map(Ok)
        .unwrap_or_else(|| get_max_frame_rate(&cam, format, resolution))?;

    log::info!(
        "Capturing {}x{} at {}/{} s per frame",
        resolution.0,
        resolution.1,
        frame_rate.0,
        frame_rate.1
    );

    cam.start(&Config {
        interval: frame_rate,
        resolution,
        format,
        ..Default::default()
    })?;

    let callback = move || {
        cam.capture()
            .ok()
            .map(|frame| Bytes::copy_from_slice(&frame[..]))
    };
    Ok(Box::new(callback))
}

/// Get the maximum supported resolution for the given format.
#[cfg(feature = "v4l")]
fn get_max_resolution(cam: &Camera, format: &[u8]) -> Result<(u32, u32), Error> {
    let resolution_info = cam.resolutions(format)?;
    log::debug!("Found resolutions: {:?}", &resolution_info);
    match resolution_info {
        rscam::ResolutionInfo::Discretes(resolutions) => resolutions
            .iter()
            // Map to iterator over ((width, height) num_pixels)
            .map(|res| (res, res.0 * res.1))
            .max_by(|a, b| a.1.cmp(&b.1))
            .map(|res| *res.0),
        rscam::ResolutionInfo::Stepwise { max, .. } => Some(max),
    }
    .ok_or_else(|| simple_error!("No resolution found").into())
}

/// Get the maximum supported frame rate for the given format and resolution.
#[cfg(feature = "v4l")]
fn get_max_frame_rate(
    cam: &Camera,
    format: &[u8],
    resolution: (u32, u32),
) -> Result<(u32, u32), Error> {
    let interval_info = cam.intervals(format, resolution)?;
    log::debug!("Found frame rates: {:?}", &interval_info);
    match interval_info {
        // Intervals are seconds per frame, the shortest one is the highest rate
        rscam::IntervalInfo::Discretes(intervals) => intervals
            .iter()
            .min_by(|a, b| (a.0 * b.1).cmp(&(b.0 * a.1)))
            .copied(),
        rscam::IntervalInfo::Stepwise { min, .. } => Some(min),
    }
    .ok_or_else(|| simple_error!("No frame rate found").into())
}

#[cfg(feature = "v4l")]
fn log_supported_formats(cam: &Camera, format: &str) {
    let formats: Vec<_> = cam.formats().filter_map(|fmt| fmt.ok()).collect();
    log::debug!(
        "Supported formats: {:?}, using format {:?}",
        formats,
        format
    );
}
