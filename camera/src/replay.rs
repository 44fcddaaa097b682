//! Replay a directory of JPEG images as if it was a camera.
//!
use std::{
    fs,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use simple_error::simple_error;

use crate::{CaptureFn, Error};

/// Get a capture function cycling through all `.jpg`/`.jpeg` files of `dir` in name order.
pub fn get_replay_capture_fn(dir: impl AsRef<Path>) -> Result<CaptureFn, Error> {
    let dir = dir.as_ref();

    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let frames = paths
        .iter()
        .map(|path| fs::read(path).map(Bytes::from))
        .collect::<Result<Vec<_>, _>>()?;

    if frames.is_empty() {
        return Err(simple_error!("No JPEG images found in {}", dir.display()).into());
    }

    log::info!("Replaying {} frames from {}", frames.len(), dir.display());

    let next = AtomicUsize::new(0);
    let callback = move || {
        let idx = next.fetch_add(1, Ordering::Relaxed) % frames.len();
        Some(frames[idx].clone())
    };

    Ok(Box::new(callback))
}
