//! Session owning the model and camera handles.
//!
use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use bytes::Bytes;
use camera::{decode_jpeg, open_source, CameraConfig, FrameSource};
use common::protocol::SurfaceMsg;
use image::RgbImage;
use tokio::{
    sync::{broadcast, watch},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::PresenterConfig,
    meter::{Meter, RateWindow},
    nn::{Classifier, OnnxClassifier},
    presenter::Presenter,
    surface::Surface,
};

/// Captured JPEG frames buffered for slow stream listeners.
const JPEG_CHANNEL_CAPACITY: usize = 20;

/// Window over which the capture rate is logged.
const CAPTURE_RATE_WINDOW: Duration = Duration::from_secs(10);

pub struct Session {
    classifier: Arc<dyn Classifier>,
    source: Arc<FrameSource>,
    surface: Arc<dyn Surface>,
    jpeg_tx: broadcast::Sender<Bytes>,
    frame_tx: watch::Sender<Option<Arc<RgbImage>>>,
    meter: Arc<Meter>,
}

impl Session {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        source: FrameSource,
        surface: Arc<dyn Surface>,
    ) -> Self {
        let (jpeg_tx, _) = broadcast::channel(JPEG_CHANNEL_CAPACITY);
        let (frame_tx, _) = watch::channel(None);
        Self {
            classifier,
            source: Arc::new(source),
            surface,
            jpeg_tx,
            frame_tx,
            meter: Arc::new(Meter::new()),
        }
    }

    /// Load the model from `model_dir` and open the camera.
    pub fn open(
        model_dir: impl AsRef<Path>,
        camera_config: &CameraConfig,
        surface: Arc<dyn Surface>,
    ) -> Result<Self> {
        surface.emit(SurfaceMsg::Status("Loading model...".into()));
        let classifier = OnnxClassifier::load(model_dir)?;

        let source = open_source(camera_config).map_err(|err| anyhow!(err))?;

        Ok(Self::new(Arc::new(classifier), source, surface))
    }

    /// Subscribe to the raw JPEG frames, e.g. for the live stream.
    pub fn subscribe_jpeg(&self) -> broadcast::Receiver<Bytes> {
        self.jpeg_tx.subscribe()
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    /// Whether frames are mirrored before classification.
    pub fn mirrored(&self) -> bool {
        self.source.flip()
    }

    /// Build a presenter classifying this session's frames.
    pub fn presenter(&self, config: PresenterConfig) -> Presenter {
        Presenter::new(
            config,
            Arc::clone(&self.classifier),
            Arc::clone(&self.surface),
            self.frame_tx.subscribe(),
        )
        .with_meter(Arc::clone(&self.meter))
    }

    /// Capture frames every `frame_interval` until `token` is cancelled.
    ///
    /// Missed captures are retried on the next tick, undecodable frames end the loop.
    pub async fn run_capture_loop(
        &self,
        frame_interval: Duration,
        token: CancellationToken,
    ) -> Result<()> {
        let mut ticks = tokio::time::interval(frame_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut capture_rate = RateWindow::new(CAPTURE_RATE_WINDOW);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticks.tick() => (),
            }

            // Capturing blocks until the device delivers a frame
            let source = Arc::clone(&self.source);
            match tokio::task::spawn_blocking(move || source.capture()).await? {
                Some(jpeg) => {
                    self.publish(jpeg)?;
                    if let Some(rate) = capture_rate.tick() {
                        log::info!("Capturing {rate:.1} frames per second");
                    }
                }
                None => log::warn!("Unable to capture frame, trying again..."),
            }
        }

        log::info!("Capture loop stopped");
        Ok(())
    }

    fn publish(&self, jpeg: Bytes) -> Result<()> {
        self.meter.tick_captured();
        log::trace!("Captured frame ({} bytes)", jpeg.len());

        // Nobody watching the stream is fine
        self.jpeg_tx.send(jpeg.clone()).ok();

        let frame = decode_jpeg(&jpeg, self.source.flip()).map_err(|err| anyhow!(err))?;
        self.frame_tx.send_replace(Some(Arc::new(frame)));

        Ok(())
    }
}
