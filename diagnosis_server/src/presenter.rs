//! Diagnosis presenter.
//!
//! One diagnosis cycle runs `Idle -> Thinking -> Typing -> (Alerting) -> Idle`: clear the output,
//! pause, classify the latest frame, type the diagnosis text for the best label and raise the
//! alert for critical labels.
use std::sync::Arc;

use anyhow::{anyhow, Result};
use common::{
    prediction::{select_best, Prediction},
    protocol::{PresenterState, SurfaceMsg},
};
use image::RgbImage;
use tokio::{
    sync::{mpsc, watch},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{
    alert::{is_alert_label, AlertTimer},
    config::{Mode, PresenterConfig},
    diagnosis,
    meter::Meter,
    nn::Classifier,
    surface::Surface,
    typing::type_segments,
};

/// Latest decoded frame, `None` until the camera delivered one.
pub type FrameReceiver = watch::Receiver<Option<Arc<RgbImage>>>;

/// What a finished cycle resolved to.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleOutcome {
    pub best: Prediction,
    pub alerted: bool,
    pub typed_units: usize,
}

pub struct Presenter {
    config: PresenterConfig,
    classifier: Arc<dyn Classifier>,
    surface: Arc<dyn Surface>,
    frames: FrameReceiver,
    alert: AlertTimer,
    state_tx: watch::Sender<PresenterState>,
    meter: Arc<Meter>,
}

impl Presenter {
    pub fn new(
        config: PresenterConfig,
        classifier: Arc<dyn Classifier>,
        surface: Arc<dyn Surface>,
        frames: FrameReceiver,
    ) -> Self {
        let alert = AlertTimer::new(Arc::clone(&surface), config.alert_duration);
        let (state_tx, _) = watch::channel(PresenterState::Idle);
        Self {
            config,
            classifier,
            surface,
            frames,
            alert,
            state_tx,
            meter: Arc::new(Meter::new()),
        }
    }

    /// Record cycles into a shared meter.
    pub fn with_meter(mut self, meter: Arc<Meter>) -> Self {
        self.meter = meter;
        self
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<PresenterState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: PresenterState) {
        self.state_tx.send_replace(state);
        self.surface.emit(SurfaceMsg::State(state));
    }

    /// Run one full diagnosis cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let outcome = self.resolve_cycle().await?;
        self.set_state(PresenterState::Idle);
        Ok(outcome)
    }

    /// Everything of a cycle up to the return to `Idle`.
    async fn resolve_cycle(&mut self) -> Result<CycleOutcome> {
        self.surface.emit(SurfaceMsg::ClearResponse);
        self.set_state(PresenterState::Thinking);
        self.surface.emit(SurfaceMsg::Status("Thinking...".into()));

        let delay = self.config.thinking_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let frame = self.latest_frame().await?;
        let classify_start = Instant::now();
        let predictions = self.classifier.classify(&frame)?;
        let classify_time = classify_start.elapsed();

        let best = select_best(&predictions)
            .cloned()
            .ok_or_else(|| anyhow!("classifier returned no predictions"))?;
        log::info!(
            "Resolved {} ({:.1}%) in {} ms",
            &best.label,
            best.probability * 100.0,
            classify_time.as_millis()
        );
        self.surface.emit(SurfaceMsg::Status(best.label.clone()));

        let entry = diagnosis::lookup(&best.label);
        self.set_state(PresenterState::Typing);
        let typed_units = type_segments(
            &entry.segments(),
            self.config.typing_delay,
            self.surface.as_ref(),
        )
        .await;

        let alerted = is_alert_label(&best.label, &self.config.alert_keywords);
        if alerted {
            self.set_state(PresenterState::Alerting);
            self.alert.raise();
        }

        let cycle = self.meter.record_cycle(classify_time, alerted);
        log::debug!("Finished cycle {cycle}");

        Ok(CycleOutcome {
            best,
            alerted,
            typed_units,
        })
    }

    async fn latest_frame(&mut self) -> Result<Arc<RgbImage>> {
        loop {
            let current = self.frames.borrow_and_update().clone();
            if let Some(frame) = current {
                return Ok(frame);
            }
            log::debug!("Waiting for the first frame");
            self.frames
                .changed()
                .await
                .map_err(|_| anyhow!("frame source closed"))?;
        }
    }

    /// Run cycles until `token` is cancelled.
    ///
    /// In interactive mode every message on `triggers` starts a cycle. Triggers arriving while a
    /// cycle runs are dropped. In continuous mode cycles run back to back.
    pub async fn run(
        mut self,
        mut triggers: mpsc::Receiver<()>,
        token: CancellationToken,
    ) -> Result<()> {
        self.set_state(PresenterState::Idle);

        match self.config.mode {
            Mode::Interactive => loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    trigger = triggers.recv() => {
                        if trigger.is_none() {
                            log::info!("Trigger channel closed");
                            break;
                        }
                        self.resolve_cycle().await?;

                        // Drop presses from the running cycle before accepting new ones
                        let mut dropped = 0;
                        while triggers.try_recv().is_ok() {
                            dropped += 1;
                        }
                        if dropped > 0 {
                            log::warn!("Ignored {dropped} triggers during a running diagnosis");
                        }
                        self.set_state(PresenterState::Idle);
                    }
                }
            },
            Mode::Continuous => loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    res = self.run_cycle() => {
                        res?;
                    }
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(self.config.hold) => (),
                }
            },
        }

        log::info!("Presenter stopped");
        Ok(())
    }
}
