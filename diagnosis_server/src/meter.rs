//! Usage statistics of a running session.
//!
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use serde::Serialize;

/// Point-in-time copy of the counters, served on `/stats`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MeterSnapshot {
    pub captured_frames: u64,
    pub cycles: u64,
    pub alerts: u64,
    /// Mean classification latency over all cycles.
    pub mean_classify_ms: f64,
}

/// Counts captured frames, finished diagnosis cycles and raised alerts.
#[derive(Debug, Default)]
pub struct Meter {
    captured_frames: AtomicU64,
    cycles: AtomicU64,
    alerts: AtomicU64,
    classify_micros: AtomicU64,
}

impl Meter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_captured(&self) {
        self.captured_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished cycle and return its number, starting at 1.
    pub fn record_cycle(&self, classify_time: Duration, alerted: bool) -> u64 {
        self.classify_micros
            .fetch_add(classify_time.as_micros() as u64, Ordering::Relaxed);
        if alerted {
            self.alerts.fetch_add(1, Ordering::Relaxed);
        }
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        let cycles = self.cycles.load(Ordering::Relaxed);
        let mean_classify_ms = match cycles {
            0 => 0.0,
            n => self.classify_micros.load(Ordering::Relaxed) as f64 / n as f64 / 1000.0,
        };

        MeterSnapshot {
            captured_frames: self.captured_frames.load(Ordering::Relaxed),
            cycles,
            alerts: self.alerts.load(Ordering::Relaxed),
            mean_classify_ms,
        }
    }
}

/// Tracks the capture rate over fixed windows.
#[derive(Debug)]
pub struct RateWindow {
    window: Duration,
    started: tokio::time::Instant,
    count: u64,
}

impl RateWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            started: tokio::time::Instant::now(),
            count: 0,
        }
    }

    /// Count one event, returns the rate per second once the window is full.
    pub fn tick(&mut self) -> Option<f32> {
        self.count += 1;
        let elapsed = self.started.elapsed();
        if elapsed < self.window {
            return None;
        }

        let rate = self.count as f32 / elapsed.as_secs_f32();
        self.started = tokio::time::Instant::now();
        self.count = 0;
        Some(rate)
    }
}
