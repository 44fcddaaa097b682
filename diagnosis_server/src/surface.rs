//! Display surfaces receiving presenter updates.
//!
use std::sync::{Arc, Mutex};

use common::protocol::{SegmentStyle, SurfaceMsg};
use tokio::sync::broadcast;

/// Number of updates buffered for slow subscribers. Typing emits one update per character.
const SURFACE_CHANNEL_CAPACITY: usize = 1024;

/// Something that renders display updates.
pub trait Surface: Send + Sync {
    fn emit(&self, msg: SurfaceMsg);
}

impl<S: Surface + ?Sized> Surface for Arc<S> {
    fn emit(&self, msg: SurfaceMsg) {
        (**self).emit(msg)
    }
}

/// Fan out to two surfaces.
impl<A: Surface, B: Surface> Surface for (A, B) {
    fn emit(&self, msg: SurfaceMsg) {
        self.0.emit(msg.clone());
        self.1.emit(msg);
    }
}

/// Broadcasts updates to all connected pages.
pub struct BroadcastSurface {
    tx: broadcast::Sender<SurfaceMsg>,
}

impl BroadcastSurface {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(SURFACE_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceMsg> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for BroadcastSurface {
    fn emit(&self, msg: SurfaceMsg) {
        // No page connected is fine
        self.tx.send(msg).ok();
    }
}

/// Logs the updates worth reading in a terminal.
#[derive(Default)]
pub struct LogSurface;

impl Surface for LogSurface {
    fn emit(&self, msg: SurfaceMsg) {
        match msg {
            SurfaceMsg::Status(status) => log::info!("Status: {status}"),
            SurfaceMsg::Alert(true) => log::warn!("Alert shown"),
            SurfaceMsg::Alert(false) => log::info!("Alert hidden"),
            SurfaceMsg::State(state) => log::debug!("Presenter {state}"),
            SurfaceMsg::Char(_) => (),
            other => log::trace!("{other:?}"),
        }
    }
}

/// Keeps every update, for headless runs and tests.
#[derive(Default)]
pub struct RecordingSurface {
    msgs: Mutex<Vec<SurfaceMsg>>,
}

impl RecordingSurface {
    pub fn messages(&self) -> Vec<SurfaceMsg> {
        self.msgs.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.msgs.lock().unwrap().clear();
    }

    /// Last alert visibility, `None` if the alert was never touched.
    pub fn alert_visible(&self) -> Option<bool> {
        self.msgs.lock().unwrap().iter().rev().find_map(|msg| match msg {
            SurfaceMsg::Alert(visible) => Some(*visible),
            _ => None,
        })
    }

    /// Number of times the alert was shown.
    pub fn alerts_raised(&self) -> usize {
        self.msgs
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| **msg == SurfaceMsg::Alert(true))
            .count()
    }

    /// Replay the updates into the styled text currently on display.
    pub fn rendered(&self) -> Vec<(SegmentStyle, String)> {
        let mut rendered = Vec::new();
        for msg in self.msgs.lock().unwrap().iter() {
            match msg {
                SurfaceMsg::ClearResponse => rendered.clear(),
                SurfaceMsg::SegmentStart(style) => rendered.push((*style, String::new())),
                SurfaceMsg::Char(c) => {
                    if let Some((_, text)) = rendered.last_mut() {
                        text.push(*c);
                    }
                }
                _ => (),
            }
        }
        rendered
    }
}

impl Surface for RecordingSurface {
    fn emit(&self, msg: SurfaceMsg) {
        self.msgs.lock().unwrap().push(msg);
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_recording_renders_sections() {
        let surface = RecordingSurface::default();
        surface.emit(SurfaceMsg::SegmentStart(SegmentStyle::Headline));
        surface.emit(SurfaceMsg::Char('o'));
        surface.emit(SurfaceMsg::Char('k'));
        surface.emit(SurfaceMsg::SegmentEnd);
        assert_eq!(
            surface.rendered(),
            vec![(SegmentStyle::Headline, "ok".to_string())]
        );

        surface.emit(SurfaceMsg::ClearResponse);
        assert!(surface.rendered().is_empty());
        assert_eq!(surface.alert_visible(), None);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let surface = BroadcastSurface::new();
        // Without subscribers updates are dropped silently
        surface.emit(SurfaceMsg::PlayCue);

        let mut rx = surface.subscribe();
        surface.emit(SurfaceMsg::Status("Ready".into()));
        assert_eq!(rx.recv().await.unwrap(), SurfaceMsg::Status("Ready".into()));
    }

    #[test]
    fn test_fanout() {
        let fanout = (RecordingSurface::default(), RecordingSurface::default());
        fanout.emit(SurfaceMsg::Alert(true));
        assert_eq!(fanout.0.alerts_raised(), 1);
        assert_eq!(fanout.1.alerts_raised(), 1);
    }
}
