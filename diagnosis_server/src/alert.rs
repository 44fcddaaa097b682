//! Critical-alert overlay with automatic hiding.
//!
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use common::protocol::SurfaceMsg;
use tokio::task::JoinHandle;

use crate::surface::Surface;

/// Whether `label` contains one of `keywords`, ignoring case.
pub fn is_alert_label<S: AsRef<str>>(label: &str, keywords: &[S]) -> bool {
    let label = label.to_lowercase();
    keywords
        .iter()
        .map(|keyword| keyword.as_ref().to_lowercase())
        .any(|keyword| !keyword.is_empty() && label.contains(&keyword))
}

/// Shows the alert overlay and hides it again after a fixed duration.
pub struct AlertTimer {
    surface: Arc<dyn Surface>,
    duration: Duration,
    // Bumped on every raise, a hide only applies to the raise that scheduled it
    generation: Arc<AtomicU64>,
}

impl AlertTimer {
    pub fn new(surface: Arc<dyn Surface>, duration: Duration) -> Self {
        Self {
            surface,
            duration,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Show the overlay, play the cue and schedule hiding.
    pub fn raise(&self) -> JoinHandle<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.surface.emit(SurfaceMsg::Alert(true));
        self.surface.emit(SurfaceMsg::PlayCue);
        log::warn!("Critical alert raised");

        let surface = Arc::clone(&self.surface);
        let current = Arc::clone(&self.generation);
        let duration = self.duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if current.load(Ordering::SeqCst) == generation {
                surface.emit(SurfaceMsg::Alert(false));
                log::debug!("Critical alert hidden");
            }
        })
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::surface::RecordingSurface;

    #[test]
    fn test_keyword_matching() {
        let keywords = ["fall", "failure"];
        assert!(is_alert_label("Falling accident", &keywords));
        assert!(is_alert_label("HEART FAILURE", &keywords));
        assert!(!is_alert_label("Eye punch", &keywords));
        assert!(!is_alert_label("", &keywords));
        assert!(!is_alert_label("anything", &[""]));
        assert!(!is_alert_label::<&str>("Falling accident", &[]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_hides_after_duration() {
        let surface = Arc::new(RecordingSurface::default());
        let timer = AlertTimer::new(surface.clone(), Duration::from_secs(5));

        let hide = timer.raise();
        assert_eq!(
            surface.messages(),
            vec![SurfaceMsg::Alert(true), SurfaceMsg::PlayCue]
        );

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(surface.messages().len(), 2);

        hide.await.unwrap();
        assert_eq!(surface.messages().last(), Some(&SurfaceMsg::Alert(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_alert_is_not_hidden_early() {
        let surface = Arc::new(RecordingSurface::default());
        let timer = AlertTimer::new(surface.clone(), Duration::from_secs(5));

        let first = timer.raise();
        tokio::time::sleep(Duration::from_secs(3)).await;
        let second = timer.raise();

        first.await.unwrap();
        assert_eq!(surface.alert_visible(), Some(true));

        second.await.unwrap();
        assert_eq!(surface.alert_visible(), Some(false));
    }
}
