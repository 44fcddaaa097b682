use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::Result;
use common::{
    prediction::Prediction,
    protocol::{PresenterState, SegmentStyle, SurfaceMsg},
};
use diagnosis_server::{
    config::{Mode, PresenterConfig},
    nn::Classifier,
    presenter::Presenter,
    surface::RecordingSurface,
};
use image::RgbImage;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Returns the scripted prediction lists in turn, repeating the last one.
struct ScriptedClassifier {
    script: Mutex<Vec<Vec<Prediction>>>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn new(script: Vec<Vec<(&str, f32)>>) -> Self {
        let script = script
            .into_iter()
            .rev()
            .map(|preds| {
                preds
                    .into_iter()
                    .map(|(label, p)| Prediction::new(label, p))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&self, _frame: &RgbImage) -> Result<Vec<Prediction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        match script.len() {
            0 => Ok(Vec::new()),
            1 => Ok(script[0].clone()),
            _ => Ok(script.pop().unwrap_or_default()),
        }
    }
}

struct Harness {
    presenter: Presenter,
    surface: Arc<RecordingSurface>,
    classifier: Arc<ScriptedClassifier>,
    _frame_tx: watch::Sender<Option<Arc<RgbImage>>>,
}

fn harness(mode: Mode, script: Vec<Vec<(&str, f32)>>) -> Harness {
    let classifier = Arc::new(ScriptedClassifier::new(script));
    let surface = Arc::new(RecordingSurface::default());
    let (frame_tx, frame_rx) = watch::channel(Some(Arc::new(RgbImage::new(16, 16))));
    let config = PresenterConfig {
        mode,
        hold: Duration::from_secs(1),
        ..Default::default()
    };

    Harness {
        presenter: Presenter::new(config, classifier.clone(), surface.clone(), frame_rx),
        surface,
        classifier,
        _frame_tx: frame_tx,
    }
}

fn status_updates(msgs: &[SurfaceMsg]) -> Vec<String> {
    msgs.iter()
        .filter_map(|msg| match msg {
            SurfaceMsg::Status(status) => Some(status.clone()),
            _ => None,
        })
        .collect()
}

/// Diagnose a black eye end to end.
#[tokio::test(start_paused = true)]
async fn test_eye_punch_diagnosis() -> Result<()> {
    let mut h = harness(
        Mode::Interactive,
        vec![vec![
            ("Falling accident", 0.05),
            ("Eye punch", 0.85),
            ("Healty face", 0.1),
        ]],
    );

    let outcome = h.presenter.run_cycle().await?;
    assert_eq!(outcome.best.label, "Eye punch");
    assert!(!outcome.alerted);

    let rendered = h.surface.rendered();
    assert_eq!(rendered.len(), 3);

    let (style, headline) = &rendered[0];
    assert_eq!(*style, SegmentStyle::Headline);
    assert_eq!(headline, "Detected: Eye trauma.");

    let (style, analysis) = &rendered[1];
    assert_eq!(*style, SegmentStyle::Analysis);
    assert!(analysis.contains("bruising"));
    assert!(!analysis.contains("cold compress"));

    let (style, treatment) = &rendered[2];
    assert_eq!(*style, SegmentStyle::Treatment);
    assert!(treatment.contains("cold compress"));

    assert_eq!(h.surface.alerts_raised(), 0);
    assert_eq!(
        status_updates(&h.surface.messages()),
        vec!["Thinking...".to_string(), "Eye punch".to_string()]
    );

    Ok(())
}

/// An unknown class still gets a diagnosis.
#[tokio::test(start_paused = true)]
async fn test_unknown_label_uses_default_text() -> Result<()> {
    let mut h = harness(Mode::Continuous, vec![vec![("Sunburn", 0.9), ("Eye punch", 0.1)]]);

    let outcome = h.presenter.run_cycle().await?;
    assert_eq!(outcome.best.label, "Sunburn");

    let rendered = h.surface.rendered();
    assert_eq!(rendered[0], (SegmentStyle::Headline, "Analyzing...".to_string()));

    Ok(())
}

/// A critical label raises the alert once, and it hides by itself.
#[tokio::test(start_paused = true)]
async fn test_fall_raises_alert_once() -> Result<()> {
    let mut h = harness(
        Mode::Interactive,
        vec![vec![("Healty face", 0.2), ("Falling accident", 0.8)]],
    );

    let outcome = h.presenter.run_cycle().await?;
    assert!(outcome.alerted);
    assert_eq!(h.surface.alerts_raised(), 1);
    assert_eq!(h.surface.alert_visible(), Some(true));

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.surface.alert_visible(), Some(false));
    assert_eq!(h.surface.alerts_raised(), 1);

    Ok(())
}

/// Button presses run one cycle each, presses during a cycle are dropped.
#[tokio::test(start_paused = true)]
async fn test_interactive_loop_ignores_double_trigger() -> Result<()> {
    let h = harness(
        Mode::Interactive,
        vec![
            vec![("Dermatitis", 0.6), ("Healty face", 0.4)],
            vec![("Dermatitis", 0.1), ("Healty face", 0.9)],
        ],
    );
    let mut state = h.presenter.state();
    let (trigger_tx, trigger_rx) = mpsc::channel(4);
    let token = CancellationToken::new();
    let handle = tokio::spawn(h.presenter.run(trigger_rx, token.clone()));

    // Double click
    trigger_tx.send(()).await?;
    trigger_tx.send(()).await?;
    state.wait_for(|s| *s == PresenterState::Typing).await?;
    trigger_tx.send(()).await?;
    state.wait_for(|s| *s == PresenterState::Idle).await?;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 1);

    // A later press starts a new cycle
    trigger_tx.send(()).await?;
    state.wait_for(|s| *s == PresenterState::Typing).await?;
    state.wait_for(|s| *s == PresenterState::Idle).await?;
    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 2);

    let statuses = status_updates(&h.surface.messages());
    assert_eq!(
        statuses,
        vec![
            "Thinking...".to_string(),
            "Dermatitis".to_string(),
            "Thinking...".to_string(),
            "Healty face".to_string()
        ]
    );

    token.cancel();
    handle.await??;

    Ok(())
}

/// The always-on loop keeps diagnosing until cancelled.
#[tokio::test(start_paused = true)]
async fn test_continuous_loop_until_cancelled() -> Result<()> {
    let h = harness(Mode::Continuous, vec![vec![("Eye punch", 1.0)]]);
    let token = CancellationToken::new();
    let (_trigger_tx, trigger_rx) = mpsc::channel(1);
    let handle = tokio::spawn(h.presenter.run(trigger_rx, token.clone()));

    while h.classifier.calls.load(Ordering::SeqCst) < 3 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    token.cancel();
    handle.await??;

    let clears = h
        .surface
        .messages()
        .iter()
        .filter(|msg| **msg == SurfaceMsg::ClearResponse)
        .count();
    assert!(clears >= 3);

    Ok(())
}

/// A classifier without predictions stops the presenter with an error.
#[tokio::test(start_paused = true)]
async fn test_empty_classification_is_fatal() {
    let h = harness(Mode::Continuous, vec![]);
    let (_trigger_tx, trigger_rx) = mpsc::channel(1);

    let res = h.presenter.run(trigger_rx, CancellationToken::new()).await;
    assert!(res.is_err());
}
