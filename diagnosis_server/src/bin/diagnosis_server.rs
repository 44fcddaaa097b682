//! Diagnosis server binary.
//!
use std::{future::Future, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use camera::CameraConfig;
use clap::Parser;
use common::protocol::SurfaceMsg;
use diagnosis_server::{
    config::{Mode, PresenterConfig},
    endpoints::{router, AppState},
    session::Session,
    surface::{BroadcastSurface, LogSurface, Surface},
};
use env_logger::TimestampPrecision;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve the page on
    #[clap(long, default_value = "127.0.0.1:3000")]
    server_address: String,

    /// Directory containing `model.onnx` and `metadata.json`
    #[clap(long, default_value = "./model/")]
    model_dir: PathBuf,

    /// Video device to capture from
    #[clap(long, default_value = "/dev/video0")]
    device: String,

    /// Replay the JPEG images of this directory instead of capturing from the device
    #[clap(long)]
    replay_dir: Option<PathBuf>,

    /// Do not mirror camera frames
    #[clap(long)]
    no_flip: bool,

    /// How diagnosis cycles are started
    #[clap(long, value_enum, default_value_t = Mode::Interactive)]
    mode: Mode,

    /// Delay between two typed characters
    #[clap(long, default_value_t = 30)]
    typing_delay_ms: u64,

    /// Minimum thinking pause before classifying (interactive mode)
    #[clap(long, default_value_t = 3000)]
    thinking_min_ms: u64,

    /// Maximum thinking pause before classifying (interactive mode)
    #[clap(long, default_value_t = 5000)]
    thinking_max_ms: u64,

    /// How long the alert stays visible
    #[clap(long, default_value_t = 5000)]
    alert_ms: u64,

    /// Pause between two cycles (continuous mode)
    #[clap(long, default_value_t = 3000)]
    hold_ms: u64,

    /// Interval of the capture loop
    #[clap(long, default_value_t = 33)]
    frame_interval_ms: u64,

    /// Audio file played when the alert is raised
    #[clap(long)]
    alert_sound: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let presenter_config = PresenterConfig {
        mode: args.mode,
        typing_delay: Duration::from_millis(args.typing_delay_ms),
        thinking: Duration::from_millis(args.thinking_min_ms)
            ..=Duration::from_millis(args.thinking_max_ms),
        alert_duration: Duration::from_millis(args.alert_ms),
        hold: Duration::from_millis(args.hold_ms),
        ..Default::default()
    };
    presenter_config.validate()?;

    let camera_config = CameraConfig {
        device: args.device,
        replay_dir: args.replay_dir,
        flip: !args.no_flip,
        ..Default::default()
    };

    // Updates go to connected pages and to the log
    let broadcast_surface = Arc::new(BroadcastSurface::new());
    let surface: Arc<dyn Surface> = Arc::new((Arc::clone(&broadcast_surface), LogSurface));

    let session = Arc::new(Session::open(
        &args.model_dir,
        &camera_config,
        Arc::clone(&surface),
    )?);
    let ready_status = match args.mode {
        Mode::Interactive => "Ready",
        Mode::Continuous => "Analyzing...",
    };
    surface.emit(SurfaceMsg::Status(ready_status.into()));

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Shutting down");
                token.cancel();
            }
        });
    }

    // Spawn capture loop feeding the stream and the presenter
    let capture = {
        let session = Arc::clone(&session);
        let frame_interval = Duration::from_millis(args.frame_interval_ms);
        let capture_token = token.clone();
        tokio::spawn(cancel_on_exit(token.clone(), async move {
            session.run_capture_loop(frame_interval, capture_token).await
        }))
    };

    let presenter = session.presenter(presenter_config);
    let presenter_state = presenter.state();
    let (trigger_tx, trigger_rx) = mpsc::channel(1);
    let presenting = tokio::spawn(cancel_on_exit(
        token.clone(),
        presenter.run(trigger_rx, token.clone()),
    ));

    // Build HTTP server with endpoints
    let app = router(Arc::new(AppState {
        session,
        surface: broadcast_surface,
        triggers: trigger_tx,
        presenter_state,
        alert_sound: args.alert_sound,
        mode: args.mode,
        shutdown: token.clone(),
    }));

    // Serve HTTP server
    let addr: SocketAddr = args.server_address.parse()?;
    log::info!("Serving on http://{addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(token.clone().cancelled_owned())
        .await?;

    capture.await??;
    presenting.await??;

    Ok(())
}

/// Cancel `token` once `task` finished, logging its error.
async fn cancel_on_exit(
    token: CancellationToken,
    task: impl Future<Output = Result<()>>,
) -> Result<()> {
    let res = task.await;
    if let Err(err) = &res {
        log::error!("{err:#}");
    }
    token.cancel();
    res
}
