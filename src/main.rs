//! Interval Timer - A drift-compensated interval-training timer
//!
//! This is the main entry point for the interval-timer daemon.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use interval_timer::{
    api::create_router,
    clock::SystemClock,
    config::{Config, NotifierKind},
    engine::spawn_engine,
    services::{
        check_notify_send_available, DesktopNotifier, FileStore, LogNotifier, MemoryStore,
        NotificationService, StateStore,
    },
    state::AppState,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("interval_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting interval-timer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, interval={}s, sessions={}-{}min",
          config.host, config.port, config.interval_secs, config.min_minutes, config.max_minutes);

    let notifications: Arc<dyn NotificationService> = match config.notifier {
        NotifierKind::Desktop => {
            if let Err(e) = check_notify_send_available().await {
                warn!("{}", e);
            }
            Arc::new(DesktopNotifier::new())
        }
        NotifierKind::Log => Arc::new(LogNotifier::new()),
    };

    let store: Arc<dyn StateStore> = match &config.state_file {
        Some(path) => {
            info!("Persisting session to {}", path.display());
            Arc::new(FileStore::open(path))
        }
        None => Arc::new(MemoryStore::new()),
    };

    // Start the control loop and render sync tasks
    let engine = config.engine()?;
    let timer = spawn_engine(engine, Arc::new(SystemClock::new()), notifications, store);
    let state = Arc::new(AppState::new(timer.clone(), config.port, config.host.clone()));

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /start        - Start a session ({{\"minutes\": n}})");
    info!("  POST /pause        - Pause the running session");
    info!("  POST /resume       - Resume the paused session");
    info!("  POST /end          - End the session");
    info!("  POST /acknowledge  - Dismiss a completed session");
    info!("  GET  /status       - Live snapshot and label");
    info!("  GET  /events       - Server-sent lifecycle events");
    info!("  GET  /health       - Health check");

    // Setup graceful shutdown; stopping the engine first closes open event streams
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, saving session");
            timer.shutdown().await;
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
