//! barrio server entry point.
//!
//! Wires the push pipeline to its event sources: the Redis changes channel
//! and the HTTP change hook.

mod http;

use std::net::SocketAddr;
use std::sync::Arc;

use barrio_common::{Config, get_metrics};
use barrio_core::{ExpoPushGateway, TriggerRouter};
use barrio_db::repositories::{FriendRepository, UserRepository};
use barrio_listener::{ChangeListener, EventTasks};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::http::HookState;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "barrio=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On non-Unix systems only Ctrl+C is observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(config.logging.json);

    info!("Starting barrio server...");

    let db = Arc::new(barrio_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    barrio_db::migrate(&db).await?;
    info!("Migrations completed");

    let metrics = get_metrics().clone();
    let router = Arc::new(TriggerRouter::from_config(
        &config,
        Arc::new(UserRepository::new(db.clone())),
        Arc::new(FriendRepository::new(db.clone())),
        Arc::new(ExpoPushGateway::new(&config.push)?),
        metrics.clone(),
    )?);

    let tasks = EventTasks::new();
    let listener = ChangeListener::connect(&config.redis, router.clone(), tasks.clone()).await?;
    let listen_task = listener.start().await?;

    let app = http::router(HookState {
        handler: router,
        metrics,
        tasks: tasks.clone(),
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let tcp = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = listener.shutdown().await {
        warn!(error = %e, "Redis change listener did not shut down cleanly");
    }
    listen_task.abort();

    let aborted = tasks.drain(config.server.shutdown_grace()).await;
    if aborted > 0 {
        warn!(aborted, "Change events were cut short by shutdown");
    }

    info!("Server shutdown complete");
    Ok(())
}
