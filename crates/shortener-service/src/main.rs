//! URL Shortener API
//!
//! Serves the v1 routes behind the standard request pipeline and shuts down
//! gracefully on SIGINT/SIGTERM or when the pipeline reports an integrity
//! fault.

use shortener_service::auth::{AllowAllPrincipals, AuthSession, KeyStore};
use shortener_service::config::Config;
use shortener_service::observability::{self, init_metrics_recorder, Metrics};
use shortener_service::routes::{self, AppState};
use shortener_service::web::{shutdown_channel, ShutdownListener};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_tracing();

    info!("Starting URL Shortener API");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        build = %config.build,
        bind_address = %config.bind_address,
        keys_folder = %config.keys_folder.display(),
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Load signing keys
    let key_store = KeyStore::from_dir(&config.keys_folder).map_err(|e| {
        error!("Failed to load keys: {}", e);
        e
    })?;
    info!(kids = ?key_store.kids(), "Keys loaded");

    let session = AuthSession::new(
        config.issuer.clone(),
        Arc::new(key_store),
        Arc::new(AllowAllPrincipals),
    )
    .with_clock_skew(config.jwt_clock_skew)
    .with_resolve_timeout(config.key_resolve_timeout);

    let (shutdown, listener) = shutdown_channel();
    let shutdown_timeout = config.shutdown_timeout;

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        config,
        session: Arc::new(session),
        metrics: Arc::new(Metrics::new()),
        shutdown,
    });

    let app = routes::build_routes(state, metrics_handle);

    let tcp = tokio::net::TcpListener::bind(addr).await?;
    info!("URL Shortener API listening on {}", addr);

    // Start server with graceful shutdown support
    let cancel = CancellationToken::new();
    let server_cancel = cancel.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(
            tcp,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await
    });

    tokio::select! {
        result = &mut server => {
            // Server exited on its own; nothing left to drain.
            result??;
            return Ok(());
        }
        () = shutdown_requested(listener) => {}
    }

    cancel.cancel();
    info!(timeout_secs = shutdown_timeout.as_secs(), "Draining in-flight requests");

    match tokio::time::timeout(shutdown_timeout, &mut server).await {
        Ok(result) => {
            result??;
            info!("URL Shortener API shutdown complete");
        }
        Err(_) => {
            warn!("Drain timed out, aborting in-flight requests");
            server.abort();
        }
    }

    Ok(())
}

/// Returns when SIGINT, SIGTERM or a pipeline shutdown notice arrives.
async fn shutdown_requested(mut listener: ShutdownListener) {
    let ctrl_c = wait_for_signal("SIGINT", signal::ctrl_c());

    #[cfg(unix)]
    let terminate = wait_for_signal("SIGTERM", async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<(), std::io::Error>(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let notice = async {
        match listener.recv().await {
            Some(notice) => {
                warn!(reason = %notice.reason, "Pipeline requested shutdown");
            }
            // Every signal is owned by the router, which outlives this wait.
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
        () = notice => {}
    }
}

/// Returns once `signal` fires. Never returns if the handler could not be
/// installed.
async fn wait_for_signal(name: &str, signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("Received {}, starting graceful shutdown...", name),
        Err(e) => {
            error!("Failed to listen for {}: {}", name, e);
            std::future::pending::<()>().await;
        }
    }
}
