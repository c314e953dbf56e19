use backbone_server::{
    build_router,
    config::ServerConfig,
    startup::{self, StartupError},
};
use backbone_store::{KubeStore, ResourceStore};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(mode = %config.mode, namespace = %config.namespace, "Loaded configuration");

    let store: Arc<dyn ResourceStore> =
        match KubeStore::connect(config.kubeconfig.as_deref(), config.namespace.clone()).await {
            Ok(store) => Arc::new(store),
            Err(report) => {
                tracing::error!(error = %report, "Failed to connect to the resource store");
                return ExitCode::FAILURE;
            }
        };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutting down");
        let _ = shutdown_tx.send(true);
    });

    let services = match startup::start(&config, store, shutdown_rx.clone()).await {
        Ok(services) => services,
        Err(report) if report.current_context() == &StartupError::Interrupted => {
            tracing::info!("Shutdown requested before configuration was applied");
            return ExitCode::SUCCESS;
        }
        Err(report) => {
            tracing::error!(error = %report, "Startup failed");
            return ExitCode::FAILURE;
        }
    };
    let app = build_router(services.state);

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.listen_addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("listening on http://{}", config.listen_addr);

    let mut stop = shutdown_rx;
    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = stop.wait_for(|stop| *stop).await;
        })
        .await;

    match served {
        Ok(()) => {
            let _ = tokio::join!(services.watcher, services.sync);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
