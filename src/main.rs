//! Duo Cards Back binary entrypoint wiring REST, SSE and the record store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duo_cards_back::{
    build_router,
    config::{AppConfig, StorageKind},
    dao::record_store::{RecordStore, memory::MemoryRecordStore},
    services::reconnection_sweeper,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store = connect_store(config.storage).await?;
    let app_state = AppState::new(store, config.clone());

    tokio::spawn(reconnection_sweeper::run(
        app_state.games().clone(),
        config.reconnection_timeout,
        config.sweep_interval,
    ));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Instantiate the configured record store backend.
async fn connect_store(kind: StorageKind) -> anyhow::Result<Arc<dyn RecordStore>> {
    match kind {
        StorageKind::Memory => {
            info!("using in-memory record store");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
        #[cfg(feature = "couch-store")]
        StorageKind::Couchdb => {
            use duo_cards_back::dao::record_store::couchdb::{CouchConfig, CouchRecordStore};

            let couch_config = CouchConfig::from_env().context("reading CouchDB configuration")?;
            let store = CouchRecordStore::connect(couch_config)
                .await
                .context("connecting to CouchDB")?;
            info!("connected to CouchDB record store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "couch-store"))]
        StorageKind::Couchdb => {
            anyhow::bail!("storage `couchdb` requires the `couch-store` feature")
        }
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
