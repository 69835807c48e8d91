//! Serve command: wires the cache, refresher, hub and listener together and
//! runs until Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use newschat_core::auth::Authenticator;
use newschat_core::config::Config;
use newschat_core::{CacheRefresher, CacheStore, NewsApiClient, SessionHub, logging};
use newschat_tui::SessionContext;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::cli::ServeArgs;
use crate::server::{self, ServerContext};

pub async fn run(mut config: Config, args: &ServeArgs) -> Result<()> {
    if let Some(host) = &args.host {
        config.server.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let _log_guard = logging::init(&config.log)?;

    let auth = Authenticator::from_config(&config.auth).context("load auth settings")?;
    let client = NewsApiClient::from_config(&config.news)?;

    let cache = Arc::new(CacheStore::new());
    let hub = Arc::new(SessionHub::new());
    let welcome = config.server.load_welcome_art().map(Arc::from);
    let sessions = SessionContext::new(hub, Arc::clone(&cache)).with_welcome(welcome);

    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    let refresher = CacheRefresher::new(
        client,
        cache,
        config.news.region.clone(),
        config.news.refresh_interval(),
    );
    tracker.spawn(refresher.run(shutdown.clone()));

    let address = config.server.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("bind {address}"))?;
    info!(address = %address, "Starting server");

    let ctx = ServerContext {
        sessions,
        auth: Arc::new(auth),
    };
    tokio::select! {
        result = server::serve(listener, ctx, shutdown.clone(), tracker.clone()) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("listen for Ctrl+C")?;
            info!("Stopping server");
        }
    }

    shutdown.cancel();
    tracker.close();
    let grace = config.server.shutdown_grace();
    if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
        warn!(
            grace_secs = grace.as_secs(),
            remaining = tracker.len(),
            "Shutdown grace period elapsed with tasks still running"
        );
    }
    info!("Server stopped");
    Ok(())
}
