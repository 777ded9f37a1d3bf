//! HTTP endpoint: every GET runs one collection.

use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use remote_node_exporter_core::NodeCollector;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Prometheus text format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Scrapes take the lock for their whole duration, so concurrent requests
/// queue behind each other.
pub type SharedCollector = Arc<Mutex<NodeCollector>>;

pub fn router(collector: SharedCollector) -> Router {
    Router::new()
        .route("/", get(handle_scrape))
        .fallback(get(handle_scrape))
        .with_state(collector)
}

async fn handle_scrape(State(collector): State<SharedCollector>) -> impl IntoResponse {
    let body = tokio::task::spawn_blocking(move || {
        let mut collector = collector.lock().unwrap_or_else(PoisonError::into_inner);
        collector.collect()
    })
    .await
    .unwrap_or_else(|e| {
        error!("Collection task failed: {e}");
        String::new()
    });
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    collector: SharedCollector,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Serving metrics on {}", listener.local_addr()?);
    axum::serve(listener, router(collector))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
