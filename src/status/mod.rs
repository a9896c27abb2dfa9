//! Read-only HTTP view of the restart records.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/ping` | Liveness probe, answers `pong` |
//! | GET | `/containers` | Every restart record |
//! | GET | `/container/{name}` | The record for one container name |

pub mod handlers;

use crate::heal::RestartStore;
use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// Shared state for status handlers.
#[derive(Clone)]
pub struct StatusState {
    pub store: RestartStore,
}

/// Build the status router over `store`.
pub fn build_router(store: RestartStore) -> Router {
    let state = StatusState { store };

    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/containers", get(handlers::list_containers))
        .route("/container/{name}", get(handlers::get_container))
        .with_state(state)
        .layer(middleware::from_fn(log_request))
}

/// Serve the status API on `listener` until `shutdown` flips to `true` or its
/// sender is dropped.
pub async fn serve(
    listener: TcpListener,
    store: RestartStore,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Status API listening on http://{}", addr);
    }

    axum::serve(listener, build_router(store))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "HTTP request"
    );
    response
}
