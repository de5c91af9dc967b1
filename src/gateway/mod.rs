//! HTTP gateway for Parley
//!
//! A thin axum surface over [`ResponseEngine`](crate::engine::ResponseEngine):
//! `POST /chat`, `POST /learn`, `GET /stats` and `GET /health`.

mod handler;

pub use handler::{router, ApiError};

use crate::engine::ResponseEngine;
use crate::error::Result;
use std::future::Future;
use std::sync::Arc;

/// Serve the API until `shutdown` resolves
pub async fn serve(
    engine: Arc<ResponseEngine>,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(address = %listener.local_addr()?, "Parley gateway listening");
    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
