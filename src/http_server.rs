//! HTTP endpoints exposing a [`Monitor`]
//!
//! - `GET {blocked}`: JSON list of current long-lock records
//! - `GET {categories}`: JSON list of cumulative category statistics
//! - `GET {stack}{id}`: plain-text stack for a stack id
//!
//! Paths come from [`HttpEndpoints`]; the defaults are `/blocked`,
//! `/categories` and `/stacks/`.

use crate::config::{HttpEndpoints, MonitorConfig};
use crate::json_output::{blocked_entries, category_entries, BlockedEntry, CategoryStatsEntry};
use crate::monitor::Monitor;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

/// Errors from running the HTTP server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind HTTP server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// HTTP server serving one monitor
#[derive(Debug, Clone)]
pub struct HttpServer {
    addr: String,
    endpoints: HttpEndpoints,
    monitor: Arc<Monitor>,
}

impl HttpServer {
    pub fn new(config: &MonitorConfig, monitor: Arc<Monitor>) -> Self {
        Self {
            addr: config.http_server_addr.clone(),
            endpoints: config.http_endpoints.clone(),
            monitor,
        }
    }

    /// Configured listen address
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Build the router for the configured endpoints
    pub fn router(&self) -> Router {
        let stack_route = format!("{}{{id}}", self.endpoints.stack);
        Router::new()
            .route(&self.endpoints.blocked, get(blocked))
            .route(&self.endpoints.categories, get(categories))
            .route(&stack_route, get(stack))
            .with_state(Arc::clone(&self.monitor))
    }

    /// Bind a listener on the configured address
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        TcpListener::bind(&self.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr.clone(),
                source,
            })
    }

    /// Serve requests on `listener` until `shutdown` completes
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local: Option<SocketAddr> = listener.local_addr().ok();
        match local {
            Some(addr) => tracing::info!(%addr, "HTTP monitoring server started"),
            None => tracing::info!(addr = %self.addr, "HTTP monitoring server started"),
        }

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;
        match result {
            Ok(()) => {
                tracing::info!("HTTP monitoring server stopped");
                Ok(())
            }
            Err(e) => {
                tracing::error!("HTTP monitoring server failed: {}", e);
                Err(ServerError::Serve(e))
            }
        }
    }
}

async fn blocked(State(monitor): State<Arc<Monitor>>) -> Json<Vec<BlockedEntry>> {
    Json(blocked_entries(&monitor.snapshot()))
}

async fn categories(State(monitor): State<Arc<Monitor>>) -> Json<Vec<CategoryStatsEntry>> {
    Json(category_entries(&monitor.get_category_stats()))
}

async fn stack(State(monitor): State<Arc<Monitor>>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<u64>() else {
        return (StatusCode::BAD_REQUEST, "invalid stack id").into_response();
    };
    match monitor.get_stack(id) {
        Some(stack) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            stack,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "stack not found").into_response(),
    }
}
