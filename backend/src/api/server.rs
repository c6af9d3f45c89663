//! HTTP server for the storefront API.
//!
//! # API Endpoints
//!
//! | Method                 | Path                              | Description                  |
//! |------------------------|-----------------------------------|------------------------------|
//! | GET                    | `/health`                         | Health check                 |
//! | GET, POST              | `/api/products`                   | List (cached) / create       |
//! | GET, PUT, PATCH, DELETE| `/api/products/{id}`              | Retrieve / replace / patch / delete |
//! | GET                    | `/api/products/download_csv`      | CSV export                   |
//! | POST                   | `/api/products/upload_csv`        | CSV bulk import              |
//! | GET, POST              | `/api/orders`                     | List / create                |
//! | GET, PUT, PATCH, DELETE| `/api/orders/{id}`                | Retrieve / replace / patch / delete |
//! | GET                    | `/api/orders/download_csv`        | CSV export                   |
//! | POST                   | `/api/orders/upload_csv`          | CSV bulk import              |
//! | GET                    | `/products/export`                | Products snapshot            |
//! | GET                    | `/orders/export`                  | Orders snapshot              |
//! | GET                    | `/users/{user_id}/orders/export`  | A user's orders snapshot     |
//! | GET                    | `/api/logs`                       | SSE activity stream          |

use axum::{
    extract::Multipart,
    http::{header, Method},
    response::{sse::Event, sse::KeepAlive, Json, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::logs::LOG_BROADCASTER;
use super::{exports, orders, products};
use crate::cache::{MemoryCache, SnapshotCache};
use crate::config::Config;
use crate::error::{ServerError, ServerResult};
use crate::store::{Fixture, MemoryStore};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<dyn SnapshotCache>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State over `store` with a fresh in-memory cache.
    pub fn new(store: MemoryStore, config: Config) -> Self {
        Self::with_cache(store, Arc::new(MemoryCache::new()), config)
    }

    pub fn with_cache(store: MemoryStore, cache: Arc<dyn SnapshotCache>, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            cache,
            config: Arc::new(config),
        }
    }
}

/// Build the application router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/logs", get(sse_logs))
        .merge(products::router())
        .merge(orders::router())
        .merge(exports::router())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Seed the store, bind and serve until Ctrl-C or SIGTERM.
pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = match &config.fixture {
        Some(path) => {
            let store = MemoryStore::from_fixture(Fixture::from_file(path)?)?;
            tracing::info!(
                fixture = %path.display(),
                users = store.list_users()?.len(),
                products = store.list_products()?.len(),
                orders = store.list_orders()?.len(),
                "store seeded"
            );
            store
        }
        None => MemoryStore::new(),
    };

    let addr = config.addr();
    let app = build_router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "storefront server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "storefront",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// SSE endpoint streaming activity entries.
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // Lagged receivers skip what they missed.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// An uploaded file.
pub(super) struct Upload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Read the `file` field of a multipart body.
pub(super) async fn read_upload(mut multipart: Multipart) -> ServerResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;

        return Ok(Upload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    Err(ServerError::BadRequest("No file provided".into()))
}
