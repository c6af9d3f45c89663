//! JSON snapshot exports.
//!
//! The products snapshot is recomputed on every request and the result kept
//! in the cache for other readers. A user's orders are served from the cache
//! while the entry is live. The orders snapshot is never cached.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::logs::log_info;
use super::server::AppState;
use crate::cache::{compute_and_store, get_or_compute};
use crate::error::ServerResult;
use crate::exporter::snapshot::{orders_snapshot, products_snapshot, user_orders_snapshot};
use crate::models::UserId;

pub const PRODUCTS_EXPORT_KEY: &str = "products_data_export";

pub fn user_orders_key(user_id: UserId) -> String {
    format!("user_orders_{}", user_id)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products/export", get(products_export))
        .route("/orders/export", get(orders_export))
        .route("/users/{user_id}/orders/export", get(user_orders_export))
}

async fn products_export(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let products = compute_and_store(
        state.cache.as_ref(),
        PRODUCTS_EXPORT_KEY,
        state.config.products_export_ttl(),
        || -> ServerResult<Value> { Ok(serde_json::to_value(products_snapshot(&state.store)?)?) },
    )?;

    log_info("Products snapshot refreshed");
    Ok(Json(json!({ "products": products })))
}

async fn orders_export(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let orders = orders_snapshot(&state.store)?;
    Ok(Json(json!({ "orders": orders })))
}

async fn user_orders_export(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ServerResult<Json<Value>> {
    let orders = get_or_compute(
        state.cache.as_ref(),
        &user_orders_key(user_id),
        state.config.user_orders_ttl(),
        || -> ServerResult<Value> {
            Ok(serde_json::to_value(user_orders_snapshot(&state.store, user_id)?)?)
        },
    )?;

    Ok(Json(json!({ "orders": orders })))
}
