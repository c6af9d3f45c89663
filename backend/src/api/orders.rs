//! `/api/orders` handlers.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::logs::{log_success, log_warning};
use super::server::{read_upload, AppState};
use super::types::{order_views, OrderInput, OrderPatch, OrderView, UploadParams};
use crate::error::ServerResult;
use crate::exporter::{attach_download_headers, export_to_vec, ExportSpec};
use crate::importer::import_bytes;
use crate::models::{Order, OrderId};
use crate::query::ListQuery;

/// Columns of the orders CSV download.
pub const EXPORT_FIELDS: [&str; 4] = ["delivery_address", "promocode", "created_at", "user"];

pub const EXPORT_FILENAME: &str = "orders-export.csv";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list).post(create))
        .route("/api/orders/download_csv", get(download_csv))
        .route("/api/orders/upload_csv", post(upload_csv))
        .route(
            "/api/orders/{id}",
            get(retrieve).put(replace).patch(patch).delete(destroy),
        )
}

async fn list(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ServerResult<Json<Vec<OrderView>>> {
    let orders = ListQuery::from_params(params).apply(state.store.list_orders()?)?;
    Ok(Json(order_views(&orders)))
}

async fn retrieve(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> ServerResult<Json<OrderView>> {
    let order = state.store.get_order(id)?;
    Ok(Json(OrderView::from(&order)))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<OrderInput>,
) -> ServerResult<(StatusCode, Json<OrderView>)> {
    let order = state.store.create_order(input.into_order())?;
    Ok((StatusCode::CREATED, Json(OrderView::from(&order))))
}

async fn replace(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(input): Json<OrderInput>,
) -> ServerResult<Json<OrderView>> {
    let order = state.store.update_order(id, input.into_order())?;
    Ok(Json(OrderView::from(&order)))
}

async fn patch(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(patch): Json<OrderPatch>,
) -> ServerResult<Json<OrderView>> {
    let mut order = state.store.get_order(id)?;
    patch.apply(&mut order);

    let order = state.store.update_order(id, order)?;
    Ok(Json(OrderView::from(&order)))
}

async fn destroy(State(state): State<AppState>, Path(id): Path<OrderId>) -> ServerResult<StatusCode> {
    state.store.delete_order(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// CSV download of the filtered order list.
async fn download_csv(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ServerResult<impl IntoResponse> {
    let spec = ExportSpec::<Order>::new(EXPORT_FIELDS)?;
    let orders = ListQuery::from_params(params).apply(state.store.list_orders()?)?;
    let body = export_to_vec(&orders, &spec)?;

    let mut headers = HeaderMap::new();
    attach_download_headers(&mut headers, EXPORT_FILENAME)?;
    Ok((headers, body))
}

/// Bulk import of a CSV upload. Returns the created orders.
async fn upload_csv(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> ServerResult<Json<Vec<OrderView>>> {
    let upload = read_upload(multipart).await?;
    let encoding = params
        .encoding
        .unwrap_or_else(|| state.config.default_encoding.clone());

    let store = state.store.as_ref();
    let orders = import_bytes::<Order>(&upload.bytes, &encoding, store, store)
        .inspect_err(|e| log_warning(format!("Order import rejected: {}", e)))?;

    log_success(format!(
        "Imported {} orders from {}",
        orders.len(),
        upload.file_name.as_deref().unwrap_or("upload")
    ));
    Ok(Json(order_views(&orders)))
}
