//! `/api/products` handlers.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

use super::logs::{log_success, log_warning};
use super::server::{read_upload, AppState};
use super::types::{product_views, ProductInput, ProductPatch, ProductView, UploadParams};
use crate::cache::get_or_compute;
use crate::error::ServerResult;
use crate::exporter::{attach_download_headers, export_to_vec, ExportSpec};
use crate::importer::import_bytes;
use crate::models::{Product, ProductId};
use crate::query::ListQuery;

/// Columns of the products CSV download.
pub const EXPORT_FIELDS: [&str; 4] = ["name", "price", "description", "discount"];

pub const EXPORT_FILENAME: &str = "products-export.csv";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list).post(create))
        .route("/api/products/download_csv", get(download_csv))
        .route("/api/products/upload_csv", post(upload_csv))
        .route(
            "/api/products/{id}",
            get(retrieve).put(replace).patch(patch).delete(destroy),
        )
}

/// Filtered, sorted product list. Responses are cached per query.
async fn list(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ServerResult<Json<Value>> {
    let query = ListQuery::from_params(params);
    let key = query.cache_key::<Product>("products_list");

    let body = get_or_compute(
        state.cache.as_ref(),
        &key,
        state.config.product_list_ttl(),
        || -> ServerResult<Value> {
            let products = query.apply(state.store.list_products()?)?;
            Ok(serde_json::to_value(product_views(&products))?)
        },
    )?;

    Ok(Json(body))
}

async fn retrieve(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> ServerResult<Json<ProductView>> {
    let product = state.store.get_product(id)?;
    Ok(Json(ProductView::from(&product)))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> ServerResult<(StatusCode, Json<ProductView>)> {
    let product = state.store.create_product(input.into_product())?;
    Ok((StatusCode::CREATED, Json(ProductView::from(&product))))
}

async fn replace(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> ServerResult<Json<ProductView>> {
    let existing = state.store.get_product(id)?;
    let mut product = input.into_product();
    product.created_by = existing.created_by;

    let product = state.store.update_product(id, product)?;
    Ok(Json(ProductView::from(&product)))
}

async fn patch(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(patch): Json<ProductPatch>,
) -> ServerResult<Json<ProductView>> {
    let mut product = state.store.get_product(id)?;
    patch.apply(&mut product);

    let product = state.store.update_product(id, product)?;
    Ok(Json(ProductView::from(&product)))
}

async fn destroy(State(state): State<AppState>, Path(id): Path<ProductId>) -> ServerResult<StatusCode> {
    state.store.delete_product(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// CSV download of the filtered product list.
async fn download_csv(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ServerResult<impl IntoResponse> {
    let spec = ExportSpec::<Product>::new(EXPORT_FIELDS)?;
    let products = ListQuery::from_params(params).apply(state.store.list_products()?)?;
    let body = export_to_vec(&products, &spec)?;

    let mut headers = HeaderMap::new();
    attach_download_headers(&mut headers, EXPORT_FILENAME)?;
    Ok((headers, body))
}

/// Bulk import of a CSV upload. Returns the created products.
async fn upload_csv(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> ServerResult<Json<Vec<ProductView>>> {
    let upload = read_upload(multipart).await?;
    let encoding = params
        .encoding
        .unwrap_or_else(|| state.config.default_encoding.clone());

    let store = state.store.as_ref();
    let products = import_bytes::<Product>(&upload.bytes, &encoding, store, store)
        .inspect_err(|e| log_warning(format!("Product import rejected: {}", e)))?;

    log_success(format!(
        "Imported {} products from {}",
        products.len(),
        upload.file_name.as_deref().unwrap_or("upload")
    ));
    Ok(Json(product_views(&products)))
}
