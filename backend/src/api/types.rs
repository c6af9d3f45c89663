//! REST API types.
//!
//! Serialized views of the models, request bodies and the JSON error
//! response every handler falls back to.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ExportError, ImportError, ServerError, StoreError};
use crate::models::{Order, OrderId, Price, Product, ProductId, UserId};

// =============================================================================
// Errors
// =============================================================================

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        use ServerError as E;

        match self {
            E::Import(err) => match err {
                ImportError::Lookup(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
                ImportError::BatchPersist(StoreError::Constraint { .. }) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "CONSTRAINT_VIOLATION")
                }
                ImportError::BatchPersist(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
                _ => (StatusCode::BAD_REQUEST, "IMPORT_ERROR"),
            },
            E::Export(ExportError::UnknownField { .. }) => (StatusCode::BAD_REQUEST, "EXPORT_ERROR"),
            E::Export(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            E::Store(err) => match err {
                StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                StoreError::Constraint { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "CONSTRAINT_VIOLATION")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            E::Query(_) => (StatusCode::BAD_REQUEST, "INVALID_FILTER"),
            E::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            E::Serialization(_) | E::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "An internal error occurred".to_string()
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
            self.to_string()
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Views
// =============================================================================

/// A product as returned by the REST API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductView {
    pub pk: ProductId,
    pub name: String,
    pub price: Price,
    pub description: String,
    pub discount: i16,
    pub created_at: DateTime<Utc>,
    pub archived: bool,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        Self {
            pk: p.id.unwrap_or_default(),
            name: p.name.clone(),
            price: p.price,
            description: p.description.clone(),
            discount: p.discount,
            created_at: p.created_at,
            archived: p.archived,
        }
    }
}

/// An order as returned by the REST API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderView {
    pub id: OrderId,
    pub delivery_address: Option<String>,
    pub promocode: String,
    pub created_at: DateTime<Utc>,
    pub user: UserId,
    pub products: Vec<ProductId>,
}

impl From<&Order> for OrderView {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id.unwrap_or_default(),
            delivery_address: o.delivery_address.clone(),
            promocode: o.promocode.clone(),
            created_at: o.created_at,
            user: o.user,
            products: o.products.clone(),
        }
    }
}

pub fn product_views(products: &[Product]) -> Vec<ProductView> {
    products.iter().map(ProductView::from).collect()
}

pub fn order_views(orders: &[Order]) -> Vec<OrderView> {
    orders.iter().map(OrderView::from).collect()
}

// =============================================================================
// Request bodies
// =============================================================================

/// Body of `POST` and `PUT` on products.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub discount: i16,
    #[serde(default)]
    pub archived: bool,
}

impl ProductInput {
    pub fn into_product(self) -> Product {
        let mut product = Product::new(self.name);
        product.price = self.price;
        product.description = self.description;
        product.discount = self.discount;
        product.archived = self.archived;
        product
    }
}

/// Body of `PATCH` on products. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<Price>,
    pub description: Option<String>,
    pub discount: Option<i16>,
    pub archived: Option<bool>,
}

impl ProductPatch {
    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(discount) = self.discount {
            product.discount = discount;
        }
        if let Some(archived) = self.archived {
            product.archived = archived;
        }
    }
}

/// Body of `POST` and `PUT` on orders.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderInput {
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub promocode: String,
    pub user: UserId,
    #[serde(default)]
    pub products: Vec<ProductId>,
}

impl OrderInput {
    pub fn into_order(self) -> Order {
        let mut order = Order::new(self.user);
        order.delivery_address = self.delivery_address;
        order.promocode = self.promocode;
        order.products = self.products;
        order
    }
}

/// Body of `PATCH` on orders.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderPatch {
    pub delivery_address: Option<String>,
    pub promocode: Option<String>,
    pub user: Option<UserId>,
    pub products: Option<Vec<ProductId>>,
}

impl OrderPatch {
    pub fn apply(self, order: &mut Order) {
        if let Some(address) = self.delivery_address {
            order.delivery_address = (!address.is_empty()).then_some(address);
        }
        if let Some(code) = self.promocode {
            order.promocode = code;
        }
        if let Some(user) = self.user {
            order.user = user;
        }
        if let Some(products) = self.products {
            order.products = products;
        }
    }
}

/// Query string of the upload endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadParams {
    /// Encoding label, or `auto`.
    pub encoding: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

    fn status_of(err: impl Into<ServerError>) -> StatusCode {
        let err: ServerError = err.into();
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(StoreError::NotFound { entity: "Product", id: 1 }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ImportError::malformed(2, "price", "x", "bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ImportError::BatchPersist(StoreError::Constraint {
                entity: "Order",
                index: 0,
                message: "too long".into(),
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(QueryError::InvalidFilter {
                field: "discount".into(),
                value: "x".into(),
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServerError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_product_view_shape() {
        let mut product = Product::new("Lamp");
        product.id = Some(4);
        product.price = Price::from_cents(999);

        let value = serde_json::to_value(ProductView::from(&product)).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();

        assert_eq!(
            keys,
            ["pk", "name", "price", "description", "discount", "created_at", "archived"]
        );
        assert_eq!(value["price"], "9.99");
    }

    #[test]
    fn test_patch_leaves_missing_fields() {
        let mut product = Product::new("Lamp");
        product.discount = 10;

        let patch: ProductPatch = serde_json::from_str(r#"{"price": "5.50"}"#).unwrap();
        patch.apply(&mut product);

        assert_eq!(product.name, "Lamp");
        assert_eq!(product.discount, 10);
        assert_eq!(product.price.cents(), 550);
    }
}
