//! JSON fixtures for seeding the store.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::models::{Order, Product, User};

/// Seed data: users, products and orders.
///
/// ```json
/// {
///   "users": [{ "id": 1, "username": "bob" }],
///   "products": [{ "name": "Lamp", "price": "19.99", "created_by": 1 }],
///   "orders": [{ "user": 1, "products": [1] }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

impl Fixture {
    pub fn from_json(content: &str) -> StoreResult<Self> {
        serde_json::from_str(content).map_err(|e| StoreError::Fixture(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Fixture(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }
}
