//! JSON snapshot shapes.
//!
//! Field order of each struct is the key order in the JSON output.

use serde::Serialize;
use std::collections::HashMap;

use crate::error::{StoreError, StoreResult};
use crate::models::{OrderId, Price, ProductId, UserId};
use crate::store::{MemoryStore, UserDirectory};

/// Entry of the products export.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductSnapshot {
    pub pk: ProductId,
    pub name: String,
    pub price: Price,
    pub archived: bool,
}

/// Entry of the orders export.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub delivery_address: Option<String>,
    pub promocode: String,
    pub user_id: UserId,
    pub product_id: Vec<ProductId>,
}

/// Entry of a user's orders export.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserOrderSnapshot {
    pub id: OrderId,
    pub delivery_address: Option<String>,
    pub promocode: String,
    pub user_id: UserId,
    pub products: Vec<OrderedProduct>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderedProduct {
    pub id: ProductId,
    pub name: String,
    pub price: f64,
}

/// All products by primary key.
pub fn products_snapshot(store: &MemoryStore) -> StoreResult<Vec<ProductSnapshot>> {
    Ok(store
        .list_products()?
        .into_iter()
        .map(|p| ProductSnapshot {
            pk: p.id.unwrap_or_default(),
            name: p.name,
            price: p.price,
            archived: p.archived,
        })
        .collect())
}

/// All orders by primary key, with the ids of their products.
pub fn orders_snapshot(store: &MemoryStore) -> StoreResult<Vec<OrderSnapshot>> {
    Ok(store
        .list_orders()?
        .into_iter()
        .map(|o| OrderSnapshot {
            id: o.id.unwrap_or_default(),
            delivery_address: o.delivery_address,
            promocode: o.promocode,
            user_id: o.user,
            product_id: o.products,
        })
        .collect())
}

/// Orders of `user_id` by primary key, with product details.
///
/// Fails with [`StoreError::NotFound`] when the user does not exist.
pub fn user_orders_snapshot(store: &MemoryStore, user_id: UserId) -> StoreResult<Vec<UserOrderSnapshot>> {
    store.find_user(user_id)?.ok_or(StoreError::NotFound {
        entity: "User",
        id: user_id,
    })?;

    let catalog: HashMap<ProductId, _> = store
        .list_products()?
        .into_iter()
        .filter_map(|p| p.id.map(|id| (id, p)))
        .collect();

    Ok(store
        .orders_for_user(user_id)?
        .into_iter()
        .map(|o| UserOrderSnapshot {
            id: o.id.unwrap_or_default(),
            delivery_address: o.delivery_address,
            promocode: o.promocode,
            user_id: o.user,
            products: o
                .products
                .iter()
                .filter_map(|id| catalog.get(id))
                .map(|p| OrderedProduct {
                    id: p.id.unwrap_or_default(),
                    name: p.name.clone(),
                    price: p.price.as_f64(),
                })
                .collect(),
        })
        .collect())
}
