//! Persistence ports and the in-memory store behind them.
//!
//! The import pipeline only sees two ports:
//!
//! - [`UserDirectory`] - resolves user ids for foreign-key columns
//! - [`BatchStore`] - inserts a batch of records atomically
//!
//! [`MemoryStore`] implements both, plus the CRUD the REST layer needs.
//! All tables sit behind a single `RwLock`, so a batch is validated and
//! committed under one write guard and a rejected batch leaves no trace.

mod fixtures;

pub use fixtures::Fixture;

use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{StoreError, StoreResult};
use crate::models::{
    Order, OrderId, Product, ProductId, User, UserId, PRODUCT_NAME_MAX_LEN, PROMOCODE_MAX_LEN,
};

// =============================================================================
// Ports
// =============================================================================

/// Lookup of users by primary key.
pub trait UserDirectory: Send + Sync {
    fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;
}

/// All-or-nothing insert of many records.
///
/// Implementations either persist every record and return them with ids
/// assigned, or persist none and return the error. Records keep the
/// `created_at` they carry.
pub trait BatchStore<T>: Send + Sync {
    fn bulk_create(&self, records: Vec<T>) -> StoreResult<Vec<T>>;
}

// =============================================================================
// Memory store
// =============================================================================

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    last_user_id: UserId,
    last_product_id: ProductId,
    last_order_id: OrderId,
}

impl Tables {
    fn check_product(&self, product: &Product) -> Result<(), String> {
        if product.name.chars().count() > PRODUCT_NAME_MAX_LEN {
            return Err(format!("name longer than {} characters", PRODUCT_NAME_MAX_LEN));
        }
        if !(0..=100).contains(&product.discount) {
            return Err(format!("discount {} outside 0..=100", product.discount));
        }
        if let Some(user) = product.created_by {
            if !self.users.contains_key(&user) {
                return Err(format!("created_by references missing user {}", user));
            }
        }
        Ok(())
    }

    fn check_order(&self, order: &Order) -> Result<(), String> {
        if order.promocode.chars().count() > PROMOCODE_MAX_LEN {
            return Err(format!("promocode longer than {} characters", PROMOCODE_MAX_LEN));
        }
        if !self.users.contains_key(&order.user) {
            return Err(format!("user references missing user {}", order.user));
        }
        if let Some(missing) = order.products.iter().find(|p| !self.products.contains_key(p)) {
            return Err(format!("products references missing product {}", missing));
        }
        Ok(())
    }

    /// Validate then insert `batch`. With `stamp`, `created_at` is set to the
    /// insert time.
    fn insert_products(&mut self, mut batch: Vec<Product>, stamp: bool) -> StoreResult<Vec<Product>> {
        let mut taken: HashSet<ProductId> = HashSet::new();
        let mut next_id = self.last_product_id;

        for (index, product) in batch.iter_mut().enumerate() {
            let constraint = move |message: String| StoreError::Constraint {
                entity: "Product",
                index,
                message,
            };

            self.check_product(product).map_err(constraint)?;

            let id = match product.id {
                Some(id) if id <= 0 => {
                    return Err(constraint(format!("id {} is not positive", id)));
                }
                Some(id) => id,
                None => {
                    next_id = next_free_id(&self.products, &taken, next_id)
                        .ok_or_else(|| constraint("id sequence exhausted".to_string()))?;
                    next_id
                }
            };
            if self.products.contains_key(&id) || !taken.insert(id) {
                return Err(constraint(format!("duplicate id {}", id)));
            }
            product.id = Some(id);
        }

        // Validation passed for every record; commit.
        let now = Utc::now();
        for product in &mut batch {
            if stamp {
                product.created_at = now;
            }
            if let Some(id) = product.id {
                self.last_product_id = self.last_product_id.max(id);
                self.products.insert(id, product.clone());
            }
        }
        Ok(batch)
    }

    fn insert_orders(&mut self, mut batch: Vec<Order>, stamp: bool) -> StoreResult<Vec<Order>> {
        let mut taken: HashSet<OrderId> = HashSet::new();
        let mut next_id = self.last_order_id;

        for (index, order) in batch.iter_mut().enumerate() {
            let constraint = move |message: String| StoreError::Constraint {
                entity: "Order",
                index,
                message,
            };

            self.check_order(order).map_err(constraint)?;

            let id = match order.id {
                Some(id) if id <= 0 => {
                    return Err(constraint(format!("id {} is not positive", id)));
                }
                Some(id) => id,
                None => {
                    next_id = next_free_id(&self.orders, &taken, next_id)
                        .ok_or_else(|| constraint("id sequence exhausted".to_string()))?;
                    next_id
                }
            };
            if self.orders.contains_key(&id) || !taken.insert(id) {
                return Err(constraint(format!("duplicate id {}", id)));
            }
            order.id = Some(id);
        }

        let now = Utc::now();
        for order in &mut batch {
            if stamp {
                order.created_at = now;
            }
            if let Some(id) = order.id {
                self.last_order_id = self.last_order_id.max(id);
                self.orders.insert(id, order.clone());
            }
        }
        Ok(batch)
    }
}

/// First id after `last` that is neither stored nor `taken`. `None` once the
/// id space is exhausted.
fn next_free_id<V>(table: &BTreeMap<i64, V>, taken: &HashSet<i64>, last: i64) -> Option<i64> {
    let mut id = last.checked_add(1)?;
    while table.contains_key(&id) || taken.contains(&id) {
        id = id.checked_add(1)?;
    }
    Some(id)
}

/// In-memory relational store for users, products and orders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded from a fixture.
    pub fn from_fixture(fixture: Fixture) -> StoreResult<Self> {
        let store = Self::new();
        store.load_fixture(fixture)?;
        Ok(store)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    /// Insert fixture rows. Users first, then products, then orders, each
    /// table as one batch.
    pub fn load_fixture(&self, fixture: Fixture) -> StoreResult<()> {
        for user in fixture.users {
            self.insert_user(user)?;
        }
        let mut tables = self.write()?;
        tables.insert_products(fixture.products, false)?;
        tables.insert_orders(fixture.orders, false)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    /// Create a user with the next free id.
    pub fn create_user(&self, username: impl Into<String>) -> StoreResult<User> {
        let mut tables = self.write()?;
        let id = tables
            .last_user_id
            .checked_add(1)
            .ok_or_else(|| StoreError::Constraint {
                entity: "User",
                index: 0,
                message: "id sequence exhausted".into(),
            })?;
        let user = User {
            id,
            username: username.into(),
        };
        tables.last_user_id = id;
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    /// Insert a user with an explicit id.
    pub fn insert_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.write()?;
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Constraint {
                entity: "User",
                index: 0,
                message: format!("duplicate id {}", user.id),
            });
        }
        tables.last_user_id = tables.last_user_id.max(user.id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// All products in primary key order.
    pub fn list_products(&self) -> StoreResult<Vec<Product>> {
        Ok(self.read()?.products.values().cloned().collect())
    }

    pub fn get_product(&self, id: ProductId) -> StoreResult<Product> {
        self.read()?
            .products
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "Product",
                id,
            })
    }

    pub fn create_product(&self, product: Product) -> StoreResult<Product> {
        let mut created = self.write()?.insert_products(vec![product], true)?;
        created
            .pop()
            .ok_or_else(|| StoreError::Unavailable("empty insert result".into()))
    }

    /// Replace the stored product with `id`. The id and creation time are
    /// kept from the stored row.
    pub fn update_product(&self, id: ProductId, mut product: Product) -> StoreResult<Product> {
        let mut tables = self.write()?;
        let existing = tables.products.get(&id).ok_or(StoreError::NotFound {
            entity: "Product",
            id,
        })?;
        product.id = Some(id);
        product.created_at = existing.created_at;
        tables
            .check_product(&product)
            .map_err(|message| StoreError::Constraint {
                entity: "Product",
                index: 0,
                message,
            })?;
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    pub fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        let mut tables = self.write()?;
        // Deleting a product removes it from the orders that reference it.
        for order in tables.orders.values_mut() {
            order.products.retain(|p| *p != id);
        }
        tables
            .products
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                entity: "Product",
                id,
            })
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// All orders in primary key order.
    pub fn list_orders(&self) -> StoreResult<Vec<Order>> {
        Ok(self.read()?.orders.values().cloned().collect())
    }

    pub fn get_order(&self, id: OrderId) -> StoreResult<Order> {
        self.read()?
            .orders
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "Order", id })
    }

    pub fn create_order(&self, order: Order) -> StoreResult<Order> {
        let mut created = self.write()?.insert_orders(vec![order], true)?;
        created
            .pop()
            .ok_or_else(|| StoreError::Unavailable("empty insert result".into()))
    }

    pub fn update_order(&self, id: OrderId, mut order: Order) -> StoreResult<Order> {
        let mut tables = self.write()?;
        let existing = tables
            .orders
            .get(&id)
            .ok_or(StoreError::NotFound { entity: "Order", id })?;
        order.id = Some(id);
        order.created_at = existing.created_at;
        tables
            .check_order(&order)
            .map_err(|message| StoreError::Constraint {
                entity: "Order",
                index: 0,
                message,
            })?;
        tables.orders.insert(id, order.clone());
        Ok(order)
    }

    pub fn delete_order(&self, id: OrderId) -> StoreResult<()> {
        self.write()?
            .orders
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound { entity: "Order", id })
    }

    /// Orders of one user in primary key order.
    pub fn orders_for_user(&self, user: UserId) -> StoreResult<Vec<Order>> {
        Ok(self
            .read()?
            .orders
            .values()
            .filter(|o| o.user == user)
            .cloned()
            .collect())
    }
}

impl UserDirectory for MemoryStore {
    fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }
}

impl BatchStore<Product> for MemoryStore {
    fn bulk_create(&self, records: Vec<Product>) -> StoreResult<Vec<Product>> {
        self.write()?.insert_products(records, false)
    }
}

impl BatchStore<Order> for MemoryStore {
    fn bulk_create(&self, records: Vec<Order>) -> StoreResult<Vec<Order>> {
        self.write()?.insert_orders(records, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Price;

    fn product(name: &str, cents: i64) -> Product {
        let mut p = Product::new(name);
        p.price = Price::from_cents(cents);
        p
    }

    #[test]
    fn test_bulk_create_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let created = store
            .bulk_create(vec![product("Widget", 999), product("Gadget", 1999)])
            .unwrap();

        assert_eq!(created[0].id, Some(1));
        assert_eq!(created[1].id, Some(2));
        assert_eq!(store.list_products().unwrap().len(), 2);
    }

    #[test]
    fn test_bulk_create_is_all_or_nothing() {
        let store = MemoryStore::new();
        let mut bad = product("Broken", 100);
        bad.discount = 150;

        let err = store
            .bulk_create(vec![product("Fine", 100), bad])
            .unwrap_err();

        match err {
            StoreError::Constraint { entity, index, .. } => {
                assert_eq!(entity, "Product");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.list_products().unwrap().is_empty());
    }

    #[test]
    fn test_bulk_create_rejects_duplicate_ids_in_batch() {
        let store = MemoryStore::new();
        let mut a = product("A", 100);
        a.id = Some(7);
        let mut b = product("B", 100);
        b.id = Some(7);

        assert!(store.bulk_create(vec![a, b]).is_err());
        assert!(store.list_products().unwrap().is_empty());
    }

    #[test]
    fn test_generated_ids_skip_explicit_ones() {
        let store = MemoryStore::new();
        let mut explicit = product("Explicit", 100);
        explicit.id = Some(1);

        let created = store
            .bulk_create(vec![product("Auto", 100), explicit])
            .unwrap_err();
        // Auto took id 1 first, so the explicit duplicate is rejected.
        assert!(matches!(created, StoreError::Constraint { index: 1, .. }));

        let mut explicit = product("Explicit", 100);
        explicit.id = Some(1);
        let created = store
            .bulk_create(vec![explicit, product("Auto", 100)])
            .unwrap();
        assert_eq!(created[1].id, Some(2));
    }

    #[test]
    fn test_id_sequence_exhaustion_is_a_constraint() {
        let store = MemoryStore::new();
        let mut last = product("Last", 100);
        last.id = Some(i64::MAX);
        store.bulk_create(vec![last]).unwrap();

        let err = store.bulk_create(vec![product("Next", 100)]).unwrap_err();
        assert!(matches!(err, StoreError::Constraint { index: 0, .. }));

        // The store stays usable.
        assert_eq!(store.list_products().unwrap().len(), 1);
        let mut explicit = product("Explicit", 100);
        explicit.id = Some(3);
        assert_eq!(store.bulk_create(vec![explicit]).unwrap()[0].id, Some(3));
    }

    #[test]
    fn test_non_positive_ids_are_rejected() {
        let store = MemoryStore::new();
        let user = store.create_user("bob").unwrap();

        for id in [0, -1, i64::MIN] {
            let mut p = product("Zero", 100);
            p.id = Some(id);
            assert!(matches!(
                store.bulk_create(vec![p]),
                Err(StoreError::Constraint { .. })
            ));

            let mut o = Order::new(user.id);
            o.id = Some(id);
            assert!(matches!(
                store.bulk_create(vec![o]),
                Err(StoreError::Constraint { .. })
            ));
        }
        assert!(store.list_products().unwrap().is_empty());
    }

    #[test]
    fn test_bulk_create_keeps_created_at() {
        let store = MemoryStore::new();
        let mut old = product("Old", 100);
        old.created_at = "2020-01-01T00:00:00Z".parse().unwrap();

        let created = store.bulk_create(vec![old.clone()]).unwrap();
        assert_eq!(created[0].created_at, old.created_at);
        assert_eq!(store.get_product(1).unwrap().created_at, old.created_at);
    }

    #[test]
    fn test_order_requires_existing_user_and_products() {
        let store = MemoryStore::new();
        let user = store.create_user("bob").unwrap();

        let mut order = Order::new(user.id);
        order.products = vec![42];
        assert!(store.create_order(order).is_err());

        let orphan = Order::new(99);
        assert!(store.create_order(orphan).is_err());

        let ok = store.create_order(Order::new(user.id)).unwrap();
        assert_eq!(ok.id, Some(1));
        assert_eq!(store.orders_for_user(user.id).unwrap().len(), 1);
    }

    #[test]
    fn test_update_keeps_id_and_created_at() {
        let store = MemoryStore::new();
        let created = store.create_product(product("Old", 100)).unwrap();

        let updated = store
            .update_product(1, product("New", 250))
            .unwrap();
        assert_eq!(updated.id, Some(1));
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(store.get_product(1).unwrap().name, "New");
    }

    #[test]
    fn test_delete_product_detaches_from_orders() {
        let store = MemoryStore::new();
        let user = store.create_user("bob").unwrap();
        let p = store.create_product(product("Lamp", 100)).unwrap();
        let mut order = Order::new(user.id);
        order.products = vec![p.id.unwrap()];
        let order = store.create_order(order).unwrap();

        store.delete_product(p.id.unwrap()).unwrap();

        assert!(store.get_order(order.id.unwrap()).unwrap().products.is_empty());
        assert!(matches!(
            store.get_product(p.id.unwrap()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_find_user() {
        let store = MemoryStore::new();
        let user = store.create_user("alice").unwrap();
        assert_eq!(store.find_user(user.id).unwrap(), Some(user));
        assert_eq!(store.find_user(404).unwrap(), None);
    }
}
