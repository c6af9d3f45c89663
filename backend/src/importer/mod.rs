//! CSV bulk import.
//!
//! Decodes an upload, parses it into header-keyed rows, resolves
//! foreign-key columns, builds one record per row and hands the whole batch
//! to the store in a single all-or-nothing insert.
//!
//! ```text
//! bytes ──▶ decode ──▶ rows ──▶ resolve FKs ──▶ records ──▶ bulk_create
//! ```
//!
//! Which columns are foreign keys is declared per target type through
//! [`ImportTarget::FOREIGN_KEYS`]; the loop in [`build_records`] does not
//! know about any particular column.

mod targets;

use std::io::Read;
use tracing::{debug, info};

use crate::error::{ImportError, ImportResult};
use crate::models::User;
use crate::parser::{parse_bytes, ImportRow};
use crate::store::{BatchStore, UserDirectory};

// =============================================================================
// Foreign keys
// =============================================================================

/// Table a foreign-key column points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    User,
}

impl Relation {
    pub fn entity(self) -> &'static str {
        match self {
            Relation::User => "User",
        }
    }
}

/// A column whose value is the primary key of a row in another table.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub column: &'static str,
    pub relation: Relation,
}

/// A resolved foreign-key value.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    User(User),
}

/// Collaborators used to resolve foreign keys.
#[derive(Clone, Copy)]
pub struct Resolvers<'a> {
    pub users: &'a dyn UserDirectory,
}

impl Resolvers<'_> {
    fn resolve(&self, relation: Relation, id: i64) -> ImportResult<Option<Reference>> {
        let found = match relation {
            Relation::User => self
                .users
                .find_user(id)
                .map_err(ImportError::Lookup)?
                .map(Reference::User),
        };
        Ok(found)
    }
}

// =============================================================================
// Rows and targets
// =============================================================================

/// An [`ImportRow`] whose foreign-key columns have been looked up.
#[derive(Debug, Clone)]
pub struct ResolvedRow {
    row: ImportRow,
    references: Vec<(&'static str, Reference)>,
}

impl ResolvedRow {
    pub fn line(&self) -> usize {
        self.row.line
    }

    /// Raw text of every column, in header order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.row.iter()
    }

    pub fn reference(&self, column: &str) -> Option<&Reference> {
        self.references
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, r)| r)
    }

    /// The user a foreign-key column resolved to.
    pub fn user(&self, column: &str) -> ImportResult<&User> {
        match self.reference(column) {
            Some(Reference::User(user)) => Ok(user),
            None => Err(ImportError::malformed(
                self.line(),
                column,
                self.row.get(column).unwrap_or_default(),
                "column is not a resolved user reference",
            )),
        }
    }

    /// Error for a value that does not parse.
    pub fn malformed(&self, column: &str, value: &str, message: impl Into<String>) -> ImportError {
        ImportError::malformed(self.line(), column, value, message)
    }

    /// Error for a column the target does not have.
    pub fn unknown_column(&self, column: &str, entity: &'static str) -> ImportError {
        ImportError::UnknownColumn {
            line: self.line(),
            column: column.to_string(),
            entity,
        }
    }
}

/// A record type that can be built from a CSV row.
pub trait ImportTarget: Sized {
    /// Name used in error messages.
    const ENTITY: &'static str;

    /// Columns resolved through [`Resolvers`] before construction.
    const FOREIGN_KEYS: &'static [ForeignKey];

    fn from_row(row: &ResolvedRow) -> ImportResult<Self>;
}

/// Look up every declared foreign-key column of `row`.
pub fn resolve_row<T: ImportTarget>(row: ImportRow, resolvers: Resolvers<'_>) -> ImportResult<ResolvedRow> {
    let mut references = Vec::new();

    for fk in T::FOREIGN_KEYS {
        let Some(raw) = row.get(fk.column) else {
            continue;
        };

        let id: i64 = raw.trim().parse().map_err(|_| {
            ImportError::malformed(row.line, fk.column, raw, "expected an integer id")
        })?;

        let reference = resolvers.resolve(fk.relation, id)?.ok_or_else(|| {
            ImportError::ReferenceResolution {
                line: row.line,
                column: fk.column.to_string(),
                entity: fk.relation.entity(),
                id,
            }
        })?;
        references.push((fk.column, reference));
    }

    Ok(ResolvedRow { row, references })
}

/// Build one record per row. Stops at the first bad row.
pub fn build_records<T: ImportTarget>(rows: Vec<ImportRow>, resolvers: Resolvers<'_>) -> ImportResult<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            let resolved = resolve_row::<T>(row, resolvers)?;
            T::from_row(&resolved)
        })
        .collect()
}

// =============================================================================
// Entry points
// =============================================================================

/// Import every row of a CSV upload as `T` and persist them in one batch.
///
/// Any decode, parse, resolution or construction error aborts before the
/// store is touched. If the store rejects the batch nothing is persisted
/// and [`ImportError::BatchPersist`] is returned.
pub fn import_records<T, R>(
    mut reader: R,
    encoding: &str,
    store: &dyn BatchStore<T>,
    users: &dyn UserDirectory,
) -> ImportResult<Vec<T>>
where
    T: ImportTarget,
    R: Read,
{
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    import_bytes(&bytes, encoding, store, users)
}

/// Same as [`import_records`] for an in-memory buffer.
pub fn import_bytes<T: ImportTarget>(
    bytes: &[u8],
    encoding: &str,
    store: &dyn BatchStore<T>,
    users: &dyn UserDirectory,
) -> ImportResult<Vec<T>> {
    let parsed = parse_bytes(bytes, encoding)?;
    debug!(
        entity = T::ENTITY,
        encoding = %parsed.encoding,
        rows = parsed.rows.len(),
        columns = ?parsed.headers,
        "parsed CSV upload"
    );

    let records = build_records::<T>(parsed.rows, Resolvers { users })?;
    let count = records.len();

    let persisted = store.bulk_create(records).map_err(ImportError::BatchPersist)?;
    info!(entity = T::ENTITY, count, "bulk import committed");

    Ok(persisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{Order, Product};
    use crate::store::MemoryStore;

    #[test]
    fn test_products_scenario() {
        let store = MemoryStore::new();
        let csv = "name,price\nWidget,9.99\nGadget,19.99\n";

        let products: Vec<Product> = import_records(csv.as_bytes(), "utf-8", &store, &store).unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "Widget");
        assert_eq!(products[0].price.to_string(), "9.99");
        assert_eq!(products[1].name, "Gadget");
        assert_eq!(products[1].price.to_string(), "19.99");
        assert_eq!(store.list_products().unwrap().len(), 2);
    }

    #[test]
    fn test_batch_size_matches_rows() {
        let store = MemoryStore::new();
        let mut csv = String::from("name,price,discount\n");
        for i in 0..25 {
            csv.push_str(&format!("Item {i},{i}.50,{}\n", i % 10));
        }

        let products: Vec<Product> = import_bytes(csv.as_bytes(), "utf-8", &store, &store).unwrap();
        assert_eq!(products.len(), 25);
        assert_eq!(store.list_products().unwrap().len(), 25);
    }

    #[test]
    fn test_order_user_is_resolved() {
        let store = MemoryStore::new();
        let bob = store.create_user("bob").unwrap();
        let csv = format!("delivery_address,promocode,user\n\"Main st, 1\",SALE,{}\n", bob.id);

        let orders: Vec<Order> = import_bytes(csv.as_bytes(), "utf-8", &store, &store).unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].user, bob.id);
        assert_eq!(orders[0].delivery_address.as_deref(), Some("Main st, 1"));
        assert_eq!(orders[0].promocode, "SALE");
    }

    #[test]
    fn test_missing_user_aborts_whole_batch() {
        let store = MemoryStore::new();
        let bob = store.create_user("bob").unwrap();
        let csv = format!("promocode,user\nA,{}\nB,999\nC,{}\n", bob.id, bob.id);

        let err = import_bytes::<Order>(csv.as_bytes(), "utf-8", &store, &store).unwrap_err();

        match err {
            ImportError::ReferenceResolution { line, column, id, .. } => {
                assert_eq!(line, 3);
                assert_eq!(column, "user");
                assert_eq!(id, 999);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.list_orders().unwrap().is_empty());
    }

    #[test]
    fn test_non_integer_user_is_malformed() {
        let store = MemoryStore::new();
        let err = import_bytes::<Order>(b"user\nbob\n", "utf-8", &store, &store).unwrap_err();
        assert!(matches!(err, ImportError::MalformedValue { ref column, .. } if column == "user"));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let store = MemoryStore::new();
        let err = import_bytes::<Product>(b"name,colour\nLamp,red\n", "utf-8", &store, &store).unwrap_err();
        assert!(matches!(err, ImportError::UnknownColumn { ref column, .. } if column == "colour"));
    }

    #[test]
    fn test_store_rejection_persists_nothing() {
        let store = MemoryStore::new();
        let long_code = "X".repeat(30);
        let bob = store.create_user("bob").unwrap();
        let csv = format!("promocode,user\nOK,{0}\n{1},{0}\n", bob.id, long_code);

        let err = import_bytes::<Order>(csv.as_bytes(), "utf-8", &store, &store).unwrap_err();

        assert!(matches!(
            err,
            ImportError::BatchPersist(StoreError::Constraint { index: 1, .. })
        ));
        assert!(store.list_orders().unwrap().is_empty());
    }

    #[test]
    fn test_encoding_is_honoured() {
        let store = MemoryStore::new();
        // "Café" in windows-1252
        let bytes: &[u8] = b"name,price\nCaf\xE9,3\n";

        assert!(matches!(
            import_bytes::<Product>(bytes, "utf-8", &store, &store),
            Err(ImportError::Encoding { .. })
        ));

        let products: Vec<Product> = import_bytes(bytes, "windows-1252", &store, &store).unwrap();
        assert_eq!(products[0].name, "Café");
    }
}
