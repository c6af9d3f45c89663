//! # Storefront - shop backend with CSV bulk import/export
//!
//! Products and orders are managed through a REST API. Whole CSV files can be
//! imported in one all-or-nothing batch, and filtered lists downloaded as CSV.
//! JSON snapshots of the catalogue and of a user's orders are served through a
//! keyed TTL cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV upload │────▶│   Parser    │────▶│  Importer   │────▶│    Store    │
//! │ (any enc.)  │     │ (decode+csv)│     │ (FK + rows) │     │ (one batch) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                     │
//!       ┌─────────────┐     ┌─────────────┐     ┌─────────────┐       │
//!       │  text/csv   │◀────│  Exporter   │◀────│    Query    │◀──────┤
//!       └─────────────┘     └─────────────┘     └─────────────┘       │
//!       ┌─────────────┐     ┌─────────────┐     ┌─────────────┐       │
//!       │    JSON     │◀────│    Cache    │◀────│  Snapshot   │◀──────┘
//!       └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use storefront::{import_bytes, MemoryStore, Product};
//!
//! let store = MemoryStore::new();
//! let csv = b"name,price\nWidget,9.99\nGadget,19.99\n";
//! let products: Vec<Product> = import_bytes(csv, "utf-8", &store, &store)?;
//! assert_eq!(products.len(), 2);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per area
//! - [`models`] - Users, products, orders, prices
//! - [`parser`] - Decoding and CSV row parsing
//! - [`importer`] - Foreign-key resolution and batch import
//! - [`exporter`] - CSV export and JSON snapshots
//! - [`cache`] - Keyed snapshot cache
//! - [`store`] - Persistence ports and the in-memory store
//! - [`query`] - Search, filters and ordering
//! - [`config`] - Server options
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// CSV in and out
pub mod parser;
pub mod importer;
pub mod exporter;

// Persistence
pub mod store;
pub mod cache;
pub mod query;

// HTTP API
pub mod config;
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExportError, ImportError, QueryError, ServerError, StoreError,
    ExportResult, ImportResult, ServerResult, StoreResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Order, OrderId, Price, Product, ProductId, User, UserId};

// =============================================================================
// Re-exports - Import / Export
// =============================================================================

pub use parser::{decode_content, detect_encoding, parse_bytes, parse_csv, ImportRow, ParseResult};

pub use importer::{import_bytes, import_records, ImportTarget, Resolvers};

pub use exporter::{attach_download_headers, export_rows, export_to_vec, Exportable, ExportSpec};

// =============================================================================
// Re-exports - Store, cache, query
// =============================================================================

pub use store::{BatchStore, Fixture, MemoryStore, UserDirectory};

pub use cache::{compute_and_store, get_or_compute, MemoryCache, SnapshotCache};

pub use query::{ListQuery, Queryable};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use config::Config;

pub use api::{build_router, AppState};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
