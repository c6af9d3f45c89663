//! Domain models for the storefront.
//!
//! - [`User`] - Account that owns orders and creates products
//! - [`Product`] - Item for sale
//! - [`Order`] - A user's order over a set of products
//! - [`Price`] - Fixed-point decimal with two places

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub type UserId = i64;
pub type ProductId = i64;
pub type OrderId = i64;

/// Longest product name the store accepts.
pub const PRODUCT_NAME_MAX_LEN: usize = 100;

/// Longest promocode the store accepts.
pub const PROMOCODE_MAX_LEN: usize = 20;

// =============================================================================
// User
// =============================================================================

/// A user account as seen by the shop.
///
/// Authentication lives elsewhere; the shop only needs the id to resolve
/// foreign keys and the username for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

// =============================================================================
// Price
// =============================================================================

/// Decimal price stored as whole cents.
///
/// Accepts at most two decimal places and eight digits in total
/// (up to `999999.99`). Serializes as a string, e.g. `"9.99"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(i64);

impl Price {
    /// Largest representable value in cents.
    pub const MAX_CENTS: i64 = 99_999_999;

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    /// Lossy float view, used by the user orders snapshot.
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// Error returned when a string is not a valid [`Price`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceParseError(String);

impl fmt::Display for PriceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PriceParseError {}

impl FromStr for Price {
    type Err = PriceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(PriceParseError("empty price".into()));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(PriceParseError(format!("'{}' is not a decimal number", s)));
        }
        if frac.len() > 2 {
            return Err(PriceParseError("more than 2 decimal places".into()));
        }
        if whole.trim_start_matches('0').len() > 6 {
            return Err(PriceParseError("more than 8 digits in total".into()));
        }

        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| PriceParseError("invalid integer part".into()))? };
        let frac_cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| PriceParseError("invalid fraction".into()))? * 10,
            _ => frac.parse().map_err(|_| PriceParseError("invalid fraction".into()))?,
        };

        Ok(Self(whole * 100 + frac_cents))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Accept both "9.99" and 9.99
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        };
        text.parse().map_err(de::Error::custom)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product that can be sold in the shop.
///
/// `id` is `None` until the store assigns one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    #[serde(default)]
    pub id: Option<ProductId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub discount: i16,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub created_by: Option<UserId>,
}

impl Product {
    /// A fresh, unsaved product with defaults for everything but the name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            price: Price::default(),
            discount: 0,
            created_at: Utc::now(),
            archived: false,
            created_by: None,
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order placed by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    #[serde(default)]
    pub id: Option<OrderId>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub promocode: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub user: UserId,
    #[serde(default)]
    pub products: Vec<ProductId>,
}

impl Order {
    /// A fresh, unsaved order for `user`.
    pub fn new(user: UserId) -> Self {
        Self {
            id: None,
            delivery_address: None,
            promocode: String::new(),
            created_at: Utc::now(),
            user,
            products: Vec::new(),
        }
    }
}

/// Parse a boolean the way form inputs spell them.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
