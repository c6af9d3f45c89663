//! Search, exact-match filters and ordering for list endpoints.
//!
//! A [`ListQuery`] is parsed from the raw query-string pairs:
//!
//! - `search=a b,c` - every term must occur (case-insensitive) in one of the
//!   type's search fields
//! - `ordering=-price,name` - sort keys, `-` for descending
//! - any other pair is an exact-match filter when the type knows the field,
//!   and ignored otherwise
//!
//! What a type exposes is declared through [`Queryable`].

use chrono::{DateTime, Utc};
use serde_json::json;
use std::cmp::Ordering;

use crate::error::QueryError;
use crate::models::{parse_bool, Order, Price, Product};

pub const SEARCH_PARAM: &str = "search";
pub const ORDERING_PARAM: &str = "ordering";

/// Match predicate built from one filter parameter.
pub type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// A record type that list endpoints can search, filter and sort.
pub trait Queryable: Sized {
    /// Fields `search` terms are matched against.
    const SEARCH_FIELDS: &'static [&'static str];

    /// Fields accepted by `ordering`.
    const ORDERING_FIELDS: &'static [&'static str];

    /// Sort keys used when no valid `ordering` is given.
    const DEFAULT_ORDERING: &'static [&'static str];

    /// Fields accepted as exact-match filters.
    const FILTER_FIELDS: &'static [&'static str];

    /// Text of a search field.
    fn search_text(&self, field: &str) -> Option<&str>;

    /// Build the predicate for `field=value`. `Ok(None)` when `field` is not
    /// filterable.
    fn filter(field: &str, value: &str) -> Result<Option<Predicate<Self>>, QueryError>;

    /// Compare two records on one ordering field.
    fn compare_by(&self, other: &Self, field: &str) -> Ordering;
}

/// One `ordering` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    fn parse(term: &str) -> Option<Self> {
        let term = term.trim();
        let (field, descending) = match term.strip_prefix('-') {
            Some(field) => (field, true),
            None => (term, false),
        };
        (!field.is_empty()).then(|| Self {
            field: field.to_string(),
            descending,
        })
    }
}

/// Parsed list parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Vec<String>,
    pub ordering: Vec<SortKey>,
    pub filters: Vec<(String, String)>,
}

impl ListQuery {
    /// Split raw query pairs into search terms, sort keys and filters.
    pub fn from_params<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::default();

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                SEARCH_PARAM => query.search.extend(
                    value
                        .split(|c: char| c.is_whitespace() || c == ',')
                        .filter(|t| !t.is_empty())
                        .map(str::to_lowercase),
                ),
                ORDERING_PARAM => query
                    .ordering
                    .extend(value.split(',').filter_map(SortKey::parse)),
                _ => query.filters.push((key.to_string(), value.to_string())),
            }
        }

        query
    }

    /// Stable text form, used to key cached list responses.
    ///
    /// Only parameters `T` acts on take part, so ignored filters and sort
    /// keys share the entry of the query without them.
    pub fn cache_key<T: Queryable>(&self, prefix: &str) -> String {
        let mut filters: Vec<&(String, String)> = self
            .filters
            .iter()
            .filter(|(field, _)| T::FILTER_FIELDS.contains(&field.as_str()))
            .collect();
        filters.sort();

        let ordering: Vec<String> = self
            .ordering
            .iter()
            .filter(|k| T::ORDERING_FIELDS.contains(&k.field.as_str()))
            .map(|k| format!("{}{}", if k.descending { "-" } else { "" }, k.field))
            .collect();

        let params = json!({
            "search": self.search,
            "ordering": ordering,
            "filters": filters,
        });
        format!("{prefix}:{params}")
    }

    /// Keep the records that match, sorted.
    ///
    /// Filter values are parsed before any record is looked at, so an invalid
    /// value fails even on an empty collection.
    pub fn apply<T: Queryable>(&self, records: Vec<T>) -> Result<Vec<T>, QueryError> {
        let mut predicates = Vec::new();
        for (field, value) in &self.filters {
            if let Some(predicate) = T::filter(field, value)? {
                predicates.push(predicate);
            }
        }

        let mut kept: Vec<T> = records
            .into_iter()
            .filter(|r| self.matches_search(r))
            .filter(|r| predicates.iter().all(|p| p(r)))
            .collect();

        let mut keys: Vec<SortKey> = self
            .ordering
            .iter()
            .filter(|k| T::ORDERING_FIELDS.contains(&k.field.as_str()))
            .cloned()
            .collect();
        if keys.is_empty() {
            keys = T::DEFAULT_ORDERING
                .iter()
                .filter_map(|f| SortKey::parse(f))
                .collect();
        }

        kept.sort_by(|a, b| {
            keys.iter()
                .map(|k| {
                    let ord = a.compare_by(b, &k.field);
                    if k.descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        Ok(kept)
    }

    fn matches_search<T: Queryable>(&self, record: &T) -> bool {
        self.search.iter().all(|term| {
            T::SEARCH_FIELDS.iter().any(|field| {
                record
                    .search_text(field)
                    .is_some_and(|text| text.to_lowercase().contains(term.as_str()))
            })
        })
    }
}

fn invalid(field: &str, value: &str) -> QueryError {
    QueryError::InvalidFilter {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn parse_filter<V: std::str::FromStr>(field: &str, value: &str) -> Result<V, QueryError> {
    value.trim().parse().map_err(|_| invalid(field, value))
}

// =============================================================================
// Product
// =============================================================================

impl Queryable for Product {
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description"];
    const ORDERING_FIELDS: &'static [&'static str] = &["name", "price", "discount"];
    const DEFAULT_ORDERING: &'static [&'static str] = &["name", "price"];
    const FILTER_FIELDS: &'static [&'static str] =
        &["name", "description", "price", "discount", "archived"];

    fn search_text(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            "description" => Some(&self.description),
            _ => None,
        }
    }

    fn filter(field: &str, value: &str) -> Result<Option<Predicate<Self>>, QueryError> {
        let predicate: Predicate<Self> = match field {
            "name" => {
                let name = value.to_string();
                Box::new(move |p: &Product| p.name == name)
            }
            "description" => {
                let description = value.to_string();
                Box::new(move |p: &Product| p.description == description)
            }
            "price" => {
                let price: Price = parse_filter(field, value)?;
                Box::new(move |p: &Product| p.price == price)
            }
            "discount" => {
                let discount: i16 = parse_filter(field, value)?;
                Box::new(move |p: &Product| p.discount == discount)
            }
            "archived" => {
                let archived = parse_bool(value).ok_or_else(|| invalid(field, value))?;
                Box::new(move |p: &Product| p.archived == archived)
            }
            _ => return Ok(None),
        };
        Ok(Some(predicate))
    }

    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "name" => self.name.cmp(&other.name),
            "price" => self.price.cmp(&other.price),
            "discount" => self.discount.cmp(&other.discount),
            _ => Ordering::Equal,
        }
    }
}

// =============================================================================
// Order
// =============================================================================

impl Queryable for Order {
    const SEARCH_FIELDS: &'static [&'static str] = &["delivery_address"];
    const ORDERING_FIELDS: &'static [&'static str] = &["id", "user", "created_at"];
    const DEFAULT_ORDERING: &'static [&'static str] = &["id"];
    const FILTER_FIELDS: &'static [&'static str] =
        &["delivery_address", "promocode", "created_at", "user", "products"];

    fn search_text(&self, field: &str) -> Option<&str> {
        match field {
            "delivery_address" => self.delivery_address.as_deref(),
            _ => None,
        }
    }

    fn filter(field: &str, value: &str) -> Result<Option<Predicate<Self>>, QueryError> {
        let predicate: Predicate<Self> = match field {
            "delivery_address" => {
                let address = value.to_string();
                Box::new(move |o: &Order| o.delivery_address.as_deref().unwrap_or_default() == address)
            }
            "promocode" => {
                let code = value.to_string();
                Box::new(move |o: &Order| o.promocode == code)
            }
            "created_at" => {
                let at: DateTime<Utc> = parse_filter(field, value)?;
                Box::new(move |o: &Order| o.created_at == at)
            }
            "user" => {
                let user: i64 = parse_filter(field, value)?;
                Box::new(move |o: &Order| o.user == user)
            }
            "products" => {
                let product: i64 = parse_filter(field, value)?;
                Box::new(move |o: &Order| o.products.contains(&product))
            }
            _ => return Ok(None),
        };
        Ok(Some(predicate))
    }

    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "id" => self.id.cmp(&other.id),
            "user" => self.user.cmp(&other.user),
            "created_at" => self.created_at.cmp(&other.created_at),
            _ => Ordering::Equal,
        }
    }
}
