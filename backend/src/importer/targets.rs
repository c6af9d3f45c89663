//! [`ImportTarget`] implementations for the shop's models.

use chrono::{DateTime, Utc};

use super::{ForeignKey, ImportTarget, Relation, ResolvedRow};
use crate::error::{ImportError, ImportResult};
use crate::models::{parse_bool, Order, Price, Product};

impl ImportTarget for Product {
    const ENTITY: &'static str = "Product";

    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey {
        column: "created_by",
        relation: Relation::User,
    }];

    fn from_row(row: &ResolvedRow) -> ImportResult<Self> {
        let mut product = Product::new(String::new());

        for (column, value) in row.columns() {
            match column {
                "id" | "pk" => product.id = Some(parse_id(row, column, value)?),
                "name" => product.name = value.to_string(),
                "description" => product.description = value.to_string(),
                "price" => {
                    product.price = value
                        .parse::<Price>()
                        .map_err(|e| row.malformed(column, value, e.to_string()))?;
                }
                "discount" => {
                    product.discount = value
                        .trim()
                        .parse()
                        .map_err(|_| row.malformed(column, value, "expected an integer"))?;
                }
                "archived" => {
                    product.archived = parse_bool(value)
                        .ok_or_else(|| row.malformed(column, value, "expected a boolean"))?;
                }
                "created_by" => product.created_by = Some(row.user(column)?.id),
                "created_at" => {
                    if let Some(at) = parse_timestamp(row, column, value)? {
                        product.created_at = at;
                    }
                }
                other => return Err(row.unknown_column(other, Self::ENTITY)),
            }
        }

        Ok(product)
    }
}

impl ImportTarget for Order {
    const ENTITY: &'static str = "Order";

    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey {
        column: "user",
        relation: Relation::User,
    }];

    fn from_row(row: &ResolvedRow) -> ImportResult<Self> {
        let user = row.user("user").map_err(|_| required(row, "user"))?;
        let mut order = Order::new(user.id);

        for (column, value) in row.columns() {
            match column {
                "id" => order.id = Some(parse_id(row, column, value)?),
                "delivery_address" => {
                    order.delivery_address = (!value.is_empty()).then(|| value.to_string());
                }
                "promocode" => order.promocode = value.to_string(),
                "created_at" => {
                    if let Some(at) = parse_timestamp(row, column, value)? {
                        order.created_at = at;
                    }
                }
                "user" => {}
                other => return Err(row.unknown_column(other, Self::ENTITY)),
            }
        }

        Ok(order)
    }
}

fn parse_id(row: &ResolvedRow, column: &str, value: &str) -> ImportResult<i64> {
    match value.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(row.malformed(column, value, "expected a positive integer id")),
    }
}

/// RFC 3339 timestamp; an empty cell keeps the default.
fn parse_timestamp(
    row: &ResolvedRow,
    column: &str,
    value: &str,
) -> ImportResult<Option<DateTime<Utc>>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|at| Some(at.with_timezone(&Utc)))
        .map_err(|e| row.malformed(column, value, e.to_string()))
}

fn required(row: &ResolvedRow, column: &str) -> ImportError {
    row.malformed(column, "", "column is required")
}
