//! Exportable fields of the shop's models.

use super::{Exportable, FieldAccessor};
use crate::models::{Order, Product};

fn optional_id(id: Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

impl Exportable for Product {
    const ENTITY: &'static str = "Product";

    fn accessor(field: &str) -> Option<FieldAccessor<Self>> {
        let read: FieldAccessor<Self> = match field {
            "id" | "pk" => |p| optional_id(p.id),
            "name" => |p| p.name.clone(),
            "description" => |p| p.description.clone(),
            "price" => |p| p.price.to_string(),
            "discount" => |p| p.discount.to_string(),
            "created_at" => |p| p.created_at.to_rfc3339(),
            "archived" => |p| p.archived.to_string(),
            "created_by" => |p| optional_id(p.created_by),
            _ => return None,
        };
        Some(read)
    }
}

impl Exportable for Order {
    const ENTITY: &'static str = "Order";

    fn accessor(field: &str) -> Option<FieldAccessor<Self>> {
        let read: FieldAccessor<Self> = match field {
            "id" | "pk" => |o| optional_id(o.id),
            "delivery_address" => |o| o.delivery_address.clone().unwrap_or_default(),
            "promocode" => |o| o.promocode.clone(),
            "created_at" => |o| o.created_at.to_rfc3339(),
            // Exported as the id so the file can be imported again.
            "user" | "user_id" => |o| o.user.to_string(),
            _ => return None,
        };
        Some(read)
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{orders, products};
    use crate::exporter::{export_to_vec, ExportSpec};
    use crate::importer::import_bytes;
    use crate::models::{Order, Price, Product};
    use crate::store::{BatchStore, MemoryStore};

    #[test]
    fn test_product_export_reimports() {
        let source = MemoryStore::new();
        let mut desk = Product::new("Desk, oak");
        desk.price = Price::from_cents(12050);
        desk.description = "Solid\n\"heavy\"".into();
        desk.discount = 5;
        let mut lamp = Product::new("Lamp");
        lamp.price = Price::from_cents(999);
        let originals = vec![
            source.create_product(desk).unwrap(),
            source.create_product(lamp).unwrap(),
        ];

        let spec = ExportSpec::<Product>::new(products::EXPORT_FIELDS).unwrap();
        let csv = export_to_vec(&originals, &spec).unwrap();

        let target = MemoryStore::new();
        let copies: Vec<Product> = import_bytes(&csv, "utf-8", &target, &target).unwrap();

        assert_eq!(copies.len(), originals.len());
        assert_eq!(export_to_vec(&copies, &spec).unwrap(), csv);
    }

    #[test]
    fn test_order_export_reimports() {
        let source = MemoryStore::new();
        let bob = source.create_user("bob").unwrap();
        let mut first = Order::new(bob.id);
        first.delivery_address = Some("Main st 1".into());
        first.promocode = "SALE".into();
        let mut second = Order::new(bob.id);
        second.created_at = "2020-01-01T00:00:00.123456789Z".parse().unwrap();
        let originals = source.bulk_create(vec![first, second]).unwrap();

        let spec = ExportSpec::<Order>::new(orders::EXPORT_FIELDS).unwrap();
        let csv = export_to_vec(&originals, &spec).unwrap();
        let text = String::from_utf8(csv.clone()).unwrap();
        assert!(text.starts_with("delivery_address,promocode,created_at,user\nMain st 1,SALE,"));
        assert!(text.contains("\n,,2020-01-01T00:00:00.123456789+00:00,1\n"));

        let target = MemoryStore::new();
        target.create_user("bob").unwrap();
        let copies: Vec<Order> = import_bytes(&csv, "utf-8", &target, &target).unwrap();

        assert_eq!(copies[1].created_at, originals[1].created_at);
        assert_eq!(export_to_vec(&copies, &spec).unwrap(), csv);
    }

    #[test]
    fn test_unknown_order_field() {
        assert!(ExportSpec::<Order>::new(["receipt"]).is_err());
    }
}
