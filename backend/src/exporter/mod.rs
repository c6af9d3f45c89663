//! CSV export and JSON snapshots.
//!
//! - [`ExportSpec`] - ordered field list with accessors resolved up front
//! - [`export_rows`] - header + one CSV row per record
//! - [`attach_download_headers`] - `text/csv` attachment headers
//! - [`snapshot`] - JSON export shapes served by the snapshot endpoints
//!
//! Field lookup happens once, in [`ExportSpec::new`]. An unknown field is
//! reported before a single byte is written.

mod fields;
pub mod snapshot;

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue};
use std::io::Write;

use crate::error::{ExportError, ExportResult};

/// Media type of CSV downloads.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Reads one field of a record as text.
pub type FieldAccessor<T> = fn(&T) -> String;

/// A record type whose fields can be exported by name.
pub trait Exportable: Sized {
    /// Name used in error messages.
    const ENTITY: &'static str;

    fn accessor(field: &str) -> Option<FieldAccessor<Self>>;
}

/// Fields to export, in output order.
pub struct ExportSpec<T> {
    fields: Vec<String>,
    accessors: Vec<FieldAccessor<T>>,
}

impl<T: Exportable> ExportSpec<T> {
    /// Resolve every field name against `T`.
    pub fn new<I, S>(fields: I) -> ExportResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        let accessors = fields
            .iter()
            .map(|field| {
                T::accessor(field).ok_or_else(|| ExportError::UnknownField {
                    entity: T::ENTITY,
                    field: field.clone(),
                })
            })
            .collect::<ExportResult<Vec<_>>>()?;

        Ok(Self { fields, accessors })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn project(&self, record: &T) -> Vec<String> {
        self.accessors.iter().map(|read| read(record)).collect()
    }
}

/// Write the header and one row per record to `out`, then hand `out` back.
pub fn export_rows<'a, T, I, W>(records: I, spec: &ExportSpec<T>, out: W) -> ExportResult<W>
where
    T: Exportable + 'a,
    I: IntoIterator<Item = &'a T>,
    W: Write,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);

    writer.write_record(spec.fields())?;
    for record in records {
        writer.write_record(spec.project(record))?;
    }

    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// [`export_rows`] into a fresh buffer.
pub fn export_to_vec<'a, T, I>(records: I, spec: &ExportSpec<T>) -> ExportResult<Vec<u8>>
where
    T: Exportable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    export_rows(records, spec, Vec::new())
}

/// Mark a response as a CSV file download named `filename`.
pub fn attach_download_headers(headers: &mut HeaderMap, filename: &str) -> ExportResult<()> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename={}", filename))
        .map_err(|_| ExportError::InvalidFilename(filename.to_string()))?;

    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CSV_CONTENT_TYPE));
    headers.insert(CONTENT_DISPOSITION, disposition);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        id: i64,
        name: &'static str,
    }

    impl Exportable for Row {
        const ENTITY: &'static str = "Row";

        fn accessor(field: &str) -> Option<FieldAccessor<Self>> {
            let read: FieldAccessor<Self> = match field {
                "id" => |r| r.id.to_string(),
                "name" => |r| r.name.to_string(),
                _ => return None,
            };
            Some(read)
        }
    }

    #[test]
    fn test_export_scenario() {
        let rows = [Row { id: 1, name: "A" }, Row { id: 2, name: "B" }];
        let spec = ExportSpec::<Row>::new(["id", "name"]).unwrap();

        let out = export_to_vec(&rows, &spec).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id,name\n1,A\n2,B\n");
    }

    #[test]
    fn test_field_order_follows_export_fields() {
        let rows = [Row { id: 1, name: "A" }];
        let spec = ExportSpec::<Row>::new(["name", "id"]).unwrap();

        let out = export_to_vec(&rows, &spec).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "name,id\nA,1\n");
    }

    #[test]
    fn test_quoting() {
        let rows = [Row { id: 1, name: "Desk, \"oak\"" }];
        let spec = ExportSpec::<Row>::new(["id", "name"]).unwrap();

        let out = export_to_vec(&rows, &spec).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id,name\n1,\"Desk, \"\"oak\"\"\"\n"
        );
    }

    #[test]
    fn test_unknown_field_fails_before_output() {
        let err = ExportSpec::<Row>::new(["id", "colour"]).err().unwrap();
        match err {
            ExportError::UnknownField { entity, field } => {
                assert_eq!(entity, "Row");
                assert_eq!(field, "colour");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_collection_has_header_only() {
        let rows: [Row; 0] = [];
        let spec = ExportSpec::<Row>::new(["id"]).unwrap();
        assert_eq!(export_to_vec(&rows, &spec).unwrap(), b"id\n");
    }

    #[test]
    fn test_download_headers() {
        let mut headers = HeaderMap::new();
        attach_download_headers(&mut headers, "products-export.csv").unwrap();

        assert_eq!(headers[CONTENT_TYPE], "text/csv");
        assert_eq!(
            headers[CONTENT_DISPOSITION],
            "attachment; filename=products-export.csv"
        );
    }

    #[test]
    fn test_download_headers_reject_newlines() {
        let mut headers = HeaderMap::new();
        assert!(attach_download_headers(&mut headers, "bad\nname.csv").is_err());
    }
}
