//! CSV decoding and row parsing.
//!
//! Turns an uploaded byte buffer into header-keyed [`ImportRow`]s. No
//! knowledge of products or orders lives here.

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::warn;

use crate::error::{ImportError, ImportResult};

/// Encoding label that asks for detection instead of a fixed encoding.
pub const AUTO_ENCODING: &str = "auto";

/// Encoding assumed when an upload does not name one.
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Used when detection names a charset nothing can decode. Every byte is
/// valid in it.
pub const FALLBACK_ENCODING: &str = "windows-1252";

/// One data record keyed by the header, in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    /// 1-based line the record starts on (the header is line 1).
    pub line: usize,
    fields: Vec<(String, String)>,
}

impl ImportRow {
    pub fn new(line: usize, fields: Vec<(String, String)>) -> Self {
        Self { line, fields }
    }

    /// Raw value of a column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for ImportRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed data rows
    pub rows: Vec<ImportRow>,
    /// Encoding actually used (resolved when `auto` was requested)
    pub encoding: String,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    normalize_charset(&result.0)
}

/// Map a chardet charset name onto a label `encoding_rs` accepts.
///
/// Charsets without a decoder fall back to [`FALLBACK_ENCODING`].
fn normalize_charset(charset: &str) -> String {
    let label = match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" | "utf-8-sig" => return "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => return "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => return "windows-1252".to_string(),
        "maccyrillic" | "mac-cyrillic" => "x-mac-cyrillic".to_string(),
        "tis-620" => "windows-874".to_string(),
        other => other.to_string(),
    };

    if encoding_rs::Encoding::for_label(label.as_bytes()).is_some() {
        label
    } else {
        warn!(charset, fallback = FALLBACK_ENCODING, "no decoder for detected charset");
        FALLBACK_ENCODING.to_string()
    }
}

/// Decode bytes to a string using the named encoding.
///
/// Labels follow the WHATWG encoding standard (`utf-8`, `latin1`,
/// `windows-1251`, ...). Undecodable input is an error, never replaced.
pub fn decode_content(bytes: &[u8], encoding: &str) -> ImportResult<String> {
    let label = encoding.trim();
    let codec = encoding_rs::Encoding::for_label(label.as_bytes()).ok_or_else(|| {
        ImportError::Encoding {
            encoding: label.to_string(),
            reason: "unknown encoding".to_string(),
        }
    })?;

    let bytes = if codec == encoding_rs::UTF_8 {
        bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
    } else {
        bytes
    };

    codec
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
        .ok_or_else(|| ImportError::Encoding {
            encoding: label.to_string(),
            reason: format!("input is not valid {}", codec.name()),
        })
}

/// Parse decoded CSV text into rows keyed by the header line.
///
/// Standard quoting applies (embedded commas, quotes and newlines inside
/// double quotes). Blank lines are skipped. Every record must have exactly
/// as many fields as the header.
pub fn parse_csv(content: &str) -> ImportResult<(Vec<String>, Vec<ImportRow>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_format_error(&e, 1))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(ImportError::NoHeaders);
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_format_error(&e, idx + 2))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        let fields = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(ImportRow::new(line, fields));
    }

    Ok((headers, rows))
}

/// Decode and parse an uploaded CSV in one step.
///
/// `encoding` may be [`AUTO_ENCODING`] to detect it from the bytes.
pub fn parse_bytes(bytes: &[u8], encoding: &str) -> ImportResult<ParseResult> {
    let encoding = if encoding.trim().eq_ignore_ascii_case(AUTO_ENCODING) {
        detect_encoding(bytes)
    } else {
        encoding.trim().to_string()
    };

    let content = decode_content(bytes, &encoding)?;
    let (headers, rows) = parse_csv(&content)?;

    Ok(ParseResult {
        rows,
        encoding,
        headers,
    })
}

fn csv_format_error(err: &csv::Error, fallback_line: usize) -> ImportError {
    let line = err
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(fallback_line);

    let message = match err.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {} fields, found {}", expected_len, len),
        _ => err.to_string(),
    };

    ImportError::Format { line, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_charsets_are_decodable() {
        assert_eq!(normalize_charset("MacCyrillic"), "x-mac-cyrillic");
        assert_eq!(normalize_charset("TIS-620"), "windows-874");
        assert_eq!(normalize_charset("windows-1251"), "windows-1251");
        assert_eq!(normalize_charset("IBM855"), FALLBACK_ENCODING);
        assert_eq!(normalize_charset("EUC-TW"), FALLBACK_ENCODING);

        for charset in ["MacCyrillic", "KOI8-R", "IBM866", "ISO-8859-5", "SHIFT_JIS", "EUC-TW"] {
            let label = normalize_charset(charset);
            assert!(decode_content(b"name\n\xc1\xc2\n", &label).is_ok(), "{charset} -> {label}");
        }
    }

    #[test]
    fn test_simple_csv() {
        let (headers, rows) = parse_csv("name,price\nWidget,9.99\nGadget,19.99\n").unwrap();

        assert_eq!(headers, vec!["name", "price"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some("Widget"));
        assert_eq!(rows[0].get("price"), Some("9.99"));
        assert_eq!(rows[1].get("name"), Some("Gadget"));
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name,description\n\"Desk, oak\",\"says \"\"hi\"\"\nover two lines\"\n";
        let (_, rows) = parse_csv(csv).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some("Desk, oak"));
        assert_eq!(rows[0].get("description"), Some("says \"hi\"\nover two lines"));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let (_, rows) = parse_csv("a,b\n1,2\n\n3,4\n").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_missing_field_is_error() {
        let err = parse_csv("a,b,c\n1,2,3\n1,2\n").unwrap_err();
        match err {
            ImportError::Format { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("expected 3 fields, found 2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_extra_field_is_error() {
        let err = parse_csv("a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, ImportError::Format { line: 2, .. }));
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_csv(""), Err(ImportError::NoHeaders)));
    }

    #[test]
    fn test_header_only_has_no_rows() {
        let (headers, rows) = parse_csv("name,price\n").unwrap();
        assert_eq!(headers.len(), 2);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_invalid_utf8_is_encoding_error() {
        let bytes: &[u8] = &[b'a', b',', 0xE9, b'\n'];
        let err = decode_content(bytes, "utf-8").unwrap_err();
        assert!(matches!(err, ImportError::Encoding { .. }));
    }

    #[test]
    fn test_unknown_encoding_label() {
        let err = decode_content(b"a", "klingon-8").unwrap_err();
        assert!(err.to_string().contains("unknown encoding"));
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let (headers, _) = parse_bytes(b"\xEF\xBB\xBFname\nx\n", "utf-8")
            .map(|r| (r.headers, r.rows))
            .unwrap();
        assert_eq!(headers, vec!["name"]);
    }

    #[test]
    fn test_auto_encoding_plain_ascii() {
        let result = parse_bytes(b"name,price\nWidget,9.99\n", "auto").unwrap();
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_row_serializes_in_header_order() {
        let (_, rows) = parse_csv("b,a\n2,1\n").unwrap();
        let json = serde_json::to_string(&rows[0]).unwrap();
        assert_eq!(json, r#"{"b":"2","a":"1"}"#);
    }
}
