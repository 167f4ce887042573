//! CSV table encoding and the typed read boundary.
//!
//! Rows are written from any `Serialize` record: scalar fields become plain
//! cells and lists or maps are stored as compact JSON inside a single cell.
//! Reading is lenient. Rows whose column count does not match the header are
//! skipped with a warning, and the accessors on [`Row`] coerce malformed
//! values to safe defaults instead of failing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// A typed record stored as one CSV row.
pub trait TableRecord: Serialize + Sized {
    /// Column order used when writing.
    const COLUMNS: &'static [&'static str];

    /// Normalize a raw row into the typed record.
    fn from_row(row: &Row) -> Self;
}

/// A decoded table: the header and the rows that matched it.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    /// Rows dropped because they were unreadable or had the wrong width
    pub skipped: usize,
}

impl Table {
    /// Convert every row into a typed record.
    pub fn records<T: TableRecord>(&self) -> Vec<T> {
        self.rows.iter().map(T::from_row).collect()
    }
}

/// One CSV row addressed by column name.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<HashMap<String, usize>>,
    values: Vec<String>,
}

impl Row {
    /// Build a row from header/value pairs (mainly for tests).
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut columns = HashMap::new();
        let mut values = Vec::new();
        for (idx, (key, value)) in pairs.into_iter().enumerate() {
            columns.insert(key.to_string(), idx);
            values.push(value.to_string());
        }
        Self {
            columns: Arc::new(columns),
            values,
        }
    }

    /// Raw cell values in file order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Raw cell, `None` when the column is absent.
    pub fn raw(&self, column: &str) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|&idx| self.values.get(idx))
            .map(String::as_str)
    }

    /// Text cell; `None`/`null` markers and missing columns become empty.
    pub fn text(&self, column: &str) -> String {
        match self.raw(column) {
            Some(value) if !is_null_marker(value) => value.to_string(),
            _ => String::new(),
        }
    }

    /// Non-negative integer cell; anything unparsable becomes 0.
    pub fn int(&self, column: &str) -> u64 {
        self.raw(column).map_or(0, coerce_int)
    }

    /// Boolean cell; accepts `true`/`True`/`1`.
    pub fn flag(&self, column: &str) -> bool {
        matches!(
            self.raw(column).map(str::trim),
            Some("true" | "True" | "TRUE" | "1")
        )
    }

    /// JSON-encoded list of strings; empty on any parse failure.
    pub fn list(&self, column: &str) -> Vec<String> {
        match self.json(column) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// JSON-encoded mapping of name to count; empty on any parse failure.
    pub fn counts(&self, column: &str) -> BTreeMap<String, u64> {
        match self.json(column) {
            Some(Value::Object(map)) => map
                .into_iter()
                .map(|(key, value)| (key, value.as_u64().unwrap_or(0)))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    /// Parsed JSON cell, `None` when empty or malformed.
    pub fn json(&self, column: &str) -> Option<Value> {
        let raw = self.raw(column)?.trim();
        if raw.is_empty() || is_null_marker(raw) {
            return None;
        }
        serde_json::from_str(raw).ok()
    }
}

/// Whether a cell holds one of the textual null markers.
pub fn is_null_marker(value: &str) -> bool {
    matches!(value.trim(), "None" | "null")
}

/// Coerce a cell to a non-negative integer, 0 when malformed.
pub fn coerce_int(value: &str) -> u64 {
    let value = value.trim();
    value
        .parse::<u64>()
        .ok()
        .or_else(|| value.parse::<i64>().ok().map(|v| v.max(0).unsigned_abs()))
        .unwrap_or(0)
}

/// Encode records as CSV bytes.
///
/// `columns` fixes the column order; without it the keys of the first
/// record are used. Missing fields become empty cells.
pub fn encode_records<T: Serialize>(
    records: &[T],
    columns: Option<&[&str]>,
    with_header: bool,
) -> Result<Vec<u8>> {
    let objects = records
        .iter()
        .map(|record| match serde_json::to_value(record)? {
            Value::Object(map) => Ok(map),
            other => Err(AppError::validation(format!(
                "table records must serialize to objects, got {other}"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let columns: Vec<String> = match columns {
        Some(cols) => cols.iter().map(|c| (*c).to_string()).collect(),
        None => objects
            .first()
            .map(|first| first.keys().cloned().collect())
            .unwrap_or_default(),
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    if with_header && !columns.is_empty() {
        writer.write_record(&columns)?;
    }
    for object in &objects {
        writer.write_record(columns.iter().map(|col| cell_text(object, col)))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))
}

fn cell_text(object: &Map<String, Value>, column: &str) -> String {
    match object.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(composite @ (Value::Array(_) | Value::Object(_))) => composite.to_string(),
    }
}

/// Decode CSV bytes into a table, skipping corrupt rows.
pub fn decode_table(bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    let columns: Arc<HashMap<String, usize>> = Arc::new(
        headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect(),
    );

    let mut table = Table {
        headers,
        ..Table::default()
    };

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping unreadable row: {e}");
                table.skipped += 1;
                continue;
            }
        };
        if record.len() != table.headers.len() {
            log::warn!(
                "Skipping corrupt row at line {}: {} columns, expected {}",
                record.position().map_or(0, csv::Position::line),
                record.len(),
                table.headers.len()
            );
            table.skipped += 1;
            continue;
        }
        table.rows.push(Row {
            columns: Arc::clone(&columns),
            values: record.iter().map(String::from).collect(),
        });
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        id: u64,
        name: String,
        topics: Vec<String>,
        languages: BTreeMap<String, u64>,
        note: Option<String>,
    }

    fn sample(id: u64, topics: &[&str]) -> Sample {
        Sample {
            id,
            name: format!("repo-{id}"),
            topics: topics.iter().map(|t| (*t).to_string()).collect(),
            languages: BTreeMap::from([("Rust".to_string(), 1200)]),
            note: None,
        }
    }

    #[test]
    fn composite_values_are_json_cells() {
        let bytes = encode_records(
            &[sample(1, &["etl", "kafka"])],
            Some(&["id", "topics", "languages", "note"]),
            true,
        )
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,topics,languages,note"));
        assert_eq!(
            lines.next(),
            Some(r#"1,"[""etl"",""kafka""]","{""Rust"":1200}","#)
        );
    }

    #[test]
    fn topics_round_trip_preserves_order_and_empty() {
        let records = [sample(1, &["zeta", "alpha", "mid"]), sample(2, &[])];
        let bytes = encode_records(&records, Some(&["id", "name", "topics"]), true).unwrap();
        let table = decode_table(&bytes).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].list("topics"), vec!["zeta", "alpha", "mid"]);
        assert!(table.rows[1].list("topics").is_empty());
    }

    #[test]
    fn columns_default_to_first_record_keys() {
        let bytes = encode_records(&[sample(7, &[])], None, true).unwrap();
        let table = decode_table(&bytes).unwrap();
        assert!(table.headers.contains(&"id".to_string()));
        assert!(table.headers.contains(&"languages".to_string()));
        assert_eq!(table.rows[0].int("id"), 7);
    }

    #[test]
    fn header_can_be_omitted_for_appends() {
        let bytes = encode_records(&[sample(3, &[])], Some(&["id", "name"]), false).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "3,repo-3\n");
    }

    #[test]
    fn mismatched_rows_are_skipped() {
        let csv = "id,name,size\n1,a,10\n2,b\n3,c,30,extra\n4,d,40\n";
        let table = decode_table(csv.as_bytes()).unwrap();
        let ids: Vec<u64> = table.rows.iter().map(|r| r.int("id")).collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(table.skipped, 2);
    }

    #[test]
    fn malformed_values_coerce_to_defaults() {
        let row = Row::from_pairs([
            ("size", "abc"),
            ("stars", " 42 "),
            ("forks", "-3"),
            ("topics", "not json"),
            ("languages", "[1,2]"),
            ("company", "None"),
            ("archived", "True"),
        ]);
        assert_eq!(row.int("size"), 0);
        assert_eq!(row.int("stars"), 42);
        assert_eq!(row.int("forks"), 0);
        assert_eq!(row.int("missing"), 0);
        assert!(row.list("topics").is_empty());
        assert!(row.counts("languages").is_empty());
        assert_eq!(row.text("company"), "");
        assert!(row.flag("archived"));
        assert!(!row.flag("missing"));
    }

    #[test]
    fn non_object_records_are_rejected() {
        let err = encode_records(&[1u32, 2u32], None, true).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
