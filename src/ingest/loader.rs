//! Dataset Loader
//!
//! アップロードされたCSV/JSONを生データテーブルへ読み込む

use super::types::{RawTable, RawValue};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

/// 入力フォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Json,
}

impl DataFormat {
    /// 拡張子からフォーマットを推定
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Some(DataFormat::Csv),
            Some("json") => Some(DataFormat::Json),
            _ => None,
        }
    }

    /// 先頭バイトからフォーマットを推定
    fn sniff(bytes: &[u8]) -> Self {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'[') | Some(b'{') => DataFormat::Json,
            _ => DataFormat::Csv,
        }
    }
}

/// ファイルからテーブルを読み込む
pub fn load_file(path: &Path) -> Result<RawTable> {
    let bytes = std::fs::read(path)?;
    info!("Loading dataset from {} ({} bytes)", path.display(), bytes.len());
    load_bytes(&bytes, DataFormat::from_path(path))
}

/// バイト列からテーブルを読み込む
///
/// 指定（または推定）したフォーマットを先に試し、失敗したらもう一方を試す。
pub fn load_bytes(bytes: &[u8], hint: Option<DataFormat>) -> Result<RawTable> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(Error::Load("Uploaded file is empty".to_string()));
    }

    let first = hint.unwrap_or_else(|| DataFormat::sniff(bytes));
    let second = match first {
        DataFormat::Csv => DataFormat::Json,
        DataFormat::Json => DataFormat::Csv,
    };

    let first_error = match parse_as(bytes, first) {
        Ok(table) => return Ok(table),
        Err(e) => e,
    };
    debug!("{:?} parsing failed ({}), trying {:?}", first, first_error, second);

    parse_as(bytes, second).map_err(|second_error| {
        Error::Load(format!(
            "Could not parse as CSV or JSON. {:?} error: {}; {:?} error: {}",
            first, first_error, second, second_error
        ))
    })
}

fn parse_as(bytes: &[u8], format: DataFormat) -> Result<RawTable> {
    match format {
        DataFormat::Csv => parse_csv(bytes),
        DataFormat::Json => parse_json(bytes),
    }
}

/// CSVを読み込む（全セルは文字列）
pub fn parse_csv(bytes: &[u8]) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(Error::Load("CSV has no header row".to_string()));
    }

    let mut table = RawTable::new(headers);
    for record in reader.records() {
        let record = record?;
        table.push_row(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        RawValue::Null
                    } else {
                        RawValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(table)
}

/// JSONを読み込む
///
/// レコード配列（`[{"col": v}, ...]`）または列オブジェクト
/// （`{"col": [v, ...]}` / `{"col": {"0": v, ...}}`）を受け付ける。
pub fn parse_json(bytes: &[u8]) -> Result<RawTable> {
    let value: Value = serde_json::from_slice(bytes)?;
    match value {
        Value::Array(records) => parse_json_records(records),
        Value::Object(columns) => parse_json_columns(columns),
        _ => Err(Error::Load(
            "JSON must be an array of records or an object of columns".to_string(),
        )),
    }
}

fn parse_json_records(records: Vec<Value>) -> Result<RawTable> {
    let mut headers: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(records.len());

    for (row, record) in records.into_iter().enumerate() {
        let Value::Object(object) = record else {
            return Err(Error::Load(format!("JSON record {} is not an object", row)));
        };
        for key in object.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
        objects.push(object);
    }

    let mut table = RawTable::new(headers);
    for object in objects {
        let row = table
            .headers
            .iter()
            .map(|h| object.get(h).map(json_to_raw).unwrap_or(RawValue::Null))
            .collect();
        table.push_row(row);
    }
    Ok(table)
}

fn parse_json_columns(columns: Map<String, Value>) -> Result<RawTable> {
    let mut headers = Vec::with_capacity(columns.len());
    let mut cells: Vec<Vec<RawValue>> = Vec::with_capacity(columns.len());

    for (name, column) in columns {
        let values = match column {
            Value::Array(values) => values.iter().map(json_to_raw).collect(),
            Value::Object(indexed) => {
                let mut entries: Vec<(usize, RawValue)> = indexed
                    .iter()
                    .map(|(key, v)| {
                        key.parse::<usize>()
                            .map(|idx| (idx, json_to_raw(v)))
                            .map_err(|_| {
                                Error::Load(format!(
                                    "Column '{}' has non-numeric index '{}'",
                                    name, key
                                ))
                            })
                    })
                    .collect::<Result<_>>()?;
                entries.sort_by_key(|(idx, _)| *idx);
                entries.into_iter().map(|(_, v)| v).collect()
            }
            _ => {
                return Err(Error::Load(format!(
                    "Column '{}' must be an array or an index object",
                    name
                )))
            }
        };
        headers.push(name);
        cells.push(values);
    }

    let row_count = cells.iter().map(Vec::len).max().unwrap_or(0);
    let mut table = RawTable::new(headers);
    for row in 0..row_count {
        table.push_row(
            cells
                .iter()
                .map(|column| column.get(row).cloned().unwrap_or(RawValue::Null))
                .collect(),
        );
    }
    Ok(table)
}

fn json_to_raw(value: &Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::Bool(b) => RawValue::Text(b.to_string()),
        Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Null),
        Value::String(s) => RawValue::Text(s.clone()),
        other => RawValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "Time,Cell_ID,Total _Traffic(GigaBytes)\n\
                       2024-01-01 00:00:00,1,10.5\n\
                       2024-01-01 01:00:00,1,11.0\n";

    #[test]
    fn test_parse_csv() {
        let table = load_bytes(CSV.as_bytes(), None).unwrap();
        assert_eq!(table.headers.len(), 3);
        assert_eq!(table.headers[2], "Total _Traffic(GigaBytes)");
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][2], RawValue::from("10.5"));
    }

    #[test]
    fn test_parse_json_records() {
        let json = r#"[{"Time": "2024-01-01 00:00:00", "Cell_ID": 7, "traffic_volume": 3.5},
                       {"Time": "2024-01-01 01:00:00", "Cell_ID": 7, "traffic_volume": null}]"#;
        let table = load_bytes(json.as_bytes(), None).unwrap();
        assert_eq!(table.len(), 2);
        let cell_idx = table.headers.iter().position(|h| h == "Cell_ID").unwrap();
        let traffic_idx = table
            .headers
            .iter()
            .position(|h| h == "traffic_volume")
            .unwrap();
        assert_eq!(table.rows[0][cell_idx], RawValue::Number(7.0));
        assert_eq!(table.rows[1][traffic_idx], RawValue::Null);
    }

    #[test]
    fn test_parse_json_columns_with_index_objects() {
        let json = r#"{"timestamp": {"1": "2024-01-01 01:00:00", "0": "2024-01-01 00:00:00"},
                       "cell_id": {"0": 1, "1": 1},
                       "traffic_volume": {"0": 1.0, "1": 2.0}}"#;
        let table = parse_json(json.as_bytes()).unwrap();
        let ts_idx = table.headers.iter().position(|h| h == "timestamp").unwrap();
        assert_eq!(table.rows[0][ts_idx], RawValue::from("2024-01-01 00:00:00"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_header_only_csv_loads_empty_table() {
        let table = load_bytes(b"Time,Cell_ID\n", None).unwrap();
        assert_eq!(table.headers, vec!["Time".to_string(), "Cell_ID".to_string()]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_json_hint_falls_back_to_csv() {
        let table = load_bytes(CSV.as_bytes(), Some(DataFormat::Json)).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unparseable_payload() {
        let err = load_bytes(b"[not json", None).unwrap_err();
        assert!(matches!(err, Error::Load(_)));

        let err = load_bytes(b"   ", None).unwrap_err();
        assert!(matches!(err, Error::Load(_)));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DataFormat::from_path(Path::new("upload/traffic.CSV")),
            Some(DataFormat::Csv)
        );
        assert_eq!(DataFormat::from_path(Path::new("data.json")), Some(DataFormat::Json));
        assert_eq!(DataFormat::from_path(Path::new("data.txt")), None);
    }
}
