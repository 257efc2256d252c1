//! Ingest Types
//!
//! 入力データと正規化レコードの型定義

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 生データのセル値
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// 欠損
    Null,
    /// 文字列
    Text(String),
    /// 数値
    Number(f64),
    /// 日時（タイムゾーンなし）
    DateTime(NaiveDateTime),
}

impl RawValue {
    /// セルが欠損かどうか
    pub fn is_null(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => write!(f, "null"),
            RawValue::Text(s) => write!(f, "{}", s),
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::DateTime(dt) => write!(f, "{}", dt),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<NaiveDateTime> for RawValue {
    fn from(value: NaiveDateTime) -> Self {
        RawValue::DateTime(value)
    }
}

/// 生データテーブル（列名は入力ソースごとに異なる）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// 列名
    pub headers: Vec<String>,
    /// 行データ
    pub rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    /// 新しいテーブルを作成
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// 行を追加
    pub fn push_row(&mut self, row: Vec<RawValue>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 基地局ID（整数または文字列）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StationId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationId::Numeric(id) => write!(f, "{}", id),
            StationId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for StationId {
    fn from(value: i64) -> Self {
        StationId::Numeric(value)
    }
}

impl From<&str> for StationId {
    fn from(value: &str) -> Self {
        StationId::Text(value.to_string())
    }
}

/// 正規化済みレコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// タイムスタンプ（タイムゾーンなし）
    pub timestamp: NaiveDateTime,
    /// 基地局ID
    pub station_id: StationId,
    /// トラフィック量
    pub traffic_volume: f64,
    /// 時（0-23）
    pub hour: u32,
    /// 曜日（月曜=0 .. 日曜=6）
    pub day_of_week: u32,
}

impl NormalizedRecord {
    /// タイムスタンプからカレンダー特徴量を導出してレコードを作成
    pub fn new(timestamp: NaiveDateTime, station_id: StationId, traffic_volume: f64) -> Self {
        Self {
            hour: timestamp.hour(),
            day_of_week: timestamp.weekday().num_days_from_monday(),
            timestamp,
            station_id,
            traffic_volume,
        }
    }
}

/// Format a naive timestamp as ISO-8601 (fractional seconds only when present).
pub fn to_iso8601(timestamp: &NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}
