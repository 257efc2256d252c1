//! Preprocessor
//!
//! 生データを正規化レコードへ変換する（バッチ単位で検証し、1行でも不正なら全体を拒否）

use super::schema::{ColumnMapping, CELL_ID, TIMESTAMP, TRAFFIC_VOLUME};
use super::types::{NormalizedRecord, RawTable, RawValue, StationId};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

/// 受け付けるタイムスタンプ書式
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// 前処理器
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    mapping: ColumnMapping,
}

impl Preprocessor {
    /// 新しい前処理器を作成
    pub fn new(mapping: ColumnMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// テーブルを正規化（入力テーブルは変更しない）
    pub fn normalize(&self, table: &RawTable) -> Result<Vec<NormalizedRecord>> {
        let columns = self.mapping.resolve(&table.headers)?;
        debug!("Resolved columns: {:?}", columns);

        let records = table
            .rows
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                let cell = |index: usize| cells.get(index).unwrap_or(&RawValue::Null);

                let timestamp = parse_timestamp(cell(columns.timestamp))
                    .map_err(|message| Error::parse(row, TIMESTAMP, message))?;
                let station_id = parse_station_id(cell(columns.cell_id))
                    .map_err(|message| Error::parse(row, CELL_ID, message))?;
                let traffic_volume = parse_traffic_volume(cell(columns.traffic_volume))
                    .map_err(|message| Error::parse(row, TRAFFIC_VOLUME, message))?;

                Ok(NormalizedRecord::new(timestamp, station_id, traffic_volume))
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Normalized {} records", records.len());
        Ok(records)
    }
}

/// タイムスタンプを解析（タイムゾーン変換は行わない）
pub fn parse_timestamp(value: &RawValue) -> std::result::Result<NaiveDateTime, String> {
    match value {
        RawValue::DateTime(dt) => Ok(*dt),
        RawValue::Number(secs) if secs.is_finite() => {
            // 負の小数秒でも端数は正方向のナノ秒で表す
            let mut whole = secs.floor() as i64;
            let mut nanos = ((secs - secs.floor()) * 1e9).round() as u32;
            if nanos >= 1_000_000_000 {
                whole += 1;
                nanos = 0;
            }
            DateTime::from_timestamp(whole, nanos)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| format!("epoch seconds out of range: {}", secs))
        }
        RawValue::Text(text) if !text.trim().is_empty() => parse_timestamp_str(text.trim())
            .ok_or_else(|| format!("unparseable timestamp '{}'", text)),
        other => Err(format!("missing or invalid timestamp '{}'", other)),
    }
}

fn parse_timestamp_str(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_station_id(value: &RawValue) -> std::result::Result<StationId, String> {
    if value.is_null() {
        return Err("missing station id".to_string());
    }
    match value {
        RawValue::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(StationId::Numeric(*n as i64)),
        RawValue::Number(n) => Ok(StationId::Text(n.to_string())),
        RawValue::Text(text) => {
            let text = text.trim();
            Ok(text
                .parse::<i64>()
                .map(StationId::Numeric)
                .unwrap_or_else(|_| StationId::Text(text.to_string())))
        }
        RawValue::DateTime(dt) => Ok(StationId::Text(dt.to_string())),
        _ => Err("missing station id".to_string()),
    }
}

fn parse_traffic_volume(value: &RawValue) -> std::result::Result<f64, String> {
    if value.is_null() {
        return Err("missing traffic volume".to_string());
    }
    let volume = match value {
        RawValue::Number(n) => *n,
        RawValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("non-numeric traffic volume '{}'", text))?,
        other => return Err(format!("missing traffic volume '{}'", other)),
    };

    if volume.is_finite() {
        Ok(volume)
    } else {
        Err(format!("non-finite traffic volume '{}'", volume))
    }
}
