//! Column Mapping
//!
//! 入力列名を正規スキーマ（timestamp / cell_id / traffic_volume）へ対応付ける

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const TIMESTAMP: &str = "timestamp";
pub const CELL_ID: &str = "cell_id";
pub const TRAFFIC_VOLUME: &str = "traffic_volume";

/// 正規列名（この順序で解決される）
pub const CANONICAL_COLUMNS: [&str; 3] = [TIMESTAMP, CELL_ID, TRAFFIC_VOLUME];

/// 列名マッピング設定
///
/// 各正規列に対して受け付けるソース列名の一覧。比較は大文字小文字と空白を無視する。
/// 正規列名そのものは常に受け付ける。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub timestamp: Vec<String>,
    pub cell_id: Vec<String>,
    pub traffic_volume: Vec<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            timestamp: vec!["Time".to_string()],
            cell_id: vec!["Cell_ID".to_string()],
            traffic_volume: vec!["Total _Traffic(GigaBytes)".to_string()],
        }
    }
}

/// 解決済みの列インデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub timestamp: usize,
    pub cell_id: usize,
    pub traffic_volume: usize,
}

/// 比較用に列名を正規化（空白除去・小文字化）
pub fn normalize_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl ColumnMapping {
    /// エイリアスを追加
    pub fn with_alias(mut self, canonical: &str, alias: impl Into<String>) -> Result<Self> {
        let alias = alias.into();
        match canonical {
            TIMESTAMP => self.timestamp.push(alias),
            CELL_ID => self.cell_id.push(alias),
            TRAFFIC_VOLUME => self.traffic_volume.push(alias),
            other => {
                return Err(Error::Config(format!(
                    "Unknown canonical column '{}'",
                    other
                )))
            }
        }
        Ok(self)
    }

    fn aliases(&self, canonical: &str) -> &[String] {
        match canonical {
            TIMESTAMP => &self.timestamp,
            CELL_ID => &self.cell_id,
            _ => &self.traffic_volume,
        }
    }

    /// ソース列名に対応する正規列名を取得
    pub fn canonical_name(&self, header: &str) -> Option<&'static str> {
        let key = normalize_key(header);
        CANONICAL_COLUMNS.into_iter().find(|canonical| {
            key == normalize_key(canonical)
                || self
                    .aliases(canonical)
                    .iter()
                    .any(|alias| normalize_key(alias) == key)
        })
    }

    /// 列名を正規化した結果（対応しない列はトリムのみ）
    pub fn rename_headers(&self, headers: &[String]) -> Vec<String> {
        headers
            .iter()
            .map(|h| {
                self.canonical_name(h)
                    .map(str::to_string)
                    .unwrap_or_else(|| h.trim().to_string())
            })
            .collect()
    }

    /// ヘッダーから正規列の位置を解決
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedColumns> {
        let mut positions: [Option<usize>; 3] = [None; 3];

        for (index, header) in headers.iter().enumerate() {
            let Some(canonical) = self.canonical_name(header) else {
                continue;
            };
            let slot = CANONICAL_COLUMNS
                .iter()
                .position(|c| *c == canonical)
                .unwrap_or_default();

            match positions[slot] {
                None => {
                    debug!("Mapped column '{}' -> '{}'", header.trim(), canonical);
                    positions[slot] = Some(index);
                }
                Some(first) => warn!(
                    "Column '{}' also maps to '{}'; keeping '{}'",
                    header.trim(),
                    canonical,
                    headers[first].trim()
                ),
            }
        }

        match positions {
            [Some(timestamp), Some(cell_id), Some(traffic_volume)] => Ok(ResolvedColumns {
                timestamp,
                cell_id,
                traffic_volume,
            }),
            _ => {
                let missing = CANONICAL_COLUMNS
                    .iter()
                    .zip(positions.iter())
                    .filter(|(_, position)| position.is_none())
                    .map(|(name, _)| name.to_string())
                    .collect();
                Err(Error::Schema {
                    missing,
                    found: self.rename_headers(headers),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_canonical_names() {
        let mapping = ColumnMapping::default();
        let resolved = mapping
            .resolve(&headers(&["traffic_volume", "timestamp", "cell_id"]))
            .unwrap();
        assert_eq!(resolved.timestamp, 1);
        assert_eq!(resolved.cell_id, 2);
        assert_eq!(resolved.traffic_volume, 0);
    }

    #[test]
    fn test_resolve_source_aliases_with_whitespace() {
        let mapping = ColumnMapping::default();
        let resolved = mapping
            .resolve(&headers(&[" Time ", "Cell_ID", "  Total _Traffic(GigaBytes) "]))
            .unwrap();
        assert_eq!(
            resolved,
            ResolvedColumns {
                timestamp: 0,
                cell_id: 1,
                traffic_volume: 2
            }
        );
    }

    #[test]
    fn test_case_insensitive_match() {
        let mapping = ColumnMapping::default();
        assert_eq!(mapping.canonical_name("TIME"), Some(TIMESTAMP));
        assert_eq!(
            mapping.canonical_name("total_traffic(gigabytes)"),
            Some(TRAFFIC_VOLUME)
        );
        assert_eq!(mapping.canonical_name("region"), None);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let mapping = ColumnMapping::default();
        let err = mapping
            .resolve(&headers(&["Time", "Cell_ID", "Region"]))
            .unwrap_err();
        match err {
            Error::Schema { missing, found } => {
                assert_eq!(missing, vec!["traffic_volume".to_string()]);
                assert_eq!(found, headers(&["timestamp", "cell_id", "Region"]));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_alias() {
        let mapping = ColumnMapping::default()
            .with_alias(TRAFFIC_VOLUME, "DL Volume (GB)")
            .unwrap();
        assert_eq!(mapping.canonical_name("dl volume(gb)"), Some(TRAFFIC_VOLUME));
        assert!(ColumnMapping::default().with_alias("region", "x").is_err());
    }

    #[test]
    fn test_duplicate_mapping_keeps_first() {
        let mapping = ColumnMapping::default();
        let resolved = mapping
            .resolve(&headers(&["Time", "timestamp", "Cell_ID", "traffic_volume"]))
            .unwrap();
        assert_eq!(resolved.timestamp, 0);
    }
}
