//! Ingest Module
//!
//! データ読み込み・列名正規化・前処理

pub mod loader;
pub mod preprocessor;
pub mod schema;
pub mod types;

pub use loader::{load_bytes, load_file, DataFormat};
pub use preprocessor::Preprocessor;
pub use schema::{ColumnMapping, ResolvedColumns};
pub use types::{to_iso8601, NormalizedRecord, RawTable, RawValue, StationId};
