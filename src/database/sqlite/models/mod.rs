
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::Path;

/// A document whose chunks are committed to a vector index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IndexedDocument {
    pub source_id: String,
    pub path: String,
    pub chunk_count: i64,
    #[sqlx(rename = "chunk_window")]
    pub window: i64,
    #[sqlx(rename = "chunk_overlap")]
    pub overlap: i64,
    /// Directory of the vector index holding the chunks
    pub index_path: String,
    pub indexed_at: NaiveDateTime,
}

impl IndexedDocument {
    #[inline]
    pub fn index_dir(&self) -> &Path {
        Path::new(&self.index_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIndexedDocument {
    pub source_id: String,
    pub path: String,
    pub chunk_count: i64,
    pub window: i64,
    pub overlap: i64,
    pub index_path: String,
}
