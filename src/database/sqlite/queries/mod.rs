
use super::models::{IndexedDocument, NewIndexedDocument};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

const SELECT_DOCUMENT: &str = r"
    SELECT source_id,
           path,
           chunk_count,
           chunk_window,
           chunk_overlap,
           index_path,
           indexed_at
    FROM documents";

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert or replace the catalog entry for a source
    #[inline]
    pub async fn upsert(pool: &SqlitePool, document: &NewIndexedDocument) -> Result<IndexedDocument> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r"
            INSERT INTO documents
                (source_id, path, chunk_count, chunk_window, chunk_overlap, index_path, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                path = excluded.path,
                chunk_count = excluded.chunk_count,
                chunk_window = excluded.chunk_window,
                chunk_overlap = excluded.chunk_overlap,
                index_path = excluded.index_path,
                indexed_at = excluded.indexed_at
            ",
        )
        .bind(&document.source_id)
        .bind(&document.path)
        .bind(document.chunk_count)
        .bind(document.window)
        .bind(document.overlap)
        .bind(&document.index_path)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to record document '{}'", document.source_id))?;

        debug!("Recorded document '{}' in catalog", document.source_id);

        Self::get(pool, &document.source_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve document '{}'", document.source_id))
    }

    #[inline]
    pub async fn get(pool: &SqlitePool, source_id: &str) -> Result<Option<IndexedDocument>> {
        let result = sqlx::query_as::<_, IndexedDocument>(&format!(
            "{SELECT_DOCUMENT} WHERE source_id = ?"
        ))
        .bind(source_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by source id")?;

        Ok(result)
    }

    #[inline]
    pub async fn list(pool: &SqlitePool) -> Result<Vec<IndexedDocument>> {
        let documents = sqlx::query_as::<_, IndexedDocument>(&format!(
            "{SELECT_DOCUMENT} ORDER BY source_id"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list documents")?;

        Ok(documents)
    }

    /// Remove a catalog entry, returning whether it existed
    #[inline]
    pub async fn delete(pool: &SqlitePool, source_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE source_id = ?")
            .bind(source_id)
            .execute(pool)
            .await
            .context("Failed to delete document")?;

        Ok(result.rows_affected() > 0)
    }
}
