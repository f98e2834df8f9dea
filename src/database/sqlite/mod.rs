use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{IndexedDocument, NewIndexedDocument};
use crate::database::sqlite::queries::DocumentQueries;


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// Catalog of indexed documents
///
/// An entry is only written after the document's chunks are committed to
/// the vector index, so every listed document can be queried.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    /// Open the catalog at `path`, creating its parent directory
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create catalog directory: {}", parent.display())
            })?;
        }

        Self::new(path).await
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn upsert_document(&self, document: &NewIndexedDocument) -> Result<IndexedDocument> {
        DocumentQueries::upsert(&self.pool, document).await
    }

    #[inline]
    pub async fn get_document(&self, source_id: &str) -> Result<Option<IndexedDocument>> {
        DocumentQueries::get(&self.pool, source_id).await
    }

    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
        DocumentQueries::list(&self.pool).await
    }

    #[inline]
    pub async fn delete_document(&self, source_id: &str) -> Result<bool> {
        DocumentQueries::delete(&self.pool, source_id).await
    }

    #[inline]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
