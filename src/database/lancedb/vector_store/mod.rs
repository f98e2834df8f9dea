
use super::{DistanceMetric, QueryResult, SearchHit, top_k};
use crate::embeddings::chunking::Chunk;
use crate::{LogQaError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Persistent vector index addressed by a directory and a collection name
///
/// The table is created lazily on the first write, once the vector
/// dimension is known. Writes go through `merge_insert` keyed by record id,
/// so re-adding a chunk overwrites it and each call commits atomically.
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    table_name: String,
    metric: DistanceMetric,
    vector_dimension: Option<usize>,
    last_inserted_at: i64,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("path", &self.path)
            .field("table_name", &self.table_name)
            .field("metric", &self.metric)
            .field("vector_dimension", &self.vector_dimension)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Open (or create) the index stored under `path`
    ///
    /// # Arguments
    /// * `path` - Directory holding the LanceDB dataset
    /// * `table_name` - Collection name inside that directory
    /// * `metric` - Similarity metric used by every query
    ///
    /// # Returns
    /// * `Result<Self>` - Open store, or `IndexCorrupt` if an existing table
    ///   has no usable vector column
    #[inline]
    pub async fn open(path: &Path, table_name: &str, metric: DistanceMetric) -> Result<Self> {
        debug!("Opening LanceDB at path: {}", path.display());

        std::fs::create_dir_all(path).map_err(|e| {
            LogQaError::Database(format!(
                "Failed to create vector database directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let uri = path.to_string_lossy();
        let connection = lancedb::connect(&uri).execute().await.map_err(|e| {
            error!("Failed to connect to LanceDB: {}", e);
            LogQaError::Database(format!("Failed to connect to LanceDB at {}: {}", uri, e))
        })?;

        let mut store = Self {
            connection,
            path: path.to_path_buf(),
            table_name: table_name.to_string(),
            metric,
            vector_dimension: None,
            last_inserted_at: 0,
        };

        if let Some(table) = store.open_table().await? {
            let dimension = detect_vector_dimension(&table).await?;
            info!(
                "Opened collection '{}' with vector dimension {}",
                store.table_name, dimension
            );
            store.vector_dimension = Some(dimension);
        } else {
            debug!(
                "Collection '{}' does not exist yet, it will be created on first write",
                store.table_name
            );
        }

        Ok(store)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Dimension of the stored vectors, `None` until the first write
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    /// Store chunks of one source, overwriting records with the same id
    ///
    /// All records are committed in a single `merge_insert`, so either every
    /// chunk of the call is visible afterwards or none is.
    #[inline]
    pub async fn add(
        &mut self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        source_id: &str,
    ) -> Result<()> {
        self.write(chunks, embeddings, source_id, false).await
    }

    /// Store chunks of one source and drop its records not in `chunks`
    ///
    /// Upsert and removal of stale chunks happen in one commit. Replacing
    /// with an empty chunk list deletes the source.
    #[inline]
    pub async fn replace_source(
        &mut self,
        source_id: &str,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.is_empty() {
            return self.delete_source(source_id).await;
        }
        self.write(chunks, embeddings, source_id, true).await
    }

    async fn write(
        &mut self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        source_id: &str,
        prune_stale: bool,
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(LogQaError::Database(format!(
                "Cannot store '{}': {} chunks but {} embeddings",
                source_id,
                chunks.len(),
                embeddings.len()
            )));
        }

        if let Some(chunk) = chunks.iter().find(|c| c.source_id != source_id) {
            return Err(LogQaError::Database(format!(
                "Chunk {} belongs to '{}', not '{}'",
                chunk.sequence_index, chunk.source_id, source_id
            )));
        }

        let Some(first) = embeddings.first() else {
            debug!("No chunks to store for '{}'", source_id);
            return Ok(());
        };

        let dimension = self.vector_dimension.unwrap_or(first.len());
        if let Some(vector) = embeddings.iter().find(|v| v.len() != dimension) {
            return Err(LogQaError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }

        debug!(
            "Storing {} chunks for '{}' in '{}'",
            chunks.len(),
            source_id,
            self.table_name
        );

        let table = self.ensure_table(dimension).await?;
        let inserted_at = self.next_insert_timestamp();
        let batch = create_record_batch(chunks, embeddings, dimension, inserted_at)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        if prune_stale {
            merge.when_not_matched_by_source_delete(Some(source_predicate(source_id)));
        }
        merge.execute(Box::new(reader)).await.map_err(|e| {
            LogQaError::Database(format!(
                "Failed to store chunks for '{}': {}",
                source_id, e
            ))
        })?;

        info!("Stored {} chunks for '{}'", chunks.len(), source_id);
        Ok(())
    }

    /// Chunk texts nearest to `vector`, closest first
    ///
    /// Returns an empty result for an empty or missing index, and every
    /// eligible record when fewer than `k` match the filter.
    #[inline]
    pub async fn query(
        &self,
        vector: &[f32],
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<QueryResult> {
        Ok(QueryResult::from(self.search(vector, k, source_filter).await?))
    }

    /// Nearest records with their distances, closest first
    ///
    /// Ties are broken by insertion order. Records with a missing text or
    /// source are skipped with a warning.
    #[inline]
    pub async fn search(
        &self,
        vector: &[f32],
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let Some(table) = self.open_table().await? else {
            debug!("Query against missing collection '{}'", self.table_name);
            return Ok(Vec::new());
        };

        if let Some(expected) = self.vector_dimension.filter(|&d| d != vector.len()) {
            return Err(LogQaError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let filter = source_filter.map(source_predicate);
        let eligible = table
            .count_rows(filter.clone())
            .await
            .map_err(|e| LogQaError::Database(format!("Failed to count rows: {}", e)))?;
        if eligible == 0 {
            debug!("No eligible records for query (filter: {:?})", source_filter);
            return Ok(Vec::new());
        }

        // Rank every eligible record so insertion order can break ties exactly
        let mut query = table
            .vector_search(vector)
            .map_err(|e| LogQaError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(self.metric.distance_type())
            .bypass_vector_index()
            .limit(eligible);

        if let Some(filter) = filter {
            query = query.only_if(filter);
        }

        let mut results = query
            .execute()
            .await
            .map_err(|e| LogQaError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::with_capacity(eligible);
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| LogQaError::Database(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(parse_search_batch(&batch)?);
        }

        debug!("Ranked {} records for query", hits.len());
        Ok(top_k(hits, k))
    }

    /// Delete every record belonging to `source_id`
    #[inline]
    pub async fn delete_source(&mut self, source_id: &str) -> Result<()> {
        let Some(table) = self.open_table().await? else {
            return Ok(());
        };

        table
            .delete(&source_predicate(source_id))
            .await
            .map_err(|e| {
                LogQaError::Database(format!("Failed to delete records of '{}': {}", source_id, e))
            })?;

        info!("Deleted records for source: {}", source_id);
        Ok(())
    }

    /// Number of stored records, optionally restricted to one source
    #[inline]
    pub async fn count(&self, source_filter: Option<&str>) -> Result<usize> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        table
            .count_rows(source_filter.map(source_predicate))
            .await
            .map_err(|e| LogQaError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Compact fragments and prune old versions
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        let Some(table) = self.open_table().await? else {
            return Ok(());
        };

        debug!("Optimizing collection '{}'", self.table_name);
        table
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| LogQaError::Database(format!("Failed to optimize table: {}", e)))?;

        info!("Vector index optimization completed");
        Ok(())
    }

    /// Check that the collection can be read and holds no corrupt records
    ///
    /// # Returns
    /// * `Result<bool>` - `false` if the table exists but cannot be read, or
    ///   if any record lacks its text or source id
    #[inline]
    pub async fn validate_integrity(&self) -> Result<bool> {
        let table = match self.open_table().await {
            Ok(Some(table)) => table,
            Ok(None) => return Ok(true),
            Err(e) => {
                error!("Failed to open table during integrity check: {}", e);
                return Ok(false);
            }
        };

        let count = match table.count_rows(None).await {
            Ok(count) => count,
            Err(e) => {
                error!("Failed to count rows during integrity check: {}", e);
                return Ok(false);
            }
        };

        match table.count_rows(Some(CORRUPT_RECORD_FILTER.to_string())).await {
            Ok(0) => {
                debug!("Integrity check passed, {} rows found", count);
                Ok(true)
            }
            Ok(corrupt) => {
                warn!(
                    "{}",
                    LogQaError::IndexCorrupt(format!(
                        "{} of {} records in '{}' have no text or source",
                        corrupt, count, self.table_name
                    ))
                );
                Ok(false)
            }
            Err(e) => {
                error!("Failed to scan for corrupt records: {}", e);
                Ok(false)
            }
        }
    }

    async fn open_table(&self) -> Result<Option<Table>> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| LogQaError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.contains(&self.table_name) {
            return Ok(None);
        }

        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map(Some)
            .map_err(|e| LogQaError::Database(format!("Failed to open table: {}", e)))
    }

    async fn ensure_table(&mut self, dimension: usize) -> Result<Table> {
        if let Some(table) = self.open_table().await? {
            return Ok(table);
        }

        info!(
            "Creating collection '{}' with {} dimensions",
            self.table_name, dimension
        );
        let table = self
            .connection
            .create_empty_table(&self.table_name, create_schema(dimension)?)
            .execute()
            .await
            .map_err(|e| LogQaError::Database(format!("Failed to create table: {}", e)))?;

        self.vector_dimension = Some(dimension);
        Ok(table)
    }

    fn next_insert_timestamp(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_micros();
        self.last_inserted_at = now.max(self.last_inserted_at.saturating_add(1));
        self.last_inserted_at
    }
}

const CORRUPT_RECORD_FILTER: &str = "content IS NULL OR source_id IS NULL";

/// SQL predicate selecting one source
fn source_predicate(source_id: &str) -> String {
    format!("source_id = '{}'", source_id.replace('\'', "''"))
}

fn create_schema(vector_dim: usize) -> Result<SchemaRef> {
    let list_size = i32::try_from(vector_dim).map_err(|_| {
        LogQaError::Database(format!("Vector dimension {} is too large", vector_dim))
    })?;

    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                list_size,
            ),
            false,
        ),
        Field::new("source_id", DataType::Utf8, true),
        Field::new("sequence_index", DataType::UInt32, false),
        Field::new("content", DataType::Utf8, true),
        Field::new("inserted_at", DataType::Int64, false),
        Field::new("insert_position", DataType::UInt32, false),
    ])))
}

async fn detect_vector_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| LogQaError::Database(format!("Failed to get table schema: {}", e)))?;

    let field = schema
        .field_with_name("vector")
        .map_err(|_| LogQaError::IndexCorrupt("collection has no vector column".to_string()))?;

    match field.data_type() {
        DataType::FixedSizeList(_, size) => usize::try_from(*size).map_err(|_| {
            LogQaError::IndexCorrupt(format!("invalid vector dimension {}", size))
        }),
        other => Err(LogQaError::IndexCorrupt(format!(
            "vector column has unexpected type {}",
            other
        ))),
    }
}

fn create_record_batch(
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    vector_dim: usize,
    inserted_at: i64,
) -> Result<RecordBatch> {
    let schema = create_schema(vector_dim)?;
    let list_size = i32::try_from(vector_dim).map_err(|_| {
        LogQaError::Database(format!("Vector dimension {} is too large", vector_dim))
    })?;

    let ids: Vec<String> = chunks.iter().map(Chunk::record_id).collect();
    let source_ids: Vec<&str> = chunks.iter().map(|c| c.source_id.as_str()).collect();
    let sequence_indices: Vec<u32> = chunks.iter().map(|c| c.sequence_index).collect();
    let contents: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let positions = (0..chunks.len())
        .map(|i| {
            u32::try_from(i)
                .map_err(|_| LogQaError::Database("Too many chunks in one batch".to_string()))
        })
        .collect::<Result<Vec<u32>>>()?;

    let flat_values: Vec<f32> = embeddings.iter().flatten().copied().collect();
    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array =
        FixedSizeListArray::try_new(field, list_size, Arc::new(values_array), None).map_err(
            |e| LogQaError::Database(format!("Failed to create vector array: {}", e)),
        )?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(source_ids)),
        Arc::new(UInt32Array::from(sequence_indices)),
        Arc::new(StringArray::from(contents)),
        Arc::new(Int64Array::from(vec![inserted_at; chunks.len()])),
        Arc::new(UInt32Array::from(positions)),
    ];

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| LogQaError::Database(format!("Failed to create record batch: {}", e)))
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| LogQaError::IndexCorrupt(format!("missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| LogQaError::IndexCorrupt(format!("invalid {} column type", name)))
}

/// Parse one record batch of search results, skipping malformed rows
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
    let ids = column::<StringArray>(batch, "id")?;
    let source_ids = column::<StringArray>(batch, "source_id")?;
    let sequence_indices = column::<UInt32Array>(batch, "sequence_index")?;
    let contents = column::<StringArray>(batch, "content")?;
    let inserted_ats = column::<Int64Array>(batch, "inserted_at")?;
    let positions = column::<UInt32Array>(batch, "insert_position")?;
    let distances = column::<Float32Array>(batch, "_distance")?;

    let mut hits = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let record_id = ids.value(row);
        if contents.is_null(row) || source_ids.is_null(row) {
            warn!(
                "{}",
                LogQaError::IndexCorrupt(format!("record '{}' has no text or source", record_id))
            );
            continue;
        }

        hits.push(SearchHit {
            record_id: record_id.to_string(),
            source_id: source_ids.value(row).to_string(),
            sequence_index: sequence_indices.value(row),
            text: contents.value(row).to_string(),
            distance: if distances.is_null(row) {
                f32::INFINITY
            } else {
                distances.value(row)
            },
            inserted_at: inserted_ats.value(row),
            insert_position: positions.value(row),
        });
    }

    Ok(hits)
}
