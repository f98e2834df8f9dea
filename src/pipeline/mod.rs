// Pipeline orchestration
// Drives load -> chunk -> embed -> store, then answers questions over the stored chunks


use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{StreamExt, stream};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, EmbeddingProvider};
use crate::database::lancedb::{DistanceMetric, QueryResult, VectorStore, top_k};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{IndexedDocument, NewIndexedDocument};
use crate::documents::{Document, source_id_from_path};
use crate::embeddings::{
    Chunk, ChunkingConfig, Embedder, EmbeddingGateway, HashingEmbedder, chunk_document,
};
use crate::ollama::OllamaClient;
use crate::rag::{Generator, RagEngine};
use crate::{LogQaError, Result};

/// How documents are distributed over vector indexes
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IndexLayout {
    /// One index for all documents, told apart by `source_id`
    #[default]
    Shared,
    /// One index directory per document
    PerDocument,
}

impl std::fmt::Display for IndexLayout {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            IndexLayout::Shared => write!(f, "shared"),
            IndexLayout::PerDocument => write!(f, "per_document"),
        }
    }
}

/// Open vector stores, keyed by directory
///
/// Owned by the pipeline and handed out explicitly; there is no
/// process-wide index handle.
#[derive(Debug)]
pub struct IndexSet {
    root: PathBuf,
    collection: String,
    metric: DistanceMetric,
    layout: IndexLayout,
    stores: HashMap<PathBuf, VectorStore>,
}

impl IndexSet {
    #[inline]
    pub fn new(root: PathBuf, collection: String, metric: DistanceMetric, layout: IndexLayout) -> Self {
        Self {
            root,
            collection,
            metric,
            layout,
            stores: HashMap::new(),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn layout(&self) -> IndexLayout {
        self.layout
    }

    /// Directory of the index that holds `source_id`
    #[inline]
    pub fn index_dir(&self, source_id: &str) -> PathBuf {
        match self.layout {
            IndexLayout::Shared => self.root.clone(),
            IndexLayout::PerDocument => self.root.join(source_id),
        }
    }

    /// Open (or reuse) the store located at `dir`
    #[inline]
    pub async fn store_at(&mut self, dir: &Path) -> Result<&mut VectorStore> {
        if !self.stores.contains_key(dir) {
            let store = VectorStore::open(dir, &self.collection, self.metric).await?;
            self.stores.insert(dir.to_path_buf(), store);
        }

        self.stores
            .get_mut(dir)
            .ok_or_else(|| LogQaError::Database(format!("index at {} was not opened", dir.display())))
    }

    /// Forget a cached store so its directory can be removed
    #[inline]
    pub fn evict(&mut self, dir: &Path) -> Option<VectorStore> {
        self.stores.remove(dir)
    }
}

/// A document that has been chunked and embedded but not yet stored
#[derive(Debug)]
struct PreparedDocument {
    source_id: String,
    path: PathBuf,
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
}

/// One answer per selected document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAnswer {
    pub source_id: String,
    pub answer: String,
}

pub struct Pipeline {
    config: Config,
    rag: RagEngine,
    indexes: IndexSet,
    catalog: Database,
}

impl Pipeline {
    /// Build a pipeline from explicit collaborators
    ///
    /// # Errors
    /// `InvalidConfiguration` for an invalid configuration (checked before
    /// anything is opened), `Other` if the catalog cannot be opened.
    #[inline]
    pub async fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;
        config.chunking.validate()?;

        let catalog = Database::open(&config.catalog_path()).await?;
        let indexes = IndexSet::new(
            config.vector_root(),
            config.index.collection.clone(),
            config.index.metric,
            config.index.layout,
        );
        let gateway = Arc::new(EmbeddingGateway::new(embedder));

        info!(
            "Pipeline ready (embedder: {}, generator: {}, layout: {})",
            gateway.model_name(),
            generator.model_name(),
            config.index.layout
        );

        Ok(Self {
            rag: RagEngine::new(gateway, generator),
            indexes,
            catalog,
            config,
        })
    }

    /// Build a pipeline whose collaborators are described by `config`
    #[inline]
    pub async fn from_config(config: Config) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(&config.ollama)?);

        let embedder: Arc<dyn Embedder> = match config.embedding.provider {
            EmbeddingProvider::Ollama => Arc::clone(&client) as Arc<dyn Embedder>,
            EmbeddingProvider::Hashing => {
                let dimension = usize::try_from(config.embedding.dimension).map_err(|_| {
                    LogQaError::InvalidConfiguration(format!(
                        "embedding dimension {} does not fit in memory",
                        config.embedding.dimension
                    ))
                })?;
                Arc::new(HashingEmbedder::new(dimension))
            }
        };

        Self::new(config, embedder, client).await
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn rag(&self) -> &RagEngine {
        &self.rag
    }

    #[inline]
    pub fn catalog(&self) -> &Database {
        &self.catalog
    }

    /// Index one file, replacing whatever was stored for it before
    #[inline]
    pub async fn index_path(&mut self, path: &Path) -> Result<IndexedDocument> {
        self.check_sources(&[path.to_path_buf()]).await?;
        let prepared = prepare_document(
            Arc::clone(self.rag.gateway()),
            self.config.chunking,
            path.to_path_buf(),
        )
        .await?;
        self.commit(prepared).await
    }

    /// Index several files
    ///
    /// Up to `embedding.concurrency` documents are embedded in parallel.
    /// Writes are applied one at a time in input order, and `on_indexed` is
    /// called after each document is committed. Stops at the first failure;
    /// documents committed before it stay indexed.
    ///
    /// # Errors
    /// `Selection` before anything is indexed if two files would share a
    /// source id.
    #[inline]
    pub async fn index_paths<F>(
        &mut self,
        paths: &[PathBuf],
        mut on_indexed: F,
    ) -> Result<Vec<IndexedDocument>>
    where
        F: FnMut(&IndexedDocument),
    {
        self.check_sources(paths).await?;

        let gateway = Arc::clone(self.rag.gateway());
        let chunking = self.config.chunking;
        let concurrency = self.config.embedding.concurrency.max(1);

        let mut prepared = stream::iter(paths.iter().cloned())
            .map(|path| prepare_document(Arc::clone(&gateway), chunking, path))
            .buffered(concurrency);

        let mut indexed = Vec::with_capacity(paths.len());
        while let Some(document) = prepared.next().await {
            let document = self.commit(document?).await?;
            on_indexed(&document);
            indexed.push(document);
        }

        Ok(indexed)
    }

    /// Reject files whose names map to a source id already claimed by a
    /// different file, in the same batch or in the catalog
    async fn check_sources(&self, paths: &[PathBuf]) -> Result<()> {
        let mut claimed: HashMap<String, &Path> = HashMap::with_capacity(paths.len());
        for path in paths {
            let source_id = source_id_from_path(path)?;

            if let Some(&other) = claimed.get(&source_id) {
                if !same_file(other, path) {
                    return Err(source_conflict(&source_id, other, path));
                }
                continue;
            }

            if let Some(existing) = self.catalog.get_document(&source_id).await? {
                let existing_path = Path::new(&existing.path);
                if !same_file(existing_path, path) {
                    return Err(source_conflict(&source_id, existing_path, path));
                }
            }

            claimed.insert(source_id, path);
        }
        Ok(())
    }

    async fn commit(&mut self, prepared: PreparedDocument) -> Result<IndexedDocument> {
        let dir = self.indexes.index_dir(&prepared.source_id);
        let store = self.indexes.store_at(&dir).await?;

        store
            .replace_source(&prepared.source_id, &prepared.chunks, &prepared.embeddings)
            .await?;

        let chunk_count = i64::try_from(prepared.chunks.len()).unwrap_or(i64::MAX);
        let document = self
            .catalog
            .upsert_document(&NewIndexedDocument {
                source_id: prepared.source_id,
                path: prepared.path.display().to_string(),
                chunk_count,
                window: i64::try_from(self.config.chunking.window).unwrap_or(i64::MAX),
                overlap: i64::try_from(self.config.chunking.overlap).unwrap_or(i64::MAX),
                index_path: dir.display().to_string(),
            })
            .await?;

        info!(
            "Indexed '{}' ({} chunks) into {}",
            document.source_id, document.chunk_count, document.index_path
        );
        Ok(document)
    }

    /// Answer a question, optionally restricted to one indexed document
    ///
    /// Without a source, every indexed document is eligible; with the
    /// per-document layout the nearest chunks of all indexes are merged.
    ///
    /// # Errors
    /// `Selection` if `source` has not been indexed.
    #[inline]
    pub async fn answer(&mut self, question: &str, source: Option<&str>) -> Result<String> {
        let k = self.config.index.top_k;

        if let Some(source_id) = source {
            let document = self.require_document(source_id).await?;
            let store = self.indexes.store_at(document.index_dir()).await?;
            return self.rag.answer(store, question, Some(source_id), k).await;
        }

        let context = self.retrieve_across(question, k).await?;
        self.rag.answer_with_context(question, &context).await
    }

    /// Answer the same question once per document
    #[inline]
    pub async fn answer_each(
        &mut self,
        question: &str,
        sources: &[String],
    ) -> Result<Vec<SourceAnswer>> {
        let mut answers = Vec::with_capacity(sources.len());
        for source_id in sources {
            let answer = self.answer(question, Some(source_id)).await?;
            answers.push(SourceAnswer {
                source_id: source_id.clone(),
                answer,
            });
        }
        Ok(answers)
    }

    async fn retrieve_across(&mut self, question: &str, k: usize) -> Result<QueryResult> {
        let mut dirs: Vec<PathBuf> = self
            .catalog
            .list_documents()
            .await?
            .iter()
            .map(|d| d.index_dir().to_path_buf())
            .unique()
            .collect();
        if dirs.is_empty() {
            dirs.push(self.indexes.root().to_path_buf());
        }

        let vector = self.rag.embed_question(question).await?;
        let mut hits = Vec::new();
        for dir in &dirs {
            let store = self.indexes.store_at(dir).await?;
            hits.extend(store.search(&vector, k, None).await?);
        }

        debug!("Merged {} hits from {} indexes", hits.len(), dirs.len());
        Ok(QueryResult::from(top_k(hits, k)))
    }

    async fn require_document(&self, source_id: &str) -> Result<IndexedDocument> {
        self.catalog.get_document(source_id).await?.ok_or_else(|| {
            LogQaError::Selection(format!("'{}' has not been indexed", source_id))
        })
    }

    /// Drop a document from its index and the catalog
    ///
    /// Returns `false` if the document was not indexed.
    #[inline]
    pub async fn remove_source(&mut self, source_id: &str) -> Result<bool> {
        let Some(document) = self.catalog.get_document(source_id).await? else {
            return Ok(false);
        };

        let dir = document.index_dir().to_path_buf();
        self.indexes.store_at(&dir).await?.delete_source(source_id).await?;
        self.catalog.delete_document(source_id).await?;

        if dir != self.indexes.root() {
            self.indexes.evict(&dir);
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                warn!("Failed to remove index directory {}: {}", dir.display(), e);
            }
        }

        info!("Removed '{}'", source_id);
        Ok(true)
    }

    #[inline]
    pub async fn indexed_documents(&self) -> Result<Vec<IndexedDocument>> {
        Ok(self.catalog.list_documents().await?)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    matches!(
        (std::fs::canonicalize(a), std::fs::canonicalize(b)),
        (Ok(a), Ok(b)) if a == b
    )
}

fn source_conflict(source_id: &str, first: &Path, second: &Path) -> LogQaError {
    LogQaError::Selection(format!(
        "{} and {} both map to source id '{}'; rename one of them or delete '{}' first",
        first.display(),
        second.display(),
        source_id,
        source_id
    ))
}

/// Load, chunk and embed one file without touching any index
async fn prepare_document(
    gateway: Arc<EmbeddingGateway>,
    chunking: ChunkingConfig,
    path: PathBuf,
) -> Result<PreparedDocument> {
    let document = Document::load(&path).await?;
    let chunks = chunk_document(&document, &chunking)?;
    let Document { source_id, .. } = document;

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embed_source = source_id.clone();
    let embeddings = tokio::task::spawn_blocking(move || gateway.embed(&texts))
        .await
        .map_err(|e| LogQaError::EmbeddingUnavailable(format!("embedding task failed: {e}")))?
        .map_err(|e| match e {
            LogQaError::EmbeddingUnavailable(msg) => LogQaError::EmbeddingUnavailable(format!(
                "{msg} (document: {embed_source})"
            )),
            other => other,
        })?;

    debug!("Prepared '{}' with {} chunks", source_id, chunks.len());
    Ok(PreparedDocument {
        source_id,
        path,
        chunks,
        embeddings,
    })
}
